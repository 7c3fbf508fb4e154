/*
 * Responsibility
 * - middlware の公開インターフェース (re-export)
 * - 適用順は app.rs で明示的に組み立てる (CORS が最外、auth は保護ルートのみ)
 */
pub mod auth;
pub mod bearer_auth;
pub mod cors;
pub mod http;
pub mod security_headers;
