/*
 * Responsibility
 * - handler が受け取る extractor 群の公開窓口
 * - Rejection はすべて AppError (エラー body の形をここでも統一する)
 */
pub mod auth_ctx;
pub mod json;
pub mod public_id;

pub use auth_ctx::{AuthCtx, AuthCtxExtractor};
pub use json::AppJson;
pub use public_id::PublicMemoId;
