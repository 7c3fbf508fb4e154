/**
 * Responsibility
 *  - MemoStore (trait) と backend 実装を束ねる
 *  - postgres: 本番 / memory: DATABASE_URL 未設定時 (開発) とテスト
 */
mod memory;
mod postgres;
mod store;

pub use memory::InMemoryMemoStore;
pub use postgres::PgMemoStore;
pub use store::{Memo, MemoPatch, MemoStore, NewMemo};
