/**
 * Responsibility
 * - repo が上位に伝える意味の定義
 * - NotFound / Forbidden は内部では区別する (外部にどう見せるかは handler 側で決める)
 */
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("memo not found")]
    NotFound,
    #[error("memo belongs to another user")]
    Forbidden,
    #[error("db error")]
    Db(#[from] sqlx::Error),
    #[error("store unavailable")]
    Unavailable,
}
