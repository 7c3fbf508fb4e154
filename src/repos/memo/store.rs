use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::repos::error::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Memo {
    #[sqlx(rename = "memoId")]
    pub id: i64,

    #[sqlx(rename = "ownerId")]
    pub owner_id: String,

    pub title: String,
    pub body: String,

    #[sqlx(rename = "createdAt")]
    pub created_at: DateTime<Utc>,

    #[sqlx(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMemo {
    pub title: String,
    pub body: String,
}

/// Fields to change; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct MemoPatch {
    pub title: Option<String>,
    pub body: Option<String>,
}

impl MemoPatch {
    pub(crate) fn apply(self, memo: &mut Memo, now: DateTime<Utc>) {
        if let Some(title) = self.title {
            memo.title = title;
        }
        if let Some(body) = self.body {
            memo.body = body;
        }
        memo.updated_at = now;
    }
}

/// Owner-scoped memo persistence.
///
/// Every call except `create` and `list` takes the caller id and fails with
/// `Forbidden` when it does not match the stored owner. Writes against the same
/// memo id are serialized by the backend.
#[async_trait]
pub trait MemoStore: Send + Sync {
    // Returns the backend name (for logging).
    fn backend_name(&self) -> &'static str;

    async fn create(&self, owner_id: &str, memo: NewMemo) -> Result<Memo, StoreError>;

    async fn get(&self, caller_id: &str, memo_id: i64) -> Result<Memo, StoreError>;

    // Caller's memos only, in creation order.
    async fn list(&self, caller_id: &str) -> Result<Vec<Memo>, StoreError>;

    async fn update(
        &self,
        caller_id: &str,
        memo_id: i64,
        patch: MemoPatch,
    ) -> Result<Memo, StoreError>;

    async fn delete(&self, caller_id: &str, memo_id: i64) -> Result<(), StoreError>;
}

/// Ownership rule shared by both backends.
pub(crate) fn check_owner(owner_id: Option<&str>, caller_id: &str) -> Result<(), StoreError> {
    match owner_id {
        None => Err(StoreError::NotFound),
        Some(owner) if owner != caller_id => Err(StoreError::Forbidden),
        Some(_) => Ok(()),
    }
}
