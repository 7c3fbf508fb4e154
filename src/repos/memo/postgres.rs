/*
 * Responsibility
 * - memos テーブル向け SQLx 操作
 * - 書き込みは 1 トランザクション内で SELECT ... FOR UPDATE → owner チェック → 書き込み
 *   (同じ memo への並行 update/delete を行ロックで直列化する)
 * - 書き込みは tokio::spawn 上で実行し、リクエストが切断されても commit/rollback まで走り切る
 */
use std::future::Future;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::repos::error::StoreError;
use crate::repos::memo::store::{Memo, MemoPatch, MemoStore, NewMemo, check_owner};

#[derive(Debug, Clone)]
pub struct PgMemoStore {
    pool: PgPool,
}

impl PgMemoStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Run a write on its own task so dropping the request future cannot cancel
/// it between statements.
async fn run_detached<T, F>(fut: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, StoreError>> + Send + 'static,
{
    tokio::spawn(fut).await.map_err(|e| {
        tracing::error!(error = %e, "detached memo write failed");
        StoreError::Unavailable
    })?
}

#[async_trait]
impl MemoStore for PgMemoStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn create(&self, owner_id: &str, memo: NewMemo) -> Result<Memo, StoreError> {
        let pool = self.pool.clone();
        let owner_id = owner_id.to_string();

        run_detached(async move {
            let row = sqlx::query_as::<_, Memo>(
                r#"
                INSERT INTO memos ("ownerId", title, body)
                VALUES ($1, $2, $3)
                RETURNING
                    "memoId", "ownerId", title, body, "createdAt", "updatedAt"
                "#,
            )
            .bind(&owner_id)
            .bind(&memo.title)
            .bind(&memo.body)
            .fetch_one(&pool)
            .await?;

            Ok(row)
        })
        .await
    }

    async fn get(&self, caller_id: &str, memo_id: i64) -> Result<Memo, StoreError> {
        let row = sqlx::query_as::<_, Memo>(
            r#"
            SELECT
                "memoId", "ownerId", title, body, "createdAt", "updatedAt"
            FROM memos
            WHERE "memoId" = $1
            "#,
        )
        .bind(memo_id)
        .fetch_optional(&self.pool)
        .await?;

        check_owner(row.as_ref().map(|m| m.owner_id.as_str()), caller_id)?;
        row.ok_or(StoreError::NotFound)
    }

    async fn list(&self, caller_id: &str) -> Result<Vec<Memo>, StoreError> {
        let rows = sqlx::query_as::<_, Memo>(
            r#"
            SELECT
                "memoId", "ownerId", title, body, "createdAt", "updatedAt"
            FROM memos
            WHERE "ownerId" = $1
            ORDER BY "memoId" ASC
            "#,
        )
        .bind(caller_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn update(
        &self,
        caller_id: &str,
        memo_id: i64,
        patch: MemoPatch,
    ) -> Result<Memo, StoreError> {
        let pool = self.pool.clone();
        let caller_id = caller_id.to_string();

        run_detached(async move {
            let mut tx = pool.begin().await?;

            let owner: Option<String> = sqlx::query_scalar(
                r#"
                SELECT "ownerId" FROM memos
                WHERE "memoId" = $1
                FOR UPDATE
                "#,
            )
            .bind(memo_id)
            .fetch_optional(&mut *tx)
            .await?;
            check_owner(owner.as_deref(), &caller_id)?;

            let row = sqlx::query_as::<_, Memo>(
                r#"
                UPDATE memos
                SET
                    title = COALESCE($2, title),
                    body = COALESCE($3, body),
                    "updatedAt" = now()
                WHERE "memoId" = $1
                RETURNING
                    "memoId", "ownerId", title, body, "createdAt", "updatedAt"
                "#,
            )
            .bind(memo_id)
            .bind(patch.title.as_deref())
            .bind(patch.body.as_deref())
            .fetch_one(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok(row)
        })
        .await
    }

    async fn delete(&self, caller_id: &str, memo_id: i64) -> Result<(), StoreError> {
        let pool = self.pool.clone();
        let caller_id = caller_id.to_string();

        run_detached(async move {
            let mut tx = pool.begin().await?;

            let owner: Option<String> = sqlx::query_scalar(
                r#"
                SELECT "ownerId" FROM memos
                WHERE "memoId" = $1
                FOR UPDATE
                "#,
            )
            .bind(memo_id)
            .fetch_optional(&mut *tx)
            .await?;
            check_owner(owner.as_deref(), &caller_id)?;

            sqlx::query(
                r#"
                DELETE FROM memos
                WHERE "memoId" = $1
                "#,
            )
            .bind(memo_id)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok(())
        })
        .await
    }
}
