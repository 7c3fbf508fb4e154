/*
 * Responsibility
 * - Handler から見える「認証済みコンテキスト」の型
 * - auth gate (middleware) が検証して request extensions に格納し、handler はこの型だけを受け取る
 *
 * Notes
 * - トークン検証ロジックは services::auth 側の責務
 * - 1 リクエスト内だけで生きる (キャッシュ・共有しない)
 */
use chrono::{DateTime, Utc};

use crate::services::auth::VerifiedIdentity;

/// 認証済みのリクエストに付与されるコンテキスト
///
/// - `subject_id` は IdP のユーザー ID (JWT の `sub`)。memo の owner 判定に使う唯一の値
#[derive(Debug, Clone)]
pub struct AuthCtx {
    identity: VerifiedIdentity,
}

impl AuthCtx {
    pub fn new(identity: VerifiedIdentity) -> Self {
        Self { identity }
    }

    pub fn subject_id(&self) -> &str {
        &self.identity.subject_id
    }

    pub fn email(&self) -> Option<&str> {
        self.identity.email.as_deref()
    }

    pub fn issuer(&self) -> &str {
        &self.identity.issuer
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.identity.expires_at
    }
}
