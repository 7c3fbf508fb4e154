use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::v1::extractors::AuthCtx;

/// GET /me
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub subject_id: String,
    pub email: Option<String>,
    pub issuer: String,
    pub expires_at: DateTime<Utc>,
}

impl From<&AuthCtx> for MeResponse {
    fn from(ctx: &AuthCtx) -> Self {
        Self {
            subject_id: ctx.subject_id().to_string(),
            email: ctx.email().map(str::to_string),
            issuer: ctx.issuer().to_string(),
            expires_at: ctx.expires_at(),
        }
    }
}
