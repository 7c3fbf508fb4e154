/*
 * Responsibility
 * - GET /me: auth gate が検証した identity をそのまま返す (疎通・クライアント側の確認用)
 */
use axum::Json;

use crate::api::v1::{dto::me::MeResponse, extractors::AuthCtxExtractor};

pub async fn me(AuthCtxExtractor(auth): AuthCtxExtractor) -> Json<MeResponse> {
    Json(MeResponse::from(&auth))
}
