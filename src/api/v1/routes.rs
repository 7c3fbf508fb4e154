/*
 * Responsibility
 * - v1 の URL 構造を定義
 * - /health は公開、/memos と /me は auth gate の内側 (route_layer で保護範囲を限定)
 */
use axum::{Router, routing::get};

use crate::{middleware, state::AppState};

use crate::api::v1::handlers::{
    health::health,
    me::me,
    memos::{create_memo, delete_memo, get_memo, list_memos, patch_memo, replace_memo},
};

pub fn routes(state: AppState) -> Router<AppState> {
    let public = Router::new().route("/health", get(health));

    let protected = Router::new()
        .route("/memos", get(list_memos).post(create_memo))
        .route(
            "/memos/{memo_id}",
            get(get_memo)
                .put(replace_memo)
                .patch(patch_memo)
                .delete(delete_memo),
        )
        .route("/me", get(me));
    let protected = middleware::auth::access::apply(protected, state);

    public.merge(protected)
}
