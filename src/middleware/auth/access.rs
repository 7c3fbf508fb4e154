//! Auth gate: bearer access token 検証 → AuthCtx を extensions に入れる
//!
//! - `authenticate` が本体 (ヘッダ → AuthCtx or AuthError)。axum に依存しない入力だけを受ける。
//! - middleware はそれを呼び、成功時のみ handler まで進める。失敗時は handler に到達しない。
//! - 外部には AuthError の種類を出さない (401 で統一)。種類はログにだけ残す。

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::{self, Next},
    response::Response,
};

use crate::api::v1::extractors::AuthCtx;
use crate::error::AppError;
use crate::middleware::bearer_auth::bearer_credential;
use crate::services::auth::{AuthError, TokenVerifier};
use crate::state::AppState;

/// 保護ルートだけに認証を掛ける。
///
/// `route_layer` なので、マッチしたルートにのみ適用される (未定義パスは 404 のまま)。
/// ```ignore
/// let memos = middleware::auth::access::apply(memo_routes(), state.clone());
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // axum 0.8 の from_fn は State extractor を受け取れないため、`from_fn_with_state` で明示的に state を渡す
    router.route_layer(middleware::from_fn_with_state(state, access_middleware))
}

pub async fn authenticate(
    verifier: &TokenVerifier,
    headers: &HeaderMap,
) -> Result<AuthCtx, AuthError> {
    let credential = bearer_credential(headers)?;
    let identity = verifier.verify(credential).await?;
    Ok(AuthCtx::new(identity))
}

async fn access_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_ctx = match authenticate(&state.verifier, req.headers()).await {
        Ok(ctx) => ctx,
        Err(err @ AuthError::KeysUnavailable) => {
            tracing::error!(kind = err.kind(), "auth gate cannot verify: signing keys unavailable");
            return Err(err.into());
        }
        Err(err) => {
            tracing::warn!(
                kind = err.kind(),
                error = %err,
                method = %req.method(),
                path = %req.uri().path(),
                "request rejected by auth gate"
            );
            return Err(err.into());
        }
    };

    tracing::debug!(subject = %auth_ctx.subject_id(), "request authenticated");

    // middleware → extractor への受け渡し
    req.extensions_mut().insert(auth_ctx);

    Ok(next.run(req).await)
}
