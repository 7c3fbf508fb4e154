/*
 * Responsibility
 * - /memos 系 CRUD handler
 * - Path の {memo_id} は公開 ID → extractor で復号化して内部 ID に変換して受け取る
 * - owner は常に AuthCtx の subject_id (body からは受け取らない)
 * - 入力検証は store を呼ぶ前に行う
 */
use axum::{Json, extract::State, http::StatusCode};

use crate::{
    api::v1::{
        dto::memos::{CreateMemoRequest, MemoResponse, PatchMemoRequest, ReplaceMemoRequest},
        extractors::{AppJson, AuthCtx, AuthCtxExtractor, PublicMemoId},
    },
    error::AppError,
    repos::{
        error::StoreError,
        memo::{Memo, MemoPatch},
    },
    state::AppState,
};

fn to_response(state: &AppState, memo: Memo) -> Result<MemoResponse, AppError> {
    Ok(MemoResponse::from_memo(&state.id_codec, memo)?)
}

/// Forbidden は外部には NotFound と同じ形で返すが、ログには caller を残す
fn store_failure(
    auth: &AuthCtx,
    memo_id: i64,
    op: &'static str,
) -> impl FnOnce(StoreError) -> AppError {
    let caller = auth.subject_id().to_string();
    move |err| {
        if matches!(err, StoreError::Forbidden) {
            tracing::warn!(caller = %caller, memo_id, op, "memo access denied: not the owner");
        }
        err.into()
    }
}

pub async fn list_memos(
    State(state): State<AppState>,
    AuthCtxExtractor(auth): AuthCtxExtractor,
) -> Result<Json<Vec<MemoResponse>>, AppError> {
    let memos = state.store.list(auth.subject_id()).await?;

    let mut res = Vec::with_capacity(memos.len());
    for memo in memos {
        res.push(to_response(&state, memo)?);
    }
    Ok(Json(res))
}

pub async fn create_memo(
    State(state): State<AppState>,
    AuthCtxExtractor(auth): AuthCtxExtractor,
    AppJson(req): AppJson<CreateMemoRequest>,
) -> Result<(StatusCode, Json<MemoResponse>), AppError> {
    let new_memo = req.validate().map_err(AppError::bad_request)?;

    let memo = state.store.create(auth.subject_id(), new_memo).await?;
    tracing::info!(owner = %auth.subject_id(), memo_id = memo.id, "memo created");

    Ok((StatusCode::CREATED, Json(to_response(&state, memo)?)))
}

pub async fn get_memo(
    State(state): State<AppState>,
    AuthCtxExtractor(auth): AuthCtxExtractor,
    memo_id: PublicMemoId,
) -> Result<Json<MemoResponse>, AppError> {
    let memo = state
        .store
        .get(auth.subject_id(), memo_id.id)
        .await
        .map_err(store_failure(&auth, memo_id.id, "get"))?;

    Ok(Json(to_response(&state, memo)?))
}

pub async fn replace_memo(
    State(state): State<AppState>,
    AuthCtxExtractor(auth): AuthCtxExtractor,
    memo_id: PublicMemoId,
    AppJson(req): AppJson<ReplaceMemoRequest>,
) -> Result<Json<MemoResponse>, AppError> {
    let new_memo = req.validate().map_err(AppError::bad_request)?;
    let patch = MemoPatch {
        title: Some(new_memo.title),
        body: Some(new_memo.body),
    };

    update(&state, &auth, memo_id, patch, "replace").await
}

pub async fn patch_memo(
    State(state): State<AppState>,
    AuthCtxExtractor(auth): AuthCtxExtractor,
    memo_id: PublicMemoId,
    AppJson(req): AppJson<PatchMemoRequest>,
) -> Result<Json<MemoResponse>, AppError> {
    let patch = req.validate().map_err(AppError::bad_request)?;

    update(&state, &auth, memo_id, patch, "patch").await
}

async fn update(
    state: &AppState,
    auth: &AuthCtx,
    memo_id: PublicMemoId,
    patch: MemoPatch,
    op: &'static str,
) -> Result<Json<MemoResponse>, AppError> {
    let memo = state
        .store
        .update(auth.subject_id(), memo_id.id, patch)
        .await
        .map_err(store_failure(auth, memo_id.id, op))?;

    Ok(Json(to_response(state, memo)?))
}

pub async fn delete_memo(
    State(state): State<AppState>,
    AuthCtxExtractor(auth): AuthCtxExtractor,
    memo_id: PublicMemoId,
) -> Result<StatusCode, AppError> {
    state
        .store
        .delete(auth.subject_id(), memo_id.id)
        .await
        .map_err(store_failure(&auth, memo_id.id, "delete"))?;

    tracing::info!(owner = %auth.subject_id(), memo_id = memo_id.id, "memo deleted");
    Ok(StatusCode::NO_CONTENT)
}
