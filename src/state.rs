/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 *   - store: MemoStore (postgres / memory), id_codec: IdCodec, verifier: TokenVerifier
 * - Clone 前提で持つ (内部は Arc/Clone cheap)
 */
use std::sync::Arc;

use crate::repos::memo::MemoStore;
use crate::services::{auth::TokenVerifier, id_codec::IdCodec};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MemoStore>,
    pub id_codec: IdCodec,
    pub verifier: Arc<TokenVerifier>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("store", &self.store.backend_name())
            .field("verifier", &self.verifier)
            .finish()
    }
}

impl AppState {
    pub fn new(store: Arc<dyn MemoStore>, id_codec: IdCodec, verifier: Arc<TokenVerifier>) -> Self {
        Self {
            store,
            id_codec,
            verifier,
        }
    }
}
