/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 * - Clone 前提で持つ (内部は Arc/Clone cheap)
 */
use std::sync::Arc;

use crate::provider::TokenProvider;

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<TokenProvider>,
    pub token_ttl_seconds: i64,
}

impl AppState {
    pub fn new(auth: Arc<TokenProvider>, token_ttl_seconds: i64) -> Self {
        Self {
            auth,
            token_ttl_seconds,
        }
    }
}
