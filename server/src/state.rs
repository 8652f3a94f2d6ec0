// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::auth::TokenIssuer;
use axum::extract::FromRef;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub tokens: Arc<TokenIssuer>,
}

impl AppState {
    pub fn new(pool: SqlitePool, tokens: TokenIssuer) -> Self {
        Self {
            pool,
            tokens: Arc::new(tokens),
        }
    }
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}
