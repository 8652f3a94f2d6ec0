// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::auth;
use crate::handlers;
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, patch, post},
};

/// Creates and configures the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Token issuance, the only unauthenticated route
        .route("/api/auth/token", post(auth::issue_token))
        // Profile of the caller
        .route(
            "/api/users/me",
            get(handlers::get_profile).patch(handlers::update_profile),
        )
        // Task records
        .route(
            "/api/tasks",
            get(handlers::list_tasks).post(handlers::create_task),
        )
        .route(
            "/api/tasks/{id}",
            get(handlers::get_task)
                .patch(handlers::update_task)
                .delete(handlers::delete_task),
        )
        .route("/api/tasks/{id}/start", post(handlers::start_task))
        .route("/api/tasks/{id}/complete", post(handlers::complete_task))
        .route("/api/tasks/{id}/archive", post(handlers::archive_task))
        .route("/api/tasks/{id}/reopen", post(handlers::reopen_task))
        .route("/api/tasks/{id}/print", get(handlers::print_task))
        // User and database maintenance
        .route(
            "/api/admin/users",
            get(handlers::list_users).post(handlers::create_user),
        )
        .route("/api/admin/users/{id}", patch(handlers::update_user))
        .route(
            "/api/admin/maintenance/purge-archived",
            post(handlers::purge_archived),
        )
        // Adds the shared state (DB pool, token issuer)
        .with_state(state)
}
