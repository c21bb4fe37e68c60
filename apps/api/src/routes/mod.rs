pub mod auth;
pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
    Router,
};

use crate::resumes::handlers;
use crate::state::AppState;

/// Extra room on top of the file limit for the other multipart fields.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/health", get(health::health_handler))
        // Auth API
        .route("/api/config", get(auth::handle_config))
        .route("/api/auth/callback", get(auth::handle_callback))
        .route("/api/auth/logout", post(auth::handle_logout))
        .route("/api/users/me", get(auth::handle_me))
        // Resume API
        .route(
            "/api/users/me/resumes",
            get(handlers::handle_list_resumes)
                .post(handlers::handle_upload_resume)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/api/users/me/resumes/:id",
            patch(handlers::handle_rename_resume)
                .delete(handlers::handle_delete_resume),
        )
        .route(
            "/api/users/me/resumes/:id/download",
            get(handlers::handle_download_resume),
        )
        .route(
            "/api/users/me/resumes/:id/url",
            get(handlers::handle_presign_resume),
        )
        .route(
            "/api/users/me/resumes/:id/parse",
            post(handlers::handle_parse_resume),
        )
        .with_state(state)
}
