use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tracing::debug;
use uuid::Uuid;

use super::AuthError;
use crate::errors::AppError;
use crate::state::AppState;

/// The caller behind a validated session credential.
///
/// Adding this extractor to a handler is what gates it: requests without a
/// valid, unexpired credential for a registered user are rejected with 401
/// before the handler body runs.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims = state.sessions.authenticate(&parts.headers).map_err(|e| {
            debug!("Rejected request to {}: {e}", parts.uri.path());
            e
        })?;

        let user = state
            .users
            .lookup(&claims.email)
            .await?
            .ok_or(AuthError::UnknownUser)?;

        Ok(AuthenticatedUser {
            user_id: user.id,
            email: claims.email,
        })
    }
}
