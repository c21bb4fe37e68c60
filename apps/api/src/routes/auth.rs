use axum::{
    extract::{Query, State},
    http::{header::SET_COOKIE, HeaderMap},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::{AuthError, AuthenticatedUser};
use crate::errors::AppError;
use crate::models::user::{Profile, User};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapResponse {
    pub client_id: String,
    pub redirect_uri: String,
    pub state: String,
    pub is_logged_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_info: Option<User>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set by the provider when the user declines the authorization.
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub is_logged_in: bool,
    pub user_id: Uuid,
    pub user_info: Profile,
}

/// GET /api/config
///
/// Bootstrap data for the client. An invalid or expired credential simply
/// reports `isLoggedIn: false`.
pub async fn handle_config(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<BootstrapResponse>, AppError> {
    let user_info = match state.sessions.session_from_headers(&headers) {
        Some(claims) => state.users.lookup(&claims.email).await?,
        None => None,
    };

    Ok(Json(BootstrapResponse {
        client_id: state.config.oauth_client_id.clone(),
        redirect_uri: state.config.oauth_redirect_uri.clone(),
        state: state.config.oauth_state.clone(),
        is_logged_in: user_info.is_some(),
        user_info,
    }))
}

/// GET /api/auth/callback?code&state
///
/// Completes the OAuth flow: code → access token → profile → user → session
/// cookie. Any failure leaves the caller logged out with no cookie set.
pub async fn handle_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, AppError> {
    if query.state.as_deref() != Some(state.config.oauth_state.as_str()) {
        return Err(AuthError::StateMismatch.into());
    }
    if let Some(reason) = query.error {
        return Err(AuthError::ExchangeFailed(format!("authorization denied: {reason}")).into());
    }
    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AuthError::ExchangeFailed("missing authorization code".to_string()))?;

    let access_token = state.identity.exchange_code(&code).await?;
    let profile = state.identity.fetch_identity(&access_token).await?;
    let resolved = state.users.find_or_create(&profile).await?;

    let token = state.sessions.issue(&resolved.email)?;
    let cookie = state.sessions.session_cookie(&token)?;
    info!("User {} logged in", resolved.user_id);

    Ok((
        [(SET_COOKIE, cookie)],
        Json(LoginResponse {
            is_logged_in: true,
            user_id: resolved.user_id,
            user_info: profile,
        }),
    )
        .into_response())
}

/// POST /api/auth/logout
pub async fn handle_logout(State(state): State<AppState>) -> Result<Response, AppError> {
    let cleared = state.sessions.revoke()?;
    Ok((
        [(SET_COOKIE, cleared)],
        Json(serde_json::json!({ "success": true })),
    )
        .into_response())
}

/// GET /api/users/me
pub async fn handle_me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<User>, AppError> {
    let profile = state
        .users
        .profile(user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    debug!("Profile served for {}", user.email);
    Ok(Json(profile))
}
