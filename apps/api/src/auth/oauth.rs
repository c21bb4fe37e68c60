//! Trades an authorization code for an access token, and the access token
//! for the caller's identity profile.
//!
//! Transport errors, 429 and 5xx responses are retried with exponential
//! backoff. Any other non-success response is final.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use super::AuthError;
use crate::config::Config;
use crate::models::user::Profile;

const MAX_RETRIES: u32 = 3;
const BACKOFF_BASE_MS: u64 = 250;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn exchange_code(&self, code: &str) -> Result<String, AuthError>;

    async fn fetch_identity(&self, access_token: &str) -> Result<Profile, AuthError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

/// Failure of a single logical request after retries.
#[derive(Debug)]
enum SendError {
    Timeout,
    Transport(String),
    Status { status: u16, body: String },
}

impl SendError {
    fn describe(self) -> String {
        match self {
            SendError::Timeout => "request timed out".to_string(),
            SendError::Transport(msg) => msg,
            SendError::Status { status, body } => format!("provider returned {status}: {body}"),
        }
    }
}

/// LinkedIn (OpenID Connect userinfo) identity provider.
#[derive(Clone)]
pub struct LinkedInProvider {
    client: Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    token_url: String,
    userinfo_url: String,
}

impl LinkedInProvider {
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Client::builder().timeout(config.outbound_timeout).build()?;
        Ok(Self {
            client,
            client_id: config.oauth_client_id.clone(),
            client_secret: config.oauth_client_secret.clone(),
            redirect_uri: config.oauth_redirect_uri.clone(),
            token_url: config.oauth_token_url.clone(),
            userinfo_url: config.oauth_userinfo_url.clone(),
        })
    }

    async fn send_with_retry<F>(&self, build: F) -> Result<Response, SendError>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let mut last_error = SendError::Transport("no attempt made".to_string());

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = backoff_delay(attempt);
                warn!(
                    "Identity provider attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match build().send().await {
                Ok(r) => r,
                Err(e) if e.is_timeout() => {
                    last_error = SendError::Timeout;
                    continue;
                }
                Err(e) => {
                    last_error = SendError::Transport(e.to_string());
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            let body = response.text().await.unwrap_or_default();
            let error = SendError::Status {
                status: status.as_u16(),
                body,
            };
            if !is_retryable(status) {
                return Err(error);
            }
            warn!("Identity provider returned {status}");
            last_error = error;
        }

        Err(last_error)
    }
}

#[async_trait]
impl IdentityProvider for LinkedInProvider {
    async fn exchange_code(&self, code: &str) -> Result<String, AuthError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let response = self
            .send_with_retry(|| self.client.post(&self.token_url).form(&params))
            .await
            .map_err(|e| match e {
                SendError::Timeout => AuthError::Timeout,
                other => AuthError::ExchangeFailed(other.describe()),
            })?;

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::ExchangeFailed(format!("unreadable token response: {e}")))?;

        let token = access_token_from(body)?;
        debug!("Exchanged authorization code for access token");
        Ok(token)
    }

    async fn fetch_identity(&self, access_token: &str) -> Result<Profile, AuthError> {
        let response = self
            .send_with_retry(|| self.client.get(&self.userinfo_url).bearer_auth(access_token))
            .await
            .map_err(|e| match e {
                SendError::Timeout => AuthError::Timeout,
                other => AuthError::IdentityFetchFailed(other.describe()),
            })?;

        response
            .json::<Profile>()
            .await
            .map_err(|e| AuthError::IdentityFetchFailed(format!("unreadable profile: {e}")))
    }
}

fn access_token_from(body: TokenResponse) -> Result<String, AuthError> {
    body.access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthError::ExchangeFailed("response did not include an access token".to_string()))
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// 250ms, 500ms, 1s, ...
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(BACKOFF_BASE_MS * (1 << (attempt - 1)))
}
