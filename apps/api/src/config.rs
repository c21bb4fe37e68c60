use std::time::Duration;

use anyhow::{Context, Result};

const DEFAULT_TOKEN_URL: &str = "https://www.linkedin.com/oauth/v2/accessToken";
const DEFAULT_USERINFO_URL: &str = "https://api.linkedin.com/v2/userinfo";
const DEFAULT_REDIRECT_URI: &str = "http://localhost:3000/api/auth/callback";
const DEFAULT_SCORING_URL: &str = "http://localhost:5000/resume/parse";

/// Application configuration loaded from environment variables.
/// Built once at startup and handed to every component through `AppState`.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub s3_bucket: String,
    /// Custom endpoint for MinIO or other S3-compatible stores. `None` means AWS.
    pub s3_endpoint: Option<String>,
    pub aws_region: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub oauth_client_id: String,
    pub oauth_client_secret: String,
    pub oauth_redirect_uri: String,
    pub oauth_token_url: String,
    pub oauth_userinfo_url: String,
    /// Expected `state` value echoed back by the identity provider.
    pub oauth_state: String,
    pub jwt_secret: String,
    pub scoring_url: String,
    pub secure_cookies: bool,
    pub outbound_timeout: Duration,
    pub max_upload_bytes: usize,
    pub sweep_interval: Duration,
    pub pending_grace: Duration,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. `from_env` is the
    /// production entry point; tests feed a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &str| {
            lookup(key).with_context(|| format!("Required environment variable '{key}' is not set"))
        };
        let or_default = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Config {
            database_url: require("DATABASE_URL")?,
            s3_bucket: require("S3_BUCKET")?,
            s3_endpoint: lookup("S3_ENDPOINT").filter(|v| !v.is_empty()),
            aws_region: or_default("AWS_REGION", "us-west-1"),
            aws_access_key_id: require("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require("AWS_SECRET_ACCESS_KEY")?,
            oauth_client_id: require("OAUTH_CLIENT_ID")?,
            oauth_client_secret: require("OAUTH_CLIENT_SECRET")?,
            oauth_redirect_uri: or_default("OAUTH_REDIRECT_URI", DEFAULT_REDIRECT_URI),
            oauth_token_url: or_default("OAUTH_TOKEN_URL", DEFAULT_TOKEN_URL),
            oauth_userinfo_url: or_default("OAUTH_USERINFO_URL", DEFAULT_USERINFO_URL),
            oauth_state: or_default("OAUTH_STATE", "GUEST"),
            jwt_secret: require("JWT_SECRET")?,
            scoring_url: or_default("SCORING_SERVICE_URL", DEFAULT_SCORING_URL),
            secure_cookies: parse_or("SECURE_COOKIES", &lookup, false)?,
            outbound_timeout: Duration::from_secs(parse_or("OUTBOUND_TIMEOUT_SECS", &lookup, 10)?),
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", &lookup, 10 * 1024 * 1024)?,
            sweep_interval: Duration::from_secs(parse_or("SWEEP_INTERVAL_SECS", &lookup, 300)?),
            pending_grace: Duration::from_secs(parse_or("PENDING_GRACE_SECS", &lookup, 900)?),
            port: parse_or("PORT", &lookup, 3000)?,
            rust_log: or_default("RUST_LOG", "info"),
        })
    }
}

fn parse_or<T, F>(key: &str, lookup: &F, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        None => Ok(default),
    }
}
