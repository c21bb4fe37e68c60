//! Signed session credentials.
//!
//! The credential is an HS256 JWT carrying the verified email. It is handed to
//! the browser as the http-only `token` cookie; API clients may send it as a
//! bearer token instead. There is no server-side session record.

use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::AuthError;

/// Name of the cookie holding the session credential.
pub const SESSION_COOKIE: &str = "token";
/// Session lifetime: one hour.
pub const SESSION_TTL_SECS: i64 = 3600;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub email: String,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiration (unix timestamp).
    pub exp: i64,
}

#[derive(Clone)]
pub struct SessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    secure_cookies: bool,
}

impl SessionIssuer {
    pub fn new(secret: &str, secure_cookies: bool) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against an explicit clock in `validate_at`.
        validation.validate_exp = false;
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            secure_cookies,
        }
    }

    pub fn issue(&self, email: &str) -> Result<String, AuthError> {
        self.issue_at(email, Utc::now())
    }

    pub fn issue_at(&self, email: &str, now: DateTime<Utc>) -> Result<String, AuthError> {
        let iat = now.timestamp();
        let claims = Claims {
            email: email.to_string(),
            iat,
            exp: iat + SESSION_TTL_SECS,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        self.validate_at(token, Utc::now())
    }

    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, AuthError> {
        if token.is_empty() {
            return Err(AuthError::Missing);
        }

        let claims = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidSignature,
            })?;

        if now.timestamp() >= claims.exp {
            return Err(AuthError::Expired);
        }
        Ok(claims)
    }

    /// Validates the credential carried by a request, rejecting when absent.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Claims, AuthError> {
        let token = token_from_headers(headers).ok_or(AuthError::Missing)?;
        self.validate(&token)
    }

    /// Predicate form of `authenticate`: `None` for absent or invalid credentials.
    pub fn session_from_headers(&self, headers: &HeaderMap) -> Option<Claims> {
        self.authenticate(headers).ok()
    }

    /// `Set-Cookie` value that hands the credential to the browser.
    pub fn session_cookie(&self, token: &str) -> Result<HeaderValue, AuthError> {
        self.cookie(token, SESSION_TTL_SECS)
    }

    /// `Set-Cookie` value that clears the client-held credential.
    pub fn revoke(&self) -> Result<HeaderValue, AuthError> {
        self.cookie("", 0)
    }

    fn cookie(&self, value: &str, max_age: i64) -> Result<HeaderValue, AuthError> {
        let mut cookie =
            format!("{SESSION_COOKIE}={value}; HttpOnly; Path=/; SameSite=Lax; Max-Age={max_age}");
        if self.secure_cookies {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie).map_err(|e| AuthError::Signing(e.to_string()))
    }
}

/// Reads the credential from the `token` cookie, falling back to a bearer header.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|v| !v.is_empty());

    from_cookie.or_else(|| {
        headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    })
}
