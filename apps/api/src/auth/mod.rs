//! Authentication: OAuth code exchange, user resolution, and session credentials.
//!
//! Flow: `IdentityProvider` (code → token → profile) → `UserDirectory`
//! (profile → user id) → `SessionIssuer` (email → signed cookie). Every
//! protected route then goes through the `AuthenticatedUser` extractor.

use thiserror::Error;

pub mod directory;
pub mod extractor;
pub mod oauth;
pub mod session;

pub use directory::UserDirectory;
pub use extractor::AuthenticatedUser;
pub use oauth::{IdentityProvider, LinkedInProvider};
pub use session::SessionIssuer;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no session credential was presented")]
    Missing,

    #[error("session credential is invalid")]
    InvalidSignature,

    #[error("session credential has expired")]
    Expired,

    #[error("authorization code exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("identity fetch failed: {0}")]
    IdentityFetchFailed(String),

    #[error("OAuth state mismatch")]
    StateMismatch,

    #[error("identity provider did not return a verified email")]
    EmailNotVerified,

    #[error("no user is registered for this session")]
    UnknownUser,

    #[error("identity provider request timed out")]
    Timeout,

    #[error("failed to sign session credential: {0}")]
    Signing(String),
}
