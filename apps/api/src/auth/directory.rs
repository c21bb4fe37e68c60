use std::sync::Arc;

use anyhow::anyhow;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::AuthError;
use crate::errors::AppError;
use crate::models::user::{Profile, User};
use crate::repository::MetadataRepository;

/// A verified identity mapped onto an internal user.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedUser {
    pub user_id: Uuid,
    pub email: String,
}

/// Sole writer of user and email-association records.
#[derive(Clone)]
pub struct UserDirectory {
    repo: Arc<dyn MetadataRepository>,
}

impl UserDirectory {
    pub fn new(repo: Arc<dyn MetadataRepository>) -> Self {
        Self { repo }
    }

    /// Returns the user owning the profile's verified email, creating the user
    /// on first login. Safe under concurrent first logins for the same email:
    /// the loser of the insert race re-reads the winner's row.
    pub async fn find_or_create(&self, profile: &Profile) -> Result<ResolvedUser, AppError> {
        let email = verified_email(profile)?;

        if let Some(user) = self.repo.find_user_by_email(&email).await? {
            return Ok(ResolvedUser {
                user_id: user.id,
                email,
            });
        }

        let user = User {
            id: Uuid::new_v4(),
            subject: profile.sub.clone(),
            name: profile.name.trim().to_string(),
            given_name: profile.given_name.clone(),
            family_name: profile.family_name.clone(),
            country: profile.locale.country.clone(),
            language: profile.locale.language.clone(),
            picture: profile.picture.clone(),
            email_verified: profile.email_verified,
            created_at: Utc::now(),
        };

        let user_id = match self.repo.create_user(&user, &email).await? {
            Some(id) => {
                info!("Registered new user {id} on first login");
                id
            }
            None => self
                .repo
                .find_user_by_email(&email)
                .await?
                .map(|existing| existing.id)
                .ok_or_else(|| anyhow!("email association vanished after insert conflict"))?,
        };

        Ok(ResolvedUser { user_id, email })
    }

    /// Resolves a session's email to its user.
    pub async fn lookup(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.repo.find_user_by_email(&normalize_email(email)).await?)
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.repo.find_user(user_id).await?)
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn verified_email(profile: &Profile) -> Result<String, AuthError> {
    profile
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|e| !e.is_empty() && profile.email_verified)
        .ok_or(AuthError::EmailNotVerified)
}
