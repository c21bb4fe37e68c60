//! Relational storage for users, email associations,
//! resume records, and analysis results.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::models::analysis::AnalysisRow;
use crate::models::resume::{NewResume, ResumeRow, ResumeStatus};
use crate::models::user::User;

pub mod postgres;

pub use postgres::PgMetadataRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("resume quota exceeded")]
    QuotaExceeded,

    #[error("a resume with this name already exists")]
    DuplicateName,

    #[error("database request timed out")]
    Timeout,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait MetadataRepository: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, RepositoryError>;

    /// Inserts a user together with its first email association in one
    /// transaction. Returns `None`, with nothing written, when the email is
    /// already associated with another user.
    async fn create_user(&self, user: &User, email: &str) -> Result<Option<Uuid>, RepositoryError>;

    /// Counts resumes that hold a quota slot: every row until it is removed.
    async fn count_active_resumes(&self, user_id: Uuid) -> Result<i64, RepositoryError>;

    async fn name_taken(
        &self,
        user_id: Uuid,
        name: &str,
        exclude: Option<Uuid>,
    ) -> Result<bool, RepositoryError>;

    /// Inserts a `pending` row. Quota and name uniqueness are checked
    /// atomically with the insert.
    async fn reserve_resume(&self, resume: &NewResume, quota: i64) -> Result<(), RepositoryError>;

    /// Moves a resume from `from` to `to`. Returns false if the row was not in `from`.
    async fn transition_resume(
        &self,
        resume_id: Uuid,
        from: ResumeStatus,
        to: ResumeStatus,
    ) -> Result<bool, RepositoryError>;

    /// Removes the row only while it is still in `status`.
    async fn delete_resume_row(
        &self,
        resume_id: Uuid,
        status: ResumeStatus,
    ) -> Result<bool, RepositoryError>;

    async fn list_live_resumes(&self, user_id: Uuid) -> Result<Vec<ResumeRow>, RepositoryError>;

    /// Matches on both id and owner; a foreign resume looks exactly like a missing one.
    async fn find_live_resume(
        &self,
        resume_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ResumeRow>, RepositoryError>;

    async fn update_resume_details(
        &self,
        resume_id: Uuid,
        user_id: Uuid,
        name: &str,
        description: &str,
    ) -> Result<bool, RepositoryError>;

    /// Pending and deleting rows whose status has not changed since `cutoff`.
    async fn stale_resumes(&self, cutoff: DateTime<Utc>) -> Result<Vec<ResumeRow>, RepositoryError>;

    async fn insert_analysis(
        &self,
        resume_id: Uuid,
        user_id: Uuid,
        payload: &Value,
    ) -> Result<AnalysisRow, RepositoryError>;
}
