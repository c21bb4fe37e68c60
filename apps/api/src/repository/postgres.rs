use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use super::{MetadataRepository, RepositoryError};
use crate::models::analysis::AnalysisRow;
use crate::models::resume::{NewResume, ResumeRow, ResumeStatus};
use crate::models::user::User;

const RESUME_NAME_KEY: &str = "resumes_user_name_key";

/// PostgreSQL-backed repository.
///
/// Every query borrows a connection from the pool for the duration of the
/// call only. Transactions roll back and return their connection when dropped,
/// so early returns through `?` never leak a connection.
#[derive(Clone)]
pub struct PgMetadataRepository {
    pool: PgPool,
    timeout: Duration,
}

impl PgMetadataRepository {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, RepositoryError>
    where
        F: Future<Output = Result<T, RepositoryError>> + Send,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| RepositoryError::Timeout)?
    }
}

fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("23505") && db.constraint() == Some(constraint),
        _ => false,
    }
}

fn map_name_conflict(err: sqlx::Error) -> RepositoryError {
    if is_unique_violation(&err, RESUME_NAME_KEY) {
        RepositoryError::DuplicateName
    } else {
        RepositoryError::Database(err)
    }
}

#[async_trait]
impl MetadataRepository for PgMetadataRepository {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        self.bounded(async {
            Ok(sqlx::query_as::<_, User>(
                r#"
                SELECT u.*
                FROM users u
                JOIN user_emails e ON e.user_id = u.id
                WHERE e.email = $1
                "#,
            )
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
        })
        .await
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, RepositoryError> {
        self.bounded(async {
            Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?)
        })
        .await
    }

    async fn create_user(&self, user: &User, email: &str) -> Result<Option<Uuid>, RepositoryError> {
        self.bounded(async {
            let mut tx = self.pool.begin().await?;

            sqlx::query(
                r#"
                INSERT INTO users
                    (id, subject, name, given_name, family_name, country, language, picture, email_verified)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(user.id)
            .bind(&user.subject)
            .bind(&user.name)
            .bind(&user.given_name)
            .bind(&user.family_name)
            .bind(&user.country)
            .bind(&user.language)
            .bind(&user.picture)
            .bind(user.email_verified)
            .execute(&mut *tx)
            .await?;

            // The unique email constraint decides concurrent first logins.
            let linked = sqlx::query(
                "INSERT INTO user_emails (user_id, email) VALUES ($1, $2) ON CONFLICT (email) DO NOTHING",
            )
            .bind(user.id)
            .bind(email)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if linked == 0 {
                tx.rollback().await?;
                debug!("Email already linked to another user; discarded new user {}", user.id);
                return Ok(None);
            }

            tx.commit().await?;
            info!("Created user {} ({})", user.id, user.subject);
            Ok(Some(user.id))
        })
        .await
    }

    async fn count_active_resumes(&self, user_id: Uuid) -> Result<i64, RepositoryError> {
        self.bounded(async {
            Ok(sqlx::query_scalar(
                "SELECT COUNT(*) FROM resumes WHERE user_id = $1",
            )
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?)
        })
        .await
    }

    async fn name_taken(
        &self,
        user_id: Uuid,
        name: &str,
        exclude: Option<Uuid>,
    ) -> Result<bool, RepositoryError> {
        self.bounded(async {
            Ok(sqlx::query_scalar(
                r#"
                SELECT EXISTS (
                    SELECT 1 FROM resumes
                    WHERE user_id = $1
                      AND name = $2
                      AND ($3::uuid IS NULL OR resume_id <> $3)
                )
                "#,
            )
            .bind(user_id)
            .bind(name)
            .bind(exclude)
            .fetch_one(&self.pool)
            .await?)
        })
        .await
    }

    async fn reserve_resume(&self, resume: &NewResume, quota: i64) -> Result<(), RepositoryError> {
        self.bounded(async {
            let mut tx = self.pool.begin().await?;

            // Serializes reservations per user so the count below cannot go stale
            // before the insert commits.
            sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
                .bind(resume.user_id)
                .fetch_one(&mut *tx)
                .await?;

            let active: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM resumes WHERE user_id = $1",
            )
            .bind(resume.user_id)
            .fetch_one(&mut *tx)
            .await?;

            if active >= quota {
                return Err(RepositoryError::QuotaExceeded);
            }

            sqlx::query(
                r#"
                INSERT INTO resumes
                    (resume_id, user_id, storage_key, name, description, content_type, size_bytes, status)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(resume.resume_id)
            .bind(resume.user_id)
            .bind(&resume.storage_key)
            .bind(&resume.name)
            .bind(&resume.description)
            .bind(&resume.content_type)
            .bind(resume.size_bytes)
            .bind(ResumeStatus::Pending)
            .execute(&mut *tx)
            .await
            .map_err(map_name_conflict)?;

            tx.commit().await?;
            Ok(())
        })
        .await
    }

    async fn transition_resume(
        &self,
        resume_id: Uuid,
        from: ResumeStatus,
        to: ResumeStatus,
    ) -> Result<bool, RepositoryError> {
        self.bounded(async {
            let updated = sqlx::query(
                r#"
                UPDATE resumes
                SET status = $3, status_changed_at = NOW()
                WHERE resume_id = $1 AND status = $2
                "#,
            )
            .bind(resume_id)
            .bind(from)
            .bind(to)
            .execute(&self.pool)
            .await?
            .rows_affected();
            Ok(updated == 1)
        })
        .await
    }

    async fn delete_resume_row(
        &self,
        resume_id: Uuid,
        status: ResumeStatus,
    ) -> Result<bool, RepositoryError> {
        self.bounded(async {
            let deleted = sqlx::query("DELETE FROM resumes WHERE resume_id = $1 AND status = $2")
                .bind(resume_id)
                .bind(status)
                .execute(&self.pool)
                .await?
                .rows_affected();
            Ok(deleted == 1)
        })
        .await
    }

    async fn list_live_resumes(&self, user_id: Uuid) -> Result<Vec<ResumeRow>, RepositoryError> {
        self.bounded(async {
            Ok(sqlx::query_as::<_, ResumeRow>(
                "SELECT * FROM resumes WHERE user_id = $1 AND status = 'live' ORDER BY upload_date DESC",
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
        })
        .await
    }

    async fn find_live_resume(
        &self,
        resume_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ResumeRow>, RepositoryError> {
        self.bounded(async {
            Ok(sqlx::query_as::<_, ResumeRow>(
                "SELECT * FROM resumes WHERE resume_id = $1 AND user_id = $2 AND status = 'live'",
            )
            .bind(resume_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
        })
        .await
    }

    async fn update_resume_details(
        &self,
        resume_id: Uuid,
        user_id: Uuid,
        name: &str,
        description: &str,
    ) -> Result<bool, RepositoryError> {
        self.bounded(async {
            let updated = sqlx::query(
                r#"
                UPDATE resumes
                SET name = $3, description = $4
                WHERE resume_id = $1 AND user_id = $2 AND status = 'live'
                "#,
            )
            .bind(resume_id)
            .bind(user_id)
            .bind(name)
            .bind(description)
            .execute(&self.pool)
            .await
            .map_err(map_name_conflict)?
            .rows_affected();
            Ok(updated == 1)
        })
        .await
    }

    async fn stale_resumes(&self, cutoff: DateTime<Utc>) -> Result<Vec<ResumeRow>, RepositoryError> {
        self.bounded(async {
            Ok(sqlx::query_as::<_, ResumeRow>(
                r#"
                SELECT * FROM resumes
                WHERE status IN ('pending', 'deleting') AND status_changed_at < $1
                ORDER BY status_changed_at
                "#,
            )
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?)
        })
        .await
    }

    async fn insert_analysis(
        &self,
        resume_id: Uuid,
        user_id: Uuid,
        payload: &Value,
    ) -> Result<AnalysisRow, RepositoryError> {
        self.bounded(async {
            Ok(sqlx::query_as::<_, AnalysisRow>(
                r#"
                INSERT INTO resume_analysis (id, resume_id, user_id, payload)
                VALUES ($1, $2, $3, $4)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(resume_id)
            .bind(user_id)
            .bind(payload)
            .fetch_one(&self.pool)
            .await?)
        })
        .await
    }
}
