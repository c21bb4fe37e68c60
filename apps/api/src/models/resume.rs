use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Maximum number of active resumes a single user may hold.
pub const RESUME_QUOTA: i64 = 5;

/// Lifecycle marker for a resume row.
///
/// `Pending` rows are reserved before the blob write and become `Live` once it
/// lands. `Deleting` rows are hidden from the owner and wait for their blob and
/// row to be removed. Rows in every state keep their quota slot and name until
/// the row itself is gone, so a withdrawn delete can always restore to `Live`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "resume_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ResumeStatus {
    Pending,
    Live,
    Deleting,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeRow {
    pub resume_id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing)]
    pub storage_key: String,
    pub name: String,
    pub description: String,
    pub content_type: String,
    pub size_bytes: i64,
    #[serde(skip_serializing)]
    pub status: ResumeStatus,
    pub upload_date: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub status_changed_at: DateTime<Utc>,
}

/// Values for a freshly reserved resume row.
#[derive(Debug, Clone)]
pub struct NewResume {
    pub resume_id: Uuid,
    pub user_id: Uuid,
    pub storage_key: String,
    pub name: String,
    pub description: String,
    pub content_type: String,
    pub size_bytes: i64,
}
