use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Result returned by the external scoring service, stored verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AnalysisRow {
    pub id: Uuid,
    pub resume_id: Uuid,
    pub user_id: Uuid,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}
