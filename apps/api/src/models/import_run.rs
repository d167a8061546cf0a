use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Audit record of one completed CSV import request.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ImportRunRow {
    pub request_id: Uuid,
    pub total_rows: i32,
    pub successful_rows: i32,
    pub failed_rows: i32,
    pub duplicates_skipped: i32,
    pub skip_duplicate_emails: bool,
    pub created_at: DateTime<Utc>,
}
