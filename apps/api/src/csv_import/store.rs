use std::collections::HashSet;

use async_trait::async_trait;
use uuid::Uuid;

use crate::csv_import::models::CsvTalentRow;
use crate::errors::AppError;
use crate::models::import_run::ImportRunRow;

/// Identifiers produced by persisting one imported talent.
#[derive(Debug, Clone)]
pub struct CreatedTalent {
    pub user_id: Uuid,
    pub profile_id: Uuid,
    pub skills_linked: usize,
}

#[derive(Debug, Clone)]
pub struct NewImportRun {
    pub request_id: Uuid,
    pub total_rows: usize,
    pub successful_rows: usize,
    pub failed_rows: usize,
    pub duplicates_skipped: usize,
    pub skip_duplicate_emails: bool,
}

/// Persistence seam for the import pipeline.
///
/// `create_talent` must be atomic per talent: the user, its profile and its
/// skill links are all written or none are. An email that already exists fails
/// with `AppError::Conflict`.
#[async_trait]
pub trait TalentStore: Send + Sync {
    /// Returns the subset of `emails` that already belong to a user.
    async fn existing_emails(&self, emails: &[String]) -> Result<HashSet<String>, AppError>;

    async fn create_talent(&self, talent: &CsvTalentRow) -> Result<CreatedTalent, AppError>;

    async fn record_import_run(&self, run: &NewImportRun) -> Result<(), AppError>;

    /// Most recent runs first.
    async fn recent_import_runs(&self, limit: usize) -> Result<Vec<ImportRunRow>, AppError>;
}

pub(crate) fn duplicate_email_conflict(email: &str) -> AppError {
    AppError::Conflict(format!("A user with email {email} already exists"))
}

/// Slug used to match skills regardless of case and spacing.
pub(crate) fn skill_slug(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

pub(crate) fn to_db_count(count: usize) -> i32 {
    i32::try_from(count).unwrap_or(i32::MAX)
}
