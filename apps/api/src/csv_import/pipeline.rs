use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::csv_import::dedup::{existing_duplicates, flag_in_file_duplicates};
use crate::csv_import::models::{
    CsvTalentRow, ImportResult, ImportSummary, RowError, RowResult, ValidationResult,
};
use crate::csv_import::parser::parse_csv;
use crate::csv_import::store::{NewImportRun, TalentStore};
use crate::csv_import::validation::validate_row;
use crate::csv_import::SAMPLE_ROW_LIMIT;
use crate::errors::AppError;

#[derive(Debug, Clone)]
pub enum RowOutcome {
    Valid(CsvTalentRow),
    Invalid(Vec<RowError>),
}

/// A data row after parsing, field validation and in-file duplicate detection.
#[derive(Debug, Clone)]
pub struct CheckedRow {
    pub index: usize,
    pub outcome: RowOutcome,
}

impl CheckedRow {
    pub fn talent(&self) -> Option<&CsvTalentRow> {
        match &self.outcome {
            RowOutcome::Valid(talent) => Some(talent),
            RowOutcome::Invalid(_) => None,
        }
    }
}

/// Parses and validates every row of an uploaded file. Touches no storage.
pub fn check_rows(bytes: &[u8]) -> Result<Vec<CheckedRow>, AppError> {
    let mut rows: Vec<CheckedRow> = parse_csv(bytes)?
        .iter()
        .map(|raw| CheckedRow {
            index: raw.index,
            outcome: match validate_row(raw) {
                Ok(talent) => RowOutcome::Valid(talent),
                Err(errors) => RowOutcome::Invalid(errors),
            },
        })
        .collect();
    flag_in_file_duplicates(&mut rows);
    Ok(rows)
}

fn valid_emails(rows: &[CheckedRow]) -> Vec<String> {
    rows.iter()
        .filter_map(CheckedRow::talent)
        .map(|t| t.email.clone())
        .collect()
}

/// Builds the validation report for a file without persisting anything.
pub async fn validate_csv(
    bytes: &[u8],
    store: &dyn TalentStore,
) -> Result<ValidationResult, AppError> {
    let rows = check_rows(bytes)?;

    let emails = valid_emails(&rows);
    let existing = store.existing_emails(&emails).await?;
    let duplicate_emails = existing_duplicates(emails.iter().map(String::as_str), &existing);

    let total_rows = rows.len();
    let mut errors = Vec::new();
    let mut sample_valid_rows = Vec::new();
    let mut valid_rows = 0;
    for row in rows {
        match row.outcome {
            RowOutcome::Valid(talent) => {
                valid_rows += 1;
                if sample_valid_rows.len() < SAMPLE_ROW_LIMIT {
                    sample_valid_rows.push(talent);
                }
            }
            RowOutcome::Invalid(row_errors) => errors.extend(row_errors),
        }
    }
    let error_rows = total_rows - valid_rows;

    info!(
        "Validated CSV: {total_rows} rows, {valid_rows} valid, {error_rows} with errors, {} existing emails",
        duplicate_emails.len()
    );

    Ok(ValidationResult {
        success: error_rows == 0 && total_rows > 0,
        total_rows,
        valid_rows,
        error_rows,
        errors,
        duplicate_emails,
        sample_valid_rows,
    })
}

/// Re-validates and persists a file row by row.
///
/// Rows are independent: a failing row is reported and the next one is still
/// attempted. With `skip_duplicate_emails`, rows whose email already exists are
/// left out and counted in `summary.duplicates_skipped`.
pub async fn import_csv(
    bytes: &[u8],
    skip_duplicate_emails: bool,
    store: &dyn TalentStore,
) -> Result<ImportResult, AppError> {
    let request_id = Uuid::new_v4();
    let span = info_span!("csv_import", request_id = %request_id);
    run_import(bytes, skip_duplicate_emails, store, request_id)
        .instrument(span)
        .await
}

async fn run_import(
    bytes: &[u8],
    skip_duplicate_emails: bool,
    store: &dyn TalentStore,
    request_id: Uuid,
) -> Result<ImportResult, AppError> {
    let rows = check_rows(bytes)?;
    let total_rows = rows.len();
    info!("Importing {total_rows} rows (skip duplicate emails: {skip_duplicate_emails})");

    let existing = if skip_duplicate_emails {
        store.existing_emails(&valid_emails(&rows)).await?
    } else {
        Default::default()
    };

    let mut results = Vec::with_capacity(total_rows);
    let mut summary = ImportSummary::default();

    for row in rows {
        let result = match row.outcome {
            RowOutcome::Invalid(errors) => {
                let message = errors
                    .iter()
                    .map(|e| format!("{}: {}", e.field, e.message))
                    .collect::<Vec<_>>()
                    .join("; ");
                warn!("Row {} rejected: {message}", row.index + 1);
                RowResult {
                    row_index: row.index,
                    success: false,
                    error: Some(message),
                    skipped: false,
                }
            }
            RowOutcome::Valid(talent) if existing.contains(&talent.email) => {
                summary.duplicates_skipped += 1;
                RowResult {
                    row_index: row.index,
                    success: false,
                    error: Some(format!("Skipped: {} already exists", talent.email)),
                    skipped: true,
                }
            }
            RowOutcome::Valid(talent) => match store.create_talent(&talent).await {
                Ok(created) => {
                    summary.users_created += 1;
                    summary.profiles_created += 1;
                    summary.skills_linked += created.skills_linked;
                    RowResult {
                        row_index: row.index,
                        success: true,
                        error: None,
                        skipped: false,
                    }
                }
                Err(AppError::Conflict(message)) => {
                    warn!("Row {} conflicts: {message}", row.index + 1);
                    RowResult {
                        row_index: row.index,
                        success: false,
                        error: Some(message),
                        skipped: false,
                    }
                }
                Err(e) => {
                    error!("Row {} could not be saved: {e}", row.index + 1);
                    RowResult {
                        row_index: row.index,
                        success: false,
                        error: Some("Failed to save talent".to_string()),
                        skipped: false,
                    }
                }
            },
        };
        results.push(result);
    }

    let successful_rows = results.iter().filter(|r| r.success).count();
    let failed_rows = results.iter().filter(|r| !r.success && !r.skipped).count();
    summary.errors = failed_rows;

    info!(
        "Import finished: {successful_rows} created, {failed_rows} failed, {} skipped",
        summary.duplicates_skipped
    );

    let run = NewImportRun {
        request_id,
        total_rows,
        successful_rows,
        failed_rows,
        duplicates_skipped: summary.duplicates_skipped,
        skip_duplicate_emails,
    };
    if let Err(e) = store.record_import_run(&run).await {
        warn!("Failed to record import run: {e}");
    }

    Ok(ImportResult {
        total_rows,
        successful_rows,
        failed_rows,
        request_id,
        results,
        summary,
    })
}
