use std::fmt::Write;

use thiserror::Error;

use crate::csv_import::models::{ImportResult, ValidationResult};

/// Validation errors shown before the list is expanded.
pub const COLLAPSED_ERROR_LIMIT: usize = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PresentError {
    #[error("Inconsistent report: {valid} valid + {errors} error rows != {total} total rows")]
    InconsistentCounts {
        valid: usize,
        errors: usize,
        total: usize,
    },
}

/// Text rendering of a validation report. Refuses reports whose row counts do not add up.
pub fn render_validation(
    report: &ValidationResult,
    expanded: bool,
) -> Result<String, PresentError> {
    if !report.counts_consistent() {
        return Err(PresentError::InconsistentCounts {
            valid: report.valid_rows,
            errors: report.error_rows,
            total: report.total_rows,
        });
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "Total: {}  Valid: {}  Errors: {}  Duplicates: {}",
        report.total_rows,
        report.valid_rows,
        report.error_rows,
        report.duplicate_emails.len()
    );

    if !report.errors.is_empty() {
        let shown = if expanded {
            report.errors.len()
        } else {
            report.errors.len().min(COLLAPSED_ERROR_LIMIT)
        };
        let _ = writeln!(out, "Validation errors:");
        for error in &report.errors[..shown] {
            let _ = writeln!(out, "  Row {} [{}]: {}", error.row, error.field, error.message);
        }
        let hidden = report.errors.len() - shown;
        if hidden > 0 {
            let _ = writeln!(out, "  ... and {hidden} more");
        }
    }

    if !report.duplicate_emails.is_empty() {
        let _ = writeln!(
            out,
            "Already registered: {}",
            report.duplicate_emails.join(", ")
        );
    }

    if !report.sample_valid_rows.is_empty() {
        let _ = writeln!(out, "Sample valid rows:");
        for talent in &report.sample_valid_rows {
            let _ = writeln!(
                out,
                "  {} {} <{}> - {}",
                talent.first_name, talent.last_name, talent.email, talent.title
            );
        }
    }

    Ok(out)
}

pub fn render_import(result: &ImportResult) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Total: {}  Successful: {}  Failed: {}  Skipped: {}",
        result.total_rows,
        result.successful_rows,
        result.failed_rows,
        result.summary.duplicates_skipped
    );
    let _ = writeln!(
        out,
        "Users created: {}  Profiles created: {}  Skills linked: {}",
        result.summary.users_created, result.summary.profiles_created, result.summary.skills_linked
    );

    let mut failures = result.failures().peekable();
    if failures.peek().is_some() {
        let _ = writeln!(out, "Failed rows:");
        for failure in failures {
            let _ = writeln!(
                out,
                "  Row {}: {}",
                failure.row_index + 1,
                failure.error.as_deref().unwrap_or("Unknown error")
            );
        }
    }
    let _ = writeln!(out, "Request: {}", result.request_id);
    out
}
