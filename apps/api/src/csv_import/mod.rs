//! Bulk talent import from CSV: parse, validate, detect duplicates, persist.

pub mod dedup;
pub mod handlers;
pub mod memory_store;
pub mod models;
pub mod parser;
pub mod pg_store;
pub mod pipeline;
pub mod store;
pub mod template;
pub mod validation;

/// Upload size limit shared by the server and the client-side file selector.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// MIME types accepted for the `csvFile` field. Spreadsheet tools often label CSV as Excel.
pub const ACCEPTED_MIME_TYPES: &[&str] = &["text/csv", "application/vnd.ms-excel"];

pub const CSV_EXTENSION: &str = ".csv";

/// Number of valid rows echoed back by a validation request.
pub const SAMPLE_ROW_LIMIT: usize = 5;

/// Returns true when a file's declared type or name marks it as CSV.
pub fn is_accepted_csv(file_name: Option<&str>, mime: Option<&str>) -> bool {
    let mime_ok = mime
        .map(|m| m.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
        .is_some_and(|m| ACCEPTED_MIME_TYPES.contains(&m.as_str()));
    let name_ok = file_name.is_some_and(|n| n.to_ascii_lowercase().ends_with(CSV_EXTENSION));
    mime_ok || name_ok
}
