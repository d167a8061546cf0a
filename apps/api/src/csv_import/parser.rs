use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CsvFormatError {
    #[error("CSV file is empty")]
    Empty,

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<&'static str>),

    #[error("Could not read CSV header: {0}")]
    Header(#[from] csv::Error),
}

/// Columns understood by the importer, in template order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    FirstName,
    LastName,
    Email,
    Title,
    Bio,
    Location,
    Phone,
    HourlyRate,
    Currency,
    Languages,
    Timezone,
    Skills,
}

impl Column {
    pub const ALL: [Column; 12] = [
        Column::FirstName,
        Column::LastName,
        Column::Email,
        Column::Title,
        Column::Bio,
        Column::Location,
        Column::Phone,
        Column::HourlyRate,
        Column::Currency,
        Column::Languages,
        Column::Timezone,
        Column::Skills,
    ];

    /// Canonical header name, also used as the `field` of row errors.
    pub fn header(self) -> &'static str {
        match self {
            Column::FirstName => "firstName",
            Column::LastName => "lastName",
            Column::Email => "email",
            Column::Title => "title",
            Column::Bio => "bio",
            Column::Location => "location",
            Column::Phone => "phone",
            Column::HourlyRate => "hourlyRate",
            Column::Currency => "currency",
            Column::Languages => "languages",
            Column::Timezone => "timezone",
            Column::Skills => "skills",
        }
    }

    pub fn is_required(self) -> bool {
        matches!(
            self,
            Column::FirstName | Column::LastName | Column::Email | Column::Title | Column::Bio
        )
    }

    /// Matches a header cell ignoring case, spaces, `_` and `-`.
    pub fn from_header(raw: &str) -> Option<Self> {
        let key: String = raw
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .flat_map(char::to_lowercase)
            .collect();
        let column = match key.as_str() {
            "firstname" | "first" | "givenname" => Column::FirstName,
            "lastname" | "last" | "surname" | "familyname" => Column::LastName,
            "email" | "emailaddress" => Column::Email,
            "title" | "jobtitle" | "headline" => Column::Title,
            "bio" | "about" | "summary" => Column::Bio,
            "location" | "city" => Column::Location,
            "phone" | "phonenumber" => Column::Phone,
            "hourlyrate" | "rate" => Column::HourlyRate,
            "currency" => Column::Currency,
            "languages" | "language" => Column::Languages,
            "timezone" | "tz" => Column::Timezone,
            "skills" | "skill" => Column::Skills,
            _ => return None,
        };
        Some(column)
    }
}

/// One data record as read from the file, before validation.
#[derive(Debug, Clone, Default)]
pub struct RawRow {
    /// 0-based position among the file's data records.
    pub index: usize,
    values: HashMap<Column, String>,
    /// Set when the record itself could not be decoded.
    pub read_error: Option<String>,
}

impl RawRow {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            ..Default::default()
        }
    }

    pub fn with(mut self, column: Column, value: &str) -> Self {
        self.values.insert(column, value.to_string());
        self
    }

    /// 1-based row number as shown to users.
    pub fn number(&self) -> usize {
        self.index + 1
    }

    /// Trimmed value of a column, `None` when absent or blank.
    pub fn get(&self, column: Column) -> Option<&str> {
        self.values
            .get(&column)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn is_blank(&self) -> bool {
        self.read_error.is_none() && self.values.values().all(|v| v.trim().is_empty())
    }
}

/// Reads every data row of an uploaded CSV file.
///
/// Fails only when the file as a whole is unusable (no header, required columns
/// missing). Records that cannot be decoded are returned with `read_error` set so
/// they count as error rows instead of disappearing. Rows with every cell blank
/// are dropped.
pub fn parse_csv(bytes: &[u8]) -> Result<Vec<RawRow>, CsvFormatError> {
    // Strip UTF-8 BOM if present
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers = reader.headers()?.clone();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(CsvFormatError::Empty);
    }

    let mut positions: Vec<(usize, Column)> = Vec::new();
    for (position, header) in headers.iter().enumerate() {
        match Column::from_header(header) {
            Some(column) if !positions.iter().any(|(_, c)| *c == column) => {
                positions.push((position, column))
            }
            Some(_) => debug!("Ignoring repeated CSV column '{header}'"),
            None => debug!("Ignoring unknown CSV column '{header}'"),
        }
    }

    let missing: Vec<&'static str> = Column::ALL
        .iter()
        .filter(|c| c.is_required() && !positions.iter().any(|(_, p)| p == *c))
        .map(|c| c.header())
        .collect();
    if !missing.is_empty() {
        return Err(CsvFormatError::MissingColumns(missing));
    }

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let mut row = RawRow::new(index);
        match record {
            Ok(record) => {
                for (position, column) in &positions {
                    if let Some(value) = record.get(*position) {
                        row.values.insert(*column, value.to_string());
                    }
                }
            }
            Err(e) => row.read_error = Some(e.to_string()),
        }
        if !row.is_blank() {
            rows.push(row);
        }
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "firstName,lastName,email,title,bio";

    #[test]
    fn test_header_aliases() {
        assert_eq!(Column::from_header("First Name"), Some(Column::FirstName));
        assert_eq!(Column::from_header("last_name"), Some(Column::LastName));
        assert_eq!(Column::from_header("E-mail"), Some(Column::Email));
        assert_eq!(Column::from_header("HOURLY RATE"), Some(Column::HourlyRate));
        assert_eq!(Column::from_header("favourite colour"), None);
    }

    #[test]
    fn test_parse_basic_rows() {
        let csv = format!("{HEADER}\nJane,Doe,jane@x.com,Designer,Designs things\n");
        let rows = parse_csv(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get(Column::Email), Some("jane@x.com"));
        assert_eq!(rows[0].get(Column::Skills), None);
        assert_eq!(rows[0].number(), 1);
    }

    #[test]
    fn test_bom_is_stripped() {
        let csv = format!("\u{FEFF}{HEADER}\nJane,Doe,jane@x.com,Designer,Bio\n");
        let rows = parse_csv(csv.as_bytes()).unwrap();
        assert_eq!(rows[0].get(Column::FirstName), Some("Jane"));
    }

    #[test]
    fn test_quoted_fields_keep_commas() {
        let csv = format!("{HEADER},location\nJane,Doe,jane@x.com,Designer,\"Bio, with comma\",\"Lisbon, PT\"\n");
        let rows = parse_csv(csv.as_bytes()).unwrap();
        assert_eq!(rows[0].get(Column::Bio), Some("Bio, with comma"));
        assert_eq!(rows[0].get(Column::Location), Some("Lisbon, PT"));
    }

    #[test]
    fn test_missing_required_columns() {
        let err = parse_csv(b"firstName,email\nJane,jane@x.com\n").unwrap_err();
        match err {
            CsvFormatError::MissingColumns(cols) => {
                assert_eq!(cols, vec!["lastName", "title", "bio"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_file() {
        assert!(matches!(parse_csv(b""), Err(CsvFormatError::Empty)));
    }

    #[test]
    fn test_header_only_has_no_rows() {
        let rows = parse_csv(format!("{HEADER}\n").as_bytes()).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_blank_rows_are_dropped_but_keep_positions() {
        let csv = format!("{HEADER}\nA,B,a@x.com,T,B\n,,,,\nC,D,c@x.com,T,B\n");
        let rows = parse_csv(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].index, 2);
    }

    #[test]
    fn test_short_rows_are_tolerated() {
        let csv = format!("{HEADER}\nJane,Doe\n");
        let rows = parse_csv(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get(Column::Email), None);
    }
}
