use crate::csv_import::models::{CsvTalentRow, RowError};
use crate::csv_import::parser::{Column, RawRow};

const MAX_NAME_LEN: usize = 100;
const MAX_TITLE_LEN: usize = 200;
const MAX_BIO_LEN: usize = 5000;
const MAX_EMAIL_LEN: usize = 254;
const MAX_HOURLY_RATE: f64 = 10_000.0;
const MIN_PHONE_DIGITS: usize = 7;
const MAX_PHONE_DIGITS: usize = 20;

/// Validates one raw row, collecting every problem rather than stopping at the first.
pub fn validate_row(raw: &RawRow) -> Result<CsvTalentRow, Vec<RowError>> {
    let row = raw.number();
    if let Some(reason) = &raw.read_error {
        return Err(vec![RowError::new(row, "row", format!("Unreadable row: {reason}"))]);
    }

    let mut errors = Vec::new();

    let first_name = required_text(raw, Column::FirstName, MAX_NAME_LEN, &mut errors);
    let last_name = required_text(raw, Column::LastName, MAX_NAME_LEN, &mut errors);
    let title = required_text(raw, Column::Title, MAX_TITLE_LEN, &mut errors);
    let bio = required_text(raw, Column::Bio, MAX_BIO_LEN, &mut errors);

    let email = match raw.get(Column::Email) {
        None => {
            errors.push(RowError::new(row, "email", "Email is required"));
            None
        }
        Some(value) if !is_valid_email(value) => {
            errors.push(RowError::new(row, "email", "Invalid email address").with_data(value));
            None
        }
        Some(value) => Some(value.to_lowercase()),
    };

    let phone = raw.get(Column::Phone).and_then(|value| {
        if is_valid_phone(value) {
            Some(value.to_string())
        } else {
            errors.push(RowError::new(row, "phone", "Invalid phone number").with_data(value));
            None
        }
    });

    let hourly_rate = raw.get(Column::HourlyRate).and_then(|value| {
        match value.parse::<f64>() {
            Ok(rate) if rate.is_finite() && (0.0..=MAX_HOURLY_RATE).contains(&rate) => Some(rate),
            Ok(_) => {
                errors.push(
                    RowError::new(
                        row,
                        "hourlyRate",
                        format!("Hourly rate must be between 0 and {MAX_HOURLY_RATE}"),
                    )
                    .with_data(value),
                );
                None
            }
            Err(_) => {
                errors.push(
                    RowError::new(row, "hourlyRate", "Hourly rate must be a number").with_data(value),
                );
                None
            }
        }
    });

    let currency = raw.get(Column::Currency).and_then(|value| {
        if value.len() == 3 && value.chars().all(|c| c.is_ascii_alphabetic()) {
            Some(value.to_ascii_uppercase())
        } else {
            errors.push(
                RowError::new(row, "currency", "Currency must be a 3-letter ISO code").with_data(value),
            );
            None
        }
    });

    if !errors.is_empty() {
        return Err(errors);
    }

    // Every required value is present once `errors` is empty.
    match (first_name, last_name, email, title, bio) {
        (Some(first_name), Some(last_name), Some(email), Some(title), Some(bio)) => Ok(CsvTalentRow {
            first_name,
            last_name,
            email,
            title,
            bio,
            location: raw.get(Column::Location).map(str::to_string),
            phone,
            hourly_rate,
            currency,
            languages: parse_list(raw.get(Column::Languages)),
            timezone: raw.get(Column::Timezone).map(str::to_string),
            skills: parse_list(raw.get(Column::Skills)),
        }),
        _ => Err(vec![RowError::new(row, "row", "Row is incomplete")]),
    }
}

fn required_text(
    raw: &RawRow,
    column: Column,
    max_len: usize,
    errors: &mut Vec<RowError>,
) -> Option<String> {
    let field = column.header();
    match raw.get(column) {
        None => {
            errors.push(RowError::new(raw.number(), field, format!("{field} is required")));
            None
        }
        Some(value) if value.chars().count() > max_len => {
            errors.push(RowError::new(
                raw.number(),
                field,
                format!("{field} must be at most {max_len} characters"),
            ));
            None
        }
        Some(value) => Some(value.to_string()),
    }
}

/// Structural email check: one `@`, non-empty local part, dotted domain with a
/// letter-only TLD of at least two characters.
pub fn is_valid_email(value: &str) -> bool {
    if value.len() > MAX_EMAIL_LEN || value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || local.len() > 64 || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    let labels_ok = labels.iter().all(|label| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    });
    let tld = labels[labels.len() - 1];
    labels_ok && tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
}

fn is_valid_phone(value: &str) -> bool {
    let allowed = value
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '(' | ')' | '.'));
    let digits = value.chars().filter(char::is_ascii_digit).count();
    allowed && (MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits)
}

/// Splits a `;` or `,` separated cell, trimming items and dropping
/// case-insensitive repeats while keeping the first spelling.
pub fn parse_list(value: Option<&str>) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for item in value.unwrap_or("").split(|c: char| c == ';' || c == ',') {
        let item = item.trim();
        if !item.is_empty() && !items.iter().any(|i| i.eq_ignore_ascii_case(item)) {
            items.push(item.to_string());
        }
    }
    items
}
