use std::collections::{HashMap, HashSet};

use crate::csv_import::models::RowError;
use crate::csv_import::pipeline::{CheckedRow, RowOutcome};

/// Turns every later occurrence of an email already used by an earlier valid
/// row of the same file into an error row. The first occurrence stays valid.
pub fn flag_in_file_duplicates(rows: &mut [CheckedRow]) {
    let mut first_seen: HashMap<String, usize> = HashMap::new();

    for row in rows.iter_mut() {
        let RowOutcome::Valid(talent) = &row.outcome else {
            continue;
        };
        match first_seen.get(&talent.email) {
            Some(first_number) => {
                let error = RowError::new(
                    row.index + 1,
                    "email",
                    format!("Duplicate email in file (first used on row {first_number})"),
                )
                .with_data(talent.email.clone());
                row.outcome = RowOutcome::Invalid(vec![error]);
            }
            None => {
                first_seen.insert(talent.email.clone(), row.index + 1);
            }
        }
    }
}

/// Emails that already belong to a stored user, once each, in file order.
pub fn existing_duplicates<'a>(
    emails: impl IntoIterator<Item = &'a str>,
    existing: &HashSet<String>,
) -> Vec<String> {
    let mut seen = HashSet::new();
    emails
        .into_iter()
        .filter(|email| existing.contains(*email) && seen.insert(*email))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv_import::models::CsvTalentRow;

    fn valid(index: usize, email: &str) -> CheckedRow {
        CheckedRow {
            index,
            outcome: RowOutcome::Valid(CsvTalentRow {
                first_name: "A".into(),
                last_name: "B".into(),
                email: email.into(),
                title: "T".into(),
                bio: "Bio".into(),
                location: None,
                phone: None,
                hourly_rate: None,
                currency: None,
                languages: vec![],
                timezone: None,
                skills: vec![],
            }),
        }
    }

    #[test]
    fn test_second_occurrence_becomes_error() {
        let mut rows = vec![valid(0, "a@x.com"), valid(1, "b@x.com"), valid(2, "a@x.com")];
        flag_in_file_duplicates(&mut rows);
        assert!(rows[0].talent().is_some());
        assert!(rows[1].talent().is_some());
        match &rows[2].outcome {
            RowOutcome::Invalid(errors) => {
                assert_eq!(errors[0].row, 3);
                assert!(errors[0].message.contains("row 1"));
            }
            RowOutcome::Valid(_) => panic!("repeat should be flagged"),
        }
    }

    #[test]
    fn test_invalid_rows_do_not_claim_an_email() {
        let mut rows = vec![
            CheckedRow {
                index: 0,
                outcome: RowOutcome::Invalid(vec![RowError::new(1, "bio", "bio is required")]),
            },
            valid(1, "a@x.com"),
        ];
        flag_in_file_duplicates(&mut rows);
        assert!(rows[1].talent().is_some());
    }

    #[test]
    fn test_existing_duplicates_unique_in_order() {
        let existing: HashSet<String> = ["b@x.com", "a@x.com"].iter().map(|s| s.to_string()).collect();
        let found = existing_duplicates(["c@x.com", "a@x.com", "b@x.com", "a@x.com"], &existing);
        assert_eq!(found, vec!["a@x.com", "b@x.com"]);
    }
}
