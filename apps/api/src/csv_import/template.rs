use anyhow::Context;

use crate::csv_import::parser::Column;
use crate::errors::AppError;

/// File name the template is served and saved under.
pub const TEMPLATE_FILE_NAME: &str = "onspot_talent_import_template.csv";

const EXAMPLE_ROW: [&str; 12] = [
    "Jane",
    "Doe",
    "jane.doe@example.com",
    "Senior Product Designer",
    "Ten years designing B2B SaaS products, from discovery to design systems.",
    "Lisbon, Portugal",
    "+351 912 345 678",
    "85",
    "EUR",
    "English;Portuguese",
    "Europe/Lisbon",
    "Figma;User Research;Prototyping",
];

/// Header row plus one example talent that passes validation.
pub fn template_csv() -> Result<Vec<u8>, AppError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(Column::ALL.iter().map(|c| c.header()))
        .context("Failed to write template header")?;
    writer
        .write_record(EXAMPLE_ROW)
        .context("Failed to write template example")?;
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to finish template: {e}"))?;
    Ok(bytes)
}
