use std::path::Path;

use bytes::Bytes;
use thiserror::Error;

use crate::csv_import::{is_accepted_csv, CSV_EXTENSION, MAX_UPLOAD_BYTES};

/// A file offered to the importer, by drag-and-drop or picker.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateFile {
    pub name: String,
    pub mime: String,
    pub bytes: Bytes,
}

impl CandidateFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes: bytes.into(),
        }
    }

    /// Reads a file from disk, deriving its MIME type from the extension.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime = if name.to_ascii_lowercase().ends_with(CSV_EXTENSION) {
            "text/csv"
        } else {
            "application/octet-stream"
        };
        Ok(Self::new(name, mime, bytes))
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionCode {
    FileTooLarge,
    FileInvalidType,
    TooManyFiles,
    NoFile,
}

impl RejectionCode {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectionCode::FileTooLarge => "file-too-large",
            RejectionCode::FileInvalidType => "file-invalid-type",
            RejectionCode::TooManyFiles => "too-many-files",
            RejectionCode::NoFile => "no-file",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FileRejection {
    pub code: RejectionCode,
    pub message: String,
}

impl FileRejection {
    fn new(code: RejectionCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Gates a selection before any request is made: exactly one CSV file within the size limit.
#[derive(Debug, Clone, Copy)]
pub struct FileSelector {
    max_bytes: usize,
}

impl Default for FileSelector {
    fn default() -> Self {
        Self::new(MAX_UPLOAD_BYTES)
    }
}

impl FileSelector {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    /// Type is checked before size, so a large PDF is reported as the wrong type.
    pub fn check(&self, file: &CandidateFile) -> Result<(), FileRejection> {
        if !is_accepted_csv(Some(&file.name), Some(&file.mime)) {
            return Err(FileRejection::new(
                RejectionCode::FileInvalidType,
                format!("{} is not a CSV file", file.name),
            ));
        }
        if file.size() > self.max_bytes {
            return Err(FileRejection::new(
                RejectionCode::FileTooLarge,
                format!(
                    "{} is larger than {} MB",
                    file.name,
                    self.max_bytes / (1024 * 1024)
                ),
            ));
        }
        Ok(())
    }

    pub fn select(&self, mut files: Vec<CandidateFile>) -> Result<CandidateFile, FileRejection> {
        match files.len() {
            0 => Err(FileRejection::new(RejectionCode::NoFile, "No file selected")),
            1 => {
                let file = files.remove(0);
                self.check(&file)?;
                Ok(file)
            }
            n => Err(FileRejection::new(
                RejectionCode::TooManyFiles,
                format!("Only one file can be imported at a time ({n} selected)"),
            )),
        }
    }
}
