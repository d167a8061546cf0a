use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::client::selector::CandidateFile;
use crate::csv_import::models::{ImportResult, ValidationResult};

pub const TEMPLATE_PATH: &str = "/api/admin/csv-import/template/download";
pub const VALIDATE_PATH: &str = "/api/admin/csv-import/validate";
pub const IMPORT_PATH: &str = "/api/admin/csv-import/import";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Server { status: u16, message: Option<String> },
}

impl ClientError {
    /// Message the server put in its error body, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ClientError::Server { message, .. } => message.as_deref(),
            ClientError::Http(_) => None,
        }
    }
}

/// The three calls the import workflow makes. `ImportApi` talks HTTP; tests
/// substitute their own.
#[async_trait]
pub trait ImportBackend: Send + Sync {
    async fn download_template(&self) -> Result<Bytes, ClientError>;

    async fn validate(&self, file: &CandidateFile) -> Result<ValidationResult, ClientError>;

    async fn import(
        &self,
        file: &CandidateFile,
        skip_duplicate_emails: bool,
    ) -> Result<ImportResult, ClientError>;
}

/// HTTP client for the admin CSV import endpoints.
///
/// The cookie store is enabled so a session cookie set by the server is sent
/// back on every request.
#[derive(Clone)]
pub struct ImportApi {
    client: Client,
    base_url: String,
}

impl ImportApi {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let client = Client::builder().cookie_store(true).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn file_part(file: &CandidateFile) -> Result<Part, ClientError> {
        Ok(Part::bytes(file.bytes.to_vec())
            .file_name(file.name.clone())
            .mime_str(&file.mime)?)
    }

    /// Returns the response when it is 2xx, otherwise the server's error message.
    async fn check(response: Response) -> Result<Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body);
        debug!("Request failed with {status}: {body}");
        Err(ClientError::Server {
            status: status.as_u16(),
            message,
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        Ok(Self::check(response).await?.json::<T>().await?)
    }
}

/// Reads `message`, falling back to `error.message`, from a JSON error body.
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .or_else(|| value.get("error").and_then(|e| e.get("message")))
        .and_then(|m| m.as_str())
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl ImportBackend for ImportApi {
    async fn download_template(&self) -> Result<Bytes, ClientError> {
        let response = self.client.get(self.url(TEMPLATE_PATH)).send().await?;
        Ok(Self::check(response).await?.bytes().await?)
    }

    async fn validate(&self, file: &CandidateFile) -> Result<ValidationResult, ClientError> {
        let form = Form::new().part("csvFile", Self::file_part(file)?);
        let response = self
            .client
            .post(self.url(VALIDATE_PATH))
            .multipart(form)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn import(
        &self,
        file: &CandidateFile,
        skip_duplicate_emails: bool,
    ) -> Result<ImportResult, ClientError> {
        let form = Form::new()
            .part("csvFile", Self::file_part(file)?)
            .text("skipDuplicateEmails", skip_duplicate_emails.to_string());
        let response = self
            .client
            .post(self.url(IMPORT_PATH))
            .multipart(form)
            .send()
            .await?;
        Self::decode(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_top_level() {
        assert_eq!(
            error_message(r#"{"message":"csvFile is required"}"#).as_deref(),
            Some("csvFile is required")
        );
    }

    #[test]
    fn test_error_message_nested() {
        assert_eq!(
            error_message(r#"{"error":{"code":"X","message":"nested"}}"#).as_deref(),
            Some("nested")
        );
    }

    #[test]
    fn test_error_message_absent() {
        assert_eq!(error_message("<html>Bad Gateway</html>"), None);
        assert_eq!(error_message(r#"{"detail":"nope"}"#), None);
        assert_eq!(error_message(r#"{"message":""}"#), None);
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let api = ImportApi::new("http://localhost:8080/").unwrap();
        assert_eq!(
            api.url(VALIDATE_PATH),
            "http://localhost:8080/api/admin/csv-import/validate"
        );
    }

    #[test]
    fn test_server_message_accessor() {
        let err = ClientError::Server {
            status: 400,
            message: Some("bad".into()),
        };
        assert_eq!(err.server_message(), Some("bad"));
        assert!(err.to_string().contains("400"));
    }
}
