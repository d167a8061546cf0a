use axum::{
    extract::{multipart::MultipartError, Multipart, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::info;

use crate::csv_import::models::{ImportResult, ValidationResult};
use crate::csv_import::pipeline::{import_csv, validate_csv};
use crate::csv_import::template::{template_csv, TEMPLATE_FILE_NAME};
use crate::csv_import::is_accepted_csv;
use crate::errors::AppError;
use crate::models::import_run::ImportRunRow;
use crate::state::AppState;

const FILE_FIELD: &str = "csvFile";
const SKIP_DUPLICATES_FIELD: &str = "skipDuplicateEmails";
const DEFAULT_RUN_LIMIT: usize = 20;
const MAX_RUN_LIMIT: usize = 100;

/// Parts of a validate/import multipart request.
#[derive(Debug)]
struct CsvUpload {
    file_name: Option<String>,
    bytes: Bytes,
    skip_duplicate_emails: bool,
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("CSV file exceeds the upload limit".to_string())
    } else {
        AppError::Validation(format!("Invalid multipart body: {}", err.body_text()))
    }
}

async fn read_upload(multipart: &mut Multipart, max_bytes: usize) -> Result<CsvUpload, AppError> {
    let mut file: Option<(Option<String>, Bytes)> = None;
    let mut skip_duplicate_emails = false;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(FILE_FIELD) => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                if !is_accepted_csv(file_name.as_deref(), content_type.as_deref()) {
                    return Err(AppError::Validation(
                        "Only CSV files are accepted".to_string(),
                    ));
                }
                let bytes = field.bytes().await.map_err(multipart_error)?;
                file = Some((file_name, bytes));
            }
            Some(SKIP_DUPLICATES_FIELD) => {
                let value = field.text().await.map_err(multipart_error)?;
                skip_duplicate_emails = match value.trim() {
                    "true" => true,
                    "false" | "" => false,
                    other => {
                        return Err(AppError::Validation(format!(
                            "{SKIP_DUPLICATES_FIELD} must be \"true\" or \"false\", got \"{other}\""
                        )))
                    }
                };
            }
            _ => {}
        }
    }

    let (file_name, bytes) =
        file.ok_or_else(|| AppError::Validation(format!("{FILE_FIELD} is required")))?;
    if bytes.is_empty() {
        return Err(AppError::Validation("CSV file is empty".to_string()));
    }
    if bytes.len() > max_bytes {
        return Err(AppError::PayloadTooLarge(format!(
            "CSV file exceeds the {} MB upload limit",
            max_bytes / (1024 * 1024)
        )));
    }

    Ok(CsvUpload {
        file_name,
        bytes,
        skip_duplicate_emails,
    })
}

/// GET /api/admin/csv-import/template/download
pub async fn handle_download_template() -> Result<Response, AppError> {
    let body = template_csv()?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{TEMPLATE_FILE_NAME}\""),
            ),
        ],
        body,
    )
        .into_response())
}

/// POST /api/admin/csv-import/validate
pub async fn handle_validate(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ValidationResult>, AppError> {
    let upload = read_upload(&mut multipart, state.config.max_upload_bytes).await?;
    info!(
        "Validating {} ({} bytes)",
        upload.file_name.as_deref().unwrap_or("upload"),
        upload.bytes.len()
    );
    let report = validate_csv(&upload.bytes, state.store.as_ref()).await?;
    Ok(Json(report))
}

/// POST /api/admin/csv-import/import
pub async fn handle_import(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ImportResult>, AppError> {
    let upload = read_upload(&mut multipart, state.config.max_upload_bytes).await?;
    info!(
        "Importing {} ({} bytes)",
        upload.file_name.as_deref().unwrap_or("upload"),
        upload.bytes.len()
    );
    let result = import_csv(
        &upload.bytes,
        upload.skip_duplicate_emails,
        state.store.as_ref(),
    )
    .await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct RunsQuery {
    pub limit: Option<usize>,
}

/// GET /api/admin/csv-import/runs
pub async fn handle_list_runs(
    State(state): State<AppState>,
    Query(params): Query<RunsQuery>,
) -> Result<Json<Vec<ImportRunRow>>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_RUN_LIMIT).clamp(1, MAX_RUN_LIMIT);
    let runs = state.store.recent_import_runs(limit).await?;
    Ok(Json(runs))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::csv_import::memory_store::MemoryTalentStore;
    use crate::routes::build_router;
    use crate::state::AppState;

    use super::*;

    const BOUNDARY: &str = "onspot-test-boundary";

    struct Part<'a> {
        name: &'a str,
        file_name: Option<&'a str>,
        content_type: Option<&'a str>,
        body: &'a [u8],
    }

    fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", part.name);
            if let Some(file_name) = part.file_name {
                disposition.push_str(&format!("; filename=\"{file_name}\""));
            }
            body.extend_from_slice(disposition.as_bytes());
            body.extend_from_slice(b"\r\n");
            if let Some(content_type) = part.content_type {
                body.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
            }
            body.extend_from_slice(b"\r\n");
            body.extend_from_slice(part.body);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn csv_part(body: &[u8]) -> Part<'_> {
        Part {
            name: "csvFile",
            file_name: Some("talents.csv"),
            content_type: Some("text/csv"),
            body,
        }
    }

    fn app(store: MemoryTalentStore) -> axum::Router {
        build_router(AppState {
            store: Arc::new(store),
            config: Config::default(),
        })
    }

    async fn post(app: axum::Router, uri: &str, parts: &[Part<'_>]) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    const FILE: &[u8] = b"firstName,lastName,email,title,bio\nAna,Silva,ana@x.com,Designer,Bio\nBen,Ng,dup@x.com,Engineer,Bio\n";

    #[tokio::test]
    async fn test_validate_endpoint_returns_report() {
        let store = MemoryTalentStore::with_existing_emails(["dup@x.com"]);
        let (status, body) = post(app(store), "/api/admin/csv-import/validate", &[csv_part(FILE)]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalRows"], 2);
        assert_eq!(body["validRows"], 2);
        assert_eq!(body["duplicateEmails"][0], "dup@x.com");
    }

    #[tokio::test]
    async fn test_validate_requires_file_field() {
        let (status, body) = post(
            app(MemoryTalentStore::new()),
            "/api/admin/csv-import/validate",
            &[Part {
                name: "other",
                file_name: None,
                content_type: None,
                body: b"x",
            }],
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "csvFile is required");
    }

    #[tokio::test]
    async fn test_validate_rejects_non_csv() {
        let (status, body) = post(
            app(MemoryTalentStore::new()),
            "/api/admin/csv-import/validate",
            &[Part {
                name: "csvFile",
                file_name: Some("resume.pdf"),
                content_type: Some("application/pdf"),
                body: b"%PDF-1.7",
            }],
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Only CSV files are accepted");
    }

    #[tokio::test]
    async fn test_import_endpoint_honours_skip_flag() {
        let store = MemoryTalentStore::with_existing_emails(["dup@x.com"]);
        let (status, body) = post(
            app(store),
            "/api/admin/csv-import/import",
            &[
                csv_part(FILE),
                Part {
                    name: "skipDuplicateEmails",
                    file_name: None,
                    content_type: None,
                    body: b"true",
                },
            ],
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["successfulRows"], 1);
        assert_eq!(body["failedRows"], 0);
        assert_eq!(body["summary"]["duplicatesSkipped"], 1);
        assert!(body["requestId"].is_string());
    }

    #[tokio::test]
    async fn test_import_rejects_bad_skip_flag() {
        let (status, _) = post(
            app(MemoryTalentStore::new()),
            "/api/admin/csv-import/import",
            &[
                csv_part(FILE),
                Part {
                    name: "skipDuplicateEmails",
                    file_name: None,
                    content_type: None,
                    body: b"yes",
                },
            ],
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_oversized_upload_is_rejected() {
        let store = Arc::new(MemoryTalentStore::new());
        let router = build_router(AppState {
            store,
            config: Config {
                max_upload_bytes: 16,
                ..Config::default()
            },
        });
        let (status, _) = post(router, "/api/admin/csv-import/validate", &[csv_part(FILE)]).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_template_download_headers() {
        let response = app(MemoryTalentStore::new())
            .oneshot(
                Request::builder()
                    .uri("/api/admin/csv-import/template/download")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
        assert!(disposition.contains("onspot_talent_import_template.csv"));
    }

    #[tokio::test]
    async fn test_runs_endpoint_lists_imports() {
        let store = Arc::new(MemoryTalentStore::new());
        let router = build_router(AppState {
            store: store.clone(),
            config: Config::default(),
        });
        post(router.clone(), "/api/admin/csv-import/import", &[csv_part(FILE)]).await;

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/admin/csv-import/runs?limit=5")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let runs: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(runs.as_array().unwrap().len(), 1);
        assert_eq!(runs[0]["successfulRows"], 2);
    }
}
