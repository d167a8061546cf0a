pub mod health;

use axum::{extract::DefaultBodyLimit, routing::get, routing::post, Router};

use crate::csv_import::handlers;
use crate::state::AppState;

/// Room for multipart boundaries and the `skipDuplicateEmails` field on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/admin/csv-import/template/download",
            get(handlers::handle_download_template),
        )
        .route(
            "/api/admin/csv-import/validate",
            post(handlers::handle_validate),
        )
        .route("/api/admin/csv-import/import", post(handlers::handle_import))
        .route("/api/admin/csv-import/runs", get(handlers::handle_list_runs))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
