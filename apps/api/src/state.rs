use std::sync::Arc;

use crate::config::Config;
use crate::csv_import::store::TalentStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Talent persistence. Postgres in production, in-memory when `DATABASE_URL` is unset.
    pub store: Arc<dyn TalentStore>,
    pub config: Config,
}
