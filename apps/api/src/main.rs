use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, Method};
use clap::Parser;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use onspot_api::cli::{run_client_command, Cli, Commands};
use onspot_api::config::Config;
use onspot_api::csv_import::memory_store::MemoryTalentStore;
use onspot_api::csv_import::pg_store::PgTalentStore;
use onspot_api::csv_import::store::TalentStore;
use onspot_api::db::{create_pool, run_migrations};
use onspot_api::routes::build_router;
use onspot_api::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("onspot_api={}", &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command() {
        Commands::Serve => serve(config).await,
        command => run_client_command(&cli.server, command).await,
    }
}

async fn serve(config: Config) -> Result<()> {
    info!("Starting OnSpot API v{}", env!("CARGO_PKG_VERSION"));

    let store: Arc<dyn TalentStore> = match &config.database_url {
        Some(url) => {
            let pool = create_pool(url).await?;
            run_migrations(&pool).await?;
            Arc::new(PgTalentStore::new(pool))
        }
        None => {
            warn!("DATABASE_URL is not set; talents are kept in memory and lost on restart");
            Arc::new(MemoryTalentStore::new())
        }
    };

    let cors = cors_layer(&config)?;
    let state = AppState {
        store,
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Credentialed CORS for a single configured origin, permissive otherwise.
fn cors_layer(config: &Config) -> Result<CorsLayer> {
    let Some(origin) = &config.cors_allow_origin else {
        return Ok(CorsLayer::permissive());
    };
    let origin: HeaderValue = origin
        .parse()
        .context("CORS_ALLOW_ORIGIN must be a valid header value")?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]))
}
