mod auth;
mod config;
mod db;
mod errors;
mod models;
mod repository;
mod resumes;
mod routes;
mod scoring;
mod state;
mod storage;

#[cfg(test)]
mod testing;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::auth::LinkedInProvider;
use crate::config::Config;
use crate::db::{create_pool, run_migrations};
use crate::repository::PgMetadataRepository;
use crate::resumes::spawn_sweeper;
use crate::routes::build_router;
use crate::scoring::HttpResumeScorer;
use crate::state::AppState;
use crate::storage::S3ObjectStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={},tower_http=info",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Aipply API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url, config.outbound_timeout).await?;
    run_migrations(&db).await?;
    let repo = Arc::new(PgMetadataRepository::new(db, config.outbound_timeout));

    // Initialize S3 / MinIO
    let store = Arc::new(S3ObjectStore::from_config(&config).await);
    info!("S3 client initialized (bucket: {})", config.s3_bucket);

    // Outbound HTTP collaborators
    let identity = Arc::new(LinkedInProvider::from_config(&config)?);
    let scorer = Arc::new(HttpResumeScorer::from_config(&config)?);
    info!("Scoring service at {}", config.scoring_url);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    let (sweep_interval, pending_grace) = (config.sweep_interval, config.pending_grace);

    let state = AppState::new(config, repo, store, identity, scorer);

    // Background cleanup of stale pending/deleting resumes
    spawn_sweeper(state.resumes.clone(), sweep_interval, pending_grace);

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
