//! Pingbook server
//!
//! Loads configuration, picks a storage backend and serves the HTTP API.
//! With `DATABASE_URL` set the data lives in PostgreSQL (migrations run at start-up);
//! without it everything is kept in memory and lost on exit.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use api::db::{self, PgStore, MIGRATOR};
use api::settings::Settings;
use api::{mail, AppState};
use store::{DocumentStore, MemoryStore};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let settings = Settings::new().context("Failed to load configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log.level))
        .context("Invalid log level")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting Pingbook server");

    if settings.uses_default_secret() {
        if !settings.database.url.is_empty() {
            bail!("JWT_SECRET must be set to a private value when DATABASE_URL is set");
        }
        warn!("JWT_SECRET not set, signing tokens with the development secret");
    }

    let store: Arc<dyn DocumentStore> = if settings.database.url.is_empty() {
        warn!("DATABASE_URL not set, using the in-memory store");
        Arc::new(MemoryStore::new())
    } else {
        let pool = db::connect(&settings.database.url)
            .await
            .context("Failed to connect to database")?;
        MIGRATOR
            .run(&pool)
            .await
            .context("Failed to run migrations")?;
        info!("Database migrations applied");
        Arc::new(PgStore::new(pool))
    };

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .context("Invalid server address")?;
    let mailer = mail::from_settings(&settings);
    let state = Arc::new(AppState::new(settings, store, mailer));
    let app = api::router(state).layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind API server")?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server error")?;

    info!("Pingbook server shutting down");
    Ok(())
}

/// Wait for ctrl-c.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("Received ctrl-c, initiating graceful shutdown");
}
