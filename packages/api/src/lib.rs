//! # API crate: the Pingbook HTTP backend
//!
//! Everything the `server` binary serves lives here: the axum [`router`], the shared
//! [`AppState`], authentication, outgoing mail and the PostgreSQL implementation of
//! the store crate's `DocumentStore`.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`auth`] | Bearer tokens (HS256), Argon2 password hashing, Google OAuth with PKCE, the [`auth::AuthUser`] extractor |
//! | [`db`] | PostgreSQL pool, embedded migrations, [`db::PgStore`] |
//! | [`error`] | [`error::AppError`] and its `{ success: false, message }` response |
//! | [`extract`] | JSON/query/path extractors that reject with [`error::AppError`] |
//! | [`mail`] | The [`mail::Mailer`] trait, SendGrid and log-only implementations |
//! | [`models`] | Response shapes: users without secrets, contacts and labels with their references populated |
//! | [`routes`] | One module per resource, all nested under `/api` |
//! | [`settings`] | Layered configuration (defaults, `config.toml`, environment) |
//!
//! Handlers never touch storage directly. They authenticate the caller, decode the
//! request, call one [`Repository`] operation and wrap the result in the
//! `{ success, message?, <resource> }` envelope.

use std::sync::Arc;

use axum::Router;
use store::{DocumentStore, Repository};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub mod auth;
pub mod db;
pub mod error;
pub mod extract;
pub mod mail;
pub mod models;
pub mod routes;
pub mod settings;

use auth::{GoogleOAuth, TokenService};
use mail::{Email, Mailer};
use settings::Settings;

/// Shared application state
pub struct AppState {
    pub repo: Repository,
    pub tokens: TokenService,
    pub mailer: Arc<dyn Mailer>,
    /// `None` when no Google client credentials are configured.
    pub google: Option<GoogleOAuth>,
    pub settings: Settings,
}

impl AppState {
    pub fn new(settings: Settings, store: Arc<dyn DocumentStore>, mailer: Arc<dyn Mailer>) -> Self {
        let google = if settings.google.is_configured() {
            match GoogleOAuth::new(&settings.google) {
                Ok(google) => Some(google),
                Err(e) => {
                    warn!(error = %e, "Google sign-in disabled");
                    None
                }
            }
        } else {
            info!("Google sign-in not configured");
            None
        };

        Self {
            repo: Repository::new(store),
            tokens: TokenService::new(&settings.jwt.secret),
            mailer,
            google,
            settings,
        }
    }

    /// Delivery is best effort; failures are logged and dropped.
    pub(crate) async fn send_mail(&self, email: Email) {
        let to = email.to.clone();
        if let Err(e) = self.mailer.send(email).await {
            warn!(to = %to, error = %e, "failed to send email");
        }
    }
}

/// Create the API router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", routes::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
