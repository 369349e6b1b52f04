//! HTTP routes, one module per resource.
//!
//! Every route except the public auth endpoints takes an [`AuthUser`](crate::auth::AuthUser),
//! so a missing or bad bearer token is answered with 401 before the handler runs.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::{Json, Router};
use serde_json::Value;

use crate::AppState;

mod auth;
mod contacts;
mod exports;
mod labels;
mod notifications;
mod settings;
mod shared;
mod users;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .nest("/contacts", contacts::router())
        .nest("/labels", labels::router())
        .nest("/shared-contacts", shared::router())
        .nest("/settings", settings::router())
        .nest("/exports", exports::router())
        .nest("/notifications", notifications::router())
}

type Reply = Json<Value>;

fn created(body: Value) -> (StatusCode, Reply) {
    (StatusCode::CREATED, Json(body))
}
