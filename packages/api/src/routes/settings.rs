use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use store::models::SettingsFields;

use super::{created, Reply};
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::extract::AppJson;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route(
        "/",
        get(get_settings).post(create_settings).put(update_settings),
    )
}

async fn get_settings(State(state): State<Arc<AppState>>, user: AuthUser) -> ApiResult<Reply> {
    let settings = state.repo.get_settings(user.id).await?;
    Ok(Json(json!({ "success": true, "settings": settings })))
}

async fn create_settings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(fields): AppJson<SettingsFields>,
) -> ApiResult<(StatusCode, Reply)> {
    let settings = state.repo.create_settings(user.id, fields).await?;
    Ok(created(json!({
        "success": true,
        "message": "Settings created",
        "settings": settings,
    })))
}

async fn update_settings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(fields): AppJson<SettingsFields>,
) -> ApiResult<Reply> {
    let settings = state.repo.update_settings(user.id, fields).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Settings updated",
        "settings": settings,
    })))
}
