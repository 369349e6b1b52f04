use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use store::models::ExportFormat;
use uuid::Uuid;

use super::{created, Reply};
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::extract::{AppJson, Path};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_exports).post(create_export))
        .route("/{id}", get(get_export).delete(delete_export))
        .route("/{id}/download", get(download_export))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CreateExport {
    format: String,
    label_id: Option<Uuid>,
}

async fn list_exports(State(state): State<Arc<AppState>>, user: AuthUser) -> ApiResult<Reply> {
    let exports = state.repo.list_exports(user.id).await?;
    Ok(Json(json!({ "success": true, "exports": exports })))
}

async fn create_export(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(body): AppJson<CreateExport>,
) -> ApiResult<(StatusCode, Reply)> {
    let format: ExportFormat = body.format.trim().to_lowercase().parse()?;
    let export = state
        .repo
        .create_export(user.id, format, body.label_id)
        .await?;
    Ok(created(json!({
        "success": true,
        "message": "Export created",
        "export": export,
    })))
}

async fn get_export(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Reply> {
    let export = state.repo.get_export(user.id, id).await?;
    Ok(Json(json!({ "success": true, "export": export })))
}

async fn download_export(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let file = state.repo.download_export(user.id, id).await?;
    let disposition = format!("attachment; filename=\"{}\"", file.filename);
    Ok((
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.body,
    ))
}

async fn delete_export(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Reply> {
    state.repo.delete_export(user.id, id).await?;
    Ok(Json(json!({ "success": true, "message": "Export deleted" })))
}
