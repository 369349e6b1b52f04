use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use store::models::LabelFields;
use uuid::Uuid;

use super::{created, Reply};
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::extract::{AppJson, Path};
use crate::models::{label_view, label_views};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_labels).post(create_label))
        .route("/{id}", get(get_label).put(update_label).delete(delete_label))
}

#[derive(Debug, Deserialize)]
struct CreateLabel {
    #[serde(flatten)]
    fields: LabelFields,
    #[serde(default)]
    contacts: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
struct UpdateLabel {
    #[serde(flatten)]
    fields: LabelFields,
    contacts: Option<Vec<Uuid>>,
}

async fn list_labels(State(state): State<Arc<AppState>>, user: AuthUser) -> ApiResult<Reply> {
    let labels = state.repo.list_labels(user.id).await?;
    let labels = label_views(&state.repo, labels).await?;
    Ok(Json(json!({ "success": true, "labels": labels })))
}

async fn get_label(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Reply> {
    let label = state.repo.get_label(user.id, id).await?;
    let label = label_view(&state.repo, label).await?;
    Ok(Json(json!({ "success": true, "label": label })))
}

async fn create_label(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(body): AppJson<CreateLabel>,
) -> ApiResult<(StatusCode, Reply)> {
    let label = state
        .repo
        .create_label(user.id, body.fields, body.contacts)
        .await?;
    let label = label_view(&state.repo, label).await?;
    Ok(created(json!({
        "success": true,
        "message": "Label created successfully",
        "label": label,
    })))
}

async fn update_label(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    AppJson(body): AppJson<UpdateLabel>,
) -> ApiResult<Reply> {
    let label = state
        .repo
        .update_label(user.id, id, body.fields, body.contacts)
        .await?;
    let label = label_view(&state.repo, label).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Label updated successfully",
        "label": label,
    })))
}

async fn delete_label(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Reply> {
    state.repo.delete_label(user.id, id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Label deleted successfully",
    })))
}
