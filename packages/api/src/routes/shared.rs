use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{delete, get, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use store::models::ShareStatus;
use store::repo::ShareScope;
use uuid::Uuid;

use super::{created, Reply};
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::extract::{AppJson, Path, Query};
use crate::models::{share_view, share_views};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_all).post(create_share))
        .route("/sent", get(list_sent))
        .route("/received", get(list_received))
        .route("/{id}", delete(delete_share))
        .route("/{id}/status", get(share_status))
        .route("/{id}/accept", put(accept_share))
        .route("/{id}/reject", put(reject_share))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateShare {
    #[serde(default)]
    contacts: Vec<Uuid>,
    shared_with_user_id: Uuid,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StatusFilter {
    status: Option<ShareStatus>,
}

async fn create_share(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(body): AppJson<CreateShare>,
) -> ApiResult<(StatusCode, Reply)> {
    let share = state
        .repo
        .share_contacts(user.id, body.shared_with_user_id, body.contacts)
        .await?;
    let share = share_view(&state.repo, share).await?;
    Ok(created(json!({
        "success": true,
        "message": "Contact shared successfully",
        "sharedContact": share,
    })))
}

async fn list(
    state: &AppState,
    user: AuthUser,
    scope: ShareScope,
    status: Option<ShareStatus>,
) -> ApiResult<Reply> {
    let shares = state.repo.list_shares(user.id, scope, status).await?;
    let shares = share_views(&state.repo, shares).await?;
    Ok(Json(json!({ "success": true, "sharedContacts": shares })))
}

async fn list_all(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(filter): Query<StatusFilter>,
) -> ApiResult<Reply> {
    list(&state, user, ShareScope::All, filter.status).await
}

async fn list_sent(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(filter): Query<StatusFilter>,
) -> ApiResult<Reply> {
    list(&state, user, ShareScope::Sent, filter.status).await
}

async fn list_received(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(filter): Query<StatusFilter>,
) -> ApiResult<Reply> {
    list(&state, user, ShareScope::Received, filter.status).await
}

async fn share_status(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Reply> {
    let share = state.repo.get_share(user.id, id).await?;
    Ok(Json(json!({ "success": true, "status": share.status })))
}

async fn accept_share(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Reply> {
    let share = state.repo.accept_share(user.id, id).await?;
    let share = share_view(&state.repo, share).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Shared contact accepted",
        "sharedContact": share,
    })))
}

async fn reject_share(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Reply> {
    let share = state.repo.reject_share(user.id, id).await?;
    let share = share_view(&state.repo, share).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Shared contact rejected",
        "sharedContact": share,
    })))
}

async fn delete_share(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Reply> {
    state.repo.delete_share(user.id, id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Shared contact deleted",
    })))
}
