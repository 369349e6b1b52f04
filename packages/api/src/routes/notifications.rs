use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde_json::json;
use uuid::Uuid;

use super::Reply;
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::extract::Path;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/{id}/read", put(mark_read))
}

async fn list_notifications(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<Reply> {
    let notifications = state.repo.list_notifications(user.id).await?;
    Ok(Json(json!({ "success": true, "notifications": notifications })))
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Reply> {
    let notification = state.repo.mark_notification_read(user.id, id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Notification marked as read",
        "notification": notification,
    })))
}
