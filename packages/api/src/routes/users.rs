use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use store::repo::{ImportRow, ProfileFields};
use tracing::info;
use uuid::Uuid;

use super::{created, Reply};
use crate::auth::AuthUser;
use crate::error::{ApiResult, AppError};
use crate::extract::{AppJson, Path};
use crate::models::UserInfo;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_users))
        .route("/is-auth", get(is_auth))
        .route("/logout", post(logout))
        .route("/import-contacts", post(import_contacts))
        .route(
            "/profile",
            get(get_profile).put(update_profile).delete(delete_profile),
        )
        .route("/{id}", get(get_user).put(update_user).delete(delete_user))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ImportContacts {
    contacts: Vec<ImportRow>,
}

/// Accounts may only be modified by their owner.
fn ensure_self(user: &AuthUser, id: Uuid) -> Result<(), AppError> {
    if user.id == id {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You can only modify your own account".into(),
        ))
    }
}

async fn list_users(State(state): State<Arc<AppState>>, _user: AuthUser) -> ApiResult<Reply> {
    let users: Vec<UserInfo> = state
        .repo
        .list_users()
        .await?
        .iter()
        .map(UserInfo::from)
        .collect();
    Ok(Json(json!({ "success": true, "users": users })))
}

async fn is_auth(_user: AuthUser) -> Reply {
    Json(json!({ "success": true, "isAuth": true }))
}

/// Tokens are stateless; the client discards its copy.
async fn logout(user: AuthUser) -> Reply {
    info!(user = %user.id, "logged out");
    Json(json!({ "success": true, "message": "Logged out successfully" }))
}

async fn get_profile(State(state): State<Arc<AppState>>, user: AuthUser) -> ApiResult<Reply> {
    let user = state.repo.get_user(user.id).await?;
    Ok(Json(json!({ "success": true, "user": UserInfo::from(&user) })))
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(fields): AppJson<ProfileFields>,
) -> ApiResult<Reply> {
    let user = state.repo.update_profile(user.id, fields).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Profile updated",
        "user": UserInfo::from(&user),
    })))
}

async fn delete_profile(State(state): State<Arc<AppState>>, user: AuthUser) -> ApiResult<Reply> {
    state.repo.delete_account(user.id).await?;
    Ok(Json(json!({ "success": true, "message": "User account deleted" })))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Reply> {
    let user = state.repo.get_user(id).await?;
    Ok(Json(json!({ "success": true, "user": UserInfo::from(&user) })))
}

async fn update_user(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    AppJson(fields): AppJson<ProfileFields>,
) -> ApiResult<Reply> {
    state.repo.get_user(id).await?;
    ensure_self(&user, id)?;
    let user = state.repo.update_profile(id, fields).await?;
    Ok(Json(json!({
        "success": true,
        "message": "User updated",
        "user": UserInfo::from(&user),
    })))
}

async fn delete_user(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Reply> {
    state.repo.get_user(id).await?;
    ensure_self(&user, id)?;
    state.repo.delete_account(id).await?;
    Ok(Json(json!({ "success": true, "message": "User deleted" })))
}

async fn import_contacts(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(body): AppJson<ImportContacts>,
) -> ApiResult<(StatusCode, Reply)> {
    let report = state.repo.import_contacts(user.id, body.contacts).await?;
    if report.imported.is_empty() {
        return Err(AppError::Rejected {
            message: "No valid contacts to import".into(),
            errors: report.errors,
        });
    }

    let count = report.imported.len();
    let mut body = Map::new();
    body.insert("success".into(), Value::Bool(true));
    body.insert(
        "message".into(),
        Value::String(format!("Successfully imported {count} contacts")),
    );
    body.insert("importedCount".into(), json!(count));
    if report.skipped() > 0 {
        body.insert("skippedCount".into(), json!(report.skipped()));
        body.insert("errors".into(), json!(report.errors));
    }
    Ok(created(Value::Object(body)))
}
