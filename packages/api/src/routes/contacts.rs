use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use store::models::ContactFields;
use store::repo::ContactQuery;
use uuid::Uuid;

use super::{created, Reply};
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::extract::{AppJson, Path, Query};
use crate::models::{contact_view, contact_views, share_view};
use crate::AppState;

const DEFAULT_LIMIT: u64 = 10;
const MAX_LIMIT: u64 = 100;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_contacts).post(create_contact))
        .route("/merge", post(merge_contacts))
        .route(
            "/{id}",
            get(get_contact).put(update_contact).delete(delete_contact),
        )
        .route("/{id}/share", post(share_contact))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ListParams {
    page: Option<u64>,
    limit: Option<u64>,
    search: Option<String>,
    label_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateContact {
    #[serde(flatten)]
    fields: ContactFields,
    #[serde(default)]
    labels: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateContact {
    #[serde(flatten)]
    fields: ContactFields,
    labels: Option<Vec<Uuid>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MergeContacts {
    primary_contact_id: Uuid,
    #[serde(default)]
    duplicate_contact_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShareContact {
    shared_with_user_id: Uuid,
}

async fn list_contacts(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(params): Query<ListParams>,
) -> ApiResult<Reply> {
    let mut query = ContactQuery::new(user.id);
    query.page = params.page.unwrap_or(1).max(1);
    query.limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    query.search = params.search;
    query.label = params.label_id;

    let page = state.repo.list_contacts(&query).await?;
    let contacts = contact_views(&state.repo, page.contacts).await?;
    Ok(Json(json!({
        "success": true,
        "contacts": contacts,
        "total": page.total,
        "page": query.page,
        "pages": page.total.div_ceil(query.limit),
    })))
}

async fn get_contact(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Reply> {
    let contact = state.repo.get_contact(user.id, id).await?;
    let contact = contact_view(&state.repo, contact).await?;
    Ok(Json(json!({ "success": true, "contact": contact })))
}

async fn create_contact(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(body): AppJson<CreateContact>,
) -> ApiResult<(StatusCode, Reply)> {
    let contact = state
        .repo
        .create_contact(user.id, body.fields, body.labels)
        .await?;
    let contact = contact_view(&state.repo, contact).await?;
    Ok(created(json!({
        "success": true,
        "message": "Contact created successfully",
        "contact": contact,
    })))
}

async fn update_contact(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    AppJson(body): AppJson<UpdateContact>,
) -> ApiResult<Reply> {
    let contact = state
        .repo
        .update_contact(user.id, id, body.fields, body.labels)
        .await?;
    let contact = contact_view(&state.repo, contact).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Contact updated successfully",
        "contact": contact,
    })))
}

async fn delete_contact(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Reply> {
    state.repo.delete_contact(user.id, id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Contact deleted successfully",
    })))
}

async fn merge_contacts(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(body): AppJson<MergeContacts>,
) -> ApiResult<Reply> {
    let contact = state
        .repo
        .merge_contacts(user.id, body.primary_contact_id, &body.duplicate_contact_ids)
        .await?;
    let contact = contact_view(&state.repo, contact).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Contacts merged successfully",
        "contact": contact,
    })))
}

async fn share_contact(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    AppJson(body): AppJson<ShareContact>,
) -> ApiResult<(StatusCode, Reply)> {
    let share = state
        .repo
        .share_contacts(user.id, body.shared_with_user_id, vec![id])
        .await?;
    let share = share_view(&state.repo, share).await?;
    Ok(created(json!({
        "success": true,
        "message": "Contact shared successfully",
        "sharedContact": share,
    })))
}
