//! Integration tests for the HTTP API
//!
//! These tests drive the router with tower::ServiceExt::oneshot() against the
//! in-memory store, without starting a server or touching the network.

use std::sync::Arc;

use api::mail::LogMailer;
use api::settings::{Frontend, Jwt, Settings};
use api::AppState;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use store::models::ExportStatus;
use store::repo::{ContactQuery, UserKey};
use store::MemoryStore;
use tower::ServiceExt;
use uuid::Uuid;

fn test_state() -> Arc<AppState> {
    let settings = Settings {
        jwt: Jwt {
            secret: "test-secret".into(),
        },
        frontend: Frontend {
            url: "http://localhost:3000".into(),
        },
        ..Default::default()
    };
    Arc::new(AppState::new(
        settings,
        Arc::new(MemoryStore::new()),
        Arc::new(LogMailer),
    ))
}

async fn call(
    state: &Arc<AppState>,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Response {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(body) => {
            req = req.header(header::CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_vec(&body).unwrap())
        }
        None => Body::empty(),
    };
    api::router(state.clone())
        .oneshot(req.body(body).unwrap())
        .await
        .unwrap()
}

/// Helper to read a response body as bytes
async fn body_bytes(resp: Response) -> Vec<u8> {
    resp.into_body().collect().await.unwrap().to_bytes().to_vec()
}

async fn send(
    state: &Arc<AppState>,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let resp = call(state, method, uri, token, body).await;
    let status = resp.status();
    let bytes = body_bytes(resp).await;
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Register, verify and log in; returns the user id and a bearer token.
async fn signed_up(state: &Arc<AppState>, name: &str) -> (Uuid, String) {
    let email = format!("{name}@example.com");
    let (status, _) = send(
        state,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "username": name, "email": email, "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let user = state
        .repo
        .find_user(UserKey::Email(&email))
        .await
        .unwrap()
        .unwrap();
    let token = user.verification_token.clone().unwrap();
    let (status, _) = send(
        state,
        "POST",
        "/api/auth/verify-email",
        None,
        Some(json!({ "token": token })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        state,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": email, "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    (user.id, body["token"].as_str().unwrap().to_string())
}

async fn create_contact(state: &Arc<AppState>, token: &str, body: Value) -> Value {
    let (status, body) = send(state, "POST", "/api/contacts", Some(token), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["contact"].clone()
}

#[tokio::test]
async fn test_login_requires_verified_email() {
    let state = test_state();
    let credentials = json!({ "email": "ada@example.com", "password": "secret123" });

    let (status, body) = send(
        &state,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "username": "ada", "email": "ada@example.com", "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["email"], "ada@example.com");

    let (status, body) = send(&state, "POST", "/api/auth/login", None, Some(credentials.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Please verify your email before logging in");

    let (status, body) = send(
        &state,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "ada@example.com", "password": "wrong-one" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid user credentials");

    let (_, token) = signed_up(&state, "grace").await;
    let (status, body) = send(&state, "GET", "/api/users/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "grace@example.com");
    assert_eq!(body["user"]["emailVerified"], true);
    assert!(body["user"].get("passwordHash").is_none());
}

#[tokio::test]
async fn test_register_validation_and_duplicates() {
    let state = test_state();

    let (status, body) = send(
        &state,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "username": "a", "email": "not-an-email", "password": "123" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Validation failed");
    assert_eq!(body["errors"].as_array().unwrap().len(), 3);

    signed_up(&state, "ada").await;
    let (status, body) = send(
        &state,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "username": "ada2", "email": "ADA@example.com", "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "User already exists");
}

#[tokio::test]
async fn test_requests_without_valid_token_are_rejected() {
    let state = test_state();

    let (status, body) = send(&state, "GET", "/api/contacts", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "No token provided");

    let (status, body) = send(&state, "GET", "/api/contacts", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid or expired token");
}

#[tokio::test]
async fn test_malformed_json_is_a_bad_request() {
    let state = test_state();
    let (_, token) = signed_up(&state, "ada").await;

    let req = Request::builder()
        .method("POST")
        .uri("/api/contacts")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ not json"))
        .unwrap();
    let resp = api::router(state.clone()).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_contact_and_label_edges() {
    let state = test_state();
    let (_, token) = signed_up(&state, "ada").await;

    let (status, body) = send(
        &state,
        "POST",
        "/api/labels",
        Some(&token),
        Some(json!({ "name": "Work" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let label_id = body["label"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["label"]["color"], "#aaa");

    let contact = create_contact(
        &state,
        &token,
        json!({ "firstname": "Jo", "lastname": "Lee", "phone": "555", "labels": [label_id] }),
    )
    .await;
    let contact_id = contact["id"].as_str().unwrap().to_string();
    assert_eq!(contact["labels"][0]["name"], "Work");

    let (_, body) = send(&state, "GET", &format!("/api/labels/{label_id}"), Some(&token), None).await;
    assert_eq!(body["label"]["contacts"][0]["firstname"], "Jo");

    let (status, body) = send(&state, "GET", "/api/contacts?search=JO&page=1&limit=5", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["pages"], 1);
    assert_eq!(body["contacts"][0]["id"], contact_id.as_str());

    let (status, body) = send(
        &state,
        "PUT",
        &format!("/api/contacts/{contact_id}"),
        Some(&token),
        Some(json!({ "labels": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["contact"]["labels"], json!([]));

    let (_, body) = send(&state, "GET", &format!("/api/labels/{label_id}"), Some(&token), None).await;
    assert_eq!(body["label"]["contacts"], json!([]));

    let (status, body) = send(
        &state,
        "POST",
        "/api/contacts",
        Some(&token),
        Some(json!({ "firstname": "No", "lastname": "Phone" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Firstname, lastname, and phone are required");
}

#[tokio::test]
async fn test_contacts_are_private_to_their_owner() {
    let state = test_state();
    let (_, ada) = signed_up(&state, "ada").await;
    let (_, bob) = signed_up(&state, "bob").await;

    let contact = create_contact(
        &state,
        &ada,
        json!({ "firstname": "Jo", "lastname": "Lee", "phone": "555" }),
    )
    .await;
    let uri = format!("/api/contacts/{}", contact["id"].as_str().unwrap());

    let (status, body) = send(&state, "GET", &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Contact not found");

    let (status, _) = send(&state, "DELETE", &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_merge_contacts() {
    let state = test_state();
    let (_, token) = signed_up(&state, "ada").await;

    let primary = create_contact(
        &state,
        &token,
        json!({ "firstname": "Jo", "lastname": "Lee", "phone": "555" }),
    )
    .await;
    let duplicate = create_contact(
        &state,
        &token,
        json!({ "firstname": "Joanna", "lastname": "Lee", "phone": "556", "email": "jo@example.com" }),
    )
    .await;

    let (status, body) = send(
        &state,
        "POST",
        "/api/contacts/merge",
        Some(&token),
        Some(json!({
            "primaryContactId": primary["id"],
            "duplicateContactIds": [duplicate["id"]],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["contact"]["firstname"], "Jo");
    assert_eq!(body["contact"]["email"], "jo@example.com");

    let (_, body) = send(&state, "GET", "/api/contacts", Some(&token), None).await;
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn test_share_workflow() {
    let state = test_state();
    let (_, ada) = signed_up(&state, "ada").await;
    let (bob_id, bob) = signed_up(&state, "bob").await;

    let contact = create_contact(
        &state,
        &ada,
        json!({ "firstname": "Jo", "lastname": "Lee", "phone": "555" }),
    )
    .await;
    let (status, body) = send(
        &state,
        "POST",
        &format!("/api/contacts/{}/share", contact["id"].as_str().unwrap()),
        Some(&ada),
        Some(json!({ "sharedWithUserId": bob_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["sharedContact"]["status"], "pending");
    assert_eq!(body["sharedContact"]["contacts"][0]["phone"], "555");
    let share_id = body["sharedContact"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(&state, "GET", "/api/notifications", Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["notifications"].as_array().unwrap().len(), 1);

    let accept = format!("/api/shared-contacts/{share_id}/accept");
    let (status, body) = send(&state, "PUT", &accept, Some(&ada), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Only the recipient can accept shared contacts");

    let (status, body) = send(&state, "PUT", &accept, Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Shared contact accepted");

    let (_, body) = send(
        &state,
        "GET",
        &format!("/api/shared-contacts/{share_id}/status"),
        Some(&ada),
        None,
    )
    .await;
    assert_eq!(body["status"], "accepted");

    let (_, body) = send(&state, "GET", "/api/shared-contacts/received?status=accepted", Some(&bob), None).await;
    assert_eq!(body["sharedContacts"].as_array().unwrap().len(), 1);
    let (_, body) = send(&state, "GET", "/api/shared-contacts/sent", Some(&bob), None).await;
    assert_eq!(body["sharedContacts"], json!([]));

    let (status, _) = send(
        &state,
        "DELETE",
        &format!("/api/shared-contacts/{share_id}"),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_export_download_after_completion() {
    let state = test_state();
    let (_, token) = signed_up(&state, "ada").await;
    create_contact(
        &state,
        &token,
        json!({ "firstname": "Jo", "lastname": "Lee", "phone": "555" }),
    )
    .await;

    let (status, body) = send(
        &state,
        "POST",
        "/api/exports",
        Some(&token),
        Some(json!({ "format": "pdf" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid format");

    let (status, body) = send(
        &state,
        "POST",
        "/api/exports",
        Some(&token),
        Some(json!({ "format": "vcf" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["export"]["status"], "in_progress");
    let id: Uuid = body["export"]["id"].as_str().unwrap().parse().unwrap();
    let download = format!("/api/exports/{id}/download");

    let (status, body) = send(&state, "GET", &download, Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Export not ready for download");

    state
        .repo
        .set_export_status(id, ExportStatus::Completed)
        .await
        .unwrap();

    let resp = call(&state, "GET", &download, Some(&token), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"export.vcf\""
    );
    assert!(resp.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/vcard"));
    let text = String::from_utf8(body_bytes(resp).await).unwrap();
    assert!(text.contains("FN:Jo Lee"));
}

#[tokio::test]
async fn test_import_contacts() {
    let state = test_state();
    let (_, token) = signed_up(&state, "ada").await;

    let (status, body) = send(
        &state,
        "POST",
        "/api/users/import-contacts",
        Some(&token),
        Some(json!({ "contacts": [
            { "firstname": "Jo", "lastname": "Lee", "phone": "+1 (555) 010-2030" },
            { "firstname": "Bad", "lastname": "Phone", "phone": "0abc" },
        ] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["importedCount"], 1);
    assert_eq!(body["skippedCount"], 1);
    assert_eq!(body["errors"][0], "Contact 2: Invalid phone number format");

    let (status, body) = send(
        &state,
        "POST",
        "/api/users/import-contacts",
        Some(&token),
        Some(json!({ "contacts": [{ "firstname": "Only" }] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No valid contacts to import");
    assert_eq!(body["errors"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_users_can_only_modify_themselves() {
    let state = test_state();
    let (ada_id, ada) = signed_up(&state, "ada").await;
    let (bob_id, _) = signed_up(&state, "bob").await;

    let (status, _) = send(
        &state,
        "PUT",
        &format!("/api/users/{bob_id}"),
        Some(&ada),
        Some(json!({ "username": "mallory" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &state,
        "PUT",
        &format!("/api/users/{ada_id}"),
        Some(&ada),
        Some(json!({ "username": "ada lovelace" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "ada lovelace");

    let (status, _) = send(&state, "DELETE", "/api/users/profile", Some(&ada), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&state, "GET", "/api/users/profile", Some(&ada), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_of_deleted_account_is_refused() {
    let state = test_state();
    let (ada_id, ada) = signed_up(&state, "ada").await;

    let (status, _) = send(&state, "DELETE", "/api/users/profile", Some(&ada), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &state,
        "POST",
        "/api/contacts",
        Some(&ada),
        Some(json!({ "firstname": "Jo", "lastname": "Lee", "phone": "555" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "User no longer exists");
    assert!(state.repo.list_contacts(&ContactQuery::new(ada_id)).await.unwrap().contacts.is_empty());
}

#[tokio::test]
async fn test_page_far_past_the_end() {
    let state = test_state();
    let (_, ada) = signed_up(&state, "ada").await;
    create_contact(
        &state,
        &ada,
        json!({ "firstname": "Jo", "lastname": "Lee", "phone": "555" }),
    )
    .await;

    let uri = format!("/api/contacts?page={}&limit=100", u64::MAX);
    let (status, body) = send(&state, "GET", &uri, Some(&ada), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["contacts"], json!([]));
}

#[tokio::test]
async fn test_settings_lifecycle() {
    let state = test_state();
    let (_, token) = signed_up(&state, "ada").await;

    let (status, _) = send(&state, "GET", "/api/settings", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &state,
        "POST",
        "/api/settings",
        Some(&token),
        Some(json!({ "theme": "dark" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["settings"]["theme"], "dark");
    assert_eq!(body["settings"]["notificationsEnabled"], true);

    let (status, body) = send(&state, "POST", "/api/settings", Some(&token), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Settings already exist");
}

#[tokio::test]
async fn test_google_sign_in_not_configured() {
    let state = test_state();
    let (status, body) = send(&state, "GET", "/api/auth/google", None, None).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    assert_eq!(body["message"], "Google sign-in is not configured");
}

#[tokio::test]
async fn test_password_reset_by_email_token() {
    let state = test_state();
    signed_up(&state, "ada").await;

    let (status, _) = send(
        &state,
        "POST",
        "/api/auth/forgot-password",
        None,
        Some(json!({ "email": "nobody@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &state,
        "POST",
        "/api/auth/forgot-password",
        None,
        Some(json!({ "email": "ada@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let user = state
        .repo
        .find_user(UserKey::Email("ada@example.com"))
        .await
        .unwrap()
        .unwrap();
    let (status, _) = send(
        &state,
        "POST",
        "/api/auth/reset-password/confirm",
        None,
        Some(json!({ "token": user.reset_token.unwrap(), "newPassword": "another-one" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &state,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "ada@example.com", "password": "another-one" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}
