//! Registration, login, email verification, password management and Google sign-in.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Redirect;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use store::models::{is_blank, User};
use store::repo::UserKey;
use tracing::info;

use super::{created, Reply};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::{random_token, AuthUser, GoogleProfile};
use crate::error::{ApiResult, AppError};
use crate::extract::{AppJson, Query};
use crate::mail::Email;
use crate::models::UserInfo;
use crate::AppState;

/// Lifetime of verification and password reset tokens.
const ONE_TIME_TOKEN_TTL_HOURS: i64 = 1;
const MIN_PASSWORD_LEN: usize = 6;
const MIN_USERNAME_LEN: usize = 2;
const MIN_PHONE_LEN: usize = 10;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/verify-email", post(verify_email))
        .route("/resend-email", post(resend_email))
        .route("/reset-password", put(reset_password))
        .route("/reset-password/confirm", post(confirm_reset))
        .route("/set-password", post(set_password))
        .route("/forgot-password", post(forgot_password))
        .route("/google", get(google_login))
        .route("/google/callback", get(google_callback))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RegisterRequest {
    username: String,
    email: String,
    password: String,
    phone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TokenRequest {
    token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EmailRequest {
    email: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ResetPasswordRequest {
    current_password: String,
    new_password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SetPasswordRequest {
    new_password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ConfirmResetRequest {
    token: String,
    new_password: String,
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: String,
    state: String,
}

/// Minimal address check: one `@`, a non-empty local part and a dotted domain.
pub(crate) fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && domain.split('.').all(|part| !part.is_empty())
}

fn check(errors: Vec<&str>) -> Result<(), AppError> {
    if errors.is_empty() {
        return Ok(());
    }
    Err(AppError::Rejected {
        message: "Validation failed".into(),
        errors: errors.into_iter().map(String::from).collect(),
    })
}

fn password_error(password: &str, message: &'static str) -> Option<&'static str> {
    (password.trim().chars().count() < MIN_PASSWORD_LEN).then_some(message)
}

fn expires_in_an_hour() -> chrono::DateTime<Utc> {
    Utc::now() + Duration::hours(ONE_TIME_TOKEN_TTL_HOURS)
}

async fn register(
    State(state): State<Arc<AppState>>,
    AppJson(body): AppJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Reply)> {
    let username = body.username.trim();
    let email = body.email.trim().to_lowercase();
    let phone = body.phone.as_deref().map(str::trim).filter(|p| !p.is_empty());

    let mut errors = Vec::new();
    if username.chars().count() < MIN_USERNAME_LEN {
        errors.push("Username must be at least 2 characters long");
    }
    if !is_valid_email(&email) {
        errors.push("Please enter a valid email address");
    }
    errors.extend(password_error(
        &body.password,
        "Password must be at least 6 characters long",
    ));
    if phone.is_some_and(|p| p.chars().count() < MIN_PHONE_LEN) {
        errors.push("Phone number must be at least 10 characters long");
    }
    check(errors)?;

    let token = random_token();
    let mut user = User::new(username.to_string(), email);
    user.phone = phone.map(String::from);
    user.password_hash = Some(hash_password(&body.password)?);
    user.verification_token = Some(token.clone());
    user.verification_token_expires = Some(expires_in_an_hour());

    let user = state.repo.register_user(user).await?;
    info!(user = %user.id, "user registered");
    state
        .send_mail(Email::verification(
            &state.settings.frontend.url,
            &user.email,
            &token,
        ))
        .await;

    Ok(created(json!({
        "success": true,
        "message": "Registration successful! Please check your email to verify your account.",
        "user": { "id": user.id, "username": user.username, "email": user.email },
    })))
}

async fn login(
    State(state): State<Arc<AppState>>,
    AppJson(body): AppJson<LoginRequest>,
) -> ApiResult<Reply> {
    const INVALID: &str = "Invalid user credentials";

    let mut errors = Vec::new();
    if !is_valid_email(body.email.trim()) {
        errors.push("Please enter a valid email address");
    }
    if is_blank(&body.password) {
        errors.push("Password is required");
    }
    check(errors)?;

    let user = state
        .repo
        .find_user(UserKey::Email(body.email.trim()))
        .await?
        .ok_or_else(|| AppError::BadRequest(INVALID.into()))?;
    let hash = user
        .password_hash
        .as_deref()
        .ok_or_else(|| AppError::BadRequest(INVALID.into()))?;
    if !verify_password(&body.password, hash)? {
        return Err(AppError::BadRequest(INVALID.into()));
    }
    if !user.email_verified {
        return Err(AppError::Forbidden(
            "Please verify your email before logging in".into(),
        ));
    }

    let token = state.tokens.issue(user.id, &user.email)?;
    info!(user = %user.id, "login");
    Ok(Json(json!({
        "success": true,
        "message": "Login successful",
        "token": token,
        "user": UserInfo::from(&user),
    })))
}

async fn verify_email(
    State(state): State<Arc<AppState>>,
    AppJson(body): AppJson<TokenRequest>,
) -> ApiResult<Reply> {
    let token = body.token.trim();
    check(if token.is_empty() {
        vec!["Verification token is required"]
    } else {
        vec![]
    })?;

    let invalid = || AppError::BadRequest("Invalid or expired verification token".into());
    let mut user = state
        .repo
        .find_user(UserKey::VerificationToken(token))
        .await?
        .ok_or_else(invalid)?;
    if user.verification_token_expires.map_or(true, |at| at <= Utc::now()) {
        return Err(invalid());
    }

    user.email_verified = true;
    user.verification_token = None;
    user.verification_token_expires = None;
    state.repo.save_user(&user).await?;
    info!(user = %user.id, "email verified");
    Ok(Json(json!({ "success": true, "message": "Email verified successfully" })))
}

async fn resend_email(
    State(state): State<Arc<AppState>>,
    AppJson(body): AppJson<EmailRequest>,
) -> ApiResult<Reply> {
    let email = body.email.trim();
    check(if is_valid_email(email) {
        vec![]
    } else {
        vec!["Please enter a valid email address"]
    })?;

    let mut user = state
        .repo
        .find_user(UserKey::Email(email))
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    if user.email_verified {
        return Err(AppError::BadRequest("Email is already verified".into()));
    }

    let token = random_token();
    user.verification_token = Some(token.clone());
    user.verification_token_expires = Some(expires_in_an_hour());
    state.repo.save_user(&user).await?;
    state
        .send_mail(Email::verification(
            &state.settings.frontend.url,
            &user.email,
            &token,
        ))
        .await;
    Ok(Json(json!({ "success": true, "message": "Verification email sent" })))
}

async fn reset_password(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    AppJson(body): AppJson<ResetPasswordRequest>,
) -> ApiResult<Reply> {
    let mut errors = Vec::new();
    if is_blank(&body.current_password) {
        errors.push("Current password is required");
    }
    errors.extend(password_error(
        &body.new_password,
        "New password must be at least 6 characters long",
    ));
    check(errors)?;

    let mut user = state.repo.get_user(caller.id).await?;
    let hash = user.password_hash.as_deref().ok_or_else(|| {
        AppError::BadRequest(
            "This account is authenticated via Google. Please use the 'Set Password' feature to create a password."
                .into(),
        )
    })?;
    if !verify_password(&body.current_password, hash)? {
        return Err(AppError::BadRequest("Current password is incorrect".into()));
    }

    user.password_hash = Some(hash_password(&body.new_password)?);
    state.repo.save_user(&user).await?;
    info!(user = %user.id, "password changed");
    Ok(Json(json!({ "success": true, "message": "Password reset successfully" })))
}

async fn set_password(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    AppJson(body): AppJson<SetPasswordRequest>,
) -> ApiResult<Reply> {
    check(
        password_error(&body.new_password, "New password must be at least 6 characters long")
            .into_iter()
            .collect(),
    )?;

    let mut user = state.repo.get_user(caller.id).await?;
    if user.password_hash.is_some() {
        return Err(AppError::BadRequest(
            "Password already set. Use the 'Reset Password' feature to change it.".into(),
        ));
    }

    user.password_hash = Some(hash_password(&body.new_password)?);
    state.repo.save_user(&user).await?;
    info!(user = %user.id, "password set");
    Ok(Json(json!({ "success": true, "message": "Password has been set successfully." })))
}

async fn forgot_password(
    State(state): State<Arc<AppState>>,
    AppJson(body): AppJson<EmailRequest>,
) -> ApiResult<Reply> {
    let email = body.email.trim();
    if let Some(mut user) = state.repo.find_user(UserKey::Email(email)).await? {
        let token = random_token();
        user.reset_token = Some(token.clone());
        user.reset_token_expires = Some(expires_in_an_hour());
        state.repo.save_user(&user).await?;
        state
            .send_mail(Email::password_reset(
                &state.settings.frontend.url,
                &user.email,
                &token,
            ))
            .await;
        info!(user = %user.id, "password reset requested");
    }
    Ok(Json(json!({
        "success": true,
        "message": "If an account exists for this email, a password reset link has been sent.",
    })))
}

async fn confirm_reset(
    State(state): State<Arc<AppState>>,
    AppJson(body): AppJson<ConfirmResetRequest>,
) -> ApiResult<Reply> {
    let token = body.token.trim();
    let mut errors = Vec::new();
    if token.is_empty() {
        errors.push("Reset token is required");
    }
    errors.extend(password_error(
        &body.new_password,
        "New password must be at least 6 characters long",
    ));
    check(errors)?;

    let invalid = || AppError::BadRequest("Invalid or expired reset token".into());
    let mut user = state
        .repo
        .find_user(UserKey::ResetToken(token))
        .await?
        .ok_or_else(invalid)?;
    if user.reset_token_expires.map_or(true, |at| at <= Utc::now()) {
        return Err(invalid());
    }

    user.password_hash = Some(hash_password(&body.new_password)?);
    user.reset_token = None;
    user.reset_token_expires = None;
    state.repo.save_user(&user).await?;
    info!(user = %user.id, "password reset");
    Ok(Json(json!({ "success": true, "message": "Password reset successfully" })))
}

fn google_unavailable() -> AppError {
    AppError::NotImplemented("Google sign-in is not configured".into())
}

async fn google_login(State(state): State<Arc<AppState>>) -> ApiResult<Redirect> {
    let google = state.google.as_ref().ok_or_else(google_unavailable)?;
    Ok(Redirect::to(&google.authorize_url().await))
}

async fn google_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> ApiResult<Reply> {
    let google = state.google.as_ref().ok_or_else(google_unavailable)?;
    let profile = google.exchange_code(&params.code, &params.state).await?;
    let user = google_account(&state, profile).await?;

    let token = state.tokens.issue(user.id, &user.email)?;
    info!(user = %user.id, "Google login");
    Ok(Json(json!({
        "success": true,
        "message": "Login successful",
        "token": token,
        "user": UserInfo::from(&user),
    })))
}

/// The local account for a Google profile: found by Google id, else linked by
/// email, else created already verified.
async fn google_account(state: &AppState, profile: GoogleProfile) -> Result<User, AppError> {
    let picture = profile.picture.filter(|p| !p.is_empty());

    if let Some(mut user) = state
        .repo
        .find_user(UserKey::GoogleId(&profile.id))
        .await?
    {
        if let Some(picture) = picture.filter(|p| *p != user.avatar) {
            user.avatar = picture;
            state.repo.save_user(&user).await?;
        }
        return Ok(user);
    }

    if let Some(mut user) = state.repo.find_user(UserKey::Email(&profile.email)).await? {
        user.google_id = Some(profile.id);
        user.email_verified = true;
        if user.avatar.is_empty() {
            user.avatar = picture.unwrap_or_default();
        }
        state.repo.save_user(&user).await?;
        info!(user = %user.id, "Google identity linked");
        return Ok(user);
    }

    let username = profile
        .name
        .filter(|n| !is_blank(n))
        .unwrap_or_else(|| {
            profile
                .email
                .split('@')
                .next()
                .unwrap_or_default()
                .to_string()
        });
    let mut user = User::new(username, profile.email.to_lowercase());
    user.google_id = Some(profile.id);
    user.avatar = picture.unwrap_or_default();
    user.email_verified = true;
    Ok(state.repo.register_user(user).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("ada@example.com"));
        assert!(is_valid_email("a.b+c@mail.example.org"));
        assert!(!is_valid_email("ada@example"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("ada@@example.com"));
        assert!(!is_valid_email("ada @example.com"));
        assert!(!is_valid_email("ada@example."));
    }
}
