//! Authentication: bearer tokens, password hashing and Google sign-in.

mod config;
mod google;
pub mod password;
mod token;

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use uuid::Uuid;

pub use config::OAuthConfig;
pub use google::{GoogleOAuth, GoogleProfile};
pub use token::{random_token, Claims, TokenService, TOKEN_TTL_DAYS};

use crate::error::AppError;
use crate::AppState;

/// The caller identified by a valid `Authorization: Bearer` token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::Unauthorized("No token provided".into()))?;

        let claims = state
            .tokens
            .verify(token.trim())
            .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))?;

        // Tokens outlive deleted accounts.
        if state.repo.store().get_user(claims.id).await?.is_none() {
            return Err(AppError::Unauthorized("User no longer exists".into()));
        }

        Ok(AuthUser {
            id: claims.id,
            email: claims.email,
        })
    }
}
