//! # Client-safe user projection
//!
//! [`UserInfo`] is what every endpoint returns for a user. It omits the password
//! hash and the verification and reset tokens that live on
//! [`store::models::User`], and reports whether a password or a Google identity
//! is attached instead of exposing either.

use chrono::{DateTime, Utc};
use serde::Serialize;
use store::models::{Preferences, User};
use uuid::Uuid;

/// User information safe to send to the client.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub avatar: String,
    pub email_verified: bool,
    pub has_password: bool,
    pub google_linked: bool,
    pub preferences: Preferences,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            avatar: user.avatar.clone(),
            email_verified: user.email_verified,
            has_password: user.password_hash.is_some(),
            google_linked: user.google_id.is_some(),
            preferences: user.preferences.clone(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}
