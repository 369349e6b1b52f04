//! # Documents stored by Pingbook
//!
//! Every collection the backend persists is modelled here as a plain struct with a
//! generated [`Uuid`] identifier and `created_at`/`updated_at` audit timestamps.
//! Referential fields are ids, never embedded documents.
//!
//! | Struct | Collection | Notes |
//! |--------|-----------|-------|
//! | [`User`] | users | Password hash, verification and reset tokens never leave the server. Display preferences are embedded. |
//! | [`Contact`] | contacts | Owned by one user. `labels` is one side of the contact↔label relation. |
//! | [`Label`] | labels | Owned by one user. `contacts` is the inverse side and must mirror `Contact::labels`. |
//! | [`SharedContact`] | shared_contacts | A share offer from one user to another covering one or more contacts. |
//! | [`Settings`] | settings | One per user. |
//! | [`Notification`] | notifications | Append-only; only `is_read` ever changes. |
//! | [`Export`] | exports | An export job record. |
//!
//! The string-valued enums ([`Theme`], [`ShareStatus`], [`ExportFormat`],
//! [`ExportStatus`]) serialise to the same lowercase tags they are stored under, and
//! round-trip through [`FromStr`] so storage backends can keep them as text columns.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;

/// Color given to labels created without one.
pub const DEFAULT_LABEL_COLOR: &str = "#aaa";

/// A registered account.
#[derive(Clone, Debug, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    /// Argon2 PHC string; `None` for accounts created through Google.
    pub password_hash: Option<String>,
    pub avatar: String,
    pub email_verified: bool,
    pub verification_token: Option<String>,
    pub verification_token_expires: Option<DateTime<Utc>>,
    pub reset_token: Option<String>,
    pub reset_token_expires: Option<DateTime<Utc>>,
    pub google_id: Option<String>,
    pub preferences: Preferences,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A fresh, unverified account with no credential attached.
    pub fn new(username: String, email: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username,
            email,
            phone: None,
            password_hash: None,
            avatar: String::new(),
            email_verified: false,
            verification_token: None,
            verification_token_expires: None,
            reset_token: None,
            reset_token_expires: None,
            google_id: None,
            preferences: Preferences::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Display preferences embedded on the user document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub theme: Theme,
    pub notifications_enabled: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            notifications_enabled: true,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

impl FromStr for Theme {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(StoreError::Validation(format!("Invalid theme: {other}"))),
        }
    }
}

/// A person in a user's address book.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: Uuid,
    pub user_id: Uuid,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub photo_url: String,
    pub labels: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    /// Build a contact from request fields. Missing optional fields become empty strings.
    pub fn new(owner: Uuid, fields: ContactFields, labels: Vec<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: owner,
            firstname: fields.firstname.unwrap_or_default().trim().to_string(),
            lastname: fields.lastname.unwrap_or_default().trim().to_string(),
            email: fields.email.unwrap_or_default().trim().to_string(),
            phone: fields.phone.unwrap_or_default().trim().to_string(),
            address: fields.address.unwrap_or_default().trim().to_string(),
            photo_url: fields.photo_url.unwrap_or_default().trim().to_string(),
            labels,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite every field that is present and non-blank in `fields`.
    pub fn apply(&mut self, fields: ContactFields) {
        fn set(target: &mut String, value: Option<String>) {
            if let Some(value) = value.filter(|v| !is_blank(v)) {
                *target = value.trim().to_string();
            }
        }
        set(&mut self.firstname, fields.firstname);
        set(&mut self.lastname, fields.lastname);
        set(&mut self.email, fields.email);
        set(&mut self.phone, fields.phone);
        set(&mut self.address, fields.address);
        set(&mut self.photo_url, fields.photo_url);
    }

    /// Firstname, lastname and phone are the fields a contact cannot exist without.
    pub fn has_required_fields(&self) -> bool {
        !is_blank(&self.firstname) && !is_blank(&self.lastname) && !is_blank(&self.phone)
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.firstname, self.lastname).trim().to_string()
    }
}

/// Scalar contact fields as they arrive in a create or update request.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactFields {
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub photo_url: Option<String>,
}

/// A user-defined grouping of contacts.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub color: String,
    pub description: String,
    pub contacts: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Label {
    pub fn new(owner: Uuid, fields: LabelFields, contacts: Vec<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: owner,
            name: fields.name.unwrap_or_default().trim().to_string(),
            color: fields
                .color
                .filter(|c| !is_blank(c))
                .unwrap_or_else(|| DEFAULT_LABEL_COLOR.to_string()),
            description: fields.description.unwrap_or_default(),
            contacts,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, fields: LabelFields) {
        if let Some(name) = fields.name.filter(|v| !is_blank(v)) {
            self.name = name.trim().to_string();
        }
        if let Some(color) = fields.color.filter(|v| !is_blank(v)) {
            self.color = color;
        }
        if let Some(description) = fields.description.filter(|v| !is_blank(v)) {
            self.description = description;
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelFields {
    pub name: Option<String>,
    pub color: Option<String>,
    pub description: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ShareStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShareStatus::Pending => "pending",
            ShareStatus::Accepted => "accepted",
            ShareStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for ShareStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ShareStatus::Pending),
            "accepted" => Ok(ShareStatus::Accepted),
            "rejected" => Ok(ShareStatus::Rejected),
            other => Err(StoreError::Validation(format!("Invalid status: {other}"))),
        }
    }
}

impl fmt::Display for ShareStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A share offer from `shared_by_user_id` to `shared_with_user_id`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedContact {
    pub id: Uuid,
    pub shared_by_user_id: Uuid,
    pub shared_with_user_id: Uuid,
    pub contacts: Vec<Uuid>,
    pub status: ShareStatus,
    pub shared_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SharedContact {
    pub fn new(sharer: Uuid, recipient: Uuid, contacts: Vec<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            shared_by_user_id: sharer,
            shared_with_user_id: recipient,
            contacts,
            status: ShareStatus::Pending,
            shared_at: now,
            updated_at: now,
        }
    }

    pub fn involves(&self, user: Uuid) -> bool {
        self.shared_by_user_id == user || self.shared_with_user_id == user
    }
}

/// Per-user settings document.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub id: Uuid,
    pub user_id: Uuid,
    pub theme: Theme,
    pub notifications_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Settings {
    pub fn new(user_id: Uuid, fields: SettingsFields) -> Self {
        let now = Utc::now();
        let defaults = Preferences::default();
        Self {
            id: Uuid::new_v4(),
            user_id,
            theme: fields.theme.unwrap_or(defaults.theme),
            notifications_enabled: fields
                .notifications_enabled
                .unwrap_or(defaults.notifications_enabled),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, fields: SettingsFields) {
        if let Some(theme) = fields.theme {
            self.theme = theme;
        }
        if let Some(enabled) = fields.notifications_enabled {
            self.notifications_enabled = enabled;
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsFields {
    pub theme: Option<Theme>,
    pub notifications_enabled: Option<bool>,
}

/// Type tags attached to system-generated notifications.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationKind {
    ContactShared,
    ContactDeleted,
    ContactsMerged,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::ContactShared => "contact_shared",
            NotificationKind::ContactDeleted => "contact_deleted",
            NotificationKind::ContactsMerged => "contacts_merged",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub message: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(user_id: Uuid, message: impl Into<String>, kind: Option<NotificationKind>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            message: message.into(),
            kind: kind.map(|k| k.as_str().to_string()),
            is_read: false,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Vcf,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Vcf => "vcf",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Vcf => "text/vcard; charset=utf-8",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "csv" => Ok(ExportFormat::Csv),
            "vcf" => Ok(ExportFormat::Vcf),
            _ => Err(StoreError::Validation("Invalid format".to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStatus {
    InProgress,
    Completed,
    Failed,
}

impl ExportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportStatus::InProgress => "in_progress",
            ExportStatus::Completed => "completed",
            ExportStatus::Failed => "failed",
        }
    }
}

impl FromStr for ExportStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(ExportStatus::InProgress),
            "completed" => Ok(ExportStatus::Completed),
            "failed" => Ok(ExportStatus::Failed),
            other => Err(StoreError::Validation(format!("Invalid export status: {other}"))),
        }
    }
}

/// A requested export of a user's contacts.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Export {
    pub id: Uuid,
    pub user_id: Uuid,
    pub file_path: String,
    pub format: ExportFormat,
    pub status: ExportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Export {
    pub fn new(user_id: Uuid, format: ExportFormat, label_id: Option<Uuid>) -> Self {
        let now = Utc::now();
        let id = Uuid::new_v4();
        Self {
            id,
            user_id,
            file_path: format!("exports/{id}.{}", format.as_str()),
            format,
            status: ExportStatus::InProgress,
            label_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// True when the value is empty or only whitespace.
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Order-preserving deduplication of an id list.
pub fn dedup_ids(ids: impl IntoIterator<Item = Uuid>) -> Vec<Uuid> {
    let mut out: Vec<Uuid> = Vec::new();
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

/// Ids in `left` that are not in `right`, in `left` order.
pub fn difference(left: &[Uuid], right: &[Uuid]) -> Vec<Uuid> {
    left.iter().filter(|id| !right.contains(id)).copied().collect()
}
