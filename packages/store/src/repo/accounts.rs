//! User documents, profile edits, account removal and bulk contact import.

use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::{Repository, UserKey};
use crate::error::{Result, StoreError};
use crate::models::*;

/// Editable profile fields. Absent or blank values leave the stored value alone.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileFields {
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub avatar: Option<String>,
    pub preferences: Option<SettingsFields>,
}

/// One row of a bulk import request.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRow {
    #[serde(flatten)]
    pub fields: ContactFields,
    #[serde(default)]
    pub labels: Vec<Uuid>,
}

/// Outcome of a bulk import. Rows listed in `errors` were skipped.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImportReport {
    pub imported: Vec<Contact>,
    pub errors: Vec<String>,
}

impl ImportReport {
    pub fn skipped(&self) -> usize {
        self.errors.len()
    }
}

impl Repository {
    pub async fn get_user(&self, id: Uuid) -> Result<User> {
        self.store()
            .get_user(id)
            .await?
            .ok_or(StoreError::NotFound("User"))
    }

    pub async fn find_user(&self, key: UserKey<'_>) -> Result<Option<User>> {
        self.store().find_user(key).await
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.store().list_users().await
    }

    /// Insert a new account. Email and phone must not belong to anyone else.
    pub async fn register_user(&self, user: User) -> Result<User> {
        const EXISTS: &str = "User already exists";
        let taken = match self.find_user(UserKey::Email(&user.email)).await? {
            Some(_) => true,
            None => match user.phone.as_deref() {
                Some(phone) => self.find_user(UserKey::Phone(phone)).await?.is_some(),
                None => false,
            },
        };
        if taken {
            return Err(StoreError::Conflict(EXISTS.into()));
        }
        match self.store().insert_user(&user).await {
            Err(StoreError::Duplicate(_)) => Err(StoreError::Conflict(EXISTS.into())),
            other => other.map(|_| user),
        }
    }

    pub async fn save_user(&self, user: &User) -> Result<()> {
        self.store().update_user(user).await
    }

    pub async fn update_profile(&self, id: Uuid, fields: ProfileFields) -> Result<User> {
        let mut user = self.get_user(id).await?;

        if let Some(username) = fields.username.filter(|v| !is_blank(v)) {
            if username.trim().chars().count() < 2 {
                return Err(StoreError::Validation(
                    "Username must be at least 2 characters long".into(),
                ));
            }
            user.username = username.trim().to_string();
        }
        if let Some(email) = fields.email.filter(|v| !is_blank(v)) {
            user.email = email.trim().to_lowercase();
        }
        if let Some(phone) = fields.phone.filter(|v| !is_blank(v)) {
            user.phone = Some(phone.trim().to_string());
        }
        if let Some(avatar) = fields.avatar {
            user.avatar = avatar;
        }
        if let Some(preferences) = fields.preferences {
            if let Some(theme) = preferences.theme {
                user.preferences.theme = theme;
            }
            if let Some(enabled) = preferences.notifications_enabled {
                user.preferences.notifications_enabled = enabled;
            }
        }

        match self.store().update_user(&user).await {
            Err(StoreError::Duplicate(field)) => Err(StoreError::Conflict(format!(
                "Another account already uses this {field}"
            ))),
            other => other.map(|_| user),
        }
    }

    /// Remove an account and everything it owns or takes part in.
    pub async fn delete_account(&self, id: Uuid) -> Result<()> {
        let user = self.get_user(id).await?;
        self.store().purge_user_data(user.id).await?;
        self.store().delete_user(user.id).await?;
        info!(user = %id, "account deleted");
        Ok(())
    }

    /// Validate and insert `rows` as contacts of `owner`.
    ///
    /// Invalid rows are reported in [`ImportReport::errors`] and skipped. When no
    /// row survives, nothing is written and `imported` is empty.
    pub async fn import_contacts(&self, owner: Uuid, rows: Vec<ImportRow>) -> Result<ImportReport> {
        if rows.is_empty() {
            return Err(StoreError::Validation(
                "Contacts array is required and must not be empty".into(),
            ));
        }

        let mut report = ImportReport::default();
        let mut valid = Vec::new();
        for (index, row) in rows.into_iter().enumerate() {
            let n = index + 1;
            let contact = Contact::new(owner, row.fields, Vec::new());
            if !contact.has_required_fields() {
                report.errors.push(format!(
                    "Contact {n}: Missing required fields (firstname, lastname, phone)"
                ));
                continue;
            }
            if !is_valid_phone(&contact.phone) {
                report
                    .errors
                    .push(format!("Contact {n}: Invalid phone number format"));
                continue;
            }
            match self.owned_labels(owner, row.labels).await {
                Ok(labels) => valid.push(Contact { labels, ..contact }),
                Err(StoreError::InvalidReference(message)) => {
                    report.errors.push(format!("Contact {n}: {message}"));
                }
                Err(err) => return Err(err),
            }
        }
        if valid.is_empty() {
            return Ok(report);
        }

        if let Err(err) = self.store().insert_contacts(&valid).await {
            return match err {
                StoreError::Duplicate(field) => {
                    warn!(%field, "import hit a unique constraint");
                    Err(StoreError::Conflict(
                        "Some contacts could not be imported due to duplicate data".into(),
                    ))
                }
                other => Err(other),
            };
        }
        for contact in &valid {
            if !contact.labels.is_empty() {
                self.store()
                    .add_contact_to_labels(contact.id, &contact.labels)
                    .await?;
            }
        }

        info!(owner = %owner, imported = valid.len(), skipped = report.skipped(), "contacts imported");
        report.imported = valid;
        Ok(report)
    }
}

/// `^\+?[1-9]\d{0,15}$` once spaces, dashes and parentheses are removed.
pub fn is_valid_phone(phone: &str) -> bool {
    let cleaned: String = phone
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    let digits = cleaned.strip_prefix('+').unwrap_or(&cleaned);
    match digits.as_bytes() {
        [first, rest @ ..] => {
            (b'1'..=b'9').contains(first) && rest.len() <= 15 && rest.iter().all(u8::is_ascii_digit)
        }
        [] => false,
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::repo::ShareScope;

    fn row(first: &str, last: &str, phone: &str) -> ImportRow {
        ImportRow {
            fields: fields(first, last, phone),
            labels: vec![],
        }
    }

    #[test]
    fn test_phone_format() {
        assert!(is_valid_phone("+1 (555) 123-4567"));
        assert!(is_valid_phone("5551234567"));
        assert!(!is_valid_phone("0551234567"));
        assert!(!is_valid_phone("555-abc"));
        assert!(!is_valid_phone("+"));
        assert!(!is_valid_phone("12345678901234567"));
    }

    #[tokio::test]
    async fn test_register_rejects_taken_email_and_phone() {
        let repo = repo();
        let mut first = User::new("ada".into(), "ada@example.com".into());
        first.phone = Some("5551234567".into());
        repo.register_user(first).await.unwrap();

        let err = repo
            .register_user(User::new("ada2".into(), "ada@example.com".into()))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "User already exists");

        let mut second = User::new("bob".into(), "bob@example.com".into());
        second.phone = Some("5551234567".into());
        assert!(matches!(
            repo.register_user(second).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_import_skips_invalid_rows() {
        let repo = repo();
        let owner = Uuid::new_v4();
        let work = repo.create_label(owner, label("Work"), vec![]).await.unwrap();

        let rows = vec![
            ImportRow {
                labels: vec![work.id],
                ..row("Jo", "Lee", "+1 555 123 4567")
            },
            row("", "Lee", "5551234567"),
            row("Al", "Kay", "not-a-phone"),
            ImportRow {
                labels: vec![Uuid::new_v4()],
                ..row("Bo", "Ray", "5551234568")
            },
        ];
        let report = repo.import_contacts(owner, rows).await.unwrap();

        assert_eq!(report.imported.len(), 1);
        assert_eq!(report.skipped(), 3);
        assert_eq!(
            report.errors[0],
            "Contact 2: Missing required fields (firstname, lastname, phone)"
        );
        assert_eq!(report.errors[1], "Contact 3: Invalid phone number format");
        assert!(report.errors[2].starts_with("Contact 4: Label with id"));

        let label = repo.get_label(owner, work.id).await.unwrap();
        assert_eq!(label.contacts, vec![report.imported[0].id]);
    }

    #[tokio::test]
    async fn test_import_with_no_valid_rows_writes_nothing() {
        let repo = repo();
        let owner = Uuid::new_v4();
        let report = repo
            .import_contacts(owner, vec![row("Al", "Kay", "x")])
            .await
            .unwrap();
        assert!(report.imported.is_empty());
        assert_eq!(repo.store().all_contacts(owner, None).await.unwrap().len(), 0);

        assert!(matches!(
            repo.import_contacts(owner, vec![]).await,
            Err(StoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_profile_update_merges_preferences() {
        let repo = repo();
        let id = user(&repo, "ada").await;

        let updated = repo
            .update_profile(
                id,
                ProfileFields {
                    username: Some("Ada L".into()),
                    preferences: Some(SettingsFields {
                        theme: Some(Theme::Dark),
                        notifications_enabled: None,
                    }),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.username, "Ada L");
        assert_eq!(updated.email, "ada@example.com");
        assert_eq!(updated.preferences.theme, Theme::Dark);
        assert!(updated.preferences.notifications_enabled);

        assert!(matches!(
            repo.update_profile(id, ProfileFields { username: Some("A".into()), ..Default::default() }).await,
            Err(StoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_account_cascades() {
        let repo = repo();
        let owner = user(&repo, "owner").await;
        let friend = user(&repo, "friend").await;
        let contact = repo
            .create_contact(owner, fields("Jo", "Lee", "555"), vec![])
            .await
            .unwrap();
        repo.create_label(owner, label("Work"), vec![contact.id])
            .await
            .unwrap();
        repo.share_contacts(owner, friend, vec![contact.id])
            .await
            .unwrap();
        repo.create_settings(owner, SettingsFields::default())
            .await
            .unwrap();

        repo.delete_account(owner).await.unwrap();

        assert!(matches!(repo.get_user(owner).await, Err(StoreError::NotFound("User"))));
        assert!(repo.store().all_contacts(owner, None).await.unwrap().is_empty());
        assert!(repo.list_labels(owner).await.unwrap().is_empty());
        assert!(repo
            .list_shares(friend, ShareScope::Received, None)
            .await
            .unwrap()
            .is_empty());
        assert!(repo.get_settings(owner).await.is_err());
    }
}
