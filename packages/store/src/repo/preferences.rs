//! Settings documents and notifications.

use uuid::Uuid;

use super::Repository;
use crate::error::{Result, StoreError};
use crate::models::*;

impl Repository {
    pub async fn get_settings(&self, user: Uuid) -> Result<Settings> {
        self.store()
            .get_settings(user)
            .await?
            .ok_or(StoreError::NotFound("Settings"))
    }

    pub async fn create_settings(&self, user: Uuid, fields: SettingsFields) -> Result<Settings> {
        const EXISTS: &str = "Settings already exist";
        if self.store().get_settings(user).await?.is_some() {
            return Err(StoreError::Conflict(EXISTS.into()));
        }
        let settings = Settings::new(user, fields);
        match self.store().insert_settings(&settings).await {
            Err(StoreError::Duplicate(_)) => Err(StoreError::Conflict(EXISTS.into())),
            other => other.map(|_| settings),
        }
    }

    pub async fn update_settings(&self, user: Uuid, fields: SettingsFields) -> Result<Settings> {
        let mut settings = self.get_settings(user).await?;
        settings.apply(fields);
        self.store().update_settings(&settings).await?;
        Ok(settings)
    }

    pub async fn list_notifications(&self, user: Uuid) -> Result<Vec<Notification>> {
        self.store().list_notifications(user).await
    }

    pub async fn mark_notification_read(&self, user: Uuid, id: Uuid) -> Result<Notification> {
        self.store()
            .mark_notification_read(user, id)
            .await?
            .ok_or(StoreError::NotFound("Notification"))
    }

    /// Send `message` to each distinct user in `recipients`.
    pub(crate) async fn notify(
        &self,
        recipients: impl IntoIterator<Item = Uuid>,
        message: &str,
        kind: NotificationKind,
    ) -> Result<()> {
        let notifications: Vec<Notification> = dedup_ids(recipients)
            .into_iter()
            .map(|user| Notification::new(user, message, Some(kind)))
            .collect();
        self.store().insert_notifications(&notifications).await
    }
}
