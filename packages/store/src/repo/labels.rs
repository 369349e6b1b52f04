//! Label CRUD. Edge maintenance mirrors [`contacts`](super::contacts) with the
//! roles swapped.

use tracing::info;
use uuid::Uuid;

use super::Repository;
use crate::error::{Result, StoreError};
use crate::models::*;

impl Repository {
    pub async fn list_labels(&self, owner: Uuid) -> Result<Vec<Label>> {
        self.store().list_labels(owner).await
    }

    pub async fn get_label(&self, owner: Uuid, id: Uuid) -> Result<Label> {
        self.store()
            .get_label(owner, id)
            .await?
            .ok_or(StoreError::NotFound("Label"))
    }

    pub async fn create_label(
        &self,
        owner: Uuid,
        fields: LabelFields,
        contacts: Vec<Uuid>,
    ) -> Result<Label> {
        if fields.name.as_deref().map_or(true, is_blank) {
            return Err(StoreError::Validation("Name is required".into()));
        }
        let contacts = self.owned_contacts(owner, contacts).await?;
        let label = Label::new(owner, fields, contacts);

        self.store().insert_label(&label).await?;
        self.store()
            .add_label_to_contacts(label.id, &label.contacts)
            .await?;

        info!(label = %label.id, owner = %owner, "label created");
        Ok(label)
    }

    pub async fn update_label(
        &self,
        owner: Uuid,
        id: Uuid,
        fields: LabelFields,
        contacts: Option<Vec<Uuid>>,
    ) -> Result<Label> {
        let mut label = self.get_label(owner, id).await?;

        let (to_add, to_remove) = match contacts {
            Some(contacts) => {
                let contacts = self.owned_contacts(owner, contacts).await?;
                let to_add = difference(&contacts, &label.contacts);
                let to_remove = difference(&label.contacts, &contacts);
                label.contacts = contacts;
                (to_add, to_remove)
            }
            None => (Vec::new(), Vec::new()),
        };
        label.apply(fields);

        self.store().update_label(&label).await?;
        if !to_add.is_empty() {
            self.store().add_label_to_contacts(label.id, &to_add).await?;
        }
        if !to_remove.is_empty() {
            self.store()
                .remove_label_from_contacts(label.id, &to_remove)
                .await?;
        }
        Ok(label)
    }

    pub async fn delete_label(&self, owner: Uuid, id: Uuid) -> Result<()> {
        let label = self.get_label(owner, id).await?;
        self.store().delete_label(owner, label.id).await?;
        self.store().pull_label_everywhere(label.id).await?;
        info!(label = %id, owner = %owner, "label deleted");
        Ok(())
    }

    async fn owned_contacts(&self, owner: Uuid, ids: Vec<Uuid>) -> Result<Vec<Uuid>> {
        let ids = dedup_ids(ids);
        if ids.is_empty() {
            return Ok(ids);
        }
        let found = self.store().get_contacts(&ids).await?;
        for id in &ids {
            if !found.iter().any(|c| c.id == *id && c.user_id == owner) {
                return Err(StoreError::InvalidReference(format!(
                    "Contact with id {id} does not exist or does not belong to user"
                )));
            }
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;

    #[tokio::test]
    async fn test_create_label_tags_contacts() {
        let repo = repo();
        let owner = Uuid::new_v4();
        let c = repo
            .create_contact(owner, fields("Jo", "Lee", "555"), vec![])
            .await
            .unwrap();

        let label = repo
            .create_label(owner, label("Family"), vec![c.id, c.id])
            .await
            .unwrap();

        assert_eq!(label.contacts, vec![c.id]);
        assert_eq!(repo.get_contact(owner, c.id).await.unwrap().labels, vec![label.id]);
    }

    #[tokio::test]
    async fn test_name_is_required() {
        let repo = repo();
        let err = repo
            .create_label(Uuid::new_v4(), LabelFields::default(), vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn test_foreign_contact_rejected() {
        let repo = repo();
        let other = repo
            .create_contact(Uuid::new_v4(), fields("Jo", "Lee", "555"), vec![])
            .await
            .unwrap();
        let err = repo
            .create_label(Uuid::new_v4(), label("Work"), vec![other.id])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidReference(_)));
    }

    #[tokio::test]
    async fn test_update_label_moves_edges() {
        let repo = repo();
        let owner = Uuid::new_v4();
        let a = repo
            .create_contact(owner, fields("A", "A", "1"), vec![])
            .await
            .unwrap();
        let b = repo
            .create_contact(owner, fields("B", "B", "2"), vec![])
            .await
            .unwrap();
        let work = repo.create_label(owner, label("Work"), vec![a.id]).await.unwrap();

        let updated = repo
            .update_label(
                owner,
                work.id,
                LabelFields {
                    color: Some("#f00".into()),
                    ..Default::default()
                },
                Some(vec![b.id]),
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Work");
        assert_eq!(updated.color, "#f00");
        assert!(repo.get_contact(owner, a.id).await.unwrap().labels.is_empty());
        assert_eq!(repo.get_contact(owner, b.id).await.unwrap().labels, vec![work.id]);
    }

    #[tokio::test]
    async fn test_delete_label_strips_contacts() {
        let repo = repo();
        let owner = Uuid::new_v4();
        let work = repo.create_label(owner, label("Work"), vec![]).await.unwrap();
        let c = repo
            .create_contact(owner, fields("Jo", "Lee", "555"), vec![work.id])
            .await
            .unwrap();

        repo.delete_label(owner, work.id).await.unwrap();

        assert!(repo.get_contact(owner, c.id).await.unwrap().labels.is_empty());
        assert!(matches!(
            repo.get_label(owner, work.id).await,
            Err(StoreError::NotFound("Label"))
        ));
    }

    #[tokio::test]
    async fn test_other_users_label_is_not_found() {
        let repo = repo();
        let work = repo
            .create_label(Uuid::new_v4(), label("Work"), vec![])
            .await
            .unwrap();
        assert!(matches!(
            repo.delete_label(Uuid::new_v4(), work.id).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
