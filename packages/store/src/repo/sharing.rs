//! Share offers between users.
//!
//! A share starts `pending` and the recipient moves it to `accepted` or
//! `rejected` exactly once. The sharer may withdraw it at any time.

use tracing::info;
use uuid::Uuid;

use super::{Repository, ShareQuery};
use crate::error::{Result, StoreError};
use crate::models::*;

/// Which side of a share the caller is listing from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShareScope {
    All,
    Sent,
    Received,
}

impl Repository {
    /// Offer `contacts` (owned by `sharer`) to `recipient` and notify them.
    pub async fn share_contacts(
        &self,
        sharer: Uuid,
        recipient: Uuid,
        contacts: Vec<Uuid>,
    ) -> Result<SharedContact> {
        let contacts = dedup_ids(contacts);
        if contacts.is_empty() {
            return Err(StoreError::Validation("At least one contact is required".into()));
        }
        if sharer == recipient {
            return Err(StoreError::Validation(
                "You cannot share contacts with yourself".into(),
            ));
        }
        let sender = self.get_user(sharer).await?;
        if self.store().get_user(recipient).await?.is_none() {
            return Err(StoreError::NotFound("Recipient"));
        }
        for id in &contacts {
            self.get_contact(sharer, *id).await?;
        }

        let overlapping = self
            .store()
            .find_shares(&ShareQuery {
                shared_by: Some(sharer),
                shared_with: Some(recipient),
                contacts_any: Some(contacts.clone()),
                status: Some(ShareStatus::Pending),
                ..Default::default()
            })
            .await?;
        if !overlapping.is_empty() {
            return Err(StoreError::Conflict(
                "Contact already shared with this user".into(),
            ));
        }

        let share = SharedContact::new(sharer, recipient, contacts);
        self.store().insert_share(&share).await?;
        self.notify(
            [recipient],
            &format!("{} shared a contact with you", sender.username),
            NotificationKind::ContactShared,
        )
        .await?;

        info!(share = %share.id, from = %sharer, to = %recipient, "contacts shared");
        Ok(share)
    }

    pub async fn list_shares(
        &self,
        user: Uuid,
        scope: ShareScope,
        status: Option<ShareStatus>,
    ) -> Result<Vec<SharedContact>> {
        let mut query = ShareQuery {
            status,
            ..Default::default()
        };
        match scope {
            ShareScope::All => query.involving = Some(user),
            ShareScope::Sent => query.shared_by = Some(user),
            ShareScope::Received => query.shared_with = Some(user),
        }
        self.store().find_shares(&query).await
    }

    /// A share visible to its sharer and its recipient.
    pub async fn get_share(&self, user: Uuid, id: Uuid) -> Result<SharedContact> {
        let share = self.load_share(id).await?;
        if !share.involves(user) {
            return Err(StoreError::Forbidden("Access denied".into()));
        }
        Ok(share)
    }

    pub async fn accept_share(&self, user: Uuid, id: Uuid) -> Result<SharedContact> {
        self.answer_share(user, id, ShareStatus::Accepted, "accept").await
    }

    pub async fn reject_share(&self, user: Uuid, id: Uuid) -> Result<SharedContact> {
        self.answer_share(user, id, ShareStatus::Rejected, "reject").await
    }

    pub async fn delete_share(&self, user: Uuid, id: Uuid) -> Result<()> {
        let share = self.load_share(id).await?;
        if share.shared_by_user_id != user {
            return Err(StoreError::Forbidden(
                "Only the sender can delete shared contacts".into(),
            ));
        }
        self.store().delete_shares(&[share.id]).await?;
        Ok(())
    }

    async fn load_share(&self, id: Uuid) -> Result<SharedContact> {
        self.store()
            .get_share(id)
            .await?
            .ok_or(StoreError::NotFound("Shared contact"))
    }

    async fn answer_share(
        &self,
        user: Uuid,
        id: Uuid,
        status: ShareStatus,
        verb: &str,
    ) -> Result<SharedContact> {
        let mut share = self.load_share(id).await?;
        if share.shared_with_user_id != user {
            return Err(StoreError::Forbidden(format!(
                "Only the recipient can {verb} shared contacts"
            )));
        }
        if share.status != ShareStatus::Pending {
            return Err(StoreError::Conflict(format!(
                "Shared contact is already {}",
                share.status
            )));
        }
        share.status = status;
        self.store().update_share(&share).await?;
        info!(share = %id, status = %status, "share answered");
        Ok(share)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;

    struct Fixture {
        repo: Repository,
        sharer: Uuid,
        recipient: Uuid,
        contact: Uuid,
    }

    async fn fixture() -> Fixture {
        let repo = repo();
        let sharer = user(&repo, "sam").await;
        let recipient = user(&repo, "rita").await;
        let contact = repo
            .create_contact(sharer, fields("Jo", "Lee", "555"), vec![])
            .await
            .unwrap()
            .id;
        Fixture {
            repo,
            sharer,
            recipient,
            contact,
        }
    }

    #[tokio::test]
    async fn test_share_notifies_recipient() {
        let f = fixture().await;
        let share = f
            .repo
            .share_contacts(f.sharer, f.recipient, vec![f.contact])
            .await
            .unwrap();
        assert_eq!(share.status, ShareStatus::Pending);

        let notes = f.repo.list_notifications(f.recipient).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].message, "sam shared a contact with you");
        assert_eq!(notes[0].kind.as_deref(), Some("contact_shared"));
    }

    #[tokio::test]
    async fn test_share_preconditions() {
        let f = fixture().await;
        let repo = &f.repo;

        assert!(matches!(
            repo.share_contacts(f.sharer, Uuid::new_v4(), vec![f.contact]).await,
            Err(StoreError::NotFound("Recipient"))
        ));
        assert!(matches!(
            repo.share_contacts(f.sharer, f.sharer, vec![f.contact]).await,
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            repo.share_contacts(f.recipient, f.sharer, vec![f.contact]).await,
            Err(StoreError::NotFound("Contact"))
        ));

        repo.share_contacts(f.sharer, f.recipient, vec![f.contact])
            .await
            .unwrap();
        let err = repo
            .share_contacts(f.sharer, f.recipient, vec![f.contact])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Contact already shared with this user");
    }

    #[tokio::test]
    async fn test_only_recipient_answers() {
        let f = fixture().await;
        let share = f
            .repo
            .share_contacts(f.sharer, f.recipient, vec![f.contact])
            .await
            .unwrap();

        assert!(matches!(
            f.repo.accept_share(f.sharer, share.id).await,
            Err(StoreError::Forbidden(_))
        ));
        let accepted = f.repo.accept_share(f.recipient, share.id).await.unwrap();
        assert_eq!(accepted.status, ShareStatus::Accepted);

        // Terminal once answered
        assert!(matches!(
            f.repo.reject_share(f.recipient, share.id).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_only_sharer_deletes() {
        let f = fixture().await;
        let share = f
            .repo
            .share_contacts(f.sharer, f.recipient, vec![f.contact])
            .await
            .unwrap();
        f.repo.reject_share(f.recipient, share.id).await.unwrap();

        assert!(matches!(
            f.repo.delete_share(f.recipient, share.id).await,
            Err(StoreError::Forbidden(_))
        ));
        f.repo.delete_share(f.sharer, share.id).await.unwrap();
        assert!(matches!(
            f.repo.get_share(f.sharer, share.id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_scopes_and_status_filter() {
        let f = fixture().await;
        let share = f
            .repo
            .share_contacts(f.sharer, f.recipient, vec![f.contact])
            .await
            .unwrap();

        let sent = f.repo.list_shares(f.sharer, ShareScope::Sent, None).await.unwrap();
        let received = f.repo.list_shares(f.sharer, ShareScope::Received, None).await.unwrap();
        let all = f.repo.list_shares(f.recipient, ShareScope::All, None).await.unwrap();
        assert_eq!(sent.len(), 1);
        assert!(received.is_empty());
        assert_eq!(all[0].id, share.id);

        let accepted = f
            .repo
            .list_shares(f.recipient, ShareScope::All, Some(ShareStatus::Accepted))
            .await
            .unwrap();
        assert!(accepted.is_empty());

        let stranger = Uuid::new_v4();
        assert!(matches!(
            f.repo.get_share(stranger, share.id).await,
            Err(StoreError::Forbidden(_))
        ));
    }
}
