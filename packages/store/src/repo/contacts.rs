//! Contact CRUD and the contact side of the contact↔label relation.

use tracing::{debug, info};
use uuid::Uuid;

use super::{ContactPage, ContactQuery, Repository, ShareQuery};
use crate::error::{Result, StoreError};
use crate::models::*;

const REQUIRED_FIELDS: &str = "Firstname, lastname, and phone are required";

impl Repository {
    pub async fn list_contacts(&self, query: &ContactQuery) -> Result<ContactPage> {
        self.store().find_contacts(query).await
    }

    pub async fn get_contact(&self, owner: Uuid, id: Uuid) -> Result<Contact> {
        self.store()
            .get_contact(owner, id)
            .await?
            .ok_or(StoreError::NotFound("Contact"))
    }

    /// Create a contact and add it to every label in `labels`.
    ///
    /// All labels are checked before anything is written.
    pub async fn create_contact(
        &self,
        owner: Uuid,
        fields: ContactFields,
        labels: Vec<Uuid>,
    ) -> Result<Contact> {
        let labels = self.owned_labels(owner, labels).await?;
        let contact = Contact::new(owner, fields, labels);
        if !contact.has_required_fields() {
            return Err(StoreError::Validation(REQUIRED_FIELDS.into()));
        }

        self.store().insert_contacts(std::slice::from_ref(&contact)).await?;
        self.store()
            .add_contact_to_labels(contact.id, &contact.labels)
            .await?;

        info!(contact = %contact.id, owner = %owner, "contact created");
        Ok(contact)
    }

    /// Partial update. When `labels` is given the contact's label set is replaced
    /// and only the difference is applied to the labels themselves.
    pub async fn update_contact(
        &self,
        owner: Uuid,
        id: Uuid,
        fields: ContactFields,
        labels: Option<Vec<Uuid>>,
    ) -> Result<Contact> {
        let mut contact = self.get_contact(owner, id).await?;

        let (to_add, to_remove) = match labels {
            Some(labels) => {
                let labels = self.owned_labels(owner, labels).await?;
                let to_add = difference(&labels, &contact.labels);
                let to_remove = difference(&contact.labels, &labels);
                contact.labels = labels;
                (to_add, to_remove)
            }
            None => (Vec::new(), Vec::new()),
        };
        contact.apply(fields);

        self.store().update_contact(&contact).await?;
        if !to_add.is_empty() {
            self.store().add_contact_to_labels(contact.id, &to_add).await?;
        }
        if !to_remove.is_empty() {
            self.store()
                .remove_contact_from_labels(contact.id, &to_remove)
                .await?;
        }

        debug!(contact = %id, added = to_add.len(), removed = to_remove.len(), "contact updated");
        Ok(contact)
    }

    /// Delete a contact, detach it from its labels and retire every share naming it.
    pub async fn delete_contact(&self, owner: Uuid, id: Uuid) -> Result<()> {
        let contact = self.get_contact(owner, id).await?;

        self.store().delete_contacts(owner, &[contact.id]).await?;
        self.store().pull_contacts_everywhere(&[contact.id]).await?;
        self.retire_shares(
            &[contact.id],
            "A shared contact has been deleted by the owner",
            NotificationKind::ContactDeleted,
        )
        .await?;

        info!(contact = %id, owner = %owner, "contact deleted");
        Ok(())
    }

    /// Fold `duplicates` into `primary`.
    ///
    /// Blank primary fields take the first non-blank value among the duplicates in
    /// the given order, and the label sets are unioned. Every lookup and the
    /// required-field check happen before the first write.
    pub async fn merge_contacts(
        &self,
        owner: Uuid,
        primary: Uuid,
        duplicates: &[Uuid],
    ) -> Result<Contact> {
        if duplicates.is_empty() {
            return Err(StoreError::Validation(
                "Primary contact id and duplicate contact ids are required".into(),
            ));
        }
        if duplicates.contains(&primary) {
            return Err(StoreError::Validation(
                "A contact cannot be merged into itself".into(),
            ));
        }
        let duplicate_ids = dedup_ids(duplicates.iter().copied());

        let mut merged = self.get_contact(owner, primary).await?;
        let mut sources = Vec::with_capacity(duplicate_ids.len());
        for id in &duplicate_ids {
            sources.push(self.get_contact(owner, *id).await?);
        }

        let original_labels = merged.labels.clone();
        for source in &sources {
            fill_blank(&mut merged.firstname, &source.firstname);
            fill_blank(&mut merged.lastname, &source.lastname);
            fill_blank(&mut merged.email, &source.email);
            fill_blank(&mut merged.phone, &source.phone);
            fill_blank(&mut merged.address, &source.address);
            fill_blank(&mut merged.photo_url, &source.photo_url);
        }
        merged.labels = dedup_ids(
            original_labels
                .iter()
                .chain(sources.iter().flat_map(|s| s.labels.iter()))
                .copied(),
        );
        if !merged.has_required_fields() {
            return Err(StoreError::Validation(
                "Merged contact is missing firstname, lastname, or phone".into(),
            ));
        }

        self.store().update_contact(&merged).await?;
        self.store().delete_contacts(owner, &duplicate_ids).await?;
        self.store().pull_contacts_everywhere(&duplicate_ids).await?;
        let gained = difference(&merged.labels, &original_labels);
        if !gained.is_empty() {
            self.store().add_contact_to_labels(merged.id, &gained).await?;
        }
        self.retire_shares(
            &duplicate_ids,
            "A shared contact has been merged by the owner",
            NotificationKind::ContactsMerged,
        )
        .await?;

        info!(contact = %primary, merged = duplicate_ids.len(), "contacts merged");
        Ok(merged)
    }

    /// Deduplicate `ids` and check each one names a label owned by `owner`.
    pub(crate) async fn owned_labels(&self, owner: Uuid, ids: Vec<Uuid>) -> Result<Vec<Uuid>> {
        let ids = dedup_ids(ids);
        if ids.is_empty() {
            return Ok(ids);
        }
        let found = self.store().get_labels(&ids).await?;
        for id in &ids {
            if !found.iter().any(|l| l.id == *id && l.user_id == owner) {
                return Err(StoreError::InvalidReference(format!(
                    "Label with id {id} does not exist or does not belong to user"
                )));
            }
        }
        Ok(ids)
    }

    /// Delete every share naming one of `contacts`, telling each distinct
    /// recipient once.
    async fn retire_shares(
        &self,
        contacts: &[Uuid],
        message: &str,
        kind: NotificationKind,
    ) -> Result<()> {
        let shares = self
            .store()
            .find_shares(&ShareQuery {
                contacts_any: Some(contacts.to_vec()),
                ..Default::default()
            })
            .await?;
        if shares.is_empty() {
            return Ok(());
        }

        self.notify(shares.iter().map(|s| s.shared_with_user_id), message, kind)
            .await?;
        let ids: Vec<Uuid> = shares.iter().map(|s| s.id).collect();
        self.store().delete_shares(&ids).await?;
        Ok(())
    }
}

fn fill_blank(target: &mut String, candidate: &str) {
    if is_blank(target) && !is_blank(candidate) {
        *target = candidate.to_string();
    }
}
