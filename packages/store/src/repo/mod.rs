//! # Repository: domain operations on an abstract document store
//!
//! [`Repository`] is the only place Pingbook mutates data. Handlers never talk to a
//! storage backend directly; they call a repository method, which validates the
//! request, performs the reads and writes through the [`DocumentStore`] trait, and
//! returns a domain document or a [`StoreError`]. The same logic therefore runs
//! against the in-memory store (tests, local development) and PostgreSQL.
//!
//! ## [`DocumentStore`] trait
//!
//! A collection-oriented async interface, one group of methods per collection.
//! Besides plain insert/get/update/delete it exposes the set primitives the
//! consistency engine is built from: add an id to (or pull it from) the reference
//! set of many documents at once, with set semantics (no duplicate entries).
//!
//! ## Operations
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`contacts`] | Contact CRUD, label edge maintenance, duplicate merging. |
//! | [`labels`] | Label CRUD with the mirrored edge maintenance on the contact side. |
//! | [`sharing`] | Share offers and their pending → accepted/rejected workflow. |
//! | [`exports`] | Export job records and rendering of completed exports. |
//! | [`accounts`] | User documents, profile edits, cascading account removal, bulk import. |
//! | [`preferences`] | Settings documents and notifications. |
//!
//! ## Consistency
//!
//! The contact↔label relation is stored redundantly (`Contact::labels` and
//! `Label::contacts`). Every mutating operation computes the set difference between
//! the old and the new reference list and applies only the resulting adds and
//! removals to the other side. Multi-step cascades run as independent store calls;
//! a failure midway leaves earlier steps in place.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

pub mod accounts;
pub mod contacts;
pub mod exports;
pub mod labels;
pub mod preferences;
pub mod sharing;

pub use accounts::{ImportReport, ImportRow, ProfileFields};
pub use exports::ExportFile;
pub use sharing::ShareScope;

/// Lookup keys that identify at most one user.
#[derive(Clone, Copy, Debug)]
pub enum UserKey<'a> {
    Email(&'a str),
    Phone(&'a str),
    GoogleId(&'a str),
    VerificationToken(&'a str),
    ResetToken(&'a str),
}

/// Filter and page selection for listing a user's contacts.
#[derive(Clone, Debug, PartialEq)]
pub struct ContactQuery {
    pub owner: Uuid,
    /// Case-insensitive substring matched against firstname, lastname and email.
    pub search: Option<String>,
    /// Only contacts carrying this label.
    pub label: Option<Uuid>,
    /// 1-based page number.
    pub page: u64,
    pub limit: u64,
}

impl ContactQuery {
    pub fn new(owner: Uuid) -> Self {
        Self {
            owner,
            search: None,
            label: None,
            page: 1,
            limit: 10,
        }
    }

    /// Rows skipped before this page. Saturates for absurd page numbers.
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }

    /// Whether `contact` passes the owner, search and label filters.
    pub fn matches(&self, contact: &Contact) -> bool {
        if contact.user_id != self.owner {
            return false;
        }
        if let Some(label) = self.label {
            if !contact.labels.contains(&label) {
                return false;
            }
        }
        match self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(needle) => {
                let needle = needle.to_lowercase();
                [&contact.firstname, &contact.lastname, &contact.email]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&needle))
            }
            None => true,
        }
    }
}

/// One page of contacts plus the number of matches across all pages.
#[derive(Clone, Debug, PartialEq)]
pub struct ContactPage {
    pub contacts: Vec<Contact>,
    pub total: u64,
}

/// Filter for share offers. Every condition that is set must hold.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShareQuery {
    pub shared_by: Option<Uuid>,
    pub shared_with: Option<Uuid>,
    /// Sharer or recipient.
    pub involving: Option<Uuid>,
    /// Shares naming at least one of these contacts.
    pub contacts_any: Option<Vec<Uuid>>,
    pub status: Option<ShareStatus>,
}

impl ShareQuery {
    pub fn matches(&self, share: &SharedContact) -> bool {
        self.shared_by.map_or(true, |u| share.shared_by_user_id == u)
            && self.shared_with.map_or(true, |u| share.shared_with_user_id == u)
            && self.involving.map_or(true, |u| share.involves(u))
            && self
                .contacts_any
                .as_ref()
                .map_or(true, |ids| share.contacts.iter().any(|c| ids.contains(c)))
            && self.status.map_or(true, |s| share.status == s)
    }
}

/// Async persistence interface for every Pingbook collection.
///
/// Lookups that take an `owner` only return documents belonging to that user.
/// The `*_to_*`/`*_from_*` methods update many documents with set semantics.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert_user(&self, user: &User) -> Result<()>;
    async fn update_user(&self, user: &User) -> Result<()>;
    async fn get_user(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_user(&self, key: UserKey<'_>) -> Result<Option<User>>;
    async fn list_users(&self) -> Result<Vec<User>>;
    async fn delete_user(&self, id: Uuid) -> Result<bool>;
    /// Remove every document owned by or addressed to `user`, except the user itself.
    async fn purge_user_data(&self, user: Uuid) -> Result<()>;

    async fn insert_contacts(&self, contacts: &[Contact]) -> Result<()>;
    async fn update_contact(&self, contact: &Contact) -> Result<()>;
    async fn get_contact(&self, owner: Uuid, id: Uuid) -> Result<Option<Contact>>;
    /// Contacts with the given ids regardless of owner, in no particular order.
    async fn get_contacts(&self, ids: &[Uuid]) -> Result<Vec<Contact>>;
    async fn find_contacts(&self, query: &ContactQuery) -> Result<ContactPage>;
    /// Every contact owned by `owner`, optionally restricted to one label.
    async fn all_contacts(&self, owner: Uuid, label: Option<Uuid>) -> Result<Vec<Contact>>;
    async fn delete_contacts(&self, owner: Uuid, ids: &[Uuid]) -> Result<u64>;
    async fn add_label_to_contacts(&self, label: Uuid, contacts: &[Uuid]) -> Result<()>;
    async fn remove_label_from_contacts(&self, label: Uuid, contacts: &[Uuid]) -> Result<()>;
    /// Pull `label` from every contact that references it.
    async fn pull_label_everywhere(&self, label: Uuid) -> Result<()>;

    async fn insert_label(&self, label: &Label) -> Result<()>;
    async fn update_label(&self, label: &Label) -> Result<()>;
    async fn get_label(&self, owner: Uuid, id: Uuid) -> Result<Option<Label>>;
    async fn get_labels(&self, ids: &[Uuid]) -> Result<Vec<Label>>;
    async fn list_labels(&self, owner: Uuid) -> Result<Vec<Label>>;
    async fn delete_label(&self, owner: Uuid, id: Uuid) -> Result<bool>;
    async fn add_contact_to_labels(&self, contact: Uuid, labels: &[Uuid]) -> Result<()>;
    async fn remove_contact_from_labels(&self, contact: Uuid, labels: &[Uuid]) -> Result<()>;
    /// Pull each of `contacts` from every label that references it.
    async fn pull_contacts_everywhere(&self, contacts: &[Uuid]) -> Result<()>;

    async fn insert_share(&self, share: &SharedContact) -> Result<()>;
    async fn update_share(&self, share: &SharedContact) -> Result<()>;
    async fn get_share(&self, id: Uuid) -> Result<Option<SharedContact>>;
    async fn find_shares(&self, query: &ShareQuery) -> Result<Vec<SharedContact>>;
    async fn delete_shares(&self, ids: &[Uuid]) -> Result<u64>;

    async fn get_settings(&self, user: Uuid) -> Result<Option<Settings>>;
    async fn insert_settings(&self, settings: &Settings) -> Result<()>;
    async fn update_settings(&self, settings: &Settings) -> Result<()>;

    async fn insert_notifications(&self, notifications: &[Notification]) -> Result<()>;
    /// Newest first.
    async fn list_notifications(&self, user: Uuid) -> Result<Vec<Notification>>;
    async fn mark_notification_read(&self, user: Uuid, id: Uuid) -> Result<Option<Notification>>;

    async fn insert_export(&self, export: &Export) -> Result<()>;
    async fn update_export(&self, export: &Export) -> Result<()>;
    async fn get_export(&self, id: Uuid) -> Result<Option<Export>>;
    /// Newest first.
    async fn list_exports(&self, user: Uuid) -> Result<Vec<Export>>;
    async fn delete_export(&self, id: Uuid) -> Result<bool>;
}

/// Domain operations over a shared [`DocumentStore`].
#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn DocumentStore>,
}

impl Repository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::Repository;
    use crate::memory::MemoryStore;
    use crate::models::{ContactFields, LabelFields, User};

    pub fn repo() -> Repository {
        Repository::new(Arc::new(MemoryStore::new()))
    }

    pub fn fields(first: &str, last: &str, phone: &str) -> ContactFields {
        ContactFields {
            firstname: Some(first.into()),
            lastname: Some(last.into()),
            phone: Some(phone.into()),
            ..Default::default()
        }
    }

    pub fn label(name: &str) -> LabelFields {
        LabelFields {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub async fn user(repo: &Repository, name: &str) -> Uuid {
        let user = User::new(name.into(), format!("{name}@example.com"));
        let id = user.id;
        repo.store().insert_user(&user).await.unwrap();
        id
    }
}
