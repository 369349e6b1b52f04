use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::models::*;
use crate::repo::{ContactPage, ContactQuery, DocumentStore, ShareQuery, UserKey};

/// In-memory DocumentStore for tests and local development.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Collections>>,
}

#[derive(Debug, Default)]
struct Collections {
    users: HashMap<Uuid, User>,
    contacts: HashMap<Uuid, Contact>,
    labels: HashMap<Uuid, Label>,
    shares: HashMap<Uuid, SharedContact>,
    settings: HashMap<Uuid, Settings>,
    notifications: HashMap<Uuid, Notification>,
    exports: HashMap<Uuid, Export>,
}

impl Collections {
    /// Enforce the unique indexes of the users collection.
    fn check_user_unique(&self, user: &User) -> Result<()> {
        for other in self.users.values().filter(|u| u.id != user.id) {
            if other.email.eq_ignore_ascii_case(&user.email) {
                return Err(StoreError::Duplicate("email".into()));
            }
            if user.phone.is_some() && other.phone == user.phone {
                return Err(StoreError::Duplicate("phone".into()));
            }
            if user.google_id.is_some() && other.google_id == user.google_id {
                return Err(StoreError::Duplicate("google_id".into()));
            }
        }
        Ok(())
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Collections> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn push_unique(ids: &mut Vec<Uuid>, id: Uuid) -> bool {
    if ids.contains(&id) {
        false
    } else {
        ids.push(id);
        true
    }
}

fn newest_first<T>(items: &mut [T], created: impl Fn(&T) -> (chrono::DateTime<Utc>, Uuid)) {
    items.sort_by(|a, b| created(b).cmp(&created(a)));
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_user(&self, user: &User) -> Result<()> {
        let mut db = self.lock();
        db.check_user_unique(user)?;
        db.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        let mut db = self.lock();
        db.check_user_unique(user)?;
        if let Some(existing) = db.users.get_mut(&user.id) {
            *existing = User {
                updated_at: Utc::now(),
                ..user.clone()
            };
        }
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.lock().users.get(&id).cloned())
    }

    async fn find_user(&self, key: UserKey<'_>) -> Result<Option<User>> {
        let db = self.lock();
        let found = db.users.values().find(|u| match key {
            UserKey::Email(email) => u.email.eq_ignore_ascii_case(email),
            UserKey::Phone(phone) => u.phone.as_deref() == Some(phone),
            UserKey::GoogleId(id) => u.google_id.as_deref() == Some(id),
            UserKey::VerificationToken(token) => u.verification_token.as_deref() == Some(token),
            UserKey::ResetToken(token) => u.reset_token.as_deref() == Some(token),
        });
        Ok(found.cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let mut users: Vec<User> = self.lock().users.values().cloned().collect();
        users.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(users)
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool> {
        Ok(self.lock().users.remove(&id).is_some())
    }

    async fn purge_user_data(&self, user: Uuid) -> Result<()> {
        let mut db = self.lock();
        db.contacts.retain(|_, c| c.user_id != user);
        db.labels.retain(|_, l| l.user_id != user);
        db.shares.retain(|_, s| !s.involves(user));
        db.settings.retain(|_, s| s.user_id != user);
        db.notifications.retain(|_, n| n.user_id != user);
        db.exports.retain(|_, e| e.user_id != user);
        Ok(())
    }

    async fn insert_contacts(&self, contacts: &[Contact]) -> Result<()> {
        let mut db = self.lock();
        for contact in contacts {
            db.contacts.insert(contact.id, contact.clone());
        }
        Ok(())
    }

    async fn update_contact(&self, contact: &Contact) -> Result<()> {
        if let Some(existing) = self.lock().contacts.get_mut(&contact.id) {
            *existing = Contact {
                updated_at: Utc::now(),
                ..contact.clone()
            };
        }
        Ok(())
    }

    async fn get_contact(&self, owner: Uuid, id: Uuid) -> Result<Option<Contact>> {
        Ok(self
            .lock()
            .contacts
            .get(&id)
            .filter(|c| c.user_id == owner)
            .cloned())
    }

    async fn get_contacts(&self, ids: &[Uuid]) -> Result<Vec<Contact>> {
        let db = self.lock();
        Ok(ids.iter().filter_map(|id| db.contacts.get(id).cloned()).collect())
    }

    async fn find_contacts(&self, query: &ContactQuery) -> Result<ContactPage> {
        let mut matching: Vec<Contact> = self
            .lock()
            .contacts
            .values()
            .filter(|c| query.matches(c))
            .cloned()
            .collect();
        newest_first(&mut matching, |c| (c.created_at, c.id));
        let total = matching.len() as u64;
        let contacts = matching
            .into_iter()
            .skip(usize::try_from(query.offset()).unwrap_or(usize::MAX))
            .take(query.limit as usize)
            .collect();
        Ok(ContactPage { contacts, total })
    }

    async fn all_contacts(&self, owner: Uuid, label: Option<Uuid>) -> Result<Vec<Contact>> {
        let mut contacts: Vec<Contact> = self
            .lock()
            .contacts
            .values()
            .filter(|c| c.user_id == owner && label.map_or(true, |l| c.labels.contains(&l)))
            .cloned()
            .collect();
        contacts.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(contacts)
    }

    async fn delete_contacts(&self, owner: Uuid, ids: &[Uuid]) -> Result<u64> {
        let mut db = self.lock();
        let before = db.contacts.len();
        db.contacts
            .retain(|id, c| !(c.user_id == owner && ids.contains(id)));
        Ok((before - db.contacts.len()) as u64)
    }

    async fn add_label_to_contacts(&self, label: Uuid, contacts: &[Uuid]) -> Result<()> {
        let mut db = self.lock();
        for id in contacts {
            if let Some(contact) = db.contacts.get_mut(id) {
                if push_unique(&mut contact.labels, label) {
                    contact.updated_at = Utc::now();
                }
            }
        }
        Ok(())
    }

    async fn remove_label_from_contacts(&self, label: Uuid, contacts: &[Uuid]) -> Result<()> {
        let mut db = self.lock();
        for id in contacts {
            if let Some(contact) = db.contacts.get_mut(id) {
                contact.labels.retain(|l| *l != label);
            }
        }
        Ok(())
    }

    async fn pull_label_everywhere(&self, label: Uuid) -> Result<()> {
        for contact in self.lock().contacts.values_mut() {
            contact.labels.retain(|l| *l != label);
        }
        Ok(())
    }

    async fn insert_label(&self, label: &Label) -> Result<()> {
        self.lock().labels.insert(label.id, label.clone());
        Ok(())
    }

    async fn update_label(&self, label: &Label) -> Result<()> {
        if let Some(existing) = self.lock().labels.get_mut(&label.id) {
            *existing = Label {
                updated_at: Utc::now(),
                ..label.clone()
            };
        }
        Ok(())
    }

    async fn get_label(&self, owner: Uuid, id: Uuid) -> Result<Option<Label>> {
        Ok(self
            .lock()
            .labels
            .get(&id)
            .filter(|l| l.user_id == owner)
            .cloned())
    }

    async fn get_labels(&self, ids: &[Uuid]) -> Result<Vec<Label>> {
        let db = self.lock();
        Ok(ids.iter().filter_map(|id| db.labels.get(id).cloned()).collect())
    }

    async fn list_labels(&self, owner: Uuid) -> Result<Vec<Label>> {
        let mut labels: Vec<Label> = self
            .lock()
            .labels
            .values()
            .filter(|l| l.user_id == owner)
            .cloned()
            .collect();
        labels.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(labels)
    }

    async fn delete_label(&self, owner: Uuid, id: Uuid) -> Result<bool> {
        let mut db = self.lock();
        match db.labels.get(&id) {
            Some(label) if label.user_id == owner => Ok(db.labels.remove(&id).is_some()),
            _ => Ok(false),
        }
    }

    async fn add_contact_to_labels(&self, contact: Uuid, labels: &[Uuid]) -> Result<()> {
        let mut db = self.lock();
        for id in labels {
            if let Some(label) = db.labels.get_mut(id) {
                if push_unique(&mut label.contacts, contact) {
                    label.updated_at = Utc::now();
                }
            }
        }
        Ok(())
    }

    async fn remove_contact_from_labels(&self, contact: Uuid, labels: &[Uuid]) -> Result<()> {
        let mut db = self.lock();
        for id in labels {
            if let Some(label) = db.labels.get_mut(id) {
                label.contacts.retain(|c| *c != contact);
            }
        }
        Ok(())
    }

    async fn pull_contacts_everywhere(&self, contacts: &[Uuid]) -> Result<()> {
        for label in self.lock().labels.values_mut() {
            label.contacts.retain(|c| !contacts.contains(c));
        }
        Ok(())
    }

    async fn insert_share(&self, share: &SharedContact) -> Result<()> {
        self.lock().shares.insert(share.id, share.clone());
        Ok(())
    }

    async fn update_share(&self, share: &SharedContact) -> Result<()> {
        if let Some(existing) = self.lock().shares.get_mut(&share.id) {
            *existing = SharedContact {
                updated_at: Utc::now(),
                ..share.clone()
            };
        }
        Ok(())
    }

    async fn get_share(&self, id: Uuid) -> Result<Option<SharedContact>> {
        Ok(self.lock().shares.get(&id).cloned())
    }

    async fn find_shares(&self, query: &ShareQuery) -> Result<Vec<SharedContact>> {
        let mut shares: Vec<SharedContact> = self
            .lock()
            .shares
            .values()
            .filter(|s| query.matches(s))
            .cloned()
            .collect();
        newest_first(&mut shares, |s| (s.shared_at, s.id));
        Ok(shares)
    }

    async fn delete_shares(&self, ids: &[Uuid]) -> Result<u64> {
        let mut db = self.lock();
        let before = db.shares.len();
        db.shares.retain(|id, _| !ids.contains(id));
        Ok((before - db.shares.len()) as u64)
    }

    async fn get_settings(&self, user: Uuid) -> Result<Option<Settings>> {
        Ok(self
            .lock()
            .settings
            .values()
            .find(|s| s.user_id == user)
            .cloned())
    }

    async fn insert_settings(&self, settings: &Settings) -> Result<()> {
        let mut db = self.lock();
        if db.settings.values().any(|s| s.user_id == settings.user_id) {
            return Err(StoreError::Duplicate("settings.user_id".into()));
        }
        db.settings.insert(settings.id, settings.clone());
        Ok(())
    }

    async fn update_settings(&self, settings: &Settings) -> Result<()> {
        if let Some(existing) = self.lock().settings.get_mut(&settings.id) {
            *existing = Settings {
                updated_at: Utc::now(),
                ..settings.clone()
            };
        }
        Ok(())
    }

    async fn insert_notifications(&self, notifications: &[Notification]) -> Result<()> {
        let mut db = self.lock();
        for notification in notifications {
            db.notifications.insert(notification.id, notification.clone());
        }
        Ok(())
    }

    async fn list_notifications(&self, user: Uuid) -> Result<Vec<Notification>> {
        let mut notifications: Vec<Notification> = self
            .lock()
            .notifications
            .values()
            .filter(|n| n.user_id == user)
            .cloned()
            .collect();
        newest_first(&mut notifications, |n| (n.created_at, n.id));
        Ok(notifications)
    }

    async fn mark_notification_read(&self, user: Uuid, id: Uuid) -> Result<Option<Notification>> {
        let mut db = self.lock();
        Ok(db
            .notifications
            .get_mut(&id)
            .filter(|n| n.user_id == user)
            .map(|n| {
                n.is_read = true;
                n.updated_at = Utc::now();
                n.clone()
            }))
    }

    async fn insert_export(&self, export: &Export) -> Result<()> {
        self.lock().exports.insert(export.id, export.clone());
        Ok(())
    }

    async fn update_export(&self, export: &Export) -> Result<()> {
        if let Some(existing) = self.lock().exports.get_mut(&export.id) {
            *existing = Export {
                updated_at: Utc::now(),
                ..export.clone()
            };
        }
        Ok(())
    }

    async fn get_export(&self, id: Uuid) -> Result<Option<Export>> {
        Ok(self.lock().exports.get(&id).cloned())
    }

    async fn list_exports(&self, user: Uuid) -> Result<Vec<Export>> {
        let mut exports: Vec<Export> = self
            .lock()
            .exports
            .values()
            .filter(|e| e.user_id == user)
            .cloned()
            .collect();
        newest_first(&mut exports, |e| (e.created_at, e.id));
        Ok(exports)
    }

    async fn delete_export(&self, id: Uuid) -> Result<bool> {
        Ok(self.lock().exports.remove(&id).is_some())
    }
}
