use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use store::models::{dedup_ids, Contact, Label, ShareStatus, SharedContact};
use store::{Repository, StoreError};
use uuid::Uuid;

/// `name color` of a label, as embedded in a contact.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LabelSummary {
    pub id: Uuid,
    pub name: String,
    pub color: String,
}

/// A contact as embedded in a label or a share. `phone` is only filled for shares.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ContactSummary {
    pub id: Uuid,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContactView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub photo_url: String,
    pub labels: Vec<LabelSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LabelView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub color: String,
    pub description: String,
    pub contacts: Vec<ContactSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShareView {
    pub id: Uuid,
    pub shared_by_user_id: Uuid,
    pub shared_with_user_id: Uuid,
    pub contacts: Vec<ContactSummary>,
    pub status: ShareStatus,
    pub shared_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

async fn labels_by_id(repo: &Repository, ids: Vec<Uuid>) -> Result<HashMap<Uuid, Label>, StoreError> {
    let ids = dedup_ids(ids);
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let labels = repo.store().get_labels(&ids).await?;
    Ok(labels.into_iter().map(|l| (l.id, l)).collect())
}

async fn contacts_by_id(
    repo: &Repository,
    ids: Vec<Uuid>,
) -> Result<HashMap<Uuid, Contact>, StoreError> {
    let ids = dedup_ids(ids);
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let contacts = repo.store().get_contacts(&ids).await?;
    Ok(contacts.into_iter().map(|c| (c.id, c)).collect())
}

fn build_contact(contact: Contact, labels: &HashMap<Uuid, Label>) -> ContactView {
    ContactView {
        labels: contact
            .labels
            .iter()
            .filter_map(|id| labels.get(id))
            .map(|l| LabelSummary {
                id: l.id,
                name: l.name.clone(),
                color: l.color.clone(),
            })
            .collect(),
        id: contact.id,
        user_id: contact.user_id,
        firstname: contact.firstname,
        lastname: contact.lastname,
        email: contact.email,
        phone: contact.phone,
        address: contact.address,
        photo_url: contact.photo_url,
        created_at: contact.created_at,
        updated_at: contact.updated_at,
    }
}

fn summarize(contact: &Contact, with_phone: bool) -> ContactSummary {
    ContactSummary {
        id: contact.id,
        firstname: contact.firstname.clone(),
        lastname: contact.lastname.clone(),
        email: contact.email.clone(),
        phone: with_phone.then(|| contact.phone.clone()),
    }
}

pub async fn contact_views(
    repo: &Repository,
    contacts: Vec<Contact>,
) -> Result<Vec<ContactView>, StoreError> {
    let labels = labels_by_id(repo, contacts.iter().flat_map(|c| c.labels.clone()).collect()).await?;
    Ok(contacts
        .into_iter()
        .map(|c| build_contact(c, &labels))
        .collect())
}

pub async fn contact_view(repo: &Repository, contact: Contact) -> Result<ContactView, StoreError> {
    let labels = labels_by_id(repo, contact.labels.clone()).await?;
    Ok(build_contact(contact, &labels))
}

pub async fn label_views(repo: &Repository, labels: Vec<Label>) -> Result<Vec<LabelView>, StoreError> {
    let contacts =
        contacts_by_id(repo, labels.iter().flat_map(|l| l.contacts.clone()).collect()).await?;
    Ok(labels
        .into_iter()
        .map(|label| LabelView {
            contacts: label
                .contacts
                .iter()
                .filter_map(|id| contacts.get(id))
                .map(|c| summarize(c, false))
                .collect(),
            id: label.id,
            user_id: label.user_id,
            name: label.name,
            color: label.color,
            description: label.description,
            created_at: label.created_at,
            updated_at: label.updated_at,
        })
        .collect())
}

pub async fn label_view(repo: &Repository, label: Label) -> Result<LabelView, StoreError> {
    let mut views = label_views(repo, vec![label]).await?;
    views
        .pop()
        .ok_or_else(|| StoreError::Backend("label view lost its label".into()))
}

pub async fn share_views(
    repo: &Repository,
    shares: Vec<SharedContact>,
) -> Result<Vec<ShareView>, StoreError> {
    let contacts =
        contacts_by_id(repo, shares.iter().flat_map(|s| s.contacts.clone()).collect()).await?;
    Ok(shares
        .into_iter()
        .map(|share| ShareView {
            contacts: share
                .contacts
                .iter()
                .filter_map(|id| contacts.get(id))
                .map(|c| summarize(c, true))
                .collect(),
            id: share.id,
            shared_by_user_id: share.shared_by_user_id,
            shared_with_user_id: share.shared_with_user_id,
            status: share.status,
            shared_at: share.shared_at,
            updated_at: share.updated_at,
        })
        .collect())
}

pub async fn share_view(repo: &Repository, share: SharedContact) -> Result<ShareView, StoreError> {
    let mut views = share_views(repo, vec![share]).await?;
    views
        .pop()
        .ok_or_else(|| StoreError::Backend("share view lost its share".into()))
}
