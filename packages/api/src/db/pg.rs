//! [`DocumentStore`] backed by PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use store::models::*;
use store::repo::{ContactPage, ContactQuery, DocumentStore, ShareQuery, UserKey};
use store::StoreError;
use uuid::Uuid;

type Result<T> = std::result::Result<T, StoreError>;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Unique violations become [`StoreError::Duplicate`] naming the field, the way
/// [`store::MemoryStore`] reports them. A dangling `user_id` means the owner is gone.
fn db_err(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Duplicate(duplicate_field(db.constraint().unwrap_or("unique")).to_string())
        }
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => StoreError::NotFound("User"),
        _ => StoreError::Backend(err.to_string()),
    }
}

fn duplicate_field(constraint: &str) -> &str {
    match constraint {
        "users_email_key" => "email",
        "users_phone_key" => "phone",
        "users_google_id_key" => "google_id",
        "settings_user_id_key" => "settings.user_id",
        other => other,
    }
}

/// `%needle%` for ILIKE, with the pattern metacharacters escaped.
fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    phone: Option<String>,
    password_hash: Option<String>,
    avatar: String,
    email_verified: bool,
    verification_token: Option<String>,
    verification_token_expires: Option<DateTime<Utc>>,
    reset_token: Option<String>,
    reset_token_expires: Option<DateTime<Utc>>,
    google_id: Option<String>,
    theme: String,
    notifications_enabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: row.id,
            username: row.username,
            email: row.email,
            phone: row.phone,
            password_hash: row.password_hash,
            avatar: row.avatar,
            email_verified: row.email_verified,
            verification_token: row.verification_token,
            verification_token_expires: row.verification_token_expires,
            reset_token: row.reset_token,
            reset_token_expires: row.reset_token_expires,
            google_id: row.google_id,
            preferences: Preferences {
                theme: row.theme.parse()?,
                notifications_enabled: row.notifications_enabled,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ContactRow {
    id: Uuid,
    user_id: Uuid,
    firstname: String,
    lastname: String,
    email: String,
    phone: String,
    address: String,
    photo_url: String,
    labels: Vec<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ContactRow> for Contact {
    fn from(row: ContactRow) -> Self {
        Contact {
            id: row.id,
            user_id: row.user_id,
            firstname: row.firstname,
            lastname: row.lastname,
            email: row.email,
            phone: row.phone,
            address: row.address,
            photo_url: row.photo_url,
            labels: row.labels,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct LabelRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    color: String,
    description: String,
    contacts: Vec<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<LabelRow> for Label {
    fn from(row: LabelRow) -> Self {
        Label {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            color: row.color,
            description: row.description,
            contacts: row.contacts,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct ShareRow {
    id: Uuid,
    shared_by_user_id: Uuid,
    shared_with_user_id: Uuid,
    contacts: Vec<Uuid>,
    status: String,
    shared_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ShareRow> for SharedContact {
    type Error = StoreError;

    fn try_from(row: ShareRow) -> Result<Self> {
        Ok(SharedContact {
            id: row.id,
            shared_by_user_id: row.shared_by_user_id,
            shared_with_user_id: row.shared_with_user_id,
            contacts: row.contacts,
            status: row.status.parse()?,
            shared_at: row.shared_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct SettingsRow {
    id: Uuid,
    user_id: Uuid,
    theme: String,
    notifications_enabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SettingsRow> for Settings {
    type Error = StoreError;

    fn try_from(row: SettingsRow) -> Result<Self> {
        Ok(Settings {
            id: row.id,
            user_id: row.user_id,
            theme: row.theme.parse()?,
            notifications_enabled: row.notifications_enabled,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct NotificationRow {
    id: Uuid,
    user_id: Uuid,
    message: String,
    kind: Option<String>,
    is_read: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        Notification {
            id: row.id,
            user_id: row.user_id,
            message: row.message,
            kind: row.kind,
            is_read: row.is_read,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct ExportRow {
    id: Uuid,
    user_id: Uuid,
    file_path: String,
    format: String,
    status: String,
    label_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ExportRow> for Export {
    type Error = StoreError;

    fn try_from(row: ExportRow) -> Result<Self> {
        Ok(Export {
            id: row.id,
            user_id: row.user_id,
            file_path: row.file_path,
            format: row.format.parse()?,
            status: row.status.parse()?,
            label_id: row.label_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn insert_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            "INSERT INTO users (id, username, email, phone, password_hash, avatar, email_verified, \
             verification_token, verification_token_expires, reset_token, reset_token_expires, \
             google_id, theme, notifications_enabled, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(&user.avatar)
        .bind(user.email_verified)
        .bind(&user.verification_token)
        .bind(user.verification_token_expires)
        .bind(&user.reset_token)
        .bind(user.reset_token_expires)
        .bind(&user.google_id)
        .bind(user.preferences.theme.as_str())
        .bind(user.preferences.notifications_enabled)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            "UPDATE users SET username = $2, email = $3, phone = $4, password_hash = $5, \
             avatar = $6, email_verified = $7, verification_token = $8, \
             verification_token_expires = $9, reset_token = $10, reset_token_expires = $11, \
             google_id = $12, theme = $13, notifications_enabled = $14, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(&user.avatar)
        .bind(user.email_verified)
        .bind(&user.verification_token)
        .bind(user.verification_token_expires)
        .bind(&user.reset_token)
        .bind(user.reset_token_expires)
        .bind(&user.google_id)
        .bind(user.preferences.theme.as_str())
        .bind(user.preferences.notifications_enabled)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(User::try_from).transpose()
    }

    async fn find_user(&self, key: UserKey<'_>) -> Result<Option<User>> {
        let (sql, value) = match key {
            UserKey::Email(email) => ("SELECT * FROM users WHERE LOWER(email) = LOWER($1)", email),
            UserKey::Phone(phone) => ("SELECT * FROM users WHERE phone = $1", phone),
            UserKey::GoogleId(id) => ("SELECT * FROM users WHERE google_id = $1", id),
            UserKey::VerificationToken(token) => {
                ("SELECT * FROM users WHERE verification_token = $1", token)
            }
            UserKey::ResetToken(token) => ("SELECT * FROM users WHERE reset_token = $1", token),
        };
        let row: Option<UserRow> = sqlx::query_as(sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(User::try_from).transpose()
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let rows: Vec<UserRow> = sqlx::query_as("SELECT * FROM users ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        convert_all(rows)
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn purge_user_data(&self, user: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for sql in [
            "DELETE FROM contacts WHERE user_id = $1",
            "DELETE FROM labels WHERE user_id = $1",
            "DELETE FROM shared_contacts WHERE shared_by_user_id = $1 OR shared_with_user_id = $1",
            "DELETE FROM settings WHERE user_id = $1",
            "DELETE FROM notifications WHERE user_id = $1",
            "DELETE FROM exports WHERE user_id = $1",
        ] {
            sqlx::query(sql)
                .bind(user)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)
    }

    async fn insert_contacts(&self, contacts: &[Contact]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for contact in contacts {
            sqlx::query(
                "INSERT INTO contacts (id, user_id, firstname, lastname, email, phone, address, \
                 photo_url, labels, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            )
            .bind(contact.id)
            .bind(contact.user_id)
            .bind(&contact.firstname)
            .bind(&contact.lastname)
            .bind(&contact.email)
            .bind(&contact.phone)
            .bind(&contact.address)
            .bind(&contact.photo_url)
            .bind(&contact.labels)
            .bind(contact.created_at)
            .bind(contact.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)
    }

    async fn update_contact(&self, contact: &Contact) -> Result<()> {
        sqlx::query(
            "UPDATE contacts SET firstname = $2, lastname = $3, email = $4, phone = $5, \
             address = $6, photo_url = $7, labels = $8, updated_at = NOW() WHERE id = $1",
        )
        .bind(contact.id)
        .bind(&contact.firstname)
        .bind(&contact.lastname)
        .bind(&contact.email)
        .bind(&contact.phone)
        .bind(&contact.address)
        .bind(&contact.photo_url)
        .bind(&contact.labels)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_contact(&self, owner: Uuid, id: Uuid) -> Result<Option<Contact>> {
        let row: Option<ContactRow> =
            sqlx::query_as("SELECT * FROM contacts WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(owner)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(row.map(Contact::from))
    }

    async fn get_contacts(&self, ids: &[Uuid]) -> Result<Vec<Contact>> {
        let rows: Vec<ContactRow> = sqlx::query_as("SELECT * FROM contacts WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(Contact::from).collect())
    }

    async fn find_contacts(&self, query: &ContactQuery) -> Result<ContactPage> {
        const FILTER: &str = "user_id = $1 \
             AND ($2::uuid IS NULL OR $2 = ANY(labels)) \
             AND ($3::text IS NULL OR firstname ILIKE $3 OR lastname ILIKE $3 OR email ILIKE $3)";

        let pattern = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_pattern);

        let (total,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM contacts WHERE {FILTER}"))
            .bind(query.owner)
            .bind(query.label)
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        let rows: Vec<ContactRow> = sqlx::query_as(&format!(
            "SELECT * FROM contacts WHERE {FILTER} \
             ORDER BY created_at DESC, id DESC LIMIT $4 OFFSET $5"
        ))
        .bind(query.owner)
        .bind(query.label)
        .bind(&pattern)
        .bind(i64::try_from(query.limit).unwrap_or(i64::MAX))
        .bind(i64::try_from(query.offset()).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(ContactPage {
            contacts: rows.into_iter().map(Contact::from).collect(),
            total: total.max(0) as u64,
        })
    }

    async fn all_contacts(&self, owner: Uuid, label: Option<Uuid>) -> Result<Vec<Contact>> {
        let rows: Vec<ContactRow> = sqlx::query_as(
            "SELECT * FROM contacts WHERE user_id = $1 \
             AND ($2::uuid IS NULL OR $2 = ANY(labels)) ORDER BY created_at, id",
        )
        .bind(owner)
        .bind(label)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(Contact::from).collect())
    }

    async fn delete_contacts(&self, owner: Uuid, ids: &[Uuid]) -> Result<u64> {
        let result = sqlx::query("DELETE FROM contacts WHERE user_id = $1 AND id = ANY($2)")
            .bind(owner)
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected())
    }

    async fn add_label_to_contacts(&self, label: Uuid, contacts: &[Uuid]) -> Result<()> {
        sqlx::query(
            "UPDATE contacts SET labels = array_append(labels, $1::uuid), updated_at = NOW() \
             WHERE id = ANY($2) AND NOT ($1 = ANY(labels))",
        )
        .bind(label)
        .bind(contacts)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn remove_label_from_contacts(&self, label: Uuid, contacts: &[Uuid]) -> Result<()> {
        sqlx::query(
            "UPDATE contacts SET labels = array_remove(labels, $1::uuid) \
             WHERE id = ANY($2) AND $1 = ANY(labels)",
        )
        .bind(label)
        .bind(contacts)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn pull_label_everywhere(&self, label: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE contacts SET labels = array_remove(labels, $1::uuid) WHERE $1 = ANY(labels)",
        )
        .bind(label)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn insert_label(&self, label: &Label) -> Result<()> {
        sqlx::query(
            "INSERT INTO labels (id, user_id, name, color, description, contacts, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(label.id)
        .bind(label.user_id)
        .bind(&label.name)
        .bind(&label.color)
        .bind(&label.description)
        .bind(&label.contacts)
        .bind(label.created_at)
        .bind(label.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn update_label(&self, label: &Label) -> Result<()> {
        sqlx::query(
            "UPDATE labels SET name = $2, color = $3, description = $4, contacts = $5, \
             updated_at = NOW() WHERE id = $1",
        )
        .bind(label.id)
        .bind(&label.name)
        .bind(&label.color)
        .bind(&label.description)
        .bind(&label.contacts)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_label(&self, owner: Uuid, id: Uuid) -> Result<Option<Label>> {
        let row: Option<LabelRow> =
            sqlx::query_as("SELECT * FROM labels WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(owner)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(row.map(Label::from))
    }

    async fn get_labels(&self, ids: &[Uuid]) -> Result<Vec<Label>> {
        let rows: Vec<LabelRow> = sqlx::query_as("SELECT * FROM labels WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(Label::from).collect())
    }

    async fn list_labels(&self, owner: Uuid) -> Result<Vec<Label>> {
        let rows: Vec<LabelRow> =
            sqlx::query_as("SELECT * FROM labels WHERE user_id = $1 ORDER BY created_at, id")
                .bind(owner)
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(rows.into_iter().map(Label::from).collect())
    }

    async fn delete_label(&self, owner: Uuid, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM labels WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn add_contact_to_labels(&self, contact: Uuid, labels: &[Uuid]) -> Result<()> {
        sqlx::query(
            "UPDATE labels SET contacts = array_append(contacts, $1::uuid), updated_at = NOW() \
             WHERE id = ANY($2) AND NOT ($1 = ANY(contacts))",
        )
        .bind(contact)
        .bind(labels)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn remove_contact_from_labels(&self, contact: Uuid, labels: &[Uuid]) -> Result<()> {
        sqlx::query(
            "UPDATE labels SET contacts = array_remove(contacts, $1::uuid) \
             WHERE id = ANY($2) AND $1 = ANY(contacts)",
        )
        .bind(contact)
        .bind(labels)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn pull_contacts_everywhere(&self, contacts: &[Uuid]) -> Result<()> {
        sqlx::query(
            "UPDATE labels SET contacts = ARRAY(SELECT c FROM unnest(contacts) AS c WHERE c <> ALL($1)) \
             WHERE contacts && $1",
        )
        .bind(contacts)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn insert_share(&self, share: &SharedContact) -> Result<()> {
        sqlx::query(
            "INSERT INTO shared_contacts (id, shared_by_user_id, shared_with_user_id, contacts, \
             status, shared_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(share.id)
        .bind(share.shared_by_user_id)
        .bind(share.shared_with_user_id)
        .bind(&share.contacts)
        .bind(share.status.as_str())
        .bind(share.shared_at)
        .bind(share.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn update_share(&self, share: &SharedContact) -> Result<()> {
        sqlx::query(
            "UPDATE shared_contacts SET contacts = $2, status = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(share.id)
        .bind(&share.contacts)
        .bind(share.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_share(&self, id: Uuid) -> Result<Option<SharedContact>> {
        let row: Option<ShareRow> = sqlx::query_as("SELECT * FROM shared_contacts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(SharedContact::try_from).transpose()
    }

    async fn find_shares(&self, query: &ShareQuery) -> Result<Vec<SharedContact>> {
        let rows: Vec<ShareRow> = sqlx::query_as(
            "SELECT * FROM shared_contacts WHERE \
             ($1::uuid IS NULL OR shared_by_user_id = $1) \
             AND ($2::uuid IS NULL OR shared_with_user_id = $2) \
             AND ($3::uuid IS NULL OR shared_by_user_id = $3 OR shared_with_user_id = $3) \
             AND ($4::uuid[] IS NULL OR contacts && $4) \
             AND ($5::text IS NULL OR status = $5) \
             ORDER BY shared_at DESC, id DESC",
        )
        .bind(query.shared_by)
        .bind(query.shared_with)
        .bind(query.involving)
        .bind(query.contacts_any.clone())
        .bind(query.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        convert_all(rows)
    }

    async fn delete_shares(&self, ids: &[Uuid]) -> Result<u64> {
        let result = sqlx::query("DELETE FROM shared_contacts WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected())
    }

    async fn get_settings(&self, user: Uuid) -> Result<Option<Settings>> {
        let row: Option<SettingsRow> = sqlx::query_as("SELECT * FROM settings WHERE user_id = $1")
            .bind(user)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(Settings::try_from).transpose()
    }

    async fn insert_settings(&self, settings: &Settings) -> Result<()> {
        sqlx::query(
            "INSERT INTO settings (id, user_id, theme, notifications_enabled, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(settings.id)
        .bind(settings.user_id)
        .bind(settings.theme.as_str())
        .bind(settings.notifications_enabled)
        .bind(settings.created_at)
        .bind(settings.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn update_settings(&self, settings: &Settings) -> Result<()> {
        sqlx::query(
            "UPDATE settings SET theme = $2, notifications_enabled = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(settings.id)
        .bind(settings.theme.as_str())
        .bind(settings.notifications_enabled)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn insert_notifications(&self, notifications: &[Notification]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for notification in notifications {
            sqlx::query(
                "INSERT INTO notifications (id, user_id, message, kind, is_read, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(notification.id)
            .bind(notification.user_id)
            .bind(&notification.message)
            .bind(&notification.kind)
            .bind(notification.is_read)
            .bind(notification.created_at)
            .bind(notification.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)
    }

    async fn list_notifications(&self, user: Uuid) -> Result<Vec<Notification>> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            "SELECT * FROM notifications WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(Notification::from).collect())
    }

    async fn mark_notification_read(&self, user: Uuid, id: Uuid) -> Result<Option<Notification>> {
        let row: Option<NotificationRow> = sqlx::query_as(
            "UPDATE notifications SET is_read = TRUE, updated_at = NOW() \
             WHERE id = $1 AND user_id = $2 RETURNING *",
        )
        .bind(id)
        .bind(user)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(Notification::from))
    }

    async fn insert_export(&self, export: &Export) -> Result<()> {
        sqlx::query(
            "INSERT INTO exports (id, user_id, file_path, format, status, label_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(export.id)
        .bind(export.user_id)
        .bind(&export.file_path)
        .bind(export.format.as_str())
        .bind(export.status.as_str())
        .bind(export.label_id)
        .bind(export.created_at)
        .bind(export.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn update_export(&self, export: &Export) -> Result<()> {
        sqlx::query(
            "UPDATE exports SET file_path = $2, status = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(export.id)
        .bind(&export.file_path)
        .bind(export.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_export(&self, id: Uuid) -> Result<Option<Export>> {
        let row: Option<ExportRow> = sqlx::query_as("SELECT * FROM exports WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(Export::try_from).transpose()
    }

    async fn list_exports(&self, user: Uuid) -> Result<Vec<Export>> {
        let rows: Vec<ExportRow> = sqlx::query_as(
            "SELECT * FROM exports WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        convert_all(rows)
    }

    async fn delete_export(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM exports WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("jo"), "%jo%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn test_duplicate_field_names_match_memory_store() {
        assert_eq!(duplicate_field("users_email_key"), "email");
        assert_eq!(duplicate_field("users_phone_key"), "phone");
        assert_eq!(duplicate_field("users_google_id_key"), "google_id");
        assert_eq!(duplicate_field("settings_user_id_key"), "settings.user_id");
        assert_eq!(duplicate_field("labels_pkey"), "labels_pkey");
    }
}
