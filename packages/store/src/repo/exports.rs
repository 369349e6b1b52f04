//! Export jobs.
//!
//! Creating an export only records the job as `in_progress`; whatever produces the
//! file reports back through [`Repository::set_export_status`]. Once a job is
//! `completed` its download renders the owner's contacts (scoped to the job's
//! label, if any) as CSV or vCard 3.0 text.

use std::fmt::Write as _;

use tracing::info;
use uuid::Uuid;

use super::Repository;
use crate::error::{Result, StoreError};
use crate::models::*;

/// A rendered export ready to be sent as an attachment.
#[derive(Clone, Debug, PartialEq)]
pub struct ExportFile {
    pub filename: String,
    pub content_type: &'static str,
    pub body: String,
}

impl Repository {
    pub async fn list_exports(&self, user: Uuid) -> Result<Vec<Export>> {
        self.store().list_exports(user).await
    }

    pub async fn get_export(&self, user: Uuid, id: Uuid) -> Result<Export> {
        let export = self
            .store()
            .get_export(id)
            .await?
            .ok_or(StoreError::NotFound("Export"))?;
        if export.user_id != user {
            return Err(StoreError::Forbidden("Access denied".into()));
        }
        Ok(export)
    }

    pub async fn create_export(
        &self,
        user: Uuid,
        format: ExportFormat,
        label: Option<Uuid>,
    ) -> Result<Export> {
        if let Some(label) = label {
            self.owned_labels(user, vec![label]).await?;
        }
        let export = Export::new(user, format, label);
        self.store().insert_export(&export).await?;
        info!(export = %export.id, format = format.as_str(), "export requested");
        Ok(export)
    }

    /// Record the outcome of an export job.
    pub async fn set_export_status(&self, id: Uuid, status: ExportStatus) -> Result<Export> {
        let mut export = self
            .store()
            .get_export(id)
            .await?
            .ok_or(StoreError::NotFound("Export"))?;
        export.status = status;
        self.store().update_export(&export).await?;
        Ok(export)
    }

    pub async fn download_export(&self, user: Uuid, id: Uuid) -> Result<ExportFile> {
        let export = self.get_export(user, id).await?;
        if export.status != ExportStatus::Completed {
            return Err(StoreError::NotReady);
        }
        let contacts = self.store().all_contacts(user, export.label_id).await?;
        let body = match export.format {
            ExportFormat::Csv => render_csv(&contacts),
            ExportFormat::Vcf => render_vcard(&contacts),
        };
        Ok(ExportFile {
            filename: format!("export.{}", export.format.as_str()),
            content_type: export.format.content_type(),
            body,
        })
    }

    pub async fn delete_export(&self, user: Uuid, id: Uuid) -> Result<()> {
        let export = self.get_export(user, id).await?;
        self.store().delete_export(export.id).await?;
        Ok(())
    }
}

const CSV_HEADER: &str = "firstname,lastname,email,phone,address,photoUrl";

fn render_csv(contacts: &[Contact]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push_str("\r\n");
    for c in contacts {
        let row = [
            &c.firstname,
            &c.lastname,
            &c.email,
            &c.phone,
            &c.address,
            &c.photo_url,
        ]
        .map(|v| csv_field(v))
        .join(",");
        out.push_str(&row);
        out.push_str("\r\n");
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn render_vcard(contacts: &[Contact]) -> String {
    let mut out = String::new();
    for c in contacts {
        out.push_str("BEGIN:VCARD\r\nVERSION:3.0\r\n");
        let _ = write!(
            out,
            "N:{};{};;;\r\nFN:{}\r\n",
            vcard_text(&c.lastname),
            vcard_text(&c.firstname),
            vcard_text(&c.full_name())
        );
        if !is_blank(&c.phone) {
            let _ = write!(out, "TEL;TYPE=CELL:{}\r\n", vcard_text(&c.phone));
        }
        if !is_blank(&c.email) {
            let _ = write!(out, "EMAIL;TYPE=INTERNET:{}\r\n", vcard_text(&c.email));
        }
        if !is_blank(&c.address) {
            let _ = write!(out, "ADR:;;{};;;;\r\n", vcard_text(&c.address));
        }
        if !is_blank(&c.photo_url) {
            let _ = write!(out, "PHOTO;VALUE=URI:{}\r\n", c.photo_url);
        }
        out.push_str("END:VCARD\r\n");
    }
    out
}

/// Escape a vCard 3.0 text value.
fn vcard_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            ',' => out.push_str("\\,"),
            ';' => out.push_str("\\;"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;

    #[tokio::test]
    async fn test_vcf_export_lifecycle() {
        let repo = repo();
        let owner = Uuid::new_v4();
        repo.create_contact(owner, fields("Jo", "Lee", "555"), vec![])
            .await
            .unwrap();

        let export = repo.create_export(owner, ExportFormat::Vcf, None).await.unwrap();
        assert_eq!(export.status, ExportStatus::InProgress);
        assert_eq!(export.file_path, format!("exports/{}.vcf", export.id));

        let err = repo.download_export(owner, export.id).await.unwrap_err();
        assert!(matches!(err, StoreError::NotReady));
        assert_eq!(err.to_string(), "Export not ready for download");

        repo.set_export_status(export.id, ExportStatus::Completed)
            .await
            .unwrap();
        let file = repo.download_export(owner, export.id).await.unwrap();
        assert_eq!(file.filename, "export.vcf");
        assert!(file.body.starts_with("BEGIN:VCARD\r\nVERSION:3.0\r\n"));
        assert!(file.body.contains("FN:Jo Lee\r\n"));
        assert!(file.body.contains("TEL;TYPE=CELL:555\r\n"));
    }

    #[tokio::test]
    async fn test_csv_export_is_label_scoped() {
        let repo = repo();
        let owner = Uuid::new_v4();
        let work = repo.create_label(owner, label("Work"), vec![]).await.unwrap();
        repo.create_contact(
            owner,
            ContactFields {
                address: Some("1 Main St, Springfield".into()),
                ..fields("Jo", "Lee", "555")
            },
            vec![work.id],
        )
        .await
        .unwrap();
        repo.create_contact(owner, fields("Al", "Kay", "556"), vec![])
            .await
            .unwrap();

        let export = repo
            .create_export(owner, ExportFormat::Csv, Some(work.id))
            .await
            .unwrap();
        repo.set_export_status(export.id, ExportStatus::Completed)
            .await
            .unwrap();
        let file = repo.download_export(owner, export.id).await.unwrap();

        let lines: Vec<&str> = file.body.lines().collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "Jo,Lee,,555,\"1 Main St, Springfield\",");
    }

    #[tokio::test]
    async fn test_export_access() {
        let repo = repo();
        let owner = Uuid::new_v4();
        let export = repo.create_export(owner, ExportFormat::Csv, None).await.unwrap();

        assert!(matches!(
            repo.get_export(Uuid::new_v4(), export.id).await,
            Err(StoreError::Forbidden(_))
        ));
        assert!(matches!(
            repo.delete_export(owner, Uuid::new_v4()).await,
            Err(StoreError::NotFound("Export"))
        ));
        assert!(matches!(
            repo.create_export(owner, ExportFormat::Csv, Some(Uuid::new_v4())).await,
            Err(StoreError::InvalidReference(_))
        ));

        repo.delete_export(owner, export.id).await.unwrap();
        assert!(repo.list_exports(owner).await.unwrap().is_empty());
    }

    #[test]
    fn test_vcard_escaping() {
        assert_eq!(vcard_text("a,b;c\\d\ne"), "a\\,b\\;c\\\\d\\ne");
    }
}
