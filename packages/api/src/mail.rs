//! Outgoing mail.
//!
//! [`SendGridMailer`] posts to the SendGrid v3 API; [`LogMailer`] only logs, and is
//! used whenever no API key is configured. Handlers treat delivery as best effort:
//! a failed send is logged, never returned to the caller.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use crate::error::AppError;
use crate::settings::Settings;

const SENDGRID_URL: &str = "https://api.sendgrid.com/v3/mail/send";
const SENDER_NAME: &str = "Pingbook Support";

#[derive(Debug, Clone, PartialEq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html: String,
}

impl Email {
    pub fn verification(frontend: &str, to: &str, token: &str) -> Self {
        let link = format!("{frontend}/verify-email?token={token}");
        Self {
            to: to.to_string(),
            subject: "Verify Your Email - Pingbook".to_string(),
            html: format!(
                "<p>Please verify your email by clicking this link: <a href=\"{link}\">{link}</a></p>"
            ),
        }
    }

    pub fn password_reset(frontend: &str, to: &str, token: &str) -> Self {
        let link = format!("{frontend}/reset-password?token={token}");
        Self {
            to: to.to_string(),
            subject: "Reset Your Password - Pingbook".to_string(),
            html: format!(
                "<p>Reset your password by clicking this link: <a href=\"{link}\">{link}</a></p>\
                 <p>The link expires in one hour.</p>"
            ),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), AppError>;
}

pub struct SendGridMailer {
    client: reqwest::Client,
    api_key: String,
    from: String,
}

impl SendGridMailer {
    pub fn new(api_key: String, from: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            from,
        }
    }
}

#[async_trait]
impl Mailer for SendGridMailer {
    async fn send(&self, email: Email) -> Result<(), AppError> {
        let body = json!({
            "personalizations": [{ "to": [{ "email": email.to }] }],
            "from": { "email": self.from, "name": SENDER_NAME },
            "subject": email.subject,
            "content": [{ "type": "text/html", "value": email.html }],
        });
        self.client
            .post(SENDGRID_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| AppError::Internal(format!("SendGrid request failed: {e}")))?;
        info!(to = %email.to, subject = %email.subject, "email sent");
        Ok(())
    }
}

pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<(), AppError> {
        info!(to = %email.to, subject = %email.subject, "email not sent, no mail provider configured");
        Ok(())
    }
}

/// SendGrid when a key is configured, otherwise the logging mailer.
pub fn from_settings(settings: &Settings) -> Arc<dyn Mailer> {
    if settings.sendgrid.key.is_empty() {
        Arc::new(LogMailer)
    } else {
        Arc::new(SendGridMailer::new(
            settings.sendgrid.key.clone(),
            settings.sendgrid.from.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Mutex;

    use tracing_subscriber::fmt::MakeWriter;

    use super::*;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_verification_link() {
        let email = Email::verification("https://pingbook.app", "a@example.com", "abc");
        assert_eq!(email.to, "a@example.com");
        assert!(email
            .html
            .contains("https://pingbook.app/verify-email?token=abc"));
    }

    #[tokio::test]
    async fn test_log_mailer_keeps_tokens_out_of_logs() {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(captured.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let email = Email::password_reset("https://pingbook.app", "a@example.com", "reset-abc123");
        assert!(email.html.contains("reset-abc123"));
        LogMailer.send(email).await.unwrap();

        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("a@example.com"));
        assert!(!logs.contains("reset-abc123"));
    }
}
