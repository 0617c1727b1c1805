//! E-mail dispatch collaborator contract.
//!
//! Used for large-export delivery. A failure here after the export has
//! committed is reported to the caller but not compensated; credits and the
//! audit record stand.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("mail dispatch rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct EmailAttachment {
    pub filename: String,
    pub content: Vec<u8>,
}

#[rocket::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        attachment: Option<EmailAttachment>,
    ) -> Result<(), MailError>;
}

/// HTTP-backed mailer posting JSON to a relay endpoint.
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Serialize)]
struct MailPayload<'a> {
    to: &'a str,
    subject: &'a str,
    body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    attachment: Option<&'a EmailAttachment>,
}

impl HttpMailer {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }

    pub fn from_env() -> Option<Self> {
        std::env::var("LEADSTORE_MAIL_URL").ok().map(Self::new)
    }
}

#[rocket::async_trait]
impl Mailer for HttpMailer {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        attachment: Option<EmailAttachment>,
    ) -> Result<(), MailError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&MailPayload {
                to,
                subject,
                body,
                attachment: attachment.as_ref(),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MailError::Rejected(format!(
                "relay returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}

/// Records outgoing mail instead of sending it; used by tests.
#[derive(Default)]
pub struct RecordingMailer {
    sent: std::sync::Mutex<Vec<RecordedMail>>,
}

#[derive(Debug, Clone)]
pub struct RecordedMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<RecordedMail> {
        self.sent.lock().expect("mailer lock").clone()
    }
}

#[rocket::async_trait]
impl Mailer for RecordingMailer {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        _attachment: Option<EmailAttachment>,
    ) -> Result<(), MailError> {
        self.sent.lock().expect("mailer lock").push(RecordedMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}
