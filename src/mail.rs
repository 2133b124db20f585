//! Outgoing mail.
//!
//! The server only sends one kind of message, the account activation link.
//! [`LogMailer`] drops each message into an outbox directory and logs it,
//! which is enough for a single-host deployment behind a local MTA pickup
//! directory. [`MemoryMailer`] keeps messages in memory.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Outbox write failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Email {
    /// RFC 5322-ish rendering used for the outbox files.
    pub fn to_eml(&self) -> String {
        format!(
            "To: {}\r\nSubject: {}\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{}\r\n",
            self.to, self.subject, self.body
        )
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), MailError>;
}

pub struct LogMailer {
    outbox: PathBuf,
}

impl LogMailer {
    pub fn new(outbox: PathBuf) -> Self {
        Self { outbox }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        if email.to.contains(['\r', '\n']) {
            return Err(MailError::InvalidRecipient(email.to));
        }

        tokio::fs::create_dir_all(&self.outbox).await?;
        let path = self
            .outbox
            .join(format!("{}.eml", uuid::Uuid::now_v7()));
        tokio::fs::write(&path, email.to_eml()).await?;

        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "Queued email at {}",
            path.display()
        );
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<Email>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<Email> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        self.sent.lock().await.push(email);
        Ok(())
    }
}
