//! Mailbox reader abstraction.

use async_trait::async_trait;

use crate::error::MailboxError;

/// A decoded inbound email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxRecord {
    /// Message-ID header (without angle brackets). The dedup key.
    pub message_id: String,
    pub subject: String,
    /// Body decoded to text.
    pub body: String,
}

impl MailboxRecord {
    pub fn new(
        message_id: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }
}

/// One fetched message: decoded, or the reason it could not be.
pub type FetchedRecord = Result<MailboxRecord, MailboxError>;

/// Source of unseen messages.
///
/// The outer `Result` is a whole-fetch failure (unreachable server, bad
/// credentials). Per-message decode failures are reported inline so one bad
/// message never hides the rest. "Unseen since last check" bookkeeping
/// belongs to the implementation.
#[async_trait]
pub trait MailboxReader: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Fetch messages not seen by a previous call, in mailbox order.
    async fn fetch_unseen(&self) -> Result<Vec<FetchedRecord>, MailboxError>;
}
