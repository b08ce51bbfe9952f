//! Inbound mail: the reader abstraction and the IMAP implementation.

pub mod email;
pub mod mailbox;

pub use email::{ImapMailbox, MailboxConfig};
pub use mailbox::{FetchedRecord, MailboxReader, MailboxRecord};
