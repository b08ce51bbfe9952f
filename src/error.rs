//! Error types for the petitioner.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    #[error("Automation error: {0}")]
    Automation(#[from] AutomationError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Mailbox reader errors.
#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("Mailbox not configured: {0}")]
    NotConfigured(String),

    #[error("Failed to connect to {host}:{port}: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("IMAP login failed for {user}")]
    AuthFailed { user: String },

    #[error("IMAP protocol error: {0}")]
    Protocol(String),

    #[error("Failed to decode message {reference}: {reason}")]
    Decode { reference: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Form-fill automation errors (unexpected failures, not "form rejected").
#[derive(Debug, thiserror::Error)]
pub enum AutomationError {
    #[error("Request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("Request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Automation backend unavailable: {0}")]
    Unavailable(String),
}

/// Pipeline-related errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Cycle task panicked: {0}")]
    Panicked(String),

    #[error("Store unavailable: {0}")]
    Store(#[from] DatabaseError),
}

/// Result type alias for the petitioner.
pub type Result<T> = std::result::Result<T, Error>;
