//! Form-fill automation: the capability the signing stage drives.

pub mod form;
pub mod http;

use async_trait::async_trait;

use crate::error::AutomationError;
use crate::pipeline::field_mapper::FieldMapping;

pub use http::HttpFormFiller;

/// Outcome of one fill-and-submit attempt.
///
/// A page that could not be filled is `success: false` with a message;
/// `Err` is reserved for unexpected failures (network, timeouts).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptOutcome {
    pub success: bool,
    pub message: String,
}

impl AttemptOutcome {
    pub fn signed(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Fills and submits the form behind a petition URL.
#[async_trait]
pub trait FormFiller: Send + Sync {
    async fn attempt(&self, url: &str, fields: &FieldMapping)
        -> Result<AttemptOutcome, AutomationError>;
}
