//! Ingestion stage: mailbox → classifier → processed-petition records.
//!
//! Every inbound email gets exactly one record, keyed by its message id.
//! Accepted emails are queued as `pending` for the signing stage; rejected
//! ones are recorded as `skipped` with the classifier's reason.

use std::sync::Arc;

use regex::RegexBuilder;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::channels::mailbox::{MailboxReader, MailboxRecord};
use crate::error::{DatabaseError, MailboxError};
use crate::petitions::{NewProcessedPetition, PetitionStatus, PetitionType};
use crate::pipeline::classifier::{extract_urls, Classifier};
use crate::store::PetitionStore;

/// Counts from one ingestion pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Records returned by the mailbox, decodable or not.
    pub seen: usize,
    /// Already recorded (or recorded concurrently).
    pub duplicates: usize,
    /// New `pending` records.
    pub queued: usize,
    /// New `skipped` records.
    pub skipped: usize,
    /// Records that could not be decoded or persisted.
    pub failed: usize,
}

/// What happened to a single mailbox record.
enum RecordOutcome {
    Duplicate,
    Queued,
    Skipped,
}

pub struct IngestionStage {
    store: Arc<dyn PetitionStore>,
    mailbox: Arc<dyn MailboxReader>,
    classifier: Classifier,
}

impl IngestionStage {
    pub fn new(store: Arc<dyn PetitionStore>, mailbox: Arc<dyn MailboxReader>) -> Self {
        Self {
            store,
            mailbox,
            classifier: Classifier::default_rules(),
        }
    }

    /// Replace the classifier rule table.
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Run one pass over the mailbox's unseen messages.
    ///
    /// A mailbox failure ends the pass early and is only logged. Per-record
    /// failures are counted and never stop the remaining records.
    pub async fn run(&self) -> IngestReport {
        let mut report = IngestReport::default();

        let records = match self.mailbox.fetch_unseen().await {
            Ok(records) => records,
            Err(MailboxError::NotConfigured(reason)) => {
                warn!(
                    mailbox = self.mailbox.name(),
                    "Mailbox not configured, skipping ingestion: {reason}"
                );
                return report;
            }
            Err(e) => {
                error!(mailbox = self.mailbox.name(), error = %e, "Mailbox fetch failed");
                return report;
            }
        };
        report.seen = records.len();

        let types = match self.store.list_petition_types().await {
            Ok(types) => types,
            Err(e) => {
                warn!(error = %e, "Failed to load petition types; ingesting without type resolution");
                Vec::new()
            }
        };

        for fetched in records {
            let record = match fetched {
                Ok(record) => record,
                Err(e) => {
                    warn!(error = %e, "Skipping undecodable mailbox record");
                    report.failed += 1;
                    continue;
                }
            };

            match self.ingest_record(&record, &types).await {
                Ok(RecordOutcome::Duplicate) => report.duplicates += 1,
                Ok(RecordOutcome::Queued) => report.queued += 1,
                Ok(RecordOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    error!(message_id = %record.message_id, error = %e, "Failed to record email");
                    report.failed += 1;
                }
            }
        }

        if report.seen > 0 {
            info!(
                seen = report.seen,
                queued = report.queued,
                skipped = report.skipped,
                duplicates = report.duplicates,
                failed = report.failed,
                "Ingestion pass complete"
            );
        }
        report
    }

    async fn ingest_record(
        &self,
        record: &MailboxRecord,
        types: &[PetitionType],
    ) -> Result<RecordOutcome, DatabaseError> {
        if self.store.exists_by_message_id(&record.message_id).await? {
            debug!(message_id = %record.message_id, "Already processed");
            return Ok(RecordOutcome::Duplicate);
        }

        let classification = self.classifier.classify(&record.subject, &record.body);
        let petition_url = extract_urls(&record.body).into_iter().next();

        let (status, notes, petition_type_id) = if classification.accepted {
            let type_id = petition_url
                .as_deref()
                .and_then(|url| resolve_type(types, url));
            (PetitionStatus::Pending, None, type_id)
        } else {
            (PetitionStatus::Skipped, Some(classification.reason.clone()), None)
        };

        let new = NewProcessedPetition {
            message_id: record.message_id.clone(),
            petition_type_id,
            petition_url,
            subject: record.subject.clone(),
            status,
            notes,
        };

        match self.store.insert_processed(&new).await {
            Ok(id) => {
                debug!(
                    id = %id,
                    message_id = %record.message_id,
                    status = %status,
                    reason = %classification.reason,
                    "Recorded email"
                );
                if status == PetitionStatus::Pending && new.petition_url.is_none() {
                    warn!(id = %id, "Accepted petition has no URL; it will not be signed");
                }
                Ok(if classification.accepted {
                    RecordOutcome::Queued
                } else {
                    RecordOutcome::Skipped
                })
            }
            Err(DatabaseError::Constraint(_)) => Ok(RecordOutcome::Duplicate),
            Err(e) => Err(e),
        }
    }
}

/// First enabled type, in name order, whose URL pattern matches `url`.
///
/// Patterns are case-insensitive regexes; one that fails to compile is
/// treated as a plain substring.
pub fn resolve_type(types: &[PetitionType], url: &str) -> Option<Uuid> {
    let url_lc = url.to_lowercase();
    let mut candidates: Vec<&PetitionType> = types.iter().filter(|t| t.enabled).collect();
    candidates.sort_by(|a, b| a.name.cmp(&b.name));

    candidates
        .into_iter()
        .find(|t| {
            let Some(pattern) = t.url_pattern.as_deref().map(str::trim).filter(|p| !p.is_empty())
            else {
                return false;
            };
            match RegexBuilder::new(pattern).case_insensitive(true).build() {
                Ok(re) => re.is_match(url),
                Err(_) => url_lc.contains(&pattern.to_lowercase()),
            }
        })
        .map(|t| t.id)
}
