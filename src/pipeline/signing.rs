//! Signing stage: drains a batch of `pending` petitions through the form
//! filler.
//!
//! Each record is claimed (`pending → claimed`) before any work, so two
//! overlapping passes never attempt the same petition. A claim whose outcome
//! could not be persisted is handed back; claims abandoned by a crashed pass
//! are released once they are older than the stale-claim timeout.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::automation::FormFiller;
use crate::config::SigningConfig;
use crate::error::PipelineError;
use crate::petitions::{PetitionStatus, PetitionType, ProcessedPetition, UserProfile};
use crate::pipeline::field_mapper::build_mapping;
use crate::store::PetitionStore;

/// Note recorded when automation is switched off.
pub const AUTOMATION_DISABLED_NOTE: &str = "automation disabled";

/// Note recorded when the profile yields no fields to fill.
pub const NO_USER_INFO_NOTE: &str = "no user info configured";

/// Counts from one signing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SigningReport {
    /// Pending records selected for this pass.
    pub selected: usize,
    pub signed: usize,
    pub failed: usize,
    /// Records another pass claimed first.
    pub lost_claims: usize,
    /// Records whose claim or outcome could not be written; retried next cycle.
    pub persistence_errors: usize,
}

pub struct SigningStage {
    store: Arc<dyn PetitionStore>,
    filler: Arc<dyn FormFiller>,
    profile: UserProfile,
    config: SigningConfig,
}

impl SigningStage {
    pub fn new(
        store: Arc<dyn PetitionStore>,
        filler: Arc<dyn FormFiller>,
        profile: UserProfile,
        config: SigningConfig,
    ) -> Self {
        Self {
            store,
            filler,
            profile,
            config,
        }
    }

    /// Attempt up to `batch_size` pending petitions, oldest first.
    ///
    /// Only failures to read the queue end the pass with an error; anything
    /// that goes wrong for one record is counted in the report.
    pub async fn run(&self) -> Result<SigningReport, PipelineError> {
        let mut report = SigningReport::default();

        let cutoff = chrono::Duration::from_std(self.config.stale_claim_after)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age));
        match cutoff {
            Some(cutoff) => {
                self.store.release_stale_claims(cutoff).await?;
            }
            None => warn!(
                stale_secs = self.config.stale_claim_after.as_secs(),
                "Stale-claim timeout out of range; not releasing claims"
            ),
        }

        let pending = self.store.list_pending(self.config.batch_size).await?;
        if pending.is_empty() {
            return Ok(report);
        }
        report.selected = pending.len();

        let types = match self.store.list_petition_types().await {
            Ok(types) => types,
            Err(e) => {
                warn!(error = %e, "Failed to load petition types; signing without field aliases");
                Vec::new()
            }
        };

        info!(count = pending.len(), "Signing pending petitions");

        for petition in &pending {
            match self.store.claim_pending(petition.id).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(id = %petition.id, "Petition claimed elsewhere; skipping");
                    report.lost_claims += 1;
                    continue;
                }
                Err(e) => {
                    error!(id = %petition.id, error = %e, "Failed to claim petition");
                    report.persistence_errors += 1;
                    continue;
                }
            }

            let petition_type = petition
                .petition_type_id
                .and_then(|id| types.iter().find(|t| t.id == id));
            let (status, notes) = self.sign_one(petition, petition_type).await;

            match self.store.update_status(petition.id, status, Some(&notes)).await {
                Ok(true) => match status {
                    PetitionStatus::Signed => report.signed += 1,
                    _ => report.failed += 1,
                },
                Ok(false) => {
                    warn!(id = %petition.id, "Petition vanished before its outcome was saved");
                    report.persistence_errors += 1;
                }
                Err(e) => {
                    error!(
                        id = %petition.id,
                        status = %status,
                        error = %e,
                        "Failed to persist signing outcome; will retry next cycle"
                    );
                    report.persistence_errors += 1;
                    if let Err(e) = self.store.release_claim(petition.id).await {
                        warn!(
                            id = %petition.id,
                            error = %e,
                            "Failed to release claim; stale-claim sweep will recover it"
                        );
                    }
                }
            }
        }

        info!(
            selected = report.selected,
            signed = report.signed,
            failed = report.failed,
            lost_claims = report.lost_claims,
            persistence_errors = report.persistence_errors,
            "Signing pass complete"
        );
        Ok(report)
    }

    /// Decide the outcome for one claimed petition.
    async fn sign_one(
        &self,
        petition: &ProcessedPetition,
        petition_type: Option<&PetitionType>,
    ) -> (PetitionStatus, String) {
        let mapping = build_mapping(&self.profile, petition_type);

        if !self.config.automation_enabled {
            return (PetitionStatus::Failed, AUTOMATION_DISABLED_NOTE.to_string());
        }
        if mapping.is_empty() {
            return (PetitionStatus::Failed, NO_USER_INFO_NOTE.to_string());
        }

        let url = petition.petition_url.as_deref().unwrap_or_default();
        match self.filler.attempt(url, &mapping).await {
            Ok(outcome) if outcome.success => {
                info!(id = %petition.id, url = %url, "Petition signed");
                (PetitionStatus::Signed, outcome.message)
            }
            Ok(outcome) => {
                warn!(
                    id = %petition.id,
                    url = %url,
                    reason = %outcome.message,
                    "Petition not signed"
                );
                (PetitionStatus::Failed, outcome.message)
            }
            Err(e) => {
                error!(id = %petition.id, url = %url, error = %e, "Form filler failed");
                (PetitionStatus::Failed, e.to_string())
            }
        }
    }
}
