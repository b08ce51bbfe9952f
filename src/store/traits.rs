//! `PetitionStore` trait: the persistence interface the pipeline consumes.
//!
//! The handle is passed explicitly (`Arc<dyn PetitionStore>`) to every stage
//! so tests can substitute doubles and there is no process-wide state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::petitions::{
    NewPetitionType, NewProcessedPetition, PetitionStatus, PetitionType, ProcessedPetition,
};

/// Backend-agnostic petition store.
#[async_trait]
pub trait PetitionStore: Send + Sync {
    /// Run all pending schema migrations.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    // ── Processed petitions ─────────────────────────────────────────

    /// Whether a record exists for this mailbox message id.
    async fn exists_by_message_id(&self, message_id: &str) -> Result<bool, DatabaseError>;

    /// Insert a new record. Fails with `DatabaseError::Constraint` if the
    /// message id is already recorded.
    async fn insert_processed(&self, record: &NewProcessedPetition) -> Result<Uuid, DatabaseError>;

    /// Look up a record by mailbox message id.
    async fn get_processed_by_message_id(
        &self,
        message_id: &str,
    ) -> Result<Option<ProcessedPetition>, DatabaseError>;

    /// Pending records with a non-empty URL, oldest-created first.
    async fn list_pending(&self, limit: usize) -> Result<Vec<ProcessedPetition>, DatabaseError>;

    /// Conditionally move a record from `pending` to `claimed`.
    /// Returns `true` for exactly one caller.
    async fn claim_pending(&self, id: Uuid) -> Result<bool, DatabaseError>;

    /// Move a `claimed` record back to `pending`.
    async fn release_claim(&self, id: Uuid) -> Result<bool, DatabaseError>;

    /// Release every claim taken before `claimed_before`. Returns the count.
    async fn release_stale_claims(
        &self,
        claimed_before: DateTime<Utc>,
    ) -> Result<usize, DatabaseError>;

    /// Set status and notes. Returns `false` if no record matched.
    async fn update_status(
        &self,
        id: Uuid,
        status: PetitionStatus,
        notes: Option<&str>,
    ) -> Result<bool, DatabaseError>;

    /// Most recent records first, up to `limit`.
    async fn list_processed(&self, limit: usize) -> Result<Vec<ProcessedPetition>, DatabaseError>;

    // ── Petition types ──────────────────────────────────────────────

    /// All petition types, ordered by name.
    async fn list_petition_types(&self) -> Result<Vec<PetitionType>, DatabaseError>;

    /// Create a petition type. Returns its id.
    async fn insert_petition_type(&self, new: &NewPetitionType) -> Result<Uuid, DatabaseError>;

    /// Delete a petition type. Returns `false` if it did not exist.
    async fn delete_petition_type(&self, id: Uuid) -> Result<bool, DatabaseError>;
}
