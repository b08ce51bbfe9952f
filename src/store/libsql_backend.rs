//! libSQL backend: async `PetitionStore` implementation.
//!
//! Supports local file and in-memory databases. All single-row writes rely on
//! SQLite's own atomicity; the claim step is a conditional UPDATE.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::petitions::{
    LogicalField, NewPetitionType, NewProcessedPetition, PetitionStatus, PetitionType,
    ProcessedPetition,
};
use crate::store::migrations;
use crate::store::traits::PetitionStore;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn query_petitions(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
        context: &str,
    ) -> Result<Vec<ProcessedPetition>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, params)
            .await
            .map_err(|e| DatabaseError::Query(format!("{context}: {e}")))?;

        let mut petitions = Vec::new();
        loop {
            match rows.next().await {
                Ok(Some(row)) => match row_to_petition(&row) {
                    Ok(p) => petitions.push(p),
                    Err(e) => warn!("Skipping petition row: {e}"),
                },
                Ok(None) => break,
                Err(e) => return Err(DatabaseError::Query(format!("{context}: {e}"))),
            }
        }
        Ok(petitions)
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Fixed-width RFC 3339 so stored timestamps sort lexicographically.
fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn parse_uuid(s: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|e| DatabaseError::Serialization(format!("bad uuid {s:?}: {e}")))
}

fn query_err(context: &str) -> impl Fn(libsql::Error) -> DatabaseError + '_ {
    move |e| {
        let msg = e.to_string();
        if msg.contains("UNIQUE constraint failed") {
            DatabaseError::Constraint(format!("{context}: {msg}"))
        } else {
            DatabaseError::Query(format!("{context}: {msg}"))
        }
    }
}

/// Decode the stored alias JSON, dropping keys outside the logical field set.
fn decode_aliases(type_name: &str, raw: Option<&str>) -> BTreeMap<LogicalField, String> {
    let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
        return BTreeMap::new();
    };
    let parsed: BTreeMap<String, String> = match serde_json::from_str(raw) {
        Ok(map) => map,
        Err(e) => {
            warn!(petition_type = type_name, error = %e, "Ignoring malformed field mapping");
            return BTreeMap::new();
        }
    };
    parsed
        .into_iter()
        .filter_map(|(key, value)| match key.parse::<LogicalField>() {
            Ok(field) => Some((field, value)),
            Err(_) => {
                warn!(petition_type = type_name, key = %key, "Ignoring unknown field alias");
                None
            }
        })
        .collect()
}

const PETITION_COLUMNS: &str = "id, message_id, petition_type_id, petition_url, subject, status, notes, created_at, updated_at, claimed_at";

const TYPE_COLUMNS: &str =
    "id, name, description, field_mapping, url_pattern, enabled, created_at, updated_at";

/// Map a libsql Row to a ProcessedPetition (column order: PETITION_COLUMNS).
fn row_to_petition(row: &libsql::Row) -> Result<ProcessedPetition, DatabaseError> {
    let get_err = |e: libsql::Error| DatabaseError::Query(format!("row parse: {e}"));

    let id: String = row.get(0).map_err(get_err)?;
    let type_id: Option<String> = row.get::<String>(2).ok();
    let status_str: String = row.get(5).map_err(get_err)?;
    let created_str: String = row.get(7).map_err(get_err)?;
    let updated_str: String = row.get(8).map_err(get_err)?;
    let claimed_str: Option<String> = row.get::<String>(9).ok();

    Ok(ProcessedPetition {
        id: parse_uuid(&id)?,
        message_id: row.get(1).map_err(get_err)?,
        petition_type_id: type_id.as_deref().map(parse_uuid).transpose()?,
        petition_url: row.get::<String>(3).ok().filter(|u| !u.is_empty()),
        subject: row.get::<String>(4).unwrap_or_default(),
        status: status_str
            .parse()
            .map_err(DatabaseError::Serialization)?,
        notes: row.get::<String>(6).ok(),
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
        claimed_at: claimed_str.as_deref().map(parse_datetime),
    })
}

/// Map a libsql Row to a PetitionType (column order: TYPE_COLUMNS).
fn row_to_type(row: &libsql::Row) -> Result<PetitionType, DatabaseError> {
    let get_err = |e: libsql::Error| DatabaseError::Query(format!("row parse: {e}"));

    let id: String = row.get(0).map_err(get_err)?;
    let name: String = row.get(1).map_err(get_err)?;
    let mapping: Option<String> = row.get::<String>(3).ok();
    let enabled: i64 = row.get(5).unwrap_or(1);
    let created_str: String = row.get(6).map_err(get_err)?;
    let updated_str: String = row.get(7).map_err(get_err)?;

    Ok(PetitionType {
        id: parse_uuid(&id)?,
        field_aliases: decode_aliases(&name, mapping.as_deref()),
        name,
        description: row.get::<String>(2).ok(),
        url_pattern: row.get::<String>(4).ok().filter(|p| !p.trim().is_empty()),
        enabled: enabled != 0,
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl PetitionStore for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Processed petitions ─────────────────────────────────────────

    async fn exists_by_message_id(&self, message_id: &str) -> Result<bool, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT 1 FROM processed_petitions WHERE message_id = ?1 LIMIT 1",
                params![message_id],
            )
            .await
            .map_err(query_err("exists_by_message_id"))?;

        match rows.next().await {
            Ok(row) => Ok(row.is_some()),
            Err(e) => Err(DatabaseError::Query(format!("exists_by_message_id: {e}"))),
        }
    }

    async fn insert_processed(&self, record: &NewProcessedPetition) -> Result<Uuid, DatabaseError> {
        let id = Uuid::new_v4();
        let now = format_datetime(Utc::now());
        let type_id = record.petition_type_id.map(|t| t.to_string());

        self.conn()
            .execute(
                "INSERT INTO processed_petitions (id, message_id, petition_type_id, petition_url,
                    subject, status, notes, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                params![
                    id.to_string(),
                    record.message_id.as_str(),
                    opt_text(type_id.as_deref()),
                    opt_text(record.petition_url.as_deref()),
                    record.subject.as_str(),
                    record.status.as_str(),
                    opt_text(record.notes.as_deref()),
                    now,
                ],
            )
            .await
            .map_err(query_err("insert_processed"))?;

        debug!(id = %id, message_id = %record.message_id, status = %record.status, "Petition recorded");
        Ok(id)
    }

    async fn get_processed_by_message_id(
        &self,
        message_id: &str,
    ) -> Result<Option<ProcessedPetition>, DatabaseError> {
        let mut found = self
            .query_petitions(
                &format!("SELECT {PETITION_COLUMNS} FROM processed_petitions WHERE message_id = ?1"),
                params![message_id],
                "get_processed_by_message_id",
            )
            .await?;
        Ok(found.pop())
    }

    async fn list_pending(&self, limit: usize) -> Result<Vec<ProcessedPetition>, DatabaseError> {
        self.query_petitions(
            &format!(
                "SELECT {PETITION_COLUMNS} FROM processed_petitions
                 WHERE status = 'pending' AND petition_url IS NOT NULL AND petition_url != ''
                 ORDER BY created_at ASC, rowid ASC
                 LIMIT ?1"
            ),
            params![limit as i64],
            "list_pending",
        )
        .await
    }

    async fn claim_pending(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let now = format_datetime(Utc::now());
        let changed = self
            .conn()
            .execute(
                "UPDATE processed_petitions SET status = 'claimed', claimed_at = ?1, updated_at = ?1
                 WHERE id = ?2 AND status = 'pending'",
                params![now, id.to_string()],
            )
            .await
            .map_err(query_err("claim_pending"))?;
        Ok(changed == 1)
    }

    async fn release_claim(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let now = format_datetime(Utc::now());
        let changed = self
            .conn()
            .execute(
                "UPDATE processed_petitions SET status = 'pending', claimed_at = NULL, updated_at = ?1
                 WHERE id = ?2 AND status = 'claimed'",
                params![now, id.to_string()],
            )
            .await
            .map_err(query_err("release_claim"))?;
        Ok(changed == 1)
    }

    async fn release_stale_claims(
        &self,
        claimed_before: DateTime<Utc>,
    ) -> Result<usize, DatabaseError> {
        let now = format_datetime(Utc::now());
        let changed = self
            .conn()
            .execute(
                "UPDATE processed_petitions SET status = 'pending', claimed_at = NULL, updated_at = ?1
                 WHERE status = 'claimed' AND (claimed_at IS NULL OR claimed_at < ?2)",
                params![now, format_datetime(claimed_before)],
            )
            .await
            .map_err(query_err("release_stale_claims"))?;

        if changed > 0 {
            info!(count = changed, "Released stale signing claims");
        }
        Ok(changed as usize)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: PetitionStatus,
        notes: Option<&str>,
    ) -> Result<bool, DatabaseError> {
        let now = format_datetime(Utc::now());
        let changed = self
            .conn()
            .execute(
                "UPDATE processed_petitions SET status = ?1, notes = ?2, claimed_at = NULL, updated_at = ?3
                 WHERE id = ?4",
                params![status.as_str(), opt_text(notes), now, id.to_string()],
            )
            .await
            .map_err(query_err("update_status"))?;

        debug!(id = %id, status = %status, "Petition status updated");
        Ok(changed > 0)
    }

    async fn list_processed(&self, limit: usize) -> Result<Vec<ProcessedPetition>, DatabaseError> {
        self.query_petitions(
            &format!(
                "SELECT {PETITION_COLUMNS} FROM processed_petitions
                 ORDER BY created_at DESC, rowid DESC LIMIT ?1"
            ),
            params![limit as i64],
            "list_processed",
        )
        .await
    }

    // ── Petition types ──────────────────────────────────────────────

    async fn list_petition_types(&self) -> Result<Vec<PetitionType>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {TYPE_COLUMNS} FROM petition_types ORDER BY name ASC"),
                (),
            )
            .await
            .map_err(query_err("list_petition_types"))?;

        let mut types = Vec::new();
        loop {
            match rows.next().await {
                Ok(Some(row)) => match row_to_type(&row) {
                    Ok(t) => types.push(t),
                    Err(e) => warn!("Skipping petition type row: {e}"),
                },
                Ok(None) => break,
                Err(e) => return Err(DatabaseError::Query(format!("list_petition_types: {e}"))),
            }
        }
        Ok(types)
    }

    async fn insert_petition_type(&self, new: &NewPetitionType) -> Result<Uuid, DatabaseError> {
        let id = Uuid::new_v4();
        let now = format_datetime(Utc::now());
        let mapping = if new.field_aliases.is_empty() {
            None
        } else {
            Some(
                serde_json::to_string(&new.field_aliases)
                    .map_err(|e| DatabaseError::Serialization(e.to_string()))?,
            )
        };

        self.conn()
            .execute(
                "INSERT INTO petition_types (id, name, description, field_mapping, url_pattern,
                    enabled, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![
                    id.to_string(),
                    new.name.as_str(),
                    opt_text(new.description.as_deref()),
                    opt_text(mapping.as_deref()),
                    opt_text(new.url_pattern.as_deref()),
                    i64::from(new.enabled),
                    now,
                ],
            )
            .await
            .map_err(query_err("insert_petition_type"))?;

        info!(id = %id, name = %new.name, "Petition type created");
        Ok(id)
    }

    async fn delete_petition_type(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let changed = self
            .conn()
            .execute(
                "DELETE FROM petition_types WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(query_err("delete_petition_type"))?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    async fn test_db() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    fn new_record(message_id: &str, status: PetitionStatus, url: Option<&str>) -> NewProcessedPetition {
        NewProcessedPetition {
            message_id: message_id.into(),
            petition_type_id: None,
            petition_url: url.map(String::from),
            subject: format!("Subject for {message_id}"),
            status,
            notes: None,
        }
    }

    // ── Processed petition tests ────────────────────────────────────

    #[tokio::test]
    async fn insert_and_get_by_message_id() {
        let db = test_db().await;
        let id = db
            .insert_processed(&new_record("msg-1", PetitionStatus::Pending, Some("https://x.org/p")))
            .await
            .unwrap();

        let loaded = db.get_processed_by_message_id("msg-1").await.unwrap().unwrap();
        assert_eq!(loaded.id, id);
        assert_eq!(loaded.message_id, "msg-1");
        assert_eq!(loaded.petition_url.as_deref(), Some("https://x.org/p"));
        assert_eq!(loaded.subject, "Subject for msg-1");
        assert_eq!(loaded.status, PetitionStatus::Pending);
        assert!(loaded.notes.is_none());
        assert!(loaded.claimed_at.is_none());
    }

    #[tokio::test]
    async fn exists_by_message_id() {
        let db = test_db().await;
        assert!(!db.exists_by_message_id("msg-1").await.unwrap());
        db.insert_processed(&new_record("msg-1", PetitionStatus::Skipped, None))
            .await
            .unwrap();
        assert!(db.exists_by_message_id("msg-1").await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_message_id_is_constraint_error() {
        let db = test_db().await;
        db.insert_processed(&new_record("dup", PetitionStatus::Pending, None))
            .await
            .unwrap();
        let err = db
            .insert_processed(&new_record("dup", PetitionStatus::Skipped, None))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Constraint(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn list_pending_is_fifo_and_requires_url() {
        let db = test_db().await;
        db.insert_processed(&new_record("a", PetitionStatus::Pending, Some("https://a.org")))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        db.insert_processed(&new_record("no-url", PetitionStatus::Pending, None))
            .await
            .unwrap();
        db.insert_processed(&new_record("b", PetitionStatus::Pending, Some("https://b.org")))
            .await
            .unwrap();
        db.insert_processed(&new_record("s", PetitionStatus::Skipped, Some("https://s.org")))
            .await
            .unwrap();

        let one = db.list_pending(1).await.unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].message_id, "a");

        let all = db.list_pending(10).await.unwrap();
        let ids: Vec<_> = all.iter().map(|p| p.message_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn claim_succeeds_once() {
        let db = test_db().await;
        let id = db
            .insert_processed(&new_record("m", PetitionStatus::Pending, Some("https://m.org")))
            .await
            .unwrap();

        assert!(db.claim_pending(id).await.unwrap());
        assert!(!db.claim_pending(id).await.unwrap());

        let loaded = db.get_processed_by_message_id("m").await.unwrap().unwrap();
        assert_eq!(loaded.status, PetitionStatus::Claimed);
        assert!(loaded.claimed_at.is_some());
        assert!(db.list_pending(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn release_claim_returns_to_pending() {
        let db = test_db().await;
        let id = db
            .insert_processed(&new_record("m", PetitionStatus::Pending, Some("https://m.org")))
            .await
            .unwrap();
        db.claim_pending(id).await.unwrap();

        assert!(db.release_claim(id).await.unwrap());
        assert!(!db.release_claim(id).await.unwrap());
        assert_eq!(db.list_pending(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn release_stale_claims_only_touches_old_claims() {
        let db = test_db().await;
        let id = db
            .insert_processed(&new_record("m", PetitionStatus::Pending, Some("https://m.org")))
            .await
            .unwrap();
        db.claim_pending(id).await.unwrap();

        let released = db
            .release_stale_claims(Utc::now() - chrono::Duration::minutes(10))
            .await
            .unwrap();
        assert_eq!(released, 0);

        let released = db
            .release_stale_claims(Utc::now() + chrono::Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(released, 1);
        assert_eq!(db.list_pending(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_status_sets_notes() {
        let db = test_db().await;
        let id = db
            .insert_processed(&new_record("m", PetitionStatus::Pending, Some("https://m.org")))
            .await
            .unwrap();
        db.claim_pending(id).await.unwrap();

        assert!(db
            .update_status(id, PetitionStatus::Signed, Some("Filled 3 fields and submitted"))
            .await
            .unwrap());

        let loaded = db.get_processed_by_message_id("m").await.unwrap().unwrap();
        assert_eq!(loaded.status, PetitionStatus::Signed);
        assert_eq!(loaded.notes.as_deref(), Some("Filled 3 fields and submitted"));
        assert!(loaded.claimed_at.is_none());
    }

    #[tokio::test]
    async fn update_status_unknown_id() {
        let db = test_db().await;
        let updated = db
            .update_status(Uuid::new_v4(), PetitionStatus::Failed, None)
            .await
            .unwrap();
        assert!(!updated);
    }

    #[tokio::test]
    async fn list_processed_newest_first() {
        let db = test_db().await;
        for id in ["first", "second", "third"] {
            db.insert_processed(&new_record(id, PetitionStatus::Skipped, None))
                .await
                .unwrap();
        }
        let listed = db.list_processed(2).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|p| p.message_id.as_str()).collect();
        assert_eq!(ids, vec!["third", "second"]);
    }

    // ── Petition type tests ─────────────────────────────────────────

    #[tokio::test]
    async fn petition_type_roundtrip() {
        let db = test_db().await;
        let mut aliases = BTreeMap::new();
        aliases.insert(LogicalField::ZipCode, "postal".to_string());
        let id = db
            .insert_petition_type(&NewPetitionType {
                name: "ActionNetwork".into(),
                description: Some("Action Network forms".into()),
                field_aliases: aliases.clone(),
                url_pattern: Some(r"actionnetwork\.org".into()),
                enabled: true,
            })
            .await
            .unwrap();

        let types = db.list_petition_types().await.unwrap();
        assert_eq!(types.len(), 1);
        assert_eq!(types[0].id, id);
        assert_eq!(types[0].field_aliases, aliases);
        assert_eq!(types[0].url_pattern.as_deref(), Some(r"actionnetwork\.org"));
        assert!(types[0].enabled);
    }

    #[tokio::test]
    async fn petition_types_sorted_by_name() {
        let db = test_db().await;
        for name in ["zeta", "alpha", "mid"] {
            db.insert_petition_type(&NewPetitionType {
                name: name.into(),
                enabled: true,
                ..Default::default()
            })
            .await
            .unwrap();
        }
        let names: Vec<_> = db
            .list_petition_types()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[tokio::test]
    async fn delete_petition_type() {
        let db = test_db().await;
        let id = db
            .insert_petition_type(&NewPetitionType {
                name: "gone".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(db.delete_petition_type(id).await.unwrap());
        assert!(!db.delete_petition_type(id).await.unwrap());
        assert!(db.list_petition_types().await.unwrap().is_empty());
    }

    #[test]
    fn decode_aliases_drops_unknown_keys() {
        let aliases = decode_aliases("t", Some(r#"{"zip_code":"postal","middle_name":"mn"}"#));
        assert_eq!(aliases.len(), 1);
        assert_eq!(aliases.get(&LogicalField::ZipCode).map(String::as_str), Some("postal"));
    }

    #[test]
    fn decode_aliases_tolerates_garbage() {
        assert!(decode_aliases("t", Some("not json")).is_empty());
        assert!(decode_aliases("t", None).is_empty());
        assert!(decode_aliases("t", Some("  ")).is_empty());
    }

    #[test]
    fn datetime_format_is_fixed_width() {
        let a = format_datetime(Utc::now());
        let b = format_datetime(Utc::now() + chrono::Duration::nanoseconds(500_000));
        assert_eq!(a.len(), b.len());
        assert_eq!(parse_datetime(&a).timestamp(), parse_datetime(&b).timestamp());
    }
}
