//! Petition data model: petition types, processed petitions, user profile.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The fixed set of profile fields a petition form can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalField {
    FirstName,
    LastName,
    Email,
    ZipCode,
    Phone,
    Address,
    City,
    State,
}

impl LogicalField {
    /// All logical fields, in mapping order.
    pub const ALL: [LogicalField; 8] = [
        LogicalField::FirstName,
        LogicalField::LastName,
        LogicalField::Email,
        LogicalField::ZipCode,
        LogicalField::Phone,
        LogicalField::Address,
        LogicalField::City,
        LogicalField::State,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalField::FirstName => "first_name",
            LogicalField::LastName => "last_name",
            LogicalField::Email => "email",
            LogicalField::ZipCode => "zip_code",
            LogicalField::Phone => "phone",
            LogicalField::Address => "address",
            LogicalField::City => "city",
            LogicalField::State => "state",
        }
    }
}

impl fmt::Display for LogicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogicalField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogicalField::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| format!("unknown logical field: {s}"))
    }
}

/// Lifecycle status of a processed petition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PetitionStatus {
    /// Queued for signing.
    Pending,
    /// Owned by a signing pass that has not recorded an outcome yet.
    Claimed,
    Signed,
    Failed,
    /// Rejected by the classifier.
    Skipped,
}

impl PetitionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PetitionStatus::Pending => "pending",
            PetitionStatus::Claimed => "claimed",
            PetitionStatus::Signed => "signed",
            PetitionStatus::Failed => "failed",
            PetitionStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for PetitionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PetitionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PetitionStatus::Pending),
            "claimed" => Ok(PetitionStatus::Claimed),
            "signed" => Ok(PetitionStatus::Signed),
            "failed" => Ok(PetitionStatus::Failed),
            "skipped" => Ok(PetitionStatus::Skipped),
            other => Err(format!("unknown petition status: {other}")),
        }
    }
}

/// Operator-defined petition type configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PetitionType {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Logical field → form field name/selector hint.
    #[serde(default)]
    pub field_aliases: BTreeMap<LogicalField, String>,
    pub url_pattern: Option<String>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PetitionType {
    /// The alias for a logical field, ignoring blank entries.
    pub fn alias_for(&self, field: LogicalField) -> Option<&str> {
        self.field_aliases
            .get(&field)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }
}

/// Input for creating a petition type.
#[derive(Debug, Clone, Default)]
pub struct NewPetitionType {
    pub name: String,
    pub description: Option<String>,
    pub field_aliases: BTreeMap<LogicalField, String>,
    pub url_pattern: Option<String>,
    pub enabled: bool,
}

/// One record per distinct inbound email, keyed by message id.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedPetition {
    pub id: Uuid,
    pub message_id: String,
    pub petition_type_id: Option<Uuid>,
    pub petition_url: Option<String>,
    pub subject: String,
    pub status: PetitionStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
}

/// Input for recording a newly observed email.
#[derive(Debug, Clone)]
pub struct NewProcessedPetition {
    pub message_id: String,
    pub petition_type_id: Option<Uuid>,
    pub petition_url: Option<String>,
    pub subject: String,
    pub status: PetitionStatus,
    pub notes: Option<String>,
}

/// Operator identity and contact data used to fill forms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserProfile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub zip_code: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
}

impl UserProfile {
    /// The profile value for a logical field (may be empty).
    pub fn value(&self, field: LogicalField) -> &str {
        match field {
            LogicalField::FirstName => &self.first_name,
            LogicalField::LastName => &self.last_name,
            LogicalField::Email => &self.email,
            LogicalField::ZipCode => &self.zip_code,
            LogicalField::Phone => &self.phone,
            LogicalField::Address => &self.address,
            LogicalField::City => &self.city,
            LogicalField::State => &self.state,
        }
    }

    pub fn is_empty(&self) -> bool {
        LogicalField::ALL
            .iter()
            .all(|f| self.value(*f).trim().is_empty())
    }
}
