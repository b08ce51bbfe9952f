//! Field mapper: resolves a petition type's form-field aliases against the
//! operator's profile.
//!
//! Profile fields with empty values are left out entirely, so the form
//! filler never receives blank fills.

use std::collections::BTreeMap;

use crate::petitions::{LogicalField, PetitionType, UserProfile};

/// Form field name (or selector hint) → value to fill.
pub type FieldMapping = BTreeMap<String, String>;

/// Build the fill mapping for one petition.
///
/// Each non-empty profile field is keyed by the petition type's alias for it
/// when one exists, otherwise by the logical field name.
pub fn build_mapping(profile: &UserProfile, petition_type: Option<&PetitionType>) -> FieldMapping {
    let mut mapping = FieldMapping::new();
    for field in LogicalField::ALL {
        let value = profile.value(field).trim();
        if value.is_empty() {
            continue;
        }
        let key = petition_type
            .and_then(|pt| pt.alias_for(field))
            .unwrap_or(field.as_str());
        mapping.insert(key.to_string(), value.to_string());
    }
    mapping
}
