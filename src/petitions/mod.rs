//! Petition domain types.

pub mod model;

pub use model::{
    LogicalField, NewPetitionType, NewProcessedPetition, PetitionStatus, PetitionType,
    ProcessedPetition, UserProfile,
};
