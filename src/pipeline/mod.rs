//! Petition pipeline.
//!
//! Each cycle runs two stages against the shared store:
//! 1. `IngestionStage::run()`: mailbox → classifier → `processed_petitions`
//! 2. `SigningStage::run()`: pending batch → field mapper → form filler
//!
//! `JobScheduler` repeats the cycle on a fixed interval.

pub mod classifier;
pub mod field_mapper;
pub mod ingest;
pub mod scheduler;
pub mod signing;

pub use classifier::{classify, extract_urls, Classification, Classifier};
pub use field_mapper::{build_mapping, FieldMapping};
pub use ingest::{IngestReport, IngestionStage};
pub use scheduler::{CycleReport, JobScheduler};
pub use signing::{SigningReport, SigningStage};
