//! Petitioner: watches a mailbox for simple petition emails and signs them
//! with the operator's details.

pub mod automation;
pub mod channels;
pub mod config;
pub mod error;
pub mod petitions;
pub mod pipeline;
pub mod store;
