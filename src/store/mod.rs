//! Persistence layer: libSQL-backed storage for petitions and petition types.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::PetitionStore;
