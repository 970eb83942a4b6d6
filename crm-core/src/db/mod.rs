//! Storage layer for the CRM
//!
//! The trait in [`traits`] is what front ends use; [`SqliteBackend`] is the
//! implementation, with the schema kept in [`schema`].

mod traits;
mod sqlite_backend;
pub(crate) mod schema;

pub use traits::{CrmBackend, ModuleStats, StoreConfig, StoreStats};
pub use sqlite_backend::{QuiesceGuard, SqliteBackend};
pub use schema::SCHEMA_VERSION;

use crate::error::Result;

/// Opens an existing database or creates a new one
pub fn open_or_create(config: &StoreConfig) -> Result<Box<dyn CrmBackend>> {
    Ok(Box::new(SqliteBackend::open(config)?))
}
