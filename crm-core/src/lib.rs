pub mod config;
pub mod db;
pub mod error;
pub mod fields;
pub mod lock;
pub mod models;

// Re-export commonly used types
pub use config::{determine_database_path, get_config_path, CrmConfig};
pub use db::{CrmBackend, ModuleStats, QuiesceGuard, SqliteBackend, StoreConfig, StoreStats};
pub use error::{CrmError, Result, ValidationError};
pub use fields::CleanupReport;
pub use models::{
    EntityRow, FieldDefinition, FieldType, Module, NewRow, SlotArray, SlotNumber, SLOT_COUNT,
};
