//! Error types for the custom field engine.

use thiserror::Error;
use uuid::Uuid;

use crate::models::{FieldType, Module, SlotNumber};

/// Result type used throughout the core.
pub type Result<T> = std::result::Result<T, CrmError>;

/// Field definition or slot value rejected before anything is written.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Field name must not be blank")]
    BlankName,

    #[error("Unsupported field type '{0}' (expected Text, Number or Choice)")]
    UnsupportedType(String),

    #[error("{module} already has the maximum of {limit} custom fields")]
    CapacityReached { module: Module, limit: usize },

    #[error("{module} already has a field named '{name}'")]
    DuplicateName { module: Module, name: String },

    #[error("Slot {0} is outside the valid range 1-20")]
    InvalidSlot(i64),

    #[error("'{value}' is not a valid {field_type} value")]
    InvalidValue { field_type: FieldType, value: String },

    #[error("{0} rows cannot be linked to a contact")]
    ContactLinkNotAllowed(Module),
}

/// Errors returned by store operations.
#[derive(Error, Debug)]
pub enum CrmError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Every slot of the module is bound to a live field
    #[error("Module at capacity: {module} already uses all {capacity} slots")]
    AllocationExhausted { module: Module, capacity: usize },

    #[error("Slot {slot} of {module} is already bound to a field")]
    DuplicateSlot { module: Module, slot: SlotNumber },

    #[error("{module} already has a field named '{name}'")]
    DuplicateName { module: Module, name: String },

    #[error("No field is bound to slot {slot} of {module}")]
    NotFound { module: Module, slot: SlotNumber },

    #[error("{module} row not found: {id}")]
    RowNotFound { module: Module, id: Uuid },

    /// Another holder (usually a backup/restore) has the store locked
    #[error("Store is locked: {0}")]
    Locked(String),

    /// The underlying store failed; the transaction was rolled back
    #[error("Transaction failed: {0}")]
    Transaction(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database schema version {found} is not supported (expected {expected})")]
    SchemaVersion { found: i32, expected: i32 },
}

impl CrmError {
    /// True for both the validator's capacity pre-check and the allocator's own refusal
    pub fn is_capacity(&self) -> bool {
        matches!(
            self,
            CrmError::AllocationExhausted { .. }
                | CrmError::Validation(ValidationError::CapacityReached { .. })
        )
    }
}
