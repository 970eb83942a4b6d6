//! Store abstraction traits
//!
//! This module defines the trait the front ends program against.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

use crate::error::Result;
use crate::fields::{next_available_slot, CleanupReport};
use crate::models::{EntityRow, FieldDefinition, Module, NewRow, SlotNumber};

/// Runtime options for opening a store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to the database file
    pub path: PathBuf,
    /// Whether to enable write-ahead logging
    pub wal_mode: bool,
    /// How long SQLite waits on a locked database before giving up
    pub busy_timeout: Duration,
    /// How long writers and quiesce wait for the advisory lock file
    pub lock_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("crm.db"),
            wal_mode: true,
            busy_timeout: Duration::from_secs(5),
            lock_timeout: Duration::from_secs(5),
        }
    }
}

/// Core trait for CRM stores
///
/// `list_fields`, `create_field` and `delete_field` are all a front end needs
/// for managing custom fields; validation and slot allocation happen behind
/// `create_field`. The row operations exist so slot values can be entered
/// and inspected.
pub trait CrmBackend: Send + Sync {
    /// Returns the path to the database file, if the store is file-backed
    fn path(&self) -> Option<&Path>;

    // =========================================================================
    // Custom Field Operations
    // =========================================================================

    /// Field definitions of a module in slot order
    fn list_fields(&self, module: Module) -> Result<Vec<FieldDefinition>>;

    /// Validates the request, allocates the lowest free slot and registers the field
    fn create_field(&self, module: Module, field_name: &str, field_type: &str)
        -> Result<FieldDefinition>;

    /// Clears the field's slot on every row of the module and removes the field
    fn delete_field(&self, module: Module, slot: SlotNumber) -> Result<CleanupReport>;

    /// Slot numbers currently bound in a module
    fn occupied_slots(&self, module: Module) -> Result<BTreeSet<SlotNumber>> {
        Ok(self.list_fields(module)?.iter().map(|f| f.slot).collect())
    }

    /// The slot the next `create_field` would receive, if nothing changes first
    fn next_available_slot(&self, module: Module) -> Result<SlotNumber> {
        next_available_slot(module, &self.occupied_slots(module)?)
    }

    /// Gets a field by name, ignoring case and surrounding whitespace
    fn field_by_name(&self, module: Module, name: &str) -> Result<Option<FieldDefinition>>;

    // =========================================================================
    // Entity Row Operations
    // =========================================================================

    fn insert_row(&self, module: Module, row: NewRow) -> Result<EntityRow>;

    fn get_row(&self, module: Module, id: &Uuid) -> Result<EntityRow>;

    fn list_rows(&self, module: Module) -> Result<Vec<EntityRow>>;

    fn delete_row(&self, module: Module, id: &Uuid) -> Result<()>;

    /// Writes a slot value; `None` clears it
    fn set_slot_value(
        &self,
        module: Module,
        id: &Uuid,
        slot: SlotNumber,
        value: Option<&str>,
    ) -> Result<()>;

    fn read_slot(&self, module: Module, id: &Uuid, slot: SlotNumber) -> Result<Option<String>> {
        Ok(self.get_row(module, id)?.slots.get(slot).map(str::to_string))
    }

    // =========================================================================
    // Utility Operations
    // =========================================================================

    /// Returns statistics about the store
    fn stats(&self) -> Result<StoreStats> {
        let mut modules = BTreeMap::new();
        for module in Module::ALL {
            modules.insert(
                module,
                ModuleStats {
                    field_count: self.list_fields(module)?.len(),
                    row_count: self.list_rows(module)?.len(),
                },
            );
        }
        Ok(StoreStats { modules })
    }
}

/// Per-module counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ModuleStats {
    pub field_count: usize,
    pub row_count: usize,
}

/// Statistics about a store
#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreStats {
    pub modules: BTreeMap<Module, ModuleStats>,
}
