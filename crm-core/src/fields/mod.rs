//! Custom field slot engine
//!
//! Every entity table carries `SLOT_COUNT` generic nullable columns. This module
//! binds field definitions to those slots, one module at a time:
//!
//! - [`validator`] rejects bad definitions before anything is written
//! - [`allocator`] picks the lowest free slot
//! - [`registry`] stores the definitions
//! - [`cleanup`] retires a field and wipes its slot in one transaction
//! - [`adapter`] gives uniform slot access over each module's table

pub mod adapter;
pub mod allocator;
pub mod cleanup;
pub mod registry;
pub mod validator;

pub use adapter::{adapter_for, ContactAdapter, DealAdapter, FollowUpAdapter, LeadAdapter, ModuleAdapter};
pub use allocator::next_available_slot;
pub use cleanup::{delete_field, delete_field_with, CleanupReport};
pub use registry::SlotRegistry;
pub use validator::validate;

use rusqlite::{Connection, TransactionBehavior};
use uuid::Uuid;

use crate::error::{CrmError, Result};
use crate::models::{FieldDefinition, Module, SlotNumber};

/// Validates, allocates and registers a new field.
///
/// Validation runs against a snapshot taken outside the write transaction so
/// obviously bad requests never take the write lock. The occupied-slot read,
/// the allocation and the insert then run in one immediate transaction.
pub fn create_field(
    conn: &mut Connection,
    module: Module,
    field_name: &str,
    field_type: &str,
) -> Result<FieldDefinition> {
    let snapshot = SlotRegistry::new(conn).list_fields(module)?;
    let field_type = validate(module, field_name, field_type, &snapshot)?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let registry = SlotRegistry::new(&tx);
    let slot = next_available_slot(module, &registry.occupied_slots(module)?)?;
    tracing::debug!(%module, %slot, "allocated slot");

    let definition = FieldDefinition::new(module, slot, field_name.trim().to_string(), field_type);
    registry.insert(&definition)?;
    tx.commit()?;

    tracing::info!(
        %module,
        %slot,
        name = %definition.field_name,
        field_type = %definition.field_type,
        "custom field created"
    );
    Ok(definition)
}

/// Writes (or clears) one slot of one row.
///
/// A non-null value may only be written into a slot that currently has a
/// field bound to it, and must fit the field's type.
pub fn set_slot_value(
    conn: &mut Connection,
    module: Module,
    row_id: &Uuid,
    slot: SlotNumber,
    value: Option<&str>,
) -> Result<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let value = match value {
        Some(v) => {
            let definition = SlotRegistry::new(&tx)
                .find(module, slot)?
                .ok_or_else(|| {
                    tracing::warn!(%module, %slot, "refusing to write into an unbound slot");
                    CrmError::NotFound { module, slot }
                })?;
            definition.field_type.check_value(v)?;
            Some(v.trim())
        }
        None => None,
    };

    adapter_for(module).write_slot(&tx, row_id, slot, value)?;
    tx.commit()?;
    Ok(())
}
