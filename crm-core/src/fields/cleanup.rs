//! Field deletion
//!
//! Clearing the slot on every row and removing the registry entry happen in one
//! immediate transaction. If either step fails the transaction is dropped
//! uncommitted and SQLite rolls both back, so a later field that reuses the
//! slot can never see values written for the old one.

use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;

use super::adapter::{adapter_for, ModuleAdapter};
use super::registry::SlotRegistry;
use crate::error::{CrmError, Result};
use crate::models::{FieldDefinition, Module, SlotNumber};

/// Outcome of a committed field deletion
#[derive(Debug, Clone, Serialize)]
pub struct CleanupReport {
    pub definition: FieldDefinition,
    pub rows_cleared: usize,
}

/// Deletes the field bound to `(module, slot)`
pub fn delete_field(conn: &mut Connection, module: Module, slot: SlotNumber) -> Result<CleanupReport> {
    delete_field_with(conn, adapter_for(module), slot)
}

/// Deletes a field through an explicit adapter
pub fn delete_field_with(
    conn: &mut Connection,
    adapter: &dyn ModuleAdapter,
    slot: SlotNumber,
) -> Result<CleanupReport> {
    let module = adapter.module();
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let definition = SlotRegistry::new(&tx)
        .find(module, slot)?
        .ok_or(CrmError::NotFound { module, slot })?;

    let rows_cleared = adapter.clear_slot(&tx, slot)?;
    SlotRegistry::new(&tx).remove(module, slot)?;
    tx.commit()?;

    tracing::debug!(%module, %slot, rows_cleared, "slot cleared");
    Ok(CleanupReport {
        definition,
        rows_cleared,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use crate::fields::adapter::DealAdapter;
    use crate::models::{FieldType, NewRow};

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        schema::create_all(&conn).unwrap();
        conn
    }

    fn bind(conn: &Connection, module: Module, slot: SlotNumber, name: &str) {
        SlotRegistry::new(conn)
            .insert(&FieldDefinition::new(module, slot, name.into(), FieldType::Number))
            .unwrap();
    }

    /// Clears the slot and then fails, as a store error between the two steps would
    struct FailAfterClear;

    impl ModuleAdapter for FailAfterClear {
        fn module(&self) -> Module {
            Module::Deal
        }

        fn table_name(&self) -> &'static str {
            "deals"
        }

        fn clear_slot(&self, conn: &Connection, slot: SlotNumber) -> Result<usize> {
            DealAdapter.clear_slot(conn, slot)?;
            Err(CrmError::Transaction(rusqlite::Error::InvalidQuery))
        }
    }

    #[test]
    fn test_delete_clears_rows_and_registry() {
        let mut conn = setup();
        let slot = SlotNumber::new(2).unwrap();
        bind(&conn, Module::Deal, slot, "Budget");
        let row = DealAdapter.insert_row(&conn, NewRow::titled("Expansion")).unwrap();
        DealAdapter.write_slot(&conn, &row.id, slot, Some("100")).unwrap();

        let report = delete_field(&mut conn, Module::Deal, slot).unwrap();
        assert_eq!(report.rows_cleared, 1);
        assert_eq!(report.definition.field_name, "Budget");

        assert!(SlotRegistry::new(&conn).find(Module::Deal, slot).unwrap().is_none());
        assert_eq!(DealAdapter.read_slot(&conn, &row.id, slot).unwrap(), None);
    }

    #[test]
    fn test_delete_missing_field_is_not_found() {
        let mut conn = setup();
        let slot = SlotNumber::new(9).unwrap();
        let err = delete_field(&mut conn, Module::Lead, slot).unwrap_err();
        assert!(matches!(err, CrmError::NotFound { module: Module::Lead, .. }));
    }

    #[test]
    fn test_failed_cleanup_rolls_back_everything() {
        let mut conn = setup();
        let slot = SlotNumber::new(3).unwrap();
        bind(&conn, Module::Deal, slot, "Budget");
        let row = DealAdapter.insert_row(&conn, NewRow::titled("Migration")).unwrap();
        DealAdapter.write_slot(&conn, &row.id, slot, Some("100")).unwrap();

        assert!(delete_field_with(&mut conn, &FailAfterClear, slot).is_err());

        assert!(SlotRegistry::new(&conn).find(Module::Deal, slot).unwrap().is_some());
        assert_eq!(
            DealAdapter.read_slot(&conn, &row.id, slot).unwrap().as_deref(),
            Some("100")
        );
    }

    #[test]
    fn test_delete_leaves_other_modules_alone() {
        let mut conn = setup();
        let slot = SlotNumber::new(1).unwrap();
        bind(&conn, Module::Deal, slot, "Budget");
        bind(&conn, Module::Contact, slot, "Budget");

        delete_field(&mut conn, Module::Deal, slot).unwrap();

        assert!(SlotRegistry::new(&conn).find(Module::Contact, slot).unwrap().is_some());
    }
}
