//! Module adapters
//!
//! Each module stores its rows in its own table, but every table has the same
//! slot columns (`cf1`..`cf20`). The `ModuleAdapter` trait implements slot and
//! row access once; the per-module structs only say which table they own.

use rusqlite::{params, types::Type, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::{CrmError, Result, ValidationError};
use crate::models::{EntityRow, Module, NewRow, SlotArray, SlotNumber};

/// Uniform slot access over one module's entity table
pub trait ModuleAdapter: Send + Sync {
    fn module(&self) -> Module;

    fn table_name(&self) -> &'static str;

    /// Module whose rows own this module's rows, if any
    fn parent(&self) -> Option<Module> {
        Some(Module::Contact)
    }

    /// Sets the slot to NULL on every row of the table, returning the number of rows touched
    fn clear_slot(&self, conn: &Connection, slot: SlotNumber) -> Result<usize> {
        let column = slot.column();
        let cleared = conn.execute(
            &format!(
                "UPDATE {table} SET {column} = NULL WHERE {column} IS NOT NULL",
                table = self.table_name(),
                column = column,
            ),
            [],
        )?;
        Ok(cleared)
    }

    /// Reads one slot of one row
    fn read_slot(&self, conn: &Connection, row_id: &Uuid, slot: SlotNumber) -> Result<Option<String>> {
        let value: Option<Option<String>> = conn
            .query_row(
                &format!(
                    "SELECT {} FROM {} WHERE id = ?1",
                    slot.column(),
                    self.table_name()
                ),
                [row_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        value.ok_or(CrmError::RowNotFound {
            module: self.module(),
            id: *row_id,
        })
    }

    /// Writes one slot of one row. Callers are responsible for checking that
    /// a field is bound to the slot before writing a non-null value.
    fn write_slot(
        &self,
        conn: &Connection,
        row_id: &Uuid,
        slot: SlotNumber,
        value: Option<&str>,
    ) -> Result<()> {
        let rows_affected = conn.execute(
            &format!(
                "UPDATE {} SET {} = ?1 WHERE id = ?2",
                self.table_name(),
                slot.column()
            ),
            params![value, row_id.to_string()],
        )?;
        if rows_affected == 0 {
            return Err(CrmError::RowNotFound {
                module: self.module(),
                id: *row_id,
            });
        }
        Ok(())
    }

    /// DDL for the module's table
    fn create_table_sql(&self) -> String {
        let slot_columns: Vec<String> = SlotNumber::all()
            .map(|slot| format!("    {} TEXT", slot.column()))
            .collect();
        let contact_column = match self.parent() {
            Some(parent) => format!(
                "    contact_id TEXT REFERENCES {}(id) ON DELETE CASCADE,\n",
                adapter_for(parent).table_name()
            ),
            None => String::new(),
        };

        format!(
            "CREATE TABLE IF NOT EXISTS {table} (\n    id TEXT PRIMARY KEY,\n    title TEXT NOT NULL,\n{contact}    attributes TEXT NOT NULL DEFAULT '{{}}',\n    created_at TEXT NOT NULL,\n{slots}\n);",
            table = self.table_name(),
            contact = contact_column,
            slots = slot_columns.join(",\n"),
        )
    }

    fn select_sql(&self) -> String {
        let slot_columns: Vec<String> = SlotNumber::all().map(|s| s.column()).collect();
        let contact_column = if self.parent().is_some() {
            "contact_id"
        } else {
            "NULL AS contact_id"
        };
        format!(
            "SELECT id, title, {}, attributes, created_at, {} FROM {}",
            contact_column,
            slot_columns.join(", "),
            self.table_name()
        )
    }

    fn insert_row(&self, conn: &Connection, new_row: NewRow) -> Result<EntityRow> {
        let row = EntityRow {
            id: Uuid::new_v4(),
            module: self.module(),
            title: new_row.title,
            contact_id: new_row.contact_id,
            attributes: new_row.attributes,
            created_at: chrono::Utc::now(),
            slots: SlotArray::default(),
        };
        let attributes = serde_json::to_string(&row.attributes)?;

        match (self.parent(), row.contact_id) {
            (Some(parent), Some(contact_id)) => {
                // Surface a missing owner as a typed error rather than an FK failure
                adapter_for(parent).load_row(conn, &contact_id)?;
                conn.execute(
                    &format!(
                        "INSERT INTO {} (id, title, contact_id, attributes, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        self.table_name()
                    ),
                    params![
                        row.id.to_string(),
                        row.title,
                        contact_id.to_string(),
                        attributes,
                        row.created_at.to_rfc3339(),
                    ],
                )?;
            }
            (None, Some(_)) => {
                return Err(ValidationError::ContactLinkNotAllowed(self.module()).into());
            }
            (_, None) => {
                conn.execute(
                    &format!(
                        "INSERT INTO {} (id, title, attributes, created_at) VALUES (?1, ?2, ?3, ?4)",
                        self.table_name()
                    ),
                    params![
                        row.id.to_string(),
                        row.title,
                        attributes,
                        row.created_at.to_rfc3339(),
                    ],
                )?;
            }
        }

        Ok(row)
    }

    fn load_row(&self, conn: &Connection, row_id: &Uuid) -> Result<EntityRow> {
        let module = self.module();
        conn.query_row(
            &format!("{} WHERE id = ?1", self.select_sql()),
            [row_id.to_string()],
            |row| entity_from_row(module, row),
        )
        .optional()?
        .ok_or(CrmError::RowNotFound { module, id: *row_id })
    }

    fn load_rows(&self, conn: &Connection) -> Result<Vec<EntityRow>> {
        let module = self.module();
        let mut stmt = conn.prepare(&format!("{} ORDER BY created_at", self.select_sql()))?;
        let rows = stmt.query_map([], |row| entity_from_row(module, row))?;

        let mut entities = Vec::new();
        for row in rows {
            entities.push(row?);
        }
        Ok(entities)
    }

    fn count_rows(&self, conn: &Connection) -> Result<usize> {
        let n: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", self.table_name()),
            [],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    /// Deletes a row; owned rows in other modules go with it through the FK cascade
    fn delete_row(&self, conn: &Connection, row_id: &Uuid) -> Result<()> {
        let rows_affected = conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1", self.table_name()),
            [row_id.to_string()],
        )?;
        if rows_affected == 0 {
            return Err(CrmError::RowNotFound {
                module: self.module(),
                id: *row_id,
            });
        }
        Ok(())
    }
}

pub struct ContactAdapter;
pub struct LeadAdapter;
pub struct DealAdapter;
pub struct FollowUpAdapter;

impl ModuleAdapter for ContactAdapter {
    fn module(&self) -> Module {
        Module::Contact
    }

    fn table_name(&self) -> &'static str {
        "contacts"
    }

    fn parent(&self) -> Option<Module> {
        None
    }
}

impl ModuleAdapter for LeadAdapter {
    fn module(&self) -> Module {
        Module::Lead
    }

    fn table_name(&self) -> &'static str {
        "leads"
    }
}

impl ModuleAdapter for DealAdapter {
    fn module(&self) -> Module {
        Module::Deal
    }

    fn table_name(&self) -> &'static str {
        "deals"
    }
}

impl ModuleAdapter for FollowUpAdapter {
    fn module(&self) -> Module {
        Module::FollowUp
    }

    fn table_name(&self) -> &'static str {
        "follow_ups"
    }
}

/// Returns the adapter owning `module`'s table
pub fn adapter_for(module: Module) -> &'static dyn ModuleAdapter {
    match module {
        Module::Contact => &ContactAdapter,
        Module::Lead => &LeadAdapter,
        Module::Deal => &DealAdapter,
        Module::FollowUp => &FollowUpAdapter,
    }
}

fn entity_from_row(module: Module, row: &Row<'_>) -> rusqlite::Result<EntityRow> {
    let id_str: String = row.get(0)?;
    let title: String = row.get(1)?;
    let contact_id_str: Option<String> = row.get(2)?;
    let attributes_json: String = row.get(3)?;
    let created_at_str: String = row.get(4)?;

    let id = Uuid::parse_str(&id_str)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
    let contact_id = contact_id_str
        .map(|s| Uuid::parse_str(&s))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
    let attributes: BTreeMap<String, String> =
        serde_json::from_str(&attributes_json).unwrap_or_default();
    let created_at = chrono::DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(|_| chrono::Utc::now());

    let mut slots = SlotArray::default();
    for (offset, slot) in SlotNumber::all().enumerate() {
        slots.set(slot, row.get(5 + offset)?);
    }

    Ok(EntityRow {
        id,
        module,
        title,
        contact_id,
        attributes,
        created_at,
        slots,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        schema::create_all(&conn).unwrap();
        conn
    }

    fn slot(n: u8) -> SlotNumber {
        SlotNumber::new(n).unwrap()
    }

    #[test]
    fn test_adapters_cover_every_module() {
        for module in Module::ALL {
            assert_eq!(adapter_for(module).module(), module);
        }
        assert_eq!(adapter_for(Module::FollowUp).table_name(), "follow_ups");
    }

    #[test]
    fn test_table_sql_has_every_slot_column() {
        let sql = DealAdapter.create_table_sql();
        assert!(sql.contains("cf1 TEXT"));
        assert!(sql.contains("cf20 TEXT"));
        assert!(!sql.contains("cf21"));
        assert!(sql.contains("REFERENCES contacts(id) ON DELETE CASCADE"));
        assert!(!ContactAdapter.create_table_sql().contains("contact_id"));
    }

    #[test]
    fn test_clear_slot_wipes_every_row() {
        let conn = setup();
        let a = DealAdapter.insert_row(&conn, NewRow::titled("Website")).unwrap();
        let b = DealAdapter.insert_row(&conn, NewRow::titled("Support plan")).unwrap();
        let c = DealAdapter.insert_row(&conn, NewRow::titled("Audit")).unwrap();

        DealAdapter.write_slot(&conn, &a.id, slot(3), Some("100")).unwrap();
        DealAdapter.write_slot(&conn, &b.id, slot(3), Some("250")).unwrap();
        DealAdapter.write_slot(&conn, &b.id, slot(4), Some("keep")).unwrap();

        let cleared = DealAdapter.clear_slot(&conn, slot(3)).unwrap();
        assert_eq!(cleared, 2);

        for id in [a.id, b.id, c.id] {
            assert_eq!(DealAdapter.read_slot(&conn, &id, slot(3)).unwrap(), None);
        }
        assert_eq!(
            DealAdapter.read_slot(&conn, &b.id, slot(4)).unwrap().as_deref(),
            Some("keep")
        );
    }

    #[test]
    fn test_clear_slot_only_touches_its_module() {
        let conn = setup();
        let lead = LeadAdapter.insert_row(&conn, NewRow::titled("Inbound")).unwrap();
        let deal = DealAdapter.insert_row(&conn, NewRow::titled("Renewal")).unwrap();
        LeadAdapter.write_slot(&conn, &lead.id, slot(1), Some("web")).unwrap();
        DealAdapter.write_slot(&conn, &deal.id, slot(1), Some("500")).unwrap();

        DealAdapter.clear_slot(&conn, slot(1)).unwrap();

        assert_eq!(
            LeadAdapter.read_slot(&conn, &lead.id, slot(1)).unwrap().as_deref(),
            Some("web")
        );
    }

    #[test]
    fn test_missing_row_is_reported() {
        let conn = setup();
        let missing = Uuid::new_v4();
        assert!(matches!(
            ContactAdapter.read_slot(&conn, &missing, slot(1)),
            Err(CrmError::RowNotFound { module: Module::Contact, .. })
        ));
        assert!(ContactAdapter.write_slot(&conn, &missing, slot(1), None).is_err());
        assert!(ContactAdapter.delete_row(&conn, &missing).is_err());
    }

    #[test]
    fn test_rows_round_trip_attributes_and_owner() {
        let conn = setup();
        let contact = ContactAdapter
            .insert_row(&conn, NewRow::titled("Ada").with_attribute("email", "ada@example.com"))
            .unwrap();
        let follow_up = FollowUpAdapter
            .insert_row(&conn, NewRow::titled("Call back").for_contact(contact.id))
            .unwrap();

        let loaded = FollowUpAdapter.load_row(&conn, &follow_up.id).unwrap();
        assert_eq!(loaded.contact_id, Some(contact.id));
        assert_eq!(loaded.title, "Call back");

        let loaded_contact = ContactAdapter.load_row(&conn, &contact.id).unwrap();
        assert_eq!(
            loaded_contact.attributes.get("email").map(String::as_str),
            Some("ada@example.com")
        );
        assert_eq!(ContactAdapter.load_rows(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_deleting_contact_cascades() {
        let conn = setup();
        let contact = ContactAdapter.insert_row(&conn, NewRow::titled("Grace")).unwrap();
        LeadAdapter
            .insert_row(&conn, NewRow::titled("Referral").for_contact(contact.id))
            .unwrap();
        DealAdapter
            .insert_row(&conn, NewRow::titled("Pilot").for_contact(contact.id))
            .unwrap();

        ContactAdapter.delete_row(&conn, &contact.id).unwrap();

        assert_eq!(LeadAdapter.count_rows(&conn).unwrap(), 0);
        assert_eq!(DealAdapter.count_rows(&conn).unwrap(), 0);
    }

    #[test]
    fn test_contact_cannot_have_owner() {
        let conn = setup();
        let err = ContactAdapter
            .insert_row(&conn, NewRow::titled("Linus").for_contact(Uuid::new_v4()))
            .unwrap_err();
        assert!(matches!(
            err,
            CrmError::Validation(ValidationError::ContactLinkNotAllowed(Module::Contact))
        ));
    }

    #[test]
    fn test_unknown_owner_is_row_not_found() {
        let conn = setup();
        let err = DealAdapter
            .insert_row(&conn, NewRow::titled("Ghost").for_contact(Uuid::new_v4()))
            .unwrap_err();
        assert!(matches!(err, CrmError::RowNotFound { module: Module::Contact, .. }));
    }
}
