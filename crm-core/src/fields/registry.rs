//! Slot registry: the authoritative table of active field definitions
//!
//! All functions take a plain `&Connection` so they can run either on their own
//! or inside a caller's transaction (a `Transaction` derefs to `Connection`).

use rusqlite::{params, types::Type, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::error::{CrmError, Result};
use crate::models::{FieldDefinition, FieldType, Module, SlotNumber};

const SELECT_FIELDS: &str =
    "SELECT id, module, slot, field_name, field_type, created_at FROM custom_fields";

/// Registry view over a connection or transaction
pub struct SlotRegistry<'c> {
    conn: &'c Connection,
}

impl<'c> SlotRegistry<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Field definitions of a module, ordered by slot ascending
    pub fn list_fields(&self, module: Module) -> Result<Vec<FieldDefinition>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} WHERE module = ?1 ORDER BY slot", SELECT_FIELDS))?;
        let rows = stmt.query_map([module.as_str()], field_from_row)?;

        let mut fields = Vec::new();
        for row in rows {
            fields.push(row?);
        }
        Ok(fields)
    }

    /// Slot numbers currently bound to a field in the module
    pub fn occupied_slots(&self, module: Module) -> Result<BTreeSet<SlotNumber>> {
        let mut stmt = self
            .conn
            .prepare("SELECT slot FROM custom_fields WHERE module = ?1")?;
        let rows = stmt.query_map([module.as_str()], |row| {
            let slot: i64 = row.get(0)?;
            SlotNumber::try_from(slot).map_err(|e| conversion_error(0, Type::Integer, e))
        })?;

        let mut slots = BTreeSet::new();
        for slot in rows {
            slots.insert(slot?);
        }
        Ok(slots)
    }

    pub fn find(&self, module: Module, slot: SlotNumber) -> Result<Option<FieldDefinition>> {
        self.conn
            .query_row(
                &format!("{} WHERE module = ?1 AND slot = ?2", SELECT_FIELDS),
                params![module.as_str(), slot.get()],
                field_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Looks a field up by name, ignoring case and surrounding whitespace
    pub fn find_by_name(&self, module: Module, name: &str) -> Result<Option<FieldDefinition>> {
        let wanted = name.trim().to_lowercase();
        Ok(self
            .list_fields(module)?
            .into_iter()
            .find(|f| f.field_name.trim().to_lowercase() == wanted))
    }

    /// Adds a definition, returning its identity
    pub fn insert(&self, definition: &FieldDefinition) -> Result<Uuid> {
        if self.find(definition.module, definition.slot)?.is_some() {
            return Err(CrmError::DuplicateSlot {
                module: definition.module,
                slot: definition.slot,
            });
        }
        if let Some(existing) = self.find_by_name(definition.module, &definition.field_name)? {
            return Err(CrmError::DuplicateName {
                module: definition.module,
                name: existing.field_name,
            });
        }

        self.conn.execute(
            "INSERT INTO custom_fields (id, module, slot, field_name, field_type, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                definition.id.to_string(),
                definition.module.as_str(),
                definition.slot.get(),
                definition.field_name,
                definition.field_type.as_str(),
                definition.created_time.to_rfc3339(),
            ],
        )?;
        Ok(definition.id)
    }

    /// Removes the definition bound to `(module, slot)`; absent definitions are an error
    pub fn remove(&self, module: Module, slot: SlotNumber) -> Result<()> {
        let rows_affected = self.conn.execute(
            "DELETE FROM custom_fields WHERE module = ?1 AND slot = ?2",
            params![module.as_str(), slot.get()],
        )?;
        if rows_affected == 0 {
            return Err(CrmError::NotFound { module, slot });
        }
        Ok(())
    }

    /// Number of live definitions per module
    pub fn count(&self, module: Module) -> Result<usize> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM custom_fields WHERE module = ?1",
            [module.as_str()],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }
}

fn conversion_error<E>(idx: usize, ty: Type, err: E) -> rusqlite::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    rusqlite::Error::FromSqlConversionFailure(idx, ty, err.into())
}

fn field_from_row(row: &Row<'_>) -> rusqlite::Result<FieldDefinition> {
    let id_str: String = row.get(0)?;
    let module_str: String = row.get(1)?;
    let slot: i64 = row.get(2)?;
    let field_name: String = row.get(3)?;
    let type_str: String = row.get(4)?;
    let created_at_str: String = row.get(5)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| conversion_error(0, Type::Text, e))?;
    let module: Module = module_str
        .parse()
        .map_err(|e: String| conversion_error(1, Type::Text, e))?;
    let slot = SlotNumber::try_from(slot).map_err(|e| conversion_error(2, Type::Integer, e))?;
    let field_type: FieldType = type_str
        .parse()
        .map_err(|e| conversion_error(4, Type::Text, e))?;
    let created_time = chrono::DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(|_| chrono::Utc::now());

    Ok(FieldDefinition {
        id,
        module,
        slot,
        field_name,
        field_type,
        created_time,
    })
}
