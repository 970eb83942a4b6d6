//! Schema creation and version check

use rusqlite::Connection;

use crate::error::{CrmError, Result};
use crate::fields::adapter_for;
use crate::models::Module;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Creates the registry and every module table
pub(crate) fn create_all(conn: &Connection) -> Result<()> {
    let mut batch = String::from(include_str!("schema.sql"));
    // Module::ALL starts with Contact, which the other tables reference
    for module in Module::ALL {
        batch.push('\n');
        batch.push_str(&adapter_for(module).create_table_sql());
    }
    conn.execute_batch(&format!("BEGIN;\n{}\nCOMMIT;", batch))?;
    Ok(())
}

/// Creates the schema on a fresh database, or checks the version of an existing one
pub(crate) fn init(conn: &Connection) -> Result<()> {
    let current_version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .unwrap_or(0);

    if current_version == 0 {
        tracing::info!(version = SCHEMA_VERSION, "creating database schema");
        create_all(conn)
    } else if current_version != SCHEMA_VERSION {
        Err(CrmError::SchemaVersion {
            found: current_version,
            expected: SCHEMA_VERSION,
        })
    } else {
        Ok(())
    }
}
