//! SQLite database storage backend
//!
//! The backend owns its connection; there is no process-wide database handle.
//! Writes are serialized by the connection mutex inside a process and by
//! immediate transactions plus the lock file across processes.

use rusqlite::Connection;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::error::{CrmError, Result};
use crate::fields::{self, adapter_for, CleanupReport, SlotRegistry};
use crate::lock::{LockFile, LockGuard};
use crate::models::{EntityRow, FieldDefinition, Module, NewRow, SlotNumber};

use super::schema;
use super::traits::{CrmBackend, ModuleStats, StoreConfig, StoreStats};

/// SQLite backend implementation
pub struct SqliteBackend {
    path: Option<PathBuf>,
    conn: Mutex<Connection>,
    lock: Option<LockFile>,
}

/// Scoped exclusive access for backup and restore.
///
/// While the guard lives no write can start through this backend or any other
/// process using the same database file. Everything is released on drop.
pub struct QuiesceGuard<'a> {
    conn: MutexGuard<'a, Connection>,
    path: &'a Path,
    _lock: LockGuard,
}

impl QuiesceGuard<'_> {
    /// The database file, safe to copy while the guard is held
    pub fn path(&self) -> &Path {
        self.path
    }

    /// The connection, for callers that would rather use SQLite's own backup API
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl SqliteBackend {
    /// Opens (creating if needed) a file-backed store
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open(&StoreConfig {
            path: path.as_ref().to_path_buf(),
            ..StoreConfig::default()
        })
    }

    /// Opens a file-backed store with explicit options
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let path = config.path.clone();

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&path)?;
        conn.busy_timeout(config.busy_timeout)?;
        if config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        }
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        schema::init(&conn)?;

        tracing::debug!(path = %path.display(), wal = config.wal_mode, "opened store");
        Ok(Self {
            lock: Some(LockFile::for_database(&path, config.lock_timeout)),
            path: Some(path),
            conn: Mutex::new(conn),
        })
    }

    /// Opens a private in-memory store, mostly for tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        schema::init(&conn)?;

        Ok(Self {
            path: None,
            conn: Mutex::new(conn),
            lock: None,
        })
    }

    /// A failed operation never leaves a transaction open, so a poisoned
    /// mutex still guards a usable connection.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Shared lock held by writers; in-memory stores have nothing to guard
    fn write_lock(&self) -> Result<Option<LockGuard>> {
        self.lock.as_ref().map(LockFile::acquire_shared).transpose()
    }

    /// Waits for in-flight writes, then blocks new ones until the guard is dropped.
    ///
    /// The WAL is checkpointed into the main file first so a file-level copy
    /// taken under the guard is complete. A reader holding an older snapshot
    /// keeps the checkpoint from finishing; if that lasts past the lock
    /// timeout the store is reported `Locked` and nothing is held.
    /// Returns `None` for in-memory stores.
    pub fn quiesce(&self) -> Result<Option<QuiesceGuard<'_>>> {
        let (Some(path), Some(lock)) = (self.path.as_deref(), self.lock.as_ref()) else {
            return Ok(None);
        };

        let conn = self.conn();
        let guard = lock.acquire_exclusive()?;
        checkpoint_fully(&conn, path, lock.timeout())?;

        tracing::info!(path = %path.display(), "store quiesced");
        Ok(Some(QuiesceGuard {
            conn,
            path,
            _lock: guard,
        }))
    }
}

/// Runs `wal_checkpoint(TRUNCATE)` until every WAL frame is in the main file
fn checkpoint_fully(conn: &Connection, path: &Path, timeout: Duration) -> Result<()> {
    let start = Instant::now();

    loop {
        // (busy, frames in log, frames checkpointed); -1/-1 outside WAL mode
        let (busy, log, checkpointed): (i64, i64, i64) =
            conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?;
        if busy == 0 && log == checkpointed {
            return Ok(());
        }

        tracing::debug!(busy, log, checkpointed, "checkpoint blocked by a reader");
        if start.elapsed() > timeout {
            return Err(CrmError::Locked(format!(
                "a reader kept {} from checkpointing ({} of {} WAL frames copied)",
                path.display(),
                checkpointed,
                log
            )));
        }
        std::thread::sleep(Duration::from_millis(25));
    }
}

impl CrmBackend for SqliteBackend {
    fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn list_fields(&self, module: Module) -> Result<Vec<FieldDefinition>> {
        let conn = self.conn();
        SlotRegistry::new(&conn).list_fields(module)
    }

    fn create_field(
        &self,
        module: Module,
        field_name: &str,
        field_type: &str,
    ) -> Result<FieldDefinition> {
        let mut conn = self.conn();
        let _lock = self.write_lock()?;
        fields::create_field(&mut conn, module, field_name, field_type)
    }

    fn delete_field(&self, module: Module, slot: SlotNumber) -> Result<CleanupReport> {
        let mut conn = self.conn();
        let _lock = self.write_lock()?;
        let report = fields::delete_field(&mut conn, module, slot)?;

        tracing::info!(
            %module,
            %slot,
            name = %report.definition.field_name,
            rows_cleared = report.rows_cleared,
            "custom field deleted"
        );
        Ok(report)
    }

    fn occupied_slots(&self, module: Module) -> Result<std::collections::BTreeSet<SlotNumber>> {
        let conn = self.conn();
        SlotRegistry::new(&conn).occupied_slots(module)
    }

    fn field_by_name(&self, module: Module, name: &str) -> Result<Option<FieldDefinition>> {
        let conn = self.conn();
        SlotRegistry::new(&conn).find_by_name(module, name)
    }

    fn insert_row(&self, module: Module, row: NewRow) -> Result<EntityRow> {
        let conn = self.conn();
        let _lock = self.write_lock()?;
        adapter_for(module).insert_row(&conn, row)
    }

    fn get_row(&self, module: Module, id: &Uuid) -> Result<EntityRow> {
        let conn = self.conn();
        adapter_for(module).load_row(&conn, id)
    }

    fn list_rows(&self, module: Module) -> Result<Vec<EntityRow>> {
        let conn = self.conn();
        adapter_for(module).load_rows(&conn)
    }

    fn delete_row(&self, module: Module, id: &Uuid) -> Result<()> {
        let conn = self.conn();
        let _lock = self.write_lock()?;
        adapter_for(module).delete_row(&conn, id)
    }

    fn set_slot_value(
        &self,
        module: Module,
        id: &Uuid,
        slot: SlotNumber,
        value: Option<&str>,
    ) -> Result<()> {
        let mut conn = self.conn();
        let _lock = self.write_lock()?;
        fields::set_slot_value(&mut conn, module, id, slot, value)
    }

    fn read_slot(&self, module: Module, id: &Uuid, slot: SlotNumber) -> Result<Option<String>> {
        let conn = self.conn();
        adapter_for(module).read_slot(&conn, id, slot)
    }

    fn stats(&self) -> Result<StoreStats> {
        let conn = self.conn();
        let registry = SlotRegistry::new(&conn);

        let mut modules = BTreeMap::new();
        for module in Module::ALL {
            modules.insert(
                module,
                ModuleStats {
                    field_count: registry.count(module)?,
                    row_count: adapter_for(module).count_rows(&conn)?,
                },
            );
        }
        Ok(StoreStats { modules })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_sqlite_backend_create_and_reopen() {
        let temp_file = NamedTempFile::with_suffix(".db").unwrap();
        {
            let backend = SqliteBackend::new(temp_file.path()).unwrap();
            backend.create_field(Module::Contact, "Twitter", "Text").unwrap();
        }

        let backend = SqliteBackend::new(temp_file.path()).unwrap();
        let fields = backend.list_fields(Module::Contact).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field_name, "Twitter");
        assert_eq!(backend.path(), Some(temp_file.path()));
    }

    #[test]
    fn test_stats_count_fields_and_rows() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        backend.create_field(Module::Deal, "Budget", "Number").unwrap();
        backend.insert_row(Module::Deal, NewRow::titled("Retainer")).unwrap();
        backend.insert_row(Module::Deal, NewRow::titled("Workshop")).unwrap();

        let stats = backend.stats().unwrap();
        assert_eq!(
            stats.modules[&Module::Deal],
            ModuleStats {
                field_count: 1,
                row_count: 2
            }
        );
        assert_eq!(stats.modules[&Module::Lead].field_count, 0);
    }

    #[test]
    fn test_field_by_name_ignores_case_and_padding() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        backend.create_field(Module::Lead, "Source", "Text").unwrap();

        let found = backend.field_by_name(Module::Lead, "  SOURCE ").unwrap().unwrap();
        assert_eq!(found.field_name, "Source");
        assert!(backend.field_by_name(Module::Deal, "Source").unwrap().is_none());
    }

    #[test]
    fn test_in_memory_store_has_no_quiesce() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        assert!(backend.quiesce().unwrap().is_none());
        assert!(backend.path().is_none());
    }

    #[test]
    fn test_quiesce_blocks_writers_from_other_handles() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig {
            path: dir.path().join("crm.db"),
            lock_timeout: Duration::from_millis(100),
            ..StoreConfig::default()
        };
        let owner = SqliteBackend::open(&config).unwrap();
        let other = SqliteBackend::open(&config).unwrap();

        {
            let guard = owner.quiesce().unwrap().unwrap();
            assert!(guard.path().exists());
            let fields: i64 = guard
                .connection()
                .query_row("SELECT COUNT(*) FROM custom_fields", [], |row| row.get(0))
                .unwrap();
            assert_eq!(fields, 0);

            let err = other.create_field(Module::Lead, "Source", "Text").unwrap_err();
            assert!(matches!(err, CrmError::Locked(_)));
            // reads are not blocked
            assert!(other.list_fields(Module::Lead).unwrap().is_empty());
        }

        other.create_field(Module::Lead, "Source", "Text").unwrap();
        assert_eq!(owner.list_fields(Module::Lead).unwrap().len(), 1);
    }

    #[test]
    fn test_quiesce_waits_for_readers_before_handing_out_the_file() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig {
            path: dir.path().join("crm.db"),
            busy_timeout: Duration::from_millis(50),
            lock_timeout: Duration::from_millis(150),
            ..StoreConfig::default()
        };
        let backend = SqliteBackend::open(&config).unwrap();

        // A reader pins a snapshot from before the write
        let reader = Connection::open(&config.path).unwrap();
        reader.execute_batch("BEGIN").unwrap();
        let before: i64 = reader
            .query_row("SELECT COUNT(*) FROM custom_fields", [], |row| row.get(0))
            .unwrap();
        assert_eq!(before, 0);

        backend.create_field(Module::Deal, "Budget", "Number").unwrap();

        let err = backend.quiesce().err().unwrap();
        assert!(matches!(err, CrmError::Locked(_)));
        // a failed quiesce releases everything it took
        backend.create_field(Module::Deal, "Stage", "Choice").unwrap();

        reader.execute_batch("COMMIT").unwrap();
        drop(reader);

        let copy = dir.path().join("backup.db");
        {
            let guard = backend.quiesce().unwrap().unwrap();
            std::fs::copy(guard.path(), &copy).unwrap();
        }

        let restored = Connection::open(&copy).unwrap();
        let fields: i64 = restored
            .query_row("SELECT COUNT(*) FROM custom_fields", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fields, 2);
    }
}
