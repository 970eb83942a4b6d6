//! Advisory lock file guarding a database file
//!
//! Writers hold a shared lock for the duration of each write transaction.
//! Backup and restore take the exclusive lock, which waits for in-flight
//! writers to finish and keeps new ones out until the guard is dropped.

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::{CrmError, Result};

/// Lock file sitting next to a database file
#[derive(Debug, Clone)]
pub struct LockFile {
    path: PathBuf,
    timeout: Duration,
}

/// Held lock; released when dropped
#[derive(Debug)]
pub struct LockGuard {
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl LockFile {
    /// Creates a lock handle for `db_path` (`crm.db` is guarded by `crm.db.lock`)
    pub fn for_database<P: AsRef<Path>>(db_path: P, timeout: Duration) -> Self {
        let mut name = db_path.as_ref().as_os_str().to_os_string();
        name.push(".lock");
        Self {
            path: PathBuf::from(name),
            timeout,
        }
    }

    /// Returns the path to the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// How long acquisition waits before reporting the store locked
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn open(&self) -> Result<File> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.path)?)
    }

    /// Acquire a shared lock, as every writer does
    pub fn acquire_shared(&self) -> Result<LockGuard> {
        let file = self.open()?;
        self.wait_for(&file, |f| FileExt::try_lock_shared(f))?;
        Ok(LockGuard { file })
    }

    /// Acquire the exclusive lock, shutting out all writers
    pub fn acquire_exclusive(&self) -> Result<LockGuard> {
        let mut file = self.open()?;
        self.wait_for(&file, |f| FileExt::try_lock_exclusive(f))?;

        // Lock holder info, for whoever finds the store locked
        let _ = file.set_len(0);
        let _ = writeln!(
            file,
            "Locked by PID {} at {}",
            std::process::id(),
            chrono::Utc::now().to_rfc3339()
        );

        Ok(LockGuard { file })
    }

    fn wait_for<F>(&self, file: &File, try_lock: F) -> Result<()>
    where
        F: Fn(&File) -> std::io::Result<()>,
    {
        let start = Instant::now();

        loop {
            match try_lock(file) {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    if start.elapsed() > self.timeout {
                        return Err(CrmError::Locked(format!(
                            "timed out after {:?} waiting for {}",
                            self.timeout,
                            self.path.display()
                        )));
                    }
                    std::thread::sleep(Duration::from_millis(25));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
