use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::db::StoreConfig;

/// User configuration, stored as YAML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrmConfig {
    /// Path to the SQLite database file
    pub database_path: String,
    /// Use SQLite write-ahead logging
    pub wal_mode: bool,
    /// Milliseconds SQLite waits on a busy database
    pub busy_timeout_ms: u64,
    /// Milliseconds writers wait for the lock file (held during backup/restore)
    pub lock_timeout_ms: u64,
    /// Tracing filter directive, overridden by `CRM_LOG`
    pub log_filter: Option<String>,
}

impl Default for CrmConfig {
    fn default() -> Self {
        let database_path = dirs::home_dir()
            .map(|home| home.join(".crm").join("crm.db"))
            .unwrap_or_else(|| PathBuf::from("crm.db"));

        Self {
            database_path: database_path.to_string_lossy().into_owned(),
            wal_mode: true,
            busy_timeout_ms: 5000,
            lock_timeout_ms: 5000,
            log_filter: None,
        }
    }
}

impl CrmConfig {
    /// Loads the configuration from the provided path
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))
    }

    /// Loads the configuration, writing the defaults first if the file doesn't exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if !path.as_ref().exists() {
            let config = Self::default();
            config.save(&path)?;
            return Ok(config);
        }
        Self::load(path)
    }

    /// Save the configuration to the specified path
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(&self)?;

        // Ensure parent directories exist
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write config to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Store options for the given database path
    pub fn store_config(&self, path: PathBuf) -> StoreConfig {
        StoreConfig {
            path,
            wal_mode: self.wal_mode,
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
            lock_timeout: Duration::from_millis(self.lock_timeout_ms),
        }
    }
}

/// Gets the path to the config file
pub fn get_config_path() -> Result<PathBuf> {
    // Check if CRM_CONFIG_PATH environment variable is set
    if let Ok(path) = env::var("CRM_CONFIG_PATH") {
        return Ok(PathBuf::from(path));
    }

    // Default to ~/.crm.config
    let home_dir = dirs::home_dir().context("Failed to determine home directory")?;

    Ok(home_dir.join(".crm.config"))
}

/// Determines the database file to use
///
/// Priority: explicit path (`--db`), then `CRM_DB_PATH`, then the config file.
pub fn determine_database_path(explicit: Option<&Path>, config: &CrmConfig) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    if let Ok(path) = env::var("CRM_DB_PATH") {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    PathBuf::from(&config.database_path)
}
