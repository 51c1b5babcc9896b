//! Configuration management
//!
//! Settings live in `settings.json` inside the data directory:
//! ```json
//! {
//!   "database": { "path": "aggregator.duckdb", "autoMigrate": true, "targetVersion": null },
//!   "auth": { "debug": false }
//! }
//! ```
//! Keys this crate does not manage are preserved when saving.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::result::Result;
use crate::domain::Version;

/// Database path meaning "keep everything in memory"
pub const IN_MEMORY: &str = ":memory:";

const DEFAULT_DB_FILENAME: &str = "aggregator.duckdb";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    database: DatabaseSettings,
    #[serde(default)]
    auth: AuthSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatabaseSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    auto_migrate: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target_version: Option<Version>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthSettings {
    #[serde(default)]
    debug: bool,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Where the database lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    File(PathBuf),
    InMemory,
}

/// Aggregator configuration (simplified view of settings)
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseLocation,
    /// Migrate on startup
    pub auto_migrate: bool,
    /// Version to migrate to on startup, latest when unset
    pub target_version: Option<Version>,
    /// Read a bearer JWT instead of the identity header
    pub auth_debug: bool,
    // Keep the raw settings for preservation when saving
    _raw_settings: SettingsFile,
}

impl Config {
    /// Load config from the data directory
    ///
    /// Environment overrides (for CI/testing):
    /// - AGGREGATOR_DB_PATH
    /// - AGGREGATOR_AUTO_MIGRATE
    /// - AGGREGATOR_AUTH_DEBUG
    pub fn load(data_dir: &Path) -> Result<Self> {
        let settings_path = data_dir.join("settings.json");

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str(&content)?
        } else {
            SettingsFile::default()
        };

        let db_path = std::env::var("AGGREGATOR_DB_PATH")
            .ok()
            .or_else(|| raw.database.path.clone())
            .unwrap_or_else(|| DEFAULT_DB_FILENAME.to_string());
        let database = if db_path == IN_MEMORY {
            DatabaseLocation::InMemory
        } else {
            DatabaseLocation::File(data_dir.join(db_path))
        };

        let auto_migrate = env_flag("AGGREGATOR_AUTO_MIGRATE")
            .or(raw.database.auto_migrate)
            .unwrap_or(true);
        let auth_debug = env_flag("AGGREGATOR_AUTH_DEBUG").unwrap_or(raw.auth.debug);

        Ok(Self {
            database,
            auto_migrate,
            target_version: raw.database.target_version,
            auth_debug,
            _raw_settings: raw,
        })
    }

    /// Save config to the data directory
    /// Preserves other settings that this crate doesn't manage
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let settings_path = data_dir.join("settings.json");

        let mut settings = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str::<SettingsFile>(&content).unwrap_or_else(|_| self._raw_settings.clone())
        } else {
            self._raw_settings.clone()
        };

        settings.database.path = Some(match &self.database {
            DatabaseLocation::InMemory => IN_MEMORY.to_string(),
            DatabaseLocation::File(path) => path
                .strip_prefix(data_dir)
                .unwrap_or(path)
                .to_string_lossy()
                .into_owned(),
        });
        settings.database.auto_migrate = Some(self.auto_migrate);
        settings.database.target_version = self.target_version;
        settings.auth.debug = self.auth_debug;

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)?;
        Ok(())
    }

    /// Database file, `None` when in memory
    pub fn database_path(&self) -> Option<&Path> {
        match &self.database {
            DatabaseLocation::File(path) => Some(path),
            DatabaseLocation::InMemory => None,
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    match std::env::var(name).ok().as_deref() {
        Some("true" | "1" | "yes" | "TRUE" | "YES") => Some(true),
        Some("false" | "0" | "no" | "FALSE" | "NO") => Some(false),
        _ => None,
    }
}
