//! Configuration for the family context module.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use finance_db::{ConnectOpts, DEFAULT_SQLITE_BUSY_TIMEOUT, JournalMode};
use serde::{Deserialize, Serialize};

/// Key under which the module reads its section from a figment.
pub const CONFIG_SECTION: &str = "family_context";

pub const DEFAULT_LANGUAGE: &str = "en";

/// Module configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FamilyContextConfig {
    /// Directory holding every database file.
    pub data_dir: PathBuf,
    pub registry_db_name: String,
    /// Per-family databases are named `<prefix>-<familyId>`.
    pub family_db_prefix: String,
    /// Pre-multi-family database, read once by the legacy migration.
    pub legacy_db_name: String,
    pub file_handle_db_name: String,
    /// Language stored in global settings until the user picks one.
    pub default_language: String,
    pub max_name_length: usize,
    pub database: DatabaseConfig,
}

impl Default for FamilyContextConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            registry_db_name: "gp-finance-registry".to_owned(),
            family_db_prefix: "gp-family-finance".to_owned(),
            legacy_db_name: "gp-family-finance".to_owned(),
            file_handle_db_name: "gp-finance-file-handles".to_owned(),
            default_language: DEFAULT_LANGUAGE.to_owned(),
            max_name_length: 255,
            database: DatabaseConfig::default(),
        }
    }
}

impl FamilyContextConfig {
    /// Defaults rooted at `data_dir`.
    #[must_use]
    pub fn with_data_dir(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Extract the `family_context` section; a missing section yields defaults.
    ///
    /// # Errors
    /// Returns a figment error if the section exists but does not deserialize
    /// (wrong types, unknown fields).
    pub fn from_figment(figment: &Figment) -> Result<Self, figment::Error> {
        if figment.find_value(CONFIG_SECTION).is_err() {
            return Ok(Self::default());
        }
        figment.extract_inner(CONFIG_SECTION)
    }
}

/// Pool and pragma settings shared by every database file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub max_conns: u32,
    pub acquire_timeout_ms: u64,
    pub busy_timeout_ms: u64,
    pub journal_mode: JournalMode,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_conns: 4,
            acquire_timeout_ms: 5000,
            busy_timeout_ms: DEFAULT_SQLITE_BUSY_TIMEOUT,
            journal_mode: JournalMode::Wal,
        }
    }
}

impl DatabaseConfig {
    #[must_use]
    pub fn connect_opts(&self) -> ConnectOpts {
        ConnectOpts {
            max_conns: Some(self.max_conns),
            acquire_timeout: Some(Duration::from_millis(self.acquire_timeout_ms)),
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
            journal_mode: self.journal_mode,
            ..ConnectOpts::default()
        }
    }
}
