#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Storage layer for the family-finance core.
//!
//! Every logical database (the registry, one per family, the legacy
//! single-family file and the auxiliary handle store) is a single `SQLite`
//! file under a data directory, reached through `SeaORM` on top of a `SQLx`
//! pool. The crate provides:
//! - [`DbHandle`]: an open database with an explicit [`DbHandle::close`]
//! - [`migration_runner`]: versioned, recorded, per-step transactional schema upgrades
//! - [`collection`]: JSON document collections with secondary indexes
//!
//! Connections are built from typed `SqliteConnectOptions`; no DSN strings
//! are assembled.
//!
//! # Example
//! ```rust,no_run
//! use finance_db::{ConnectOpts, DbHandle};
//! use std::path::Path;
//!
//! # async fn demo() -> finance_db::Result<()> {
//! let db = DbHandle::open(Path::new("./data"), "gp-finance-registry", &ConnectOpts::default()).await?;
//! let _conn = db.conn();
//! db.close().await;
//! # Ok(())
//! # }
//! ```

pub mod collection;
pub mod migration_runner;

mod pool_opts;

pub use collection::{CollectionSpec, Document, IndexSpec};
pub use migration_runner::{MigrationError, MigrationResult};

use std::path::{Path, PathBuf};
use std::time::Duration;

use pool_opts::ApplyPoolOpts;
use sea_orm::sqlx::SqlitePool;
use sea_orm::sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sea_orm::{
    DatabaseConnection, DatabaseTransaction, DbErr, SqlErr, SqlxSqliteConnector, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub use sea_orm::ConnectionTrait as DbConnTrait;

/// File extension used for every database file under the data directory.
pub const DB_FILE_EXTENSION: &str = "db";

/// Default busy timeout for `SQLite` connections (milliseconds).
pub const DEFAULT_SQLITE_BUSY_TIMEOUT: u64 = 5000;

/// Library error type.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("duplicate key '{key}' in collection '{collection}'")]
    DuplicateKey { collection: String, key: String },

    #[error("invalid document in collection '{collection}': {reason}")]
    InvalidDocument { collection: String, reason: String },

    #[error("unknown index '{index}' on collection '{collection}'")]
    UnknownIndex { collection: String, index: String },

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error(transparent)]
    Sqlx(#[from] sea_orm::sqlx::Error),

    #[error(transparent)]
    Sea(#[from] DbErr),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DbError {
    /// `true` when the error reports an existing primary key or unique index entry.
    #[must_use]
    pub fn is_duplicate_key(&self) -> bool {
        match self {
            Self::DuplicateKey { .. } => true,
            Self::Sea(e) => is_unique_violation(e),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Detects a `UNIQUE`/`PRIMARY KEY` constraint failure reported by `SQLite`.
#[must_use]
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
        || err.to_string().contains("UNIQUE constraint failed")
}

/// `SQLite` journal mode applied to every pooled connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalMode {
    #[default]
    Wal,
    Delete,
}

impl From<JournalMode> for SqliteJournalMode {
    fn from(mode: JournalMode) -> Self {
        match mode {
            JournalMode::Wal => Self::Wal,
            JournalMode::Delete => Self::Delete,
        }
    }
}

/// Connection options.
#[derive(Clone, Debug)]
pub struct ConnectOpts {
    /// Maximum number of connections in the pool.
    pub max_conns: Option<u32>,
    /// Timeout to acquire a connection from the pool.
    pub acquire_timeout: Option<Duration>,
    /// Idle timeout before a connection is closed.
    pub idle_timeout: Option<Duration>,
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout: Duration,
    pub journal_mode: JournalMode,
    /// Create the data directory if missing.
    pub create_dirs: bool,
}

impl Default for ConnectOpts {
    fn default() -> Self {
        Self {
            max_conns: Some(4),
            acquire_timeout: Some(Duration::from_secs(5)),
            idle_timeout: None,
            busy_timeout: Duration::from_millis(DEFAULT_SQLITE_BUSY_TIMEOUT),
            journal_mode: JournalMode::Wal,
            create_dirs: true,
        }
    }
}

/// Path of the database file called `name` inside `data_dir`.
#[must_use]
pub fn database_path(data_dir: &Path, name: &str) -> PathBuf {
    data_dir.join(format!("{name}.{DB_FILE_EXTENSION}"))
}

/// An open database file.
///
/// Clones share the same pool. [`DbHandle::close`] closes the pool for every
/// clone, after which any further statement on a clone fails instead of
/// reaching another database.
#[derive(Clone, Debug)]
pub struct DbHandle {
    name: String,
    path: PathBuf,
    pool: SqlitePool,
    sea: DatabaseConnection,
}

impl DbHandle {
    /// Open the database `name` under `data_dir`, creating the file if absent.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created or the pool cannot connect.
    pub async fn open(data_dir: &Path, name: &str, opts: &ConnectOpts) -> Result<Self> {
        if opts.create_dirs {
            tokio::fs::create_dir_all(data_dir).await?;
        }
        Self::connect(database_path(data_dir, name), name, opts, true).await
    }

    /// Open the database `name` only if its file already exists.
    ///
    /// Absence is reported as `Ok(None)`; nothing is created on disk.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be opened.
    pub async fn open_existing(
        data_dir: &Path,
        name: &str,
        opts: &ConnectOpts,
    ) -> Result<Option<Self>> {
        let path = database_path(data_dir, name);
        if !tokio::fs::try_exists(&path).await? {
            debug!(database = name, "Database file not present");
            return Ok(None);
        }
        Self::connect(path, name, opts, false).await.map(Some)
    }

    async fn connect(path: PathBuf, name: &str, opts: &ConnectOpts, create: bool) -> Result<Self> {
        let connect_opts = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(create)
            .journal_mode(opts.journal_mode.into())
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(opts.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .apply(opts)
            .connect_with(connect_opts)
            .await?;
        let sea = SqlxSqliteConnector::from_sqlx_sqlite_pool(pool.clone());

        debug!(database = name, path = %path.display(), "Database opened");
        Ok(Self {
            name: name.to_owned(),
            path,
            pool,
            sea,
        })
    }

    /// Logical database name (the file stem).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `SeaORM` connection for queries and entity operations.
    #[must_use]
    pub fn conn(&self) -> &DatabaseConnection {
        &self.sea
    }

    /// Begin a transaction. Dropping it without commit rolls back.
    ///
    /// # Errors
    /// Returns an error if a connection cannot be acquired.
    pub async fn begin(&self) -> Result<DatabaseTransaction> {
        Ok(self.sea.begin().await?)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// Graceful pool close. Waits for checked-out connections to be returned.
    pub async fn close(self) {
        debug!(database = %self.name, "Closing database");
        self.pool.close().await;
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn database_path_appends_extension() {
        let p = database_path(Path::new("/tmp/ff"), "gp-family-finance-abc");
        assert_eq!(p, PathBuf::from("/tmp/ff/gp-family-finance-abc.db"));
    }

    #[test]
    fn duplicate_key_is_detected() {
        let err = DbError::DuplicateKey {
            collection: "families".to_owned(),
            key: "f1".to_owned(),
        };
        assert!(err.is_duplicate_key());

        let err = DbError::Sea(DbErr::Custom("boom".to_owned()));
        assert!(!err.is_duplicate_key());
    }
}
