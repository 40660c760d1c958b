//! Per-family databases.
//!
//! Every family owns one physical database named `<prefix>-<familyId>`.
//! [`FamilyDatabaseFactory`] holds the active-family pointer and caches the
//! single open handle for it.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use family_context_sdk::FamilyId;
use finance_db::{ConnectOpts, DbHandle, migration_runner};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::FamilyContextConfig;
use crate::domain::error::DomainError;

/// Database name for `family_id` under `prefix`.
#[must_use]
pub fn database_name(prefix: &str, family_id: &FamilyId) -> String {
    format!("{prefix}-{family_id}")
}

/// Open (creating if absent) a database with the family schema applied.
///
/// # Errors
/// Returns an error if the file cannot be opened or a schema step fails.
pub async fn open_with_schema(
    data_dir: &Path,
    name: &str,
    opts: &ConnectOpts,
) -> finance_db::Result<DbHandle> {
    let db = DbHandle::open(data_dir, name, opts).await?;
    let result = migration_runner::run_migrations(&db, migrations::migrations()).await?;
    if result.applied > 0 {
        info!(database = name, applied = ?result.applied_names, "Family schema upgraded");
    }
    Ok(db)
}

struct OpenFamilyDb {
    family_id: FamilyId,
    handle: DbHandle,
}

pub struct FamilyDatabaseFactory {
    data_dir: PathBuf,
    prefix: String,
    opts: ConnectOpts,
    active: ArcSwapOption<FamilyId>,
    open: Mutex<Option<OpenFamilyDb>>,
}

impl FamilyDatabaseFactory {
    #[must_use]
    pub fn new(cfg: &FamilyContextConfig) -> Self {
        Self {
            data_dir: cfg.data_dir.clone(),
            prefix: cfg.family_db_prefix.clone(),
            opts: cfg.database.connect_opts(),
            active: ArcSwapOption::empty(),
            open: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn database_name(&self, family_id: &FamilyId) -> String {
        database_name(&self.prefix, family_id)
    }

    /// Mark `family_id` as active. Does not open anything.
    pub fn set_active(&self, family_id: FamilyId) {
        debug!(family_id = %family_id, "Active family pointer set");
        self.active.store(Some(Arc::new(family_id)));
    }

    pub fn clear_active(&self) {
        self.active.store(None);
    }

    #[must_use]
    pub fn active_id(&self) -> Option<FamilyId> {
        self.active.load_full().map(|id| (*id).clone())
    }

    /// Handle to the active family's database, opening it on first use.
    ///
    /// Only one handle is cached. A cached handle belonging to a family
    /// other than the active one is closed before the new one is opened.
    ///
    /// # Errors
    /// Returns [`DomainError::NoActiveFamily`] when no family is active, or a
    /// storage error if the database cannot be opened.
    pub async fn open(&self) -> Result<DbHandle, DomainError> {
        let Some(active) = self.active.load_full() else {
            return Err(DomainError::NoActiveFamily);
        };

        let mut slot = self.open.lock().await;
        if let Some(current) = slot.as_ref()
            && current.family_id == *active
        {
            return Ok(current.handle.clone());
        }

        if let Some(stale) = slot.take() {
            warn!(
                stale_family_id = %stale.family_id,
                family_id = %active,
                "Closing handle left open across a family switch"
            );
            stale.handle.close().await;
        }

        let name = self.database_name(&active);
        let handle = open_with_schema(&self.data_dir, &name, &self.opts).await?;
        debug!(family_id = %active, database = %name, "Family database opened");

        *slot = Some(OpenFamilyDb {
            family_id: (*active).clone(),
            handle: handle.clone(),
        });
        Ok(handle)
    }

    /// Close the cached handle, if any. Outstanding clones stop working.
    pub async fn close(&self) {
        if let Some(current) = self.open.lock().await.take() {
            debug!(family_id = %current.family_id, "Family database closed");
            current.handle.close().await;
        }
    }

    /// Family whose database handle is currently cached.
    pub async fn open_family_id(&self) -> Option<FamilyId> {
        self.open
            .lock()
            .await
            .as_ref()
            .map(|current| current.family_id.clone())
    }
}
