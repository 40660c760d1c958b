//! Per-family sync file handles.
//!
//! A handle is stored under `syncFile-<familyId>` for the family active at
//! call time, or under the bare `syncFile` key when no family is active.
//! The key is never cached: the active family can change between calls.

use std::path::PathBuf;
use std::sync::Arc;

use family_context_sdk::FamilyId;
use finance_db::{ConnectOpts, DbError, DbHandle, Result, migration_runner};
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ConnectionTrait, EntityTrait};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::entity;
use super::migrations;
use super::permissions::{HandlePermissions, PermissionMode, PermissionState};
use crate::config::FamilyContextConfig;
use crate::infra::storage::family_db::FamilyDatabaseFactory;

/// Key namespace, and the key used while no family is active.
pub const SYNC_FILE_KEY: &str = "syncFile";

/// Location of the file a family syncs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncFileHandle {
    pub path: PathBuf,
    pub name: String,
}

pub struct FileHandleStore {
    data_dir: PathBuf,
    name: String,
    opts: ConnectOpts,
    handle: Mutex<Option<DbHandle>>,
    families: Arc<FamilyDatabaseFactory>,
    permissions: Arc<dyn HandlePermissions>,
}

impl FileHandleStore {
    #[must_use]
    pub fn new(
        cfg: &FamilyContextConfig,
        families: Arc<FamilyDatabaseFactory>,
        permissions: Arc<dyn HandlePermissions>,
    ) -> Self {
        Self {
            data_dir: cfg.data_dir.clone(),
            name: cfg.file_handle_db_name.clone(),
            opts: cfg.database.connect_opts(),
            handle: Mutex::new(None),
            families,
            permissions,
        }
    }

    /// Storage key for `family_id`, or the legacy key for `None`.
    #[must_use]
    pub fn handle_key(family_id: Option<&FamilyId>) -> String {
        match family_id {
            Some(id) => format!("{SYNC_FILE_KEY}-{id}"),
            None => SYNC_FILE_KEY.to_owned(),
        }
    }

    /// Key for whichever family is active right now.
    #[must_use]
    pub fn current_key(&self) -> String {
        Self::handle_key(self.families.active_id().as_ref())
    }

    async fn open(&self) -> Result<DbHandle> {
        let mut slot = self.handle.lock().await;
        if let Some(db) = slot.as_ref() {
            return Ok(db.clone());
        }

        let db = DbHandle::open(&self.data_dir, &self.name, &self.opts).await?;
        migration_runner::run_migrations(&db, migrations::migrations()).await?;
        *slot = Some(db.clone());
        Ok(db)
    }

    pub async fn close(&self) {
        if let Some(db) = self.handle.lock().await.take() {
            db.close().await;
        }
    }

    /// Remember `handle` for the active family.
    ///
    /// # Errors
    /// Returns an error on storage failure.
    pub async fn store(&self, handle: &SyncFileHandle) -> Result<()> {
        let db = self.open().await?;
        let key = self.current_key();
        put(db.conn(), &key, serde_json::to_value(handle)?).await?;
        debug!(key = %key, "Sync file handle stored");
        Ok(())
    }

    /// Handle stored for the active family. Never falls back to another key.
    ///
    /// # Errors
    /// Returns an error on storage failure or an unreadable record.
    pub async fn get(&self) -> Result<Option<SyncFileHandle>> {
        let db = self.open().await?;
        let key = self.current_key();
        let found = get(db.conn(), &key).await?;
        debug!(key = %key, found = found.is_some(), "Sync file handle lookup");
        found
            .map(|value| serde_json::from_value(value).map_err(DbError::from))
            .transpose()
    }

    /// # Errors
    /// Returns an error on storage failure.
    pub async fn clear(&self) -> Result<()> {
        let db = self.open().await?;
        entity::Entity::delete_by_id(self.current_key())
            .exec(db.conn())
            .await?;
        Ok(())
    }

    /// Query, then request if not already granted.
    pub async fn verify_permission(&self, handle: &SyncFileHandle, mode: PermissionMode) -> bool {
        if self.permissions.query(handle, mode).await == PermissionState::Granted {
            return true;
        }
        self.permissions.request(handle, mode).await == PermissionState::Granted
    }

    /// A handle is stored for the active family and is writable right now.
    /// Never prompts.
    pub async fn has_valid_file_handle(&self) -> bool {
        let handle = match self.get().await {
            Ok(Some(handle)) => handle,
            Ok(None) => return false,
            Err(e) => {
                warn!(error = %e, "Sync file handle could not be read");
                return false;
            }
        };
        self.permissions
            .query(&handle, PermissionMode::ReadWrite)
            .await
            == PermissionState::Granted
    }

    /// Move the handle stored under the legacy key to `family_id`'s key.
    ///
    /// Returns whether a handle was moved.
    ///
    /// # Errors
    /// Returns an error on storage failure; nothing is moved in that case.
    pub async fn migrate_legacy_handle(&self, family_id: &FamilyId) -> Result<bool> {
        let db = self.open().await?;
        let txn = db.begin().await?;
        let Some(legacy) = get(&txn, SYNC_FILE_KEY).await? else {
            return Ok(false);
        };

        let key = Self::handle_key(Some(family_id));
        put(&txn, &key, legacy).await?;
        entity::Entity::delete_by_id(SYNC_FILE_KEY).exec(&txn).await?;
        txn.commit().await?;

        info!(family_id = %family_id, key = %key, "Legacy sync file handle migrated");
        Ok(true)
    }
}

async fn get(conn: &impl ConnectionTrait, key: &str) -> Result<Option<serde_json::Value>> {
    Ok(entity::Entity::find_by_id(key)
        .one(conn)
        .await?
        .map(|m| m.value))
}

async fn put(conn: &impl ConnectionTrait, key: &str, value: serde_json::Value) -> Result<()> {
    entity::Entity::insert(entity::ActiveModel {
        key: Set(key.to_owned()),
        value: Set(value),
    })
    .on_conflict(
        OnConflict::column(entity::Column::Key)
            .update_column(entity::Column::Value)
            .to_owned(),
    )
    .exec_without_returning(conn)
    .await?;
    Ok(())
}
