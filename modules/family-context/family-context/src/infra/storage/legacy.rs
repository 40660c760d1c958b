//! Read side of the pre-multi-family database.
//!
//! The legacy file uses the same collection layout as a family database but
//! may predate some collections. It is only ever opened if it already exists.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use family_context_sdk::FamilyId;
use finance_db::{CollectionSpec, ConnectOpts, DbConnTrait, DbHandle, Document, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::family_db::schema::{
    ACCOUNTS, APP_SETTINGS_KEY, ASSETS, FAMILY_MEMBERS, GOALS, RECURRING_ITEMS, SETTINGS,
    SYNC_QUEUE, TRANSACTIONS, TRANSLATIONS,
};
use crate::config::FamilyContextConfig;

/// Settings key of the record proving the legacy data was migrated.
pub const MIGRATION_MARKER_KEY: &str = "__migrated_to_family";

/// Settings key of the record written before the registry is touched.
pub const MIGRATION_IN_PROGRESS_KEY: &str = "__migration_in_progress";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationMarker {
    pub migrated_to_family_id: FamilyId,
    pub migrated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationInProgress {
    pub family_id: FamilyId,
    pub started_at: DateTime<Utc>,
}

/// Locator for the legacy file. Holds no connection.
pub struct LegacyDatabase {
    data_dir: PathBuf,
    name: String,
    opts: ConnectOpts,
}

impl LegacyDatabase {
    #[must_use]
    pub fn new(cfg: &FamilyContextConfig) -> Self {
        let mut opts = cfg.database.connect_opts();
        opts.create_dirs = false;
        Self {
            data_dir: cfg.data_dir.clone(),
            name: cfg.legacy_db_name.clone(),
            opts,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Open the legacy file if present. Absence is `Ok(None)`.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be opened.
    pub async fn open(&self) -> Result<Option<DbHandle>> {
        DbHandle::open_existing(&self.data_dir, &self.name, &self.opts).await
    }
}

/// All documents of `spec`, or nothing if the collection was never created.
///
/// # Errors
/// Returns an error on query failure.
pub async fn read_all(conn: &impl DbConnTrait, spec: CollectionSpec) -> Result<Vec<Document>> {
    if !spec.exists(conn).await? {
        debug!(collection = spec.name, "Legacy collection absent");
        return Ok(Vec::new());
    }
    spec.get_all(conn).await
}

/// Number of family members in the legacy file.
///
/// # Errors
/// Returns an error on query failure.
pub async fn member_count(conn: &impl DbConnTrait) -> Result<u64> {
    if !FAMILY_MEMBERS.exists(conn).await? {
        return Ok(0);
    }
    FAMILY_MEMBERS.count(conn).await
}

async fn settings_record(conn: &impl DbConnTrait, key: &str) -> Result<Option<Document>> {
    if !SETTINGS.exists(conn).await? {
        return Ok(None);
    }
    SETTINGS.get(conn, key).await
}

fn decode<T: DeserializeOwned>(doc: Document) -> Result<T> {
    Ok(serde_json::from_value(doc)?)
}

fn encode<T: Serialize>(key: &str, value: &T) -> Result<Document> {
    let mut doc = serde_json::to_value(value)?;
    if let Some(obj) = doc.as_object_mut() {
        obj.insert("id".to_owned(), json!(key));
    }
    Ok(doc)
}

/// # Errors
/// Returns an error on query failure or an unreadable marker.
pub async fn read_marker(conn: &impl DbConnTrait) -> Result<Option<MigrationMarker>> {
    settings_record(conn, MIGRATION_MARKER_KEY)
        .await?
        .map(decode)
        .transpose()
}

/// # Errors
/// Returns an error on query failure or an unreadable record.
pub async fn read_in_progress(conn: &impl DbConnTrait) -> Result<Option<MigrationInProgress>> {
    settings_record(conn, MIGRATION_IN_PROGRESS_KEY)
        .await?
        .map(decode)
        .transpose()
}

/// Record that a migration into `record.family_id` has started.
///
/// # Errors
/// Returns an error on statement failure.
pub async fn write_in_progress(db: &DbHandle, record: &MigrationInProgress) -> Result<()> {
    SETTINGS.create(db.conn()).await?;
    SETTINGS
        .put(db.conn(), &encode(MIGRATION_IN_PROGRESS_KEY, record)?)
        .await
}

/// Write the marker and drop the in-progress record in one transaction.
///
/// # Errors
/// Returns an error on statement failure; nothing is written in that case.
pub async fn write_marker(db: &DbHandle, marker: &MigrationMarker) -> Result<()> {
    SETTINGS.create(db.conn()).await?;
    let txn = db.begin().await?;
    SETTINGS
        .put(&txn, &encode(MIGRATION_MARKER_KEY, marker)?)
        .await?;
    SETTINGS.delete(&txn, MIGRATION_IN_PROGRESS_KEY).await?;
    txn.commit().await?;
    Ok(())
}

/// Everything a migration copies out of the legacy file.
#[derive(Debug, Default)]
pub struct LegacySnapshot {
    pub members: Vec<Document>,
    pub accounts: Vec<Document>,
    pub transactions: Vec<Document>,
    pub assets: Vec<Document>,
    pub goals: Vec<Document>,
    pub recurring_items: Vec<Document>,
    /// The family-local `app_settings` record, if one was saved.
    pub settings: Option<Document>,
    pub translations: Vec<Document>,
    pub sync_queue: Vec<Document>,
}

impl LegacySnapshot {
    /// Read every collection concurrently.
    ///
    /// # Errors
    /// Returns the first read error.
    pub async fn read(db: &DbHandle) -> Result<Self> {
        let conn = db.conn();
        let (
            members,
            accounts,
            transactions,
            assets,
            goals,
            recurring_items,
            settings,
            translations,
            sync_queue,
        ) = tokio::try_join!(
            read_all(conn, FAMILY_MEMBERS),
            read_all(conn, ACCOUNTS),
            read_all(conn, TRANSACTIONS),
            read_all(conn, ASSETS),
            read_all(conn, GOALS),
            read_all(conn, RECURRING_ITEMS),
            settings_record(conn, APP_SETTINGS_KEY),
            read_all(conn, TRANSLATIONS),
            read_all(conn, SYNC_QUEUE),
        )?;

        Ok(Self {
            members,
            accounts,
            transactions,
            assets,
            goals,
            recurring_items,
            settings,
            translations,
            sync_queue,
        })
    }

    /// Destination collection and records for every list in the snapshot.
    /// Settings are handled separately.
    #[must_use]
    pub fn collections(&self) -> [(CollectionSpec, &[Document]); 8] {
        [
            (FAMILY_MEMBERS, self.members.as_slice()),
            (ACCOUNTS, self.accounts.as_slice()),
            (TRANSACTIONS, self.transactions.as_slice()),
            (ASSETS, self.assets.as_slice()),
            (GOALS, self.goals.as_slice()),
            (RECURRING_ITEMS, self.recurring_items.as_slice()),
            (TRANSLATIONS, self.translations.as_slice()),
            (SYNC_QUEUE, self.sync_queue.as_slice()),
        ]
    }

    /// First member whose role is `owner`.
    #[must_use]
    pub fn owner(&self) -> Option<&Document> {
        self.members
            .iter()
            .find(|m| m.get("role").and_then(Document::as_str) == Some("owner"))
    }

    #[must_use]
    pub fn record_count(&self) -> usize {
        self.collections().iter().map(|(_, docs)| docs.len()).sum::<usize>()
            + usize::from(self.settings.is_some())
    }
}
