//! One-time move of the single-family database into the registry and a
//! per-family database.
//!
//! Order of writes:
//! 1. resume record into the legacy settings
//! 2. family and owner mapping into the registry, global settings
//! 3. activation, then every record copied in one destination transaction
//! 4. sync file handle re-keyed (best effort)
//! 5. marker into the legacy settings
//!
//! A crash before step 5 leaves the resume record behind. The next start
//! resumes into the same family id and rewrites its database from scratch.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use family_context_sdk::{
    ExchangeRate, Family, FamilyId, FamilyRole, GlobalSettingsPatch, UserFamilyMapping,
};
use finance_db::{DbHandle, Document};
use tracing::{debug, info, warn};

use super::context::FamilyContext;
use super::error::DomainError;
use crate::infra::storage::family_db::schema::SETTINGS;
use crate::infra::storage::legacy::{
    self, LegacyDatabase, LegacySnapshot, MigrationInProgress, MigrationMarker,
};
use crate::infra::sync::FileHandleStore;

/// Family name used when the legacy data has no owner.
pub const DEFAULT_FAMILY_NAME: &str = "My Family";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationStatus {
    /// The legacy file carries a marker.
    AlreadyMigrated { family_id: FamilyId },
    /// A previous run stopped before writing the marker.
    ResumeRequired { family_id: FamilyId },
    AlreadyMultiTenant,
    NothingToMigrate,
    MigrationRequired,
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyMigrated { family_id } => write!(f, "already migrated into {family_id}"),
            Self::ResumeRequired { family_id } => write!(f, "interrupted, resumes into {family_id}"),
            Self::AlreadyMultiTenant => f.write_str("registry already has families"),
            Self::NothingToMigrate => f.write_str("nothing to migrate"),
            Self::MigrationRequired => f.write_str("migration required"),
        }
    }
}

pub struct LegacyMigration {
    legacy: LegacyDatabase,
    context: Arc<FamilyContext>,
    file_handles: Arc<FileHandleStore>,
}

impl LegacyMigration {
    #[must_use]
    pub fn new(
        legacy: LegacyDatabase,
        context: Arc<FamilyContext>,
        file_handles: Arc<FileHandleStore>,
    ) -> Self {
        Self {
            legacy,
            context,
            file_handles,
        }
    }

    /// Inspect the legacy file and the registry. Writes nothing.
    ///
    /// # Errors
    /// Returns a storage error if either database cannot be read.
    pub async fn check(&self) -> Result<MigrationStatus, DomainError> {
        let db = self.legacy.open().await?;
        let status = self.status(db.as_ref()).await;
        if let Some(db) = db {
            db.close().await;
        }
        status
    }

    /// Whether the legacy file carries a marker. A missing file is `false`.
    ///
    /// # Errors
    /// Returns a storage error if the file exists but cannot be read.
    pub async fn is_already_migrated(&self) -> Result<bool, DomainError> {
        let Some(db) = self.legacy.open().await? else {
            return Ok(false);
        };
        let marker = legacy::read_marker(db.conn()).await;
        db.close().await;
        Ok(marker?.is_some())
    }

    /// Migrate (or finish an interrupted migration) if the status calls for it.
    ///
    /// Returns the family the legacy data now lives in, or `None` if there
    /// was nothing to do.
    ///
    /// # Errors
    /// Any failure before the marker is written is returned as is; calling
    /// again resumes.
    pub async fn run_if_needed(&self) -> Result<Option<Family>, DomainError> {
        let Some(db) = self.legacy.open().await? else {
            debug!(database = self.legacy.name(), "No legacy database");
            return Ok(None);
        };
        let outcome = self.run_with(&db).await;
        db.close().await;
        outcome
    }

    async fn run_with(&self, db: &DbHandle) -> Result<Option<Family>, DomainError> {
        match self.status(Some(db)).await? {
            MigrationStatus::AlreadyMigrated { family_id } => {
                debug!(family_id = %family_id, "Legacy database already migrated");
                Ok(None)
            }
            MigrationStatus::AlreadyMultiTenant | MigrationStatus::NothingToMigrate => Ok(None),
            MigrationStatus::MigrationRequired => {
                self.migrate(db, FamilyId::generate(), false).await.map(Some)
            }
            MigrationStatus::ResumeRequired { family_id } => {
                warn!(family_id = %family_id, "Resuming interrupted legacy migration");
                self.migrate(db, family_id, true).await.map(Some)
            }
        }
    }

    async fn status(&self, db: Option<&DbHandle>) -> Result<MigrationStatus, DomainError> {
        if let Some(db) = db {
            if let Some(marker) = legacy::read_marker(db.conn()).await? {
                return Ok(MigrationStatus::AlreadyMigrated {
                    family_id: marker.migrated_to_family_id,
                });
            }
            if let Some(progress) = legacy::read_in_progress(db.conn()).await? {
                return Ok(MigrationStatus::ResumeRequired {
                    family_id: progress.family_id,
                });
            }
        }

        if self.context.registry().family_count().await? > 0 {
            return Ok(MigrationStatus::AlreadyMultiTenant);
        }

        let Some(db) = db else {
            return Ok(MigrationStatus::NothingToMigrate);
        };
        if legacy::member_count(db.conn()).await? == 0 {
            return Ok(MigrationStatus::NothingToMigrate);
        }
        Ok(MigrationStatus::MigrationRequired)
    }

    async fn migrate(
        &self,
        db: &DbHandle,
        family_id: FamilyId,
        resume: bool,
    ) -> Result<Family, DomainError> {
        info!(family_id = %family_id, resume, "Legacy migration started");
        let snapshot = LegacySnapshot::read(db).await?;
        let now = Utc::now();
        let owner = snapshot.owner();

        if !resume {
            legacy::write_in_progress(
                db,
                &MigrationInProgress {
                    family_id: family_id.clone(),
                    started_at: now,
                },
            )
            .await?;
        }

        let family = self
            .register_family(Family {
                id: family_id,
                name: family_name(owner),
                created_at: now,
                updated_at: now,
            })
            .await?;

        if let Some(mapping) = owner.and_then(|o| owner_mapping(o, &family.id)) {
            self.register_owner(&mapping).await?;
        }

        let mut patch = settings_patch(snapshot.settings.as_ref());
        patch.last_active_family_id = Some(Some(family.id.clone()));
        self.context.save_global_settings(patch).await?;

        self.context.switch_to(&family).await;
        let dest = self.context.active_db().await?;
        copy_records(&dest, &snapshot, resume).await?;
        info!(
            family_id = %family.id,
            records = snapshot.record_count(),
            "Legacy records copied"
        );

        if let Err(e) = self.file_handles.migrate_legacy_handle(&family.id).await {
            warn!(family_id = %family.id, error = %e, "Sync file handle migration failed");
        }

        legacy::write_marker(
            db,
            &MigrationMarker {
                migrated_to_family_id: family.id.clone(),
                migrated_at: Utc::now(),
            },
        )
        .await?;

        info!(family_id = %family.id, name = %family.name, "Legacy migration completed");
        Ok(family)
    }

    async fn register_family(&self, family: Family) -> Result<Family, DomainError> {
        let registry = self.context.registry();
        match registry.add_family(&family).await {
            Ok(()) => Ok(family),
            Err(e) if e.is_duplicate_key() => {
                debug!(family_id = %family.id, "Family already registered by an earlier run");
                registry
                    .get_family(&family.id)
                    .await?
                    .ok_or(DomainError::FamilyNotFound(family.id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn register_owner(&self, mapping: &UserFamilyMapping) -> Result<(), DomainError> {
        let registry = self.context.registry();
        let known = registry
            .find_mappings_by_email(&mapping.email)
            .await?
            .iter()
            .any(|m| m.family_id == mapping.family_id);
        if known {
            debug!(family_id = %mapping.family_id, "Owner mapping already recorded");
            return Ok(());
        }
        registry.add_mapping(mapping).await?;
        Ok(())
    }
}

async fn copy_records(
    dest: &DbHandle,
    snapshot: &LegacySnapshot,
    resume: bool,
) -> Result<(), DomainError> {
    let txn = dest.begin().await?;
    if resume {
        for (spec, _) in snapshot.collections() {
            spec.clear(&txn).await?;
        }
        SETTINGS.clear(&txn).await?;
    }

    for (spec, docs) in snapshot.collections() {
        for doc in docs {
            spec.add(&txn, doc).await?;
        }
    }
    if let Some(settings) = &snapshot.settings {
        SETTINGS.add(&txn, settings).await?;
    }

    txn.commit().await.map_err(finance_db::DbError::from)?;
    Ok(())
}

fn str_field<'d>(doc: &'d Document, field: &str) -> Option<&'d str> {
    doc.get(field)
        .and_then(Document::as_str)
        .filter(|s| !s.trim().is_empty())
}

fn family_name(owner: Option<&Document>) -> String {
    owner
        .and_then(|o| str_field(o, "name"))
        .map_or_else(|| DEFAULT_FAMILY_NAME.to_owned(), |name| format!("{name}'s Family"))
}

fn owner_mapping(owner: &Document, family_id: &FamilyId) -> Option<UserFamilyMapping> {
    let email = str_field(owner, "email")?;
    let member_id = str_field(owner, "id")?;
    Some(UserFamilyMapping {
        id: uuid::Uuid::new_v4().to_string(),
        email: email.to_owned(),
        family_id: family_id.clone(),
        family_role: FamilyRole::Owner,
        member_id: member_id.to_owned(),
        last_active_at: Utc::now(),
        is_local_only: false,
    })
}

/// Timestamps were saved either as RFC 3339 strings or epoch milliseconds.
fn timestamp(value: &Document) -> Option<DateTime<Utc>> {
    if let Some(s) = value.as_str() {
        return DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc));
    }
    value.as_i64().and_then(DateTime::from_timestamp_millis)
}

/// Cross-family fields found in the legacy `app_settings` record.
///
/// Unreadable fields are skipped so they keep their defaults.
fn settings_patch(settings: Option<&Document>) -> GlobalSettingsPatch {
    let mut patch = GlobalSettingsPatch::default();
    let Some(settings) = settings else {
        return patch;
    };

    patch.theme = settings
        .get("theme")
        .and_then(Document::as_str)
        .and_then(|t| t.parse().ok());
    patch.language = str_field(settings, "language").map(ToOwned::to_owned);
    patch.exchange_rates = settings.get("exchangeRates").and_then(|rates| {
        serde_json::from_value::<Vec<ExchangeRate>>(rates.clone())
            .map_err(|e| debug!(error = %e, "Legacy exchange rates ignored"))
            .ok()
    });
    patch.exchange_rate_auto_update = settings
        .get("exchangeRateAutoUpdate")
        .and_then(Document::as_bool);
    patch.exchange_rate_last_fetch = settings
        .get("exchangeRateLastFetch")
        .and_then(timestamp)
        .map(Some);
    patch
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use family_context_sdk::Theme;
    use serde_json::json;

    #[test]
    fn family_name_comes_from_owner() {
        let owner = json!({ "id": "m1", "name": "Greg", "role": "owner" });
        assert_eq!(family_name(Some(&owner)), "Greg's Family");
        assert_eq!(family_name(None), DEFAULT_FAMILY_NAME);
        assert_eq!(
            family_name(Some(&json!({ "id": "m1", "name": "  " }))),
            DEFAULT_FAMILY_NAME
        );
    }

    #[test]
    fn owner_without_email_gets_no_mapping() {
        let family_id = FamilyId::new("fam-1").unwrap();
        assert!(owner_mapping(&json!({ "id": "m1", "role": "owner" }), &family_id).is_none());

        let mapping = owner_mapping(
            &json!({ "id": "m1", "role": "owner", "email": "greg@example.com" }),
            &family_id,
        )
        .unwrap();
        assert_eq!(mapping.member_id, "m1");
        assert_eq!(mapping.family_role, FamilyRole::Owner);
        assert!(!mapping.is_local_only);
    }

    #[test]
    fn settings_patch_takes_cross_family_fields() {
        let patch = settings_patch(Some(&json!({
            "id": "app_settings",
            "theme": "dark",
            "language": "uk",
            "baseCurrency": "UAH",
            "exchangeRates": [{ "from": "USD", "to": "UAH", "rate": 41.2 }],
            "exchangeRateAutoUpdate": false,
            "exchangeRateLastFetch": "2026-01-05T10:00:00Z"
        })));

        assert_eq!(patch.theme, Some(Theme::Dark));
        assert_eq!(patch.language.as_deref(), Some("uk"));
        assert_eq!(patch.exchange_rates.unwrap().len(), 1);
        assert_eq!(patch.exchange_rate_auto_update, Some(false));
        assert!(patch.exchange_rate_last_fetch.unwrap().is_some());
        assert!(patch.last_active_family_id.is_none());
    }

    #[test]
    fn settings_patch_skips_unreadable_fields() {
        let patch = settings_patch(Some(&json!({
            "id": "app_settings",
            "theme": "sepia",
            "exchangeRates": "not a list",
            "exchangeRateLastFetch": 1_767_607_200_000_i64
        })));

        assert!(patch.theme.is_none());
        assert!(patch.exchange_rates.is_none());
        assert_eq!(
            patch.exchange_rate_last_fetch.unwrap().unwrap().timestamp_millis(),
            1_767_607_200_000
        );
        assert_eq!(settings_patch(None), GlobalSettingsPatch::default());
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn handle_store_failure_does_not_abort_migration() {
        use crate::infra::storage::family_db::{open_with_schema, schema};
        use crate::{FamilyContextConfig, FamilyContextModule};

        let dir = tempfile::tempdir().unwrap();
        let cfg = FamilyContextConfig::with_data_dir(dir.path());
        let legacy_db = open_with_schema(
            &cfg.data_dir,
            &cfg.legacy_db_name,
            &cfg.database.connect_opts(),
        )
        .await
        .unwrap();
        schema::FAMILY_MEMBERS
            .add(
                legacy_db.conn(),
                &json!({ "id": "m1", "name": "Greg", "role": "owner" }),
            )
            .await
            .unwrap();
        legacy_db.close().await;
        // A directory where the handle database should be makes it unopenable.
        std::fs::create_dir(dir.path().join(format!("{}.db", cfg.file_handle_db_name))).unwrap();

        let module = FamilyContextModule::new(cfg);
        let family = module.migration().run_if_needed().await.unwrap().unwrap();

        assert!(logs_contain("Sync file handle migration failed"));
        assert_eq!(
            module.migration().check().await.unwrap(),
            MigrationStatus::AlreadyMigrated {
                family_id: family.id
            }
        );
    }
}
