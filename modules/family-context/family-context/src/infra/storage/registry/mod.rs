//! The registry database: which families exist, who belongs to them, and
//! the cross-family settings. Independent of which family is active.

pub mod entity;
pub mod mapper;
pub mod migrations;

use std::path::PathBuf;

use chrono::Utc;
use family_context_sdk::{
    ExchangeRate, Family, FamilyId, GlobalSettings, GlobalSettingsPatch, Theme, UserFamilyMapping,
};
use finance_db::{ConnectOpts, DbError, DbHandle, Result, is_unique_violation, migration_runner};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::FamilyContextConfig;
use entity::{family, global_settings, mapping};
use mapper::{family_active_model, global_settings_active_model, mapping_active_model};

/// Process-wide registry with an explicit `open`/`close` lifecycle.
///
/// The first [`RegistryDatabase::open`] creates the file and applies the
/// schema; later calls return the cached handle until [`RegistryDatabase::close`].
pub struct RegistryDatabase {
    data_dir: PathBuf,
    name: String,
    opts: ConnectOpts,
    default_language: String,
    handle: Mutex<Option<DbHandle>>,
}

fn duplicate(collection: &str, key: &str, err: DbErr) -> DbError {
    if is_unique_violation(&err) {
        DbError::DuplicateKey {
            collection: collection.to_owned(),
            key: key.to_owned(),
        }
    } else {
        DbError::Sea(err)
    }
}

impl RegistryDatabase {
    #[must_use]
    pub fn new(cfg: &FamilyContextConfig) -> Self {
        Self {
            data_dir: cfg.data_dir.clone(),
            name: cfg.registry_db_name.clone(),
            opts: cfg.database.connect_opts(),
            default_language: cfg.default_language.clone(),
            handle: Mutex::new(None),
        }
    }

    /// Open (creating and upgrading if needed) and cache the registry handle.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or a schema step fails.
    pub async fn open(&self) -> Result<DbHandle> {
        let mut slot = self.handle.lock().await;
        if let Some(db) = slot.as_ref() {
            return Ok(db.clone());
        }

        let db = DbHandle::open(&self.data_dir, &self.name, &self.opts).await?;
        let result = migration_runner::run_migrations(&db, migrations::migrations()).await?;
        if result.applied > 0 {
            info!(database = %self.name, applied = ?result.applied_names, "Registry schema upgraded");
        }

        *slot = Some(db.clone());
        Ok(db)
    }

    /// Release the cached handle. The next [`RegistryDatabase::open`] reopens.
    pub async fn close(&self) {
        if let Some(db) = self.handle.lock().await.take() {
            db.close().await;
        }
    }

    /// # Errors
    /// Returns an error on storage failure or a corrupt row.
    pub async fn list_families(&self) -> Result<Vec<Family>> {
        let db = self.open().await?;
        let rows = family::Entity::find().all(db.conn()).await?;
        rows.into_iter()
            .map(|m| Family::try_from(m).map_err(DbError::Other))
            .collect()
    }

    /// # Errors
    /// Returns an error on storage failure.
    pub async fn family_count(&self) -> Result<u64> {
        let db = self.open().await?;
        Ok(family::Entity::find().count(db.conn()).await?)
    }

    /// # Errors
    /// Returns an error on storage failure or a corrupt row.
    pub async fn get_family(&self, id: &FamilyId) -> Result<Option<Family>> {
        let db = self.open().await?;
        family::Entity::find_by_id(id.as_str())
            .one(db.conn())
            .await?
            .map(|m| Family::try_from(m).map_err(DbError::Other))
            .transpose()
    }

    /// Insert a new family.
    ///
    /// # Errors
    /// Returns [`DbError::DuplicateKey`] if the id is already registered.
    pub async fn add_family(&self, family: &Family) -> Result<()> {
        let db = self.open().await?;
        family::Entity::insert(family_active_model(family))
            .exec_without_returning(db.conn())
            .await
            .map_err(|e| duplicate("families", family.id.as_str(), e))?;
        debug!(family_id = %family.id, "Family registered");
        Ok(())
    }

    /// Insert or overwrite a family record.
    ///
    /// # Errors
    /// Returns an error on storage failure.
    pub async fn put_family(&self, family: &Family) -> Result<()> {
        let db = self.open().await?;
        family::Entity::insert(family_active_model(family))
            .on_conflict(
                OnConflict::column(family::Column::Id)
                    .update_columns([
                        family::Column::Name,
                        family::Column::CreatedAt,
                        family::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(db.conn())
            .await?;
        Ok(())
    }

    /// Mappings for `email`, ordered by mapping id. Unknown emails yield an empty list.
    ///
    /// # Errors
    /// Returns an error on storage failure or a corrupt row.
    pub async fn find_mappings_by_email(&self, email: &str) -> Result<Vec<UserFamilyMapping>> {
        let db = self.open().await?;
        let rows = mapping::Entity::find()
            .filter(mapping::Column::Email.eq(email))
            .order_by_asc(mapping::Column::Id)
            .all(db.conn())
            .await?;
        rows.into_iter()
            .map(|m| UserFamilyMapping::try_from(m).map_err(DbError::Other))
            .collect()
    }

    /// # Errors
    /// Returns an error on storage failure or a corrupt row.
    pub async fn find_mappings_by_family_id(
        &self,
        family_id: &FamilyId,
    ) -> Result<Vec<UserFamilyMapping>> {
        let db = self.open().await?;
        let rows = mapping::Entity::find()
            .filter(mapping::Column::FamilyId.eq(family_id.as_str()))
            .order_by_asc(mapping::Column::Id)
            .all(db.conn())
            .await?;
        rows.into_iter()
            .map(|m| UserFamilyMapping::try_from(m).map_err(DbError::Other))
            .collect()
    }

    /// # Errors
    /// Returns an error on storage failure or a corrupt row.
    pub async fn get_mapping(&self, id: &str) -> Result<Option<UserFamilyMapping>> {
        let db = self.open().await?;
        mapping::Entity::find_by_id(id)
            .one(db.conn())
            .await?
            .map(|m| UserFamilyMapping::try_from(m).map_err(DbError::Other))
            .transpose()
    }

    /// # Errors
    /// Returns [`DbError::DuplicateKey`] if the mapping id already exists.
    pub async fn add_mapping(&self, m: &UserFamilyMapping) -> Result<()> {
        let db = self.open().await?;
        mapping::Entity::insert(mapping_active_model(m))
            .exec_without_returning(db.conn())
            .await
            .map_err(|e| duplicate("user_family_mappings", &m.id, e))?;
        Ok(())
    }

    /// # Errors
    /// Returns an error on storage failure.
    pub async fn put_mapping(&self, m: &UserFamilyMapping) -> Result<()> {
        let db = self.open().await?;
        mapping::Entity::insert(mapping_active_model(m))
            .on_conflict(
                OnConflict::column(mapping::Column::Id)
                    .update_columns([
                        mapping::Column::Email,
                        mapping::Column::FamilyId,
                        mapping::Column::FamilyRole,
                        mapping::Column::MemberId,
                        mapping::Column::LastActiveAt,
                        mapping::Column::IsLocalOnly,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(db.conn())
            .await?;
        Ok(())
    }

    /// Stored global settings, or defaults if none were ever saved.
    ///
    /// # Errors
    /// Returns an error on storage failure or a corrupt row.
    pub async fn global_settings(&self) -> Result<GlobalSettings> {
        let db = self.open().await?;
        let row = global_settings::Entity::find_by_id(global_settings::SINGLETON_ID)
            .one(db.conn())
            .await?;
        match row {
            Some(m) => GlobalSettings::try_from(m).map_err(DbError::Other),
            None => Ok(GlobalSettings::defaults(self.default_language.clone())),
        }
    }

    /// Merge `patch` into the stored (or default) settings and persist the
    /// result under the singleton key.
    ///
    /// # Errors
    /// Returns an error on storage failure.
    pub async fn save_global_settings(&self, patch: GlobalSettingsPatch) -> Result<GlobalSettings> {
        let mut settings = self.global_settings().await?;
        settings.apply(patch);
        self.write_global_settings(&settings).await?;
        Ok(settings)
    }

    async fn write_global_settings(&self, settings: &GlobalSettings) -> Result<()> {
        let db = self.open().await?;
        let am = global_settings_active_model(settings)?;
        global_settings::Entity::insert(am)
            .on_conflict(
                OnConflict::column(global_settings::Column::Id)
                    .update_columns([
                        global_settings::Column::Theme,
                        global_settings::Column::Language,
                        global_settings::Column::LastActiveFamilyId,
                        global_settings::Column::ExchangeRates,
                        global_settings::Column::ExchangeRateAutoUpdate,
                        global_settings::Column::ExchangeRateLastFetch,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(db.conn())
            .await?;
        Ok(())
    }

    /// # Errors
    /// Returns an error on storage failure.
    pub async fn set_theme(&self, theme: Theme) -> Result<GlobalSettings> {
        self.save_global_settings(GlobalSettingsPatch {
            theme: Some(theme),
            ..GlobalSettingsPatch::default()
        })
        .await
    }

    /// # Errors
    /// Returns an error on storage failure.
    pub async fn set_language(&self, language: &str) -> Result<GlobalSettings> {
        self.save_global_settings(GlobalSettingsPatch {
            language: Some(language.to_owned()),
            ..GlobalSettingsPatch::default()
        })
        .await
    }

    /// # Errors
    /// Returns an error on storage failure.
    pub async fn set_last_active_family(
        &self,
        family_id: Option<&FamilyId>,
    ) -> Result<GlobalSettings> {
        self.save_global_settings(GlobalSettingsPatch {
            last_active_family_id: Some(family_id.cloned()),
            ..GlobalSettingsPatch::default()
        })
        .await
    }

    /// # Errors
    /// Returns an error on storage failure.
    pub async fn set_exchange_rate_auto_update(&self, enabled: bool) -> Result<GlobalSettings> {
        self.save_global_settings(GlobalSettingsPatch {
            exchange_rate_auto_update: Some(enabled),
            ..GlobalSettingsPatch::default()
        })
        .await
    }

    /// Merge freshly fetched rates into the shared cache and stamp the fetch time.
    ///
    /// # Errors
    /// Returns an error on storage failure.
    pub async fn update_exchange_rates(&self, rates: Vec<ExchangeRate>) -> Result<GlobalSettings> {
        let mut settings = self.global_settings().await?;
        settings.merge_exchange_rates(rates);
        settings.exchange_rate_last_fetch = Some(Utc::now());
        self.write_global_settings(&settings).await?;
        Ok(settings)
    }
}
