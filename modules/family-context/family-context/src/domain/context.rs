//! Decides which family is active.
//!
//! [`FamilyContext`] composes the registry and the per-family database
//! factory. It is the only place the active pointer is moved, and it always
//! closes the open family database before moving it.

use std::sync::Arc;

use chrono::Utc;
use family_context_sdk::{
    ExchangeRate, Family, FamilyId, FamilyRole, GlobalSettings, GlobalSettingsPatch,
    UserFamilyMapping,
};
use finance_db::DbHandle;
use tracing::{debug, info, warn};

use super::error::DomainError;
use crate::infra::storage::family_db::FamilyDatabaseFactory;
use crate::infra::storage::registry::RegistryDatabase;

pub struct FamilyContext {
    registry: Arc<RegistryDatabase>,
    factory: Arc<FamilyDatabaseFactory>,
    max_name_length: usize,
}

impl FamilyContext {
    #[must_use]
    pub fn new(
        registry: Arc<RegistryDatabase>,
        factory: Arc<FamilyDatabaseFactory>,
        max_name_length: usize,
    ) -> Self {
        Self {
            registry,
            factory,
            max_name_length,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<RegistryDatabase> {
        &self.registry
    }

    #[must_use]
    pub fn factory(&self) -> &Arc<FamilyDatabaseFactory> {
        &self.factory
    }

    fn validate_name(&self, name: &str) -> Result<String, DomainError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name", "must not be empty"));
        }
        if name.chars().count() > self.max_name_length {
            return Err(DomainError::validation(
                "name",
                format!("must be at most {} characters", self.max_name_length),
            ));
        }
        Ok(name.to_owned())
    }

    /// Close whatever family database is open, point at `family`, remember it.
    pub(crate) async fn switch_to(&self, family: &Family) {
        self.factory.close().await;
        self.factory.set_active(family.id.clone());
        info!(family_id = %family.id, "Family activated");

        if let Err(e) = self.registry.set_last_active_family(Some(&family.id)).await {
            warn!(family_id = %family.id, error = %e, "Failed to persist last active family");
        }
    }

    /// Make `id` the active family.
    ///
    /// Returns `Ok(None)` without side effects when the family does not exist.
    ///
    /// # Errors
    /// Returns a storage error if the registry cannot be read.
    pub async fn activate(&self, id: &FamilyId) -> Result<Option<Family>, DomainError> {
        let Some(family) = self.registry.get_family(id).await? else {
            debug!(family_id = %id, "Activation of unknown family ignored");
            return Ok(None);
        };
        self.switch_to(&family).await;
        Ok(Some(family))
    }

    /// Register a family under a fresh UUID and activate it.
    ///
    /// # Errors
    /// Returns [`DomainError::Validation`] for an empty or overlong name, or
    /// a storage error.
    pub async fn create_family(&self, name: &str) -> Result<Family, DomainError> {
        let name = self.validate_name(name)?;
        let now = Utc::now();
        let family = Family {
            id: FamilyId::generate(),
            name,
            created_at: now,
            updated_at: now,
        };

        self.registry.add_family(&family).await.map_err(|e| {
            if e.is_duplicate_key() {
                DomainError::DuplicateFamily(family.id.clone())
            } else {
                e.into()
            }
        })?;
        info!(family_id = %family.id, name = %family.name, "Family created");

        self.switch_to(&family).await;
        Ok(family)
    }

    /// Register a family under an externally resolved id and activate it.
    ///
    /// If the id is already registered, the stored record wins: it is
    /// activated and returned unchanged.
    ///
    /// # Errors
    /// Returns [`DomainError::Validation`] for an empty or overlong name, or
    /// a storage error.
    pub async fn create_family_with_id(
        &self,
        id: &FamilyId,
        name: &str,
    ) -> Result<Family, DomainError> {
        let name = self.validate_name(name)?;

        if let Some(existing) = self.registry.get_family(id).await? {
            debug!(family_id = %id, "Family already registered, reusing it");
            self.switch_to(&existing).await;
            return Ok(existing);
        }

        let now = Utc::now();
        let family = Family {
            id: id.clone(),
            name,
            created_at: now,
            updated_at: now,
        };

        let family = match self.registry.add_family(&family).await {
            Ok(()) => {
                info!(family_id = %family.id, name = %family.name, "Family created");
                family
            }
            Err(e) if e.is_duplicate_key() => {
                // registered concurrently between the lookup and the insert
                self.registry
                    .get_family(id)
                    .await?
                    .ok_or_else(|| DomainError::FamilyNotFound(id.clone()))?
            }
            Err(e) => return Err(e.into()),
        };

        self.switch_to(&family).await;
        Ok(family)
    }

    /// Family remembered as last active, if it still exists.
    ///
    /// # Errors
    /// Returns a storage error if the registry cannot be read.
    pub async fn last_active(&self) -> Result<Option<Family>, DomainError> {
        let settings = self.registry.global_settings().await?;
        let Some(id) = settings.last_active_family_id else {
            return Ok(None);
        };
        let family = self.registry.get_family(&id).await?;
        if family.is_none() {
            debug!(family_id = %id, "Last active family no longer registered");
        }
        Ok(family)
    }

    /// Rename a family. Returns `Ok(None)` if it does not exist.
    ///
    /// # Errors
    /// Returns [`DomainError::Validation`] for an empty or overlong name, or
    /// a storage error.
    pub async fn rename(&self, id: &FamilyId, name: &str) -> Result<Option<Family>, DomainError> {
        let name = self.validate_name(name)?;
        let Some(mut family) = self.registry.get_family(id).await? else {
            return Ok(None);
        };

        family.name = name;
        family.updated_at = Utc::now();
        self.registry.put_family(&family).await?;
        info!(family_id = %family.id, name = %family.name, "Family renamed");
        Ok(Some(family))
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.factory.active_id().is_some()
    }

    #[must_use]
    pub fn active_family_id(&self) -> Option<FamilyId> {
        self.factory.active_id()
    }

    /// Handle to the active family's database.
    ///
    /// Repositories must call this per operation and never keep the handle
    /// across a family switch.
    ///
    /// # Errors
    /// Returns [`DomainError::NoActiveFamily`] before any activation.
    pub async fn active_db(&self) -> Result<DbHandle, DomainError> {
        self.factory.open().await
    }

    /// # Errors
    /// Returns a storage error if the registry cannot be read.
    pub async fn list_families(&self) -> Result<Vec<Family>, DomainError> {
        Ok(self.registry.list_families().await?)
    }

    /// # Errors
    /// Returns a storage error if the registry cannot be read.
    pub async fn get_family(&self, id: &FamilyId) -> Result<Option<Family>, DomainError> {
        Ok(self.registry.get_family(id).await?)
    }

    /// # Errors
    /// Returns a storage error if the registry cannot be read.
    pub async fn find_mappings_by_email(
        &self,
        email: &str,
    ) -> Result<Vec<UserFamilyMapping>, DomainError> {
        Ok(self.registry.find_mappings_by_email(email).await?)
    }

    /// # Errors
    /// Returns a storage error if the registry cannot be read.
    pub async fn find_mappings_by_family_id(
        &self,
        id: &FamilyId,
    ) -> Result<Vec<UserFamilyMapping>, DomainError> {
        Ok(self.registry.find_mappings_by_family_id(id).await?)
    }

    /// Family of the first mapping (by mapping id) for `email` that points at
    /// a registered family.
    ///
    /// # Errors
    /// Returns a storage error if the registry cannot be read.
    pub async fn resolve_family_for_email(&self, email: &str) -> Result<Option<Family>, DomainError> {
        for mapping in self.registry.find_mappings_by_email(email).await? {
            if let Some(family) = self.registry.get_family(&mapping.family_id).await? {
                return Ok(Some(family));
            }
            debug!(family_id = %mapping.family_id, "Mapping points at an unknown family");
        }
        Ok(None)
    }

    /// Record that `email` is `member_id` in `family_id`.
    ///
    /// An existing mapping for the same email and family is updated in place.
    ///
    /// # Errors
    /// Returns [`DomainError::FamilyNotFound`] for an unknown family, or a
    /// storage error.
    pub async fn link_user(
        &self,
        email: &str,
        family_id: &FamilyId,
        role: FamilyRole,
        member_id: &str,
    ) -> Result<UserFamilyMapping, DomainError> {
        if self.registry.get_family(family_id).await?.is_none() {
            return Err(DomainError::FamilyNotFound(family_id.clone()));
        }

        let existing = self
            .registry
            .find_mappings_by_email(email)
            .await?
            .into_iter()
            .find(|m| m.family_id == *family_id);

        let mapping = if let Some(mut mapping) = existing {
            mapping.family_role = role;
            mapping.member_id = member_id.to_owned();
            mapping.last_active_at = Utc::now();
            self.registry.put_mapping(&mapping).await?;
            mapping
        } else {
            let mapping = UserFamilyMapping {
                id: uuid::Uuid::new_v4().to_string(),
                email: email.to_owned(),
                family_id: family_id.clone(),
                family_role: role,
                member_id: member_id.to_owned(),
                last_active_at: Utc::now(),
                is_local_only: false,
            };
            self.registry.add_mapping(&mapping).await?;
            mapping
        };

        debug!(family_id = %family_id, role = role.as_str(), "User linked to family");
        Ok(mapping)
    }

    /// # Errors
    /// Returns a storage error if the registry cannot be read.
    pub async fn global_settings(&self) -> Result<GlobalSettings, DomainError> {
        Ok(self.registry.global_settings().await?)
    }

    /// # Errors
    /// Returns a storage error on failure.
    pub async fn save_global_settings(
        &self,
        patch: GlobalSettingsPatch,
    ) -> Result<GlobalSettings, DomainError> {
        Ok(self.registry.save_global_settings(patch).await?)
    }

    /// # Errors
    /// Returns a storage error on failure.
    pub async fn update_exchange_rates(
        &self,
        rates: Vec<ExchangeRate>,
    ) -> Result<GlobalSettings, DomainError> {
        Ok(self.registry.update_exchange_rates(rates).await?)
    }

    /// Close the family database and the registry. Both reopen on demand.
    pub async fn close(&self) {
        self.factory.close().await;
        self.registry.close().await;
    }
}
