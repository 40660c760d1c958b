//! Public API trait for the family context module.
//!
//! Implemented by the module's local client. The identity collaborator
//! calls it after sign-in, the UI layer to switch and manage families.

use async_trait::async_trait;

use crate::error::FamilyContextError;
use crate::models::{
    Family, FamilyId, FamilyRole, GlobalSettings, GlobalSettingsPatch, UserFamilyMapping,
};

/// Family (tenant) lifecycle and lookup.
///
/// Every method that changes the active family closes the previously open
/// family database before switching, so no read issued after the call can
/// land on the previous family.
#[async_trait]
pub trait FamilyContextApi: Send + Sync {
    /// Resolve the last active family and activate it.
    ///
    /// Returns `None` when nothing was ever activated or the remembered
    /// family no longer exists.
    ///
    /// # Errors
    ///
    /// - `StorageUnavailable` if the registry cannot be read
    async fn initialize(&self) -> Result<Option<Family>, FamilyContextError>;

    /// Currently active family id, if any.
    fn active_family_id(&self) -> Option<FamilyId>;

    /// # Errors
    ///
    /// - `StorageUnavailable` if the registry cannot be read
    async fn list_families(&self) -> Result<Vec<Family>, FamilyContextError>;

    /// # Errors
    ///
    /// - `StorageUnavailable` if the registry cannot be read
    async fn get_family(&self, id: &FamilyId) -> Result<Option<Family>, FamilyContextError>;

    /// Make `id` the active family.
    ///
    /// # Errors
    ///
    /// - `FamilyNotFound` if no such family exists (nothing changes)
    /// - `StorageUnavailable` on storage failure
    async fn switch_family(&self, id: &FamilyId) -> Result<Family, FamilyContextError>;

    /// Create a family with a fresh id and activate it.
    ///
    /// # Errors
    ///
    /// - `Validation` if the name is empty or too long
    /// - `StorageUnavailable` on storage failure
    async fn create_family(&self, name: &str) -> Result<Family, FamilyContextError>;

    /// Create a family under an externally resolved id and activate it.
    ///
    /// Idempotent: if the id already exists the stored record is activated
    /// and returned unchanged, the given name is ignored.
    ///
    /// # Errors
    ///
    /// - `Validation` if the name is empty or too long
    /// - `StorageUnavailable` on storage failure
    async fn create_family_with_id(
        &self,
        id: &FamilyId,
        name: &str,
    ) -> Result<Family, FamilyContextError>;

    /// # Errors
    ///
    /// - `FamilyNotFound` if no such family exists
    /// - `Validation` if the name is empty or too long
    async fn rename_family(&self, id: &FamilyId, name: &str) -> Result<Family, FamilyContextError>;

    /// All mappings recorded for `email`. Unknown emails yield an empty list.
    ///
    /// # Errors
    ///
    /// - `StorageUnavailable` if the registry cannot be read
    async fn find_mappings_by_email(
        &self,
        email: &str,
    ) -> Result<Vec<UserFamilyMapping>, FamilyContextError>;

    /// Record that `email` belongs to `family_id` as `member_id`.
    ///
    /// # Errors
    ///
    /// - `FamilyNotFound` if the family does not exist
    /// - `StorageUnavailable` on storage failure
    async fn link_user(
        &self,
        email: &str,
        family_id: &FamilyId,
        role: FamilyRole,
        member_id: &str,
    ) -> Result<UserFamilyMapping, FamilyContextError>;

    /// # Errors
    ///
    /// - `StorageUnavailable` if the registry cannot be read
    async fn global_settings(&self) -> Result<GlobalSettings, FamilyContextError>;

    /// # Errors
    ///
    /// - `StorageUnavailable` on storage failure
    async fn save_global_settings(
        &self,
        patch: GlobalSettingsPatch,
    ) -> Result<GlobalSettings, FamilyContextError>;
}
