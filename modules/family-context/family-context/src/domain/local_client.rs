//! Local (in-process) client for the family context module.

use std::sync::Arc;

use async_trait::async_trait;
use family_context_sdk::{
    Family, FamilyContextApi, FamilyContextError, FamilyId, FamilyRole, GlobalSettings,
    GlobalSettingsPatch, UserFamilyMapping,
};

use super::error::DomainError;
use super::state::FamilyContextState;

/// [`FamilyContextApi`] over the module's state holder, so every switch
/// made through the API is reflected in [`FamilyContextState`].
pub struct FamilyContextLocalClient {
    state: Arc<FamilyContextState>,
}

impl FamilyContextLocalClient {
    #[must_use]
    pub fn new(state: Arc<FamilyContextState>) -> Self {
        Self { state }
    }
}

fn log_and_convert(op: &str, e: DomainError) -> FamilyContextError {
    tracing::error!(operation = op, error = ?e, "family-context call failed");
    e.into()
}

#[async_trait]
impl FamilyContextApi for FamilyContextLocalClient {
    async fn initialize(&self) -> Result<Option<Family>, FamilyContextError> {
        self.state
            .initialize()
            .await
            .map_err(|e| log_and_convert("initialize", e))
    }

    fn active_family_id(&self) -> Option<FamilyId> {
        self.state.context().active_family_id()
    }

    async fn list_families(&self) -> Result<Vec<Family>, FamilyContextError> {
        self.state
            .context()
            .list_families()
            .await
            .map_err(|e| log_and_convert("list_families", e))
    }

    async fn get_family(&self, id: &FamilyId) -> Result<Option<Family>, FamilyContextError> {
        self.state
            .context()
            .get_family(id)
            .await
            .map_err(|e| log_and_convert("get_family", e))
    }

    async fn switch_family(&self, id: &FamilyId) -> Result<Family, FamilyContextError> {
        self.state
            .switch_family(id)
            .await
            .map_err(|e| log_and_convert("switch_family", e))
    }

    async fn create_family(&self, name: &str) -> Result<Family, FamilyContextError> {
        self.state
            .create_family(name)
            .await
            .map_err(|e| log_and_convert("create_family", e))
    }

    async fn create_family_with_id(
        &self,
        id: &FamilyId,
        name: &str,
    ) -> Result<Family, FamilyContextError> {
        self.state
            .create_family_with_id(id, name)
            .await
            .map_err(|e| log_and_convert("create_family_with_id", e))
    }

    async fn rename_family(&self, id: &FamilyId, name: &str) -> Result<Family, FamilyContextError> {
        self.state
            .rename_family(id, name)
            .await
            .map_err(|e| log_and_convert("rename_family", e))
    }

    async fn find_mappings_by_email(
        &self,
        email: &str,
    ) -> Result<Vec<UserFamilyMapping>, FamilyContextError> {
        self.state
            .context()
            .find_mappings_by_email(email)
            .await
            .map_err(|e| log_and_convert("find_mappings_by_email", e))
    }

    async fn link_user(
        &self,
        email: &str,
        family_id: &FamilyId,
        role: FamilyRole,
        member_id: &str,
    ) -> Result<UserFamilyMapping, FamilyContextError> {
        self.state
            .context()
            .link_user(email, family_id, role, member_id)
            .await
            .map_err(|e| log_and_convert("link_user", e))
    }

    async fn global_settings(&self) -> Result<GlobalSettings, FamilyContextError> {
        self.state
            .context()
            .global_settings()
            .await
            .map_err(|e| log_and_convert("global_settings", e))
    }

    async fn save_global_settings(
        &self,
        patch: GlobalSettingsPatch,
    ) -> Result<GlobalSettings, FamilyContextError> {
        self.state
            .context()
            .save_global_settings(patch)
            .await
            .map_err(|e| log_and_convert("save_global_settings", e))
    }
}
