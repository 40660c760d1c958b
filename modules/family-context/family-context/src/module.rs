//! Composition root of the family context.

use std::sync::Arc;

use family_context_sdk::{Family, FamilyContextApi};
use tracing::info;

use crate::config::FamilyContextConfig;
use crate::domain::{
    DomainError, FamilyContext, FamilyContextLocalClient, FamilyContextState, LegacyMigration,
};
use crate::infra::storage::family_db::FamilyDatabaseFactory;
use crate::infra::storage::legacy::LegacyDatabase;
use crate::infra::storage::registry::RegistryDatabase;
use crate::infra::sync::{FileHandleStore, FsHandlePermissions, HandlePermissions};

/// Owns every handle of one installation. Independent instances over
/// different data directories do not share anything.
pub struct FamilyContextModule {
    config: FamilyContextConfig,
    context: Arc<FamilyContext>,
    state: Arc<FamilyContextState>,
    file_handles: Arc<FileHandleStore>,
    migration: LegacyMigration,
    client: Arc<FamilyContextLocalClient>,
}

impl FamilyContextModule {
    #[must_use]
    pub fn new(config: FamilyContextConfig) -> Self {
        Self::with_permissions(config, Arc::new(FsHandlePermissions))
    }

    #[must_use]
    pub fn with_permissions(
        config: FamilyContextConfig,
        permissions: Arc<dyn HandlePermissions>,
    ) -> Self {
        let registry = Arc::new(RegistryDatabase::new(&config));
        let factory = Arc::new(FamilyDatabaseFactory::new(&config));
        let context = Arc::new(FamilyContext::new(
            registry,
            Arc::clone(&factory),
            config.max_name_length,
        ));
        let file_handles = Arc::new(FileHandleStore::new(&config, factory, permissions));
        let migration = LegacyMigration::new(
            LegacyDatabase::new(&config),
            Arc::clone(&context),
            Arc::clone(&file_handles),
        );
        let state = Arc::new(FamilyContextState::new(Arc::clone(&context)));
        let client = Arc::new(FamilyContextLocalClient::new(Arc::clone(&state)));

        Self {
            config,
            context,
            state,
            file_handles,
            migration,
            client,
        }
    }

    /// Migrate legacy data if needed, then activate the last active family.
    ///
    /// Returns the active family, if any.
    ///
    /// # Errors
    /// Returns the migration or registry error; the module stays usable and
    /// `start` can be called again.
    pub async fn start(&self) -> Result<Option<Family>, DomainError> {
        info!(data_dir = %self.config.data_dir.display(), "Starting family context");

        if let Some(migrated) = self.migration.run_if_needed().await? {
            info!(family_id = %migrated.id, "Legacy data moved into its own family");
        }

        let active = self.state.initialize().await?;
        match &active {
            Some(family) => info!(family_id = %family.id, "Resumed last active family"),
            None => info!("No active family, setup required"),
        }
        Ok(active)
    }

    /// Close every open database. Everything reopens on demand.
    pub async fn shutdown(&self) {
        self.context.close().await;
        self.file_handles.close().await;
        info!("Family context stopped");
    }

    #[must_use]
    pub fn config(&self) -> &FamilyContextConfig {
        &self.config
    }

    #[must_use]
    pub fn context(&self) -> &Arc<FamilyContext> {
        &self.context
    }

    #[must_use]
    pub fn state(&self) -> &Arc<FamilyContextState> {
        &self.state
    }

    #[must_use]
    pub fn file_handles(&self) -> &Arc<FileHandleStore> {
        &self.file_handles
    }

    #[must_use]
    pub fn migration(&self) -> &LegacyMigration {
        &self.migration
    }

    #[must_use]
    pub fn client(&self) -> Arc<dyn FamilyContextApi> {
        self.client.clone()
    }
}
