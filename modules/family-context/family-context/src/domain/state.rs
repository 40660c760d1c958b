//! In-memory view of the active family and the family list, kept in step
//! with every switch made through it.

use std::sync::Arc;

use family_context_sdk::{Family, FamilyId};
use parking_lot::RwLock;
use tracing::debug;

use super::context::FamilyContext;
use super::error::DomainError;

#[derive(Default)]
struct Snapshot {
    active: Option<Family>,
    families: Vec<Family>,
}

pub struct FamilyContextState {
    context: Arc<FamilyContext>,
    inner: RwLock<Snapshot>,
}

impl FamilyContextState {
    #[must_use]
    pub fn new(context: Arc<FamilyContext>) -> Self {
        Self {
            context,
            inner: RwLock::new(Snapshot::default()),
        }
    }

    /// Activate the last active family, if any, and load the family list.
    ///
    /// # Errors
    /// Returns a storage error if the registry cannot be read.
    pub async fn initialize(&self) -> Result<Option<Family>, DomainError> {
        let active = match self.context.last_active().await? {
            Some(last) => self.context.activate(&last.id).await?,
            None => None,
        };
        let families = self.context.list_families().await?;
        debug!(
            families = families.len(),
            active = active.is_some(),
            "Family context initialized"
        );

        let mut inner = self.inner.write();
        inner.active.clone_from(&active);
        inner.families = families;
        Ok(active)
    }

    /// # Errors
    /// Returns [`DomainError::FamilyNotFound`] if `id` is not registered.
    pub async fn switch_family(&self, id: &FamilyId) -> Result<Family, DomainError> {
        let family = self
            .context
            .activate(id)
            .await?
            .ok_or_else(|| DomainError::FamilyNotFound(id.clone()))?;
        self.inner.write().active = Some(family.clone());
        Ok(family)
    }

    /// # Errors
    /// Returns a validation or storage error.
    pub async fn create_family(&self, name: &str) -> Result<Family, DomainError> {
        let family = self.context.create_family(name).await?;
        self.became_active(&family).await?;
        Ok(family)
    }

    /// # Errors
    /// Returns a validation or storage error.
    pub async fn create_family_with_id(
        &self,
        id: &FamilyId,
        name: &str,
    ) -> Result<Family, DomainError> {
        let family = self.context.create_family_with_id(id, name).await?;
        self.became_active(&family).await?;
        Ok(family)
    }

    /// # Errors
    /// Returns [`DomainError::NoActiveFamily`] before any activation.
    pub async fn rename_active(&self, name: &str) -> Result<Family, DomainError> {
        let id = self
            .context
            .active_family_id()
            .ok_or(DomainError::NoActiveFamily)?;
        let family = self
            .context
            .rename(&id, name)
            .await?
            .ok_or(DomainError::FamilyNotFound(id))?;
        self.store_renamed(&family);
        Ok(family)
    }

    /// Rename any family, keeping the cached copies current.
    ///
    /// # Errors
    /// Returns [`DomainError::FamilyNotFound`] if `id` is not registered.
    pub async fn rename_family(&self, id: &FamilyId, name: &str) -> Result<Family, DomainError> {
        let family = self
            .context
            .rename(id, name)
            .await?
            .ok_or_else(|| DomainError::FamilyNotFound(id.clone()))?;
        self.store_renamed(&family);
        Ok(family)
    }

    /// Re-read the family list and the active family record.
    ///
    /// # Errors
    /// Returns a storage error if the registry cannot be read.
    pub async fn reload(&self) -> Result<(), DomainError> {
        let families = self.context.list_families().await?;
        let active_id = self.context.active_family_id();
        let active = active_id.and_then(|id| families.iter().find(|f| f.id == id).cloned());

        let mut inner = self.inner.write();
        inner.families = families;
        inner.active = active;
        Ok(())
    }

    #[must_use]
    pub fn active(&self) -> Option<Family> {
        self.inner.read().active.clone()
    }

    #[must_use]
    pub fn families(&self) -> Vec<Family> {
        self.inner.read().families.clone()
    }

    #[must_use]
    pub fn context(&self) -> &Arc<FamilyContext> {
        &self.context
    }

    async fn became_active(&self, family: &Family) -> Result<(), DomainError> {
        let families = self.context.list_families().await?;
        let mut inner = self.inner.write();
        inner.families = families;
        inner.active = Some(family.clone());
        Ok(())
    }

    fn store_renamed(&self, family: &Family) {
        let mut inner = self.inner.write();
        if let Some(cached) = inner.families.iter_mut().find(|f| f.id == family.id) {
            cached.clone_from(family);
        }
        if inner.active.as_ref().is_some_and(|a| a.id == family.id) {
            inner.active = Some(family.clone());
        }
    }
}
