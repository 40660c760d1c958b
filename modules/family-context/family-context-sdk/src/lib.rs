//! Family Context SDK
//!
//! Public surface of the `family-context` module:
//!
//! - [`FamilyContextApi`] - API trait for the identity collaborator and UI layers
//! - [`Family`], [`UserFamilyMapping`], [`GlobalSettings`] - Domain models
//! - [`FamilyContextError`] - Error types
//!
//! ## Usage
//!
//! ```ignore
//! use family_context_sdk::{FamilyContextApi, FamilyId, FamilyRole};
//!
//! // After sign-in the identity provider resolved a family for this user
//! let id = FamilyId::new("auth-resolved-family-id")?;
//! let family = api.create_family_with_id(&id, "Greg's Family").await?;
//! api.link_user("greg@example.com", &family.id, FamilyRole::Owner, "member-1").await?;
//!
//! // Later: who does this email belong to?
//! let mappings = api.find_mappings_by_email("greg@example.com").await?;
//! ```

pub mod api;
pub mod error;
pub mod models;

pub use api::FamilyContextApi;
pub use error::FamilyContextError;
pub use models::{
    ExchangeRate, Family, FamilyId, FamilyRole, GlobalSettings, GlobalSettingsPatch,
    InvalidFamilyId, Theme, UserFamilyMapping,
};
