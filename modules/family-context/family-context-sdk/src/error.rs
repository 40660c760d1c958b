//! Error types for the family context module.

use thiserror::Error;

use crate::models::InvalidFamilyId;

/// Errors returned by [`crate::FamilyContextApi`].
#[derive(Debug, Error)]
pub enum FamilyContextError {
    /// A family-scoped operation ran before any family was activated.
    #[error("no active family")]
    NoActiveFamily,

    /// The requested family does not exist.
    #[error("family not found: {family_id}")]
    FamilyNotFound { family_id: String },

    #[error("family already exists: {family_id}")]
    DuplicateFamily { family_id: String },

    #[error(transparent)]
    InvalidFamilyId(#[from] InvalidFamilyId),

    #[error("validation error on '{field}': {message}")]
    Validation { field: String, message: String },

    /// The underlying storage could not be opened or queried.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}
