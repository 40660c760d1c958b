use family_context_sdk::{FamilyContextError, FamilyId, InvalidFamilyId};
use finance_db::DbError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("no active family")]
    NoActiveFamily,

    #[error("family not found: {0}")]
    FamilyNotFound(FamilyId),

    #[error("family already exists: {0}")]
    DuplicateFamily(FamilyId),

    #[error(transparent)]
    InvalidFamilyId(#[from] InvalidFamilyId),

    #[error("validation error on '{field}': {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error(transparent)]
    Storage(#[from] DbError),
}

impl DomainError {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}

impl From<DomainError> for FamilyContextError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::NoActiveFamily => Self::NoActiveFamily,
            DomainError::FamilyNotFound(id) => Self::FamilyNotFound {
                family_id: id.to_string(),
            },
            DomainError::DuplicateFamily(id) => Self::DuplicateFamily {
                family_id: id.to_string(),
            },
            DomainError::InvalidFamilyId(e) => Self::InvalidFamilyId(e),
            DomainError::Validation { field, message } => Self::Validation {
                field: field.to_owned(),
                message,
            },
            DomainError::Storage(DbError::Other(e)) => Self::Internal(e.to_string()),
            DomainError::Storage(e) => Self::StorageUnavailable(e.to_string()),
        }
    }
}
