//! Domain layer for the family context.

pub mod context;
pub mod error;
pub mod local_client;
pub mod migration;
pub mod state;

pub use context::FamilyContext;
pub use error::DomainError;
pub use local_client::FamilyContextLocalClient;
pub use migration::{LegacyMigration, MigrationStatus};
pub use state::FamilyContextState;
