//! Family Context Module
//!
//! Multi-family isolation for the family finance tracker. Every family owns
//! its own database file; the registry keeps the family catalog, the
//! email-to-family mappings and the cross-family settings.
//!
//! [`FamilyContextModule`] wires the pieces together and runs the startup
//! flow: legacy migration first, then activation of the last active family.
//! Other layers use the [`family_context_sdk::FamilyContextApi`] it exposes,
//! or [`domain::FamilyContext::active_db`] to reach the active family's data.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod domain;
pub mod infra;
pub mod module;
pub mod password;

pub use config::FamilyContextConfig;
pub use module::FamilyContextModule;
