//! File-system sync state that must never leak between families.

pub mod entity;
pub mod file_handle_store;
pub mod migrations;
pub mod permissions;

pub use file_handle_store::{FileHandleStore, SYNC_FILE_KEY, SyncFileHandle};
pub use permissions::{FsHandlePermissions, HandlePermissions, PermissionMode, PermissionState};
