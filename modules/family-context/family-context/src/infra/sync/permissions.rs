//! Access checks for a stored sync file.

use std::io::ErrorKind;

use async_trait::async_trait;
use tracing::debug;

use super::SyncFileHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionMode {
    Read,
    ReadWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Denied,
    /// Access can't be decided without the user.
    Prompt,
}

/// Platform permission source for sync file handles.
#[async_trait]
pub trait HandlePermissions: Send + Sync {
    /// Current state, without asking anyone.
    async fn query(&self, handle: &SyncFileHandle, mode: PermissionMode) -> PermissionState;

    /// Ask for access. May involve the user on platforms that support it.
    async fn request(&self, handle: &SyncFileHandle, mode: PermissionMode) -> PermissionState;
}

/// Answers from file metadata.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsHandlePermissions;

#[async_trait]
impl HandlePermissions for FsHandlePermissions {
    async fn query(&self, handle: &SyncFileHandle, mode: PermissionMode) -> PermissionState {
        match tokio::fs::metadata(&handle.path).await {
            Ok(meta) if mode == PermissionMode::ReadWrite && meta.permissions().readonly() => {
                PermissionState::Denied
            }
            Ok(_) => PermissionState::Granted,
            Err(e) if e.kind() == ErrorKind::NotFound => PermissionState::Prompt,
            Err(e) => {
                debug!(path = %handle.path.display(), error = %e, "Sync file not accessible");
                PermissionState::Denied
            }
        }
    }

    async fn request(&self, handle: &SyncFileHandle, mode: PermissionMode) -> PermissionState {
        // nobody to prompt here
        match self.query(handle, mode).await {
            PermissionState::Prompt => PermissionState::Denied,
            state => state,
        }
    }
}
