//! Sync error types

use std::time::Duration;

use thiserror::Error;

use crate::storage::StorageError;

/// Errors that can abort a sync run
#[derive(Error, Debug)]
pub enum SyncError {
    /// Remote unreachable or the connection broke mid-request
    #[error("Transport error: {0}")]
    Transport(String),

    /// A request exceeded the configured timeout
    #[error("Request to remote timed out after {0:?}")]
    Timeout(Duration),

    /// Remote answered with a non-success status
    #[error("Remote returned {status}: {message}")]
    Remote { status: u16, message: String },

    /// Remote answered successfully but the body could not be parsed
    #[error("Malformed response from remote: {0}")]
    MalformedResponse(String),

    /// Local store failure during merge or push preparation
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Another sync run holds the in-progress flag
    #[error("A sync is already in progress")]
    AlreadyRunning,

    /// Sync was requested but no remote URL is configured
    #[error("Sync is not configured. Set sync_url with `shelf config set sync_url <url>`")]
    NotConfigured,
}

impl SyncError {
    /// Whether retrying later could succeed without user action
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Transport(_) | SyncError::Timeout(_) | SyncError::AlreadyRunning => true,
            SyncError::Remote { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;
