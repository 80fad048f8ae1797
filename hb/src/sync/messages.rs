//! Sync manager messages
//!
//! Commands and responses for the actor pattern.

use thiserror::Error;
use tokio::sync::oneshot;

use crate::domain::{TaskId, TaskStatus};
use crate::store::StoreError;

/// Errors from sync operations
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Failed to fetch tasks: {0}")]
    Fetch(StoreError),

    #[error("Failed to update task: {0}")]
    Update(StoreError),

    #[error("Sync manager channel closed")]
    ChannelError,
}

impl SyncError {
    /// The underlying store failure, if any
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Fetch(e) | Self::Update(e) => Some(e),
            Self::ChannelError => None,
        }
    }
}

/// Response from sync operations
pub type SyncResponse<T> = Result<T, SyncError>;

/// Commands sent to the sync actor
#[derive(Debug)]
pub enum SyncCommand {
    FetchTasks {
        reply: oneshot::Sender<SyncResponse<()>>,
    },
    UpdateTaskStatus {
        id: TaskId,
        status: TaskStatus,
        reply: oneshot::Sender<SyncResponse<()>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}
