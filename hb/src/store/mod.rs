//! Remote task store
//!
//! The [`TaskStore`] trait is the only way the sync manager reaches the
//! remote table: list the rows, update one row's status, and subscribe to
//! the table's change feed.

mod error;
mod memory;
mod rest;
mod subscription;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use rest::RestStore;
pub use subscription::{ChangeEvent, ChangeKind, Subscription};

use crate::config::{StoreBackend, StoreConfig};
use crate::domain::{Task, TaskId, TaskStatus};

/// Remote store holding the task table
///
/// Implementations own transport concerns only. Ordering, replacement and
/// error surfacing policy live in the sync manager.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Fetch every task, newest `created_at` first
    async fn list(&self) -> Result<Vec<Task>, StoreError>;

    /// Set one task's status
    ///
    /// Fails with [`StoreError::NotFound`] when no row has this id.
    async fn update_status(&self, id: &TaskId, status: TaskStatus) -> Result<(), StoreError>;

    /// Open the change feed for the task table (insert, update, delete)
    async fn subscribe(&self) -> Result<Subscription, StoreError>;
}

/// Create a store based on the backend selected in config
pub fn create_store(config: &StoreConfig) -> Result<Arc<dyn TaskStore>, StoreError> {
    debug!(backend = ?config.backend, "create_store: called");
    match config.backend {
        StoreBackend::Rest => {
            debug!("create_store: creating REST store");
            Ok(Arc::new(RestStore::from_config(config)?))
        }
        StoreBackend::Memory => {
            debug!(seed_file = ?config.seed_file, "create_store: creating memory store");
            let store = match &config.seed_file {
                Some(path) => MemoryStore::from_seed_file(path)?,
                None => MemoryStore::new(),
            };
            Ok(Arc::new(store))
        }
    }
}
