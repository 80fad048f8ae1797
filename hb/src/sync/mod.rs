//! Task synchronization with actor pattern
//!
//! TaskSyncManager keeps a local replica of the remote task table: it
//! fetches the list, writes status changes through to the store, and refetches
//! whenever the store's change feed reports a modification.

mod manager;
mod messages;
mod state;

pub use manager::TaskSyncManager;
pub use messages::{SyncCommand, SyncError, SyncResponse};
pub use state::SyncState;
