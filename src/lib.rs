//! # tasksync
//!
//! Offline-tolerant task synchronization.
//!
//! `tasksync` keeps one authoritative in-memory task collection per session,
//! backed by a remote task service, a device-local snapshot cache, and a
//! connectivity monitor. Mutations made while online go straight to the
//! remote service; completion toggles made while offline are applied
//! optimistically, persisted, and queued as [`PendingMutation`]s that replay
//! in order on the next reconnect.
//!
//! ## Quick start
//!
//! ```ignore
//! use std::sync::Arc;
//! use tasksync::{MemoryCacheStore, SyncEngineBuilder, TaskStore};
//!
//! let engine = SyncEngineBuilder::new(remote, connectivity, Arc::new(MemoryCacheStore::new()))
//!     .build()
//!     .await;
//! let store = TaskStore::new(engine);
//!
//! store.fetch_tasks(user_id).await?;
//! match store.toggle_done(42, false).await? {
//!     ToggleOutcome::Synced => { /* acknowledged remotely */ }
//!     ToggleOutcome::QueuedOffline => { /* saved locally, will sync later */ }
//! }
//! ```
//!
//! ## Key types
//!
//! - [`TaskStore`] — the facade presentation code consumes
//! - [`SyncEngine`] / [`SyncEngineBuilder`] — owns the working set, the queue
//!   and the watcher tasks
//! - [`RemoteTaskService`], [`ConnectivityMonitor`], [`CacheStore`] — the
//!   three external collaborators, injected as trait objects
//! - [`PendingMutation`] / [`ReplayPolicy`] — the offline queue and what
//!   happens to failed entries after a replay pass

pub mod cache;
pub mod connectivity;
pub mod engine;
pub mod error;
pub mod model;
pub mod queue;
pub mod remote;
pub mod store;

pub use cache::{CacheStore, MemoryCacheStore, SnapshotCache};
pub use connectivity::{ConnectivityMonitor, ConnectivityState};
pub use engine::{SyncEngine, SyncEngineBuilder, ToggleOutcome};
pub use error::{CacheError, RemoteError, SyncError};
pub use model::{NewTask, Task, TaskId, UserId, UserIdentity};
pub use queue::{OfflineQueue, PendingMutation, ReplayPolicy, ReplayReport};
pub use remote::{ChangeKind, ChangeNotification, RemoteTaskService};
pub use store::TaskStore;
