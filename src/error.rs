use thiserror::Error;

use crate::model::TaskId;

/// Failures reported by the remote task service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The service could not be reached (timeout, transport failure, DNS).
    /// While offline this is expected and routes mutations into the queue
    /// instead of surfacing as an error.
    #[error("Remote service unavailable: {0}")]
    Unavailable(String),

    /// The service reached a decision and said no (validation, permissions).
    #[error("Remote service rejected the request: {0}")]
    Rejected(String),

    #[error("Task {0} not found")]
    NotFound(TaskId),
}

/// Failures from the persistent cache store.
///
/// Snapshot mirroring is best-effort: the engine logs these and keeps going,
/// it never fails an in-memory operation because the cache write failed.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache store I/O failed: {0}")]
    Io(String),

    #[error("Snapshot serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Errors surfaced to callers of the task store.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Invalid task: {0}")]
    InvalidTask(String),
}
