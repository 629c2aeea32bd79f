//! Contract with the remote task service.
//!
//! The backend (row storage, authentication, realtime change feed) is an
//! external collaborator; the engine only sees this trait. Production code
//! implements it over the hosted backend client, tests implement it over an
//! in-memory table with failure injection.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::RemoteError;
use crate::model::{NewTask, Task, TaskId, UserId, UserIdentity};

/// The kind of row change carried by a realtime notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A push event from the backend: a row in the watched table changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotification {
    pub kind: ChangeKind,
    /// The affected row, when the backend includes it in the event.
    pub task_id: Option<TaskId>,
}

/// Row-level CRUD plus session lookup and the realtime change feed, scoped to
/// the `tasks` table.
///
/// Every method is a suspension point; calls are issued strictly sequentially
/// by the engine during queue replay.
#[async_trait]
pub trait RemoteTaskService: Send + Sync {
    /// Fetch the full row set owned by `creator_id`.
    async fn fetch_tasks(&self, creator_id: UserId) -> Result<Vec<Task>, RemoteError>;

    /// Fetch a single row by id. `Ok(None)` when the row does not exist.
    async fn fetch_task(&self, id: TaskId) -> Result<Option<Task>, RemoteError>;

    /// Insert a row; the server assigns `id` and `created_at` and returns the
    /// stored row.
    async fn insert_task(&self, task: &NewTask) -> Result<Task, RemoteError>;

    /// Update the completion flag of the row with the given id.
    async fn set_done(&self, id: TaskId, is_done: bool) -> Result<(), RemoteError>;

    /// Delete the row with the given id.
    async fn delete_task(&self, id: TaskId) -> Result<(), RemoteError>;

    /// The currently authenticated user, if a session exists.
    async fn current_user(&self) -> Result<Option<UserIdentity>, RemoteError>;

    /// Subscribe to the realtime change feed for the `tasks` table.
    ///
    /// Dropping the receiver is the unsubscribe; the engine owns its receiver
    /// for the lifetime of its realtime watcher task and releases it on
    /// shutdown.
    fn subscribe_changes(&self) -> broadcast::Receiver<ChangeNotification>;
}
