//! Public task store facade.
//!
//! Presentation code talks to [`TaskStore`] and nothing else. Every method
//! delegates straight to the engine; there is no business logic here.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::engine::{SyncEngine, ToggleOutcome};
use crate::error::SyncError;
use crate::model::{NewTask, Task, TaskId, UserId, UserIdentity};
use crate::queue::{PendingMutation, ReplayReport};
use crate::remote::ChangeNotification;

/// Thin operation surface over one [`SyncEngine`] instance. Cheap to clone;
/// all clones share the same engine and session.
#[derive(Clone)]
pub struct TaskStore {
    engine: Arc<SyncEngine>,
}

impl TaskStore {
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        Self { engine }
    }

    pub async fn fetch_tasks(&self, user_id: UserId) -> Result<Vec<Task>, SyncError> {
        self.engine.fetch_tasks(user_id).await
    }

    pub async fn fetch_task_by_id(&self, id: TaskId) -> Option<Task> {
        self.engine.fetch_task_by_id(id).await
    }

    pub async fn get_task_by_id(&self, id: TaskId) -> Option<Task> {
        self.engine.get_task_by_id(id).await
    }

    pub async fn add_task(&self, new_task: NewTask) -> Result<Task, SyncError> {
        self.engine.add_task(new_task).await
    }

    pub async fn toggle_done(
        &self,
        id: TaskId,
        current_is_done: bool,
    ) -> Result<ToggleOutcome, SyncError> {
        self.engine.toggle_done(id, current_is_done).await
    }

    pub async fn remove_task(&self, id: TaskId) -> Result<(), SyncError> {
        self.engine.remove_task(id).await
    }

    pub async fn load_cached_tasks(&self, user_id: UserId) -> Vec<Task> {
        self.engine.load_cached_tasks(user_id).await
    }

    pub async fn load_cached_user(&self) -> Option<UserIdentity> {
        self.engine.load_cached_user().await
    }

    pub async fn cache_user(&self, user: &UserIdentity) {
        self.engine.cache_user(user).await
    }

    pub async fn replay_offline_queue(&self) -> ReplayReport {
        self.engine.replay_offline_queue().await
    }

    pub async fn tasks(&self) -> Vec<Task> {
        self.engine.tasks().await
    }

    pub async fn offline_queue(&self) -> Vec<PendingMutation> {
        self.engine.offline_queue().await
    }

    pub fn change_rx(&self) -> broadcast::Receiver<ChangeNotification> {
        self.engine.change_rx()
    }

    pub fn shutdown(&self) {
        self.engine.shutdown()
    }
}
