//! Task synchronization engine.
//!
//! One engine instance owns the authoritative in-memory task collection and
//! the offline mutation queue for a session. Every user-initiated mutation is
//! either applied to the remote service immediately, or applied optimistically
//! to the local collection and durably queued for replay. Two background
//! watcher tasks — one on the connectivity monitor, one on the realtime change
//! feed — are owned by the engine and released on [`SyncEngine::shutdown`].
//!
//! All state lives behind a single async mutex; operations interleave only at
//! suspension points (remote calls, cache reads/writes, the connectivity
//! probe), so there is never true concurrent mutation of the working set.

use std::sync::{Arc, Mutex as StdMutex, Weak};

use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;

use crate::cache::{CacheStore, SnapshotCache};
use crate::connectivity::{ConnectivityMonitor, ConnectivityState};
use crate::error::SyncError;
use crate::model::{NewTask, Task, TaskId, UserId, UserIdentity};
use crate::queue::{OfflineQueue, PendingMutation, ReplayPolicy, ReplayReport};
use crate::remote::{ChangeKind, ChangeNotification, RemoteTaskService};

/// How a completion toggle was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The remote service acknowledged the update.
    Synced,
    /// No connectivity: the change was applied locally and queued, and will
    /// sync on the next reconnect.
    QueuedOffline,
}

struct EngineState {
    tasks: Vec<Task>,
    queue: OfflineQueue,
    user_id: Option<UserId>,
}

/// The synchronization engine. Build one per session via
/// [`SyncEngineBuilder`].
pub struct SyncEngine {
    remote: Arc<dyn RemoteTaskService>,
    connectivity: Arc<dyn ConnectivityMonitor>,
    cache: Arc<dyn CacheStore>,
    policy: ReplayPolicy,
    state: Mutex<EngineState>,
    change_tx: broadcast::Sender<ChangeNotification>,
    watchers: StdMutex<Vec<JoinHandle<()>>>,
}

impl SyncEngine {
    /// Fetch the full row set owned by `user_id`, replace the working set and
    /// persist a snapshot. On failure the working set and the cached snapshot
    /// are left untouched.
    pub async fn fetch_tasks(&self, user_id: UserId) -> Result<Vec<Task>, SyncError> {
        let tasks = self.remote.fetch_tasks(user_id).await?;
        {
            let mut state = self.state.lock().await;
            state.tasks = tasks.clone();
            state.user_id = Some(user_id);
        }
        self.persist_tasks(user_id, &tasks).await;
        log::info!("Fetched {} tasks for user {user_id}", tasks.len());
        Ok(tasks)
    }

    /// Look up a task, memory first, falling back to a single-row remote
    /// fetch. A remotely fetched row is inserted into the working set exactly
    /// once. Returns `None` when neither path yields a row; remote failures
    /// are logged, not surfaced.
    pub async fn fetch_task_by_id(&self, id: TaskId) -> Option<Task> {
        if let Some(task) = self.get_task_by_id(id).await {
            return Some(task);
        }
        match self.remote.fetch_task(id).await {
            Ok(Some(task)) => {
                let mut state = self.state.lock().await;
                if !state.tasks.iter().any(|t| t.id == id) {
                    state.tasks.push(task.clone());
                }
                Some(task)
            }
            Ok(None) => None,
            Err(e) => {
                log::error!("Failed to fetch task {id}: {e}");
                None
            }
        }
    }

    /// Pure in-memory lookup, no remote fallback.
    pub async fn get_task_by_id(&self, id: TaskId) -> Option<Task> {
        self.state
            .lock()
            .await
            .tasks
            .iter()
            .find(|t| t.id == id)
            .cloned()
    }

    /// Flip a task's completion flag to `!current_is_done`.
    ///
    /// Online, the remote update must succeed before the local flip is
    /// applied; a transient failure is returned to the caller, nothing is
    /// queued. Offline, the flip is applied optimistically, both snapshots are
    /// persisted, and a [`PendingMutation`] is queued for replay.
    ///
    /// Queue durability requires a known user: the persisted mirror lives
    /// under a per-user key, so toggles queued before any user is established
    /// (via fetch, [`cache_user`](Self::cache_user), or rehydration) replay
    /// from memory only and do not survive a restart.
    pub async fn toggle_done(
        &self,
        id: TaskId,
        current_is_done: bool,
    ) -> Result<ToggleOutcome, SyncError> {
        let target = !current_is_done;

        if self.connectivity.current_state().await.is_online() {
            self.remote.set_done(id, target).await?;
            let (user_id, tasks) = self.apply_done_flag(id, target).await;
            if let Some(user_id) = user_id {
                self.persist_tasks(user_id, &tasks).await;
            }
            self.notify(ChangeKind::Update, Some(id));
            return Ok(ToggleOutcome::Synced);
        }

        let (user_id, tasks, queue) = {
            let mut state = self.state.lock().await;
            if let Some(task) = state.tasks.iter_mut().find(|t| t.id == id) {
                task.is_done = target;
            }
            state.queue.push(PendingMutation::new(id, target));
            (
                state.user_id,
                state.tasks.clone(),
                state.queue.entries().to_vec(),
            )
        };
        if let Some(user_id) = user_id {
            self.persist_tasks(user_id, &tasks).await;
            self.persist_queue(user_id, &queue).await;
        }
        log::info!("Offline: queued is_done={target} for task {id}, will sync on reconnect");
        self.notify(ChangeKind::Update, Some(id));
        Ok(ToggleOutcome::QueuedOffline)
    }

    /// Insert a new task remotely and append the server-returned row (with its
    /// assigned id and creation timestamp) to the working set.
    pub async fn add_task(&self, new_task: NewTask) -> Result<Task, SyncError> {
        new_task.validate()?;
        let task = self.remote.insert_task(&new_task).await?;
        let tasks = {
            let mut state = self.state.lock().await;
            state.tasks.push(task.clone());
            state.tasks.clone()
        };
        self.persist_tasks(task.creator_id, &tasks).await;
        self.notify(ChangeKind::Insert, Some(task.id));
        Ok(task)
    }

    /// Delete a task remotely, then drop it from the working set. Deletes are
    /// never queued; without connectivity this fails fast.
    pub async fn remove_task(&self, id: TaskId) -> Result<(), SyncError> {
        self.remote.delete_task(id).await?;
        let (user_id, tasks) = {
            let mut state = self.state.lock().await;
            state.tasks.retain(|t| t.id != id);
            (state.user_id, state.tasks.clone())
        };
        if let Some(user_id) = user_id {
            self.persist_tasks(user_id, &tasks).await;
        }
        self.notify(ChangeKind::Delete, Some(id));
        Ok(())
    }

    /// Rehydrate the working set from the last known-good snapshot for
    /// `user_id`. Cache read failures are logged and yield an empty set.
    pub async fn load_cached_tasks(&self, user_id: UserId) -> Vec<Task> {
        let cache = SnapshotCache::new(self.cache.as_ref());
        let tasks = match cache.load_tasks(user_id).await {
            Ok(Some(tasks)) => {
                log::info!(
                    "Loaded {} cached tasks for user {user_id} (offline)",
                    tasks.len()
                );
                tasks
            }
            Ok(None) => Vec::new(),
            Err(e) => {
                log::warn!("Failed to load cached tasks for user {user_id}: {e}");
                Vec::new()
            }
        };
        let queue = match cache.load_queue(user_id).await {
            Ok(Some(entries)) => OfflineQueue::from_entries(entries),
            Ok(None) => OfflineQueue::new(),
            Err(e) => {
                log::warn!("Failed to load persisted queue for user {user_id}: {e}");
                OfflineQueue::new()
            }
        };
        let mut state = self.state.lock().await;
        state.tasks = tasks.clone();
        state.queue = queue;
        state.user_id = Some(user_id);
        tasks
    }

    /// Last-known authenticated user, from the cache. Sets the active user on
    /// success so subsequent snapshots land under the right key.
    pub async fn load_cached_user(&self) -> Option<UserIdentity> {
        let cache = SnapshotCache::new(self.cache.as_ref());
        match cache.load_user().await {
            Ok(Some(user)) => {
                self.state.lock().await.user_id = Some(user.id);
                Some(user)
            }
            Ok(None) => None,
            Err(e) => {
                log::warn!("Failed to load cached user: {e}");
                None
            }
        }
    }

    /// Persist the authenticated user for offline display continuity and make
    /// them the active user.
    pub async fn cache_user(&self, user: &UserIdentity) {
        self.state.lock().await.user_id = Some(user.id);
        let cache = SnapshotCache::new(self.cache.as_ref());
        if let Err(e) = cache.store_user(user).await {
            log::warn!("Failed to persist cached user: {e}");
        }
    }

    /// Replay the offline mutation queue against the remote service, strictly
    /// in insertion order, one call at a time.
    ///
    /// The persisted queue mirror is preferred; the in-memory copy covers a
    /// queue that was enqueued but never flushed. Per-entry failures are
    /// logged, never surfaced. What happens to failed entries afterwards is
    /// decided by the configured [`ReplayPolicy`]. When a user is known the
    /// pass ends with exactly one reconciling fetch.
    pub async fn replay_offline_queue(&self) -> ReplayReport {
        let (user_id, in_memory) = {
            let mut state = self.state.lock().await;
            (state.user_id, state.queue.drain())
        };
        let cache = SnapshotCache::new(self.cache.as_ref());
        let persisted = match user_id {
            Some(user_id) => match cache.load_queue(user_id).await {
                Ok(entries) => entries,
                Err(e) => {
                    log::warn!("Failed to read persisted queue for user {user_id}: {e}");
                    None
                }
            },
            None => None,
        };
        let entries = persisted.unwrap_or(in_memory);
        if entries.is_empty() {
            return ReplayReport::default();
        }

        log::info!("Replaying {} pending mutations", entries.len());
        let mut report = ReplayReport {
            attempted: entries.len(),
            ..ReplayReport::default()
        };
        let mut failed = Vec::new();
        for mutation in entries {
            match self
                .remote
                .set_done(mutation.task_id, mutation.is_done)
                .await
            {
                Ok(()) => {
                    report.acknowledged += 1;
                    log::debug!(
                        "Replayed {}: task {} is_done={}",
                        mutation.op_id,
                        mutation.task_id,
                        mutation.is_done
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    log::error!(
                        "Replay failed for {} (task {}): {e}",
                        mutation.op_id,
                        mutation.task_id
                    );
                    failed.push(mutation);
                }
            }
        }

        match self.policy {
            ReplayPolicy::ClearAfterPass => {
                if !failed.is_empty() {
                    log::warn!(
                        "Dropping {} unacknowledged mutations after replay pass",
                        failed.len()
                    );
                }
                self.state.lock().await.queue.clear();
                if let Some(user_id) = user_id {
                    if let Err(e) = cache.clear_queue(user_id).await {
                        log::warn!("Failed to clear persisted queue: {e}");
                    }
                }
            }
            ReplayPolicy::RetryFailed => {
                let remaining = {
                    let mut state = self.state.lock().await;
                    state.queue.requeue_front(failed);
                    state.queue.entries().to_vec()
                };
                if let Some(user_id) = user_id {
                    let result = if remaining.is_empty() {
                        cache.clear_queue(user_id).await
                    } else {
                        cache.store_queue(user_id, &remaining).await
                    };
                    if let Err(e) = result {
                        log::warn!("Failed to persist queue after replay: {e}");
                    }
                }
            }
        }

        if let Some(user_id) = user_id {
            if let Err(e) = self.fetch_tasks(user_id).await {
                log::error!("Post-replay refetch failed: {e}");
            }
        }
        report
    }

    /// Snapshot of the working set.
    pub async fn tasks(&self) -> Vec<Task> {
        self.state.lock().await.tasks.clone()
    }

    /// Snapshot of the pending-mutation queue, in replay order.
    pub async fn offline_queue(&self) -> Vec<PendingMutation> {
        self.state.lock().await.queue.entries().to_vec()
    }

    /// Subscribe to change notifications emitted after every successful local
    /// mutation and every forwarded remote change.
    pub fn change_rx(&self) -> broadcast::Receiver<ChangeNotification> {
        self.change_tx.subscribe()
    }

    /// Stop the connectivity and realtime watcher tasks. Idempotent; also
    /// runs on drop.
    pub fn shutdown(&self) {
        for handle in self.watchers.lock().unwrap().drain(..) {
            handle.abort();
        }
    }

    async fn apply_done_flag(&self, id: TaskId, is_done: bool) -> (Option<UserId>, Vec<Task>) {
        let mut state = self.state.lock().await;
        if let Some(task) = state.tasks.iter_mut().find(|t| t.id == id) {
            task.is_done = is_done;
        }
        (state.user_id, state.tasks.clone())
    }

    async fn persist_tasks(&self, user_id: UserId, tasks: &[Task]) {
        let cache = SnapshotCache::new(self.cache.as_ref());
        if let Err(e) = cache.store_tasks(user_id, tasks).await {
            log::warn!("Failed to persist task snapshot for user {user_id}: {e}");
        }
    }

    async fn persist_queue(&self, user_id: UserId, queue: &[PendingMutation]) {
        let cache = SnapshotCache::new(self.cache.as_ref());
        if let Err(e) = cache.store_queue(user_id, queue).await {
            log::warn!("Failed to persist offline queue for user {user_id}: {e}");
        }
    }

    fn notify(&self, kind: ChangeKind, task_id: Option<TaskId>) {
        let _ = self.change_tx.send(ChangeNotification { kind, task_id });
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Builder for [`SyncEngine`]. Wires the three collaborators, optionally seeds
/// the session user, then starts the watcher tasks.
pub struct SyncEngineBuilder {
    remote: Arc<dyn RemoteTaskService>,
    connectivity: Arc<dyn ConnectivityMonitor>,
    cache: Arc<dyn CacheStore>,
    policy: ReplayPolicy,
    realtime: bool,
    user: Option<UserIdentity>,
}

impl SyncEngineBuilder {
    pub fn new(
        remote: Arc<dyn RemoteTaskService>,
        connectivity: Arc<dyn ConnectivityMonitor>,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            remote,
            connectivity,
            cache,
            policy: ReplayPolicy::default(),
            realtime: true,
            user: None,
        }
    }

    pub fn replay_policy(mut self, policy: ReplayPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Disable the realtime-change watcher (connectivity replay still runs).
    pub fn realtime(mut self, enabled: bool) -> Self {
        self.realtime = enabled;
        self
    }

    /// Seed the session with a known authenticated user.
    pub fn user(mut self, user: UserIdentity) -> Self {
        self.user = Some(user);
        self
    }

    pub async fn build(self) -> Arc<SyncEngine> {
        let (change_tx, _) = broadcast::channel(256);
        let engine = Arc::new(SyncEngine {
            remote: self.remote,
            connectivity: self.connectivity,
            cache: self.cache,
            policy: self.policy,
            state: Mutex::new(EngineState {
                tasks: Vec::new(),
                queue: OfflineQueue::new(),
                user_id: None,
            }),
            change_tx,
            watchers: StdMutex::new(Vec::new()),
        });

        if let Some(user) = &self.user {
            engine.cache_user(user).await;
        }

        // Starting without connectivity: rehydrate from the last known-good
        // snapshot so the session has a working set at all.
        if !engine.connectivity.current_state().await.is_online() {
            // The state guard must be released before load_cached_user, which
            // locks state again.
            let seeded = engine.state.lock().await.user_id;
            let user_id = match seeded {
                Some(id) => Some(id),
                None => engine.load_cached_user().await.map(|u| u.id),
            };
            if let Some(user_id) = user_id {
                engine.load_cached_tasks(user_id).await;
            }
        }

        // Subscribe before spawning so no transition emitted between build and
        // the first poll of the watcher task is lost.
        let mut watchers = Vec::new();
        let connectivity_rx = engine.connectivity.subscribe();
        let initial = engine.connectivity.current_state().await;
        watchers.push(spawn_connectivity_watcher(
            Arc::downgrade(&engine),
            connectivity_rx,
            initial,
        ));
        if self.realtime {
            let change_rx = engine.remote.subscribe_changes();
            watchers.push(spawn_realtime_watcher(Arc::downgrade(&engine), change_rx));
        }
        *engine.watchers.lock().unwrap() = watchers;

        engine
    }
}

/// Watch connectivity transitions and replay the queue once per observed
/// offline-to-online edge. Holds a weak engine handle so a dropped engine
/// ends the task instead of leaking it.
fn spawn_connectivity_watcher(
    engine: Weak<SyncEngine>,
    mut rx: broadcast::Receiver<ConnectivityState>,
    initial: ConnectivityState,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last = initial;
        loop {
            let state = match rx.recv().await {
                Ok(state) => state,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    log::warn!("Connectivity watcher lagged, skipped {n} events");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            let came_online = !last.is_online() && state.is_online();
            last = state;
            if !came_online {
                continue;
            }
            let Some(engine) = engine.upgrade() else { break };
            log::info!("Connectivity restored, replaying offline queue");
            let report = engine.replay_offline_queue().await;
            log::info!(
                "Replay pass done: {} attempted, {} acknowledged, {} failed",
                report.attempted,
                report.acknowledged,
                report.failed
            );
        }
    })
}

/// Forward realtime change notifications to observers and refetch the working
/// set while a user is known. A notification arriving mid-mutation can
/// transiently overwrite an unacknowledged optimistic flip; the next replay
/// pass restores it.
fn spawn_realtime_watcher(
    engine: Weak<SyncEngine>,
    mut rx: broadcast::Receiver<ChangeNotification>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let notification = match rx.recv().await {
                Ok(n) => n,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    log::warn!("Realtime watcher lagged, skipped {n} events");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            let Some(engine) = engine.upgrade() else { break };
            log::debug!("Remote change: {notification:?}");
            engine.notify(notification.kind, notification.task_id);
            let user_id = engine.state.lock().await.user_id;
            if let Some(user_id) = user_id {
                if let Err(e) = engine.fetch_tasks(user_id).await {
                    log::error!("Refetch after remote change failed: {e}");
                }
            }
        }
    })
}
