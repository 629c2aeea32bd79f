#![allow(dead_code)]

//! Shared test doubles: an in-memory remote task service with call recording
//! and failure injection, and a hand-driven connectivity monitor.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::broadcast;

use tasksync::{
    ChangeNotification, ConnectivityMonitor, ConnectivityState, NewTask, RemoteError,
    RemoteTaskService, Task, TaskId, UserId, UserIdentity,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// The timestamp the mock server stamps onto inserted rows.
pub fn server_created_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
}

pub fn task(id: TaskId, creator_id: UserId, is_done: bool) -> Task {
    Task {
        id,
        name: format!("task {id}"),
        date: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
        place: "Store".into(),
        latitude: None,
        longitude: None,
        is_done,
        creator_id,
        created_at: server_created_at(),
    }
}

pub fn new_task(name: &str, creator_id: UserId) -> NewTask {
    NewTask {
        name: name.into(),
        date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        place: "Store".into(),
        latitude: None,
        longitude: None,
        creator_id,
    }
}

pub fn user(id: UserId) -> UserIdentity {
    UserIdentity {
        id,
        email: format!("user{id}@example.com"),
    }
}

/// In-memory stand-in for the remote task service.
pub struct MockRemote {
    rows: Mutex<HashMap<TaskId, Task>>,
    next_id: AtomicI64,
    fail_all: AtomicBool,
    fail_set_done_for: Mutex<HashSet<TaskId>>,
    fetch_tasks_calls: AtomicUsize,
    fetch_task_calls: AtomicUsize,
    set_done_calls: Mutex<Vec<(TaskId, bool)>>,
    session: Mutex<Option<UserIdentity>>,
    change_tx: broadcast::Sender<ChangeNotification>,
}

impl MockRemote {
    pub fn new() -> Self {
        let (change_tx, _) = broadcast::channel(64);
        Self {
            rows: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(101),
            fail_all: AtomicBool::new(false),
            fail_set_done_for: Mutex::new(HashSet::new()),
            fetch_tasks_calls: AtomicUsize::new(0),
            fetch_task_calls: AtomicUsize::new(0),
            set_done_calls: Mutex::new(Vec::new()),
            session: Mutex::new(None),
            change_tx,
        }
    }

    pub fn seed(&self, task: Task) {
        self.rows.lock().unwrap().insert(task.id, task);
    }

    pub fn row(&self, id: TaskId) -> Option<Task> {
        self.rows.lock().unwrap().get(&id).cloned()
    }

    /// Make every call fail with [`RemoteError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.fail_all.store(unavailable, Ordering::SeqCst);
    }

    /// Make `set_done` fail for one specific task only.
    pub fn fail_set_done_for(&self, id: TaskId) {
        self.fail_set_done_for.lock().unwrap().insert(id);
    }

    pub fn clear_set_done_failures(&self) {
        self.fail_set_done_for.lock().unwrap().clear();
    }

    pub fn set_session(&self, user: Option<UserIdentity>) {
        *self.session.lock().unwrap() = user;
    }

    /// Push a realtime change notification to subscribers.
    pub fn push_change(&self, notification: ChangeNotification) {
        let _ = self.change_tx.send(notification);
    }

    pub fn fetch_tasks_calls(&self) -> usize {
        self.fetch_tasks_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_task_calls(&self) -> usize {
        self.fetch_task_calls.load(Ordering::SeqCst)
    }

    pub fn set_done_calls(&self) -> Vec<(TaskId, bool)> {
        self.set_done_calls.lock().unwrap().clone()
    }

    fn check_available(&self) -> Result<(), RemoteError> {
        if self.fail_all.load(Ordering::SeqCst) {
            Err(RemoteError::Unavailable("injected outage".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteTaskService for MockRemote {
    async fn fetch_tasks(&self, creator_id: UserId) -> Result<Vec<Task>, RemoteError> {
        self.fetch_tasks_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let mut tasks: Vec<Task> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|t| t.creator_id == creator_id)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.id);
        Ok(tasks)
    }

    async fn fetch_task(&self, id: TaskId) -> Result<Option<Task>, RemoteError> {
        self.fetch_task_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    async fn insert_task(&self, task: &NewTask) -> Result<Task, RemoteError> {
        self.check_available()?;
        let row = Task {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            name: task.name.clone(),
            date: task.date,
            place: task.place.clone(),
            latitude: task.latitude,
            longitude: task.longitude,
            is_done: false,
            creator_id: task.creator_id,
            created_at: server_created_at(),
        };
        self.rows.lock().unwrap().insert(row.id, row.clone());
        Ok(row)
    }

    async fn set_done(&self, id: TaskId, is_done: bool) -> Result<(), RemoteError> {
        self.set_done_calls.lock().unwrap().push((id, is_done));
        self.check_available()?;
        if self.fail_set_done_for.lock().unwrap().contains(&id) {
            return Err(RemoteError::Unavailable("injected outage".into()));
        }
        match self.rows.lock().unwrap().get_mut(&id) {
            Some(task) => {
                task.is_done = is_done;
                Ok(())
            }
            None => Err(RemoteError::NotFound(id)),
        }
    }

    async fn delete_task(&self, id: TaskId) -> Result<(), RemoteError> {
        self.check_available()?;
        self.rows.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn current_user(&self) -> Result<Option<UserIdentity>, RemoteError> {
        self.check_available()?;
        Ok(self.session.lock().unwrap().clone())
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<ChangeNotification> {
        self.change_tx.subscribe()
    }
}

/// Hand-driven connectivity monitor.
pub struct MockConnectivity {
    state: Mutex<ConnectivityState>,
    tx: broadcast::Sender<ConnectivityState>,
}

impl MockConnectivity {
    pub fn new(initial: ConnectivityState) -> Self {
        let (tx, _) = broadcast::channel(64);
        Self {
            state: Mutex::new(initial),
            tx,
        }
    }

    pub fn online() -> Self {
        Self::new(ConnectivityState::online())
    }

    pub fn offline() -> Self {
        Self::new(ConnectivityState::offline())
    }

    /// Set the probed state and emit a transition event.
    pub fn set_state(&self, state: ConnectivityState) {
        *self.state.lock().unwrap() = state;
        let _ = self.tx.send(state);
    }

    /// Set the probed state without emitting an event. Lets a test drive the
    /// replay path directly instead of through the connectivity watcher.
    pub fn set_state_silent(&self, state: ConnectivityState) {
        *self.state.lock().unwrap() = state;
    }
}

#[async_trait]
impl ConnectivityMonitor for MockConnectivity {
    async fn current_state(&self) -> ConnectivityState {
        *self.state.lock().unwrap()
    }

    fn subscribe(&self) -> broadcast::Receiver<ConnectivityState> {
        self.tx.subscribe()
    }
}
