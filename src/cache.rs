//! Persistent snapshot cache.
//!
//! The cache store is an opaque scoped key-value capability. Everything the
//! engine persists is a full-snapshot overwrite (serialize the whole
//! collection, replace the prior value), never an incremental patch, so the
//! store only ever needs get/set/remove of strings.
//!
//! Snapshot and queue keys are namespaced by the owning user id, so switching
//! accounts on the same device can never rehydrate another user's rows. Only
//! the cached-user key is global — it exists precisely to answer "who was
//! signed in" before a session is available.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::CacheError;
use crate::model::{Task, UserId, UserIdentity};
use crate::queue::PendingMutation;

/// Key for the last-known task collection of a user.
pub fn tasks_key(user_id: UserId) -> String {
    format!("local-tasks:{user_id}")
}

/// Key for the pending-mutation queue of a user.
pub fn queue_key(user_id: UserId) -> String {
    format!("offline-queue:{user_id}")
}

/// Key for the last-known authenticated user identity.
pub const CACHED_USER_KEY: &str = "cachedUser";

/// Opaque durable key-value capability (device-local storage).
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;

    async fn remove(&self, key: &str) -> Result<(), CacheError>;
}

/// Typed snapshot helpers over a raw [`CacheStore`].
pub struct SnapshotCache<'a> {
    store: &'a dyn CacheStore,
}

impl<'a> SnapshotCache<'a> {
    pub fn new(store: &'a dyn CacheStore) -> Self {
        Self { store }
    }

    async fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.store.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        let raw = serde_json::to_string(value)?;
        self.store.set(key, &raw).await
    }

    pub async fn load_tasks(&self, user_id: UserId) -> Result<Option<Vec<Task>>, CacheError> {
        self.load(&tasks_key(user_id)).await
    }

    pub async fn store_tasks(&self, user_id: UserId, tasks: &[Task]) -> Result<(), CacheError> {
        self.write(&tasks_key(user_id), &tasks).await
    }

    pub async fn load_queue(
        &self,
        user_id: UserId,
    ) -> Result<Option<Vec<PendingMutation>>, CacheError> {
        self.load(&queue_key(user_id)).await
    }

    pub async fn store_queue(
        &self,
        user_id: UserId,
        queue: &[PendingMutation],
    ) -> Result<(), CacheError> {
        self.write(&queue_key(user_id), &queue).await
    }

    pub async fn clear_queue(&self, user_id: UserId) -> Result<(), CacheError> {
        self.store.remove(&queue_key(user_id)).await
    }

    pub async fn load_user(&self) -> Result<Option<UserIdentity>, CacheError> {
        self.load(CACHED_USER_KEY).await
    }

    pub async fn store_user(&self, user: &UserIdentity) -> Result<(), CacheError> {
        self.write(CACHED_USER_KEY, user).await
    }
}

/// In-memory [`CacheStore`], the default for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.entries.read().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.entries
            .write()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.entries.write().unwrap().remove(key);
        Ok(())
    }
}
