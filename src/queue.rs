//! Offline mutation queue.
//!
//! Every completion toggle attempted without connectivity becomes a
//! [`PendingMutation`] appended here. Insertion order is replay order: the
//! engine replays entries strictly sequentially, so two queued toggles on the
//! same task land in enqueue order and the final remote value equals the last
//! queued value without any explicit coalescing.
//!
//! The queue lives in memory and is mirrored to the cache store as a full
//! snapshot on every change so it survives process restarts.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::TaskId;

/// One not-yet-acknowledged completion change made while offline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMutation {
    /// Identifies this mutation across restarts and in replay logs.
    pub op_id: Uuid,
    /// The target task.
    pub task_id: TaskId,
    /// The intended `is_done` value.
    pub is_done: bool,
}

impl PendingMutation {
    pub fn new(task_id: TaskId, is_done: bool) -> Self {
        Self {
            op_id: Uuid::new_v4(),
            task_id,
            is_done,
        }
    }
}

/// What to do with queue entries once a replay pass finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplayPolicy {
    /// Clear the whole queue after one pass, regardless of per-entry outcome.
    ///
    /// This matches the shipped behavior and is lossy: an entry whose remote
    /// update failed is dropped, not retried, and the change is silently lost
    /// unless the post-replay refetch happens to agree. Kept as the default
    /// for compatibility; prefer [`ReplayPolicy::RetryFailed`] for new
    /// deployments.
    #[default]
    ClearAfterPass,
    /// Keep failed entries queued, in order, for the next reconnect pass.
    RetryFailed,
}

/// Ordered sequence of pending mutations, owned by the sync engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfflineQueue {
    entries: Vec<PendingMutation>,
}

impl OfflineQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<PendingMutation>) -> Self {
        Self { entries }
    }

    /// Append a mutation; insertion order is preserved through replay.
    pub fn push(&mut self, mutation: PendingMutation) {
        self.entries.push(mutation);
    }

    pub fn entries(&self) -> &[PendingMutation] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Take the entries out for a replay pass, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<PendingMutation> {
        std::mem::take(&mut self.entries)
    }

    /// Re-queue entries that failed a replay pass, preserving their relative
    /// order ahead of anything enqueued during the pass.
    pub fn requeue_front(&mut self, failed: Vec<PendingMutation>) {
        if failed.is_empty() {
            return;
        }
        let tail = std::mem::take(&mut self.entries);
        self.entries = failed;
        self.entries.extend(tail);
    }
}

/// Outcome of one replay pass, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Entries taken from the queue for this pass.
    pub attempted: usize,
    /// Entries the remote service acknowledged.
    pub acknowledged: usize,
    /// Entries whose remote update failed.
    pub failed: usize,
}
