//! Typed records for the task domain.
//!
//! The remote service's row shape is duck-typed on the wire; everything that
//! crosses into this crate is parsed into these explicit records at the
//! boundary. `date` and `created_at` are canonically RFC 3339 — any locale
//! formatting is a display concern that lives outside this crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Server-assigned task identifier, immutable once created.
pub type TaskId = i64;

/// Server-assigned user identifier.
pub type UserId = i64;

/// One user-owned to-do item, as stored remotely and cached locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Free-text label, non-empty at creation.
    pub name: String,
    /// Target due date.
    pub date: DateTime<Utc>,
    /// Free-text location label.
    pub place: String,
    /// Geocoded coordinates; absent when geocoding failed or was skipped.
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub is_done: bool,
    /// Owner; set once at creation, never mutated.
    pub creator_id: UserId,
    /// Server-assigned creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a new task. The server assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub name: String,
    pub date: DateTime<Utc>,
    pub place: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub creator_id: UserId,
}

impl NewTask {
    /// Boundary validation: `name` and `place` are required and non-empty.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.name.trim().is_empty() {
            return Err(SyncError::InvalidTask("name must not be empty".into()));
        }
        if self.place.trim().is_empty() {
            return Err(SyncError::InvalidTask("place must not be empty".into()));
        }
        Ok(())
    }
}

/// Last-known authenticated user, persisted for display continuity while
/// offline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: UserId,
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn draft() -> NewTask {
        NewTask {
            name: "Buy milk".into(),
            date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            place: "Store".into(),
            latitude: None,
            longitude: None,
            creator_id: 7,
        }
    }

    #[test]
    fn test_valid_draft_passes() {
        assert!(draft().validate().is_ok());
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut t = draft();
        t.name = "   ".into();
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_empty_place_rejected() {
        let mut t = draft();
        t.place = String::new();
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_task_dates_round_trip_as_rfc3339() {
        let task = Task {
            id: 101,
            name: "Buy milk".into(),
            date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            place: "Store".into(),
            latitude: Some(52.23),
            longitude: Some(21.01),
            is_done: false,
            creator_id: 7,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
        };
        let json = serde_json::to_string(&task).expect("Failed to serialize");
        assert!(json.contains("2024-01-01T10:00:00Z"));
        let back: Task = serde_json::from_str(&json).expect("Failed to deserialize");
        assert_eq!(back, task);
    }
}
