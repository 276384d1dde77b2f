//! Activity domain models and the activity status machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Status of an activity. Transitions are one-directional; `completed` and
/// `cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    Draft,
    Open,
    InProgress,
    Completed,
    Cancelled,
}

impl ActivityStatus {
    /// Terminal states absorb; nothing leaves them.
    pub fn is_terminal(self) -> bool {
        matches!(self, ActivityStatus::Completed | ActivityStatus::Cancelled)
    }

    /// Whether the forward-only chain permits `self -> next`.
    ///
    /// `draft -> open -> in_progress -> completed`; `cancelled` is reachable
    /// from any non-terminal state.
    pub fn can_transition_to(self, next: ActivityStatus) -> bool {
        use ActivityStatus::*;
        matches!(
            (self, next),
            (Draft, Open) | (Open, InProgress) | (InProgress, Completed)
        ) || (!self.is_terminal() && next == Cancelled)
    }
}

impl std::fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivityStatus::Draft => write!(f, "draft"),
            ActivityStatus::Open => write!(f, "open"),
            ActivityStatus::InProgress => write!(f, "in_progress"),
            ActivityStatus::Completed => write!(f, "completed"),
            ActivityStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// An activity. Owned exclusively by its creator for mutation rights.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Activity {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub status: ActivityStatus,
    /// Maximum number of approved participants, unlimited when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<i32>,
    /// Bumped whenever an update actually changes a field.
    pub revision: i32,
    pub created_at: DateTime<Utc>,
}

impl Activity {
    pub fn new(owner_id: Uuid, name: impl Into<String>, capacity: Option<i32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            name: name.into(),
            status: ActivityStatus::Draft,
            capacity,
            revision: 0,
            created_at: Utc::now(),
        }
    }

    pub fn is_owner(&self, user_id: Uuid) -> bool {
        self.owner_id == user_id
    }
}

/// Request to create a new activity.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct CreateActivityRequest {
    #[validate(length(min = 1, max = 120, message = "name must be 1-120 characters"))]
    pub name: String,

    /// Maximum approved participants (unlimited when absent).
    #[validate(range(min = 1, message = "capacity must be at least 1"))]
    pub capacity: Option<i32>,
}

/// Mutable fields of an activity. Applying an update never touches the
/// status; it bumps the revision only when a field actually changes.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct ActivityUpdate {
    #[validate(length(min = 1, max = 120, message = "name must be 1-120 characters"))]
    pub name: Option<String>,

    #[validate(range(min = 1, message = "capacity must be at least 1"))]
    pub capacity: Option<i32>,
}

impl ActivityUpdate {
    /// Applies the update in place and returns the names of the fields that
    /// changed. An empty result means the revision must not be bumped.
    pub fn apply(&self, activity: &mut Activity) -> Vec<&'static str> {
        let mut changed = Vec::new();

        if let Some(name) = &self.name {
            if *name != activity.name {
                activity.name = name.clone();
                changed.push("name");
            }
        }
        if let Some(capacity) = self.capacity {
            if Some(capacity) != activity.capacity {
                activity.capacity = Some(capacity);
                changed.push("capacity");
            }
        }

        if !changed.is_empty() {
            activity.revision += 1;
        }
        changed
    }
}
