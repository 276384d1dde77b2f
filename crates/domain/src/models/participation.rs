//! Participation domain models for the join-request workflow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a participation row.
///
/// `requested -> {approved, rejected}`; `approved -> {left, removed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipationStatus {
    Requested,
    Approved,
    Rejected,
    Left,
    Removed,
}

impl ParticipationStatus {
    /// A live participation blocks a new request for the same pair. At most
    /// one live row may exist per (activity, user).
    pub fn is_live(self) -> bool {
        matches!(
            self,
            ParticipationStatus::Requested | ParticipationStatus::Approved
        )
    }
}

impl std::fmt::Display for ParticipationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParticipationStatus::Requested => write!(f, "requested"),
            ParticipationStatus::Approved => write!(f, "approved"),
            ParticipationStatus::Rejected => write!(f, "rejected"),
            ParticipationStatus::Left => write!(f, "left"),
            ParticipationStatus::Removed => write!(f, "removed"),
        }
    }
}

/// The organizer's decision on a pending join request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    pub fn resulting_status(self) -> ParticipationStatus {
        match self {
            Decision::Approved => ParticipationStatus::Approved,
            Decision::Rejected => ParticipationStatus::Rejected,
        }
    }
}

/// A participation row, keyed by (activity_id, user_id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Participation {
    pub activity_id: Uuid,
    pub user_id: Uuid,
    pub status: ParticipationStatus,
    pub requested_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
    /// The organizer who approved or rejected the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_by: Option<Uuid>,
}

impl Participation {
    pub fn requested(activity_id: Uuid, user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            activity_id,
            user_id,
            status: ParticipationStatus::Requested,
            requested_at: now,
            decided_at: None,
            decided_by: None,
        }
    }
}
