//! Store traits for the engine's durable state.
//!
//! The persistence crate provides PostgreSQL implementations; the
//! [`memory`] module provides in-memory implementations for development and
//! testing. The participation row is the unit of mutual exclusion:
//! implementations must serialize concurrent transitions on the same
//! (activity, user) pair, and the capacity check inside [`ParticipationStore::decide`]
//! must run against the live approved count, not a cached one.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::error::StateError;
use crate::models::{
    Activity, ActivityStatus, ActivityUpdate, Alert, AlertDraft, AlertType, Decision,
    Participation, ParticipationStatus, User,
};

/// Default coalescing window for duplicate alerts.
pub const DEFAULT_COALESCE_WINDOW_SECS: i64 = 60;

pub fn default_coalesce_window() -> Duration {
    Duration::seconds(DEFAULT_COALESCE_WINDOW_SECS)
}

/// Durable storage for activities.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn insert(&self, activity: Activity) -> Result<Activity, StateError>;

    /// Fails with `NotFound` when no such activity exists.
    async fn get(&self, id: Uuid) -> Result<Activity, StateError>;

    /// Compare-and-set status change. Fails with `InvalidTransition` when
    /// the stored status is no longer `from`.
    async fn set_status(
        &self,
        id: Uuid,
        from: ActivityStatus,
        to: ActivityStatus,
    ) -> Result<Activity, StateError>;

    /// Applies mutable-field changes, bumping the revision only when a
    /// field actually changed.
    async fn apply_update(
        &self,
        id: Uuid,
        update: ActivityUpdate,
    ) -> Result<UpdateOutcome, StateError>;
}

/// Result of applying an activity update.
#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    pub activity: Activity,
    pub revision_changed: bool,
    /// Comma-separated names of the changed fields, for the alert message.
    pub update_details: String,
}

/// Durable storage for participation rows. All transition methods are
/// atomic per row.
#[async_trait]
pub trait ParticipationStore: Send + Sync {
    /// Creates a `requested` row, or resets a non-live row (`rejected`,
    /// `left`, `removed`) back to `requested`. Fails with
    /// `InvalidTransition` when a live row already exists. Returns the row
    /// and the previous status when this was a re-request.
    async fn upsert_requested(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(Participation, Option<ParticipationStatus>), StateError>;

    async fn get(&self, activity_id: Uuid, user_id: Uuid) -> Result<Participation, StateError>;

    /// Applies the organizer's decision. Requires the row to be in
    /// `requested` (`InvalidTransition` otherwise; concurrent decides on
    /// one row serialize here and exactly one wins). Approval checks the
    /// live approved count against `capacity` in the same critical section
    /// and fails with `CapacityExceeded` when full.
    async fn decide(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
        decision: Decision,
        decided_by: Uuid,
        capacity: Option<i32>,
        now: DateTime<Utc>,
    ) -> Result<Participation, StateError>;

    /// `approved -> left | removed`. Fails with `InvalidTransition` when
    /// the row is not `approved`.
    async fn conclude(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
        to: ParticipationStatus,
        now: DateTime<Utc>,
    ) -> Result<Participation, StateError>;

    /// Deletes a pending request. Fails with `NotFound` when there is no
    /// `requested` row for the pair.
    async fn withdraw(&self, activity_id: Uuid, user_id: Uuid) -> Result<(), StateError>;

    /// User IDs approved for the activity, in approval order.
    async fn approved_user_ids(&self, activity_id: Uuid) -> Result<Vec<Uuid>, StateError>;
}

/// Query for a user's alert feed page.
#[derive(Debug, Clone)]
pub struct ListAlertsQuery {
    pub unread_only: bool,
    pub cursor: Option<String>,
    pub limit: i64,
}

impl Default for ListAlertsQuery {
    fn default() -> Self {
        Self {
            unread_only: false,
            cursor: None,
            limit: 50,
        }
    }
}

/// One newest-first page of a user's alert feed.
#[derive(Debug, Clone)]
pub struct AlertPage {
    pub alerts: Vec<Alert>,
    pub next_cursor: Option<String>,
}

/// Result of appending an alert.
#[derive(Debug, Clone)]
pub enum AppendOutcome {
    /// A new record was stored.
    Stored(Alert),
    /// An identical alert existed inside the coalescing window; the
    /// existing record is returned instead.
    Coalesced(Alert),
}

impl AppendOutcome {
    pub fn alert(&self) -> &Alert {
        match self {
            AppendOutcome::Stored(a) | AppendOutcome::Coalesced(a) => a,
        }
    }

    pub fn is_coalesced(&self) -> bool {
        matches!(self, AppendOutcome::Coalesced(_))
    }
}

/// Durable per-user ordered alert storage with read/unread tracking.
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Assigns an id and timestamp and inserts the alert, unless an alert
    /// with the same dedup key exists within the coalescing window.
    async fn append(&self, draft: AlertDraft, now: DateTime<Utc>)
        -> Result<AppendOutcome, StateError>;

    /// Flips the read flag. Idempotent; a second call is a successful
    /// no-op. Fails with `NotFound` when the alert does not exist or does
    /// not belong to `user_id`.
    async fn mark_read(&self, user_id: Uuid, alert_id: Uuid) -> Result<Alert, StateError>;

    /// Marks every unread alert for the user as read, returning the count.
    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, StateError>;

    async fn list_for(&self, user_id: Uuid, query: ListAlertsQuery)
        -> Result<AlertPage, StateError>;

    async fn unread_count(&self, user_id: Uuid) -> Result<i64, StateError>;

    async fn delete(&self, user_id: Uuid, alert_id: Uuid) -> Result<(), StateError>;

    /// Deletes every alert for the user, returning the count.
    async fn delete_all_for(&self, user_id: Uuid) -> Result<u64, StateError>;

    /// Deletes the most recent alert matching (recipient, type, activity,
    /// sender). Used when a join request is withdrawn. Returns whether a
    /// record was deleted.
    async fn delete_matching(
        &self,
        user_id: Uuid,
        alert_type: AlertType,
        activity_id: Uuid,
        sender_id: Uuid,
    ) -> Result<bool, StateError>;
}

/// Registered push tokens, one per user device; the latest registration
/// wins.
#[async_trait]
pub trait DeviceTokenStore: Send + Sync {
    async fn register(&self, user_id: Uuid, token: String) -> Result<(), StateError>;

    async fn find(&self, user_id: Uuid) -> Result<Option<String>, StateError>;
}

/// User profiles, read for alert denormalization.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn upsert(&self, user: User) -> Result<User, StateError>;

    /// Fails with `NotFound` for unknown users.
    async fn get(&self, id: Uuid) -> Result<User, StateError>;
}
