//! State deltas emitted by the lifecycle service.
//!
//! A delta is the complete record of one accepted transition: old and new
//! status, the actor, and the affected rows. It is the sole input to alert
//! generation; the lifecycle never calls the generator directly.

use uuid::Uuid;

use super::activity::{Activity, ActivityStatus};
use super::participation::{Decision, Participation, ParticipationStatus};
use super::user::User;

/// One accepted state transition.
///
/// Snapshots carry everything the alert generator needs (names, profile
/// pictures, recipient lists) so generation stays a pure function.
#[derive(Debug, Clone)]
pub enum StateDelta {
    /// A user requested to join an open activity. `previous_status` is the
    /// status of the reset row when this is a re-request.
    JoinRequested {
        activity: Activity,
        requester: User,
        participation: Participation,
        previous_status: Option<ParticipationStatus>,
    },

    /// A requester withdrew a pending join request; the row is gone.
    RequestWithdrawn {
        activity: Activity,
        requester: User,
    },

    /// The organizer approved or rejected a pending request.
    Decided {
        activity: Activity,
        organizer: User,
        participation: Participation,
        decision: Decision,
    },

    /// An approved participant left on their own initiative.
    Left {
        activity: Activity,
        participant: User,
        participation: Participation,
    },

    /// The organizer removed an approved participant.
    Removed {
        activity: Activity,
        organizer: User,
        participation: Participation,
    },

    /// The organizer cancelled the activity. Recipients are the users who
    /// were approved at cancellation time, in commit order.
    ActivityCancelled {
        activity: Activity,
        organizer: User,
        approved_participants: Vec<Uuid>,
    },

    /// The organizer updated activity fields. `revision_changed` is false
    /// when the update was a no-op.
    ActivityUpdated {
        activity: Activity,
        organizer: User,
        approved_participants: Vec<Uuid>,
        revision_changed: bool,
        update_details: String,
    },

    /// The organizer advanced the activity along the forward chain.
    StatusAdvanced {
        activity: Activity,
        organizer: User,
        from: ActivityStatus,
        to: ActivityStatus,
    },
}

impl StateDelta {
    /// The activity the transition applied to.
    pub fn activity(&self) -> &Activity {
        match self {
            StateDelta::JoinRequested { activity, .. }
            | StateDelta::RequestWithdrawn { activity, .. }
            | StateDelta::Decided { activity, .. }
            | StateDelta::Left { activity, .. }
            | StateDelta::Removed { activity, .. }
            | StateDelta::ActivityCancelled { activity, .. }
            | StateDelta::ActivityUpdated { activity, .. }
            | StateDelta::StatusAdvanced { activity, .. } => activity,
        }
    }

    /// The user whose action produced the transition.
    pub fn actor(&self) -> &User {
        match self {
            StateDelta::JoinRequested { requester, .. }
            | StateDelta::RequestWithdrawn { requester, .. } => requester,
            StateDelta::Decided { organizer, .. }
            | StateDelta::Removed { organizer, .. }
            | StateDelta::ActivityCancelled { organizer, .. }
            | StateDelta::ActivityUpdated { organizer, .. }
            | StateDelta::StatusAdvanced { organizer, .. } => organizer,
            StateDelta::Left { participant, .. } => participant,
        }
    }
}
