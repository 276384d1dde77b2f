//! Activity lifecycle service.
//!
//! Owns the transition rules for activities and their participations. Each
//! successful operation returns a [`StateDelta`]; the service never creates
//! alerts itself.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::StateError;
use crate::models::{
    Activity, ActivityStatus, ActivityUpdate, CreateActivityRequest, Decision, ParticipationStatus,
    StateDelta, User,
};
use crate::stores::{ActivityStore, ParticipationStore};

pub struct ActivityLifecycle {
    activities: Arc<dyn ActivityStore>,
    participations: Arc<dyn ParticipationStore>,
}

impl ActivityLifecycle {
    pub fn new(
        activities: Arc<dyn ActivityStore>,
        participations: Arc<dyn ParticipationStore>,
    ) -> Self {
        Self {
            activities,
            participations,
        }
    }

    /// Creates a draft activity owned by the caller.
    pub async fn create_activity(
        &self,
        owner: &User,
        request: CreateActivityRequest,
    ) -> Result<Activity, StateError> {
        let activity = Activity::new(owner.id, request.name, request.capacity);
        let activity = self.activities.insert(activity).await?;
        tracing::info!(activity_id = %activity.id, owner_id = %owner.id, "Activity created");
        Ok(activity)
    }

    /// Advances the activity along the forward chain (open, start,
    /// complete, cancel). Organizer only.
    pub async fn transition_activity(
        &self,
        activity_id: Uuid,
        organizer: &User,
        to: ActivityStatus,
    ) -> Result<StateDelta, StateError> {
        let activity = self.activities.get(activity_id).await?;
        require_owner(&activity, organizer)?;

        let from = activity.status;
        if !from.can_transition_to(to) {
            return Err(StateError::InvalidTransition(format!(
                "{} -> {} is not allowed",
                from, to
            )));
        }

        let activity = self.activities.set_status(activity_id, from, to).await?;
        tracing::info!(activity_id = %activity.id, %from, %to, "Activity status advanced");
        Ok(StateDelta::StatusAdvanced {
            activity,
            organizer: organizer.clone(),
            from,
            to,
        })
    }

    /// Requests to join an open activity. Capacity is not checked here;
    /// it is enforced against the live approved count at decision time.
    pub async fn request_join(
        &self,
        activity_id: Uuid,
        requester: &User,
    ) -> Result<StateDelta, StateError> {
        let activity = self.activities.get(activity_id).await?;
        if activity.is_owner(requester.id) {
            return Err(StateError::InvalidTransition(
                "you cannot join your own activity".into(),
            ));
        }
        if activity.status != ActivityStatus::Open {
            return Err(StateError::InvalidTransition(format!(
                "activity is {}, join requests need an open activity",
                activity.status
            )));
        }

        let (participation, previous_status) = self
            .participations
            .upsert_requested(activity_id, requester.id, Utc::now())
            .await?;
        tracing::info!(
            activity_id = %activity_id,
            user_id = %requester.id,
            rerequest = previous_status.is_some(),
            "Join requested"
        );
        Ok(StateDelta::JoinRequested {
            activity,
            requester: requester.clone(),
            participation,
            previous_status,
        })
    }

    /// Withdraws the caller's own pending join request.
    pub async fn cancel_request(
        &self,
        activity_id: Uuid,
        requester: &User,
    ) -> Result<StateDelta, StateError> {
        let activity = self.activities.get(activity_id).await?;
        self.participations
            .withdraw(activity_id, requester.id)
            .await?;
        tracing::info!(activity_id = %activity_id, user_id = %requester.id, "Join request withdrawn");
        Ok(StateDelta::RequestWithdrawn {
            activity,
            requester: requester.clone(),
        })
    }

    /// Approves or rejects a pending request. Organizer only; the store
    /// serializes concurrent decisions on the row and checks capacity
    /// transactionally.
    pub async fn decide(
        &self,
        activity_id: Uuid,
        participant_id: Uuid,
        organizer: &User,
        decision: Decision,
    ) -> Result<StateDelta, StateError> {
        let activity = self.activities.get(activity_id).await?;
        require_owner(&activity, organizer)?;

        let participation = self
            .participations
            .decide(
                activity_id,
                participant_id,
                decision,
                organizer.id,
                activity.capacity,
                Utc::now(),
            )
            .await?;
        tracing::info!(
            activity_id = %activity_id,
            user_id = %participant_id,
            decision = %participation.status,
            "Join request decided"
        );
        Ok(StateDelta::Decided {
            activity,
            organizer: organizer.clone(),
            participation,
            decision,
        })
    }

    /// An approved participant leaves on their own initiative.
    pub async fn leave(
        &self,
        activity_id: Uuid,
        participant: &User,
    ) -> Result<StateDelta, StateError> {
        let activity = self.activities.get(activity_id).await?;
        let participation = self
            .participations
            .conclude(
                activity_id,
                participant.id,
                ParticipationStatus::Left,
                Utc::now(),
            )
            .await?;
        tracing::info!(activity_id = %activity_id, user_id = %participant.id, "Participant left");
        Ok(StateDelta::Left {
            activity,
            participant: participant.clone(),
            participation,
        })
    }

    /// The organizer removes an approved participant.
    pub async fn remove(
        &self,
        activity_id: Uuid,
        participant_id: Uuid,
        organizer: &User,
    ) -> Result<StateDelta, StateError> {
        let activity = self.activities.get(activity_id).await?;
        require_owner(&activity, organizer)?;

        let participation = self
            .participations
            .conclude(
                activity_id,
                participant_id,
                ParticipationStatus::Removed,
                Utc::now(),
            )
            .await?;
        tracing::info!(activity_id = %activity_id, user_id = %participant_id, "Participant removed");
        Ok(StateDelta::Removed {
            activity,
            organizer: organizer.clone(),
            participation,
        })
    }

    /// Cancels the activity. Terminal; the delta snapshots the approved
    /// participants for the fan-out.
    pub async fn cancel_activity(
        &self,
        activity_id: Uuid,
        organizer: &User,
    ) -> Result<StateDelta, StateError> {
        let activity = self.activities.get(activity_id).await?;
        require_owner(&activity, organizer)?;

        let from = activity.status;
        if !from.can_transition_to(ActivityStatus::Cancelled) {
            return Err(StateError::InvalidTransition(format!(
                "activity is already {}",
                from
            )));
        }

        // Snapshot recipients before flipping the status so the fan-out
        // reflects the membership at cancellation time.
        let approved_participants = self.participations.approved_user_ids(activity_id).await?;
        let activity = self
            .activities
            .set_status(activity_id, from, ActivityStatus::Cancelled)
            .await?;
        tracing::info!(
            activity_id = %activity_id,
            recipients = approved_participants.len(),
            "Activity cancelled"
        );
        Ok(StateDelta::ActivityCancelled {
            activity,
            organizer: organizer.clone(),
            approved_participants,
        })
    }

    /// Updates mutable fields. Status is untouched; the revision bumps only
    /// when a field actually changed.
    pub async fn update_activity(
        &self,
        activity_id: Uuid,
        organizer: &User,
        update: ActivityUpdate,
    ) -> Result<StateDelta, StateError> {
        let activity = self.activities.get(activity_id).await?;
        require_owner(&activity, organizer)?;
        if activity.status.is_terminal() {
            return Err(StateError::InvalidTransition(format!(
                "activity is {}",
                activity.status
            )));
        }

        let outcome = self.activities.apply_update(activity_id, update).await?;
        let approved_participants = self.participations.approved_user_ids(activity_id).await?;
        tracing::info!(
            activity_id = %activity_id,
            revision_changed = outcome.revision_changed,
            fields = %outcome.update_details,
            "Activity updated"
        );
        Ok(StateDelta::ActivityUpdated {
            activity: outcome.activity,
            organizer: organizer.clone(),
            approved_participants,
            revision_changed: outcome.revision_changed,
            update_details: outcome.update_details,
        })
    }
}

fn require_owner(activity: &Activity, caller: &User) -> Result<(), StateError> {
    if activity.is_owner(caller.id) {
        Ok(())
    } else {
        Err(StateError::Unauthorized(
            "only the organizer can perform this operation".into(),
        ))
    }
}
