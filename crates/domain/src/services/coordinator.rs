//! Activity coordinator.
//!
//! The engine's front door: applies a transition through the lifecycle,
//! derives the alert drafts for the resulting delta, and dispatches each
//! one. The transition commits before any alert work starts, so alert or
//! push failures never roll it back.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::StateError;
use crate::models::{
    Activity, ActivityStatus, ActivityUpdate, AlertType, CreateActivityRequest, Decision,
    StateDelta, User,
};
use crate::stores::AlertStore;

use super::dispatch::{DeliveryResult, NotificationDispatcher};
use super::generator::alerts_for_delta;
use super::lifecycle::ActivityLifecycle;

/// An accepted transition and the deliveries it produced.
#[derive(Debug)]
pub struct MutationOutcome {
    pub delta: StateDelta,
    pub deliveries: Vec<DeliveryResult>,
}

pub struct ActivityCoordinator {
    lifecycle: ActivityLifecycle,
    dispatcher: NotificationDispatcher,
    alerts: Arc<dyn AlertStore>,
}

impl ActivityCoordinator {
    pub fn new(
        lifecycle: ActivityLifecycle,
        dispatcher: NotificationDispatcher,
        alerts: Arc<dyn AlertStore>,
    ) -> Self {
        Self {
            lifecycle,
            dispatcher,
            alerts,
        }
    }

    pub async fn create_activity(
        &self,
        owner: &User,
        request: CreateActivityRequest,
    ) -> Result<Activity, StateError> {
        self.lifecycle.create_activity(owner, request).await
    }

    pub async fn transition_activity(
        &self,
        activity_id: Uuid,
        organizer: &User,
        to: ActivityStatus,
    ) -> Result<MutationOutcome, StateError> {
        let delta = self
            .lifecycle
            .transition_activity(activity_id, organizer, to)
            .await?;
        Ok(self.fan_out(delta).await)
    }

    pub async fn request_join(
        &self,
        activity_id: Uuid,
        requester: &User,
    ) -> Result<MutationOutcome, StateError> {
        let delta = self.lifecycle.request_join(activity_id, requester).await?;
        Ok(self.fan_out(delta).await)
    }

    /// Withdraws a pending request and retracts the organizer's pending
    /// join-request alert.
    pub async fn cancel_request(
        &self,
        activity_id: Uuid,
        requester: &User,
    ) -> Result<MutationOutcome, StateError> {
        let delta = self.lifecycle.cancel_request(activity_id, requester).await?;

        let activity = delta.activity();
        match self
            .alerts
            .delete_matching(
                activity.owner_id,
                AlertType::JoinRequest,
                activity.id,
                requester.id,
            )
            .await
        {
            Ok(deleted) => {
                if deleted {
                    tracing::debug!(
                        activity_id = %activity.id,
                        user_id = %requester.id,
                        "Retracted join request alert"
                    );
                }
            }
            Err(err) => {
                tracing::warn!(
                    activity_id = %activity.id,
                    error = %err,
                    "Failed to retract join request alert"
                );
            }
        }

        Ok(self.fan_out(delta).await)
    }

    pub async fn decide(
        &self,
        activity_id: Uuid,
        participant_id: Uuid,
        organizer: &User,
        decision: Decision,
    ) -> Result<MutationOutcome, StateError> {
        let delta = self
            .lifecycle
            .decide(activity_id, participant_id, organizer, decision)
            .await?;
        Ok(self.fan_out(delta).await)
    }

    pub async fn leave(
        &self,
        activity_id: Uuid,
        participant: &User,
    ) -> Result<MutationOutcome, StateError> {
        let delta = self.lifecycle.leave(activity_id, participant).await?;
        Ok(self.fan_out(delta).await)
    }

    pub async fn remove(
        &self,
        activity_id: Uuid,
        participant_id: Uuid,
        organizer: &User,
    ) -> Result<MutationOutcome, StateError> {
        let delta = self
            .lifecycle
            .remove(activity_id, participant_id, organizer)
            .await?;
        Ok(self.fan_out(delta).await)
    }

    pub async fn cancel_activity(
        &self,
        activity_id: Uuid,
        organizer: &User,
    ) -> Result<MutationOutcome, StateError> {
        let delta = self.lifecycle.cancel_activity(activity_id, organizer).await?;
        Ok(self.fan_out(delta).await)
    }

    pub async fn update_activity(
        &self,
        activity_id: Uuid,
        organizer: &User,
        update: ActivityUpdate,
    ) -> Result<MutationOutcome, StateError> {
        let delta = self
            .lifecycle
            .update_activity(activity_id, organizer, update)
            .await?;
        Ok(self.fan_out(delta).await)
    }

    /// Dispatches the alerts for a committed delta, one recipient at a
    /// time in draft order. Delivery failures are logged and dropped; the
    /// delta already committed.
    async fn fan_out(&self, delta: StateDelta) -> MutationOutcome {
        let mut deliveries = Vec::new();
        for draft in alerts_for_delta(&delta) {
            let recipient = draft.recipient_id;
            match self.dispatcher.deliver(draft).await {
                Ok(result) => deliveries.push(result),
                Err(err) => {
                    tracing::error!(
                        activity_id = %delta.activity().id,
                        user_id = %recipient,
                        error = %err,
                        "Alert delivery failed after committed transition"
                    );
                }
            }
        }
        MutationOutcome { delta, deliveries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::dispatch::{MockPushService, PushOutcome};
    use crate::stores::memory::{
        InMemoryActivityStore, InMemoryAlertStore, InMemoryDeviceTokenStore,
        InMemoryParticipationStore,
    };
    use crate::stores::{DeviceTokenStore, ListAlertsQuery};

    struct Harness {
        coordinator: Arc<ActivityCoordinator>,
        alerts: Arc<InMemoryAlertStore>,
        tokens: Arc<InMemoryDeviceTokenStore>,
        push: Arc<MockPushService>,
    }

    fn harness() -> Harness {
        let activities = Arc::new(InMemoryActivityStore::new());
        let participations = Arc::new(InMemoryParticipationStore::new());
        let alerts = Arc::new(InMemoryAlertStore::new());
        let tokens = Arc::new(InMemoryDeviceTokenStore::new());
        let push = Arc::new(MockPushService::new());

        let lifecycle = ActivityLifecycle::new(activities, participations);
        let dispatcher =
            NotificationDispatcher::new(alerts.clone(), tokens.clone(), push.clone());
        Harness {
            coordinator: Arc::new(ActivityCoordinator::new(
                lifecycle,
                dispatcher,
                alerts.clone(),
            )),
            alerts,
            tokens,
            push,
        }
    }

    fn user(name: &str) -> User {
        User::new(Uuid::new_v4(), name)
    }

    async fn open_activity(h: &Harness, owner: &User, capacity: Option<i32>) -> Activity {
        let activity = h
            .coordinator
            .create_activity(
                owner,
                CreateActivityRequest {
                    name: "Morning run".into(),
                    capacity,
                },
            )
            .await
            .unwrap();
        h.coordinator
            .transition_activity(activity.id, owner, ActivityStatus::Open)
            .await
            .unwrap();
        activity
    }

    async fn feed(h: &Harness, user_id: Uuid) -> Vec<crate::models::Alert> {
        h.alerts
            .list_for(user_id, ListAlertsQuery::default())
            .await
            .unwrap()
            .alerts
    }

    #[tokio::test]
    async fn test_capacity_one_race_for_last_seat() {
        // A and B both request a one-seat activity. A is approved, B's
        // approval fails, and a rejection for B still goes through.
        let h = harness();
        let owner = user("Owner");
        let a = user("A");
        let b = user("B");
        let activity = open_activity(&h, &owner, Some(1)).await;

        h.coordinator.request_join(activity.id, &a).await.unwrap();
        h.coordinator.request_join(activity.id, &b).await.unwrap();

        h.coordinator
            .decide(activity.id, a.id, &owner, Decision::Approved)
            .await
            .unwrap();
        let full = h
            .coordinator
            .decide(activity.id, b.id, &owner, Decision::Approved)
            .await;
        assert!(matches!(full, Err(StateError::CapacityExceeded)));

        // The failed approval produced no alert for B.
        assert!(feed(&h, b.id).await.is_empty());

        h.coordinator
            .decide(activity.id, b.id, &owner, Decision::Rejected)
            .await
            .unwrap();

        let a_feed = feed(&h, a.id).await;
        assert_eq!(a_feed.len(), 1);
        assert_eq!(a_feed[0].alert_type, AlertType::RequestApproved);
        assert_eq!(
            a_feed[0].message,
            "Your request to join Morning run was approved"
        );

        let b_feed = feed(&h, b.id).await;
        assert_eq!(b_feed.len(), 1);
        assert_eq!(b_feed[0].alert_type, AlertType::RequestRejected);
    }

    #[tokio::test]
    async fn test_concurrent_decides_have_exactly_one_winner() {
        let h = harness();
        let owner = user("Owner");
        let requester = user("Requester");
        let activity = open_activity(&h, &owner, None).await;
        h.coordinator
            .request_join(activity.id, &requester)
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let coordinator = h.coordinator.clone();
            let owner = owner.clone();
            let activity_id = activity.id;
            let participant_id = requester.id;
            handles.push(tokio::spawn(async move {
                coordinator
                    .decide(activity_id, participant_id, &owner, Decision::Approved)
                    .await
            }));
        }

        let mut wins = 0;
        let mut losses = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(StateError::InvalidTransition(_)) => losses += 1,
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(losses, 7);

        // Exactly one approval alert reached the requester.
        let alerts = feed(&h, requester.id).await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::RequestApproved);
    }

    #[tokio::test]
    async fn test_join_request_alert_reaches_organizer_device() {
        let h = harness();
        let owner = user("Grace Hopper");
        let requester = user("Ada Lovelace");
        let activity = open_activity(&h, &owner, None).await;
        h.tokens
            .register(owner.id, "owner-device".into())
            .await
            .unwrap();

        let outcome = h
            .coordinator
            .request_join(activity.id, &requester)
            .await
            .unwrap();
        assert_eq!(outcome.deliveries.len(), 1);
        assert_eq!(outcome.deliveries[0].push, PushOutcome::Delivered);

        let sent = h.push.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "owner-device");
        assert_eq!(
            sent[0].1.message,
            "Ada Lovelace wants to join your activity: Morning run"
        );
    }

    #[tokio::test]
    async fn test_cancellation_fans_out_to_each_approved_participant() {
        let h = harness();
        let owner = user("Owner");
        let activity = open_activity(&h, &owner, None).await;

        let mut participants = Vec::new();
        for name in ["A", "B", "C"] {
            let p = user(name);
            h.coordinator.request_join(activity.id, &p).await.unwrap();
            h.coordinator
                .decide(activity.id, p.id, &owner, Decision::Approved)
                .await
                .unwrap();
            participants.push(p);
        }

        let outcome = h
            .coordinator
            .cancel_activity(activity.id, &owner)
            .await
            .unwrap();
        assert_eq!(outcome.deliveries.len(), 3);

        for p in &participants {
            let alerts = feed(&h, p.id).await;
            let cancelled: Vec<_> = alerts
                .iter()
                .filter(|a| a.alert_type == AlertType::ActivityCancelled)
                .collect();
            assert_eq!(cancelled.len(), 1);
            assert_eq!(
                cancelled[0].message,
                "Activity 'Morning run' has been cancelled by the organizer"
            );
        }
    }

    #[tokio::test]
    async fn test_rapid_updates_coalesce_per_recipient() {
        let h = harness();
        let owner = user("Owner");
        let participant = user("Participant");
        let activity = open_activity(&h, &owner, None).await;
        h.coordinator
            .request_join(activity.id, &participant)
            .await
            .unwrap();
        h.coordinator
            .decide(activity.id, participant.id, &owner, Decision::Approved)
            .await
            .unwrap();

        let first = h
            .coordinator
            .update_activity(
                activity.id,
                &owner,
                ActivityUpdate {
                    name: Some("Evening run".into()),
                    capacity: None,
                },
            )
            .await
            .unwrap();
        let second = h
            .coordinator
            .update_activity(
                activity.id,
                &owner,
                ActivityUpdate {
                    name: Some("Night run".into()),
                    capacity: None,
                },
            )
            .await
            .unwrap();

        assert!(!first.deliveries[0].coalesced);
        assert!(second.deliveries[0].coalesced);

        let updated: Vec<_> = feed(&h, participant.id)
            .await
            .into_iter()
            .filter(|a| a.alert_type == AlertType::ActivityUpdated)
            .collect();
        assert_eq!(updated.len(), 1);
    }

    #[tokio::test]
    async fn test_noop_update_stays_silent() {
        let h = harness();
        let owner = user("Owner");
        let participant = user("Participant");
        let activity = open_activity(&h, &owner, None).await;
        h.coordinator
            .request_join(activity.id, &participant)
            .await
            .unwrap();
        h.coordinator
            .decide(activity.id, participant.id, &owner, Decision::Approved)
            .await
            .unwrap();

        let outcome = h
            .coordinator
            .update_activity(
                activity.id,
                &owner,
                ActivityUpdate {
                    name: Some("Morning run".into()),
                    capacity: None,
                },
            )
            .await
            .unwrap();
        assert!(outcome.deliveries.is_empty());
        assert!(feed(&h, participant.id)
            .await
            .iter()
            .all(|a| a.alert_type != AlertType::ActivityUpdated));
    }

    #[tokio::test]
    async fn test_withdrawal_retracts_the_pending_alert() {
        let h = harness();
        let owner = user("Owner");
        let requester = user("Requester");
        let activity = open_activity(&h, &owner, None).await;

        h.coordinator
            .request_join(activity.id, &requester)
            .await
            .unwrap();
        assert_eq!(feed(&h, owner.id).await.len(), 1);

        let outcome = h
            .coordinator
            .cancel_request(activity.id, &requester)
            .await
            .unwrap();
        // Withdrawals themselves are silent.
        assert!(outcome.deliveries.is_empty());
        assert!(feed(&h, owner.id).await.is_empty());
    }

    #[tokio::test]
    async fn test_rerequest_after_rejection_does_not_renotify() {
        let h = harness();
        let owner = user("Owner");
        let requester = user("Requester");
        let activity = open_activity(&h, &owner, None).await;

        h.coordinator
            .request_join(activity.id, &requester)
            .await
            .unwrap();
        h.coordinator
            .decide(activity.id, requester.id, &owner, Decision::Rejected)
            .await
            .unwrap();

        let outcome = h
            .coordinator
            .request_join(activity.id, &requester)
            .await
            .unwrap();
        assert!(outcome.deliveries.is_empty());
        // Only the original join request alert exists for the organizer.
        assert_eq!(feed(&h, owner.id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_leave_alerts_the_organizer_and_removal_is_silent() {
        let h = harness();
        let owner = user("Owner");
        let leaver = user("Leaver");
        let removed = user("Removed");
        let activity = open_activity(&h, &owner, None).await;

        for p in [&leaver, &removed] {
            h.coordinator.request_join(activity.id, p).await.unwrap();
            h.coordinator
                .decide(activity.id, p.id, &owner, Decision::Approved)
                .await
                .unwrap();
        }

        h.coordinator.leave(activity.id, &leaver).await.unwrap();
        let removal = h
            .coordinator
            .remove(activity.id, removed.id, &owner)
            .await
            .unwrap();
        assert!(removal.deliveries.is_empty());

        let owner_feed = feed(&h, owner.id).await;
        let left: Vec<_> = owner_feed
            .iter()
            .filter(|a| a.alert_type == AlertType::UserLeft)
            .collect();
        assert_eq!(left.len(), 1);
        assert_eq!(
            left[0].message,
            "Leaver has left your activity: Morning run"
        );
        // No alert of any kind went to the removed participant.
        assert!(feed(&h, removed.id).await.is_empty());
    }
}
