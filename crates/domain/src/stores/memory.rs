//! In-memory store implementations for development and testing.
//!
//! Semantics match the PostgreSQL implementations: participation
//! transitions are serialized per row (a single lock here), and the
//! capacity check runs against the live approved count inside the same
//! critical section.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::error::StateError;
use crate::models::{
    Activity, ActivityStatus, ActivityUpdate, Alert, AlertDraft, AlertType, Decision,
    Participation, ParticipationStatus, User,
};

use super::{
    default_coalesce_window, ActivityStore, AlertPage, AlertStore, AppendOutcome,
    DeviceTokenStore, ListAlertsQuery, ParticipationStore, UpdateOutcome, UserStore,
};

/// In-memory [`ActivityStore`].
#[derive(Default)]
pub struct InMemoryActivityStore {
    activities: RwLock<HashMap<Uuid, Activity>>,
}

impl InMemoryActivityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ActivityStore for InMemoryActivityStore {
    async fn insert(&self, activity: Activity) -> Result<Activity, StateError> {
        let mut activities = self.activities.write().unwrap();
        activities.insert(activity.id, activity.clone());
        Ok(activity)
    }

    async fn get(&self, id: Uuid) -> Result<Activity, StateError> {
        self.activities
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| StateError::NotFound(format!("activity {}", id)))
    }

    async fn set_status(
        &self,
        id: Uuid,
        from: ActivityStatus,
        to: ActivityStatus,
    ) -> Result<Activity, StateError> {
        let mut activities = self.activities.write().unwrap();
        let activity = activities
            .get_mut(&id)
            .ok_or_else(|| StateError::NotFound(format!("activity {}", id)))?;
        if activity.status != from {
            return Err(StateError::InvalidTransition(format!(
                "activity is {}, expected {}",
                activity.status, from
            )));
        }
        activity.status = to;
        Ok(activity.clone())
    }

    async fn apply_update(
        &self,
        id: Uuid,
        update: ActivityUpdate,
    ) -> Result<UpdateOutcome, StateError> {
        let mut activities = self.activities.write().unwrap();
        let activity = activities
            .get_mut(&id)
            .ok_or_else(|| StateError::NotFound(format!("activity {}", id)))?;
        let changed = update.apply(activity);
        Ok(UpdateOutcome {
            activity: activity.clone(),
            revision_changed: !changed.is_empty(),
            update_details: changed.join(", "),
        })
    }
}

/// In-memory [`ParticipationStore`]. The single mutex doubles as the
/// per-row serialization the contract requires.
#[derive(Default)]
pub struct InMemoryParticipationStore {
    rows: Mutex<Vec<Participation>>,
}

impl InMemoryParticipationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ParticipationStore for InMemoryParticipationStore {
    async fn upsert_requested(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(Participation, Option<ParticipationStatus>), StateError> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows
            .iter_mut()
            .find(|r| r.activity_id == activity_id && r.user_id == user_id)
        {
            if row.status.is_live() {
                return Err(StateError::InvalidTransition(format!(
                    "participation is already {}",
                    row.status
                )));
            }
            let previous = row.status;
            *row = Participation::requested(activity_id, user_id, now);
            return Ok((row.clone(), Some(previous)));
        }

        let row = Participation::requested(activity_id, user_id, now);
        rows.push(row.clone());
        Ok((row, None))
    }

    async fn get(&self, activity_id: Uuid, user_id: Uuid) -> Result<Participation, StateError> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.activity_id == activity_id && r.user_id == user_id)
            .cloned()
            .ok_or_else(|| StateError::NotFound("participation".into()))
    }

    async fn decide(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
        decision: Decision,
        decided_by: Uuid,
        capacity: Option<i32>,
        now: DateTime<Utc>,
    ) -> Result<Participation, StateError> {
        let mut rows = self.rows.lock().unwrap();

        // Capacity check and the status flip happen under one lock, so the
        // approved count can never go stale between them.
        if decision == Decision::Approved {
            if let Some(capacity) = capacity {
                let approved = rows
                    .iter()
                    .filter(|r| {
                        r.activity_id == activity_id
                            && r.status == ParticipationStatus::Approved
                    })
                    .count();
                if approved as i32 >= capacity {
                    return Err(StateError::CapacityExceeded);
                }
            }
        }

        let row = rows
            .iter_mut()
            .find(|r| r.activity_id == activity_id && r.user_id == user_id)
            .ok_or_else(|| StateError::NotFound("participation".into()))?;
        if row.status != ParticipationStatus::Requested {
            return Err(StateError::InvalidTransition(format!(
                "participation is {}, expected requested",
                row.status
            )));
        }
        row.status = decision.resulting_status();
        row.decided_at = Some(now);
        row.decided_by = Some(decided_by);
        Ok(row.clone())
    }

    async fn conclude(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
        to: ParticipationStatus,
        now: DateTime<Utc>,
    ) -> Result<Participation, StateError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|r| r.activity_id == activity_id && r.user_id == user_id)
            .ok_or_else(|| StateError::NotFound("participation".into()))?;
        if row.status != ParticipationStatus::Approved {
            return Err(StateError::InvalidTransition(format!(
                "participation is {}, expected approved",
                row.status
            )));
        }
        row.status = to;
        row.decided_at = Some(now);
        Ok(row.clone())
    }

    async fn withdraw(&self, activity_id: Uuid, user_id: Uuid) -> Result<(), StateError> {
        let mut rows = self.rows.lock().unwrap();
        let pos = rows
            .iter()
            .position(|r| {
                r.activity_id == activity_id
                    && r.user_id == user_id
                    && r.status == ParticipationStatus::Requested
            })
            .ok_or_else(|| StateError::NotFound("pending join request".into()))?;
        rows.remove(pos);
        Ok(())
    }

    async fn approved_user_ids(&self, activity_id: Uuid) -> Result<Vec<Uuid>, StateError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| {
                r.activity_id == activity_id && r.status == ParticipationStatus::Approved
            })
            .map(|r| r.user_id)
            .collect())
    }
}

/// In-memory [`AlertStore`], chronological storage with newest-first reads.
pub struct InMemoryAlertStore {
    alerts: Mutex<Vec<Alert>>,
    coalesce_window: Duration,
}

impl Default for InMemoryAlertStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAlertStore {
    pub fn new() -> Self {
        Self::with_coalesce_window(default_coalesce_window())
    }

    pub fn with_coalesce_window(coalesce_window: Duration) -> Self {
        Self {
            alerts: Mutex::new(Vec::new()),
            coalesce_window,
        }
    }
}

#[async_trait]
impl AlertStore for InMemoryAlertStore {
    async fn append(
        &self,
        draft: AlertDraft,
        now: DateTime<Utc>,
    ) -> Result<AppendOutcome, StateError> {
        let mut alerts = self.alerts.lock().unwrap();

        let cutoff = now - self.coalesce_window;
        if let Some(existing) = alerts
            .iter()
            .rev()
            .find(|a| a.dedup_key() == draft.dedup_key() && a.created_at >= cutoff)
        {
            return Ok(AppendOutcome::Coalesced(existing.clone()));
        }

        let alert = Alert::from_draft(draft, Uuid::new_v4(), now);
        alerts.push(alert.clone());
        Ok(AppendOutcome::Stored(alert))
    }

    async fn mark_read(&self, user_id: Uuid, alert_id: Uuid) -> Result<Alert, StateError> {
        let mut alerts = self.alerts.lock().unwrap();
        let alert = alerts
            .iter_mut()
            .find(|a| a.id == alert_id && a.user_id == user_id)
            .ok_or_else(|| StateError::NotFound(format!("alert {}", alert_id)))?;
        alert.read = true;
        Ok(alert.clone())
    }

    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, StateError> {
        let mut alerts = self.alerts.lock().unwrap();
        let mut count = 0;
        for alert in alerts.iter_mut().filter(|a| a.user_id == user_id && !a.read) {
            alert.read = true;
            count += 1;
        }
        Ok(count)
    }

    async fn list_for(
        &self,
        user_id: Uuid,
        query: ListAlertsQuery,
    ) -> Result<AlertPage, StateError> {
        let alerts = self.alerts.lock().unwrap();

        // Storage is chronological; reading walks it backwards.
        let mut feed: Vec<&Alert> = alerts
            .iter()
            .rev()
            .filter(|a| a.user_id == user_id && (!query.unread_only || !a.read))
            .collect();

        if let Some(cursor) = &query.cursor {
            let (ts, id) = shared::pagination::decode_cursor(cursor)
                .map_err(|e| StateError::NotFound(format!("cursor: {}", e)))?;
            feed.retain(|a| a.created_at < ts || (a.created_at == ts && a.id < id));
        }

        let limit = query.limit.max(1) as usize;
        let has_more = feed.len() > limit;
        feed.truncate(limit);

        let next_cursor = if has_more {
            feed.last()
                .map(|a| shared::pagination::encode_cursor(a.created_at, a.id))
        } else {
            None
        };

        Ok(AlertPage {
            alerts: feed.into_iter().cloned().collect(),
            next_cursor,
        })
    }

    async fn unread_count(&self, user_id: Uuid) -> Result<i64, StateError> {
        Ok(self
            .alerts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.user_id == user_id && !a.read)
            .count() as i64)
    }

    async fn delete(&self, user_id: Uuid, alert_id: Uuid) -> Result<(), StateError> {
        let mut alerts = self.alerts.lock().unwrap();
        let pos = alerts
            .iter()
            .position(|a| a.id == alert_id && a.user_id == user_id)
            .ok_or_else(|| StateError::NotFound(format!("alert {}", alert_id)))?;
        alerts.remove(pos);
        Ok(())
    }

    async fn delete_all_for(&self, user_id: Uuid) -> Result<u64, StateError> {
        let mut alerts = self.alerts.lock().unwrap();
        let before = alerts.len();
        alerts.retain(|a| a.user_id != user_id);
        Ok((before - alerts.len()) as u64)
    }

    async fn delete_matching(
        &self,
        user_id: Uuid,
        alert_type: AlertType,
        activity_id: Uuid,
        sender_id: Uuid,
    ) -> Result<bool, StateError> {
        let mut alerts = self.alerts.lock().unwrap();
        let pos = alerts.iter().rposition(|a| {
            a.user_id == user_id
                && a.alert_type == alert_type
                && a.activity_id == Some(activity_id)
                && a.sender_id == Some(sender_id)
        });
        match pos {
            Some(pos) => {
                alerts.remove(pos);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// In-memory [`DeviceTokenStore`].
#[derive(Default)]
pub struct InMemoryDeviceTokenStore {
    tokens: RwLock<HashMap<Uuid, String>>,
}

impl InMemoryDeviceTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeviceTokenStore for InMemoryDeviceTokenStore {
    async fn register(&self, user_id: Uuid, token: String) -> Result<(), StateError> {
        self.tokens.write().unwrap().insert(user_id, token);
        Ok(())
    }

    async fn find(&self, user_id: Uuid) -> Result<Option<String>, StateError> {
        Ok(self.tokens.read().unwrap().get(&user_id).cloned())
    }
}

/// In-memory [`UserStore`].
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn upsert(&self, user: User) -> Result<User, StateError> {
        self.users.write().unwrap().insert(user.id, user.clone());
        Ok(user)
    }

    async fn get(&self, id: Uuid) -> Result<User, StateError> {
        self.users
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| StateError::NotFound(format!("user {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::super::DEFAULT_COALESCE_WINDOW_SECS;
    use super::*;
    use crate::models::SenderInfo;

    fn draft_for(recipient: Uuid, activity: Uuid, sender: Uuid) -> AlertDraft {
        AlertDraft {
            recipient_id: recipient,
            alert_type: AlertType::ActivityUpdated,
            message: "Activity 'Run' has been updated: name".into(),
            activity_id: Some(activity),
            activity_name: Some("Run".into()),
            sender: Some(SenderInfo {
                id: sender,
                name: "Organizer".into(),
                profile_pic: None,
            }),
            data: None,
        }
    }

    #[tokio::test]
    async fn test_append_coalesces_within_window() {
        let store = InMemoryAlertStore::new();
        let (recipient, activity, sender) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let now = Utc::now();

        let first = store
            .append(draft_for(recipient, activity, sender), now)
            .await
            .unwrap();
        assert!(!first.is_coalesced());

        let second = store
            .append(
                draft_for(recipient, activity, sender),
                now + Duration::seconds(5),
            )
            .await
            .unwrap();
        assert!(second.is_coalesced());
        assert_eq!(second.alert().id, first.alert().id);
        assert_eq!(store.unread_count(recipient).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_append_stores_again_after_window() {
        let store = InMemoryAlertStore::new();
        let (recipient, activity, sender) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let now = Utc::now();

        store
            .append(draft_for(recipient, activity, sender), now)
            .await
            .unwrap();
        let later = store
            .append(
                draft_for(recipient, activity, sender),
                now + Duration::seconds(DEFAULT_COALESCE_WINDOW_SECS + 1),
            )
            .await
            .unwrap();
        assert!(!later.is_coalesced());
        assert_eq!(store.unread_count(recipient).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_mark_read_is_idempotent() {
        let store = InMemoryAlertStore::new();
        let recipient = Uuid::new_v4();
        let outcome = store
            .append(draft_for(recipient, Uuid::new_v4(), Uuid::new_v4()), Utc::now())
            .await
            .unwrap();
        let alert_id = outcome.alert().id;

        let first = store.mark_read(recipient, alert_id).await.unwrap();
        assert!(first.read);
        let second = store.mark_read(recipient, alert_id).await.unwrap();
        assert!(second.read);
        assert_eq!(store.unread_count(recipient).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mark_read_rejects_foreign_alert() {
        let store = InMemoryAlertStore::new();
        let recipient = Uuid::new_v4();
        let outcome = store
            .append(draft_for(recipient, Uuid::new_v4(), Uuid::new_v4()), Utc::now())
            .await
            .unwrap();

        let other_user = Uuid::new_v4();
        let result = store.mark_read(other_user, outcome.alert().id).await;
        assert!(matches!(result, Err(StateError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_pages_newest_first() {
        let store = InMemoryAlertStore::new();
        let recipient = Uuid::new_v4();
        let base = Utc::now();

        for i in 0..5 {
            // Distinct activities so nothing coalesces.
            store
                .append(
                    draft_for(recipient, Uuid::new_v4(), Uuid::new_v4()),
                    base + Duration::seconds(i),
                )
                .await
                .unwrap();
        }

        let page1 = store
            .list_for(
                recipient,
                ListAlertsQuery {
                    limit: 2,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(page1.alerts.len(), 2);
        assert!(page1.alerts[0].created_at > page1.alerts[1].created_at);
        let cursor = page1.next_cursor.expect("more pages expected");

        let page2 = store
            .list_for(
                recipient,
                ListAlertsQuery {
                    limit: 2,
                    cursor: Some(cursor),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(page2.alerts.len(), 2);
        assert!(page2.alerts[0].created_at < page1.alerts[1].created_at);

        let page3 = store
            .list_for(
                recipient,
                ListAlertsQuery {
                    limit: 2,
                    cursor: page2.next_cursor,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(page3.alerts.len(), 1);
        assert!(page3.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_unread_only_filter() {
        let store = InMemoryAlertStore::new();
        let recipient = Uuid::new_v4();
        let a = store
            .append(draft_for(recipient, Uuid::new_v4(), Uuid::new_v4()), Utc::now())
            .await
            .unwrap();
        store
            .append(draft_for(recipient, Uuid::new_v4(), Uuid::new_v4()), Utc::now())
            .await
            .unwrap();
        store.mark_read(recipient, a.alert().id).await.unwrap();

        let page = store
            .list_for(
                recipient,
                ListAlertsQuery {
                    unread_only: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(page.alerts.len(), 1);
        assert!(!page.alerts[0].read);
    }

    #[tokio::test]
    async fn test_delete_matching_removes_withdrawn_request_alert() {
        let store = InMemoryAlertStore::new();
        let (owner, activity, requester) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut draft = draft_for(owner, activity, requester);
        draft.alert_type = AlertType::JoinRequest;
        store.append(draft, Utc::now()).await.unwrap();

        let deleted = store
            .delete_matching(owner, AlertType::JoinRequest, activity, requester)
            .await
            .unwrap();
        assert!(deleted);
        assert_eq!(store.unread_count(owner).await.unwrap(), 0);

        let again = store
            .delete_matching(owner, AlertType::JoinRequest, activity, requester)
            .await
            .unwrap();
        assert!(!again);
    }

    #[tokio::test]
    async fn test_upsert_requested_rejects_duplicate_live_request() {
        let store = InMemoryParticipationStore::new();
        let (activity, user) = (Uuid::new_v4(), Uuid::new_v4());

        store
            .upsert_requested(activity, user, Utc::now())
            .await
            .unwrap();
        let dup = store.upsert_requested(activity, user, Utc::now()).await;
        assert!(matches!(dup, Err(StateError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn test_upsert_requested_resets_rejected_row() {
        let store = InMemoryParticipationStore::new();
        let (activity, user, organizer) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let now = Utc::now();

        store.upsert_requested(activity, user, now).await.unwrap();
        store
            .decide(activity, user, Decision::Rejected, organizer, None, now)
            .await
            .unwrap();

        let (row, previous) = store.upsert_requested(activity, user, now).await.unwrap();
        assert_eq!(row.status, ParticipationStatus::Requested);
        assert_eq!(previous, Some(ParticipationStatus::Rejected));
        assert!(row.decided_at.is_none());
    }

    #[tokio::test]
    async fn test_decide_requires_requested_status() {
        let store = InMemoryParticipationStore::new();
        let (activity, user, organizer) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let now = Utc::now();

        store.upsert_requested(activity, user, now).await.unwrap();
        store
            .decide(activity, user, Decision::Approved, organizer, None, now)
            .await
            .unwrap();

        let again = store
            .decide(activity, user, Decision::Rejected, organizer, None, now)
            .await;
        assert!(matches!(again, Err(StateError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn test_decide_enforces_capacity_against_live_count() {
        let store = InMemoryParticipationStore::new();
        let activity = Uuid::new_v4();
        let organizer = Uuid::new_v4();
        let now = Utc::now();

        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        store.upsert_requested(activity, first, now).await.unwrap();
        store.upsert_requested(activity, second, now).await.unwrap();

        store
            .decide(activity, first, Decision::Approved, organizer, Some(1), now)
            .await
            .unwrap();
        let full = store
            .decide(activity, second, Decision::Approved, organizer, Some(1), now)
            .await;
        assert!(matches!(full, Err(StateError::CapacityExceeded)));

        // Rejection is still possible when full.
        store
            .decide(activity, second, Decision::Rejected, organizer, Some(1), now)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_conclude_requires_approved() {
        let store = InMemoryParticipationStore::new();
        let (activity, user) = (Uuid::new_v4(), Uuid::new_v4());
        let now = Utc::now();

        store.upsert_requested(activity, user, now).await.unwrap();
        let premature = store
            .conclude(activity, user, ParticipationStatus::Left, now)
            .await;
        assert!(matches!(premature, Err(StateError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn test_set_status_compare_and_set() {
        let store = InMemoryActivityStore::new();
        let activity = Activity::new(Uuid::new_v4(), "Run", None);
        let id = activity.id;
        store.insert(activity).await.unwrap();

        store
            .set_status(id, ActivityStatus::Draft, ActivityStatus::Open)
            .await
            .unwrap();
        let stale = store
            .set_status(id, ActivityStatus::Draft, ActivityStatus::Open)
            .await;
        assert!(matches!(stale, Err(StateError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn test_device_token_latest_registration_wins() {
        let store = InMemoryDeviceTokenStore::new();
        let user = Uuid::new_v4();

        store.register(user, "tok-1".into()).await.unwrap();
        store.register(user, "tok-2".into()).await.unwrap();
        assert_eq!(store.find(user).await.unwrap().as_deref(), Some("tok-2"));
        assert_eq!(store.find(Uuid::new_v4()).await.unwrap(), None);
    }
}
