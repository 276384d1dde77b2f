//! Notification dispatch.
//!
//! Persists each draft first, then attempts a push. The store write is the
//! durable part; a failed or impossible push never fails the operation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{DeliveryError, StateError};
use crate::models::{Alert, AlertDraft};
use crate::stores::{AlertStore, DeviceTokenStore};

/// Push transport collaborator.
#[async_trait]
pub trait PushService: Send + Sync {
    async fn send(&self, device_token: &str, alert: &Alert) -> Result<(), DeliveryError>;
}

/// What happened to the push attempt for one alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Delivered,
    /// The recipient has no registered device token.
    NoDevice,
    /// The transport failed; the alert is stored regardless.
    Failed(String),
    /// The alert coalesced with an existing one; no push was attempted.
    Skipped,
}

/// The stored alert together with its push outcome.
#[derive(Debug, Clone)]
pub struct DeliveryResult {
    pub alert: Alert,
    pub coalesced: bool,
    pub push: PushOutcome,
}

pub struct NotificationDispatcher {
    alerts: Arc<dyn AlertStore>,
    device_tokens: Arc<dyn DeviceTokenStore>,
    push: Arc<dyn PushService>,
}

impl NotificationDispatcher {
    pub fn new(
        alerts: Arc<dyn AlertStore>,
        device_tokens: Arc<dyn DeviceTokenStore>,
        push: Arc<dyn PushService>,
    ) -> Self {
        Self {
            alerts,
            device_tokens,
            push,
        }
    }

    /// Stores the draft and pushes it to the recipient's device.
    ///
    /// Only the store write can fail the call. Coalesced drafts skip the
    /// push so a burst of identical events rings the device once.
    pub async fn deliver(&self, draft: AlertDraft) -> Result<DeliveryResult, StateError> {
        let outcome = self.alerts.append(draft, Utc::now()).await?;
        let coalesced = outcome.is_coalesced();
        let alert = outcome.alert().clone();

        if coalesced {
            tracing::debug!(alert_id = %alert.id, user_id = %alert.user_id, "Alert coalesced, push skipped");
            return Ok(DeliveryResult {
                alert,
                coalesced,
                push: PushOutcome::Skipped,
            });
        }

        let push = match self.device_tokens.find(alert.user_id).await? {
            Some(token) => match self.push.send(&token, &alert).await {
                Ok(()) => {
                    tracing::debug!(alert_id = %alert.id, user_id = %alert.user_id, "Push delivered");
                    PushOutcome::Delivered
                }
                Err(err) => {
                    tracing::warn!(
                        alert_id = %alert.id,
                        user_id = %alert.user_id,
                        error = %err,
                        "Push delivery failed, alert stored"
                    );
                    PushOutcome::Failed(err.to_string())
                }
            },
            None => PushOutcome::NoDevice,
        };

        Ok(DeliveryResult {
            alert,
            coalesced,
            push,
        })
    }
}

/// Mock push service for development and testing.
pub struct MockPushService {
    /// Whether to simulate transport failures.
    pub simulate_failure: bool,
    sent: std::sync::Mutex<Vec<(String, Alert)>>,
}

impl MockPushService {
    pub fn new() -> Self {
        Self {
            simulate_failure: false,
            sent: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// A transport whose every send fails.
    pub fn failing() -> Self {
        Self {
            simulate_failure: true,
            ..Self::new()
        }
    }

    /// The (device token, alert) pairs sent so far.
    pub fn sent(&self) -> Vec<(String, Alert)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl Default for MockPushService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PushService for MockPushService {
    async fn send(&self, device_token: &str, alert: &Alert) -> Result<(), DeliveryError> {
        if self.simulate_failure {
            return Err(DeliveryError::PushFailed("simulated failure".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((device_token.to_string(), alert.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AlertType;
    use crate::stores::memory::{InMemoryAlertStore, InMemoryDeviceTokenStore};
    use crate::stores::ListAlertsQuery;
    use uuid::Uuid;

    fn draft(recipient: Uuid) -> AlertDraft {
        AlertDraft {
            recipient_id: recipient,
            alert_type: AlertType::JoinRequest,
            message: "Ada Lovelace wants to join your activity: Morning run".into(),
            activity_id: Some(Uuid::new_v4()),
            activity_name: Some("Morning run".into()),
            sender: None,
            data: None,
        }
    }

    fn dispatcher(
        push: Arc<MockPushService>,
    ) -> (
        NotificationDispatcher,
        Arc<InMemoryAlertStore>,
        Arc<InMemoryDeviceTokenStore>,
    ) {
        let alerts = Arc::new(InMemoryAlertStore::new());
        let tokens = Arc::new(InMemoryDeviceTokenStore::new());
        (
            NotificationDispatcher::new(alerts.clone(), tokens.clone(), push),
            alerts,
            tokens,
        )
    }

    #[tokio::test]
    async fn test_stores_then_pushes() {
        let push = Arc::new(MockPushService::new());
        let (dispatcher, alerts, tokens) = dispatcher(push.clone());
        let recipient = Uuid::new_v4();
        tokens.register(recipient, "device-1".into()).await.unwrap();

        let result = dispatcher.deliver(draft(recipient)).await.unwrap();
        assert!(!result.coalesced);
        assert_eq!(result.push, PushOutcome::Delivered);

        let sent = push.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "device-1");
        assert_eq!(sent[0].1.id, result.alert.id);
        assert_eq!(alerts.unread_count(recipient).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_no_device_still_stores() {
        let push = Arc::new(MockPushService::new());
        let (dispatcher, alerts, _tokens) = dispatcher(push.clone());
        let recipient = Uuid::new_v4();

        let result = dispatcher.deliver(draft(recipient)).await.unwrap();
        assert_eq!(result.push, PushOutcome::NoDevice);
        assert_eq!(push.sent_count(), 0);
        assert_eq!(alerts.unread_count(recipient).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_push_failure_is_not_fatal() {
        let push = Arc::new(MockPushService::failing());
        let (dispatcher, alerts, tokens) = dispatcher(push.clone());
        let recipient = Uuid::new_v4();
        tokens.register(recipient, "device-1".into()).await.unwrap();

        let result = dispatcher.deliver(draft(recipient)).await.unwrap();
        assert!(matches!(result.push, PushOutcome::Failed(_)));
        // The alert survived the failed push.
        let page = alerts
            .list_for(recipient, ListAlertsQuery::default())
            .await
            .unwrap();
        assert_eq!(page.alerts.len(), 1);
    }

    #[tokio::test]
    async fn test_coalesced_alert_skips_push() {
        let push = Arc::new(MockPushService::new());
        let (dispatcher, alerts, tokens) = dispatcher(push.clone());
        let recipient = Uuid::new_v4();
        tokens.register(recipient, "device-1".into()).await.unwrap();

        let draft = draft(recipient);
        let first = dispatcher.deliver(draft.clone()).await.unwrap();
        let second = dispatcher.deliver(draft).await.unwrap();

        assert!(!first.coalesced);
        assert!(second.coalesced);
        assert_eq!(second.push, PushOutcome::Skipped);
        assert_eq!(second.alert.id, first.alert.id);
        assert_eq!(push.sent_count(), 1);
        assert_eq!(alerts.unread_count(recipient).await.unwrap(), 1);
    }
}
