//! Alert domain models.
//!
//! The serialized [`Alert`] shape is the compatibility contract with
//! existing clients; field names and the RFC 3339 `created_at` must not
//! change. Alerts are immutable after creation except the `read` flag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Alert type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    JoinRequest,
    RequestApproved,
    RequestRejected,
    UserLeft,
    ActivityCancelled,
    ActivityUpdated,
    NewMessage,
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertType::JoinRequest => write!(f, "join_request"),
            AlertType::RequestApproved => write!(f, "request_approved"),
            AlertType::RequestRejected => write!(f, "request_rejected"),
            AlertType::UserLeft => write!(f, "user_left"),
            AlertType::ActivityCancelled => write!(f, "activity_cancelled"),
            AlertType::ActivityUpdated => write!(f, "activity_updated"),
            AlertType::NewMessage => write!(f, "new_message"),
        }
    }
}

/// Type-specific alert payload. A tagged union rather than a free-form bag
/// so each alert type has a known schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AlertData {
    JoinRequest {
        requester_id: Uuid,
        requester_name: String,
    },
    ActivityUpdated {
        update_details: String,
    },
    NewMessage {
        message_id: Uuid,
        preview: String,
    },
}

/// The user who triggered an alert, denormalized for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SenderInfo {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_pic: Option<String>,
}

/// An alert before the store assigns its identity and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertDraft {
    pub recipient_id: Uuid,
    pub alert_type: AlertType,
    pub message: String,
    pub activity_id: Option<Uuid>,
    pub activity_name: Option<String>,
    pub sender: Option<SenderInfo>,
    pub data: Option<AlertData>,
}

impl AlertDraft {
    /// Coalescing key: a second draft with the same key inside the
    /// coalescing window returns the existing record instead of storing a
    /// duplicate.
    pub fn dedup_key(&self) -> (Uuid, AlertType, Option<Uuid>, Option<Uuid>) {
        (
            self.recipient_id,
            self.alert_type,
            self.activity_id,
            self.sender.as_ref().map(|s| s.id),
        )
    }
}

/// A stored alert in its wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Alert {
    pub id: Uuid,
    /// The recipient.
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_profile_pic: Option<String>,
    pub created_at: DateTime<Utc>,
    pub read: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<AlertData>,
}

impl Alert {
    /// Materializes a draft with a store-assigned identity and timestamp.
    pub fn from_draft(draft: AlertDraft, id: Uuid, created_at: DateTime<Utc>) -> Self {
        let (sender_id, sender_name, sender_profile_pic) = match draft.sender {
            Some(s) => (Some(s.id), Some(s.name), s.profile_pic),
            None => (None, None, None),
        };
        Self {
            id,
            user_id: draft.recipient_id,
            alert_type: draft.alert_type,
            message: draft.message,
            activity_id: draft.activity_id,
            activity_name: draft.activity_name,
            sender_id,
            sender_name,
            sender_profile_pic,
            created_at,
            read: false,
            data: draft.data,
        }
    }

    pub fn dedup_key(&self) -> (Uuid, AlertType, Option<Uuid>, Option<Uuid>) {
        (self.user_id, self.alert_type, self.activity_id, self.sender_id)
    }
}
