//! Alert entity (database row mapping).
//!
//! The `data` column is JSONB; deserialization failures surface as
//! storage errors rather than silently dropping the payload.

use chrono::{DateTime, Utc};
use domain::models::{Alert, AlertData, AlertType};
use sqlx::FromRow;
use uuid::Uuid;

/// Database enum for alert type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "alert_type", rename_all = "snake_case")]
pub enum AlertTypeDb {
    JoinRequest,
    RequestApproved,
    RequestRejected,
    UserLeft,
    ActivityCancelled,
    ActivityUpdated,
    NewMessage,
}

impl From<AlertType> for AlertTypeDb {
    fn from(alert_type: AlertType) -> Self {
        match alert_type {
            AlertType::JoinRequest => AlertTypeDb::JoinRequest,
            AlertType::RequestApproved => AlertTypeDb::RequestApproved,
            AlertType::RequestRejected => AlertTypeDb::RequestRejected,
            AlertType::UserLeft => AlertTypeDb::UserLeft,
            AlertType::ActivityCancelled => AlertTypeDb::ActivityCancelled,
            AlertType::ActivityUpdated => AlertTypeDb::ActivityUpdated,
            AlertType::NewMessage => AlertTypeDb::NewMessage,
        }
    }
}

impl From<AlertTypeDb> for AlertType {
    fn from(alert_type: AlertTypeDb) -> Self {
        match alert_type {
            AlertTypeDb::JoinRequest => AlertType::JoinRequest,
            AlertTypeDb::RequestApproved => AlertType::RequestApproved,
            AlertTypeDb::RequestRejected => AlertType::RequestRejected,
            AlertTypeDb::UserLeft => AlertType::UserLeft,
            AlertTypeDb::ActivityCancelled => AlertType::ActivityCancelled,
            AlertTypeDb::ActivityUpdated => AlertType::ActivityUpdated,
            AlertTypeDb::NewMessage => AlertType::NewMessage,
        }
    }
}

/// Database row mapping for the alerts table.
#[derive(Debug, Clone, FromRow)]
pub struct AlertEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub alert_type: AlertTypeDb,
    pub message: String,
    pub activity_id: Option<Uuid>,
    pub activity_name: Option<String>,
    pub sender_id: Option<Uuid>,
    pub sender_name: Option<String>,
    pub sender_profile_pic: Option<String>,
    pub created_at: DateTime<Utc>,
    pub read: bool,
    pub data: Option<serde_json::Value>,
}

impl AlertEntity {
    /// Converts the row into the domain alert, decoding the JSONB payload.
    pub fn into_domain(self) -> Result<Alert, serde_json::Error> {
        let data = self
            .data
            .map(serde_json::from_value::<AlertData>)
            .transpose()?;
        Ok(Alert {
            id: self.id,
            user_id: self.user_id,
            alert_type: self.alert_type.into(),
            message: self.message,
            activity_id: self.activity_id,
            activity_name: self.activity_name,
            sender_id: self.sender_id,
            sender_name: self.sender_name,
            sender_profile_pic: self.sender_profile_pic,
            created_at: self.created_at,
            read: self.read,
            data,
        })
    }
}
