//! Session and credential models.
//!
//! A `Session` is an explicit value passed into every authenticated call;
//! there is no process-wide current user.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Margin before the nominal expiry at which a credential is treated as
/// stale, so in-flight requests do not race the expiry.
pub const CREDENTIAL_EXPIRY_MARGIN_SECS: i64 = 30;

/// An authenticated session for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub user_id: Uuid,
}

impl Session {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }
}

/// A short-lived signed identity credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Credential {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Usable at `now`, with the expiry margin applied.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now + Duration::seconds(CREDENTIAL_EXPIRY_MARGIN_SECS)
    }
}
