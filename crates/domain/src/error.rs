//! Domain error taxonomy.
//!
//! Auth and state errors abort the triggering operation before any alert is
//! generated. Delivery errors are non-fatal and only logged; the state
//! transition and in-app store write are durable before dispatch runs.

use thiserror::Error;

/// Errors raised while obtaining a usable session credential.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No active session exists for the caller.
    #[error("No active session")]
    NotSignedIn,

    /// The identity backend rejected the refresh (network or revoked
    /// session). Callers must treat the operation as unauthenticated and
    /// must not fall back to a stale credential.
    #[error("Credential refresh failed: {0}")]
    RefreshFailed(String),
}

/// Errors raised by activity and participation state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// The requested transition is not legal from the current state.
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// The caller is not allowed to perform this operation.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Approving would exceed the activity capacity.
    #[error("Activity is full")]
    CapacityExceeded,

    /// The referenced record does not exist (or is not visible to the
    /// caller).
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backing store failed. Not part of the user-facing taxonomy;
    /// surfaces as an internal error at the API boundary.
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Errors raised by alert delivery. Never abort the triggering operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("Push delivery failed: {0}")]
    PushFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(AuthError::NotSignedIn.to_string(), "No active session");
        assert_eq!(
            AuthError::RefreshFailed("timeout".into()).to_string(),
            "Credential refresh failed: timeout"
        );
        assert_eq!(StateError::CapacityExceeded.to_string(), "Activity is full");
        assert_eq!(
            StateError::InvalidTransition("already decided".into()).to_string(),
            "Invalid transition: already decided"
        );
        assert_eq!(
            DeliveryError::PushFailed("503".into()).to_string(),
            "Push delivery failed: 503"
        );
    }
}
