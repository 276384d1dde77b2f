//! PostgreSQL implementations of the domain store traits.

pub mod activity;
pub mod alert;
pub mod device_token;
pub mod participation;
pub mod user;

pub use activity::PgActivityStore;
pub use alert::PgAlertStore;
pub use device_token::PgDeviceTokenStore;
pub use participation::PgParticipationStore;
pub use user::PgUserStore;

use domain::error::StateError;

/// Maps a database failure into the domain error, preserving context in
/// the log.
pub(crate) fn storage_error(operation: &str, err: sqlx::Error) -> StateError {
    tracing::error!(operation, error = %err, "Database operation failed");
    StateError::Storage(format!("{}: {}", operation, err))
}
