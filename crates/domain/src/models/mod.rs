//! Domain models.

pub mod activity;
pub mod alert;
pub mod delta;
pub mod participation;
pub mod session;
pub mod user;

pub use activity::{Activity, ActivityStatus, ActivityUpdate, CreateActivityRequest};
pub use alert::{Alert, AlertData, AlertDraft, AlertType, SenderInfo};
pub use delta::StateDelta;
pub use participation::{Decision, Participation, ParticipationStatus};
pub use session::{Credential, Session};
pub use user::User;
