//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod activity;
pub mod alert;
pub mod participation;
pub mod user;

pub use activity::{ActivityEntity, ActivityStatusDb};
pub use alert::{AlertEntity, AlertTypeDb};
pub use participation::{ParticipationEntity, ParticipationStatusDb};
pub use user::UserEntity;
