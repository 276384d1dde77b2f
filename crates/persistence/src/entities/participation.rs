//! Participation entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{Participation, ParticipationStatus};
use sqlx::FromRow;
use uuid::Uuid;

/// Database enum for participation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "participation_status", rename_all = "snake_case")]
pub enum ParticipationStatusDb {
    Requested,
    Approved,
    Rejected,
    Left,
    Removed,
}

impl From<ParticipationStatus> for ParticipationStatusDb {
    fn from(status: ParticipationStatus) -> Self {
        match status {
            ParticipationStatus::Requested => ParticipationStatusDb::Requested,
            ParticipationStatus::Approved => ParticipationStatusDb::Approved,
            ParticipationStatus::Rejected => ParticipationStatusDb::Rejected,
            ParticipationStatus::Left => ParticipationStatusDb::Left,
            ParticipationStatus::Removed => ParticipationStatusDb::Removed,
        }
    }
}

impl From<ParticipationStatusDb> for ParticipationStatus {
    fn from(status: ParticipationStatusDb) -> Self {
        match status {
            ParticipationStatusDb::Requested => ParticipationStatus::Requested,
            ParticipationStatusDb::Approved => ParticipationStatus::Approved,
            ParticipationStatusDb::Rejected => ParticipationStatus::Rejected,
            ParticipationStatusDb::Left => ParticipationStatus::Left,
            ParticipationStatusDb::Removed => ParticipationStatus::Removed,
        }
    }
}

/// Database row mapping for the participations table.
#[derive(Debug, Clone, FromRow)]
pub struct ParticipationEntity {
    pub activity_id: Uuid,
    pub user_id: Uuid,
    pub status: ParticipationStatusDb,
    pub requested_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decided_by: Option<Uuid>,
}

impl From<ParticipationEntity> for Participation {
    fn from(entity: ParticipationEntity) -> Self {
        Self {
            activity_id: entity.activity_id,
            user_id: entity.user_id,
            status: entity.status.into(),
            requested_at: entity.requested_at,
            decided_at: entity.decided_at,
            decided_by: entity.decided_by,
        }
    }
}
