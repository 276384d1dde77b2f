//! Activity entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{Activity, ActivityStatus};
use sqlx::FromRow;
use uuid::Uuid;

/// Database enum for activity status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "activity_status", rename_all = "snake_case")]
pub enum ActivityStatusDb {
    Draft,
    Open,
    InProgress,
    Completed,
    Cancelled,
}

impl From<ActivityStatus> for ActivityStatusDb {
    fn from(status: ActivityStatus) -> Self {
        match status {
            ActivityStatus::Draft => ActivityStatusDb::Draft,
            ActivityStatus::Open => ActivityStatusDb::Open,
            ActivityStatus::InProgress => ActivityStatusDb::InProgress,
            ActivityStatus::Completed => ActivityStatusDb::Completed,
            ActivityStatus::Cancelled => ActivityStatusDb::Cancelled,
        }
    }
}

impl From<ActivityStatusDb> for ActivityStatus {
    fn from(status: ActivityStatusDb) -> Self {
        match status {
            ActivityStatusDb::Draft => ActivityStatus::Draft,
            ActivityStatusDb::Open => ActivityStatus::Open,
            ActivityStatusDb::InProgress => ActivityStatus::InProgress,
            ActivityStatusDb::Completed => ActivityStatus::Completed,
            ActivityStatusDb::Cancelled => ActivityStatus::Cancelled,
        }
    }
}

/// Database row mapping for the activities table.
#[derive(Debug, Clone, FromRow)]
pub struct ActivityEntity {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub status: ActivityStatusDb,
    pub capacity: Option<i32>,
    pub revision: i32,
    pub created_at: DateTime<Utc>,
}

impl From<ActivityEntity> for Activity {
    fn from(entity: ActivityEntity) -> Self {
        Self {
            id: entity.id,
            owner_id: entity.owner_id,
            name: entity.name,
            status: entity.status.into(),
            capacity: entity.capacity,
            revision: entity.revision,
            created_at: entity.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_entity_to_domain() {
        let entity = ActivityEntity {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "Morning run".to_string(),
            status: ActivityStatusDb::Open,
            capacity: Some(4),
            revision: 2,
            created_at: Utc::now(),
        };

        let activity: Activity = entity.clone().into();
        assert_eq!(activity.id, entity.id);
        assert_eq!(activity.status, ActivityStatus::Open);
        assert_eq!(activity.capacity, Some(4));
        assert_eq!(activity.revision, 2);
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            ActivityStatus::Draft,
            ActivityStatus::Open,
            ActivityStatus::InProgress,
            ActivityStatus::Completed,
            ActivityStatus::Cancelled,
        ] {
            let db: ActivityStatusDb = status.into();
            let back: ActivityStatus = db.into();
            assert_eq!(back, status);
        }
    }
}
