//! Activity store backed by PostgreSQL.

use async_trait::async_trait;
use domain::error::StateError;
use domain::models::{Activity, ActivityStatus, ActivityUpdate};
use domain::stores::{ActivityStore, UpdateOutcome};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{ActivityEntity, ActivityStatusDb};
use crate::metrics::QueryTimer;

use super::storage_error;

const ACTIVITY_COLUMNS: &str = "id, owner_id, name, status, capacity, revision, created_at";

#[derive(Clone)]
pub struct PgActivityStore {
    pool: PgPool,
}

impl PgActivityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivityStore for PgActivityStore {
    async fn insert(&self, activity: Activity) -> Result<Activity, StateError> {
        let timer = QueryTimer::new("insert_activity");
        let result = sqlx::query_as::<_, ActivityEntity>(&format!(
            r#"
            INSERT INTO activities (id, owner_id, name, status, capacity, revision, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ACTIVITY_COLUMNS}
            "#,
        ))
        .bind(activity.id)
        .bind(activity.owner_id)
        .bind(&activity.name)
        .bind(ActivityStatusDb::from(activity.status))
        .bind(activity.capacity)
        .bind(activity.revision)
        .bind(activity.created_at)
        .fetch_one(&self.pool)
        .await;
        timer.record();

        Ok(result.map_err(|e| storage_error("insert_activity", e))?.into())
    }

    async fn get(&self, id: Uuid) -> Result<Activity, StateError> {
        let timer = QueryTimer::new("get_activity");
        let result = sqlx::query_as::<_, ActivityEntity>(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activities WHERE id = $1",
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();

        result
            .map_err(|e| storage_error("get_activity", e))?
            .map(Into::into)
            .ok_or_else(|| StateError::NotFound(format!("activity {}", id)))
    }

    async fn set_status(
        &self,
        id: Uuid,
        from: ActivityStatus,
        to: ActivityStatus,
    ) -> Result<Activity, StateError> {
        let timer = QueryTimer::new("set_activity_status");
        // Compare-and-set: the update only lands if the status is still
        // the one the caller saw.
        let result = sqlx::query_as::<_, ActivityEntity>(&format!(
            r#"
            UPDATE activities
            SET status = $3
            WHERE id = $1 AND status = $2
            RETURNING {ACTIVITY_COLUMNS}
            "#,
        ))
        .bind(id)
        .bind(ActivityStatusDb::from(from))
        .bind(ActivityStatusDb::from(to))
        .fetch_optional(&self.pool)
        .await;
        timer.record();

        match result.map_err(|e| storage_error("set_activity_status", e))? {
            Some(entity) => Ok(entity.into()),
            None => {
                // Lost the race or the id is unknown; re-read to tell the
                // two apart.
                let current = self.get(id).await?;
                Err(StateError::InvalidTransition(format!(
                    "activity is {}, expected {}",
                    current.status, from
                )))
            }
        }
    }

    async fn apply_update(
        &self,
        id: Uuid,
        update: ActivityUpdate,
    ) -> Result<UpdateOutcome, StateError> {
        let timer = QueryTimer::new("apply_activity_update");
        let result = self.apply_update_tx(id, update).await;
        timer.record();
        result
    }
}

impl PgActivityStore {
    async fn apply_update_tx(
        &self,
        id: Uuid,
        update: ActivityUpdate,
    ) -> Result<UpdateOutcome, StateError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| storage_error("apply_activity_update", e))?;

        let entity = sqlx::query_as::<_, ActivityEntity>(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activities WHERE id = $1 FOR UPDATE",
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| storage_error("apply_activity_update", e))?
        .ok_or_else(|| StateError::NotFound(format!("activity {}", id)))?;

        let mut activity: Activity = entity.into();
        let changed = update.apply(&mut activity);

        if !changed.is_empty() {
            sqlx::query(
                r#"
                UPDATE activities
                SET name = $2, capacity = $3, revision = $4
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(&activity.name)
            .bind(activity.capacity)
            .bind(activity.revision)
            .execute(&mut *tx)
            .await
            .map_err(|e| storage_error("apply_activity_update", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| storage_error("apply_activity_update", e))?;

        Ok(UpdateOutcome {
            activity,
            revision_changed: !changed.is_empty(),
            update_details: changed.join(", "),
        })
    }
}
