//! Participation store backed by PostgreSQL.
//!
//! Row locks provide the per-row serialization the domain contract
//! requires. `decide` additionally locks the activity row so the approved
//! count and the status flip commit as one unit.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::error::StateError;
use domain::models::{Decision, Participation, ParticipationStatus};
use domain::stores::ParticipationStore;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{ParticipationEntity, ParticipationStatusDb};
use crate::metrics::QueryTimer;

use super::storage_error;

const PARTICIPATION_COLUMNS: &str =
    "activity_id, user_id, status, requested_at, decided_at, decided_by";

#[derive(Clone)]
pub struct PgParticipationStore {
    pool: PgPool,
}

impl PgParticipationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ParticipationStore for PgParticipationStore {
    async fn upsert_requested(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(Participation, Option<ParticipationStatus>), StateError> {
        let timer = QueryTimer::new("upsert_participation_requested");
        let result = self.upsert_requested_tx(activity_id, user_id, now).await;
        timer.record();
        result
    }

    async fn get(&self, activity_id: Uuid, user_id: Uuid) -> Result<Participation, StateError> {
        let timer = QueryTimer::new("get_participation");
        let result = sqlx::query_as::<_, ParticipationEntity>(&format!(
            "SELECT {PARTICIPATION_COLUMNS} FROM participations WHERE activity_id = $1 AND user_id = $2",
        ))
        .bind(activity_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();

        result
            .map_err(|e| storage_error("get_participation", e))?
            .map(Into::into)
            .ok_or_else(|| StateError::NotFound("participation".into()))
    }

    async fn decide(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
        decision: Decision,
        decided_by: Uuid,
        capacity: Option<i32>,
        now: DateTime<Utc>,
    ) -> Result<Participation, StateError> {
        let timer = QueryTimer::new("decide_participation");
        let result = self
            .decide_tx(activity_id, user_id, decision, decided_by, capacity, now)
            .await;
        timer.record();
        result
    }

    async fn conclude(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
        to: ParticipationStatus,
        now: DateTime<Utc>,
    ) -> Result<Participation, StateError> {
        let timer = QueryTimer::new("conclude_participation");
        let result = sqlx::query_as::<_, ParticipationEntity>(&format!(
            r#"
            UPDATE participations
            SET status = $3, decided_at = $4
            WHERE activity_id = $1 AND user_id = $2 AND status = 'approved'
            RETURNING {PARTICIPATION_COLUMNS}
            "#,
        ))
        .bind(activity_id)
        .bind(user_id)
        .bind(ParticipationStatusDb::from(to))
        .bind(now)
        .fetch_optional(&self.pool)
        .await;
        timer.record();

        match result.map_err(|e| storage_error("conclude_participation", e))? {
            Some(entity) => Ok(entity.into()),
            None => {
                let current = self.get(activity_id, user_id).await?;
                Err(StateError::InvalidTransition(format!(
                    "participation is {}, expected approved",
                    current.status
                )))
            }
        }
    }

    async fn withdraw(&self, activity_id: Uuid, user_id: Uuid) -> Result<(), StateError> {
        let timer = QueryTimer::new("withdraw_participation");
        let result = sqlx::query(
            r#"
            DELETE FROM participations
            WHERE activity_id = $1 AND user_id = $2 AND status = 'requested'
            "#,
        )
        .bind(activity_id)
        .bind(user_id)
        .execute(&self.pool)
        .await;
        timer.record();

        let affected = result
            .map_err(|e| storage_error("withdraw_participation", e))?
            .rows_affected();
        if affected == 0 {
            return Err(StateError::NotFound("pending join request".into()));
        }
        Ok(())
    }

    async fn approved_user_ids(&self, activity_id: Uuid) -> Result<Vec<Uuid>, StateError> {
        let timer = QueryTimer::new("list_approved_participants");
        let result = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT user_id FROM participations
            WHERE activity_id = $1 AND status = 'approved'
            ORDER BY decided_at, user_id
            "#,
        )
        .bind(activity_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();

        result.map_err(|e| storage_error("list_approved_participants", e))
    }
}

impl PgParticipationStore {
    async fn upsert_requested_tx(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(Participation, Option<ParticipationStatus>), StateError> {
        let op = "upsert_participation_requested";
        let mut tx = self.pool.begin().await.map_err(|e| storage_error(op, e))?;

        let existing = sqlx::query_as::<_, ParticipationEntity>(&format!(
            "SELECT {PARTICIPATION_COLUMNS} FROM participations \
             WHERE activity_id = $1 AND user_id = $2 FOR UPDATE",
        ))
        .bind(activity_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| storage_error(op, e))?;

        let previous = match existing {
            Some(row) => {
                let status: ParticipationStatus = row.status.into();
                if status.is_live() {
                    return Err(StateError::InvalidTransition(format!(
                        "participation is already {}",
                        status
                    )));
                }
                sqlx::query(
                    r#"
                    UPDATE participations
                    SET status = 'requested', requested_at = $3, decided_at = NULL, decided_by = NULL
                    WHERE activity_id = $1 AND user_id = $2
                    "#,
                )
                .bind(activity_id)
                .bind(user_id)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(|e| storage_error(op, e))?;
                Some(status)
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO participations (activity_id, user_id, status, requested_at)
                    VALUES ($1, $2, 'requested', $3)
                    "#,
                )
                .bind(activity_id)
                .bind(user_id)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(|e| storage_error(op, e))?;
                None
            }
        };

        tx.commit().await.map_err(|e| storage_error(op, e))?;
        Ok((Participation::requested(activity_id, user_id, now), previous))
    }

    async fn decide_tx(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
        decision: Decision,
        decided_by: Uuid,
        capacity: Option<i32>,
        now: DateTime<Utc>,
    ) -> Result<Participation, StateError> {
        let op = "decide_participation";
        let mut tx = self.pool.begin().await.map_err(|e| storage_error(op, e))?;

        // Serialize all decisions for the activity on its row so the
        // approved count cannot go stale under a concurrent approval.
        sqlx::query("SELECT id FROM activities WHERE id = $1 FOR UPDATE")
            .bind(activity_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| storage_error(op, e))?;

        if decision == Decision::Approved {
            if let Some(capacity) = capacity {
                let approved = sqlx::query_scalar::<_, i64>(
                    r#"
                    SELECT COUNT(*) FROM participations
                    WHERE activity_id = $1 AND status = 'approved'
                    "#,
                )
                .bind(activity_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| storage_error(op, e))?;
                if approved >= capacity as i64 {
                    return Err(StateError::CapacityExceeded);
                }
            }
        }

        let updated = sqlx::query_as::<_, ParticipationEntity>(&format!(
            r#"
            UPDATE participations
            SET status = $3, decided_at = $4, decided_by = $5
            WHERE activity_id = $1 AND user_id = $2 AND status = 'requested'
            RETURNING {PARTICIPATION_COLUMNS}
            "#,
        ))
        .bind(activity_id)
        .bind(user_id)
        .bind(ParticipationStatusDb::from(decision.resulting_status()))
        .bind(now)
        .bind(decided_by)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| storage_error(op, e))?;

        let entity = match updated {
            Some(entity) => entity,
            None => {
                let current = sqlx::query_as::<_, ParticipationEntity>(&format!(
                    "SELECT {PARTICIPATION_COLUMNS} FROM participations \
                     WHERE activity_id = $1 AND user_id = $2",
                ))
                .bind(activity_id)
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| storage_error(op, e))?;
                return match current {
                    Some(row) => Err(StateError::InvalidTransition(format!(
                        "participation is {}, expected requested",
                        ParticipationStatus::from(row.status)
                    ))),
                    None => Err(StateError::NotFound("participation".into())),
                };
            }
        };

        tx.commit().await.map_err(|e| storage_error(op, e))?;
        Ok(entity.into())
    }
}
