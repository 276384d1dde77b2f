//! Alert store backed by PostgreSQL.
//!
//! Feed reads are keyset-paginated on (created_at, id) descending;
//! cursors come from `shared::pagination`.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use domain::error::StateError;
use domain::models::{Alert, AlertDraft, AlertType};
use domain::stores::{
    default_coalesce_window, AlertPage, AlertStore, AppendOutcome, ListAlertsQuery,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{AlertEntity, AlertTypeDb};
use crate::metrics::QueryTimer;

use super::storage_error;

const ALERT_COLUMNS: &str = "id, user_id, alert_type, message, activity_id, activity_name, \
     sender_id, sender_name, sender_profile_pic, created_at, read, data";

#[derive(Clone)]
pub struct PgAlertStore {
    pool: PgPool,
    coalesce_window: Duration,
}

impl PgAlertStore {
    pub fn new(pool: PgPool) -> Self {
        Self::with_coalesce_window(pool, default_coalesce_window())
    }

    pub fn with_coalesce_window(pool: PgPool, coalesce_window: Duration) -> Self {
        Self {
            pool,
            coalesce_window,
        }
    }

    fn decode(entity: AlertEntity) -> Result<Alert, StateError> {
        entity
            .into_domain()
            .map_err(|e| StateError::Storage(format!("alert payload: {}", e)))
    }
}

#[async_trait]
impl AlertStore for PgAlertStore {
    async fn append(
        &self,
        draft: AlertDraft,
        now: DateTime<Utc>,
    ) -> Result<AppendOutcome, StateError> {
        let timer = QueryTimer::new("append_alert");
        let result = self.append_tx(draft, now).await;
        timer.record();
        result
    }

    async fn mark_read(&self, user_id: Uuid, alert_id: Uuid) -> Result<Alert, StateError> {
        let timer = QueryTimer::new("mark_alert_read");
        let result = sqlx::query_as::<_, AlertEntity>(&format!(
            r#"
            UPDATE alerts
            SET read = TRUE
            WHERE id = $1 AND user_id = $2
            RETURNING {ALERT_COLUMNS}
            "#,
        ))
        .bind(alert_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();

        result
            .map_err(|e| storage_error("mark_alert_read", e))?
            .map(Self::decode)
            .transpose()?
            .ok_or_else(|| StateError::NotFound(format!("alert {}", alert_id)))
    }

    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, StateError> {
        let timer = QueryTimer::new("mark_all_alerts_read");
        let result = sqlx::query("UPDATE alerts SET read = TRUE WHERE user_id = $1 AND NOT read")
            .bind(user_id)
            .execute(&self.pool)
            .await;
        timer.record();

        Ok(result
            .map_err(|e| storage_error("mark_all_alerts_read", e))?
            .rows_affected())
    }

    async fn list_for(
        &self,
        user_id: Uuid,
        query: ListAlertsQuery,
    ) -> Result<AlertPage, StateError> {
        let timer = QueryTimer::new("list_alerts");

        let cursor = query
            .cursor
            .as_deref()
            .map(shared::pagination::decode_cursor)
            .transpose()
            .map_err(|e| StateError::NotFound(format!("cursor: {}", e)))?;

        let limit = query.limit.max(1);

        // Fetch one extra row to learn whether another page exists.
        let mut sql = format!(
            "SELECT {ALERT_COLUMNS} FROM alerts WHERE user_id = $1",
        );
        if query.unread_only {
            sql.push_str(" AND NOT read");
        }
        if cursor.is_some() {
            sql.push_str(" AND (created_at, id) < ($3, $4)");
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC LIMIT $2");

        let mut q = sqlx::query_as::<_, AlertEntity>(&sql)
            .bind(user_id)
            .bind(limit + 1);
        if let Some((ts, id)) = cursor {
            q = q.bind(ts).bind(id);
        }

        let result = q.fetch_all(&self.pool).await;
        timer.record();

        let mut entities = result.map_err(|e| storage_error("list_alerts", e))?;
        let has_more = entities.len() as i64 > limit;
        entities.truncate(limit as usize);

        let alerts = entities
            .into_iter()
            .map(Self::decode)
            .collect::<Result<Vec<_>, _>>()?;
        let next_cursor = if has_more {
            alerts
                .last()
                .map(|a| shared::pagination::encode_cursor(a.created_at, a.id))
        } else {
            None
        };

        Ok(AlertPage {
            alerts,
            next_cursor,
        })
    }

    async fn unread_count(&self, user_id: Uuid) -> Result<i64, StateError> {
        let timer = QueryTimer::new("count_unread_alerts");
        let result = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM alerts WHERE user_id = $1 AND NOT read",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await;
        timer.record();

        result.map_err(|e| storage_error("count_unread_alerts", e))
    }

    async fn delete(&self, user_id: Uuid, alert_id: Uuid) -> Result<(), StateError> {
        let timer = QueryTimer::new("delete_alert");
        let result = sqlx::query("DELETE FROM alerts WHERE id = $1 AND user_id = $2")
            .bind(alert_id)
            .bind(user_id)
            .execute(&self.pool)
            .await;
        timer.record();

        let affected = result
            .map_err(|e| storage_error("delete_alert", e))?
            .rows_affected();
        if affected == 0 {
            return Err(StateError::NotFound(format!("alert {}", alert_id)));
        }
        Ok(())
    }

    async fn delete_all_for(&self, user_id: Uuid) -> Result<u64, StateError> {
        let timer = QueryTimer::new("delete_all_alerts");
        let result = sqlx::query("DELETE FROM alerts WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await;
        timer.record();

        Ok(result
            .map_err(|e| storage_error("delete_all_alerts", e))?
            .rows_affected())
    }

    async fn delete_matching(
        &self,
        user_id: Uuid,
        alert_type: AlertType,
        activity_id: Uuid,
        sender_id: Uuid,
    ) -> Result<bool, StateError> {
        let timer = QueryTimer::new("delete_matching_alert");
        let result = sqlx::query(
            r#"
            DELETE FROM alerts
            WHERE id = (
                SELECT id FROM alerts
                WHERE user_id = $1 AND alert_type = $2 AND activity_id = $3 AND sender_id = $4
                ORDER BY created_at DESC, id DESC
                LIMIT 1
            )
            "#,
        )
        .bind(user_id)
        .bind(AlertTypeDb::from(alert_type))
        .bind(activity_id)
        .bind(sender_id)
        .execute(&self.pool)
        .await;
        timer.record();

        Ok(result
            .map_err(|e| storage_error("delete_matching_alert", e))?
            .rows_affected()
            > 0)
    }
}

impl PgAlertStore {
    async fn append_tx(
        &self,
        draft: AlertDraft,
        now: DateTime<Utc>,
    ) -> Result<AppendOutcome, StateError> {
        let op = "append_alert";
        let mut tx = self.pool.begin().await.map_err(|e| storage_error(op, e))?;

        let cutoff = now - self.coalesce_window;
        let existing = sqlx::query_as::<_, AlertEntity>(&format!(
            r#"
            SELECT {ALERT_COLUMNS} FROM alerts
            WHERE user_id = $1
              AND alert_type = $2
              AND activity_id IS NOT DISTINCT FROM $3
              AND sender_id IS NOT DISTINCT FROM $4
              AND created_at >= $5
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        ))
        .bind(draft.recipient_id)
        .bind(AlertTypeDb::from(draft.alert_type))
        .bind(draft.activity_id)
        .bind(draft.sender.as_ref().map(|s| s.id))
        .bind(cutoff)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| storage_error(op, e))?;

        if let Some(entity) = existing {
            tx.commit().await.map_err(|e| storage_error(op, e))?;
            return Ok(AppendOutcome::Coalesced(Self::decode(entity)?));
        }

        let alert = Alert::from_draft(draft, Uuid::new_v4(), now);
        let data = alert
            .data
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| StateError::Storage(format!("alert payload: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO alerts (id, user_id, alert_type, message, activity_id, activity_name,
                                sender_id, sender_name, sender_profile_pic, created_at, read, data)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, FALSE, $11)
            "#,
        )
        .bind(alert.id)
        .bind(alert.user_id)
        .bind(AlertTypeDb::from(alert.alert_type))
        .bind(&alert.message)
        .bind(alert.activity_id)
        .bind(&alert.activity_name)
        .bind(alert.sender_id)
        .bind(&alert.sender_name)
        .bind(&alert.sender_profile_pic)
        .bind(alert.created_at)
        .bind(data)
        .execute(&mut *tx)
        .await
        .map_err(|e| storage_error(op, e))?;

        tx.commit().await.map_err(|e| storage_error(op, e))?;
        Ok(AppendOutcome::Stored(alert))
    }
}
