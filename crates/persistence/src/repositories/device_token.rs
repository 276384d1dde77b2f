//! Device token store backed by PostgreSQL.

use async_trait::async_trait;
use domain::error::StateError;
use domain::stores::DeviceTokenStore;
use sqlx::PgPool;
use uuid::Uuid;

use crate::metrics::QueryTimer;

use super::storage_error;

#[derive(Clone)]
pub struct PgDeviceTokenStore {
    pool: PgPool,
}

impl PgDeviceTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeviceTokenStore for PgDeviceTokenStore {
    async fn register(&self, user_id: Uuid, token: String) -> Result<(), StateError> {
        let timer = QueryTimer::new("register_device_token");
        let result = sqlx::query(
            r#"
            INSERT INTO device_tokens (user_id, token, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id) DO UPDATE SET token = $2, updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(&token)
        .execute(&self.pool)
        .await;
        timer.record();

        result.map_err(|e| storage_error("register_device_token", e))?;
        Ok(())
    }

    async fn find(&self, user_id: Uuid) -> Result<Option<String>, StateError> {
        let timer = QueryTimer::new("find_device_token");
        let result = sqlx::query_scalar::<_, String>(
            "SELECT token FROM device_tokens WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();

        result.map_err(|e| storage_error("find_device_token", e))
    }
}
