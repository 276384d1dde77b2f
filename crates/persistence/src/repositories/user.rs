//! User store backed by PostgreSQL.

use async_trait::async_trait;
use domain::error::StateError;
use domain::models::User;
use domain::stores::UserStore;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::UserEntity;
use crate::metrics::QueryTimer;

use super::storage_error;

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn upsert(&self, user: User) -> Result<User, StateError> {
        let timer = QueryTimer::new("upsert_user");
        let result = sqlx::query_as::<_, UserEntity>(
            r#"
            INSERT INTO users (id, display_name, profile_pic_url)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET display_name = $2, profile_pic_url = $3
            RETURNING id, display_name, profile_pic_url
            "#,
        )
        .bind(user.id)
        .bind(&user.display_name)
        .bind(&user.profile_pic_url)
        .fetch_one(&self.pool)
        .await;
        timer.record();

        Ok(result.map_err(|e| storage_error("upsert_user", e))?.into())
    }

    async fn get(&self, id: Uuid) -> Result<User, StateError> {
        let timer = QueryTimer::new("get_user");
        let result = sqlx::query_as::<_, UserEntity>(
            "SELECT id, display_name, profile_pic_url FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();

        result
            .map_err(|e| storage_error("get_user", e))?
            .map(Into::into)
            .ok_or_else(|| StateError::NotFound(format!("user {}", id)))
    }
}
