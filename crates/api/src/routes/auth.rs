//! Session endpoints.

use axum::{extract::State, Extension, Json};
use chrono::{DateTime, Utc};
use domain::models::{Session, User};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSessionRequest {
    /// Existing user id, omitted on first sign-in.
    pub user_id: Option<Uuid>,

    #[validate(length(min = 1, max = 80, message = "display_name must be 1-80 characters"))]
    pub display_name: String,

    #[validate(url(message = "profile_pic_url must be a valid URL"))]
    pub profile_pic_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs a user in (creating the profile if needed) and issues a session
/// token.
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    request.validate()?;

    let user = User {
        id: request.user_id.unwrap_or_else(Uuid::new_v4),
        display_name: request.display_name,
        profile_pic_url: request.profile_pic_url,
    };
    let user = state.users.upsert(user).await?;

    let (token, expires_at) = state.signer.issue(user.id)?;
    tracing::info!(user_id = %user.id, "Session created");

    Ok(Json(SessionResponse {
        token,
        expires_at,
        user,
    }))
}

/// Returns a usable session credential, refreshing the cached one when it
/// is stale.
pub async fn refresh_session(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let credential = state.token_provider.valid_credential(Some(&session)).await?;
    Ok(Json(RefreshResponse {
        token: credential.token,
        expires_at: credential.expires_at,
    }))
}
