//! Device registration endpoints.

use axum::{extract::State, http::StatusCode, Extension, Json};
use domain::models::Session;
use serde::Deserialize;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterPushTokenRequest {
    #[validate(length(min = 1, max = 4096, message = "token must not be empty"))]
    pub token: String,
}

/// Registers the session user's push token. The latest registration wins.
pub async fn register_push_token(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(request): Json<RegisterPushTokenRequest>,
) -> Result<StatusCode, ApiError> {
    request.validate()?;
    state
        .device_tokens
        .register(session.user_id, request.token)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
