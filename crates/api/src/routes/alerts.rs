//! Alert feed endpoints.
//!
//! All operations are scoped to the session user; an alert id belonging
//! to someone else reads as not found.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use domain::models::{Alert, Session};
use domain::stores::ListAlertsQuery;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;

const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct ListAlertsParams {
    #[serde(default)]
    pub unread_only: bool,
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AlertFeedResponse {
    pub alerts: Vec<Alert>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct UpdatedCountResponse {
    pub updated: u64,
}

#[derive(Debug, Serialize)]
pub struct DeletedCountResponse {
    pub deleted: u64,
}

pub async fn list_alerts(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(params): Query<ListAlertsParams>,
) -> Result<Json<AlertFeedResponse>, ApiError> {
    let default_limit = ListAlertsQuery::default().limit;
    let query = ListAlertsQuery {
        unread_only: params.unread_only,
        cursor: params.cursor,
        limit: params.limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_SIZE),
    };
    let page = state.alerts.list_for(session.user_id, query).await?;
    Ok(Json(AlertFeedResponse {
        alerts: page.alerts,
        next_cursor: page.next_cursor,
    }))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<UnreadCountResponse>, ApiError> {
    let count = state.alerts.unread_count(session.user_id).await?;
    Ok(Json(UnreadCountResponse { count }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(alert_id): Path<Uuid>,
) -> Result<Json<Alert>, ApiError> {
    let alert = state.alerts.mark_read(session.user_id, alert_id).await?;
    Ok(Json(alert))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<UpdatedCountResponse>, ApiError> {
    let updated = state.alerts.mark_all_read(session.user_id).await?;
    Ok(Json(UpdatedCountResponse { updated }))
}

pub async fn delete_alert(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(alert_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.alerts.delete(session.user_id, alert_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_all_alerts(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<DeletedCountResponse>, ApiError> {
    let deleted = state.alerts.delete_all_for(session.user_id).await?;
    Ok(Json(DeletedCountResponse { deleted }))
}
