//! Activity lifecycle and participation endpoints.
//!
//! Every handler resolves the acting user from the session and goes
//! through the coordinator, so each accepted mutation also produces its
//! alerts.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use domain::models::{
    Activity, ActivityStatus, ActivityUpdate, CreateActivityRequest, Decision, Participation,
    Session, StateDelta,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::app::{current_user, AppState};
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: ActivityStatus,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub decision: Decision,
}

pub async fn create_activity(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(request): Json<CreateActivityRequest>,
) -> Result<(StatusCode, Json<Activity>), ApiError> {
    request.validate()?;
    let owner = current_user(&state, &session).await?;
    let activity = state.coordinator.create_activity(&owner, request).await?;
    Ok((StatusCode::CREATED, Json(activity)))
}

pub async fn set_status(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(activity_id): Path<Uuid>,
    Json(request): Json<SetStatusRequest>,
) -> Result<Json<Activity>, ApiError> {
    let organizer = current_user(&state, &session).await?;
    let outcome = if request.status == ActivityStatus::Cancelled {
        state
            .coordinator
            .cancel_activity(activity_id, &organizer)
            .await?
    } else {
        state
            .coordinator
            .transition_activity(activity_id, &organizer, request.status)
            .await?
    };
    Ok(Json(outcome.delta.activity().clone()))
}

pub async fn update_activity(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(activity_id): Path<Uuid>,
    Json(update): Json<ActivityUpdate>,
) -> Result<Json<Activity>, ApiError> {
    update.validate()?;
    let organizer = current_user(&state, &session).await?;
    let outcome = state
        .coordinator
        .update_activity(activity_id, &organizer, update)
        .await?;
    Ok(Json(outcome.delta.activity().clone()))
}

pub async fn cancel_activity(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(activity_id): Path<Uuid>,
) -> Result<Json<Activity>, ApiError> {
    let organizer = current_user(&state, &session).await?;
    let outcome = state
        .coordinator
        .cancel_activity(activity_id, &organizer)
        .await?;
    Ok(Json(outcome.delta.activity().clone()))
}

pub async fn request_join(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(activity_id): Path<Uuid>,
) -> Result<(StatusCode, Json<Participation>), ApiError> {
    let requester = current_user(&state, &session).await?;
    let outcome = state
        .coordinator
        .request_join(activity_id, &requester)
        .await?;
    let participation = participation_of(&outcome.delta)?;
    Ok((StatusCode::CREATED, Json(participation)))
}

pub async fn cancel_request(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(activity_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let requester = current_user(&state, &session).await?;
    state
        .coordinator
        .cancel_request(activity_id, &requester)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn decide(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path((activity_id, user_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<Participation>, ApiError> {
    let organizer = current_user(&state, &session).await?;
    let outcome = state
        .coordinator
        .decide(activity_id, user_id, &organizer, request.decision)
        .await?;
    let participation = participation_of(&outcome.delta)?;
    Ok(Json(participation))
}

pub async fn leave(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(activity_id): Path<Uuid>,
) -> Result<Json<Participation>, ApiError> {
    let participant = current_user(&state, &session).await?;
    let outcome = state.coordinator.leave(activity_id, &participant).await?;
    let participation = participation_of(&outcome.delta)?;
    Ok(Json(participation))
}

pub async fn remove_participant(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path((activity_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    let organizer = current_user(&state, &session).await?;
    state
        .coordinator
        .remove(activity_id, user_id, &organizer)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

fn participation_of(delta: &StateDelta) -> Result<Participation, ApiError> {
    match delta {
        StateDelta::JoinRequested { participation, .. }
        | StateDelta::Decided { participation, .. }
        | StateDelta::Left { participation, .. }
        | StateDelta::Removed { participation, .. } => Ok(participation.clone()),
        _ => Err(ApiError::Internal(
            "transition produced no participation".into(),
        )),
    }
}
