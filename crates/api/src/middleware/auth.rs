//! Session token authentication middleware.
//!
//! Validates the Bearer token on protected routes and places the caller's
//! [`Session`] in the request extensions. Handlers never consult ambient
//! state for the current user.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use domain::models::Session;
use serde_json::json;

use crate::app::AppState;

/// Middleware that requires a valid session token.
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok());

    let token = match auth_header {
        Some(header) if header.starts_with("Bearer ") => &header[7..],
        _ => {
            return unauthorized_response("Missing or invalid Authorization header");
        }
    };

    match state.signer.validate(token) {
        Ok(claims) => match claims.user_id() {
            Ok(user_id) => {
                req.extensions_mut().insert(Session::new(user_id));
                next.run(req).await
            }
            Err(_) => unauthorized_response("Invalid subject in token"),
        },
        Err(e) => {
            tracing::debug!("Session token validation failed: {}", e);
            unauthorized_response("Invalid or expired token")
        }
    }
}

fn unauthorized_response(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": "unauthorized",
            "message": message,
        })),
    )
        .into_response()
}
