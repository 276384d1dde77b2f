//! Integration tests for session endpoints and the auth middleware.

mod common;

use axum::http::{Method, StatusCode};
use common::{
    get_request_with_auth, json_request, json_request_with_auth, parse_response_body, sign_in,
    spawn_test_app,
};
use serde_json::json;
use tower::ServiceExt;

#[tokio::test]
async fn test_create_session_returns_token_and_user() {
    let t = spawn_test_app();

    let request = json_request(
        Method::POST,
        "/api/v1/auth/session",
        json!({ "display_name": "Ada Lovelace" }),
    );
    let response = t.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = parse_response_body(response).await;
    assert!(!body["token"].as_str().unwrap().is_empty());
    assert!(body.get("expires_at").is_some());
    assert_eq!(body["user"]["display_name"], "Ada Lovelace");
}

#[tokio::test]
async fn test_create_session_rejects_empty_display_name() {
    let t = spawn_test_app();

    let request = json_request(
        Method::POST,
        "/api/v1/auth/session",
        json!({ "display_name": "" }),
    );
    let response = t.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_signing_in_again_keeps_the_same_user() {
    let t = spawn_test_app();
    let first = sign_in(&t.app, "Ada Lovelace").await;

    let request = json_request(
        Method::POST,
        "/api/v1/auth/session",
        json!({ "user_id": first.user_id, "display_name": "Ada L." }),
    );
    let response = t.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = parse_response_body(response).await;
    assert_eq!(body["user"]["id"], first.user_id.as_str());
    assert_eq!(body["user"]["display_name"], "Ada L.");
}

#[tokio::test]
async fn test_protected_route_requires_token() {
    let t = spawn_test_app();

    let request = axum::http::Request::builder()
        .method(Method::GET)
        .uri("/api/v1/user/alerts")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = t.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_route_rejects_garbage_token() {
    let t = spawn_test_app();

    let request = get_request_with_auth("/api/v1/user/alerts", "not-a-jwt");
    let response = t.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_returns_usable_token() {
    let t = spawn_test_app();
    let user = sign_in(&t.app, "Ada Lovelace").await;

    let request = json_request_with_auth(
        Method::POST,
        "/api/v1/auth/refresh",
        json!({}),
        &user.token,
    );
    let response = t.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = parse_response_body(response).await;
    let refreshed = body["token"].as_str().unwrap().to_string();
    assert!(!refreshed.is_empty());

    // The refreshed token authenticates requests.
    let request = get_request_with_auth("/api/v1/user/alerts", &refreshed);
    let response = t.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
