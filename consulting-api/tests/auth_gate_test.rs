mod common;

use axum::http::StatusCode;
use chrono::Duration;
use common::{TestApp, TOKEN_EXPIRY_MINUTES};
use consulting_api::{
    config::TokenConfig,
    models::Role,
    services::{MockClock, TokenService},
};
use secrecy::Secret;
use std::sync::Arc;

#[tokio::test]
async fn test_valid_token_reaches_handler() {
    let app = TestApp::spawn();
    let user = app.seed_user("jane@example.com", "password123", Role::User, None).await;
    let token = app.token_for(&user);

    let (status, body) = app.get("/users/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], user.id.as_str());
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn test_missing_or_malformed_header_is_unauthenticated() {
    let app = TestApp::spawn();

    let (status, _) = app.get("/users/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get("/users/me", Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_signed_with_other_secret_is_rejected() {
    let app = TestApp::spawn();
    let user = app.seed_user("jane@example.com", "password123", Role::User, None).await;

    let forger = TokenService::new(
        &TokenConfig {
            secret: Secret::new("some-other-secret-that-is-long-enough!!".to_string()),
            expiry_minutes: TOKEN_EXPIRY_MINUTES,
        },
        Arc::new(MockClock::default()),
    );
    let forged = forger.issue(&user.id).unwrap();

    let (status, _) = app.get("/users/me", Some(&forged)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let app = TestApp::spawn();
    let user = app.seed_user("jane@example.com", "password123", Role::User, None).await;
    let token = app.token_for(&user);

    app.clock.advance(Duration::minutes(TOKEN_EXPIRY_MINUTES - 1));
    let (status, _) = app.get("/users/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);

    app.clock.advance(Duration::minutes(1));
    let (status, _) = app.get("/users/me", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_deactivated_identity_is_rejected_with_valid_token() {
    let app = TestApp::spawn();
    let user = app.seed_user("jane@example.com", "password123", Role::User, None).await;
    let token = app.token_for(&user);

    app.set_active(&user, false).await;

    let (status, _) = app.get("/users/me", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_for_deleted_identity_is_rejected() {
    let app = TestApp::spawn();
    let token = app
        .state
        .auth_service
        .tokens()
        .issue("no-such-user")
        .unwrap();

    let (status, _) = app.get("/users/me", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_check_is_public() {
    let app = TestApp::spawn();

    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["store"], "up");
}
