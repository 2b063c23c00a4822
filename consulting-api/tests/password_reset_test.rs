mod common;

use axum::http::StatusCode;
use chrono::Duration;
use common::TestApp;
use consulting_api::models::Role;
use serde_json::json;

async fn request_reset(app: &TestApp, email: &str) -> (StatusCode, serde_json::Value) {
    app.post("/auth/password-reset/request", None, json!({ "email": email }))
        .await
}

async fn confirm_reset(app: &TestApp, token: &str, password: &str) -> StatusCode {
    app.post(
        "/auth/password-reset/confirm",
        None,
        json!({ "token": token, "new_password": password }),
    )
    .await
    .0
}

#[tokio::test]
async fn test_reset_token_is_single_use() {
    let app = TestApp::spawn();
    app.seed_user("jane@example.com", "password123", Role::User, None).await;

    let (status, _) = request_reset(&app, "jane@example.com").await;
    assert_eq!(status, StatusCode::OK);
    let token = app.email.last_reset_token("jane@example.com").unwrap();

    let (status, body) = app
        .post(
            "/auth/password-reset/confirm",
            None,
            json!({ "token": token, "new_password": "brand-new-pass" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["access_token"].as_str().is_some());

    assert_eq!(
        confirm_reset(&app, &token, "another-pass-1").await,
        StatusCode::BAD_REQUEST
    );

    app.login("jane@example.com", "brand-new-pass").await;
    let (status, _) = app
        .post(
            "/auth/login",
            None,
            json!({ "email": "jane@example.com", "password": "password123" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_updates_after_reset_do_not_revive_token() {
    let app = TestApp::spawn();
    let admin = app.seed_user("admin@example.com", "password123", Role::Admin, None).await;
    let jane = app.seed_user("jane@example.com", "password123", Role::User, None).await;
    let admin_token = app.token_for(&admin);

    request_reset(&app, "jane@example.com").await;
    let token = app.email.last_reset_token("jane@example.com").unwrap();

    assert_eq!(confirm_reset(&app, &token, "brand-new-pass").await, StatusCode::OK);

    let (status, _) = app
        .patch(
            &format!("/users/{}/status", jane.id),
            Some(&admin_token),
            json!({ "active": true }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .patch(
            &format!("/users/{}/role", jane.id),
            Some(&admin_token),
            json!({ "role": "consultant" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(
        confirm_reset(&app, &token, "another-pass-1").await,
        StatusCode::BAD_REQUEST
    );
    app.login("jane@example.com", "brand-new-pass").await;
}

#[tokio::test]
async fn test_reset_token_expires_after_ten_minutes() {
    let app = TestApp::spawn();
    app.seed_user("jane@example.com", "password123", Role::User, None).await;

    request_reset(&app, "jane@example.com").await;
    let token = app.email.last_reset_token("jane@example.com").unwrap();

    app.clock.advance(Duration::minutes(10));
    assert_eq!(
        confirm_reset(&app, &token, "brand-new-pass").await,
        StatusCode::BAD_REQUEST
    );
    app.login("jane@example.com", "password123").await;
}

#[tokio::test]
async fn test_reset_token_valid_just_inside_window() {
    let app = TestApp::spawn();
    app.seed_user("jane@example.com", "password123", Role::User, None).await;

    request_reset(&app, "jane@example.com").await;
    let token = app.email.last_reset_token("jane@example.com").unwrap();

    app.clock.advance(Duration::minutes(9));
    assert_eq!(
        confirm_reset(&app, &token, "brand-new-pass").await,
        StatusCode::OK
    );
}

#[tokio::test]
async fn test_newer_request_replaces_older_token() {
    let app = TestApp::spawn();
    app.seed_user("jane@example.com", "password123", Role::User, None).await;

    request_reset(&app, "jane@example.com").await;
    let first = app.email.last_reset_token("jane@example.com").unwrap();
    request_reset(&app, "jane@example.com").await;
    let second = app.email.last_reset_token("jane@example.com").unwrap();
    assert_ne!(first, second);

    assert_eq!(
        confirm_reset(&app, &first, "brand-new-pass").await,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        confirm_reset(&app, &second, "brand-new-pass").await,
        StatusCode::OK
    );
}

#[tokio::test]
async fn test_unknown_email_gets_identical_answer() {
    let app = TestApp::spawn();
    app.seed_user("jane@example.com", "password123", Role::User, None).await;

    let known = request_reset(&app, "jane@example.com").await;
    let unknown = request_reset(&app, "ghost@example.com").await;

    assert_eq!(known, unknown);
    assert!(app.email.last_reset_token("ghost@example.com").is_none());
}

#[tokio::test]
async fn test_garbage_token_is_rejected() {
    let app = TestApp::spawn();
    assert_eq!(
        confirm_reset(&app, "not-a-real-token", "brand-new-pass").await,
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn test_verification_token_cannot_reset_password() {
    let app = TestApp::spawn();
    app.post(
        "/auth/register",
        None,
        json!({ "email": "jane@example.com", "password": "password123" }),
    )
    .await;
    let verification = app
        .email
        .last_verification_token("jane@example.com")
        .unwrap();

    assert_eq!(
        confirm_reset(&app, &verification, "brand-new-pass").await,
        StatusCode::BAD_REQUEST
    );
}
