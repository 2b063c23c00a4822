mod common;

use axum::http::StatusCode;
use chrono::Duration;
use common::TestApp;
use serde_json::json;

async fn register(app: &TestApp, email: &str) -> String {
    let (status, body) = app
        .post(
            "/auth/register",
            None,
            json!({ "email": email, "password": "password123" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    body["token"]["access_token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_verify_email_once() {
    let app = TestApp::spawn();
    let access = register(&app, "jane@example.com").await;
    let token = app.email.last_verification_token("jane@example.com").unwrap();

    let (status, _) = app.get(&format!("/auth/verify?token={}", token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, me) = app.get("/users/me", Some(&access)).await;
    assert_eq!(me["verified"], true);

    let (status, _) = app.get(&format!("/auth/verify?token={}", token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_verification_expires_after_a_day() {
    let app = TestApp::spawn();
    register(&app, "jane@example.com").await;
    let token = app.email.last_verification_token("jane@example.com").unwrap();

    app.clock.advance(Duration::hours(24));
    let (status, _) = app.get(&format!("/auth/verify?token={}", token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_resend_issues_a_fresh_token() {
    let app = TestApp::spawn();
    let access = register(&app, "jane@example.com").await;
    let first = app.email.last_verification_token("jane@example.com").unwrap();

    let (status, _) = app
        .request(axum::http::Method::POST, "/auth/verify/resend", Some(&access), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let second = app.email.last_verification_token("jane@example.com").unwrap();
    assert_ne!(first, second);

    let (status, _) = app.get(&format!("/auth/verify?token={}", first), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.get(&format!("/auth/verify?token={}", second), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request(axum::http::Method::POST, "/auth/verify/resend", Some(&access), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_resend_requires_authentication() {
    let app = TestApp::spawn();
    let (status, _) = app
        .request(axum::http::Method::POST, "/auth/verify/resend", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
