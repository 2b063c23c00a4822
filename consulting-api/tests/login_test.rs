mod common;

use axum::http::StatusCode;
use common::TestApp;
use consulting_api::{models::Role, services::IdentityStore};
use serde_json::json;

#[tokio::test]
async fn test_register_returns_token_and_sends_verification() {
    let app = TestApp::spawn();

    let (status, body) = app
        .post(
            "/auth/register",
            None,
            json!({ "email": "New.User@Example.com", "password": "password123", "name": "New" }),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["email"], "new.user@example.com");
    assert_eq!(body["user"]["role"], "user");
    assert_eq!(body["user"]["verified"], false);
    assert_eq!(body["token"]["token_type"], "Bearer");
    assert!(app.email.last_verification_token("new.user@example.com").is_some());
}

#[tokio::test]
async fn test_register_duplicate_email_conflicts() {
    let app = TestApp::spawn();
    app.seed_user("taken@example.com", "password123", Role::User, None).await;

    let (status, _) = app
        .post(
            "/auth/register",
            None,
            json!({ "email": "TAKEN@example.com", "password": "password123" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_register_rejects_short_password() {
    let app = TestApp::spawn();

    let (status, _) = app
        .post(
            "/auth/register",
            None,
            json!({ "email": "a@example.com", "password": "short" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_login_records_last_login() {
    let app = TestApp::spawn();
    let user = app.seed_user("jane@example.com", "password123", Role::User, None).await;

    let token = app.login("Jane@Example.com", "password123").await;
    assert!(!token.is_empty());

    let stored = app.store.find_user_by_id(&user.id).await.unwrap().unwrap();
    assert!(stored.last_login.is_some());
}

#[tokio::test]
async fn test_wrong_password_is_unauthenticated_and_not_recorded() {
    let app = TestApp::spawn();
    let user = app.seed_user("jane@example.com", "password123", Role::User, None).await;

    let (status, _) = app
        .post(
            "/auth/login",
            None,
            json!({ "email": "jane@example.com", "password": "wrong-password" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let stored = app.store.find_user_by_id(&user.id).await.unwrap().unwrap();
    assert!(stored.last_login.is_none());
}

#[tokio::test]
async fn test_unknown_email_and_wrong_password_look_alike() {
    let app = TestApp::spawn();
    app.seed_user("jane@example.com", "password123", Role::User, None).await;

    let (unknown_status, unknown_body) = app
        .post(
            "/auth/login",
            None,
            json!({ "email": "ghost@example.com", "password": "password123" }),
        )
        .await;
    let (wrong_status, wrong_body) = app
        .post(
            "/auth/login",
            None,
            json!({ "email": "jane@example.com", "password": "nope-nope" }),
        )
        .await;

    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, wrong_status);
    assert_eq!(unknown_body, wrong_body);
}

#[tokio::test]
async fn test_inactive_identity_cannot_log_in() {
    let app = TestApp::spawn();
    let user = app.seed_user("jane@example.com", "password123", Role::User, None).await;
    app.set_active(&user, false).await;

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
async fn test_change_password_requires_current_password() {
    let app = TestApp::spawn();
    let user = app.seed_user("jane@example.com", "password123", Role::User, None).await;
    let token = app.token_for(&user);

    let (status, _) = app
        .post(
            "/users/me/password",
            Some(&token),
            json!({ "current_password": "wrong-one", "new_password": "newpassword123" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/users/me/password",
            Some(&token),
            json!({ "current_password": "password123", "new_password": "newpassword123" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    app.login("jane@example.com", "newpassword123").await;
}
