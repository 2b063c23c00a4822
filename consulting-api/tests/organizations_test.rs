mod common;

use axum::http::StatusCode;
use common::TestApp;
use consulting_api::{
    models::Role,
    services::{IdentityStore, OrganizationStore},
};
use serde_json::json;

#[tokio::test]
async fn test_founder_becomes_owner() {
    let app = TestApp::spawn();
    let founder = app.seed_user("founder@example.com", "password123", Role::User, None).await;
    let token = app.token_for(&founder);

    let (status, org) = app
        .post("/organizations", Some(&token), json!({ "name": "Acme Consulting" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(org["slug"], "acme-consulting");
    assert_eq!(org["owner"], founder.id.as_str());

    let stored = app.store.find_user_by_id(&founder.id).await.unwrap().unwrap();
    assert_eq!(stored.organization.as_deref(), org["_id"].as_str());

    // A second organization is refused while the first is held
    let (status, _) = app
        .post("/organizations", Some(&token), json!({ "name": "Second" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_platform_admin_holds_one_organization() {
    let app = TestApp::spawn();
    let admin = app.seed_user("admin@example.com", "password123", Role::Admin, None).await;
    let token = app.token_for(&admin);

    let (status, first) = app
        .post("/organizations", Some(&token), json!({ "name": "First" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .post("/organizations", Some(&token), json!({ "name": "Second" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let stored = app.store.find_user_by_id(&admin.id).await.unwrap().unwrap();
    assert_eq!(stored.organization.as_deref(), first["_id"].as_str());
    assert!(app
        .store
        .find_organization_by_slug("second")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_duplicate_slug_conflicts() {
    let app = TestApp::spawn();
    let a = app.seed_user("a@example.com", "password123", Role::User, None).await;
    let b = app.seed_user("b@example.com", "password123", Role::User, None).await;

    let (status, _) = app
        .post("/organizations", Some(&app.token_for(&a)), json!({ "name": "Acme" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app
        .post("/organizations", Some(&app.token_for(&b)), json!({ "name": "ACME" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_owner_missing_from_members_still_administers() {
    let app = TestApp::spawn();
    let owner = app.seed_user("owner@example.com", "password123", Role::User, None).await;
    let mut org = app.seed_organization("Acme", &owner).await;

    org.members.clear();
    app.store.replace_organization(&org).await.unwrap();

    let (status, body) = app
        .patch(
            &format!("/organizations/{}", org.id),
            Some(&app.token_for(&owner)),
            json!({ "description": "Boutique consultancy" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["description"], "Boutique consultancy");
}

#[tokio::test]
async fn test_membership_lifecycle() {
    let app = TestApp::spawn();
    let owner = app.seed_user("owner@example.com", "password123", Role::User, None).await;
    let org = app.seed_organization("Acme", &owner).await;
    let newcomer = app.seed_user("new@example.com", "password123", Role::Consultant, None).await;
    let owner_token = app.token_for(&owner);
    let newcomer_token = app.token_for(&newcomer);

    // Not a member yet
    let (status, _) = app
        .get(&format!("/organizations/{}", org.id), Some(&newcomer_token))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .post(
            &format!("/organizations/{}/members", org.id),
            Some(&owner_token),
            json!({ "user_id": newcomer.id, "role": "member" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .get(&format!("/organizations/{}", org.id), Some(&newcomer_token))
        .await;
    assert_eq!(status, StatusCode::OK);

    // Members cannot administer
    let (status, _) = app
        .patch(
            &format!("/organizations/{}", org.id),
            Some(&newcomer_token),
            json!({ "name": "Renamed" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Promotion grants it
    let (status, _) = app
        .patch(
            &format!("/organizations/{}/members/{}", org.id, newcomer.id),
            Some(&owner_token),
            json!({ "role": "admin" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .patch(
            &format!("/organizations/{}", org.id),
            Some(&newcomer_token),
            json!({ "name": "Renamed" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // The owner is untouchable
    let (status, _) = app
        .delete(
            &format!("/organizations/{}/members/{}", org.id, owner.id),
            Some(&newcomer_token),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Leaving detaches the user
    let (status, _) = app
        .delete(
            &format!("/organizations/{}/members/{}", org.id, newcomer.id),
            Some(&newcomer_token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let stored = app.store.find_user_by_id(&newcomer.id).await.unwrap().unwrap();
    assert!(stored.organization.is_none());
}

#[tokio::test]
async fn test_contact_form_is_public_and_tenant_scoped() {
    let app = TestApp::spawn();
    let owner = app.seed_user("owner@example.com", "password123", Role::User, None).await;
    let org = app.seed_organization("Acme", &owner).await;

    let (status, _) = app
        .post(
            &format!("/organizations/{}/contact", org.id),
            None,
            json!({
                "name": "Sam Client",
                "email": "sam@client.example",
                "company": "Client Co",
                "message": "We need help with our ERP rollout."
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .get("/content/contact-submissions", Some(&app.token_for(&owner)))
        .await;
    assert_eq!(status, StatusCode::OK);
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["attributes"]["email"], "sam@client.example");

    let (status, _) = app
        .post(
            "/organizations/missing/contact",
            None,
            json!({ "name": "Sam", "email": "sam@client.example", "message": "Hi" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_cascades_content_and_detaches_members() {
    let app = TestApp::spawn();
    let owner = app.seed_user("owner@example.com", "password123", Role::Consultant, None).await;
    let org = app.seed_organization("Acme", &owner).await;
    let owner_token = app.token_for(&owner);

    let (status, _) = app
        .post("/content/projects", Some(&owner_token), json!({ "title": "Doomed" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .delete(&format!("/organizations/{}", org.id), Some(&owner_token))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    assert!(app.store.find_organization(&org.id).await.unwrap().is_none());
    let stored = app.store.find_user_by_id(&owner.id).await.unwrap().unwrap();
    assert!(stored.organization.is_none());
}

#[tokio::test]
async fn test_platform_role_changes_need_platform_admin() {
    let app = TestApp::spawn();
    let owner = app.seed_user("owner@example.com", "password123", Role::User, None).await;
    app.seed_organization("Acme", &owner).await;
    let admin = app.seed_user("admin@example.com", "password123", Role::Admin, None).await;
    let target = app.seed_user("t@example.com", "password123", Role::User, None).await;

    let uri = format!("/users/{}/role", target.id);
    let (status, _) = app
        .patch(&uri, Some(&app.token_for(&owner)), json!({ "role": "consultant" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .patch(&uri, Some(&app.token_for(&admin)), json!({ "role": "consultant" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "consultant");

    // Only a super-admin grants super-admin
    let (status, _) = app
        .patch(&uri, Some(&app.token_for(&admin)), json!({ "role": "super-admin" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .patch(
            &format!("/users/{}/status", target.id),
            Some(&app.token_for(&admin)),
            json!({ "active": false }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .post(
            "/auth/login",
            None,
            json!({ "email": "t@example.com", "password": "password123" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
