//! In-process harness for the HTTP integration tests: the real router over an
//! in-memory store, a captured mailbox and a hand-driven clock.

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use consulting_api::{
    build_router,
    config::{
        ApiConfig, CredentialConfig, Environment, MongoConfig, RateLimitConfig, SecurityConfig,
        StoreBackend, SwaggerConfig, SwaggerMode, TokenConfig,
    },
    models::{Organization, Role, User},
    services::{
        Clock, IdentityStore, InMemoryStore, MockClock, MockEmailService, OrganizationStore,
        UserUpdate,
    },
    utils::{hash_password, Password},
    AppState,
};
use secrecy::Secret;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "integration-test-secret-with-at-least-32-bytes";
pub const TOKEN_EXPIRY_MINUTES: i64 = 60;

pub fn test_config() -> ApiConfig {
    ApiConfig {
        common: service_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "consulting-api".to_string(),
        service_version: "test".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        store: StoreBackend::Memory,
        mongodb: MongoConfig {
            uri: "mongodb://localhost:27017".to_string(),
            database: "consulting_test".to_string(),
        },
        token: TokenConfig {
            secret: Secret::new(TEST_SECRET.to_string()),
            expiry_minutes: TOKEN_EXPIRY_MINUTES,
        },
        credentials: CredentialConfig {
            verification_ttl_hours: 24,
            password_reset_ttl_minutes: 10,
            public_base_url: "http://localhost:3000".to_string(),
        },
        gmail: None,
        security: SecurityConfig {
            allowed_origins: vec!["*".to_string()],
        },
        swagger: SwaggerConfig {
            enabled: SwaggerMode::Disabled,
        },
        rate_limit: RateLimitConfig {
            login_attempts: 100,
            login_window_seconds: 60,
            register_attempts: 100,
            register_window_seconds: 60,
            password_reset_attempts: 100,
            password_reset_window_seconds: 60,
            global_ip_limit: 1000,
            global_ip_window_seconds: 60,
            trust_forwarded_for: false,
        },
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<InMemoryStore>,
    pub email: Arc<MockEmailService>,
    pub clock: MockClock,
}

impl TestApp {
    pub fn spawn() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let email = Arc::new(MockEmailService::new());
        let clock = MockClock::default();

        let state = AppState::new(
            test_config(),
            store.clone(),
            email.clone(),
            Arc::new(clock.clone()),
        );
        let router = build_router(state.clone()).expect("router builds");

        Self {
            router,
            state,
            store,
            email,
            clock,
        }
    }

    /// Send one request; returns the status and the JSON body (`Null` when empty).
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::PATCH, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, token, None).await
    }

    /// Insert an identity straight into the store.
    pub async fn seed_user(
        &self,
        email: &str,
        password: &str,
        role: Role,
        organization: Option<&str>,
    ) -> User {
        let hash = hash_password(&Password::new(password.to_string()))
            .unwrap()
            .into_string();
        let user = User::new(
            email.to_string(),
            hash,
            None,
            role,
            organization.map(str::to_string),
        );
        self.store.insert_user(&user).await.unwrap();
        user
    }

    pub async fn set_active(&self, user: &User, active: bool) {
        let update = UserUpdate {
            active: Some(active),
            ..UserUpdate::default()
        };
        self.store
            .update_user(&user.id, &update, self.clock.now())
            .await
            .unwrap();
    }

    /// Insert an organization owned by `owner` and attach the owner to it.
    pub async fn seed_organization(&self, name: &str, owner: &User) -> Organization {
        let slug = name.to_lowercase().replace(' ', "-");
        let org = Organization::new(name.to_string(), slug, owner.id.clone());
        self.store.insert_organization(&org).await.unwrap();
        self.store
            .set_user_organization(&owner.id, Some(&org.id))
            .await
            .unwrap();
        org
    }

    pub fn token_for(&self, user: &User) -> String {
        self.state.auth_service.tokens().issue(&user.id).unwrap()
    }

    pub async fn login(&self, email: &str, password: &str) -> String {
        let (status, body) = self
            .post(
                "/auth/login",
                None,
                serde_json::json!({ "email": email, "password": password }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["token"]["access_token"].as_str().unwrap().to_string()
    }
}
