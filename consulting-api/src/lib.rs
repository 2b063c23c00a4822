pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use service_core::axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post},
    Json, Router,
};
use service_core::middleware::{
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use utoipa::{openapi::security::SecurityScheme, Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::ApiConfig;
use crate::services::{
    AuthService, Clock, ContentService, EmailProvider, OrganizationService, Store, TokenService,
    UserService,
};
use service_core::error::AppError;
use std::sync::Arc;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::auth::registration::register,
        handlers::auth::registration::verify_email,
        handlers::auth::registration::resend_verification,
        handlers::auth::session::login,
        handlers::auth::password::request_password_reset,
        handlers::auth::password::confirm_password_reset,
        handlers::user::get_me,
        handlers::user::update_me,
        handlers::user::change_password,
        handlers::user::list_users,
        handlers::user::create_user,
        handlers::user::get_user,
        handlers::user::set_user_status,
        handlers::user::set_user_role,
        handlers::org::create_organization,
        handlers::org::list_organizations,
        handlers::org::get_organization,
        handlers::org::update_organization,
        handlers::org::delete_organization,
        handlers::org::add_member,
        handlers::org::update_member,
        handlers::org::remove_member,
        handlers::org::submit_contact,
        handlers::content::list_content,
        handlers::content::create_content,
        handlers::content::get_content,
        handlers::content::update_content,
        handlers::content::delete_content,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::MessageResponse,
            dtos::auth::RegisterRequest,
            dtos::auth::AuthResponse,
            dtos::auth::LoginRequest,
            dtos::auth::PasswordResetRequest,
            dtos::auth::PasswordResetConfirm,
            dtos::users::UpdateProfileRequest,
            dtos::users::ChangePasswordRequest,
            dtos::users::CreateUserRequest,
            dtos::users::UpdateStatusRequest,
            dtos::users::UpdateRoleRequest,
            dtos::organizations::CreateOrganizationRequest,
            dtos::organizations::UpdateOrganizationRequest,
            dtos::organizations::AddMemberRequest,
            dtos::organizations::UpdateMemberRequest,
            dtos::organizations::ContactRequest,
            dtos::content::CreateContentRequest,
            dtos::content::UpdateContentRequest,
            services::TokenResponse,
            models::SanitizedUser,
            models::Role,
            models::Organization,
            models::Member,
            models::MemberRole,
            models::ContentItem,
            models::ResourceKind,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Registration, login, email verification and password reset"),
        (name = "Users", description = "Profiles and identity administration"),
        (name = "Organizations", description = "Tenants and their members"),
        (name = "Content", description = "Tenant-scoped projects, case studies, services, blog posts and contact submissions"),
        (name = "Observability", description = "Service health"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: Arc<dyn Store>,
    pub auth_service: AuthService,
    pub user_service: UserService,
    pub organization_service: OrganizationService,
    pub content_service: ContentService,
    pub login_rate_limiter: IpRateLimiter,
    pub register_rate_limiter: IpRateLimiter,
    pub password_reset_rate_limiter: IpRateLimiter,
    pub ip_rate_limiter: IpRateLimiter,
}

impl AppState {
    /// Wire the services over one store, mailer and clock.
    pub fn new(
        config: ApiConfig,
        store: Arc<dyn Store>,
        email: Arc<dyn EmailProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let tokens = TokenService::new(&config.token, clock.clone());
        let auth_service = AuthService::new(
            store.clone(),
            email,
            tokens,
            clock,
            config.credentials.clone(),
        );
        let user_service = UserService::new(store.clone(), auth_service.clone());
        let organization_service = OrganizationService::new(store.clone());
        let content_service = ContentService::new(store.clone());

        let limits = &config.rate_limit;
        let trust_proxy = limits.trust_forwarded_for;
        let login_rate_limiter = create_ip_rate_limiter(
            limits.login_attempts,
            limits.login_window_seconds,
            trust_proxy,
        );
        let register_rate_limiter = create_ip_rate_limiter(
            limits.register_attempts,
            limits.register_window_seconds,
            trust_proxy,
        );
        let password_reset_rate_limiter = create_ip_rate_limiter(
            limits.password_reset_attempts,
            limits.password_reset_window_seconds,
            trust_proxy,
        );
        let ip_rate_limiter = create_ip_rate_limiter(
            limits.global_ip_limit,
            limits.global_ip_window_seconds,
            trust_proxy,
        );

        Self {
            config,
            store,
            auth_service,
            user_service,
            organization_service,
            content_service,
            login_rate_limiter,
            register_rate_limiter,
            password_reset_rate_limiter,
            ip_rate_limiter,
        }
    }
}

fn rate_limited(route: Router<AppState>, limiter: IpRateLimiter) -> Router<AppState> {
    route.layer(from_fn_with_state(limiter, ip_rate_limit_middleware))
}

pub fn build_router(state: AppState) -> Result<Router, AppError> {
    let login_route = rate_limited(
        Router::new().route("/auth/login", post(handlers::auth::login)),
        state.login_rate_limiter.clone(),
    );
    let register_route = rate_limited(
        Router::new().route("/auth/register", post(handlers::auth::register)),
        state.register_rate_limiter.clone(),
    );
    let reset_request_route = rate_limited(
        Router::new().route(
            "/auth/password-reset/request",
            post(handlers::auth::request_password_reset),
        ),
        state.password_reset_rate_limiter.clone(),
    );

    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/auth/verify", get(handlers::auth::verify_email))
        .route(
            "/auth/password-reset/confirm",
            post(handlers::auth::confirm_password_reset),
        )
        .route(
            "/organizations/:id/contact",
            post(handlers::org::submit_contact),
        )
        .merge(login_route)
        .merge(register_route)
        .merge(reset_request_route);

    // Everything below passes the authentication gate first
    let protected_routes = Router::new()
        .route(
            "/auth/verify/resend",
            post(handlers::auth::resend_verification),
        )
        .route(
            "/users/me",
            get(handlers::user::get_me).patch(handlers::user::update_me),
        )
        .route("/users/me/password", post(handlers::user::change_password))
        .route(
            "/users",
            get(handlers::user::list_users).post(handlers::user::create_user),
        )
        .route("/users/:id", get(handlers::user::get_user))
        .route("/users/:id/status", patch(handlers::user::set_user_status))
        .route("/users/:id/role", patch(handlers::user::set_user_role))
        .route(
            "/organizations",
            get(handlers::org::list_organizations).post(handlers::org::create_organization),
        )
        .route(
            "/organizations/:id",
            get(handlers::org::get_organization)
                .patch(handlers::org::update_organization)
                .delete(handlers::org::delete_organization),
        )
        .route("/organizations/:id/members", post(handlers::org::add_member))
        .route(
            "/organizations/:id/members/:user_id",
            patch(handlers::org::update_member).delete(handlers::org::remove_member),
        )
        .route(
            "/content/:kind",
            get(handlers::content::list_content).post(handlers::content::create_content),
        )
        .route(
            "/content/:kind/:id",
            get(handlers::content::get_content)
                .patch(handlers::content::update_content)
                .delete(handlers::content::delete_content),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let mut app = Router::new().merge(public_routes).merge(protected_routes);

    if state.config.swagger_enabled() {
        app = app.merge(SwaggerUi::new("/docs").url("/.well-known/openapi.json", ApiDoc::openapi()));
    } else {
        tracing::info!("Swagger UI disabled");
    }

    let origins = &state.config.security.allowed_origins;
    let allowed_origins = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        origins
            .iter()
            .map(|origin| {
                origin.parse::<HeaderValue>().map_err(|e| {
                    AppError::ConfigError(anyhow::anyhow!("Invalid CORS origin '{}': {}", origin, e))
                })
            })
            .collect::<Result<Vec<_>, _>>()?
            .into()
    };

    let ip_limiter = state.ip_rate_limiter.clone();

    let app = app
        .with_state(state)
        .layer(from_fn_with_state(ip_limiter, ip_rate_limit_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(allowed_origins)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
        );

    Ok(app)
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 503, description = "Store is unreachable")
    ),
    tag = "Observability"
)]
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.store.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Store health check failed");
        AppError::ServiceUnavailable
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "store": "up"
        }
    })))
}
