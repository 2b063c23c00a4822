use chrono::Duration;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::fmt::Display;
use std::str::FromStr;

const MIN_PROD_SECRET_BYTES: usize = 32;
const MAX_TOKEN_EXPIRY_MINUTES: i64 = 7 * 24 * 60;
const MAX_VERIFICATION_TTL_HOURS: i64 = 7 * 24;
const MAX_PASSWORD_RESET_TTL_MINUTES: i64 = 24 * 60;

/// Service configuration, read once at startup and passed down explicitly.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub store: StoreBackend,
    pub mongodb: MongoConfig,
    pub token: TokenConfig,
    pub credentials: CredentialConfig,
    /// `None` outside production: mail is captured instead of sent.
    pub gmail: Option<GmailConfig>,
    pub security: SecurityConfig,
    pub swagger: SwaggerConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    /// HS256 signing secret. Rotating it invalidates every issued token.
    pub secret: Secret<String>,
    pub expiry_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CredentialConfig {
    pub verification_ttl_hours: i64,
    pub password_reset_ttl_minutes: i64,
    /// Base URL used in links sent by email.
    pub public_base_url: String,
}

impl CredentialConfig {
    pub fn verification_ttl(&self) -> Duration {
        Duration::hours(self.verification_ttl_hours)
    }

    pub fn password_reset_ttl(&self) -> Duration {
        Duration::minutes(self.password_reset_ttl_minutes)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GmailConfig {
    pub user: String,
    pub app_password: Secret<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwaggerConfig {
    pub enabled: SwaggerMode,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SwaggerMode {
    Public,
    Disabled,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub login_attempts: u32,
    pub login_window_seconds: u64,
    pub register_attempts: u32,
    pub register_window_seconds: u64,
    pub password_reset_attempts: u32,
    pub password_reset_window_seconds: u64,
    pub global_ip_limit: u32,
    pub global_ip_window_seconds: u64,
    /// Key limits on the first `x-forwarded-for` hop. Only safe behind a
    /// proxy that overwrites the header; otherwise the socket peer is used.
    pub trust_forwarded_for: bool,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let environment: Environment = env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "dev".to_string())
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let gmail = match (env::var("GMAIL_USER"), env::var("GMAIL_APP_PASSWORD")) {
            (Ok(user), Ok(app_password)) => Some(GmailConfig {
                user,
                app_password: Secret::new(app_password),
            }),
            _ if is_prod => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "GMAIL_USER and GMAIL_APP_PASSWORD are required in production"
                )))
            }
            _ => None,
        };

        let config = ApiConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("consulting-api"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            store: get_parsed("STORE_BACKEND", "mongo", false)?,
            mongodb: MongoConfig {
                uri: get_env("MONGODB_URI", Some("mongodb://localhost:27017"), is_prod)?,
                database: get_env("MONGODB_DATABASE", Some("consulting"), is_prod)?,
            },
            token: TokenConfig {
                secret: Secret::new(get_env("TOKEN_SECRET", None, is_prod)?),
                expiry_minutes: get_parsed("TOKEN_EXPIRY_MINUTES", "1440", false)?,
            },
            credentials: CredentialConfig {
                verification_ttl_hours: get_parsed("VERIFICATION_TOKEN_TTL_HOURS", "24", false)?,
                password_reset_ttl_minutes: get_parsed(
                    "PASSWORD_RESET_TOKEN_TTL_MINUTES",
                    "10",
                    false,
                )?,
                public_base_url: get_env(
                    "PUBLIC_BASE_URL",
                    Some("http://localhost:3000"),
                    is_prod,
                )?,
            },
            gmail,
            security: SecurityConfig {
                allowed_origins: get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            },
            swagger: SwaggerConfig {
                enabled: get_parsed("ENABLE_SWAGGER", "public", false)?,
            },
            rate_limit: RateLimitConfig {
                login_attempts: get_parsed("RATE_LIMIT_LOGIN_ATTEMPTS", "5", false)?,
                login_window_seconds: get_parsed("RATE_LIMIT_LOGIN_WINDOW_SECONDS", "900", false)?,
                register_attempts: get_parsed("RATE_LIMIT_REGISTER_ATTEMPTS", "3", false)?,
                register_window_seconds: get_parsed(
                    "RATE_LIMIT_REGISTER_WINDOW_SECONDS",
                    "3600",
                    false,
                )?,
                password_reset_attempts: get_parsed(
                    "RATE_LIMIT_PASSWORD_RESET_ATTEMPTS",
                    "3",
                    false,
                )?,
                password_reset_window_seconds: get_parsed(
                    "RATE_LIMIT_PASSWORD_RESET_WINDOW_SECONDS",
                    "3600",
                    false,
                )?,
                global_ip_limit: get_parsed("RATE_LIMIT_GLOBAL_IP_LIMIT", "100", false)?,
                global_ip_window_seconds: get_parsed(
                    "RATE_LIMIT_GLOBAL_IP_WINDOW_SECONDS",
                    "60",
                    false,
                )?,
                trust_forwarded_for: get_parsed("RATE_LIMIT_TRUST_PROXY", "false", false)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if !(1..=MAX_TOKEN_EXPIRY_MINUTES).contains(&self.token.expiry_minutes) {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "TOKEN_EXPIRY_MINUTES must be between 1 and {}",
                MAX_TOKEN_EXPIRY_MINUTES
            )));
        }

        if !(1..=MAX_VERIFICATION_TTL_HOURS).contains(&self.credentials.verification_ttl_hours) {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "VERIFICATION_TOKEN_TTL_HOURS must be between 1 and {}",
                MAX_VERIFICATION_TTL_HOURS
            )));
        }

        if !(1..=MAX_PASSWORD_RESET_TTL_MINUTES)
            .contains(&self.credentials.password_reset_ttl_minutes)
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PASSWORD_RESET_TOKEN_TTL_MINUTES must be between 1 and {}",
                MAX_PASSWORD_RESET_TTL_MINUTES
            )));
        }

        if self.token.secret.expose_secret().is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "TOKEN_SECRET must not be empty"
            )));
        }

        if self.environment == Environment::Prod {
            if self.token.secret.expose_secret().len() < MIN_PROD_SECRET_BYTES {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "TOKEN_SECRET must be at least {} bytes in production",
                    MIN_PROD_SECRET_BYTES
                )));
            }

            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }

            if self.store == StoreBackend::Memory {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "STORE_BACKEND=memory is not allowed in production"
                )));
            }

            if self.swagger.enabled == SwaggerMode::Public {
                tracing::warn!("Swagger is publicly accessible in production");
            }
        }

        Ok(())
    }

    pub fn swagger_enabled(&self) -> bool {
        self.swagger.enabled == SwaggerMode::Public
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn get_parsed<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    get_env(key, Some(default), is_prod)?
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("Invalid {}: {}", key, e)))
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(StoreBackend::Mongo),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(format!("Invalid store backend: {}", s)),
        }
    }
}

impl FromStr for SwaggerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" | "true" => Ok(SwaggerMode::Public),
            "disabled" | "false" => Ok(SwaggerMode::Disabled),
            _ => Err(format!("Invalid swagger mode: {}", s)),
        }
    }
}
