use std::sync::Arc;

use crate::{
    config::CredentialConfig,
    dtos::auth::{AuthResponse, LoginRequest, PasswordResetConfirm, RegisterRequest},
    models::{normalize_email, GrantKind, Identity, Role, TokenGrant, User},
    services::{
        Clock, EmailProvider, GrantEffect, IdentityStore, ServiceError, Store, TokenResponse,
        TokenService,
    },
    utils::{
        generate_random_token, hash_password, hash_token, verify_password, Password,
        PasswordHashString,
    },
};

/// Credential lifecycle: registration, login, single-use grants and the
/// bearer-token check behind the authentication gate.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    email: Arc<dyn EmailProvider>,
    tokens: TokenService,
    clock: Arc<dyn Clock>,
    credentials: CredentialConfig,
}

pub(crate) fn hash_new_password(password: &str) -> Result<String, ServiceError> {
    hash_password(&Password::new(password.to_string()))
        .map(PasswordHashString::into_string)
        .map_err(ServiceError::Internal)
}

impl AuthService {
    pub fn new(
        store: Arc<dyn Store>,
        email: Arc<dyn EmailProvider>,
        tokens: TokenService,
        clock: Arc<dyn Clock>,
        credentials: CredentialConfig,
    ) -> Self {
        Self {
            store,
            email,
            tokens,
            clock,
            credentials,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Create an active, unverified identity with the base role and log it in.
    pub async fn register(&self, req: RegisterRequest) -> Result<AuthResponse, ServiceError> {
        let email = normalize_email(&req.email);
        let password_hash = hash_new_password(&req.password)?;

        let user = User::new(email, password_hash, req.name, Role::User, None);
        self.store.insert_user(&user).await?;

        tracing::info!(user_id = %user.id, "User registered");

        // Registration stands even if the mail relay is down; the user can resend.
        if let Err(e) = self.send_verification(&user).await {
            tracing::warn!(user_id = %user.id, error = %e, "Verification email not sent");
        }

        Ok(AuthResponse {
            token: self.tokens.issue_response(&user.id)?,
            user: user.sanitized(),
        })
    }

    pub async fn login(&self, req: LoginRequest) -> Result<AuthResponse, ServiceError> {
        let email = normalize_email(&req.email);

        let Some(user) = self.store.find_user_by_email(&email).await? else {
            tracing::info!("Login failed: unknown email");
            return Err(ServiceError::Unauthenticated);
        };

        let password_ok = verify_password(
            &Password::new(req.password),
            &PasswordHashString::new(user.password_hash.clone()),
        )
        .unwrap_or_else(|e| {
            tracing::error!(user_id = %user.id, error = %e, "Stored password hash is unreadable");
            false
        });

        if !password_ok {
            tracing::info!(user_id = %user.id, "Login failed: wrong password");
            return Err(ServiceError::Unauthenticated);
        }

        if !user.active {
            tracing::info!(user_id = %user.id, "Login refused: identity deactivated");
            return Err(ServiceError::Unauthenticated);
        }

        self.store.record_login(&user.id, self.clock.now()).await?;
        tracing::info!(user_id = %user.id, "User logged in");

        Ok(AuthResponse {
            token: self.tokens.issue_response(&user.id)?,
            user: user.sanitized(),
        })
    }

    /// Resolve a bearer token to the live identity it is bound to.
    ///
    /// Any failure, including a valid token for a now-inactive identity, is
    /// `Unauthenticated`.
    pub async fn authenticate(&self, token: &str) -> Result<Identity, ServiceError> {
        let user_id = self
            .tokens
            .verify(token)
            .map_err(|_| ServiceError::Unauthenticated)?;

        match self.store.find_user_by_id(&user_id).await? {
            Some(user) if user.active => Ok(Identity::from(&user)),
            Some(_) => {
                tracing::info!(user_id = %user_id, "Token presented for inactive identity");
                Err(ServiceError::Unauthenticated)
            }
            None => {
                tracing::info!(user_id = %user_id, "Token presented for unknown identity");
                Err(ServiceError::Unauthenticated)
            }
        }
    }

    pub async fn verify_email(&self, raw_token: &str) -> Result<(), ServiceError> {
        let user = self
            .store
            .consume_grant(
                GrantKind::EmailVerification,
                &hash_token(raw_token),
                self.clock.now(),
                GrantEffect::MarkVerified,
            )
            .await?
            .ok_or(ServiceError::InvalidOrExpiredToken)?;

        tracing::info!(user_id = %user.id, "Email verified");
        Ok(())
    }

    pub async fn resend_verification(&self, identity: &Identity) -> Result<(), ServiceError> {
        let user = self
            .store
            .find_user_by_id(&identity.id)
            .await?
            .ok_or(ServiceError::NotFound("User"))?;

        if user.verified {
            return Err(ServiceError::Validation("Email already verified".to_string()));
        }

        self.send_verification(&user).await
    }

    /// Issue a reset grant and mail it. Returns the raw token, or `None` when no
    /// active identity has this email; callers must answer both cases alike.
    pub async fn request_password_reset(
        &self,
        email: &str,
    ) -> Result<Option<String>, ServiceError> {
        let email = normalize_email(email);

        let user = match self.store.find_user_by_email(&email).await? {
            Some(user) if user.active => user,
            _ => {
                tracing::info!("Password reset requested for unknown or inactive email");
                return Ok(None);
            }
        };

        let raw = generate_random_token();
        let ttl = self.credentials.password_reset_ttl();
        let grant = TokenGrant::issue(&raw, self.clock.now(), ttl);
        self.store
            .set_grant(&user.id, GrantKind::PasswordReset, &grant)
            .await?;

        self.email
            .send_password_reset_email(&user.email, &raw, &self.credentials.public_base_url, ttl)
            .await?;

        tracing::info!(user_id = %user.id, "Password reset token issued");
        Ok(Some(raw))
    }

    /// Redeem a reset token: one conditional update sets the new hash and
    /// clears the grant, so a token can succeed at most once.
    pub async fn confirm_password_reset(
        &self,
        req: PasswordResetConfirm,
    ) -> Result<TokenResponse, ServiceError> {
        let password_hash = hash_new_password(&req.new_password)?;

        let user = self
            .store
            .consume_grant(
                GrantKind::PasswordReset,
                &hash_token(&req.token),
                self.clock.now(),
                GrantEffect::SetPassword(password_hash),
            )
            .await?
            .ok_or(ServiceError::InvalidOrExpiredToken)?;

        tracing::info!(user_id = %user.id, "Password reset completed");
        self.tokens.issue_response(&user.id)
    }

    pub async fn change_password(
        &self,
        identity: &Identity,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), ServiceError> {
        let user = self
            .store
            .find_user_by_id(&identity.id)
            .await?
            .ok_or(ServiceError::NotFound("User"))?;

        let matches = verify_password(
            &Password::new(current_password.to_string()),
            &PasswordHashString::new(user.password_hash.clone()),
        )
        .map_err(ServiceError::Internal)?;
        if !matches {
            return Err(ServiceError::Validation(
                "Current password is incorrect".to_string(),
            ));
        }

        let password_hash = hash_new_password(new_password)?;
        self.store
            .set_password(&user.id, &password_hash, self.clock.now())
            .await?;

        tracing::info!(user_id = %user.id, "Password changed");
        Ok(())
    }

    async fn send_verification(&self, user: &User) -> Result<(), ServiceError> {
        let raw = generate_random_token();
        let ttl = self.credentials.verification_ttl();
        let grant = TokenGrant::issue(&raw, self.clock.now(), ttl);
        self.store
            .set_grant(&user.id, GrantKind::EmailVerification, &grant)
            .await?;

        self.email
            .send_verification_email(&user.email, &raw, &self.credentials.public_base_url, ttl)
            .await
    }
}
