use async_trait::async_trait;
use chrono::Duration;
use lettre::{
    message::{header::ContentType, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use secrecy::ExposeSecret;
use std::sync::Mutex;

use super::error::ServiceError;
use crate::config::GmailConfig;

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send_verification_email(
        &self,
        to_email: &str,
        verification_token: &str,
        base_url: &str,
        valid_for: Duration,
    ) -> Result<(), ServiceError>;

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        reset_token: &str,
        base_url: &str,
        valid_for: Duration,
    ) -> Result<(), ServiceError>;
}

/// "24 hours", "10 minutes"
fn describe(valid_for: Duration) -> String {
    let minutes = valid_for.num_minutes();
    if minutes >= 60 && minutes % 60 == 0 {
        let hours = minutes / 60;
        format!("{} hour{}", hours, if hours == 1 { "" } else { "s" })
    } else {
        format!("{} minute{}", minutes, if minutes == 1 { "" } else { "s" })
    }
}

#[derive(Clone)]
pub struct EmailService {
    mailer: SmtpTransport,
    from_email: String,
}

impl EmailService {
    pub fn new(config: &GmailConfig) -> Result<Self, ServiceError> {
        let creds = Credentials::new(
            config.user.clone(),
            config.app_password.expose_secret().clone(),
        );

        let mailer = SmtpTransport::relay("smtp.gmail.com")
            .map_err(|e| ServiceError::Email(e.to_string()))?
            .credentials(creds)
            .port(587)
            .timeout(Some(std::time::Duration::from_secs(10)))
            .build();

        tracing::info!("Email service initialized with Gmail SMTP");

        Ok(Self {
            mailer,
            from_email: config.user.clone(),
        })
    }

    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        plain_body: String,
        html_body: String,
    ) -> Result<(), ServiceError> {
        let address_error = |e: lettre::address::AddressError| ServiceError::Email(e.to_string());

        let email = Message::builder()
            .from(self.from_email.parse().map_err(address_error)?)
            .to(to_email.parse().map_err(address_error)?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(plain_body),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body),
                    ),
            )
            .map_err(|e| ServiceError::Email(e.to_string()))?;

        // SMTP transport is blocking
        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| ServiceError::Internal(e.into()))?;

        match result {
            Ok(_) => {
                tracing::info!(to = %to_email, subject = %subject, "Email sent successfully");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, to = %to_email, "Failed to send email");
                Err(ServiceError::Email(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl EmailProvider for EmailService {
    async fn send_verification_email(
        &self,
        to_email: &str,
        verification_token: &str,
        base_url: &str,
        valid_for: Duration,
    ) -> Result<(), ServiceError> {
        let link = format!("{}/auth/verify?token={}", base_url, verification_token);
        let expiry = describe(valid_for);

        let html_body = format!(
            r###"<html>
    <body style="font-family: Arial, sans-serif;">
        <h2>Confirm your email address</h2>
        <p>Your consulting workspace account is almost ready. Confirm your address to finish setting it up:</p>
        <p>
            <a href="{link}" style="background-color: #1f6feb; color: white; padding: 12px 18px; text-decoration: none; border-radius: 4px;">
                Confirm email
            </a>
        </p>
        <p style="color: #666; font-size: 12px;">
            The link works once and expires in {expiry}. If you did not sign up, ignore this message.
        </p>
    </body>
</html>"###
        );

        let plain_body = format!(
            "Confirm your email address\n\n\
             Your consulting workspace account is almost ready. Open this link to confirm your address:\n\n\
             {link}\n\n\
             The link works once and expires in {expiry}. If you did not sign up, ignore this message."
        );

        self.send_email(to_email, "Confirm your email address", plain_body, html_body)
            .await
    }

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        reset_token: &str,
        base_url: &str,
        valid_for: Duration,
    ) -> Result<(), ServiceError> {
        let link = format!("{}/reset-password?token={}", base_url, reset_token);
        let expiry = describe(valid_for);

        let html_body = format!(
            r###"<html>
    <body style="font-family: Arial, sans-serif;">
        <h2>Reset your password</h2>
        <p>Someone asked to reset the password for this account. Choose a new one here:</p>
        <p>
            <a href="{link}" style="background-color: #1f6feb; color: white; padding: 12px 18px; text-decoration: none; border-radius: 4px;">
                Choose a new password
            </a>
        </p>
        <p style="color: #666; font-size: 12px;">
            The link works once and expires in {expiry}. If this was not you, your password is unchanged.
        </p>
    </body>
</html>"###
        );

        let plain_body = format!(
            "Reset your password\n\n\
             Someone asked to reset the password for this account. Choose a new one here:\n\n\
             {link}\n\n\
             The link works once and expires in {expiry}. If this was not you, your password is unchanged."
        );

        self.send_email(to_email, "Reset your password", plain_body, html_body)
            .await
    }
}

/// A message captured by [`MockEmailService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentEmail {
    Verification { to: String, token: String },
    PasswordReset { to: String, token: String },
}

/// Records outgoing mail instead of sending it.
#[derive(Default)]
pub struct MockEmailService {
    sent: Mutex<Vec<SentEmail>>,
}

impl MockEmailService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    /// Raw token from the most recent reset email to `to`.
    pub fn last_reset_token(&self, to: &str) -> Option<String> {
        self.sent().into_iter().rev().find_map(|mail| match mail {
            SentEmail::PasswordReset { to: addr, token } if addr == to => Some(token),
            _ => None,
        })
    }

    /// Raw token from the most recent verification email to `to`.
    pub fn last_verification_token(&self, to: &str) -> Option<String> {
        self.sent().into_iter().rev().find_map(|mail| match mail {
            SentEmail::Verification { to: addr, token } if addr == to => Some(token),
            _ => None,
        })
    }

    fn record(&self, mail: SentEmail) -> Result<(), ServiceError> {
        self.sent
            .lock()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Mock mailbox poisoned: {}", e)))?
            .push(mail);
        Ok(())
    }
}

#[async_trait]
impl EmailProvider for MockEmailService {
    async fn send_verification_email(
        &self,
        to_email: &str,
        verification_token: &str,
        _base_url: &str,
        _valid_for: Duration,
    ) -> Result<(), ServiceError> {
        self.record(SentEmail::Verification {
            to: to_email.to_string(),
            token: verification_token.to_string(),
        })
    }

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        reset_token: &str,
        _base_url: &str,
        _valid_for: Duration,
    ) -> Result<(), ServiceError> {
        self.record(SentEmail::PasswordReset {
            to: to_email.to_string(),
            token: reset_token.to_string(),
        })
    }
}
