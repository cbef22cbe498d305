//! Password-reset mail delivery over SMTP.
//!
//! The transport is built once at startup from [`SmtpConfig`] and shared
//! through the application state as an `Arc<dyn Mailer>`. When `SMTP_HOST`
//! is unset there is no mailer and reset requests skip delivery.

use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

const DEFAULT_SMTP_PORT: u16 = 587;

const DEFAULT_FROM_ADDRESS: &str = "noreply@localhost";

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Email build error: {0}")]
    Build(String),
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub from_address: String,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Implicit TLS instead of STARTTLS.
    pub secure: bool,
}

impl SmtpConfig {
    /// `None` when `SMTP_HOST` is not set.
    ///
    /// | Variable      | Default             |
    /// |---------------|---------------------|
    /// | `SMTP_HOST`   | required            |
    /// | `SMTP_PORT`   | `587`               |
    /// | `SMTP_FROM`   | `noreply@localhost` |
    /// | `SMTP_USER`   | none                |
    /// | `SMTP_PASS`   | none                |
    /// | `SMTP_SECURE` | `false`             |
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("SMTP_HOST").ok().filter(|h| !h.trim().is_empty())?;
        Some(Self {
            host,
            port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            from_address: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string()),
            user: std::env::var("SMTP_USER").ok(),
            password: std::env::var("SMTP_PASS").ok(),
            secure: std::env::var("SMTP_SECURE").is_ok_and(|v| v == "true"),
        })
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_password_reset(
        &self,
        to: &str,
        token: &str,
        reset_link: &str,
    ) -> Result<(), MailError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let builder = if config.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
        };
        let mut builder = builder.port(config.port);

        if let (Some(user), Some(pass)) = (&config.user, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_password_reset(
        &self,
        to: &str,
        token: &str,
        reset_link: &str,
    ) -> Result<(), MailError> {
        let email = Message::builder()
            .from(self.from_address.parse()?)
            .to(to.parse()?)
            .subject("Password Reset Request")
            .header(ContentType::TEXT_HTML)
            .body(reset_email_body(token, reset_link))
            .map_err(|e| MailError::Build(e.to_string()))?;

        self.transport.send(email).await?;

        tracing::info!(to, "Password reset email sent");
        Ok(())
    }
}

fn reset_email_body(token: &str, reset_link: &str) -> String {
    let link = html_escape::encode_double_quoted_attribute(reset_link);
    let token = html_escape::encode_text(token);
    format!(
        "<h2>Password Reset Request</h2>\n\
         <p>Click this link to reset your password:</p>\n\
         <p><a href=\"{link}\">Reset Password</a></p>\n\
         <p>Or use this token: <code>{token}</code></p>\n"
    )
}
