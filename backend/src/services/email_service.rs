//! Outgoing mail.
//!
//! Uses an async SMTP transport when `SMTP_HOST` is configured; otherwise
//! messages are written to the log so links remain usable in development.

use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;

use crate::config::SmtpConfig;
use crate::error::{AppError, Result};

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// Build the mailer for the given configuration.
pub fn build_mailer(smtp: Option<&SmtpConfig>) -> Result<Arc<dyn Mailer>> {
    match smtp {
        Some(config) => Ok(Arc::new(SmtpMailer::new(config)?)),
        None => Ok(Arc::new(LogMailer)),
    }
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| AppError::Config(format!("Invalid SMTP host: {}", e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };
        let mut builder = builder.port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|e| AppError::Mail(format!("Invalid sender address: {}", e)))?,
            )
            .to(to
                .parse()
                .map_err(|e| AppError::Mail(format!("Invalid recipient {}: {}", to, e)))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| AppError::Mail(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| AppError::Mail(e.to_string()))?;

        tracing::info!(to = %to, subject = %subject, "Email sent");
        Ok(())
    }
}

/// Development mailer: logs the message instead of sending it.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        tracing::info!(to = %to, subject = %subject, body = %body, "SMTP not configured, email logged");
        Ok(())
    }
}

/// Send without failing the caller; errors become warnings.
pub async fn send_best_effort(mailer: &dyn Mailer, to: &str, subject: &str, body: &str) {
    if let Err(e) = mailer.send(to, subject, body).await {
        tracing::warn!(to = %to, subject = %subject, "Email delivery failed: {}", e);
    }
}

/// Best-effort notification sender shared by the workflow services.
#[derive(Clone)]
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    base_url: String,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>, base_url: impl Into<String>) -> Self {
        Self {
            mailer,
            base_url: base_url.into(),
        }
    }

    pub fn mailer(&self) -> &dyn Mailer {
        self.mailer.as_ref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn login_url(&self) -> String {
        format!("{}/api/v1/auth/login", self.base_url)
    }

    /// Send when the recipient has an address; failures are only logged.
    pub async fn notify(&self, to: Option<&str>, subject: &str, body: &str) {
        match to {
            Some(address) if !address.is_empty() => {
                send_best_effort(self.mailer.as_ref(), address, subject, body).await
            }
            _ => tracing::debug!(subject = %subject, "Notification skipped, recipient has no email"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_mailer_always_succeeds() {
        let mailer = build_mailer(None).unwrap();
        mailer
            .send("student@campus.edu", "Hello", "Body")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_smtp_mailer_builds_without_connecting() {
        let config = SmtpConfig {
            host: "localhost".into(),
            port: 2525,
            username: None,
            password: None,
            from_address: "noreply@campus.edu".into(),
            use_tls: false,
        };
        assert!(SmtpMailer::new(&config).is_ok());
    }
}
