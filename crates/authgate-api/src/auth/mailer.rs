//! Outbound email for password-reset links
//!
//! [`Mailer`] is the seam the service talks to. [`SmtpMailer`] delivers over
//! an authenticated STARTTLS relay using the sender credentials from the
//! mail configuration.

use authgate_core::MailConfig;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Missing mail configuration: {0}")]
    MissingCredentials(&'static str),

    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// A plain-text email ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl OutgoingEmail {
    /// The password-recovery message sent by `/sendResetEmail`
    pub fn password_reset(to: impl Into<String>, reset_link: &str) -> Self {
        Self {
            to: to.into(),
            subject: "Password recovery".to_string(),
            body: format!(
                "To reset your password, follow this link: {reset_link}\n\n\
                 The link expires in 10 minutes. If you did not request a reset, ignore this email."
            ),
        }
    }
}

/// Delivers outgoing email
#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// SMTP delivery through an authenticated STARTTLS relay
#[derive(Debug, Clone)]
pub struct SmtpMailer {
    host: String,
    port: u16,
    sender_email: Option<String>,
    sender_password: Option<String>,
}

impl SmtpMailer {
    pub fn from_config(config: &MailConfig) -> Self {
        Self {
            host: config.smtp_host.clone(),
            port: config.smtp_port,
            sender_email: config.sender_email.clone(),
            sender_password: config.sender_password.clone(),
        }
    }

    fn sender(&self) -> Result<&str, MailError> {
        self.sender_email
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(MailError::MissingCredentials("SENDER_EMAIL"))
    }

    fn credentials(&self) -> Result<Credentials, MailError> {
        let sender = self.sender()?;
        let password = self
            .sender_password
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(MailError::MissingCredentials("SENDER_PASSWORD"))?;
        Ok(Credentials::new(sender.to_string(), password.to_string()))
    }

    /// Build the MIME message without sending it
    pub fn build_message(&self, email: &OutgoingEmail) -> Result<Message, MailError> {
        let from = parse_mailbox(self.sender()?)?;
        let to = parse_mailbox(&email.to)?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone())?;

        Ok(message)
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address
        .parse::<Mailbox>()
        .map_err(|e| MailError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })
}

#[async_trait::async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        let message = self.build_message(&email)?;
        let credentials = self.credentials()?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)?
            .port(self.port)
            .credentials(credentials)
            .build();

        transport.send(message).await?;

        tracing::debug!(host = %self.host, to = %email.to, "Email delivered");
        Ok(())
    }

    fn name(&self) -> &str {
        "smtp"
    }
}

/// Mailer that keeps messages in memory instead of delivering them
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: std::sync::Mutex<Vec<OutgoingEmail>>,
    fail_with: Option<String>,
}

#[cfg(any(test, feature = "test-utils"))]
impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose every send fails with the given transport message
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            sent: Default::default(),
            fail_with: Some(reason.into()),
        }
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait::async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        if let Some(reason) = &self.fail_with {
            return Err(MailError::Delivery(reason.clone()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}
