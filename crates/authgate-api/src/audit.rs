//! Security audit logging for account and token events
//!
//! Every event is emitted at INFO level with the `audit` target so it can be
//! filtered and routed separately from application logs. The event itself is
//! serialized to JSON and attached as the `event` field.
//!
//! ```ignore
//! use authgate_api::audit::{audit_log, AuditEvent};
//!
//! audit_log(&AuditEvent::LoginSuccess {
//!     user_id: user.id,
//!     email: user.email.clone(),
//!     ip_address: Some("192.168.1.1".to_string()),
//!     user_agent: None,
//! });
//! ```

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Security-relevant events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    RegistrationSuccess {
        user_id: Uuid,
        email: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    RegistrationFailure {
        email: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    LoginSuccess {
        user_id: Uuid,
        email: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    LoginFailure {
        email: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// New access token minted from a refresh token
    TokenRefresh {
        email: String,
        ip_address: Option<String>,
    },

    ProfileUpdate {
        user_id: Uuid,
        email: String,
        /// Names of the fields that changed
        fields: Vec<String>,
        ip_address: Option<String>,
    },

    /// A token was added to the revocation ledger
    Logout {
        user_id: Uuid,
        email: String,
        token_type: String,
        ip_address: Option<String>,
    },

    AccountDeletion {
        user_id: Uuid,
        email: String,
        revocations_purged: u64,
        ip_address: Option<String>,
    },

    ResetEmailRequested {
        email: String,
        delivered: bool,
        ip_address: Option<String>,
    },

    /// A protected route rejected the presented token
    InvalidToken {
        ip_address: Option<String>,
        user_agent: Option<String>,
        reason: String,
    },
}

impl AuditEvent {
    /// Short human-readable label used as the log message
    pub fn label(&self) -> &'static str {
        match self {
            AuditEvent::RegistrationSuccess { .. } => "User registered",
            AuditEvent::RegistrationFailure { .. } => "Registration failed",
            AuditEvent::LoginSuccess { .. } => "Login successful",
            AuditEvent::LoginFailure { .. } => "Login failed",
            AuditEvent::TokenRefresh { .. } => "Access token refreshed",
            AuditEvent::ProfileUpdate { .. } => "Profile updated",
            AuditEvent::Logout { .. } => "Token revoked",
            AuditEvent::AccountDeletion { .. } => "Account deleted",
            AuditEvent::ResetEmailRequested { .. } => "Password reset email requested",
            AuditEvent::InvalidToken { .. } => "Invalid token used",
        }
    }

    /// The account email the event concerns, if known
    pub fn email(&self) -> Option<&str> {
        match self {
            AuditEvent::RegistrationSuccess { email, .. }
            | AuditEvent::RegistrationFailure { email, .. }
            | AuditEvent::LoginSuccess { email, .. }
            | AuditEvent::LoginFailure { email, .. }
            | AuditEvent::TokenRefresh { email, .. }
            | AuditEvent::ProfileUpdate { email, .. }
            | AuditEvent::Logout { email, .. }
            | AuditEvent::AccountDeletion { email, .. }
            | AuditEvent::ResetEmailRequested { email, .. } => Some(email),
            AuditEvent::InvalidToken { .. } => None,
        }
    }

    /// Whether the event records a rejected or failed action
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            AuditEvent::RegistrationFailure { .. }
                | AuditEvent::LoginFailure { .. }
                | AuditEvent::InvalidToken { .. }
                | AuditEvent::ResetEmailRequested {
                    delivered: false,
                    ..
                }
        )
    }
}

/// Request metadata attached to audit events
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl AuditContext {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            ip_address: extract_ip_address(headers),
            user_agent: extract_user_agent(headers),
        }
    }
}

/// Log a security audit event with structured fields
pub fn audit_log(event: &AuditEvent) {
    let timestamp: DateTime<Utc> = Utc::now();

    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));

    info!(
        target: "audit",
        timestamp = %timestamp,
        event = %event_json,
        email = event.email().unwrap_or("-"),
        failure = event.is_failure(),
        "{}",
        event.label()
    );
}

/// Client IP from proxy headers
///
/// Prefers the first address of `X-Forwarded-For`, then `X-Real-IP`.
pub fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    if let Some(xff) = headers.get("x-forwarded-for") {
        if let Ok(xff_str) = xff.to_str() {
            if let Some(first_ip) = xff_str.split(',').next() {
                return Some(first_ip.trim().to_string());
            }
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|ip| ip.to_str().ok())
        .map(str::to_string)
}

pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(str::to_string)
}
