//! Request and response bodies for the authentication endpoints
//!
//! Request fields default to empty strings so a missing field is reported by
//! validation rather than as a deserialization failure.

use super::jwt::TokenPair;
use authgate_core::validation::{validate_email, validate_password, validate_username};
use authgate_core::User;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

fn check_username(username: &str) -> Result<(), ValidationError> {
    validate_username(username).map_err(|e| e.into_validation_error())
}

fn check_email(email: &str) -> Result<(), ValidationError> {
    validate_email(email).map_err(|e| e.into_validation_error())
}

fn check_password(password: &str) -> Result<(), ValidationError> {
    validate_password(password).map_err(|e| e.into_validation_error())
}

/// `POST /register` body
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(custom(function = "check_username"))]
    #[schema(example = "alice")]
    pub username: String,

    #[serde(default)]
    #[validate(custom(function = "check_email"))]
    #[schema(example = "a@x.com")]
    pub email: String,

    #[serde(default)]
    #[validate(custom(function = "check_password"))]
    #[schema(example = "Secret123")]
    pub password: String,
}

/// `POST /login` body
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// `POST /sendResetEmail` body
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ResetEmailRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
}

/// `PUT /updateProfile` body, documentation only
///
/// The handler reads raw bytes so it can tell an empty body from malformed
/// JSON; this type describes the accepted shape.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Tokens issued by register, login and profile update
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub message: String,
    pub tokens: TokenPair,
}

impl AuthResponse {
    pub fn new(message: impl Into<String>, tokens: TokenPair) -> Self {
        Self {
            message: message.into(),
            tokens,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefreshResponse {
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Public view of an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserDetails {
    pub username: String,
    pub email: String,
}

impl From<&User> for UserDetails {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WhoamiResponse {
    pub message: String,
    pub user_details: UserDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResetEmailDetails {
    pub email: String,
    /// Only present when the server is configured to expose reset links
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation_link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResetEmailResponse {
    pub message: String,
    pub details: ResetEmailDetails,
}
