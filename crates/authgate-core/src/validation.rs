//! Field validation for account data
//!
//! Every check here is pure: it inspects a value and reports the first
//! problem it finds. Callers validate a whole change set before touching any
//! record, so a late failure never leaves a half-applied update behind.

use crate::ProfileChanges;
use serde::Serialize;
use std::borrow::Cow;
use thiserror::Error;
use validator::{ValidateEmail, ValidationError};

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 32;
pub const EMAIL_MAX_LEN: usize = 254;
pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_MAX_LEN: usize = 128;

/// The first field that failed validation, with a client-facing message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{field}: {message}")]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }

    /// Convert into a `validator` error so the same rules can back `#[validate(custom)]`
    pub fn into_validation_error(self) -> ValidationError {
        let mut err = ValidationError::new(self.field);
        err.message = Some(Cow::Owned(self.message));
        err
    }
}

/// Usernames: 3-32 characters of ASCII letters, digits, `_`, `.` or `-`
pub fn validate_username(username: &str) -> Result<(), FieldError> {
    let len = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(FieldError::new(
            "username",
            format!("Username must be between {USERNAME_MIN_LEN} and {USERNAME_MAX_LEN} characters"),
        ));
    }

    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(FieldError::new(
            "username",
            "Username may only contain letters, digits, '_', '.' and '-'",
        ));
    }

    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), FieldError> {
    if email.is_empty() {
        return Err(FieldError::new("email", "Email is required"));
    }

    if email.len() > EMAIL_MAX_LEN || !email.validate_email() {
        return Err(FieldError::new("email", "Invalid email address"));
    }

    Ok(())
}

/// Passwords: 8-128 characters with at least one letter and one digit
pub fn validate_password(password: &str) -> Result<(), FieldError> {
    let len = password.chars().count();
    if len < PASSWORD_MIN_LEN {
        return Err(FieldError::new(
            "password",
            format!("Password must be at least {PASSWORD_MIN_LEN} characters long"),
        ));
    }
    if len > PASSWORD_MAX_LEN {
        return Err(FieldError::new(
            "password",
            format!("Password must be at most {PASSWORD_MAX_LEN} characters long"),
        ));
    }

    if !password.chars().any(|c| c.is_alphabetic()) {
        return Err(FieldError::new(
            "password",
            "Password must contain at least one letter",
        ));
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(FieldError::new(
            "password",
            "Password must contain at least one digit",
        ));
    }

    Ok(())
}

/// Validate every supplied field of a profile update
///
/// Fields are checked in the order username, email, password; the first
/// failure is returned. Absent fields are skipped.
pub fn validate_profile_changes(changes: &ProfileChanges) -> Result<(), FieldError> {
    if let Some(username) = &changes.username {
        validate_username(username)?;
    }
    if let Some(email) = &changes.email {
        validate_email(email)?;
    }
    if let Some(password) = &changes.password {
        validate_password(password)?;
    }
    Ok(())
}
