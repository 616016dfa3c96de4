//! API error handling
//!
//! Every failure leaves the server as `{"error": ..., "code": ...}` with an
//! optional `details` object. Internal and database failures are logged in
//! full and answered with a generic message.

use crate::auth::jwt::JwtError;
use crate::auth::password::PasswordError;
use authgate_core::{AuthGateError, FieldError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// API error response body
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Human-readable message
    pub error: String,
    /// Machine-readable error code
    pub code: String,
    /// Per-field messages for validation failures
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub details: Option<Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    /// Request data failed field validation (400)
    Validation {
        message: String,
        details: Option<Value>,
    },
    /// Unique constraint hit, e.g. the email is taken (409)
    Conflict(String),
    /// Referenced user does not exist (404)
    NotFound(String),
    /// Password did not match (400)
    InvalidCredential(String),
    /// Missing or malformed request body (400)
    BadRequest(String),
    Internal(String),
    Database(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. }
            | AppError::InvalidCredential(_)
            | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let error = match self {
            AppError::Validation { message, details } => {
                let error = ApiError::new("VALIDATION_ERROR", message);
                match details {
                    Some(details) => error.with_details(details),
                    None => error,
                }
            }
            AppError::Conflict(msg) => ApiError::new("CONFLICT", msg),
            AppError::NotFound(msg) => ApiError::new("NOT_FOUND", msg),
            AppError::InvalidCredential(msg) => ApiError::new("INVALID_CREDENTIAL", msg),
            AppError::BadRequest(msg) => ApiError::new("BAD_REQUEST", msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                ApiError::new("INTERNAL_ERROR", "Internal server error")
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                ApiError::new("DATABASE_ERROR", "Database operation failed")
            }
        };

        (status, Json(error)).into_response()
    }
}

impl From<FieldError> for AppError {
    fn from(err: FieldError) -> Self {
        let mut details = Map::new();
        details.insert(
            err.field.to_string(),
            Value::Array(vec![Value::String(err.message.clone())]),
        );

        AppError::Validation {
            message: err.message,
            details: Some(Value::Object(details)),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details = Map::new();
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));

        for (field, errs) in fields {
            let messages = errs
                .iter()
                .map(|e| {
                    Value::String(
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string()),
                    )
                })
                .collect();
            details.insert(field.to_string(), Value::Array(messages));
        }

        AppError::Validation {
            message: "Validation failed".to_string(),
            details: Some(Value::Object(details)),
        }
    }
}

impl From<AuthGateError> for AppError {
    fn from(err: AuthGateError) -> Self {
        match err {
            AuthGateError::NotFound(what) => AppError::NotFound(format!("{what} not found")),
            AuthGateError::Conflict(msg) => AppError::Conflict(msg),
            AuthGateError::Validation(field_error) => field_error.into(),
            AuthGateError::DatabaseError(msg) => AppError::Database(msg),
            AuthGateError::Other(err) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<JwtError> for AppError {
    fn from(err: JwtError) -> Self {
        AppError::Internal(format!("Token error: {err}"))
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
