//! Token verification middleware for protected routes
//!
//! Each protected route is wrapped in one of [`require_access`],
//! [`require_refresh`] or [`require_any`]. The middleware reads the bearer
//! token, verifies signature, issuer and expiry, checks the token type,
//! consults the revocation ledger and finally inserts an
//! [`AuthenticatedToken`] into the request extensions.

use super::jwt::{validate_token, Claims, JwtError, TokenType};
use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// A verified, non-revoked token
///
/// Handlers extract it with `Extension<AuthenticatedToken>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedToken {
    /// The account email the token was issued for
    pub identity: String,
    pub username: Option<String>,
    pub jti: String,
    pub token_type: TokenType,
    /// Issued at (Unix epoch seconds)
    pub issued_at: u64,
    /// Expiration (Unix epoch seconds)
    pub expires_at: u64,
}

impl From<Claims> for AuthenticatedToken {
    fn from(claims: Claims) -> Self {
        Self {
            identity: claims.sub,
            username: claims.username,
            jti: claims.jti,
            token_type: claims.token_type,
            issued_at: claims.iat,
            expires_at: claims.exp,
        }
    }
}

/// Token types a route accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRequirement {
    Access,
    Refresh,
    Any,
}

impl TokenRequirement {
    fn check(self, token_type: TokenType) -> Result<(), AuthError> {
        match (self, token_type) {
            (TokenRequirement::Any, _)
            | (TokenRequirement::Access, TokenType::Access)
            | (TokenRequirement::Refresh, TokenType::Refresh) => Ok(()),
            (TokenRequirement::Access, _) => Err(AuthError::WrongTokenType(TokenType::Access)),
            (TokenRequirement::Refresh, _) => Err(AuthError::WrongTokenType(TokenType::Refresh)),
        }
    }
}

/// Authentication middleware errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingAuthHeader,

    #[error("Invalid Authorization header format")]
    InvalidAuthHeader,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("Invalid token: {0}")]
    InvalidToken(JwtError),

    #[error("Only {0} tokens are allowed")]
    WrongTokenType(TokenType),

    #[error("Token has been revoked")]
    TokenRevoked,

    #[error("Revocation ledger unavailable: {0}")]
    LedgerUnavailable(String),
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::ExpiredToken => AuthError::ExpiredToken,
            other => AuthError::InvalidToken(other),
        }
    }
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingAuthHeader
            | AuthError::InvalidAuthHeader
            | AuthError::ExpiredToken
            | AuthError::TokenRevoked => StatusCode::UNAUTHORIZED,
            AuthError::InvalidToken(_) | AuthError::WrongTokenType(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AuthError::LedgerUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match &self {
            AuthError::InvalidToken(_) => ApiError::new("INVALID_TOKEN", "Invalid token"),
            AuthError::WrongTokenType(_) => ApiError::new("INVALID_TOKEN", self.to_string()),
            AuthError::LedgerUnavailable(msg) => {
                tracing::error!(error = %msg, "Revocation check failed");
                ApiError::new("INTERNAL_ERROR", "Internal server error")
            }
            _ => ApiError::new("UNAUTHORIZED", self.to_string()),
        };

        (status, Json(error)).into_response()
    }
}

/// Pull the token out of `Authorization: Bearer <token>`
fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::InvalidAuthHeader)
}

/// Run every check and return the verified token
pub async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
    requirement: TokenRequirement,
) -> Result<AuthenticatedToken, AuthError> {
    let rejected = |err: AuthError| {
        audit_log(&AuditEvent::InvalidToken {
            ip_address: extract_ip_address(headers),
            user_agent: extract_user_agent(headers),
            reason: err.to_string(),
        });
        err
    };

    let token = bearer_token(headers)?;

    let claims = validate_token(state.auth.jwt_config(), token)
        .map_err(|e| rejected(AuthError::from(e)))?;

    requirement.check(claims.token_type).map_err(rejected)?;

    let revoked = state
        .auth
        .is_revoked(&claims.jti)
        .await
        .map_err(|e| AuthError::LedgerUnavailable(e.to_string()))?;
    if revoked {
        return Err(rejected(AuthError::TokenRevoked));
    }

    Ok(AuthenticatedToken::from(claims))
}

async fn authorize(
    state: &AppState,
    mut request: Request,
    next: Next,
    requirement: TokenRequirement,
) -> Result<Response, AuthError> {
    let token = authenticate(state, request.headers(), requirement).await?;
    request.extensions_mut().insert(token);

    Ok(next.run(request).await)
}

/// Accept only access tokens
///
/// ```ignore
/// use axum::{middleware, routing::get, Router};
///
/// let protected = Router::new()
///     .route("/whoami", get(whoami_handler))
///     .route_layer(middleware::from_fn_with_state(state.clone(), require_access));
/// ```
pub async fn require_access(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    authorize(&state, request, next, TokenRequirement::Access).await
}

/// Accept only refresh tokens
pub async fn require_refresh(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    authorize(&state, request, next, TokenRequirement::Refresh).await
}

/// Accept either token type
pub async fn require_any(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    authorize(&state, request, next, TokenRequirement::Any).await
}
