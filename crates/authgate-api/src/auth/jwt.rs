//! JWT token generation and validation
//!
//! Access and refresh tokens are HS256-signed JWTs whose subject is the
//! account email. Every token carries a unique `jti` so it can be revoked
//! individually, and a `type` claim so a refresh token can never stand in
//! for an access token (and vice versa).

use authgate_core::JwtSettings;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

/// Lifetime of password-reset tokens
pub const RESET_TOKEN_EXPIRATION_SECS: u64 = 10 * 60;

/// Kind of token, written to the `type` claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims embedded in every token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Token issuer
    pub iss: String,
    /// Identity - the account email
    pub sub: String,
    /// Unique token identifier, the revocation key
    pub jti: String,
    /// Issued at (Unix epoch seconds)
    pub iat: u64,
    /// Not before (Unix epoch seconds)
    pub nbf: u64,
    /// Expiration (Unix epoch seconds)
    pub exp: u64,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    /// Account username at issuance time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// JWT token generation and validation errors
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode JWT: {0}")]
    EncodingError(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid token format")]
    InvalidToken,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("System time error: {0}")]
    SystemTimeError(#[from] std::time::SystemTimeError),
}

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret key for HMAC signing
    pub secret: String,
    /// Token issuer identifier
    pub issuer: String,
    /// Access token lifetime in seconds
    pub access_expiration_secs: u64,
    /// Refresh token lifetime in seconds
    pub refresh_expiration_secs: u64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self::from(&JwtSettings::default())
    }
}

impl From<&JwtSettings> for JwtConfig {
    fn from(settings: &JwtSettings) -> Self {
        Self {
            secret: settings.secret.clone(),
            issuer: settings.issuer.clone(),
            access_expiration_secs: settings.access_expiration_secs,
            refresh_expiration_secs: settings.refresh_expiration_secs,
        }
    }
}

impl JwtConfig {
    fn default_lifetime(&self, token_type: TokenType) -> u64 {
        match token_type {
            TokenType::Access => self.access_expiration_secs,
            TokenType::Refresh => self.refresh_expiration_secs,
        }
    }
}

/// Access and refresh token issued together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

fn now_secs() -> Result<u64, JwtError> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

/// Sign a token of the given type
///
/// `lifetime_secs` overrides the configured lifetime for this token type.
pub fn generate_token(
    config: &JwtConfig,
    token_type: TokenType,
    identity: &str,
    username: Option<&str>,
    lifetime_secs: Option<u64>,
) -> Result<String, JwtError> {
    let now = now_secs()?;
    let lifetime = lifetime_secs.unwrap_or_else(|| config.default_lifetime(token_type));

    let claims = Claims {
        iss: config.issuer.clone(),
        sub: identity.to_string(),
        jti: Uuid::new_v4().to_string(),
        iat: now,
        nbf: now,
        exp: now.saturating_add(lifetime),
        token_type,
        username: username.map(str::to_string),
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )?;

    Ok(token)
}

pub fn generate_access_token(
    config: &JwtConfig,
    identity: &str,
    username: Option<&str>,
) -> Result<String, JwtError> {
    generate_token(config, TokenType::Access, identity, username, None)
}

pub fn generate_refresh_token(
    config: &JwtConfig,
    identity: &str,
    username: Option<&str>,
) -> Result<String, JwtError> {
    generate_token(config, TokenType::Refresh, identity, username, None)
}

/// Short-lived access token embedded in password-reset links; identity only
pub fn generate_reset_token(config: &JwtConfig, identity: &str) -> Result<String, JwtError> {
    generate_token(
        config,
        TokenType::Access,
        identity,
        None,
        Some(RESET_TOKEN_EXPIRATION_SECS),
    )
}

/// Issue an access + refresh pair, both carrying the username claim
pub fn generate_token_pair(
    config: &JwtConfig,
    identity: &str,
    username: &str,
) -> Result<TokenPair, JwtError> {
    Ok(TokenPair {
        access_token: generate_access_token(config, identity, Some(username))?,
        refresh_token: generate_refresh_token(config, identity, Some(username))?,
    })
}

/// Verify signature, issuer and expiry, returning the claims
///
/// The token type is not checked here; callers decide which types they accept.
pub fn validate_token(config: &JwtConfig, token: &str) -> Result<Claims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);
    validation.validate_nbf = true;
    validation.leeway = 0;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::ExpiredToken,
        jsonwebtoken::errors::ErrorKind::InvalidSignature => JwtError::InvalidSignature,
        _ => JwtError::InvalidToken,
    })?;

    Ok(token_data.claims)
}
