//! authgate core - domain models, store traits, and shared types
//!
//! This crate defines the abstractions the HTTP layer is built on:
//! - User and revocation ledger records
//! - Common error types
//! - Store traits for users and revoked tokens
//! - Pure field validation
//! - Configuration management
//! - An in-memory store for development and tests

pub mod config;
pub mod memory;
pub mod validation;

pub use config::{
    AppConfig, ConfigError, DatabaseConfig, JwtSettings, LoggingConfig, MailConfig, ServerConfig,
};
pub use memory::MemoryStore;
pub use validation::{validate_profile_changes, FieldError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for store and domain operations
#[derive(Error, Debug)]
pub enum AuthGateError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(#[from] FieldError),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AuthGateError>;

// ============================================================================
// Users
// ============================================================================

/// A registered account
///
/// The email is the account identity: it is unique across the store and is
/// what access and refresh tokens carry as their subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    /// Argon2id PHC string, never serialized
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data needed to create a user; the id and timestamps are assigned by the store
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

impl NewUser {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password_hash: password_hash.into(),
        }
    }

    /// Materialize the record with a fresh id and timestamps
    pub fn into_user(self) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Requested profile changes as they arrive from a client
///
/// The password is still plaintext here; it is validated by
/// [`validate_profile_changes`] and hashed before it reaches a store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileChanges {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl ProfileChanges {
    /// True when no field was supplied at all
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none() && self.password.is_none()
    }
}

/// A validated change set, applied by a store in a single write
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

impl UserUpdate {
    /// Apply the change set to an in-memory record
    pub fn apply_to(&self, user: &mut User) {
        if let Some(username) = &self.username {
            user.username = username.clone();
        }
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(hash) = &self.password_hash {
            user.password_hash = hash.clone();
        }
        user.updated_at = Utc::now();
    }
}

// ============================================================================
// Revocation ledger
// ============================================================================

/// A token identifier that was explicitly invalidated
///
/// Entries never expire. They are only removed together with the owning
/// account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokedToken {
    pub jti: String,
    pub user_id: Uuid,
    pub revoked_at: DateTime<Utc>,
}

impl RevokedToken {
    pub fn new(jti: impl Into<String>, user_id: Uuid) -> Self {
        Self {
            jti: jti.into(),
            user_id,
            revoked_at: Utc::now(),
        }
    }
}

// ============================================================================
// Store traits
// ============================================================================

/// Persistence for user records
#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user. Fails with [`AuthGateError::Conflict`] when the email is taken.
    async fn create_user(&self, user: NewUser) -> Result<User>;

    /// Look up a user by email
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Apply all changes in one write. Fails with `NotFound` for an unknown id
    /// and `Conflict` when the new email belongs to another user.
    async fn update_user(&self, id: Uuid, update: UserUpdate) -> Result<User>;

    /// Remove a user record
    async fn delete_user(&self, id: Uuid) -> Result<()>;

    /// Cheap connectivity check used by the readiness probe
    async fn ping(&self) -> Result<()>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Append-only record of revoked token identifiers
#[async_trait::async_trait]
pub trait RevocationLedger: Send + Sync {
    /// Record a revoked jti. Recording the same jti twice is not an error.
    async fn revoke(&self, entry: RevokedToken) -> Result<()>;

    /// Whether a jti has been revoked
    async fn is_revoked(&self, jti: &str) -> Result<bool>;

    /// Delete every entry owned by a user, returning how many were removed
    async fn purge_user(&self, user_id: Uuid) -> Result<u64>;
}

// ============================================================================
// Tests
// ============================================================================
