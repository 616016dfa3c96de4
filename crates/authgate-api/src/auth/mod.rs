//! Authentication module
//!
//! - Token generation and validation (`jwt`)
//! - Password hashing with Argon2id (`password`)
//! - Token verification middleware with revocation checks (`middleware`)
//! - Endpoint business logic (`service`)
//! - Request/response bodies (`models`)
//! - PostgreSQL user store and revocation ledger (`repository`)
//! - Password-reset email delivery (`mailer`)

pub mod jwt;
pub mod mailer;
pub mod middleware;
pub mod models;
pub mod password;
pub mod repository;
pub mod service;

pub use jwt::{Claims, JwtConfig, JwtError, TokenPair, TokenType};
#[cfg(any(test, feature = "test-utils"))]
pub use mailer::RecordingMailer;
pub use mailer::{MailError, Mailer, OutgoingEmail, SmtpMailer};
pub use middleware::{
    require_access, require_any, require_refresh, AuthError, AuthenticatedToken,
    TokenRequirement,
};
pub use models::{
    AuthResponse, LoginRequest, MessageResponse, RefreshResponse, RegisterRequest,
    ResetEmailRequest, ResetEmailResponse, UpdateProfileRequest, UserDetails, WhoamiResponse,
};
pub use password::{hash_password, verify_password, PasswordError};
pub use repository::PgStore;
pub use service::{AuthService, ResetLinkSettings};
