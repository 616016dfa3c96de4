//! Authentication service layer
//!
//! Business logic behind every endpoint: registration, login, token refresh,
//! profile update, logout, account deletion, whoami and password-reset email.
//! Storage and delivery go through the [`UserStore`], [`RevocationLedger`]
//! and [`Mailer`] traits so the same service runs against PostgreSQL in
//! production and in-memory fakes in tests.

use super::jwt::{generate_access_token, generate_reset_token, generate_token_pair, JwtConfig};
use super::mailer::{Mailer, OutgoingEmail};
use super::middleware::AuthenticatedToken;
use super::models::{
    AuthResponse, LoginRequest, MessageResponse, RefreshResponse, RegisterRequest,
    ResetEmailDetails, ResetEmailRequest, ResetEmailResponse, UserDetails, WhoamiResponse,
};
use super::password::{hash_password, verify_password};
use crate::audit::{audit_log, AuditContext, AuditEvent};
use crate::error::AppError;
use authgate_core::{
    validate_profile_changes, MailConfig, NewUser, ProfileChanges, RevocationLedger, RevokedToken,
    User, UserStore, UserUpdate,
};
use std::sync::Arc;
use validator::Validate;

const UNKNOWN_EMAIL: &str = "User with this email is not registered";
const USER_NOT_FOUND: &str = "User not found";

/// Where password-reset links point and whether responses echo them
#[derive(Debug, Clone)]
pub struct ResetLinkSettings {
    pub link_base: String,
    pub expose_link: bool,
}

impl From<&MailConfig> for ResetLinkSettings {
    fn from(config: &MailConfig) -> Self {
        Self {
            link_base: config.reset_link_base.trim_end_matches('/').to_string(),
            expose_link: config.expose_reset_link,
        }
    }
}

impl ResetLinkSettings {
    pub fn link_for(&self, token: &str) -> String {
        format!("{}/{token}", self.link_base)
    }
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    ledger: Arc<dyn RevocationLedger>,
    mailer: Arc<dyn Mailer>,
    jwt_config: JwtConfig,
    reset: ResetLinkSettings,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        ledger: Arc<dyn RevocationLedger>,
        mailer: Arc<dyn Mailer>,
        jwt_config: JwtConfig,
        reset: ResetLinkSettings,
    ) -> Self {
        Self {
            users,
            ledger,
            mailer,
            jwt_config,
            reset,
        }
    }

    pub fn jwt_config(&self) -> &JwtConfig {
        &self.jwt_config
    }

    pub fn users(&self) -> &Arc<dyn UserStore> {
        &self.users
    }

    /// Whether a token identifier is in the revocation ledger
    pub async fn is_revoked(&self, jti: &str) -> authgate_core::Result<bool> {
        self.ledger.is_revoked(jti).await
    }

    async fn find_user(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.users.find_by_email(email).await?)
    }

    /// Resolve the identity carried by a verified token
    ///
    /// A token issued before the account was created belongs to an earlier
    /// holder of the same email and resolves to nothing.
    async fn resolve(&self, token: &AuthenticatedToken) -> Result<User, AppError> {
        let not_found = || AppError::NotFound(USER_NOT_FOUND.to_string());
        let user = self.find_user(&token.identity).await?.ok_or_else(not_found)?;

        let issued_at = i64::try_from(token.issued_at).unwrap_or(i64::MAX);
        if issued_at < user.created_at.timestamp() {
            tracing::debug!(user_id = %user.id, "Token predates account");
            return Err(not_found());
        }

        Ok(user)
    }

    /// Create an account and log it in
    ///
    /// The email must be unused; on success both tokens carry the email as
    /// identity and the username as a claim.
    pub async fn register(
        &self,
        request: RegisterRequest,
        ctx: &AuditContext,
    ) -> Result<AuthResponse, AppError> {
        if let Err(errors) = request.validate() {
            audit_log(&AuditEvent::RegistrationFailure {
                email: request.email.clone(),
                reason: "Validation failed".to_string(),
                ip_address: ctx.ip_address.clone(),
                user_agent: ctx.user_agent.clone(),
            });
            return Err(errors.into());
        }

        if self.find_user(&request.email).await?.is_some() {
            audit_log(&AuditEvent::RegistrationFailure {
                email: request.email.clone(),
                reason: "User already exists".to_string(),
                ip_address: ctx.ip_address.clone(),
                user_agent: ctx.user_agent.clone(),
            });
            return Err(AppError::Conflict("User already exists".to_string()));
        }

        let password_hash = hash_password(&request.password)?;
        let user = self
            .users
            .create_user(NewUser::new(request.username, request.email, password_hash))
            .await?;

        let tokens = generate_token_pair(&self.jwt_config, &user.email, &user.username)?;

        audit_log(&AuditEvent::RegistrationSuccess {
            user_id: user.id,
            email: user.email.clone(),
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
        });

        Ok(AuthResponse::new("User created and logged in successfully", tokens))
    }

    /// Check credentials and issue a token pair
    pub async fn login(
        &self,
        request: LoginRequest,
        ctx: &AuditContext,
    ) -> Result<AuthResponse, AppError> {
        request.validate()?;

        let login_failure = |reason: &str| AuditEvent::LoginFailure {
            email: request.email.clone(),
            reason: reason.to_string(),
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
        };

        let Some(user) = self.find_user(&request.email).await? else {
            audit_log(&login_failure("Unknown email"));
            return Err(AppError::NotFound(UNKNOWN_EMAIL.to_string()));
        };

        if !verify_password(&request.password, &user.password_hash)? {
            audit_log(&login_failure("Invalid password"));
            return Err(AppError::InvalidCredential("Invalid password".to_string()));
        }

        let tokens = generate_token_pair(&self.jwt_config, &user.email, &user.username)?;

        audit_log(&AuditEvent::LoginSuccess {
            user_id: user.id,
            email: user.email.clone(),
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
        });

        Ok(AuthResponse::new("Logged in successfully", tokens))
    }

    /// Mint a new access token from a verified refresh token
    ///
    /// The username claim is copied from the refresh token as is; the store
    /// is not consulted.
    pub async fn refresh(
        &self,
        token: &AuthenticatedToken,
        ctx: &AuditContext,
    ) -> Result<RefreshResponse, AppError> {
        let access_token = generate_access_token(
            &self.jwt_config,
            &token.identity,
            token.username.as_deref(),
        )?;

        audit_log(&AuditEvent::TokenRefresh {
            email: token.identity.clone(),
            ip_address: ctx.ip_address.clone(),
        });

        Ok(RefreshResponse { access_token })
    }

    /// Apply a partial profile update
    ///
    /// `body` is the raw request body. Every supplied field is validated
    /// before anything is written, and all changes land in a single store
    /// update, so a rejected request leaves the record untouched.
    pub async fn update_profile(
        &self,
        token: &AuthenticatedToken,
        body: &[u8],
        ctx: &AuditContext,
    ) -> Result<AuthResponse, AppError> {
        let user = self.resolve(token).await?;
        let changes = parse_profile_changes(body)?;

        validate_profile_changes(&changes)?;

        let mut fields = Vec::new();
        let mut update = UserUpdate::default();

        if let Some(username) = changes.username {
            fields.push("username".to_string());
            update.username = Some(username);
        }

        if let Some(email) = changes.email {
            if email != user.email {
                if let Some(other) = self.find_user(&email).await? {
                    if other.id != user.id {
                        return Err(AppError::Conflict("Email already in use".to_string()));
                    }
                }
            }
            fields.push("email".to_string());
            update.email = Some(email);
        }

        if let Some(password) = changes.password {
            fields.push("password".to_string());
            update.password_hash = Some(hash_password(&password)?);
        }

        let updated = self.users.update_user(user.id, update).await?;
        let tokens = generate_token_pair(&self.jwt_config, &updated.email, &updated.username)?;

        audit_log(&AuditEvent::ProfileUpdate {
            user_id: updated.id,
            email: updated.email.clone(),
            fields,
            ip_address: ctx.ip_address.clone(),
        });

        Ok(AuthResponse::new("User profile updated successfully", tokens))
    }

    /// Record the presented token in the revocation ledger
    pub async fn logout(
        &self,
        token: &AuthenticatedToken,
        ctx: &AuditContext,
    ) -> Result<MessageResponse, AppError> {
        let user = self.resolve(token).await?;

        self.ledger
            .revoke(RevokedToken::new(&token.jti, user.id))
            .await?;

        audit_log(&AuditEvent::Logout {
            user_id: user.id,
            email: user.email.clone(),
            token_type: token.token_type.to_string(),
            ip_address: ctx.ip_address.clone(),
        });

        Ok(MessageResponse::new(format!(
            "{} token revoked successfully",
            token.token_type
        )))
    }

    /// Remove the account and every ledger entry it owns
    ///
    /// Ledger entries go first since they reference the user row.
    pub async fn delete_account(
        &self,
        token: &AuthenticatedToken,
        ctx: &AuditContext,
    ) -> Result<MessageResponse, AppError> {
        let user = self.resolve(token).await?;

        let purged = self.ledger.purge_user(user.id).await?;
        self.users.delete_user(user.id).await?;

        audit_log(&AuditEvent::AccountDeletion {
            user_id: user.id,
            email: user.email.clone(),
            revocations_purged: purged,
            ip_address: ctx.ip_address.clone(),
        });

        Ok(MessageResponse::new(format!(
            "User profile {} deleted successfully",
            user.username
        )))
    }

    pub async fn whoami(&self, token: &AuthenticatedToken) -> Result<WhoamiResponse, AppError> {
        let user = self.resolve(token).await?;

        Ok(WhoamiResponse {
            message: "User details retrieved".to_string(),
            user_details: UserDetails::from(&user),
        })
    }

    /// Email a short-lived reset link to a registered address
    ///
    /// Delivery failures are logged with their cause; the client only sees
    /// a generic message.
    pub async fn send_reset_email(
        &self,
        request: ResetEmailRequest,
        ctx: &AuditContext,
    ) -> Result<ResetEmailResponse, AppError> {
        request.validate()?;

        let user = self
            .find_user(&request.email)
            .await?
            .ok_or_else(|| AppError::NotFound(UNKNOWN_EMAIL.to_string()))?;

        let token = generate_reset_token(&self.jwt_config, &user.email)?;
        let link = self.reset.link_for(&token);

        let delivery = self
            .mailer
            .send(OutgoingEmail::password_reset(&user.email, &link))
            .await;

        audit_log(&AuditEvent::ResetEmailRequested {
            email: user.email.clone(),
            delivered: delivery.is_ok(),
            ip_address: ctx.ip_address.clone(),
        });

        if let Err(e) = delivery {
            tracing::error!(
                mailer = self.mailer.name(),
                email = %user.email,
                error = %e,
                "Failed to send password reset email"
            );
            return Err(AppError::Internal(format!("Failed to send email: {e}")));
        }

        Ok(ResetEmailResponse {
            message: "Email sent successfully".to_string(),
            details: ResetEmailDetails {
                email: user.email,
                confirmation_link: self.reset.expose_link.then_some(link),
            },
        })
    }
}

/// Decode an update body, rejecting anything that carries no change
///
/// An empty body, `null`, `{}` and an object whose fields are all null are
/// all "No data provided".
pub fn parse_profile_changes(body: &[u8]) -> Result<ProfileChanges, AppError> {
    let no_data = || AppError::BadRequest("No data provided".to_string());

    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(no_data());
    }

    let changes: Option<ProfileChanges> = serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {e}")))?;

    match changes {
        Some(changes) if !changes.is_empty() => Ok(changes),
        _ => Err(no_data()),
    }
}
