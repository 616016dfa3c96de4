//! Authentication API handlers
//!
//! Thin HTTP adapters over [`AuthService`](crate::auth::AuthService): they
//! extract the body and verified token, collect audit context from the
//! headers and map the result to a status code.

use crate::audit::AuditContext;
use crate::auth::{
    AuthResponse, AuthenticatedToken, LoginRequest, MessageResponse, RefreshResponse,
    RegisterRequest, ResetEmailRequest, ResetEmailResponse, WhoamiResponse,
};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

/// Register a new account
///
/// Creates the user and returns an access + refresh token pair, so the
/// client is logged in straight away.
#[utoipa::path(
    post,
    path = "/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created and logged in", body = AuthResponse),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 409, description = "User already exists", body = ApiError),
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = json_body(payload)?;
    let response = state
        .auth
        .register(request, &AuditContext::from_headers(&headers))
        .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 400, description = "Invalid password", body = ApiError),
        (status = 404, description = "Email not registered", body = ApiError),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AppError> {
    let request = json_body(payload)?;
    let response = state
        .auth
        .login(request, &AuditContext::from_headers(&headers))
        .await?;

    Ok(Json(response))
}

/// Exchange a refresh token for a new access token
#[utoipa::path(
    get,
    path = "/refresh",
    tag = "auth",
    responses(
        (status = 200, description = "New access token", body = RefreshResponse),
        (status = 401, description = "Missing, expired or revoked token", body = ApiError),
        (status = 422, description = "Invalid token or not a refresh token", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Extension(token): Extension<AuthenticatedToken>,
) -> Result<Json<RefreshResponse>, AppError> {
    let response = state
        .auth
        .refresh(&token, &AuditContext::from_headers(&headers))
        .await?;

    Ok(Json(response))
}

/// Update username, email and/or password
///
/// All supplied fields are validated before anything is stored. Fresh tokens
/// reflecting the new email and username are returned.
#[utoipa::path(
    put,
    path = "/updateProfile",
    tag = "auth",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = AuthResponse),
        (status = 400, description = "No data, malformed JSON or invalid field", body = ApiError),
        (status = 404, description = "User not found", body = ApiError),
        (status = 409, description = "Email already in use", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Extension(token): Extension<AuthenticatedToken>,
    body: Bytes,
) -> Result<Json<AuthResponse>, AppError> {
    let response = state
        .auth
        .update_profile(&token, &body, &AuditContext::from_headers(&headers))
        .await?;

    Ok(Json(response))
}

/// Revoke the presented token, access or refresh
#[utoipa::path(
    get,
    path = "/logout",
    tag = "auth",
    responses(
        (status = 200, description = "Token revoked", body = MessageResponse),
        (status = 401, description = "Missing, expired or revoked token", body = ApiError),
        (status = 404, description = "User not found", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Extension(token): Extension<AuthenticatedToken>,
) -> Result<Json<MessageResponse>, AppError> {
    let response = state
        .auth
        .logout(&token, &AuditContext::from_headers(&headers))
        .await?;

    Ok(Json(response))
}

/// Delete the account and its revocation entries
#[utoipa::path(
    delete,
    path = "/deleteAccount",
    tag = "auth",
    responses(
        (status = 200, description = "Account deleted", body = MessageResponse),
        (status = 404, description = "User not found", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_account_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Extension(token): Extension<AuthenticatedToken>,
) -> Result<Json<MessageResponse>, AppError> {
    let response = state
        .auth
        .delete_account(&token, &AuditContext::from_headers(&headers))
        .await?;

    Ok(Json(response))
}

/// Current user's username and email
#[utoipa::path(
    get,
    path = "/whoami",
    tag = "auth",
    responses(
        (status = 200, description = "User details", body = WhoamiResponse),
        (status = 401, description = "Missing, expired or revoked token", body = ApiError),
        (status = 404, description = "User not found", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn whoami_handler(
    State(state): State<Arc<AppState>>,
    Extension(token): Extension<AuthenticatedToken>,
) -> Result<Json<WhoamiResponse>, AppError> {
    Ok(Json(state.auth.whoami(&token).await?))
}

/// Email a password-reset link valid for 10 minutes
#[utoipa::path(
    post,
    path = "/sendResetEmail",
    tag = "auth",
    request_body = ResetEmailRequest,
    responses(
        (status = 200, description = "Email sent", body = ResetEmailResponse),
        (status = 404, description = "Email not registered", body = ApiError),
        (status = 500, description = "Email delivery failed", body = ApiError),
    )
)]
pub async fn send_reset_email_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<ResetEmailRequest>, JsonRejection>,
) -> Result<Json<ResetEmailResponse>, AppError> {
    let request = json_body(payload)?;
    let response = state
        .auth
        .send_reset_email(request, &AuditContext::from_headers(&headers))
        .await?;

    Ok(Json(response))
}
