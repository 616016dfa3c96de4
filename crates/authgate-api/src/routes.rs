//! API route definitions

use crate::auth::{require_access, require_any, require_refresh};
use crate::handlers::{auth, health};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;

/// Liveness, readiness and metrics probes
pub fn health_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics))
}

/// Account and token endpoints
///
/// Protected routes are grouped by the token type they accept, each group
/// behind its own verification middleware.
pub fn auth_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes (no token required)
    let public_routes = Router::new()
        .route("/register", post(auth::register_handler))
        .route("/login", post(auth::login_handler))
        .route("/sendResetEmail", post(auth::send_reset_email_handler));

    let access_routes = Router::new()
        .route("/updateProfile", put(auth::update_profile_handler))
        .route("/deleteAccount", delete(auth::delete_account_handler))
        .route("/whoami", get(auth::whoami_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_access,
        ));

    let refresh_routes = Router::new()
        .route("/refresh", get(auth::refresh_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_refresh,
        ));

    // Logout revokes whichever token it is given
    let any_token_routes = Router::new()
        .route("/logout", get(auth::logout_handler))
        .route_layer(middleware::from_fn_with_state(state, require_any));

    Router::new()
        .merge(public_routes)
        .merge(access_routes)
        .merge(refresh_routes)
        .merge(any_token_routes)
}
