//! authgate API - user authentication REST server
//!
//! Registration, login, token refresh, profile management, logout through a
//! revocation ledger, and password-reset email. OpenAPI documentation is
//! served at `/swagger-ui/`.

pub mod audit;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

use auth::{AuthService, JwtConfig, Mailer, ResetLinkSettings};
use authgate_core::{AppConfig, RevocationLedger, UserStore};
use axum::http::HeaderValue;
use axum::Router;
use state::AppState;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "authgate API",
        description = "User registration, login and token management"
    ),
    paths(
        handlers::auth::register_handler,
        handlers::auth::login_handler,
        handlers::auth::refresh_handler,
        handlers::auth::update_profile_handler,
        handlers::auth::logout_handler,
        handlers::auth::delete_account_handler,
        handlers::auth::whoami_handler,
        handlers::auth::send_reset_email_handler,
        handlers::health::health_check,
        handlers::health::readiness_check,
        handlers::health::metrics,
    ),
    components(schemas(
        auth::RegisterRequest,
        auth::LoginRequest,
        auth::ResetEmailRequest,
        auth::UpdateProfileRequest,
        auth::AuthResponse,
        auth::TokenPair,
        auth::RefreshResponse,
        auth::MessageResponse,
        auth::WhoamiResponse,
        auth::UserDetails,
        auth::ResetEmailResponse,
        auth::models::ResetEmailDetails,
        error::ApiError,
        handlers::health::HealthResponse,
        handlers::health::BuildInfo,
        handlers::health::ReadinessResponse,
        handlers::health::ReadinessChecks,
        handlers::health::MetricsResponse,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Accounts and tokens"),
        (name = "health", description = "Service probes")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by protected paths
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Wire the service, stores and mailer into shared state
pub fn build_state(
    config: AppConfig,
    users: Arc<dyn UserStore>,
    ledger: Arc<dyn RevocationLedger>,
    mailer: Arc<dyn Mailer>,
) -> Arc<AppState> {
    let auth = AuthService::new(
        users,
        ledger,
        mailer,
        JwtConfig::from(&config.jwt),
        ResetLinkSettings::from(&config.mail),
    );
    Arc::new(AppState::new(config, auth))
}

/// CORS policy from the configured origins
///
/// An empty list allows no cross-origin access; `*` allows any origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin = %o, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    cors.allow_origin(AllowOrigin::list(parsed))
}

/// Build the full application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        .merge(routes::health_routes())
        .merge(routes::auth_routes(state.clone()))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Router plus handles on its in-memory backends
#[cfg(any(test, feature = "test-utils"))]
pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub store: Arc<authgate_core::MemoryStore>,
    pub mailer: Arc<auth::RecordingMailer>,
}

/// Application backed by an in-memory store and a recording mailer
#[cfg(any(test, feature = "test-utils"))]
pub fn create_test_app(config: AppConfig, mailer: auth::RecordingMailer) -> TestApp {
    let store = Arc::new(authgate_core::MemoryStore::new());
    let mailer = Arc::new(mailer);
    let state = build_state(config, store.clone(), store.clone(), mailer.clone());

    TestApp {
        router: create_router(state.clone()),
        state,
        store,
        mailer,
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub fn create_router_for_testing() -> Router {
    create_test_app(AppConfig::default(), auth::RecordingMailer::new()).router
}
