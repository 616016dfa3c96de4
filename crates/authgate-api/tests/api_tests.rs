//! API Integration Tests
//!
//! Every test drives the full router with `tower::ServiceExt::oneshot`
//! against the in-memory store and a recording mailer, so no database or SMTP
//! server is needed.

use authgate_api::auth::jwt::{validate_token, Claims, JwtConfig, TokenType};
use authgate_api::auth::RecordingMailer;
use authgate_api::{create_router_for_testing, create_test_app, TestApp};
use authgate_core::AppConfig;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use std::time::{SystemTime, UNIX_EPOCH};
use tower::ServiceExt;

// =============================================================================
// Helpers
// =============================================================================

fn test_app() -> TestApp {
    create_test_app(AppConfig::default(), RecordingMailer::new())
}

fn jwt_config() -> JwtConfig {
    JwtConfig::from(&AppConfig::default().jwt)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn bearer_request(method: &str, uri: &str, token: &str, body: Option<&str>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"));

    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

struct Tokens {
    access: String,
    refresh: String,
}

async fn register(app: &Router, username: &str, email: &str) -> Tokens {
    let (status, json) = send(
        app,
        json_request(
            "POST",
            "/register",
            json!({"username": username, "email": email, "password": "Secret123"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {json}");

    Tokens {
        access: json["tokens"]["access_token"].as_str().unwrap().to_string(),
        refresh: json["tokens"]["refresh_token"].as_str().unwrap().to_string(),
    }
}

/// Token for `a@x.com` with `iat` and `exp` relative to now
fn signed_token(token_type: TokenType, issued_offset: i64, expires_offset: i64) -> String {
    let config = jwt_config();
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;
    let iat = (now + issued_offset) as u64;
    let claims = Claims {
        iss: config.issuer.clone(),
        sub: "a@x.com".to_string(),
        jti: uuid::Uuid::new_v4().to_string(),
        iat,
        nbf: iat,
        exp: (now + expires_offset) as u64,
        token_type,
        username: None,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .unwrap()
}

// =============================================================================
// Health Check Tests
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = create_router_for_testing();

    let (status, json) = send(
        &app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_readiness_check() {
    let app = create_router_for_testing();

    let (status, json) = send(
        &app,
        Request::builder().uri("/ready").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ready"], true);
    assert_eq!(json["checks"]["database"], true);
}

#[tokio::test]
async fn test_metrics_counts_requests() {
    let app = create_router_for_testing();

    for _ in 0..2 {
        send(
            &app,
            Request::builder().uri("/health").body(Body::empty()).unwrap(),
        )
        .await;
    }

    let (status, json) = send(
        &app,
        Request::builder().uri("/metrics").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["uptime_seconds"].is_number());
    assert_eq!(json["total_requests"], 3);
    assert_eq!(json["endpoints"]["/health"], 2);
}

#[tokio::test]
async fn test_openapi_document_served() {
    let app = create_router_for_testing();

    let (status, json) = send(
        &app,
        Request::builder()
            .uri("/api-docs/openapi.json")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["paths"]["/register"].is_object());
    assert!(json["paths"]["/updateProfile"]["put"].is_object());
}

// =============================================================================
// Registration and Login
// =============================================================================

#[tokio::test]
async fn test_register_issues_tokens_for_email_identity() {
    let app = test_app();

    let (status, json) = send(
        &app.router,
        json_request(
            "POST",
            "/register",
            json!({"username": "alice", "email": "a@x.com", "password": "Secret123"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["message"], "User created and logged in successfully");

    let config = jwt_config();
    let access = validate_token(&config, json["tokens"]["access_token"].as_str().unwrap()).unwrap();
    let refresh =
        validate_token(&config, json["tokens"]["refresh_token"].as_str().unwrap()).unwrap();

    assert_eq!(access.sub, "a@x.com");
    assert_eq!(access.token_type, TokenType::Access);
    assert_eq!(access.username.as_deref(), Some("alice"));
    assert_eq!(refresh.sub, "a@x.com");
    assert_eq!(refresh.token_type, TokenType::Refresh);
}

#[tokio::test]
async fn test_register_duplicate_email_conflicts() {
    let app = test_app();
    register(&app.router, "alice", "a@x.com").await;

    let (status, json) = send(
        &app.router,
        json_request(
            "POST",
            "/register",
            json!({"username": "other", "email": "a@x.com", "password": "Another123"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "User already exists");
    assert_eq!(app.store.user_count().await, 1);
}

#[tokio::test]
async fn test_register_validation_reports_fields() {
    let app = test_app();

    let (status, json) = send(
        &app.router,
        json_request(
            "POST",
            "/register",
            json!({"username": "a", "email": "not-an-email", "password": "short"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert!(json["details"]["username"].is_array());
    assert_eq!(json["details"]["email"][0], "Invalid email address");
    assert!(json["details"]["password"].is_array());
    assert_eq!(app.store.user_count().await, 0);
}

#[tokio::test]
async fn test_register_malformed_json() {
    let app = test_app();

    let request = Request::builder()
        .method("POST")
        .uri("/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"username\": "))
        .unwrap();
    let (status, json) = send(&app.router, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_login() {
    let app = test_app();
    register(&app.router, "alice", "a@x.com").await;

    let (status, json) = send(
        &app.router,
        json_request(
            "POST",
            "/login",
            json!({"email": "a@x.com", "password": "Secret123"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Logged in successfully");
    assert!(json["tokens"]["access_token"].is_string());
    assert!(json["tokens"]["refresh_token"].is_string());
}

#[tokio::test]
async fn test_login_wrong_password_issues_no_tokens() {
    let app = test_app();
    register(&app.router, "alice", "a@x.com").await;

    let (status, json) = send(
        &app.router,
        json_request(
            "POST",
            "/login",
            json!({"email": "a@x.com", "password": "Wrong12345"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Invalid password");
    assert!(json.get("tokens").is_none());
}

#[tokio::test]
async fn test_login_unknown_email() {
    let app = test_app();

    let (status, json) = send(
        &app.router,
        json_request(
            "POST",
            "/login",
            json!({"email": "nobody@x.com", "password": "Secret123"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "User with this email is not registered");
}

// =============================================================================
// Token Verification
// =============================================================================

#[tokio::test]
async fn test_protected_route_header_errors() {
    let app = test_app();

    let (status, json) = send(
        &app.router,
        Request::builder().uri("/whoami").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "Missing Authorization header");

    let request = Request::builder()
        .uri("/whoami")
        .header(header::AUTHORIZATION, "Basic abc")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "Invalid Authorization header format");
}

#[tokio::test]
async fn test_invalid_and_expired_tokens() {
    let app = test_app();

    let (status, json) = send(
        &app.router,
        bearer_request("GET", "/whoami", "not.a.token", None),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["error"], "Invalid token");

    let (status, json) = send(
        &app.router,
        bearer_request(
            "GET",
            "/whoami",
            &signed_token(TokenType::Access, -7200, -3600),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "Token has expired");
}

#[tokio::test]
async fn test_token_type_enforced() {
    let app = test_app();
    let tokens = register(&app.router, "alice", "a@x.com").await;

    let (status, json) = send(
        &app.router,
        bearer_request("GET", "/whoami", &tokens.refresh, None),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["error"], "Only access tokens are allowed");

    let (status, json) = send(
        &app.router,
        bearer_request("GET", "/refresh", &tokens.access, None),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["error"], "Only refresh tokens are allowed");
}

#[tokio::test]
async fn test_refresh_issues_access_token() {
    let app = test_app();
    let tokens = register(&app.router, "alice", "a@x.com").await;

    let (status, json) = send(
        &app.router,
        bearer_request("GET", "/refresh", &tokens.refresh, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let access = json["access_token"].as_str().unwrap();
    let claims = validate_token(&jwt_config(), access).unwrap();
    assert_eq!(claims.sub, "a@x.com");
    assert_eq!(claims.token_type, TokenType::Access);
    assert_eq!(claims.username.as_deref(), Some("alice"));

    let (status, _) = send(&app.router, bearer_request("GET", "/whoami", access, None)).await;
    assert_eq!(status, StatusCode::OK);
}

// =============================================================================
// Whoami and Logout
// =============================================================================

#[tokio::test]
async fn test_whoami() {
    let app = test_app();
    let tokens = register(&app.router, "alice", "a@x.com").await;

    let (status, json) = send(
        &app.router,
        bearer_request("GET", "/whoami", &tokens.access, None),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "User details retrieved");
    assert_eq!(json["user_details"]["username"], "alice");
    assert_eq!(json["user_details"]["email"], "a@x.com");
}

#[tokio::test]
async fn test_logged_out_access_token_is_rejected() {
    let app = test_app();
    let tokens = register(&app.router, "alice", "a@x.com").await;

    let (status, json) = send(
        &app.router,
        bearer_request("GET", "/logout", &tokens.access, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "access token revoked successfully");

    for (method, uri, body) in [
        ("GET", "/whoami", None),
        ("GET", "/logout", None),
        ("PUT", "/updateProfile", Some(r#"{"username": "bob"}"#)),
        ("DELETE", "/deleteAccount", None),
    ] {
        let (status, json) = send(
            &app.router,
            bearer_request(method, uri, &tokens.access, body),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
        assert_eq!(json["error"], "Token has been revoked");
    }

    // Other tokens of the same account are unaffected
    let (status, _) = send(
        &app.router,
        bearer_request("GET", "/refresh", &tokens.refresh, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_logout_refresh_token() {
    let app = test_app();
    let tokens = register(&app.router, "alice", "a@x.com").await;

    let (status, json) = send(
        &app.router,
        bearer_request("GET", "/logout", &tokens.refresh, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "refresh token revoked successfully");

    let (status, json) = send(
        &app.router,
        bearer_request("GET", "/refresh", &tokens.refresh, None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "Token has been revoked");
}

// =============================================================================
// Account Deletion
// =============================================================================

#[tokio::test]
async fn test_delete_account_purges_ledger() {
    let app = test_app();
    let tokens = register(&app.router, "alice", "a@x.com").await;

    send(
        &app.router,
        bearer_request("GET", "/logout", &tokens.refresh, None),
    )
    .await;
    assert_eq!(app.store.revoked_count().await, 1);

    let (status, json) = send(
        &app.router,
        bearer_request("DELETE", "/deleteAccount", &tokens.access, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "User profile alice deleted successfully");
    assert_eq!(app.store.revoked_count().await, 0);
    assert_eq!(app.store.user_count().await, 0);

    let (status, json) = send(
        &app.router,
        bearer_request("GET", "/whoami", &tokens.access, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "User not found");

    let (status, _) = send(
        &app.router,
        bearer_request("DELETE", "/deleteAccount", &tokens.access, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app.router,
        bearer_request("GET", "/logout", &tokens.access, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_old_token_does_not_reach_reregistered_account() {
    let app = test_app();
    let alice = register(&app.router, "alice", "a@x.com").await;

    let (status, _) = send(
        &app.router,
        bearer_request("DELETE", "/deleteAccount", &alice.access, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let mallory = register(&app.router, "mallory", "a@x.com").await;

    // Issued to the previous holder of the email, before this account existed
    let stale = signed_token(TokenType::Access, -120, 3600);
    for (method, uri) in [("GET", "/whoami"), ("GET", "/logout"), ("DELETE", "/deleteAccount")] {
        let (status, json) = send(&app.router, bearer_request(method, uri, &stale, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{method} {uri}");
        assert_eq!(json["error"], "User not found");
    }

    let (status, json) = send(
        &app.router,
        bearer_request("GET", "/whoami", &mallory.access, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user_details"]["username"], "mallory");
    assert_eq!(app.store.user_count().await, 1);
}

#[tokio::test]
async fn test_deleted_email_can_register_again() {
    let app = test_app();
    let tokens = register(&app.router, "alice", "a@x.com").await;

    send(
        &app.router,
        bearer_request("DELETE", "/deleteAccount", &tokens.access, None),
    )
    .await;

    register(&app.router, "alice2", "a@x.com").await;
    assert_eq!(app.store.user_count().await, 1);
}

// =============================================================================
// Profile Update
// =============================================================================

#[tokio::test]
async fn test_update_profile_without_data() {
    let app = test_app();
    let tokens = register(&app.router, "alice", "a@x.com").await;

    for body in [None, Some(""), Some("null"), Some("{}")] {
        let (status, json) = send(
            &app.router,
            bearer_request("PUT", "/updateProfile", &tokens.access, body),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {body:?}");
        assert_eq!(json["error"], "No data provided");
    }

    let (status, json) = send(
        &app.router,
        bearer_request("PUT", "/updateProfile", &tokens.access, Some("{broken")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_partial_update_failure_persists_nothing() {
    let app = test_app();
    let tokens = register(&app.router, "alice", "a@x.com").await;

    let (status, json) = send(
        &app.router,
        bearer_request(
            "PUT",
            "/updateProfile",
            &tokens.access,
            Some(r#"{"username": "bob", "email": "not-an-email"}"#),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Invalid email address");

    let (status, json) = send(
        &app.router,
        bearer_request("GET", "/whoami", &tokens.access, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user_details"]["username"], "alice");
    assert_eq!(json["user_details"]["email"], "a@x.com");
}

#[tokio::test]
async fn test_update_profile_reissues_tokens() {
    let app = test_app();
    let tokens = register(&app.router, "alice", "a@x.com").await;

    let (status, json) = send(
        &app.router,
        bearer_request(
            "PUT",
            "/updateProfile",
            &tokens.access,
            Some(r#"{"username": "alicia", "email": "new@x.com", "password": "Changed123"}"#),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "User profile updated successfully");

    let access = json["tokens"]["access_token"].as_str().unwrap();
    let claims = validate_token(&jwt_config(), access).unwrap();
    assert_eq!(claims.sub, "new@x.com");
    assert_eq!(claims.username.as_deref(), Some("alicia"));

    // The old token still names the old email
    let (status, _) = send(
        &app.router,
        bearer_request("GET", "/whoami", &tokens.access, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app.router,
        json_request(
            "POST",
            "/login",
            json!({"email": "new@x.com", "password": "Changed123"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_update_profile_email_in_use() {
    let app = test_app();
    register(&app.router, "bob", "b@x.com").await;
    let tokens = register(&app.router, "alice", "a@x.com").await;

    let (status, json) = send(
        &app.router,
        bearer_request(
            "PUT",
            "/updateProfile",
            &tokens.access,
            Some(r#"{"email": "b@x.com"}"#),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "Email already in use");
}

// =============================================================================
// Password Reset Email
// =============================================================================

#[tokio::test]
async fn test_send_reset_email() {
    let app = test_app();
    register(&app.router, "alice", "a@x.com").await;

    let (status, json) = send(
        &app.router,
        json_request("POST", "/sendResetEmail", json!({"email": "a@x.com"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Email sent successfully");
    assert_eq!(json["details"]["email"], "a@x.com");
    assert!(json["details"].get("confirmation_link").is_none());

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "a@x.com");
    assert_eq!(sent[0].subject, "Password recovery");
    assert!(sent[0]
        .body
        .contains("http://localhost:5000/reset-password/"));
}

#[tokio::test]
async fn test_send_reset_email_exposes_link_when_configured() {
    let mut config = AppConfig::default();
    config.mail.expose_reset_link = true;
    config.mail.reset_link_base = "https://app.example.com/reset".to_string();
    let app = create_test_app(config, RecordingMailer::new());
    register(&app.router, "alice", "a@x.com").await;

    let (status, json) = send(
        &app.router,
        json_request("POST", "/sendResetEmail", json!({"email": "a@x.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let link = json["details"]["confirmation_link"].as_str().unwrap();
    let token = link.strip_prefix("https://app.example.com/reset/").unwrap();
    let claims = validate_token(&jwt_config(), token).unwrap();
    assert_eq!(claims.sub, "a@x.com");
    assert_eq!(claims.token_type, TokenType::Access);
    assert_eq!(claims.exp - claims.iat, 600);
    assert!(claims.username.is_none());
}

#[tokio::test]
async fn test_send_reset_email_unknown_address() {
    let app = test_app();

    let (status, json) = send(
        &app.router,
        json_request("POST", "/sendResetEmail", json!({"email": "nobody@x.com"})),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "User with this email is not registered");
    assert!(app.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_send_reset_email_transport_failure() {
    let app = create_test_app(
        AppConfig::default(),
        RecordingMailer::failing("535 5.7.8 Username and Password not accepted"),
    );
    register(&app.router, "alice", "a@x.com").await;

    let (status, json) = send(
        &app.router,
        json_request("POST", "/sendResetEmail", json!({"email": "a@x.com"})),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "Internal server error");
    assert!(!json.to_string().contains("535"));
}
