//! authgate API Server
//!
//! Loads configuration, opens the user store, and serves the authentication
//! API over HTTP.

use anyhow::Context;
use authgate_api::auth::{Mailer, PgStore, SmtpMailer};
use authgate_api::{build_state, create_router};
use authgate_core::{AppConfig, LoggingConfig, MemoryStore, RevocationLedger, UserStore};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &logging.level;
        format!("authgate_api={level},authgate_core={level},tower_http={level},audit=info").into()
    });

    if logging.json_format {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

type Stores = (Arc<dyn UserStore>, Arc<dyn RevocationLedger>);

async fn open_stores(config: &AppConfig) -> anyhow::Result<Stores> {
    match &config.database.url {
        Some(url) => {
            let store = PgStore::connect(url, config.database.pool_size)
                .await
                .context("Failed to connect to PostgreSQL")?;
            store
                .migrate()
                .await
                .context("Failed to run database migrations")?;
            tracing::info!(pool_size = config.database.pool_size, "Connected to PostgreSQL");

            let store = Arc::new(store);
            Ok((store.clone(), store))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store; data is lost on restart");
            let store = Arc::new(MemoryStore::new());
            Ok((store.clone(), store))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.logging);

    let (users, ledger) = open_stores(&config).await?;

    let mailer = SmtpMailer::from_config(&config.mail);
    if config.mail.sender_email.is_none() || config.mail.sender_password.is_none() {
        tracing::warn!("SENDER_EMAIL/SENDER_PASSWORD not set, password reset emails will fail");
    }
    let mailer: Arc<dyn Mailer> = Arc::new(mailer);

    let addr = config.bind_address();
    let state = build_state(config, users, ledger, mailer);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("authgate API Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);
    tracing::info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
