//! authgate configuration management
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then environment variables, which always win.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable naming an optional TOML config file
pub const CONFIG_PATH_ENV: &str = "AUTHGATE_CONFIG";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Database connection
    pub database: DatabaseConfig,

    /// Token signing and lifetimes
    pub jwt: JwtSettings,

    /// Outbound email for password resets
    pub mail: MailConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration the way the server binary does
    ///
    /// Reads the file named by `AUTHGATE_CONFIG` if set, then applies
    /// environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(path)?.with_env_override(),
            Err(_) => Self::from_env(),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_override()
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server
        if let Some(host) = lookup("API_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("API_PORT") {
            self.server.port = parse_value("API_PORT", port)?;
        }
        if let Some(origins) = lookup("CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Database
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = Some(url).filter(|u| !u.is_empty());
        }
        if let Some(size) = lookup("DATABASE_POOL_SIZE") {
            self.database.pool_size = parse_value("DATABASE_POOL_SIZE", size)?;
        }

        // JWT
        if let Some(secret) = lookup("JWT_SECRET") {
            self.jwt.secret = secret;
        }
        if let Some(issuer) = lookup("JWT_ISSUER") {
            self.jwt.issuer = issuer;
        }
        if let Some(secs) = lookup("JWT_ACCESS_EXPIRATION_SECS") {
            self.jwt.access_expiration_secs = parse_value("JWT_ACCESS_EXPIRATION_SECS", secs)?;
        }
        if let Some(secs) = lookup("JWT_REFRESH_EXPIRATION_SECS") {
            self.jwt.refresh_expiration_secs = parse_value("JWT_REFRESH_EXPIRATION_SECS", secs)?;
        }

        // Mail
        if let Some(sender) = lookup("SENDER_EMAIL") {
            self.mail.sender_email = Some(sender);
        }
        if let Some(password) = lookup("SENDER_PASSWORD") {
            self.mail.sender_password = Some(password);
        }
        if let Some(host) = lookup("SMTP_HOST") {
            self.mail.smtp_host = host;
        }
        if let Some(port) = lookup("SMTP_PORT") {
            self.mail.smtp_port = parse_value("SMTP_PORT", port)?;
        }
        if let Some(base) = lookup("RESET_LINK_BASE") {
            self.mail.reset_link_base = base.trim_end_matches('/').to_string();
        }
        if let Some(expose) = lookup("EXPOSE_RESET_LINK") {
            self.mail.expose_reset_link = parse_value("EXPOSE_RESET_LINK", expose)?;
        }

        // Logging
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = lookup("LOG_JSON") {
            self.logging.json_format = parse_value("LOG_JSON", json)?;
        }

        Ok(self)
    }

    /// Socket address string the server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Allowed origins for CORS; empty means no cross-origin access
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: vec![],
        }
    }
}

/// Database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL. Without one the server keeps state in memory.
    pub url: Option<String>,

    /// PostgreSQL connection pool size
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            pool_size: 10,
        }
    }
}

/// Token signing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtSettings {
    /// HMAC secret
    pub secret: String,

    /// `iss` claim written to and required from every token
    pub issuer: String,

    /// Access token lifetime (default 15 minutes)
    pub access_expiration_secs: u64,

    /// Refresh token lifetime (default 30 days)
    pub refresh_expiration_secs: u64,
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self {
            secret: "development-secret-key-change-in-production".to_string(),
            issuer: "authgate".to_string(),
            access_expiration_secs: 15 * 60,
            refresh_expiration_secs: 30 * 24 * 60 * 60,
        }
    }
}

/// Outbound SMTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub sender_email: Option<String>,

    #[serde(skip_serializing)]
    pub sender_password: Option<String>,

    pub smtp_host: String,

    pub smtp_port: u16,

    /// Reset tokens are appended to this URL as a final path segment
    pub reset_link_base: String,

    /// Echo the reset link in the API response as well as the email
    pub expose_reset_link: bool,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            sender_email: None,
            sender_password: None,
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            reset_link_base: "http://localhost:5000/reset-password".to_string(),
            expose_reset_link: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}
