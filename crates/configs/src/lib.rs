//! # configs
//!
//! Process configuration, read once at startup from the environment (and a
//! `.env` file if present). Keys use the `BLOG` prefix and `__` as the
//! nesting separator, e.g. `BLOG__PAGINATION__MAX_PAGE_SIZE=10`.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

pub const ENV_PREFIX: &str = "BLOG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub pagination: PaginationSettings,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres connection string. Absent means the in-memory store.
    #[serde(default)]
    pub url: Option<SecretString>,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: SecretString,
    pub token_ttl_minutes: i64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PaginationSettings {
    /// Documents per page; also the default `limit`.
    pub max_page_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    pub format: LogFormat,
    /// `tracing_subscriber::EnvFilter` directive, overridden by `RUST_LOG`.
    pub filter: String,
}

impl AppConfig {
    /// Loads `.env` (if any) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_env(environment())
    }

    /// Builds the configuration from one environment source over the
    /// defaults. Tests pass a prepared source instead of the process env.
    pub fn from_env(env: config::Environment) -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("database.max_connections", 10)?
            .set_default("auth.jwt_secret", "development-secret-change-in-production")?
            .set_default("auth.token_ttl_minutes", 60)?
            .set_default("pagination.max_page_size", 10)?
            .set_default("log.format", "pretty")?
            .set_default("log.filter", "info")?
            .add_source(env)
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=20).contains(&self.pagination.max_page_size) {
            return Err(ConfigError::Invalid {
                field: "pagination.max_page_size",
                reason: format!("{} is outside 1..=20", self.pagination.max_page_size),
            });
        }
        if self.auth.jwt_secret.expose_secret().trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "auth.jwt_secret",
                reason: "must not be empty".to_string(),
            });
        }
        if self.auth.token_ttl_minutes <= 0 {
            return Err(ConfigError::Invalid {
                field: "auth.token_ttl_minutes",
                reason: "must be positive".to_string(),
            });
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid {
                field: "database.max_connections",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// The process environment, read with the `BLOG__` prefix.
pub fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}
