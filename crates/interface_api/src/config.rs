//! API configuration

use core_kernel::Currency;
use serde::Deserialize;
use std::time::Duration;

/// Runtime configuration for the billing API
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Secret the JWTs are signed with
    pub jwt_secret: String,
    /// Token lifetime in seconds
    pub jwt_expiration_secs: u64,
    /// PostgreSQL connection string
    pub database_url: String,
    /// Currency all billing records are kept in
    pub currency: Currency,
    /// Per-event delivery timeout in milliseconds
    pub event_timeout_ms: u64,
    /// Log level
    pub log_level: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_secs: 3600,
            database_url: "postgres://localhost/campus_billing".to_string(),
            currency: Currency::KES,
            event_timeout_ms: 2000,
            log_level: "info".to_string(),
        }
    }
}

impl ApiConfig {
    /// Reads `API_`-prefixed configuration from the environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("API"))
            .build()?
            .try_deserialize()
    }

    /// The address the server binds to
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The event delivery timeout as a [`Duration`]
    pub fn event_timeout(&self) -> Duration {
        Duration::from_millis(self.event_timeout_ms)
    }
}
