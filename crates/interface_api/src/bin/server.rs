//! Campus Billing - API Server Binary
//!
//! Starts the HTTP API for the billing ledger: loads configuration,
//! connects to PostgreSQL, applies migrations, wires the domain services
//! over the database adapters, and serves until interrupted.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin billing-api
//! ```
//!
//! # Environment Variables
//!
//! * `API_HOST` / `API_PORT` - Bind address (default: 0.0.0.0:8080)
//! * `API_JWT_SECRET` - JWT signing secret (change it in production)
//! * `API_JWT_EXPIRATION_SECS` - Token lifetime (default: 3600)
//! * `DATABASE_URL` or `API_DATABASE_URL` - PostgreSQL connection string
//! * `API_CURRENCY` - Ledger currency code (default: KES)
//! * `API_EVENT_TIMEOUT_MS` - Event delivery timeout (default: 2000)
//! * `API_LOG_LEVEL` - trace, debug, info, warn, error (default: info)

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use domain_billing::ports::TracingEventSink;
use infra_db::{run_migrations, DatabaseConfig, PgLedgerStore, PgStudentDirectory};
use interface_api::{config::ApiConfig, create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = load_config();
    init_tracing(&config.log_level);

    tracing::info!(
        host = %config.host,
        port = %config.port,
        currency = %config.currency,
        "Starting Campus Billing API Server"
    );

    let pool = DatabaseConfig::new(config.database_url.clone())
        .connect()
        .await?;
    run_migrations(&pool).await?;

    let state = AppState::new(
        Arc::new(PgLedgerStore::new(pool.clone())),
        Arc::new(PgStudentDirectory::new(pool)),
        Arc::new(TracingEventSink),
        config.clone(),
    );

    let addr: SocketAddr = config.server_addr().parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Server listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Reads configuration from the environment, falling back to individual
/// variables and then to defaults.
fn load_config() -> ApiConfig {
    ApiConfig::from_env().unwrap_or_else(|_| {
        let defaults = ApiConfig::default();
        ApiConfig {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: parsed_env("API_PORT").unwrap_or(defaults.port),
            jwt_secret: std::env::var("API_JWT_SECRET").unwrap_or(defaults.jwt_secret),
            jwt_expiration_secs: parsed_env("API_JWT_EXPIRATION_SECS")
                .unwrap_or(defaults.jwt_expiration_secs),
            database_url: std::env::var("DATABASE_URL")
                .or_else(|_| std::env::var("API_DATABASE_URL"))
                .unwrap_or(defaults.database_url),
            currency: parsed_env("API_CURRENCY").unwrap_or(defaults.currency),
            event_timeout_ms: parsed_env("API_EVENT_TIMEOUT_MS")
                .unwrap_or(defaults.event_timeout_ms),
            log_level: std::env::var("API_LOG_LEVEL")
                .or_else(|_| std::env::var("RUST_LOG"))
                .unwrap_or(defaults.log_level),
        }
    })
}

fn parsed_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|value| value.parse().ok())
}

/// Sets up structured logging with an env-filter.
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Resolves when the process is asked to stop (Ctrl+C or SIGTERM), so
/// in-flight requests get to finish before the listener closes.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler");

        tokio::select! {
            _ = signal::ctrl_c() => tracing::info!("Received Ctrl+C, shutting down"),
            _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down"),
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        tracing::info!("Received Ctrl+C, shutting down");
    }
}
