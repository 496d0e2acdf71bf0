//! # blog-api
//!
//! Assembles the HTTP service from configuration: picks the store, wires the
//! services and serves the router until Ctrl-C or SIGTERM.

use std::sync::Arc;

use anyhow::Context;
use api_adapters::{router, AppState};
use auth_adapters::{Argon2Hasher, JwtAuthenticator};
use configs::{AppConfig, LogConfig, LogFormat};
use domains::{CredentialHasher, TokenService};
use secrecy::ExposeSecret;
use services::PaginationConfig;
use storage_adapters::MemoryStore;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("loading configuration")?;
    init_tracing(&config.log);

    let state = build_state(&config).await?;
    let app = router(state);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "blog-api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("blog-api stopped");
    Ok(())
}

/// `RUST_LOG` wins over the configured filter when set.
fn init_tracing(log: &LogConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let registry = tracing_subscriber::registry().with(filter);
    match log.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn build_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2Hasher::new());
    let tokens: Arc<dyn TokenService> = Arc::new(JwtAuthenticator::new(
        config.auth.jwt_secret.expose_secret().as_bytes(),
        chrono::Duration::minutes(config.auth.token_ttl_minutes),
    ));
    let pagination = PaginationConfig::new(config.pagination.max_page_size);

    match &config.database.url {
        #[cfg(feature = "db-postgres")]
        Some(url) => {
            let store = storage_adapters::PgStore::connect(
                url.expose_secret(),
                config.database.max_connections,
            )
            .await
            .context("connecting to postgres")?;
            store
                .bootstrap_schema()
                .await
                .context("preparing the schema")?;
            info!("using the postgres store");
            Ok(AppState::from_store(Arc::new(store), hasher, tokens, pagination))
        }
        #[cfg(not(feature = "db-postgres"))]
        Some(_) => anyhow::bail!("database.url is set but this build lacks the db-postgres feature"),
        None => {
            warn!("no database configured, data lives in memory only");
            Ok(AppState::from_store(
                Arc::new(MemoryStore::new()),
                hasher,
                tokens,
                pagination,
            ))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
