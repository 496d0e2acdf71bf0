//! Seeds a demo account and a few topics, then prints a bearer token for
//! the account. Re-running is safe: existing users and topics are reused.
//!
//! Run with: `cargo run -p seed`. Uses the same `BLOG__*` configuration as
//! the API; `SEED_USERNAME`, `SEED_EMAIL` and `SEED_PASSWORD` override the
//! demo credentials.

use std::sync::Arc;

use anyhow::Context;
use auth_adapters::{Argon2Hasher, JwtAuthenticator};
use configs::AppConfig;
use domains::{AppError, IssuedToken, TopicRepository, UserRepository};
use secrecy::ExposeSecret;
use services::{AccountService, LoginInput, RegisterInput, TopicResolver};
use storage_adapters::MemoryStore;
use tracing::{info, warn};

const DEMO_TOPICS: &[&str] = &["news", "rust", "announcements"];

struct Credentials {
    username: String,
    email: String,
    password: String,
}

impl Credentials {
    fn from_env() -> Self {
        let var = |key: &str, default: &str| std::env::var(key).unwrap_or_else(|_| default.to_string());
        Self {
            username: var("SEED_USERNAME", "demo"),
            email: var("SEED_EMAIL", "demo@example.com"),
            password: var("SEED_PASSWORD", "demo-password"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("loading configuration")?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&config.log.filter))
        .init();

    let credentials = Credentials::from_env();

    let token = match &config.database.url {
        Some(url) => {
            let store = storage_adapters::PgStore::connect(url.expose_secret(), 1)
                .await
                .context("connecting to postgres")?;
            store.bootstrap_schema().await?;
            seed(Arc::new(store), &config, &credentials).await?
        }
        None => {
            warn!("no database configured, seeding an in-memory store that is discarded on exit");
            seed(Arc::new(MemoryStore::new()), &config, &credentials).await?
        }
    };

    println!("{} {}", token.token_type, token.token);
    Ok(())
}

async fn seed<S>(store: Arc<S>, config: &AppConfig, credentials: &Credentials) -> anyhow::Result<IssuedToken>
where
    S: TopicRepository + UserRepository + 'static,
{
    let users: Arc<dyn UserRepository> = store.clone();
    let accounts = AccountService::new(
        users,
        Arc::new(Argon2Hasher::new()),
        Arc::new(JwtAuthenticator::new(
            config.auth.jwt_secret.expose_secret().as_bytes(),
            chrono::Duration::minutes(config.auth.token_ttl_minutes),
        )),
    );

    let registration = RegisterInput {
        username: Some(credentials.username.clone()),
        email: Some(credentials.email.clone()),
        password: Some(credentials.password.clone()),
    };
    match accounts.register(registration).await {
        Ok(profile) => info!(user = %profile.id, "created demo user"),
        Err(AppError::Conflict(_)) => info!(username = %credentials.username, "demo user already exists"),
        Err(err) => return Err(err.into()),
    }

    let topics = TopicResolver::new(store);
    for name in DEMO_TOPICS {
        let id = topics.find_or_create(name).await?;
        info!(topic = %name, %id, "topic ready");
    }

    let token = accounts
        .login(LoginInput {
            username: Some(credentials.username.clone()),
            password: Some(credentials.password.clone()),
        })
        .await
        .context("logging in as the demo user")?;
    Ok(token)
}
