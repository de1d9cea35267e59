//! Taskboard API server binary.
//!
//! Serves the REST API and the STOMP WebSocket endpoint on one listener.
//! Without a database URL the in-memory store is used.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use taskboard_api::config::ApiConfig;
use taskboard_core::auth::{SigningKeys, TokenService};
use taskboard_core::mailer::LogMailer;
use taskboard_core::store::{MemoryStore, PgStore, Store};
use tracing::{info, warn};

/// CLI arguments; each falls back to the matching environment variable.
#[derive(Parser, Debug)]
#[command(name = "taskboard_server", about = "Taskboard API server")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR")]
    bind: Option<String>,

    /// PostgreSQL connection URL. Omit to run on the in-memory store.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// PKCS#8 Ed25519 private key used to sign tokens.
    #[arg(long, env = "TOKEN_PRIVATE_KEY_PATH")]
    token_key: Option<PathBuf>,

    /// Maximum number of database connections in the pool.
    #[arg(long, env = "DB_MAX_CONNECTIONS")]
    max_connections: Option<u32>,
}

impl Args {
    fn into_config(self) -> ApiConfig {
        let mut config = ApiConfig::from_env();
        if let Some(bind) = self.bind {
            config.bind_addr = bind;
        }
        if self.database_url.is_some() {
            config.database_url = self.database_url;
        }
        if self.token_key.is_some() {
            config.token_key_path = self.token_key;
        }
        if let Some(max) = self.max_connections {
            config.db_max_connections = max;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(
                    "info,taskboard_api=debug,taskboard_core=debug,taskboard_realtime=debug",
                )
            }),
        )
        .init();

    let config = Args::parse().into_config();
    info!(
        bind_addr = %config.bind_addr,
        comment_max_depth = config.comment_max_depth,
        "starting taskboard_server"
    );

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            info!(max_connections = config.db_max_connections, "connecting to PostgreSQL");
            let pool = PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .acquire_timeout(std::time::Duration::from_secs(30))
                .connect(url)
                .await?;

            info!("running database migrations");
            taskboard_core::migrate::migrate(&pool).await?;
            Arc::new(PgStore::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set, using the in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let keys = SigningKeys::resolve(config.token_key_path.as_deref())?;
    let state = taskboard_api::AppState::new(
        store,
        Arc::new(TokenService::new(keys)),
        Arc::new(LogMailer),
        config.clone(),
    )?;
    let app = taskboard_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API and /ws listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
