//! WayrApp API server binary.
//!
//! Loads configuration from the environment (and `.env`), refuses to start
//! without both signing secrets, then serves the secured router.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use wayrapp_api::AppState;
use wayrapp_api::config::ApiConfig;
use wayrapp_core::auth::queries::PgRevokedTokenStore;
use wayrapp_core::auth::revocation::{MemoryRevokedTokenStore, RevokedTokenStore};

/// CLI arguments. Anything not given here comes from the environment.
#[derive(Parser, Debug)]
#[command(name = "wayrapp_api_server", about = "WayrApp API server")]
struct Args {
    /// Address to listen on; overrides `BIND_ADDR`.
    #[arg(long)]
    bind: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Seconds between purges of expired revocation entries (0 disables).
    #[arg(long, env = "REVOCATION_PURGE_INTERVAL_SECS", default_value_t = 3600)]
    purge_interval_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wayrapp_api=debug,wayrapp_core=debug".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env()?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    // Fail fast: no secrets, no server.
    config.security.validate()?;

    let revoked: Arc<dyn RevokedTokenStore> = match &config.database_url {
        Some(url) => {
            info!(max_connections = args.max_connections, "connecting to PostgreSQL");
            let pool = PgPoolOptions::new()
                .max_connections(args.max_connections)
                .acquire_timeout(Duration::from_secs(30))
                .connect(url)
                .await?;

            info!("running database migrations");
            wayrapp_core::migrate::migrate(&pool).await?;
            Arc::new(PgRevokedTokenStore::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set, revoked tokens are kept in memory");
            Arc::new(MemoryRevokedTokenStore::new())
        }
    };

    let state = AppState::new(config.clone(), revoked.clone());
    let app = wayrapp_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let local_addr = listener.local_addr()?;

    let ct = CancellationToken::new();
    let purge_handle = (args.purge_interval_secs > 0).then(|| {
        tokio::spawn(purge_loop(
            revoked,
            Duration::from_secs(args.purge_interval_secs),
            ct.clone(),
        ))
    });

    info!(addr = %local_addr, "REST API listening");

    let shutdown = ct.clone();
    let api_result = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("shutdown signal received"),
            _ = shutdown.cancelled() => {}
        }
    })
    .await;

    ct.cancel();
    if let Some(handle) = purge_handle {
        let _ = handle.await;
    }

    api_result?;
    Ok(())
}

/// Periodically drop revocation entries for tokens that have expired.
async fn purge_loop(store: Arc<dyn RevokedTokenStore>, every: Duration, ct: CancellationToken) {
    let mut ticker = tokio::time::interval(every);
    // First tick completes immediately.
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ct.cancelled() => break,
            _ = ticker.tick() => match store.purge_expired().await {
                Ok(removed) => info!(removed, "purged expired revocations"),
                Err(e) => warn!(error = %e, "revocation purge failed"),
            },
        }
    }
}
