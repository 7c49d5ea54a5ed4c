//! Credit ledger server.
//!
//! Runs the HTTP API and the background worker in one process.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use credit_api::{AppState, create_router};
use credit_db::{PgAdvisoryLock, SettlementEngine, SettlementSettings, TokenStore, connect_with};
use credit_shared::{AppConfig, JwtService};
use credit_worker::Worker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "credit=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let db = connect_with(&config.database).await?;
    info!("Connected to database");

    let settings = SettlementSettings::from_config(&config.payment, &config.worker)?;
    info!(
        timezone = %settings.timezone,
        order_ttl_secs = settings.order_ttl.as_secs(),
        "Settlement configured"
    );

    // Expired order markers flow from the token store to the sweeper.
    let (expired_tx, expired_rx) = mpsc::unbounded_channel();
    let tokens = Arc::new(TokenStore::new(
        settings.order_ttl,
        config.payment.token_cache_capacity,
        Some(expired_tx),
    ));

    let engine = SettlementEngine::new(
        db.clone(),
        Arc::new(PgAdvisoryLock),
        tokens.clone(),
        settings,
    );

    let shutdown = CancellationToken::new();
    let mut background =
        Worker::from_config(&db, engine.clone(), tokens, expired_rx, &config)?.spawn(&shutdown);

    let state = AppState {
        engine,
        db,
        jwt_service: Arc::new(JwtService::new(&config.jwt.secret)),
    };
    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(environment = %config.server.environment, "Server listening on {}", addr);

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received");
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    while let Some(joined) = background.join_next().await {
        if let Err(e) = joined {
            error!("Background task failed: {}", e);
        }
    }
    info!("Server stopped");
    Ok(())
}
