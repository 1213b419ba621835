//! Freight Billing API Server Binary
//!
//! Starts the HTTP API for the freight billing core.
//!
//! # Usage
//!
//! ```bash
//! API_JWT_SECRET=... API_DATABASE_URL=postgres://... cargo run --bin billing-api
//!
//! # In-memory store, no database required
//! API_JWT_SECRET=dev API_STORE=memory cargo run --bin billing-api
//! ```
//!
//! Settings are listed in `interface_api::config`.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use core_kernel::{Clock, HealthCheckable, SystemClock};
use domain_billing::adapters::{InMemoryDocumentStore, LoggingNotifier};
use domain_billing::{NotificationOutbox, Stores};
use infra_db::{connect_store, DatabaseConfig};
use interface_api::config::{ApiConfig, StoreBackend};
use interface_api::{create_router, AppState};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Fails on bad configuration, an unreachable store or an unbindable address
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = ApiConfig::from_env().context("invalid API configuration")?;
    init_tracing(&config);

    tracing::info!(
        host = %config.host,
        port = %config.port,
        store = ?config.store,
        "starting freight billing API server"
    );

    let (stores, store_health) = open_store(&config).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (outbox, dispatcher) = NotificationOutbox::start(Arc::new(LoggingNotifier));

    let state = AppState::new(config.clone(), stores, outbox, clock, store_health);
    let app = create_router(state);

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .with_context(|| format!("invalid server address {}", config.server_addr()))?;
    tracing::info!(%addr, "server listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // the router held the last outbox; the dispatcher drains and exits
    if let Err(error) = dispatcher.await {
        tracing::warn!(%error, "notification dispatcher ended abnormally");
    }
    tracing::info!("server shutdown complete");
    Ok(())
}

/// Opens the configured document store and its health probe
async fn open_store(config: &ApiConfig) -> anyhow::Result<(Stores, Arc<dyn HealthCheckable>)> {
    match config.store {
        StoreBackend::Memory => {
            tracing::warn!("using in-memory store, data is lost on restart");
            let store = Arc::new(InMemoryDocumentStore::new());
            Ok((Stores::from_backend(store.clone()), store))
        }
        StoreBackend::Postgres => {
            let db = DatabaseConfig::new(config.database_url.clone())
                .max_connections(config.max_connections);
            let store = Arc::new(
                connect_store(&db)
                    .await
                    .context("failed to open the postgres store")?,
            );
            Ok((Stores::from_backend(store.clone()), store))
        }
    }
}

/// `RUST_LOG` wins over `API_LOG_LEVEL`
fn init_tracing(config: &ApiConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if config.log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }
}

/// Ctrl+C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!(%error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("received SIGTERM, initiating graceful shutdown");
        }
    }
}
