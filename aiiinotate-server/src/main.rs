//! Aiiinotate Server - REST API for IIIF annotations and manifests
//!
//! Configuration is read from the environment (see [`Config::from_env`]).
//! With `DATABASE_URL` set, documents are stored in PostgreSQL; otherwise
//! they live in memory and are lost on restart.

use std::net::SocketAddr;
use std::sync::Arc;

use aiiinotate_core::{Aiiinotate, DocumentStore, HttpManifestFetcher, MemoryStore};
use aiiinotate_server::{create_router, AppState, Config};
use anyhow::Context;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("aiiinotate_server=info,aiiinotate_core=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), base_url = %config.base_url, "Starting Aiiinotate server");

    let core_config = config.core_config();
    let store = open_store(&config).await?;
    let fetcher = HttpManifestFetcher::new(&core_config).context("failed to create manifest fetcher")?;
    let service = Arc::new(Aiiinotate::init(core_config, store, Arc::new(fetcher)));

    let addr = config.socket_addr();
    let app = create_router(AppState::new(service.clone(), config));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "Listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    service.close().await;
    tracing::info!("Server shutdown complete");
    Ok(())
}

#[cfg(feature = "postgres")]
async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn DocumentStore>> {
    use aiiinotate_core::PostgresStore;

    let Some(url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set, using the in-memory store");
        return Ok(Arc::new(MemoryStore::new()));
    };

    let store = PostgresStore::connect(url, config.database_max_connections)
        .await
        .context("failed to connect to PostgreSQL")?;
    store.migrate().await.context("failed to run migrations")?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "postgres"))]
async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn DocumentStore>> {
    if config.database_url.is_some() {
        tracing::warn!("Built without PostgreSQL support, ignoring DATABASE_URL");
    }
    Ok(Arc::new(MemoryStore::new()))
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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

    tracing::info!("Shutdown signal received");
}
