use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::info;

use roomsync::config::{Config, StorageKind};
use roomsync::engine::Engine;
use roomsync::store::{InMemoryStore, ReservationStore, WalStore};
use roomsync::{api, compactor, observability};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    observability::init(config.metrics_port)?;

    let (store, compactor_task) = match config.storage {
        StorageKind::Wal => {
            std::fs::create_dir_all(&config.data_dir)?;
            let wal_store = Arc::new(WalStore::open(&config.wal_path())?);
            let task = tokio::spawn(compactor::run_compactor(
                wal_store.clone(),
                config.compact_threshold,
                Duration::from_secs(30),
            ));
            (wal_store as Arc<dyn ReservationStore>, Some(task))
        }
        StorageKind::Memory => (Arc::new(InMemoryStore::new()) as Arc<dyn ReservationStore>, None),
    };
    let engine = Arc::new(Engine::new(store, config.store_timeout));

    let addr = config.addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("roomsync listening on {addr}");
    info!("  storage: {:?}", config.storage);
    info!("  data_dir: {}", config.data_dir.display());
    info!("  store_timeout: {:?}", config.store_timeout);
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    axum::serve(listener, api::router(engine.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("closing store...");
    engine.close().await?;
    if let Some(task) = compactor_task {
        task.abort();
    }
    info!("roomsync stopped");
    Ok(())
}

/// Resolves on SIGTERM or ctrl-c. In-flight requests drain before `serve` returns.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                tracing::error!("failed to register SIGTERM handler: {e}");
                ctrl_c.await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
    info!("shutdown signal received, draining requests");
}
