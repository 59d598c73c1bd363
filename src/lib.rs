pub mod api;
pub mod config;
pub mod core_state;
pub mod db;
pub mod error;
pub mod insights;
pub mod intelligence;
pub mod models;
pub mod pipeline;
pub mod reports;
pub mod storage;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::core_state::{CoreError, CoreState};
use crate::storage::FsObjectStore;

/// Start the service and block until ctrl-c, then drain in order:
/// HTTP first, so no new uploads arrive, then the worker pool.
pub async fn run() -> Result<(), CoreError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = AppConfig::from_env()?;
    tracing::info!(
        data_dir = %config.data_dir.display(),
        bind = %config.bind_addr,
        workers = config.workers,
        "Configuration loaded"
    );

    let store = Arc::new(FsObjectStore::new(config.objects_dir())?);
    let extractor = {
        let config = config.clone();
        tokio::task::spawn_blocking(move || core_state::build_extractor(&config))
            .await
            .map_err(|e| CoreError::Io(std::io::Error::other(e)))??
    };

    let bind_addr = config.bind_addr;
    let started = CoreState::start(config, store, extractor).await?;
    let mut server = api::start_api_server(started.core.clone(), bind_addr).await?;
    tracing::info!(addr = %server.addr, "Listening");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Could not listen for shutdown signal");
    }

    tracing::info!("Shutting down");
    server.shutdown();
    server.stopped().await;
    started.pool.shutdown().await;
    Ok(())
}
