//! Control-plane service entry point.

use std::sync::Arc;

use anyhow::{Context, Result};
use armada_authz::RelationStore;
use armada_backend::{CachingDialer, Dialer};
use armada_catalog::{Catalog, MemoryCatalog};
use tokio::sync::watch;
use tracing::{info, warn};

use controlplane::app::{AppState, build_router};
use controlplane::auth::{Authenticator, StaticTokenAuthenticator};
use controlplane::config::ControlPlaneConfig;
use controlplane::observability;
use controlplane::secrets::{MemorySecretStore, SecretStore};
use controlplane::watcher::{Supervisor, WatcherConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Install default crypto provider for rustls before any endpoint is
    // built.
    rustls::crypto::ring::default_provider().install_default().ok();

    let config = ControlPlaneConfig::from_env_or_yaml()?;
    let metrics_handle = observability::init_observability();
    tokio::spawn(observability::serve_metrics(
        metrics_handle,
        config.metrics_bind,
    ));

    let catalog: Arc<dyn Catalog> = Arc::new(MemoryCatalog::new());
    let relations = Arc::new(RelationStore::new());
    let dialer: Arc<dyn Dialer> = Arc::new(CachingDialer::new()?);
    let secrets: Arc<dyn SecretStore> = Arc::new(MemorySecretStore::new());
    let authenticator: Arc<dyn Authenticator> = match &config.auth_tokens_path {
        Some(path) => Arc::new(
            StaticTokenAuthenticator::from_yaml_file(path)
                .with_context(|| "load auth tokens")?,
        ),
        None => {
            warn!("ARMADA_AUTH_TOKENS is unset; every request will be rejected");
            Arc::new(StaticTokenAuthenticator::new())
        }
    };

    let state = AppState::new(
        Arc::clone(&catalog),
        Arc::clone(&relations),
        Arc::clone(&dialer),
        authenticator,
        Arc::clone(&secrets),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let supervisor = Supervisor::new(
        catalog,
        Arc::clone(&dialer),
        secrets,
        WatcherConfig::from_config(&config),
        shutdown_rx,
    );
    let supervisor_handle = tokio::spawn(supervisor.run());

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "control plane listening");
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await
        .context("serve control plane API")?;

    info!("shutting down");
    shutdown_tx.send(true).ok();
    supervisor_handle.await.ok();
    dialer.close_all().await;
    Ok(())
}
