//! Fleet watcher supervision.
//!
//! # Purpose
//! One monitor task per enrolled controller. The supervisor rescans the
//! controller table on an interval, starts monitors for new controllers,
//! reaps monitors whose controllers are gone, and restarts monitors that
//! died. On shutdown every child observes the same signal, releases its
//! lease and joins.

pub mod monitor;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use armada_backend::Dialer;
use armada_catalog::{Catalog, EntityPath};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ControlPlaneConfig;
use crate::secrets::SecretStore;

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Identity written into monitor leases; unique per process.
    pub owner_id: String,
    pub lease_duration: Duration,
    pub renew_margin: Duration,
    pub supervisor_interval: Duration,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl WatcherConfig {
    pub fn from_config(config: &ControlPlaneConfig) -> Self {
        Self {
            owner_id: format!("armada-{}", Uuid::new_v4()),
            lease_duration: config.lease_duration,
            renew_margin: config.lease_renew_margin,
            supervisor_interval: config.supervisor_interval,
            backoff_base: config.backoff_base,
            backoff_max: config.backoff_max,
        }
    }

    /// Short intervals for tests that drive the loop directly.
    pub fn fast(owner_id: &str) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            lease_duration: Duration::from_secs(5),
            renew_margin: Duration::from_secs(2),
            supervisor_interval: Duration::from_millis(50),
            backoff_base: Duration::from_millis(20),
            backoff_max: Duration::from_millis(200),
        }
    }
}

pub struct Supervisor {
    catalog: Arc<dyn Catalog>,
    dialer: Arc<dyn Dialer>,
    secrets: Arc<dyn SecretStore>,
    config: WatcherConfig,
    shutdown: watch::Receiver<bool>,
    children: HashMap<EntityPath, JoinHandle<()>>,
}

impl Supervisor {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        dialer: Arc<dyn Dialer>,
        secrets: Arc<dyn SecretStore>,
        config: WatcherConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            catalog,
            dialer,
            secrets,
            config,
            shutdown,
            children: HashMap::new(),
        }
    }

    pub async fn run(mut self) {
        info!(owner = %self.config.owner_id, "fleet watcher starting");
        let mut ticker = tokio::time::interval(self.config.supervisor_interval);
        loop {
            tokio::select! {
                _ = self.shutdown.changed() => break,
                _ = ticker.tick() => {
                    if let Err(err) = self.reconcile().await {
                        tracing::warn!(error = %err, "watcher supervisor scan failed");
                    }
                }
            }
            if *self.shutdown.borrow() {
                break;
            }
        }
        // Children see the same shutdown signal; wait for them to release
        // their leases and exit.
        for (path, handle) in self.children.drain() {
            if let Err(err) = handle.await {
                tracing::warn!(controller = %path, error = %err, "monitor join failed");
            }
        }
        info!("fleet watcher stopped");
    }

    async fn reconcile(&mut self) -> armada_catalog::Result<()> {
        let controllers = self.catalog.controllers().await?;
        let live: std::collections::HashSet<EntityPath> =
            controllers.iter().map(|c| c.path.clone()).collect();

        // Reap monitors for removed controllers and any that have exited.
        self.children.retain(|path, handle| {
            if !live.contains(path) {
                debug!(controller = %path, "stopping monitor for removed controller");
                handle.abort();
                return false;
            }
            !handle.is_finished()
        });

        for ctl in controllers {
            if self.children.contains_key(&ctl.path) {
                continue;
            }
            debug!(controller = %ctl.path, "starting monitor");
            let task = monitor::Monitor::new(
                Arc::clone(&self.catalog),
                Arc::clone(&self.dialer),
                Arc::clone(&self.secrets),
                self.config.clone(),
                ctl.path.clone(),
                self.shutdown.clone(),
            );
            self.children
                .insert(ctl.path.clone(), tokio::spawn(task.run()));
        }
        metrics::gauge!("armada_watcher_active").set(self.children.len() as f64);
        Ok(())
    }
}
