//! Per-controller monitor loop.
//!
//! # Purpose
//! The lease-stream-reconcile worker for one controller: race peers for
//! the monitor lease, open a session, stream the all-models delta feed into
//! the catalog, keep liveness and stats current, push pending credential
//! updates, renew the lease before it expires and release it on the way
//! out.
//!
//! # Failure discipline
//! Errors never propagate to callers. Every failure marks the controller
//! unavailable where appropriate, releases the lease, bumps a counter and
//! restarts the cycle with capped exponential backoff. Delta application is
//! idempotent (upsert, tombstone, clear), so a second monitor racing on the
//! same controller corrupts nothing.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use armada_backend::{AllWatcher, CredentialUpdate, Delta, Dialer, ModelManager};
use armada_catalog::{
    Application, ApplicationInfo, Catalog, Controller, ControllerStats, EntityPath, Error,
    Machine, MachineInfo,
};
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::WatcherConfig;
use crate::secrets::SecretStore;

/// Why a monitor cycle ended.
enum Exit {
    Shutdown,
    ControllerGone,
    LostLease,
}

/// Live-entity bookkeeping backing the controller stats counters.
#[derive(Default)]
struct Tally {
    model_units: HashMap<String, u64>,
    machines: HashSet<String>,
    applications: HashSet<String>,
}

impl Tally {
    fn stats(&self) -> ControllerStats {
        ControllerStats {
            model_count: self.model_units.len() as u64,
            machine_count: self.machines.len() as u64,
            application_count: self.applications.len() as u64,
            unit_count: self.model_units.values().sum(),
        }
    }
}

pub struct Monitor {
    catalog: Arc<dyn Catalog>,
    dialer: Arc<dyn Dialer>,
    secrets: Arc<dyn SecretStore>,
    config: WatcherConfig,
    path: EntityPath,
    shutdown: watch::Receiver<bool>,
}

impl Monitor {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        dialer: Arc<dyn Dialer>,
        secrets: Arc<dyn SecretStore>,
        config: WatcherConfig,
        path: EntityPath,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            catalog,
            dialer,
            secrets,
            config,
            path,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        let mut backoff = self.config.backoff_base;
        loop {
            if *self.shutdown.borrow() {
                return;
            }
            match self.cycle().await {
                Ok(Exit::Shutdown) | Ok(Exit::ControllerGone) => return,
                Ok(Exit::LostLease) => {
                    if self.pause(backoff).await {
                        return;
                    }
                    backoff = self.config.backoff_base;
                }
                Err(err) => {
                    warn!(controller = %self.path, error = %err, "monitor cycle failed");
                    metrics::counter!("armada_watcher_failures_total").increment(1);
                    if self.pause(backoff).await {
                        return;
                    }
                    backoff = (backoff * 2).min(self.config.backoff_max);
                }
            }
        }
    }

    /// Sleep, returning true when shutdown arrived instead.
    async fn pause(&mut self, wait: Duration) -> bool {
        tokio::select! {
            _ = self.shutdown.changed() => true,
            _ = tokio::time::sleep(wait) => false,
        }
    }

    async fn cycle(&mut self) -> armada_catalog::Result<Exit> {
        // Lease first: losing the race is the normal case on every node
        // but one.
        let ctl = match self.catalog.controller(&self.path).await {
            Ok(ctl) => ctl,
            Err(Error::NotFound(_)) => return Ok(Exit::ControllerGone),
            Err(err) => return Err(err),
        };
        let mut expiry = match self.acquire_lease(&ctl).await {
            Ok(expiry) => expiry,
            Err(Error::LeaseUnavailable) => {
                debug!(controller = %self.path, "monitor lease held elsewhere");
                return Ok(Exit::LostLease);
            }
            Err(err) => return Err(err),
        };

        // Connect. A dial failure stamps the first-failure time and frees
        // the lease for a better-placed peer.
        let session = match self.dialer.open(&ctl).await {
            Ok(session) => session,
            Err(err) => {
                self.catalog
                    .set_controller_unavailable_at(&self.path, Utc::now())
                    .await?;
                self.release_lease(expiry).await;
                return Err(Error::ConnectionFailure(format!("{err:#}")));
            }
        };

        let mut stream = match session.watch_all_models().await {
            Ok(stream) => stream,
            Err(err) => {
                self.catalog
                    .set_controller_unavailable_at(&self.path, Utc::now())
                    .await?;
                self.dialer.evict(&self.path);
                self.release_lease(expiry).await;
                return Err(Error::ConnectionFailure(format!("{err:#}")));
            }
        };

        let mut tally = Tally::default();
        let mut seen_first_batch = false;
        // A local receiver keeps the select braid free of self borrows.
        let mut shutdown = self.shutdown.clone();
        loop {
            let renew_at = lease_deadline(expiry, self.config.renew_margin);
            tokio::select! {
                _ = shutdown.changed() => {
                    stream.stop().await.ok();
                    self.release_lease(expiry).await;
                    return Ok(Exit::Shutdown);
                }
                _ = tokio::time::sleep_until(renew_at) => {
                    match self.renew_lease(expiry).await {
                        Ok(new_expiry) => expiry = new_expiry,
                        Err(Error::LeaseUnavailable) => {
                            info!(controller = %self.path, "monitor lease lost");
                            stream.stop().await.ok();
                            return Ok(Exit::LostLease);
                        }
                        Err(err) => {
                            stream.stop().await.ok();
                            return Err(err);
                        }
                    }
                }
                batch = stream.next() => {
                    let deltas = match batch {
                        Ok(deltas) => deltas,
                        Err(err) => {
                            self.catalog
                                .set_controller_unavailable_at(&self.path, Utc::now())
                                .await?;
                            self.dialer.evict(&self.path);
                            self.release_lease(expiry).await;
                            return Err(Error::ConnectionFailure(format!("{err:#}")));
                        }
                    };
                    self.apply_deltas(&mut tally, deltas).await?;
                    if !seen_first_batch {
                        // The backend answered with real state; the outage,
                        // if any, is over.
                        self.catalog.set_controller_available(&self.path).await?;
                        seen_first_batch = true;
                    }
                    self.catalog
                        .set_controller_stats(&self.path, tally.stats())
                        .await?;
                    self.push_credentials(session.as_ref()).await?;
                }
            }
        }
    }

    /// One CAS attempt at taking, renewing or stealing the lease.
    async fn acquire_lease(&self, ctl: &Controller) -> armada_catalog::Result<DateTime<Utc>> {
        let now = Utc::now();
        let held_elsewhere = !ctl.monitor_lease_owner.is_empty()
            && ctl.monitor_lease_owner != self.config.owner_id
            && ctl.monitor_lease_expiry.is_some_and(|e| e > now);
        if held_elsewhere {
            return Err(Error::LeaseUnavailable);
        }
        let new_expiry = now
            + chrono::Duration::from_std(self.config.lease_duration)
                .unwrap_or_else(|_| chrono::Duration::seconds(60));
        let expiry = self
            .catalog
            .acquire_monitor_lease(
                &self.path,
                ctl.monitor_lease_expiry,
                &ctl.monitor_lease_owner,
                new_expiry,
                &self.config.owner_id,
            )
            .await?;
        metrics::counter!("armada_monitor_leases_acquired_total").increment(1);
        expiry.ok_or(Error::LeaseUnavailable)
    }

    async fn renew_lease(
        &self,
        current: DateTime<Utc>,
    ) -> armada_catalog::Result<DateTime<Utc>> {
        let new_expiry = Utc::now()
            + chrono::Duration::from_std(self.config.lease_duration)
                .unwrap_or_else(|_| chrono::Duration::seconds(60));
        let expiry = self
            .catalog
            .acquire_monitor_lease(
                &self.path,
                Some(current),
                &self.config.owner_id,
                new_expiry,
                &self.config.owner_id,
            )
            .await?;
        expiry.ok_or(Error::LeaseUnavailable)
    }

    /// Release by CAS with an empty owner; a lost race here just means the
    /// lease already moved on.
    async fn release_lease(&self, current: DateTime<Utc>) {
        let result = self
            .catalog
            .acquire_monitor_lease(
                &self.path,
                Some(current),
                &self.config.owner_id,
                current,
                "",
            )
            .await;
        if let Err(err) = result
            && !matches!(err, Error::LeaseUnavailable | Error::NotFound(_))
        {
            warn!(controller = %self.path, error = %err, "lease release failed");
        }
    }

    async fn apply_deltas(
        &self,
        tally: &mut Tally,
        deltas: Vec<Delta>,
    ) -> armada_catalog::Result<()> {
        let count = deltas.len() as u64;
        for delta in deltas {
            match delta {
                Delta::Model(d) => {
                    self.catalog
                        .set_model_life(&self.path, &d.uuid, d.life)
                        .await?;
                    self.catalog
                        .set_model_unit_count(&self.path, &d.uuid, d.unit_count)
                        .await?;
                    self.catalog
                        .set_model_status(&self.path, &d.uuid, &d.status)
                        .await?;
                    if d.life.is_dead() {
                        tally.model_units.remove(&d.uuid);
                    } else {
                        tally.model_units.insert(d.uuid, d.unit_count);
                    }
                }
                Delta::Machine(d) => {
                    let machine = Machine {
                        controller: self.path.clone(),
                        cloud: d.cloud,
                        region: d.region,
                        info: MachineInfo {
                            model_uuid: d.model_uuid,
                            id: d.id,
                            life: d.life,
                            details: d.details,
                        },
                    };
                    let id = machine.doc_id();
                    if machine.info.life.is_dead() {
                        tally.machines.remove(&id);
                    } else {
                        tally.machines.insert(id);
                    }
                    self.catalog.update_machine_info(machine).await?;
                }
                Delta::Application(d) => {
                    let app = Application {
                        controller: self.path.clone(),
                        cloud: d.cloud,
                        region: d.region,
                        info: ApplicationInfo {
                            model_uuid: d.model_uuid,
                            name: d.name,
                            life: d.life,
                            details: d.details,
                        },
                    };
                    let id = app.doc_id();
                    if app.info.life.is_dead() {
                        tally.applications.remove(&id);
                    } else {
                        tally.applications.insert(id);
                    }
                    self.catalog.update_application_info(app).await?;
                }
            }
        }
        metrics::counter!("armada_deltas_applied_total").increment(count);
        Ok(())
    }

    /// Drain the controller's pending credential set.
    async fn push_credentials(&self, session: &dyn ModelManager) -> armada_catalog::Result<()> {
        let ctl = self.catalog.controller(&self.path).await?;
        for cred_path in ctl.update_credentials {
            let cred = match self.catalog.credential(&cred_path).await {
                Ok(cred) => cred,
                Err(Error::NotFound(_)) => {
                    warn!(credential = %cred_path, "pending credential vanished");
                    self.catalog
                        .clear_credential_update(&self.path, &cred_path)
                        .await?;
                    continue;
                }
                Err(err) => return Err(err),
            };
            let attributes = if cred.attributes_in_vault {
                self.secrets.get(&cred_path).await?
            } else {
                cred.attributes.clone()
            };
            let update = CredentialUpdate {
                path: cred_path.clone(),
                kind: cred.kind.clone(),
                attributes,
                revoked: cred.revoked,
            };
            match session.update_credential(&update).await {
                Ok(()) => {
                    self.catalog
                        .clear_credential_update(&self.path, &cred_path)
                        .await?;
                    self.catalog
                        .credential_add_controller(&cred_path, &self.path)
                        .await?;
                    debug!(credential = %cred_path, controller = %self.path, "credential pushed");
                }
                Err(err) => {
                    // Left on the set; the next poll retries.
                    warn!(credential = %cred_path, error = %err, "credential push failed");
                }
            }
        }
        Ok(())
    }
}

fn lease_deadline(expiry: DateTime<Utc>, margin: Duration) -> tokio::time::Instant {
    let margin = chrono::Duration::from_std(margin).unwrap_or_else(|_| chrono::Duration::zero());
    let until = (expiry - margin) - Utc::now();
    let wait = until.to_std().unwrap_or(Duration::ZERO);
    tokio::time::Instant::now() + wait
}

#[cfg(test)]
mod tests {
    use super::*;
    use armada_backend::dialer::DirectDialer;
    use armada_backend::inprocess::InProcessBackend;
    use armada_backend::{ApplicationDelta, MachineDelta, ModelDelta};
    use armada_catalog::{Credential, Life, MemoryCatalog, Model};
    use crate::secrets::MemorySecretStore;

    struct Fixture {
        catalog: Arc<MemoryCatalog>,
        backend: InProcessBackend,
        shutdown_tx: watch::Sender<bool>,
        handle: tokio::task::JoinHandle<()>,
        path: EntityPath,
    }

    async fn start_monitor() -> Fixture {
        let catalog = Arc::new(MemoryCatalog::new());
        let path: EntityPath = "bob/c1".parse().unwrap();
        catalog
            .insert_controller(Controller {
                path: path.clone(),
                uuid: "c1-uuid".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        catalog
            .insert_model(Model {
                path: "alice/prod".parse().unwrap(),
                uuid: "u-1".to_string(),
                controller: path.clone(),
                credential: "alice/aws/default".parse().unwrap(),
                cloud: "aws".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let backend = InProcessBackend::new();
        let dialer = DirectDialer::new();
        dialer.register(path.clone(), backend.handle());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let monitor = Monitor::new(
            Arc::clone(&catalog) as Arc<dyn Catalog>,
            Arc::new(dialer),
            Arc::new(MemorySecretStore::new()),
            WatcherConfig::fast("test-owner"),
            path.clone(),
            shutdown_rx,
        );
        let handle = tokio::spawn(monitor.run());
        // Give the monitor a moment to take the lease and connect.
        wait_for(|| {
            let backend = backend.clone();
            async move { backend.watcher_count().await == 1 }
        })
        .await;
        Fixture {
            catalog,
            backend,
            shutdown_tx,
            handle,
            path,
        }
    }

    async fn wait_for<F, Fut>(mut condition: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        for _ in 0..200 {
            if condition().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn monitor_applies_deltas_and_tracks_liveness() {
        let fx = start_monitor().await;

        fx.backend
            .push_deltas(vec![
                Delta::Model(ModelDelta {
                    uuid: "u-1".to_string(),
                    life: Life::Alive,
                    status: "available".to_string(),
                    unit_count: 4,
                }),
                Delta::Machine(MachineDelta {
                    model_uuid: "u-1".to_string(),
                    id: "0".to_string(),
                    life: Life::Alive,
                    cloud: "aws".to_string(),
                    region: "eu-west-1".to_string(),
                    details: serde_json::Value::Null,
                }),
                Delta::Application(ApplicationDelta {
                    model_uuid: "u-1".to_string(),
                    name: "db".to_string(),
                    life: Life::Alive,
                    cloud: "aws".to_string(),
                    region: "eu-west-1".to_string(),
                    details: serde_json::Value::Null,
                }),
            ])
            .await;

        let catalog = Arc::clone(&fx.catalog);
        wait_for(|| {
            let catalog = Arc::clone(&catalog);
            async move {
                catalog
                    .model_by_uuid("u-1")
                    .await
                    .map(|m| m.unit_count == 4 && m.status == "available")
                    .unwrap_or(false)
            }
        })
        .await;

        assert_eq!(fx.catalog.machines_for_model("u-1").await.unwrap().len(), 1);
        assert_eq!(
            fx.catalog
                .applications_for_model("u-1")
                .await
                .unwrap()
                .len(),
            1
        );
        let ctl = fx.catalog.controller(&fx.path).await.unwrap();
        assert_eq!(ctl.unavailable_since, None);
        assert_eq!(ctl.monitor_lease_owner, "test-owner");
        assert_eq!(ctl.stats.model_count, 1);
        assert_eq!(ctl.stats.unit_count, 4);

        fx.shutdown_tx.send(true).unwrap();
        fx.handle.await.unwrap();
        // Shutdown released the lease.
        let ctl = fx.catalog.controller(&fx.path).await.unwrap();
        assert_eq!(ctl.monitor_lease_owner, "");
    }

    #[tokio::test]
    async fn monitor_tombstones_dead_entities() {
        let fx = start_monitor().await;

        fx.backend
            .push_deltas(vec![Delta::Machine(MachineDelta {
                model_uuid: "u-1".to_string(),
                id: "0".to_string(),
                life: Life::Alive,
                cloud: String::new(),
                region: String::new(),
                details: serde_json::Value::Null,
            })])
            .await;
        let catalog = Arc::clone(&fx.catalog);
        wait_for(|| {
            let catalog = Arc::clone(&catalog);
            async move { catalog.machines_for_model("u-1").await.unwrap().len() == 1 }
        })
        .await;

        fx.backend
            .push_deltas(vec![
                Delta::Machine(MachineDelta {
                    model_uuid: "u-1".to_string(),
                    id: "0".to_string(),
                    life: Life::Dead,
                    cloud: String::new(),
                    region: String::new(),
                    details: serde_json::Value::Null,
                }),
                Delta::Model(ModelDelta {
                    uuid: "u-1".to_string(),
                    life: Life::Dead,
                    status: String::new(),
                    unit_count: 0,
                }),
            ])
            .await;

        let catalog = Arc::clone(&fx.catalog);
        wait_for(|| {
            let catalog = Arc::clone(&catalog);
            async move { catalog.machines_for_model("u-1").await.unwrap().is_empty() }
        })
        .await;
        // Dead model record stays as a tombstone.
        assert_eq!(
            fx.catalog.model_by_uuid("u-1").await.unwrap().life,
            Life::Dead
        );

        fx.shutdown_tx.send(true).unwrap();
        fx.handle.await.unwrap();
    }

    #[tokio::test]
    async fn monitor_pushes_pending_credentials() {
        let fx = start_monitor().await;
        let cred_path: armada_catalog::CredentialPath = "alice/aws/default".parse().unwrap();
        fx.catalog
            .update_credential(Credential {
                path: cred_path.clone(),
                kind: "userpass".to_string(),
                attributes: [("username".to_string(), "alice".to_string())].into(),
                ..Default::default()
            })
            .await
            .unwrap();
        fx.catalog
            .set_credential_updates(&[fx.path.clone()], &cred_path)
            .await
            .unwrap();

        // Any delta batch triggers a drain.
        fx.backend
            .push_deltas(vec![Delta::Model(ModelDelta {
                uuid: "u-1".to_string(),
                life: Life::Alive,
                status: "available".to_string(),
                unit_count: 1,
            })])
            .await;

        let backend = fx.backend.clone();
        wait_for(|| {
            let backend = backend.clone();
            async move { !backend.credential_updates().await.is_empty() }
        })
        .await;

        let ctl = fx.catalog.controller(&fx.path).await.unwrap();
        assert!(ctl.update_credentials.is_empty());
        let cred = fx.catalog.credential(&cred_path).await.unwrap();
        assert_eq!(cred.controllers, vec![fx.path.clone()]);

        fx.shutdown_tx.send(true).unwrap();
        fx.handle.await.unwrap();
    }

    #[tokio::test]
    async fn second_monitor_loses_the_lease_race() {
        let fx = start_monitor().await;

        // A competing worker with different identity cannot take the lease
        // while it is live.
        let ctl = fx.catalog.controller(&fx.path).await.unwrap();
        let err = fx
            .catalog
            .acquire_monitor_lease(
                &fx.path,
                None,
                "",
                Utc::now() + chrono::Duration::seconds(30),
                "other-owner",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LeaseUnavailable));
        assert_eq!(ctl.monitor_lease_owner, "test-owner");

        fx.shutdown_tx.send(true).unwrap();
        fx.handle.await.unwrap();
    }
}
