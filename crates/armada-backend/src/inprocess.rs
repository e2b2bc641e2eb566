//! In-process backend for tests.
//!
//! # Purpose
//! A [`ModelManager`] that lives in the test process: models are a map,
//! watchers are channels, and the test drives the delta stream by hand.
//! Used with [`DirectDialer`](crate::dialer::DirectDialer) wherever a real
//! QUIC backend would be overkill.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Result, anyhow};
use armada_catalog::Life;
use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use uuid::Uuid;

use crate::api::{
    AllWatcher, CredentialUpdate, ModelInfo, ModelManager, ModelSpec, ModelStatusInfo, OfferSpec,
};
use crate::delta::{Delta, ModelDelta};

#[derive(Default)]
struct Inner {
    models: Mutex<HashMap<String, ModelInfo>>,
    grants: Mutex<Vec<(String, String, String)>>,
    offers: Mutex<HashMap<String, OfferSpec>>,
    destroyed_offers: Mutex<Vec<String>>,
    credential_updates: Mutex<Vec<CredentialUpdate>>,
    watchers: Mutex<Vec<mpsc::UnboundedSender<Vec<Delta>>>>,
    /// Deltas replayed to every new watcher before live ones.
    initial_deltas: Mutex<Vec<Delta>>,
    closed: AtomicBool,
}

#[derive(Clone, Default)]
pub struct InProcessBackend {
    inner: Arc<Inner>,
}

impl InProcessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> Arc<dyn ModelManager> {
        Arc::new(self.clone())
    }

    pub async fn set_initial_deltas(&self, deltas: Vec<Delta>) {
        *self.inner.initial_deltas.lock().await = deltas;
    }

    /// Deliver a batch to every connected watcher.
    pub async fn push_deltas(&self, deltas: Vec<Delta>) {
        let mut watchers = self.inner.watchers.lock().await;
        watchers.retain(|tx| tx.send(deltas.clone()).is_ok());
    }

    pub async fn seed_model(&self, info: ModelInfo) {
        self.inner
            .models
            .lock()
            .await
            .insert(info.uuid.clone(), info);
    }

    pub async fn credential_updates(&self) -> Vec<CredentialUpdate> {
        self.inner.credential_updates.lock().await.clone()
    }

    pub async fn grants(&self) -> Vec<(String, String, String)> {
        self.inner.grants.lock().await.clone()
    }

    pub async fn destroyed_offers(&self) -> Vec<String> {
        self.inner.destroyed_offers.lock().await.clone()
    }

    pub async fn watcher_count(&self) -> usize {
        let mut watchers = self.inner.watchers.lock().await;
        watchers.retain(|tx| !tx.is_closed());
        watchers.len()
    }

    fn check_open(&self) -> Result<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(anyhow!("backend closed"));
        }
        Ok(())
    }
}

#[async_trait]
impl ModelManager for InProcessBackend {
    async fn watch_all_models(&self) -> Result<Box<dyn AllWatcher>> {
        self.check_open()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let initial = self.inner.initial_deltas.lock().await.clone();
        if !initial.is_empty() {
            tx.send(initial).ok();
        }
        self.inner.watchers.lock().await.push(tx);
        Ok(Box::new(InProcessWatcher { rx }))
    }

    async fn add_model(&self, spec: &ModelSpec) -> Result<ModelInfo> {
        self.check_open()?;
        let info = ModelInfo {
            uuid: Uuid::new_v4().to_string(),
            name: spec.name.clone(),
            owner: spec.owner.clone(),
            cloud: spec.cloud.clone(),
            region: spec.region.clone(),
            life: Life::Alive,
            status: "available".to_string(),
        };
        self.inner
            .models
            .lock()
            .await
            .insert(info.uuid.clone(), info.clone());
        Ok(info)
    }

    async fn destroy_model(&self, uuid: &str) -> Result<()> {
        self.check_open()?;
        self.inner
            .models
            .lock()
            .await
            .remove(uuid)
            .ok_or_else(|| anyhow!("model {uuid} not found"))?;
        self.push_deltas(vec![Delta::Model(ModelDelta {
            uuid: uuid.to_string(),
            life: Life::Dead,
            status: String::new(),
            unit_count: 0,
        })])
        .await;
        Ok(())
    }

    async fn grant_model_access(&self, uuid: &str, user: &str, access: &str) -> Result<()> {
        self.check_open()?;
        self.inner.grants.lock().await.push((
            uuid.to_string(),
            user.to_string(),
            access.to_string(),
        ));
        Ok(())
    }

    async fn revoke_model_access(&self, uuid: &str, user: &str, access: &str) -> Result<()> {
        self.check_open()?;
        self.inner
            .grants
            .lock()
            .await
            .retain(|(u, usr, acc)| !(u == uuid && usr == user && acc == access));
        Ok(())
    }

    async fn add_application_offer(&self, spec: &OfferSpec) -> Result<String> {
        self.check_open()?;
        let uuid = Uuid::new_v4().to_string();
        self.inner
            .offers
            .lock()
            .await
            .insert(uuid.clone(), spec.clone());
        Ok(uuid)
    }

    async fn destroy_application_offer(&self, offer_url: &str) -> Result<()> {
        self.check_open()?;
        self.inner
            .destroyed_offers
            .lock()
            .await
            .push(offer_url.to_string());
        Ok(())
    }

    async fn update_credential(&self, update: &CredentialUpdate) -> Result<()> {
        self.check_open()?;
        self.inner
            .credential_updates
            .lock()
            .await
            .push(update.clone());
        Ok(())
    }

    async fn model_status(&self, uuid: &str) -> Result<ModelStatusInfo> {
        self.check_open()?;
        let models = self.inner.models.lock().await;
        let info = models
            .get(uuid)
            .ok_or_else(|| anyhow!("model {uuid} not found"))?;
        Ok(ModelStatusInfo {
            uuid: info.uuid.clone(),
            life: info.life,
            status: info.status.clone(),
            unit_count: 0,
        })
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        // Dropping the senders ends every watcher's stream.
        self.inner.watchers.lock().await.clear();
    }
}

struct InProcessWatcher {
    rx: mpsc::UnboundedReceiver<Vec<Delta>>,
}

#[async_trait]
impl AllWatcher for InProcessWatcher {
    async fn next(&mut self) -> Result<Vec<Delta>> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| anyhow!("watch stream closed"))
    }

    async fn stop(&mut self) -> Result<()> {
        self.rx.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn watchers_receive_initial_then_live_deltas() {
        let backend = InProcessBackend::new();
        backend
            .set_initial_deltas(vec![Delta::Model(ModelDelta {
                uuid: "u-1".to_string(),
                life: Life::Alive,
                status: "available".to_string(),
                unit_count: 1,
            })])
            .await;
        let mut watcher = backend.watch_all_models().await.expect("watch");
        let initial = watcher.next().await.expect("initial");
        assert_eq!(initial.len(), 1);

        backend
            .push_deltas(vec![Delta::Model(ModelDelta {
                uuid: "u-1".to_string(),
                life: Life::Dead,
                status: String::new(),
                unit_count: 0,
            })])
            .await;
        let live = watcher.next().await.expect("live");
        assert!(matches!(&live[0], Delta::Model(d) if d.life == Life::Dead));
    }

    #[tokio::test]
    async fn records_grants_offers_and_seeded_models() {
        let backend = InProcessBackend::new();
        backend
            .seed_model(ModelInfo {
                uuid: "u-1".to_string(),
                name: "prod".to_string(),
                owner: "alice".to_string(),
                cloud: "aws".to_string(),
                region: String::new(),
                life: Life::Alive,
                status: "available".to_string(),
            })
            .await;
        assert!(backend.model_status("u-1").await.is_ok());

        backend
            .grant_model_access("u-1", "bob", "write")
            .await
            .expect("grant");
        assert_eq!(backend.grants().await.len(), 1);
        backend
            .revoke_model_access("u-1", "bob", "write")
            .await
            .expect("revoke");
        assert!(backend.grants().await.is_empty());

        backend
            .destroy_application_offer("alice/prod.db")
            .await
            .expect("destroy offer");
        assert_eq!(backend.destroyed_offers().await, ["alice/prod.db"]);
    }

    #[tokio::test]
    async fn close_ends_watchers_and_rejects_calls() {
        let backend = InProcessBackend::new();
        let mut watcher = backend.watch_all_models().await.expect("watch");
        backend.close().await;
        assert!(watcher.next().await.is_err());
        assert!(backend.is_closed());
        assert!(
            backend
                .update_credential(&CredentialUpdate {
                    path: "alice/aws/default".parse().unwrap(),
                    kind: "userpass".to_string(),
                    attributes: Default::default(),
                    revoked: false,
                })
                .await
                .is_err()
        );
    }
}
