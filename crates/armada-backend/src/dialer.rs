//! Connection cache and dialer interfaces.
//!
//! # Purpose
//! A process-wide map from controller path to live session. `open` returns
//! the cached session when the transport is still healthy, otherwise dials
//! using the controller record; concurrent opens for the same path share a
//! single dial. The watcher evicts entries when a controller is removed or
//! its addresses change; the dispatcher evicts on protocol errors.
//!
//! Callers only ever hold `Arc<dyn Dialer>`, so tests substitute
//! [`DirectDialer`] with in-process backends.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use armada_catalog::{Controller, EntityPath};
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::debug;

use crate::api::ModelManager;
use crate::session::Session;
use crate::transport::BackendTransport;

#[async_trait]
pub trait Dialer: Send + Sync {
    /// A live session for the controller, cached or freshly dialed.
    async fn open(&self, ctl: &Controller) -> Result<Arc<dyn ModelManager>>;
    /// Drop any cached session for the path and close it in the background.
    fn evict(&self, path: &EntityPath);
    async fn close_all(&self);
}

type Slot = Arc<Mutex<Option<Arc<dyn ModelManager>>>>;

pub struct CachingDialer {
    transport: BackendTransport,
    slots: DashMap<EntityPath, Slot>,
}

impl CachingDialer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            transport: BackendTransport::new().context("create backend transport")?,
            slots: DashMap::new(),
        })
    }
}

#[async_trait]
impl Dialer for CachingDialer {
    async fn open(&self, ctl: &Controller) -> Result<Arc<dyn ModelManager>> {
        let slot = self
            .slots
            .entry(ctl.path.clone())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone();
        // The slot lock is the singleflight barrier: the first caller dials
        // while the rest wait, then find the fresh session cached.
        let mut guard = slot.lock().await;
        if let Some(session) = guard.as_ref() {
            if !session.is_closed() {
                return Ok(Arc::clone(session));
            }
            debug!(controller = %ctl.path, "cached session is dead, redialing");
            *guard = None;
        }
        let session = Session::open(
            &self.transport,
            &ctl.addresses,
            &ctl.ca_cert,
            &ctl.admin_user,
            &ctl.admin_password,
        )
        .await
        .with_context(|| format!("dial controller {}", ctl.path))?;
        let session: Arc<dyn ModelManager> = Arc::new(session);
        *guard = Some(Arc::clone(&session));
        Ok(session)
    }

    fn evict(&self, path: &EntityPath) {
        if let Some((_, slot)) = self.slots.remove(path) {
            debug!(controller = %path, "evicting cached session");
            tokio::spawn(async move {
                if let Some(session) = slot.lock().await.take() {
                    session.close().await;
                }
            });
        }
    }

    async fn close_all(&self) {
        let slots: Vec<Slot> = self.slots.iter().map(|e| e.value().clone()).collect();
        self.slots.clear();
        for slot in slots {
            if let Some(session) = slot.lock().await.take() {
                session.close().await;
            }
        }
    }
}

/// Dialer returning pre-registered backends, bypassing the network.
#[derive(Default)]
pub struct DirectDialer {
    backends: DashMap<EntityPath, Arc<dyn ModelManager>>,
}

impl DirectDialer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, path: EntityPath, backend: Arc<dyn ModelManager>) {
        self.backends.insert(path, backend);
    }
}

#[async_trait]
impl Dialer for DirectDialer {
    async fn open(&self, ctl: &Controller) -> Result<Arc<dyn ModelManager>> {
        self.backends
            .get(&ctl.path)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| anyhow!("no backend registered for {}", ctl.path))
    }

    fn evict(&self, path: &EntityPath) {
        self.backends.remove(path);
    }

    async fn close_all(&self) {
        let backends: Vec<Arc<dyn ModelManager>> = self
            .backends
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for backend in backends {
            backend.close().await;
        }
        self.backends.clear();
    }
}
