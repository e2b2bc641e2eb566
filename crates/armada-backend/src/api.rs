//! The backend operation surface.
//!
//! # Purpose
//! [`ModelManager`] is the complete RPC vocabulary the control plane relies
//! on; every implementation (QUIC session, in-process fake) provides exactly
//! these operations. Errors are transport-shaped (`anyhow`): the dispatcher
//! maps them onto its own taxonomy at the boundary.

use anyhow::Result;
use armada_catalog::{CredentialPath, Life};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::delta::Delta;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    pub owner: String,
    pub cloud: String,
    #[serde(default)]
    pub region: String,
    pub credential: CredentialPath,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub uuid: String,
    pub name: String,
    pub owner: String,
    pub cloud: String,
    #[serde(default)]
    pub region: String,
    pub life: Life,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferSpec {
    pub model_uuid: String,
    pub application_name: String,
    pub offer_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub endpoints: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialUpdate {
    pub path: CredentialPath,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub revoked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelStatusInfo {
    pub uuid: String,
    pub life: Life,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub unit_count: u64,
}

/// A live all-models delta stream.
#[async_trait]
pub trait AllWatcher: Send {
    /// The next batch of deltas, blocking until the backend has something.
    async fn next(&mut self) -> Result<Vec<Delta>>;
    async fn stop(&mut self) -> Result<()>;
}

/// Operations every backend controller serves.
#[async_trait]
pub trait ModelManager: Send + Sync {
    async fn watch_all_models(&self) -> Result<Box<dyn AllWatcher>>;
    async fn add_model(&self, spec: &ModelSpec) -> Result<ModelInfo>;
    async fn destroy_model(&self, uuid: &str) -> Result<()>;
    async fn grant_model_access(&self, uuid: &str, user: &str, access: &str) -> Result<()>;
    async fn revoke_model_access(&self, uuid: &str, user: &str, access: &str) -> Result<()>;
    /// Returns the backend-assigned offer UUID.
    async fn add_application_offer(&self, spec: &OfferSpec) -> Result<String>;
    async fn destroy_application_offer(&self, offer_url: &str) -> Result<()>;
    async fn update_credential(&self, update: &CredentialUpdate) -> Result<()>;
    async fn model_status(&self, uuid: &str) -> Result<ModelStatusInfo>;
    /// Whether the underlying transport is still usable. A closed session
    /// must be evicted, not retried.
    fn is_closed(&self) -> bool;
    async fn close(&self);
}
