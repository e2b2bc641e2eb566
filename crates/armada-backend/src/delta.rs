//! Change-stream entries emitted by a backend's all-models watcher.

use armada_catalog::Life;
use serde::{Deserialize, Serialize};

/// One entity state transition. Batches preserve the backend's total order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Delta {
    Model(ModelDelta),
    Machine(MachineDelta),
    Application(ApplicationDelta),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDelta {
    pub uuid: String,
    pub life: Life,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub unit_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineDelta {
    pub model_uuid: String,
    pub id: String,
    pub life: Life,
    #[serde(default)]
    pub cloud: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub details: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationDelta {
    pub model_uuid: String,
    pub name: String,
    pub life: Life,
    #[serde(default)]
    pub cloud: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub details: serde_json::Value,
}
