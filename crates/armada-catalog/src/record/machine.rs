//! Machine and application records sourced from backend delta streams.
//!
//! Both are keyed by the composite id `<controller> <modelUUID> <entity-id>`
//! and both are tombstoned: a dead entity is removed rather than retained.

use serde::{Deserialize, Serialize};

use crate::path::EntityPath;
use crate::record::Life;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MachineInfo {
    pub model_uuid: String,
    pub id: String,
    #[serde(default)]
    pub life: Life,
    /// Remaining backend-reported fields, stored opaquely.
    #[serde(default)]
    pub details: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    pub controller: EntityPath,
    #[serde(default)]
    pub cloud: String,
    #[serde(default)]
    pub region: String,
    pub info: MachineInfo,
}

impl Machine {
    pub fn doc_id(&self) -> String {
        format!("{} {} {}", self.controller, self.info.model_uuid, self.info.id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationInfo {
    pub model_uuid: String,
    pub name: String,
    #[serde(default)]
    pub life: Life,
    #[serde(default)]
    pub details: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub controller: EntityPath,
    #[serde(default)]
    pub cloud: String,
    #[serde(default)]
    pub region: String,
    pub info: ApplicationInfo,
}

impl Application {
    pub fn doc_id(&self) -> String {
        format!("{} {} {}", self.controller, self.info.model_uuid, self.info.name)
    }
}
