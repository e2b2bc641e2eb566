//! Model records and life-cycle state.

use serde::{Deserialize, Serialize};

use crate::path::{CredentialPath, EntityPath};

/// Life-cycle state reported by the owning controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Life {
    #[default]
    Alive,
    Dying,
    Dead,
}

impl Life {
    pub fn is_dead(self) -> bool {
        self == Life::Dead
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Life::Alive => "alive",
            Life::Dying => "dying",
            Life::Dead => "dead",
        }
    }
}

/// A workload environment hosted by exactly one controller.
///
/// The UUID is the primary key; the path is unique among live models. Dead
/// models are retained as tombstones so the UUID is never reused.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub path: EntityPath,
    pub uuid: String,
    pub controller: EntityPath,
    pub credential: CredentialPath,
    pub cloud: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub life: Life,
    #[serde(default)]
    pub unit_count: u64,
    /// Aggregated status string as last reported by the backend.
    #[serde(default)]
    pub status: String,
}
