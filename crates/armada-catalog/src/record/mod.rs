//! Record definitions for every catalog table.

mod audit;
mod cloud;
mod controller;
mod credential;
mod machine;
mod model;
mod offer;

pub use audit::{AuditEntry, AuditFilter};
pub use cloud::{CloudRegion, LocationsFilter};
pub use controller::{Controller, ControllerStats};
pub use credential::Credential;
pub use machine::{Application, ApplicationInfo, Machine, MachineInfo};
pub use model::{Life, Model};
pub use offer::{
    parse_offer_url, ApplicationOffer, OfferAccess, OfferEndpoint, OfferFilter, OfferUserDetails,
    EVERYONE,
};

use serde::{Deserialize, Serialize};

/// Embedded reader/writer/admin user lists carried by records whose access is
/// not covered by the relationship graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acl {
    #[serde(default)]
    pub read: Vec<String>,
    #[serde(default)]
    pub write: Vec<String>,
    #[serde(default)]
    pub admin: Vec<String>,
}

impl Acl {
    pub fn can_read(&self, user: &str) -> bool {
        let u = |s: &String| s == user || s == EVERYONE;
        self.read.iter().any(u) || self.write.iter().any(u) || self.admin.iter().any(u)
    }
}
