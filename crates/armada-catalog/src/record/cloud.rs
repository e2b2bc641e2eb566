//! Cloud-region records.

use serde::{Deserialize, Serialize};

use crate::path::EntityPath;
use crate::record::Acl;

/// One `(cloud, region)` pair. A record with an empty region represents the
/// cloud itself and carries the cloud-wide fields (provider type, auth
/// types, ACL).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloudRegion {
    pub cloud: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub provider_type: String,
    #[serde(default)]
    pub auth_types: Vec<String>,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub identity_endpoint: String,
    #[serde(default)]
    pub storage_endpoint: String,
    #[serde(default)]
    pub ca_certificates: Vec<String>,
    #[serde(default)]
    pub acl: Acl,
    /// Controllers able to host new models in this region, in preference
    /// order. Secondaries are used when no primary is available.
    #[serde(default)]
    pub primary_controllers: Vec<EntityPath>,
    #[serde(default)]
    pub secondary_controllers: Vec<EntityPath>,
}

impl CloudRegion {
    pub fn doc_id(&self) -> String {
        format!("{}/{}", self.cloud, self.region)
    }
}

/// Equality filters for the locations query. Unknown filter fields are a
/// caller error, handled at the API boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationsFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}
