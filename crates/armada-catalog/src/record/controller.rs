//! Controller records.
//!
//! # Purpose
//! One record per enrolled backend controller: how to reach it, whether it is
//! healthy, which worker monitors it and which credentials it still has to
//! pick up.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::path::{CredentialPath, EntityPath};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Controller {
    pub path: EntityPath,
    pub uuid: String,
    /// API host:port pairs, tried in order when dialing.
    pub addresses: Vec<String>,
    /// PEM CA certificate the backend's TLS listener chains to.
    pub ca_cert: String,
    pub admin_user: String,
    pub admin_password: String,
    /// Deprecated controllers keep their models but take no new ones.
    #[serde(default)]
    pub deprecated: bool,
    /// Set on the first observed failure, zeroed when the monitor sees the
    /// controller again. The first-failure time survives later failures so
    /// alerting can measure the full outage.
    #[serde(default)]
    pub unavailable_since: Option<DateTime<Utc>>,
    /// Monitor lease. An empty owner means the lease is free.
    #[serde(default)]
    pub monitor_lease_owner: String,
    #[serde(default)]
    pub monitor_lease_expiry: Option<DateTime<Utc>>,
    /// Credentials whose latest values have not yet been pushed to this
    /// controller. Drained by the monitor.
    #[serde(default)]
    pub update_credentials: Vec<CredentialPath>,
    #[serde(default)]
    pub stats: ControllerStats,
}

/// Aggregate counts maintained by the monitor from the delta stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerStats {
    pub model_count: u64,
    pub machine_count: u64,
    pub application_count: u64,
    pub unit_count: u64,
}
