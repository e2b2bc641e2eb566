//! Cloud-credential records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::path::{CredentialPath, EntityPath};
use crate::record::Acl;

/// Cloud-provider authentication material for one user on one cloud.
///
/// When `attributes_in_vault` is set the attribute map here is empty and the
/// real values live in the external secret store under the credential path.
/// Revoked credentials stay in the catalog for audit; they are pushed to
/// controllers with the revoked flag so backends can drop them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub path: CredentialPath,
    /// Provider-specific auth type, e.g. `userpass` or `oauth2`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub attributes_in_vault: bool,
    #[serde(default)]
    pub revoked: bool,
    #[serde(default)]
    pub acl: Acl,
    /// Controllers the credential is currently loaded on. Maintained with
    /// set semantics by the store.
    #[serde(default)]
    pub controllers: Vec<EntityPath>,
}
