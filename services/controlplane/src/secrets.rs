//! Secret store consumed for vault-held credential attributes.
//!
//! A credential record with the `attributes_in_vault` flag keeps an empty
//! attribute map in the catalog; the real values live here under the
//! credential path.

use std::collections::{BTreeMap, HashMap};

use armada_catalog::{CredentialPath, Error, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;

#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get(&self, path: &CredentialPath) -> Result<BTreeMap<String, String>>;
    async fn put(&self, path: &CredentialPath, attrs: BTreeMap<String, String>) -> Result<()>;
    async fn delete(&self, path: &CredentialPath) -> Result<()>;
}

#[derive(Default)]
pub struct MemorySecretStore {
    secrets: RwLock<HashMap<CredentialPath, BTreeMap<String, String>>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get(&self, path: &CredentialPath) -> Result<BTreeMap<String, String>> {
        self.secrets
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("secret {path}")))
    }

    async fn put(&self, path: &CredentialPath, attrs: BTreeMap<String, String>) -> Result<()> {
        self.secrets.write().await.insert(path.clone(), attrs);
        Ok(())
    }

    async fn delete(&self, path: &CredentialPath) -> Result<()> {
        self.secrets.write().await.remove(path);
        Ok(())
    }
}
