//! In-memory implementation of the catalog store.
//!
//! # Purpose
//! Implements [`Catalog`] with `HashMap`s guarded by `tokio::sync::RwLock`.
//! It backs tests and single-process deployments where durability is not
//! required.
//!
//! # Consistency
//! Each table has its own lock; a write lock makes every mutation atomic at
//! the document grain, which is exactly the guarantee the offer-access and
//! lease protocols are designed against. The two phases of
//! `set_application_offer_access` deliberately take the write lock twice so
//! the protocol's interleaving argument, not the lock, is what makes
//! concurrent grants converge.
//!
//! # Unique indexes
//! Controllers are unique on path and UUID; models on UUID and path; offers
//! on UUID, URL and `(owner, model, offer)`. Violations report
//! `AlreadyExists`, matching a document store's duplicate-key error.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::path::{CredentialPath, EntityPath};
use crate::record::{
    Application, ApplicationOffer, AuditEntry, AuditFilter, CloudRegion, Controller,
    ControllerStats, Credential, Life, LocationsFilter, Machine, Model, OfferAccess, OfferFilter,
    OfferUserDetails,
};
use crate::store::Catalog;

#[derive(Default)]
pub struct MemoryCatalog {
    controllers: RwLock<HashMap<EntityPath, Controller>>,
    /// Models keyed by UUID; `model_paths` is the unique path index.
    models: RwLock<HashMap<String, Model>>,
    model_paths: RwLock<HashMap<EntityPath, String>>,
    /// Machines and applications keyed by composite doc id; a BTreeMap keeps
    /// per-model listings sorted by id.
    machines: RwLock<BTreeMap<String, Machine>>,
    applications: RwLock<BTreeMap<String, Application>>,
    credentials: RwLock<HashMap<CredentialPath, Credential>>,
    cloud_regions: RwLock<BTreeMap<String, CloudRegion>>,
    offers: RwLock<HashMap<String, ApplicationOffer>>,
    audit: RwLock<Vec<AuditEntry>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn insert_controller(&self, ctl: Controller) -> Result<()> {
        let mut controllers = self.controllers.write().await;
        if controllers.contains_key(&ctl.path) {
            return Err(Error::already_exists(format!("controller {}", ctl.path)));
        }
        if controllers.values().any(|c| c.uuid == ctl.uuid) {
            return Err(Error::already_exists(format!(
                "controller with uuid {}",
                ctl.uuid
            )));
        }
        controllers.insert(ctl.path.clone(), ctl);
        Ok(())
    }

    async fn controller(&self, path: &EntityPath) -> Result<Controller> {
        self.controllers
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("controller {path}")))
    }

    async fn controllers(&self) -> Result<Vec<Controller>> {
        let mut all: Vec<_> = self.controllers.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(all)
    }

    async fn remove_controller(&self, path: &EntityPath) -> Result<()> {
        self.controllers
            .write()
            .await
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("controller {path}")))
    }

    async fn set_controller_deprecated(&self, path: &EntityPath, deprecated: bool) -> Result<()> {
        let mut controllers = self.controllers.write().await;
        let ctl = controllers
            .get_mut(path)
            .ok_or_else(|| Error::not_found(format!("controller {path}")))?;
        ctl.deprecated = deprecated;
        Ok(())
    }

    async fn set_controller_unavailable_at(
        &self,
        path: &EntityPath,
        when: DateTime<Utc>,
    ) -> Result<()> {
        let mut controllers = self.controllers.write().await;
        // Keep the earliest failure time; later failures are the same outage.
        if let Some(ctl) = controllers.get_mut(path)
            && ctl.unavailable_since.is_none()
        {
            ctl.unavailable_since = Some(when);
        }
        Ok(())
    }

    async fn set_controller_available(&self, path: &EntityPath) -> Result<()> {
        let mut controllers = self.controllers.write().await;
        if let Some(ctl) = controllers.get_mut(path) {
            ctl.unavailable_since = None;
        }
        Ok(())
    }

    async fn set_controller_stats(&self, path: &EntityPath, stats: ControllerStats) -> Result<()> {
        let mut controllers = self.controllers.write().await;
        let ctl = controllers
            .get_mut(path)
            .ok_or_else(|| Error::not_found(format!("controller {path}")))?;
        ctl.stats = stats;
        Ok(())
    }

    async fn acquire_monitor_lease(
        &self,
        path: &EntityPath,
        old_expiry: Option<DateTime<Utc>>,
        old_owner: &str,
        new_expiry: DateTime<Utc>,
        new_owner: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        let mut controllers = self.controllers.write().await;
        let ctl = controllers
            .get_mut(path)
            .ok_or_else(|| Error::not_found(format!("controller {path}")))?;
        let expiry_matches = match (ctl.monitor_lease_expiry, old_expiry) {
            (None, None) => true,
            (Some(a), Some(b)) => a.with_timezone(&Utc) == b.with_timezone(&Utc),
            _ => false,
        };
        if ctl.monitor_lease_owner != old_owner || !expiry_matches {
            return Err(Error::LeaseUnavailable);
        }
        ctl.monitor_lease_owner = new_owner.to_string();
        ctl.monitor_lease_expiry = if new_owner.is_empty() {
            None
        } else {
            Some(new_expiry)
        };
        Ok(ctl.monitor_lease_expiry)
    }

    async fn set_credential_updates(
        &self,
        ctls: &[EntityPath],
        cred: &CredentialPath,
    ) -> Result<()> {
        let mut controllers = self.controllers.write().await;
        for path in ctls {
            if let Some(ctl) = controllers.get_mut(path)
                && !ctl.update_credentials.contains(cred)
            {
                ctl.update_credentials.push(cred.clone());
            }
        }
        Ok(())
    }

    async fn clear_credential_update(
        &self,
        ctl: &EntityPath,
        cred: &CredentialPath,
    ) -> Result<()> {
        let mut controllers = self.controllers.write().await;
        let record = controllers
            .get_mut(ctl)
            .ok_or_else(|| Error::not_found(format!("controller {ctl}")))?;
        record.update_credentials.retain(|c| c != cred);
        Ok(())
    }

    async fn insert_model(&self, model: Model) -> Result<()> {
        let mut models = self.models.write().await;
        let mut paths = self.model_paths.write().await;
        if models.contains_key(&model.uuid) {
            return Err(Error::already_exists(format!("model {}", model.uuid)));
        }
        if paths.contains_key(&model.path) {
            return Err(Error::already_exists(format!("model {}", model.path)));
        }
        paths.insert(model.path.clone(), model.uuid.clone());
        models.insert(model.uuid.clone(), model);
        Ok(())
    }

    async fn model(&self, path: &EntityPath) -> Result<Model> {
        let uuid = self
            .model_paths
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("model {path}")))?;
        self.model_by_uuid(&uuid).await
    }

    async fn model_by_uuid(&self, uuid: &str) -> Result<Model> {
        self.models
            .read()
            .await
            .get(uuid)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("model {uuid}")))
    }

    async fn models(&self) -> Result<Vec<Model>> {
        let mut all: Vec<_> = self.models.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(all)
    }

    async fn remove_model(&self, uuid: &str) -> Result<()> {
        let mut models = self.models.write().await;
        let model = models
            .remove(uuid)
            .ok_or_else(|| Error::not_found(format!("model {uuid}")))?;
        self.model_paths.write().await.remove(&model.path);
        Ok(())
    }

    async fn set_model_controller(&self, path: &EntityPath, ctl: &EntityPath) -> Result<()> {
        let uuid = self
            .model_paths
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("model {path}")))?;
        let mut models = self.models.write().await;
        if let Some(model) = models.get_mut(&uuid) {
            model.controller = ctl.clone();
        }
        Ok(())
    }

    async fn set_model_life(&self, ctl: &EntityPath, uuid: &str, life: Life) -> Result<()> {
        let mut models = self.models.write().await;
        for model in models.values_mut() {
            if model.controller == *ctl && model.uuid == uuid {
                model.life = life;
            }
        }
        Ok(())
    }

    async fn set_model_unit_count(&self, ctl: &EntityPath, uuid: &str, count: u64) -> Result<()> {
        let mut models = self.models.write().await;
        for model in models.values_mut() {
            if model.controller == *ctl && model.uuid == uuid {
                model.unit_count = count;
            }
        }
        Ok(())
    }

    async fn set_model_status(&self, ctl: &EntityPath, uuid: &str, status: &str) -> Result<()> {
        let mut models = self.models.write().await;
        for model in models.values_mut() {
            if model.controller == *ctl && model.uuid == uuid {
                model.status = status.to_string();
            }
        }
        Ok(())
    }

    async fn controllers_with_credential(
        &self,
        cred: &CredentialPath,
    ) -> Result<Vec<EntityPath>> {
        let models = self.models.read().await;
        let mut ctls: Vec<EntityPath> = models
            .values()
            .filter(|m| m.credential == *cred)
            .map(|m| m.controller.clone())
            .collect();
        ctls.sort();
        ctls.dedup();
        Ok(ctls)
    }

    async fn update_machine_info(&self, machine: Machine) -> Result<()> {
        let id = machine.doc_id();
        let mut machines = self.machines.write().await;
        if machine.info.life.is_dead() {
            // Tombstone: removing an already-absent machine is not an error.
            machines.remove(&id);
        } else {
            machines.insert(id, machine);
        }
        Ok(())
    }

    async fn machines_for_model(&self, model_uuid: &str) -> Result<Vec<Machine>> {
        Ok(self
            .machines
            .read()
            .await
            .values()
            .filter(|m| m.info.model_uuid == model_uuid)
            .cloned()
            .collect())
    }

    async fn remove_controller_machines(&self, ctl: &EntityPath) -> Result<()> {
        self.machines
            .write()
            .await
            .retain(|_, m| m.controller != *ctl);
        Ok(())
    }

    async fn update_application_info(&self, app: Application) -> Result<()> {
        let id = app.doc_id();
        let mut applications = self.applications.write().await;
        if app.info.life.is_dead() {
            applications.remove(&id);
        } else {
            applications.insert(id, app);
        }
        Ok(())
    }

    async fn applications_for_model(&self, model_uuid: &str) -> Result<Vec<Application>> {
        Ok(self
            .applications
            .read()
            .await
            .values()
            .filter(|a| a.info.model_uuid == model_uuid)
            .cloned()
            .collect())
    }

    async fn remove_controller_applications(&self, ctl: &EntityPath) -> Result<()> {
        self.applications
            .write()
            .await
            .retain(|_, a| a.controller != *ctl);
        Ok(())
    }

    async fn update_credential(&self, cred: Credential) -> Result<()> {
        let mut credentials = self.credentials.write().await;
        match credentials.get_mut(&cred.path) {
            Some(existing) => {
                // Controller membership is store-maintained; an update never
                // resets it.
                let controllers = std::mem::take(&mut existing.controllers);
                let acl = if cred.acl.read.is_empty() {
                    existing.acl.clone()
                } else {
                    cred.acl.clone()
                };
                *existing = Credential {
                    controllers,
                    acl,
                    ..cred
                };
            }
            None => {
                credentials.insert(cred.path.clone(), cred);
            }
        }
        Ok(())
    }

    async fn credential(&self, path: &CredentialPath) -> Result<Credential> {
        self.credentials
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("credential {path}")))
    }

    async fn credentials_for_cloud(&self, user: &str, cloud: &str) -> Result<Vec<Credential>> {
        let mut creds: Vec<_> = self
            .credentials
            .read()
            .await
            .values()
            .filter(|c| c.path.user == user && c.path.cloud == cloud)
            .cloned()
            .collect();
        creds.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(creds)
    }

    async fn grant_credential_read(&self, path: &CredentialPath, user: &str) -> Result<()> {
        let mut credentials = self.credentials.write().await;
        let cred = credentials
            .get_mut(path)
            .ok_or_else(|| Error::not_found(format!("credential {path}")))?;
        if !cred.acl.read.iter().any(|u| u == user) {
            cred.acl.read.push(user.to_string());
        }
        Ok(())
    }

    async fn revoke_credential_read(&self, path: &CredentialPath, user: &str) -> Result<()> {
        let mut credentials = self.credentials.write().await;
        let cred = credentials
            .get_mut(path)
            .ok_or_else(|| Error::not_found(format!("credential {path}")))?;
        cred.acl.read.retain(|u| u != user);
        Ok(())
    }

    async fn credential_add_controller(
        &self,
        path: &CredentialPath,
        ctl: &EntityPath,
    ) -> Result<()> {
        let mut credentials = self.credentials.write().await;
        let cred = credentials
            .get_mut(path)
            .ok_or_else(|| Error::not_found(format!("credential {path}")))?;
        if !cred.controllers.contains(ctl) {
            cred.controllers.push(ctl.clone());
        }
        Ok(())
    }

    async fn credential_remove_controller(
        &self,
        path: &CredentialPath,
        ctl: &EntityPath,
    ) -> Result<()> {
        let mut credentials = self.credentials.write().await;
        let cred = credentials
            .get_mut(path)
            .ok_or_else(|| Error::not_found(format!("credential {path}")))?;
        cred.controllers.retain(|c| c != ctl);
        Ok(())
    }

    async fn credentials_remove_controller(&self, ctl: &EntityPath) -> Result<()> {
        let mut credentials = self.credentials.write().await;
        for cred in credentials.values_mut() {
            cred.controllers.retain(|c| c != ctl);
        }
        Ok(())
    }

    async fn insert_cloud_region(&self, region: CloudRegion) -> Result<()> {
        let mut regions = self.cloud_regions.write().await;
        let id = region.doc_id();
        if regions.contains_key(&id) {
            return Err(Error::already_exists(format!("cloud region {id}")));
        }
        regions.insert(id, region);
        Ok(())
    }

    async fn upsert_cloud_regions(&self, new_regions: Vec<CloudRegion>) -> Result<()> {
        let mut regions = self.cloud_regions.write().await;
        for mut incoming in new_regions {
            let id = incoming.doc_id();
            match regions.get_mut(&id) {
                Some(existing) => {
                    existing.provider_type = std::mem::take(&mut incoming.provider_type);
                    existing.auth_types = std::mem::take(&mut incoming.auth_types);
                    existing.endpoint = std::mem::take(&mut incoming.endpoint);
                    existing.identity_endpoint = std::mem::take(&mut incoming.identity_endpoint);
                    existing.storage_endpoint = std::mem::take(&mut incoming.storage_endpoint);
                    existing.ca_certificates = std::mem::take(&mut incoming.ca_certificates);
                    for ctl in incoming.primary_controllers {
                        if !existing.primary_controllers.contains(&ctl) {
                            existing.primary_controllers.push(ctl);
                        }
                    }
                    for ctl in incoming.secondary_controllers {
                        if !existing.secondary_controllers.contains(&ctl) {
                            existing.secondary_controllers.push(ctl);
                        }
                    }
                }
                None => {
                    regions.insert(id, incoming);
                }
            }
        }
        Ok(())
    }

    async fn cloud_region(&self, cloud: &str, region: &str) -> Result<CloudRegion> {
        self.cloud_regions
            .read()
            .await
            .get(&format!("{cloud}/{region}"))
            .cloned()
            .ok_or_else(|| Error::not_found(format!("cloud region {cloud}/{region}")))
    }

    async fn cloud_region_by_provider(
        &self,
        provider_type: &str,
        region: &str,
    ) -> Result<CloudRegion> {
        self.cloud_regions
            .read()
            .await
            .values()
            .find(|cr| cr.provider_type == provider_type && cr.region == region)
            .cloned()
            .ok_or_else(|| {
                Error::not_found(format!("cloud region {provider_type}/{region}"))
            })
    }

    async fn cloud_regions(&self) -> Result<Vec<CloudRegion>> {
        Ok(self.cloud_regions.read().await.values().cloned().collect())
    }

    async fn provider_type(&self, cloud: &str) -> Result<String> {
        // The zero-region record carries the cloud-wide fields.
        Ok(self.cloud_region(cloud, "").await?.provider_type)
    }

    async fn remove_cloud(&self, cloud: &str) -> Result<()> {
        self.cloud_regions
            .write()
            .await
            .retain(|_, cr| cr.cloud != cloud);
        Ok(())
    }

    async fn remove_controller_from_cloud_regions(&self, ctl: &EntityPath) -> Result<()> {
        let mut regions = self.cloud_regions.write().await;
        for cr in regions.values_mut() {
            cr.primary_controllers.retain(|c| c != ctl);
            cr.secondary_controllers.retain(|c| c != ctl);
        }
        Ok(())
    }

    async fn locations(&self, filter: &LocationsFilter) -> Result<Vec<(String, String)>> {
        let regions = self.cloud_regions.read().await;
        let mut rows: Vec<(String, String)> = regions
            .values()
            .filter(|cr| !cr.region.is_empty())
            .filter(|cr| {
                !cr.primary_controllers.is_empty() || !cr.secondary_controllers.is_empty()
            })
            .filter(|cr| filter.cloud.as_deref().is_none_or(|c| cr.cloud == c))
            .filter(|cr| filter.region.as_deref().is_none_or(|r| cr.region == r))
            .map(|cr| (cr.cloud.clone(), cr.region.clone()))
            .collect();
        rows.dedup();
        Ok(rows)
    }

    async fn insert_application_offer(&self, offer: ApplicationOffer) -> Result<()> {
        let mut offers = self.offers.write().await;
        if offers.contains_key(&offer.uuid) {
            return Err(Error::already_exists(format!("offer {}", offer.uuid)));
        }
        let dup = offers.values().any(|o| {
            o.url == offer.url
                || (o.owner_name == offer.owner_name
                    && o.model_name == offer.model_name
                    && o.offer_name == offer.offer_name)
        });
        if dup {
            return Err(Error::already_exists(format!("offer {}", offer.url)));
        }
        offers.insert(offer.uuid.clone(), offer);
        Ok(())
    }

    async fn application_offer(&self, uuid: &str) -> Result<ApplicationOffer> {
        self.offers
            .read()
            .await
            .get(uuid)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("offer {uuid}")))
    }

    async fn application_offer_by_url(&self, url: &str) -> Result<ApplicationOffer> {
        self.offers
            .read()
            .await
            .values()
            .find(|o| o.url == url)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("offer {url}")))
    }

    async fn update_application_offer(&self, offer: &ApplicationOffer) -> Result<()> {
        let mut offers = self.offers.write().await;
        let existing = offers
            .get_mut(&offer.uuid)
            .ok_or_else(|| Error::not_found(format!("offer {}", offer.uuid)))?;
        *existing = offer.clone();
        Ok(())
    }

    async fn remove_application_offer(&self, uuid: &str) -> Result<()> {
        self.offers
            .write()
            .await
            .remove(uuid)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("offer {uuid}")))
    }

    async fn set_application_offer_access(
        &self,
        user: &str,
        offer_uuid: &str,
        access: OfferAccess,
    ) -> Result<()> {
        // Phase A: push the exact (user, access) entry unless it is already
        // present. Duplicate entries for the same pair never accumulate.
        {
            let mut offers = self.offers.write().await;
            let offer = offers
                .get_mut(offer_uuid)
                .ok_or_else(|| Error::not_found(format!("offer {offer_uuid}")))?;
            let entry = OfferUserDetails {
                user: user.to_string(),
                access,
            };
            if !offer.users.contains(&entry) {
                offer.users.push(entry);
            }
        }
        // Phase B: prune the user's other access levels, but only while the
        // entry from phase A is still present. If a racing writer pruned it,
        // that writer's grant wins and this prune must not run, otherwise
        // the two writers could delete each other's entries.
        {
            let mut offers = self.offers.write().await;
            let offer = offers
                .get_mut(offer_uuid)
                .ok_or_else(|| Error::not_found(format!("offer {offer_uuid}")))?;
            let still_present = offer
                .users
                .iter()
                .any(|u| u.user == user && u.access == access);
            if still_present {
                offer.users.retain(|u| u.user != user || u.access == access);
            }
        }
        Ok(())
    }

    async fn application_offer_access(
        &self,
        user: &str,
        offer_uuid: &str,
    ) -> Result<OfferAccess> {
        Ok(self
            .offers
            .read()
            .await
            .get(offer_uuid)
            .map(|o| o.access_for(user))
            .unwrap_or(OfferAccess::None))
    }

    async fn list_application_offers(
        &self,
        user: &str,
        min_access: OfferAccess,
        filters: &[OfferFilter],
    ) -> Result<Vec<ApplicationOffer>> {
        let offers = self.offers.read().await;
        let mut found: Vec<_> = offers
            .values()
            .filter(|o| o.access_for(user) >= min_access)
            .filter(|o| filters.is_empty() || filters.iter().any(|f| f.matches(o)))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.url.cmp(&b.url));
        Ok(found)
    }

    async fn append_audit(&self, entry: AuditEntry) -> Result<()> {
        self.audit.write().await.push(entry);
        Ok(())
    }

    async fn audit_events(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>> {
        let audit = self.audit.read().await;
        let mut events: Vec<_> = audit
            .iter()
            .filter(|e| filter.after.is_none_or(|t| e.time >= t))
            .filter(|e| filter.before.is_none_or(|t| e.time <= t))
            .cloned()
            .collect();
        if let Some(limit) = filter.limit {
            events.truncate(limit);
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{MachineInfo, OfferEndpoint};

    fn controller(path: &str) -> Controller {
        Controller {
            path: path.parse().expect("path"),
            uuid: format!("uuid-{path}"),
            addresses: vec!["127.0.0.1:17070".to_string()],
            ..Default::default()
        }
    }

    fn offer(uuid: &str, url: &str) -> ApplicationOffer {
        let (owner, model, name) = crate::record::parse_offer_url(url).expect("url");
        ApplicationOffer {
            uuid: uuid.to_string(),
            url: url.to_string(),
            owner_name: owner,
            model_name: model,
            offer_name: name,
            application_name: "app".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn controller_insert_is_unique_on_path_and_uuid() {
        let store = MemoryCatalog::new();
        store.insert_controller(controller("bob/c1")).await.unwrap();
        let err = store
            .insert_controller(controller("bob/c1"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
        let mut dup_uuid = controller("bob/c2");
        dup_uuid.uuid = "uuid-bob/c1".to_string();
        let err = store.insert_controller(dup_uuid).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn unavailable_since_keeps_first_failure() {
        let store = MemoryCatalog::new();
        let path: EntityPath = "bob/c1".parse().unwrap();
        store.insert_controller(controller("bob/c1")).await.unwrap();
        let first = Utc::now();
        store
            .set_controller_unavailable_at(&path, first)
            .await
            .unwrap();
        store
            .set_controller_unavailable_at(&path, first + chrono::Duration::hours(1))
            .await
            .unwrap();
        let ctl = store.controller(&path).await.unwrap();
        assert_eq!(ctl.unavailable_since, Some(first));
        store.set_controller_available(&path).await.unwrap();
        let ctl = store.controller(&path).await.unwrap();
        assert_eq!(ctl.unavailable_since, None);
    }

    #[tokio::test]
    async fn monitor_lease_is_a_cas() {
        let store = MemoryCatalog::new();
        let path: EntityPath = "bob/c1".parse().unwrap();
        store.insert_controller(controller("bob/c1")).await.unwrap();

        let expiry = Utc::now() + chrono::Duration::minutes(1);
        let got = store
            .acquire_monitor_lease(&path, None, "", expiry, "worker-1")
            .await
            .unwrap();
        assert_eq!(got, Some(expiry));

        // A second worker with stale preconditions loses.
        let err = store
            .acquire_monitor_lease(&path, None, "", expiry, "worker-2")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LeaseUnavailable));

        // The holder renews with matching preconditions.
        let renewed = expiry + chrono::Duration::minutes(1);
        let got = store
            .acquire_monitor_lease(&path, Some(expiry), "worker-1", renewed, "worker-1")
            .await
            .unwrap();
        assert_eq!(got, Some(renewed));

        // Release clears both fields.
        let got = store
            .acquire_monitor_lease(&path, Some(renewed), "worker-1", renewed, "")
            .await
            .unwrap();
        assert_eq!(got, None);
        let ctl = store.controller(&path).await.unwrap();
        assert_eq!(ctl.monitor_lease_owner, "");
        assert_eq!(ctl.monitor_lease_expiry, None);
    }

    #[tokio::test]
    async fn dead_machines_are_tombstoned() {
        let store = MemoryCatalog::new();
        let machine = Machine {
            controller: "bob/c1".parse().unwrap(),
            info: MachineInfo {
                model_uuid: "m-uuid".to_string(),
                id: "0".to_string(),
                life: Life::Alive,
                ..Default::default()
            },
            ..Default::default()
        };
        store.update_machine_info(machine.clone()).await.unwrap();
        assert_eq!(store.machines_for_model("m-uuid").await.unwrap().len(), 1);

        let mut dead = machine;
        dead.info.life = Life::Dead;
        store.update_machine_info(dead.clone()).await.unwrap();
        assert!(store.machines_for_model("m-uuid").await.unwrap().is_empty());
        // Removing again is fine.
        store.update_machine_info(dead).await.unwrap();
    }

    #[tokio::test]
    async fn machines_for_model_sorted_by_id() {
        let store = MemoryCatalog::new();
        for id in ["2", "0", "1"] {
            store
                .update_machine_info(Machine {
                    controller: "bob/c1".parse().unwrap(),
                    info: MachineInfo {
                        model_uuid: "m-uuid".to_string(),
                        id: id.to_string(),
                        ..Default::default()
                    },
                    ..Default::default()
                })
                .await
                .unwrap();
        }
        let ids: Vec<_> = store
            .machines_for_model("m-uuid")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.info.id)
            .collect();
        assert_eq!(ids, ["0", "1", "2"]);
    }

    #[tokio::test]
    async fn credential_round_trips_and_keeps_controllers() {
        let store = MemoryCatalog::new();
        let path: CredentialPath = "alice/aws/default".parse().unwrap();
        let cred = Credential {
            path: path.clone(),
            kind: "userpass".to_string(),
            attributes: [("username".to_string(), "alice".to_string())].into(),
            ..Default::default()
        };
        store.update_credential(cred.clone()).await.unwrap();
        assert_eq!(store.credential(&path).await.unwrap(), cred);

        let ctl: EntityPath = "bob/c1".parse().unwrap();
        store.credential_add_controller(&path, &ctl).await.unwrap();
        store.credential_add_controller(&path, &ctl).await.unwrap();

        // A later update must not clobber the controller set.
        let mut updated = cred.clone();
        updated.revoked = true;
        store.update_credential(updated).await.unwrap();
        let got = store.credential(&path).await.unwrap();
        assert!(got.revoked);
        assert_eq!(got.controllers, vec![ctl.clone()]);

        store.credentials_remove_controller(&ctl).await.unwrap();
        assert!(store.credential(&path).await.unwrap().controllers.is_empty());
    }

    #[tokio::test]
    async fn credential_sync_targets_referencing_controllers() {
        let store = MemoryCatalog::new();
        let cred: CredentialPath = "alice/aws/default".parse().unwrap();
        for (ctl, uuid) in [("bob/c1", "u1"), ("bob/c2", "u2"), ("bob/c3", "u3")] {
            store.insert_controller(controller(ctl)).await.unwrap();
            let model = Model {
                path: format!("alice/m-{uuid}").parse().unwrap(),
                uuid: uuid.to_string(),
                controller: ctl.parse().unwrap(),
                credential: if ctl == "bob/c3" {
                    "alice/aws/other".parse().unwrap()
                } else {
                    cred.clone()
                },
                cloud: "aws".to_string(),
                ..Default::default()
            };
            store.insert_model(model).await.unwrap();
        }
        let ctls = store.controllers_with_credential(&cred).await.unwrap();
        assert_eq!(
            ctls,
            vec![
                "bob/c1".parse::<EntityPath>().unwrap(),
                "bob/c2".parse().unwrap()
            ]
        );

        store.set_credential_updates(&ctls, &cred).await.unwrap();
        let ctl = store.controller(&ctls[0]).await.unwrap();
        assert_eq!(ctl.update_credentials, vec![cred.clone()]);
        store.clear_credential_update(&ctls[0], &cred).await.unwrap();
        let ctl = store.controller(&ctls[0]).await.unwrap();
        assert!(ctl.update_credentials.is_empty());
    }

    #[tokio::test]
    async fn offer_unique_indexes() {
        let store = MemoryCatalog::new();
        store
            .insert_application_offer(offer("o-1", "bob/prod.db"))
            .await
            .unwrap();
        let err = store
            .insert_application_offer(offer("o-2", "bob/prod.db"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn offer_access_converges_to_single_entry() {
        let store = MemoryCatalog::new();
        store
            .insert_application_offer(offer("o-1", "bob/prod.db"))
            .await
            .unwrap();
        store
            .set_application_offer_access("alice", "o-1", OfferAccess::Read)
            .await
            .unwrap();
        store
            .set_application_offer_access("alice", "o-1", OfferAccess::Admin)
            .await
            .unwrap();
        store
            .set_application_offer_access("alice", "o-1", OfferAccess::Consume)
            .await
            .unwrap();
        let got = store.application_offer("o-1").await.unwrap();
        let entries: Vec<_> = got.users.iter().filter(|u| u.user == "alice").collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].access, OfferAccess::Consume);
    }

    #[tokio::test]
    async fn concurrent_offer_grants_leave_one_entry() {
        use std::sync::Arc;
        let store = Arc::new(MemoryCatalog::new());
        store
            .insert_application_offer(offer("o-1", "bob/prod.db"))
            .await
            .unwrap();
        let mut tasks = Vec::new();
        for access in [
            OfferAccess::Read,
            OfferAccess::Consume,
            OfferAccess::Admin,
            OfferAccess::Read,
            OfferAccess::Consume,
        ] {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                store
                    .set_application_offer_access("alice", "o-1", access)
                    .await
            }));
        }
        for task in tasks {
            task.await.expect("join").expect("grant");
        }
        let got = store.application_offer("o-1").await.unwrap();
        let entries: Vec<_> = got.users.iter().filter(|u| u.user == "alice").collect();
        assert_eq!(entries.len(), 1, "entries: {:?}", got.users);
    }

    #[tokio::test]
    async fn list_offers_respects_min_access_and_filters() {
        let store = MemoryCatalog::new();
        let mut o = offer("o-1", "bob/prod.db");
        o.endpoints = vec![OfferEndpoint {
            name: "db".to_string(),
            interface: "pgsql".to_string(),
            role: "provider".to_string(),
        }];
        store.insert_application_offer(o).await.unwrap();
        store
            .insert_application_offer(offer("o-2", "bob/staging.cache"))
            .await
            .unwrap();
        store
            .set_application_offer_access("alice", "o-1", OfferAccess::Consume)
            .await
            .unwrap();

        let visible = store
            .list_application_offers("alice", OfferAccess::Read, &[])
            .await
            .unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].uuid, "o-1");

        // No relation at all: nothing is visible.
        let visible = store
            .list_application_offers("mallory", OfferAccess::Read, &[])
            .await
            .unwrap();
        assert!(visible.is_empty());

        // everyone:read makes the offer visible to any principal.
        store
            .set_application_offer_access(crate::record::EVERYONE, "o-2", OfferAccess::Read)
            .await
            .unwrap();
        let visible = store
            .list_application_offers("mallory", OfferAccess::Read, &[])
            .await
            .unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].uuid, "o-2");

        let filtered = store
            .list_application_offers(
                "alice",
                OfferAccess::Read,
                &[OfferFilter {
                    offer_name: "db".to_string(),
                    ..Default::default()
                }],
            )
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
    }

    #[tokio::test]
    async fn controller_removal_compensations() {
        let store = MemoryCatalog::new();
        let ctl: EntityPath = "bob/c1".parse().unwrap();
        store.insert_controller(controller("bob/c1")).await.unwrap();
        let cred: CredentialPath = "alice/aws/default".parse().unwrap();
        store
            .update_credential(Credential {
                path: cred.clone(),
                kind: "userpass".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        store.credential_add_controller(&cred, &ctl).await.unwrap();
        store
            .upsert_cloud_regions(vec![CloudRegion {
                cloud: "aws".to_string(),
                region: "eu-west-1".to_string(),
                primary_controllers: vec![ctl.clone()],
                ..Default::default()
            }])
            .await
            .unwrap();
        store
            .update_machine_info(Machine {
                controller: ctl.clone(),
                info: MachineInfo {
                    model_uuid: "u1".to_string(),
                    id: "0".to_string(),
                    ..Default::default()
                },
                ..Default::default()
            })
            .await
            .unwrap();

        store.remove_controller(&ctl).await.unwrap();
        store.remove_controller_machines(&ctl).await.unwrap();
        store.remove_controller_applications(&ctl).await.unwrap();
        store.credentials_remove_controller(&ctl).await.unwrap();
        store
            .remove_controller_from_cloud_regions(&ctl)
            .await
            .unwrap();

        assert!(store.machines_for_model("u1").await.unwrap().is_empty());
        assert!(store.credential(&cred).await.unwrap().controllers.is_empty());
        let cr = store.cloud_region("aws", "eu-west-1").await.unwrap();
        assert!(cr.primary_controllers.is_empty());
        assert!(store.locations(&LocationsFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn locations_filtering() {
        let store = MemoryCatalog::new();
        store
            .upsert_cloud_regions(vec![CloudRegion {
                cloud: "dummy".to_string(),
                region: "dummy-region".to_string(),
                primary_controllers: vec!["bob/c1".parse().unwrap()],
                ..Default::default()
            }])
            .await
            .unwrap();
        let all = store.locations(&LocationsFilter::default()).await.unwrap();
        assert_eq!(all, vec![("dummy".to_string(), "dummy-region".to_string())]);
        let filtered = store
            .locations(&LocationsFilter {
                cloud: Some("dummy".to_string()),
                region: None,
            })
            .await
            .unwrap();
        assert_eq!(filtered, all);
        let none = store
            .locations(&LocationsFilter {
                cloud: Some("erewhon".to_string()),
                region: None,
            })
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn cloud_region_lookups() {
        let store = MemoryCatalog::new();
        store
            .upsert_cloud_regions(vec![
                CloudRegion {
                    cloud: "aws".to_string(),
                    region: String::new(),
                    provider_type: "ec2".to_string(),
                    ..Default::default()
                },
                CloudRegion {
                    cloud: "aws".to_string(),
                    region: "eu-west-1".to_string(),
                    provider_type: "ec2".to_string(),
                    ..Default::default()
                },
            ])
            .await
            .unwrap();

        assert_eq!(store.provider_type("aws").await.unwrap(), "ec2");
        assert!(store.provider_type("erewhon").await.is_err());

        let by_provider = store
            .cloud_region_by_provider("ec2", "eu-west-1")
            .await
            .unwrap();
        assert_eq!(by_provider.cloud, "aws");

        store.remove_cloud("aws").await.unwrap();
        assert!(store.cloud_regions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn credentials_are_indexed_by_user_and_cloud() {
        let store = MemoryCatalog::new();
        for path in ["alice/aws/a", "alice/aws/b", "alice/gce/c", "bob/aws/d"] {
            store
                .update_credential(Credential {
                    path: path.parse().unwrap(),
                    kind: "userpass".to_string(),
                    ..Default::default()
                })
                .await
                .unwrap();
        }
        let creds = store.credentials_for_cloud("alice", "aws").await.unwrap();
        let names: Vec<_> = creds.iter().map(|c| c.path.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[tokio::test]
    async fn offers_update_in_place() {
        let store = MemoryCatalog::new();
        store
            .insert_application_offer(offer("o-1", "bob/prod.db"))
            .await
            .unwrap();
        let mut updated = store.application_offer("o-1").await.unwrap();
        updated.application_description = "a database".to_string();
        store.update_application_offer(&updated).await.unwrap();
        assert_eq!(
            store
                .application_offer_by_url("bob/prod.db")
                .await
                .unwrap()
                .application_description,
            "a database"
        );

        let mut missing = offer("o-404", "bob/other.db");
        missing.application_description = "nope".to_string();
        assert!(store.update_application_offer(&missing).await.is_err());
    }

    #[tokio::test]
    async fn model_tombstones_and_migration() {
        let store = MemoryCatalog::new();
        let ctl: EntityPath = "bob/c1".parse().unwrap();
        let model = Model {
            path: "alice/prod".parse().unwrap(),
            uuid: "u1".to_string(),
            controller: ctl.clone(),
            credential: "alice/aws/default".parse().unwrap(),
            cloud: "aws".to_string(),
            ..Default::default()
        };
        store.insert_model(model.clone()).await.unwrap();
        assert_eq!(store.models().await.unwrap().len(), 1);
        let err = store.insert_model(model).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));

        store.set_model_life(&ctl, "u1", Life::Dead).await.unwrap();
        // Dead model stays queryable as a tombstone.
        assert_eq!(store.model_by_uuid("u1").await.unwrap().life, Life::Dead);

        let new_ctl: EntityPath = "bob/c2".parse().unwrap();
        store
            .set_model_controller(&"alice/prod".parse().unwrap(), &new_ctl)
            .await
            .unwrap();
        assert_eq!(store.model_by_uuid("u1").await.unwrap().controller, new_ctl);

        store.remove_model("u1").await.unwrap();
        assert!(matches!(
            store.model_by_uuid("u1").await.unwrap_err(),
            Error::NotFound(_)
        ));
    }
}
