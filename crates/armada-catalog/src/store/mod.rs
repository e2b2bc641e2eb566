//! The catalog store trait.
//!
//! # Purpose
//! One async trait covering every record table. Implementations must
//! serialize writes within a single record; nothing is atomic across
//! records. Controller removal therefore does not cascade here: callers run
//! the compensating actions (`remove_controller_machines`,
//! `remove_controller_applications`, `credentials_remove_controller`,
//! `remove_controller_from_cloud_regions`) after removing the record.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::path::{CredentialPath, EntityPath};
use crate::record::{
    Application, ApplicationOffer, AuditEntry, AuditFilter, CloudRegion, Controller,
    ControllerStats, Credential, Life, LocationsFilter, Machine, Model, OfferAccess, OfferFilter,
};

pub mod memory;

#[async_trait]
pub trait Catalog: Send + Sync {
    // Controllers. Unique on path and on UUID.

    async fn insert_controller(&self, ctl: Controller) -> Result<()>;
    async fn controller(&self, path: &EntityPath) -> Result<Controller>;
    async fn controllers(&self) -> Result<Vec<Controller>>;
    async fn remove_controller(&self, path: &EntityPath) -> Result<()>;
    async fn set_controller_deprecated(&self, path: &EntityPath, deprecated: bool) -> Result<()>;
    /// Record the first time the controller was seen unavailable. A no-op if
    /// an earlier failure is already recorded.
    async fn set_controller_unavailable_at(
        &self,
        path: &EntityPath,
        when: DateTime<Utc>,
    ) -> Result<()>;
    async fn set_controller_available(&self, path: &EntityPath) -> Result<()>;
    async fn set_controller_stats(&self, path: &EntityPath, stats: ControllerStats) -> Result<()>;
    /// Compare-and-set on the controller's monitor lease. Succeeds only when
    /// `(old_owner, old_expiry)` match the stored lease exactly; an empty
    /// `new_owner` releases the lease. Returns the new expiry.
    async fn acquire_monitor_lease(
        &self,
        path: &EntityPath,
        old_expiry: Option<DateTime<Utc>>,
        old_owner: &str,
        new_expiry: DateTime<Utc>,
        new_owner: &str,
    ) -> Result<Option<DateTime<Utc>>>;
    /// Mark every listed controller as needing the given credential pushed.
    async fn set_credential_updates(
        &self,
        ctls: &[EntityPath],
        cred: &CredentialPath,
    ) -> Result<()>;
    async fn clear_credential_update(
        &self,
        ctl: &EntityPath,
        cred: &CredentialPath,
    ) -> Result<()>;

    // Models. UUID is the primary key; dead records are tombstones kept
    // until removed explicitly.

    async fn insert_model(&self, model: Model) -> Result<()>;
    async fn model(&self, path: &EntityPath) -> Result<Model>;
    async fn model_by_uuid(&self, uuid: &str) -> Result<Model>;
    async fn models(&self) -> Result<Vec<Model>>;
    async fn remove_model(&self, uuid: &str) -> Result<()>;
    /// Re-point a migrated model at its new controller. The caller has
    /// verified the controller exists.
    async fn set_model_controller(&self, path: &EntityPath, ctl: &EntityPath) -> Result<()>;
    async fn set_model_life(&self, ctl: &EntityPath, uuid: &str, life: Life) -> Result<()>;
    async fn set_model_unit_count(&self, ctl: &EntityPath, uuid: &str, count: u64) -> Result<()>;
    async fn set_model_status(&self, ctl: &EntityPath, uuid: &str, status: &str) -> Result<()>;
    /// Controllers hosting at least one model backed by the credential.
    async fn controllers_with_credential(
        &self,
        cred: &CredentialPath,
    ) -> Result<Vec<EntityPath>>;

    // Machines and applications, keyed `<controller> <modelUUID> <id>`.
    // A dead record is removed, never stored.

    async fn update_machine_info(&self, machine: Machine) -> Result<()>;
    async fn machines_for_model(&self, model_uuid: &str) -> Result<Vec<Machine>>;
    async fn remove_controller_machines(&self, ctl: &EntityPath) -> Result<()>;
    async fn update_application_info(&self, app: Application) -> Result<()>;
    async fn applications_for_model(&self, model_uuid: &str) -> Result<Vec<Application>>;
    async fn remove_controller_applications(&self, ctl: &EntityPath) -> Result<()>;

    // Credentials.

    async fn update_credential(&self, cred: Credential) -> Result<()>;
    async fn credential(&self, path: &CredentialPath) -> Result<Credential>;
    async fn credentials_for_cloud(&self, user: &str, cloud: &str) -> Result<Vec<Credential>>;
    async fn grant_credential_read(&self, path: &CredentialPath, user: &str) -> Result<()>;
    async fn revoke_credential_read(&self, path: &CredentialPath, user: &str) -> Result<()>;
    async fn credential_add_controller(
        &self,
        path: &CredentialPath,
        ctl: &EntityPath,
    ) -> Result<()>;
    async fn credential_remove_controller(
        &self,
        path: &CredentialPath,
        ctl: &EntityPath,
    ) -> Result<()>;
    /// Compensating action for controller removal.
    async fn credentials_remove_controller(&self, ctl: &EntityPath) -> Result<()>;

    // Cloud regions. An empty region names the cloud itself.

    async fn insert_cloud_region(&self, region: CloudRegion) -> Result<()>;
    /// Merge semantics: scalar fields are overwritten, controller lists are
    /// unioned, ACL is kept from the existing record.
    async fn upsert_cloud_regions(&self, regions: Vec<CloudRegion>) -> Result<()>;
    async fn cloud_region(&self, cloud: &str, region: &str) -> Result<CloudRegion>;
    async fn cloud_region_by_provider(
        &self,
        provider_type: &str,
        region: &str,
    ) -> Result<CloudRegion>;
    async fn cloud_regions(&self) -> Result<Vec<CloudRegion>>;
    async fn provider_type(&self, cloud: &str) -> Result<String>;
    async fn remove_cloud(&self, cloud: &str) -> Result<()>;
    /// Compensating action for controller removal.
    async fn remove_controller_from_cloud_regions(&self, ctl: &EntityPath) -> Result<()>;
    /// Distinct `(cloud, region)` pairs that have at least one controller
    /// able to host models there.
    async fn locations(&self, filter: &LocationsFilter) -> Result<Vec<(String, String)>>;

    // Application offers. Unique on UUID, on URL and on
    // (owner, model, offer name).

    async fn insert_application_offer(&self, offer: ApplicationOffer) -> Result<()>;
    async fn application_offer(&self, uuid: &str) -> Result<ApplicationOffer>;
    async fn application_offer_by_url(&self, url: &str) -> Result<ApplicationOffer>;
    async fn update_application_offer(&self, offer: &ApplicationOffer) -> Result<()>;
    async fn remove_application_offer(&self, uuid: &str) -> Result<()>;
    /// Race-safe access write: after any interleaving of concurrent calls
    /// for the same user, exactly one `(user, access)` entry survives.
    async fn set_application_offer_access(
        &self,
        user: &str,
        offer_uuid: &str,
        access: OfferAccess,
    ) -> Result<()>;
    /// Highest access the user holds, folding in the `everyone` entry.
    /// Reports no access, not an error, for a missing offer.
    async fn application_offer_access(&self, user: &str, offer_uuid: &str)
        -> Result<OfferAccess>;
    /// Offers on which the user holds at least `min_access`, matching any of
    /// the filters (all offers when `filters` is empty).
    async fn list_application_offers(
        &self,
        user: &str,
        min_access: OfferAccess,
        filters: &[OfferFilter],
    ) -> Result<Vec<ApplicationOffer>>;

    // Audit log.

    async fn append_audit(&self, entry: AuditEntry) -> Result<()>;
    async fn audit_events(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>>;
}
