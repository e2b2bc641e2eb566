//! Catalog of fleet records for the Armada control plane.
//!
//! # Purpose
//! Durable records for backend controllers, the models they host, the cloud
//! credentials backing those models, cloud regions, cross-model application
//! offers and audit entries, behind the [`Catalog`] trait. The in-memory
//! backend in [`store::memory`] is the reference implementation.
//!
//! # Consistency
//! The store serializes writes within a single record table; nothing is
//! atomic across tables. Multi-record maintenance (controller removal,
//! credential fan-out) is expressed as compensating actions by the callers.

pub mod error;
pub mod path;
pub mod record;
pub mod store;

pub use error::{Error, Result};
pub use path::{CredentialPath, EntityPath};
pub use record::{
    parse_offer_url, Acl, Application, ApplicationInfo, ApplicationOffer, AuditEntry, AuditFilter,
    CloudRegion, Controller, ControllerStats, Credential, Life, LocationsFilter, Machine,
    MachineInfo, Model, OfferAccess, OfferEndpoint, OfferFilter, OfferUserDetails, EVERYONE,
};
pub use store::memory::MemoryCatalog;
pub use store::Catalog;
