//! Request and response bodies for the control-plane API.
//!
//! These are wire types, deliberately separate from the catalog records:
//! secrets never leave the service and schema evolution stays an API
//! concern.

use std::collections::BTreeMap;

use armada_catalog::{
    ApplicationOffer, Controller, ControllerStats, Credential, Model, OfferAccess, OfferEndpoint,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

// Controllers

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct AddControllerRequest {
    /// Controller path, `<owner>/<name>`.
    pub path: String,
    pub uuid: String,
    pub addresses: Vec<String>,
    pub ca_cert: String,
    pub admin_user: String,
    pub admin_password: String,
    pub cloud: String,
    #[serde(default)]
    pub region: String,
    /// Provider type of the cloud, e.g. `ec2`.
    #[serde(default)]
    pub provider_type: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct ControllerStatsView {
    pub model_count: u64,
    pub machine_count: u64,
    pub application_count: u64,
    pub unit_count: u64,
}

impl From<ControllerStats> for ControllerStatsView {
    fn from(stats: ControllerStats) -> Self {
        Self {
            model_count: stats.model_count,
            machine_count: stats.machine_count,
            application_count: stats.application_count,
            unit_count: stats.unit_count,
        }
    }
}

/// Controller record without its admin credentials.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct ControllerSummary {
    pub path: String,
    pub uuid: String,
    pub addresses: Vec<String>,
    pub deprecated: bool,
    #[schema(value_type = Option<String>)]
    pub unavailable_since: Option<DateTime<Utc>>,
    pub stats: ControllerStatsView,
}

impl From<Controller> for ControllerSummary {
    fn from(ctl: Controller) -> Self {
        Self {
            path: ctl.path.to_string(),
            uuid: ctl.uuid,
            addresses: ctl.addresses,
            deprecated: ctl.deprecated,
            unavailable_since: ctl.unavailable_since,
            stats: ctl.stats.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct ControllerListResponse {
    pub controllers: Vec<ControllerSummary>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct SetDeprecatedRequest {
    pub deprecated: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Eq)]
pub struct Location {
    pub cloud: String,
    pub region: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct LocationsResponse {
    pub locations: Vec<Location>,
}

// Credentials

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct UpdateCredentialRequest {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Store the attributes in the secret store instead of the catalog.
    #[serde(default)]
    pub attributes_in_vault: bool,
    #[serde(default)]
    pub revoked: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct UpdateCredentialResponse {
    /// Controllers marked as needing the new credential value.
    pub marked_controllers: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct CredentialView {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub label: String,
    pub attributes: BTreeMap<String, String>,
    pub attributes_in_vault: bool,
    pub revoked: bool,
    pub controllers: Vec<String>,
}

impl From<Credential> for CredentialView {
    fn from(cred: Credential) -> Self {
        Self {
            path: cred.path.to_string(),
            kind: cred.kind,
            label: cred.label,
            attributes: cred.attributes,
            attributes_in_vault: cred.attributes_in_vault,
            revoked: cred.revoked,
            controllers: cred.controllers.iter().map(|c| c.to_string()).collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct ImportCredentialEntry {
    /// Credential path, `<owner>/<cloud>/<name>`.
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub revoked: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct ImportCloudCredentialsRequest {
    pub credentials: Vec<ImportCredentialEntry>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct UserRequest {
    pub user: String,
}

// Models

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct AddModelRequest {
    pub name: String,
    /// Owner defaults to the caller.
    #[serde(default)]
    pub owner: Option<String>,
    pub cloud: String,
    #[serde(default)]
    pub region: String,
    /// Credential path, `<owner>/<cloud>/<name>`.
    pub credential: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct ModelSummary {
    pub path: String,
    pub uuid: String,
    pub controller: String,
    pub cloud: String,
    pub region: String,
    pub life: String,
    pub unit_count: u64,
    pub status: String,
}

impl From<Model> for ModelSummary {
    fn from(model: Model) -> Self {
        Self {
            path: model.path.to_string(),
            uuid: model.uuid,
            controller: model.controller.to_string(),
            cloud: model.cloud,
            region: model.region,
            life: model.life.as_str().to_string(),
            unit_count: model.unit_count,
            status: model.status,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct ModelStatusResponse {
    pub uuid: String,
    pub life: String,
    pub status: String,
    pub unit_count: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct ImportModelRequest {
    /// Owning controller path.
    pub controller: String,
    pub path: String,
    pub uuid: String,
    pub credential: String,
    pub cloud: String,
    #[serde(default)]
    pub region: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct MigrateModelRequest {
    pub target_controller: String,
}

// Offers

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct OfferRequest {
    /// Model path, `<owner>/<name>`.
    pub model: String,
    pub application: String,
    pub offer_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub endpoints: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Default)]
pub struct OfferEndpointView {
    pub name: String,
    #[serde(default)]
    pub interface: String,
    #[serde(default)]
    pub role: String,
}

impl From<OfferEndpoint> for OfferEndpointView {
    fn from(ep: OfferEndpoint) -> Self {
        Self {
            name: ep.name,
            interface: ep.interface,
            role: ep.role,
        }
    }
}

impl From<OfferEndpointView> for OfferEndpoint {
    fn from(ep: OfferEndpointView) -> Self {
        Self {
            name: ep.name,
            interface: ep.interface,
            role: ep.role,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct OfferUserView {
    pub user: String,
    pub access: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct OfferDetails {
    pub uuid: String,
    pub url: String,
    pub owner: String,
    pub model: String,
    pub application_name: String,
    pub description: String,
    pub charm_url: String,
    pub endpoints: Vec<OfferEndpointView>,
    /// The caller's effective access level.
    pub access: String,
    /// Full access list; populated only for offer administrators.
    pub users: Vec<OfferUserView>,
}

impl OfferDetails {
    pub fn build(offer: ApplicationOffer, access: OfferAccess) -> Self {
        let users = if access == OfferAccess::Admin {
            offer
                .users
                .iter()
                .map(|u| OfferUserView {
                    user: u.user.clone(),
                    access: u.access.as_str().to_string(),
                })
                .collect()
        } else {
            Vec::new()
        };
        Self {
            uuid: offer.uuid,
            url: offer.url,
            owner: offer.owner_name,
            model: offer.model_name,
            application_name: offer.application_name,
            description: offer.application_description,
            charm_url: offer.charm_url,
            endpoints: offer.endpoints.into_iter().map(Into::into).collect(),
            access: access.as_str().to_string(),
            users,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Default)]
pub struct OfferFilterView {
    #[serde(default)]
    pub owner_name: String,
    #[serde(default)]
    pub model_name: String,
    #[serde(default)]
    pub application_name: String,
    #[serde(default)]
    pub offer_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub endpoints: Vec<OfferEndpointView>,
    #[serde(default)]
    pub allowed_consumers: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Default)]
pub struct FindOffersRequest {
    #[serde(default)]
    pub filters: Vec<OfferFilterView>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct OffersResponse {
    pub offers: Vec<OfferDetails>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct GrantOfferAccessRequest {
    pub user: String,
    /// `read`, `consume` or `admin`.
    pub access: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct ConsumeDetailsResponse {
    pub offer: OfferDetails,
    /// Connection details for the owning controller.
    pub controller_addresses: Vec<String>,
    pub controller_ca_cert: String,
}

// Relations

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct TupleView {
    /// `kind:id` or `kind:id#relation`.
    pub subject: String,
    pub relation: String,
    pub target: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct RelationsRequest {
    pub tuples: Vec<TupleView>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct CheckRelationRequest {
    pub tuple: TupleView,
    #[serde(default)]
    pub trace: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct CheckRelationResponse {
    pub allowed: bool,
    #[serde(default)]
    pub trace: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Default)]
pub struct ListRelationsRequest {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub relation: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub page_size: Option<usize>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct ListRelationsResponse {
    pub tuples: Vec<TupleView>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct ListObjectsRequest {
    pub subject: String,
    pub relation: String,
    pub kind: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct ListObjectsResponse {
    pub objects: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct ListUsersRequest {
    pub target: String,
    pub relation: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct ListUsersResponse {
    pub users: Vec<String>,
}

// Audit

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct AuditEventView {
    #[schema(value_type = String)]
    pub time: DateTime<Utc>,
    pub actor: String,
    pub action: String,
    pub subject: String,
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct AuditEventsResponse {
    pub events: Vec<AuditEventView>,
}

// System

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct SystemInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct HealthResponse {
    pub status: String,
}

/// Convert filter views into catalog filters.
pub fn to_offer_filters(filters: Vec<OfferFilterView>) -> Vec<armada_catalog::OfferFilter> {
    filters
        .into_iter()
        .map(|f| armada_catalog::OfferFilter {
            owner_name: f.owner_name,
            model_name: f.model_name,
            application_name: f.application_name,
            offer_name: f.offer_name,
            application_description: f.description,
            endpoints: f.endpoints.into_iter().map(Into::into).collect(),
            allowed_consumers: f.allowed_consumers,
        })
        .collect()
}
