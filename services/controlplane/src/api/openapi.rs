//! OpenAPI schema aggregation for the control-plane API.
//!
//! # Purpose
//! Collects all routes and schema types into a single OpenAPI document for
//! docs and client generation.

use utoipa::OpenApi;

use crate::api::types::{
    AddControllerRequest, AddModelRequest, AuditEventView, AuditEventsResponse,
    CheckRelationRequest, CheckRelationResponse, ConsumeDetailsResponse, ControllerListResponse,
    ControllerStatsView, ControllerSummary, CredentialView, ErrorResponse, FindOffersRequest,
    GrantOfferAccessRequest, HealthResponse, ImportCloudCredentialsRequest,
    ImportCredentialEntry, ImportModelRequest, ListObjectsRequest, ListObjectsResponse,
    ListRelationsRequest, ListRelationsResponse, ListUsersRequest, ListUsersResponse, Location,
    LocationsResponse, MigrateModelRequest, ModelStatusResponse, ModelSummary, OfferDetails,
    OfferEndpointView, OfferFilterView, OfferRequest, OfferUserView, OffersResponse,
    RelationsRequest, SetDeprecatedRequest, SystemInfo, TupleView, UpdateCredentialRequest,
    UpdateCredentialResponse, UserRequest,
};
use crate::api::{audit, controllers, credentials, models, offers, relations, system};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "armada-controlplane",
        version = "v1",
        description = "Armada control plane HTTP API"
    ),
    paths(
        system::system_info,
        system::system_health,
        controllers::add_controller,
        controllers::list_controllers,
        controllers::controller_info,
        controllers::remove_controller,
        controllers::set_controller_deprecated,
        controllers::locations,
        credentials::update_credential,
        credentials::get_credential,
        credentials::import_cloud_credentials,
        credentials::grant_credential_access,
        credentials::revoke_credential_access,
        models::add_model,
        models::destroy_model,
        models::model_status,
        models::import_model,
        models::update_migrated_model,
        offers::create_offer,
        offers::get_offer,
        offers::get_offer_by_url,
        offers::consume_details,
        offers::find_offers,
        offers::list_offers,
        offers::grant_offer_access,
        offers::revoke_offer_access,
        offers::destroy_offer,
        relations::add_relations,
        relations::remove_relations,
        relations::check_relation,
        relations::list_relations,
        relations::list_objects,
        relations::list_users_with_access,
        audit::list_audit_events,
        audit::grant_audit_log_access,
        audit::revoke_audit_log_access
    ),
    components(schemas(
        ErrorResponse,
        SystemInfo,
        HealthResponse,
        AddControllerRequest,
        ControllerSummary,
        ControllerStatsView,
        ControllerListResponse,
        SetDeprecatedRequest,
        Location,
        LocationsResponse,
        UpdateCredentialRequest,
        UpdateCredentialResponse,
        CredentialView,
        ImportCredentialEntry,
        ImportCloudCredentialsRequest,
        UserRequest,
        AddModelRequest,
        ModelSummary,
        ModelStatusResponse,
        ImportModelRequest,
        MigrateModelRequest,
        OfferRequest,
        OfferEndpointView,
        OfferUserView,
        OfferDetails,
        OfferFilterView,
        FindOffersRequest,
        OffersResponse,
        GrantOfferAccessRequest,
        ConsumeDetailsResponse,
        TupleView,
        RelationsRequest,
        CheckRelationRequest,
        CheckRelationResponse,
        ListRelationsRequest,
        ListRelationsResponse,
        ListObjectsRequest,
        ListObjectsResponse,
        ListUsersRequest,
        ListUsersResponse,
        AuditEventView,
        AuditEventsResponse
    )),
    tags(
        (name = "system", description = "System and discovery endpoints"),
        (name = "controllers", description = "Controller fleet management"),
        (name = "credentials", description = "Cloud credential management"),
        (name = "models", description = "Model lifecycle"),
        (name = "offers", description = "Cross-model application offers"),
        (name = "relations", description = "Authorization graph administration"),
        (name = "audit", description = "Audit log access")
    )
)]
pub struct ApiDoc;
