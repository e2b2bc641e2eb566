//! Controller fleet API handlers.
//!
//! # Purpose
//! Enrollment and lifecycle of backend controllers plus the locations
//! query. Every mutation here is gated on fleet administration.

use std::collections::HashMap;

use armada_authz::{Relation, Tag, Tuple};
use armada_backend::Dialer;
use armada_catalog::{Catalog, CloudRegion, Controller, EntityPath, LocationsFilter};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};

use crate::api::error::{ApiError, api_bad_request, api_unauthorized};
use crate::api::types::{
    AddControllerRequest, ControllerListResponse, ControllerSummary, Location, LocationsResponse,
    SetDeprecatedRequest,
};
use crate::app::AppState;
use crate::auth::Principal;

pub(crate) fn require_controller_admin(
    state: &AppState,
    principal: &Principal,
) -> Result<(), ApiError> {
    if principal.is_controller_admin(&state.checker) {
        return Ok(());
    }
    Err(api_unauthorized(
        "controller administration requires the controller-admin group",
    ))
}

#[utoipa::path(
    post,
    path = "/v1/controllers",
    tag = "controllers",
    request_body = AddControllerRequest,
    responses(
        (status = 201, description = "Controller enrolled", body = ControllerSummary),
        (status = 409, description = "Controller already exists", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn add_controller(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<AddControllerRequest>,
) -> Result<(StatusCode, Json<ControllerSummary>), ApiError> {
    let principal = state.authenticate(&headers).await?;
    require_controller_admin(&state, &principal)?;
    let path: EntityPath = body.path.parse()?;
    if body.cloud.is_empty() {
        return Err(api_bad_request("cloud must be set"));
    }

    let ctl = Controller {
        path: path.clone(),
        uuid: body.uuid,
        addresses: body.addresses,
        ca_cert: body.ca_cert,
        admin_user: body.admin_user,
        admin_password: body.admin_password,
        ..Default::default()
    };
    if let Err(err) = state.catalog.insert_controller(ctl.clone()).await {
        state
            .audit(&principal, "AddController", &body.path, false, &err.to_string())
            .await;
        return Err(err.into());
    }

    // The enrolled controller becomes a hosting candidate for its region;
    // the zero-region record carries the cloud-wide fields.
    let mut regions = vec![CloudRegion {
        cloud: body.cloud.clone(),
        region: String::new(),
        provider_type: body.provider_type.clone(),
        ..Default::default()
    }];
    regions.push(CloudRegion {
        cloud: body.cloud.clone(),
        region: body.region.clone(),
        provider_type: body.provider_type.clone(),
        primary_controllers: vec![path.clone()],
        ..Default::default()
    });
    state.catalog.upsert_cloud_regions(regions).await?;

    state.relations.add_relations(&[
        Tuple::new(
            principal.tag(),
            Relation::Administrator,
            Tag::controller(path.to_string()),
        ),
        Tuple::new(
            Tag::controller(path.to_string()),
            Relation::Controller,
            Tag::cloud(&body.cloud),
        ),
    ])?;

    state
        .audit(&principal, "AddController", &body.path, true, "")
        .await;
    Ok((StatusCode::CREATED, Json(ctl.into())))
}

#[utoipa::path(
    get,
    path = "/v1/controllers",
    tag = "controllers",
    responses(
        (status = 200, description = "List enrolled controllers", body = ControllerListResponse)
    )
)]
pub(crate) async fn list_controllers(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ControllerListResponse>, ApiError> {
    let principal = state.authenticate(&headers).await?;
    require_controller_admin(&state, &principal)?;
    let controllers = state
        .catalog
        .controllers()
        .await?
        .into_iter()
        .map(ControllerSummary::from)
        .collect();
    Ok(Json(ControllerListResponse { controllers }))
}

#[utoipa::path(
    get,
    path = "/v1/controllers/{user}/{name}",
    tag = "controllers",
    params(
        ("user" = String, Path, description = "Controller owner"),
        ("name" = String, Path, description = "Controller name")
    ),
    responses(
        (status = 200, description = "Controller details", body = ControllerSummary),
        (status = 404, description = "Controller not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn controller_info(
    Path((user, name)): Path<(String, String)>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ControllerSummary>, ApiError> {
    let principal = state.authenticate(&headers).await?;
    require_controller_admin(&state, &principal)?;
    let ctl = state
        .catalog
        .controller(&EntityPath::new(user, name))
        .await?;
    Ok(Json(ctl.into()))
}

#[utoipa::path(
    delete,
    path = "/v1/controllers/{user}/{name}",
    tag = "controllers",
    params(
        ("user" = String, Path, description = "Controller owner"),
        ("name" = String, Path, description = "Controller name")
    ),
    responses(
        (status = 204, description = "Controller removed"),
        (status = 404, description = "Controller not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn remove_controller(
    Path((user, name)): Path<(String, String)>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let principal = state.authenticate(&headers).await?;
    require_controller_admin(&state, &principal)?;
    let path = EntityPath::new(user, name);
    state.catalog.remove_controller(&path).await?;

    // Compensating actions: the catalog is not transactional across
    // records, so clean the references after the record is gone.
    state.catalog.remove_controller_machines(&path).await?;
    state.catalog.remove_controller_applications(&path).await?;
    state.catalog.credentials_remove_controller(&path).await?;
    state
        .catalog
        .remove_controller_from_cloud_regions(&path)
        .await?;
    state.dialer.evict(&path);
    state
        .relations
        .remove_all_for(&Tag::controller(path.to_string()));

    state
        .audit(&principal, "RemoveController", &path.to_string(), true, "")
        .await;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/v1/controllers/{user}/{name}/deprecated",
    tag = "controllers",
    request_body = SetDeprecatedRequest,
    params(
        ("user" = String, Path, description = "Controller owner"),
        ("name" = String, Path, description = "Controller name")
    ),
    responses(
        (status = 204, description = "Deprecation flag updated"),
        (status = 404, description = "Controller not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn set_controller_deprecated(
    Path((user, name)): Path<(String, String)>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SetDeprecatedRequest>,
) -> Result<StatusCode, ApiError> {
    let principal = state.authenticate(&headers).await?;
    require_controller_admin(&state, &principal)?;
    let path = EntityPath::new(user, name);
    state
        .catalog
        .set_controller_deprecated(&path, body.deprecated)
        .await?;
    state
        .audit(
            &principal,
            "SetControllerDeprecated",
            &path.to_string(),
            true,
            "",
        )
        .await;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/v1/locations",
    tag = "controllers",
    params(
        ("cloud" = Option<String>, Query, description = "Filter by cloud"),
        ("region" = Option<String>, Query, description = "Filter by region")
    ),
    responses(
        (status = 200, description = "Hosting locations", body = LocationsResponse),
        (status = 400, description = "Unknown filter key", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn locations(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<LocationsResponse>, ApiError> {
    state.authenticate(&headers).await?;
    let mut filter = LocationsFilter::default();
    for (key, value) in params {
        match key.as_str() {
            "cloud" => filter.cloud = Some(value),
            "region" => filter.region = Some(value),
            other => {
                return Err(api_bad_request(&format!("unknown location filter {other:?}")));
            }
        }
    }
    let locations = state
        .catalog
        .locations(&filter)
        .await?
        .into_iter()
        .map(|(cloud, region)| Location { cloud, region })
        .collect();
    Ok(Json(LocationsResponse { locations }))
}
