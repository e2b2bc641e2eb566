//! Model API handlers.
//!
//! # Purpose
//! Model creation, destruction, status and migration. Creation picks an
//! owning controller from the target cloud region and pushes the backing
//! credential before the model is built; reads go to the owning backend.
//!
//! Access failures against a model the caller cannot even read report
//! `NotFound`, so model UUIDs cannot be probed.

use armada_authz::{Relation, Tag, Tuple};
use armada_backend::{CredentialUpdate, Dialer, ModelManager, ModelSpec};
use armada_catalog::{Catalog, Credential, EntityPath, Life, Model};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};

use crate::api::controllers::require_controller_admin;
use crate::api::error::{ApiError, api_not_found, api_unauthorized};
use crate::api::map_backend_error;
use crate::api::types::{
    AddModelRequest, ImportModelRequest, MigrateModelRequest, ModelStatusResponse, ModelSummary,
};
use crate::app::AppState;
use crate::auth::Principal;
use crate::secrets::SecretStore;

/// Gate an operation on `need`; a caller without even read access learns
/// nothing about the model's existence.
fn require_model_access(
    state: &AppState,
    principal: &Principal,
    uuid: &str,
    need: Relation,
) -> Result<(), ApiError> {
    let tag = Tag::model(uuid);
    if principal.is_controller_admin(&state.checker) || principal.holds(&state.checker, need, &tag)
    {
        return Ok(());
    }
    if principal.holds(&state.checker, Relation::Reader, &tag) {
        return Err(api_unauthorized("model access denied"));
    }
    Err(api_not_found("model not found"))
}

/// Resolve the credential with vault attributes inlined, ready to push.
async fn credential_for_push(
    state: &AppState,
    cred: &Credential,
) -> Result<CredentialUpdate, ApiError> {
    let attributes = if cred.attributes_in_vault {
        state.secrets.get(&cred.path).await?
    } else {
        cred.attributes.clone()
    };
    Ok(CredentialUpdate {
        path: cred.path.clone(),
        kind: cred.kind.clone(),
        attributes,
        revoked: cred.revoked,
    })
}

#[utoipa::path(
    post,
    path = "/v1/models",
    tag = "models",
    request_body = AddModelRequest,
    responses(
        (status = 201, description = "Model created", body = ModelSummary),
        (status = 401, description = "Missing add-model access", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn add_model(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<AddModelRequest>,
) -> Result<(StatusCode, Json<ModelSummary>), ApiError> {
    let principal = state.authenticate(&headers).await?;
    let owner = body.owner.clone().unwrap_or_else(|| principal.username.clone());
    let admin = principal.is_controller_admin(&state.checker);
    if owner != principal.username && !admin {
        return Err(api_unauthorized("cannot create models for another user"));
    }
    if !admin
        && !principal.holds(&state.checker, Relation::CanAddModel, &Tag::cloud(&body.cloud))
    {
        return Err(api_unauthorized("no add-model access on the cloud"));
    }

    let credential_path = body.credential.parse()?;
    let credential = state.catalog.credential(&credential_path).await?;
    let region = state.catalog.cloud_region(&body.cloud, &body.region).await?;

    // First reachable, non-deprecated candidate wins; secondaries are the
    // fallback tier.
    let mut chosen = None;
    for path in region
        .primary_controllers
        .iter()
        .chain(region.secondary_controllers.iter())
    {
        let ctl = match state.catalog.controller(path).await {
            Ok(ctl) => ctl,
            Err(_) => continue,
        };
        if ctl.deprecated {
            continue;
        }
        if let Ok(session) = state.dialer.open(&ctl).await {
            chosen = Some((ctl, session));
            break;
        }
    }
    let Some((ctl, session)) = chosen else {
        return Err(armada_catalog::Error::ConnectionFailure(format!(
            "no available controller in {}/{}",
            body.cloud, body.region
        ))
        .into());
    };

    // The backend needs the credential before it can build the model.
    let push = credential_for_push(&state, &credential).await?;
    session
        .update_credential(&push)
        .await
        .map_err(map_backend_error)?;
    state
        .catalog
        .credential_add_controller(&credential_path, &ctl.path)
        .await?;

    let spec = ModelSpec {
        name: body.name.clone(),
        owner: owner.clone(),
        cloud: body.cloud.clone(),
        region: body.region.clone(),
        credential: credential_path.clone(),
    };
    let info = session.add_model(&spec).await.map_err(map_backend_error)?;

    let model = Model {
        path: EntityPath::new(owner.clone(), body.name.clone()),
        uuid: info.uuid.clone(),
        controller: ctl.path.clone(),
        credential: credential_path,
        cloud: body.cloud.clone(),
        region: body.region.clone(),
        life: Life::Alive,
        unit_count: 0,
        status: info.status.clone(),
    };
    state.catalog.insert_model(model.clone()).await?;
    state.relations.add_relations(&[
        Tuple::new(
            Tag::user(&owner),
            Relation::Administrator,
            Tag::model(&info.uuid),
        ),
        Tuple::new(
            Tag::controller(ctl.path.to_string()),
            Relation::Controller,
            Tag::model(&info.uuid),
        ),
    ])?;

    state
        .audit(&principal, "AddModel", &model.path.to_string(), true, "")
        .await;
    Ok((StatusCode::CREATED, Json(model.into())))
}

#[utoipa::path(
    delete,
    path = "/v1/models/{uuid}",
    tag = "models",
    params(("uuid" = String, Path, description = "Model UUID")),
    responses(
        (status = 204, description = "Model destruction started"),
        (status = 404, description = "Model not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn destroy_model(
    Path(uuid): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let principal = state.authenticate(&headers).await?;
    let model = state
        .catalog
        .model_by_uuid(&uuid)
        .await
        .map_err(|_| api_not_found("model not found"))?;
    require_model_access(&state, &principal, &uuid, Relation::Administrator)?;

    let ctl = state.catalog.controller(&model.controller).await?;
    let session = state.session_for(&ctl).await?;
    session
        .destroy_model(&uuid)
        .await
        .map_err(map_backend_error)?;
    // The watcher settles the record; mark it dying right away so callers
    // see the transition without waiting for the next delta batch.
    state
        .catalog
        .set_model_life(&ctl.path, &uuid, Life::Dying)
        .await?;
    state
        .audit(&principal, "DestroyModel", &model.path.to_string(), true, "")
        .await;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/v1/models/{uuid}/status",
    tag = "models",
    params(("uuid" = String, Path, description = "Model UUID")),
    responses(
        (status = 200, description = "Model status", body = ModelStatusResponse),
        (status = 404, description = "Model not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn model_status(
    Path(uuid): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ModelStatusResponse>, ApiError> {
    let principal = state.authenticate(&headers).await?;
    let model = state
        .catalog
        .model_by_uuid(&uuid)
        .await
        .map_err(|_| api_not_found("model not found"))?;
    require_model_access(&state, &principal, &uuid, Relation::Reader)?;
    if model.life.is_dead() {
        // Tombstones keep the UUID reserved but the model is gone.
        return Err(api_not_found("model not found"));
    }

    let ctl = state.catalog.controller(&model.controller).await?;
    let session = state.session_for(&ctl).await?;
    let status = session
        .model_status(&uuid)
        .await
        .map_err(map_backend_error)?;
    Ok(Json(ModelStatusResponse {
        uuid: status.uuid,
        life: status.life.as_str().to_string(),
        status: status.status,
        unit_count: status.unit_count,
    }))
}

#[utoipa::path(
    post,
    path = "/v1/models/import",
    tag = "models",
    request_body = ImportModelRequest,
    responses(
        (status = 201, description = "Model imported", body = ModelSummary),
        (status = 404, description = "Controller not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn import_model(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ImportModelRequest>,
) -> Result<(StatusCode, Json<ModelSummary>), ApiError> {
    let principal = state.authenticate(&headers).await?;
    require_controller_admin(&state, &principal)?;
    let controller: EntityPath = body.controller.parse()?;
    // The controller must already be enrolled.
    state.catalog.controller(&controller).await?;
    let path: EntityPath = body.path.parse()?;

    let model = Model {
        path: path.clone(),
        uuid: body.uuid.clone(),
        controller: controller.clone(),
        credential: body.credential.parse()?,
        cloud: body.cloud,
        region: body.region,
        life: Life::Alive,
        unit_count: 0,
        status: String::new(),
    };
    state.catalog.insert_model(model.clone()).await?;
    state.relations.add_relations(&[
        Tuple::new(
            Tag::user(&path.user),
            Relation::Administrator,
            Tag::model(&body.uuid),
        ),
        Tuple::new(
            Tag::controller(controller.to_string()),
            Relation::Controller,
            Tag::model(&body.uuid),
        ),
    ])?;
    state
        .audit(&principal, "ImportModel", &path.to_string(), true, "")
        .await;
    Ok((StatusCode::CREATED, Json(model.into())))
}

#[utoipa::path(
    post,
    path = "/v1/models/{user}/{name}/migrate",
    tag = "models",
    request_body = MigrateModelRequest,
    params(
        ("user" = String, Path, description = "Model owner"),
        ("name" = String, Path, description = "Model name")
    ),
    responses(
        (status = 204, description = "Model re-pointed at its new controller"),
        (status = 404, description = "Model or controller not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn update_migrated_model(
    Path((user, name)): Path<(String, String)>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<MigrateModelRequest>,
) -> Result<StatusCode, ApiError> {
    let principal = state.authenticate(&headers).await?;
    require_controller_admin(&state, &principal)?;
    let target: EntityPath = body.target_controller.parse()?;
    // Only migrate onto a controller we know about.
    state.catalog.controller(&target).await?;
    let path = EntityPath::new(user, name);
    state.catalog.set_model_controller(&path, &target).await?;
    state
        .audit(
            &principal,
            "UpdateMigratedModel",
            &path.to_string(),
            true,
            &body.target_controller,
        )
        .await;
    Ok(StatusCode::NO_CONTENT)
}
