//! Cloud-credential API handlers.
//!
//! # Purpose
//! Credential upserts and ACL changes, plus the import path operators use
//! to bulk-load credentials. Every update fans out to the controllers whose
//! models reference the credential (the watcher drains the fan-out set).

use armada_catalog::{Catalog, Credential, CredentialPath};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};

use crate::api::controllers::require_controller_admin;
use crate::api::error::{ApiError, api_unauthorized};
use crate::api::types::{
    CredentialView, ImportCloudCredentialsRequest, UpdateCredentialRequest,
    UpdateCredentialResponse, UserRequest,
};
use crate::app::AppState;
use crate::auth::Principal;
use crate::secrets::SecretStore;

fn require_owner_or_admin(
    state: &AppState,
    principal: &Principal,
    owner: &str,
) -> Result<(), ApiError> {
    if principal.username == owner || principal.is_controller_admin(&state.checker) {
        return Ok(());
    }
    Err(api_unauthorized("credential belongs to another user"))
}

/// Store the credential and mark every controller referencing it.
async fn store_credential(state: &AppState, cred: Credential) -> Result<usize, ApiError> {
    let path = cred.path.clone();
    state.catalog.update_credential(cred).await?;
    let controllers = state.catalog.controllers_with_credential(&path).await?;
    state
        .catalog
        .set_credential_updates(&controllers, &path)
        .await?;
    metrics::counter!("armada_credential_updates_total").increment(1);
    Ok(controllers.len())
}

#[utoipa::path(
    put,
    path = "/v1/credentials/{user}/{cloud}/{name}",
    tag = "credentials",
    request_body = UpdateCredentialRequest,
    responses(
        (status = 200, description = "Credential stored", body = UpdateCredentialResponse)
    )
)]
pub(crate) async fn update_credential(
    Path((user, cloud, name)): Path<(String, String, String)>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<UpdateCredentialRequest>,
) -> Result<Json<UpdateCredentialResponse>, ApiError> {
    let principal = state.authenticate(&headers).await?;
    require_owner_or_admin(&state, &principal, &user)?;
    let path = CredentialPath::new(user, cloud, name);

    let mut cred = Credential {
        path: path.clone(),
        kind: body.kind,
        label: body.label,
        attributes_in_vault: body.attributes_in_vault,
        revoked: body.revoked,
        ..Default::default()
    };
    if body.attributes_in_vault {
        // Attribute values live in the secret store; the catalog record
        // only carries the flag.
        state.secrets.put(&path, body.attributes).await?;
    } else {
        cred.attributes = body.attributes;
    }

    let marked_controllers = store_credential(&state, cred).await?;
    state
        .audit(
            &principal,
            "UpdateCredential",
            &path.to_string(),
            true,
            "",
        )
        .await;
    Ok(Json(UpdateCredentialResponse { marked_controllers }))
}

#[utoipa::path(
    get,
    path = "/v1/credentials/{user}/{cloud}/{name}",
    tag = "credentials",
    responses(
        (status = 200, description = "Credential details", body = CredentialView),
        (status = 404, description = "Credential not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn get_credential(
    Path((user, cloud, name)): Path<(String, String, String)>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CredentialView>, ApiError> {
    let principal = state.authenticate(&headers).await?;
    let path = CredentialPath::new(user.clone(), cloud, name);
    let mut cred = state.catalog.credential(&path).await?;
    // Owner and fleet admins always read; the embedded ACL covers users
    // granted read access explicitly.
    let owner_or_admin =
        principal.username == user || principal.is_controller_admin(&state.checker);
    if !owner_or_admin && !cred.acl.can_read(&principal.username) {
        return Err(api_unauthorized("credential belongs to another user"));
    }
    if cred.attributes_in_vault {
        // A vault failure is the caller's problem, not an empty credential.
        cred.attributes = state.secrets.get(&path).await?;
    }
    Ok(Json(cred.into()))
}

#[utoipa::path(
    post,
    path = "/v1/credentials/import",
    tag = "credentials",
    request_body = ImportCloudCredentialsRequest,
    responses(
        (status = 200, description = "Credentials imported", body = UpdateCredentialResponse)
    )
)]
pub(crate) async fn import_cloud_credentials(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ImportCloudCredentialsRequest>,
) -> Result<Json<UpdateCredentialResponse>, ApiError> {
    let principal = state.authenticate(&headers).await?;
    require_controller_admin(&state, &principal)?;
    let mut marked_controllers = 0;
    for entry in body.credentials {
        let path: CredentialPath = entry.path.parse()?;
        let cred = Credential {
            path: path.clone(),
            kind: entry.kind,
            label: entry.label,
            attributes: entry.attributes,
            revoked: entry.revoked,
            ..Default::default()
        };
        marked_controllers += store_credential(&state, cred).await?;
        state
            .audit(
                &principal,
                "ImportCloudCredentials",
                &path.to_string(),
                true,
                "",
            )
            .await;
    }
    Ok(Json(UpdateCredentialResponse { marked_controllers }))
}

#[utoipa::path(
    post,
    path = "/v1/credentials/{user}/{cloud}/{name}/grant",
    tag = "credentials",
    request_body = UserRequest,
    responses(
        (status = 204, description = "Read access granted"),
        (status = 404, description = "Credential not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn grant_credential_access(
    Path((user, cloud, name)): Path<(String, String, String)>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<UserRequest>,
) -> Result<StatusCode, ApiError> {
    let principal = state.authenticate(&headers).await?;
    require_owner_or_admin(&state, &principal, &user)?;
    let path = CredentialPath::new(user, cloud, name);
    state.catalog.grant_credential_read(&path, &body.user).await?;
    state
        .audit(
            &principal,
            "GrantCredentialAccess",
            &path.to_string(),
            true,
            &body.user,
        )
        .await;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/v1/credentials/{user}/{cloud}/{name}/revoke",
    tag = "credentials",
    request_body = UserRequest,
    responses(
        (status = 204, description = "Read access revoked"),
        (status = 404, description = "Credential not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn revoke_credential_access(
    Path((user, cloud, name)): Path<(String, String, String)>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<UserRequest>,
) -> Result<StatusCode, ApiError> {
    let principal = state.authenticate(&headers).await?;
    require_owner_or_admin(&state, &principal, &user)?;
    let path = CredentialPath::new(user, cloud, name);
    state
        .catalog
        .revoke_credential_read(&path, &body.user)
        .await?;
    state
        .audit(
            &principal,
            "RevokeCredentialAccess",
            &path.to_string(),
            true,
            &body.user,
        )
        .await;
    Ok(StatusCode::NO_CONTENT)
}
