//! Application-offer API handlers.
//!
//! # Purpose
//! Cross-model offer lifecycle and its access protocol. Access decisions
//! combine the relationship graph with the offer's embedded user list (the
//! latter is how the `everyone` pseudo-user works); both are updated on
//! grant and revoke so either read path gives the same answer.
//!
//! A caller with no relation to an offer gets `NotFound`, never
//! `Unauthorized`; offer UUIDs and URLs must not be probeable.

use std::str::FromStr;

use armada_authz::{Relation, Tag, Tuple};
use armada_backend::{ModelManager, OfferSpec};
use armada_catalog::{
    ApplicationOffer, Catalog, EntityPath, OfferAccess, OfferEndpoint, OfferUserDetails,
    parse_offer_url,
};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use serde::Deserialize;

use crate::api::error::{ApiError, api_bad_request, api_not_found, api_unauthorized};
use crate::api::map_backend_error;
use crate::api::types::{
    ConsumeDetailsResponse, FindOffersRequest, GrantOfferAccessRequest, OfferDetails,
    OfferRequest, OffersResponse, to_offer_filters,
};
use crate::app::AppState;
use crate::auth::Principal;

/// The caller's effective access: the embedded user list (which carries the
/// `everyone` pseudo-user) joined with the relationship graph.
fn effective_access(
    state: &AppState,
    principal: &Principal,
    offer: &ApplicationOffer,
) -> OfferAccess {
    let embedded = offer.access_for(&principal.username);
    let tag = Tag::offer(&offer.uuid);
    let graph = if principal.is_controller_admin(&state.checker)
        || principal.holds(&state.checker, Relation::Administrator, &tag)
    {
        OfferAccess::Admin
    } else if principal.holds(&state.checker, Relation::Consumer, &tag) {
        OfferAccess::Consume
    } else if principal.holds(&state.checker, Relation::Reader, &tag) {
        OfferAccess::Read
    } else {
        OfferAccess::None
    };
    embedded.max(graph)
}

/// Fail closed: `NotFound` below read access, `Unauthorized` between read
/// and the required level.
fn require_offer_access(access: OfferAccess, need: OfferAccess) -> Result<(), ApiError> {
    if access >= need {
        return Ok(());
    }
    if access >= OfferAccess::Read {
        return Err(api_unauthorized("offer access denied"));
    }
    Err(api_not_found("offer not found"))
}

fn access_relation(access: OfferAccess) -> Option<Relation> {
    match access {
        OfferAccess::Admin => Some(Relation::Administrator),
        OfferAccess::Consume => Some(Relation::Consumer),
        OfferAccess::Read => Some(Relation::Reader),
        OfferAccess::None => None,
    }
}

/// Point the graph at the user's single new access level.
fn sync_offer_relations(
    state: &AppState,
    user: &str,
    offer_uuid: &str,
    access: OfferAccess,
) -> Result<(), ApiError> {
    let target = Tag::offer(offer_uuid);
    let existing: Vec<Tuple> = [Relation::Administrator, Relation::Consumer, Relation::Reader]
        .into_iter()
        .map(|rel| Tuple::new(Tag::user(user), rel, target.clone()))
        .collect();
    state.relations.remove_relations(&existing)?;
    if let Some(rel) = access_relation(access) {
        state
            .relations
            .add_relations(&[Tuple::new(Tag::user(user), rel, target)])?;
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/v1/offers",
    tag = "offers",
    request_body = OfferRequest,
    responses(
        (status = 201, description = "Offer created", body = OfferDetails),
        (status = 409, description = "Offer already exists", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn create_offer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<OfferRequest>,
) -> Result<(StatusCode, Json<OfferDetails>), ApiError> {
    let principal = state.authenticate(&headers).await?;
    let model_path: EntityPath = body.model.parse()?;
    let model = state.catalog.model(&model_path).await?;
    if !principal.is_controller_admin(&state.checker)
        && !principal.holds(
            &state.checker,
            Relation::Administrator,
            &Tag::model(&model.uuid),
        )
    {
        return Err(api_unauthorized("offers require model administration"));
    }

    let ctl = state.catalog.controller(&model.controller).await?;
    let session = state.session_for(&ctl).await?;
    let uuid = session
        .add_application_offer(&OfferSpec {
            model_uuid: model.uuid.clone(),
            application_name: body.application.clone(),
            offer_name: body.offer_name.clone(),
            description: body.description.clone(),
            endpoints: body.endpoints.clone(),
        })
        .await
        .map_err(map_backend_error)?;

    let offer = ApplicationOffer {
        uuid: uuid.clone(),
        url: format!("{}/{}.{}", model_path.user, model_path.name, body.offer_name),
        owner_name: model_path.user.clone(),
        model_name: model_path.name.clone(),
        offer_name: body.offer_name.clone(),
        application_name: body.application.clone(),
        application_description: body.description.clone(),
        endpoints: body
            .endpoints
            .iter()
            .map(|name| OfferEndpoint {
                name: name.clone(),
                ..Default::default()
            })
            .collect(),
        users: vec![OfferUserDetails {
            user: principal.username.clone(),
            access: OfferAccess::Admin,
        }],
        ..Default::default()
    };
    state.catalog.insert_application_offer(offer.clone()).await?;
    state.relations.add_relations(&[
        Tuple::new(
            principal.tag(),
            Relation::Administrator,
            Tag::offer(&uuid),
        ),
        Tuple::new(Tag::model(&model.uuid), Relation::Model, Tag::offer(&uuid)),
    ])?;

    state
        .audit(&principal, "Offer", &offer.url, true, "")
        .await;
    Ok((
        StatusCode::CREATED,
        Json(OfferDetails::build(offer, OfferAccess::Admin)),
    ))
}

#[utoipa::path(
    get,
    path = "/v1/offers/{uuid}",
    tag = "offers",
    params(("uuid" = String, Path, description = "Offer UUID")),
    responses(
        (status = 200, description = "Offer details", body = OfferDetails),
        (status = 404, description = "Offer not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn get_offer(
    Path(uuid): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<OfferDetails>, ApiError> {
    let principal = state.authenticate(&headers).await?;
    let offer = state
        .catalog
        .application_offer(&uuid)
        .await
        .map_err(|_| api_not_found("offer not found"))?;
    let access = effective_access(&state, &principal, &offer);
    require_offer_access(access, OfferAccess::Read)?;
    Ok(Json(OfferDetails::build(offer, access)))
}

#[derive(Debug, Deserialize)]
pub(crate) struct OfferUrlQuery {
    url: String,
}

#[utoipa::path(
    get,
    path = "/v1/offers",
    tag = "offers",
    params(("url" = String, Query, description = "Offer URL, `<owner>/<model>.<name>`")),
    responses(
        (status = 200, description = "Offer details", body = OfferDetails),
        (status = 404, description = "Offer not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn get_offer_by_url(
    Query(query): Query<OfferUrlQuery>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<OfferDetails>, ApiError> {
    let principal = state.authenticate(&headers).await?;
    // Validate the shape before touching the catalog.
    parse_offer_url(&query.url)?;
    let offer = state
        .catalog
        .application_offer_by_url(&query.url)
        .await
        .map_err(|_| api_not_found("offer not found"))?;
    let access = effective_access(&state, &principal, &offer);
    require_offer_access(access, OfferAccess::Read)?;
    Ok(Json(OfferDetails::build(offer, access)))
}

#[utoipa::path(
    get,
    path = "/v1/offers/{uuid}/consume-details",
    tag = "offers",
    params(("uuid" = String, Path, description = "Offer UUID")),
    responses(
        (status = 200, description = "Connection details for consuming the offer", body = ConsumeDetailsResponse),
        (status = 404, description = "Offer not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn consume_details(
    Path(uuid): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ConsumeDetailsResponse>, ApiError> {
    let principal = state.authenticate(&headers).await?;
    let offer = state
        .catalog
        .application_offer(&uuid)
        .await
        .map_err(|_| api_not_found("offer not found"))?;
    let access = effective_access(&state, &principal, &offer);
    require_offer_access(access, OfferAccess::Consume)?;

    let model_path = EntityPath::new(offer.owner_name.clone(), offer.model_name.clone());
    let model = state.catalog.model(&model_path).await?;
    let ctl = state.catalog.controller(&model.controller).await?;
    Ok(Json(ConsumeDetailsResponse {
        offer: OfferDetails::build(offer, access),
        controller_addresses: ctl.addresses,
        controller_ca_cert: ctl.ca_cert,
    }))
}

async fn offers_with_access(
    state: &AppState,
    principal: &Principal,
    filters: Vec<armada_catalog::OfferFilter>,
    need: OfferAccess,
) -> Result<Vec<OfferDetails>, ApiError> {
    // Filter first on the embedded lists, then re-check with the graph so
    // relation-only grants are not missed.
    let offers = state
        .catalog
        .list_application_offers(&principal.username, OfferAccess::None, &filters)
        .await?;
    Ok(offers
        .into_iter()
        .filter_map(|offer| {
            let access = effective_access(state, principal, &offer);
            (access >= need).then(|| OfferDetails::build(offer, access))
        })
        .collect())
}

#[utoipa::path(
    post,
    path = "/v1/offers/find",
    tag = "offers",
    request_body = FindOffersRequest,
    responses(
        (status = 200, description = "Offers readable by the caller", body = OffersResponse)
    )
)]
pub(crate) async fn find_offers(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<FindOffersRequest>,
) -> Result<Json<OffersResponse>, ApiError> {
    let principal = state.authenticate(&headers).await?;
    let offers = offers_with_access(
        &state,
        &principal,
        to_offer_filters(body.filters),
        OfferAccess::Read,
    )
    .await?;
    Ok(Json(OffersResponse { offers }))
}

#[utoipa::path(
    post,
    path = "/v1/offers/list",
    tag = "offers",
    request_body = FindOffersRequest,
    responses(
        (status = 200, description = "Offers administered by the caller", body = OffersResponse)
    )
)]
pub(crate) async fn list_offers(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<FindOffersRequest>,
) -> Result<Json<OffersResponse>, ApiError> {
    let principal = state.authenticate(&headers).await?;
    let offers = offers_with_access(
        &state,
        &principal,
        to_offer_filters(body.filters),
        OfferAccess::Admin,
    )
    .await?;
    Ok(Json(OffersResponse { offers }))
}

#[utoipa::path(
    post,
    path = "/v1/offers/{uuid}/grant",
    tag = "offers",
    request_body = GrantOfferAccessRequest,
    params(("uuid" = String, Path, description = "Offer UUID")),
    responses(
        (status = 204, description = "Access granted"),
        (status = 400, description = "Unknown access level", body = crate::api::types::ErrorResponse),
        (status = 404, description = "Offer not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn grant_offer_access(
    Path(uuid): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<GrantOfferAccessRequest>,
) -> Result<StatusCode, ApiError> {
    let principal = state.authenticate(&headers).await?;
    let offer = state
        .catalog
        .application_offer(&uuid)
        .await
        .map_err(|_| api_not_found("offer not found"))?;
    require_offer_access(
        effective_access(&state, &principal, &offer),
        OfferAccess::Admin,
    )?;

    let access = OfferAccess::from_str(&body.access)?;
    if access == OfferAccess::None {
        return Err(api_bad_request("cannot grant \"none\" access"));
    }
    state
        .catalog
        .set_application_offer_access(&body.user, &uuid, access)
        .await?;
    sync_offer_relations(&state, &body.user, &uuid, access)?;
    state
        .audit(
            &principal,
            "GrantOfferAccess",
            &offer.url,
            true,
            &format!("{} -> {}", body.user, access),
        )
        .await;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/v1/offers/{uuid}/revoke",
    tag = "offers",
    request_body = GrantOfferAccessRequest,
    params(("uuid" = String, Path, description = "Offer UUID")),
    responses(
        (status = 204, description = "Access revoked"),
        (status = 404, description = "Offer not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn revoke_offer_access(
    Path(uuid): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<GrantOfferAccessRequest>,
) -> Result<StatusCode, ApiError> {
    let principal = state.authenticate(&headers).await?;
    let offer = state
        .catalog
        .application_offer(&uuid)
        .await
        .map_err(|_| api_not_found("offer not found"))?;
    require_offer_access(
        effective_access(&state, &principal, &offer),
        OfferAccess::Admin,
    )?;

    // Revoking a level leaves the user one step below it.
    let new_access = match OfferAccess::from_str(&body.access)? {
        OfferAccess::Admin => OfferAccess::Consume,
        OfferAccess::Consume => OfferAccess::Read,
        OfferAccess::Read | OfferAccess::None => OfferAccess::None,
    };
    state
        .catalog
        .set_application_offer_access(&body.user, &uuid, new_access)
        .await?;
    sync_offer_relations(&state, &body.user, &uuid, new_access)?;
    state
        .audit(
            &principal,
            "RevokeOfferAccess",
            &offer.url,
            true,
            &format!("{} -> {}", body.user, new_access),
        )
        .await;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/v1/offers/{uuid}",
    tag = "offers",
    params(("uuid" = String, Path, description = "Offer UUID")),
    responses(
        (status = 204, description = "Offer destroyed"),
        (status = 404, description = "Offer not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn destroy_offer(
    Path(uuid): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let principal = state.authenticate(&headers).await?;
    let offer = state
        .catalog
        .application_offer(&uuid)
        .await
        .map_err(|_| api_not_found("offer not found"))?;
    require_offer_access(
        effective_access(&state, &principal, &offer),
        OfferAccess::Admin,
    )?;

    // Tear down on the owning backend first; if the model is already gone
    // the catalog record is all that is left to clean.
    let model_path = EntityPath::new(offer.owner_name.clone(), offer.model_name.clone());
    if let Ok(model) = state.catalog.model(&model_path).await {
        let ctl = state.catalog.controller(&model.controller).await?;
        let session = state.session_for(&ctl).await?;
        session
            .destroy_application_offer(&offer.url)
            .await
            .map_err(map_backend_error)?;
    }
    state.catalog.remove_application_offer(&uuid).await?;
    state.relations.remove_all_for(&Tag::offer(&uuid));
    state
        .audit(&principal, "DestroyOffer", &offer.url, true, "")
        .await;
    Ok(StatusCode::NO_CONTENT)
}
