//! Relationship-graph API handlers.
//!
//! # Purpose
//! Direct administration of the authorization graph: tuple writes, checks
//! with optional tracing, and the listing operations. All of it is
//! fleet-admin territory.

use armada_authz::{Kind, Relation, Tag, Tuple};
use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};

use crate::api::controllers::require_controller_admin;
use crate::api::error::ApiError;
use crate::api::types::{
    CheckRelationRequest, CheckRelationResponse, ListObjectsRequest, ListObjectsResponse,
    ListRelationsRequest, ListRelationsResponse, ListUsersRequest, ListUsersResponse,
    RelationsRequest, TupleView,
};
use crate::app::AppState;

fn parse_tuple(view: &TupleView) -> Result<Tuple, ApiError> {
    Ok(Tuple::new(
        view.subject.parse::<Tag>()?,
        view.relation.parse::<Relation>()?,
        view.target.parse::<Tag>()?,
    ))
}

fn tuple_view(tuple: &Tuple) -> TupleView {
    TupleView {
        subject: tuple.subject.to_string(),
        relation: tuple.relation.to_string(),
        target: tuple.target.to_string(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/relations",
    tag = "relations",
    request_body = RelationsRequest,
    responses(
        (status = 204, description = "Tuples added"),
        (status = 400, description = "Invalid tuple", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn add_relations(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RelationsRequest>,
) -> Result<StatusCode, ApiError> {
    let principal = state.authenticate(&headers).await?;
    require_controller_admin(&state, &principal)?;
    let tuples = body
        .tuples
        .iter()
        .map(parse_tuple)
        .collect::<Result<Vec<_>, _>>()?;
    state.relations.add_relations(&tuples)?;
    state
        .audit(
            &principal,
            "AddRelations",
            &format!("{} tuples", tuples.len()),
            true,
            "",
        )
        .await;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/v1/relations",
    tag = "relations",
    request_body = RelationsRequest,
    responses(
        (status = 204, description = "Tuples removed"),
        (status = 400, description = "Invalid tuple", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn remove_relations(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RelationsRequest>,
) -> Result<StatusCode, ApiError> {
    let principal = state.authenticate(&headers).await?;
    require_controller_admin(&state, &principal)?;
    let tuples = body
        .tuples
        .iter()
        .map(parse_tuple)
        .collect::<Result<Vec<_>, _>>()?;
    state.relations.remove_relations(&tuples)?;
    state
        .audit(
            &principal,
            "RemoveRelations",
            &format!("{} tuples", tuples.len()),
            true,
            "",
        )
        .await;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/v1/relations/check",
    tag = "relations",
    request_body = CheckRelationRequest,
    responses(
        (status = 200, description = "Check outcome", body = CheckRelationResponse)
    )
)]
pub(crate) async fn check_relation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CheckRelationRequest>,
) -> Result<Json<CheckRelationResponse>, ApiError> {
    let principal = state.authenticate(&headers).await?;
    require_controller_admin(&state, &principal)?;
    let tuple = parse_tuple(&body.tuple)?;
    let result = state
        .checker
        .check(&tuple.subject, tuple.relation, &tuple.target, body.trace);
    Ok(Json(CheckRelationResponse {
        allowed: result.allowed,
        trace: result.trace,
    }))
}

#[utoipa::path(
    post,
    path = "/v1/relations/list",
    tag = "relations",
    request_body = ListRelationsRequest,
    responses(
        (status = 200, description = "One page of matching tuples", body = ListRelationsResponse)
    )
)]
pub(crate) async fn list_relations(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ListRelationsRequest>,
) -> Result<Json<ListRelationsResponse>, ApiError> {
    let principal = state.authenticate(&headers).await?;
    require_controller_admin(&state, &principal)?;
    let subject = body
        .subject
        .as_deref()
        .map(str::parse::<Tag>)
        .transpose()?;
    let relation = body
        .relation
        .as_deref()
        .map(str::parse::<Relation>)
        .transpose()?;
    let target = body.target.as_deref().map(str::parse::<Tag>).transpose()?;
    let page = state.relations.list_relations(
        subject.as_ref(),
        relation,
        target.as_ref(),
        body.page_size.unwrap_or(50),
        body.cursor.as_deref(),
    )?;
    Ok(Json(ListRelationsResponse {
        tuples: page.tuples.iter().map(tuple_view).collect(),
        next_cursor: page.next_cursor,
    }))
}

#[utoipa::path(
    post,
    path = "/v1/relations/objects",
    tag = "relations",
    request_body = ListObjectsRequest,
    responses(
        (status = 200, description = "Objects the subject holds the relation to", body = ListObjectsResponse)
    )
)]
pub(crate) async fn list_objects(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ListObjectsRequest>,
) -> Result<Json<ListObjectsResponse>, ApiError> {
    let principal = state.authenticate(&headers).await?;
    require_controller_admin(&state, &principal)?;
    let subject: Tag = body.subject.parse()?;
    let relation: Relation = body.relation.parse()?;
    let kind: Kind = body.kind.parse()?;
    let objects = state
        .checker
        .list_objects(&subject, relation, kind)
        .into_iter()
        .map(|tag| tag.to_string())
        .collect();
    Ok(Json(ListObjectsResponse { objects }))
}

#[utoipa::path(
    post,
    path = "/v1/relations/users",
    tag = "relations",
    request_body = ListUsersRequest,
    responses(
        (status = 200, description = "Concrete users holding the relation", body = ListUsersResponse)
    )
)]
pub(crate) async fn list_users_with_access(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ListUsersRequest>,
) -> Result<Json<ListUsersResponse>, ApiError> {
    let principal = state.authenticate(&headers).await?;
    require_controller_admin(&state, &principal)?;
    let target: Tag = body.target.parse()?;
    let relation: Relation = body.relation.parse()?;
    let users = state
        .checker
        .list_users_with_access(&target, relation)
        .into_iter()
        .map(|tag| tag.to_string())
        .collect();
    Ok(Json(ListUsersResponse { users }))
}
