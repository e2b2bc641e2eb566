//! Audit-log API handlers.

use std::collections::HashMap;

use armada_authz::{Relation, Tag, Tuple};
use armada_catalog::{AuditFilter, Catalog};
use axum::Json;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use chrono::DateTime;

use crate::api::CONTROL_PLANE_NAME;
use crate::api::controllers::require_controller_admin;
use crate::api::error::{ApiError, api_bad_request, api_unauthorized};
use crate::api::types::{AuditEventView, AuditEventsResponse, UserRequest};
use crate::app::AppState;

fn control_plane_tag() -> Tag {
    Tag::controller(CONTROL_PLANE_NAME)
}

#[utoipa::path(
    get,
    path = "/v1/audit-events",
    tag = "audit",
    params(
        ("after" = Option<String>, Query, description = "RFC 3339 lower bound"),
        ("before" = Option<String>, Query, description = "RFC 3339 upper bound"),
        ("limit" = Option<usize>, Query, description = "Maximum events returned")
    ),
    responses(
        (status = 200, description = "Audit events", body = AuditEventsResponse),
        (status = 401, description = "Missing audit-log access", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn list_audit_events(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<AuditEventsResponse>, ApiError> {
    let principal = state.authenticate(&headers).await?;
    let allowed = principal.is_controller_admin(&state.checker)
        || principal.holds(&state.checker, Relation::AuditLogViewer, &control_plane_tag());
    if !allowed {
        return Err(api_unauthorized("audit log access denied"));
    }

    let mut filter = AuditFilter::default();
    for (key, value) in params {
        match key.as_str() {
            "after" => {
                let t = DateTime::parse_from_rfc3339(&value)
                    .map_err(|_| api_bad_request("after is not an RFC 3339 time"))?;
                filter.after = Some(t.to_utc());
            }
            "before" => {
                let t = DateTime::parse_from_rfc3339(&value)
                    .map_err(|_| api_bad_request("before is not an RFC 3339 time"))?;
                filter.before = Some(t.to_utc());
            }
            "limit" => {
                let n = value
                    .parse::<usize>()
                    .map_err(|_| api_bad_request("limit is not a number"))?;
                filter.limit = Some(n);
            }
            other => return Err(api_bad_request(&format!("unknown audit filter {other:?}"))),
        }
    }

    let events = state
        .catalog
        .audit_events(&filter)
        .await?
        .into_iter()
        .map(|e| AuditEventView {
            time: e.time,
            actor: e.actor,
            action: e.action,
            subject: e.subject,
            success: e.success,
            message: e.message,
        })
        .collect();
    Ok(Json(AuditEventsResponse { events }))
}

#[utoipa::path(
    post,
    path = "/v1/audit-access/grant",
    tag = "audit",
    request_body = UserRequest,
    responses((status = 204, description = "Audit access granted"))
)]
pub(crate) async fn grant_audit_log_access(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<UserRequest>,
) -> Result<StatusCode, ApiError> {
    let principal = state.authenticate(&headers).await?;
    require_controller_admin(&state, &principal)?;
    state.relations.add_relations(&[Tuple::new(
        Tag::user(&body.user),
        Relation::AuditLogViewer,
        control_plane_tag(),
    )])?;
    state
        .audit(&principal, "GrantAuditLogAccess", &body.user, true, "")
        .await;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/v1/audit-access/revoke",
    tag = "audit",
    request_body = UserRequest,
    responses((status = 204, description = "Audit access revoked"))
)]
pub(crate) async fn revoke_audit_log_access(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<UserRequest>,
) -> Result<StatusCode, ApiError> {
    let principal = state.authenticate(&headers).await?;
    require_controller_admin(&state, &principal)?;
    state.relations.remove_relations(&[Tuple::new(
        Tag::user(&body.user),
        Relation::AuditLogViewer,
        control_plane_tag(),
    )])?;
    state
        .audit(&principal, "RevokeAuditLogAccess", &body.user, true, "")
        .await;
    Ok(StatusCode::NO_CONTENT)
}
