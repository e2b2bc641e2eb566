//! System and discovery endpoints.

use armada_catalog::Catalog;
use axum::Json;
use axum::extract::State;

use crate::api::error::ApiError;
use crate::api::types::{HealthResponse, SystemInfo};
use crate::app::AppState;

#[utoipa::path(
    get,
    path = "/v1/system/info",
    tag = "system",
    responses((status = 200, description = "Service identity", body = SystemInfo))
)]
pub(crate) async fn system_info() -> Json<SystemInfo> {
    Json(SystemInfo {
        name: "armada-controlplane".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/v1/system/health",
    tag = "system",
    responses((status = 200, description = "Service health", body = HealthResponse))
)]
pub(crate) async fn system_health(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, ApiError> {
    // A catalog read doubles as the readiness probe.
    state.catalog.controllers().await?;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
    }))
}
