//! Control-plane HTTP application wiring.
//!
//! # Purpose
//! Builds the Axum router, configures middleware, and defines the shared
//! application state injected into handlers.
//!
//! # Notes
//! Everything handlers need (catalog, relationship graph, dialer,
//! authenticator, secret store) arrives through [`AppState`] so tests can
//! assemble independent engines; there is no process-global state here.

use std::sync::Arc;

use armada_authz::{Checker, RelationStore};
use armada_backend::Dialer;
use armada_catalog::store::Catalog;
use axum::Router;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::api;
use crate::api::openapi::ApiDoc;
use crate::auth::Authenticator;
use crate::secrets::SecretStore;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn Catalog>,
    pub relations: Arc<RelationStore>,
    pub checker: Checker,
    pub dialer: Arc<dyn Dialer>,
    pub authenticator: Arc<dyn Authenticator>,
    pub secrets: Arc<dyn SecretStore>,
}

impl AppState {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        relations: Arc<RelationStore>,
        dialer: Arc<dyn Dialer>,
        authenticator: Arc<dyn Authenticator>,
        secrets: Arc<dyn SecretStore>,
    ) -> Self {
        let checker = Checker::new(Arc::clone(&relations));
        Self {
            catalog,
            relations,
            checker,
            dialer,
            authenticator,
            secrets,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version()
            )
        });

    Router::new()
        .route(
            "/v1/system/info",
            axum::routing::get(api::system::system_info),
        )
        .route(
            "/v1/system/health",
            axum::routing::get(api::system::system_health),
        )
        .route(
            "/v1/controllers",
            axum::routing::get(api::controllers::list_controllers)
                .post(api::controllers::add_controller),
        )
        .route(
            "/v1/controllers/:user/:name",
            axum::routing::get(api::controllers::controller_info)
                .delete(api::controllers::remove_controller),
        )
        .route(
            "/v1/controllers/:user/:name/deprecated",
            axum::routing::post(api::controllers::set_controller_deprecated),
        )
        .route(
            "/v1/locations",
            axum::routing::get(api::controllers::locations),
        )
        .route(
            "/v1/credentials/import",
            axum::routing::post(api::credentials::import_cloud_credentials),
        )
        .route(
            "/v1/credentials/:user/:cloud/:name",
            axum::routing::get(api::credentials::get_credential)
                .put(api::credentials::update_credential),
        )
        .route(
            "/v1/credentials/:user/:cloud/:name/grant",
            axum::routing::post(api::credentials::grant_credential_access),
        )
        .route(
            "/v1/credentials/:user/:cloud/:name/revoke",
            axum::routing::post(api::credentials::revoke_credential_access),
        )
        .route(
            "/v1/models",
            axum::routing::post(api::models::add_model),
        )
        .route(
            "/v1/models/import",
            axum::routing::post(api::models::import_model),
        )
        .route(
            "/v1/models/:uuid",
            axum::routing::delete(api::models::destroy_model),
        )
        .route(
            "/v1/models/:uuid/status",
            axum::routing::get(api::models::model_status),
        )
        .route(
            "/v1/models/:user/:name/migrate",
            axum::routing::post(api::models::update_migrated_model),
        )
        .route(
            "/v1/offers",
            axum::routing::get(api::offers::get_offer_by_url).post(api::offers::create_offer),
        )
        .route(
            "/v1/offers/find",
            axum::routing::post(api::offers::find_offers),
        )
        .route(
            "/v1/offers/list",
            axum::routing::post(api::offers::list_offers),
        )
        .route(
            "/v1/offers/:uuid",
            axum::routing::get(api::offers::get_offer).delete(api::offers::destroy_offer),
        )
        .route(
            "/v1/offers/:uuid/consume-details",
            axum::routing::get(api::offers::consume_details),
        )
        .route(
            "/v1/offers/:uuid/grant",
            axum::routing::post(api::offers::grant_offer_access),
        )
        .route(
            "/v1/offers/:uuid/revoke",
            axum::routing::post(api::offers::revoke_offer_access),
        )
        .route(
            "/v1/relations",
            axum::routing::post(api::relations::add_relations)
                .delete(api::relations::remove_relations),
        )
        .route(
            "/v1/relations/check",
            axum::routing::post(api::relations::check_relation),
        )
        .route(
            "/v1/relations/list",
            axum::routing::post(api::relations::list_relations),
        )
        .route(
            "/v1/relations/objects",
            axum::routing::post(api::relations::list_objects),
        )
        .route(
            "/v1/relations/users",
            axum::routing::post(api::relations::list_users_with_access),
        )
        .route(
            "/v1/audit-events",
            axum::routing::get(api::audit::list_audit_events),
        )
        .route(
            "/v1/audit-access/grant",
            axum::routing::post(api::audit::grant_audit_log_access),
        )
        .route(
            "/v1/audit-access/revoke",
            axum::routing::post(api::audit::revoke_audit_log_access),
        )
        .route(
            "/v1/openapi.json",
            axum::routing::get(|| async { axum::Json(ApiDoc::openapi()) }),
        )
        .layer(trace_layer)
        .with_state(state)
}
