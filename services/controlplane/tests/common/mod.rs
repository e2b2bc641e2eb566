#![allow(dead_code)]

use std::sync::Arc;

use armada_authz::RelationStore;
use armada_backend::Dialer;
use armada_backend::dialer::DirectDialer;
use armada_backend::inprocess::InProcessBackend;
use armada_catalog::{Catalog, Controller, EntityPath, MemoryCatalog};
use axum::Router;
use axum::body::Body;
use axum::http::Request;
use controlplane::app::{AppState, build_router};
use controlplane::auth::{CONTROLLER_ADMIN_GROUP, Principal, StaticTokenAuthenticator};
use controlplane::secrets::MemorySecretStore;

/// A whole in-process control plane wired to fake backends.
pub struct TestPlane {
    pub router: Router,
    pub state: AppState,
    pub catalog: Arc<MemoryCatalog>,
    pub relations: Arc<RelationStore>,
    pub dialer: Arc<DirectDialer>,
}

/// Known tokens: `alice` is a fleet admin; everyone else is a plain user.
pub const USERS: &[(&str, &str)] = &[
    ("alice-token", "alice"),
    ("bob-token", "bob"),
    ("charlie-token", "charlie"),
    ("test-user-token", "test-user"),
    ("mallory-token", "mallory"),
];

pub fn test_plane() -> TestPlane {
    let catalog = Arc::new(MemoryCatalog::new());
    let relations = Arc::new(RelationStore::new());
    let dialer = Arc::new(DirectDialer::new());

    let mut authenticator = StaticTokenAuthenticator::new();
    for (token, user) in USERS {
        let groups = if *user == "alice" {
            vec![CONTROLLER_ADMIN_GROUP.to_string()]
        } else {
            Vec::new()
        };
        authenticator = authenticator.with_token(*token, Principal::new(*user, groups));
    }

    let state = AppState::new(
        Arc::clone(&catalog) as Arc<dyn Catalog>,
        Arc::clone(&relations),
        Arc::clone(&dialer) as Arc<dyn Dialer>,
        Arc::new(authenticator),
        Arc::new(MemorySecretStore::new()),
    );
    TestPlane {
        router: build_router(state.clone()),
        state,
        catalog,
        relations,
        dialer,
    }
}

/// Enroll a controller through the API and back it with an in-process
/// backend.
pub async fn enroll_controller(plane: &TestPlane, path: &str, cloud: &str, region: &str) -> InProcessBackend {
    use tower::ServiceExt;
    let backend = InProcessBackend::new();
    let entity: EntityPath = path.parse().expect("path");
    plane.dialer.register(entity, backend.handle());

    let request = auth_json_request(
        "POST",
        "/v1/controllers",
        "alice-token",
        serde_json::json!({
            "path": path,
            "uuid": format!("uuid-{path}"),
            "addresses": ["127.0.0.1:17070"],
            "ca_cert": "",
            "admin_user": "admin",
            "admin_password": "hunter2",
            "cloud": cloud,
            "region": region,
            "provider_type": "dummy",
        }),
    );
    let response = plane
        .router
        .clone()
        .oneshot(request)
        .await
        .expect("add controller");
    assert_eq!(
        response.status(),
        axum::http::StatusCode::CREATED,
        "enroll {path}"
    );
    backend
}

pub async fn seeded_controller(plane: &TestPlane, path: &str) -> Controller {
    plane
        .catalog
        .controller(&path.parse().expect("path"))
        .await
        .expect("controller")
}

pub fn auth_request(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .expect("request")
}

pub fn auth_json_request(
    method: &str,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}
