//! Application-offer API tests.

mod common;

use armada_catalog::{Catalog, Life, Model};
use axum::http::StatusCode;
use common::{TestPlane, auth_json_request, auth_request, read_json, test_plane};
use tower::ServiceExt;

/// A plane with a controller, a model owned by bob, and an offer bob
/// administers. Returns the offer UUID.
async fn plane_with_offer() -> (TestPlane, String) {
    let plane = test_plane();
    common::enroll_controller(&plane, "bob/c1", "dummy", "dummy-region").await;
    plane
        .catalog
        .insert_model(Model {
            path: "bob/prod".parse().unwrap(),
            uuid: "model-1".to_string(),
            controller: "bob/c1".parse().unwrap(),
            credential: "bob/dummy/default".parse().unwrap(),
            cloud: "dummy".to_string(),
            region: "dummy-region".to_string(),
            life: Life::Alive,
            ..Default::default()
        })
        .await
        .unwrap();
    plane
        .relations
        .add_relations(&[armada_authz::Tuple::new(
            armada_authz::Tag::user("bob"),
            armada_authz::Relation::Administrator,
            armada_authz::Tag::model("model-1"),
        )])
        .unwrap();

    let response = plane
        .router
        .clone()
        .oneshot(auth_json_request(
            "POST",
            "/v1/offers",
            "bob-token",
            serde_json::json!({
                "model": "bob/prod",
                "application": "db-app",
                "offer_name": "db",
                "description": "a database",
                "endpoints": ["db"],
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    assert_eq!(body["url"], "bob/prod.db");
    assert_eq!(body["access"], "admin");
    let uuid = body["uuid"].as_str().unwrap().to_string();
    (plane, uuid)
}

async fn offer_access(plane: &TestPlane, user: &str, uuid: &str) -> String {
    plane
        .catalog
        .application_offer_access(user, uuid)
        .await
        .unwrap()
        .as_str()
        .to_string()
}

#[tokio::test]
async fn offer_creation_requires_model_admin() {
    let (plane, _uuid) = plane_with_offer().await;
    // charlie holds nothing on the model.
    let response = plane
        .router
        .clone()
        .oneshot(auth_json_request(
            "POST",
            "/v1/offers",
            "charlie-token",
            serde_json::json!({
                "model": "bob/prod",
                "application": "db-app",
                "offer_name": "db2",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_grant_and_downgrade_revoke() {
    let (plane, uuid) = plane_with_offer().await;

    // Grant admin to test-user.
    let response = plane
        .router
        .clone()
        .oneshot(auth_json_request(
            "POST",
            &format!("/v1/offers/{uuid}/grant"),
            "bob-token",
            serde_json::json!({"user": "test-user", "access": "admin"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(offer_access(&plane, "test-user", &uuid).await, "admin");

    // Revoking consume drops the user to read.
    let response = plane
        .router
        .clone()
        .oneshot(auth_json_request(
            "POST",
            &format!("/v1/offers/{uuid}/revoke"),
            "bob-token",
            serde_json::json!({"user": "test-user", "access": "consume"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(offer_access(&plane, "test-user", &uuid).await, "read");

    // Unknown access level is a client error.
    let response = plane
        .router
        .clone()
        .oneshot(auth_json_request(
            "POST",
            &format!("/v1/offers/{uuid}/grant"),
            "bob-token",
            serde_json::json!({"user": "test-user", "access": "superpowers"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn non_admin_grants_are_refused_without_leaking_existence() {
    let (plane, uuid) = plane_with_offer().await;
    plane
        .catalog
        .set_application_offer_access("charlie", &uuid, armada_catalog::OfferAccess::Consume)
        .await
        .unwrap();

    // charlie can consume but not administer: Unauthorized.
    let response = plane
        .router
        .clone()
        .oneshot(auth_json_request(
            "POST",
            &format!("/v1/offers/{uuid}/grant"),
            "charlie-token",
            serde_json::json!({"user": "test-user", "access": "read"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // mallory has no relation at all: the offer does not exist for them.
    let response = plane
        .router
        .clone()
        .oneshot(auth_json_request(
            "POST",
            &format!("/v1/offers/{uuid}/grant"),
            "mallory-token",
            serde_json::json!({"user": "test-user", "access": "read"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = plane
        .router
        .clone()
        .oneshot(auth_request(
            "GET",
            &format!("/v1/offers/{uuid}"),
            "mallory-token",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn offer_visibility_follows_everyone_grant() {
    let (plane, uuid) = plane_with_offer().await;

    // mallory sees nothing.
    let response = plane
        .router
        .clone()
        .oneshot(auth_json_request(
            "POST",
            "/v1/offers/find",
            "mallory-token",
            serde_json::json!({"filters": []}),
        ))
        .await
        .unwrap();
    let body = read_json(response).await;
    assert!(body["offers"].as_array().unwrap().is_empty());

    // everyone:read opens the offer to all authenticated principals.
    plane
        .catalog
        .set_application_offer_access(
            armada_catalog::EVERYONE,
            &uuid,
            armada_catalog::OfferAccess::Read,
        )
        .await
        .unwrap();
    let response = plane
        .router
        .clone()
        .oneshot(auth_json_request(
            "POST",
            "/v1/offers/find",
            "mallory-token",
            serde_json::json!({"filters": []}),
        ))
        .await
        .unwrap();
    let body = read_json(response).await;
    let offers = body["offers"].as_array().unwrap();
    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0]["url"], "bob/prod.db");
    // Readers do not see the access list.
    assert!(offers[0]["users"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn find_filters_by_offer_name_substring() {
    let (plane, _uuid) = plane_with_offer().await;
    let response = plane
        .router
        .clone()
        .oneshot(auth_json_request(
            "POST",
            "/v1/offers/find",
            "bob-token",
            serde_json::json!({"filters": [{"offer_name": "d"}]}),
        ))
        .await
        .unwrap();
    let body = read_json(response).await;
    assert_eq!(body["offers"].as_array().unwrap().len(), 1);

    let response = plane
        .router
        .clone()
        .oneshot(auth_json_request(
            "POST",
            "/v1/offers/find",
            "bob-token",
            serde_json::json!({"filters": [{"offer_name": "nomatch"}]}),
        ))
        .await
        .unwrap();
    let body = read_json(response).await;
    assert!(body["offers"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn offer_lookup_by_url_and_consume_details() {
    let (plane, uuid) = plane_with_offer().await;
    plane
        .catalog
        .set_application_offer_access("charlie", &uuid, armada_catalog::OfferAccess::Consume)
        .await
        .unwrap();

    let response = plane
        .router
        .clone()
        .oneshot(auth_request(
            "GET",
            "/v1/offers?url=bob/prod.db",
            "charlie-token",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["uuid"].as_str().unwrap(), uuid);

    let response = plane
        .router
        .clone()
        .oneshot(auth_request(
            "GET",
            &format!("/v1/offers/{uuid}/consume-details"),
            "charlie-token",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(
        body["controller_addresses"],
        serde_json::json!(["127.0.0.1:17070"])
    );

    // Readers cannot fetch consume details.
    plane
        .catalog
        .set_application_offer_access("test-user", &uuid, armada_catalog::OfferAccess::Read)
        .await
        .unwrap();
    let response = plane
        .router
        .clone()
        .oneshot(auth_request(
            "GET",
            &format!("/v1/offers/{uuid}/consume-details"),
            "test-user-token",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn destroy_offer_removes_record_and_backend_share() {
    let (plane, uuid) = plane_with_offer().await;

    let response = plane
        .router
        .clone()
        .oneshot(auth_request(
            "DELETE",
            &format!("/v1/offers/{uuid}"),
            "bob-token",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(plane.catalog.application_offer(&uuid).await.is_err());

    let response = plane
        .router
        .clone()
        .oneshot(auth_request(
            "GET",
            &format!("/v1/offers/{uuid}"),
            "bob-token",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
