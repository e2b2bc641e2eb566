//! Relationship-graph API tests.

mod common;

use axum::http::StatusCode;
use common::{auth_json_request, read_json, test_plane};
use tower::ServiceExt;

fn tuple(subject: &str, relation: &str, target: &str) -> serde_json::Value {
    serde_json::json!({"subject": subject, "relation": relation, "target": target})
}

#[tokio::test]
async fn relation_administration_is_admin_only() {
    let plane = test_plane();
    let body = serde_json::json!({"tuples": [tuple("user:bob", "reader", "model:m-1")]});

    let response = plane
        .router
        .clone()
        .oneshot(auth_json_request(
            "POST",
            "/v1/relations",
            "bob-token",
            body.clone(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = plane
        .router
        .clone()
        .oneshot(auth_json_request(
            "POST",
            "/v1/relations",
            "alice-token",
            body,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn check_expands_groups_and_traces() {
    let plane = test_plane();
    let body = serde_json::json!({"tuples": [
        tuple("user:bob", "member", "group:core"),
        tuple("group:core#member", "member", "group:eng"),
        tuple("group:eng#member", "writer", "model:m-1"),
    ]});
    let response = plane
        .router
        .clone()
        .oneshot(auth_json_request(
            "POST",
            "/v1/relations",
            "alice-token",
            body,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = plane
        .router
        .clone()
        .oneshot(auth_json_request(
            "POST",
            "/v1/relations/check",
            "alice-token",
            serde_json::json!({
                "tuple": tuple("user:bob", "reader", "model:m-1"),
                "trace": true,
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["allowed"], true);
    assert!(!body["trace"].as_array().unwrap().is_empty());

    // Writer does not imply administrator.
    let response = plane
        .router
        .clone()
        .oneshot(auth_json_request(
            "POST",
            "/v1/relations/check",
            "alice-token",
            serde_json::json!({
                "tuple": tuple("user:bob", "administrator", "model:m-1"),
            }),
        ))
        .await
        .unwrap();
    let body = read_json(response).await;
    assert_eq!(body["allowed"], false);
}

#[tokio::test]
async fn malformed_tuples_are_client_errors() {
    let plane = test_plane();
    for bad in [
        tuple("droid:r2d2", "reader", "model:m-1"),
        tuple("user:bob", "reads", "model:m-1"),
        tuple("user:bob", "member", "model:m-1"),
    ] {
        let response = plane
            .router
            .clone()
            .oneshot(auth_json_request(
                "POST",
                "/v1/relations",
                "alice-token",
                serde_json::json!({"tuples": [bad]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn list_relations_paginates() {
    let plane = test_plane();
    let tuples: Vec<_> = (0..5)
        .map(|i| tuple(&format!("user:u{i}"), "reader", "model:m-1"))
        .collect();
    let response = plane
        .router
        .clone()
        .oneshot(auth_json_request(
            "POST",
            "/v1/relations",
            "alice-token",
            serde_json::json!({"tuples": tuples}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let mut seen = 0;
    let mut cursor: Option<String> = None;
    loop {
        let response = plane
            .router
            .clone()
            .oneshot(auth_json_request(
                "POST",
                "/v1/relations/list",
                "alice-token",
                serde_json::json!({
                    "target": "model:m-1",
                    "page_size": 2,
                    "cursor": cursor,
                }),
            ))
            .await
            .unwrap();
        let body = read_json(response).await;
        seen += body["tuples"].as_array().unwrap().len();
        match body["next_cursor"].as_str() {
            Some(next) => cursor = Some(next.to_string()),
            None => break,
        }
    }
    assert_eq!(seen, 5);
}

#[tokio::test]
async fn list_objects_and_users() {
    let plane = test_plane();
    let body = serde_json::json!({"tuples": [
        tuple("user:bob", "reader", "model:m-1"),
        tuple("user:bob", "reader", "model:m-2"),
        tuple("user:charlie", "administrator", "model:m-1"),
    ]});
    plane
        .router
        .clone()
        .oneshot(auth_json_request(
            "POST",
            "/v1/relations",
            "alice-token",
            body,
        ))
        .await
        .unwrap();

    let response = plane
        .router
        .clone()
        .oneshot(auth_json_request(
            "POST",
            "/v1/relations/objects",
            "alice-token",
            serde_json::json!({
                "subject": "user:bob",
                "relation": "reader",
                "kind": "model",
            }),
        ))
        .await
        .unwrap();
    let body = read_json(response).await;
    assert_eq!(
        body["objects"],
        serde_json::json!(["model:m-1", "model:m-2"])
    );

    let response = plane
        .router
        .clone()
        .oneshot(auth_json_request(
            "POST",
            "/v1/relations/users",
            "alice-token",
            serde_json::json!({
                "target": "model:m-1",
                "relation": "reader",
            }),
        ))
        .await
        .unwrap();
    let body = read_json(response).await;
    assert_eq!(
        body["users"],
        serde_json::json!(["user:bob", "user:charlie"])
    );
}

#[tokio::test]
async fn remove_relations_is_idempotent() {
    let plane = test_plane();
    let t = tuple("user:bob", "reader", "model:m-1");
    plane
        .router
        .clone()
        .oneshot(auth_json_request(
            "POST",
            "/v1/relations",
            "alice-token",
            serde_json::json!({"tuples": [t.clone()]}),
        ))
        .await
        .unwrap();

    for _ in 0..2 {
        let response = plane
            .router
            .clone()
            .oneshot(auth_json_request(
                "DELETE",
                "/v1/relations",
                "alice-token",
                serde_json::json!({"tuples": [t.clone()]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    let response = plane
        .router
        .clone()
        .oneshot(auth_json_request(
            "POST",
            "/v1/relations/check",
            "alice-token",
            serde_json::json!({"tuple": t}),
        ))
        .await
        .unwrap();
    let body = read_json(response).await;
    assert_eq!(body["allowed"], false);
}
