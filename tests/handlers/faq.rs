//! GET /qa FAQ lookup.

#[path = "../common/mod.rs"]
mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use common::*;

fn qa(query: &str) -> Request<Body> {
    Request::builder()
        .uri(format!("/qa?{}", query))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_match_ignores_accents() {
    let response = app(create_test_app_state())
        .oneshot(qa("q=como%20recibo%20el%20libro"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["found"], true);
    assert_eq!(json["q"], "¿Cómo recibo el libro?");
    assert_eq!(json["a"], "Llega a tu email apenas se aprueba el pago.");
    assert!(json["score"].as_f64().unwrap() > 0.9);
}

#[tokio::test]
async fn test_no_match() {
    let response = app(create_test_app_state())
        .oneshot(qa("q=horarios%20de%20atencion%20al%20cliente"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!({"found": false}));
}

#[tokio::test]
async fn test_blank_query_rejected() {
    for query in ["", "q=", "q=%20%20"] {
        let response = app(create_test_app_state()).oneshot(qa(query)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "query: {:?}", query);
    }
}
