mod common;

use axum::http::{Method, StatusCode};

#[tokio::test]
async fn health_check_returns_ok() {
    let state = common::test_state().await;

    let (status, body) = common::send(&state, Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Health check");
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["database"], "up");
}

#[tokio::test]
async fn unknown_route_is_json_404() {
    let state = common::test_state().await;

    let (status, body) = common::send(&state, Method::GET, "/api/nope", None, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["data"]["error"], "Not Found");
}
