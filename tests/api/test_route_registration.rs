// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Route registration and method handling

use agrovision_node::api::{build_router, AppState};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

fn empty_state() -> AppState {
    AppState {
        soil: None,
        vegetation: None,
    }
}

async fn status_of(method: &str, uri: &str) -> StatusCode {
    let app = build_router(empty_state());
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap().status()
}

#[tokio::test]
async fn test_root_is_registered() {
    assert_eq!(status_of("GET", "/").await, StatusCode::OK);
}

#[tokio::test]
async fn test_health_is_registered() {
    assert_eq!(status_of("GET", "/health").await, StatusCode::OK);
}

#[tokio::test]
async fn test_detect_routes_are_post_only() {
    assert_eq!(
        status_of("GET", "/detect/soil").await,
        StatusCode::METHOD_NOT_ALLOWED
    );
    assert_eq!(
        status_of("GET", "/detect/vegetation").await,
        StatusCode::METHOD_NOT_ALLOWED
    );
    assert_eq!(
        status_of("GET", "/detect/combined").await,
        StatusCode::METHOD_NOT_ALLOWED
    );
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    assert_eq!(status_of("GET", "/detect/unknown").await, StatusCode::NOT_FOUND);
    assert_eq!(status_of("POST", "/nope").await, StatusCode::NOT_FOUND);
}
