// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Health probe and capability map payloads

use agrovision_node::api::{build_router, AppState};
use agrovision_node::config::SoilServiceConfig;
use agrovision_node::vision::SoilDetectionClient;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;

async fn get_json(state: AppState, uri: &str) -> (StatusCode, serde_json::Value) {
    let app = build_router(state);
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn soil_client() -> Arc<SoilDetectionClient> {
    let config = SoilServiceConfig {
        api_url: "https://detect.example.com".to_string(),
        api_key: Some("test-key".to_string()),
        project: "soil-detection-2uaco".to_string(),
        version: 4,
    };
    Arc::new(SoilDetectionClient::new(&config).unwrap())
}

#[tokio::test]
async fn test_health_reports_unloaded_models() {
    let state = AppState {
        soil: None,
        vegetation: None,
    };
    let (status, body) = get_json(state, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["models"]["soil_detection"], "not loaded");
    assert_eq!(body["models"]["vegetation_detection"], "not loaded");
}

#[tokio::test]
async fn test_health_reports_loaded_soil_model() {
    let state = AppState {
        soil: Some(soil_client()),
        vegetation: None,
    };
    let (status, body) = get_json(state, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["models"]["soil_detection"], "loaded");
    assert_eq!(body["models"]["vegetation_detection"], "not loaded");
}

#[tokio::test]
async fn test_health_carries_timestamp() {
    let state = AppState {
        soil: None,
        vegetation: None,
    };
    let (_, body) = get_json(state, "/health").await;
    let timestamp = body["timestamp"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
}

#[tokio::test]
async fn test_root_capability_map() {
    let state = AppState {
        soil: None,
        vegetation: None,
    };
    let (status, body) = get_json(state, "/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Soil & Vegetation Detection API");
    let endpoints = body["endpoints"].as_object().unwrap();
    assert_eq!(endpoints.len(), 4);
    assert!(endpoints["/detect/combined"]
        .as_str()
        .unwrap()
        .starts_with("POST"));
}
