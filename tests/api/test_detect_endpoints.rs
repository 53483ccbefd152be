// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection endpoint gating and pipeline error mapping
//!
//! These tests never reach a real model: they exercise the 503 gates for
//! unloaded models and the pipeline error paths that fail before inference.

use agrovision_node::api::{build_router, AppState};
use agrovision_node::config::SoilServiceConfig;
use agrovision_node::vision::SoilDetectionClient;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "test-boundary-7MA4YWxkTrZu0gW";

fn empty_state() -> AppState {
    AppState {
        soil: None,
        vegetation: None,
    }
}

fn soil_only_state() -> AppState {
    let config = SoilServiceConfig {
        // Unreachable address: anything that gets past decode would fail,
        // but these tests fail earlier by design
        api_url: "http://127.0.0.1:59999".to_string(),
        api_key: Some("test-key".to_string()),
        project: "soil-detection-2uaco".to_string(),
        version: 4,
    };
    AppState {
        soil: Some(Arc::new(SoilDetectionClient::new(&config).unwrap())),
        vegetation: None,
    }
}

fn multipart_upload(field_name: &str, payload: &[u8]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field_name}\"; \
             filename=\"upload.bin\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(payload);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}

async fn post_upload(
    state: AppState,
    uri: &str,
    field_name: &str,
    payload: &[u8],
) -> (StatusCode, serde_json::Value) {
    let (content_type, body) = multipart_upload(field_name, payload);
    let app = build_router(state);
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_soil_endpoint_503_when_model_unset() {
    let (status, body) = post_upload(empty_state(), "/detect/soil", "file", b"ignored").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error_type"], "service_unavailable");
    assert_eq!(body["message"], "Soil detection model not loaded");
}

#[tokio::test]
async fn test_vegetation_endpoint_503_when_model_unset() {
    let (status, body) = post_upload(empty_state(), "/detect/vegetation", "file", b"ignored").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["message"], "Vegetation detection model not loaded");
}

#[tokio::test]
async fn test_combined_endpoint_503_when_both_unset() {
    let (status, body) = post_upload(empty_state(), "/detect/combined", "file", b"ignored").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["message"], "One or both models not loaded");
}

#[tokio::test]
async fn test_combined_endpoint_503_when_only_soil_loaded() {
    let (status, body) =
        post_upload(soil_only_state(), "/detect/combined", "file", b"ignored").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["message"], "One or both models not loaded");
}

#[tokio::test]
async fn test_vegetation_endpoint_503_when_only_soil_loaded() {
    let (status, _) =
        post_upload(soil_only_state(), "/detect/vegetation", "file", b"ignored").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_non_image_upload_is_500_with_descriptive_message() {
    let (status, body) = post_upload(
        soil_only_state(),
        "/detect/soil",
        "file",
        b"definitely not an image",
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error_type"], "internal_error");
    let message = body["message"].as_str().unwrap();
    assert!(message.starts_with("Soil detection failed:"), "{}", message);
}

#[tokio::test]
async fn test_truncated_image_upload_is_500() {
    // Valid PNG magic, corrupt payload
    let (status, body) = post_upload(
        soil_only_state(),
        "/detect/soil",
        "file",
        &[0x89, 0x50, 0x4E, 0x47, 0x00, 0x00],
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("Failed to decode image"));
}

#[tokio::test]
async fn test_upload_over_2mb_reaches_decode_pipeline() {
    // 3MB of non-image bytes: larger than axum's default body cap, within
    // the service's own limit. Must fail at decode (500), not at body
    // extraction (400).
    let payload = vec![0xABu8; 3 * 1024 * 1024];
    let (status, body) = post_upload(soil_only_state(), "/detect/soil", "file", &payload).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let message = body["message"].as_str().unwrap();
    assert!(message.starts_with("Soil detection failed:"), "{}", message);
}

#[tokio::test]
async fn test_missing_file_field_is_400() {
    let (status, body) = post_upload(soil_only_state(), "/detect/soil", "not_file", b"x").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_type"], "invalid_request");
}

#[tokio::test]
async fn test_model_gate_runs_before_body_parsing() {
    // An unparseable body still gets the 503, proving decode never ran
    let app = build_router(empty_state());
    let request = Request::builder()
        .method("POST")
        .uri("/detect/soil")
        .header(header::CONTENT_TYPE, "multipart/form-data; boundary=b")
        .body(Body::from("garbage"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_no_temp_files_left_after_failed_uploads() {
    let before = soil_temp_file_count();
    let _ = post_upload(
        soil_only_state(),
        "/detect/soil",
        "file",
        b"definitely not an image",
    )
    .await;
    assert_eq!(soil_temp_file_count(), before);
}

fn soil_temp_file_count() -> usize {
    std::fs::read_dir(std::env::temp_dir())
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| {
                    e.file_name()
                        .to_string_lossy()
                        .starts_with("agrovision-soil-")
                })
                .count()
        })
        .unwrap_or(0)
}
