// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Health probe and capability listing

use axum::{extract::State, Json};
use serde_json::json;

use crate::api::http_server::AppState;
use crate::version;

fn model_status(loaded: bool) -> &'static str {
    if loaded {
        "loaded"
    } else {
        "not loaded"
    }
}

/// GET /health - per-model load status and a timestamp; never fails
pub async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "models": {
            "soil_detection": model_status(state.soil.is_some()),
            "vegetation_detection": model_status(state.vegetation.is_some()),
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// GET / - static capability map
pub async fn root_handler() -> Json<serde_json::Value> {
    Json(json!({
        "message": version::SERVICE_NAME,
        "version": version::VERSION,
        "endpoints": {
            "/detect/soil": "POST - Detect soil using the hosted classification model",
            "/detect/vegetation": "POST - Detect vegetation using the local ONNX model",
            "/detect/combined": "POST - Run both detections on the same image",
            "/health": "GET - Check API and model health",
        },
    }))
}
