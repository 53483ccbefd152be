// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use super::detect::{detect_combined_handler, detect_soil_handler, detect_vegetation_handler};
use super::health::{health_handler, root_handler};
use crate::vision::{SoilDetectionClient, VegetationModel, MAX_IMAGE_SIZE};

/// Local development origins allowed by CORS
const ALLOWED_ORIGINS: [&str; 4] = [
    "http://localhost:3000",
    "http://127.0.0.1:3000",
    "http://localhost:5173",
    "http://127.0.0.1:5173",
];

/// Shared handles to the loaded models
///
/// Built once at startup; `None` records a failed model load for the
/// process lifetime and surfaces as 503 on the corresponding endpoints.
/// Handles are read-only after construction.
#[derive(Clone)]
pub struct AppState {
    pub soil: Option<Arc<SoilDetectionClient>>,
    pub vegetation: Option<Arc<VegetationModel>>,
}

/// Build the application router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Capability map
        .route("/", get(root_handler))
        // Health check
        .route("/health", get(health_handler))
        // Detection endpoints
        .route("/detect/soil", post(detect_soil_handler))
        .route("/detect/vegetation", post(detect_vegetation_handler))
        .route("/detect/combined", post(detect_combined_handler))
        // Axum defaults to a 2MB body cap; uploads are bounded by the
        // decode cap instead
        .layer(DefaultBodyLimit::max(MAX_IMAGE_SIZE))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    let origins = ALLOWED_ORIGINS.map(HeaderValue::from_static);

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Bind the listener and serve until ctrl-c
pub async fn start_server(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("API server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}
