// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use agrovision_node::{
    api::{start_server, AppState},
    config::AppConfig,
    version,
    vision::{SoilDetectionClient, VegetationModel},
};
use anyhow::Result;
use std::{env, net::SocketAddr, sync::Arc};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    dotenv::dotenv().ok();

    info!(
        "🚀 Starting {} v{}",
        version::SERVICE_NAME,
        version::VERSION
    );

    let config = AppConfig::from_env();

    // Both models load once here; a failure is recorded as None and the
    // affected endpoints answer 503 for the rest of the process lifetime.
    let soil = match SoilDetectionClient::new(&config.soil) {
        Ok(client) => {
            info!("✅ Soil detection model loaded ({})", client.endpoint());
            Some(Arc::new(client))
        }
        Err(e) => {
            warn!("⚠️ Failed to load soil detection model: {}", e);
            None
        }
    };

    let vegetation = match VegetationModel::load(
        &config.vegetation_model_path,
        config.vegetation_labels_path.as_deref(),
    )
    .await
    {
        Ok(model) => Some(Arc::new(model)),
        Err(e) => {
            warn!(
                "⚠️ Failed to load vegetation model from {}: {}",
                config.vegetation_model_path.display(),
                e
            );
            None
        }
    };

    let state = AppState { soil, vegetation };

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    start_server(state, addr).await
}
