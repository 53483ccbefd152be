// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Environment-driven service configuration

use std::env;
use std::path::PathBuf;

/// Coordinates for the hosted soil detection service
#[derive(Debug, Clone)]
pub struct SoilServiceConfig {
    /// Base URL of the hosted inference API
    pub api_url: String,
    /// Access credential; the soil model counts as not loaded without it
    pub api_key: Option<String>,
    /// Project identifier on the hosted service
    pub project: String,
    /// Model version on the hosted service
    pub version: u32,
}

/// Full service configuration, read once at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub vegetation_model_path: PathBuf,
    pub vegetation_labels_path: Option<PathBuf>,
    pub soil: SoilServiceConfig,
}

impl AppConfig {
    /// Build the configuration from environment variables
    ///
    /// Every variable has a default except `SOIL_API_KEY` and
    /// `VEGETATION_LABELS_PATH`, which are optional.
    pub fn from_env() -> Self {
        let host = env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("API_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(8000);

        let vegetation_model_path = PathBuf::from(
            env::var("VEGETATION_MODEL_PATH").unwrap_or_else(|_| "./models/best.onnx".to_string()),
        );
        let vegetation_labels_path = env::var("VEGETATION_LABELS_PATH").ok().map(PathBuf::from);

        let soil = SoilServiceConfig {
            api_url: env::var("SOIL_API_URL")
                .unwrap_or_else(|_| "https://detect.roboflow.com".to_string()),
            api_key: env::var("SOIL_API_KEY").ok(),
            project: env::var("SOIL_PROJECT")
                .unwrap_or_else(|_| "soil-detection-2uaco".to_string()),
            version: env::var("SOIL_MODEL_VERSION")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(4),
        };

        Self {
            host,
            port,
            vegetation_model_path,
            vegetation_labels_path,
            soil,
        }
    }
}
