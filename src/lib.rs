// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod config;
pub mod version;
pub mod vision;

// Re-export the main service types
pub use api::{build_router, start_server, AppState};
pub use config::AppConfig;
pub use vision::{SoilDetectionClient, VegetationModel};
