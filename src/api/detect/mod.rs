// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection API endpoint module
//!
//! Provides POST /detect/soil, /detect/vegetation and /detect/combined.

pub mod handler;
pub mod response;

pub use handler::{detect_combined_handler, detect_soil_handler, detect_vegetation_handler};
pub use response::{
    BboxFormat, CombinedResponse, DetectionResult, ImageSize, ModelType, PredictionResponse,
};
