// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP API: router, endpoint handlers, and the unified response schema

pub mod detect;
pub mod errors;
pub mod health;
pub mod http_server;

pub use detect::{
    BboxFormat, CombinedResponse, DetectionResult, ImageSize, ModelType, PredictionResponse,
};
pub use errors::{ApiError, ErrorResponse};
pub use http_server::{build_router, start_server, AppState};
