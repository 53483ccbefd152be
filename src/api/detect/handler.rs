// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection endpoint handlers

use axum::{body::Bytes, extract::State, Json};
use axum_extra::extract::Multipart;
use image::DynamicImage;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::response::{CombinedResponse, ImageSize, ModelType, PredictionResponse};
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::vision::{decode_image_bytes, resize_for_inference, VegetationModel};

/// POST /detect/soil - Run the remote soil model on an uploaded image
///
/// # Request
/// Multipart form with a `file` field carrying the image bytes.
///
/// # Errors
/// - 503 Service Unavailable: soil model failed to load at startup
/// - 400 Bad Request: malformed multipart body
/// - 500 Internal Server Error: decode or inference failure
pub async fn detect_soil_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<PredictionResponse>, ApiError> {
    // Model gate first: decode/resize never runs for an unloaded model
    let soil = state.soil.clone().ok_or_else(|| {
        warn!("Soil detection requested but model is not loaded");
        ApiError::ServiceUnavailable("Soil detection model not loaded".to_string())
    })?;

    let bytes = read_upload(multipart).await?;
    let image = decode_and_resize(&bytes, "Soil detection")?;

    let outcome = soil
        .detect(&image)
        .await
        .map_err(|e| stage_error("Soil detection", e))?;

    info!(
        "Soil detection complete: {} detections, {:.3}s",
        outcome.predictions.len(),
        outcome.inference_time
    );

    Ok(Json(PredictionResponse::new(
        ModelType::Soil,
        outcome.predictions.into_iter().map(Into::into).collect(),
        image_size_of(&image),
        outcome.inference_time,
    )))
}

/// POST /detect/vegetation - Run the local vegetation model on an uploaded image
///
/// Same request/error contract as the soil endpoint; the CPU-bound ONNX
/// call is dispatched through `spawn_blocking` so it does not stall the
/// async runtime.
pub async fn detect_vegetation_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<PredictionResponse>, ApiError> {
    let vegetation = state.vegetation.clone().ok_or_else(|| {
        warn!("Vegetation detection requested but model is not loaded");
        ApiError::ServiceUnavailable("Vegetation detection model not loaded".to_string())
    })?;

    let bytes = read_upload(multipart).await?;
    let image = decode_and_resize(&bytes, "Vegetation detection")?;
    let size = image_size_of(&image);

    let outcome = run_vegetation(vegetation, image)
        .await
        .map_err(|e| stage_error("Vegetation detection", e))?;

    info!(
        "Vegetation detection complete: {} detections, {:.3}s",
        outcome.boxes.len(),
        outcome.inference_time
    );

    Ok(Json(PredictionResponse::new(
        ModelType::Vegetation,
        outcome.boxes.into_iter().map(Into::into).collect(),
        size,
        outcome.inference_time,
    )))
}

/// POST /detect/combined - Run both models sequentially on one upload
///
/// Requires both models; decodes and resizes once, runs soil then
/// vegetation with independent timings. A failure in either stage aborts
/// the whole request; no partial combined result is returned.
pub async fn detect_combined_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<CombinedResponse>, ApiError> {
    let (Some(soil), Some(vegetation)) = (state.soil.clone(), state.vegetation.clone()) else {
        warn!("Combined detection requested but one or both models are not loaded");
        return Err(ApiError::ServiceUnavailable(
            "One or both models not loaded".to_string(),
        ));
    };

    let bytes = read_upload(multipart).await?;
    let image = decode_and_resize(&bytes, "Combined detection")?;
    let size = image_size_of(&image);

    let soil_outcome = soil
        .detect(&image)
        .await
        .map_err(|e| stage_error("Combined detection", e))?;

    let veg_outcome = run_vegetation(vegetation, image)
        .await
        .map_err(|e| stage_error("Combined detection", e))?;

    let soil_response = PredictionResponse::new(
        ModelType::Soil,
        soil_outcome
            .predictions
            .into_iter()
            .map(Into::into)
            .collect(),
        size,
        soil_outcome.inference_time,
    );
    let vegetation_response = PredictionResponse::new(
        ModelType::Vegetation,
        veg_outcome.boxes.into_iter().map(Into::into).collect(),
        size,
        veg_outcome.inference_time,
    );

    let combined = CombinedResponse::new(Some(soil_response), Some(vegetation_response));
    info!(
        "Combined detection complete: {} total detections",
        combined.total_detections
    );

    Ok(Json(combined))
}

/// Pull the `file` field out of the multipart body
async fn read_upload(mut multipart: Multipart) -> Result<Bytes, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidRequest(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() == Some("file") {
            return field
                .bytes()
                .await
                .map_err(|e| ApiError::InvalidRequest(format!("Failed to read upload: {}", e)));
        }
    }

    Err(ApiError::InvalidRequest(
        "Multipart body is missing a 'file' field".to_string(),
    ))
}

/// Decode upload bytes and resize to the fixed model input resolution
///
/// A byte stream that is not a valid image maps to 500 with the pipeline's
/// message prefix, matching the catch-all error contract of the endpoints.
fn decode_and_resize(bytes: &[u8], context: &str) -> Result<DynamicImage, ApiError> {
    let (image, info) = decode_image_bytes(bytes).map_err(|e| stage_error(context, e))?;

    debug!(
        "Decoded upload: {}x{}, {} bytes",
        info.width, info.height, info.size_bytes
    );

    Ok(resize_for_inference(&image))
}

/// Dispatch the blocking ONNX call off the async runtime
///
/// Errors come back raw so each endpoint applies its own message prefix
/// exactly once.
async fn run_vegetation(
    model: Arc<VegetationModel>,
    image: DynamicImage,
) -> anyhow::Result<crate::vision::VegetationOutcome> {
    tokio::task::spawn_blocking(move || model.detect(&image)).await?
}

/// Wrap a pipeline failure with its endpoint prefix
///
/// Stage errors are raw when they reach a handler, so the prefix is
/// attached here exactly once per request.
fn stage_error(stage: &str, err: impl std::fmt::Display) -> ApiError {
    ApiError::InternalError(format!("{} failed: {}", stage, err))
}

fn image_size_of(image: &DynamicImage) -> ImageSize {
    ImageSize {
        width: image.width(),
        height: image.height(),
    }
}
