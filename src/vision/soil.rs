// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Client for the remote soil classification service

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use reqwest::Client;
use std::io::{Cursor, Write};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::SoilServiceConfig;

/// Confidence cutoff sent upstream, on the service's own percentage scale
const SOIL_CONFIDENCE_THRESHOLD: u32 = 40;
/// Overlap (IoU) cutoff sent upstream, percentage scale
const SOIL_OVERLAP_THRESHOLD: u32 = 30;

/// Errors from the soil detection pipeline
#[derive(Debug, Error)]
pub enum SoilError {
    #[error("Failed to encode image for upload: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Failed to stage image on disk: {0}")]
    Io(#[from] std::io::Error),

    #[error("Soil service request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Soil service returned HTTP {0}")]
    UpstreamStatus(reqwest::StatusCode),
}

/// One normalized prediction from the soil service
///
/// `bbox` is `[x, y, width, height]` exactly as returned upstream.
#[derive(Debug, Clone)]
pub struct SoilPrediction {
    pub class_name: String,
    pub confidence: f32,
    pub bbox: [f32; 4],
}

/// Outcome of one soil inference call
#[derive(Debug, Clone)]
pub struct SoilOutcome {
    pub predictions: Vec<SoilPrediction>,
    /// Wall-clock duration of the upstream call, in seconds
    pub inference_time: f64,
}

/// Client for a hosted soil detection model, addressed by project and
/// version identifiers plus an API key.
pub struct SoilDetectionClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl SoilDetectionClient {
    /// Create a new soil detection client
    ///
    /// # Errors
    /// Returns an error if the API key is missing from the configuration or
    /// the HTTP client cannot be constructed.
    pub fn new(config: &SoilServiceConfig) -> anyhow::Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| anyhow::anyhow!("soil service API key is not configured"))?;

        // No request timeout: a hung upstream blocks the request, matching
        // the documented behavior of this service.
        let client = Client::new();

        let base = config.api_url.trim_end_matches('/');
        let endpoint = format!("{}/{}/{}", base, config.project, config.version);
        debug!("Soil detection client configured: endpoint={}", endpoint);

        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run soil detection on a resized image
    ///
    /// Stages the image as a JPEG at a transient path (removed on every
    /// exit path, including errors, when the handle drops), uploads the
    /// staged bytes base64-encoded with the fixed thresholds, and leniently
    /// parses the reply. An ill-shaped reply yields an empty prediction
    /// list, not an error.
    pub async fn detect(&self, image: &DynamicImage) -> Result<SoilOutcome, SoilError> {
        let jpeg = encode_jpeg(image)?;

        // Keep the handle alive until the request completes
        let (temp, staged) = stage_upload(&jpeg)?;
        debug!("Staged soil upload at {}", temp.path().display());

        let start = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[
                ("api_key", self.api_key.clone()),
                ("confidence", SOIL_CONFIDENCE_THRESHOLD.to_string()),
                ("overlap", SOIL_OVERLAP_THRESHOLD.to_string()),
            ])
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(STANDARD.encode(&staged))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SoilError::UpstreamStatus(response.status()));
        }

        let body: serde_json::Value = response.json().await?;
        let inference_time = start.elapsed().as_secs_f64();

        let predictions = parse_predictions(&body);
        debug!(
            "Soil service returned {} predictions in {:.3}s",
            predictions.len(),
            inference_time
        );

        Ok(SoilOutcome {
            predictions,
            inference_time,
        })
    }
}

/// Parse the soil service reply into normalized predictions
///
/// Expected shape: `{"predictions": [{"class", "confidence", "x", "y",
/// "width", "height"}, ...]}`. A reply without that shape produces an empty
/// list (logged at WARN); predictions with missing fields fall back to
/// "unknown" / zero.
pub fn parse_predictions(body: &serde_json::Value) -> Vec<SoilPrediction> {
    let Some(raw) = body.get("predictions").and_then(|p| p.as_array()) else {
        warn!("Soil service reply is missing the predictions array; returning no detections");
        return Vec::new();
    };

    raw.iter()
        .map(|pred| SoilPrediction {
            class_name: pred
                .get("class")
                .and_then(|c| c.as_str())
                .unwrap_or("unknown")
                .to_string(),
            confidence: field_f32(pred, "confidence"),
            bbox: [
                field_f32(pred, "x"),
                field_f32(pred, "y"),
                field_f32(pred, "width"),
                field_f32(pred, "height"),
            ],
        })
        .collect()
}

fn field_f32(pred: &serde_json::Value, key: &str) -> f32 {
    pred.get(key).and_then(|v| v.as_f64()).unwrap_or(0.0) as f32
}

/// Stage upload bytes in a transient file and read them back
///
/// The upload body is built from the on-disk copy, so the staged file is
/// the bytes that actually go upstream. The handle deletes the file when
/// dropped.
fn stage_upload(jpeg: &[u8]) -> Result<(tempfile::NamedTempFile, Vec<u8>), std::io::Error> {
    let mut temp = tempfile::Builder::new()
        .prefix("agrovision-soil-")
        .suffix(".jpg")
        .tempfile()?;
    temp.write_all(jpeg)?;
    temp.flush()?;

    let staged = std::fs::read(temp.path())?;
    Ok((temp, staged))
}

fn encode_jpeg(image: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Cursor::new(Vec::new());
    // JPEG has no alpha channel
    image
        .to_rgb8()
        .write_to(&mut buf, image::ImageFormat::Jpeg)?;
    Ok(buf.into_inner())
}
