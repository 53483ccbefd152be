// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Unified detection response schema
//!
//! Both adapters normalize into this schema. The two producers keep their
//! native box geometry, so every detection carries an explicit
//! `bbox_format` tag instead of leaving the convention implicit.

use serde::{Deserialize, Serialize};

use crate::vision::{SoilPrediction, VegetationBox};

/// Box geometry convention for one detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BboxFormat {
    /// `[x, y, width, height]` as returned by the soil service
    Xywh,
    /// `[x_center, y_center, width, height]`, recomputed from corners
    Cxcywh,
}

/// Which model produced a `PredictionResponse`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    Soil,
    Vegetation,
}

/// One predicted object instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResult {
    pub class_name: String,
    /// Confidence score in [0, 1]
    pub confidence: f32,
    pub bbox: [f32; 4],
    pub bbox_format: BboxFormat,
}

impl From<SoilPrediction> for DetectionResult {
    fn from(pred: SoilPrediction) -> Self {
        Self {
            class_name: pred.class_name,
            confidence: pred.confidence,
            bbox: pred.bbox,
            bbox_format: BboxFormat::Xywh,
        }
    }
}

impl From<VegetationBox> for DetectionResult {
    fn from(b: VegetationBox) -> Self {
        Self {
            class_name: b.class_name,
            confidence: b.confidence,
            bbox: b.bbox,
            bbox_format: BboxFormat::Cxcywh,
        }
    }
}

/// Pixel dimensions of the image the detections refer to
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// Response for one model's detection run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub model_type: ModelType,
    pub detections: Vec<DetectionResult>,
    pub image_size: ImageSize,
    /// Wall-clock inference duration, seconds
    pub inference_time: f64,
    pub detection_count: usize,
}

impl PredictionResponse {
    /// Build a response; `detection_count` is derived from the list so the
    /// count invariant holds by construction.
    pub fn new(
        model_type: ModelType,
        detections: Vec<DetectionResult>,
        image_size: ImageSize,
        inference_time: f64,
    ) -> Self {
        let detection_count = detections.len();
        Self {
            model_type,
            detections,
            image_size,
            inference_time,
            detection_count,
        }
    }
}

/// Response for the combined endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedResponse {
    pub soil_detection: Option<PredictionResponse>,
    pub vegetation_detection: Option<PredictionResponse>,
    pub total_detections: usize,
}

impl CombinedResponse {
    /// Build a combined response; `total_detections` is derived from the
    /// per-model counts.
    pub fn new(
        soil_detection: Option<PredictionResponse>,
        vegetation_detection: Option<PredictionResponse>,
    ) -> Self {
        let total_detections = soil_detection
            .as_ref()
            .map(|r| r.detection_count)
            .unwrap_or(0)
            + vegetation_detection
                .as_ref()
                .map(|r| r.detection_count)
                .unwrap_or(0);
        Self {
            soil_detection,
            vegetation_detection,
            total_detections,
        }
    }
}
