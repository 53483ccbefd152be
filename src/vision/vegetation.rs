// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Local vegetation detection model (YOLO-family ONNX)
//!
//! Loads the model once at startup and runs CPU inference per request.
//! Output rows are decoded, thresholded, suppressed per class, and emitted
//! as center-anchored boxes with resolved class labels.

use anyhow::{Context, Result};
use image::DynamicImage;
use ndarray::{Array4, IxDyn};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info};

/// Confidence cutoff for kept detections (0-1 scale)
const VEGETATION_CONFIDENCE_THRESHOLD: f32 = 0.4;
/// IoU cutoff for non-maximum suppression (0-1 scale)
const VEGETATION_IOU_THRESHOLD: f32 = 0.3;

/// A candidate detection in corner coordinates, before normalization
#[derive(Debug, Clone, Copy)]
pub struct RawBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub class_id: usize,
}

impl RawBox {
    /// Convert corner coordinates to center-anchored
    /// `[x_center, y_center, width, height]`
    pub fn to_center_bbox(self) -> [f32; 4] {
        [
            (self.x1 + self.x2) / 2.0,
            (self.y1 + self.y2) / 2.0,
            self.x2 - self.x1,
            self.y2 - self.y1,
        ]
    }
}

/// One normalized vegetation detection
#[derive(Debug, Clone)]
pub struct VegetationBox {
    pub class_name: String,
    pub confidence: f32,
    /// Center-anchored `[x_center, y_center, width, height]`
    pub bbox: [f32; 4],
}

/// Outcome of one vegetation inference call
#[derive(Debug, Clone)]
pub struct VegetationOutcome {
    pub boxes: Vec<VegetationBox>,
    /// Wall-clock duration of preprocessing + inference + decoding, seconds
    pub inference_time: f64,
}

/// Vegetation detection model backed by an ONNX Runtime session
///
/// The session runs CPU-only and is shared read-mostly across requests
/// behind a mutex; callers are expected to dispatch `detect` off the async
/// runtime via `spawn_blocking`.
pub struct VegetationModel {
    /// ONNX Runtime session (thread-safe)
    session: Arc<Mutex<Session>>,
    /// Model input name
    input_name: String,
    /// Class index -> human-readable label; generated names when absent
    names: Option<Vec<String>>,
}

impl std::fmt::Debug for VegetationModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VegetationModel")
            .field("input_name", &self.input_name)
            .field("names", &self.names)
            .finish_non_exhaustive()
    }
}

impl VegetationModel {
    /// Load the vegetation model from an ONNX file
    ///
    /// # Arguments
    /// - `model_path`: Path to the ONNX model file
    /// - `labels_path`: Optional JSON array of class names; absent classes
    ///   resolve to generated `class_<i>` labels
    ///
    /// # Errors
    /// Returns error if:
    /// - Model file not found
    /// - ONNX Runtime initialization fails
    /// - The labels file exists but cannot be parsed
    pub async fn load<P: AsRef<Path>>(model_path: P, labels_path: Option<&Path>) -> Result<Self> {
        let model_path = model_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("Vegetation model not found: {}", model_path.display());
        }

        info!("Loading vegetation model from {}", model_path.display());

        // CPU-only execution; inference is dispatched off the async runtime
        let session = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .context("Failed to set CPU execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(4)
            .context("Failed to set intra threads")?
            .commit_from_file(model_path)
            .context(format!(
                "Failed to load vegetation model from {}",
                model_path.display()
            ))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "images".to_string());

        debug!("Vegetation model loaded - input: {}", input_name);

        let names = match labels_path {
            Some(path) => Some(load_labels(path)?),
            None => None,
        };

        info!("✅ Vegetation model loaded successfully (CPU-only)");

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            names,
        })
    }

    /// Resolve a class index to a human-readable label
    pub fn label_for(&self, class_id: usize) -> String {
        self.names
            .as_ref()
            .and_then(|names| names.get(class_id).cloned())
            .unwrap_or_else(|| format!("class_{}", class_id))
    }

    /// Run vegetation detection on a resized image
    ///
    /// Synchronous and CPU-bound; call through `tokio::task::spawn_blocking`
    /// from request handlers.
    pub fn detect(&self, image: &DynamicImage) -> Result<VegetationOutcome> {
        let start = Instant::now();

        let input = image_to_tensor(image);
        let raw = self.run_inference(&input)?;

        let boxes = raw
            .into_iter()
            .map(|b| VegetationBox {
                class_name: self.label_for(b.class_id),
                confidence: b.confidence,
                bbox: b.to_center_bbox(),
            })
            .collect::<Vec<_>>();

        let inference_time = start.elapsed().as_secs_f64();
        debug!(
            "Vegetation model produced {} detections in {:.3}s",
            boxes.len(),
            inference_time
        );

        Ok(VegetationOutcome {
            boxes,
            inference_time,
        })
    }

    /// Run the session and decode raw output rows into suppressed boxes
    fn run_inference(&self, input: &Array4<f32>) -> Result<Vec<RawBox>> {
        let shape = input.shape();
        if shape.len() != 4 || shape[0] != 1 || shape[1] != 3 {
            anyhow::bail!("Invalid input shape: {:?}, expected [1, 3, H, W]", shape);
        }

        let mut session = self.session.lock().unwrap();

        let input_value =
            Value::from_array(input.to_owned()).context("Failed to create input tensor")?;

        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .context("Vegetation inference failed")?;

        let output_tensor = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract output tensor")?;

        decode_output(
            &output_tensor.view(),
            VEGETATION_CONFIDENCE_THRESHOLD,
            VEGETATION_IOU_THRESHOLD,
        )
    }
}

/// Convert an RGB image into a normalized NCHW float tensor
pub fn image_to_tensor(image: &DynamicImage) -> Array4<f32> {
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
        }
    }
    tensor
}

/// Decode a YOLO-style output tensor of shape `[1, 4+nc, anchors]`
///
/// Each column carries a center-anchored box (cx, cy, w, h) followed by
/// per-class scores. Columns whose best class score clears the confidence
/// threshold become corner-coordinate candidates, which are then suppressed
/// per class. Surviving boxes keep the model's class-bucket ordering; no
/// global sort is applied.
pub fn decode_output(
    output: &ndarray::ArrayViewD<f32>,
    confidence_threshold: f32,
    iou_threshold: f32,
) -> Result<Vec<RawBox>> {
    let shape = output.shape();
    if shape.len() != 3 || shape[0] != 1 || shape[1] <= 4 {
        anyhow::bail!(
            "Unexpected vegetation output shape: {:?}, expected [1, 4+nc, anchors]",
            shape
        );
    }

    let num_classes = shape[1] - 4;
    let num_anchors = shape[2];

    let mut buckets: Vec<Vec<RawBox>> = (0..num_classes).map(|_| Vec::new()).collect();

    for anchor in 0..num_anchors {
        let mut class_id = 0;
        let mut best = output[IxDyn(&[0, 4, anchor])];
        for c in 1..num_classes {
            let score = output[IxDyn(&[0, 4 + c, anchor])];
            if score > best {
                best = score;
                class_id = c;
            }
        }

        if best <= confidence_threshold {
            continue;
        }

        let cx = output[IxDyn(&[0, 0, anchor])];
        let cy = output[IxDyn(&[0, 1, anchor])];
        let w = output[IxDyn(&[0, 2, anchor])];
        let h = output[IxDyn(&[0, 3, anchor])];

        buckets[class_id].push(RawBox {
            x1: cx - w / 2.0,
            y1: cy - h / 2.0,
            x2: cx + w / 2.0,
            y2: cy + h / 2.0,
            confidence: best,
            class_id,
        });
    }

    non_maximum_suppression(&mut buckets, iou_threshold);

    Ok(buckets.into_iter().flatten().collect())
}

/// Intersection over union of two corner-coordinate boxes
fn iou(a: &RawBox, b: &RawBox) -> f32 {
    let a_area = (a.x2 - a.x1).max(0.0) * (a.y2 - a.y1).max(0.0);
    let b_area = (b.x2 - b.x1).max(0.0) * (b.y2 - b.y1).max(0.0);
    let i_x1 = a.x1.max(b.x1);
    let i_y1 = a.y1.max(b.y1);
    let i_x2 = a.x2.min(b.x2);
    let i_y2 = a.y2.min(b.y2);
    let i_area = (i_x2 - i_x1).max(0.0) * (i_y2 - i_y1).max(0.0);
    let union = a_area + b_area - i_area;
    if union <= 0.0 {
        return 0.0;
    }
    i_area / union
}

/// Per-class non-maximum suppression
///
/// Within each class bucket, boxes are sorted by confidence and any box
/// overlapping an already-kept box above the threshold is dropped.
fn non_maximum_suppression(buckets: &mut [Vec<RawBox>], threshold: f32) {
    for boxes in buckets.iter_mut() {
        boxes.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let mut kept = 0;
        for index in 0..boxes.len() {
            let mut drop = false;
            for prev in 0..kept {
                if iou(&boxes[prev], &boxes[index]) > threshold {
                    drop = true;
                    break;
                }
            }
            if !drop {
                boxes.swap(kept, index);
                kept += 1;
            }
        }
        boxes.truncate(kept);
    }
}

/// Load class labels from a JSON array file
fn load_labels(path: &Path) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .context(format!("Failed to read labels file {}", path.display()))?;
    let names: Vec<String> = serde_json::from_str(&raw)
        .context(format!("Failed to parse labels file {}", path.display()))?;
    Ok(names)
}
