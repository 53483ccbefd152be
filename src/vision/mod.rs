// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision processing: upload decoding plus the two detection adapters

pub mod image_utils;
pub mod soil;
pub mod vegetation;

pub use image_utils::{
    decode_image_bytes, detect_format, resize_for_inference, ImageError, ImageInfo,
    MAX_IMAGE_SIZE, MODEL_INPUT_SIZE,
};
pub use soil::{SoilDetectionClient, SoilError, SoilOutcome, SoilPrediction};
pub use vegetation::{VegetationBox, VegetationModel, VegetationOutcome};
