// Version information for the Soil & Vegetation Detection API

/// Human-readable service name reported by the capability map
pub const SERVICE_NAME: &str = "Soil & Vegetation Detection API";

/// Semantic version number
pub const VERSION: &str = "1.0.0";

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "soil-detection",
    "vegetation-detection",
    "combined-detection",
    "multipart-upload",
    "health-probe",
];
