//! Error types for drape measurement operations

use thiserror::Error;

/// Result type alias for drapescope operations
pub type Result<T> = std::result::Result<T, DrapeError>;

/// Failures surfaced by the calibration and measurement core.
///
/// Every variant is recoverable by the user: the operation that failed leaves
/// prior valid state untouched and the caller prompts for a retry of that step.
#[derive(Error, Debug)]
pub enum DrapeError {
    /// Reference line endpoints missing or reference diameter not positive
    #[error("Invalid calibration input: {reason}")]
    InvalidCalibrationInput { reason: String },

    /// Crop circle has no area inside the image
    #[error("Invalid crop geometry: {reason}")]
    InvalidCropGeometry { reason: String },

    /// Segmentation produced no candidate region
    #[error("No foreground region found in image")]
    NoRegionFound,

    /// Disk/fabric diameters violate `0 < disk < fabric`
    #[error("Invalid drape settings: disk {disk_diameter_cm} cm, fabric {fabric_diameter_cm} cm")]
    InvalidDrapeSettings {
        disk_diameter_cm: f64,
        fabric_diameter_cm: f64,
    },

    /// A measurement was requested before a scale factor exists
    #[error("No scale factor: draw a reference line first")]
    NotCalibrated,

    /// No image has been loaded into the session
    #[error("No image loaded")]
    NoImage,

    /// A segmentation request for the current image is still outstanding
    #[error("A measurement is already in progress")]
    MeasurementInProgress,

    /// The external segmentation engine failed
    #[error("Segmentation failed: {message}")]
    Segmentation {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl DrapeError {
    pub(crate) fn calibration(reason: impl Into<String>) -> Self {
        Self::InvalidCalibrationInput {
            reason: reason.into(),
        }
    }

    pub(crate) fn crop(reason: impl Into<String>) -> Self {
        Self::InvalidCropGeometry {
            reason: reason.into(),
        }
    }

    /// Wrap an engine failure, keeping the original error chain
    pub fn segmentation(message: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Segmentation {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Short instruction telling the user which step to retry
    pub fn retry_hint(&self) -> &'static str {
        match self {
            DrapeError::InvalidCalibrationInput { .. } | DrapeError::NotCalibrated => {
                "Draw the reference line across the coin again."
            }
            DrapeError::InvalidCropGeometry { .. } => {
                "Reposition the crop circle so it lies over the image."
            }
            DrapeError::NoRegionFound | DrapeError::Segmentation { .. } => {
                "Improve lighting and contrast between the fabric and background, then retry."
            }
            DrapeError::InvalidDrapeSettings { .. } => {
                "Fix the settings: fabric diameter must be larger than the disk diameter."
            }
            DrapeError::NoImage => "Capture or load a photo first.",
            DrapeError::MeasurementInProgress => "Wait for the current measurement to finish.",
        }
    }
}
