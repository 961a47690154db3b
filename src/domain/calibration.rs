//! Pixel-to-centimetre calibration from a reference line
//!
//! The scale factor is expressed in whatever coordinate space the line was
//! measured in. The session maps finished lines into image space before
//! deriving, so stored scale factors are image pixels per centimetre.

use serde::Serialize;

use super::geometry::Point2D;
use crate::error::{DrapeError, Result};

/// Pixels per centimetre. Always strictly positive.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ScaleFactor(f64);

impl ScaleFactor {
    /// Scale factor for a reference of `length_px` pixels spanning
    /// `reference_diameter_cm` centimetres
    pub fn from_length(length_px: f64, reference_diameter_cm: f64) -> Result<Self> {
        if !(reference_diameter_cm > 0.0) || !reference_diameter_cm.is_finite() {
            return Err(DrapeError::calibration(format!(
                "reference diameter must be positive, got {reference_diameter_cm}"
            )));
        }
        if !(length_px > 0.0) || !length_px.is_finite() {
            return Err(DrapeError::calibration("reference line has zero length"));
        }
        Ok(ScaleFactor(length_px / reference_diameter_cm))
    }

    pub fn pixels_per_cm(self) -> f64 {
        self.0
    }

    /// Convert a length in pixels to centimetres
    pub fn to_cm(self, pixels: f64) -> f64 {
        pixels / self.0
    }
}

/// Derive a scale factor from the two endpoints of a reference line drawn
/// across an object of known diameter.
pub fn derive_scale_factor(
    start: Option<Point2D>,
    end: Option<Point2D>,
    reference_diameter_cm: f64,
) -> Result<ScaleFactor> {
    let (Some(start), Some(end)) = (start, end) else {
        return Err(DrapeError::calibration("reference line needs both endpoints"));
    };
    ScaleFactor::from_length(start.distance_to(end), reference_diameter_cm)
}
