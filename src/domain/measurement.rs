//! Area conversion and drape coefficient computation

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

use super::calibration::ScaleFactor;
use crate::error::{DrapeError, Result};

/// Area of a circle of the given diameter
pub fn circle_area(diameter_cm: f64) -> f64 {
    let r = diameter_cm * 0.5;
    PI * r * r
}

/// Convert a pixel area to square centimetres
pub fn actual_area(pixel_area: f64, scale: ScaleFactor) -> f64 {
    let ppcm = scale.pixels_per_cm();
    pixel_area / (ppcm * ppcm)
}

/// Drape tester geometry: support disk and flat fabric specimen diameters.
///
/// Construction enforces `0 < disk < fabric`, which keeps the coefficient
/// denominator non-zero.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDrapeSettings", into = "RawDrapeSettings")]
pub struct DrapeSettings {
    disk_diameter_cm: f64,
    fabric_diameter_cm: f64,
}

#[derive(Clone, Copy, Serialize, Deserialize)]
struct RawDrapeSettings {
    disk_diameter_cm: f64,
    fabric_diameter_cm: f64,
}

impl TryFrom<RawDrapeSettings> for DrapeSettings {
    type Error = DrapeError;

    fn try_from(raw: RawDrapeSettings) -> Result<Self> {
        DrapeSettings::new(raw.disk_diameter_cm, raw.fabric_diameter_cm)
    }
}

impl From<DrapeSettings> for RawDrapeSettings {
    fn from(s: DrapeSettings) -> Self {
        Self {
            disk_diameter_cm: s.disk_diameter_cm,
            fabric_diameter_cm: s.fabric_diameter_cm,
        }
    }
}

impl DrapeSettings {
    pub fn new(disk_diameter_cm: f64, fabric_diameter_cm: f64) -> Result<Self> {
        let valid = disk_diameter_cm > 0.0
            && fabric_diameter_cm.is_finite()
            && fabric_diameter_cm > disk_diameter_cm;
        if !valid {
            return Err(DrapeError::InvalidDrapeSettings {
                disk_diameter_cm,
                fabric_diameter_cm,
            });
        }
        Ok(Self {
            disk_diameter_cm,
            fabric_diameter_cm,
        })
    }

    pub fn disk_diameter_cm(&self) -> f64 {
        self.disk_diameter_cm
    }

    pub fn fabric_diameter_cm(&self) -> f64 {
        self.fabric_diameter_cm
    }

    pub fn disk_area(&self) -> f64 {
        circle_area(self.disk_diameter_cm)
    }

    pub fn fabric_area(&self) -> f64 {
        circle_area(self.fabric_diameter_cm)
    }

    /// Drape coefficient in percent for a draped (projected) area in cm²
    pub fn coefficient(&self, draped_area_cm2: f64) -> f64 {
        let disk = self.disk_area();
        (draped_area_cm2 - disk) / (self.fabric_area() - disk) * 100.0
    }
}

impl Default for DrapeSettings {
    fn default() -> Self {
        Self {
            disk_diameter_cm: 18.0,
            fabric_diameter_cm: 30.0,
        }
    }
}

/// Drape coefficient in percent. Fails with `InvalidDrapeSettings` unless
/// `0 < disk < fabric`.
pub fn drape_coefficient(
    draped_area_cm2: f64,
    disk_diameter_cm: f64,
    fabric_diameter_cm: f64,
) -> Result<f64> {
    let settings = DrapeSettings::new(disk_diameter_cm, fabric_diameter_cm)?;
    Ok(settings.coefficient(draped_area_cm2))
}

/// Fabric stiffness class derived from the drape coefficient
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrapeCategory {
    /// Below 30 %
    Stiff,
    /// 30 % up to 60 %
    MediumDrape,
    /// 60 % up to 85 %
    GoodDrape,
    /// 85 % and above
    ExcellentDrape,
}

impl DrapeCategory {
    pub fn label(self) -> &'static str {
        match self {
            DrapeCategory::Stiff => "Stiff",
            DrapeCategory::MediumDrape => "Medium drape",
            DrapeCategory::GoodDrape => "Good drape",
            DrapeCategory::ExcellentDrape => "Excellent drape",
        }
    }
}

impl fmt::Display for DrapeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Categorize a drape coefficient; lower bounds are inclusive
pub fn categorize(drape_coefficient_pct: f64) -> DrapeCategory {
    if drape_coefficient_pct >= 85.0 {
        DrapeCategory::ExcellentDrape
    } else if drape_coefficient_pct >= 60.0 {
        DrapeCategory::GoodDrape
    } else if drape_coefficient_pct >= 30.0 {
        DrapeCategory::MediumDrape
    } else {
        DrapeCategory::Stiff
    }
}

/// One recorded drape measurement
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub timestamp: DateTime<Local>,
    pub area_cm2: f64,
    pub drape_coefficient_pct: f64,
}

impl Measurement {
    /// Build a measurement from the segmented pixel area
    pub fn from_pixel_area(pixel_area: f64, scale: ScaleFactor, settings: &DrapeSettings) -> Self {
        let area_cm2 = actual_area(pixel_area, scale);
        Self {
            timestamp: Local::now(),
            area_cm2,
            drape_coefficient_pct: settings.coefficient(area_cm2),
        }
    }

    pub fn category(&self) -> DrapeCategory {
        categorize(self.drape_coefficient_pct)
    }
}
