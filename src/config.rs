//! Configuration persistence for drapescope settings

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::domain::DrapeSettings;
use crate::error::Result;

/// Defaults persisted between sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrapeConfig {
    /// Support disk diameter of the drape tester (cm)
    #[serde(default = "default_disk_diameter")]
    pub disk_diameter_cm: f64,
    /// Flat fabric specimen diameter (cm)
    #[serde(default = "default_fabric_diameter")]
    pub fabric_diameter_cm: f64,
    /// Diameter of the reference coin (cm)
    #[serde(default = "default_reference_diameter")]
    pub reference_diameter_cm: f64,
    /// Multiplier applied by one zoom-in step
    #[serde(default = "default_zoom_in_factor")]
    pub zoom_in_factor: f64,
    /// Multiplier applied by one zoom-out step
    #[serde(default = "default_zoom_out_factor")]
    pub zoom_out_factor: f64,
    /// Initial crop circle diameter relative to the smaller displayed side
    #[serde(default = "default_crop_fraction")]
    pub crop_fraction: f64,
}

fn default_disk_diameter() -> f64 {
    18.0
}

fn default_fabric_diameter() -> f64 {
    30.0
}

fn default_reference_diameter() -> f64 {
    2.5
}

fn default_zoom_in_factor() -> f64 {
    1.2
}

fn default_zoom_out_factor() -> f64 {
    0.8
}

fn default_crop_fraction() -> f64 {
    0.8
}

impl Default for DrapeConfig {
    fn default() -> Self {
        Self {
            disk_diameter_cm: default_disk_diameter(),
            fabric_diameter_cm: default_fabric_diameter(),
            reference_diameter_cm: default_reference_diameter(),
            zoom_in_factor: default_zoom_in_factor(),
            zoom_out_factor: default_zoom_out_factor(),
            crop_fraction: default_crop_fraction(),
        }
    }
}

impl DrapeConfig {
    /// Application directory name under the platform config dir
    pub const ID: &'static str = "drapescope";

    /// Default location of the config file
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(Self::ID).join("config.json"))
    }

    /// Load configuration from disk, or return defaults if unavailable
    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            log::warn!("No config directory available, using defaults");
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Error loading config, using defaults: {:?}", err);
                Self::default()
            }
        }
    }

    /// Save configuration to disk
    pub fn save(&self) {
        let Some(path) = Self::path() else {
            log::error!("Could not determine config directory for saving");
            return;
        };
        if let Err(err) = self.save_to(&path) {
            log::error!("Failed to save config: {:?}", err);
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Validated drape tester geometry
    pub fn drape_settings(&self) -> Result<DrapeSettings> {
        DrapeSettings::new(self.disk_diameter_cm, self.fabric_diameter_cm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = DrapeConfig {
            reference_diameter_cm: 2.325,
            zoom_in_factor: 1.5,
            ..DrapeConfig::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(DrapeConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "disk_diameter_cm": 12.0 }"#).unwrap();
        let config = DrapeConfig::load_from(&path).unwrap();
        assert_eq!(config.disk_diameter_cm, 12.0);
        assert_eq!(config.fabric_diameter_cm, 30.0);
        assert_eq!(config.zoom_out_factor, 0.8);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(DrapeConfig::load_from(&path).is_err());
    }

    #[test]
    fn test_drape_settings_validation() {
        assert!(DrapeConfig::default().drape_settings().is_ok());
        let swapped = DrapeConfig {
            disk_diameter_cm: 30.0,
            fabric_diameter_cm: 18.0,
            ..DrapeConfig::default()
        };
        assert!(swapped.drape_settings().is_err());
    }
}
