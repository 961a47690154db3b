//! Drape coefficient measurement from photographs of a draped fabric
//! specimen.
//!
//! A session holds the photo, the view transform used to display it, a
//! reference-line calibration against a coin of known diameter, an optional
//! circular crop and the measurement history. Segmentation of the fabric
//! silhouette is delegated to a [`SegmentationEngine`](capture::segmentation::SegmentationEngine).

pub mod capture;
pub mod config;
pub mod domain;
pub mod error;
pub mod session;

pub use config::DrapeConfig;
pub use error::{DrapeError, Result};
pub use session::MeasurementSession;
