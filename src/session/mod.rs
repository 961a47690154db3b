//! Measurement session management module
//!
//! This module contains:
//! - Session state and the measurement round trip (state.rs)
//! - Message types for pointer and settings interactions (messages.rs)
//! - Reference line and crop circle tools (reference.rs, crop.rs)
//! - Newest-first measurement history (history.rs)

pub mod crop;
pub mod history;
pub mod messages;
pub mod reference;
pub mod state;

pub use crop::{CropOutcome, CropTool};
pub use history::{HistoryRow, HistorySnapshot, MeasurementHistory};
pub use messages::{CropMsg, DrawAction, Msg, ZoomAction};
pub use reference::ReferenceLine;
pub use state::{Calibration, MeasurementOutcome, MeasurementSession};
