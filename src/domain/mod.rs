//! Pure domain types with minimal dependencies
//!
//! This module contains the value types and pure operations of the
//! measurement pipeline. Nothing here holds session state or touches pixels;
//! the session layer owns mutable state and calls into these.

pub mod calibration;
pub mod crop;
pub mod geometry;
pub mod measurement;
pub mod transform;

pub use calibration::*;
pub use crop::*;
pub use geometry::*;
pub use measurement::*;
pub use transform::*;
