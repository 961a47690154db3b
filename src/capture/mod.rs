//! Image capture and analysis module
//!
//! This module consolidates:
//! - Source/working image pair (image.rs)
//! - Destructive circular crop (mask.rs)
//! - Segmentation engine boundary (segmentation.rs)

pub mod image;
pub mod mask;
pub mod segmentation;
