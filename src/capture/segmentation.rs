//! Boundary to the external segmentation engine
//!
//! Grayscale conversion, blurring, thresholding and contour extraction are
//! the engine's business. The core only asks for foreground regions, picks
//! the largest one and converts its pixel area.

use anyhow::Context;
use image::{Pixel, RgbaImage};
use std::sync::Arc;

use super::mask::crop_circular;
use crate::domain::Point2D;

/// A foreground region found by the engine
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    /// Outline in image coordinates
    pub boundary: Vec<Point2D>,
    /// Enclosed area in square image pixels
    pub area_px: f64,
}

/// Engine output for one image
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Segmentation {
    pub regions: Vec<Region>,
}

impl Segmentation {
    /// The region with the largest area; the first one wins ties
    pub fn largest(&self) -> Option<&Region> {
        self.regions.iter().fold(None, |best: Option<&Region>, region| match best {
            Some(b) if b.area_px >= region.area_px => Some(b),
            _ => Some(region),
        })
    }
}

/// Image-processing capability the measurement core depends on
pub trait SegmentationEngine: Send + Sync {
    /// Find candidate foreground regions in `image`
    fn segment_foreground_region(&self, image: &RgbaImage) -> anyhow::Result<Segmentation>;

    /// Destructive circular crop; pixels outside the circle are blanked
    fn crop_circular(&self, image: &RgbaImage, center: Point2D, diameter_image_px: f64) -> RgbaImage {
        crop_circular(image, center, diameter_image_px)
    }
}

/// A segmentation call tagged with the session generation it was issued for
#[derive(Clone, Debug)]
pub struct SegmentationRequest {
    generation: u64,
    image: Arc<RgbaImage>,
}

/// Engine result carrying the generation of its request
#[derive(Debug)]
pub struct SegmentationResponse {
    pub generation: u64,
    pub result: anyhow::Result<Segmentation>,
}

impl SegmentationRequest {
    pub(crate) fn new(generation: u64, image: Arc<RgbaImage>) -> Self {
        Self { generation, image }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Run on the current thread
    pub fn run_blocking(self, engine: &dyn SegmentationEngine) -> SegmentationResponse {
        SegmentationResponse {
            generation: self.generation,
            result: engine.segment_foreground_region(&self.image),
        }
    }

    /// Run on tokio's blocking pool
    pub async fn run(self, engine: Arc<dyn SegmentationEngine>) -> SegmentationResponse {
        let generation = self.generation;
        let result = tokio::task::spawn_blocking(move || {
            engine.segment_foreground_region(&self.image)
        })
        .await
        .context("segmentation task failed to complete")
        .and_then(|r| r);
        SegmentationResponse { generation, result }
    }
}

/// Adapter for silhouettes already segmented by an external tool.
///
/// Treats the image as a mask: opaque pixels on the foreground side of
/// `threshold` form one region. Fully transparent pixels (e.g. outside a
/// circular crop) are background.
#[derive(Clone, Copy, Debug)]
pub struct MaskSegmenter {
    pub threshold: u8,
    /// Foreground is darker than the threshold instead of lighter
    pub dark_foreground: bool,
}

impl Default for MaskSegmenter {
    fn default() -> Self {
        Self {
            threshold: 128,
            dark_foreground: false,
        }
    }
}

impl MaskSegmenter {
    fn is_foreground(&self, pixel: &image::Rgba<u8>) -> bool {
        if pixel[3] == 0 {
            return false;
        }
        let luma = pixel.to_luma()[0];
        if self.dark_foreground {
            luma < self.threshold
        } else {
            luma >= self.threshold
        }
    }
}

impl SegmentationEngine for MaskSegmenter {
    fn segment_foreground_region(&self, image: &RgbaImage) -> anyhow::Result<Segmentation> {
        let mut count = 0u64;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (u32::MAX, u32::MAX, 0u32, 0u32);
        for (x, y, pixel) in image.enumerate_pixels() {
            if self.is_foreground(pixel) {
                count += 1;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        }
        log::debug!(
            "Mask segmentation on {}x{}: {} foreground pixels",
            image.width(),
            image.height(),
            count
        );
        if count == 0 {
            return Ok(Segmentation::default());
        }
        let (x0, y0) = (f64::from(min_x), f64::from(min_y));
        let (x1, y1) = (f64::from(max_x) + 1.0, f64::from(max_y) + 1.0);
        Ok(Segmentation {
            regions: vec![Region {
                boundary: vec![
                    Point2D::new(x0, y0),
                    Point2D::new(x1, y0),
                    Point2D::new(x1, y1),
                    Point2D::new(x0, y1),
                ],
                area_px: count as f64,
            }],
        })
    }
}
