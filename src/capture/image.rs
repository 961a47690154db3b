//! Captured or uploaded photo with its working copy

use image::RgbaImage;
use std::sync::Arc;

/// The original capture plus the working copy that crops are applied to.
///
/// The original is never modified so a full reset can recover it.
#[derive(Clone, Debug)]
pub struct SourceImage {
    original: Arc<RgbaImage>,
    working: Arc<RgbaImage>,
}

impl SourceImage {
    /// Wrap a freshly loaded image. Returns `None` for an empty bitmap.
    pub fn new(rgba: RgbaImage) -> Option<Self> {
        if rgba.width() == 0 || rgba.height() == 0 {
            return None;
        }
        log::debug!(
            "SourceImage loaded: {}x{} pixels",
            rgba.width(),
            rgba.height()
        );
        let original = Arc::new(rgba);
        Some(Self {
            working: Arc::clone(&original),
            original,
        })
    }

    pub fn original(&self) -> &Arc<RgbaImage> {
        &self.original
    }

    pub fn working(&self) -> &Arc<RgbaImage> {
        &self.working
    }

    pub fn replace_working(&mut self, rgba: RgbaImage) {
        self.working = Arc::new(rgba);
    }

    /// Drop all edits and go back to the original
    pub fn restore(&mut self) {
        self.working = Arc::clone(&self.original);
    }

    pub fn is_modified(&self) -> bool {
        !Arc::ptr_eq(&self.original, &self.working)
    }

    /// Get the width of the working image
    pub fn width(&self) -> u32 {
        self.working.width()
    }

    /// Get the height of the working image
    pub fn height(&self) -> u32 {
        self.working.height()
    }
}
