//! Destructive circular crop of the working image

use image::{Rgba, RgbaImage};

use crate::domain::Point2D;

/// Cut the circle's bounding square out of `image` and blank every pixel
/// whose centre lies outside the circle to transparent.
///
/// The result is never larger than the input.
pub fn crop_circular(image: &RgbaImage, center: Point2D, diameter_image_px: f64) -> RgbaImage {
    let r = (diameter_image_px * 0.5).max(0.0);
    let (w, h) = (f64::from(image.width()), f64::from(image.height()));
    let x0 = (center.x - r).floor().clamp(0.0, w) as u32;
    let y0 = (center.y - r).floor().clamp(0.0, h) as u32;
    let x1 = (center.x + r).ceil().clamp(0.0, w) as u32;
    let y1 = (center.y + r).ceil().clamp(0.0, h) as u32;

    let mut out = RgbaImage::new(x1.saturating_sub(x0), y1.saturating_sub(y0));
    let r2 = r * r;
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let (sx, sy) = (x0 + x, y0 + y);
        let dx = f64::from(sx) + 0.5 - center.x;
        let dy = f64::from(sy) + 0.5 - center.y;
        *pixel = if dx * dx + dy * dy <= r2 {
            *image.get_pixel(sx, sy)
        } else {
            Rgba([0, 0, 0, 0])
        };
    }
    log::debug!(
        "Circular crop at ({:.1}, {:.1}) d={:.1}: {}x{} -> {}x{}",
        center.x,
        center.y,
        diameter_image_px,
        image.width(),
        image.height(),
        out.width(),
        out.height()
    );
    out
}
