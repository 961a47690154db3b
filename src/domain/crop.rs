//! Circular crop region resolution

use serde::{Deserialize, Serialize};

use super::geometry::{Point2D, ScreenCircle};
use super::transform::ViewTransform;
use crate::error::{DrapeError, Result};

/// A circle on the image pixel grid that lies entirely within image bounds
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CropRegion {
    pub center_image: Point2D,
    pub diameter_image_px: f64,
}

impl CropRegion {
    pub fn radius(&self) -> f64 {
        self.diameter_image_px * 0.5
    }
}

/// Map a screen-space selection circle into a clamped image-space circle.
///
/// The centre is clamped to `[0, W] × [0, H]` first, then the diameter is
/// shrunk against the clamped centre so the whole circle fits.
pub fn resolve_crop_region(
    circle: ScreenCircle,
    transform: &ViewTransform,
    image_width: u32,
    image_height: u32,
) -> Result<CropRegion> {
    if !(circle.diameter > 0.0) || !circle.diameter.is_finite() {
        return Err(DrapeError::crop(format!(
            "selection diameter must be positive, got {}",
            circle.diameter
        )));
    }
    if !transform.has_layout() {
        return Err(DrapeError::crop("image is not laid out on a canvas"));
    }
    let (w, h) = (f64::from(image_width), f64::from(image_height));
    let center = transform.screen_to_image(circle.center);
    let diameter = transform.screen_length_to_image(circle.diameter);
    if !center.x.is_finite() || !center.y.is_finite() || !diameter.is_finite() {
        return Err(DrapeError::crop("selection does not map onto the image"));
    }
    let center = center.clamp(0.0, w, 0.0, h);
    let diameter = diameter
        .min(2.0 * center.x.min(w - center.x))
        .min(2.0 * center.y.min(h - center.y));

    if !(diameter > 0.0) {
        return Err(DrapeError::crop("selection does not overlap the image"));
    }
    Ok(CropRegion {
        center_image: center,
        diameter_image_px: diameter,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::geometry::Vector2D;

    fn assert_inside(region: &CropRegion, w: f64, h: f64) {
        let r = region.radius();
        let c = region.center_image;
        let eps = 1e-9;
        assert!(c.x - r >= -eps && c.x + r <= w + eps, "{region:?}");
        assert!(c.y - r >= -eps && c.y + r <= h + eps, "{region:?}");
    }

    #[test]
    fn test_centered_circle_maps_through_scale() {
        // 2000x1000 image letterboxed into 1000x500 => base scale 0.5
        let view = ViewTransform::new(2000, 1000, 1000.0, 500.0);
        let region = resolve_crop_region(
            ScreenCircle::new(Point2D::new(500.0, 250.0), 200.0),
            &view,
            2000,
            1000,
        )
        .unwrap();
        assert_eq!(region.center_image, Point2D::new(1000.0, 500.0));
        assert!((region.diameter_image_px - 400.0).abs() < 1e-9);
    }

    #[test]
    fn test_diameter_unaffected_by_pan() {
        let mut view = ViewTransform::new(800, 800, 800.0, 800.0);
        view.set_zoom(2.0);
        let circle = ScreenCircle::new(Point2D::new(400.0, 400.0), 100.0);
        let a = resolve_crop_region(circle, &view, 800, 800).unwrap();
        view.set_pan(Vector2D::new(30.0, 30.0));
        let b = resolve_crop_region(circle, &view, 800, 800).unwrap();
        assert_eq!(a.diameter_image_px, b.diameter_image_px);
        assert_ne!(a.center_image, b.center_image);
    }

    #[test]
    fn test_circle_near_edge_is_shrunk() {
        let view = ViewTransform::new(100, 100, 100.0, 100.0);
        let region = resolve_crop_region(
            ScreenCircle::new(Point2D::new(10.0, 50.0), 80.0),
            &view,
            100,
            100,
        )
        .unwrap();
        assert_eq!(region.center_image, Point2D::new(10.0, 50.0));
        assert!((region.diameter_image_px - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_off_image_center_is_clamped_before_diameter() {
        let view = ViewTransform::new(100, 100, 100.0, 100.0);
        let region = resolve_crop_region(
            ScreenCircle::new(Point2D::new(-30.0, 50.0), 400.0),
            &view,
            100,
            100,
        );
        // Centre lands on the left edge, leaving no room for any circle
        assert!(matches!(region, Err(DrapeError::InvalidCropGeometry { .. })));
    }

    #[test]
    fn test_non_positive_diameter_rejected() {
        let view = ViewTransform::new(100, 100, 100.0, 100.0);
        for d in [0.0, -5.0, f64::NAN] {
            let result = resolve_crop_region(
                ScreenCircle::new(Point2D::new(50.0, 50.0), d),
                &view,
                100,
                100,
            );
            assert!(matches!(result, Err(DrapeError::InvalidCropGeometry { .. })));
        }
    }

    #[test]
    fn test_unlaid_out_view_rejected() {
        // No canvas yet: composite scale is zero
        let view = ViewTransform::new(100, 100, 0.0, 0.0);
        let result = resolve_crop_region(
            ScreenCircle::new(Point2D::new(50.0, 50.0), 40.0),
            &view,
            100,
            100,
        );
        assert!(matches!(result, Err(DrapeError::InvalidCropGeometry { .. })));
    }

    #[test]
    fn test_resolved_circle_always_inside_image() {
        let (w, h) = (640u32, 480u32);
        let mut view = ViewTransform::new(w, h, 390.0, 700.0);
        for &zoom in &[0.25, 1.0, 3.5] {
            view.set_zoom(zoom);
            for cx in (-100..=500).step_by(60) {
                for cy in (-100..=800).step_by(75) {
                    for &d in &[5.0, 80.0, 300.0, 2000.0] {
                        let circle = ScreenCircle::new(Point2D::new(cx as f64, cy as f64), d);
                        if let Ok(region) = resolve_crop_region(circle, &view, w, h) {
                            assert!(region.diameter_image_px > 0.0);
                            assert_inside(&region, f64::from(w), f64::from(h));
                        }
                    }
                }
            }
        }
    }
}
