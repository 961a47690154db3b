//! Crop circle tool: `Inactive → Positioning → (Applied | Cancelled) → Inactive`

use crate::domain::{CropRegion, Point2D, ScreenCircle, Vector2D, ViewTransform, resolve_crop_region};
use crate::error::{DrapeError, Result};

/// Smallest on-screen crop circle the tool allows while resizing
pub const MIN_SCREEN_DIAMETER: f64 = 8.0;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum CropTool {
    #[default]
    Inactive,
    Positioning {
        circle: ScreenCircle,
        /// Pointer position of an ongoing drag
        drag_anchor: Option<Point2D>,
    },
}

/// How a crop session ended
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CropOutcome {
    Applied(CropRegion),
    Cancelled,
}

impl CropTool {
    pub fn is_active(&self) -> bool {
        matches!(self, CropTool::Positioning { .. })
    }

    pub fn circle(&self) -> Option<ScreenCircle> {
        match self {
            CropTool::Positioning { circle, .. } => Some(*circle),
            CropTool::Inactive => None,
        }
    }

    /// Start positioning a circle centred on the displayed image.
    /// `fraction` is the diameter relative to the smaller displayed side.
    pub fn start(&mut self, view: &ViewTransform, fraction: f64) {
        let (w, h) = view.image_size();
        let center = view.image_to_screen(Point2D::new(w * 0.5, h * 0.5));
        let diameter = (view.image_length_to_screen(w.min(h)) * fraction).max(MIN_SCREEN_DIAMETER);
        *self = CropTool::Positioning {
            circle: ScreenCircle::new(center, diameter),
            drag_anchor: None,
        };
    }

    /// Pointer down: begins a drag if the pointer is inside the circle
    pub fn grab(&mut self, at: Point2D) -> bool {
        match self {
            CropTool::Positioning {
                circle,
                drag_anchor,
            } if circle.contains(at) => {
                *drag_anchor = Some(at);
                true
            }
            _ => false,
        }
    }

    /// Pointer move: translate the circle by the drag delta
    pub fn drag(&mut self, to: Point2D) {
        if let CropTool::Positioning {
            circle,
            drag_anchor: Some(anchor),
        } = self
        {
            let delta: Vector2D = to - *anchor;
            circle.center = circle.center + delta;
            *anchor = to;
        }
    }

    /// Pointer up: end the drag, keep positioning
    pub fn release(&mut self) {
        if let CropTool::Positioning { drag_anchor, .. } = self {
            *drag_anchor = None;
        }
    }

    pub fn set_center(&mut self, center: Point2D) {
        if let CropTool::Positioning { circle, .. } = self {
            circle.center = center;
        }
    }

    pub fn set_diameter(&mut self, diameter: f64) {
        if let CropTool::Positioning { circle, .. } = self {
            circle.diameter = diameter.max(MIN_SCREEN_DIAMETER);
        }
    }

    /// Image-space region for the current circle
    pub fn region(&self, view: &ViewTransform, image_width: u32, image_height: u32) -> Result<CropRegion> {
        let circle = self
            .circle()
            .ok_or_else(|| DrapeError::crop("crop tool is not active"))?;
        resolve_crop_region(circle, view, image_width, image_height)
    }

    /// Resolve the region, hand it to `commit` and return to `Inactive`.
    /// If resolving or committing fails the tool stays in `Positioning` so
    /// the user can move the circle.
    pub fn apply<F>(
        &mut self,
        view: &ViewTransform,
        image_width: u32,
        image_height: u32,
        commit: F,
    ) -> Result<CropOutcome>
    where
        F: FnOnce(CropRegion) -> Result<()>,
    {
        let region = self.region(view, image_width, image_height)?;
        commit(region)?;
        *self = CropTool::Inactive;
        Ok(CropOutcome::Applied(region))
    }

    pub fn cancel(&mut self) -> CropOutcome {
        *self = CropTool::Inactive;
        CropOutcome::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> ViewTransform {
        ViewTransform::new(400, 200, 400.0, 400.0)
    }

    #[test]
    fn test_start_centers_on_image() {
        let mut tool = CropTool::default();
        tool.start(&view(), 0.8);
        let circle = tool.circle().unwrap();
        assert_eq!(circle.center, Point2D::new(200.0, 200.0));
        assert!((circle.diameter - 160.0).abs() < 1e-9);
    }

    #[test]
    fn test_drag_moves_circle() {
        let mut tool = CropTool::default();
        tool.start(&view(), 0.5);
        assert!(!tool.grab(Point2D::new(0.0, 0.0)));
        assert!(tool.grab(Point2D::new(210.0, 200.0)));
        tool.drag(Point2D::new(230.0, 190.0));
        tool.drag(Point2D::new(240.0, 195.0));
        tool.release();
        assert_eq!(tool.circle().unwrap().center, Point2D::new(230.0, 195.0));
        // No anchor after release
        tool.drag(Point2D::new(400.0, 400.0));
        assert_eq!(tool.circle().unwrap().center, Point2D::new(230.0, 195.0));
    }

    #[test]
    fn test_apply_returns_region_and_deactivates() {
        let v = view();
        let mut tool = CropTool::default();
        tool.start(&v, 0.8);
        let outcome = tool.apply(&v, 400, 200, |_| Ok(())).unwrap();
        match outcome {
            CropOutcome::Applied(region) => {
                assert_eq!(region.center_image, Point2D::new(200.0, 100.0));
                assert!((region.diameter_image_px - 160.0).abs() < 1e-9);
            }
            CropOutcome::Cancelled => panic!("expected applied"),
        }
        assert!(!tool.is_active());
    }

    #[test]
    fn test_failed_apply_keeps_positioning() {
        let v = view();
        let mut tool = CropTool::default();
        tool.start(&v, 0.8);
        tool.set_center(Point2D::new(-500.0, -500.0));
        assert!(tool.apply(&v, 400, 200, |_| Ok(())).is_err());
        assert!(tool.is_active());
        assert_eq!(tool.cancel(), CropOutcome::Cancelled);
        assert!(!tool.is_active());
    }

    #[test]
    fn test_failed_commit_keeps_positioning() {
        let v = view();
        let mut tool = CropTool::default();
        tool.start(&v, 0.8);
        let before = tool;
        let result = tool.apply(&v, 400, 200, |_| Err(DrapeError::crop("write failed")));
        assert!(result.is_err());
        assert_eq!(tool, before);
    }

    #[test]
    fn test_inactive_tool_has_no_region() {
        let tool = CropTool::Inactive;
        assert!(matches!(
            tool.region(&view(), 400, 200),
            Err(DrapeError::InvalidCropGeometry { .. })
        ));
    }

    #[test]
    fn test_diameter_has_floor() {
        let mut tool = CropTool::default();
        tool.start(&view(), 0.8);
        tool.set_diameter(1.0);
        assert_eq!(tool.circle().unwrap().diameter, MIN_SCREEN_DIAMETER);
    }
}
