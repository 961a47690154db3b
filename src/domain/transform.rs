//! Coordinate transforms between screen, canvas and image space
//!
//! - **screen**: pointer event positions, in logical units
//! - **canvas**: backing-store pixels of the drawing surface; the image is
//!   letterboxed into it, then zoomed about the canvas centre and panned
//! - **image**: native pixel grid of the working bitmap

use super::geometry::{Point2D, Vector2D};

/// Lower zoom bound
pub const MIN_ZOOM: f64 = 0.1;
/// Upper zoom bound
pub const MAX_ZOOM: f64 = 10.0;

/// Letterbox placement of the image at zoom 1 with no pan
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BaseFit {
    pub render_width: f64,
    pub render_height: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

/// Where the zoomed and panned image is drawn on the canvas
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Placement {
    pub scaled_width: f64,
    pub scaled_height: f64,
    pub draw_x: f64,
    pub draw_y: f64,
}

/// Fit an image into a canvas preserving aspect ratio, centred on the free axis.
///
/// This is a contain (letterbox) fit: the whole image stays visible. An image
/// wider than the canvas fills the canvas width with bars above and below;
/// otherwise it fills the canvas height with bars left and right.
pub fn fit_image_to_canvas(
    image_width: f64,
    image_height: f64,
    canvas_width: f64,
    canvas_height: f64,
) -> BaseFit {
    if image_width <= 0.0 || image_height <= 0.0 || canvas_width <= 0.0 || canvas_height <= 0.0 {
        return BaseFit::default();
    }
    let image_aspect = image_width / image_height;
    let canvas_aspect = canvas_width / canvas_height;

    if image_aspect > canvas_aspect {
        // Wider than the canvas: full width, bars above and below
        let render_height = canvas_width / image_aspect;
        BaseFit {
            render_width: canvas_width,
            render_height,
            offset_x: 0.0,
            offset_y: (canvas_height - render_height) * 0.5,
        }
    } else {
        let render_width = canvas_height * image_aspect;
        BaseFit {
            render_width,
            render_height: canvas_height,
            offset_x: (canvas_width - render_width) * 0.5,
            offset_y: 0.0,
        }
    }
}

/// Apply zoom (about the centre of the base fit) and pan to a base fit
pub fn apply_view_transform(base: &BaseFit, zoom: f64, pan: Vector2D) -> Placement {
    let scaled_width = base.render_width * zoom;
    let scaled_height = base.render_height * zoom;
    Placement {
        scaled_width,
        scaled_height,
        draw_x: base.offset_x - (scaled_width - base.render_width) * 0.5 + pan.x,
        draw_y: base.offset_y - (scaled_height - base.render_height) * 0.5 + pan.y,
    }
}

/// Position and pixel density of the canvas on screen
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenMapping {
    /// Screen position of the canvas top-left corner
    pub origin: Point2D,
    /// Canvas pixels per screen unit
    pub pixel_ratio: f64,
}

impl Default for ScreenMapping {
    fn default() -> Self {
        Self {
            origin: Point2D::ORIGIN,
            pixel_ratio: 1.0,
        }
    }
}

impl ScreenMapping {
    pub fn screen_to_canvas(&self, p: Point2D) -> Point2D {
        Point2D::new(
            (p.x - self.origin.x) * self.pixel_ratio,
            (p.y - self.origin.y) * self.pixel_ratio,
        )
    }

    pub fn canvas_to_screen(&self, p: Point2D) -> Point2D {
        Point2D::new(
            p.x / self.pixel_ratio + self.origin.x,
            p.y / self.pixel_ratio + self.origin.y,
        )
    }
}

/// Complete view state: image and canvas sizes, base fit, zoom and pan.
///
/// Out-of-bounds results are returned as-is by the point mappings; use
/// [`ViewTransform::clamp_to_image`] or [`ViewTransform::image_pixel_at`]
/// where an in-bounds pixel is required.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewTransform {
    image_width: f64,
    image_height: f64,
    canvas_width: f64,
    canvas_height: f64,
    base_fit: BaseFit,
    zoom: f64,
    pan: Vector2D,
    mapping: ScreenMapping,
}

impl ViewTransform {
    pub fn new(image_width: u32, image_height: u32, canvas_width: f64, canvas_height: f64) -> Self {
        let (iw, ih) = (f64::from(image_width), f64::from(image_height));
        Self {
            image_width: iw,
            image_height: ih,
            canvas_width,
            canvas_height,
            base_fit: fit_image_to_canvas(iw, ih, canvas_width, canvas_height),
            zoom: 1.0,
            pan: Vector2D::ZERO,
            mapping: ScreenMapping::default(),
        }
    }

    pub fn with_mapping(mut self, mapping: ScreenMapping) -> Self {
        self.mapping = mapping;
        self
    }

    pub fn set_mapping(&mut self, mapping: ScreenMapping) {
        self.mapping = mapping;
    }

    pub fn mapping(&self) -> ScreenMapping {
        self.mapping
    }

    /// Recompute the base fit for a new canvas size; zoom and pan are kept
    pub fn resize_canvas(&mut self, canvas_width: f64, canvas_height: f64) {
        self.canvas_width = canvas_width;
        self.canvas_height = canvas_height;
        self.refit();
    }

    /// Recompute the base fit for a new image size; zoom and pan are kept
    pub fn resize_image(&mut self, image_width: u32, image_height: u32) {
        self.image_width = f64::from(image_width);
        self.image_height = f64::from(image_height);
        self.refit();
    }

    fn refit(&mut self) {
        self.base_fit = fit_image_to_canvas(
            self.image_width,
            self.image_height,
            self.canvas_width,
            self.canvas_height,
        );
    }

    /// Back to zoom 1 with no pan
    pub fn reset(&mut self) {
        self.zoom = 1.0;
        self.pan = Vector2D::ZERO;
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn pan(&self) -> Vector2D {
        self.pan
    }

    pub fn base_fit(&self) -> BaseFit {
        self.base_fit
    }

    pub fn image_size(&self) -> (f64, f64) {
        (self.image_width, self.image_height)
    }

    pub fn canvas_size(&self) -> (f64, f64) {
        (self.canvas_width, self.canvas_height)
    }

    /// Multiply the zoom by `factor`, clamped to `[MIN_ZOOM, MAX_ZOOM]`.
    /// Returns the resulting zoom.
    pub fn zoom_by(&mut self, factor: f64) -> f64 {
        if factor > 0.0 && factor.is_finite() {
            self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        }
        self.zoom
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        if zoom.is_finite() {
            self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        }
    }

    /// Pan by a drag delta measured in screen units
    pub fn pan_by_screen(&mut self, delta: Vector2D) {
        self.pan = self.pan + delta * self.mapping.pixel_ratio;
    }

    pub fn set_pan(&mut self, pan: Vector2D) {
        self.pan = pan;
    }

    pub fn placement(&self) -> Placement {
        apply_view_transform(&self.base_fit, self.zoom, self.pan)
    }

    /// Canvas pixels per image pixel at zoom 1
    pub fn base_scale(&self) -> f64 {
        if self.image_width > 0.0 {
            self.base_fit.render_width / self.image_width
        } else {
            0.0
        }
    }

    /// Canvas pixels per image pixel at the current zoom
    pub fn composite_scale(&self) -> f64 {
        self.base_scale() * self.zoom
    }

    /// Whether the image occupies a non-empty area of the canvas.
    /// Point and length mappings are meaningless until it does.
    pub fn has_layout(&self) -> bool {
        let scale = self.composite_scale();
        scale > 0.0 && scale.is_finite() && self.mapping.pixel_ratio > 0.0
    }

    pub fn canvas_to_image(&self, p: Point2D) -> Point2D {
        let placement = self.placement();
        let scale = self.composite_scale();
        Point2D::new(
            (p.x - placement.draw_x) / scale,
            (p.y - placement.draw_y) / scale,
        )
    }

    pub fn image_to_canvas(&self, p: Point2D) -> Point2D {
        let placement = self.placement();
        let scale = self.composite_scale();
        Point2D::new(
            p.x * scale + placement.draw_x,
            p.y * scale + placement.draw_y,
        )
    }

    pub fn screen_to_image(&self, p: Point2D) -> Point2D {
        self.canvas_to_image(self.mapping.screen_to_canvas(p))
    }

    pub fn image_to_screen(&self, p: Point2D) -> Point2D {
        self.mapping.canvas_to_screen(self.image_to_canvas(p))
    }

    /// Convert a screen-space length (not a position) to image pixels.
    /// Pan does not affect lengths.
    pub fn screen_length_to_image(&self, length: f64) -> f64 {
        length * self.mapping.pixel_ratio / self.composite_scale()
    }

    pub fn image_length_to_screen(&self, length: f64) -> f64 {
        length * self.composite_scale() / self.mapping.pixel_ratio
    }

    /// Check if an image-space point lies on the pixel grid
    pub fn contains_image_point(&self, p: Point2D) -> bool {
        p.x >= 0.0 && p.y >= 0.0 && p.x < self.image_width && p.y < self.image_height
    }

    /// Clamp an image-space point to `[0, W-1] × [0, H-1]`
    pub fn clamp_to_image(&self, p: Point2D) -> Point2D {
        p.clamp(
            0.0,
            (self.image_width - 1.0).max(0.0),
            0.0,
            (self.image_height - 1.0).max(0.0),
        )
    }

    /// The image pixel under a screen position, if any
    pub fn image_pixel_at(&self, screen: Point2D) -> Option<(u32, u32)> {
        let p = self.screen_to_image(screen);
        if !self.contains_image_point(p) {
            return None;
        }
        let p = self.clamp_to_image(p);
        Some((p.x.floor() as u32, p.y.floor() as u32))
    }
}
