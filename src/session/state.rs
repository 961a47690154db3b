use image::RgbaImage;
use std::sync::Arc;

use super::crop::{CropOutcome, CropTool};
use super::history::{HistorySnapshot, MeasurementHistory};
use super::messages::{CropMsg, DrawAction, Msg, ZoomAction};
use super::reference::ReferenceLine;
use crate::capture::image::SourceImage;
use crate::capture::segmentation::{SegmentationEngine, SegmentationRequest, SegmentationResponse};
use crate::config::DrapeConfig;
use crate::domain::{
    CropRegion, DrapeSettings, Measurement, Point2D, ScaleFactor, ScreenMapping, Segment,
    Vector2D, ViewTransform, derive_scale_factor,
};
use crate::error::{DrapeError, Result};

/// The active calibration, kept in image space
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Calibration {
    /// Reference line on the current working image; dropped when a crop
    /// moves the pixel grid
    pub line_image: Option<Segment>,
    /// Reference line length in image pixels
    pub length_px: f64,
    pub scale: ScaleFactor,
}

/// Result of completing a segmentation request
#[derive(Clone, Debug, PartialEq)]
pub enum MeasurementOutcome {
    /// The measurement was computed and appended to the history
    Recorded(Measurement),
    /// The request was issued against state that has since changed
    Discarded,
}

/// Mutable state of one measuring session, owned by the UI layer.
///
/// Every change that makes an outstanding segmentation result meaningless
/// (new image, crop apply/cancel, reset, recalibration) bumps `generation`.
pub struct MeasurementSession {
    config: DrapeConfig,
    engine: Arc<dyn SegmentationEngine>,
    canvas_size: (f64, f64),
    mapping: ScreenMapping,
    image: Option<SourceImage>,
    view: Option<ViewTransform>,
    reference: ReferenceLine,
    reference_diameter_cm: f64,
    calibration: Option<Calibration>,
    crop: CropTool,
    settings: DrapeSettings,
    history: MeasurementHistory,
    generation: u64,
    in_flight: Option<u64>,
}

impl MeasurementSession {
    pub fn new(config: DrapeConfig, engine: Arc<dyn SegmentationEngine>) -> Result<Self> {
        let settings = config.drape_settings()?;
        if !(config.reference_diameter_cm > 0.0) || !config.reference_diameter_cm.is_finite() {
            return Err(DrapeError::calibration(format!(
                "reference diameter must be positive, got {}",
                config.reference_diameter_cm
            )));
        }
        Ok(Self {
            reference_diameter_cm: config.reference_diameter_cm,
            config,
            engine,
            canvas_size: (0.0, 0.0),
            mapping: ScreenMapping::default(),
            image: None,
            view: None,
            reference: ReferenceLine::Idle,
            calibration: None,
            crop: CropTool::Inactive,
            settings,
            history: MeasurementHistory::default(),
            generation: 0,
            in_flight: None,
        })
    }

    fn invalidate(&mut self, reason: &str) {
        self.generation += 1;
        log::debug!("Session generation {} ({})", self.generation, reason);
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn config(&self) -> &DrapeConfig {
        &self.config
    }

    pub fn image(&self) -> Option<&SourceImage> {
        self.image.as_ref()
    }

    pub fn working_image(&self) -> Option<&Arc<RgbaImage>> {
        self.image.as_ref().map(SourceImage::working)
    }

    pub fn view(&self) -> Option<&ViewTransform> {
        self.view.as_ref()
    }

    pub fn reference(&self) -> &ReferenceLine {
        &self.reference
    }

    pub fn reference_diameter_cm(&self) -> f64 {
        self.reference_diameter_cm
    }

    pub fn calibration(&self) -> Option<&Calibration> {
        self.calibration.as_ref()
    }

    pub fn scale_factor(&self) -> Option<ScaleFactor> {
        self.calibration.map(|c| c.scale)
    }

    pub fn crop_tool(&self) -> &CropTool {
        &self.crop
    }

    pub fn settings(&self) -> DrapeSettings {
        self.settings
    }

    pub fn history(&self) -> &MeasurementHistory {
        &self.history
    }

    pub fn history_snapshot(&self) -> HistorySnapshot {
        self.history.snapshot(self.settings)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_measuring(&self) -> bool {
        self.in_flight == Some(self.generation)
    }

    // ------------------------------------------------------------------------
    // Image and view
    // ------------------------------------------------------------------------

    pub fn set_canvas_size(&mut self, width: f64, height: f64) {
        self.canvas_size = (width, height);
        if let Some(view) = self.view.as_mut() {
            view.resize_canvas(width, height);
        }
    }

    pub fn set_screen_mapping(&mut self, mapping: ScreenMapping) {
        self.mapping = mapping;
        if let Some(view) = self.view.as_mut() {
            view.set_mapping(mapping);
        }
    }

    /// Replace the session image; clears calibration and crop, resets the view
    pub fn load_image(&mut self, rgba: RgbaImage) -> Result<()> {
        let source = SourceImage::new(rgba).ok_or(DrapeError::NoImage)?;
        log::info!("Loaded image {}x{}", source.width(), source.height());
        let (cw, ch) = self.canvas_size;
        self.view = Some(
            ViewTransform::new(source.width(), source.height(), cw, ch).with_mapping(self.mapping),
        );
        self.image = Some(source);
        self.reference.clear();
        self.calibration = None;
        self.crop = CropTool::Inactive;
        self.invalidate("image loaded");
        Ok(())
    }

    /// Restore the original image and start over; the history is kept
    pub fn reset(&mut self) {
        if let Some(image) = self.image.as_mut() {
            image.restore();
            if let Some(view) = self.view.as_mut() {
                view.resize_image(image.width(), image.height());
                view.reset();
            }
        }
        self.reference.clear();
        self.calibration = None;
        self.crop = CropTool::Inactive;
        self.invalidate("full reset");
        log::info!("Session reset to original image");
    }

    pub fn reset_view(&mut self) {
        if let Some(view) = self.view.as_mut() {
            view.reset();
        }
    }

    pub fn zoom_in(&mut self) -> Option<f64> {
        let factor = self.config.zoom_in_factor;
        self.view.as_mut().map(|v| v.zoom_by(factor))
    }

    pub fn zoom_out(&mut self) -> Option<f64> {
        let factor = self.config.zoom_out_factor;
        self.view.as_mut().map(|v| v.zoom_by(factor))
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        if let Some(view) = self.view.as_mut() {
            view.set_zoom(zoom);
        }
    }

    pub fn pan_by(&mut self, delta: Vector2D) {
        if let Some(view) = self.view.as_mut() {
            view.pan_by_screen(delta);
        }
    }

    // ------------------------------------------------------------------------
    // Calibration
    // ------------------------------------------------------------------------

    /// Pointer down for the reference line. Starts a line only over the image
    /// and only while the crop tool is inactive.
    pub fn reference_down(&mut self, at: Point2D) -> bool {
        if self.crop.is_active() {
            return false;
        }
        let Some(view) = self.view.as_ref().filter(|v| v.has_layout()) else {
            return false;
        };
        if !view.contains_image_point(view.screen_to_image(at)) {
            return false;
        }
        self.reference.begin(at);
        true
    }

    pub fn reference_move(&mut self, at: Point2D) {
        self.reference.update(at);
    }

    /// Pointer up: finalize the line and derive a new scale factor.
    ///
    /// A fresh line always supersedes the previous scale factor, so on error
    /// the session is left uncalibrated.
    pub fn reference_up(&mut self, at: Point2D) -> Result<Option<ScaleFactor>> {
        let Some(segment) = self.reference.finish(at) else {
            return Ok(None);
        };
        let Some(view) = self.view.as_ref() else {
            return Err(DrapeError::NoImage);
        };
        let line_image = Segment::new(
            view.screen_to_image(segment.start),
            view.screen_to_image(segment.end),
        );
        self.calibration = None;
        self.invalidate("reference line drawn");

        let length_px = line_image.length();
        let scale = derive_scale_factor(
            Some(line_image.start),
            Some(line_image.end),
            self.reference_diameter_cm,
        )?;
        log::info!(
            "Calibrated: {:.1} px over {} cm = {:.3} px/cm",
            length_px,
            self.reference_diameter_cm,
            scale.pixels_per_cm()
        );
        self.calibration = Some(Calibration {
            line_image: Some(line_image),
            length_px,
            scale,
        });
        Ok(Some(scale))
    }

    pub fn clear_reference(&mut self) {
        self.reference.clear();
        if self.calibration.take().is_some() {
            self.invalidate("reference cleared");
        }
    }

    /// Change the real-world reference diameter.
    ///
    /// Invalid values are rejected and leave the current scale factor alone.
    /// A valid change makes the scale factor undefined until the line is
    /// redrawn.
    pub fn set_reference_diameter(&mut self, diameter_cm: f64) -> Result<()> {
        if !(diameter_cm > 0.0) || !diameter_cm.is_finite() {
            return Err(DrapeError::calibration(format!(
                "reference diameter must be positive, got {diameter_cm}"
            )));
        }
        if diameter_cm == self.reference_diameter_cm {
            return Ok(());
        }
        self.reference_diameter_cm = diameter_cm;
        if self.calibration.take().is_some() {
            self.reference.clear();
            log::info!("Reference diameter changed to {diameter_cm} cm, calibration cleared");
            self.invalidate("reference diameter changed");
        }
        Ok(())
    }

    /// The reference line to draw, in screen space under the current view
    pub fn reference_line_on_screen(&self) -> Option<Segment> {
        if self.reference.is_drawing() {
            return self.reference.segment();
        }
        let view = self.view.as_ref()?;
        let line = self.calibration?.line_image?;
        Some(Segment::new(
            view.image_to_screen(line.start),
            view.image_to_screen(line.end),
        ))
    }

    // ------------------------------------------------------------------------
    // Drape settings
    // ------------------------------------------------------------------------

    pub fn set_drape_settings(&mut self, disk_diameter_cm: f64, fabric_diameter_cm: f64) -> Result<()> {
        self.settings = DrapeSettings::new(disk_diameter_cm, fabric_diameter_cm)?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Crop
    // ------------------------------------------------------------------------

    pub fn begin_crop(&mut self) -> Result<()> {
        let view = self.view.as_ref().ok_or(DrapeError::NoImage)?;
        self.crop.start(view, self.config.crop_fraction);
        if self.reference.is_drawing() {
            self.reference.clear();
        }
        Ok(())
    }

    /// Image-space region the current crop circle would cut
    pub fn crop_preview(&self) -> Result<CropRegion> {
        let (view, image) = self.view.as_ref().zip(self.image.as_ref()).ok_or(DrapeError::NoImage)?;
        self.crop.region(view, image.width(), image.height())
    }

    /// Cut the working image to the crop circle. The original is retained.
    ///
    /// On error the working image and the crop tool are left as they were.
    pub fn apply_crop(&mut self) -> Result<CropRegion> {
        let (view, image) = self.view.as_mut().zip(self.image.as_mut()).ok_or(DrapeError::NoImage)?;
        let engine = &self.engine;
        let (width, height) = (image.width(), image.height());
        let outcome = self.crop.apply(view, width, height, |region| {
            let cropped = engine.crop_circular(
                image.working(),
                region.center_image,
                region.diameter_image_px,
            );
            if cropped.width() == 0 || cropped.height() == 0 {
                return Err(DrapeError::crop("crop produced an empty image"));
            }
            image.replace_working(cropped);
            Ok(())
        })?;
        let CropOutcome::Applied(region) = outcome else {
            return Err(DrapeError::crop("crop tool is not active"));
        };
        view.resize_image(image.width(), image.height());
        view.reset();
        log::info!(
            "Applied crop at ({:.1}, {:.1}) d={:.1}px, working image now {}x{}",
            region.center_image.x,
            region.center_image.y,
            region.diameter_image_px,
            image.width(),
            image.height()
        );

        // Scale is unaffected (no resampling); the line no longer sits on
        // the new pixel grid
        self.reference.clear();
        if let Some(calibration) = self.calibration.as_mut() {
            calibration.line_image = None;
        }
        self.invalidate("crop applied");
        Ok(region)
    }

    pub fn cancel_crop(&mut self) {
        if self.crop.is_active() {
            self.crop.cancel();
            self.invalidate("crop cancelled");
        }
    }

    // ------------------------------------------------------------------------
    // Measurement
    // ------------------------------------------------------------------------

    /// Issue a segmentation request for the working image.
    ///
    /// At most one request per working image may be outstanding.
    pub fn begin_measurement(&mut self) -> Result<SegmentationRequest> {
        let image = self.working_image().ok_or(DrapeError::NoImage)?.clone();
        if self.calibration.is_none() {
            return Err(DrapeError::NotCalibrated);
        }
        if self.is_measuring() {
            return Err(DrapeError::MeasurementInProgress);
        }
        self.in_flight = Some(self.generation);
        log::info!(
            "Segmentation requested for generation {} ({}x{})",
            self.generation,
            image.width(),
            image.height()
        );
        Ok(SegmentationRequest::new(self.generation, image))
    }

    /// Apply a segmentation response. Stale responses are discarded and
    /// never touch session state beyond clearing their in-flight mark.
    pub fn complete_measurement(&mut self, response: SegmentationResponse) -> Result<MeasurementOutcome> {
        if self.in_flight == Some(response.generation) {
            self.in_flight = None;
        }
        if response.generation != self.generation {
            log::info!(
                "Discarding segmentation result for generation {} (current {})",
                response.generation,
                self.generation
            );
            return Ok(MeasurementOutcome::Discarded);
        }

        let segmentation = response
            .result
            .map_err(|e| DrapeError::segmentation("engine returned an error", e))?;
        let region = segmentation.largest().ok_or(DrapeError::NoRegionFound)?;
        let scale = self.scale_factor().ok_or(DrapeError::NotCalibrated)?;

        let measurement = Measurement::from_pixel_area(region.area_px, scale, &self.settings);
        log::info!(
            "Measured {:.0} px = {:.2} cm², drape {:.1}% ({})",
            region.area_px,
            measurement.area_cm2,
            measurement.drape_coefficient_pct,
            measurement.category()
        );
        self.history.record(measurement.clone());
        Ok(MeasurementOutcome::Recorded(measurement))
    }

    /// Issue, run and complete one segmentation round trip
    pub async fn measure(&mut self) -> Result<MeasurementOutcome> {
        let request = self.begin_measurement()?;
        let response = request.run(Arc::clone(&self.engine)).await;
        self.complete_measurement(response)
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    // ------------------------------------------------------------------------
    // Message dispatch
    // ------------------------------------------------------------------------

    pub fn update(&mut self, msg: Msg) -> Result<()> {
        match msg {
            Msg::Reference(action) => match action {
                DrawAction::Start(x, y) => {
                    self.reference_down(Point2D::new(x, y));
                }
                DrawAction::Move(x, y) => self.reference_move(Point2D::new(x, y)),
                DrawAction::End(x, y) => {
                    self.reference_up(Point2D::new(x, y))?;
                }
            },
            Msg::ClearReference => self.clear_reference(),
            Msg::ReferenceDiameter(d) => self.set_reference_diameter(d)?,
            Msg::Crop(crop) => match crop {
                CropMsg::Begin => self.begin_crop()?,
                CropMsg::Pointer(DrawAction::Start(x, y)) => {
                    self.crop.grab(Point2D::new(x, y));
                }
                CropMsg::Pointer(DrawAction::Move(x, y)) => self.crop.drag(Point2D::new(x, y)),
                CropMsg::Pointer(DrawAction::End(x, y)) => {
                    self.crop.drag(Point2D::new(x, y));
                    self.crop.release();
                }
                CropMsg::Resize(d) => self.crop.set_diameter(d),
                CropMsg::Apply => {
                    self.apply_crop()?;
                }
                CropMsg::Cancel => self.cancel_crop(),
            },
            Msg::Zoom(ZoomAction::In) => {
                self.zoom_in();
            }
            Msg::Zoom(ZoomAction::Out) => {
                self.zoom_out();
            }
            Msg::Zoom(ZoomAction::Set(z)) => self.set_zoom(z),
            Msg::Pan(dx, dy) => self.pan_by(Vector2D::new(dx, dy)),
            Msg::ResetView => self.reset_view(),
            Msg::CanvasResized(w, h) => self.set_canvas_size(w, h),
            Msg::DrapeSettings {
                disk_diameter_cm,
                fabric_diameter_cm,
            } => self.set_drape_settings(disk_diameter_cm, fabric_diameter_cm)?,
            Msg::ResetAll => self.reset(),
            Msg::ClearHistory => self.clear_history(),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::segmentation::{MaskSegmenter, Region, Segmentation};
    use image::Rgba;

    /// Engine returning a fixed set of regions
    struct FixedEngine(Vec<f64>);

    impl SegmentationEngine for FixedEngine {
        fn segment_foreground_region(&self, _image: &RgbaImage) -> anyhow::Result<Segmentation> {
            Ok(Segmentation {
                regions: self
                    .0
                    .iter()
                    .map(|&area_px| Region {
                        boundary: Vec::new(),
                        area_px,
                    })
                    .collect(),
            })
        }
    }

    struct FailingEngine;

    impl SegmentationEngine for FailingEngine {
        fn segment_foreground_region(&self, _image: &RgbaImage) -> anyhow::Result<Segmentation> {
            anyhow::bail!("threshold produced no contours")
        }
    }

    fn session_with(engine: Arc<dyn SegmentationEngine>) -> MeasurementSession {
        let mut session = MeasurementSession::new(DrapeConfig::default(), engine).unwrap();
        session.set_canvas_size(1000.0, 1000.0);
        session
            .load_image(RgbaImage::from_pixel(1000, 1000, Rgba([255, 255, 255, 255])))
            .unwrap();
        session
    }

    fn calibrate(session: &mut MeasurementSession, length: f64) -> ScaleFactor {
        session.update(Msg::Reference(DrawAction::Start(100.0, 500.0))).unwrap();
        session
            .update(Msg::Reference(DrawAction::Move(150.0, 500.0)))
            .unwrap();
        session.reference_up(Point2D::new(100.0 + length, 500.0)).unwrap().unwrap()
    }

    #[test]
    fn test_calibration_is_in_image_space() {
        let mut session = session_with(Arc::new(FixedEngine(vec![])));
        session.update(Msg::Zoom(ZoomAction::Set(2.0))).unwrap();
        // 118 screen px at zoom 2 is 59 image px
        let scale = calibrate(&mut session, 118.0);
        assert!((scale.pixels_per_cm() - 23.6).abs() < 1e-9);

        // Zoom and pan afterwards do not change the scale factor
        session.update(Msg::Zoom(ZoomAction::In)).unwrap();
        session.update(Msg::Pan(40.0, -10.0)).unwrap();
        assert_eq!(session.scale_factor(), Some(scale));

        // The drawn line follows the view
        let line = session.reference_line_on_screen().unwrap();
        assert!((line.length() - 59.0 * 2.4).abs() < 1e-6);
    }

    #[test]
    fn test_reference_down_outside_image_ignored() {
        let mut session = MeasurementSession::new(DrapeConfig::default(), Arc::new(MaskSegmenter::default())).unwrap();
        session.set_canvas_size(1000.0, 1000.0);
        session
            .load_image(RgbaImage::new(1000, 500))
            .unwrap();
        // Letterbox bar above the image
        assert!(!session.reference_down(Point2D::new(500.0, 100.0)));
        assert!(session.reference_down(Point2D::new(500.0, 500.0)));
    }

    #[test]
    fn test_reference_diameter_change() {
        let engine = FixedEngine(vec![100.0]);
        let mut session = session_with(Arc::new(FixedEngine(vec![100.0])));
        calibrate(&mut session, 118.0);
        let generation = session.generation();

        assert!(session.set_reference_diameter(-1.0).is_err());
        assert!(session.set_reference_diameter(f64::NAN).is_err());
        assert!((session.scale_factor().unwrap().pixels_per_cm() - 47.2).abs() < 1e-9);
        assert_eq!(session.reference_diameter_cm(), 2.5);
        assert_eq!(session.generation(), generation);

        let request = session.begin_measurement().unwrap();
        session.update(Msg::ReferenceDiameter(2.0)).unwrap();
        assert!(session.scale_factor().is_none());
        assert!(session.reference_line_on_screen().is_none());
        assert_eq!(session.reference_diameter_cm(), 2.0);
        assert!(session.generation() > generation);
        let outcome = session.complete_measurement(request.run_blocking(&engine)).unwrap();
        assert_eq!(outcome, MeasurementOutcome::Discarded);

        // Redrawing uses the new diameter
        let scale = calibrate(&mut session, 118.0);
        assert!((scale.pixels_per_cm() - 59.0).abs() < 1e-9);
    }

    #[test]
    fn test_clear_reference_invalidates() {
        let engine = FixedEngine(vec![100.0]);
        let mut session = session_with(Arc::new(FixedEngine(vec![100.0])));
        calibrate(&mut session, 118.0);
        let request = session.begin_measurement().unwrap();
        let generation = session.generation();

        session.update(Msg::ClearReference).unwrap();
        assert!(session.scale_factor().is_none());
        assert_eq!(*session.reference(), ReferenceLine::Idle);
        assert!(session.generation() > generation);

        let outcome = session.complete_measurement(request.run_blocking(&engine)).unwrap();
        assert_eq!(outcome, MeasurementOutcome::Discarded);
        assert!(session.history().is_empty());
        assert!(matches!(session.begin_measurement(), Err(DrapeError::NotCalibrated)));
    }

    #[test]
    fn test_zero_length_line_clears_calibration() {
        let mut session = session_with(Arc::new(FixedEngine(vec![])));
        calibrate(&mut session, 118.0);
        session.reference_down(Point2D::new(300.0, 300.0));
        let result = session.reference_up(Point2D::new(300.0, 300.0));
        assert!(matches!(result, Err(DrapeError::InvalidCalibrationInput { .. })));
        assert!(session.scale_factor().is_none());
    }

    #[test]
    fn test_measure_requires_calibration() {
        let mut session = session_with(Arc::new(FixedEngine(vec![50_000.0])));
        assert!(matches!(session.begin_measurement(), Err(DrapeError::NotCalibrated)));
        let mut empty = MeasurementSession::new(DrapeConfig::default(), Arc::new(MaskSegmenter::default())).unwrap();
        assert!(matches!(empty.begin_measurement(), Err(DrapeError::NoImage)));
    }

    #[tokio::test]
    async fn test_measure_records_history() {
        let mut session = session_with(Arc::new(FixedEngine(vec![10.0, 50_000.0, 200.0])));
        calibrate(&mut session, 118.0);
        let outcome = session.measure().await.unwrap();
        let MeasurementOutcome::Recorded(m) = outcome else {
            panic!("expected a recorded measurement");
        };
        assert!((m.area_cm2 - 22.443).abs() < 1e-2);
        assert_eq!(session.history().len(), 1);
        assert!(!session.is_measuring());
    }

    #[test]
    fn test_reentrant_request_rejected() {
        let mut session = session_with(Arc::new(FixedEngine(vec![100.0])));
        calibrate(&mut session, 118.0);
        let request = session.begin_measurement().unwrap();
        assert!(session.is_measuring());
        assert!(matches!(
            session.begin_measurement(),
            Err(DrapeError::MeasurementInProgress)
        ));
        let engine = FixedEngine(vec![100.0]);
        let response = request.run_blocking(&engine);
        assert!(matches!(
            session.complete_measurement(response),
            Ok(MeasurementOutcome::Recorded(_))
        ));
        assert!(session.begin_measurement().is_ok());
    }

    #[test]
    fn test_stale_result_discarded() {
        let engine = FixedEngine(vec![100.0]);
        let mut session = session_with(Arc::new(FixedEngine(vec![100.0])));
        calibrate(&mut session, 118.0);
        let request = session.begin_measurement().unwrap();

        session
            .load_image(RgbaImage::from_pixel(500, 500, Rgba([0, 0, 0, 255])))
            .unwrap();
        // A new image allows a new request even while the old one runs
        assert!(!session.is_measuring());

        let outcome = session.complete_measurement(request.run_blocking(&engine)).unwrap();
        assert_eq!(outcome, MeasurementOutcome::Discarded);
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_stale_after_crop_cancel() {
        let engine = FixedEngine(vec![100.0]);
        let mut session = session_with(Arc::new(FixedEngine(vec![100.0])));
        calibrate(&mut session, 118.0);
        session.update(Msg::Crop(CropMsg::Begin)).unwrap();
        let request = session.begin_measurement().unwrap();
        session.update(Msg::Crop(CropMsg::Cancel)).unwrap();
        let outcome = session.complete_measurement(request.run_blocking(&engine)).unwrap();
        assert_eq!(outcome, MeasurementOutcome::Discarded);
        // Calibration untouched by the discarded result
        assert!(session.scale_factor().is_some());
    }

    #[test]
    fn test_stale_after_crop_apply() {
        let engine = FixedEngine(vec![100.0]);
        let mut session = session_with(Arc::new(FixedEngine(vec![100.0])));
        let scale = calibrate(&mut session, 118.0);
        session.update(Msg::Crop(CropMsg::Begin)).unwrap();
        let request = session.begin_measurement().unwrap();
        session.update(Msg::Crop(CropMsg::Apply)).unwrap();

        let outcome = session.complete_measurement(request.run_blocking(&engine)).unwrap();
        assert_eq!(outcome, MeasurementOutcome::Discarded);
        assert!(session.history().is_empty());
        assert_eq!(session.scale_factor(), Some(scale));
        // The cropped image can be measured afresh
        assert!(session.begin_measurement().is_ok());
    }

    #[test]
    fn test_crop_without_canvas_rejected() {
        let mut session =
            MeasurementSession::new(DrapeConfig::default(), Arc::new(MaskSegmenter::default()))
                .unwrap();
        session.load_image(RgbaImage::new(100, 100)).unwrap();
        session.begin_crop().unwrap();
        assert!(matches!(
            session.crop_preview(),
            Err(DrapeError::InvalidCropGeometry { .. })
        ));
        assert!(session.apply_crop().is_err());
        assert!(session.crop_tool().is_active());
        assert!(!session.image().unwrap().is_modified());
        assert!(!session.reference_down(Point2D::new(50.0, 50.0)));

        // Laying the image out makes the same crop valid
        session.set_canvas_size(100.0, 100.0);
        session.begin_crop().unwrap();
        let region = session.crop_preview().unwrap();
        assert!(region.diameter_image_px.is_finite());
        assert_eq!(region.center_image, Point2D::new(50.0, 50.0));
    }

    /// Engine whose crop always comes back empty
    struct EmptyCropEngine;

    impl SegmentationEngine for EmptyCropEngine {
        fn segment_foreground_region(&self, _image: &RgbaImage) -> anyhow::Result<Segmentation> {
            Ok(Segmentation::default())
        }

        fn crop_circular(&self, _image: &RgbaImage, _center: Point2D, _diameter: f64) -> RgbaImage {
            RgbaImage::new(0, 0)
        }
    }

    #[test]
    fn test_failed_crop_leaves_state_untouched() {
        let mut session = session_with(Arc::new(EmptyCropEngine));
        calibrate(&mut session, 118.0);
        session.update(Msg::Crop(CropMsg::Begin)).unwrap();
        let circle = session.crop_tool().circle();
        let generation = session.generation();

        let result = session.update(Msg::Crop(CropMsg::Apply));
        assert!(matches!(result, Err(DrapeError::InvalidCropGeometry { .. })));
        assert!(session.crop_tool().is_active());
        assert_eq!(session.crop_tool().circle(), circle);
        assert!(!session.image().unwrap().is_modified());
        assert!(session.reference_line_on_screen().is_some());
        assert_eq!(session.generation(), generation);
    }

    #[test]
    fn test_no_region_and_engine_failure() {
        let mut session = session_with(Arc::new(FixedEngine(vec![])));
        calibrate(&mut session, 118.0);
        let request = session.begin_measurement().unwrap();
        let result = session.complete_measurement(request.run_blocking(&FixedEngine(vec![])));
        assert!(matches!(result, Err(DrapeError::NoRegionFound)));
        assert!(!session.is_measuring());

        let request = session.begin_measurement().unwrap();
        let result = session.complete_measurement(request.run_blocking(&FailingEngine));
        assert!(matches!(result, Err(DrapeError::Segmentation { .. })));
        assert!(session.scale_factor().is_some());
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_invalid_drape_settings_rejected() {
        let mut session = session_with(Arc::new(FixedEngine(vec![])));
        let result = session.update(Msg::DrapeSettings {
            disk_diameter_cm: 30.0,
            fabric_diameter_cm: 30.0,
        });
        assert!(matches!(result, Err(DrapeError::InvalidDrapeSettings { .. })));
        assert_eq!(session.settings(), DrapeSettings::default());
    }

    #[tokio::test]
    async fn test_crop_then_measure_with_mask() {
        let mut mask = RgbaImage::from_pixel(1000, 1000, Rgba([0, 0, 0, 255]));
        // White 200x200 square in the centre, plus a stray blob in a corner
        for x in 400..600 {
            for y in 400..600 {
                mask.put_pixel(x, y, Rgba([255, 255, 255, 255]));
            }
        }
        for x in 0..50 {
            for y in 0..50 {
                mask.put_pixel(x, y, Rgba([255, 255, 255, 255]));
            }
        }
        let mut session =
            MeasurementSession::new(DrapeConfig::default(), Arc::new(MaskSegmenter::default()))
                .unwrap();
        session.set_canvas_size(1000.0, 1000.0);
        session.load_image(mask).unwrap();
        let scale = calibrate(&mut session, 100.0);
        assert!((scale.pixels_per_cm() - 40.0).abs() < 1e-9);

        session.update(Msg::Crop(CropMsg::Begin)).unwrap();
        session.update(Msg::Crop(CropMsg::Resize(600.0))).unwrap();
        let region = session.crop_preview().unwrap();
        assert_eq!(region.center_image, Point2D::new(500.0, 500.0));
        session.update(Msg::Crop(CropMsg::Apply)).unwrap();

        let image = session.image().unwrap();
        assert_eq!((image.width(), image.height()), (600, 600));
        assert_eq!(image.original().dimensions(), (1000, 1000));
        assert_eq!(session.scale_factor(), Some(scale));
        assert!(session.reference_line_on_screen().is_none());

        let MeasurementOutcome::Recorded(m) = session.measure().await.unwrap() else {
            panic!("expected a recorded measurement");
        };
        // Only the centre square survives the crop: 40_000 px / 40² = 25 cm²
        assert!((m.area_cm2 - 25.0).abs() < 1e-9);

        session.update(Msg::ResetAll).unwrap();
        let image = session.image().unwrap();
        assert_eq!((image.width(), image.height()), (1000, 1000));
        assert!(session.scale_factor().is_none());
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn test_zoom_messages_use_config_factors() {
        let mut session = session_with(Arc::new(FixedEngine(vec![])));
        session.update(Msg::Zoom(ZoomAction::In)).unwrap();
        session.update(Msg::Zoom(ZoomAction::In)).unwrap();
        assert!((session.view().unwrap().zoom() - 1.44).abs() < 1e-9);
        session.update(Msg::Zoom(ZoomAction::Out)).unwrap();
        assert!((session.view().unwrap().zoom() - 1.152).abs() < 1e-9);
        session.update(Msg::ResetView).unwrap();
        assert_eq!(session.view().unwrap().zoom(), 1.0);
    }
}
