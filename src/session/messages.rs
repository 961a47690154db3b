//! Message types for a measurement session
//!
//! The UI layer translates its pointer, button and settings events into these
//! and feeds them to [`MeasurementSession::update`](super::state::MeasurementSession::update).
//! All positions are in screen space.

// ============================================================================
// Pointer Action Types
// ============================================================================

/// Pointer gesture phases shared by the reference line and crop circle
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawAction {
    /// Pointer pressed at position
    Start(f64, f64),
    /// Pointer moved to position
    Move(f64, f64),
    /// Pointer released at position
    End(f64, f64),
}

/// Crop tool messages
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CropMsg {
    /// Enter crop mode with a circle centred on the image
    Begin,
    /// Drag the circle
    Pointer(DrawAction),
    /// Set the on-screen diameter
    Resize(f64),
    /// Destructively crop the working image
    Apply,
    /// Leave crop mode without changes
    Cancel,
}

/// Zoom button actions
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoomAction {
    In,
    Out,
    Set(f64),
}

// ============================================================================
// Session Messages
// ============================================================================

/// All inputs a measurement session reacts to
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Msg {
    /// Reference line gesture
    Reference(DrawAction),
    /// Remove the reference line and its scale factor
    ClearReference,
    /// Real-world diameter of the reference object changed (cm)
    ReferenceDiameter(f64),
    /// Crop tool
    Crop(CropMsg),
    /// Zoom in/out or to an explicit level
    Zoom(ZoomAction),
    /// Pan by a screen-space drag delta
    Pan(f64, f64),
    /// Zoom 1, no pan
    ResetView,
    /// Drawing surface was resized (canvas pixels)
    CanvasResized(f64, f64),
    /// Drape tester geometry changed
    DrapeSettings {
        disk_diameter_cm: f64,
        fabric_diameter_cm: f64,
    },
    /// Restore the original image and clear calibration and crop
    ResetAll,
    /// Forget all recorded measurements
    ClearHistory,
}
