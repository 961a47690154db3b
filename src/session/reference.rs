//! Reference line gesture: `Idle → Drawing → Set → Idle`
//!
//! Points are stored in screen space as captured from pointer events.

use crate::domain::{Point2D, Segment};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum ReferenceLine {
    #[default]
    Idle,
    /// Pointer is down; `end` follows the pointer once it has moved
    Drawing {
        start: Point2D,
        end: Option<Point2D>,
    },
    /// Pointer released; the line is final
    Set { start: Point2D, end: Point2D },
}

impl ReferenceLine {
    pub fn start(&self) -> Option<Point2D> {
        match *self {
            ReferenceLine::Idle => None,
            ReferenceLine::Drawing { start, .. } | ReferenceLine::Set { start, .. } => Some(start),
        }
    }

    pub fn end(&self) -> Option<Point2D> {
        match *self {
            ReferenceLine::Idle => None,
            ReferenceLine::Drawing { end, .. } => end,
            ReferenceLine::Set { end, .. } => Some(end),
        }
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self, ReferenceLine::Drawing { .. })
    }

    pub fn is_set(&self) -> bool {
        matches!(self, ReferenceLine::Set { .. })
    }

    /// Pointer down: start a fresh line, discarding any previous one
    pub fn begin(&mut self, at: Point2D) {
        *self = ReferenceLine::Drawing {
            start: at,
            end: None,
        };
    }

    /// Pointer move while drawing; ignored in any other state
    pub fn update(&mut self, at: Point2D) {
        if let ReferenceLine::Drawing { end, .. } = self {
            *end = Some(at);
        }
    }

    /// Pointer up: finalize and return the finished segment.
    /// Returns `None` if no line was being drawn.
    pub fn finish(&mut self, at: Point2D) -> Option<Segment> {
        let ReferenceLine::Drawing { start, .. } = *self else {
            return None;
        };
        *self = ReferenceLine::Set { start, end: at };
        Some(Segment::new(start, at))
    }

    pub fn clear(&mut self) {
        *self = ReferenceLine::Idle;
    }

    pub fn segment(&self) -> Option<Segment> {
        Some(Segment::new(self.start()?, self.end()?))
    }
}
