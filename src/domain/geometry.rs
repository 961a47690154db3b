//! Geometric value types shared by calibration, view transform and crop

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// A position in one of the screen, canvas or image coordinate spaces
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub const ORIGIN: Point2D = Point2D { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point in the same space
    pub fn distance_to(self, other: Point2D) -> f64 {
        (other - self).length()
    }

    /// Clamp both coordinates into `[min_x, max_x] × [min_y, max_y]`
    pub fn clamp(self, min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Point2D {
        Point2D {
            x: self.x.clamp(min_x, max_x),
            y: self.y.clamp(min_y, max_y),
        }
    }
}

/// A displacement, e.g. a pan offset or a drag delta
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector2D {
    pub x: f64,
    pub y: f64,
}

impl Vector2D {
    pub const ZERO: Vector2D = Vector2D { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

impl Sub for Point2D {
    type Output = Vector2D;

    fn sub(self, rhs: Point2D) -> Vector2D {
        Vector2D::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Add<Vector2D> for Point2D {
    type Output = Point2D;

    fn add(self, rhs: Vector2D) -> Point2D {
        Point2D::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Add for Vector2D {
    type Output = Vector2D;

    fn add(self, rhs: Vector2D) -> Vector2D {
        Vector2D::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Mul<f64> for Vector2D {
    type Output = Vector2D;

    fn mul(self, rhs: f64) -> Vector2D {
        Vector2D::new(self.x * rhs, self.y * rhs)
    }
}

/// A straight segment between two points of the same space
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: Point2D,
    pub end: Point2D,
}

impl Segment {
    pub fn new(start: Point2D, end: Point2D) -> Self {
        Self { start, end }
    }

    pub fn length(&self) -> f64 {
        self.start.distance_to(self.end)
    }
}

/// The crop selection circle as the user sees it, in screen space
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScreenCircle {
    pub center: Point2D,
    pub diameter: f64,
}

impl ScreenCircle {
    pub fn new(center: Point2D, diameter: f64) -> Self {
        Self { center, diameter }
    }

    pub fn radius(&self) -> f64 {
        self.diameter * 0.5
    }

    /// Check if a screen point falls inside the circle
    pub fn contains(&self, p: Point2D) -> bool {
        self.center.distance_to(p) <= self.radius()
    }
}
