//! Box geometry shared by the engine, the sessions and the wire protocol.
//!
//! Detections travel over the wire in one of two encodings and are converted
//! to a single canonical form before they reach the tracking engine:
//!
//! ```text
//! wire (xywh | cxcywh) ──► CanonicalBox (corner + size, f64) ──► engine
//! engine output ──► CanonicalBox ──► wire (same encoding as the request)
//! ```
//!
//! The two conversions are exact inverses up to floating point error.

mod polygon;

pub use polygon::{Polygon, TriggerPosition};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building geometric primitives.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// A polygon needs at least three vertices.
    #[error("polygon has {0} points (minimum 3)")]
    TooFewPoints(usize),

    /// A coordinate was NaN or infinite.
    #[error("polygon point {0} is not finite")]
    NonFinitePoint(usize),
}

/// A 2-D point in canvas pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Wire encoding of the four geometry values of a box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoxFormat {
    /// Top-left corner plus width and height.
    Xywh,
    /// Center point plus width and height.
    #[default]
    Cxcywh,
}

impl BoxFormat {
    /// Converts four wire values into the canonical corner + size form.
    pub fn to_canonical(self, values: [f64; 4]) -> CanonicalBox {
        let [a, b, w, h] = values;
        match self {
            BoxFormat::Xywh => CanonicalBox::new(a, b, w, h),
            BoxFormat::Cxcywh => CanonicalBox::new(a - w / 2.0, b - h / 2.0, w, h),
        }
    }

    /// Converts a canonical box back into this encoding.
    pub fn from_canonical(self, bbox: &CanonicalBox) -> [f64; 4] {
        match self {
            BoxFormat::Xywh => [bbox.x, bbox.y, bbox.width, bbox.height],
            BoxFormat::Cxcywh => {
                let center = bbox.center();
                [center.x, center.y, bbox.width, bbox.height]
            }
        }
    }
}

/// Axis-aligned box as corner + size, the form handed to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CanonicalBox {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl CanonicalBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds a box from its corner coordinates `(x1, y1, x2, y2)`.
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self::new(x1, y1, x2 - x1, y2 - y1)
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersection over union with another box; zero for degenerate unions.
    pub fn iou(&self, other: &CanonicalBox) -> f64 {
        let iw = (self.right().min(other.right()) - self.x.max(other.x)).max(0.0);
        let ih = (self.bottom().min(other.bottom()) - self.y.max(other.y)).max(0.0);
        let intersection = iw * ih;
        let union = self.area() + other.area() - intersection;
        if union <= f64::EPSILON {
            return 0.0;
        }
        intersection / union
    }

    /// Returns the reference point used by region and trace evaluation.
    pub fn anchor(&self, position: TriggerPosition) -> Point {
        let (fx, fy) = position.fractions();
        Point::new(self.x + self.width * fx, self.y + self.height * fy)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }
}

/// Rounds half to even, matching the rounding of the wire protocol.
pub fn round_wire(value: f64) -> i64 {
    value.round_ties_even() as i64
}
