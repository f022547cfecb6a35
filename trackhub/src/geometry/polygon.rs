//! Polygons and trigger positions for filter regions.

use serde::{Deserialize, Serialize};

use super::{GeometryError, Point};

/// Reference point of a box used when testing region membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerPosition {
    Center,
    CenterLeft,
    CenterRight,
    TopCenter,
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomCenter,
    BottomRight,
}

impl TriggerPosition {
    /// Horizontal and vertical offsets as fractions of the box size.
    pub(crate) fn fractions(self) -> (f64, f64) {
        match self {
            TriggerPosition::Center => (0.5, 0.5),
            TriggerPosition::CenterLeft => (0.0, 0.5),
            TriggerPosition::CenterRight => (1.0, 0.5),
            TriggerPosition::TopCenter => (0.5, 0.0),
            TriggerPosition::TopLeft => (0.0, 0.0),
            TriggerPosition::TopRight => (1.0, 0.0),
            TriggerPosition::BottomLeft => (0.0, 1.0),
            TriggerPosition::BottomCenter => (0.5, 1.0),
            TriggerPosition::BottomRight => (1.0, 1.0),
        }
    }
}

/// A simple closed polygon in canvas coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    points: Vec<Point>,
}

impl Polygon {
    /// Creates a polygon from `[x, y]` pairs.
    ///
    /// # Errors
    ///
    /// Returns an error for fewer than three points or non-finite coordinates.
    pub fn new(points: &[[f64; 2]]) -> Result<Self, GeometryError> {
        if points.len() < 3 {
            return Err(GeometryError::TooFewPoints(points.len()));
        }
        if let Some(idx) = points
            .iter()
            .position(|[x, y]| !x.is_finite() || !y.is_finite())
        {
            return Err(GeometryError::NonFinitePoint(idx));
        }
        Ok(Self {
            points: points.iter().map(|[x, y]| Point::new(*x, *y)).collect(),
        })
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Even-odd ray casting test.
    ///
    /// Points strictly inside are always reported inside and points strictly
    /// outside never are; points exactly on an edge may go either way.
    pub fn contains(&self, point: Point) -> bool {
        let mut inside = false;
        let n = self.points.len();
        let mut j = n - 1;
        for i in 0..n {
            let pi = self.points[i];
            let pj = self.points[j];
            if (pi.y > point.y) != (pj.y > point.y) {
                let x_cross = pj.x + (point.y - pj.y) * (pi.x - pj.x) / (pi.y - pj.y);
                if point.x < x_cross {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }
}
