//! Conversion between wire rows and canonical detections.
//!
//! A wire row is `[g1, g2, g3, g4, confidence, class_id]`, where the four
//! geometry values follow the session [`BoxFormat`] and the confidence is on
//! a 0-100 scale. Tracked boxes go back out as
//! `[g1, g2, g3, g4, confidence, class_id, track_id]` rounded to integers.

use serde::Deserialize;
use thiserror::Error;

use crate::engine::{Detection, TrackedBox};
use crate::geometry::{round_wire, BoxFormat};

/// Number of values in an incoming detection row.
pub const WIRE_ROW_LEN: usize = 6;

/// Upper bound of the wire confidence scale.
const CONFIDENCE_SCALE: f64 = 100.0;

/// A detection row that could not be converted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    #[error("box {row} has {len} values, expected {expected}", expected = WIRE_ROW_LEN)]
    Shape { row: usize, len: usize },

    #[error("box {row}: {reason}")]
    Value { row: usize, reason: String },
}

/// Track request body as sent by the client.
///
/// Detector payloads carry extra keys such as `count` or `perf`; only
/// `boxes` and `image` are read.
#[derive(Debug, Clone, Deserialize)]
pub struct WireBatch {
    pub boxes: Vec<Vec<f64>>,
    /// Optional base64 frame to annotate instead of a transparent canvas.
    #[serde(default)]
    pub image: Option<String>,
}

impl WireBatch {
    /// Converts the rows into a canonical [`DetectionBatch`].
    pub fn into_batch(self, format: BoxFormat) -> Result<DetectionBatch, ConversionError> {
        Ok(DetectionBatch {
            detections: convert_batch(format, &self.boxes)?,
            image: self.image,
        })
    }
}

/// One frame of canonical detections ready for a tracker session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionBatch {
    pub detections: Vec<Detection>,
    pub image: Option<String>,
}

impl DetectionBatch {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self {
            detections,
            image: None,
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }
}

/// Converts every wire row, failing on the first invalid one.
pub fn convert_batch(
    format: BoxFormat,
    rows: &[Vec<f64>],
) -> Result<Vec<Detection>, ConversionError> {
    rows.iter()
        .enumerate()
        .map(|(row, values)| convert_row(format, row, values))
        .collect()
}

fn convert_row(format: BoxFormat, row: usize, values: &[f64]) -> Result<Detection, ConversionError> {
    let &[g1, g2, g3, g4, confidence, class_id] = values else {
        return Err(ConversionError::Shape {
            row,
            len: values.len(),
        });
    };
    let invalid = |reason: String| ConversionError::Value { row, reason };

    if let Some(i) = values.iter().position(|v| !v.is_finite()) {
        return Err(invalid(format!("value {i} is not finite")));
    }
    if g3 < 0.0 || g4 < 0.0 {
        return Err(invalid(format!("negative size {g3}x{g4}")));
    }
    if !(0.0..=CONFIDENCE_SCALE).contains(&confidence) {
        return Err(invalid(format!("confidence {confidence} outside 0-100")));
    }
    if class_id < 0.0 || class_id.fract() != 0.0 || class_id > u32::MAX as f64 {
        return Err(invalid(format!("class id {class_id} is not a non-negative integer")));
    }

    Ok(Detection::new(
        format.to_canonical([g1, g2, g3, g4]),
        confidence / CONFIDENCE_SCALE,
        class_id as u32,
    ))
}

/// Encodes a tracked box as an integer wire row.
pub fn to_wire(format: BoxFormat, tracked: &TrackedBox) -> [i64; 7] {
    let [g1, g2, g3, g4] = format.from_canonical(&tracked.detection.bbox);
    [
        round_wire(g1),
        round_wire(g2),
        round_wire(g3),
        round_wire(g4),
        round_wire(tracked.detection.confidence * CONFIDENCE_SCALE),
        i64::from(tracked.detection.class_id),
        tracked.track_id as i64,
    ]
}
