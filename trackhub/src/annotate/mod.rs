//! Annotated image rendering for track results.
//!
//! The session hands an [`Annotator`] a scene (either the client supplied
//! frame or a transparent canvas of the session resolution) together with the
//! tracked boxes, trace history, region polygons and label map of the current
//! call. The annotated scene is returned to the client as a base64 PNG.
//!
//! ```text
//! request image ──► decode_base64_image ──┐
//!                                         ├──► Annotator::annotate ──► encode_base64_png
//! transparent canvas (no image) ──────────┘
//! ```

mod codec;
mod renderer;

pub use codec::{decode_base64_image, encode_base64_png};
pub use renderer::MaskRenderer;

use std::collections::HashMap;

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::TrackedBox;
use crate::geometry::{Point, Polygon};

/// Errors raised while decoding, drawing or encoding annotation images.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnnotationError {
    /// The client supplied image could not be decoded.
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// The annotated image could not be encoded.
    #[error("failed to encode image: {0}")]
    Encode(String),

    /// The client supplied image does not match the session canvas.
    #[error("image is {actual_width}x{actual_height}, session canvas is {expected_width}x{expected_height}")]
    SizeMismatch {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    /// Drawing failed.
    #[error("render error: {0}")]
    Render(String),
}

/// Per-session annotation settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnnotationConfig {
    /// Whether `track` renders an annotated image at all.
    pub enabled: bool,
    pub box_thickness: f32,
    pub trace_thickness: f32,
    pub polygon_thickness: f32,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            box_thickness: 2.0,
            trace_thickness: 2.0,
            polygon_thickness: 2.0,
        }
    }
}

/// Everything drawn on top of the scene for one `track` call.
#[derive(Debug)]
pub struct AnnotationInput<'a> {
    pub boxes: &'a [TrackedBox],
    /// Recent anchor points per track id, oldest first.
    pub traces: Vec<(u64, Vec<Point>)>,
    /// Region name and polygon, in region order.
    pub regions: Vec<(&'a str, &'a Polygon)>,
    pub labels: &'a HashMap<u32, String>,
    pub style: AnnotationConfig,
}

impl AnnotationInput<'_> {
    /// Caption for a box: `#<track id> <label or class id>`.
    pub fn caption(&self, tracked: &TrackedBox) -> String {
        let class_id = tracked.detection.class_id;
        match self.labels.get(&class_id) {
            Some(name) => format!("#{} {}", tracked.track_id, name),
            None => format!("#{} {}", tracked.track_id, class_id),
        }
    }
}

/// Draws tracking results onto a scene.
pub trait Annotator: Send + Sync {
    fn annotate(
        &self,
        scene: RgbaImage,
        input: &AnnotationInput<'_>,
    ) -> Result<RgbaImage, AnnotationError>;
}
