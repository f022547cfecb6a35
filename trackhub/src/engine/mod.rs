//! Multi-object tracking engines.
//!
//! A [`TrackingEngine`] takes one batch of canonical detections per call and
//! returns the detections it is currently tracking, each tagged with a
//! persistent track id. Engines are stateful and not thread-safe; a tracker
//! session owns exactly one and serializes every call behind its own lock.
//!
//! Sessions obtain engines from an [`EngineFactory`], which lets tests swap in
//! instrumented engines without touching the session or registry code.
//!
//! # Example
//!
//! ```ignore
//! use trackhub::engine::{ByteTrackFactory, EngineFactory, TrackerThresholds};
//!
//! let mut engine = ByteTrackFactory.create(&TrackerThresholds::default());
//! let tracked = engine.update(&detections)?;
//! ```

mod bytetrack;

pub use bytetrack::{ByteTrack, ByteTrackFactory};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::CanonicalBox;

/// Default confidence above which detections start and extend tracks.
pub const DEFAULT_TRACK_THRESH: f64 = 0.25;

/// Default number of frames a lost track is kept (at 30 fps).
pub const DEFAULT_TRACK_BUFFER: u32 = 30;

/// Default association threshold on `1 - IoU`.
pub const DEFAULT_MATCH_THRESH: f64 = 0.8;

/// Default source frame rate.
pub const DEFAULT_FRAME_RATE: u32 = 30;

/// Errors raised by a tracking engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// A detection could not be processed.
    #[error("invalid detection {index}: {reason}")]
    InvalidDetection { index: usize, reason: String },

    /// Engine-internal failure.
    #[error("engine failure: {0}")]
    Internal(String),
}

/// Tuning parameters handed to an engine when a session is created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackerThresholds {
    /// Confidence splitting high and low score detections.
    pub track_thresh: f64,
    /// Frames a lost track survives, relative to 30 fps.
    pub track_buffer: u32,
    /// Maximum `1 - IoU` cost accepted in the first association round.
    pub match_thresh: f64,
    /// Frame rate of the source video.
    pub frame_rate: u32,
}

impl Default for TrackerThresholds {
    fn default() -> Self {
        Self {
            track_thresh: DEFAULT_TRACK_THRESH,
            track_buffer: DEFAULT_TRACK_BUFFER,
            match_thresh: DEFAULT_MATCH_THRESH,
            frame_rate: DEFAULT_FRAME_RATE,
        }
    }
}

impl TrackerThresholds {
    /// Number of frames after which a lost track is dropped.
    pub fn max_time_lost(&self) -> u64 {
        (self.frame_rate as f64 / 30.0 * self.track_buffer as f64) as u64
    }
}

/// One raw detection in canonical geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub bbox: CanonicalBox,
    /// Confidence in `0.0..=1.0`.
    pub confidence: f64,
    pub class_id: u32,
}

impl Detection {
    pub fn new(bbox: CanonicalBox, confidence: f64, class_id: u32) -> Self {
        Self {
            bbox,
            confidence,
            class_id,
        }
    }
}

/// A detection that the engine has associated with a track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedBox {
    pub detection: Detection,
    pub track_id: u64,
}

/// A stateful multi-object tracker.
pub trait TrackingEngine: Send {
    /// Consumes one frame of detections and returns the tracked subset.
    ///
    /// The order of the returned boxes is the engine's own; callers must not
    /// assume it matches the input order.
    fn update(&mut self, detections: &[Detection]) -> Result<Vec<TrackedBox>, EngineError>;
}

/// Creates one engine per tracker session.
pub trait EngineFactory: Send + Sync {
    fn create(&self, thresholds: &TrackerThresholds) -> Box<dyn TrackingEngine>;
}
