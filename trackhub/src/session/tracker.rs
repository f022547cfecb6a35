//! The tracker session: one engine behind one lock.
//!
//! ```text
//! track(batch)
//!   lock ─► engine.update ─► filter regions ─► record traces ─► annotate ─► unlock
//!               │ error                                            │ error
//!               ▼                                                  ▼
//!        empty result + TrackFailure::Engine          image omitted + TrackFailure::Annotation
//! ```
//!
//! Failures in the engine or the annotator never surface as errors; the
//! caller always gets a [`TrackResult`] and can inspect
//! [`TrackResult::failure`].

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use image::RgbaImage;
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::annotate::{
    decode_base64_image, encode_base64_png, AnnotationError, AnnotationInput, Annotator,
};
use crate::engine::{EngineError, TrackedBox, TrackingEngine};

use super::config::{ConfigError, SessionConfig};
use super::conversion::{to_wire, DetectionBatch};
use super::region::FilterRegion;
use super::trace::TraceHistory;

/// Why a `track` call returned a degraded result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackFailure {
    #[error(transparent)]
    Engine(EngineError),

    #[error(transparent)]
    Annotation(AnnotationError),
}

/// Outcome of one `track` call as serialized to the client.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackResult {
    /// `[g1, g2, g3, g4, confidence, class_id, track_id]` in engine order.
    pub tracked_boxes: Vec<[i64; 7]>,
    /// Track ids inside each region, keyed by region name.
    pub filtered_regions: BTreeMap<String, Vec<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotated_image_mask: Option<String>,
    /// Set when the result was degraded. Never sent over the wire.
    #[serde(skip)]
    pub failure: Option<TrackFailure>,
}

impl TrackResult {
    fn degraded(failure: TrackFailure) -> Self {
        Self {
            failure: Some(failure),
            ..Default::default()
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.failure.is_some()
    }
}

struct SessionState {
    engine: Box<dyn TrackingEngine>,
    traces: TraceHistory,
    frames: u64,
}

/// A single tracking context owned by the registry.
pub struct TrackerSession {
    config: SessionConfig,
    regions: Vec<FilterRegion>,
    annotator: Arc<dyn Annotator>,
    state: Mutex<SessionState>,
    created_at: DateTime<Utc>,
}

impl std::fmt::Debug for TrackerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerSession")
            .field("resolution", &self.config.resolution)
            .field("regions", &self.regions.len())
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl TrackerSession {
    /// Validates the configuration and wraps the engine.
    pub fn new(
        config: SessionConfig,
        engine: Box<dyn TrackingEngine>,
        annotator: Arc<dyn Annotator>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let regions = config
            .regions
            .iter()
            .map(|(name, region)| {
                FilterRegion::from_config(name, region).map_err(|source| ConfigError::Region {
                    name: name.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            config,
            regions,
            annotator,
            state: Mutex::new(SessionState {
                engine,
                traces: TraceHistory::new(),
                frames: 0,
            }),
            created_at: Utc::now(),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn regions(&self) -> &[FilterRegion] {
        &self.regions
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Number of `track` calls so far, degraded ones included. Waits for any
    /// in-flight `track`.
    pub fn frames_processed(&self) -> u64 {
        self.state.lock().frames
    }

    /// Runs one frame through the engine while holding the session lock.
    pub fn track(&self, batch: &DetectionBatch) -> TrackResult {
        let mut state = self.state.lock();
        state.frames += 1;
        let frame = state.frames;

        let update = catch_unwind(AssertUnwindSafe(|| {
            state.engine.update(&batch.detections)
        }))
        .unwrap_or_else(|_| Err(EngineError::Internal("engine panicked".to_string())));

        let tracked = match update {
            Ok(tracked) => tracked,
            Err(e) => {
                warn!(error = %e, frame, "Tracking engine failed, returning empty result");
                return TrackResult::degraded(TrackFailure::Engine(e));
            }
        };

        let filtered_regions = self
            .regions
            .iter()
            .map(|region| (region.name().to_string(), region.filter(&tracked)))
            .collect();
        state.traces.record(&tracked, self.config.trace);

        let mut result = TrackResult {
            tracked_boxes: tracked
                .iter()
                .map(|t| to_wire(self.config.box_format, t))
                .collect(),
            filtered_regions,
            annotated_image_mask: None,
            failure: None,
        };

        if self.config.annotation.enabled {
            let rendered = catch_unwind(AssertUnwindSafe(|| {
                self.render(&tracked, &state.traces, batch.image.as_deref())
            }))
            .unwrap_or_else(|_| Err(AnnotationError::Render("annotator panicked".to_string())));
            match rendered {
                Ok(image) => result.annotated_image_mask = Some(image),
                Err(e) => {
                    warn!(error = %e, frame, "Annotation failed, omitting image");
                    result.failure = Some(TrackFailure::Annotation(e));
                }
            }
        }

        debug!(
            frame,
            detections = batch.detections.len(),
            tracked = tracked.len(),
            "Frame tracked"
        );
        result
    }

    fn render(
        &self,
        tracked: &[TrackedBox],
        traces: &TraceHistory,
        image: Option<&str>,
    ) -> Result<String, AnnotationError> {
        let [width, height] = self.config.resolution;
        let scene = match image {
            Some(data) => {
                let scene = decode_base64_image(data)?;
                if scene.dimensions() != (width, height) {
                    return Err(AnnotationError::SizeMismatch {
                        expected_width: width,
                        expected_height: height,
                        actual_width: scene.width(),
                        actual_height: scene.height(),
                    });
                }
                scene
            }
            None => RgbaImage::new(width, height),
        };

        let input = AnnotationInput {
            boxes: tracked,
            traces: traces.paths_for(tracked),
            regions: self
                .regions
                .iter()
                .map(|region| (region.name(), region.polygon()))
                .collect(),
            labels: &self.config.labels,
            style: self.config.annotation,
        };
        let annotated = self.annotator.annotate(scene, &input)?;
        encode_base64_png(&annotated)
    }
}
