//! Session configuration supplied by the client at creation time.
//!
//! The configuration is immutable once a session exists. It arrives as the
//! JSON body of a create request:
//!
//! ```json
//! {
//!   "resolution": [640, 480],
//!   "tracker": {"track_thresh": 0.25, "track_buffer": 30, "match_thresh": 0.8, "frame_rate": 30},
//!   "trace": {"length": 30, "position": "CENTER"},
//!   "labels": {"0": "person"},
//!   "regions": {"door": {"polygon": [[100, 100], [200, 100], [200, 200], [100, 200]],
//!                        "trigger_position": "CENTER"}},
//!   "box_format": "cxcywh"
//! }
//! ```
//!
//! Only `resolution` is required.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::annotate::AnnotationConfig;
use crate::engine::TrackerThresholds;
use crate::geometry::{BoxFormat, GeometryError, Polygon, TriggerPosition};

/// Smallest accepted canvas side, in pixels.
pub const MIN_RESOLUTION: u32 = 64;

/// Largest accepted canvas side, in pixels.
pub const MAX_RESOLUTION: u32 = 8192;

/// Default number of anchor points kept per trace.
pub const DEFAULT_TRACE_LENGTH: usize = 30;

/// Validation errors for a [`SessionConfig`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error(
        "resolution {width}x{height} is outside {min}..={max} per side",
        min = MIN_RESOLUTION,
        max = MAX_RESOLUTION
    )]
    Resolution { width: u32, height: u32 },

    #[error("{field} must be in (0, 1], got {value}")]
    Threshold { field: &'static str, value: f64 },

    #[error("{field} must be at least 1")]
    ZeroCount { field: &'static str },

    #[error("{field} must be a positive finite number, got {value}")]
    Thickness { field: &'static str, value: f32 },

    #[error("region names must not be empty")]
    EmptyRegionName,

    #[error("region '{name}': {source}")]
    Region {
        name: String,
        #[source]
        source: GeometryError,
    },
}

/// Trace drawing settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TraceConfig {
    /// Maximum anchor points kept per track.
    pub length: usize,
    /// Box reference point recorded each frame.
    pub position: TriggerPosition,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            length: DEFAULT_TRACE_LENGTH,
            position: TriggerPosition::Center,
        }
    }
}

/// A named polygon as it appears in the configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegionConfig {
    pub polygon: Vec<[f64; 2]>,
    #[serde(default)]
    pub trigger_position: TriggerPosition,
}

impl RegionConfig {
    pub fn new(polygon: Vec<[f64; 2]>, trigger_position: TriggerPosition) -> Self {
        Self {
            polygon,
            trigger_position,
        }
    }
}

/// Complete configuration of one tracker session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Canvas width and height in pixels.
    pub resolution: [u32; 2],
    #[serde(default)]
    pub tracker: TrackerThresholds,
    #[serde(default)]
    pub trace: TraceConfig,
    /// Class id to display name.
    #[serde(default)]
    pub labels: HashMap<u32, String>,
    /// Filter regions keyed by unique name.
    #[serde(default)]
    pub regions: BTreeMap<String, RegionConfig>,
    /// Wire encoding of box geometry for this session.
    #[serde(default)]
    pub box_format: BoxFormat,
    #[serde(default)]
    pub annotation: AnnotationConfig,
}

impl SessionConfig {
    /// Creates a configuration with defaults for everything but the canvas.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            resolution: [width, height],
            tracker: TrackerThresholds::default(),
            trace: TraceConfig::default(),
            labels: HashMap::new(),
            regions: BTreeMap::new(),
            box_format: BoxFormat::default(),
            annotation: AnnotationConfig::default(),
        }
    }

    pub fn with_tracker(mut self, tracker: TrackerThresholds) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn with_trace(mut self, trace: TraceConfig) -> Self {
        self.trace = trace;
        self
    }

    pub fn with_label(mut self, class_id: u32, name: impl Into<String>) -> Self {
        self.labels.insert(class_id, name.into());
        self
    }

    pub fn with_region(mut self, name: impl Into<String>, region: RegionConfig) -> Self {
        self.regions.insert(name.into(), region);
        self
    }

    pub fn with_box_format(mut self, format: BoxFormat) -> Self {
        self.box_format = format;
        self
    }

    pub fn with_annotation(mut self, annotation: AnnotationConfig) -> Self {
        self.annotation = annotation;
        self
    }

    pub fn width(&self) -> u32 {
        self.resolution[0]
    }

    pub fn height(&self) -> u32 {
        self.resolution[1]
    }

    /// Checks every value constraint that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let [width, height] = self.resolution;
        let side = MIN_RESOLUTION..=MAX_RESOLUTION;
        if !side.contains(&width) || !side.contains(&height) {
            return Err(ConfigError::Resolution { width, height });
        }

        let t = &self.tracker;
        for (field, value) in [("track_thresh", t.track_thresh), ("match_thresh", t.match_thresh)] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::Threshold { field, value });
            }
        }
        if t.track_buffer == 0 {
            return Err(ConfigError::ZeroCount {
                field: "track_buffer",
            });
        }
        if t.frame_rate == 0 {
            return Err(ConfigError::ZeroCount {
                field: "frame_rate",
            });
        }
        if self.trace.length == 0 {
            return Err(ConfigError::ZeroCount {
                field: "trace.length",
            });
        }

        let a = &self.annotation;
        for (field, value) in [
            ("box_thickness", a.box_thickness),
            ("trace_thickness", a.trace_thickness),
            ("polygon_thickness", a.polygon_thickness),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Thickness { field, value });
            }
        }

        for (name, region) in &self.regions {
            if name.trim().is_empty() {
                return Err(ConfigError::EmptyRegionName);
            }
            Polygon::new(&region.polygon).map_err(|source| ConfigError::Region {
                name: name.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_json() {
        let config: SessionConfig = serde_json::from_str(r#"{"resolution": [640, 480]}"#).unwrap();
        assert_eq!(config, SessionConfig::new(640, 480));
        assert!(config.validate().is_ok());
        assert_eq!(config.trace.position, TriggerPosition::Center);
        assert_eq!(config.box_format, BoxFormat::Cxcywh);
    }

    #[test]
    fn test_full_json() {
        let json = r#"{
            "resolution": [640, 480],
            "tracker": {"track_thresh": 0.5, "track_buffer": 60, "match_thresh": 0.7, "frame_rate": 15},
            "trace": {"length": 10, "position": "BOTTOM_CENTER"},
            "labels": {"0": "person", "2": "car"},
            "regions": {"door": {"polygon": [[100, 100], [200, 100], [200, 200], [100, 200]], "trigger_position": "CENTER"}},
            "box_format": "xywh",
            "annotation": {"enabled": false}
        }"#;
        let config: SessionConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.tracker.track_buffer, 60);
        assert_eq!(config.labels.get(&2).map(String::as_str), Some("car"));
        assert_eq!(config.regions["door"].trigger_position, TriggerPosition::Center);
        assert_eq!(config.box_format, BoxFormat::Xywh);
        assert!(!config.annotation.enabled);
    }

    #[test]
    fn test_missing_resolution_fails_to_parse() {
        assert!(serde_json::from_str::<SessionConfig>(r#"{"labels": {}}"#).is_err());
    }

    #[test]
    fn test_unknown_field_fails_to_parse() {
        assert!(
            serde_json::from_str::<SessionConfig>(r#"{"resolution": [640, 480], "extra": 1}"#)
                .is_err()
        );
    }

    #[test]
    fn test_small_resolution_rejected() {
        let err = SessionConfig::new(63, 480).validate().unwrap_err();
        assert_eq!(
            err,
            ConfigError::Resolution {
                width: 63,
                height: 480
            }
        );
        assert!(SessionConfig::new(64, 64).validate().is_ok());
    }

    #[test]
    fn test_huge_resolution_rejected() {
        let err = SessionConfig::new(4_000_000_000, 4_000_000_000)
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Resolution { .. }));
        assert!(SessionConfig::new(8193, 480).validate().is_err());
        assert!(SessionConfig::new(8192, 8192).validate().is_ok());
    }

    #[test]
    fn test_threshold_bounds() {
        let config = SessionConfig::new(640, 480).with_tracker(TrackerThresholds {
            match_thresh: 0.0,
            ..Default::default()
        });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Threshold {
                field: "match_thresh",
                ..
            })
        ));
    }

    #[test]
    fn test_zero_trace_length_rejected() {
        let config = SessionConfig::new(640, 480).with_trace(TraceConfig {
            length: 0,
            ..Default::default()
        });
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroCount {
                field: "trace.length"
            })
        );
    }

    #[test]
    fn test_degenerate_region_rejected() {
        let config = SessionConfig::new(640, 480).with_region(
            "line",
            RegionConfig::new(vec![[0.0, 0.0], [10.0, 10.0]], TriggerPosition::Center),
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("line"));
        assert!(matches!(err, ConfigError::Region { .. }));
    }

    #[test]
    fn test_blank_region_name_rejected() {
        let config = SessionConfig::new(640, 480).with_region(
            " ",
            RegionConfig::new(
                vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0]],
                TriggerPosition::Center,
            ),
        );
        assert_eq!(config.validate(), Err(ConfigError::EmptyRegionName));
    }
}
