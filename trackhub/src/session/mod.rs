//! Tracker sessions.
//!
//! A session owns one tracking engine, its immutable [`SessionConfig`], the
//! derived [`FilterRegion`]s and a bounded trace history. All engine access
//! goes through [`TrackerSession::track`], which serializes callers on a
//! private lock.

mod config;
mod conversion;
mod region;
mod trace;
mod tracker;

pub use config::{
    ConfigError, RegionConfig, SessionConfig, TraceConfig, DEFAULT_TRACE_LENGTH, MAX_RESOLUTION,
    MIN_RESOLUTION,
};
pub use conversion::{
    convert_batch, to_wire, ConversionError, DetectionBatch, WireBatch, WIRE_ROW_LEN,
};
pub use region::FilterRegion;
pub use tracker::{TrackFailure, TrackResult, TrackerSession};
