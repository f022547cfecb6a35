//! TrackHub - multi-session object tracking over HTTP
//!
//! Clients create tracking sessions, stream detection batches into them and
//! get back the same detections with persistent track identities, per-region
//! membership and an optional annotated image.
//!
//! # Module map
//!
//! ```text
//! server ──► pool ──► handler ──► registry ──► session ──► engine
//!                                                 │
//!                                                 └──► annotate
//! geometry: box encodings, anchors, polygons (shared)
//! app, settings, logging: bootstrap and ambient configuration
//! ```

pub mod annotate;
pub mod app;
pub mod engine;
pub mod geometry;
pub mod handler;
pub mod logging;
pub mod pool;
pub mod registry;
pub mod server;
pub mod session;
pub mod settings;

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
