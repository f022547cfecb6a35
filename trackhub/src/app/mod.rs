//! Application bootstrap and lifecycle management.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        TrackHubApp                        │
//! │                                                           │
//! │  1. SessionRegistry (max_sessions, engine factory)        │
//! │                                                           │
//! │  2. Server ──► WorkerPool (max_workers)                   │
//! │       └── RequestHandler ──► SessionRegistry              │
//! │                                                           │
//! │  3. run() until the shutdown token fires                  │
//! │       └── registry.remove_all()                           │
//! └──────────────────────────────────────────────────────────┘
//! ```

mod bootstrap;
mod error;

pub use bootstrap::TrackHubApp;
pub use error::AppError;
