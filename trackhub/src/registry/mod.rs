//! Session registry.
//!
//! Maps tokens to live [`TrackerSession`]s and bounds how many can exist.
//!
//! ```text
//! create(config) ──► build session (no lock) ──► lock ─► capacity check
//!                                                      ─► sample token until free
//!                                                      ─► insert ─► unlock
//! get(token) ──────► lock ─► clone Arc ─► unlock ──► caller locks the session
//! ```
//!
//! The map lock is held only for lookup, insertion and removal. It is always
//! released before a session lock is taken, so the two never nest. Sessions
//! are handed out as `Arc`s; a `track` already running on a removed session
//! completes, but the token no longer resolves.

mod token;

pub use token::{RandomTokenGenerator, SessionToken, TokenGenerator, TOKEN_BYTES};

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info};

use crate::annotate::{Annotator, MaskRenderer};
use crate::engine::{ByteTrackFactory, EngineFactory};
use crate::session::{ConfigError, SessionConfig, TrackerSession};

/// Default maximum number of concurrent sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 64;

/// Errors returned by [`SessionRegistry`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("session limit of {max} reached")]
    CapacityExceeded { max: usize },

    #[error("session not found")]
    NotFound,

    #[error("invalid session configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

/// Owner of every live tracker session.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionToken, Arc<TrackerSession>>>,
    max_sessions: usize,
    engines: Arc<dyn EngineFactory>,
    annotator: Arc<dyn Annotator>,
    tokens: Arc<dyn TokenGenerator>,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.len())
            .field("max_sessions", &self.max_sessions)
            .finish_non_exhaustive()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SESSIONS)
    }
}

impl SessionRegistry {
    /// Creates an empty registry backed by ByteTrack engines and the raster
    /// annotator.
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            max_sessions,
            engines: Arc::new(ByteTrackFactory),
            annotator: Arc::new(MaskRenderer::new()),
            tokens: Arc::new(RandomTokenGenerator),
        }
    }

    pub fn with_engine_factory(mut self, engines: Arc<dyn EngineFactory>) -> Self {
        self.engines = engines;
        self
    }

    pub fn with_annotator(mut self, annotator: Arc<dyn Annotator>) -> Self {
        self.annotator = annotator;
        self
    }

    pub fn with_token_generator(mut self, tokens: Arc<dyn TokenGenerator>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Creates a session and returns its token.
    ///
    /// # Errors
    ///
    /// `CapacityExceeded` when the registry is full, `InvalidConfig` when the
    /// configuration does not validate. The registry is unchanged on error.
    pub fn create(&self, config: SessionConfig) -> Result<SessionToken, RegistryError> {
        // Cheap early rejection; re-checked under the lock below.
        if self.len() >= self.max_sessions {
            return Err(RegistryError::CapacityExceeded {
                max: self.max_sessions,
            });
        }

        let engine = self.engines.create(&config.tracker);
        let session = Arc::new(TrackerSession::new(config, engine, self.annotator.clone())?);

        let mut sessions = self.sessions.lock();
        if sessions.len() >= self.max_sessions {
            return Err(RegistryError::CapacityExceeded {
                max: self.max_sessions,
            });
        }
        let token = loop {
            let candidate = self.tokens.generate();
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
            debug!("Session token collision, resampling");
        };
        sessions.insert(token.clone(), session);
        let count = sessions.len();
        drop(sessions);

        info!(sessions = count, max_sessions = self.max_sessions, "Session created");
        Ok(token)
    }

    /// Resolves a token to its session.
    pub fn get(&self, token: &str) -> Result<Arc<TrackerSession>, RegistryError> {
        self.sessions
            .lock()
            .get(token)
            .cloned()
            .ok_or(RegistryError::NotFound)
    }

    /// Removes a session. Returns whether it existed.
    pub fn remove(&self, token: &str) -> bool {
        let removed = self.sessions.lock().remove(token).is_some();
        if removed {
            info!("Session deleted");
        }
        removed
    }

    /// Sorted snapshot of every live token.
    pub fn list_tokens(&self) -> Vec<String> {
        let mut tokens: Vec<String> = self
            .sessions
            .lock()
            .keys()
            .map(|t| t.as_str().to_string())
            .collect();
        tokens.sort_unstable();
        tokens
    }

    /// Drops every session. Returns how many were removed.
    pub fn remove_all(&self) -> usize {
        let drained: Vec<_> = self.sessions.lock().drain().collect();
        if !drained.is_empty() {
            info!(sessions = drained.len(), "All sessions removed");
        }
        drained.len()
    }
}
