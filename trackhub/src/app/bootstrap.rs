//! Application bootstrap implementation.
//!
//! `TrackHubApp` builds the session registry once, binds the listener on it
//! and runs until its shutdown token is cancelled. On the way out every
//! session is dropped.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::error::AppError;
use crate::registry::SessionRegistry;
use crate::server::{Server, ServerConfig};

/// TrackHub service with its lifecycle.
///
/// # Example
///
/// ```ignore
/// use trackhub::app::TrackHubApp;
/// use trackhub::server::ServerConfig;
///
/// let app = TrackHubApp::start(ServerConfig::default()).await?;
/// let shutdown = app.shutdown_token();
///
/// // Elsewhere: shutdown.cancel();
/// app.run().await?;
/// ```
pub struct TrackHubApp {
    registry: Arc<SessionRegistry>,
    server: Server,
    shutdown: CancellationToken,
}

impl TrackHubApp {
    /// Binds the listener with a fresh registry sized by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the address
    /// cannot be bound.
    pub async fn start(config: ServerConfig) -> Result<Self, AppError> {
        let registry = Arc::new(SessionRegistry::new(config.max_sessions));
        Self::start_with_registry(config, registry).await
    }

    /// Binds the listener on an existing registry.
    ///
    /// Lets callers plug in their own engine factory or annotator through
    /// [`SessionRegistry::with_engine_factory`] and friends.
    pub async fn start_with_registry(
        config: ServerConfig,
        registry: Arc<SessionRegistry>,
    ) -> Result<Self, AppError> {
        info!(
            host = %config.host,
            port = config.port,
            max_workers = config.max_workers,
            max_sessions = registry.max_sessions(),
            "Starting TrackHub"
        );
        let server = Server::bind(&config, Arc::clone(&registry))
            .await
            .map_err(AppError::Bind)?;

        Ok(Self {
            registry,
            server,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Token that stops [`run`](Self::run) when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Serves until shutdown, then clears the registry.
    pub async fn run(self) -> Result<(), AppError> {
        let result = self.server.serve(self.shutdown.clone()).await;
        let removed = self.registry.remove_all();
        info!(sessions = removed, "TrackHub stopped");
        result.map_err(AppError::Serve)
    }

    /// Runs the service on a dedicated runtime until `shutdown` is cancelled.
    ///
    /// This is the entry point for synchronous callers such as the CLI.
    pub fn run_blocking(config: ServerConfig, shutdown: CancellationToken) -> Result<(), AppError> {
        let runtime = Runtime::new().map_err(|e| AppError::RuntimeCreation(e.to_string()))?;
        runtime.block_on(async move {
            let app = Self::start(config).await?;
            info!(address = %app.local_addr(), "TrackHub ready");
            let token = app.shutdown_token();
            tokio::spawn(async move {
                shutdown.cancelled().await;
                token.cancel();
            });
            app.run().await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local() -> ServerConfig {
        ServerConfig::new("127.0.0.1", 0).with_max_sessions(2)
    }

    #[tokio::test]
    async fn test_start_binds_ephemeral_port() {
        let app = TrackHubApp::start(local()).await.unwrap();
        assert_ne!(app.local_addr().port(), 0);
        assert_eq!(app.registry().max_sessions(), 2);
    }

    #[tokio::test]
    async fn test_invalid_config_fails_to_start() {
        let result = TrackHubApp::start(local().with_max_workers(0)).await;
        assert!(matches!(result, Err(AppError::Bind(_))));
    }

    #[tokio::test]
    async fn test_shutdown_clears_registry() {
        let app = TrackHubApp::start(local()).await.unwrap();
        let registry = Arc::clone(app.registry());
        registry
            .create(crate::session::SessionConfig::new(640, 480))
            .unwrap();
        assert_eq!(registry.len(), 1);

        let shutdown = app.shutdown_token();
        let running = tokio::spawn(app.run());
        shutdown.cancel();
        running.await.unwrap().unwrap();
        assert!(registry.is_empty());
    }
}
