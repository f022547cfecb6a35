//! HTTP listener and dispatcher.
//!
//! A single axum fallback route forwards every request to [`dispatch`],
//! which takes a worker from the pool before touching the body:
//!
//! ```text
//! accept ──► dispatch ──► pool.acquire() ──► read body (≤ max_body_bytes)
//!                             │ waits              │ 413
//!                             ▼                    ▼
//!                      permit.run(handler.handle(request)) ──► response
//! ```
//!
//! Shutdown is driven by a [`CancellationToken`]: the listener stops
//! accepting, in-flight requests finish, then the pool is closed.

mod config;

pub use config::{
    ServerConfig, DEFAULT_HOST, DEFAULT_MAX_BODY_BYTES, DEFAULT_PORT,
};

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::CONTENT_LENGTH;
use axum::response::{IntoResponse, Response};
use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::handler::{HandlerError, HandlerRequest, HandlerResponse, RequestHandler};
use crate::pool::{WorkerGauge, WorkerPool};
use crate::registry::SessionRegistry;

/// Errors raised while binding or running the listener.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid server configuration: {0}")]
    InvalidConfig(String),

    #[error("cannot resolve {address}: {reason}")]
    Address { address: String, reason: String },

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

impl IntoResponse for HandlerResponse {
    fn into_response(self) -> Response {
        (self.status, self.headers, self.body).into_response()
    }
}

struct DispatchState {
    handler: RequestHandler,
    pool: Arc<WorkerPool>,
    max_body_bytes: usize,
}

fn reject(error: HandlerError) -> Response {
    HandlerResponse::error(&error).into_response()
}

async fn dispatch(State(state): State<Arc<DispatchState>>, request: Request) -> Response {
    let permit = match state.pool.acquire().await {
        Ok(permit) => permit,
        Err(_) => return reject(HandlerError::Unavailable),
    };

    let (parts, body) = request.into_parts();
    let limit = state.max_body_bytes;
    let declared = parts
        .headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    if declared.is_some_and(|len| len > limit as u64) {
        return reject(HandlerError::PayloadTooLarge { limit });
    }
    let body = match axum::body::to_bytes(body, limit).await {
        Ok(body) => body,
        Err(e) => {
            return reject(HandlerError::MalformedRequest(format!(
                "failed to read body: {e}"
            )))
        }
    };

    let request = HandlerRequest {
        method: parts.method,
        path: parts.uri.path().to_string(),
        headers: parts.headers,
        body,
    };
    let handler = state.handler.clone();
    match permit.run(move || handler.handle(request)).await {
        Ok(response) => response.into_response(),
        Err(e) => {
            error!(error = %e, "Request worker failed");
            reject(HandlerError::Internal(e.to_string()))
        }
    }
}

/// A bound, not yet running, HTTP listener.
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    router: Router,
    pool: Arc<WorkerPool>,
}

impl Server {
    /// Validates `config`, binds the socket and wires the handler to
    /// `registry`.
    pub async fn bind(
        config: &ServerConfig,
        registry: Arc<SessionRegistry>,
    ) -> Result<Self, ServerError> {
        config.validate()?;
        let address = config.socket_addr()?;
        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| ServerError::Bind { address, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { address, source })?;

        let pool = Arc::new(WorkerPool::new(config.max_workers));
        let handler = RequestHandler::new(registry, pool.gauge());
        let state = Arc::new(DispatchState {
            handler,
            pool: Arc::clone(&pool),
            max_body_bytes: config.max_body_bytes,
        });
        let router = Router::new().fallback(dispatch).with_state(state);

        info!(address = %local_addr, workers = config.max_workers, "Listener bound");
        Ok(Self {
            listener,
            local_addr,
            router,
            pool,
        })
    }

    /// Actual bound address (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn workers(&self) -> WorkerGauge {
        self.pool.gauge()
    }

    /// Serves until `shutdown` is cancelled and in-flight requests finish.
    pub async fn serve(self, shutdown: CancellationToken) -> Result<(), ServerError> {
        info!(address = %self.local_addr, "Serving requests");
        let result = axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await;
        self.pool.close();
        info!("Listener stopped");
        result.map_err(ServerError::Serve)
    }
}
