//! Fixed-size pool of blocking request workers.
//!
//! Every request handler invocation runs on the tokio blocking thread pool,
//! gated by a semaphore with one permit per worker:
//!
//! ```text
//! request ──► acquire() ──(waits while K permits are out)──► WorkerPermit
//!                                                               │
//!                                   permit.run(handler) ──► spawn_blocking
//!                                                               │
//!                                         permit released when the handler returns
//! ```
//!
//! The permit moves into the blocking closure, so a handler that has started
//! keeps its worker until it finishes even if the client disconnects. There
//! is no timeout and no cancellation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Default number of concurrent workers.
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Errors raised by the worker pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool was closed while waiting for a worker.
    #[error("worker pool is closed")]
    Closed,

    /// The handler panicked or its task was aborted.
    #[error("worker task failed: {0}")]
    Join(String),
}

/// Read-only view of pool occupancy.
#[derive(Debug, Clone)]
pub struct WorkerGauge {
    active: Arc<AtomicUsize>,
    size: usize,
}

impl WorkerGauge {
    /// Workers currently running a handler.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

/// Semaphore-gated pool of K blocking workers.
#[derive(Debug)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    gauge: WorkerGauge,
}

impl WorkerPool {
    /// Creates a pool with `size` workers (at least one).
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        tracing::info!(workers = size, "Created worker pool");
        Self {
            semaphore: Arc::new(Semaphore::new(size)),
            gauge: WorkerGauge {
                active: Arc::new(AtomicUsize::new(0)),
                size,
            },
        }
    }

    pub fn gauge(&self) -> WorkerGauge {
        self.gauge.clone()
    }

    pub fn size(&self) -> usize {
        self.gauge.size
    }

    pub fn active(&self) -> usize {
        self.gauge.active()
    }

    /// Idle workers.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Waits for a free worker.
    pub async fn acquire(&self) -> Result<WorkerPermit, PoolError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;
        self.gauge.active.fetch_add(1, Ordering::Relaxed);
        Ok(WorkerPermit {
            _permit: permit,
            active: Arc::clone(&self.gauge.active),
        })
    }

    /// Acquires a worker and runs `work` on it.
    pub async fn execute<F, R>(&self, work: F) -> Result<R, PoolError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.acquire().await?.run(work).await
    }

    /// Stops handing out workers. Pending and future `acquire` calls fail.
    pub fn close(&self) {
        self.semaphore.close();
    }
}

/// A reserved worker. Released on drop.
pub struct WorkerPermit {
    _permit: OwnedSemaphorePermit,
    active: Arc<AtomicUsize>,
}

impl WorkerPermit {
    /// Runs `work` on the blocking pool, keeping this worker until it returns.
    pub async fn run<F, R>(self, work: F) -> Result<R, PoolError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        tokio::task::spawn_blocking(move || {
            let _worker = self;
            work()
        })
        .await
        .map_err(|e| PoolError::Join(e.to_string()))
    }
}

impl Drop for WorkerPermit {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_execute_returns_result() {
        let pool = WorkerPool::new(2);
        assert_eq!(pool.execute(|| 21 * 2).await.unwrap(), 42);
        assert_eq!(pool.active(), 0);
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn test_zero_size_is_clamped() {
        assert_eq!(WorkerPool::new(0).size(), 1);
    }

    #[tokio::test]
    async fn test_gauge_tracks_held_permits() {
        let pool = WorkerPool::new(3);
        let gauge = pool.gauge();
        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        assert_eq!(gauge.active(), 2);
        assert_eq!(pool.available(), 1);
        drop(a);
        assert_eq!(gauge.active(), 1);
        drop(b);
        assert_eq!(gauge.active(), 0);
    }

    #[tokio::test]
    async fn test_acquire_waits_when_full() {
        let pool = WorkerPool::new(1);
        let held = pool.acquire().await.unwrap();

        let waiting = tokio::time::timeout(Duration::from_millis(50), pool.acquire()).await;
        assert!(waiting.is_err());

        drop(held);
        let permit = tokio::time::timeout(Duration::from_secs(1), pool.acquire()).await;
        assert!(permit.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_parallelism_is_bounded() {
        let pool = Arc::new(WorkerPool::new(2));
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let pool = Arc::clone(&pool);
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                pool.execute(move || {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(20));
                    running.fetch_sub(1, Ordering::SeqCst);
                })
                .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(pool.active(), 0);
    }

    #[tokio::test]
    async fn test_closed_pool_rejects() {
        let pool = WorkerPool::new(1);
        pool.close();
        assert!(matches!(pool.acquire().await, Err(PoolError::Closed)));
    }

    #[tokio::test]
    async fn test_panicking_work_is_join_error() {
        let pool = WorkerPool::new(1);
        let result = pool.execute(|| -> u32 { panic!("handler bug") }).await;
        assert!(matches!(result, Err(PoolError::Join(_))));
        assert_eq!(pool.active(), 0);
    }
}
