//! Bounded worker pool for inbound messages.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::conversation::engine::ConversationEngine;

/// Runs jobs on spawned tasks, at most `max_workers` at a time. A job keeps running when the
/// caller stops waiting for it, so a dropped request never aborts a state transition half-way.
#[derive(Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    max_workers: usize,
}

impl WorkerPool {
    pub fn new(max_workers: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_workers)),
            max_workers,
        }
    }

    /// Jobs currently running.
    pub fn busy(&self) -> usize {
        self.max_workers - self.permits.available_permits()
    }

    pub async fn run<F, T>(&self, job: F) -> Result<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .context("worker pool is closed")?;

        tokio::spawn(async move {
            let _permit = permit;
            job.await
        })
        .await
        .context("worker task failed")
    }
}

/// Periodically drops expired conversation states. An interval of zero disables the sweep.
pub fn spawn_state_sweeper(
    engine: Arc<ConversationEngine>,
    interval_secs: u64,
) -> Option<JoinHandle<()>> {
    if interval_secs == 0 {
        info!("Conversation state sweep disabled; expiry is applied on access only");
        return None;
    }

    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            let removed = engine.sweep();
            if removed > 0 {
                debug!(
                    "State sweep removed {removed} expired conversations ({} active)",
                    engine.active_conversations()
                );
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn test_run_returns_job_output() {
        let pool = WorkerPool::new(2);
        assert_eq!(pool.run(async { 40 + 2 }).await.unwrap(), 42);
        assert_eq!(pool.busy(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pool_bounds_concurrency() {
        let pool = WorkerPool::new(3);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let pool = pool.clone();
            let running = running.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                pool.run(async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                })
                .await
                .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_panicking_job_is_an_error() {
        let pool = WorkerPool::new(1);
        let result = pool.run(async { panic!("boom") }).await;
        assert!(result.is_err());
        assert_eq!(pool.run(async { 1 }).await.unwrap(), 1);
    }
}
