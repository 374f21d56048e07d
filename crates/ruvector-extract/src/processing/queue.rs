//! Concurrency-limiting extraction queue with live metrics

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a slot could not be obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AcquireError {
    #[error("cancelled while waiting for an extraction slot")]
    Cancelled,
    #[error("deadline passed while waiting for an extraction slot")]
    TimedOut,
    #[error("extraction queue is closed")]
    Closed,
}

/// Live queue counters
#[derive(Debug, Default)]
pub struct ExtractionMetrics {
    total: AtomicU64,
    active: AtomicUsize,
    queued: AtomicUsize,
    failed: AtomicU64,
}

/// Point-in-time view of [`ExtractionMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Admission attempts since start
    pub total: u64,
    /// Extractions holding a slot
    pub active: usize,
    /// Callers waiting for a slot
    pub queued: usize,
    /// Admitted attempts that ended in an error or with partial output
    pub failed: u64,
    pub max_concurrent: usize,
}

/// Bounded pool of extraction slots
#[derive(Debug, Clone)]
pub struct ExtractionQueue {
    semaphore: Arc<Semaphore>,
    metrics: Arc<ExtractionMetrics>,
    max_concurrent: usize,
}

impl ExtractionQueue {
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            metrics: Arc::new(ExtractionMetrics::default()),
            max_concurrent,
        }
    }

    /// Wait for a slot until `deadline` or cancellation.
    ///
    /// A failed acquisition never holds a slot. Waiters are not ordered.
    pub async fn acquire(
        &self,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Result<QueueSlot, AcquireError> {
        self.metrics.total.fetch_add(1, Ordering::Relaxed);
        self.metrics.queued.fetch_add(1, Ordering::Relaxed);
        let queued = QueuedGuard(&self.metrics);

        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AcquireError::Cancelled),
            permit = self.semaphore.clone().acquire_owned() => {
                permit.map_err(|_| AcquireError::Closed)?
            }
            _ = tokio::time::sleep_until(deadline) => return Err(AcquireError::TimedOut),
        };

        drop(queued);
        self.metrics.active.fetch_add(1, Ordering::Relaxed);
        Ok(QueueSlot {
            _permit: permit,
            metrics: self.metrics.clone(),
        })
    }

    /// Count an attempt that ended in an error
    pub fn record_failure(&self) {
        self.metrics.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Free slots right now
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total: self.metrics.total.load(Ordering::Relaxed),
            active: self.metrics.active.load(Ordering::Relaxed),
            queued: self.metrics.queued.load(Ordering::Relaxed),
            failed: self.metrics.failed.load(Ordering::Relaxed),
            max_concurrent: self.max_concurrent,
        }
    }
}

/// Decrements the queued counter however the wait ends
struct QueuedGuard<'a>(&'a ExtractionMetrics);

impl Drop for QueuedGuard<'_> {
    fn drop(&mut self) {
        self.0.queued.fetch_sub(1, Ordering::Relaxed);
    }
}

/// An occupied slot; dropping it frees the slot
#[derive(Debug)]
pub struct QueueSlot {
    _permit: OwnedSemaphorePermit,
    metrics: Arc<ExtractionMetrics>,
}

impl Drop for QueueSlot {
    fn drop(&mut self) {
        self.metrics.active.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(60)
    }

    #[tokio::test]
    async fn test_never_exceeds_max_concurrent() {
        let queue = ExtractionQueue::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let queue = queue.clone();
                let running = running.clone();
                let peak = peak.clone();
                tokio::spawn(async move {
                    let _slot = queue
                        .acquire(far_deadline(), &CancellationToken::new())
                        .await
                        .unwrap();
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for result in futures::future::join_all(tasks).await {
            result.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
        let snapshot = queue.snapshot();
        assert_eq!(snapshot.total, 10);
        assert_eq!(snapshot.active, 0);
        assert_eq!(snapshot.queued, 0);
        assert_eq!(queue.available(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_acquire_holds_no_slot() {
        let queue = ExtractionQueue::new(1);
        let held = queue
            .acquire(far_deadline(), &CancellationToken::new())
            .await
            .unwrap();

        let token = CancellationToken::new();
        let waiter = {
            let queue = queue.clone();
            let token = token.clone();
            tokio::spawn(async move { queue.acquire(far_deadline(), &token).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(queue.snapshot().queued, 1);

        token.cancel();
        let result = waiter.await.unwrap();
        assert_eq!(result.unwrap_err(), AcquireError::Cancelled);

        let snapshot = queue.snapshot();
        assert_eq!(snapshot.active, 1);
        assert_eq!(snapshot.queued, 0);

        drop(held);
        assert_eq!(queue.available(), 1);
        assert_eq!(queue.snapshot().active, 0);
    }

    #[tokio::test]
    async fn test_deadline_while_waiting() {
        let queue = ExtractionQueue::new(1);
        let _held = queue
            .acquire(far_deadline(), &CancellationToken::new())
            .await
            .unwrap();

        let deadline = Instant::now() + Duration::from_millis(20);
        let result = queue.acquire(deadline, &CancellationToken::new()).await;
        assert_eq!(result.unwrap_err(), AcquireError::TimedOut);
        assert_eq!(queue.snapshot().queued, 0);
        assert_eq!(queue.available(), 0);
    }

    #[test]
    fn test_zero_is_clamped_to_one() {
        assert_eq!(ExtractionQueue::new(0).max_concurrent(), 1);
    }
}
