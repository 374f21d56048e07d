//! Memory-bounded execution of one extraction
//!
//! The extractor runs on the blocking pool while the async side watches the
//! deadline, the caller's cancellation token and process memory growth. Any
//! of those trips the unit's own token so the extractor stops at its next
//! check point. Panics surface as join errors and become typed failures.
//!
//! The queue slot moves into the blocking task, so a unit that ignores its
//! token keeps its slot until it actually returns.

use parking_lot::Mutex;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::queue::QueueSlot;
use crate::error::ExtractFailure;
use crate::ingestion::{ExtractContext, Extracted};

type UnitResult = Result<Extracted, ExtractFailure>;

/// How long a stopped unit gets to hand back partial output
const WIND_DOWN_GRACE: Duration = Duration::from_millis(250);

/// Resident memory of the current process
pub struct MemoryProbe {
    system: System,
    pid: Option<Pid>,
}

impl MemoryProbe {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                tracing::warn!("Memory sampling unavailable: {}", e);
                None
            }
        };
        Self {
            system: System::new(),
            pid,
        }
    }

    /// Current resident set size in bytes, if the platform reports it
    pub fn resident_bytes(&mut self) -> Option<u64> {
        let pid = self.pid?;
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            ProcessRefreshKind::new().with_memory(),
        );
        self.system.process(pid).map(|p| p.memory())
    }
}

impl Default for MemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryProbe").field("pid", &self.pid).finish()
    }
}

/// Runs extractors under deadline, cancellation and memory limits
#[derive(Debug, Clone)]
pub struct MemoryGuard {
    max_memory: u64,
    sample_interval: Duration,
    max_output_chars: usize,
    probe: Arc<Mutex<MemoryProbe>>,
}

impl MemoryGuard {
    pub fn new(max_memory: u64, sample_interval: Duration, max_output_chars: usize) -> Self {
        Self {
            max_memory,
            sample_interval: sample_interval.max(Duration::from_millis(1)),
            max_output_chars,
            probe: Arc::new(Mutex::new(MemoryProbe::new())),
        }
    }

    /// Run `extract` as one isolated unit of work holding `slot`
    pub async fn run<F>(
        &self,
        slot: QueueSlot,
        deadline: Instant,
        cancel: &CancellationToken,
        extract: F,
    ) -> UnitResult
    where
        F: FnOnce(&ExtractContext) -> UnitResult + Send + 'static,
    {
        let unit_token = cancel.child_token();
        let ctx = ExtractContext::new(deadline.into_std(), unit_token.clone(), self.max_output_chars);
        let baseline = self.sample();

        let mut handle = tokio::task::spawn_blocking(move || {
            let _slot = slot;
            extract(&ctx)
        });

        let mut ticker = tokio::time::interval(self.sample_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        let expired = tokio::time::sleep_until(deadline);
        tokio::pin!(expired);

        let joined = loop {
            tokio::select! {
                joined = &mut handle => break joined,
                _ = &mut expired => {
                    unit_token.cancel();
                    return wind_down(handle, ExtractFailure::DeadlineExceeded).await;
                }
                _ = cancel.cancelled() => {
                    return wind_down(handle, ExtractFailure::Cancelled).await;
                }
                _ = ticker.tick() => {
                    if let Some(failure) = self.check_growth(baseline) {
                        unit_token.cancel();
                        return Err(failure);
                    }
                }
            }
        };

        let result = joined.map_err(join_failure)?;
        // Final sample catches growth between the last tick and completion
        if let Some(failure) = self.check_growth(baseline) {
            return Err(failure);
        }
        result
    }

    fn sample(&self) -> Option<u64> {
        self.probe.lock().resident_bytes()
    }

    fn check_growth(&self, baseline: Option<u64>) -> Option<ExtractFailure> {
        let baseline = baseline?;
        let growth = self.sample()?.saturating_sub(baseline);
        if growth > self.max_memory {
            tracing::warn!(
                "Extraction grew memory by {} bytes (limit {})",
                growth,
                self.max_memory
            );
            Some(ExtractFailure::MemoryLimit {
                growth,
                limit: self.max_memory,
            })
        } else {
            None
        }
    }
}

/// Give a stopped unit a short grace period to return partial output
async fn wind_down(handle: JoinHandle<UnitResult>, cause: ExtractFailure) -> UnitResult {
    match tokio::time::timeout(WIND_DOWN_GRACE, handle).await {
        Ok(Ok(Ok(Extracted::Partial { text, .. }))) => Ok(Extracted::Partial { text, cause }),
        Ok(Ok(Ok(Extracted::Complete(text)))) if !text.is_empty() => {
            Ok(Extracted::Partial { text, cause })
        }
        _ => Err(cause),
    }
}

fn join_failure(err: JoinError) -> ExtractFailure {
    if err.is_panic() {
        let payload = err.into_panic();
        let message = panic_message(payload.as_ref());
        tracing::error!("Extractor panicked: {}", message);
        ExtractFailure::Failed(format!("extractor panicked: {}", message))
    } else {
        ExtractFailure::Failed(format!("extractor task failed: {}", err))
    }
}

/// Extract a printable message from a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
