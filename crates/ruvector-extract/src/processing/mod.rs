//! Admission, isolation and accounting for extraction runs

pub mod deadline;
pub mod guard;
pub mod queue;
pub mod stats;

pub use deadline::deadline_for_size;
pub use guard::{MemoryGuard, MemoryProbe};
pub use queue::{AcquireError, ExtractionMetrics, ExtractionQueue, MetricsSnapshot, QueueSlot};
pub use stats::{ExtractionEvent, ExtractionStats, FormatStats, FormatStatsSnapshot, StatsSnapshot};
