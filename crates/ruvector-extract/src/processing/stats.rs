//! Per-format extraction statistics

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

use crate::error::ErrorKind;

/// One extraction attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Normalized content type
    pub content_type: String,
    pub size: usize,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
    /// Complete text was produced
    pub success: bool,
    /// Text was produced but extraction stopped early
    pub partial: bool,
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
    /// Characters of text returned
    pub output_len: usize,
}

impl ExtractionEvent {
    /// Start an event record for a call
    pub fn new(content_type: impl Into<String>, size: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            content_type: content_type.into(),
            size,
            duration: Duration::ZERO,
            success: false,
            partial: false,
            error: None,
            error_kind: None,
            output_len: 0,
        }
    }
}

/// Cumulative aggregates for one content type
#[derive(Debug, Clone, Default)]
pub struct FormatStats {
    pub count: u64,
    pub successes: u64,
    pub failures: u64,
    pub partials: u64,
    pub total_duration: Duration,
    pub total_bytes: u64,
}

impl FormatStats {
    fn record(&mut self, event: &ExtractionEvent) {
        self.count += 1;
        if event.success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        if event.partial {
            self.partials += 1;
        }
        self.total_duration += event.duration;
        self.total_bytes += event.size as u64;
    }

    /// Mean time per extraction
    pub fn average_duration(&self) -> Duration {
        if self.count == 0 {
            return Duration::ZERO;
        }
        self.total_duration / self.count.min(u32::MAX as u64) as u32
    }

    /// Bytes processed per second of extraction time
    pub fn average_throughput(&self) -> f64 {
        let secs = self.total_duration.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.total_bytes as f64 / secs
    }

    fn snapshot(&self) -> FormatStatsSnapshot {
        FormatStatsSnapshot {
            count: self.count,
            successes: self.successes,
            failures: self.failures,
            partials: self.partials,
            total_duration_ms: self.total_duration.as_millis() as u64,
            total_bytes: self.total_bytes,
            average_duration_ms: self.average_duration().as_secs_f64() * 1000.0,
            average_throughput: self.average_throughput(),
        }
    }
}

/// Serializable view of [`FormatStats`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatStatsSnapshot {
    pub count: u64,
    pub successes: u64,
    pub failures: u64,
    pub partials: u64,
    pub total_duration_ms: u64,
    pub total_bytes: u64,
    pub average_duration_ms: f64,
    /// Bytes per second
    pub average_throughput: f64,
}

/// Statistics across all content types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_extractions: u64,
    pub total_successes: u64,
    pub total_failures: u64,
    pub formats: BTreeMap<String, FormatStatsSnapshot>,
}

/// Cumulative per-format statistics, updated after every attempt
#[derive(Debug, Default)]
pub struct ExtractionStats {
    formats: RwLock<BTreeMap<String, FormatStats>>,
}

impl ExtractionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold an event into the aggregates
    pub fn record(&self, event: &ExtractionEvent) {
        let key = if event.content_type.is_empty() {
            "unknown"
        } else {
            event.content_type.as_str()
        };
        self.formats
            .write()
            .entry(key.to_string())
            .or_default()
            .record(event);
    }

    /// Aggregates for one content type
    pub fn format(&self, content_type: &str) -> Option<FormatStats> {
        self.formats.read().get(content_type).cloned()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let formats = self.formats.read();
        let mut snapshot = StatsSnapshot {
            total_extractions: 0,
            total_successes: 0,
            total_failures: 0,
            formats: BTreeMap::new(),
        };
        for (content_type, stats) in formats.iter() {
            snapshot.total_extractions += stats.count;
            snapshot.total_successes += stats.successes;
            snapshot.total_failures += stats.failures;
            snapshot
                .formats
                .insert(content_type.clone(), stats.snapshot());
        }
        snapshot
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(content_type: &str, size: usize, millis: u64, success: bool) -> ExtractionEvent {
        let mut event = ExtractionEvent::new(content_type, size);
        event.duration = Duration::from_millis(millis);
        event.success = success;
        if !success {
            event.error = Some("failed".to_string());
            event.error_kind = Some(ErrorKind::CorruptedFile);
        }
        event
    }

    #[test]
    fn test_aggregates_per_format() {
        let stats = ExtractionStats::new();
        stats.record(&event("application/pdf", 1000, 100, true));
        stats.record(&event("application/pdf", 3000, 300, false));
        stats.record(&event("text/plain", 10, 1, true));

        let pdf = stats.format("application/pdf").unwrap();
        assert_eq!(pdf.count, 2);
        assert_eq!(pdf.successes, 1);
        assert_eq!(pdf.failures, 1);
        assert_eq!(pdf.total_bytes, 4000);
        assert_eq!(pdf.average_duration(), Duration::from_millis(200));
        assert!((pdf.average_throughput() - 10_000.0).abs() < 1e-6);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_extractions, 3);
        assert_eq!(snapshot.total_successes, 2);
        assert_eq!(snapshot.total_failures, 1);
        assert_eq!(snapshot.formats.len(), 2);
    }

    #[test]
    fn test_partial_counts_as_failure() {
        let stats = ExtractionStats::new();
        let mut partial = event("application/epub+zip", 10, 5, false);
        partial.partial = true;
        stats.record(&partial);

        let epub = stats.format("application/epub+zip").unwrap();
        assert_eq!(epub.failures, 1);
        assert_eq!(epub.partials, 1);
    }

    #[test]
    fn test_empty_stats() {
        let stats = FormatStats::default();
        assert_eq!(stats.average_duration(), Duration::ZERO);
        assert_eq!(stats.average_throughput(), 0.0);
    }

    #[test]
    fn test_event_serializes() {
        let json = serde_json::to_value(event("text/csv", 5, 1500, true)).unwrap();
        assert_eq!(json["duration"], 1500);
        assert_eq!(json["content_type"], "text/csv");
        assert!(json["id"].is_string());
    }
}
