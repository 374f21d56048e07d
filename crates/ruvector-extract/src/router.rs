//! Extraction router: the single entry point for callers
//!
//! Resolves the content type to an extractor, admits the call through the
//! queue and runs the extractor under the memory guard. Every attempt is
//! recorded in the stats and logged once.

use bytes::Bytes;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::{ConfigError, ExtractionConfig, ValidationMode};
use crate::error::{ErrorKind, ExtractFailure, ExtractionError, Result};
use crate::ingestion::{Extracted, FileExtractor};
use crate::processing::{
    deadline_for_size, AcquireError, ExtractionEvent, ExtractionQueue, ExtractionStats,
    MemoryGuard, MetricsSnapshot, StatsSnapshot,
};
use crate::types::{normalize_content_type, ExtractionOutput, FormatInfo, FormatRegistry};
use crate::validation::validate_format;

/// Multi-format extraction router
#[derive(Debug)]
pub struct ExtractionRouter {
    config: Arc<ExtractionConfig>,
    registry: FormatRegistry,
    queue: ExtractionQueue,
    guard: MemoryGuard,
    stats: ExtractionStats,
}

/// Per-call context carried into errors and the stats event
struct Call<'a> {
    content_type: String,
    size: usize,
    filename: Option<&'a str>,
}

impl Call<'_> {
    fn error(&self, kind: ErrorKind) -> ExtractionError {
        ExtractionError::new(kind, self.content_type.as_str(), self.size)
            .with_filename(self.filename)
    }

    fn failure(&self, failure: ExtractFailure) -> ExtractionError {
        ExtractionError::from_failure(failure, &self.content_type, self.size, self.filename)
    }
}

impl ExtractionRouter {
    /// Create a router; the configuration is validated first
    pub fn new(config: ExtractionConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        tracing::info!(
            "Extraction router ready: max_concurrent={}, max_file_size={}, timeout={}s",
            config.max_concurrent,
            config.max_file_size,
            config.extraction_timeout_secs
        );
        Ok(Self::build(config))
    }

    /// Router with default configuration
    pub fn with_defaults() -> Self {
        Self::build(ExtractionConfig::default())
    }

    fn build(config: ExtractionConfig) -> Self {
        Self {
            registry: FormatRegistry::new(),
            queue: ExtractionQueue::new(config.max_concurrent),
            guard: MemoryGuard::new(
                config.max_memory_per_file,
                config.memory_sample_interval(),
                config.max_output_chars,
            ),
            stats: ExtractionStats::new(),
            config: Arc::new(config),
        }
    }

    /// Extract text by declared content type
    pub async fn extract(
        &self,
        data: impl Into<Bytes>,
        content_type: &str,
    ) -> Result<ExtractionOutput> {
        self.run(data.into(), content_type, None, &CancellationToken::new())
            .await
    }

    /// Extract after cross-checking the filename's extension, the declared
    /// type and the content's magic numbers
    pub async fn extract_with_validation(
        &self,
        data: impl Into<Bytes>,
        content_type: &str,
        filename: &str,
    ) -> Result<ExtractionOutput> {
        self.run(data.into(), content_type, Some(filename), &CancellationToken::new())
            .await
    }

    /// Extract with a caller-owned cancellation token.
    ///
    /// Cancelling the token stops queue waiting or the running extractor;
    /// the call then fails with `ExtractionTimeout`, or returns partial text
    /// for extractors that report progress.
    pub async fn extract_with_cancel(
        &self,
        data: impl Into<Bytes>,
        content_type: &str,
        filename: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<ExtractionOutput> {
        self.run(data.into(), content_type, filename, cancel).await
    }

    pub fn is_supported(&self, content_type: &str) -> bool {
        self.registry.is_supported(content_type)
    }

    /// Canonical content types of all supported formats
    pub fn supported_formats(&self) -> Vec<String> {
        self.registry.supported_content_types()
    }

    pub fn formats(&self) -> &'static [FormatInfo] {
        self.registry.formats()
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Deadline applied to an input of `size` bytes
    pub fn deadline_for(&self, size: usize) -> Duration {
        deadline_for_size(size, self.config.extraction_timeout())
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.queue.snapshot()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    async fn run(
        &self,
        data: Bytes,
        content_type: &str,
        filename: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<ExtractionOutput> {
        let started = Instant::now();
        let call = Call {
            content_type: normalize_content_type(content_type),
            size: data.len(),
            filename,
        };

        let result = self.run_checked(data, &call, cancel).await;
        self.record(&call, &result, started.elapsed());
        result
    }

    async fn run_checked(
        &self,
        data: Bytes,
        call: &Call<'_>,
        cancel: &CancellationToken,
    ) -> Result<ExtractionOutput> {
        if data.is_empty() {
            return Err(call.error(ErrorKind::EmptyFile));
        }
        if call.size > self.config.max_file_size {
            return Err(call.error(ErrorKind::FileTooLarge).with_detail(format!(
                "limit is {} bytes",
                self.config.max_file_size
            )));
        }

        let info = self.resolve(&data, call)?;

        let timeout = self.deadline_for(call.size);
        let deadline = tokio::time::Instant::now() + timeout;

        let slot = self.queue.acquire(deadline, cancel).await.map_err(|e| {
            self.queue.record_failure();
            let failure = match e {
                AcquireError::Cancelled => ExtractFailure::Cancelled,
                AcquireError::TimedOut => ExtractFailure::DeadlineExceeded,
                AcquireError::Closed => ExtractFailure::Failed(e.to_string()),
            };
            call.failure(failure).with_detail(e.to_string())
        })?;

        tracing::debug!(
            "Extracting {} ({} bytes) with {} extractor, deadline {:?}",
            call.filename.unwrap_or("<unnamed>"),
            call.size,
            info.format,
            timeout
        );

        let format = info.format;
        let extracted = self
            .guard
            .run(slot, deadline, cancel, move |ctx| {
                FileExtractor::extract(format, &data, ctx)
            })
            .await
            .map_err(|failure| {
                self.queue.record_failure();
                call.failure(failure)
            })?;

        Ok(self.settle(extracted, call))
    }

    /// Partial output counts as a failed attempt in the queue metrics
    fn settle(&self, extracted: Extracted, call: &Call<'_>) -> ExtractionOutput {
        match extracted {
            Extracted::Complete(text) => ExtractionOutput::Complete(text),
            Extracted::Partial { text, cause } => {
                self.queue.record_failure();
                ExtractionOutput::Partial {
                    text,
                    error: call.failure(cause),
                }
            }
        }
    }

    /// Pick the registry entry for a call, validating when required
    fn resolve(&self, data: &[u8], call: &Call<'_>) -> Result<&'static FormatInfo> {
        match (call.filename, self.config.validation) {
            (Some(filename), _) => {
                validate_format(&self.registry, data, &call.content_type, Some(filename))
                    .map_err(|f| call.failure(f))
            }
            (None, ValidationMode::Always) => {
                validate_format(&self.registry, data, &call.content_type, None)
                    .map_err(|f| call.failure(f))
            }
            (None, ValidationMode::OnRequest) => {
                self.registry.lookup(&call.content_type).ok_or_else(|| {
                    call.failure(ExtractFailure::Unsupported(call.content_type.clone()))
                })
            }
        }
    }

    fn record(&self, call: &Call<'_>, result: &Result<ExtractionOutput>, duration: Duration) {
        let mut event = ExtractionEvent::new(call.content_type.as_str(), call.size);
        event.duration = duration;

        match result {
            Ok(ExtractionOutput::Complete(text)) => {
                event.success = true;
                event.output_len = text.chars().count();
                tracing::info!(
                    "Extracted {} chars from {} ({} bytes) in {:?}",
                    event.output_len,
                    event.content_type,
                    event.size,
                    duration
                );
            }
            Ok(ExtractionOutput::Partial { text, error }) => {
                event.partial = true;
                event.output_len = text.chars().count();
                event.error = Some(error.technical_detail());
                event.error_kind = Some(error.kind());
                tracing::warn!(
                    "Partial extraction of {} ({} bytes): {} chars before {}",
                    event.content_type,
                    event.size,
                    event.output_len,
                    error.technical_detail()
                );
            }
            Err(e) => {
                event.error = Some(e.technical_detail());
                event.error_kind = Some(e.kind());
                if e.is_retryable() {
                    tracing::warn!("Extraction failed (retryable): {}", e.technical_detail());
                } else {
                    tracing::error!("Extraction failed: {}", e.technical_detail());
                }
            }
        }

        self.stats.record(&event);
    }
}

impl Default for ExtractionRouter {
    fn default() -> Self {
        Self::with_defaults()
    }
}
