//! ruvector-extract: Multi-format document text extraction
//!
//! This crate turns uploaded documents (PDF, Word, Excel, PowerPoint, EPUB,
//! RTF, HTML, Markdown, CSV, JSON and plain text) into normalized plain text.
//! Extraction runs behind a bounded-concurrency queue with size-scaled
//! deadlines and a per-file memory guard, and failures are classified into
//! user-facing error kinds.

pub mod config;
pub mod error;
pub mod ingestion;
pub mod processing;
pub mod router;
pub mod types;
pub mod validation;

pub use config::{ConfigError, ExtractionConfig, ValidationMode};
pub use error::{ErrorKind, ExtractFailure, ExtractionError, Result};
pub use processing::{MetricsSnapshot, StatsSnapshot};
pub use router::ExtractionRouter;
pub use types::{ExtractionOutput, Format, FormatInfo, FormatRegistry};
