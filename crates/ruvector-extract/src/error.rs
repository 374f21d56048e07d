//! Error types for document extraction

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias for extraction operations
pub type Result<T> = std::result::Result<T, ExtractionError>;

/// Boxed underlying cause carried by [`ExtractionError`]
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Classification of an extraction failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No extractor is registered for the content type
    UnsupportedFormat,
    /// The bytes do not form a readable document of the declared format
    CorruptedFile,
    /// The document is encrypted and needs a password
    PasswordProtected,
    /// Generic failure inside an extractor
    ExtractionFailed,
    /// Input exceeds the configured maximum file size
    FileTooLarge,
    /// The size-scaled deadline expired
    ExtractionTimeout,
    /// Extension, declared type and content disagree
    InvalidFormat,
    /// Zero-byte input
    EmptyFile,
    /// Memory growth or output size exceeded the per-file budget
    MemoryLimitExceeded,
}

impl ErrorKind {
    /// Only transient resource failures are worth retrying
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::ExtractionTimeout | Self::MemoryLimitExceeded)
    }

    /// Stable identifier used in logs and statistics
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnsupportedFormat => "unsupported_format",
            Self::CorruptedFile => "corrupted_file",
            Self::PasswordProtected => "password_protected",
            Self::ExtractionFailed => "extraction_failed",
            Self::FileTooLarge => "file_too_large",
            Self::ExtractionTimeout => "extraction_timeout",
            Self::InvalidFormat => "invalid_format",
            Self::EmptyFile => "empty_file",
            Self::MemoryLimitExceeded => "memory_limit_exceeded",
        }
    }

    /// Short message suitable for end users
    pub fn user_message(self) -> &'static str {
        match self {
            Self::UnsupportedFormat => "This file type is not supported.",
            Self::CorruptedFile => "The file appears to be damaged or incomplete.",
            Self::PasswordProtected => {
                "The file is password protected. Remove the password and upload it again."
            }
            Self::ExtractionFailed => "Text could not be extracted from this file.",
            Self::FileTooLarge => "The file is too large to process.",
            Self::ExtractionTimeout => "Processing the file took too long. Please try again later.",
            Self::InvalidFormat => "The file contents do not match its type or extension.",
            Self::EmptyFile => "The file is empty.",
            Self::MemoryLimitExceeded => {
                "The file needs more memory than allowed. Please try again later."
            }
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extraction failure returned to the ingestion collaborator.
///
/// Built once at the failure site with the call's context and never mutated
/// afterwards. `Display` yields the user-facing message; the verbose form
/// for logs is [`ExtractionError::technical_detail`].
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ExtractionError {
    kind: ErrorKind,
    #[source]
    source: Option<Cause>,
    content_type: String,
    file_size: usize,
    filename: Option<String>,
    message: String,
    detail: Option<String>,
    retryable: bool,
}

impl ExtractionError {
    /// Create an error of the given kind for a call
    pub fn new(kind: ErrorKind, content_type: impl Into<String>, file_size: usize) -> Self {
        Self {
            kind,
            source: None,
            content_type: content_type.into(),
            file_size,
            filename: None,
            message: kind.user_message().to_string(),
            detail: None,
            retryable: kind.is_retryable(),
        }
    }

    /// Attach the original filename
    pub fn with_filename(mut self, filename: Option<&str>) -> Self {
        self.filename = filename.map(str::to_string);
        self
    }

    /// Attach the underlying cause
    pub fn with_source(mut self, source: impl Into<Cause>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attach extra technical context
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Convert an extractor-level failure into a caller-facing error
    pub fn from_failure(
        failure: ExtractFailure,
        content_type: &str,
        file_size: usize,
        filename: Option<&str>,
    ) -> Self {
        Self::new(failure.kind(), content_type, file_size)
            .with_filename(filename)
            .with_source(failure)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn file_size(&self) -> usize {
        self.file_size
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// User-facing message
    pub fn user_message(&self) -> &str {
        &self.message
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Verbose description for logs: kind, file, content type, size and cause
    pub fn technical_detail(&self) -> String {
        let mut out = format!(
            "kind={} content_type={} size={} filename={}",
            self.kind,
            if self.content_type.is_empty() { "<none>" } else { &self.content_type },
            self.file_size,
            self.filename.as_deref().unwrap_or("<none>"),
        );
        if let Some(source) = &self.source {
            out.push_str(&format!(" cause=\"{}\"", source));
        }
        if let Some(detail) = &self.detail {
            out.push_str(&format!(" detail=\"{}\"", detail));
        }
        out
    }
}

/// Failure raised below the router, before call context is attached
#[derive(Debug, Error)]
pub enum ExtractFailure {
    /// Content type has no extractor
    #[error("unsupported content type '{0}'")]
    Unsupported(String),

    /// Bytes are not a readable document of the format
    #[error("corrupted {format} data: {reason}")]
    Corrupted { format: &'static str, reason: String },

    /// Document needs a password
    #[error("{0} is password protected")]
    PasswordProtected(&'static str),

    /// Extension, declared type and content disagree
    #[error("format mismatch: {0}")]
    InvalidFormat(String),

    /// Deadline passed at a check point
    #[error("extraction deadline exceeded")]
    DeadlineExceeded,

    /// The unit's cancellation token was tripped
    #[error("extraction cancelled")]
    Cancelled,

    /// Accumulated text exceeded the output budget
    #[error("extracted text exceeded {limit} characters")]
    OutputLimit { limit: usize },

    /// Process memory grew past the per-file budget
    #[error("memory grew by {growth} bytes (limit {limit})")]
    MemoryLimit { growth: u64, limit: u64 },

    /// Anything else, including contained panics
    #[error("{0}")]
    Failed(String),
}

impl ExtractFailure {
    /// Create a corruption failure
    pub fn corrupted(format: &'static str, reason: impl fmt::Display) -> Self {
        Self::Corrupted {
            format,
            reason: reason.to_string(),
        }
    }

    /// Classify a parsing library error.
    ///
    /// Libraries report encryption only through their message text, so a
    /// message mentioning a password or encryption is reclassified.
    pub fn from_library(format: &'static str, err: impl fmt::Display) -> Self {
        let message = err.to_string();
        let lower = message.to_lowercase();
        if lower.contains("password") || lower.contains("encrypt") {
            Self::PasswordProtected(format)
        } else {
            Self::corrupted(format, message)
        }
    }

    /// Error kind this failure maps to
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unsupported(_) => ErrorKind::UnsupportedFormat,
            Self::Corrupted { .. } => ErrorKind::CorruptedFile,
            Self::PasswordProtected(_) => ErrorKind::PasswordProtected,
            Self::InvalidFormat(_) => ErrorKind::InvalidFormat,
            Self::DeadlineExceeded | Self::Cancelled => ErrorKind::ExtractionTimeout,
            Self::OutputLimit { .. } | Self::MemoryLimit { .. } => ErrorKind::MemoryLimitExceeded,
            Self::Failed(_) => ErrorKind::ExtractionFailed,
        }
    }

    /// True for failures caused by the deadline or cancellation
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::DeadlineExceeded | Self::Cancelled)
    }
}
