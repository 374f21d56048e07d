//! Extraction results returned to callers

use crate::error::{ExtractionError, Result};

/// Text produced by a successful or partially successful extraction
#[derive(Debug)]
pub enum ExtractionOutput {
    /// The whole document was extracted
    Complete(String),
    /// Extraction stopped early; `text` holds everything read before `error`
    Partial {
        text: String,
        error: ExtractionError,
    },
}

impl ExtractionOutput {
    /// Extracted text, complete or not
    pub fn text(&self) -> &str {
        match self {
            Self::Complete(text) | Self::Partial { text, .. } => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Complete(text) | Self::Partial { text, .. } => text,
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, Self::Partial { .. })
    }

    /// The error that cut a partial extraction short
    pub fn error(&self) -> Option<&ExtractionError> {
        match self {
            Self::Complete(_) => None,
            Self::Partial { error, .. } => Some(error),
        }
    }

    /// Treat partial output as a failure
    pub fn into_complete(self) -> Result<String> {
        match self {
            Self::Complete(text) => Ok(text),
            Self::Partial { error, .. } => Err(error),
        }
    }
}
