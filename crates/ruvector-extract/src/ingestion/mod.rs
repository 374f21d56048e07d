//! Per-format text extractors

pub mod context;
mod delimited;
mod docx;
mod epub;
mod html;
mod json;
mod markdown;
mod ooxml;
pub mod pdf;
mod pptx;
mod rtf;
pub mod text;
mod xlsx;

pub use context::{ExtractContext, Extracted, TextBuilder};
pub use delimited::detect_delimiter;
pub use json::MAX_JSON_DEPTH;

use crate::types::Format;

/// Multi-format extractor
pub struct FileExtractor;

impl FileExtractor {
    /// Extract text from `data` as `format`.
    ///
    /// Runs synchronously; callers bound it with the context's deadline and
    /// cancellation token.
    pub fn extract(format: Format, data: &[u8], ctx: &ExtractContext) -> context::Result<Extracted> {
        match format {
            Format::Pdf => pdf::extract(data, ctx),
            Format::Docx => docx::extract(data, ctx),
            Format::Xlsx => xlsx::extract(data, ctx),
            Format::Pptx => pptx::extract(data, ctx),
            Format::Epub => epub::extract(data, ctx),
            Format::Rtf => rtf::extract(data, ctx),
            Format::Html => html::extract(data, ctx),
            Format::Markdown => markdown::extract(data, ctx),
            Format::Csv => delimited::extract(data, ctx),
            Format::Json => json::extract(data, ctx),
            Format::Text => text::extract(data, ctx),
        }
    }
}
