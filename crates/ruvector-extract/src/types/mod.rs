//! Core types for document extraction

pub mod format;
pub mod output;

pub use format::{
    file_extension, is_generic_content_type, normalize_content_type, Format, FormatInfo,
    FormatRegistry,
};
pub use output::ExtractionOutput;
