//! Supported formats and the content-type registry

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Extractor identifier, one per supported format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// PDF document
    Pdf,
    /// Microsoft Word document (.docx)
    Docx,
    /// Excel spreadsheet (.xlsx)
    Xlsx,
    /// PowerPoint presentation (.pptx)
    Pptx,
    /// EPUB ebook
    Epub,
    /// Rich Text Format
    Rtf,
    /// HTML document
    Html,
    /// Markdown file
    Markdown,
    /// CSV file
    Csv,
    /// JSON document
    Json,
    /// Plain text file
    Text,
}

impl Format {
    /// Formats stored as ZIP containers
    pub fn is_zip_container(self) -> bool {
        matches!(self, Self::Docx | Self::Xlsx | Self::Pptx | Self::Epub)
    }

    /// Text formats that browsers often upload as `text/plain`
    pub fn is_text_family(self) -> bool {
        matches!(self, Self::Markdown | Self::Csv | Self::Json | Self::Text)
    }

    /// Formats whose encrypted form is an OLE compound file
    pub fn is_ooxml(self) -> bool {
        matches!(self, Self::Docx | Self::Xlsx | Self::Pptx)
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Xlsx => "xlsx",
            Self::Pptx => "pptx",
            Self::Epub => "epub",
            Self::Rtf => "rtf",
            Self::Html => "html",
            Self::Markdown => "markdown",
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Text => "text",
        };
        f.write_str(name)
    }
}

/// Static registry entry describing one supported format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FormatInfo {
    /// Display name
    pub name: &'static str,
    /// Recognized file extensions, lowercase without the dot
    pub extensions: &'static [&'static str],
    /// Canonical content type
    pub content_type: &'static str,
    /// Other content types accepted for this format
    pub aliases: &'static [&'static str],
    /// Extractor to run
    pub format: Format,
}

static FORMATS: [FormatInfo; 11] = [
    FormatInfo {
        name: "PDF",
        extensions: &["pdf"],
        content_type: "application/pdf",
        aliases: &["application/x-pdf"],
        format: Format::Pdf,
    },
    FormatInfo {
        name: "Word Document (.docx)",
        extensions: &["docx"],
        content_type: "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        aliases: &[],
        format: Format::Docx,
    },
    FormatInfo {
        name: "Excel Spreadsheet (.xlsx)",
        extensions: &["xlsx"],
        content_type: "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        aliases: &[],
        format: Format::Xlsx,
    },
    FormatInfo {
        name: "PowerPoint (.pptx)",
        extensions: &["pptx"],
        content_type: "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        aliases: &[],
        format: Format::Pptx,
    },
    FormatInfo {
        name: "EPUB eBook",
        extensions: &["epub"],
        content_type: "application/epub+zip",
        aliases: &[],
        format: Format::Epub,
    },
    FormatInfo {
        name: "Rich Text Format",
        extensions: &["rtf"],
        content_type: "application/rtf",
        aliases: &["text/rtf", "application/x-rtf"],
        format: Format::Rtf,
    },
    FormatInfo {
        name: "HTML",
        extensions: &["html", "htm", "xhtml"],
        content_type: "text/html",
        aliases: &["application/xhtml+xml"],
        format: Format::Html,
    },
    FormatInfo {
        name: "Markdown",
        extensions: &["md", "markdown"],
        content_type: "text/markdown",
        aliases: &["text/x-markdown"],
        format: Format::Markdown,
    },
    FormatInfo {
        name: "CSV",
        extensions: &["csv", "tsv"],
        content_type: "text/csv",
        aliases: &["application/csv", "text/tab-separated-values"],
        format: Format::Csv,
    },
    FormatInfo {
        name: "JSON",
        extensions: &["json"],
        content_type: "application/json",
        aliases: &["text/json"],
        format: Format::Json,
    },
    FormatInfo {
        name: "Text File",
        extensions: &["txt", "text", "log"],
        content_type: "text/plain",
        aliases: &[],
        format: Format::Text,
    },
];

/// Content types that carry no format information
const GENERIC_CONTENT_TYPES: &[&str] = &["", "application/octet-stream", "binary/octet-stream"];

/// Normalize a declared content type: drop parameters, trim, lowercase
pub fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// True for declared types that say nothing about the format
pub fn is_generic_content_type(normalized: &str) -> bool {
    GENERIC_CONTENT_TYPES.contains(&normalized)
}

/// Lowercase extension of a filename, if any
pub fn file_extension(filename: &str) -> Option<String> {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Lookup tables over the static format list, built once
#[derive(Debug, Clone)]
pub struct FormatRegistry {
    by_content_type: HashMap<&'static str, &'static FormatInfo>,
    by_extension: HashMap<&'static str, &'static FormatInfo>,
}

impl FormatRegistry {
    /// Build lookup tables for every supported format
    pub fn new() -> Self {
        let mut by_content_type = HashMap::new();
        let mut by_extension = HashMap::new();

        for info in FORMATS.iter() {
            by_content_type.insert(info.content_type, info);
            for alias in info.aliases {
                by_content_type.insert(*alias, info);
            }
            for ext in info.extensions {
                by_extension.insert(*ext, info);
            }
        }

        Self {
            by_content_type,
            by_extension,
        }
    }

    /// Resolve a content type (normalized here, so raw headers are fine)
    pub fn lookup(&self, content_type: &str) -> Option<&'static FormatInfo> {
        let normalized = normalize_content_type(content_type);
        self.by_content_type.get(normalized.as_str()).copied()
    }

    /// Resolve a lowercase extension without the dot
    pub fn by_extension(&self, extension: &str) -> Option<&'static FormatInfo> {
        self.by_extension.get(extension).copied()
    }

    /// Resolve a filename through its extension
    pub fn by_filename(&self, filename: &str) -> Option<&'static FormatInfo> {
        file_extension(filename).and_then(|ext| self.by_extension(&ext))
    }

    pub fn is_supported(&self, content_type: &str) -> bool {
        self.lookup(content_type).is_some()
    }

    /// All registry entries in a stable order
    pub fn formats(&self) -> &'static [FormatInfo] {
        &FORMATS
    }

    /// Canonical content types of all supported formats
    pub fn supported_content_types(&self) -> Vec<String> {
        FORMATS.iter().map(|f| f.content_type.to_string()).collect()
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new()
    }
}
