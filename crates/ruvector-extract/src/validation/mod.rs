//! Format validation: cross-checks extension, declared type and content
//!
//! The extension is authoritative for the expected format. That matters for
//! ZIP containers, where one magic number covers docx, xlsx, pptx and epub.

pub mod sniffer;

pub use sniffer::{is_encrypted_ooxml, is_pdf, is_zip, sniff, Sniffed};

use crate::error::ExtractFailure;
use crate::types::{file_extension, is_generic_content_type, Format, FormatInfo, FormatRegistry};

/// Validate `data` against its declared content type and optional filename.
///
/// `declared` must already be normalized. Returns the format to extract
/// with; a generic declared type resolves through the extension.
pub fn validate_format(
    registry: &FormatRegistry,
    data: &[u8],
    declared: &str,
    filename: Option<&str>,
) -> Result<&'static FormatInfo, ExtractFailure> {
    let sniffed = sniff(data);
    let extension = filename.and_then(file_extension);
    let by_extension = extension.as_deref().and_then(|ext| registry.by_extension(ext));

    match by_extension {
        Some(expected) => {
            let ext = extension.as_deref().unwrap_or_default();
            check_signature(expected, data, sniffed, &format!(".{} file", ext))?;
            check_declared(registry, expected, declared, ext)?;
            Ok(expected)
        }
        None => {
            let info = registry
                .lookup(declared)
                .ok_or_else(|| ExtractFailure::Unsupported(declared.to_string()))?;
            check_signature(info, data, sniffed, &format!("declared {}", info.content_type))?;
            Ok(info)
        }
    }
}

/// Magic-number checks for the expected format
fn check_signature(
    expected: &FormatInfo,
    data: &[u8],
    sniffed: Sniffed,
    subject: &str,
) -> Result<(), ExtractFailure> {
    let format = expected.format;

    if format.is_zip_container() {
        // Encrypted OOXML is a compound file; the extractor reports it
        if !is_zip(data) && !(format.is_ooxml() && is_encrypted_ooxml(data)) {
            return Err(ExtractFailure::corrupted(
                expected.name,
                format!("{} is missing the ZIP signature", subject),
            ));
        }
    } else if sniffed == Sniffed::Zip {
        return Err(ExtractFailure::InvalidFormat(format!(
            "{} contains a ZIP container",
            subject
        )));
    }

    if format == Format::Pdf {
        if !is_pdf(data) {
            return Err(ExtractFailure::corrupted(
                expected.name,
                format!("{} is missing the %PDF- header", subject),
            ));
        }
    } else if sniffed == Sniffed::Pdf {
        return Err(ExtractFailure::InvalidFormat(format!(
            "{} contains a PDF document",
            subject
        )));
    }

    if format.is_zip_container() || format == Format::Pdf {
        return Ok(());
    }

    // Everything below is a text format
    let contradiction = match sniffed {
        Sniffed::CompoundFile => Some("a legacy Office compound file"),
        Sniffed::Unknown => Some("binary data"),
        Sniffed::Rtf if format != Format::Rtf => Some("an RTF document"),
        Sniffed::Html if matches!(format, Format::Rtf | Format::Csv | Format::Json) => {
            Some("an HTML document")
        }
        _ => None,
    };
    if let Some(found) = contradiction {
        return Err(ExtractFailure::InvalidFormat(format!("{} contains {}", subject, found)));
    }

    if format == Format::Rtf && sniffed != Sniffed::Rtf {
        return Err(ExtractFailure::corrupted(
            expected.name,
            format!("{} is missing the {{\\rtf header", subject),
        ));
    }

    Ok(())
}

/// Declared type must agree with the extension-implied format
fn check_declared(
    registry: &FormatRegistry,
    expected: &FormatInfo,
    declared: &str,
    extension: &str,
) -> Result<(), ExtractFailure> {
    if is_generic_content_type(declared) {
        return Ok(());
    }

    match registry.lookup(declared) {
        Some(info) if info.format == expected.format => Ok(()),
        Some(info) if info.format == Format::Text && expected.format.is_text_family() => Ok(()),
        _ => Err(ExtractFailure::InvalidFormat(format!(
            ".{} implies {} but the declared type is '{}'",
            extension, expected.content_type, declared
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
    const XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

    fn validate(data: &[u8], declared: &str, filename: Option<&str>) -> Result<Format, ErrorKind> {
        let registry = FormatRegistry::new();
        validate_format(&registry, data, declared, filename)
            .map(|info| info.format)
            .map_err(|e| e.kind())
    }

    #[test]
    fn test_docx_with_zip_magic_and_wrong_declared_type() {
        let data = b"PK\x03\x04rest-of-archive";
        assert_eq!(validate(data, "application/pdf", Some("report.docx")), Err(ErrorKind::InvalidFormat));
        assert_eq!(validate(data, XLSX, Some("report.docx")), Err(ErrorKind::InvalidFormat));
        assert_eq!(validate(data, DOCX, Some("report.docx")), Ok(Format::Docx));
    }

    #[test]
    fn test_docx_without_zip_magic_is_corrupted() {
        assert_eq!(
            validate(b"this is not a zip", DOCX, Some("report.docx")),
            Err(ErrorKind::CorruptedFile)
        );
    }

    #[test]
    fn test_zip_magic_with_non_zip_extension() {
        assert_eq!(
            validate(b"PK\x03\x04....", "text/plain", Some("notes.txt")),
            Err(ErrorKind::InvalidFormat)
        );
    }

    #[test]
    fn test_pdf_checks() {
        assert_eq!(validate(b"%PDF-1.4 ...", "application/pdf", Some("a.pdf")), Ok(Format::Pdf));
        assert_eq!(validate(b"hello", "application/pdf", Some("a.pdf")), Err(ErrorKind::CorruptedFile));
        assert_eq!(
            validate(b"%PDF-1.4 ...", "text/plain", Some("a.txt")),
            Err(ErrorKind::InvalidFormat)
        );
    }

    #[test]
    fn test_text_plain_accepted_for_text_family() {
        assert_eq!(validate(b"# Title", "text/plain", Some("README.md")), Ok(Format::Markdown));
        assert_eq!(validate(b"a,b\n1,2", "text/plain", Some("data.csv")), Ok(Format::Csv));
        assert_eq!(
            validate(b"<p>x</p>", "text/plain", Some("page.html")),
            Err(ErrorKind::InvalidFormat)
        );
    }

    #[test]
    fn test_generic_declared_type_uses_extension() {
        assert_eq!(
            validate(b"PK\x03\x04....", "application/octet-stream", Some("book.epub")),
            Ok(Format::Epub)
        );
        assert_eq!(validate(b"hello", "", Some("hello.txt")), Ok(Format::Text));
    }

    #[test]
    fn test_without_extension_declared_type_rules() {
        assert_eq!(validate(b"hello", "text/plain", None), Ok(Format::Text));
        assert_eq!(validate(b"hello", XLSX, None), Err(ErrorKind::CorruptedFile));
        assert_eq!(validate(b"PK\x03\x04", "text/csv", Some("upload")), Err(ErrorKind::InvalidFormat));
        assert_eq!(validate(b"hello", "image/png", None), Err(ErrorKind::UnsupportedFormat));
    }

    #[test]
    fn test_binary_content_rejected_for_text_formats() {
        let mut png = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR".to_vec();
        png.extend((0..600u32).map(|i| (i * 7 % 256) as u8));
        assert_eq!(validate(&png, "text/plain", Some("notes.txt")), Err(ErrorKind::InvalidFormat));
        assert_eq!(validate(&png, "text/csv", None), Err(ErrorKind::InvalidFormat));

        let mut doc = b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1".to_vec();
        doc.extend_from_slice(&[0u8; 64]);
        assert_eq!(validate(&doc, "text/html", Some("page.html")), Err(ErrorKind::InvalidFormat));
        assert_eq!(validate(&doc, "text/markdown", Some("README.md")), Err(ErrorKind::InvalidFormat));
    }

    #[test]
    fn test_utf16_text_accepted() {
        let mut data = vec![0xFF, 0xFE];
        data.extend("hello there".encode_utf16().flat_map(|u| u.to_le_bytes()));
        assert_eq!(validate(&data, "text/plain", Some("notes.txt")), Ok(Format::Text));

        let bare: Vec<u8> = "a,b\n1,2".encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        assert_eq!(validate(&bare, "text/csv", Some("data.csv")), Ok(Format::Csv));
    }

    #[test]
    fn test_rtf_signature_checks() {
        let rtf = b"{\\rtf1\\ansi Hello}";
        assert_eq!(validate(rtf, "application/rtf", Some("letter.rtf")), Ok(Format::Rtf));
        assert_eq!(validate(rtf, "text/plain", Some("notes.txt")), Err(ErrorKind::InvalidFormat));
        assert_eq!(validate(rtf, "application/json", None), Err(ErrorKind::InvalidFormat));
        assert_eq!(
            validate(b"just words", "application/rtf", Some("letter.rtf")),
            Err(ErrorKind::CorruptedFile)
        );
    }

    #[test]
    fn test_html_content_under_data_extensions() {
        let page = b"<!DOCTYPE html><html><body>x</body></html>";
        assert_eq!(validate(page, "text/csv", Some("data.csv")), Err(ErrorKind::InvalidFormat));
        assert_eq!(validate(page, "application/json", Some("data.json")), Err(ErrorKind::InvalidFormat));
        assert_eq!(validate(page, "text/plain", Some("page.txt")), Ok(Format::Text));
        assert_eq!(validate(page, "text/markdown", Some("page.md")), Ok(Format::Markdown));
    }

    #[test]
    fn test_encrypted_ooxml_passes_through() {
        let mut data = b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1".to_vec();
        data.extend("EncryptedPackage".encode_utf16().flat_map(|u| u.to_le_bytes()));
        assert_eq!(validate(&data, XLSX, Some("budget.xlsx")), Ok(Format::Xlsx));
        assert_eq!(
            validate(&data, "application/epub+zip", Some("book.epub")),
            Err(ErrorKind::CorruptedFile)
        );
    }
}
