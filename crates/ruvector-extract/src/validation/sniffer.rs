//! Magic-number content sniffing

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const UTF16_BOMS: [&[u8]; 2] = [b"\xFF\xFE", b"\xFE\xFF"];
const PDF_MAGIC: &[u8] = b"%PDF-";
const ZIP_MAGICS: [&[u8]; 3] = [b"PK\x03\x04", b"PK\x05\x06", b"PK\x07\x08"];
const CFB_MAGIC: &[u8] = b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1";
const RTF_MAGIC: &[u8] = b"{\\rtf";
const HTML_PREFIXES: [&[u8]; 2] = [b"<!doctype html", b"<html"];

/// PDF allows junk before the header; readers look within the first KiB
const PDF_HEADER_WINDOW: usize = 1024;
/// Bytes inspected by the printable-ratio heuristic
const TEXT_SAMPLE_SIZE: usize = 512;
/// Minimum share of printable bytes for plain text
const PRINTABLE_RATIO: f64 = 0.95;
/// Bytes inspected when guessing UTF-16 byte order
const UTF16_SAMPLE: usize = 512;

/// Content family detected from leading bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sniffed {
    Pdf,
    /// ZIP container (docx, xlsx, pptx, epub)
    Zip,
    /// OLE compound file (legacy Office or encrypted OOXML)
    CompoundFile,
    Rtf,
    Html,
    /// Starts with `{` or `[`
    StructuredData,
    PlainText,
    Unknown,
}

impl Sniffed {
    /// Content type implied by the signature, where one exists
    pub fn content_type(self) -> Option<&'static str> {
        match self {
            Self::Pdf => Some("application/pdf"),
            Self::Zip => Some("application/zip"),
            Self::CompoundFile => Some("application/x-ole-storage"),
            Self::Rtf => Some("application/rtf"),
            Self::Html => Some("text/html"),
            Self::StructuredData => Some("application/json"),
            Self::PlainText => Some("text/plain"),
            Self::Unknown => None,
        }
    }
}

/// Classify bytes by their leading signature
pub fn sniff(data: &[u8]) -> Sniffed {
    let body = data.strip_prefix(UTF8_BOM).unwrap_or(data);

    if body.starts_with(PDF_MAGIC) {
        return Sniffed::Pdf;
    }
    if is_zip(body) {
        return Sniffed::Zip;
    }
    if body.starts_with(CFB_MAGIC) {
        return Sniffed::CompoundFile;
    }

    let trimmed = trim_ascii_start(body);
    if trimmed.starts_with(RTF_MAGIC) {
        return Sniffed::Rtf;
    }
    if HTML_PREFIXES.iter().any(|p| starts_with_ignore_case(trimmed, p)) {
        return Sniffed::Html;
    }
    if trimmed.starts_with(b"{") || trimmed.starts_with(b"[") {
        return Sniffed::StructuredData;
    }
    if is_mostly_printable(data) || is_utf16_text(data) {
        return Sniffed::PlainText;
    }
    Sniffed::Unknown
}

/// UTF-16 byte-order mark, or zero bytes in a consistent position
pub fn is_utf16_text(data: &[u8]) -> bool {
    UTF16_BOMS.iter().any(|bom| data.starts_with(bom)) || guess_utf16_le(data).is_some()
}

/// Byte order of BOM-less UTF-16: `Some(true)` for little-endian.
///
/// ASCII-heavy UTF-16 has zero bytes in every other position.
pub fn guess_utf16_le(data: &[u8]) -> Option<bool> {
    let sample = &data[..data.len().min(UTF16_SAMPLE)];
    let pairs = sample.len() / 2;
    if pairs == 0 {
        return None;
    }
    let even_zeros = sample.iter().step_by(2).filter(|&&b| b == 0).count();
    let odd_zeros = sample.iter().skip(1).step_by(2).filter(|&&b| b == 0).count();

    if odd_zeros * 10 > pairs * 4 && even_zeros * 10 < pairs {
        Some(true)
    } else if even_zeros * 10 > pairs * 4 && odd_zeros * 10 < pairs {
        Some(false)
    } else {
        None
    }
}

/// ZIP local-file, empty-archive or spanned signature
pub fn is_zip(data: &[u8]) -> bool {
    ZIP_MAGICS.iter().any(|m| data.starts_with(m))
}

/// `%PDF-` within the header window
pub fn is_pdf(data: &[u8]) -> bool {
    let window = &data[..data.len().min(PDF_HEADER_WINDOW)];
    find(window, PDF_MAGIC).is_some()
}

/// Encrypted OOXML: a compound file carrying an `EncryptionInfo` or
/// `EncryptedPackage` stream (names are stored as UTF-16LE)
pub fn is_encrypted_ooxml(data: &[u8]) -> bool {
    if !data.starts_with(CFB_MAGIC) {
        return false;
    }
    let info = utf16le("EncryptionInfo");
    let package = utf16le("EncryptedPackage");
    find(data, &info).is_some() || find(data, &package).is_some()
}

/// More than 95% printable bytes over the first 512.
///
/// Bytes at or above 0x80 count as printable so UTF-8 text passes.
pub fn is_mostly_printable(data: &[u8]) -> bool {
    let sample = &data[..data.len().min(TEXT_SAMPLE_SIZE)];
    if sample.is_empty() {
        return false;
    }
    let printable = sample
        .iter()
        .filter(|&&b| matches!(b, b'\t' | b'\n' | b'\r' | 0x20..=0x7E | 0x80..=0xFF))
        .count();
    printable as f64 / sample.len() as f64 > PRINTABLE_RATIO
}

/// Byte-substring search
pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn utf16le(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
}

fn trim_ascii_start(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    &data[start..]
}

fn starts_with_ignore_case(data: &[u8], prefix: &[u8]) -> bool {
    data.len() >= prefix.len() && data[..prefix.len()].eq_ignore_ascii_case(prefix)
}
