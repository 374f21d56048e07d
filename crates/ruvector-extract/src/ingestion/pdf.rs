//! PDF documents: per-page extraction with lopdf, pdf-extract as fallback

use lopdf::Document;
use once_cell::sync::Lazy;
use regex::Regex;
use std::panic::{self, AssertUnwindSafe};

use super::context::{ExtractContext, Extracted, Result};
use crate::error::ExtractFailure;
use crate::processing::guard::panic_message;
use crate::validation::{is_pdf, sniffer};

const FORMAT: &str = "PDF";

/// Glyph names leaked by fonts without a usable ToUnicode map, e.g. `uni2019`
static GLYPH_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[(<]?\buni([0-9A-Fa-f]{4})\b[)>]?").unwrap());

/// Typographic characters replaced with ASCII approximations
const ASCII_APPROXIMATIONS: &[(char, &str)] = &[
    ('\u{2010}', "-"),
    ('\u{2011}', "-"),
    ('\u{2013}', "-"),
    ('\u{2014}', "--"),
    ('\u{2018}', "'"),
    ('\u{2019}', "'"),
    ('\u{201C}', "\""),
    ('\u{201D}', "\""),
    ('\u{2022}', "* "),
    ('\u{2026}', "..."),
    ('\u{00A0}', " "),
    ('\u{FB00}', "ff"),
    ('\u{FB01}', "fi"),
    ('\u{FB02}', "fl"),
    ('\u{FB03}', "ffi"),
    ('\u{FB04}', "ffl"),
];

pub(super) fn extract(data: &[u8], ctx: &ExtractContext) -> Result<Extracted> {
    if !is_pdf(data) {
        return Err(ExtractFailure::corrupted(FORMAT, "missing %PDF- header"));
    }

    let doc = match Document::load_mem(data) {
        Ok(doc) => doc,
        Err(e) if sniffer::find(data, b"/Encrypt").is_some() => {
            tracing::debug!("Encrypted PDF failed to load: {}", e);
            return Err(ExtractFailure::PasswordProtected(FORMAT));
        }
        Err(e) => return Err(ExtractFailure::from_library(FORMAT, e)),
    };
    if doc.trailer.get(b"Encrypt").is_ok() {
        return Err(ExtractFailure::PasswordProtected(FORMAT));
    }

    let mut out = ctx.builder();
    for (page_num, _) in doc.get_pages() {
        if let Err(e) = ctx.check() {
            return out.interrupted(e);
        }

        let text = match doc.extract_text(&[page_num]) {
            Ok(text) => cleanup_pdf_text(&text),
            Err(e) => {
                tracing::debug!("Could not extract text from page {}: {}", page_num, e);
                continue;
            }
        };
        if let Err(e) = out.push_block(&text) {
            return if e.is_timeout() { out.interrupted(e) } else { Err(e) };
        }
    }

    if !out.is_empty() {
        return Ok(out.complete());
    }

    // Nothing per page; try the whole-document extractor, which handles
    // some font encodings lopdf does not
    ctx.check()?;
    match panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(data))) {
        Ok(Ok(text)) => out.push_str(&cleanup_pdf_text(&text))?,
        Ok(Err(e)) => tracing::debug!("pdf-extract fallback failed: {}", e),
        Err(panic) => tracing::warn!("pdf-extract panicked: {}", panic_message(panic.as_ref())),
    }
    Ok(out.complete())
}

/// Clean up PDF text: glyph names to characters, typographic punctuation to
/// ASCII, NUL bytes removed, lines trimmed and empty lines dropped
pub fn cleanup_pdf_text(text: &str) -> String {
    let mut result = GLYPH_NAME
        .replace_all(text, |caps: &regex::Captures<'_>| {
            u32::from_str_radix(&caps[1], 16)
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned();

    for (from, to) in ASCII_APPROXIMATIONS {
        if result.contains(*from) {
            result = result.replace(*from, to);
        }
    }

    result
        .replace('\0', "")
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_pages_joined_by_blank_lines() {
        let data = fixtures::pdf_with_pages(&["First page", "Second page", "Third page"]);
        let out = extract(&data, &ExtractContext::unbounded()).unwrap();
        assert!(matches!(out, Extracted::Complete(_)));
        assert_eq!(out.text(), "First page\n\nSecond page\n\nThird page");
    }

    #[test]
    fn test_stop_after_first_page_keeps_it() {
        let data = fixtures::pdf_with_pages(&["First page", "Second page", "Third page"]);
        match extract(&data, &ExtractContext::stopping_after(1)).unwrap() {
            Extracted::Partial { text, cause } => {
                assert_eq!(text, "First page");
                assert!(cause.is_timeout());
            }
            other => panic!("expected partial, got {:?}", other),
        }
    }

    #[test]
    fn test_encrypted_is_password_protected() {
        let err = extract(&fixtures::encrypted_pdf(), &ExtractContext::unbounded()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PasswordProtected);
    }

    #[test]
    fn test_missing_header_is_corrupted() {
        let err = extract(b"not a pdf", &ExtractContext::unbounded()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptedFile);
    }

    #[test]
    fn test_garbage_after_header_is_corrupted() {
        let err = extract(b"%PDF-1.4\nthis is not a real document", &ExtractContext::unbounded())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptedFile);
    }

    #[test]
    fn test_cleanup() {
        assert_eq!(cleanup_pdf_text("It(uni2019)s"), "It's");
        assert_eq!(cleanup_pdf_text("don<uni2019>t \u{FB01}ne"), "don't fine");
        assert_eq!(cleanup_pdf_text("  a\0b  \n\n\n  c \u{2014} d "), "ab\nc -- d");
        assert_eq!(cleanup_pdf_text("universe unicorn"), "universe unicorn");
    }
}
