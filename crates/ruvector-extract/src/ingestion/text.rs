//! Plain text decoding and whitespace normalization

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

use super::context::{ExtractContext, Extracted, Result};
use crate::validation::sniffer::guess_utf16_le;

/// Runs of horizontal whitespace
static HORIZONTAL_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\x0B\x0C\u{A0}]+").unwrap());
/// C0 controls other than tab and line breaks, plus DEL
static CONTROL_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x00-\x08\x0E-\x1F\x7F]+").unwrap());

/// Lines processed between deadline checks
const LINES_PER_CHECK: usize = 1000;

/// Extract plain text
pub(super) fn extract(data: &[u8], ctx: &ExtractContext) -> Result<Extracted> {
    let text = decode(data);
    let mut out = ctx.builder();

    let mut pending_blank = false;
    for (i, line) in split_lines(&text).enumerate() {
        if i % LINES_PER_CHECK == 0 {
            ctx.check()?;
        }
        let line = collapse_line(line);
        if line.is_empty() {
            pending_blank = !out.is_empty();
            continue;
        }
        if pending_blank {
            out.blank_line()?;
        } else {
            out.newline()?;
        }
        pending_blank = false;
        out.push_str(&line)?;
    }

    Ok(out.complete())
}

/// Decode bytes to text.
///
/// Valid UTF-8 is used as is (minus a BOM). Otherwise UTF-16 is attempted,
/// and as a last resort invalid sequences are replaced.
pub fn decode(data: &[u8]) -> Cow<'_, str> {
    let body = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);
    if let Ok(text) = std::str::from_utf8(body) {
        return Cow::Borrowed(text);
    }
    if let Some(text) = decode_utf16(data) {
        return Cow::Owned(text);
    }
    String::from_utf8_lossy(body)
}

/// UTF-16 by BOM, or by the position of zero bytes in a sample
fn decode_utf16(data: &[u8]) -> Option<String> {
    let (little_endian, body) = match data {
        [0xFF, 0xFE, rest @ ..] => (true, rest),
        [0xFE, 0xFF, rest @ ..] => (false, rest),
        _ => (guess_utf16_le(data)?, data),
    };

    let units: Vec<u16> = body
        .chunks_exact(2)
        .map(|pair| {
            if little_endian {
                u16::from_le_bytes([pair[0], pair[1]])
            } else {
                u16::from_be_bytes([pair[0], pair[1]])
            }
        })
        .collect();

    String::from_utf16(&units).ok()
}

/// Split on `\r\n`, `\r` or `\n`
fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = text;
    let mut done = text.is_empty();
    std::iter::from_fn(move || {
        if done {
            return None;
        }
        match rest.find(['\r', '\n']) {
            Some(pos) => {
                let line = &rest[..pos];
                let skip = if rest[pos..].starts_with("\r\n") { 2 } else { 1 };
                rest = &rest[pos + skip..];
                Some(line)
            }
            None => {
                done = true;
                Some(rest)
            }
        }
    })
}

/// Drop control characters, collapse horizontal whitespace runs to one
/// space and trim
fn collapse_line(line: &str) -> Cow<'_, str> {
    match CONTROL_CHARS.replace_all(line, "") {
        Cow::Borrowed(visible) => HORIZONTAL_WS.replace_all(visible.trim(), " "),
        Cow::Owned(visible) => {
            Cow::Owned(HORIZONTAL_WS.replace_all(visible.trim(), " ").into_owned())
        }
    }
}

/// Full normalization without a context: line endings, intra-line
/// whitespace and blank-line runs
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_blank = false;
    for line in split_lines(text) {
        let line = collapse_line(line);
        if line.is_empty() {
            pending_blank = !out.is_empty();
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
            if pending_blank {
                out.push('\n');
            }
        }
        pending_blank = false;
        out.push_str(&line);
    }
    out
}

/// Trim line ends and collapse blank-line runs, keeping tabs and inner spacing
pub fn tidy_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_blank = false;
    for line in split_lines(text) {
        let line = line.trim_end();
        if line.trim().is_empty() {
            pending_blank = !out.is_empty();
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
            if pending_blank {
                out.push('\n');
            }
        }
        pending_blank = false;
        out.push_str(line);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(data: &[u8]) -> String {
        match extract(data, &ExtractContext::unbounded()).unwrap() {
            Extracted::Complete(text) => text,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_line_endings_and_whitespace() {
        let input = b"first   line\twith\t\ttabs\r\nsecond\rthird\n\n\n\nfourth  \n";
        assert_eq!(run(input), "first line with tabs\nsecond\nthird\n\nfourth");
    }

    #[test]
    fn test_control_characters_dropped() {
        assert_eq!(run(b"be\x07ll\x00 and\x1b[0m \x7fdone\x08"), "bell and[0m done");
        assert_eq!(run(b"\x01\x02\n\x03\nkept\tthis"), "kept this");
        assert_eq!(normalize("a\x0Bb\x0Cc\x1Fd"), "a b cd");
    }

    #[test]
    fn test_blank_line_runs_collapse_to_one() {
        assert_eq!(run(b"a\r\n\r\n\r\n\r\nb\n \n\t\nc"), "a\n\nb\n\nc");
    }

    #[test]
    fn test_leading_blank_lines_dropped() {
        assert_eq!(run(b"\n\n  \nhello"), "hello");
    }

    #[test]
    fn test_utf8_bom_stripped() {
        assert_eq!(run(b"\xEF\xBB\xBFhello"), "hello");
    }

    #[test]
    fn test_utf16_with_bom() {
        let mut data = vec![0xFF, 0xFE];
        data.extend("hi there".encode_utf16().flat_map(|u| u.to_le_bytes()));
        assert_eq!(run(&data), "hi there");

        let mut data = vec![0xFE, 0xFF];
        data.extend("big endian".encode_utf16().flat_map(|u| u.to_be_bytes()));
        assert_eq!(run(&data), "big endian");
    }

    #[test]
    fn test_utf16_without_bom() {
        let data: Vec<u8> = "plain ascii in utf16"
            .encode_utf16()
            .flat_map(|u| u.to_le_bytes())
            .collect();
        assert_eq!(run(&data), "plain ascii in utf16");
    }

    #[test]
    fn test_invalid_bytes_replaced() {
        assert_eq!(run(b"caf\xE9 ok"), "caf\u{FFFD} ok");
    }

    #[test]
    fn test_tidy_lines_keeps_tabs() {
        assert_eq!(tidy_lines("a\tb  \n\n\n\nc"), "a\tb\n\nc");
    }
}
