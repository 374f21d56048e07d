//! Delimited tabular data

use csv::{ReaderBuilder, StringRecord};
use once_cell::sync::Lazy;
use regex::Regex;

use super::context::{ExtractContext, Extracted, Result};
use super::text;
use crate::error::ExtractFailure;

/// Bytes sampled for delimiter detection
const DELIMITER_SAMPLE: usize = 1024;
/// Candidates in tie-break order
const DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];
/// Rows between deadline checks
const ROWS_PER_CHECK: usize = 1000;

static NUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-+]?(\d+\.?\d*|\.\d+)([eE][-+]?\d+)?$").unwrap());

/// Extract rows as text
pub(super) fn extract(data: &[u8], ctx: &ExtractContext) -> Result<Extracted> {
    let decoded = text::decode(data);
    let delimiter = detect_delimiter(decoded.as_bytes());

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(decoded.as_bytes());

    let mut out = ctx.builder();
    let mut header: Option<StringRecord> = None;
    let mut rows = 0usize;

    for (i, record) in reader.records().enumerate() {
        if i % ROWS_PER_CHECK == 0 {
            ctx.check()?;
        }
        let record = record.map_err(|e| ExtractFailure::corrupted("CSV", e))?;
        if record.iter().all(str::is_empty) {
            continue;
        }

        if i == 0 && looks_like_header(&record) {
            header = Some(record);
            continue;
        }

        let line = match &header {
            Some(header) => render_with_header(header, &record),
            None => record.iter().collect::<Vec<_>>().join(" | "),
        };
        out.newline()?;
        out.push_str(&line)?;
        rows += 1;
    }

    // Header-only file: the header itself is the content
    if rows == 0 {
        if let Some(header) = &header {
            out.push_str(&header.iter().collect::<Vec<_>>().join(" | "))?;
        }
    }

    Ok(out.complete())
}

/// Most frequent candidate delimiter in the leading sample; comma on ties
pub fn detect_delimiter(data: &[u8]) -> u8 {
    let sample = &data[..data.len().min(DELIMITER_SAMPLE)];
    let mut best = b',';
    let mut best_count = 0usize;
    for &candidate in &DELIMITERS {
        let count = sample.iter().filter(|&&b| b == candidate).count();
        if count > best_count {
            best = candidate;
            best_count = count;
        }
    }
    best
}

/// A row is a header when fewer than half its non-empty cells are numbers
fn looks_like_header(record: &StringRecord) -> bool {
    let cells: Vec<&str> = record.iter().filter(|c| !c.is_empty()).collect();
    if cells.is_empty() {
        return false;
    }
    let numeric = cells.iter().filter(|c| NUMERIC.is_match(c)).count();
    numeric * 2 < cells.len()
}

fn render_with_header(header: &StringRecord, record: &StringRecord) -> String {
    record
        .iter()
        .enumerate()
        .filter(|(_, value)| !value.is_empty())
        .map(|(i, value)| match header.get(i).filter(|h| !h.is_empty()) {
            Some(name) => format!("{}: {}", name, value),
            None => value.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
