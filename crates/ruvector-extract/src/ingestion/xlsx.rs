//! Spreadsheets (.xlsx)

use calamine::{Data, Reader, Xlsx};
use std::io::Cursor;

use super::context::{ExtractContext, Extracted, Result};
use super::ooxml;
use crate::error::ExtractFailure;

const ROWS_PER_CHECK: usize = 1000;

pub(super) fn extract(data: &[u8], ctx: &ExtractContext) -> Result<Extracted> {
    ooxml::ensure_zip("spreadsheet", data)?;
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(data))
        .map_err(|e| ExtractFailure::from_library("spreadsheet", e))?;

    let mut out = ctx.builder();
    for sheet_name in workbook.sheet_names() {
        ctx.check()?;

        let range = match workbook.worksheet_range(&sheet_name) {
            Ok(range) => range,
            Err(e) => {
                tracing::warn!("Skipping sheet '{}': {}", sheet_name, e);
                continue;
            }
        };

        out.blank_line()?;
        out.push_str(&format!("Sheet: {}", sheet_name))?;

        for (i, row) in range.rows().enumerate() {
            if i > 0 && i % ROWS_PER_CHECK == 0 {
                ctx.check()?;
            }
            let cells: Vec<String> = row.iter().map(cell_text).collect();
            if cells.iter().all(|s| s.is_empty()) {
                continue;
            }
            out.newline()?;
            out.push_str(&cells.join(" | "))?;
        }
    }

    Ok(out.complete())
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        _ => String::new(),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::ingestion::ooxml::fixtures::encrypted_container;

    #[test]
    fn test_sheets_rows_and_blank_rows() {
        let out = extract(&fixtures::sample_xlsx(), &ExtractContext::unbounded()).unwrap();
        assert_eq!(
            out.text(),
            "Sheet: Budget\nItem | Cost\nRent | 1200\nTotal | 1200.5\n\nSheet: Empty"
        );
    }

    #[test]
    fn test_truncated_workbook_is_corrupted() {
        let data = fixtures::sample_xlsx();
        let err = extract(&data[4..], &ExtractContext::unbounded()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptedFile);
    }

    #[test]
    fn test_password_protected() {
        let err = extract(&encrypted_container(), &ExtractContext::unbounded()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PasswordProtected);
    }

    #[test]
    fn test_cell_formatting() {
        assert_eq!(cell_text(&Data::Float(3.0)), "3");
        assert_eq!(cell_text(&Data::Int(-7)), "-7");
        assert_eq!(cell_text(&Data::String("  padded ".into())), "padded");
        assert_eq!(cell_text(&Data::Bool(true)), "true");
    }
}
