//! Word-processing documents (.docx)

use docx_rs::{
    DocumentChild, Paragraph, ParagraphChild, RunChild, Table, TableCellContent, TableChild,
    TableRowChild,
};

use super::context::{ExtractContext, Extracted, Result};
use super::ooxml;
use crate::error::ExtractFailure;

/// Body blocks between deadline checks
const BLOCKS_PER_CHECK: usize = 100;

pub(super) fn extract(data: &[u8], ctx: &ExtractContext) -> Result<Extracted> {
    ooxml::ensure_zip("document", data)?;
    let docx = docx_rs::read_docx(data).map_err(|e| ExtractFailure::from_library("document", e))?;

    let mut out = ctx.builder();
    for (i, child) in docx.document.children.iter().enumerate() {
        if i % BLOCKS_PER_CHECK == 0 {
            ctx.check()?;
        }
        let block = match child {
            DocumentChild::Paragraph(p) => paragraph_text(p),
            DocumentChild::Table(t) => table_text(t),
            _ => continue,
        };
        if block.trim().is_empty() {
            continue;
        }
        out.newline()?;
        out.push_str(block.trim_end())?;
    }

    Ok(out.complete())
}

fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut text = String::new();
    collect_runs(&paragraph.children, &mut text);
    text
}

fn collect_runs(children: &[ParagraphChild], text: &mut String) {
    for child in children {
        match child {
            ParagraphChild::Run(run) => {
                for part in &run.children {
                    match part {
                        RunChild::Text(t) => text.push_str(&t.text),
                        RunChild::Tab(_) => text.push('\t'),
                        RunChild::Break(_) => text.push('\n'),
                        _ => {}
                    }
                }
            }
            ParagraphChild::Hyperlink(link) => collect_runs(&link.children, text),
            _ => {}
        }
    }
}

/// One line per row, cells tab-joined
fn table_text(table: &Table) -> String {
    let mut lines = Vec::new();
    for child in &table.rows {
        let TableChild::TableRow(row) = child;
        let cells: Vec<String> = row
            .cells
            .iter()
            .map(|cell| {
                let TableRowChild::TableCell(cell) = cell;
                cell.children
                    .iter()
                    .filter_map(|content| match content {
                        TableCellContent::Paragraph(p) => Some(paragraph_text(p)),
                        TableCellContent::Table(t) => Some(table_text(t)),
                        _ => None,
                    })
                    .filter(|s| !s.trim().is_empty())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect();
        if cells.iter().any(|c| !c.trim().is_empty()) {
            lines.push(cells.join("\t"));
        }
    }
    lines.join("\n")
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::ingestion::ooxml::fixtures::{encrypted_container, zip_of};

    #[test]
    fn test_paragraphs_and_tables() {
        let out = extract(&fixtures::sample_docx(), &ExtractContext::unbounded()).unwrap();
        assert_eq!(out.text(), "Quarterly report\nName\tRole\nAda\tEngineer\nTotal\t42");
    }

    #[test]
    fn test_password_protected() {
        let err = extract(&encrypted_container(), &ExtractContext::unbounded()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PasswordProtected);
    }

    #[test]
    fn test_zip_without_document_is_corrupted() {
        let data = zip_of(&[("hello.txt", "not a document")]);
        let err = extract(&data, &ExtractContext::unbounded()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptedFile);
    }
}
