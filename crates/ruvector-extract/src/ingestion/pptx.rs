//! Presentations (.pptx): slide text followed by speaker notes

use quick_xml::events::Event;
use quick_xml::Reader;

use super::context::{ExtractContext, Extracted, Result};
use super::ooxml::{self, Archive};
use crate::error::ExtractFailure;

const FORMAT: &str = "presentation";
const SLIDE_PREFIX: &str = "ppt/slides/slide";
const NOTES_REL_TYPE: &str = "/notesSlide";

pub(super) fn extract(data: &[u8], ctx: &ExtractContext) -> Result<Extracted> {
    let mut archive = ooxml::open_archive(FORMAT, data)?;

    // Find all slide parts and order them by number
    let mut slides: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| {
            let number = name.strip_prefix(SLIDE_PREFIX)?.strip_suffix(".xml")?;
            Some((number.parse::<u32>().ok()?, name.to_string()))
        })
        .collect();
    slides.sort_by_key(|(number, _)| *number);

    let mut out = ctx.builder();
    for (index, (number, slide_name)) in slides.iter().enumerate() {
        ctx.check()?;

        let xml = ooxml::require_part(&mut archive, FORMAT, slide_name)?;
        let slide_text = paragraphs(&xml)?.join("\n");

        let notes_text = match notes_part(&mut archive, *number, slide_name)? {
            Some(notes_xml) => paragraphs(&notes_xml)?.join("\n"),
            None => String::new(),
        };

        if slide_text.is_empty() && notes_text.is_empty() {
            continue;
        }

        out.blank_line()?;
        out.push_str(&format!("Slide {}:", index + 1))?;
        if !slide_text.is_empty() {
            out.newline()?;
            out.push_str(&slide_text)?;
        }
        if !notes_text.is_empty() {
            out.newline()?;
            out.push_str("Notes:")?;
            out.newline()?;
            out.push_str(&notes_text)?;
        }
    }

    Ok(out.complete())
}

/// Speaker notes for a slide, located through the slide's relationships and
/// falling back to the conventional part name
fn notes_part(archive: &mut Archive<'_>, number: u32, slide_name: &str) -> Result<Option<String>> {
    let rels_name = format!("ppt/slides/_rels/slide{}.xml.rels", number);
    if let Some(rels) = ooxml::read_part(archive, FORMAT, &rels_name)? {
        if let Some(target) = notes_target(&rels) {
            let part = ooxml::resolve_part(ooxml::parent_dir(slide_name), &target);
            return ooxml::read_part(archive, FORMAT, &part);
        }
        return Ok(None);
    }
    ooxml::read_part(archive, FORMAT, &format!("ppt/notesSlides/notesSlide{}.xml", number))
}

fn notes_target(rels: &str) -> Option<String> {
    let mut reader = Reader::from_str(rels);
    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.local_name().as_ref() == b"Relationship" => {
                let is_notes = ooxml::attr(&e, b"Type").is_some_and(|t| t.ends_with(NOTES_REL_TYPE));
                if is_notes {
                    return ooxml::attr(&e, b"Target");
                }
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

/// Text of each DrawingML paragraph (`a:p`), runs concatenated.
///
/// Field runs (`a:fld`) carry slide numbers and dates, not content.
fn paragraphs(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut result = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut field_depth = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"t" => in_text = true,
                b"fld" => field_depth += 1,
                b"p" => current.clear(),
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"br" {
                    current.push('\n');
                }
            }
            Ok(Event::Text(t)) if in_text && field_depth == 0 => {
                let text = t
                    .unescape()
                    .map_err(|e| ExtractFailure::corrupted(FORMAT, e))?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"fld" => field_depth = field_depth.saturating_sub(1),
                b"p" => {
                    let line = current.trim();
                    if !line.is_empty() {
                        result.push(line.to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractFailure::corrupted(FORMAT, e)),
            _ => {}
        }
    }

    Ok(result)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::ingestion::ooxml::fixtures::zip_of;

    fn slide(paragraphs: &[&[&str]]) -> String {
        let body: String = paragraphs
            .iter()
            .map(|runs| {
                let runs: String = runs
                    .iter()
                    .map(|r| format!("<a:r><a:t>{}</a:t></a:r>", r))
                    .collect();
                format!("<a:p>{}<a:fld type=\"slidenum\"><a:t>7</a:t></a:fld></a:p>", runs)
            })
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree><p:sp><p:txBody>{}</p:txBody></p:sp></p:spTree></p:cSld></p:sld>"#,
            body
        )
    }

    /// Three slides stored out of order, the first with speaker notes
    pub fn sample_pptx() -> Vec<u8> {
        let slide1 = slide(&[&["Quarterly ", "review"], &["Revenue &amp; costs"]]);
        let slide2 = slide(&[&["Second slide"]]);
        let slide10 = slide(&[&["Tenth slide"]]);
        let notes1 = slide(&[&["Mention the new hires"]]);
        let rels1 = r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="../slideLayouts/slideLayout1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/notesSlide" Target="../notesSlides/notesSlide1.xml"/></Relationships>"#;

        zip_of(&[
            ("ppt/slides/slide10.xml", &slide10),
            ("ppt/slides/slide2.xml", &slide2),
            ("ppt/slides/slide1.xml", &slide1),
            ("ppt/slides/_rels/slide1.xml.rels", rels1),
            ("ppt/notesSlides/notesSlide1.xml", &notes1),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::ingestion::ooxml::fixtures::{encrypted_container, zip_of};

    #[test]
    fn test_slides_in_numeric_order_with_notes() {
        let out = extract(&fixtures::sample_pptx(), &ExtractContext::unbounded()).unwrap();
        assert_eq!(
            out.text(),
            "Slide 1:\nQuarterly review\nRevenue & costs\nNotes:\nMention the new hires\n\n\
             Slide 2:\nSecond slide\n\nSlide 3:\nTenth slide"
        );
    }

    #[test]
    fn test_empty_deck() {
        let data = zip_of(&[("ppt/presentation.xml", "<p:presentation/>")]);
        let out = extract(&data, &ExtractContext::unbounded()).unwrap();
        assert_eq!(out.text(), "");
    }

    #[test]
    fn test_password_protected() {
        let err = extract(&encrypted_container(), &ExtractContext::unbounded()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PasswordProtected);
    }

    #[test]
    fn test_line_breaks_inside_paragraph() {
        let xml = r#"<a:p xmlns:a="x"><a:r><a:t>one</a:t></a:r><a:br/><a:r><a:t>two</a:t></a:r></a:p>"#;
        assert_eq!(paragraphs(xml).unwrap(), vec!["one\ntwo".to_string()]);
    }
}
