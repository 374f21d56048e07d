//! E-books (.epub): chapters read in spine order

use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;

use super::context::{ExtractContext, Extracted, Result};
use super::html;
use super::ooxml::{self, Archive};
use crate::error::ExtractFailure;

const FORMAT: &str = "e-book";
const CONTAINER: &str = "META-INF/container.xml";

/// Package document contents needed for reading order
#[derive(Debug, Default)]
struct Package {
    /// Manifest id -> archive path
    manifest: HashMap<String, String>,
    /// Manifest ids in reading order, non-linear items last
    spine: Vec<String>,
}

pub(super) fn extract(data: &[u8], ctx: &ExtractContext) -> Result<Extracted> {
    let mut archive = ooxml::open_archive(FORMAT, data)?;
    let opf_path = package_path(&mut archive)?;
    let opf = ooxml::require_part(&mut archive, FORMAT, &opf_path)?;
    let package = parse_package(&opf, ooxml::parent_dir(&opf_path))?;

    let mut out = ctx.builder();
    for idref in &package.spine {
        if let Err(e) = ctx.check() {
            return out.interrupted(e);
        }

        let Some(path) = package.manifest.get(idref) else {
            tracing::debug!("Spine item '{}' has no manifest entry", idref);
            continue;
        };

        let markup = match ooxml::read_part(&mut archive, FORMAT, path) {
            Ok(Some(markup)) => markup,
            Ok(None) => {
                tracing::warn!("Skipping missing chapter {}", path);
                continue;
            }
            Err(e) => {
                tracing::warn!("Skipping unreadable chapter {}: {}", path, e);
                continue;
            }
        };

        match html::render(&markup, ctx) {
            Ok(text) => {
                if let Err(e) = out.push_block(&text) {
                    return if e.is_timeout() { out.interrupted(e) } else { Err(e) };
                }
            }
            Err(e) if e.is_timeout() => return out.interrupted(e),
            Err(e) => tracing::warn!("Skipping chapter {}: {}", path, e),
        }
    }

    Ok(out.complete())
}

/// Package document path from the container, or the first `.opf` in the archive
fn package_path(archive: &mut Archive<'_>) -> Result<String> {
    if let Some(container) = ooxml::read_part(archive, FORMAT, CONTAINER)? {
        let mut reader = Reader::from_str(&container);
        loop {
            match reader.read_event() {
                Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.local_name().as_ref() == b"rootfile" => {
                    if let Some(path) = ooxml::attr(&e, b"full-path") {
                        return Ok(path);
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(ExtractFailure::corrupted(FORMAT, e)),
                _ => {}
            }
        }
    }

    archive
        .file_names()
        .find(|name| name.to_ascii_lowercase().ends_with(".opf"))
        .map(str::to_string)
        .ok_or_else(|| ExtractFailure::corrupted(FORMAT, "no package document"))
}

fn parse_package(opf: &str, base_dir: &str) -> Result<Package> {
    let mut package = Package::default();
    let mut auxiliary = Vec::new();
    let mut reader = Reader::from_str(opf);
    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"item" => {
                    if let (Some(id), Some(href)) = (ooxml::attr(&e, b"id"), ooxml::attr(&e, b"href")) {
                        package.manifest.insert(id, ooxml::resolve_part(base_dir, &href));
                    }
                }
                b"itemref" => {
                    let linear = ooxml::attr(&e, b"linear");
                    if let Some(idref) = ooxml::attr(&e, b"idref") {
                        if linear.as_deref() == Some("no") {
                            auxiliary.push(idref);
                        } else {
                            package.spine.push(idref);
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractFailure::corrupted(FORMAT, e)),
            _ => {}
        }
    }
    package.spine.extend(auxiliary);
    Ok(package)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::ingestion::ooxml::fixtures::zip_of;

    pub const CONTAINER_XML: &str = r#"<?xml version="1.0"?><container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container"><rootfiles><rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/></rootfiles></container>"#;

    pub fn chapter(title: &str, body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><html xmlns="http://www.w3.org/1999/xhtml"><head><title>{0}</title></head><body><h1>{0}</h1><p>{1}</p></body></html>"#,
            title, body
        )
    }

    /// Two chapters; the spine lists them in the opposite order to the manifest
    pub fn sample_epub() -> Vec<u8> {
        let opf = r#"<?xml version="1.0"?><package xmlns="http://www.idpf.org/2007/opf" version="3.0"><manifest><item id="ch2" href="text/chapter2.xhtml" media-type="application/xhtml+xml"/><item id="ch1" href="text/chapter1.xhtml" media-type="application/xhtml+xml"/><item id="css" href="style.css" media-type="text/css"/></manifest><spine><itemref idref="ch1"/><itemref idref="ch2"/><itemref idref="gone"/></spine></package>"#;
        zip_of(&[
            ("mimetype", "application/epub+zip"),
            ("META-INF/container.xml", CONTAINER_XML),
            ("OEBPS/content.opf", opf),
            ("OEBPS/text/chapter1.xhtml", &chapter("One", "It begins.")),
            ("OEBPS/text/chapter2.xhtml", &chapter("Two", "It ends.")),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::error::ErrorKind;
    use crate::ingestion::ooxml::fixtures::zip_of;
    use std::time::{Duration, Instant};
    use tokio_util::sync::CancellationToken;

    #[test]
    fn test_chapters_in_spine_order() {
        let out = extract(&sample_epub(), &ExtractContext::unbounded()).unwrap();
        assert!(matches!(out, Extracted::Complete(_)));
        assert_eq!(out.text(), "One\n\nIt begins.\n\nTwo\n\nIt ends.");
    }

    #[test]
    fn test_stop_after_first_chapter_keeps_it() {
        match extract(&sample_epub(), &ExtractContext::stopping_after(1)).unwrap() {
            Extracted::Partial { text, cause } => {
                assert_eq!(text, "One\n\nIt begins.");
                assert!(cause.is_timeout());
            }
            other => panic!("expected partial, got {:?}", other),
        }
    }

    #[test]
    fn test_non_linear_items_follow_the_spine() {
        let opf = r#"<package><manifest><item id="notes" href="notes.xhtml"/><item id="a" href="a.xhtml"/><item id="b" href="b.xhtml"/></manifest><spine><itemref idref="notes" linear="no"/><itemref idref="a"/><itemref idref="b" linear="yes"/></spine></package>"#;
        let data = zip_of(&[
            ("META-INF/container.xml", CONTAINER_XML),
            ("OEBPS/content.opf", opf),
            ("OEBPS/a.xhtml", &chapter("A", "First.")),
            ("OEBPS/b.xhtml", &chapter("B", "Second.")),
            ("OEBPS/notes.xhtml", &chapter("Notes", "Footnotes.")),
        ]);
        let out = extract(&data, &ExtractContext::unbounded()).unwrap();
        assert_eq!(out.text(), "A\n\nFirst.\n\nB\n\nSecond.\n\nNotes\n\nFootnotes.");
    }

    #[test]
    fn test_missing_chapter_is_skipped() {
        let opf = r#"<package><manifest><item id="a" href="a.xhtml"/><item id="b" href="b.xhtml"/></manifest><spine><itemref idref="a"/><itemref idref="b"/></spine></package>"#;
        let data = zip_of(&[
            ("META-INF/container.xml", CONTAINER_XML),
            ("OEBPS/content.opf", opf),
            ("OEBPS/b.xhtml", &chapter("B", "Survives.")),
        ]);
        let out = extract(&data, &ExtractContext::unbounded()).unwrap();
        assert_eq!(out.text(), "B\n\nSurvives.");
    }

    #[test]
    fn test_package_found_without_container() {
        let opf = r#"<package><manifest><item id="a" href="a.xhtml"/></manifest><spine><itemref idref="a"/></spine></package>"#;
        let data = zip_of(&[("book.opf", opf), ("a.xhtml", &chapter("Solo", "Only chapter."))]);
        let out = extract(&data, &ExtractContext::unbounded()).unwrap();
        assert_eq!(out.text(), "Solo\n\nOnly chapter.");
    }

    #[test]
    fn test_no_package_is_corrupted() {
        let data = zip_of(&[("mimetype", "application/epub+zip")]);
        let err = extract(&data, &ExtractContext::unbounded()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptedFile);
    }

    #[test]
    fn test_cancelled_before_first_chapter() {
        let token = CancellationToken::new();
        token.cancel();
        let ctx = ExtractContext::new(Instant::now() + Duration::from_secs(60), token, usize::MAX);
        let err = extract(&sample_epub(), &ctx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExtractionTimeout);
    }
}
