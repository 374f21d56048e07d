//! Shared helpers for ZIP-packaged formats (docx, xlsx, pptx, epub)

use quick_xml::events::BytesStart;
use std::io::{Cursor, Read};
use zip::result::ZipError;
use zip::ZipArchive;

use super::context::Result;
use crate::error::ExtractFailure;
use crate::validation::{is_encrypted_ooxml, is_zip};

/// Upper bound on a single decompressed part
pub(crate) const MAX_PART_SIZE: u64 = 256 * 1024 * 1024;

pub(crate) type Archive<'a> = ZipArchive<Cursor<&'a [u8]>>;

/// Reject non-ZIP input up front.
///
/// Office encrypts documents by wrapping them in a compound file, so that
/// case is reported as password protection rather than corruption.
pub(crate) fn ensure_zip(format: &'static str, data: &[u8]) -> Result<()> {
    if is_encrypted_ooxml(data) {
        return Err(ExtractFailure::PasswordProtected(format));
    }
    if !is_zip(data) {
        return Err(ExtractFailure::corrupted(format, "missing ZIP signature"));
    }
    Ok(())
}

/// Open the central directory
pub(crate) fn open_archive<'a>(format: &'static str, data: &'a [u8]) -> Result<Archive<'a>> {
    ensure_zip(format, data)?;
    ZipArchive::new(Cursor::new(data)).map_err(|e| ExtractFailure::from_library(format, e))
}

/// Read a part as UTF-8 text; `Ok(None)` when the part does not exist
pub(crate) fn read_part(
    archive: &mut Archive<'_>,
    format: &'static str,
    name: &str,
) -> Result<Option<String>> {
    let file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(ExtractFailure::from_library(format, e)),
    };

    let mut bytes = Vec::new();
    file.take(MAX_PART_SIZE)
        .read_to_end(&mut bytes)
        .map_err(|e| ExtractFailure::corrupted(format, format!("{}: {}", name, e)))?;

    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
}

/// Read a part that must exist
pub(crate) fn require_part(
    archive: &mut Archive<'_>,
    format: &'static str,
    name: &str,
) -> Result<String> {
    read_part(archive, format, name)?
        .ok_or_else(|| ExtractFailure::corrupted(format, format!("missing part {}", name)))
}

/// Unescaped value of an attribute, matched on its local name
pub(crate) fn attr(element: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Resolve a relationship or manifest target against the directory of the
/// part that references it, normalizing `.` and `..` segments
pub(crate) fn resolve_part(base_dir: &str, target: &str) -> String {
    let target = target.split('#').next().unwrap_or_default().replace("%20", " ");
    let base: Vec<&str> = if target.starts_with('/') {
        Vec::new()
    } else {
        base_dir.split('/').filter(|s| !s.is_empty() && *s != ".").collect()
    };
    normalize_segments(base, &target)
}

fn normalize_segments<'a>(mut segments: Vec<&'a str>, path: &'a str) -> String {
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Directory portion of a part name (`ppt/slides/slide1.xml` -> `ppt/slides`)
pub(crate) fn parent_dir(part: &str) -> &str {
    part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or_default()
}
