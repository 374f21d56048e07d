//! Structured data flattened into indented `key: value` lines

use serde_json::Value;
use std::borrow::Cow;

use super::context::{ExtractContext, Extracted, Result, TextBuilder};
use super::text;
use crate::error::ExtractFailure;

/// Nesting depth past which values are elided
pub const MAX_JSON_DEPTH: usize = 32;

const INDENT: &str = "  ";

pub(super) fn extract(data: &[u8], ctx: &ExtractContext) -> Result<Extracted> {
    let decoded = text::decode(data);
    let pruned = prune_deep(&decoded);
    let value: Value =
        serde_json::from_str(&pruned).map_err(|e| ExtractFailure::corrupted("JSON", e))?;

    ctx.check()?;
    let mut out = ctx.builder();
    flatten(&value, 0, &mut out)?;
    Ok(out.complete())
}

/// Replace containers nested below anything that gets rendered with a
/// placeholder scalar, keeping the parser inside its recursion limit.
/// Elided containers still render as `...` since they stay non-empty.
fn prune_deep(src: &str) -> Cow<'_, str> {
    let bytes = src.as_bytes();
    let mut pruned: Option<String> = None;
    let mut copied = 0;
    let mut level = 0usize;
    let mut strings = StringState::default();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if !strings.step(b) {
            match b {
                b'[' | b'{' if level + 1 >= MAX_JSON_DEPTH + 2 => {
                    let end = skip_container(bytes, i);
                    let buf = pruned.get_or_insert_with(|| String::with_capacity(src.len()));
                    buf.push_str(&src[copied..i]);
                    buf.push('0');
                    copied = end;
                    i = end;
                    continue;
                }
                b'[' | b'{' => level += 1,
                b']' | b'}' => level = level.saturating_sub(1),
                _ => {}
            }
        }
        i += 1;
    }

    match pruned {
        Some(mut buf) => {
            buf.push_str(&src[copied..]);
            Cow::Owned(buf)
        }
        None => Cow::Borrowed(src),
    }
}

/// Index just past the container opened at `start`, or the end of input
fn skip_container(bytes: &[u8], start: usize) -> usize {
    let mut level = 0usize;
    let mut strings = StringState::default();
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if strings.step(b) {
            continue;
        }
        match b {
            b'[' | b'{' => level += 1,
            b']' | b'}' => {
                level = level.saturating_sub(1);
                if level == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
    }
    bytes.len()
}

/// Tracks string literals while scanning raw JSON
#[derive(Debug, Default)]
struct StringState {
    inside: bool,
    escaped: bool,
}

impl StringState {
    /// Feed one byte; true when it belongs to a string literal
    fn step(&mut self, b: u8) -> bool {
        if self.inside {
            if self.escaped {
                self.escaped = false;
            } else if b == b'\\' {
                self.escaped = true;
            } else if b == b'"' {
                self.inside = false;
            }
            true
        } else if b == b'"' {
            self.inside = true;
            true
        } else {
            false
        }
    }
}

fn flatten(value: &Value, depth: usize, out: &mut TextBuilder<'_>) -> Result<()> {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                line(out, depth, &format!("{}:", key))?;
                write_child(child, depth, out)?;
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                line(out, depth, &format!("[{}]", i))?;
                write_child(child, depth, out)?;
            }
        }
        scalar => line(out, depth, &scalar_text(scalar))?,
    }
    Ok(())
}

/// Scalars continue the key line; containers open a deeper block
fn write_child(child: &Value, depth: usize, out: &mut TextBuilder<'_>) -> Result<()> {
    match child {
        Value::Object(map) if map.is_empty() => out.push_str(" {}"),
        Value::Array(items) if items.is_empty() => out.push_str(" []"),
        Value::Object(_) | Value::Array(_) if depth + 1 >= MAX_JSON_DEPTH => out.push_str(" ..."),
        Value::Object(_) | Value::Array(_) => flatten(child, depth + 1, out),
        scalar => {
            out.push(' ')?;
            out.push_str(&scalar_text(scalar))
        }
    }
}

fn line(out: &mut TextBuilder<'_>, depth: usize, content: &str) -> Result<()> {
    out.newline()?;
    for _ in 0..depth {
        out.push_str(INDENT)?;
    }
    out.push_str(content)
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn run(data: &str) -> String {
        extract(data.as_bytes(), &ExtractContext::unbounded())
            .unwrap()
            .text()
            .to_string()
    }

    #[test]
    fn test_nested_objects_and_arrays() {
        let out = run(r#"{"name": "Ada", "tags": ["math", "code"], "address": {"city": "London", "zip": null}}"#);
        assert_eq!(
            out,
            "name: Ada\ntags:\n  [0] math\n  [1] code\naddress:\n  city: London\n  zip: null"
        );
    }

    #[test]
    fn test_top_level_scalar_and_empty_containers() {
        assert_eq!(run("42"), "42");
        assert_eq!(run(r#"{"a": {}, "b": []}"#), "a: {}\nb: []");
        assert_eq!(run("[]"), "");
    }

    #[test]
    fn test_depth_cap() {
        let deep = format!("{}1{}", "[".repeat(40), "]".repeat(40));
        let out = run(&deep);
        assert!(out.ends_with("..."));
        let deepest = out.lines().last().unwrap();
        assert_eq!(deepest.trim(), "[0] ...");
        assert_eq!(deepest.len() - deepest.trim_start().len(), (MAX_JSON_DEPTH - 1) * 2);
    }

    #[test]
    fn test_nesting_past_parser_limit() {
        let deep = format!("{}1{}", "[".repeat(200), "]".repeat(200));
        let shallow = format!("{}1{}", "[".repeat(40), "]".repeat(40));
        assert_eq!(run(&deep), run(&shallow));

        let mixed = format!(r#"{{"doc": {}{{"k": "v"}}{}}}"#, "[".repeat(300), "]".repeat(300));
        assert!(run(&mixed).starts_with("doc:\n  [0]\n"));
    }

    #[test]
    fn test_brackets_inside_strings_are_not_nesting() {
        let quoted = "[".repeat(200);
        let source = format!(r#"{{"a": "{}", "b": "\"]"}}"#, quoted);
        assert!(matches!(prune_deep(&source), Cow::Borrowed(_)));
        assert_eq!(run(&source), format!("a: {}\nb: \"]", quoted));
    }

    #[test]
    fn test_unbalanced_deep_input_still_rejected() {
        let broken = format!("{}1", "[".repeat(200));
        let err = extract(broken.as_bytes(), &ExtractContext::unbounded()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptedFile);
    }

    #[test]
    fn test_invalid_json_is_corrupted() {
        let err = extract(b"{\"a\": ", &ExtractContext::unbounded()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptedFile);
    }
}
