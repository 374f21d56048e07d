//! HTML rendered to plain text

use scraper::{ElementRef, Html, Node};

use super::context::{ExtractContext, Extracted, Result};
use super::text;

/// Subtrees never rendered
const SKIPPED: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Elements that start on a new line
const BLOCKS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "details", "dialog", "div", "dl", "dt",
    "fieldset", "figcaption", "figure", "footer", "form", "header", "hgroup", "hr", "main", "nav",
    "ol", "pre", "section", "summary", "table", "tbody", "thead", "tfoot", "tr", "ul",
];

/// Elements separated from their neighbours by a blank line
const PARAGRAPHS: &[&str] = &["p", "h1", "h2", "h3", "h4", "h5", "h6"];

/// Recursion limit; deeper subtrees are flattened
const MAX_DEPTH: usize = 256;
const NODES_PER_CHECK: usize = 1000;

pub(super) fn extract(data: &[u8], ctx: &ExtractContext) -> Result<Extracted> {
    let source = text::decode(data);
    let rendered = render(&source, ctx)?;
    let mut out = ctx.builder();
    out.push_str(&rendered)?;
    Ok(out.complete())
}

/// Render a document or fragment to normalized text
pub(crate) fn render(source: &str, ctx: &ExtractContext) -> Result<String> {
    let document = Html::parse_document(source);
    let mut walker = Walker {
        ctx,
        buf: String::with_capacity(source.len() / 2),
        nodes: 0,
    };
    walker.element(document.root_element(), 0)?;
    Ok(text::normalize(&walker.buf))
}

struct Walker<'c> {
    ctx: &'c ExtractContext,
    buf: String,
    nodes: usize,
}

impl Walker<'_> {
    fn element(&mut self, element: ElementRef<'_>, depth: usize) -> Result<()> {
        self.nodes += 1;
        if self.nodes % NODES_PER_CHECK == 0 {
            self.ctx.check()?;
        }

        let name = element.value().name();
        if SKIPPED.contains(&name) {
            return Ok(());
        }

        match name {
            "br" => {
                self.buf.push('\n');
                return Ok(());
            }
            "li" => {
                self.line_break();
                self.buf.push_str("• ");
            }
            "td" | "th" => {
                let first = !element.prev_siblings().any(|s| s.value().is_element());
                if !first {
                    self.buf.push_str(" | ");
                }
            }
            "img" => {
                if let Some(alt) = element.value().attr("alt") {
                    self.push_inline(alt);
                }
                return Ok(());
            }
            _ if PARAGRAPHS.contains(&name) => self.paragraph_break(),
            _ if BLOCKS.contains(&name) => self.line_break(),
            _ => {}
        }

        if depth >= MAX_DEPTH {
            let flat: String = element.text().collect();
            self.push_inline(&flat);
        } else {
            for child in element.children() {
                match child.value() {
                    Node::Text(text) => self.push_inline(text),
                    Node::Element(_) => {
                        if let Some(child) = ElementRef::wrap(child) {
                            self.element(child, depth + 1)?;
                        }
                    }
                    _ => {}
                }
            }
        }

        if PARAGRAPHS.contains(&name) {
            self.paragraph_break();
        } else if BLOCKS.contains(&name) || name == "li" {
            self.line_break();
        }
        Ok(())
    }

    fn line_break(&mut self) {
        if !self.buf.is_empty() && !self.buf.ends_with('\n') {
            self.buf.push('\n');
        }
    }

    fn paragraph_break(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        while !self.buf.ends_with("\n\n") {
            self.buf.push('\n');
        }
    }

    /// Append text with whitespace runs collapsed to one space
    fn push_inline(&mut self, text: &str) {
        let mut last_space = self.buf.ends_with([' ', '\n']);
        for c in text.chars() {
            if c.is_whitespace() {
                if !last_space {
                    self.buf.push(' ');
                    last_space = true;
                }
            } else {
                self.buf.push(c);
                last_space = false;
            }
        }
    }
}
