//! Markdown rendered to plain text

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};

use super::context::{ExtractContext, Extracted, Result, TextBuilder};
use super::text;

/// Parser events between deadline checks
const EVENTS_PER_CHECK: usize = 512;

pub(super) fn extract(data: &[u8], ctx: &ExtractContext) -> Result<Extracted> {
    let source = text::decode(data);
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut renderer = Renderer::new(ctx.builder());
    for (i, event) in Parser::new_ext(&source, options).enumerate() {
        if i % EVENTS_PER_CHECK == 0 {
            ctx.check()?;
        }
        renderer.event(event)?;
    }
    Ok(renderer.out.complete())
}

struct Renderer<'a> {
    out: TextBuilder<'a>,
    /// One entry per open list: next ordinal for ordered lists
    lists: Vec<Option<u64>>,
    /// Open links: destination and output offset where the link text starts
    links: Vec<(String, usize)>,
    /// Just wrote a list marker; the item's first block must not break the line
    at_item_start: bool,
    in_code_block: bool,
    /// Table cells written in the current row
    cells: usize,
}

impl<'a> Renderer<'a> {
    fn new(out: TextBuilder<'a>) -> Self {
        Self {
            out,
            lists: Vec::new(),
            links: Vec::new(),
            at_item_start: false,
            in_code_block: false,
            cells: 0,
        }
    }

    fn event(&mut self, event: Event<'_>) -> Result<()> {
        match event {
            Event::Start(tag) => self.start(tag)?,
            Event::End(tag) => self.end(tag)?,
            Event::Text(text) => {
                self.at_item_start = false;
                self.out.push_str(&text)?;
            }
            Event::Code(code) => {
                self.at_item_start = false;
                self.out.push_str(&code)?;
            }
            Event::SoftBreak => self.out.push(' ')?,
            Event::HardBreak => self.out.push('\n')?,
            Event::Rule => self.block_break()?,
            Event::TaskListMarker(checked) => {
                self.out.push_str(if checked { "[x] " } else { "[ ] " })?
            }
            _ => {}
        }
        Ok(())
    }

    fn start(&mut self, tag: Tag<'_>) -> Result<()> {
        match tag {
            Tag::Paragraph | Tag::Heading { .. } | Tag::BlockQuote { .. } => {
                if !self.at_item_start {
                    self.block_break()?;
                }
            }
            Tag::CodeBlock(_) => {
                self.block_break()?;
                self.in_code_block = true;
            }
            Tag::List(first) => {
                self.block_break()?;
                self.lists.push(first);
            }
            Tag::Item => {
                self.out.newline()?;
                let depth = self.lists.len().saturating_sub(1);
                for _ in 0..depth {
                    self.out.push_str("  ")?;
                }
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{}. ", n);
                        *n += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                self.out.push_str(&marker)?;
                self.at_item_start = true;
            }
            Tag::TableHead | Tag::TableRow => {
                self.out.newline()?;
                self.cells = 0;
            }
            Tag::TableCell => {
                if self.cells > 0 {
                    self.out.push_str(" | ")?;
                }
                self.cells += 1;
            }
            Tag::Table(_) => self.block_break()?,
            Tag::Link { dest_url, .. } => {
                self.links.push((dest_url.to_string(), self.out.as_str().len()));
            }
            _ => {}
        }
        Ok(())
    }

    fn end(&mut self, tag: TagEnd) -> Result<()> {
        match tag {
            TagEnd::Heading { .. } => self.out.blank_line()?,
            TagEnd::CodeBlock => {
                self.in_code_block = false;
                self.out.newline()?;
            }
            TagEnd::List(_) => {
                self.lists.pop();
            }
            TagEnd::Link => {
                if let Some((url, start)) = self.links.pop() {
                    let text = self.out.as_str().get(start..).unwrap_or_default().trim();
                    if !url.is_empty() && !url.starts_with('#') && text != url {
                        self.out.push_str(&format!(" ({})", url))?;
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Separate blocks by a blank line; inside lists a line break is enough
    fn block_break(&mut self) -> Result<()> {
        self.at_item_start = false;
        if self.lists.is_empty() && !self.in_code_block {
            self.out.blank_line()
        } else {
            self.out.newline()
        }
    }
}
