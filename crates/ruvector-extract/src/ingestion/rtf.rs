//! Rich Text Format via a byte-level state machine

use super::context::{ExtractContext, Extracted, Result};
use super::text;
use crate::error::ExtractFailure;

/// Bytes scanned between deadline checks
const BYTES_PER_CHECK: usize = 64 * 1024;

/// Destinations whose content is never shown
const SKIPPED_DESTINATIONS: &[&str] = &[
    "fonttbl",
    "colortbl",
    "stylesheet",
    "info",
    "pict",
    "object",
    "header",
    "headerl",
    "headerr",
    "headerf",
    "footer",
    "footerl",
    "footerr",
    "footerf",
    "listtable",
    "listoverridetable",
    "revtbl",
    "rsidtbl",
    "generator",
    "themedata",
    "colorschememapping",
    "datastore",
    "latentstyles",
    "filetbl",
    "fldinst",
    "xmlnstbl",
    "mmathPr",
    "pgdsctbl",
];

/// Windows-1252 mappings for 0x80..=0x9F; the rest of the high half is Latin-1
const CP1252_HIGH: [char; 32] = [
    '€', '\u{81}', '‚', 'ƒ', '„', '…', '†', '‡', 'ˆ', '‰', 'Š', '‹', 'Œ', '\u{8D}', 'Ž', '\u{8F}',
    '\u{90}', '‘', '’', '“', '”', '•', '–', '—', '˜', '™', 'š', '›', 'œ', '\u{9D}', 'ž', 'Ÿ',
];

pub(super) fn extract(data: &[u8], ctx: &ExtractContext) -> Result<Extracted> {
    let body = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);
    let start = body
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(body.len());
    if !body[start..].starts_with(b"{\\rtf") {
        return Err(ExtractFailure::corrupted("RTF", "missing {\\rtf header"));
    }

    let raw = Parser::new(&body[start..], ctx).run()?;
    let mut out = ctx.builder();
    out.push_str(&text::tidy_lines(&raw))?;
    Ok(out.complete())
}

#[derive(Debug, Clone, Copy)]
struct GroupState {
    skip: bool,
    /// Fallback characters following each `\u`
    uc: usize,
}

struct Parser<'a> {
    data: &'a [u8],
    pos: usize,
    ctx: &'a ExtractContext,
    state: GroupState,
    stack: Vec<GroupState>,
    /// Fallback units still to drop after a `\u`
    pending_skip: usize,
    high_surrogate: Option<u16>,
    out: String,
}

impl<'a> Parser<'a> {
    fn new(data: &'a [u8], ctx: &'a ExtractContext) -> Self {
        Self {
            data,
            pos: 0,
            ctx,
            state: GroupState { skip: false, uc: 1 },
            stack: Vec::new(),
            pending_skip: 0,
            high_surrogate: None,
            out: String::with_capacity(data.len() / 2),
        }
    }

    fn run(mut self) -> Result<String> {
        let mut next_check = BYTES_PER_CHECK;
        while self.pos < self.data.len() {
            if self.pos >= next_check {
                self.ctx.check()?;
                next_check = self.pos + BYTES_PER_CHECK;
            }

            let byte = self.data[self.pos];
            self.pos += 1;
            match byte {
                b'{' => {
                    self.stack.push(self.state);
                    self.pending_skip = 0;
                }
                b'}' => {
                    // Unbalanced closers are tolerated
                    if let Some(state) = self.stack.pop() {
                        self.state = state;
                    }
                    self.pending_skip = 0;
                }
                b'\\' => self.control()?,
                b'\r' | b'\n' => {}
                _ => {
                    if self.consume_fallback() {
                        continue;
                    }
                    self.emit_byte(byte);
                }
            }
        }
        Ok(self.out)
    }

    /// Dispatch the control word or symbol after a backslash
    fn control(&mut self) -> Result<()> {
        let Some(&next) = self.data.get(self.pos) else {
            return Ok(());
        };

        if !next.is_ascii_alphabetic() {
            self.pos += 1;
            return self.symbol(next);
        }

        let word_start = self.pos;
        while self.pos < self.data.len() && self.data[self.pos].is_ascii_alphabetic() {
            self.pos += 1;
        }
        let word = String::from_utf8_lossy(&self.data[word_start..self.pos]).into_owned();

        let param = self.parameter();
        if self.data.get(self.pos) == Some(&b' ') {
            self.pos += 1;
        }

        self.word(&word, param);
        Ok(())
    }

    /// Optional signed decimal parameter of a control word
    fn parameter(&mut self) -> Option<i32> {
        let start = self.pos;
        if self.data.get(self.pos) == Some(&b'-') {
            self.pos += 1;
        }
        let digits = self.pos;
        while self.pos < self.data.len() && self.data[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        if self.pos == digits {
            self.pos = start;
            return None;
        }
        std::str::from_utf8(&self.data[start..self.pos])
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .map(|n| n.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
    }

    fn symbol(&mut self, symbol: u8) -> Result<()> {
        match symbol {
            b'\'' => {
                let hex = self.data.get(self.pos..self.pos + 2);
                let value = hex
                    .and_then(|h| std::str::from_utf8(h).ok())
                    .and_then(|h| u8::from_str_radix(h, 16).ok());
                if let Some(value) = value {
                    self.pos += 2;
                    if !self.consume_fallback() {
                        self.emit_byte(value);
                    }
                }
            }
            b'*' => self.state.skip = true,
            b'\\' | b'{' | b'}' => {
                if !self.consume_fallback() {
                    self.emit(symbol as char);
                }
            }
            b'~' => self.emit('\u{A0}'),
            b'_' => self.emit('-'),
            b'\r' | b'\n' => self.emit('\n'),
            // Optional hyphen, formula marker and the like
            _ => {}
        }
        Ok(())
    }

    fn word(&mut self, word: &str, param: Option<i32>) {
        if SKIPPED_DESTINATIONS.contains(&word) {
            self.state.skip = true;
            return;
        }

        match word {
            "uc" => self.state.uc = param.unwrap_or(1).max(0) as usize,
            "u" => {
                if let Some(n) = param {
                    self.unicode(n);
                    self.pending_skip = self.state.uc;
                }
            }
            "bin" => {
                let len = param.unwrap_or(0).max(0) as usize;
                self.pos = (self.pos + len).min(self.data.len());
            }
            _ if self.consume_fallback() => {}
            "par" | "line" | "sect" | "page" | "row" => self.emit('\n'),
            "tab" | "cell" => self.emit('\t'),
            "emdash" => self.emit('—'),
            "endash" => self.emit('–'),
            "bullet" => self.emit('•'),
            "lquote" => self.emit('‘'),
            "rquote" => self.emit('’'),
            "ldblquote" => self.emit('“'),
            "rdblquote" => self.emit('”'),
            "emspace" | "enspace" | "qmspace" => self.emit(' '),
            _ => {}
        }
    }

    /// `\uN` with negative values wrapping to 16 bits and surrogate pairing
    fn unicode(&mut self, n: i32) {
        let unit = if n < 0 { (n + 65536) as u16 } else { n as u16 };
        match unit {
            0xD800..=0xDBFF => self.high_surrogate = Some(unit),
            0xDC00..=0xDFFF => {
                if let Some(high) = self.high_surrogate.take() {
                    let decoded = char::decode_utf16([high, unit]).next();
                    if let Some(Ok(c)) = decoded {
                        self.emit(c);
                    }
                }
            }
            _ => {
                self.high_surrogate = None;
                if let Some(c) = char::from_u32(unit as u32) {
                    self.emit(c);
                }
            }
        }
    }

    /// Drop one fallback unit after `\u` if any remain
    fn consume_fallback(&mut self) -> bool {
        if self.pending_skip > 0 {
            self.pending_skip -= 1;
            true
        } else {
            false
        }
    }

    fn emit_byte(&mut self, byte: u8) {
        let c = match byte {
            0x00..=0x7F => byte as char,
            0x80..=0x9F => CP1252_HIGH[(byte - 0x80) as usize],
            _ => byte as char,
        };
        self.emit(c);
    }

    fn emit(&mut self, c: char) {
        if !self.state.skip {
            self.out.push(c);
        }
    }
}
