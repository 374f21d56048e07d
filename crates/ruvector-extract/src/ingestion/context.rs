//! Per-extraction context: deadline, cancellation and the output builder

#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};
#[cfg(test)]
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::ExtractFailure;

/// Result type for extractors
pub type Result<T> = std::result::Result<T, ExtractFailure>;

/// Appends between cancellation checks in [`TextBuilder`]
const CHECK_EVERY_APPENDS: usize = 256;

/// Outcome of a single extractor run
#[derive(Debug)]
pub enum Extracted {
    /// Whole document
    Complete(String),
    /// Extraction stopped early; `text` is everything read before `cause`
    Partial { text: String, cause: ExtractFailure },
}

impl Extracted {
    pub fn text(&self) -> &str {
        match self {
            Self::Complete(text) | Self::Partial { text, .. } => text,
        }
    }
}

/// Limits shared by every check point of one extraction
#[derive(Debug, Clone)]
pub struct ExtractContext {
    deadline: Instant,
    cancel: CancellationToken,
    max_output_chars: usize,
    /// Check points left before the token is cancelled
    #[cfg(test)]
    checks_left: Option<Arc<AtomicUsize>>,
}

impl ExtractContext {
    /// Create a context for one unit of work
    pub fn new(deadline: Instant, cancel: CancellationToken, max_output_chars: usize) -> Self {
        Self {
            deadline,
            cancel,
            max_output_chars,
            #[cfg(test)]
            checks_left: None,
        }
    }

    /// Context with no practical deadline or output cap
    pub fn unbounded() -> Self {
        Self::new(
            Instant::now() + Duration::from_secs(365 * 24 * 60 * 60),
            CancellationToken::new(),
            usize::MAX,
        )
    }

    /// Unbounded context whose token is cancelled at check point `checks + 1`
    #[cfg(test)]
    pub(crate) fn stopping_after(checks: usize) -> Self {
        let mut ctx = Self::unbounded();
        ctx.checks_left = Some(Arc::new(AtomicUsize::new(checks)));
        ctx
    }

    /// Fail if the unit was cancelled or its deadline passed
    pub fn check(&self) -> Result<()> {
        #[cfg(test)]
        if let Some(left) = &self.checks_left {
            if left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_err()
            {
                self.cancel.cancel();
            }
        }
        if self.cancel.is_cancelled() {
            return Err(ExtractFailure::Cancelled);
        }
        if Instant::now() >= self.deadline {
            return Err(ExtractFailure::DeadlineExceeded);
        }
        Ok(())
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn max_output_chars(&self) -> usize {
        self.max_output_chars
    }

    /// Start an output buffer bound to this context
    pub fn builder(&self) -> TextBuilder<'_> {
        TextBuilder::new(self)
    }
}

/// Streaming text accumulator.
///
/// Enforces the output budget on every append and checks the deadline
/// every few hundred appends, so single-unit formats stop promptly too.
#[derive(Debug)]
pub struct TextBuilder<'a> {
    ctx: &'a ExtractContext,
    buf: String,
    chars: usize,
    appends: usize,
}

impl<'a> TextBuilder<'a> {
    pub fn new(ctx: &'a ExtractContext) -> Self {
        Self {
            ctx,
            buf: String::new(),
            chars: 0,
            appends: 0,
        }
    }

    /// Append a string slice
    pub fn push_str(&mut self, s: &str) -> Result<()> {
        self.chars += s.chars().count();
        if self.chars > self.ctx.max_output_chars {
            return Err(ExtractFailure::OutputLimit {
                limit: self.ctx.max_output_chars,
            });
        }
        self.buf.push_str(s);

        self.appends += 1;
        if self.appends % CHECK_EVERY_APPENDS == 0 {
            self.ctx.check()?;
        }
        Ok(())
    }

    pub fn push(&mut self, c: char) -> Result<()> {
        let mut tmp = [0u8; 4];
        self.push_str(c.encode_utf8(&mut tmp))
    }

    /// Start a new line unless at the beginning of one
    pub fn newline(&mut self) -> Result<()> {
        if !self.buf.is_empty() && !self.buf.ends_with('\n') {
            self.push('\n')?;
        }
        Ok(())
    }

    /// Ensure the buffer ends with exactly one blank line (unless empty)
    pub fn blank_line(&mut self) -> Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        while !self.buf.ends_with("\n\n") {
            self.push('\n')?;
        }
        Ok(())
    }

    /// Append a block, separated from previous content by a blank line
    pub fn push_block(&mut self, block: &str) -> Result<()> {
        if block.is_empty() {
            return Ok(());
        }
        if !self.buf.is_empty() {
            self.blank_line()?;
        }
        self.push_str(block)
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    /// Take the text with trailing whitespace removed
    pub fn finish(mut self) -> String {
        let trimmed = self.buf.trim_end().len();
        self.buf.truncate(trimmed);
        self.buf
    }

    /// Finish as a complete extraction
    pub fn complete(self) -> Extracted {
        Extracted::Complete(self.finish())
    }

    /// Finish early: partial output when something was read, else the failure
    pub fn interrupted(self, cause: ExtractFailure) -> Result<Extracted> {
        if self.buf.trim().is_empty() {
            Err(cause)
        } else {
            Ok(Extracted::Partial {
                text: self.finish(),
                cause,
            })
        }
    }
}
