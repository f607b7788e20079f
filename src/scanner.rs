//! Character-stream bookkeeping shared by the JSON and XML tokenizers.
//!
//! The scanner owns the raw source text and the cursor over it. All position
//! tracking lives here so that diagnostics always point at the source text,
//! never at a decoded-string offset.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A location in the raw source text. `line` and `column` are 1-based;
/// `offset` is the byte offset, suitable for span construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
    pub offset: usize,
}

impl Position {
    /// The position of the first character of a document.
    pub fn start() -> Self {
        Position {
            line: 1,
            column: 1,
            offset: 0,
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::start()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Cursor over a borrowed source string.
#[derive(Debug)]
pub(crate) struct Scanner<'src> {
    src: &'src str,
    offset: usize,
    line: u32,
    column: u32,
}

impl<'src> Scanner<'src> {
    pub(crate) fn new(src: &'src str) -> Self {
        Scanner {
            src,
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    pub(crate) fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
            offset: self.offset,
        }
    }

    /// The unconsumed tail of the source.
    pub(crate) fn remainder(&self) -> &'src str {
        &self.src[self.offset..]
    }

    /// The source text between `start` and the current offset.
    pub(crate) fn text_from(&self, start: usize) -> &'src str {
        &self.src[start..self.offset]
    }

    pub(crate) fn peek(&self) -> Option<char> {
        self.remainder().chars().next()
    }

    pub(crate) fn peek_second(&self) -> Option<char> {
        let mut chars = self.remainder().chars();
        chars.next();
        chars.next()
    }

    pub(crate) fn starts_with(&self, prefix: &str) -> bool {
        self.remainder().starts_with(prefix)
    }

    /// Advance one character, keeping line and column in step.
    pub(crate) fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.offset += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    /// Consume `c` if it is next.
    pub(crate) fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.bump();
            return true;
        }
        false
    }

    /// Consume `prefix` if the remaining input starts with it.
    pub(crate) fn eat_str(&mut self, prefix: &str) -> bool {
        if !self.starts_with(prefix) {
            return false;
        }
        for _ in prefix.chars() {
            self.bump();
        }
        true
    }

    /// Step back over the most recently consumed character. Stepping back
    /// over a newline recomputes the column from the previous line.
    pub(crate) fn retreat(&mut self) {
        let Some(c) = self.src[..self.offset].chars().next_back() else {
            return;
        };
        self.offset -= c.len_utf8();
        if c == '\n' {
            self.line -= 1;
            let line_start = self.src[..self.offset]
                .rfind('\n')
                .map(|i| i + 1)
                .unwrap_or(0);
            self.column = self.src[line_start..self.offset].chars().count() as u32 + 1;
        } else {
            self.column -= 1;
        }
    }

    /// Skip whitespace. Returns false when the scanner is at end of input
    /// afterwards.
    pub(crate) fn skip_whitespace(&mut self) -> bool {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                return true;
            }
            self.bump();
        }
        false
    }
}
