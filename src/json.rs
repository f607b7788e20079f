//! The JSON tokenizer.
//!
//! Incremental: each [`TokenSource::next_event`] call lexes exactly one
//! child of the innermost open container, maintaining an explicit stack of
//! container frames. Two deliberate permissive extensions to strict JSON:
//! strings and member names may use single quotes as well as double quotes,
//! and `'` is accepted as an escape. Everything else, including the
//! leading-zero rule, is enforced.

use crate::errors::{Error, ErrorKind};
use crate::scanner::{Position, Scanner};
use crate::token::{Event, Scalar, ScalarToken, TokenSource};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Container {
    Object,
    Array,
}

impl Container {
    fn closer(self) -> char {
        match self {
            Container::Object => '}',
            Container::Array => ']',
        }
    }

    fn label(self) -> &'static str {
        match self {
            Container::Object => "object",
            Container::Array => "array",
        }
    }
}

#[derive(Debug)]
struct Frame {
    container: Container,
    saw_element: bool,
}

/// Streaming tokenizer over one JSON document.
pub struct JsonTokenizer<'src> {
    scanner: Scanner<'src>,
    stack: Vec<Frame>,
    root_delivered: bool,
}

impl<'src> JsonTokenizer<'src> {
    pub fn new(text: &'src str) -> Self {
        JsonTokenizer {
            scanner: Scanner::new(text),
            stack: Vec::new(),
            root_delivered: false,
        }
    }

    fn err(&self, detail: impl Into<String>) -> Error {
        self.err_at(detail, self.scanner.position())
    }

    fn err_at(&self, detail: impl Into<String>, pos: Position) -> Error {
        Error::at(
            ErrorKind::MalformedJson {
                detail: detail.into(),
            },
            pos,
        )
    }

    /// Lex one value starting at the cursor. Containers are entered, not
    /// traversed; the caller sees only the opening event.
    fn read_value(&mut self, name: Option<String>) -> Result<Event, Error> {
        let pos = self.scanner.position();
        match self.scanner.peek() {
            Some('{') => {
                self.scanner.bump();
                self.stack.push(Frame {
                    container: Container::Object,
                    saw_element: false,
                });
                Ok(Event::Open { name, pos })
            }
            Some('[') => {
                self.scanner.bump();
                self.stack.push(Frame {
                    container: Container::Array,
                    saw_element: false,
                });
                Ok(Event::Open { name, pos })
            }
            Some('"') | Some('\'') => {
                let s = self.read_string()?;
                Ok(Event::Scalar(ScalarToken::new(name, Scalar::Str(s), pos)))
            }
            Some(c) if c == '-' || c.is_ascii_digit() => {
                let value = self.read_number()?;
                Ok(Event::Scalar(ScalarToken::new(name, value, pos)))
            }
            Some('t') => {
                self.read_literal("true")?;
                Ok(Event::Scalar(ScalarToken::new(
                    name,
                    Scalar::Bool(true),
                    pos,
                )))
            }
            Some('f') => {
                self.read_literal("false")?;
                Ok(Event::Scalar(ScalarToken::new(
                    name,
                    Scalar::Bool(false),
                    pos,
                )))
            }
            Some('n') => {
                self.read_literal("null")?;
                Ok(Event::Scalar(ScalarToken::new(name, Scalar::Null, pos)))
            }
            Some(c) => Err(self.err_at(format!("unexpected character '{c}'"), pos)),
            None => Err(self.err("unexpected end of input, expected a value")),
        }
    }

    fn read_literal(&mut self, literal: &'static str) -> Result<(), Error> {
        let pos = self.scanner.position();
        if !self.scanner.eat_str(literal) {
            return Err(self.err_at(format!("invalid literal, expected '{literal}'"), pos));
        }
        // "nullx" is not null followed by garbage, it is a broken literal.
        if let Some(c) = self.scanner.peek() {
            if c.is_ascii_alphanumeric() {
                return Err(self.err_at(format!("invalid literal, expected '{literal}'"), pos));
            }
        }
        Ok(())
    }

    /// Lex a quoted string starting at the opening quote. Either quote
    /// character delimits; the other may appear unescaped inside.
    fn read_string(&mut self) -> Result<String, Error> {
        let open_pos = self.scanner.position();
        let quote = match self.scanner.bump() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Err(self.err_at("expected a quoted string", open_pos)),
        };
        let mut out = String::new();
        loop {
            let ch_pos = self.scanner.position();
            let Some(c) = self.scanner.bump() else {
                return Err(self.err_at("unterminated string literal", open_pos));
            };
            match c {
                c if c == quote => return Ok(out),
                '\\' => out.push(self.read_escape()?),
                c if (c as u32) < 0x20 => {
                    return Err(self.err_at(
                        format!("unescaped control character U+{:04X} in string", c as u32),
                        ch_pos,
                    ));
                }
                c => out.push(c),
            }
        }
    }

    fn read_escape(&mut self) -> Result<char, Error> {
        let pos = self.scanner.position();
        let Some(c) = self.scanner.bump() else {
            return Err(self.err_at("unterminated escape sequence", pos));
        };
        Ok(match c {
            '"' => '"',
            '\'' => '\'',
            '\\' => '\\',
            '/' => '/',
            'b' => '\u{0008}',
            'f' => '\u{000C}',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'u' => return self.read_unicode_escape(pos),
            other => {
                return Err(self.err_at(format!("unknown escape sequence '\\{other}'"), pos))
            }
        })
    }

    /// Decode `\uXXXX`, combining UTF-16 surrogate pairs into one character.
    /// A lone surrogate is an error.
    fn read_unicode_escape(&mut self, pos: Position) -> Result<char, Error> {
        let high = self.read_hex4(pos)?;
        if (0xDC00..=0xDFFF).contains(&high) {
            return Err(self.err_at("unpaired low surrogate in \\u escape", pos));
        }
        if !(0xD800..=0xDBFF).contains(&high) {
            return char::from_u32(high)
                .ok_or_else(|| self.err_at("invalid \\u escape", pos));
        }
        // High surrogate: the low half must follow immediately.
        if !(self.scanner.eat('\\') && self.scanner.eat('u')) {
            return Err(self.err_at(
                "high surrogate in \\u escape not followed by a low surrogate",
                pos,
            ));
        }
        let low = self.read_hex4(pos)?;
        if !(0xDC00..=0xDFFF).contains(&low) {
            return Err(self.err_at(
                "high surrogate in \\u escape not followed by a low surrogate",
                pos,
            ));
        }
        let combined = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
        char::from_u32(combined).ok_or_else(|| self.err_at("invalid \\u escape", pos))
    }

    fn read_hex4(&mut self, pos: Position) -> Result<u32, Error> {
        let mut value = 0u32;
        for _ in 0..4 {
            let Some(c) = self.scanner.bump() else {
                return Err(self.err_at("unterminated \\u escape", pos));
            };
            let digit = c
                .to_digit(16)
                .ok_or_else(|| self.err_at(format!("invalid hex digit '{c}' in \\u escape"), pos))?;
            value = value * 16 + digit;
        }
        Ok(value)
    }

    /// Lex a number and classify it: no decimal point and no exponent means
    /// `Long`, anything else means `Double`. Integer literals that overflow
    /// an i64 are rejected here rather than silently widened.
    fn read_number(&mut self) -> Result<Scalar, Error> {
        let start = self.scanner.position();
        self.scanner.eat('-');
        let leading_zero = self.scanner.peek() == Some('0');
        let int_digits = self.eat_digits();
        if int_digits == 0 {
            return Err(self.err_at("malformed number, expected digits", start));
        }
        if leading_zero && int_digits > 1 {
            return Err(self.err_at("malformed number, leading zero", start));
        }
        let mut is_double = false;
        if self.scanner.eat('.') {
            is_double = true;
            if self.eat_digits() == 0 {
                return Err(self.err_at(
                    "malformed number, expected digits after decimal point",
                    start,
                ));
            }
        }
        if matches!(self.scanner.peek(), Some('e' | 'E')) {
            self.scanner.bump();
            is_double = true;
            if matches!(self.scanner.peek(), Some('+' | '-')) {
                self.scanner.bump();
            }
            if self.eat_digits() == 0 {
                return Err(self.err_at("malformed number, expected exponent digits", start));
            }
        }
        let text = self.scanner.text_from(start.offset);
        if is_double {
            text.parse::<f64>()
                .map(Scalar::Double)
                .map_err(|e| {
                    self.err_at(format!("malformed number '{text}'"), start)
                        .with_cause(e)
                })
        } else {
            text.parse::<i64>()
                .map(Scalar::Long)
                .map_err(|e| {
                    self.err_at(
                        format!("integer literal '{text}' does not fit in 64 bits"),
                        start,
                    )
                    .with_cause(e)
                })
        }
    }

    fn eat_digits(&mut self) -> usize {
        let mut count = 0;
        while matches!(self.scanner.peek(), Some(c) if c.is_ascii_digit()) {
            self.scanner.bump();
            count += 1;
        }
        count
    }

    fn read_member_name(&mut self) -> Result<String, Error> {
        if !matches!(self.scanner.peek(), Some('"' | '\'')) {
            return Err(self.err("expected a quoted member name"));
        }
        self.read_string()
    }
}

impl<'src> TokenSource<'src> for JsonTokenizer<'src> {
    fn next_event(&mut self) -> Result<Option<Event>, Error> {
        let Some(top) = self.stack.last().map(|f| f.container) else {
            // Depth zero: deliver the root value exactly once.
            if self.root_delivered {
                return Ok(None);
            }
            if !self.scanner.skip_whitespace() {
                return Err(self.err("unexpected end of input, expected a value"));
            }
            self.root_delivered = true;
            return self.read_value(None).map(Some);
        };

        if !self.scanner.skip_whitespace() {
            return Err(self.err(format!(
                "unexpected end of input inside {}",
                top.label()
            )));
        }
        if self.scanner.eat(top.closer()) {
            self.stack.pop();
            return Ok(None);
        }
        let saw_element = self
            .stack
            .last()
            .map(|f| f.saw_element)
            .unwrap_or(false);
        if saw_element {
            if !self.scanner.eat(',') {
                return Err(self.err(format!("expected ',' or '{}'", top.closer())));
            }
            if !self.scanner.skip_whitespace() {
                return Err(self.err(format!(
                    "unexpected end of input inside {}",
                    top.label()
                )));
            }
        }
        if let Some(frame) = self.stack.last_mut() {
            frame.saw_element = true;
        }

        match top {
            Container::Array => self.read_value(None).map(Some),
            Container::Object => {
                let name = self.read_member_name()?;
                if !self.scanner.skip_whitespace() || !self.scanner.eat(':') {
                    return Err(self.err("expected ':' after member name"));
                }
                if !self.scanner.skip_whitespace() {
                    return Err(self.err("unexpected end of input inside object"));
                }
                self.read_value(Some(name)).map(Some)
            }
        }
    }

    fn depth(&self) -> usize {
        self.stack.len()
    }

    fn expect_end(&mut self) -> Result<(), Error> {
        if self.scanner.skip_whitespace() {
            return Err(Error::at(
                ErrorKind::DocumentProcessing {
                    detail: "unexpected trailing content after the document root".into(),
                },
                self.scanner.position(),
            ));
        }
        Ok(())
    }
}
