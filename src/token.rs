//! The uniform lazy token tree produced by both tokenizers.
//!
//! A document is never materialized as a whole. The root is a single
//! [`Token`]; structured tokens hand out their children one at a time,
//! lexing on demand. Dropping a partially consumed child is legal: the
//! parent resynchronizes by draining the underlying stream back to its own
//! nesting depth before producing the next sibling, so every byte of input
//! is visited at most once no matter how much of the tree a rule inspects.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{Error, ErrorKind};
use crate::scanner::Position;

// ============================================================================
// SCALARS - Primitive values and coercion
// ============================================================================

/// A primitive value lexed from the document.
///
/// `Long` and `Double` are distinct by construction. The tokenizers classify
/// a JSON number as `Long` exactly when it has neither a decimal point nor
/// an exponent; XML leaf text always arrives as `Str` and is narrowed later
/// by the coercion methods on [`ScalarToken`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Null,
    Bool(bool),
    Long(i64),
    Double(f64),
    Str(String),
}

impl Scalar {
    /// Short human-readable name of this variant, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::Null => "null",
            Scalar::Bool(_) => "boolean",
            Scalar::Long(_) => "integer",
            Scalar::Double(_) => "double",
            Scalar::Str(_) => "string",
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "null"),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Long(n) => write!(f, "{n}"),
            Scalar::Double(n) => write!(f, "{n}"),
            Scalar::Str(s) => write!(f, "{s}"),
        }
    }
}

/// A primitive token: an optional member name, a [`Scalar`] value, and the
/// position where the value started in the raw document.
///
/// Tokens are immutable once produced. The `*_value` methods implement the
/// engine's coercion matrix; every one of them fails on `Null` with
/// [`ErrorKind::ValueIsNull`] so that optionality stays a rule-level
/// decision.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarToken {
    name: Option<String>,
    value: Scalar,
    pos: Position,
}

impl ScalarToken {
    pub fn new(name: Option<String>, value: Scalar, pos: Position) -> Self {
        ScalarToken { name, value, pos }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn value(&self) -> &Scalar {
        &self.value
    }

    pub fn position(&self) -> Position {
        self.pos
    }

    pub fn is_null(&self) -> bool {
        matches!(self.value, Scalar::Null)
    }

    /// Coerce to a string. Everything except `Null` renders.
    pub fn string_value(&self) -> Result<String, Error> {
        match &self.value {
            Scalar::Null => Err(self.null_error()),
            Scalar::Str(s) => Ok(s.clone()),
            other => Ok(other.to_string()),
        }
    }

    /// Coerce to a 64-bit integer. Strings are parsed; doubles never
    /// narrow, even when their fractional part is zero.
    pub fn long_value(&self) -> Result<i64, Error> {
        match &self.value {
            Scalar::Null => Err(self.null_error()),
            Scalar::Long(n) => Ok(*n),
            Scalar::Str(s) => s.parse::<i64>().map_err(|e| {
                Error::at(ErrorKind::IllegalInteger { value: s.clone() }, self.pos).with_cause(e)
            }),
            other => Err(Error::at(
                ErrorKind::IllegalInteger {
                    value: other.to_string(),
                },
                self.pos,
            )),
        }
    }

    /// Coerce to a double. Longs widen; strings are parsed.
    pub fn double_value(&self) -> Result<f64, Error> {
        match &self.value {
            Scalar::Null => Err(self.null_error()),
            Scalar::Double(n) => Ok(*n),
            Scalar::Long(n) => Ok(*n as f64),
            Scalar::Str(s) => s.parse::<f64>().map_err(|e| {
                Error::at(ErrorKind::IllegalDouble { value: s.clone() }, self.pos).with_cause(e)
            }),
            other => Err(Error::at(
                ErrorKind::IllegalDouble {
                    value: other.to_string(),
                },
                self.pos,
            )),
        }
    }

    /// Coerce to a boolean. Strings match `true`/`false` ASCII
    /// case-insensitively; numbers never convert.
    pub fn boolean_value(&self) -> Result<bool, Error> {
        match &self.value {
            Scalar::Null => Err(self.null_error()),
            Scalar::Bool(b) => Ok(*b),
            Scalar::Str(s) if s.eq_ignore_ascii_case("true") => Ok(true),
            Scalar::Str(s) if s.eq_ignore_ascii_case("false") => Ok(false),
            other => Err(Error::at(
                ErrorKind::IllegalBoolean {
                    value: other.to_string(),
                },
                self.pos,
            )),
        }
    }

    fn null_error(&self) -> Error {
        let name = self
            .name
            .clone()
            .unwrap_or_else(|| "<unnamed>".to_string());
        Error::at(ErrorKind::ValueIsNull { name }, self.pos)
    }
}

// ============================================================================
// TOKEN SOURCES - The flat event protocol
// ============================================================================

/// One stream-level step produced by a [`TokenSource`].
#[derive(Debug)]
pub enum Event {
    /// A complete primitive child.
    Scalar(ScalarToken),
    /// A structured child just opened; subsequent events belong to it until
    /// the matching `Ok(None)`.
    Open { name: Option<String>, pos: Position },
}

/// The pull interface both format tokenizers implement.
///
/// A source is a cursor over one document. `next_event` lexes the next
/// child of the innermost open container; `Ok(None)` means that container
/// just closed (or, at depth zero, that the root value has been fully
/// delivered). The token layer above converts this flat stream into the
/// nested [`Token`] API.
pub trait TokenSource<'src> {
    /// Lex one event. Errors are positional and fatal; a source must not be
    /// advanced after it has returned an error.
    fn next_event(&mut self) -> Result<Option<Event>, Error>;

    /// Number of currently open containers.
    fn depth(&self) -> usize;

    /// Assert that nothing but trailing whitespace remains after the root
    /// value has been consumed.
    fn expect_end(&mut self) -> Result<(), Error>;

    /// Consume and discard events until at most `depth` containers remain
    /// open. Used by parent tokens to skip abandoned children.
    fn drain_to(&mut self, depth: usize) -> Result<(), Error> {
        while self.depth() > depth {
            self.next_event()?;
        }
        Ok(())
    }
}

/// Read the root value of a document as a [`Token`].
pub fn read_root<'src, 'ts>(
    source: &'ts mut (dyn TokenSource<'src> + 'ts),
) -> Result<Option<Token<'src, 'ts>>, Error> {
    match source.next_event()? {
        None => Ok(None),
        Some(Event::Scalar(tok)) => Ok(Some(Token::Scalar(tok))),
        Some(Event::Open { name, pos }) => Ok(Some(Token::Structured(
            StructuredToken::new(name, pos, source),
        ))),
    }
}

// ============================================================================
// TOKEN TREE - Lazy structured tokens
// ============================================================================

/// A node of the lazy token tree: either a complete primitive or a handle
/// to a structure whose children have not been lexed yet.
#[derive(Debug)]
pub enum Token<'src, 'ts> {
    Scalar(ScalarToken),
    Structured(StructuredToken<'src, 'ts>),
}

impl<'src, 'ts> Token<'src, 'ts> {
    pub fn name(&self) -> Option<&str> {
        match self {
            Token::Scalar(t) => t.name(),
            Token::Structured(t) => t.name(),
        }
    }

    pub fn position(&self) -> Position {
        match self {
            Token::Scalar(t) => t.position(),
            Token::Structured(t) => t.position(),
        }
    }

    /// True only for a primitive null. A structure is never null, even when
    /// it has no children.
    pub fn is_null(&self) -> bool {
        match self {
            Token::Scalar(t) => t.is_null(),
            Token::Structured(_) => false,
        }
    }

    /// Short human-readable description, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Token::Scalar(t) => t.value().type_name(),
            Token::Structured(_) => "structure",
        }
    }
}

/// A structured token (JSON object or array, XML element with element
/// children). Children are lexed one at a time from the shared source.
///
/// While a child obtained from [`next`](StructuredToken::next) is alive the
/// parent is inaccessible; the borrow checker enforces the engine's
/// single-cursor discipline statically. A child may be dropped at any point
/// of its consumption.
pub struct StructuredToken<'src, 'ts> {
    name: Option<String>,
    pos: Position,
    depth: usize,
    source: &'ts mut (dyn TokenSource<'src> + 'ts),
    pending: Option<Event>,
    exhausted: bool,
}

impl<'src, 'ts> StructuredToken<'src, 'ts> {
    /// Wrap a container the source has just opened. The source's depth at
    /// this moment is the depth of the new container itself.
    pub(crate) fn new(
        name: Option<String>,
        pos: Position,
        source: &'ts mut (dyn TokenSource<'src> + 'ts),
    ) -> Self {
        let depth = source.depth();
        StructuredToken {
            name,
            pos,
            depth,
            source,
            pending: None,
            exhausted: false,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn position(&self) -> Position {
        self.pos
    }

    /// Whether another child is available, without consuming it.
    pub fn has_next(&mut self) -> Result<bool, Error> {
        if self.exhausted {
            return Ok(false);
        }
        self.resync()?;
        if self.pending.is_none() {
            match self.source.next_event()? {
                Some(event) => self.pending = Some(event),
                None => self.exhausted = true,
            }
        }
        Ok(!self.exhausted)
    }

    /// The next child, or `None` once the container's close has been
    /// reached. The returned token borrows `self` until dropped.
    pub fn next(&mut self) -> Result<Option<Token<'src, '_>>, Error> {
        if self.exhausted {
            return Ok(None);
        }
        self.resync()?;
        let event = match self.pending.take() {
            Some(event) => event,
            None => match self.source.next_event()? {
                Some(event) => event,
                None => {
                    self.exhausted = true;
                    return Ok(None);
                }
            },
        };
        Ok(Some(match event {
            Event::Scalar(tok) => Token::Scalar(tok),
            Event::Open { name, pos } => {
                Token::Structured(StructuredToken::new(name, pos, &mut *self.source))
            }
        }))
    }

    /// Drop whatever remains of a previously returned child so the cursor
    /// sits at this container's level again.
    fn resync(&mut self) -> Result<(), Error> {
        if self.pending.is_none() && self.source.depth() > self.depth {
            self.source.drain_to(self.depth)?;
        }
        Ok(())
    }
}

impl fmt::Debug for StructuredToken<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructuredToken")
            .field("name", &self.name)
            .field("pos", &self.pos)
            .field("depth", &self.depth)
            .field("exhausted", &self.exhausted)
            .finish()
    }
}
