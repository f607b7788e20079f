//! Unified diagnostics for the whole pipeline.
//!
//! Every failure in tokenizing, rule evaluation, or coercion is a single
//! [`Error`] value: a typed [`ErrorKind`] naming what went wrong, an optional
//! [`Position`] in the raw document, and optional source text for rendering.
//! Each kind maps to a stable wire code via [`ErrorKind::code`], so callers
//! can match on failures without parsing messages.

use std::fmt;
use std::sync::Arc;

use miette::{Diagnostic, LabeledSpan, NamedSource, Severity, SourceCode};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

use crate::scanner::Position;

/// Shared handle to the document text an error points into.
pub type SourceArc = Arc<NamedSource<String>>;

// ============================================================================
// ERROR KINDS - Taxonomy and wire codes
// ============================================================================

/// The closed taxonomy of failures. Every variant carries the data its
/// message needs; no kind is ever reported as a bare string.
#[derive(Debug, Clone, PartialEq, ThisError, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Structural JSON syntax violation.
    #[error("malformed JSON: {detail}")]
    MalformedJson { detail: String },

    /// Structural XML syntax violation, including mismatched closing tags
    /// and mixed text-and-element content.
    #[error("malformed XML: {detail}")]
    MalformedXml { detail: String },

    /// A member name in the document that the schema does not declare.
    #[error("attribute '{name}' does not exist in the target structure")]
    AttributeNotExists { name: String },

    /// A schema member that appeared more than once in one structure.
    #[error("duplicate member '{name}'")]
    DuplicateMember { name: String },

    /// An explicit null (or self-closed XML element) where a value is
    /// required.
    #[error("null value for '{name}'")]
    ValueIsNull { name: String },

    /// One or more compulsory members missing from a structure, or a missing
    /// document root.
    #[error("{}", missing_values_message(.names))]
    ValueNotFound { names: Vec<String> },

    /// A value that could not be coerced to an integer.
    #[error("illegal integer value '{value}'")]
    IllegalInteger { value: String },

    /// An integer that parsed but does not fit the declared 32-bit range.
    #[error("integer value {value} is outside the 32-bit signed range")]
    IntegerOutOfRange { value: i64 },

    /// A value that could not be coerced to a double.
    #[error("illegal double value '{value}'")]
    IllegalDouble { value: String },

    /// A value that could not be coerced to a boolean.
    #[error("illegal boolean value '{value}'")]
    IllegalBoolean { value: String },

    /// An engine invariant violation. Seeing this kind is a bug in the
    /// engine, not in the document.
    #[error("internal processing error: {detail}")]
    InternalProcessing { detail: String },

    /// A format tag the engine does not recognize.
    #[error("unknown mime type '{format}'")]
    UnknownMimeType { format: String },

    /// Document-level failure outside any single token, such as trailing
    /// content after the root value.
    #[error("document processing error: {detail}")]
    DocumentProcessing { detail: String },
}

fn missing_values_message(names: &[String]) -> String {
    match names {
        [single] => format!("value not found for member '{single}'"),
        many => {
            let list = many
                .iter()
                .map(|n| format!("'{n}'"))
                .collect::<Vec<_>>()
                .join(", ");
            format!("values not found for members {list}")
        }
    }
}

/// Coarse grouping of [`ErrorKind`]s, useful for metrics and triage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// The document text violates the format grammar.
    Syntax,
    /// The document is well formed but does not satisfy the schema.
    Schema,
    /// A primitive value refused a requested type conversion.
    Coercion,
    /// Document-level dispatch and framing failures.
    Document,
    /// Engine bugs.
    Internal,
}

impl ErrorKind {
    /// Stable machine-readable code for this kind. Part of the wire
    /// contract; renaming a variant must not change its code.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::MalformedJson { .. } => "malformed-json",
            ErrorKind::MalformedXml { .. } => "malformed-xml",
            ErrorKind::AttributeNotExists { .. } => "attribute-name-not-exists",
            ErrorKind::DuplicateMember { .. } => "duplicate-member",
            ErrorKind::ValueIsNull { .. } => "value-is-null",
            ErrorKind::ValueNotFound { .. } => "value-not-found",
            ErrorKind::IllegalInteger { .. } => "illegal-integer",
            ErrorKind::IntegerOutOfRange { .. } => "integer-out-of-range",
            ErrorKind::IllegalDouble { .. } => "illegal-double",
            ErrorKind::IllegalBoolean { .. } => "illegal-boolean",
            ErrorKind::InternalProcessing { .. } => "internal-processing-error",
            ErrorKind::UnknownMimeType { .. } => "unknown-mime-type",
            ErrorKind::DocumentProcessing { .. } => "document-processing-error",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorKind::MalformedJson { .. } | ErrorKind::MalformedXml { .. } => {
                ErrorCategory::Syntax
            }
            ErrorKind::AttributeNotExists { .. }
            | ErrorKind::DuplicateMember { .. }
            | ErrorKind::ValueIsNull { .. }
            | ErrorKind::ValueNotFound { .. } => ErrorCategory::Schema,
            ErrorKind::IllegalInteger { .. }
            | ErrorKind::IntegerOutOfRange { .. }
            | ErrorKind::IllegalDouble { .. }
            | ErrorKind::IllegalBoolean { .. } => ErrorCategory::Coercion,
            ErrorKind::UnknownMimeType { .. } | ErrorKind::DocumentProcessing { .. } => {
                ErrorCategory::Document
            }
            ErrorKind::InternalProcessing { .. } => ErrorCategory::Internal,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ErrorKind::MalformedJson { .. } | ErrorKind::MalformedXml { .. } => {
                "invalid syntax here"
            }
            ErrorKind::AttributeNotExists { .. } => "not declared in the schema",
            ErrorKind::DuplicateMember { .. } => "duplicated here",
            ErrorKind::ValueIsNull { .. } => "null value here",
            ErrorKind::ValueNotFound { .. } => "structure is missing members",
            ErrorKind::IllegalInteger { .. } => "not an integer",
            ErrorKind::IntegerOutOfRange { .. } => "outside the 32-bit range",
            ErrorKind::IllegalDouble { .. } => "not a double",
            ErrorKind::IllegalBoolean { .. } => "not a boolean",
            ErrorKind::InternalProcessing { .. } => "engine invariant violated",
            ErrorKind::UnknownMimeType { .. } => "unsupported format",
            ErrorKind::DocumentProcessing { .. } => "unexpected content here",
        }
    }
}

// ============================================================================
// ERROR VALUE - Position, source attachment and diagnostic rendering
// ============================================================================

/// A single pipeline failure, carrying everything a caller or a terminal
/// renderer needs.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    position: Option<Position>,
    source_code: Option<SourceArc>,
    help: Option<String>,
    cause: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl Error {
    /// An error with no document position, for failures outside any token.
    pub fn new(kind: ErrorKind) -> Self {
        Error {
            kind,
            position: None,
            source_code: None,
            help: None,
            cause: None,
        }
    }

    /// An error pointing at a position in the raw document.
    pub fn at(kind: ErrorKind, position: Position) -> Self {
        Error {
            position: Some(position),
            ..Error::new(kind)
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn with_source(mut self, source: SourceArc) -> Self {
        self.source_code = Some(source);
        self
    }

    pub fn with_cause(
        mut self,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Attach `text` as the error's source document unless one is already
    /// present. The engine calls this once per bubbled error so that every
    /// diagnostic renders against the original input.
    pub(crate) fn ensure_source(mut self, name: &str, text: &str) -> Self {
        if self.source_code.is_none() {
            self.source_code = Some(Arc::new(NamedSource::new(name, text.to_string())));
        }
        self
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn position(&self) -> Option<Position> {
        self.position
    }

    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(pos) = self.position {
            write!(f, " at {pos}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|c| &**c as &(dyn std::error::Error + 'static))
    }
}

impl Diagnostic for Error {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.kind.code()))
    }

    fn severity(&self) -> Option<Severity> {
        Some(Severity::Error)
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.help
            .as_ref()
            .map(|h| Box::new(h.clone()) as Box<dyn fmt::Display>)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        self.source_code
            .as_ref()
            .map(|s| s.as_ref() as &dyn SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let pos = self.position?;
        let label = LabeledSpan::new(Some(self.kind.label().to_string()), pos.offset, 1);
        Some(Box::new(std::iter::once(label)))
    }
}
