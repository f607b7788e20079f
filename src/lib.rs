pub use crate::engine::parse;
pub use crate::errors::{Error, ErrorCategory, ErrorKind, SourceArc};
pub use crate::scanner::Position;
pub use crate::token::{read_root, Event, Scalar, ScalarToken, StructuredToken, Token, TokenSource};

pub mod engine;
pub mod errors;
pub mod json;
pub mod rules;
pub mod scanner;
pub mod token;
pub mod xml;
