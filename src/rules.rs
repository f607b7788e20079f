//! Declarative schema rules.
//!
//! A schema is a tree of rules mirroring the expected shape of the
//! document: [`ValueRule`] for primitives, [`ListRule`] for homogeneous
//! sequences, [`MapRule`] for structures built through a caller-supplied
//! [`StructBuilder`]. Rules are immutable after construction and shareable
//! across threads; all per-parse state lives in the builder instances a
//! [`MapRule`] creates.
//!
//! Type agreement between a member rule's output and the builder is checked
//! when the schema is constructed: [`MapRule::member`] only accepts a rule
//! whose output the builder implements [`Consume`] for.

use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;

use crate::errors::{Error, ErrorKind};
use crate::token::{ScalarToken, Token};

pub mod leaf;

pub use leaf::{BooleanParser, DoubleParser, IntegerParser, LongParser, StringParser};

// ============================================================================
// CORE TRAITS - Rule, TokenParser and the builder protocol
// ============================================================================

/// Converts one primitive token into a typed value. Implementations decide
/// which coercions of [`ScalarToken`] to apply.
pub trait TokenParser: Send + Sync {
    type Output;

    fn parse(&self, token: &ScalarToken) -> Result<Self::Output, Error>;
}

/// One node of a schema. `name` is the member name the rule binds to inside
/// a structure; for a root rule it is documentation only.
pub trait Rule: Send + Sync {
    type Output;

    fn name(&self) -> &str;

    /// Whether the member may be absent (or explicitly null) without
    /// failing the parse.
    fn is_optional(&self) -> bool;

    /// Validate `token` and produce the typed output. Consumes the token;
    /// any children left unread are skipped by the token layer.
    fn parse(&self, token: Token<'_, '_>) -> Result<Self::Output, Error>;
}

/// Per-parse accumulator for one [`MapRule`]. A fresh builder is created
/// for every structure instance; `finish` is invoked exactly once, after
/// all members have been consumed.
pub trait StructBuilder {
    type Output;

    /// Called when a member is about to be parsed, before its value
    /// exists. The default does nothing.
    fn begin(&mut self, member: &str) -> Result<(), Error> {
        let _ = member;
        Ok(())
    }

    /// Seal the builder into the finished value.
    fn finish(self) -> Result<Self::Output, Error>;
}

/// Typed delivery of one member value into a builder. A builder implements
/// `Consume<T>` once per member value type it accepts.
pub trait Consume<T> {
    fn consume(&mut self, member: &str, value: T) -> Result<(), Error>;
}

// ============================================================================
// VALUE RULE - Primitive members
// ============================================================================

/// Rule for a primitive member, delegating the value conversion to a
/// [`TokenParser`].
pub struct ValueRule<P> {
    name: String,
    optional: bool,
    parser: P,
}

impl<P> ValueRule<P> {
    pub fn new(name: impl Into<String>, parser: P) -> Self {
        ValueRule {
            name: name.into(),
            optional: false,
            parser,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

impl<P: TokenParser> Rule for ValueRule<P> {
    type Output = P::Output;

    fn name(&self) -> &str {
        &self.name
    }

    fn is_optional(&self) -> bool {
        self.optional
    }

    fn parse(&self, token: Token<'_, '_>) -> Result<P::Output, Error> {
        match token {
            Token::Scalar(tok) => self.parser.parse(&tok),
            Token::Structured(tok) => Err(Error::at(
                ErrorKind::DocumentProcessing {
                    detail: format!(
                        "expected a primitive value for '{}', found a structure",
                        self.name
                    ),
                },
                tok.position(),
            )),
        }
    }
}

// ============================================================================
// LIST RULE - Homogeneous sequences
// ============================================================================

/// Rule for a homogeneous sequence. Every child of the structured token is
/// parsed with the same element rule; named children (XML) must match the
/// element rule's name. An empty sequence is an error unless the element
/// rule is optional.
pub struct ListRule<R> {
    name: String,
    optional: bool,
    element: R,
}

impl<R> ListRule<R> {
    pub fn new(name: impl Into<String>, element: R) -> Self {
        ListRule {
            name: name.into(),
            optional: false,
            element,
        }
    }

    /// Allow the list member itself to be absent from the enclosing
    /// structure. Whether an empty sequence is accepted is governed by
    /// the element rule's optionality, not this flag.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

impl<R: Rule> Rule for ListRule<R> {
    type Output = Vec<R::Output>;

    fn name(&self) -> &str {
        &self.name
    }

    fn is_optional(&self) -> bool {
        self.optional
    }

    fn parse(&self, token: Token<'_, '_>) -> Result<Vec<R::Output>, Error> {
        let mut tok = match token {
            Token::Structured(tok) => tok,
            Token::Scalar(tok) if tok.is_null() => {
                return Err(Error::at(
                    ErrorKind::ValueIsNull {
                        name: self.name.clone(),
                    },
                    tok.position(),
                ));
            }
            Token::Scalar(tok) => {
                return Err(Error::at(
                    ErrorKind::DocumentProcessing {
                        detail: format!(
                            "expected a list structure for '{}', found {}",
                            self.name,
                            tok.value().type_name()
                        ),
                    },
                    tok.position(),
                ));
            }
        };
        let mut items = Vec::new();
        while let Some(child) = tok.next()? {
            if let Some(child_name) = child.name() {
                if child_name != self.element.name() {
                    return Err(Error::at(
                        ErrorKind::AttributeNotExists {
                            name: child_name.to_string(),
                        },
                        child.position(),
                    ));
                }
            }
            if child.is_null() {
                let name = child.name().unwrap_or(self.element.name()).to_string();
                return Err(Error::at(ErrorKind::ValueIsNull { name }, child.position()));
            }
            items.push(self.element.parse(child)?);
        }
        if items.is_empty() && !self.element.is_optional() {
            return Err(Error::at(
                ErrorKind::ValueNotFound {
                    names: vec![self.element.name().to_string()],
                },
                tok.position(),
            ));
        }
        Ok(items)
    }
}

// ============================================================================
// MAP RULE - Named members driving a builder
// ============================================================================

/// Internal, type-erased view of a member rule bound to a builder type.
/// Erasure hides each member's output type while `MapRule::member` has
/// already proven the builder can consume it.
trait MemberRule<B>: Send + Sync {
    fn member_name(&self) -> &str;
    fn is_optional(&self) -> bool;
    fn parse_into(&self, builder: &mut B, token: Token<'_, '_>) -> Result<(), Error>;
}

struct Bound<R, B> {
    rule: R,
    _builder: PhantomData<fn(&mut B)>,
}

impl<R, B> MemberRule<B> for Bound<R, B>
where
    R: Rule,
    B: StructBuilder + Consume<R::Output>,
{
    fn member_name(&self) -> &str {
        self.rule.name()
    }

    fn is_optional(&self) -> bool {
        self.rule.is_optional()
    }

    fn parse_into(&self, builder: &mut B, token: Token<'_, '_>) -> Result<(), Error> {
        builder.begin(self.rule.name())?;
        let value = self.rule.parse(token)?;
        builder.consume(self.rule.name(), value)
    }
}

/// Rule for a structure with named members. Each document instance gets a
/// fresh builder from the factory; members may arrive in any order.
pub struct MapRule<B: StructBuilder> {
    name: String,
    optional: bool,
    members: HashMap<String, Box<dyn MemberRule<B>>>,
    member_order: Vec<String>,
    factory: Box<dyn Fn() -> B + Send + Sync>,
}

impl<B: StructBuilder + 'static> MapRule<B> {
    pub fn new(name: impl Into<String>, factory: impl Fn() -> B + Send + Sync + 'static) -> Self {
        MapRule {
            name: name.into(),
            optional: false,
            members: HashMap::new(),
            member_order: Vec::new(),
            factory: Box::new(factory),
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Register a member rule. The bound `B: Consume<R::Output>` is what
    /// makes a schema type-safe at construction time: a rule whose output
    /// the builder cannot accept does not compile.
    ///
    /// # Panics
    ///
    /// Panics if a member with the same name is already registered; two
    /// rules for one name is a schema bug, not a document condition.
    pub fn member<R>(mut self, rule: R) -> Self
    where
        R: Rule + 'static,
        B: Consume<R::Output>,
    {
        let key = rule.name().to_string();
        if self.members.contains_key(&key) {
            panic!(
                "member '{}' registered twice on map rule '{}'",
                key, self.name
            );
        }
        self.member_order.push(key.clone());
        self.members.insert(
            key,
            Box::new(Bound {
                rule,
                _builder: PhantomData,
            }),
        );
        self
    }
}

impl<B: StructBuilder> Rule for MapRule<B> {
    type Output = B::Output;

    fn name(&self) -> &str {
        &self.name
    }

    fn is_optional(&self) -> bool {
        self.optional
    }

    fn parse(&self, token: Token<'_, '_>) -> Result<B::Output, Error> {
        let mut tok = match token {
            Token::Structured(tok) => tok,
            Token::Scalar(tok) if tok.is_null() => {
                return Err(Error::at(
                    ErrorKind::ValueIsNull {
                        name: self.name.clone(),
                    },
                    tok.position(),
                ));
            }
            Token::Scalar(tok) => {
                return Err(Error::at(
                    ErrorKind::DocumentProcessing {
                        detail: format!(
                            "expected a structure for '{}', found {}",
                            self.name,
                            tok.value().type_name()
                        ),
                    },
                    tok.position(),
                ));
            }
        };
        let mut builder = (self.factory)();
        let mut seen: HashSet<&str> = HashSet::new();
        while let Some(child) = tok.next()? {
            let child_pos = child.position();
            let (key, member) = match child.name().and_then(|n| self.members.get_key_value(n)) {
                Some((key, member)) => (key.as_str(), member),
                None => {
                    let name = match child.name() {
                        Some(n) => n.to_string(),
                        None => {
                            // A JSON array where a structure was expected.
                            return Err(Error::at(
                                ErrorKind::DocumentProcessing {
                                    detail: format!(
                                        "expected named members for '{}', found an unnamed value",
                                        self.name
                                    ),
                                },
                                child_pos,
                            ));
                        }
                    };
                    return Err(Error::at(ErrorKind::AttributeNotExists { name }, child_pos));
                }
            };
            if !seen.insert(key) {
                return Err(Error::at(
                    ErrorKind::DuplicateMember {
                        name: key.to_string(),
                    },
                    child_pos,
                ));
            }
            if child.is_null() {
                if member.is_optional() {
                    continue;
                }
                return Err(Error::at(
                    ErrorKind::ValueIsNull {
                        name: key.to_string(),
                    },
                    child_pos,
                ));
            }
            member.parse_into(&mut builder, child)?;
        }
        let missing: Vec<String> = self
            .member_order
            .iter()
            .filter(|name| {
                !seen.contains(name.as_str())
                    && self
                        .members
                        .get(name.as_str())
                        .map_or(false, |m| !m.is_optional())
            })
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(Error::at(
                ErrorKind::ValueNotFound { names: missing },
                tok.position(),
            ));
        }
        builder.finish()
    }
}

// ============================================================================
// LEAF RULE SHORTHANDS
// ============================================================================

/// A compulsory string member.
pub fn string(name: impl Into<String>) -> ValueRule<StringParser> {
    ValueRule::new(name, StringParser)
}

/// A compulsory 64-bit integer member.
pub fn long(name: impl Into<String>) -> ValueRule<LongParser> {
    ValueRule::new(name, LongParser)
}

/// A compulsory 32-bit integer member.
pub fn integer(name: impl Into<String>) -> ValueRule<IntegerParser> {
    ValueRule::new(name, IntegerParser)
}

/// A compulsory double member.
pub fn double(name: impl Into<String>) -> ValueRule<DoubleParser> {
    ValueRule::new(name, DoubleParser)
}

/// A compulsory boolean member.
pub fn boolean(name: impl Into<String>) -> ValueRule<BooleanParser> {
    ValueRule::new(name, BooleanParser)
}
