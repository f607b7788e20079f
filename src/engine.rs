//! The document engine: format dispatch and root-level orchestration.
//!
//! [`parse`] is the crate's front door. It selects a tokenizer from the
//! format tag, reads the root token, hands it to the root rule, and then
//! asserts that the document is fully consumed. Every error bubbling out is
//! given the document text as its source, so rendering a diagnostic always
//! shows the offending input.

use crate::errors::{Error, ErrorKind};
use crate::json::JsonTokenizer;
use crate::rules::Rule;
use crate::token::{read_root, TokenSource};
use crate::xml::XmlTokenizer;

/// Parse and validate one document against a root rule.
///
/// `format` is matched ASCII case-insensitively; `"json"` and `"xml"` are
/// the supported tags. The same rule value may be used concurrently from
/// any number of threads.
///
/// # Examples
///
/// ```
/// use trellis::rules::{self, Consume, MapRule, StructBuilder};
/// use trellis::{parse, Error};
///
/// #[derive(Default)]
/// struct PointBuilder {
///     x: Option<i64>,
///     y: Option<i64>,
/// }
///
/// impl StructBuilder for PointBuilder {
///     type Output = (i64, i64);
///     fn finish(self) -> Result<(i64, i64), Error> {
///         Ok((self.x.unwrap_or(0), self.y.unwrap_or(0)))
///     }
/// }
///
/// impl Consume<i64> for PointBuilder {
///     fn consume(&mut self, member: &str, value: i64) -> Result<(), Error> {
///         match member {
///             "x" => self.x = Some(value),
///             _ => self.y = Some(value),
///         }
///         Ok(())
///     }
/// }
///
/// let rule = MapRule::new("point", PointBuilder::default)
///     .member(rules::long("x"))
///     .member(rules::long("y"));
///
/// let from_json = parse("json", r#"{"x": 3, "y": 4}"#, &rule)?;
/// let from_xml = parse("xml", "<point><x>3</x><y>4</y></point>", &rule)?;
/// assert_eq!(from_json, (3, 4));
/// assert_eq!(from_json, from_xml);
/// # Ok::<(), trellis::Error>(())
/// ```
#[tracing::instrument(level = "debug", skip(text, rule), fields(bytes = text.len()))]
pub fn parse<R: Rule>(format: &str, text: &str, rule: &R) -> Result<R::Output, Error> {
    if format.eq_ignore_ascii_case("json") {
        run(JsonTokenizer::new(text), rule).map_err(|e| e.ensure_source("json", text))
    } else if format.eq_ignore_ascii_case("xml") {
        run(XmlTokenizer::new(text), rule).map_err(|e| e.ensure_source("xml", text))
    } else {
        Err(Error::new(ErrorKind::UnknownMimeType {
            format: format.to_string(),
        })
        .with_help("supported formats are 'json' and 'xml'"))
    }
}

/// Drive one tokenizer through a root rule. The root must be present and
/// non-null, and nothing but whitespace may follow it.
fn run<'src, S, R>(mut source: S, rule: &R) -> Result<R::Output, Error>
where
    S: TokenSource<'src>,
    R: Rule,
{
    let output = match read_root(&mut source)? {
        None => {
            return Err(Error::new(ErrorKind::ValueNotFound {
                names: vec![rule.name().to_string()],
            }));
        }
        Some(token) if token.is_null() => {
            return Err(Error::at(
                ErrorKind::ValueNotFound {
                    names: vec![rule.name().to_string()],
                },
                token.position(),
            ));
        }
        Some(token) => rule.parse(token)?,
    };
    source.expect_end()?;
    tracing::trace!(rule = rule.name(), "document accepted");
    Ok(output)
}
