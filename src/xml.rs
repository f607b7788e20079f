//! The XML tokenizer.
//!
//! Produces the same event stream as the JSON tokenizer from a deliberately
//! permissive reading of XML: attributes, processing instructions, comments
//! and doctype-like declarations are skipped without interpretation, and an
//! element becomes either a structured token (element children), a string
//! scalar (text content), or a null scalar (self-closing or empty). Mixing
//! text and element children inside one element is a hard error. The root
//! element's token is unnamed; its tag matters only for well-formedness.

use crate::errors::{Error, ErrorKind};
use crate::scanner::{Position, Scanner};
use crate::token::{Event, Scalar, ScalarToken, TokenSource};

mod entities;

use entities::Resolution;

/// Longest entity name worth collecting before giving up and treating the
/// ampersand as literal text.
const MAX_ENTITY_LEN: usize = 16;

#[derive(Debug)]
enum Marker {
    Opening {
        name: String,
        self_closing: bool,
        pos: Position,
    },
    Closing {
        name: String,
        pos: Position,
    },
}

/// Streaming tokenizer over one XML document.
pub struct XmlTokenizer<'src> {
    scanner: Scanner<'src>,
    stack: Vec<String>,
    root_delivered: bool,
}

impl<'src> XmlTokenizer<'src> {
    pub fn new(text: &'src str) -> Self {
        XmlTokenizer {
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
            ErrorKind::MalformedXml {
                detail: detail.into(),
            },
            pos,
        )
    }

    /// Advance to the next tag, skipping whitespace, comments, processing
    /// instructions and doctype-like declarations. Text here is a mixed
    /// content violation: this is only called where an element is required.
    fn get_element(&mut self) -> Result<Marker, Error> {
        loop {
            if !self.scanner.skip_whitespace() {
                return Err(self.err("unexpected end of input, expected markup"));
            }
            let pos = self.scanner.position();
            if self.scanner.starts_with("<![CDATA[") {
                return Err(self.err_at("unexpected CDATA section, expected an element", pos));
            }
            if !self.scanner.eat('<') {
                return Err(self.err_at("unexpected text content, expected an element", pos));
            }
            match self.scanner.peek() {
                Some('?') => self.skip_processing_instruction()?,
                Some('!') => self.skip_declaration()?,
                Some('/') => {
                    self.scanner.bump();
                    let name = self.read_tag_name(pos)?;
                    self.scanner.skip_whitespace();
                    if !self.scanner.eat('>') {
                        return Err(self.err(format!("malformed closing tag '</{name}'")));
                    }
                    return Ok(Marker::Closing { name, pos });
                }
                _ => {
                    let name = self.read_tag_name(pos)?;
                    let self_closing = self.skip_attributes(&name, pos)?;
                    return Ok(Marker::Opening {
                        name,
                        self_closing,
                        pos,
                    });
                }
            }
        }
    }

    /// Turn an opening tag into an event. A self-closing tag is a null
    /// scalar; otherwise a lookahead past skippable markup decides between
    /// a structured token and a leaf.
    fn element_event(
        &mut self,
        tag: String,
        self_closing: bool,
        pos: Position,
        at_root: bool,
    ) -> Result<Event, Error> {
        let token_name = if at_root { None } else { Some(tag.clone()) };
        if self_closing {
            return Ok(Event::Scalar(ScalarToken::new(token_name, Scalar::Null, pos)));
        }
        loop {
            if !self.scanner.skip_whitespace() {
                return Err(self.err(format!(
                    "unexpected end of input inside element '<{tag}>'"
                )));
            }
            if self.scanner.peek() != Some('<') || self.scanner.starts_with("<![CDATA[") {
                return self.read_leaf(tag, token_name, pos);
            }
            match self.scanner.peek_second() {
                Some('/') => return self.read_leaf(tag, token_name, pos),
                Some('?') => {
                    self.scanner.bump();
                    self.skip_processing_instruction()?;
                }
                Some('!') => {
                    self.scanner.bump();
                    self.skip_declaration()?;
                }
                _ => {
                    self.stack.push(tag);
                    return Ok(Event::Open {
                        name: token_name,
                        pos,
                    });
                }
            }
        }
    }

    /// Read text content up to this element's closing tag. Empty (after
    /// trimming) becomes null, mirroring a self-closing element.
    fn read_leaf(
        &mut self,
        tag: String,
        token_name: Option<String>,
        pos: Position,
    ) -> Result<Event, Error> {
        let text = self.read_text(&tag)?;
        match self.get_element()? {
            Marker::Closing { name, .. } if name == tag => {
                let value = if text.is_empty() {
                    Scalar::Null
                } else {
                    Scalar::Str(text)
                };
                Ok(Event::Scalar(ScalarToken::new(token_name, value, pos)))
            }
            Marker::Closing { name, pos } => Err(self.err_at(
                format!("mismatched closing tag, expected '</{tag}>' but found '</{name}>'"),
                pos,
            )),
            Marker::Opening { name, pos, .. } => Err(self.err_at(
                format!("mixed text and element content in '<{tag}>' near '<{name}>'"),
                pos,
            )),
        }
    }

    /// Collect character data until markup. Entities are decoded, CDATA is
    /// taken verbatim, and the assembled text is trimmed at both ends.
    fn read_text(&mut self, tag: &str) -> Result<String, Error> {
        let mut out = String::new();
        loop {
            match self.scanner.peek() {
                None => return Err(self.err(format!("unterminated element '<{tag}>'"))),
                Some('<') => {
                    if self.scanner.starts_with("<![CDATA[") {
                        self.read_cdata(&mut out)?;
                    } else {
                        break;
                    }
                }
                Some('&') => self.read_entity(&mut out),
                Some(_) => {
                    if let Some(c) = self.scanner.bump() {
                        out.push(c);
                    }
                }
            }
        }
        Ok(out.trim().to_string())
    }

    fn read_cdata(&mut self, out: &mut String) -> Result<(), Error> {
        let pos = self.scanner.position();
        self.scanner.eat_str("<![CDATA[");
        loop {
            if self.scanner.eat_str("]]>") {
                return Ok(());
            }
            match self.scanner.bump() {
                Some(c) => out.push(c),
                None => return Err(self.err_at("unterminated CDATA section", pos)),
            }
        }
    }

    /// Decode one entity reference. Resolution failures never fail the
    /// parse: the raw text is preserved and, for unknown names, a warning
    /// is logged.
    fn read_entity(&mut self, out: &mut String) {
        self.scanner.bump(); // '&'
        let mut name = String::new();
        loop {
            match self.scanner.peek() {
                Some(';') => {
                    self.scanner.bump();
                    match entities::resolve(&name) {
                        Resolution::Resolved(c) => out.push(c),
                        Resolution::UnknownName => {
                            tracing::warn!(entity = %name, "unknown XML entity, preserved verbatim");
                            out.push('&');
                            out.push_str(&name);
                            out.push(';');
                        }
                        Resolution::Malformed => {
                            tracing::trace!(entity = %name, "malformed character reference, preserved verbatim");
                            out.push('&');
                            out.push_str(&name);
                            out.push(';');
                        }
                    }
                    return;
                }
                Some(c) if name.len() < MAX_ENTITY_LEN
                    && (c.is_ascii_alphanumeric() || c == '#') =>
                {
                    name.push(c);
                    self.scanner.bump();
                }
                _ => {
                    // Not an entity after all. Rewind the tail and keep the
                    // ampersand as literal text.
                    for _ in 0..name.len() {
                        self.scanner.retreat();
                    }
                    out.push('&');
                    return;
                }
            }
        }
    }

    fn read_tag_name(&mut self, pos: Position) -> Result<String, Error> {
        let mut name = String::new();
        while let Some(c) = self.scanner.peek() {
            if c.is_whitespace() || c == '>' || c == '/' || c == '<' {
                break;
            }
            name.push(c);
            self.scanner.bump();
        }
        if name.is_empty() {
            return Err(self.err_at("missing tag name", pos));
        }
        Ok(name)
    }

    /// Skip everything up to the end of an opening tag. Attribute values
    /// are honored as quoted regions, so '>' inside them does not close the
    /// tag. Returns true for a self-closing tag.
    fn skip_attributes(&mut self, tag: &str, pos: Position) -> Result<bool, Error> {
        loop {
            match self.scanner.peek() {
                None => return Err(self.err_at(format!("unterminated tag '<{tag}'"), pos)),
                Some('>') => {
                    self.scanner.bump();
                    return Ok(false);
                }
                Some('/') => {
                    self.scanner.bump();
                    if self.scanner.eat('>') {
                        return Ok(true);
                    }
                    return Err(self.err(format!("expected '>' after '/' in tag '<{tag}'")));
                }
                Some(q @ ('"' | '\'')) => {
                    self.scanner.bump();
                    self.skip_quoted(q, pos)?;
                }
                Some(_) => {
                    self.scanner.bump();
                }
            }
        }
    }

    fn skip_quoted(&mut self, quote: char, pos: Position) -> Result<(), Error> {
        loop {
            match self.scanner.bump() {
                Some(c) if c == quote => return Ok(()),
                Some(_) => {}
                None => return Err(self.err_at("unterminated attribute value", pos)),
            }
        }
    }

    fn skip_processing_instruction(&mut self) -> Result<(), Error> {
        let pos = self.scanner.position();
        loop {
            match self.scanner.bump() {
                Some('>') => return Ok(()),
                Some(_) => {}
                None => return Err(self.err_at("unterminated processing instruction", pos)),
            }
        }
    }

    /// Skip `<!...>` markup: comments to `-->`, anything else to `>`.
    fn skip_declaration(&mut self) -> Result<(), Error> {
        let pos = self.scanner.position();
        self.scanner.bump(); // '!'
        if self.scanner.eat_str("--") {
            loop {
                if self.scanner.eat_str("-->") {
                    return Ok(());
                }
                if self.scanner.bump().is_none() {
                    return Err(self.err_at("unterminated comment", pos));
                }
            }
        }
        loop {
            match self.scanner.bump() {
                Some('>') => return Ok(()),
                Some(_) => {}
                None => return Err(self.err_at("unterminated markup declaration", pos)),
            }
        }
    }
}

impl<'src> TokenSource<'src> for XmlTokenizer<'src> {
    fn next_event(&mut self) -> Result<Option<Event>, Error> {
        if self.stack.is_empty() {
            if self.root_delivered {
                if self.scanner.skip_whitespace() {
                    return Err(self.err("content after the document root"));
                }
                return Ok(None);
            }
            self.root_delivered = true;
            return match self.get_element()? {
                Marker::Closing { name, pos } => {
                    Err(self.err_at(format!("unexpected closing tag '</{name}>'"), pos))
                }
                Marker::Opening {
                    name,
                    self_closing,
                    pos,
                } => self.element_event(name, self_closing, pos, true).map(Some),
            };
        }
        match self.get_element()? {
            Marker::Closing { name, pos } => {
                let Some(open) = self.stack.pop() else {
                    return Err(Error::at(
                        ErrorKind::InternalProcessing {
                            detail: "closing tag with no open element".into(),
                        },
                        pos,
                    ));
                };
                if open != name {
                    return Err(self.err_at(
                        format!(
                            "mismatched closing tag, expected '</{open}>' but found '</{name}>'"
                        ),
                        pos,
                    ));
                }
                Ok(None)
            }
            Marker::Opening {
                name,
                self_closing,
                pos,
            } => self.element_event(name, self_closing, pos, false).map(Some),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    fn events(text: &str) -> Vec<String> {
        let mut tok = XmlTokenizer::new(text);
        let mut out = Vec::new();
        let mut open = 0usize;
        loop {
            match tok.next_event().unwrap() {
                Some(Event::Open { name, .. }) => {
                    open += 1;
                    out.push(format!("open {}", name.as_deref().unwrap_or("_")));
                }
                Some(Event::Scalar(s)) => {
                    out.push(format!("{} = {:?}", s.name().unwrap_or("_"), s.value()));
                }
                None => {
                    if open == 0 {
                        break;
                    }
                    open -= 1;
                    out.push("close".into());
                    if open == 0 {
                        break;
                    }
                }
            }
        }
        tok.expect_end().unwrap();
        out
    }

    fn first_error(text: &str) -> Error {
        let mut tok = XmlTokenizer::new(text);
        let mut delivered = false;
        loop {
            if delivered && tok.depth() == 0 {
                match tok.expect_end() {
                    Ok(()) => panic!("document parsed cleanly: {text}"),
                    Err(e) => return e,
                }
            }
            match tok.next_event() {
                Ok(Some(_)) => delivered = true,
                Ok(None) => {}
                Err(e) => return e,
            }
        }
    }

    #[test]
    fn test_tokenizes_nested_elements() {
        assert_eq!(
            events("<person><name>Ada</name><age>36</age></person>"),
            vec!["open _", "name = Str(\"Ada\")", "age = Str(\"36\")", "close"]
        );
    }

    #[test]
    fn test_root_token_is_unnamed() {
        let mut tok = XmlTokenizer::new("<r><x>1</x></r>");
        match tok.next_event().unwrap() {
            Some(Event::Open { name, .. }) => assert_eq!(name, None),
            other => panic!("expected open event, got {other:?}"),
        }
        let mut tok = XmlTokenizer::new("<r>hi</r>");
        match tok.next_event().unwrap() {
            Some(Event::Scalar(s)) => assert_eq!(s.name(), None),
            other => panic!("expected scalar event, got {other:?}"),
        }
    }

    #[test]
    fn test_self_closing_and_empty_elements_are_null() {
        assert_eq!(
            events("<r><a/><b></b><c>  </c></r>"),
            vec!["open _", "a = Null", "b = Null", "c = Null", "close"]
        );
    }

    #[test]
    fn test_prolog_doctype_and_comments_are_skipped() {
        assert_eq!(
            events(
                "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
                 <!DOCTYPE note>\n\
                 <!-- header -->\n\
                 <note><to><!-- inner -->Tove</to></note>"
            ),
            vec!["open _", "to = Str(\"Tove\")", "close"]
        );
    }

    #[test]
    fn test_attributes_are_skipped_even_with_tricky_values() {
        assert_eq!(
            events("<r><a href=\"x>y\" title='1 < 2'>ok</a></r>"),
            vec!["open _", "a = Str(\"ok\")", "close"]
        );
        assert_eq!(
            events("<r><img src=\"p.png\"/></r>"),
            vec!["open _", "img = Null", "close"]
        );
    }

    #[test]
    fn test_decodes_predefined_and_numeric_entities() {
        assert_eq!(
            events("<r><t>a &amp; b &lt;c&gt; &#65;&#x42;</t></r>"),
            vec!["open _", "t = Str(\"a & b <c> AB\")", "close"]
        );
    }

    #[test]
    fn test_preserves_unknown_and_malformed_entities() {
        assert_eq!(
            events("<r><t>&nbsp; stays</t></r>"),
            vec!["open _", "t = Str(\"&nbsp; stays\")", "close"]
        );
        assert_eq!(
            events("<r><t>fish &amp chips</t></r>"),
            vec!["open _", "t = Str(\"fish &amp chips\")", "close"]
        );
        assert_eq!(
            events("<r><t>&#xZZ; kept</t></r>"),
            vec!["open _", "t = Str(\"&#xZZ; kept\")", "close"]
        );
        assert_eq!(
            events("<r><t>AT&T</t></r>"),
            vec!["open _", "t = Str(\"AT&T\")", "close"]
        );
    }

    #[test]
    fn test_cdata_is_verbatim() {
        assert_eq!(
            events("<r><t><![CDATA[ 1 < 2 & <tags> stay ]]></t></r>"),
            vec!["open _", "t = Str(\"1 < 2 & <tags> stay\")", "close"]
        );
        assert_eq!(
            events("<r><t>before <![CDATA[&amp;]]> after</t></r>"),
            vec!["open _", "t = Str(\"before &amp; after\")", "close"]
        );
    }

    #[test]
    fn test_leaf_text_is_trimmed() {
        assert_eq!(
            events("<r><t>\n   padded out   \n</t></r>"),
            vec!["open _", "t = Str(\"padded out\")", "close"]
        );
    }

    #[test]
    fn test_rejects_mismatched_closing_tags() {
        let err = first_error("<a><b>1</c></a>");
        assert!(matches!(err.kind(), ErrorKind::MalformedXml { .. }), "{err}");
        let err = first_error("<a><b><x/></c></a>");
        assert!(matches!(err.kind(), ErrorKind::MalformedXml { .. }), "{err}");
        let err = first_error("<a><b></a></b>");
        assert!(err.to_string().contains("expected '</b>'"), "{err}");
    }

    #[test]
    fn test_rejects_mixed_text_and_elements() {
        // text first, then an element
        let err = first_error("<a>text<b>1</b></a>");
        assert!(matches!(err.kind(), ErrorKind::MalformedXml { .. }), "{err}");
        // element first, then text
        let err = first_error("<a><b>1</b>text</a>");
        assert!(matches!(err.kind(), ErrorKind::MalformedXml { .. }), "{err}");
        // CDATA next to an element
        let err = first_error("<a><b>1</b><![CDATA[x]]></a>");
        assert!(matches!(err.kind(), ErrorKind::MalformedXml { .. }), "{err}");
    }

    #[test]
    fn test_rejects_unterminated_documents() {
        for text in ["<a>", "<a><b>1</b>", "<a>text", "<a", "<a><![CDATA[x</a>"] {
            let err = first_error(text);
            assert!(
                matches!(err.kind(), ErrorKind::MalformedXml { .. }),
                "{text}: {err}"
            );
        }
    }

    #[test]
    fn test_rejects_content_before_and_after_the_root() {
        let err = first_error("hello <r>1</r>");
        assert!(matches!(err.kind(), ErrorKind::MalformedXml { .. }), "{err}");
        let err = first_error("<r>1</r><r>2</r>");
        assert!(
            matches!(err.kind(), ErrorKind::DocumentProcessing { .. }),
            "{err}"
        );
    }

    #[test]
    fn test_post_root_events_reject_leftover_markup() {
        let mut tok = XmlTokenizer::new("<r>1</r><r>2</r>");
        tok.next_event().unwrap();
        let err = tok.next_event().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MalformedXml { .. }), "{err}");

        // a whitespace-only tail is fine
        let mut tok = XmlTokenizer::new("<r>1</r>  \n");
        tok.next_event().unwrap();
        assert!(tok.next_event().unwrap().is_none());
    }

    #[test]
    fn test_error_positions_point_into_the_source() {
        let err = first_error("<a>\n  <b>1</b>\n  oops\n</a>");
        let pos = err.position().unwrap();
        assert_eq!(pos.line, 3);
        assert_eq!(pos.column, 3);
    }

    #[test]
    fn test_positions_stay_accurate_across_cdata_and_entities() {
        // The CDATA section spans two lines; the error after it must land
        // on the right raw-source line anyway.
        let err = first_error("<a>\n  <b><![CDATA[x\ny]]></b>\n  oops\n</a>");
        let pos = err.position().unwrap();
        assert_eq!((pos.line, pos.column), (4, 3));

        let err = first_error("<a>\n  <b>x&amp;y</b>\n  oops\n</a>");
        let pos = err.position().unwrap();
        assert_eq!((pos.line, pos.column), (3, 3));
    }

    #[test]
    fn test_whitespace_between_elements_is_ignored() {
        assert_eq!(
            events("<r>\n  <a>1</a>\n  <b>2</b>\n</r>"),
            vec!["open _", "a = Str(\"1\")", "b = Str(\"2\")", "close"]
        );
    }
}
