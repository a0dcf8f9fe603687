//! Streaming, push-based lexical tokenizer.
//!
//! [`Tokenizer::receive`] may be called with arbitrarily small or large
//! chunks of a document; any lexical construct that straddles a chunk
//! boundary is held in an internal resume buffer until the rest of it
//! arrives, so the sequence of tokens produced for a document does not
//! depend on how its bytes were chunked (see the `chunk_invariance` tests
//! in `tests/`).

mod chars;
mod state;

pub use chars::{is_valid_char_reference, is_whitespace, is_xml10_char, is_xml11_char};

use memchr::memchr;

use crate::errors::{Error, Result};
use crate::locator::{Locator, LocatorSnapshot};

use self::state::{BangType, TagScanState, scan_pi};

/// One raw attribute as scanned from a start tag, before namespace
/// resolution, entity expansion or type-driven normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAttribute {
    /// The attribute's raw qualified name.
    pub name: Vec<u8>,
    /// The attribute's raw value, with surrounding quotes stripped but
    /// entity/character references not yet expanded.
    pub value: Vec<u8>,
}

/// A lexical token. Names, text and attribute values are raw bytes: entity
/// expansion, whitespace normalization and namespace resolution all happen
/// one layer up, in the content parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `<?xml version="1.0" encoding="UTF-8" standalone="yes"?>`
    XmlDecl {
        /// Raw attribute list of the declaration (`version`, `encoding`,
        /// `standalone`).
        attrs: Vec<RawAttribute>,
    },
    /// `<name attr="value" ...>` or `<name attr="value" .../>`.
    StartTag {
        /// Raw qualified name.
        name: Vec<u8>,
        /// Raw attributes, in document order.
        attrs: Vec<RawAttribute>,
        /// Whether this was written as a self-closing tag.
        self_closing: bool,
    },
    /// `</name>`
    EndTag {
        /// Raw qualified name.
        name: Vec<u8>,
    },
    /// A run of character data, with markup delimiters and entity/char
    /// references not yet expanded.
    Text(Vec<u8>),
    /// `<![CDATA[...]]>` content, verbatim.
    CData(Vec<u8>),
    /// `<!--...-->` content, excluding the delimiters.
    Comment(Vec<u8>),
    /// `<?target data?>`
    ProcessingInstruction {
        /// The PI target name.
        target: Vec<u8>,
        /// The PI's raw data, with leading whitespace stripped.
        data: Vec<u8>,
    },
    /// `<!DOCTYPE root ... >`, raw content excluding `<!DOCTYPE` and the
    /// final `>`. The DTD parser re-tokenizes the internal subset, if any.
    DocType(Vec<u8>),
}

/// Receives tokens as they are recognized.
pub trait TokenSink {
    /// Called once per recognized token, with the locator positioned at
    /// the token's start.
    fn token(&mut self, token: Token, at: &LocatorSnapshot) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Not inside any markup; scanning for the next `<` or end of input.
    Text,
    /// Positioned at an unconsumed `<`; not yet enough bytes to decide
    /// what construct follows.
    MarkupStart,
}

/// The push tokenizer itself.
pub struct Tokenizer {
    buffer: Vec<u8>,
    mode: Mode,
    closed: bool,
    saw_root: bool,
    locator: Locator,
    xml_1_1: bool,
    /// `true` if the previous `receive` call ended with a bare `\r` whose
    /// normalization depends on whether the next chunk starts with `\n`.
    pending_cr: bool,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer {
    /// Creates a tokenizer assuming XML 1.0 lexical rules.
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            mode: Mode::Text,
            closed: false,
            saw_root: false,
            locator: Locator::new(),
            xml_1_1: false,
            pending_cr: false,
        }
    }

    /// Switches to XML 1.1 character-class rules (wider `Char` production).
    pub fn set_xml_1_1(&mut self, val: bool) {
        self.xml_1_1 = val;
    }

    /// A snapshot of the current position, for attaching to diagnostics
    /// raised outside of a token callback.
    pub fn locator(&self) -> LocatorSnapshot {
        self.locator.snapshot()
    }

    /// Feeds more document bytes in, driving `sink` with every token that
    /// becomes recognizable as a result.
    ///
    /// Every byte is run through end-of-line normalization (`\r\n` and bare
    /// `\r` both become `\n`) before it ever reaches the scanners below, per
    /// the XML line-ending rule; a `\r` at the very end of one chunk is held
    /// back until the next `receive` or `close` resolves whether it was
    /// part of a `\r\n` pair, so chunking a document differently never
    /// changes the text it produces.
    pub fn receive(&mut self, buf: &[u8], sink: &mut dyn TokenSink) -> Result<()> {
        self.push_normalized(buf);
        self.drain(sink)
    }

    /// Signals that no more bytes will arrive. Any trailing text is
    /// flushed; an incomplete markup construct is reported as an
    /// unexpected end of input.
    pub fn close(&mut self, sink: &mut dyn TokenSink) -> Result<()> {
        self.closed = true;
        if self.pending_cr {
            self.buffer.push(b'\n');
            self.pending_cr = false;
        }
        self.drain(sink)?;
        if !self.buffer.is_empty() {
            return Err(Error::UnexpectedEof("markup"));
        }
        Ok(())
    }

    /// Appends `buf` to the resume buffer, collapsing `\r\n` and bare `\r`
    /// into `\n` as it goes (XML 1.0 §2.11 / XML 1.1 §2.11).
    fn push_normalized(&mut self, buf: &[u8]) {
        let mut i = 0;
        if self.pending_cr {
            self.buffer.push(b'\n');
            self.pending_cr = false;
            if buf.first() == Some(&b'\n') {
                i = 1;
            }
        }
        self.buffer.reserve(buf.len() - i);
        while i < buf.len() {
            match buf[i] {
                b'\r' if i + 1 < buf.len() => {
                    self.buffer.push(b'\n');
                    if buf[i + 1] == b'\n' {
                        i += 2;
                    } else {
                        i += 1;
                    }
                }
                b'\r' => {
                    // Last byte of this chunk: whether it collapses with a
                    // following `\n` is unknown until the next call.
                    self.pending_cr = true;
                    i += 1;
                }
                b => {
                    self.buffer.push(b);
                    i += 1;
                }
            }
        }
    }

    fn drain(&mut self, sink: &mut dyn TokenSink) -> Result<()> {
        loop {
            if self.buffer.is_empty() {
                return Ok(());
            }
            match self.buffer[0] {
                b'<' => match self.scan_markup(sink)? {
                    true => continue,
                    false => return Ok(()),
                },
                _ => match self.scan_text(sink)? {
                    true => continue,
                    false => return Ok(()),
                },
            }
        }
    }

    /// Scans a run of character data. Returns `true` if progress was made
    /// and the caller should loop again.
    fn scan_text(&mut self, sink: &mut dyn TokenSink) -> Result<bool> {
        match memchr(b'<', &self.buffer) {
            Some(0) => Ok(true),
            Some(i) => {
                let at = self.locator.snapshot();
                let text: Vec<u8> = self.buffer.drain(..i).collect();
                self.locator.advance(&text);
                sink.token(Token::Text(text), &at)?;
                Ok(true)
            }
            None => {
                if self.closed {
                    let at = self.locator.snapshot();
                    let text: Vec<u8> = self.buffer.drain(..).collect();
                    self.locator.advance(&text);
                    if !text.is_empty() {
                        sink.token(Token::Text(text), &at)?;
                    }
                    Ok(false)
                } else {
                    Ok(false)
                }
            }
        }
    }

    /// Scans one markup construct starting at `self.buffer[0] == b'<'`.
    /// Returns `true` if a full construct was consumed.
    fn scan_markup(&mut self, sink: &mut dyn TokenSink) -> Result<bool> {
        if self.buffer.len() < 2 {
            return self.need_more_or_eof("markup");
        }
        match self.buffer[1] {
            b'!' => self.scan_bang(sink),
            b'?' => self.scan_processing_instruction_or_decl(sink),
            b'/' => self.scan_end_tag(sink),
            _ => self.scan_start_tag(sink),
        }
    }

    fn need_more_or_eof(&self, what: &'static str) -> Result<bool> {
        if self.closed {
            Err(Error::UnexpectedEof(what))
        } else {
            Ok(false)
        }
    }

    fn scan_bang(&mut self, sink: &mut dyn TokenSink) -> Result<bool> {
        match BangType::recognize(&self.buffer) {
            None => self.need_more_or_eof("<! construct"),
            Some(Err(b)) => Err(Error::UnexpectedBang(b)),
            Some(Ok(bang)) => {
                let prefix_len = bang.prefix_len();
                match bang.parse(&self.buffer[prefix_len..]) {
                    None => self.need_more_or_eof("<! construct"),
                    Some((content, consumed)) => {
                        let at = self.locator.snapshot();
                        let total = prefix_len + consumed;
                        let content = content.to_vec();
                        let raw: Vec<u8> = self.buffer.drain(..total).collect();
                        self.locator.advance(&raw);
                        let token = match bang {
                            BangType::Comment => Token::Comment(content),
                            BangType::CData => Token::CData(content),
                            BangType::DocType => Token::DocType(content),
                        };
                        sink.token(token, &at)?;
                        Ok(true)
                    }
                }
            }
        }
    }

    fn scan_processing_instruction_or_decl(&mut self, sink: &mut dyn TokenSink) -> Result<bool> {
        match scan_pi(&self.buffer[2..]) {
            None => self.need_more_or_eof("processing instruction"),
            Some((content, consumed)) => {
                let at = self.locator.snapshot();
                let total = 2 + consumed;
                let content = content.to_vec();
                let raw: Vec<u8> = self.buffer.drain(..total).collect();
                self.locator.advance(&raw);
                let (target, data) = split_pi(&content);
                let token = if target.eq_ignore_ascii_case(b"xml") {
                    let attrs = parse_attributes(&data)?;
                    Token::XmlDecl { attrs }
                } else {
                    Token::ProcessingInstruction {
                        target: target.to_vec(),
                        data: data.to_vec(),
                    }
                };
                sink.token(token, &at)?;
                Ok(true)
            }
        }
    }

    fn scan_end_tag(&mut self, sink: &mut dyn TokenSink) -> Result<bool> {
        let mut scanner = TagScanState::default();
        match scanner.scan(&self.buffer[2..]) {
            None => self.need_more_or_eof("end tag"),
            Some((content, consumed)) => {
                let at = self.locator.snapshot();
                let total = 2 + consumed;
                let content = content.to_vec();
                let raw: Vec<u8> = self.buffer.drain(..total).collect();
                self.locator.advance(&raw);
                let name = content
                    .iter()
                    .position(|b| is_whitespace(*b))
                    .map(|i| &content[..i])
                    .unwrap_or(&content[..]);
                sink.token(
                    Token::EndTag {
                        name: name.to_vec(),
                    },
                    &at,
                )?;
                Ok(true)
            }
        }
    }

    fn scan_start_tag(&mut self, sink: &mut dyn TokenSink) -> Result<bool> {
        let mut scanner = TagScanState::default();
        match scanner.scan(&self.buffer[1..]) {
            None => self.need_more_or_eof("start tag"),
            Some((content, consumed)) => {
                let at = self.locator.snapshot();
                let total = 1 + consumed;
                let mut content = content.to_vec();
                let raw: Vec<u8> = self.buffer.drain(..total).collect();
                self.locator.advance(&raw);
                let self_closing = content.ends_with(b"/");
                if self_closing {
                    content.pop();
                }
                let (name, rest) = split_name(&content);
                let attrs = parse_attributes(rest)?;
                self.saw_root = true;
                sink.token(
                    Token::StartTag {
                        name: name.to_vec(),
                        attrs,
                        self_closing,
                    },
                    &at,
                )?;
                Ok(true)
            }
        }
    }
}

fn split_pi(content: &[u8]) -> (&[u8], &[u8]) {
    match content.iter().position(|b| is_whitespace(*b)) {
        Some(i) => {
            let target = &content[..i];
            let mut rest = &content[i..];
            while !rest.is_empty() && is_whitespace(rest[0]) {
                rest = &rest[1..];
            }
            (target, rest)
        }
        None => (content, &content[content.len()..]),
    }
}

fn split_name(content: &[u8]) -> (&[u8], &[u8]) {
    match content.iter().position(|b| is_whitespace(*b)) {
        Some(i) => (&content[..i], &content[i..]),
        None => (content, &content[content.len()..]),
    }
}

/// Parses a whitespace-separated `name="value"`/`name='value'` list, as
/// found after an element or `<?xml ... ?>` declaration's name.
fn parse_attributes(mut rest: &[u8]) -> Result<Vec<RawAttribute>> {
    let mut attrs = Vec::new();
    loop {
        while !rest.is_empty() && is_whitespace(rest[0]) {
            rest = &rest[1..];
        }
        if rest.is_empty() {
            break;
        }
        let eq = rest
            .iter()
            .position(|b| *b == b'=' || is_whitespace(*b))
            .ok_or_else(|| Error::UnexpectedToken("attribute without value".to_string()))?;
        let name = &rest[..eq];
        rest = &rest[eq..];
        while !rest.is_empty() && is_whitespace(rest[0]) {
            rest = &rest[1..];
        }
        if rest.first() != Some(&b'=') {
            return Err(Error::UnexpectedToken(format!(
                "attribute `{}` has no value",
                String::from_utf8_lossy(name)
            )));
        }
        rest = &rest[1..];
        while !rest.is_empty() && is_whitespace(rest[0]) {
            rest = &rest[1..];
        }
        let quote = match rest.first() {
            Some(b @ (b'\'' | b'"')) => *b,
            _ => {
                return Err(Error::UnexpectedToken(format!(
                    "attribute `{}` value must be quoted",
                    String::from_utf8_lossy(name)
                )))
            }
        };
        rest = &rest[1..];
        let end = memchr(quote, rest).ok_or_else(|| {
            Error::UnexpectedToken(format!(
                "unterminated value for attribute `{}`",
                String::from_utf8_lossy(name)
            ))
        })?;
        let value = &rest[..end];
        rest = &rest[end + 1..];
        attrs.push(RawAttribute {
            name: name.to_vec(),
            value: value.to_vec(),
        });
    }
    Ok(attrs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Collector(Vec<Token>);

    impl TokenSink for Collector {
        fn token(&mut self, token: Token, _at: &LocatorSnapshot) -> Result<()> {
            self.0.push(token);
            Ok(())
        }
    }

    fn run(input: &[u8]) -> Vec<Token> {
        let mut tok = Tokenizer::new();
        let mut out = Collector::default();
        tok.receive(input, &mut out).unwrap();
        tok.close(&mut out).unwrap();
        out.0
    }

    #[test]
    fn tokenizes_simple_element() {
        let tokens = run(b"<root attr=\"1\">hi</root>");
        assert_eq!(
            tokens,
            vec![
                Token::StartTag {
                    name: b"root".to_vec(),
                    attrs: vec![RawAttribute {
                        name: b"attr".to_vec(),
                        value: b"1".to_vec()
                    }],
                    self_closing: false,
                },
                Token::Text(b"hi".to_vec()),
                Token::EndTag {
                    name: b"root".to_vec()
                },
            ]
        );
    }

    #[test]
    fn tokenizes_self_closing_element() {
        let tokens = run(b"<root/>");
        assert_eq!(
            tokens,
            vec![Token::StartTag {
                name: b"root".to_vec(),
                attrs: vec![],
                self_closing: true,
            }]
        );
    }

    #[test]
    fn quoted_gt_inside_attribute_does_not_end_tag() {
        let tokens = run(br#"<root a="1>2"/>"#);
        assert_eq!(
            tokens,
            vec![Token::StartTag {
                name: b"root".to_vec(),
                attrs: vec![RawAttribute {
                    name: b"a".to_vec(),
                    value: b"1>2".to_vec()
                }],
                self_closing: true,
            }]
        );
    }

    #[test]
    fn chunk_boundaries_do_not_affect_output() {
        let input: &[u8] = b"<root a=\"1\">text &amp; more<!-- c --></root>";
        let whole = run(input);
        let mut tok = Tokenizer::new();
        let mut out = Collector::default();
        for byte in input {
            tok.receive(std::slice::from_ref(byte), &mut out).unwrap();
        }
        tok.close(&mut out).unwrap();
        assert_eq!(whole, out.0);
    }

    #[test]
    fn recognizes_comment_cdata_doctype_and_pi() {
        let tokens = run(b"<!-- c --><![CDATA[<raw>]]><!DOCTYPE a><?pi data?>");
        assert_eq!(
            tokens,
            vec![
                Token::Comment(b" c ".to_vec()),
                Token::CData(b"<raw>".to_vec()),
                Token::DocType(b"a".to_vec()),
                Token::ProcessingInstruction {
                    target: b"pi".to_vec(),
                    data: b"data".to_vec()
                },
            ]
        );
    }

    #[test]
    fn xml_declaration_is_recognized_specially() {
        let tokens = run(b"<?xml version=\"1.0\" encoding=\"UTF-8\"?><root/>");
        match &tokens[0] {
            Token::XmlDecl { attrs } => {
                assert_eq!(attrs[0].name, b"version");
                assert_eq!(attrs[1].value, b"UTF-8");
            }
            other => panic!("expected XmlDecl, got {:?}", other),
        }
    }

    #[test]
    fn incomplete_trailing_markup_is_an_error_on_close() {
        let mut tok = Tokenizer::new();
        let mut out = Collector::default();
        tok.receive(b"<root", &mut out).unwrap();
        let err = tok.close(&mut out).unwrap_err();
        assert_eq!(err.code(), "UnexpectedEof");
    }

    #[test]
    fn crlf_and_bare_cr_are_normalized_to_lf() {
        let tokens = run(b"<a>line1\r\nline2\rline3\n</a>");
        assert_eq!(tokens[1], Token::Text(b"line1\nline2\nline3\n".to_vec()));
    }

    #[test]
    fn crlf_split_across_a_chunk_boundary_still_normalizes_to_one_lf() {
        let mut tok = Tokenizer::new();
        let mut out = Collector::default();
        tok.receive(b"<a>line1\r", &mut out).unwrap();
        tok.receive(b"\nline2</a>", &mut out).unwrap();
        tok.close(&mut out).unwrap();
        assert_eq!(out.0[1], Token::Text(b"line1\nline2".to_vec()));
    }

    #[test]
    fn bare_trailing_cr_at_close_normalizes_to_lf() {
        let mut tok = Tokenizer::new();
        let mut out = Collector::default();
        tok.receive(b"<a>line1\r", &mut out).unwrap();
        tok.receive(b"line2</a>", &mut out).unwrap();
        tok.close(&mut out).unwrap();
        assert_eq!(out.0[1], Token::Text(b"line1\nline2".to_vec()));
    }
}
