//! The pipeline facade: wires a [`Tokenizer`](crate::tokenizer::Tokenizer)
//! into a [`ContentParser`](crate::parser::ContentParser), optionally with
//! an attached XSD schema, behind one push entry point.
//!
//! This is deliberately thin — `spec.md` §1 places the full `Parser` facade
//! (feature/property URIs, `EntityResolver` wiring by URL, a `XMLReader`-
//! style registry) out of scope. What's here is the minimum a caller needs
//! to actually run the pipeline: build one with [`XmlPushParser::new`] or
//! [`XmlPushParser::builder`], feed it bytes with [`XmlPushParser::receive`]
//! any number of times, and finish with [`XmlPushParser::close`].

use std::rc::Rc;

use crate::config::{Config, ConfigBuilder};
use crate::errors::Result;
use crate::handler::{EntityResolver, ErrorHandler, EventHandler, NullEntityResolver, SilentErrorHandler};
use crate::locator::LocatorSnapshot;
use crate::parser::ContentParser;
use crate::xsd::schema::Schema;

/// Drives the tokenizer → content-parser → (DTD/XSD validator) pipeline
/// for one document.
///
/// Not reusable across documents: construct a fresh `XmlPushParser` per
/// parse (mirrors the teacher's own per-document `Reader`, minus the
/// pull-based `read_event` loop this crate's push model has no use for).
pub struct XmlPushParser {
    parser: ContentParser,
}

impl XmlPushParser {
    /// Creates a parser with the default [`Config`].
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates a parser with an explicit, already-validated [`Config`].
    pub fn with_config(config: Config) -> Self {
        Self {
            parser: ContentParser::new(config),
        }
    }

    /// Starts a [`ConfigBuilder`] whose `build()` feeds straight into a new
    /// parser, e.g. `XmlPushParser::builder().validation(true).finish()`.
    pub fn builder() -> XmlPushParserBuilder {
        XmlPushParserBuilder {
            inner: ConfigBuilder::new(),
        }
    }

    /// Attaches an XSD schema. Once attached, every element this parser
    /// sees from here on is run through [`crate::xsd::validator::XsdValidator`]
    /// in addition to any DTD validation `Config::validation` enables.
    pub fn set_schema(&mut self, schema: Rc<Schema>) {
        self.parser.set_schema(schema);
    }

    /// The parser's current position, for diagnostics raised outside of an
    /// event callback (e.g. before the first `receive`, or by the caller's
    /// own surrounding I/O loop).
    pub fn locator(&self) -> LocatorSnapshot {
        self.parser.locator()
    }

    /// Feeds a chunk of document bytes in, driving `handler` with every
    /// event that becomes available. May be called any number of times,
    /// with chunks of any size including empty or a single byte; per
    /// `spec.md` §8's chunk-invariance property, the resulting event
    /// sequence does not depend on how the caller split the document.
    pub fn receive(
        &mut self,
        buf: &[u8],
        handler: &mut dyn EventHandler,
        errors: &mut dyn ErrorHandler,
        resolver: &mut dyn EntityResolver,
    ) -> Result<()> {
        self.parser.receive(buf, handler, errors, resolver)
    }

    /// As [`Self::receive`], using a [`NullEntityResolver`] and a
    /// [`SilentErrorHandler`] for callers that have no DTD external subsets
    /// or recoverable-error reporting needs.
    pub fn receive_simple(&mut self, buf: &[u8], handler: &mut dyn EventHandler) -> Result<()> {
        let mut errors = SilentErrorHandler;
        let mut resolver = NullEntityResolver;
        self.receive(buf, handler, &mut errors, &mut resolver)
    }

    /// Signals end of input. Flushes any trailing tokenizer state, runs
    /// end-of-document validation (`IDREF` closure, unsatisfied content
    /// models), and fires `end_document`. Returns
    /// [`crate::errors::Error::MissingRootElement`] if the root element
    /// never closed.
    pub fn close(
        &mut self,
        handler: &mut dyn EventHandler,
        errors: &mut dyn ErrorHandler,
        resolver: &mut dyn EntityResolver,
    ) -> Result<()> {
        self.parser.close(handler, errors, resolver)
    }

    /// As [`Self::close`], using a [`NullEntityResolver`] and a
    /// [`SilentErrorHandler`].
    pub fn close_simple(&mut self, handler: &mut dyn EventHandler) -> Result<()> {
        let mut errors = SilentErrorHandler;
        let mut resolver = NullEntityResolver;
        self.close(handler, &mut errors, &mut resolver)
    }

    /// Convenience for feeding an entire in-memory document in one call,
    /// then closing. Equivalent to a single [`Self::receive`] followed by
    /// [`Self::close`]; chunking a document differently must produce the
    /// same events (`spec.md` §8), so this is never semantically different
    /// from a caller doing its own chunked feeding.
    pub fn parse_all(
        &mut self,
        document: &[u8],
        handler: &mut dyn EventHandler,
        errors: &mut dyn ErrorHandler,
        resolver: &mut dyn EntityResolver,
    ) -> Result<()> {
        self.receive(document, handler, errors, resolver)?;
        self.close(handler, errors, resolver)
    }
}

impl Default for XmlPushParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Chainable builder that produces an [`XmlPushParser`], mirroring
/// [`ConfigBuilder`]'s own chainable style one level up.
pub struct XmlPushParserBuilder {
    inner: ConfigBuilder,
}

macro_rules! forward_builder_method {
    ($name:ident, $ty:ty) => {
        /// Forwards to [`ConfigBuilder`]'s method of the same name.
        pub fn $name(mut self, val: $ty) -> Self {
            self.inner = self.inner.$name(val);
            self
        }
    };
}

impl XmlPushParserBuilder {
    forward_builder_method!(namespaces, bool);
    forward_builder_method!(namespace_prefixes, bool);
    forward_builder_method!(validation, bool);
    forward_builder_method!(external_general_entities, bool);
    forward_builder_method!(external_parameter_entities, bool);
    forward_builder_method!(resolve_dtd_uris, bool);
    forward_builder_method!(string_interning, bool);
    forward_builder_method!(xml_1_1, bool);
    forward_builder_method!(use_attributes2, bool);
    forward_builder_method!(lexical_handler, bool);
    forward_builder_method!(entity_depth_limit, u32);
    forward_builder_method!(trim_text, bool);
    forward_builder_method!(check_end_names, bool);
    forward_builder_method!(check_comments, bool);

    /// Validates the accumulated configuration and builds the parser.
    pub fn finish(self) -> Result<XmlPushParser> {
        Ok(XmlPushParser::with_config(self.inner.build()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::Attributes;
    use crate::name::ResolvedName;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl EventHandler for Recorder {
        fn start_document(&mut self) -> Result<()> {
            self.events.push("start_document".into());
            Ok(())
        }
        fn end_document(&mut self) -> Result<()> {
            self.events.push("end_document".into());
            Ok(())
        }
        fn start_element(&mut self, name: &ResolvedName, _attrs: &Attributes) -> Result<()> {
            self.events.push(format!("start:{}", name.qname));
            Ok(())
        }
        fn end_element(&mut self, name: &ResolvedName) -> Result<()> {
            self.events.push(format!("end:{}", name.qname));
            Ok(())
        }
        fn characters(&mut self, text: &str) -> Result<()> {
            self.events.push(format!("chars:{}", text));
            Ok(())
        }
    }

    #[test]
    fn parses_a_minimal_document_end_to_end() {
        let mut parser = XmlPushParser::new();
        let mut handler = Recorder::default();
        let mut errors = SilentErrorHandler;
        let mut resolver = NullEntityResolver;
        parser
            .parse_all(b"<?xml version='1.0'?><r>hi</r>", &mut handler, &mut errors, &mut resolver)
            .unwrap();
        assert_eq!(
            handler.events,
            vec!["start_document", "start:r", "chars:hi", "end:r", "end_document"]
        );
    }

    #[test]
    fn builder_rejects_invalid_configuration() {
        let err = XmlPushParser::builder()
            .namespaces(false)
            .namespace_prefixes(false)
            .finish()
            .unwrap_err();
        assert_eq!(err.code(), "InvalidConfig");
    }

    #[test]
    fn receive_can_be_split_across_many_calls() {
        let input: &[u8] = b"<root a=\"1\">text &amp; more<!-- c --></root>";
        let mut whole_parser = XmlPushParser::new();
        let mut whole = Recorder::default();
        whole_parser.parse_all(input, &mut whole, &mut SilentErrorHandler, &mut NullEntityResolver).unwrap();

        let mut chunked_parser = XmlPushParser::new();
        let mut chunked = Recorder::default();
        for byte in input {
            chunked_parser
                .receive_simple(std::slice::from_ref(byte), &mut chunked)
                .unwrap();
        }
        chunked_parser.close_simple(&mut chunked).unwrap();

        assert_eq!(whole.events, chunked.events);
    }
}
