//! The content parser: drives a [`crate::tokenizer::Tokenizer`] and turns
//! its raw lexical tokens into the well-formedness-checked, namespace- and
//! entity-resolved event stream delivered to a
//! [`crate::handler::EventHandler`], optionally filtered through a DTD
//! and/or XSD validator along the way.
//!
//! This is the "grammar" layer `spec.md` §4.2 describes: prolog, DOCTYPE,
//! content and epilog states, attribute processing, namespace resolution
//! and entity expansion in content all live here. The tokenizer knows
//! nothing about any of this; it only recognizes lexical shapes.

pub mod entities;
pub mod normalize;

use std::rc::Rc;

use crate::attributes::{Attribute, AttributeType, Attributes};
use crate::config::Config;
use crate::decoder::Decoder;
use crate::dtd::decl::{parse_doctype_header, parse_internal_subset, AttDefault, DtdTables};
use crate::dtd::validator::DtdValidator;
use crate::errors::{Error, Result};
use crate::handler::{EntityResolver, ErrorHandler, EventHandler};
use crate::locator::LocatorSnapshot;
use crate::name::{QName, ResolveResult, ResolvedName};
use crate::namespace::NamespaceTracker;
use crate::tokenizer::{RawAttribute, Token, TokenSink, Tokenizer};
use crate::xsd::schema::Schema;
use crate::xsd::validator::XsdValidator;

use entities::{expand_general_references, predefined_entity, EntitySource, EntityTable};

/// Where the parser currently sits in the document grammar, per `spec.md`
/// §4.2's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Nothing consumed yet; a `<?xml ... ?>` declaration, if present, must
    /// be the very next token.
    PrologBeforeXmlDecl,
    /// The XML declaration (or its absence) has been settled; misc content
    /// and an optional `<!DOCTYPE>` may follow.
    PrologAfterXmlDecl,
    /// Misc content (comments, PIs, whitespace) after the DOCTYPE and
    /// before the root element.
    PrologMisc,
    /// Inside the root element or one of its descendants. The `u32` is the
    /// open-element depth.
    Content(u32),
    /// After the root element has closed; only misc content is allowed.
    Epilog,
}

/// One open element's bookkeeping: its resolved name (for the matching
/// `end_element`/`end_prefix_mapping` calls) and the prefixes it declared
/// (to end their scope on the way out).
struct ElementFrame {
    name: ResolvedName,
    declared_prefixes: Vec<Option<String>>,
}

/// Drives a [`Tokenizer`] and turns its tokens into well-formedness-level
/// and (optionally) validation-level events.
pub struct ContentParser {
    config: Config,
    decoder: Decoder,
    tokenizer: Tokenizer,
    state: State,
    namespaces: NamespaceTracker,
    stack: Vec<ElementFrame>,
    entities: EntityTable,
    dtd_tables: Option<Rc<DtdTables>>,
    dtd_validator: Option<DtdValidator>,
    xsd_validator: Option<XsdValidator>,
    saw_xml_decl: bool,
    saw_doctype: bool,
    saw_root_end: bool,
    consumed_bom: bool,
}

impl ContentParser {
    /// Creates a parser for a fresh document using `config`.
    pub fn new(config: Config) -> Self {
        let mut tokenizer = Tokenizer::new();
        tokenizer.set_xml_1_1(config.xml_1_1);
        Self {
            config,
            decoder: Decoder::default(),
            tokenizer,
            state: State::PrologBeforeXmlDecl,
            namespaces: NamespaceTracker::new(),
            stack: Vec::new(),
            entities: EntityTable::new(),
            dtd_tables: None,
            dtd_validator: None,
            xsd_validator: None,
            saw_xml_decl: false,
            saw_doctype: false,
            saw_root_end: false,
            consumed_bom: false,
        }
    }

    /// Attaches an XSD schema; once attached, every `start_element`/
    /// `characters`/`end_element` is also run through an [`XsdValidator`].
    pub fn set_schema(&mut self, schema: Rc<Schema>) {
        self.xsd_validator = Some(XsdValidator::new(schema));
    }

    /// The parser's current position, for diagnostics raised outside of an
    /// event callback.
    pub fn locator(&self) -> LocatorSnapshot {
        self.tokenizer.locator()
    }

    /// Feeds `buf` in, driving `handler`/`errors` with every event that
    /// becomes available as a result. `buf` may be any size, including
    /// empty or a single byte; see the tokenizer's chunk-invariance
    /// contract.
    pub fn receive(
        &mut self,
        buf: &[u8],
        handler: &mut dyn EventHandler,
        errors: &mut dyn ErrorHandler,
        resolver: &mut dyn EntityResolver,
    ) -> Result<()> {
        let buf = if !self.consumed_bom {
            self.consumed_bom = true;
            strip_leading_bom(buf)
        } else {
            buf
        };
        if buf.is_empty() {
            return Ok(());
        }
        // Pull the tokenizer out of `self` so it is disjoint from the
        // `Driver` below, which reborrows the rest of `self`: the
        // tokenizer needs a `&mut dyn TokenSink` that itself calls back
        // into `self`, and the two borrows would otherwise alias.
        let mut tokenizer = std::mem::take(&mut self.tokenizer);
        let result = {
            let mut driver = Driver {
                parser: &mut *self,
                handler,
                errors,
                resolver,
            };
            tokenizer.receive(buf, &mut driver)
        };
        self.tokenizer = tokenizer;
        result
    }

    /// Signals end of input: flushes any trailing tokenizer state and, if
    /// the root element never closed, reports
    /// [`Error::MissingRootElement`].
    pub fn close(
        &mut self,
        handler: &mut dyn EventHandler,
        errors: &mut dyn ErrorHandler,
        resolver: &mut dyn EntityResolver,
    ) -> Result<()> {
        let mut tokenizer = std::mem::take(&mut self.tokenizer);
        let result = {
            let mut driver = Driver {
                parser: &mut *self,
                handler,
                errors,
                resolver,
            };
            tokenizer.close(&mut driver)
        };
        self.tokenizer = tokenizer;
        result?;
        if !self.saw_root_end {
            return Err(Error::MissingRootElement);
        }
        if let Some(validator) = self.xsd_validator.as_mut() {
            validator.end_document(errors)?;
        }
        if let Some(validator) = self.dtd_validator.as_mut() {
            validator.end_document(errors)?;
        }
        handler.end_document()
    }
}

fn strip_leading_bom(buf: &[u8]) -> &[u8] {
    buf.strip_prefix(b"\xEF\xBB\xBF".as_slice()).unwrap_or(buf)
}

/// Borrows everything a single `receive`/`close` call needs except the
/// tokenizer itself, and implements [`TokenSink`] so the tokenizer can
/// drive it directly.
struct Driver<'a> {
    parser: &'a mut ContentParser,
    handler: &'a mut dyn EventHandler,
    errors: &'a mut dyn ErrorHandler,
    resolver: &'a mut dyn EntityResolver,
}

impl<'a> TokenSink for Driver<'a> {
    fn token(&mut self, token: Token, at: &LocatorSnapshot) -> Result<()> {
        self.dispatch(token, at)
    }
}

impl<'a> Driver<'a> {
    fn dispatch(&mut self, token: Token, at: &LocatorSnapshot) -> Result<()> {
        if !self.parser.saw_xml_decl && self.parser.state == State::PrologBeforeXmlDecl {
            // No `<?xml ... ?>`: the first token settles the state without
            // one, and `start_document` still fires before anything else.
            if !matches!(token, Token::XmlDecl { .. }) {
                self.parser.state = State::PrologAfterXmlDecl;
                self.handler.set_document_locator(at.clone());
                self.handler.start_document()?;
            }
        }
        match token {
            Token::XmlDecl { attrs } => self.on_xml_decl(attrs, at),
            Token::DocType(content) => self.on_doctype(content, at),
            Token::Comment(bytes) => self.on_comment(bytes, at),
            Token::ProcessingInstruction { target, data } => {
                self.on_processing_instruction(target, data)
            }
            Token::Text(bytes) => self.on_text(bytes, at),
            Token::CData(bytes) => self.on_cdata(bytes, at),
            Token::StartTag {
                name,
                attrs,
                self_closing,
            } => self.on_start_tag(name, attrs, self_closing, at),
            Token::EndTag { name } => self.on_end_tag(name, at),
        }
    }

    fn on_xml_decl(&mut self, attrs: Vec<RawAttribute>, at: &LocatorSnapshot) -> Result<()> {
        if self.parser.state != State::PrologBeforeXmlDecl {
            return self.fatal(Error::XmlDeclNotAtStart, at);
        }
        self.parser.saw_xml_decl = true;
        for attr in &attrs {
            if attr.name == b"version" {
                let version = String::from_utf8_lossy(&attr.value);
                // The tokenizer's own character-class rules are version-
                // independent; only character-reference validity (checked
                // against `config.xml_1_1` in `decode_char_reference`)
                // differs between XML 1.0 and 1.1.
                self.parser.config.xml_1_1 = version.trim() == "1.1";
            }
        }
        self.parser.state = State::PrologAfterXmlDecl;
        self.handler.set_document_locator(at.clone());
        self.handler.start_document()
    }

    fn on_doctype(&mut self, content: Vec<u8>, at: &LocatorSnapshot) -> Result<()> {
        if !matches!(self.parser.state, State::PrologAfterXmlDecl | State::PrologMisc)
            || self.parser.saw_doctype
        {
            return self.fatal(
                Error::UnexpectedToken(
                    "<!DOCTYPE> must appear once, before the root element".to_string(),
                ),
                at,
            );
        }
        self.parser.saw_doctype = true;
        self.parser.state = State::PrologMisc;
        let text = String::from_utf8_lossy(&content).into_owned();
        let header = match parse_doctype_header(&text) {
            Ok(h) => h,
            Err(e) => return self.fatal(e, at),
        };
        let (public_id, system_id) = match &header.external_id {
            Some(ext) => (ext.public_id.clone(), Some(ext.system_id.clone())),
            None => (None, None),
        };
        self.handler
            .start_dtd(header.name, public_id.as_deref(), system_id.as_deref())?;

        // Fetching the external subset itself (when `external_id` is set)
        // is not implemented: only the internal subset, if present, is
        // parsed into declaration tables. See `DESIGN.md`.
        let mut tables = DtdTables::default();
        if let Some(subset) = header.internal_subset {
            if let Err(e) = parse_internal_subset(subset, &mut tables) {
                return self.fatal(e, at);
            }
        }

        for (name, source) in tables.entities.general_iter() {
            self.parser.entities.declare_general(name, source.clone());
            if let EntitySource::External {
                public_id,
                system_id,
                ndata: Some(notation),
            } = source
            {
                self.handler
                    .unparsed_entity_decl(name, public_id.as_deref(), system_id, notation)?;
            }
        }
        for (name, decl) in &tables.notations {
            self.handler
                .notation_decl(name, decl.public_id.as_deref(), decl.system_id.as_deref())?;
        }

        let tables = Rc::new(tables);
        self.parser.dtd_tables = Some(tables.clone());
        if self.parser.config.validation {
            self.parser.dtd_validator = Some(DtdValidator::new(tables));
        }
        self.handler.end_dtd()
    }

    fn on_comment(&mut self, bytes: Vec<u8>, at: &LocatorSnapshot) -> Result<()> {
        if !self.parser.config.lexical_handler {
            return Ok(());
        }
        let text = match self.parser.decoder.decode(&bytes) {
            Ok(t) => t.into_owned(),
            Err(e) => return self.fatal(e, at),
        };
        if self.parser.config.check_comments && text.contains("--") {
            return self.fatal(Error::MalformedComment, at);
        }
        self.handler.comment(&text)
    }

    fn on_processing_instruction(&mut self, target: Vec<u8>, data: Vec<u8>) -> Result<()> {
        let target = String::from_utf8_lossy(&target).into_owned();
        let data = String::from_utf8_lossy(&data).into_owned();
        self.handler.processing_instruction(&target, &data)
    }

    fn on_text(&mut self, bytes: Vec<u8>, at: &LocatorSnapshot) -> Result<()> {
        if !matches!(self.parser.state, State::Content(_)) {
            let text = String::from_utf8_lossy(&bytes);
            if text.trim().is_empty() {
                return Ok(());
            }
            return self.fatal(Error::MarkupOutsideRoot, at);
        }
        let raw = match self.parser.decoder.decode(&bytes) {
            Ok(t) => t.into_owned(),
            Err(e) => return self.fatal(e, at),
        };
        self.emit_content_text(&raw, at)
    }

    /// Expands general-entity and character references in a run of
    /// character-data text, then delivers the result through
    /// `characters`, bracketing named-entity expansions with
    /// `start_entity`/`end_entity` per `spec.md` §4.6.
    ///
    /// Only textual (character-producing) replacement text is supported:
    /// an entity whose replacement text itself contains element markup
    /// would need to be re-tokenized as markup, which this parser does not
    /// do (see `DESIGN.md`'s note on `spec.md` §9's own acknowledgment that
    /// this is an extension-level concern).
    fn emit_content_text(&mut self, raw: &str, at: &LocatorSnapshot) -> Result<()> {
        let bytes = raw.as_bytes();
        let mut i = 0;
        let mut plain = String::new();
        while i < bytes.len() {
            if bytes[i] != b'&' {
                let start = i;
                while i < bytes.len() && bytes[i] != b'&' {
                    i += 1;
                }
                plain.push_str(&raw[start..i]);
                continue;
            }
            let semi = match raw[i..].find(';') {
                Some(p) => i + p,
                None => {
                    return self.fatal(
                        Error::UnexpectedToken("unterminated entity reference".to_string()),
                        at,
                    )
                }
            };
            let body = &raw[i + 1..semi];
            if let Some(rest) = body.strip_prefix('#') {
                match decode_char_reference(rest, self.parser.config.xml_1_1) {
                    Ok(ch) => plain.push(ch),
                    Err(e) => return self.fatal(e, at),
                }
            } else if let Some(resolved) = predefined_entity(body) {
                plain.push_str(resolved);
            } else {
                if !plain.is_empty() {
                    self.handler.characters(&plain)?;
                    plain.clear();
                }
                self.expand_named_entity_in_content(body, at)?;
            }
            i = semi + 1;
        }
        if !plain.is_empty() {
            self.handler.characters(&plain)?;
        }
        Ok(())
    }

    fn expand_named_entity_in_content(&mut self, name: &str, at: &LocatorSnapshot) -> Result<()> {
        let source = match self.parser.entities.general(name) {
            Some(s) => s.clone(),
            None => {
                if self.parser.config.external_general_entities {
                    return self.fatal(Error::UnresolvedEntity(name.to_string()), at);
                }
                return self.handler.skipped_entity(name);
            }
        };
        match source {
            EntitySource::Internal(replacement) => {
                self.handler.start_entity(name)?;
                let entities = self.parser.entities.clone();
                let xml_1_1 = self.parser.config.xml_1_1;
                let depth_limit = self.parser.config.entity_depth_limit;
                let resolve = move |n: &str| match entities.general(n) {
                    Some(EntitySource::Internal(text)) => Some(text.clone()),
                    _ => None,
                };
                let expanded =
                    expand_general_references(&replacement, &resolve, xml_1_1, depth_limit)?;
                if !expanded.is_empty() {
                    self.handler.characters(&expanded)?;
                }
                self.handler.end_entity(name)
            }
            EntitySource::External { ndata: Some(_), .. } => {
                self.fatal(Error::UnparsedEntityReference(name.to_string()), at)
            }
            EntitySource::External {
                public_id,
                system_id,
                ndata: None,
            } => {
                if !self.parser.config.external_general_entities {
                    return self.handler.skipped_entity(name);
                }
                match self
                    .resolver
                    .resolve_entity(public_id.as_deref(), &system_id)?
                {
                    Some(mut source) => {
                        self.handler.start_entity(name)?;
                        let mut buf = Vec::new();
                        std::io::Read::read_to_end(&mut source, &mut buf)?;
                        let text = self.parser.decoder.decode(&buf)?.into_owned();
                        if !text.is_empty() {
                            self.handler.characters(&text)?;
                        }
                        self.handler.end_entity(name)
                    }
                    None => self.handler.skipped_entity(name),
                }
            }
        }
    }

    fn on_cdata(&mut self, bytes: Vec<u8>, at: &LocatorSnapshot) -> Result<()> {
        if !matches!(self.parser.state, State::Content(_)) {
            return self.fatal(Error::MarkupOutsideRoot, at);
        }
        let text = match self.parser.decoder.decode(&bytes) {
            Ok(t) => t.into_owned(),
            Err(e) => return self.fatal(e, at),
        };
        if self.parser.config.lexical_handler {
            self.handler.start_cdata()?;
        }
        if !text.is_empty() {
            self.report_characters(&text, at)?;
        }
        if self.parser.config.lexical_handler {
            self.handler.end_cdata()?;
        }
        Ok(())
    }

    /// Runs `text` through the DTD/XSD validators (if enabled) before
    /// delivering it to the event handler. Validator `Err`s are only
    /// returned when the error handler itself demanded an abort; they are
    /// propagated as-is rather than re-reported, since the validator
    /// already reported the underlying violation.
    fn report_characters(&mut self, text: &str, at: &LocatorSnapshot) -> Result<()> {
        if let Some(validator) = self.parser.xsd_validator.as_mut() {
            validator.characters(text, at, self.errors)?;
        }
        if let Some(validator) = self.parser.dtd_validator.as_mut() {
            validator.characters(text, at, self.errors)?;
        }
        self.handler.characters(text)
    }

    fn on_start_tag(
        &mut self,
        name: Vec<u8>,
        raw_attrs: Vec<RawAttribute>,
        self_closing: bool,
        at: &LocatorSnapshot,
    ) -> Result<()> {
        match self.parser.state {
            State::PrologAfterXmlDecl | State::PrologMisc => {
                self.parser.state = State::Content(1);
            }
            State::Content(depth) => {
                self.parser.state = State::Content(depth + 1);
            }
            State::Epilog => return self.fatal(Error::MultipleRootElements, at),
            State::PrologBeforeXmlDecl => unreachable!("settled in dispatch() before this runs"),
        }

        let qname_text = String::from_utf8_lossy(&name).into_owned();
        let qname = QName::new(qname_text);

        let (raw_attrs, declared_prefixes) = self.process_namespace_declarations(raw_attrs)?;

        let mut attrs = match self.build_attributes(raw_attrs) {
            Ok(a) => a,
            Err(e) => {
                self.parser.namespaces.pop();
                return self.fatal(e, at);
            }
        };

        self.apply_dtd_defaults(&qname, &mut attrs);

        let resolved_name = if self.parser.config.namespaces {
            ResolvedName {
                namespace: self.parser.namespaces.resolve(&qname, false),
                qname,
            }
        } else {
            ResolvedName {
                namespace: ResolveResult::Unbound,
                qname,
            }
        };

        if self.parser.config.namespaces {
            if let Some(prefix) = resolved_name.qname.prefix() {
                if resolved_name.namespace.uri().is_none() {
                    self.parser.namespaces.pop();
                    return self.fatal(Error::UnboundPrefix(prefix.to_string()), at);
                }
            }
            for attr in attrs.iter() {
                if let Some(prefix) = attr.qname.prefix() {
                    if prefix != "xmlns" && attr.namespace.uri().is_none() {
                        self.parser.namespaces.pop();
                        return self.fatal(Error::UnboundPrefix(prefix.to_string()), at);
                    }
                }
            }
        }

        if !self.parser.config.namespace_prefixes {
            attrs.retain(|a| !is_namespace_declaration(a));
        }

        if let Some(validator) = self.parser.xsd_validator.as_mut() {
            if let Err(e) = validator.start_element(&resolved_name, &attrs, at, self.errors) {
                self.parser.namespaces.pop();
                return Err(e);
            }
        }
        if let Some(validator) = self.parser.dtd_validator.as_mut() {
            if let Err(e) = validator.start_element(&resolved_name, &attrs, at, self.errors) {
                self.parser.namespaces.pop();
                return Err(e);
            }
        }

        self.handler.start_element(&resolved_name, &attrs)?;

        self.parser.stack.push(ElementFrame {
            name: resolved_name,
            declared_prefixes,
        });

        if self_closing {
            self.close_element(at)?;
        }
        Ok(())
    }

    /// Pushes a fresh namespace scope, applies every `xmlns`/`xmlns:*`
    /// attribute in it, and returns the remaining (non-namespace-
    /// declaration) raw attributes plus the list of prefixes declared here
    /// (for emitting `start_prefix_mapping` and, later, the matching
    /// `end_prefix_mapping`).
    fn process_namespace_declarations(
        &mut self,
        raw_attrs: Vec<RawAttribute>,
    ) -> Result<(Vec<RawAttribute>, Vec<Option<String>>)> {
        self.parser.namespaces.push();
        if !self.parser.config.namespaces {
            return Ok((raw_attrs, Vec::new()));
        }
        let mut rest = Vec::with_capacity(raw_attrs.len());
        let mut declared = Vec::new();
        for raw in raw_attrs {
            let name = String::from_utf8_lossy(&raw.name).into_owned();
            if name == "xmlns" {
                let uri = String::from_utf8_lossy(&raw.value).into_owned();
                self.parser.namespaces.declare(None, &uri);
                self.handler.start_prefix_mapping(None, &uri)?;
                declared.push(None);
                rest.push(raw);
            } else if let Some(prefix) = name.strip_prefix("xmlns:") {
                let uri = String::from_utf8_lossy(&raw.value).into_owned();
                self.parser.namespaces.declare(Some(prefix), &uri);
                self.handler.start_prefix_mapping(Some(prefix), &uri)?;
                declared.push(Some(prefix.to_string()));
                rest.push(raw);
            } else {
                rest.push(raw);
            }
        }
        Ok((rest, declared))
    }

    /// Resolves every remaining attribute's qualified name, expands and
    /// normalizes its value, and rejects external/unparsed entity
    /// references (forbidden in attribute values regardless of
    /// `external_general_entities`).
    fn build_attributes(&mut self, raw_attrs: Vec<RawAttribute>) -> Result<Attributes> {
        let mut attrs = Attributes::new();
        let entities = self.parser.entities.clone();
        let xml_1_1 = self.parser.config.xml_1_1;
        let depth_limit = self.parser.config.entity_depth_limit;
        for raw in raw_attrs {
            let name_text = String::from_utf8_lossy(&raw.name).into_owned();
            let qname = QName::new(name_text);
            let raw_value = self.parser.decoder.decode(&raw.value)?.into_owned();
            let literal_normalized = normalize::normalize_literal_whitespace(&raw_value);

            for part in named_references(&literal_normalized) {
                if predefined_entity(part).is_some() {
                    continue;
                }
                match entities.general(part) {
                    Some(EntitySource::External { ndata: Some(_), .. }) => {
                        return Err(Error::UnparsedEntityReference(part.to_string()))
                    }
                    Some(EntitySource::External { ndata: None, .. }) => {
                        return Err(Error::ExternalEntityInAttribute(part.to_string()))
                    }
                    Some(EntitySource::Internal(_)) | None => {}
                }
            }

            let resolve = |n: &str| match entities.general(n) {
                Some(EntitySource::Internal(text)) => Some(text.clone()),
                _ => None,
            };
            let expanded =
                expand_general_references(&literal_normalized, &resolve, xml_1_1, depth_limit)?;
            let attr_type = AttributeType::Undeclared;
            let value = normalize::collapse_whitespace(&expanded, &attr_type);
            let namespace = if self.parser.config.namespaces {
                self.parser.namespaces.resolve(&qname, true)
            } else {
                ResolveResult::Unbound
            };
            attrs.push(Attribute {
                qname,
                namespace,
                value,
                is_default: false,
                attr_type,
            })?;
        }
        Ok(attrs)
    }

    /// Fills in declared attribute types and injects `#FIXED`/default
    /// values for attributes the start tag omitted, per the DTD's
    /// `<!ATTLIST>` declarations.
    fn apply_dtd_defaults(&mut self, element_name: &QName, attrs: &mut Attributes) {
        let tables = match &self.parser.dtd_tables {
            Some(t) => t.clone(),
            None => return,
        };
        let attlist = match tables.attlists.get(element_name.local_part()) {
            Some(a) => a,
            None => return,
        };
        for attr in attrs.iter_mut() {
            if let Some(def) = attlist.get(attr.qname.as_str()) {
                attr.attr_type = def.attr_type.clone();
                attr.value = normalize::collapse_whitespace(&attr.value, &attr.attr_type);
            }
        }
        for (name, def) in attlist {
            if attrs.by_qname(name).is_some() {
                continue;
            }
            match &def.default {
                AttDefault::Required | AttDefault::Implied => {}
                AttDefault::Fixed(value) | AttDefault::Default(value) => {
                    let _ = attrs.push(Attribute {
                        qname: QName::new(name.clone()),
                        namespace: ResolveResult::Unbound,
                        value: value.clone(),
                        is_default: true,
                        attr_type: def.attr_type.clone(),
                    });
                }
            }
        }
    }

    fn on_end_tag(&mut self, name: Vec<u8>, at: &LocatorSnapshot) -> Result<()> {
        let found = String::from_utf8_lossy(&name).into_owned();
        let frame = match self.parser.stack.last() {
            Some(f) => f,
            None => return self.fatal(Error::MarkupOutsideRoot, at),
        };
        if self.parser.config.check_end_names && frame.name.qname.as_str() != found {
            return self.fatal(
                Error::EndEventMismatch {
                    expected: frame.name.qname.as_str().to_string(),
                    found,
                },
                at,
            );
        }
        self.close_element(at)
    }

    fn close_element(&mut self, at: &LocatorSnapshot) -> Result<()> {
        let frame = self
            .parser
            .stack
            .pop()
            .expect("close_element called with an empty element stack");

        if let Some(validator) = self.parser.xsd_validator.as_mut() {
            validator.end_element(&frame.name, at, self.errors)?;
        }
        if let Some(validator) = self.parser.dtd_validator.as_mut() {
            validator.end_element(&frame.name, at, self.errors)?;
        }

        self.handler.end_element(&frame.name)?;

        for prefix in frame.declared_prefixes.iter().rev() {
            self.handler.end_prefix_mapping(prefix.as_deref())?;
        }
        self.parser.namespaces.pop();

        match self.parser.state {
            State::Content(1) => {
                self.parser.state = State::Epilog;
                self.parser.saw_root_end = true;
            }
            State::Content(depth) => {
                self.parser.state = State::Content(depth - 1);
            }
            _ => unreachable!("close_element only runs while inside the root element"),
        }
        Ok(())
    }

    fn fatal(&mut self, error: Error, at: &LocatorSnapshot) -> Result<()> {
        self.errors.fatal_error(error, at)
    }
}

fn is_namespace_declaration(attr: &Attribute) -> bool {
    let name = attr.qname.as_str();
    name == "xmlns" || name.starts_with("xmlns:")
}

fn decode_char_reference(rest: &str, xml_1_1: bool) -> Result<char> {
    let cp = if let Some(hex) = rest.strip_prefix('x').or_else(|| rest.strip_prefix('X')) {
        u32::from_str_radix(hex, 16)
    } else {
        rest.parse::<u32>()
    }
    .map_err(|_| Error::UnexpectedToken(format!("malformed character reference &#{};", rest)))?;
    if !crate::tokenizer::is_valid_char_reference(cp, xml_1_1) {
        return Err(Error::InvalidCharacterReference(cp));
    }
    char::from_u32(cp).ok_or(Error::InvalidCharacterReference(cp))
}

/// Yields the body of every named (non-numeric) entity reference in
/// `text`, in order. Used only to check attribute values for external or
/// unparsed entity references before expansion, since
/// [`expand_general_references`] has no way to distinguish "undeclared"
/// from "declared but forbidden in this position".
fn named_references(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'&' {
            i += 1;
            continue;
        }
        match text[i..].find(';') {
            Some(rel) => {
                let semi = i + rel;
                let body = &text[i + 1..semi];
                if !body.starts_with('#') {
                    out.push(body);
                }
                i = semi + 1;
            }
            None => break,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{NullEntityResolver, SilentErrorHandler};

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl EventHandler for Recorder {
        fn start_document(&mut self) -> Result<()> {
            self.events.push("start_document".to_string());
            Ok(())
        }
        fn end_document(&mut self) -> Result<()> {
            self.events.push("end_document".to_string());
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
        fn start_prefix_mapping(&mut self, prefix: Option<&str>, uri: &str) -> Result<()> {
            self.events
                .push(format!("start_prefix:{:?}={}", prefix, uri));
            Ok(())
        }
        fn end_prefix_mapping(&mut self, prefix: Option<&str>) -> Result<()> {
            self.events.push(format!("end_prefix:{:?}", prefix));
            Ok(())
        }
    }

    fn run(input: &[u8]) -> Vec<String> {
        let config = Config::default();
        let mut parser = ContentParser::new(config);
        let mut handler = Recorder::default();
        let mut errors = SilentErrorHandler;
        let mut resolver = NullEntityResolver;
        parser
            .receive(input, &mut handler, &mut errors, &mut resolver)
            .unwrap();
        parser
            .close(&mut handler, &mut errors, &mut resolver)
            .unwrap();
        handler.events
    }

    #[test]
    fn minimal_root_emits_balanced_events() {
        let events = run(b"<?xml version='1.0'?><r/>");
        assert_eq!(
            events,
            vec!["start_document", "start:r", "end:r", "end_document"]
        );
    }

    #[test]
    fn namespaced_elements_bracket_prefix_mappings() {
        let events = run(b"<ns:a xmlns:ns='http://x'><ns:b/></ns:a>");
        assert_eq!(
            events,
            vec![
                "start_document",
                "start_prefix:Some(\"ns\")=http://x",
                "start:ns:a",
                "start:ns:b",
                "end:ns:b",
                "end:ns:a",
                "end_prefix:Some(\"ns\")",
                "end_document",
            ]
        );
    }

    #[test]
    fn character_data_is_reported() {
        let events = run(b"<r>hello</r>");
        assert_eq!(
            events,
            vec!["start_document", "start:r", "chars:hello", "end:r", "end_document"]
        );
    }

    #[test]
    fn predefined_entities_expand_in_content() {
        let events = run(b"<r>a &lt; b</r>");
        assert_eq!(
            events,
            vec!["start_document", "start:r", "chars:a < b", "end:r", "end_document"]
        );
    }

    #[test]
    fn internal_general_entity_expands_and_brackets_start_end_entity() {
        let input: &[u8] = b"<!DOCTYPE r [<!ENTITY e \"A&amp;B\">]><r>&e;</r>";
        let config = Config::default();
        let mut parser = ContentParser::new(config);
        let mut handler = Recorder::default();
        let mut errors = SilentErrorHandler;
        let mut resolver = NullEntityResolver;
        parser
            .receive(input, &mut handler, &mut errors, &mut resolver)
            .unwrap();
        parser
            .close(&mut handler, &mut errors, &mut resolver)
            .unwrap();
        assert!(handler.events.contains(&"chars:A&B".to_string()));
    }

    #[test]
    fn mismatched_end_tag_is_fatal() {
        let config = Config::default();
        let mut parser = ContentParser::new(config);
        let mut handler = Recorder::default();
        let mut errors = SilentErrorHandler;
        let mut resolver = NullEntityResolver;
        let err = parser
            .receive(b"<a></b>", &mut handler, &mut errors, &mut resolver)
            .unwrap_err();
        assert_eq!(err.code(), "EndEventMismatch");
    }

    #[test]
    fn missing_root_element_is_an_error_at_close() {
        let config = Config::default();
        let mut parser = ContentParser::new(config);
        let mut handler = Recorder::default();
        let mut errors = SilentErrorHandler;
        let mut resolver = NullEntityResolver;
        let err = parser
            .close(&mut handler, &mut errors, &mut resolver)
            .unwrap_err();
        assert_eq!(err.code(), "MissingRootElement");
    }

    #[test]
    fn chunked_single_byte_feed_matches_whole_document_feed() {
        let input: &[u8] = b"<root a=\"1\">text &amp; more<!-- c --></root>";
        let whole = run(input);

        let config = Config::default();
        let mut parser = ContentParser::new(config);
        let mut handler = Recorder::default();
        let mut errors = SilentErrorHandler;
        let mut resolver = NullEntityResolver;
        for byte in input {
            parser
                .receive(std::slice::from_ref(byte), &mut handler, &mut errors, &mut resolver)
                .unwrap();
        }
        parser
            .close(&mut handler, &mut errors, &mut resolver)
            .unwrap();
        assert_eq!(whole, handler.events);
    }
}
