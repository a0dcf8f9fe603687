//! `xmlbreak` is a streaming, push-based XML 1.0/1.1 parser. Byte buffers of
//! any size arrive through [`reader::XmlPushParser::receive`]; the parser
//! never blocks and never needs the whole document in memory, emitting
//! ordered semantic events to a [`handler::EventHandler`] as they become
//! available.
//!
//! Layered on top of the streaming core are two optional validation
//! pipelines that observe the same event stream without interrupting it:
//!
//! - a [`dtd`] validator (element content models, attribute types, the
//!   `ID`/`IDREF` graph), driven from `<!DOCTYPE>` declarations the parser
//!   finds inline;
//! - an [`xsd`] validator (schema-driven type and content-model validation,
//!   with post-schema-validation typed values), driven from a
//!   [`xsd::schema::Schema`] attached with
//!   [`reader::XmlPushParser::set_schema`].
//!
//! # Quick start
//!
//! ```
//! use xmlbreak::errors::Result;
//! use xmlbreak::handler::{EventHandler, NullEntityResolver, SilentErrorHandler};
//! use xmlbreak::reader::XmlPushParser;
//!
//! #[derive(Default)]
//! struct Counter(u32);
//!
//! impl EventHandler for Counter {
//!     fn start_element(&mut self, _name: &xmlbreak::name::ResolvedName, _attrs: &xmlbreak::attributes::Attributes) -> Result<()> {
//!         self.0 += 1;
//!         Ok(())
//!     }
//! }
//!
//! let mut parser = XmlPushParser::new();
//! let mut handler = Counter::default();
//! let mut errors = SilentErrorHandler;
//! let mut resolver = NullEntityResolver;
//! parser.parse_all(b"<a><b/><c/></a>", &mut handler, &mut errors, &mut resolver)?;
//! assert_eq!(handler.0, 3);
//! # Ok::<(), xmlbreak::errors::Error>(())
//! ```
//!
//! # What this crate does not do
//!
//! Out of scope, per its specification: the higher-level `Parser` facade
//! some XML toolkits expose (stringly-typed feature/property URIs, URL
//! fetching), an XML serializer, XPath/XSLT, and byte-to-character
//! transcoding beyond the thin [`decoder`] seam (UTF-8 always works; other
//! encodings require the `encoding` feature). Thread-safe concurrent
//! parsing of a single document is also not supported — one
//! [`reader::XmlPushParser`] parses exactly one document, on one thread.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_inception)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(
    feature = "document-features",
    cfg_attr(doc, doc = ::document_features::document_features!())
)]

pub mod attributes;
pub mod config;
pub mod decoder;
pub mod dtd;
pub mod errors;
pub mod handler;
pub mod locator;
pub mod name;
pub mod namespace;
pub mod parser;
pub mod reader;
pub mod tokenizer;
pub mod xsd;

pub use config::{Config, ConfigBuilder};
pub use errors::{Error, Result};
pub use reader::{XmlPushParser, XmlPushParserBuilder};
