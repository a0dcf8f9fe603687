//! Error and result types shared by every stage of the pipeline.

use std::fmt;
use std::io;
use std::str::Utf8Error;

use crate::locator::LocatorSnapshot;

/// A specialized [`Result`] type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Well-formedness and I/O errors that halt parsing.
///
/// These are distinct from [`crate::dtd::ValidationError`] and
/// [`crate::xsd::ValidationError`]: a well-formedness error means the byte
/// stream is no longer valid XML and the tokenizer cannot continue, while a
/// validation error is reported through an [`crate::handler::ErrorHandler`]
/// and parsing continues.
#[derive(Debug)]
pub enum Error {
    /// An I/O error occurred while an [`crate::handler::EntityResolver`] was
    /// reading an external resource.
    Io(io::Error),
    /// Input was not valid UTF-8 and the `encoding` feature is disabled (or
    /// could not find a matching decoder for the declared encoding).
    NonDecodable(Option<Utf8Error>),
    /// Unexpected end of input inside a construct that had not yet been
    /// closed (tag, comment, CDATA section, processing instruction, ...).
    UnexpectedEof(&'static str),
    /// A byte sequence did not match anything the tokenizer's grammar
    /// allows at the current position.
    UnexpectedToken(String),
    /// `<!` was followed by something other than `--`, `[CDATA[` or `DOCTYPE`.
    UnexpectedBang(u8),
    /// A start tag's name did not match its matching end tag's name and
    /// [`crate::config::Config::check_end_names`] is enabled.
    EndEventMismatch {
        /// Name of the open element.
        expected: String,
        /// Name found in the closing tag.
        found: String,
    },
    /// A `<!--` comment contained `--` and
    /// [`crate::config::Config::check_comments`] is enabled.
    MalformedComment,
    /// An attribute name appeared more than once on the same start tag.
    DuplicateAttribute(String),
    /// A reference to an undeclared general entity appeared in content or
    /// an attribute value, and no [`crate::handler::EntityResolver`]
    /// resolved it.
    UnresolvedEntity(String),
    /// A reference to an undeclared parameter entity appeared in the DTD.
    UnresolvedParameterEntity(String),
    /// Entity expansion recursed into itself.
    RecursiveEntity(String),
    /// Entity expansion exceeded [`crate::config::Config::entity_depth_limit`].
    EntityDepthExceeded,
    /// An external parsed general entity was referenced from an attribute
    /// value, which the XML specification forbids.
    ExternalEntityInAttribute(String),
    /// An unparsed (`NDATA`) general entity was referenced from an
    /// attribute value or expanded as character content; both are
    /// forbidden, the former always, the latter because unparsed entities
    /// have no replacement text to expand.
    UnparsedEntityReference(String),
    /// A `<?xml ... ?>` declaration appeared somewhere other than the very
    /// first token of the document.
    XmlDeclNotAtStart,
    /// A construct appeared outside the single root element (other than
    /// whitespace, comments, and processing instructions).
    MarkupOutsideRoot,
    /// A character reference did not resolve to a valid XML character.
    InvalidCharacterReference(u32),
    /// The internal or external DTD subset contained a syntax error.
    MalformedDtd(String),
    /// The document declared two root elements, or content appeared outside
    /// the single root element.
    MultipleRootElements,
    /// No root element was found before input was closed.
    MissingRootElement,
    /// A namespace prefix was used without ever being bound.
    UnboundPrefix(String),
    /// The combination of configuration flags requested is contradictory.
    InvalidConfig(&'static str),
    /// A recoverable DTD validation error, carried through this type only
    /// so [`crate::handler::ErrorHandler::error`] has a single error type
    /// to accept; unlike every other variant, parsing continues after this
    /// one is reported (see [`crate::dtd::ValidationError`]).
    DtdValidation(crate::dtd::ValidationError),
    /// A recoverable XSD validation error, carried the same way as
    /// [`Error::DtdValidation`] (see [`crate::xsd::ValidationError`]).
    XsdValidation(crate::xsd::ValidationError),
}

impl Error {
    /// A stable, machine-readable identifier for this error kind, suitable
    /// for attaching to diagnostics or matching in tests.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Io(_) => "Io",
            Error::NonDecodable(_) => "NonDecodable",
            Error::UnexpectedEof(_) => "UnexpectedEof",
            Error::UnexpectedToken(_) => "UnexpectedToken",
            Error::UnexpectedBang(_) => "UnexpectedBang",
            Error::EndEventMismatch { .. } => "EndEventMismatch",
            Error::MalformedComment => "MalformedComment",
            Error::DuplicateAttribute(_) => "DuplicateAttribute",
            Error::UnresolvedEntity(_) => "UnresolvedEntity",
            Error::UnresolvedParameterEntity(_) => "UnresolvedParameterEntity",
            Error::RecursiveEntity(_) => "RecursiveEntity",
            Error::EntityDepthExceeded => "EntityDepthExceeded",
            Error::ExternalEntityInAttribute(_) => "ExternalEntityInAttribute",
            Error::UnparsedEntityReference(_) => "UnparsedEntityReference",
            Error::XmlDeclNotAtStart => "XmlDeclNotAtStart",
            Error::MarkupOutsideRoot => "MarkupOutsideRoot",
            Error::InvalidCharacterReference(_) => "InvalidCharacterReference",
            Error::MalformedDtd(_) => "MalformedDtd",
            Error::MultipleRootElements => "MultipleRootElements",
            Error::MissingRootElement => "MissingRootElement",
            Error::UnboundPrefix(_) => "UnboundPrefix",
            Error::InvalidConfig(_) => "InvalidConfig",
            Error::DtdValidation(e) => e.code(),
            Error::XsdValidation(e) => e.code(),
        }
    }

    /// Whether this error represents a recoverable validation failure
    /// rather than a well-formedness or I/O failure. Recoverable errors do
    /// not, by themselves, stop parsing; [`crate::handler::ErrorHandler`]
    /// decides whether to treat them as fatal by returning `Err` from its
    /// `error` callback.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::DtdValidation(_) | Error::XsdValidation(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::NonDecodable(Some(e)) => write!(f, "input is not valid UTF-8: {}", e),
            Error::NonDecodable(None) => write!(f, "input could not be decoded"),
            Error::UnexpectedEof(what) => write!(f, "unexpected end of input inside {}", what),
            Error::UnexpectedToken(s) => write!(f, "unexpected token: {}", s),
            Error::UnexpectedBang(b) => write!(f, "unexpected character after <!: {:#04x}", b),
            Error::EndEventMismatch { expected, found } => {
                write!(f, "expected `</{}>`, found `</{}>`", expected, found)
            }
            Error::MalformedComment => write!(f, "comment must not contain `--`"),
            Error::DuplicateAttribute(name) => write!(f, "duplicate attribute `{}`", name),
            Error::UnresolvedEntity(name) => write!(f, "undeclared entity `&{};`", name),
            Error::UnresolvedParameterEntity(name) => {
                write!(f, "undeclared parameter entity `%{};`", name)
            }
            Error::RecursiveEntity(name) => write!(f, "entity `{}` references itself", name),
            Error::EntityDepthExceeded => write!(f, "entity expansion depth limit exceeded"),
            Error::ExternalEntityInAttribute(name) => {
                write!(f, "external entity `&{};` may not be referenced from an attribute value", name)
            }
            Error::UnparsedEntityReference(name) => {
                write!(f, "unparsed entity `&{};` has no replacement text to expand", name)
            }
            Error::XmlDeclNotAtStart => write!(f, "`<?xml ... ?>` declaration must be the first thing in the document"),
            Error::MarkupOutsideRoot => write!(f, "non-whitespace content is not allowed outside the root element"),
            Error::InvalidCharacterReference(cp) => {
                write!(f, "character reference U+{:04X} is not a valid XML character", cp)
            }
            Error::MalformedDtd(s) => write!(f, "malformed DTD: {}", s),
            Error::MultipleRootElements => write!(f, "document has more than one root element"),
            Error::MissingRootElement => write!(f, "document has no root element"),
            Error::UnboundPrefix(p) => write!(f, "namespace prefix `{}` is not bound", p),
            Error::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            Error::DtdValidation(e) => write!(f, "{}", e),
            Error::XsdValidation(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

/// An [`Error`] together with the location at which it was detected.
#[derive(Debug)]
pub struct LocatedError {
    /// The underlying error.
    pub error: Error,
    /// Where in the document the error was detected.
    pub at: LocatorSnapshot,
}

impl fmt::Display for LocatedError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} at {}", self.error, self.at)
    }
}

impl std::error::Error for LocatedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
