//! XSD subsystem: schema model (§3, §9), particle-state content-model
//! validator (§4.6), simple-type facet validator (§4.7) and the
//! validating event filter (§4.8).

pub mod builtins;
pub mod content_validator;
pub mod particle;
pub mod schema;
pub mod simple_type;
pub mod validator;

use crate::locator::LocatorSnapshot;

pub use schema::Schema;
pub use validator::XsdValidator;

/// A recoverable XSD validation error, reported through an
/// [`crate::handler::ErrorHandler`] without stopping the event stream,
/// mirroring [`crate::dtd::ValidationError`]'s role for the DTD pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// `XTTE0520`: a child element appeared where no particle in the
    /// parent's content model allows it.
    ElementNotAllowed { parent: String, found: String },
    /// `XTTE0510`: an element's content model was not satisfied when it
    /// closed.
    RequiredContentMissing { element: String },
    /// A simple-type facet rejected a lexical value.
    FacetViolation {
        element: String,
        attribute: Option<String>,
        reason: String,
    },
    /// `xsi:type` named a type not derived from the statically declared
    /// type. Per the documented conformance gap, this is reported but
    /// parsing proceeds using the `xsi:type`-named type regardless.
    TypeNotSubstitutable { element: String, declared: String, used: String },
    /// `xsi:nil="true"` appeared on an element whose declaration is not
    /// `nillable`, or a nilled element carried content.
    NillableViolation { element: String },
    /// An attribute or element of a `ID`-derived type shared a value with
    /// one seen earlier in the document.
    DuplicateId { value: String },
    /// An `IDREF`/`IDREFS`-typed value did not match any declared `ID`.
    UnresolvedIdref { value: String },
    /// An element or attribute had no declaration resolvable from the
    /// schema (root lookup or parent complex type lookup both failed).
    UndeclaredElement { name: String },
    /// An attribute had no declaration in its element's effective
    /// attribute set and no attribute wildcard admitted it.
    UndeclaredAttribute { element: String, attribute: String },
    /// A value could not be converted from its lexical form to the
    /// type's value space at all (distinct from a facet being violated by
    /// an otherwise well-formed value).
    TypeConversionFailed { element: String, reason: String },
}

impl ValidationError {
    /// A stable, machine-readable identifier for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::ElementNotAllowed { .. } => "XTTE0520",
            ValidationError::RequiredContentMissing { .. } => "XTTE0510",
            ValidationError::FacetViolation { .. } => "FacetViolation",
            ValidationError::TypeNotSubstitutable { .. } => "TypeNotSubstitutable",
            ValidationError::NillableViolation { .. } => "NillableViolation",
            ValidationError::DuplicateId { .. } => "DuplicateId",
            ValidationError::UnresolvedIdref { .. } => "UnresolvedIdref",
            ValidationError::UndeclaredElement { .. } => "UndeclaredElement",
            ValidationError::UndeclaredAttribute { .. } => "UndeclaredAttribute",
            ValidationError::TypeConversionFailed { .. } => "TypeConversionFailed",
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::ElementNotAllowed { parent, found } => {
                write!(f, "element `{}`: child `{}` not allowed here", parent, found)
            }
            ValidationError::RequiredContentMissing { element } => {
                write!(f, "element `{}`: required content missing", element)
            }
            ValidationError::FacetViolation { element, attribute, reason } => match attribute {
                Some(attr) => write!(f, "element `{}`: attribute `{}`: {}", element, attr, reason),
                None => write!(f, "element `{}`: {}", element, reason),
            },
            ValidationError::TypeNotSubstitutable { element, declared, used } => write!(
                f,
                "element `{}`: xsi:type `{}` is not derived from declared type `{}`",
                element, used, declared
            ),
            ValidationError::NillableViolation { element } => {
                write!(f, "element `{}`: xsi:nil violation", element)
            }
            ValidationError::DuplicateId { value } => write!(f, "duplicate ID value `{}`", value),
            ValidationError::UnresolvedIdref { value } => {
                write!(f, "IDREF `{}` does not match any declared ID", value)
            }
            ValidationError::UndeclaredElement { name } => {
                write!(f, "element `{}` has no schema declaration", name)
            }
            ValidationError::UndeclaredAttribute { element, attribute } => write!(
                f,
                "element `{}`: attribute `{}` has no schema declaration",
                element, attribute
            ),
            ValidationError::TypeConversionFailed { element, reason } => {
                write!(f, "element `{}`: {}", element, reason)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// A [`ValidationError`] paired with the location it was detected at.
#[derive(Debug, Clone)]
pub struct LocatedValidationError {
    pub error: ValidationError,
    pub at: LocatorSnapshot,
}
