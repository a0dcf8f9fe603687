//! DTD subsystem: declaration parsing (§4.4) and validation (§4.5).

pub mod content_model;
pub mod decl;
pub mod validator;

use crate::locator::LocatorSnapshot;

pub use decl::{AttDef, AttDefault, DoctypeHeader, DtdTables, ExternalId, NotationDecl};
pub use validator::DtdValidator;

/// A recoverable DTD validation error, reported through an
/// [`crate::handler::ErrorHandler`] without stopping the event stream, per
/// `spec.md` §7's "DTD validation (recoverable)" taxonomy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A child element appeared where the content model did not allow it.
    ContentModelViolation {
        /// The element whose content model was violated.
        element: String,
        /// The child name (or character data) encountered.
        found: String,
        /// Element names that would have been accepted instead.
        expected: Vec<String>,
    },
    /// An element's content model was not fully satisfied when it closed.
    IncompleteContent {
        /// The element whose content model was left unsatisfied.
        element: String,
        /// Element names still needed to complete the model.
        expected: Vec<String>,
    },
    /// A required attribute (`#REQUIRED`) was missing.
    MissingRequiredAttribute {
        /// The element missing the attribute.
        element: String,
        /// The attribute's name.
        attribute: String,
    },
    /// A `#FIXED` attribute's value did not match its declared fixed value.
    FixedValueMismatch {
        /// The element carrying the attribute.
        element: String,
        /// The attribute's name.
        attribute: String,
        /// The fixed value the DTD declares.
        expected: String,
        /// The value actually present.
        found: String,
    },
    /// An attribute's lexical form did not satisfy its declared type.
    AttributeTypeMismatch {
        /// The element carrying the attribute.
        element: String,
        /// The attribute's name.
        attribute: String,
        /// A human-readable description of the violation.
        reason: String,
    },
    /// Two attributes of type `ID` anywhere in the document shared a value.
    DuplicateId {
        /// The duplicated `ID` value.
        value: String,
    },
    /// An `IDREF`/`IDREFS` value did not match any declared `ID`.
    UnresolvedIdref {
        /// The dangling reference value.
        value: String,
    },
    /// A child element name had no `<!ELEMENT>` declaration.
    UndeclaredElement {
        /// The undeclared element's name.
        name: String,
    },
    /// A `NOTATION`-typed attribute named a notation with no
    /// `<!NOTATION>` declaration.
    UndeclaredNotation {
        /// The undeclared notation's name.
        name: String,
    },
}

impl ValidationError {
    /// A stable, machine-readable identifier for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::ContentModelViolation { .. } => "ContentModelViolation",
            ValidationError::IncompleteContent { .. } => "IncompleteContent",
            ValidationError::MissingRequiredAttribute { .. } => "MissingRequiredAttribute",
            ValidationError::FixedValueMismatch { .. } => "FixedValueMismatch",
            ValidationError::AttributeTypeMismatch { .. } => "AttributeTypeMismatch",
            ValidationError::DuplicateId { .. } => "DuplicateId",
            ValidationError::UnresolvedIdref { .. } => "UnresolvedIdref",
            ValidationError::UndeclaredElement { .. } => "UndeclaredElement",
            ValidationError::UndeclaredNotation { .. } => "UndeclaredNotation",
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::ContentModelViolation { element, found, expected } => write!(
                f,
                "element `{}`: unexpected child `{}` (expected one of {:?})",
                element, found, expected
            ),
            ValidationError::IncompleteContent { element, expected } => write!(
                f,
                "element `{}`: content model incomplete, still expects {:?}",
                element, expected
            ),
            ValidationError::MissingRequiredAttribute { element, attribute } => {
                write!(f, "element `{}`: missing required attribute `{}`", element, attribute)
            }
            ValidationError::FixedValueMismatch { element, attribute, expected, found } => write!(
                f,
                "element `{}`: attribute `{}` must be fixed to `{}`, found `{}`",
                element, attribute, expected, found
            ),
            ValidationError::AttributeTypeMismatch { element, attribute, reason } => write!(
                f,
                "element `{}`: attribute `{}` is invalid: {}",
                element, attribute, reason
            ),
            ValidationError::DuplicateId { value } => write!(f, "duplicate ID value `{}`", value),
            ValidationError::UnresolvedIdref { value } => {
                write!(f, "IDREF `{}` does not match any declared ID", value)
            }
            ValidationError::UndeclaredElement { name } => {
                write!(f, "element `{}` has no `<!ELEMENT>` declaration", name)
            }
            ValidationError::UndeclaredNotation { name } => {
                write!(f, "notation `{}` has no `<!NOTATION>` declaration", name)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// A [`ValidationError`] paired with the location it was detected at, the
/// shape [`crate::handler::ErrorHandler::error`] receives.
#[derive(Debug, Clone)]
pub struct LocatedValidationError {
    /// The underlying validation error.
    pub error: ValidationError,
    /// Where in the document it was detected.
    pub at: LocatorSnapshot,
}
