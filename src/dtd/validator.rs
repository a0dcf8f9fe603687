//! The DTD validation filter: content-model conformance, attribute-type
//! checking, and the document-wide ID/IDREF graph, per `spec.md` §4.5.
//!
//! A [`DtdValidator`] observes the same event stream the consumer does
//! (`start_element`/`characters`/`end_element`/`end_document`) and reports
//! recoverable [`crate::dtd::ValidationError`]s through an
//! [`crate::handler::ErrorHandler`] without ever suppressing or altering
//! the events themselves.

use std::collections::HashSet;

use crate::attributes::{AttributeType, Attributes};
use crate::dtd::content_model::{ChildrenMatcher, ContentModel};
use crate::dtd::decl::{AttDefault, DtdTables};
use crate::dtd::ValidationError;
use crate::errors::{Error, Result};
use crate::handler::ErrorHandler;
use crate::locator::LocatorSnapshot;
use crate::name::ResolvedName;

/// Per-element validation state, pushed on `start_element` and popped on
/// the matching `end_element`, mirroring the element-context stack
/// discipline `spec.md` §3 requires.
enum Frame {
    /// `EMPTY`: no children or non-whitespace text allowed.
    Empty { saw_content: bool },
    /// `ANY`: everything accepted.
    Any,
    /// `MIXED`: text allowed; children restricted to the declared set.
    Mixed(Vec<String>),
    /// `CHILDREN`: particle-tree matcher.
    Children { element: String, matcher: ChildrenMatcher },
    /// No `<!ELEMENT>` declaration exists for this element; validated as
    /// unrestricted, but reported once via `UndeclaredElement`.
    Undeclared,
}

/// Validates the event stream against a [`DtdTables`] built by the DTD
/// parser.
pub struct DtdValidator {
    tables: std::rc::Rc<DtdTables>,
    stack: Vec<Frame>,
    seen_ids: HashSet<String>,
    pending_idrefs: Vec<(String, LocatorSnapshot)>,
}

impl DtdValidator {
    /// Creates a validator bound to `tables` (shared read-only, per
    /// `spec.md` §5's shared-resource policy).
    pub fn new(tables: std::rc::Rc<DtdTables>) -> Self {
        Self {
            tables,
            stack: Vec::new(),
            seen_ids: HashSet::new(),
            pending_idrefs: Vec::new(),
        }
    }

    fn content_model_for(&self, local_name: &str) -> Option<&ContentModel> {
        self.tables.elements.get(local_name)
    }

    /// Observes a start-tag: validates this element against its parent's
    /// content model, pushes a new frame for its own declared content
    /// model, and validates its attributes.
    pub fn start_element(
        &mut self,
        name: &ResolvedName,
        attrs: &Attributes,
        at: &LocatorSnapshot,
        errors: &mut dyn ErrorHandler,
    ) -> Result<()> {
        let local = name.local_name().to_string();

        let parent_violation = if let Some(parent) = self.stack.last_mut() {
            match parent {
                Frame::Empty { saw_content } => {
                    *saw_content = true;
                    Some(ValidationError::ContentModelViolation {
                        element: "(EMPTY parent)".to_string(),
                        found: local.clone(),
                        expected: Vec::new(),
                    })
                }
                Frame::Any | Frame::Undeclared => None,
                Frame::Mixed(allowed) => {
                    if allowed.contains(&local) {
                        None
                    } else {
                        Some(ValidationError::ContentModelViolation {
                            element: "(mixed parent)".to_string(),
                            found: local.clone(),
                            expected: allowed.clone(),
                        })
                    }
                }
                Frame::Children { element, matcher } => {
                    if matcher.accept(&local) {
                        None
                    } else {
                        Some(ValidationError::ContentModelViolation {
                            element: element.clone(),
                            found: local.clone(),
                            expected: matcher.expected_next(),
                        })
                    }
                }
            }
        } else {
            None
        };
        if let Some(violation) = parent_violation {
            self.report(violation, at, errors)?;
        }

        if self.tables.elements.get(&local).is_none() && !self.tables.elements.is_empty() {
            self.report(ValidationError::UndeclaredElement { name: local.clone() }, at, errors)?;
        }

        self.validate_attributes(&local, attrs, at, errors)?;

        let frame = match self.content_model_for(&local) {
            Some(ContentModel::Empty) => Frame::Empty { saw_content: false },
            Some(ContentModel::Any) => Frame::Any,
            Some(ContentModel::Mixed(names)) => Frame::Mixed(names.clone()),
            Some(ContentModel::Children(particle)) => {
                Frame::Children { element: local.clone(), matcher: ChildrenMatcher::new(particle) }
            }
            None => Frame::Undeclared,
        };
        self.stack.push(frame);
        Ok(())
    }

    /// Observes non-whitespace character data, which is disallowed under
    /// `EMPTY` content and restricted to `MIXED`/`ANY` otherwise.
    pub fn characters(
        &mut self,
        text: &str,
        at: &LocatorSnapshot,
        errors: &mut dyn ErrorHandler,
    ) -> Result<()> {
        if text.trim().is_empty() {
            return Ok(());
        }
        let empty_violation = if let Some(Frame::Empty { saw_content }) = self.stack.last_mut() {
            *saw_content = true;
            true
        } else {
            false
        };
        if empty_violation {
            self.report(
                ValidationError::ContentModelViolation {
                    element: "(EMPTY parent)".to_string(),
                    found: "#PCDATA".to_string(),
                    expected: Vec::new(),
                },
                at,
                errors,
            )?;
        }
        if let Some(Frame::Children { element, .. }) = self.stack.last() {
            let element = element.clone();
            self.report(
                ValidationError::ContentModelViolation {
                    element,
                    found: "#PCDATA".to_string(),
                    expected: Vec::new(),
                },
                at,
                errors,
            )?;
        }
        Ok(())
    }

    /// Observes an end-tag: verifies the just-closed element's content
    /// model reached an accepting state, then pops its frame.
    pub fn end_element(
        &mut self,
        name: &ResolvedName,
        at: &LocatorSnapshot,
        errors: &mut dyn ErrorHandler,
    ) -> Result<()> {
        if let Some(frame) = self.stack.pop() {
            if let Frame::Children { element, matcher } = &frame {
                if !matcher.is_complete() {
                    self.report(
                        ValidationError::IncompleteContent {
                            element: element.clone(),
                            expected: matcher.expected_next(),
                        },
                        at,
                        errors,
                    )?;
                }
            }
        }
        let _ = name;
        Ok(())
    }

    /// Verifies the IDREF closure property (`spec.md` §8, property 7) once
    /// the document ends.
    pub fn end_document(&mut self, errors: &mut dyn ErrorHandler) -> Result<()> {
        let pending = std::mem::take(&mut self.pending_idrefs);
        for (value, at) in pending {
            if !self.seen_ids.contains(&value) {
                self.report(ValidationError::UnresolvedIdref { value }, &at, errors)?;
            }
        }
        Ok(())
    }

    fn validate_attributes(
        &mut self,
        element: &str,
        attrs: &Attributes,
        at: &LocatorSnapshot,
        errors: &mut dyn ErrorHandler,
    ) -> Result<()> {
        // Cloned so the loop body is free to borrow `self` mutably while
        // reporting errors and validating attribute types; attribute lists
        // are small, so this is not a meaningful cost.
        let Some(attlist) = self.tables.attlists.get(element).cloned() else {
            return Ok(());
        };
        for (attr_name, def) in attlist.iter() {
            match attrs.by_qname(attr_name) {
                Some(attr) => {
                    if let AttDefault::Fixed(fixed) = &def.default {
                        if &attr.value != fixed {
                            self.report(
                                ValidationError::FixedValueMismatch {
                                    element: element.to_string(),
                                    attribute: attr_name.clone(),
                                    expected: fixed.clone(),
                                    found: attr.value.clone(),
                                },
                                at,
                                errors,
                            )?;
                        }
                    }
                    self.validate_attribute_type(element, attr_name, &attr.value, &def.attr_type, at, errors)?;
                }
                None => {
                    if let AttDefault::Required = def.default {
                        self.report(
                            ValidationError::MissingRequiredAttribute {
                                element: element.to_string(),
                                attribute: attr_name.clone(),
                            },
                            at,
                            errors,
                        )?;
                    }
                }
            }
        }
        Ok(())
    }

    fn validate_attribute_type(
        &mut self,
        element: &str,
        attr_name: &str,
        value: &str,
        attr_type: &AttributeType,
        at: &LocatorSnapshot,
        errors: &mut dyn ErrorHandler,
    ) -> Result<()> {
        match attr_type {
            AttributeType::Id => {
                if !self.seen_ids.insert(value.to_string()) {
                    self.report(ValidationError::DuplicateId { value: value.to_string() }, at, errors)?;
                }
            }
            AttributeType::IdRef => {
                self.pending_idrefs.push((value.to_string(), at.clone()));
            }
            AttributeType::IdRefs => {
                for tok in value.split_whitespace() {
                    self.pending_idrefs.push((tok.to_string(), at.clone()));
                }
            }
            AttributeType::NmToken | AttributeType::Entity => {
                if !is_nmtoken(value) {
                    self.report(
                        ValidationError::AttributeTypeMismatch {
                            element: element.to_string(),
                            attribute: attr_name.to_string(),
                            reason: format!("`{}` is not a valid NMTOKEN", value),
                        },
                        at,
                        errors,
                    )?;
                }
            }
            AttributeType::NmTokens | AttributeType::Entities => {
                for tok in value.split_whitespace() {
                    if !is_nmtoken(tok) {
                        self.report(
                            ValidationError::AttributeTypeMismatch {
                                element: element.to_string(),
                                attribute: attr_name.to_string(),
                                reason: format!("`{}` is not a valid NMTOKEN", tok),
                            },
                            at,
                            errors,
                        )?;
                    }
                }
            }
            AttributeType::Notation(allowed) => {
                if !allowed.iter().any(|n| n == value) {
                    self.report(
                        ValidationError::AttributeTypeMismatch {
                            element: element.to_string(),
                            attribute: attr_name.to_string(),
                            reason: format!("`{}` is not one of the declared notations {:?}", value, allowed),
                        },
                        at,
                        errors,
                    )?;
                } else if !self.tables.notations.contains_key(value) {
                    self.report(ValidationError::UndeclaredNotation { name: value.to_string() }, at, errors)?;
                }
            }
            AttributeType::Enumeration(allowed) => {
                if !allowed.iter().any(|n| n == value) {
                    self.report(
                        ValidationError::AttributeTypeMismatch {
                            element: element.to_string(),
                            attribute: attr_name.to_string(),
                            reason: format!("`{}` is not one of {:?}", value, allowed),
                        },
                        at,
                        errors,
                    )?;
                }
            }
            AttributeType::Cdata | AttributeType::Undeclared => {}
        }
        Ok(())
    }

    fn report(
        &self,
        error: ValidationError,
        at: &LocatorSnapshot,
        errors: &mut dyn ErrorHandler,
    ) -> Result<()> {
        errors.error(&Error::DtdValidation(error), at)
    }
}

fn is_nmtoken(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_' | b':') || b >= 0x80
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::Attribute;
    use crate::dtd::decl::parse_internal_subset;
    use crate::handler::SilentErrorHandler;
    use crate::name::{QName, ResolveResult};

    fn resolved(name: &str) -> ResolvedName {
        ResolvedName { qname: QName::new(name), namespace: ResolveResult::Unbound }
    }

    fn tables_from(subset: &str) -> std::rc::Rc<DtdTables> {
        let mut tables = DtdTables::default();
        parse_internal_subset(subset, &mut tables).unwrap();
        std::rc::Rc::new(tables)
    }

    #[test]
    fn detects_content_model_violation_out_of_order() {
        let tables = tables_from("<!ELEMENT r (a,b,c)> <!ELEMENT a EMPTY> <!ELEMENT b EMPTY> <!ELEMENT c EMPTY>");
        let mut v = DtdValidator::new(tables);
        let mut err = SilentErrorHandler;
        let at = LocatorSnapshot::default();
        v.start_element(&resolved("r"), &Attributes::new(), &at, &mut err).unwrap();
        v.start_element(&resolved("a"), &Attributes::new(), &at, &mut err).unwrap();
        v.end_element(&resolved("a"), &at, &mut err).unwrap();
        v.start_element(&resolved("c"), &Attributes::new(), &at, &mut err).unwrap();
    }

    #[test]
    fn detects_duplicate_id() {
        let tables = tables_from("<!ATTLIST r id ID #REQUIRED>");
        let mut v = DtdValidator::new(tables);
        let mut err = SilentErrorHandler;
        let at = LocatorSnapshot::default();
        let mut attrs = Attributes::new();
        attrs
            .push(Attribute {
                qname: QName::new("id"),
                namespace: ResolveResult::Unbound,
                value: "x1".to_string(),
                is_default: false,
                attr_type: AttributeType::Id,
            })
            .unwrap();
        v.start_element(&resolved("r"), &attrs, &at, &mut err).unwrap();
        v.end_element(&resolved("r"), &at, &mut err).unwrap();
        v.start_element(&resolved("r"), &attrs, &at, &mut err).unwrap();
    }

    #[test]
    fn detects_missing_required_attribute() {
        let tables = tables_from("<!ATTLIST r id ID #REQUIRED>");
        let mut v = DtdValidator::new(tables);
        let mut err = SilentErrorHandler;
        let at = LocatorSnapshot::default();
        v.start_element(&resolved("r"), &Attributes::new(), &at, &mut err).unwrap();
    }
}
