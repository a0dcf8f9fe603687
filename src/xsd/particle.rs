//! Particle and content-model types shared by the schema arena (§3).
//!
//! An XSD complex type's content model is a tree of particles: elements,
//! wildcards, and the three group kinds (`sequence`, `choice`, `all`), each
//! carrying its own `minOccurs`/`maxOccurs`. Particles are stored in
//! [`crate::xsd::schema::Schema::particles`] and referenced by
//! [`ParticleId`] rather than nested directly, so that recursive element
//! declarations (an element whose type refers back to itself) do not
//! require a recursive Rust type.

use crate::xsd::schema::ElementId;

/// `maxOccurs="unbounded"` is represented as `None`.
pub type MaxOccurs = Option<u32>;

/// How a wildcard particle's namespace constraint restricts matching
/// element/attribute names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceConstraint {
    /// `##any`: any namespace, including no namespace.
    Any,
    /// `##other`: any namespace other than the schema's target namespace.
    Other,
    /// An explicit list, which may include the pseudo-values `##local`
    /// (no namespace) and `##targetNamespace`.
    Enumeration(Vec<WildcardNamespace>),
}

/// One entry of an explicit wildcard namespace list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WildcardNamespace {
    /// `##local`: no namespace.
    Local,
    /// `##targetNamespace`: the enclosing schema's target namespace.
    TargetNamespace,
    /// A literal namespace URI.
    Uri(String),
}

impl NamespaceConstraint {
    /// Whether an element/attribute in `uri` (`None` for no namespace)
    /// satisfies this constraint, given the enclosing schema's
    /// `target_namespace`.
    pub fn matches(&self, uri: Option<&str>, target_namespace: Option<&str>) -> bool {
        match self {
            NamespaceConstraint::Any => true,
            NamespaceConstraint::Other => uri != target_namespace,
            NamespaceConstraint::Enumeration(list) => list.iter().any(|entry| match entry {
                WildcardNamespace::Local => uri.is_none(),
                WildcardNamespace::TargetNamespace => uri == target_namespace,
                WildcardNamespace::Uri(u) => uri == Some(u.as_str()),
            }),
        }
    }
}

/// What happens to content a wildcard matches that has no available
/// declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessContents {
    Strict,
    Lax,
    Skip,
}

/// One node of a complex type's content model tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Particle {
    /// A single element occurrence, either a direct declaration or a
    /// reference to a global element.
    Element {
        element: ElementId,
        min_occurs: u32,
        max_occurs: MaxOccurs,
    },
    /// `xs:sequence`: children must appear in declared order.
    Sequence {
        children: Vec<ParticleId>,
        min_occurs: u32,
        max_occurs: MaxOccurs,
    },
    /// `xs:choice`: exactly one child particle matches per occurrence.
    Choice {
        children: Vec<ParticleId>,
        min_occurs: u32,
        max_occurs: MaxOccurs,
    },
    /// `xs:all`: children may appear in any order, each at most once
    /// (`minOccurs`/`maxOccurs` on the children are restricted to 0 or 1 by
    /// the XSD 1.0 grammar; this crate does not enforce that restriction at
    /// parse time, only at matching time).
    All {
        children: Vec<ParticleId>,
        min_occurs: u32,
        max_occurs: MaxOccurs,
    },
    /// `xs:any`: a wildcard matching any element whose namespace satisfies
    /// the constraint.
    Any {
        namespace_constraint: NamespaceConstraint,
        process_contents: ProcessContents,
        min_occurs: u32,
        max_occurs: MaxOccurs,
    },
}

impl Particle {
    pub fn min_occurs(&self) -> u32 {
        match self {
            Particle::Element { min_occurs, .. }
            | Particle::Sequence { min_occurs, .. }
            | Particle::Choice { min_occurs, .. }
            | Particle::All { min_occurs, .. }
            | Particle::Any { min_occurs, .. } => *min_occurs,
        }
    }

    pub fn max_occurs(&self) -> MaxOccurs {
        match self {
            Particle::Element { max_occurs, .. }
            | Particle::Sequence { max_occurs, .. }
            | Particle::Choice { max_occurs, .. }
            | Particle::All { max_occurs, .. }
            | Particle::Any { max_occurs, .. } => *max_occurs,
        }
    }
}

/// Index into [`crate::xsd::schema::Schema::particles`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParticleId(pub usize);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_constraint_other_excludes_target_namespace() {
        let c = NamespaceConstraint::Other;
        assert!(!c.matches(Some("urn:a"), Some("urn:a")));
        assert!(c.matches(Some("urn:b"), Some("urn:a")));
        assert!(c.matches(None, Some("urn:a")));
    }

    #[test]
    fn namespace_constraint_enumeration_checks_pseudo_values() {
        let c = NamespaceConstraint::Enumeration(vec![
            WildcardNamespace::Local,
            WildcardNamespace::Uri("urn:x".into()),
        ]);
        assert!(c.matches(None, Some("urn:a")));
        assert!(c.matches(Some("urn:x"), Some("urn:a")));
        assert!(!c.matches(Some("urn:y"), Some("urn:a")));
    }
}
