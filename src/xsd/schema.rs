//! Arena-based XSD schema model (§3, §9).
//!
//! Types and elements are stored in flat `Vec` arenas and referenced by
//! index rather than nested by value, so that cyclic references (an
//! element whose type contains itself, directly or through a chain of
//! named types) do not require `Rc<RefCell<_>>` or recursive enums. This
//! mirrors the indexed-arena shape used by [`crate::dtd::content_model`]'s
//! `Nfa`, scaled up for a graph that is not guaranteed acyclic at
//! declaration time.

use std::collections::HashMap;

use crate::xsd::particle::{NamespaceConstraint, ParticleId, Particle};
use crate::xsd::simple_type::SimpleType;

/// Index into [`Schema::elements`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(pub usize);

/// Index into [`Schema::types`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(pub usize);

/// An element declaration, either global or local to a complex type.
#[derive(Debug, Clone)]
pub struct ElementDecl {
    pub name: String,
    pub target_namespace: Option<String>,
    pub type_id: Option<TypeId>,
    pub nillable: bool,
    pub is_abstract: bool,
    pub default: Option<String>,
    pub fixed: Option<String>,
    /// The global element this one substitutes for, if declared with
    /// `substitutionGroup`.
    pub substitution_group: Option<ElementId>,
}

/// Whether a complex type's content is empty, text-only, mixed
/// element+text, or element-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Empty,
    Simple,
    Mixed,
    ElementOnly,
}

/// One `xs:attribute` use within a complex type, after inheritance from
/// any base type has been flattened in.
#[derive(Debug, Clone)]
pub struct AttributeUse {
    pub name: String,
    pub target_namespace: Option<String>,
    pub type_id: TypeId,
    pub required: bool,
    pub default: Option<String>,
    pub fixed: Option<String>,
}

/// A complex type: attributes plus either simple content (a base simple
/// type restricted/extended) or a particle tree.
#[derive(Debug, Clone)]
pub struct ComplexType {
    pub name: Option<String>,
    pub base: Option<TypeId>,
    pub content_kind: ContentKind,
    pub particle: Option<ParticleId>,
    pub simple_content_type: Option<TypeId>,
    pub attributes: HashMap<String, AttributeUse>,
    pub attribute_wildcard: Option<NamespaceConstraint>,
    pub is_abstract: bool,
}

/// A named or anonymous XSD type, simple or complex.
#[derive(Debug, Clone)]
pub enum XsdType {
    Simple(SimpleType),
    Complex(ComplexType),
}

impl XsdType {
    pub fn as_simple(&self) -> Option<&SimpleType> {
        match self {
            XsdType::Simple(s) => Some(s),
            XsdType::Complex(_) => None,
        }
    }

    pub fn as_complex(&self) -> Option<&ComplexType> {
        match self {
            XsdType::Complex(c) => Some(c),
            XsdType::Simple(_) => None,
        }
    }
}

/// The arena holding one schema's (or one schema-import closure's)
/// declarations. Built once by `xs:schema` processing and then treated as
/// read-only by [`crate::xsd::validator::XsdValidator`].
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub target_namespace: Option<String>,
    pub element_form_default_qualified: bool,
    pub attribute_form_default_qualified: bool,
    pub elements: Vec<ElementDecl>,
    pub types: Vec<XsdType>,
    pub particles: Vec<Particle>,
    /// Global element declarations, keyed by local name.
    pub global_elements: HashMap<String, ElementId>,
    /// Global named types, keyed by local name.
    pub global_types: HashMap<String, TypeId>,
}

impl Schema {
    pub fn new(target_namespace: Option<String>) -> Self {
        Self {
            target_namespace,
            element_form_default_qualified: false,
            attribute_form_default_qualified: false,
            ..Default::default()
        }
    }

    pub fn push_element(&mut self, decl: ElementDecl) -> ElementId {
        self.elements.push(decl);
        ElementId(self.elements.len() - 1)
    }

    pub fn push_type(&mut self, ty: XsdType) -> TypeId {
        self.types.push(ty);
        TypeId(self.types.len() - 1)
    }

    pub fn push_particle(&mut self, particle: Particle) -> ParticleId {
        self.particles.push(particle);
        ParticleId(self.particles.len() - 1)
    }

    /// Back-fills an element's type after it has been forward-declared
    /// with [`Self::push_element`], allowing cyclic element/type/particle
    /// graphs: reserve the element, build the (possibly self-referential)
    /// type and particle tree, then resolve the element to it.
    pub fn set_element_type(&mut self, id: ElementId, type_id: TypeId) {
        self.elements[id.0].type_id = Some(type_id);
    }

    pub fn element(&self, id: ElementId) -> &ElementDecl {
        &self.elements[id.0]
    }

    pub fn ty(&self, id: TypeId) -> &XsdType {
        &self.types[id.0]
    }

    pub fn particle(&self, id: ParticleId) -> &Particle {
        &self.particles[id.0]
    }

    /// Walks `type_id`'s base-type chain, collecting the attribute uses it
    /// inherits, innermost first so a derived type's own entries overwrite
    /// its base's when both declare the same name.
    pub fn effective_attributes(&self, type_id: TypeId) -> HashMap<String, AttributeUse> {
        let mut chain = Vec::new();
        let mut current = Some(type_id);
        while let Some(id) = current {
            match self.ty(id) {
                XsdType::Complex(c) => {
                    chain.push(c);
                    current = c.base;
                }
                XsdType::Simple(_) => break,
            }
        }
        let mut merged = HashMap::new();
        for complex in chain.into_iter().rev() {
            for (name, use_) in &complex.attributes {
                merged.insert(name.clone(), use_.clone());
            }
        }
        merged
    }

    /// Whether `candidate` is in `base`'s derivation chain (reflexive):
    /// used for `xsi:type` substitutability checks.
    pub fn is_derived_from(&self, candidate: TypeId, base: TypeId) -> bool {
        let mut current = Some(candidate);
        while let Some(id) = current {
            if id == base {
                return true;
            }
            current = match self.ty(id) {
                XsdType::Complex(c) => c.base,
                XsdType::Simple(s) => s.base,
            };
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xsd::simple_type::{SimpleType, Variety};

    #[test]
    fn effective_attributes_merges_base_chain() {
        let mut schema = Schema::new(None);
        let string_ty = schema.push_type(XsdType::Simple(SimpleType::new(Variety::Atomic, None)));
        let base = schema.push_type(XsdType::Complex(ComplexType {
            name: Some("Base".into()),
            base: None,
            content_kind: ContentKind::Empty,
            particle: None,
            simple_content_type: None,
            attributes: {
                let mut m = HashMap::new();
                m.insert(
                    "id".into(),
                    AttributeUse {
                        name: "id".into(),
                        target_namespace: None,
                        type_id: string_ty,
                        required: true,
                        default: None,
                        fixed: None,
                    },
                );
                m
            },
            attribute_wildcard: None,
            is_abstract: false,
        }));
        let derived = schema.push_type(XsdType::Complex(ComplexType {
            name: Some("Derived".into()),
            base: Some(base),
            content_kind: ContentKind::Empty,
            particle: None,
            simple_content_type: None,
            attributes: {
                let mut m = HashMap::new();
                m.insert(
                    "extra".into(),
                    AttributeUse {
                        name: "extra".into(),
                        target_namespace: None,
                        type_id: string_ty,
                        required: false,
                        default: None,
                        fixed: None,
                    },
                );
                m
            },
            attribute_wildcard: None,
            is_abstract: false,
        }));

        let merged = schema.effective_attributes(derived);
        assert_eq!(merged.len(), 2);
        assert!(merged.contains_key("id"));
        assert!(merged.contains_key("extra"));
        assert!(schema.is_derived_from(derived, base));
        assert!(!schema.is_derived_from(base, derived));
    }
}
