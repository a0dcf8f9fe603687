//! Particle-state content-model validator (§4.6).
//!
//! Matching is greedy, left-to-right, single-pass: XSD 1.0's Unique
//! Particle Attribution rule guarantees that, in a valid schema, at most
//! one particle can ever accept a given element at a given position, so
//! the first accepting particle is unambiguously *the* match and no
//! backtracking is required. [`Cursor`] mirrors the shape of the
//! [`Particle`] tree it walks, carrying the mutable matching state
//! (child index, occurrence counts, `all`-group membership) at each
//! node, the same "state shaped like the grammar it matches" idea as
//! [`crate::dtd::content_model::ChildrenMatcher`]'s position sets.

use crate::xsd::particle::{Particle, ParticleId};
use crate::xsd::schema::Schema;

/// Mirrors one [`Particle`] node's shape, holding the mutable progress of
/// matching against it.
enum Cursor {
    Element { occurrence: u32 },
    Any { occurrence: u32 },
    Seq { children: Vec<Cursor>, index: usize, occurrence: u32 },
    Choice { children: Vec<Cursor>, occurrence: u32 },
    All { children: Vec<Cursor>, seen: Vec<u32> },
}

impl Cursor {
    fn new(schema: &Schema, particle: ParticleId) -> Self {
        match schema.particle(particle) {
            Particle::Element { .. } => Cursor::Element { occurrence: 0 },
            Particle::Any { .. } => Cursor::Any { occurrence: 0 },
            Particle::Sequence { children, .. } => Cursor::Seq {
                children: children.iter().map(|c| Cursor::new(schema, *c)).collect(),
                index: 0,
                occurrence: 0,
            },
            Particle::Choice { children, .. } => Cursor::Choice {
                children: children.iter().map(|c| Cursor::new(schema, *c)).collect(),
                occurrence: 0,
            },
            Particle::All { children, .. } => Cursor::All {
                children: children.iter().map(|c| Cursor::new(schema, *c)).collect(),
                seen: vec![0; children.len()],
            },
        }
    }
}

/// Whether a cursor's current occurrence count already satisfies its
/// particle's declared `minOccurs`.
fn min_satisfied(particle: &Particle, occurrence: u32) -> bool {
    occurrence >= particle.min_occurs()
}

fn max_allows_more(particle: &Particle, occurrence: u32) -> bool {
    particle.max_occurs().map_or(true, |max| occurrence < max)
}

/// Attempts to consume one element occurrence (`uri`, `local`) starting
/// at `cursor`/`particle_id`. Returns whether it was consumed; on `false`
/// the cursor is left unchanged (or, for group cursors, reset to its
/// state before this attempt) so the caller may try the next sibling.
fn try_accept(
    schema: &Schema,
    particle_id: ParticleId,
    cursor: &mut Cursor,
    uri: Option<&str>,
    local: &str,
) -> bool {
    let particle = schema.particle(particle_id);
    match (particle, cursor) {
        (Particle::Element { element, .. }, Cursor::Element { occurrence }) => {
            let decl = schema.element(*element);
            let name_matches = decl.name == local && decl.target_namespace.as_deref() == uri;
            if name_matches && max_allows_more(particle, *occurrence) {
                *occurrence += 1;
                true
            } else {
                false
            }
        }
        (Particle::Any { namespace_constraint, .. }, Cursor::Any { occurrence }) => {
            if namespace_constraint.matches(uri, schema.target_namespace.as_deref())
                && max_allows_more(particle, *occurrence)
            {
                *occurrence += 1;
                true
            } else {
                false
            }
        }
        (Particle::Sequence { children, .. }, Cursor::Seq { children: child_cursors, index, occurrence }) => {
            loop {
                if *index >= children.len() {
                    if max_allows_more(particle, *occurrence) {
                        *index = 0;
                        *occurrence += 1;
                        for (slot, child_id) in child_cursors.iter_mut().zip(children.iter()) {
                            *slot = Cursor::new(schema, *child_id);
                        }
                        continue;
                    }
                    return false;
                }
                let child_id = children[*index];
                if try_accept(schema, child_id, &mut child_cursors[*index], uri, local) {
                    return true;
                }
                let child_particle = schema.particle(child_id);
                let child_occurrence = occurrence_of(&child_cursors[*index]);
                if min_satisfied(child_particle, child_occurrence) {
                    *index += 1;
                    continue;
                }
                return false;
            }
        }
        (Particle::Choice { children, .. }, Cursor::Choice { children: child_cursors, occurrence }) => {
            for (child_id, child_cursor) in children.iter().zip(child_cursors.iter_mut()) {
                if try_accept(schema, *child_id, child_cursor, uri, local) {
                    return true;
                }
            }
            if max_allows_more(particle, *occurrence) {
                for (slot, child_id) in child_cursors.iter_mut().zip(children.iter()) {
                    *slot = Cursor::new(schema, *child_id);
                }
                *occurrence += 1;
                for (child_id, child_cursor) in children.iter().zip(child_cursors.iter_mut()) {
                    if try_accept(schema, *child_id, child_cursor, uri, local) {
                        return true;
                    }
                }
            }
            false
        }
        (Particle::All { children, .. }, Cursor::All { children: child_cursors, seen }) => {
            for (idx, (child_id, child_cursor)) in children.iter().zip(child_cursors.iter_mut()).enumerate() {
                let child_particle = schema.particle(*child_id);
                if seen[idx] > 0 && !max_allows_more(child_particle, seen[idx]) {
                    continue;
                }
                if try_accept(schema, *child_id, child_cursor, uri, local) {
                    seen[idx] += 1;
                    return true;
                }
            }
            false
        }
        _ => unreachable!("Cursor::new always mirrors its Particle's shape"),
    }
}

fn occurrence_of(cursor: &Cursor) -> u32 {
    match cursor {
        Cursor::Element { occurrence } | Cursor::Any { occurrence } => *occurrence,
        Cursor::Seq { occurrence, .. } | Cursor::Choice { occurrence, .. } => *occurrence,
        Cursor::All { seen, .. } => *seen.iter().min().unwrap_or(&0),
    }
}

/// Whether `cursor` currently sits in an accepting (content-complete)
/// state: every child particle's `minOccurs` is satisfied.
fn is_complete(schema: &Schema, particle_id: ParticleId, cursor: &Cursor) -> bool {
    let particle = schema.particle(particle_id);
    match (particle, cursor) {
        (Particle::Element { .. }, Cursor::Element { occurrence })
        | (Particle::Any { .. }, Cursor::Any { occurrence }) => min_satisfied(particle, *occurrence),
        (Particle::Sequence { children: seq_children, .. }, Cursor::Seq { children: cursors, index, occurrence }) => {
            if *index == 0 {
                *occurrence >= particle.min_occurs()
            } else {
                let rest_ok = seq_children[*index..]
                    .iter()
                    .zip(cursors[*index..].iter())
                    .all(|(id, c)| is_complete(schema, *id, c));
                rest_ok && *occurrence + 1 >= particle.min_occurs()
            }
        }
        (Particle::Choice { children, .. }, Cursor::Choice { children: cursors, occurrence }) => {
            *occurrence >= particle.min_occurs()
                || children
                    .iter()
                    .zip(cursors.iter())
                    .any(|(id, c)| is_complete(schema, *id, c))
        }
        (Particle::All { children, .. }, Cursor::All { children: cursors, seen }) => {
            children
                .iter()
                .zip(cursors.iter())
                .zip(seen.iter())
                .all(|((id, c), count)| {
                    if *count > 0 {
                        is_complete(schema, *id, c)
                    } else {
                        schema.particle(*id).min_occurs() == 0
                    }
                })
        }
        _ => unreachable!("Cursor::new always mirrors its Particle's shape"),
    }
}

/// Validates one element's children against its complex type's content
/// particle, one `accept` call per child start-tag.
///
/// Owns a clone of the [`std::rc::Rc`]-shared [`Schema`] rather than
/// borrowing it, so that [`crate::xsd::validator::XsdValidator`] can keep
/// one of these per open element frame without fighting the borrow
/// checker over a schema reference it also needs for other lookups.
pub struct ContentValidator {
    schema: std::rc::Rc<Schema>,
    root: ParticleId,
    cursor: Cursor,
    rejected: bool,
}

impl ContentValidator {
    pub fn new(schema: std::rc::Rc<Schema>, root: ParticleId) -> Self {
        let cursor = Cursor::new(&schema, root);
        Self { schema, root, cursor, rejected: false }
    }

    /// Attempts to consume one child element. Returns `true` if it was
    /// accepted by the content model; once `false` is returned the
    /// validator is permanently rejected (a content-model violation has
    /// already been reported by the caller) and further calls also
    /// return `false`.
    pub fn accept(&mut self, uri: Option<&str>, local: &str) -> bool {
        if self.rejected {
            return false;
        }
        let accepted = try_accept(&self.schema, self.root, &mut self.cursor, uri, local);
        if !accepted {
            self.rejected = true;
        }
        accepted
    }

    /// Whether the content model is in an accepting state: called when
    /// the element closes.
    pub fn is_complete(&self) -> bool {
        !self.rejected && is_complete(&self.schema, self.root, &self.cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xsd::particle::{NamespaceConstraint, ProcessContents};
    use crate::xsd::schema::ElementDecl;

    fn element(schema: &mut Schema, name: &str) -> crate::xsd::schema::ElementId {
        schema.push_element(ElementDecl {
            name: name.into(),
            target_namespace: None,
            type_id: None,
            nillable: false,
            is_abstract: false,
            default: None,
            fixed: None,
            substitution_group: None,
        })
    }

    #[test]
    fn sequence_requires_declared_order() {
        let mut schema = Schema::new(None);
        let a = element(&mut schema, "a");
        let b = element(&mut schema, "b");
        let pa = schema.push_particle(Particle::Element { element: a, min_occurs: 1, max_occurs: Some(1) });
        let pb = schema.push_particle(Particle::Element { element: b, min_occurs: 1, max_occurs: Some(1) });
        let seq = schema.push_particle(Particle::Sequence { children: vec![pa, pb], min_occurs: 1, max_occurs: Some(1) });
        let schema = std::rc::Rc::new(schema);

        let mut v = ContentValidator::new(schema.clone(), seq);
        assert!(v.accept(None, "a"));
        assert!(v.accept(None, "b"));
        assert!(v.is_complete());

        let mut v2 = ContentValidator::new(schema, seq);
        assert!(!v2.accept(None, "b"));
    }

    #[test]
    fn choice_accepts_exactly_one_branch() {
        let mut schema = Schema::new(None);
        let a = element(&mut schema, "a");
        let b = element(&mut schema, "b");
        let pa = schema.push_particle(Particle::Element { element: a, min_occurs: 1, max_occurs: Some(1) });
        let pb = schema.push_particle(Particle::Element { element: b, min_occurs: 1, max_occurs: Some(1) });
        let choice = schema.push_particle(Particle::Choice { children: vec![pa, pb], min_occurs: 1, max_occurs: Some(1) });
        let schema = std::rc::Rc::new(schema);

        let mut v = ContentValidator::new(schema, choice);
        assert!(v.accept(None, "b"));
        assert!(v.is_complete());
    }

    #[test]
    fn all_group_accepts_any_order_once_each() {
        let mut schema = Schema::new(None);
        let a = element(&mut schema, "a");
        let b = element(&mut schema, "b");
        let pa = schema.push_particle(Particle::Element { element: a, min_occurs: 1, max_occurs: Some(1) });
        let pb = schema.push_particle(Particle::Element { element: b, min_occurs: 1, max_occurs: Some(1) });
        let all = schema.push_particle(Particle::All { children: vec![pa, pb], min_occurs: 1, max_occurs: Some(1) });
        let schema = std::rc::Rc::new(schema);

        let mut v = ContentValidator::new(schema, all);
        assert!(v.accept(None, "b"));
        assert!(v.accept(None, "a"));
        assert!(v.is_complete());
    }

    #[test]
    fn sequence_with_zero_or_more_repeats() {
        let mut schema = Schema::new(None);
        let a = element(&mut schema, "a");
        let pa = schema.push_particle(Particle::Element { element: a, min_occurs: 1, max_occurs: Some(1) });
        let seq = schema.push_particle(Particle::Sequence { children: vec![pa], min_occurs: 0, max_occurs: None });
        let schema = std::rc::Rc::new(schema);

        let mut v = ContentValidator::new(schema, seq);
        assert!(v.is_complete());
        assert!(v.accept(None, "a"));
        assert!(v.accept(None, "a"));
        assert!(v.accept(None, "a"));
        assert!(v.is_complete());
    }

    #[test]
    fn any_wildcard_matches_by_namespace_constraint() {
        let mut schema = Schema::new(Some("urn:a".into()));
        let any = schema.push_particle(Particle::Any {
            namespace_constraint: NamespaceConstraint::Other,
            process_contents: ProcessContents::Lax,
            min_occurs: 1,
            max_occurs: Some(1),
        });
        let schema = std::rc::Rc::new(schema);
        let mut v = ContentValidator::new(schema.clone(), any);
        assert!(!v.accept(Some("urn:a"), "whatever"));
        let mut v2 = ContentValidator::new(schema, any);
        assert!(v2.accept(Some("urn:other"), "whatever"));
    }
}
