//! General and parameter entity tables, and reference expansion.
//!
//! Grounded in the general/parameter entity split and replacement-text
//! contract described for entity resolvers in the wider XML tooling
//! ecosystem: an entity's replacement text is expanded textually (its
//! parameter-entity references resolved, its character references
//! expanded) once, at declaration time for internal entities, and on first
//! use for external ones.

use std::collections::HashMap;

use crate::errors::{Error, Result};
use crate::tokenizer::is_valid_char_reference;

/// Where an entity's replacement text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntitySource {
    /// Declared with a literal replacement text in the DTD.
    Internal(String),
    /// Declared with `SYSTEM`/`PUBLIC` identifiers; resolved lazily through
    /// an [`crate::handler::EntityResolver`].
    External {
        /// The `PUBLIC` identifier, if any.
        public_id: Option<String>,
        /// The `SYSTEM` identifier.
        system_id: String,
        /// Set for general entities declared with `NDATA` (unparsed
        /// entities), naming the notation; such entities may only be
        /// referenced from `ENTITY`/`ENTITIES`-typed attribute values, not
        /// expanded as text.
        ndata: Option<String>,
    },
}

/// The five entities every XML document may reference without a
/// declaration.
pub fn predefined_entity(name: &str) -> Option<&'static str> {
    Some(match name {
        "lt" => "<",
        "gt" => ">",
        "amp" => "&",
        "apos" => "'",
        "quot" => "\"",
        _ => return None,
    })
}

/// Tracks declared general and parameter entities for one document.
/// General and parameter entities occupy separate namespaces, as the XML
/// specification requires (`<!ENTITY % x "...">` and `<!ENTITY x "...">`
/// never collide).
#[derive(Debug, Clone, Default)]
pub struct EntityTable {
    general: HashMap<String, EntitySource>,
    parameter: HashMap<String, EntitySource>,
}

impl EntityTable {
    /// Creates an empty table (predefined entities are handled separately
    /// by [`predefined_entity`] and need no table entry).
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a general entity. The first declaration for a given name
    /// wins, per the XML specification's "binding occurs at first
    /// declaration" rule; later, duplicate declarations are ignored.
    pub fn declare_general(&mut self, name: impl Into<String>, source: EntitySource) {
        self.general.entry(name.into()).or_insert(source);
    }

    /// Declares a parameter entity, with the same first-wins rule.
    pub fn declare_parameter(&mut self, name: impl Into<String>, source: EntitySource) {
        self.parameter.entry(name.into()).or_insert(source);
    }

    /// Looks up a declared general entity.
    pub fn general(&self, name: &str) -> Option<&EntitySource> {
        self.general.get(name)
    }

    /// Looks up a declared parameter entity.
    pub fn parameter(&self, name: &str) -> Option<&EntitySource> {
        self.parameter.get(name)
    }

    /// Iterates over every declared general entity, in declaration order is
    /// not guaranteed (backed by a `HashMap`). Used to fire
    /// `unparsed_entity_decl`/`notation_decl`-style declaration events for
    /// a [`crate::handler::DtdHandler`] once the internal subset has been
    /// parsed.
    pub fn general_iter(&self) -> impl Iterator<Item = (&str, &EntitySource)> {
        self.general.iter().map(|(name, source)| (name.as_str(), source))
    }
}

/// Expands general entity and character references in `text`, using
/// `resolve` to obtain a general entity's internal replacement text (or
/// `None` if it is external/unparsed/undeclared). Recursion is bounded by
/// `depth_limit` and self-reference is rejected, per the spec's bounded
/// expansion requirement.
pub fn expand_general_references(
    text: &str,
    resolve: &dyn Fn(&str) -> Option<String>,
    xml_1_1: bool,
    depth_limit: u32,
) -> Result<String> {
    expand_inner(text, resolve, xml_1_1, depth_limit, &mut Vec::new())
}

fn expand_inner(
    text: &str,
    resolve: &dyn Fn(&str) -> Option<String>,
    xml_1_1: bool,
    depth_limit: u32,
    stack: &mut Vec<String>,
) -> Result<String> {
    if stack.len() as u32 > depth_limit {
        return Err(Error::EntityDepthExceeded);
    }
    let mut out = String::with_capacity(text.len());
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'&' {
            let start = i;
            while i < bytes.len() && bytes[i] != b'&' {
                i += 1;
            }
            out.push_str(&text[start..i]);
            continue;
        }
        let semi = text[i..]
            .find(';')
            .map(|p| i + p)
            .ok_or_else(|| Error::UnexpectedToken("unterminated entity reference".to_string()))?;
        let body = &text[i + 1..semi];
        if let Some(rest) = body.strip_prefix('#') {
            let cp = if let Some(hex) = rest.strip_prefix('x').or_else(|| rest.strip_prefix('X')) {
                u32::from_str_radix(hex, 16)
            } else {
                rest.parse::<u32>()
            }
            .map_err(|_| Error::UnexpectedToken(format!("malformed character reference &#{};", rest)))?;
            if !is_valid_char_reference(cp, xml_1_1) {
                return Err(Error::InvalidCharacterReference(cp));
            }
            let ch = char::from_u32(cp)
                .ok_or(Error::InvalidCharacterReference(cp))?;
            out.push(ch);
        } else if let Some(resolved) = predefined_entity(body) {
            out.push_str(resolved);
        } else {
            if stack.iter().any(|s| s == body) {
                return Err(Error::RecursiveEntity(body.to_string()));
            }
            match resolve(body) {
                Some(replacement) => {
                    stack.push(body.to_string());
                    let expanded = expand_inner(&replacement, resolve, xml_1_1, depth_limit, stack)?;
                    stack.pop();
                    out.push_str(&expanded);
                }
                None => return Err(Error::UnresolvedEntity(body.to_string())),
            }
        }
        i = semi + 1;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_predefined_and_numeric_references() {
        let out = expand_general_references(
            "a &lt;b&gt; &#65; &#x42;",
            &|_| None,
            false,
            16,
        )
        .unwrap();
        assert_eq!(out, "a <b> A B");
    }

    #[test]
    fn expands_declared_general_entity_recursively() {
        let out = expand_general_references(
            "&outer;",
            &|name| match name {
                "outer" => Some("&inner; text".to_string()),
                "inner" => Some("value".to_string()),
                _ => None,
            },
            false,
            16,
        )
        .unwrap();
        assert_eq!(out, "value text");
    }

    #[test]
    fn detects_direct_self_reference() {
        let err = expand_general_references(
            "&loop;",
            &|name| if name == "loop" { Some("&loop;".to_string()) } else { None },
            false,
            16,
        )
        .unwrap_err();
        assert_eq!(err.code(), "RecursiveEntity");
    }

    #[test]
    fn rejects_undeclared_entity() {
        let err = expand_general_references("&nope;", &|_| None, false, 16).unwrap_err();
        assert_eq!(err.code(), "UnresolvedEntity");
    }

    #[test]
    fn rejects_invalid_character_reference() {
        let err = expand_general_references("&#0;", &|_| None, false, 16).unwrap_err();
        assert_eq!(err.code(), "InvalidCharacterReference");
    }
}
