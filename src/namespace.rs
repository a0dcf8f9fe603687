//! Namespace scope tracking: a stack of prefix-to-URI bindings pushed and
//! popped in lock-step with element start/end events.

use crate::name::{QName, ResolveResult};

/// The namespace reserved for the `xml` prefix, bound from the start of
/// every document and never rebindable.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";
/// The namespace reserved for the `xmlns` prefix, bound from the start of
/// every document and never rebindable.
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

#[derive(Debug, Clone)]
struct Binding {
    prefix: Option<String>,
    uri: String,
}

/// One element's worth of namespace declarations, popped when that
/// element's `end_element` fires.
#[derive(Debug, Clone, Default)]
struct Scope {
    bindings: Vec<Binding>,
}

/// Tracks in-scope namespace bindings as elements are entered and left.
///
/// Mirrors the push/pop/find/resolve discipline used to drive namespace
/// resolution around a parser's element stack, generalized here to record
/// a scope for every element rather than only a namespace-aware/
/// namespace-unaware split.
#[derive(Debug, Clone)]
pub struct NamespaceTracker {
    scopes: Vec<Scope>,
}

impl Default for NamespaceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceTracker {
    /// Creates a tracker with only the two fixed bindings in scope.
    pub fn new() -> Self {
        Self { scopes: Vec::new() }
    }

    /// Pushes a new, initially empty scope for an element about to be
    /// opened. Call [`Self::declare`] for each `xmlns`/`xmlns:*` attribute
    /// on that element before resolving its own name or its attributes'
    /// names.
    pub fn push(&mut self) {
        self.scopes.push(Scope::default());
    }

    /// Pops the scope pushed for the element that is now closing.
    pub fn pop(&mut self) {
        self.scopes.pop();
    }

    /// Records a namespace declaration seen on the element whose scope is
    /// currently on top of the stack. `prefix` is `None` for a default
    /// namespace declaration (`xmlns="..."`, including `xmlns=""` which
    /// undeclares the default namespace by binding it to an empty URI).
    pub fn declare(&mut self, prefix: Option<&str>, uri: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.bindings.push(Binding {
                prefix: prefix.map(|p| p.to_string()),
                uri: uri.to_string(),
            });
        }
    }

    /// Finds the URI currently bound to `prefix` (`None` for the default
    /// namespace), searching from the innermost scope outward.
    pub fn find(&self, prefix: Option<&str>) -> Option<&str> {
        match prefix {
            Some("xml") => return Some(XML_NAMESPACE),
            Some("xmlns") => return Some(XMLNS_NAMESPACE),
            _ => {}
        }
        for scope in self.scopes.iter().rev() {
            for binding in scope.bindings.iter().rev() {
                if binding.prefix.as_deref() == prefix {
                    if binding.uri.is_empty() {
                        return None;
                    }
                    return Some(&binding.uri);
                }
            }
        }
        None
    }

    /// Resolves a name's namespace. `is_attribute` matters because an
    /// unprefixed attribute is never subject to the default namespace
    /// (Namespaces in XML §5.2), while an unprefixed element is.
    pub fn resolve(&self, name: &QName, is_attribute: bool) -> ResolveResult {
        let (prefix, _local) = name.split();
        match prefix {
            Some(p) => match self.find(Some(p)) {
                Some(uri) => ResolveResult::Bound(uri.to_string()),
                None => ResolveResult::Unbound,
            },
            None => {
                if is_attribute {
                    ResolveResult::Unbound
                } else {
                    match self.find(None) {
                        Some(uri) => ResolveResult::Default(uri.to_string()),
                        None => ResolveResult::Unbound,
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_default_namespace_for_elements_not_attributes() {
        let mut ns = NamespaceTracker::new();
        ns.push();
        ns.declare(None, "urn:example");
        let name = QName::new("root");
        assert_eq!(
            ns.resolve(&name, false),
            ResolveResult::Default("urn:example".to_string())
        );
        assert_eq!(ns.resolve(&name, true), ResolveResult::Unbound);
    }

    #[test]
    fn prefixes_are_scoped_to_their_element_and_descendants() {
        let mut ns = NamespaceTracker::new();
        ns.push();
        ns.declare(Some("a"), "urn:a");
        ns.push();
        assert_eq!(ns.find(Some("a")), Some("urn:a"));
        ns.pop();
        ns.pop();
        assert_eq!(ns.find(Some("a")), None);
    }

    #[test]
    fn xml_and_xmlns_prefixes_are_always_bound() {
        let ns = NamespaceTracker::new();
        assert_eq!(ns.find(Some("xml")), Some(XML_NAMESPACE));
        assert_eq!(ns.find(Some("xmlns")), Some(XMLNS_NAMESPACE));
    }

    #[test]
    fn empty_uri_undeclares_default_namespace() {
        let mut ns = NamespaceTracker::new();
        ns.push();
        ns.declare(None, "urn:example");
        ns.push();
        ns.declare(None, "");
        assert_eq!(ns.find(None), None);
    }
}
