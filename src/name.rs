//! Qualified and local name types shared by the content parser, namespace
//! tracker, DTD and XSD subsystems.

use std::fmt;

/// A raw, possibly-prefixed name as it appeared in the document, e.g.
/// `soap:Envelope` or `id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName(pub String);

impl QName {
    /// Creates a new qualified name from its textual form.
    pub fn new(text: impl Into<String>) -> Self {
        QName(text.into())
    }

    /// Splits this name into an optional prefix and a local part, on the
    /// first `:`. A name that starts with `:` or has an empty local part
    /// after the colon is treated as having no prefix, matching the
    /// lenient behavior of a tokenizer that does not itself validate
    /// `NCName` production boundaries.
    pub fn split(&self) -> (Option<&str>, &str) {
        match self.0.find(':') {
            Some(idx) if idx > 0 && idx + 1 < self.0.len() => {
                (Some(&self.0[..idx]), &self.0[idx + 1..])
            }
            _ => (None, &self.0[..]),
        }
    }

    /// The prefix part, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.split().0
    }

    /// The local part (everything after the prefix, or the whole name if
    /// unprefixed).
    pub fn local_part(&self) -> &str {
        self.split().1
    }

    /// Borrows the raw textual form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QName {
    fn from(s: &str) -> Self {
        QName(s.to_string())
    }
}

impl From<String> for QName {
    fn from(s: String) -> Self {
        QName(s)
    }
}

/// A name's local part, detached from any prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalName(pub String);

impl LocalName {
    /// Borrows the local name text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocalName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The result of resolving a [`QName`] against the in-scope namespace
/// bindings at the point it appeared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveResult {
    /// The name had no prefix and there is no default namespace in scope
    /// (or this is an attribute, for which the lack of a prefix always
    /// means "no namespace" per the Namespaces in XML recommendation).
    Unbound,
    /// The name had no prefix, and a default namespace is in scope.
    Default(String),
    /// The name had a prefix that resolved to the given namespace URI.
    Bound(String),
}

impl ResolveResult {
    /// The namespace URI, if any was resolved.
    pub fn uri(&self) -> Option<&str> {
        match self {
            ResolveResult::Unbound => None,
            ResolveResult::Default(uri) | ResolveResult::Bound(uri) => Some(uri),
        }
    }
}

/// A name together with the namespace it resolved to, handed to
/// [`crate::handler::EventHandler`] callbacks when namespace processing is
/// enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedName {
    /// The raw qualified name as written.
    pub qname: QName,
    /// The resolved namespace, if any.
    pub namespace: ResolveResult,
}

impl ResolvedName {
    /// The local part of [`Self::qname`].
    pub fn local_name(&self) -> &str {
        self.qname.local_part()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_prefixed_names() {
        let q = QName::new("soap:Envelope");
        assert_eq!(q.prefix(), Some("soap"));
        assert_eq!(q.local_part(), "Envelope");
    }

    #[test]
    fn unprefixed_name_has_no_prefix() {
        let q = QName::new("root");
        assert_eq!(q.prefix(), None);
        assert_eq!(q.local_part(), "root");
    }

    #[test]
    fn leading_colon_is_not_a_prefix_separator() {
        let q = QName::new(":weird");
        assert_eq!(q.prefix(), None);
        assert_eq!(q.local_part(), ":weird");
    }
}
