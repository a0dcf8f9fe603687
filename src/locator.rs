//! Tracks the current position in the document for diagnostics.

use std::fmt;

/// A mutable cursor that the parser advances as bytes are consumed.
///
/// Consumers never see a live reference to this type; instead every event
/// delivered through [`crate::handler::EventHandler`] carries a
/// [`LocatorSnapshot`] taken at the moment the event fired, matching the
/// "mutable locator, immutable snapshot" split used throughout the parser.
#[derive(Debug, Clone, Default)]
pub struct Locator {
    line: u64,
    column: u64,
    byte_offset: u64,
    system_id: Option<String>,
    public_id: Option<String>,
}

impl Locator {
    /// Creates a fresh locator positioned at the start of a document.
    pub fn new() -> Self {
        Self {
            line: 1,
            column: 1,
            byte_offset: 0,
            system_id: None,
            public_id: None,
        }
    }

    /// Sets the system identifier (base URI) reported from here on.
    pub fn set_system_id(&mut self, system_id: Option<String>) {
        self.system_id = system_id;
    }

    /// Sets the public identifier reported from here on.
    pub fn set_public_id(&mut self, public_id: Option<String>) {
        self.public_id = public_id;
    }

    /// Advances the locator past a run of raw input bytes, updating the
    /// line/column counters. `\r\n` and `\r` are each counted as a single
    /// line break, consistent with XML end-of-line normalization.
    pub fn advance(&mut self, bytes: &[u8]) {
        let mut i = 0;
        while i < bytes.len() {
            let b = bytes[i];
            self.byte_offset += 1;
            if b == b'\n' {
                self.line += 1;
                self.column = 1;
            } else if b == b'\r' {
                self.line += 1;
                self.column = 1;
                if bytes.get(i + 1) == Some(&b'\n') {
                    i += 1;
                    self.byte_offset += 1;
                }
            } else {
                self.column += 1;
            }
            i += 1;
        }
    }

    /// Captures the current position as an owned, `Copy`-free snapshot.
    pub fn snapshot(&self) -> LocatorSnapshot {
        LocatorSnapshot {
            line: self.line,
            column: self.column,
            byte_offset: self.byte_offset,
            system_id: self.system_id.clone(),
            public_id: self.public_id.clone(),
        }
    }
}

/// An owned capture of a [`Locator`]'s state at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct LocatorSnapshot {
    /// 1-based line number.
    pub line: u64,
    /// 1-based column number.
    pub column: u64,
    /// 0-based byte offset from the start of the document.
    pub byte_offset: u64,
    /// The base URI of the entity currently being parsed, if known.
    pub system_id: Option<String>,
    /// The public identifier of the entity currently being parsed, if known.
    pub public_id: Option<String>,
}

impl fmt::Display for LocatorSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.system_id {
            Some(id) => write!(f, "{}:{}:{}", id, self.line, self.column),
            None => write!(f, "{}:{}", self.line, self.column),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_lines_and_columns() {
        let mut loc = Locator::new();
        loc.advance(b"ab\ncd\r\nef\r");
        let snap = loc.snapshot();
        assert_eq!(snap.line, 4);
        assert_eq!(snap.column, 1);
        assert_eq!(snap.byte_offset, 10);
    }

    #[test]
    fn display_includes_system_id_when_present() {
        let mut loc = Locator::new();
        loc.set_system_id(Some("file:///doc.xml".to_string()));
        assert_eq!(loc.snapshot().to_string(), "file:///doc.xml:1:1");
    }
}
