//! Push-event consumer interfaces: the traits an embedder implements to
//! receive parsing events, diagnostics, and to supply external entities.
//!
//! Modeled on the SAX2 `ContentHandler`/`DtdHandler`/`ErrorHandler`/
//! `EntityResolver` split, merged here into one event trait per the
//! "consumers implement the subset they care about" contract: every method
//! has a no-op default, so an implementor overrides only what it needs.

use std::io::Read;

use crate::attributes::Attributes;
use crate::errors::Result;
use crate::locator::LocatorSnapshot;
use crate::name::ResolvedName;

/// Receives well-formedness-level and (when validation is enabled)
/// schema-level parsing events.
///
/// All methods return [`Result`] so an implementor can abort parsing by
/// returning an error from inside a callback; the error propagates out of
/// the driving `receive`/`close` call unchanged.
#[allow(unused_variables)]
pub trait EventHandler {
    /// Called once, before any other event, with a locator the parser will
    /// keep updating. Store it if you want live position information
    /// during parsing rather than only in error callbacks.
    fn set_document_locator(&mut self, locator: LocatorSnapshot) {}

    /// Called once at the start of the document, after any XML/text
    /// declaration has been consumed.
    fn start_document(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called once, after the root element's `end_element` has fired.
    fn end_document(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called when a namespace prefix comes into scope, before the
    /// `start_element` of the element that declares it.
    fn start_prefix_mapping(&mut self, prefix: Option<&str>, uri: &str) -> Result<()> {
        Ok(())
    }

    /// Called when a namespace prefix goes out of scope, after the
    /// `end_element` of the element that declared it.
    fn end_prefix_mapping(&mut self, prefix: Option<&str>) -> Result<()> {
        Ok(())
    }

    /// Called at the start of an element, once its name and attributes
    /// have been fully parsed (and normalized/validated, if validation is
    /// enabled).
    fn start_element(&mut self, name: &ResolvedName, attributes: &Attributes) -> Result<()> {
        Ok(())
    }

    /// Called at the end of an element.
    fn end_element(&mut self, name: &ResolvedName) -> Result<()> {
        Ok(())
    }

    /// Called with a run of character data. May be split across multiple
    /// calls for a single contiguous run of text, since the parser is
    /// chunk-driven.
    fn characters(&mut self, text: &str) -> Result<()> {
        Ok(())
    }

    /// Called with whitespace that is known to be ignorable because a DTD
    /// or XSD content model declares the enclosing element `ELEMENT-only`.
    fn ignorable_whitespace(&mut self, text: &str) -> Result<()> {
        Ok(())
    }

    /// Called for a processing instruction.
    fn processing_instruction(&mut self, target: &str, data: &str) -> Result<()> {
        Ok(())
    }

    /// Called for a comment, only when
    /// [`crate::config::Config::lexical_handler`] is enabled.
    fn comment(&mut self, text: &str) -> Result<()> {
        Ok(())
    }

    /// Called at the start of a CDATA section, only when
    /// [`crate::config::Config::lexical_handler`] is enabled. The
    /// section's text is still reported through [`Self::characters`].
    fn start_cdata(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called at the end of a CDATA section, only when
    /// [`crate::config::Config::lexical_handler`] is enabled.
    fn end_cdata(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called at the start of the DTD's internal subset.
    fn start_dtd(&mut self, name: &str, public_id: Option<&str>, system_id: Option<&str>) -> Result<()> {
        Ok(())
    }

    /// Called at the end of the DTD.
    fn end_dtd(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called when an entity reference is about to be expanded in place.
    fn start_entity(&mut self, name: &str) -> Result<()> {
        Ok(())
    }

    /// Called once the replacement text of an entity has been fully
    /// reported.
    fn end_entity(&mut self, name: &str) -> Result<()> {
        Ok(())
    }

    /// Called for a `<!NOTATION>` declaration.
    fn notation_decl(&mut self, name: &str, public_id: Option<&str>, system_id: Option<&str>) -> Result<()> {
        Ok(())
    }

    /// Called for a general entity declared with an `NDATA` annotation
    /// (an "unparsed entity").
    fn unparsed_entity_decl(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: &str,
        notation_name: &str,
    ) -> Result<()> {
        Ok(())
    }

    /// Called in place of expanding an entity reference that
    /// [`EntityResolver`] declined to resolve and
    /// [`crate::config::Config::external_general_entities`] is disabled.
    fn skipped_entity(&mut self, name: &str) -> Result<()> {
        Ok(())
    }
}

/// Receives recoverable diagnostics: validation failures and other
/// non-fatal conditions that do not by themselves stop parsing.
#[allow(unused_variables)]
pub trait ErrorHandler {
    /// A condition that does not affect well-formedness or validity in a
    /// way that must stop parsing, e.g. a deprecated construct.
    fn warning(&mut self, error: &crate::errors::Error, at: &LocatorSnapshot) -> Result<()> {
        Ok(())
    }

    /// A recoverable error, typically a DTD or XSD validation failure.
    /// Parsing continues after this call returns `Ok`.
    fn error(&mut self, error: &crate::errors::Error, at: &LocatorSnapshot) -> Result<()> {
        Ok(())
    }

    /// A well-formedness error. The default implementation re-raises the
    /// error, which the driving call propagates; the parser does not emit
    /// any further events afterward. Overriding this to swallow the error
    /// is possible but leaves the document only partially parsed.
    fn fatal_error(&mut self, error: crate::errors::Error, at: &LocatorSnapshot) -> Result<()> {
        Err(error)
    }
}

/// An error handler that reports nothing and lets every diagnostic pass
/// silently except fatal errors, which still propagate.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentErrorHandler;

impl ErrorHandler for SilentErrorHandler {}

/// A readable external resource together with the identifiers used to
/// request it, modeled on SAX's `InputSource`.
pub trait InputSource: Read {
    /// The system identifier (URI) this source was resolved from, if any.
    fn system_id(&self) -> Option<&str> {
        None
    }
}

impl<R: Read> InputSource for std::io::BufReader<R> {}

/// Resolves external entity references (external DTD subset, external
/// parameter entities, external general entities) to a byte source.
///
/// The default implementation declines every request, which causes the
/// parser to treat such entities per [`crate::config::Config`]'s
/// `external_general_entities`/`external_parameter_entities` flags (either
/// skipping them or raising an error, never fetching network/filesystem
/// resources on its own).
pub trait EntityResolver {
    /// Attempts to resolve an external entity, given its identifiers.
    /// Returns `Ok(None)` to decline (the parser falls back to its default
    /// handling), or `Ok(Some(_))` with a readable source of its
    /// replacement text.
    fn resolve_entity(
        &mut self,
        public_id: Option<&str>,
        system_id: &str,
    ) -> Result<Option<Box<dyn InputSource>>> {
        let _ = (public_id, system_id);
        Ok(None)
    }
}

/// An [`EntityResolver`] that resolves nothing; the default used when no
/// resolver is supplied.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEntityResolver;

impl EntityResolver for NullEntityResolver {}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder(Vec<String>);

    impl EventHandler for Recorder {
        fn start_element(&mut self, name: &ResolvedName, _attributes: &Attributes) -> Result<()> {
            self.0.push(format!("start:{}", name.qname));
            Ok(())
        }

        fn end_element(&mut self, name: &ResolvedName) -> Result<()> {
            self.0.push(format!("end:{}", name.qname));
            Ok(())
        }
    }

    #[test]
    fn default_methods_are_all_no_ops() {
        struct Empty;
        impl EventHandler for Empty {}
        let mut h = Empty;
        assert!(h.start_document().is_ok());
        assert!(h.characters("hi").is_ok());
        assert!(h.end_document().is_ok());
    }

    #[test]
    fn overridden_methods_record_events() {
        use crate::name::{QName, ResolveResult};
        let mut rec = Recorder(Vec::new());
        let name = ResolvedName {
            qname: QName::new("root"),
            namespace: ResolveResult::Unbound,
        };
        rec.start_element(&name, &Attributes::new()).unwrap();
        rec.end_element(&name).unwrap();
        assert_eq!(rec.0, vec!["start:root", "end:root"]);
    }

    #[test]
    fn fatal_error_propagates_by_default() {
        let mut h = SilentErrorHandler;
        let at = LocatorSnapshot::default();
        let err = h
            .fatal_error(crate::errors::Error::MissingRootElement, &at)
            .unwrap_err();
        assert_eq!(err.code(), "MissingRootElement");
    }
}
