//! Parser configuration: the feature flags from the external interface
//! table, carried as plain fields instead of a by-URI property registry.

use crate::errors::{Error, Result};

/// Default nesting depth allowed while expanding entity references before
/// [`Error::EntityDepthExceeded`] is raised.
pub const DEFAULT_ENTITY_DEPTH_LIMIT: u32 = 4096;

/// Resolved configuration for a parsing run.
///
/// Built with [`ConfigBuilder`] in the same chainable, `self`-consuming
/// style used for the lexical options below it (`trim_text`, ...): one
/// struct of booleans/values rather than a stringly-typed
/// `get_feature`/`set_feature` registry.
#[derive(Debug, Clone)]
pub struct Config {
    /// Enables namespace processing (`http://xml.org/sax/features/namespaces`).
    pub namespaces: bool,
    /// Retains the raw `xmlns`/`xmlns:*` attributes alongside namespace
    /// resolution (`.../namespace-prefixes`).
    pub namespace_prefixes: bool,
    /// Enables DTD/XSD validation pipelines.
    pub validation: bool,
    /// Allows external general entities to be resolved.
    pub external_general_entities: bool,
    /// Allows external parameter entities (and therefore an external DTD
    /// subset) to be resolved.
    pub external_parameter_entities: bool,
    /// Resolves relative system identifiers against their containing
    /// entity's base URI before handing them to an
    /// [`crate::handler::EntityResolver`].
    pub resolve_dtd_uris: bool,
    /// Interns element/attribute names and namespace URIs to avoid
    /// repeated allocation for documents that reuse the same names often.
    pub string_interning: bool,
    /// Parses input as XML 1.1 (wider `Char` production, `NEL`/`LSEP`
    /// handling) instead of XML 1.0.
    pub xml_1_1: bool,
    /// Reports attribute-defaulting/type metadata that requires the DTD
    /// (SAX2's `Attributes2` equivalent).
    pub use_attributes2: bool,
    /// Fires `start_cdata`/`end_cdata`/comment callbacks (SAX2's
    /// `LexicalHandler` equivalent) in addition to the core content events.
    pub lexical_handler: bool,
    /// Maximum entity-expansion recursion depth.
    pub entity_depth_limit: u32,
    /// Trims leading whitespace from text runs.
    pub trim_text_start: bool,
    /// Trims trailing whitespace from text runs.
    pub trim_text_end: bool,
    /// Checks that end-tag names match their start tag.
    pub check_end_names: bool,
    /// Checks comments for an embedded `--`.
    pub check_comments: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespaces: true,
            namespace_prefixes: false,
            validation: false,
            external_general_entities: true,
            external_parameter_entities: true,
            resolve_dtd_uris: true,
            string_interning: true,
            xml_1_1: false,
            use_attributes2: true,
            lexical_handler: true,
            entity_depth_limit: DEFAULT_ENTITY_DEPTH_LIMIT,
            trim_text_start: false,
            trim_text_end: false,
            check_end_names: true,
            check_comments: false,
        }
    }
}

impl Config {
    /// Validates that this combination of flags is coherent.
    ///
    /// `namespaces=false` together with `namespace_prefixes=false` is the
    /// forbidden combination: with namespace processing off, the raw
    /// `xmlns*` attributes are the only way a caller can see namespace
    /// declarations at all, so turning both off leaves no way to observe
    /// them. Any other combination is coherent, including
    /// `namespaces=false && namespace_prefixes=true`, which just means
    /// namespace declarations are reported as plain attributes and nothing
    /// else.
    pub fn validate(&self) -> Result<()> {
        if self.entity_depth_limit == 0 {
            return Err(Error::InvalidConfig(
                "entity_depth_limit must be at least 1",
            ));
        }
        if !self.namespaces && !self.namespace_prefixes {
            return Err(Error::InvalidConfig(
                "namespaces=false requires namespace_prefixes=true, or namespace declarations are unobservable",
            ));
        }
        Ok(())
    }
}

/// Chainable builder for [`Config`], mirroring the teacher's
/// `ParserBuilder`/`InnerParserBuilder` split.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    inner: ConfigInner,
}

#[derive(Debug, Clone)]
struct ConfigInner(Config);

impl Default for ConfigInner {
    fn default() -> Self {
        ConfigInner(Config::default())
    }
}

impl ConfigBuilder {
    /// Creates a new builder seeded with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the final [`Config`], checking it for internal consistency.
    pub fn build(self) -> Result<Config> {
        let config = self.inner.0;
        config.validate()?;
        Ok(config)
    }

    /// Enables or disables namespace processing. (`true` by default)
    pub fn namespaces(mut self, val: bool) -> Self {
        self.inner.0.namespaces = val;
        self
    }

    /// Enables or disables retention of raw `xmlns*` attributes. (`false`
    /// by default)
    pub fn namespace_prefixes(mut self, val: bool) -> Self {
        self.inner.0.namespace_prefixes = val;
        self
    }

    /// Enables or disables DTD/XSD validation. (`false` by default)
    pub fn validation(mut self, val: bool) -> Self {
        self.inner.0.validation = val;
        self
    }

    /// Enables or disables resolution of external general entities.
    /// (`true` by default)
    pub fn external_general_entities(mut self, val: bool) -> Self {
        self.inner.0.external_general_entities = val;
        self
    }

    /// Enables or disables resolution of external parameter entities and
    /// the external DTD subset. (`true` by default)
    pub fn external_parameter_entities(mut self, val: bool) -> Self {
        self.inner.0.external_parameter_entities = val;
        self
    }

    /// Enables or disables base-URI resolution of DTD system identifiers.
    /// (`true` by default)
    pub fn resolve_dtd_uris(mut self, val: bool) -> Self {
        self.inner.0.resolve_dtd_uris = val;
        self
    }

    /// Enables or disables name/URI interning. (`true` by default)
    pub fn string_interning(mut self, val: bool) -> Self {
        self.inner.0.string_interning = val;
        self
    }

    /// Selects XML 1.1 lexical rules instead of XML 1.0. (`false` by
    /// default)
    pub fn xml_1_1(mut self, val: bool) -> Self {
        self.inner.0.xml_1_1 = val;
        self
    }

    /// Enables or disables `Attributes2`-style defaulting/type metadata.
    /// Read-only in the underlying model this mirrors; exposed here as a
    /// plain flag since this crate has no separate `Attributes`/
    /// `Attributes2` type split. (`true` by default)
    pub fn use_attributes2(mut self, val: bool) -> Self {
        self.inner.0.use_attributes2 = val;
        self
    }

    /// Enables or disables `LexicalHandler`-style comment/CDATA callbacks.
    /// Read-only in the underlying model this mirrors, for the same reason
    /// as [`Self::use_attributes2`]. (`true` by default)
    pub fn lexical_handler(mut self, val: bool) -> Self {
        self.inner.0.lexical_handler = val;
        self
    }

    /// Sets the entity expansion recursion depth limit.
    /// (`DEFAULT_ENTITY_DEPTH_LIMIT` by default)
    pub fn entity_depth_limit(mut self, val: u32) -> Self {
        self.inner.0.entity_depth_limit = val;
        self
    }

    /// Changes whether leading and trailing whitespace should be trimmed
    /// from text runs. (`false` by default)
    pub fn trim_text(mut self, val: bool) -> Self {
        self.inner.0.trim_text_start = val;
        self.inner.0.trim_text_end = val;
        self
    }

    /// Changes whether mismatched closing tag names should be detected.
    /// (`true` by default)
    pub fn check_end_names(mut self, val: bool) -> Self {
        self.inner.0.check_end_names = val;
        self
    }

    /// Changes whether comments are checked for an embedded `--`.
    /// (`false` by default)
    pub fn check_comments(mut self, val: bool) -> Self {
        self.inner.0.check_comments = val;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ConfigBuilder::new().build().is_ok());
    }

    #[test]
    fn zero_entity_depth_is_rejected() {
        let err = ConfigBuilder::new()
            .entity_depth_limit(0)
            .build()
            .unwrap_err();
        assert_eq!(err.code(), "InvalidConfig");
    }

    #[test]
    fn namespaces_and_namespace_prefixes_both_off_is_rejected() {
        let err = ConfigBuilder::new()
            .namespaces(false)
            .namespace_prefixes(false)
            .build()
            .unwrap_err();
        assert_eq!(err.code(), "InvalidConfig");
    }

    #[test]
    fn namespaces_off_with_namespace_prefixes_on_is_allowed() {
        let config = ConfigBuilder::new()
            .namespaces(false)
            .namespace_prefixes(true)
            .build()
            .unwrap();
        assert!(!config.namespaces);
        assert!(config.namespace_prefixes);
    }

    #[test]
    fn builder_chains_flags() {
        let config = ConfigBuilder::new()
            .namespaces(false)
            .namespace_prefixes(true)
            .validation(true)
            .check_comments(true)
            .build()
            .unwrap();
        assert!(!config.namespaces);
        assert!(config.validation);
        assert!(config.check_comments);
    }
}
