//! Built-in XSD datatype registry (§9 "Global built-in type table").
//!
//! The built-in hierarchy (`anySimpleType` → 19 primitives → their
//! built-in restrictions, e.g. `integer` under `decimal`, `token` under
//! `normalizedString` under `string`) never changes at runtime, so it is
//! loaded once into a process-wide, lazily-initialized registry rather
//! than rebuilt per [`crate::xsd::schema::Schema`]. Every `Schema` still
//! gets its own copy of the corresponding [`crate::xsd::schema::TypeId`]s
//! (arenas are not shared across schemas), but the *definitions* —
//! facets, base-name links, primitive tag — come from this table.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::xsd::simple_type::{Facets, Primitive, SimpleType, Variety, WhiteSpace};
use crate::xsd::schema::{Schema, TypeId, XsdType};

/// One row of the static built-in configuration: a name, its base's name
/// (`None` for `anySimpleType` itself), the primitive it reduces to, and
/// facets applied beyond what the base already constrains.
struct BuiltinRow {
    name: &'static str,
    base: Option<&'static str>,
    primitive: Option<Primitive>,
    white_space: WhiteSpace,
    pattern: Option<&'static str>,
}

const ROWS: &[BuiltinRow] = &[
    BuiltinRow { name: "anySimpleType", base: None, primitive: None, white_space: WhiteSpace::Preserve, pattern: None },
    BuiltinRow { name: "string", base: Some("anySimpleType"), primitive: Some(Primitive::String), white_space: WhiteSpace::Preserve, pattern: None },
    BuiltinRow { name: "normalizedString", base: Some("string"), primitive: Some(Primitive::String), white_space: WhiteSpace::Replace, pattern: None },
    BuiltinRow { name: "token", base: Some("normalizedString"), primitive: Some(Primitive::String), white_space: WhiteSpace::Collapse, pattern: None },
    BuiltinRow { name: "language", base: Some("token"), primitive: Some(Primitive::String), white_space: WhiteSpace::Collapse, pattern: Some(r"^[a-zA-Z]{1,8}(-[a-zA-Z0-9]{1,8})*$") },
    BuiltinRow { name: "Name", base: Some("token"), primitive: Some(Primitive::String), white_space: WhiteSpace::Collapse, pattern: Some(r"^[A-Za-z_:][A-Za-z0-9_:.\-]*$") },
    BuiltinRow { name: "NCName", base: Some("Name"), primitive: Some(Primitive::String), white_space: WhiteSpace::Collapse, pattern: Some(r"^[A-Za-z_][A-Za-z0-9_.\-]*$") },
    BuiltinRow { name: "NMTOKEN", base: Some("token"), primitive: Some(Primitive::String), white_space: WhiteSpace::Collapse, pattern: Some(r"^[A-Za-z0-9_:.\-]+$") },
    BuiltinRow { name: "ID", base: Some("NCName"), primitive: Some(Primitive::String), white_space: WhiteSpace::Collapse, pattern: None },
    BuiltinRow { name: "IDREF", base: Some("NCName"), primitive: Some(Primitive::String), white_space: WhiteSpace::Collapse, pattern: None },
    BuiltinRow { name: "ENTITY", base: Some("NCName"), primitive: Some(Primitive::String), white_space: WhiteSpace::Collapse, pattern: None },
    BuiltinRow { name: "boolean", base: Some("anySimpleType"), primitive: Some(Primitive::Boolean), white_space: WhiteSpace::Collapse, pattern: Some(r"^(true|false|1|0)$") },
    BuiltinRow { name: "decimal", base: Some("anySimpleType"), primitive: Some(Primitive::Decimal), white_space: WhiteSpace::Collapse, pattern: Some(r"^[+-]?([0-9]+(\.[0-9]*)?|\.[0-9]+)$") },
    BuiltinRow { name: "integer", base: Some("decimal"), primitive: Some(Primitive::Decimal), white_space: WhiteSpace::Collapse, pattern: Some(r"^[+-]?[0-9]+$") },
    BuiltinRow { name: "nonNegativeInteger", base: Some("integer"), primitive: Some(Primitive::Decimal), white_space: WhiteSpace::Collapse, pattern: Some(r"^\+?[0-9]+$") },
    BuiltinRow { name: "positiveInteger", base: Some("nonNegativeInteger"), primitive: Some(Primitive::Decimal), white_space: WhiteSpace::Collapse, pattern: Some(r"^\+?[1-9][0-9]*$") },
    BuiltinRow { name: "nonPositiveInteger", base: Some("integer"), primitive: Some(Primitive::Decimal), white_space: WhiteSpace::Collapse, pattern: Some(r"^(-[0-9]+|0+)$") },
    BuiltinRow { name: "negativeInteger", base: Some("nonPositiveInteger"), primitive: Some(Primitive::Decimal), white_space: WhiteSpace::Collapse, pattern: Some(r"^-[0-9]*[1-9][0-9]*$") },
    BuiltinRow { name: "long", base: Some("integer"), primitive: Some(Primitive::Decimal), white_space: WhiteSpace::Collapse, pattern: None },
    BuiltinRow { name: "int", base: Some("long"), primitive: Some(Primitive::Decimal), white_space: WhiteSpace::Collapse, pattern: None },
    BuiltinRow { name: "short", base: Some("int"), primitive: Some(Primitive::Decimal), white_space: WhiteSpace::Collapse, pattern: None },
    BuiltinRow { name: "byte", base: Some("short"), primitive: Some(Primitive::Decimal), white_space: WhiteSpace::Collapse, pattern: None },
    BuiltinRow { name: "float", base: Some("anySimpleType"), primitive: Some(Primitive::Float), white_space: WhiteSpace::Collapse, pattern: None },
    BuiltinRow { name: "double", base: Some("anySimpleType"), primitive: Some(Primitive::Double), white_space: WhiteSpace::Collapse, pattern: None },
    BuiltinRow { name: "duration", base: Some("anySimpleType"), primitive: Some(Primitive::Duration), white_space: WhiteSpace::Collapse, pattern: Some(r"^-?P(\d+Y)?(\d+M)?(\d+D)?(T(\d+H)?(\d+M)?(\d+(\.\d+)?S)?)?$") },
    BuiltinRow { name: "dateTime", base: Some("anySimpleType"), primitive: Some(Primitive::DateTime), white_space: WhiteSpace::Collapse, pattern: Some(r"^-?\d{4,}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:\d{2})?$") },
    BuiltinRow { name: "time", base: Some("anySimpleType"), primitive: Some(Primitive::Time), white_space: WhiteSpace::Collapse, pattern: Some(r"^\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:\d{2})?$") },
    BuiltinRow { name: "date", base: Some("anySimpleType"), primitive: Some(Primitive::Date), white_space: WhiteSpace::Collapse, pattern: Some(r"^-?\d{4,}-\d{2}-\d{2}(Z|[+-]\d{2}:\d{2})?$") },
    BuiltinRow { name: "gYearMonth", base: Some("anySimpleType"), primitive: Some(Primitive::GYearMonth), white_space: WhiteSpace::Collapse, pattern: Some(r"^-?\d{4,}-\d{2}(Z|[+-]\d{2}:\d{2})?$") },
    BuiltinRow { name: "gYear", base: Some("anySimpleType"), primitive: Some(Primitive::GYear), white_space: WhiteSpace::Collapse, pattern: Some(r"^-?\d{4,}(Z|[+-]\d{2}:\d{2})?$") },
    BuiltinRow { name: "gMonthDay", base: Some("anySimpleType"), primitive: Some(Primitive::GMonthDay), white_space: WhiteSpace::Collapse, pattern: Some(r"^--\d{2}-\d{2}(Z|[+-]\d{2}:\d{2})?$") },
    BuiltinRow { name: "gDay", base: Some("anySimpleType"), primitive: Some(Primitive::GDay), white_space: WhiteSpace::Collapse, pattern: Some(r"^---\d{2}(Z|[+-]\d{2}:\d{2})?$") },
    BuiltinRow { name: "gMonth", base: Some("anySimpleType"), primitive: Some(Primitive::GMonth), white_space: WhiteSpace::Collapse, pattern: Some(r"^--\d{2}(Z|[+-]\d{2}:\d{2})?$") },
    BuiltinRow { name: "hexBinary", base: Some("anySimpleType"), primitive: Some(Primitive::HexBinary), white_space: WhiteSpace::Collapse, pattern: Some(r"^([0-9a-fA-F]{2})*$") },
    BuiltinRow { name: "base64Binary", base: Some("anySimpleType"), primitive: Some(Primitive::Base64Binary), white_space: WhiteSpace::Collapse, pattern: None },
    BuiltinRow { name: "anyURI", base: Some("anySimpleType"), primitive: Some(Primitive::AnyUri), white_space: WhiteSpace::Collapse, pattern: None },
    BuiltinRow { name: "QName", base: Some("anySimpleType"), primitive: Some(Primitive::QName), white_space: WhiteSpace::Collapse, pattern: None },
    BuiltinRow { name: "NOTATION", base: Some("anySimpleType"), primitive: Some(Primitive::Notation), white_space: WhiteSpace::Collapse, pattern: None },
];

/// The resolved, ready-to-use form of one built-in: its compiled
/// [`SimpleType`] plus its base's name (for walking the hierarchy by
/// name before it has been installed into a particular schema's arena).
pub struct BuiltinType {
    pub name: &'static str,
    pub base_name: Option<&'static str>,
    pub simple_type: SimpleType,
}

fn build_registry() -> HashMap<&'static str, BuiltinType> {
    let mut registry = HashMap::new();
    for row in ROWS {
        let mut facets = Facets { white_space: Some(row.white_space), ..Facets::default() };
        if let Some(src) = row.pattern {
            let compiled = Regex::new(src).expect("built-in facet pattern must compile");
            facets.patterns.push(std::sync::Arc::new(compiled));
        }
        let simple_type = SimpleType {
            variety: Variety::Atomic,
            base: None,
            facets,
            item_type: None,
            member_types: Vec::new(),
            primitive: row.primitive,
        };
        registry.insert(
            row.name,
            BuiltinType { name: row.name, base_name: row.base, simple_type },
        );
    }
    registry
}

fn registry() -> &'static HashMap<&'static str, BuiltinType> {
    static REGISTRY: OnceLock<HashMap<&'static str, BuiltinType>> = OnceLock::new();
    REGISTRY.get_or_init(build_registry)
}

/// Looks up a built-in datatype by its local name (e.g. `"integer"`),
/// ignoring namespace: callers are expected to have already checked the
/// name resolved to the XML Schema namespace URI.
pub fn lookup(local_name: &str) -> Option<&'static BuiltinType> {
    registry().get(local_name)
}

/// Installs every built-in type into `schema`'s arena, returning a
/// name-to-[`TypeId`] map. Base-type links are resolved in declaration
/// order since every row's base already appears earlier in [`ROWS`].
pub fn install(schema: &mut Schema) -> HashMap<&'static str, TypeId> {
    let mut ids: HashMap<&'static str, TypeId> = HashMap::new();
    for row in ROWS {
        let builtin = &registry()[row.name];
        let base = row.base.and_then(|name| ids.get(name).copied());
        let mut simple_type = builtin.simple_type.clone();
        simple_type.base = base;
        let id = schema.push_type(XsdType::Simple(simple_type));
        ids.insert(row.name, id);
        schema.global_types.insert(row.name.to_string(), id);
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_is_found_and_derives_from_decimal() {
        let integer = lookup("integer").unwrap();
        assert_eq!(integer.base_name, Some("decimal"));
        assert_eq!(integer.simple_type.primitive, Some(Primitive::Decimal));
    }

    #[test]
    fn install_links_base_chain_by_type_id() {
        let mut schema = Schema::new(None);
        let ids = install(&mut schema);
        let integer_id = ids["integer"];
        let decimal_id = ids["decimal"];
        let integer_type = schema.ty(integer_id).as_simple().unwrap();
        assert_eq!(integer_type.base, Some(decimal_id));
    }

    #[test]
    fn boolean_pattern_accepts_lexical_forms() {
        let boolean = lookup("boolean").unwrap();
        let pattern = &boolean.simple_type.facets.patterns[0];
        assert!(pattern.is_match("true"));
        assert!(pattern.is_match("0"));
        assert!(!pattern.is_match("yes"));
    }
}
