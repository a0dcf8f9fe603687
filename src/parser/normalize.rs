//! Attribute value normalization, per the XML specification's
//! "AttValue Normalization" algorithm: literal tabs, newlines and carriage
//! returns become spaces before entity expansion, and for any type other
//! than `CDATA`, the expanded value is further collapsed by trimming
//! leading/trailing whitespace and folding internal runs of whitespace to
//! a single space.

use crate::attributes::AttributeType;

/// Replaces literal `\t`, `\r` and `\n` bytes with spaces, as required
/// before entity expansion of an attribute value.
pub fn normalize_literal_whitespace(raw: &str) -> String {
    raw.chars()
        .map(|c| if c == '\t' || c == '\r' || c == '\n' { ' ' } else { c })
        .collect()
}

/// Applies the extra whitespace collapsing required for non-`CDATA`
/// attribute types once entity references have been expanded.
pub fn collapse_whitespace(expanded: &str, attr_type: &AttributeType) -> String {
    if matches!(attr_type, AttributeType::Cdata | AttributeType::Undeclared) {
        return expanded.to_string();
    }
    expanded
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_eol_becomes_space() {
        assert_eq!(normalize_literal_whitespace("a\tb\r\nc"), "a b  c");
    }

    #[test]
    fn cdata_values_are_not_collapsed() {
        let v = collapse_whitespace("  a   b  ", &AttributeType::Cdata);
        assert_eq!(v, "  a   b  ");
    }

    #[test]
    fn non_cdata_values_are_collapsed() {
        let v = collapse_whitespace("  a   b  ", &AttributeType::NmToken);
        assert_eq!(v, "a b");
    }
}
