//! Facets and lexical/value validation for XSD simple types (§4.7).
//!
//! Facet checking follows the same "compile once, match many" shape as
//! [`crate::dtd::content_model`]'s NFA: a [`SimpleType`] is built once
//! during schema processing (patterns compiled to [`regex::Regex`] up
//! front) and then reused to validate every occurrence of that type across
//! the document.

use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::xsd::schema::TypeId;

/// The three kinds of simple type derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variety {
    /// A primitive or a restriction of one: has a lexical space checked
    /// directly against its facets.
    Atomic,
    /// `xs:list`: whitespace-separated occurrences of an item type.
    List,
    /// `xs:union`: the lexical space is the union of its member types'.
    Union,
}

/// How whitespace is normalized before facet checking
/// (`xs:whiteSpace`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhiteSpace {
    Preserve,
    Replace,
    Collapse,
}

/// The constraining facets of a simple type, applied after whitespace
/// normalization. `None` means the facet is not constrained at this type
/// (it may still be inherited from a base type via [`SimpleType::base`]).
#[derive(Debug, Clone, Default)]
pub struct Facets {
    pub length: Option<usize>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub patterns: Vec<Arc<Regex>>,
    pub enumeration: Option<Vec<String>>,
    pub min_inclusive: Option<f64>,
    pub max_inclusive: Option<f64>,
    pub min_exclusive: Option<f64>,
    pub max_exclusive: Option<f64>,
    pub total_digits: Option<u32>,
    pub fraction_digits: Option<u32>,
    pub white_space: Option<WhiteSpace>,
}

/// A simple type: a variety, an optional base (for facet inheritance and
/// `xsi:type` substitutability), its own facets, and (for list/union) its
/// item/member types.
#[derive(Debug, Clone)]
pub struct SimpleType {
    pub variety: Variety,
    pub base: Option<TypeId>,
    pub facets: Facets,
    pub item_type: Option<TypeId>,
    pub member_types: Vec<TypeId>,
    /// Set for built-in primitives so facet/value validation can apply
    /// type-specific lexical rules (`boolean`, `decimal`, ...).
    pub primitive: Option<Primitive>,
}

/// The 19 XSD primitive datatypes this crate gives dedicated lexical
/// validation to. Types derived from one of these inherit its `Primitive`
/// through [`SimpleType::base`] resolution in
/// [`crate::xsd::builtins::primitive_of`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    String,
    Boolean,
    Decimal,
    Float,
    Double,
    Duration,
    DateTime,
    Time,
    Date,
    GYearMonth,
    GYear,
    GMonthDay,
    GDay,
    GMonth,
    HexBinary,
    Base64Binary,
    AnyUri,
    QName,
    Notation,
}

impl SimpleType {
    pub fn new(variety: Variety, base: Option<TypeId>) -> Self {
        Self {
            variety,
            base,
            facets: Facets::default(),
            item_type: None,
            member_types: Vec::new(),
            primitive: None,
        }
    }

    /// Applies whitespace normalization, falling back to `Collapse` (the
    /// strictest, and the default for everything except `string` itself
    /// and its direct restrictions, which default to `Preserve`).
    pub fn normalize(&self, value: &str) -> String {
        match self.facets.white_space.unwrap_or(WhiteSpace::Collapse) {
            WhiteSpace::Preserve => value.to_string(),
            WhiteSpace::Replace => value
                .chars()
                .map(|c| if c == '\t' || c == '\n' || c == '\r' { ' ' } else { c })
                .collect(),
            WhiteSpace::Collapse => value.split_whitespace().collect::<Vec<_>>().join(" "),
        }
    }
}

/// Why a value failed facet or lexical validation, detailed enough for
/// [`crate::xsd::ValidationError::FacetViolation`]'s `reason` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FacetFailure {
    Length { expected: usize, found: usize },
    MinLength { expected: usize, found: usize },
    MaxLength { expected: usize, found: usize },
    Pattern { pattern: String },
    Enumeration { allowed: Vec<String> },
    MinInclusive { bound: String },
    MaxInclusive { bound: String },
    MinExclusive { bound: String },
    MaxExclusive { bound: String },
    TotalDigits { expected: u32 },
    FractionDigits { expected: u32 },
    NotLexicallyValid,
}

impl std::fmt::Display for FacetFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FacetFailure::Length { expected, found } => {
                write!(f, "length must be exactly {}, found {}", expected, found)
            }
            FacetFailure::MinLength { expected, found } => {
                write!(f, "length must be at least {}, found {}", expected, found)
            }
            FacetFailure::MaxLength { expected, found } => {
                write!(f, "length must be at most {}, found {}", expected, found)
            }
            FacetFailure::Pattern { pattern } => write!(f, "does not match pattern `{}`", pattern),
            FacetFailure::Enumeration { allowed } => {
                write!(f, "not one of the enumerated values {:?}", allowed)
            }
            FacetFailure::MinInclusive { bound } => write!(f, "must be >= {}", bound),
            FacetFailure::MaxInclusive { bound } => write!(f, "must be <= {}", bound),
            FacetFailure::MinExclusive { bound } => write!(f, "must be > {}", bound),
            FacetFailure::MaxExclusive { bound } => write!(f, "must be < {}", bound),
            FacetFailure::TotalDigits { expected } => {
                write!(f, "must have at most {} total digits", expected)
            }
            FacetFailure::FractionDigits { expected } => {
                write!(f, "must have at most {} fraction digits", expected)
            }
            FacetFailure::NotLexicallyValid => write!(f, "is not lexically valid for this type"),
        }
    }
}

fn float_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[+-]?([0-9]+(\.[0-9]*)?|\.[0-9]+)([eE][+-]?[0-9]+)?$").unwrap()
    })
}

/// Whether `normalized` is in the `float`/`double` lexical space: the usual
/// decimal-with-optional-exponent form, or one of the three special
/// literals `INF`, `-INF`, `NaN` (§4.7).
fn is_valid_float_lexical(normalized: &str) -> bool {
    matches!(normalized, "INF" | "-INF" | "NaN") || float_pattern().is_match(normalized)
}

/// Validates `normalized` (already whitespace-normalized) against `facets`,
/// plus any lexical-space check tied to `primitive` that a facet alone
/// cannot express (`float`/`double`'s `INF`/`-INF`/`NaN` literals included).
/// Does not re-check the base type's own facets; callers walk the base
/// chain themselves via [`crate::xsd::schema::Schema::effective_attributes`]
/// -style traversal where inheritance matters.
pub fn check_facets(
    facets: &Facets,
    primitive: Option<Primitive>,
    normalized: &str,
) -> Result<(), FacetFailure> {
    if matches!(primitive, Some(Primitive::Float) | Some(Primitive::Double))
        && !is_valid_float_lexical(normalized)
    {
        return Err(FacetFailure::NotLexicallyValid);
    }
    let len = normalized.chars().count();
    if let Some(expected) = facets.length {
        if len != expected {
            return Err(FacetFailure::Length { expected, found: len });
        }
    }
    if let Some(expected) = facets.min_length {
        if len < expected {
            return Err(FacetFailure::MinLength { expected, found: len });
        }
    }
    if let Some(expected) = facets.max_length {
        if len > expected {
            return Err(FacetFailure::MaxLength { expected, found: len });
        }
    }
    for pattern in &facets.patterns {
        if !pattern.is_match(normalized) {
            return Err(FacetFailure::Pattern { pattern: pattern.as_str().to_string() });
        }
    }
    if let Some(allowed) = &facets.enumeration {
        if !allowed.iter().any(|v| v == normalized) {
            return Err(FacetFailure::Enumeration { allowed: allowed.clone() });
        }
    }
    if let Ok(numeric) = normalized.parse::<f64>() {
        if let Some(bound) = facets.min_inclusive {
            if numeric < bound {
                return Err(FacetFailure::MinInclusive { bound: bound.to_string() });
            }
        }
        if let Some(bound) = facets.max_inclusive {
            if numeric > bound {
                return Err(FacetFailure::MaxInclusive { bound: bound.to_string() });
            }
        }
        if let Some(bound) = facets.min_exclusive {
            if numeric <= bound {
                return Err(FacetFailure::MinExclusive { bound: bound.to_string() });
            }
        }
        if let Some(bound) = facets.max_exclusive {
            if numeric >= bound {
                return Err(FacetFailure::MaxExclusive { bound: bound.to_string() });
            }
        }
        if facets.total_digits.is_some() || facets.fraction_digits.is_some() {
            let (total, fraction) = count_digits(normalized);
            if let Some(expected) = facets.total_digits {
                if total > expected {
                    return Err(FacetFailure::TotalDigits { expected });
                }
            }
            if let Some(expected) = facets.fraction_digits {
                if fraction > expected {
                    return Err(FacetFailure::FractionDigits { expected });
                }
            }
        }
    }
    Ok(())
}

/// A lexical value converted into its primitive's value space, the
/// post-schema-validation-infoset representation [`crate::xsd::validator::TypedValue`]
/// carries.
///
/// Calendar/duration primitives (`dateTime`, `date`, `duration`, ...) and
/// `QName`/`anyURI`/`NOTATION`/`base64Binary` are validated lexically (via
/// their builtin pattern facet) but have no richer conversion here: nothing
/// in this crate's dependency stack provides a calendar or base64 type, so
/// they fall back to [`ConvertedValue::Lexical`]. See `DESIGN.md`.
#[derive(Debug, Clone, PartialEq)]
pub enum ConvertedValue {
    String(String),
    Boolean(bool),
    Decimal(f64),
    Float(f32),
    Double(f64),
    HexBinary(Vec<u8>),
    List(Vec<ConvertedValue>),
    Lexical(String),
}

/// Converts `normalized` into the value space of `primitive`. The caller is
/// expected to have already run [`check_facets`] (and so [`is_valid_float_lexical`]
/// for `float`/`double`); this only fails on types whose lexical validity
/// isn't fully captured by a facet/pattern check, chiefly `boolean`, whose
/// four lexical forms are checked here rather than through a compiled
/// pattern.
pub fn convert_value(primitive: Option<Primitive>, normalized: &str) -> std::result::Result<ConvertedValue, String> {
    match primitive {
        None | Some(Primitive::String) => Ok(ConvertedValue::String(normalized.to_string())),
        Some(Primitive::Boolean) => match normalized {
            "true" | "1" => Ok(ConvertedValue::Boolean(true)),
            "false" | "0" => Ok(ConvertedValue::Boolean(false)),
            other => Err(format!("`{}` is not a valid boolean value", other)),
        },
        Some(Primitive::Decimal) => normalized
            .parse::<f64>()
            .map(ConvertedValue::Decimal)
            .map_err(|_| format!("`{}` is not a valid decimal value", normalized)),
        Some(Primitive::Float) => normalized
            .parse::<f32>()
            .map(ConvertedValue::Float)
            .map_err(|_| format!("`{}` is not a valid float value", normalized)),
        Some(Primitive::Double) => normalized
            .parse::<f64>()
            .map(ConvertedValue::Double)
            .map_err(|_| format!("`{}` is not a valid double value", normalized)),
        Some(Primitive::HexBinary) => decode_hex(normalized)
            .map(ConvertedValue::HexBinary)
            .ok_or_else(|| format!("`{}` is not valid hexBinary", normalized)),
        Some(_) => Ok(ConvertedValue::Lexical(normalized.to_string())),
    }
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len() / 2);
    for pair in bytes.chunks(2) {
        let hi = (pair[0] as char).to_digit(16)?;
        let lo = (pair[1] as char).to_digit(16)?;
        out.push(((hi as u8) << 4) | lo as u8);
    }
    Some(out)
}

fn count_digits(s: &str) -> (u32, u32) {
    let trimmed = s.trim_start_matches(['+', '-']);
    let mut total = 0u32;
    let mut fraction = 0u32;
    let mut seen_point = false;
    for c in trimmed.chars() {
        if c == '.' {
            seen_point = true;
            continue;
        }
        if c.is_ascii_digit() {
            total += 1;
            if seen_point {
                fraction += 1;
            }
        }
    }
    (total, fraction)
}

/// Checks a list-type value (whitespace-separated items) against a simple
/// type's own facets (applied to the item count/members, not to the whole
/// string) plus each item against `item_check`.
pub fn check_list_items<'a>(
    normalized: &'a str,
    facets: &Facets,
    mut item_check: impl FnMut(&'a str) -> Result<(), FacetFailure>,
) -> Result<(), FacetFailure> {
    let items: Vec<&str> = normalized.split_whitespace().collect();
    if let Some(expected) = facets.length {
        if items.len() != expected {
            return Err(FacetFailure::Length { expected, found: items.len() });
        }
    }
    if let Some(expected) = facets.min_length {
        if items.len() < expected {
            return Err(FacetFailure::MinLength { expected, found: items.len() });
        }
    }
    if let Some(expected) = facets.max_length {
        if items.len() > expected {
            return Err(FacetFailure::MaxLength { expected, found: items.len() });
        }
    }
    for item in items {
        item_check(item)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_facet_rejects_wrong_length() {
        let facets = Facets { length: Some(3), ..Facets::default() };
        assert!(check_facets(&facets, None, "abc").is_ok());
        assert_eq!(
            check_facets(&facets, None, "ab"),
            Err(FacetFailure::Length { expected: 3, found: 2 })
        );
    }

    #[test]
    fn pattern_facet_checks_regex() {
        let pattern = Arc::new(Regex::new("^[0-9]+$").unwrap());
        let facets = Facets { patterns: vec![pattern], ..Facets::default() };
        assert!(check_facets(&facets, None, "12345").is_ok());
        assert!(check_facets(&facets, None, "12a45").is_err());
    }

    #[test]
    fn range_facets_apply_to_numeric_values() {
        let facets = Facets {
            min_inclusive: Some(0.0),
            max_exclusive: Some(10.0),
            ..Facets::default()
        };
        assert!(check_facets(&facets, None, "5").is_ok());
        assert!(check_facets(&facets, None, "10").is_err());
        assert!(check_facets(&facets, None, "-1").is_err());
    }

    #[test]
    fn total_and_fraction_digits_are_counted_without_sign_or_point() {
        let facets = Facets {
            total_digits: Some(4),
            fraction_digits: Some(2),
            ..Facets::default()
        };
        assert!(check_facets(&facets, None, "-12.34").is_ok());
        assert!(check_facets(&facets, None, "123.45").is_err());
    }

    #[test]
    fn list_items_are_each_checked() {
        let facets = Facets::default();
        let mut seen = Vec::new();
        check_facets(&facets, None, "1 2 3").unwrap();
        check_list_items("1 2 3", &facets, |item| {
            seen.push(item.to_string());
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec!["1", "2", "3"]);
    }

    #[test]
    fn float_rejects_non_numeric_garbage() {
        let facets = Facets::default();
        assert_eq!(
            check_facets(&facets, Some(Primitive::Float), "not a number"),
            Err(FacetFailure::NotLexicallyValid)
        );
        assert_eq!(
            check_facets(&facets, Some(Primitive::Double), "12,34"),
            Err(FacetFailure::NotLexicallyValid)
        );
    }

    #[test]
    fn float_accepts_ordinary_forms_and_the_special_literals() {
        let facets = Facets::default();
        for value in ["3.14", "-3.14", "42", "1.2e10", "-1.2E-10", "INF", "-INF", "NaN"] {
            assert!(
                check_facets(&facets, Some(Primitive::Float), value).is_ok(),
                "expected {:?} to be a valid float",
                value
            );
        }
    }

    #[test]
    fn convert_value_parses_into_the_primitive_value_space() {
        assert_eq!(
            convert_value(Some(Primitive::Boolean), "true"),
            Ok(ConvertedValue::Boolean(true))
        );
        assert_eq!(
            convert_value(Some(Primitive::Boolean), "0"),
            Ok(ConvertedValue::Boolean(false))
        );
        assert!(convert_value(Some(Primitive::Boolean), "yes").is_err());
        assert_eq!(
            convert_value(Some(Primitive::Decimal), "-12.5"),
            Ok(ConvertedValue::Decimal(-12.5))
        );
        assert_eq!(
            convert_value(Some(Primitive::Double), "INF"),
            Ok(ConvertedValue::Double(f64::INFINITY))
        );
        assert_eq!(
            convert_value(Some(Primitive::HexBinary), "0FB7"),
            Ok(ConvertedValue::HexBinary(vec![0x0F, 0xB7]))
        );
        assert!(convert_value(Some(Primitive::HexBinary), "0FB").is_err());
    }
}
