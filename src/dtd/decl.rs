//! Parses the DTD internal subset into declaration tables.
//!
//! Conditional sections (`<![INCLUDE[...]]>`/`<![IGNORE[...]]>`) are not
//! supported; they are rare outside SGML-derived DTDs and are not named by
//! anything this crate's specification requires, so a declaration using
//! one is reported as [`crate::errors::Error::MalformedDtd`] rather than
//! silently accepted or guessed at.

use std::collections::HashMap;

use crate::attributes::AttributeType;
use crate::errors::{Error, Result};
use crate::parser::entities::{EntitySource, EntityTable};

use super::content_model::{ContentModel, Particle};

/// A single `<!ATTLIST>` attribute definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttDef {
    /// The declared type.
    pub attr_type: AttributeType,
    /// The default-value clause.
    pub default: AttDefault,
}

/// The `#REQUIRED`/`#IMPLIED`/`#FIXED`/literal clause of an attribute
/// definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttDefault {
    /// `#REQUIRED`: the attribute must be present.
    Required,
    /// `#IMPLIED`: the attribute may be absent with no default value.
    Implied,
    /// `#FIXED "value"`: the attribute, if present, must equal `value`; if
    /// absent, it defaults to `value`.
    Fixed(String),
    /// A plain literal default value.
    Default(String),
}

/// A `<!NOTATION>` declaration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NotationDecl {
    /// The `PUBLIC` identifier, if any.
    pub public_id: Option<String>,
    /// The `SYSTEM` identifier, if any.
    pub system_id: Option<String>,
}

/// The declaration tables produced by parsing a document's DTD.
#[derive(Debug, Clone, Default)]
pub struct DtdTables {
    /// Declared element content models, by element name.
    pub elements: HashMap<String, ContentModel>,
    /// Declared attribute lists, by element name then attribute name.
    pub attlists: HashMap<String, HashMap<String, AttDef>>,
    /// Declared general and parameter entities.
    pub entities: EntityTable,
    /// Declared notations, by name.
    pub notations: HashMap<String, NotationDecl>,
}

/// The parsed `<!DOCTYPE ...>` header: root element name, external
/// identifier (if any) and the raw internal subset content (the bytes
/// between `[` and `]`, if present).
#[derive(Debug, Clone)]
pub struct DoctypeHeader<'a> {
    /// The document's declared root element name.
    pub name: &'a str,
    /// `PUBLIC`/`SYSTEM` identifiers for an external subset, if declared.
    pub external_id: Option<ExternalId>,
    /// The raw internal subset, if the declaration included one.
    pub internal_subset: Option<&'a str>,
}

/// A `PUBLIC`/`SYSTEM` external identifier pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalId {
    /// The `PUBLIC` literal, if present.
    pub public_id: Option<String>,
    /// The `SYSTEM` literal.
    pub system_id: String,
}

/// Parses the content of a `<!DOCTYPE ...>` token (excluding the
/// `<!DOCTYPE` introducer and the closing `>`, per
/// [`crate::tokenizer::Token::DocType`]).
pub fn parse_doctype_header(content: &str) -> Result<DoctypeHeader<'_>> {
    let mut rest = content.trim_start();
    let name_end = rest
        .find(|c: char| c.is_whitespace() || c == '[')
        .unwrap_or(rest.len());
    if name_end == 0 {
        return Err(Error::MalformedDtd("DOCTYPE is missing a root name".to_string()));
    }
    let name = &rest[..name_end];
    rest = rest[name_end..].trim_start();

    let external_id = if let Some(after) = rest.strip_prefix("SYSTEM") {
        let (lit, after) = take_literal(after.trim_start())?;
        rest = after.trim_start();
        Some(ExternalId { public_id: None, system_id: lit })
    } else if let Some(after) = rest.strip_prefix("PUBLIC") {
        let (pub_lit, after) = take_literal(after.trim_start())?;
        let (sys_lit, after) = take_literal(after.trim_start())?;
        rest = after.trim_start();
        Some(ExternalId { public_id: Some(pub_lit), system_id: sys_lit })
    } else {
        None
    };

    let internal_subset = if let Some(after) = rest.strip_prefix('[') {
        let end = after
            .rfind(']')
            .ok_or_else(|| Error::MalformedDtd("internal subset is missing `]`".to_string()))?;
        Some(&after[..end])
    } else {
        None
    };

    Ok(DoctypeHeader { name, external_id, internal_subset })
}

fn take_literal(s: &str) -> Result<(String, &str)> {
    let quote = s
        .chars()
        .next()
        .filter(|c| *c == '"' || *c == '\'')
        .ok_or_else(|| Error::MalformedDtd("expected a quoted literal".to_string()))?;
    let rest = &s[1..];
    let end = rest
        .find(quote)
        .ok_or_else(|| Error::MalformedDtd("unterminated literal".to_string()))?;
    Ok((rest[..end].to_string(), &rest[end + 1..]))
}

/// Parses the markup declarations of an internal subset into `tables`.
///
/// Parameter entity references are only expanded when they appear *between*
/// markup declarations. A `%name;` reference nested inside the text of a
/// single declaration (e.g. `<!ATTLIST book %common;>`) is a well-formedness
/// error in the internal subset — XML's `WFC: PEs in Internal Subset`
/// restricts such references to external subsets and to positions between
/// declarations, precisely so a standalone document can be parsed without
/// reading any external DTD.
pub fn parse_internal_subset(subset: &str, tables: &mut DtdTables) -> Result<()> {
    let mut rest = subset;
    loop {
        rest = skip_trivia(rest);
        if rest.is_empty() {
            return Ok(());
        }
        if let Some(after) = rest.strip_prefix('%') {
            let semi = after
                .find(';')
                .ok_or_else(|| Error::MalformedDtd("unterminated parameter entity reference".to_string()))?;
            let name = &after[..semi];
            let replacement = resolve_parameter_entity(name, tables)?;
            let mut combined = replacement;
            combined.push(' ');
            combined.push_str(&after[semi + 1..]);
            return parse_internal_subset(&combined, tables);
        }
        if !rest.starts_with("<!") && !rest.starts_with("<?") {
            return Err(Error::MalformedDtd(format!(
                "expected a markup declaration, found `{}`",
                &rest[..rest.len().min(16)]
            )));
        }
        if let Some(after) = rest.strip_prefix("<?") {
            let end = after
                .find("?>")
                .ok_or_else(|| Error::MalformedDtd("unterminated processing instruction".to_string()))?;
            rest = &after[end + 2..];
            continue;
        }
        let end = find_decl_end(rest)?;
        let raw_decl = &rest[..=end];
        if let Some(pos) = find_unquoted_percent(raw_decl) {
            return Err(Error::MalformedDtd(format!(
                "parameter entity reference inside a markup declaration is not permitted in the internal subset: `{}`",
                &raw_decl[pos..raw_decl.len().min(pos + 16)]
            )));
        }
        parse_one_declaration(raw_decl, tables)?;
        rest = &rest[end + 1..];
    }
}

/// Finds the byte offset of a parameter-entity *reference* (`%name;`, no
/// whitespace between `%` and the name) that is not inside a quoted
/// literal, i.e. nested inside a declaration's own text rather than
/// between declarations.
///
/// This deliberately does not flag the `%` in `<!ENTITY % name ...>`'s own
/// parameter-entity declaration syntax: that `%` is always followed by
/// whitespace before the name, per the `PEDecl` grammar, whereas a
/// reference has no whitespace between `%` and the name it addresses.
fn find_unquoted_percent(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut in_quote: Option<u8> = None;
    for (i, &b) in bytes.iter().enumerate() {
        match in_quote {
            Some(q) => {
                if b == q {
                    in_quote = None;
                }
            }
            None => match b {
                b'"' | b'\'' => in_quote = Some(b),
                b'%' => {
                    let next_is_name_char = bytes
                        .get(i + 1)
                        .map(|c| !c.is_ascii_whitespace())
                        .unwrap_or(false);
                    if next_is_name_char {
                        return Some(i);
                    }
                }
                _ => {}
            },
        }
    }
    None
}

fn resolve_parameter_entity(name: &str, tables: &DtdTables) -> Result<String> {
    match tables.entities.parameter(name) {
        Some(EntitySource::Internal(text)) => Ok(text.clone()),
        Some(EntitySource::External { .. }) => Err(Error::MalformedDtd(format!(
            "parameter entity `%{};` resolves to an external subset, which is not spliced inline",
            name
        ))),
        None => Err(Error::UnresolvedParameterEntity(name.to_string())),
    }
}

fn skip_trivia(mut s: &str) -> &str {
    loop {
        s = s.trim_start();
        if let Some(after) = s.strip_prefix("<!--") {
            match after.find("-->") {
                Some(end) => s = &after[end + 3..],
                None => return s,
            }
        } else {
            return s;
        }
    }
}

/// Finds the index of the `>` that closes the declaration starting at the
/// beginning of `s`, respecting quoted literals that may themselves
/// contain `>`.
fn find_decl_end(s: &str) -> Result<usize> {
    let bytes = s.as_bytes();
    let mut in_quote: Option<u8> = None;
    let mut depth = 0i32;
    for (i, &b) in bytes.iter().enumerate() {
        match in_quote {
            Some(q) => {
                if b == q {
                    in_quote = None;
                }
            }
            None => match b {
                b'"' | b'\'' => in_quote = Some(b),
                b'<' => depth += 1,
                b'>' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(i);
                    }
                }
                _ => {}
            },
        }
    }
    Err(Error::MalformedDtd("unterminated markup declaration".to_string()))
}

fn parse_one_declaration(decl: &str, tables: &mut DtdTables) -> Result<()> {
    let body = &decl[2..decl.len() - 1]; // strip `<!` and `>`
    let body = body.trim();
    if let Some(rest) = body.strip_prefix("ELEMENT") {
        parse_element_decl(rest.trim_start(), tables)
    } else if let Some(rest) = body.strip_prefix("ATTLIST") {
        parse_attlist_decl(rest.trim_start(), tables)
    } else if let Some(rest) = body.strip_prefix("ENTITY") {
        parse_entity_decl(rest.trim_start(), tables)
    } else if let Some(rest) = body.strip_prefix("NOTATION") {
        parse_notation_decl(rest.trim_start(), tables)
    } else {
        Err(Error::MalformedDtd(format!("unknown markup declaration `{}`", body)))
    }
}

fn take_name(s: &str) -> (&str, &str) {
    let end = s
        .find(|c: char| c.is_whitespace())
        .unwrap_or(s.len());
    (&s[..end], s[end..].trim_start())
}

fn parse_element_decl(rest: &str, tables: &mut DtdTables) -> Result<()> {
    let (name, rest) = take_name(rest);
    let content = if let Some(after) = rest.strip_prefix("EMPTY") {
        let _ = after;
        ContentModel::Empty
    } else if let Some(after) = rest.strip_prefix("ANY") {
        let _ = after;
        ContentModel::Any
    } else if rest.starts_with("(#PCDATA") {
        parse_mixed_content(rest)?
    } else if rest.starts_with('(') {
        ContentModel::Children(Particle::parse(rest)?.0)
    } else {
        return Err(Error::MalformedDtd(format!(
            "malformed content spec for element `{}`",
            name
        )));
    };
    tables.elements.insert(name.to_string(), content);
    Ok(())
}

fn parse_mixed_content(rest: &str) -> Result<ContentModel> {
    let end = rest
        .find(')')
        .ok_or_else(|| Error::MalformedDtd("unterminated mixed content model".to_string()))?;
    let inner = &rest[1..end];
    let names: Vec<String> = inner
        .split('|')
        .skip(1)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    Ok(ContentModel::Mixed(names))
}

fn parse_attlist_decl(rest: &str, tables: &mut DtdTables) -> Result<()> {
    let (elem_name, mut rest) = take_name(rest);
    let attlist = tables.attlists.entry(elem_name.to_string()).or_default();
    while !rest.is_empty() {
        let (attr_name, r) = take_name(rest);
        rest = r;
        let (attr_type, r) = parse_attribute_type(rest)?;
        rest = r.trim_start();
        let (default, r) = parse_att_default(rest)?;
        rest = r.trim_start();
        attlist.entry(attr_name.to_string()).or_insert(AttDef {
            attr_type,
            default,
        });
    }
    Ok(())
}

fn parse_attribute_type(s: &str) -> Result<(AttributeType, &str)> {
    if let Some(rest) = s.strip_prefix("CDATA") {
        return Ok((AttributeType::Cdata, rest.trim_start()));
    }
    if let Some(rest) = s.strip_prefix("IDREFS") {
        return Ok((AttributeType::IdRefs, rest.trim_start()));
    }
    if let Some(rest) = s.strip_prefix("IDREF") {
        return Ok((AttributeType::IdRef, rest.trim_start()));
    }
    if let Some(rest) = s.strip_prefix("ID") {
        return Ok((AttributeType::Id, rest.trim_start()));
    }
    if let Some(rest) = s.strip_prefix("ENTITIES") {
        return Ok((AttributeType::Entities, rest.trim_start()));
    }
    if let Some(rest) = s.strip_prefix("ENTITY") {
        return Ok((AttributeType::Entity, rest.trim_start()));
    }
    if let Some(rest) = s.strip_prefix("NMTOKENS") {
        return Ok((AttributeType::NmTokens, rest.trim_start()));
    }
    if let Some(rest) = s.strip_prefix("NMTOKEN") {
        return Ok((AttributeType::NmToken, rest.trim_start()));
    }
    if let Some(rest) = s.strip_prefix("NOTATION") {
        let rest = rest.trim_start();
        let (names, rest) = parse_name_list(rest)?;
        return Ok((AttributeType::Notation(names), rest));
    }
    if s.starts_with('(') {
        let (names, rest) = parse_name_list(s)?;
        return Ok((AttributeType::Enumeration(names), rest));
    }
    Err(Error::MalformedDtd(format!(
        "unrecognized attribute type at `{}`",
        &s[..s.len().min(24)]
    )))
}

fn parse_name_list(s: &str) -> Result<(Vec<String>, &str)> {
    let s = s
        .strip_prefix('(')
        .ok_or_else(|| Error::MalformedDtd("expected `(` in enumeration/NOTATION type".to_string()))?;
    let end = s
        .find(')')
        .ok_or_else(|| Error::MalformedDtd("unterminated enumeration/NOTATION type".to_string()))?;
    let names = s[..end]
        .split('|')
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect();
    Ok((names, s[end + 1..].trim_start()))
}

fn parse_att_default(s: &str) -> Result<(AttDefault, &str)> {
    if let Some(rest) = s.strip_prefix("#REQUIRED") {
        return Ok((AttDefault::Required, rest));
    }
    if let Some(rest) = s.strip_prefix("#IMPLIED") {
        return Ok((AttDefault::Implied, rest));
    }
    if let Some(rest) = s.strip_prefix("#FIXED") {
        let (lit, rest) = take_literal(rest.trim_start())?;
        return Ok((AttDefault::Fixed(lit), rest));
    }
    let (lit, rest) = take_literal(s)?;
    Ok((AttDefault::Default(lit), rest))
}

fn parse_entity_decl(rest: &str, tables: &mut DtdTables) -> Result<()> {
    let (is_parameter, rest) = match rest.strip_prefix('%') {
        Some(r) => (true, r.trim_start()),
        None => (false, rest),
    };
    let (name, rest) = take_name(rest);
    let source = if let Some(after) = rest.strip_prefix("SYSTEM") {
        let (sys, after) = take_literal(after.trim_start())?;
        let after = after.trim_start();
        let (ndata, _) = parse_ndata(after)?;
        EntitySource::External { public_id: None, system_id: sys, ndata }
    } else if let Some(after) = rest.strip_prefix("PUBLIC") {
        let (publ, after) = take_literal(after.trim_start())?;
        let (sys, after) = take_literal(after.trim_start())?;
        let after = after.trim_start();
        let (ndata, _) = parse_ndata(after)?;
        EntitySource::External { public_id: Some(publ), system_id: sys, ndata }
    } else {
        let (lit, _) = take_literal(rest)?;
        EntitySource::Internal(lit)
    };
    if is_parameter {
        tables.entities.declare_parameter(name, source);
    } else {
        tables.entities.declare_general(name, source);
    }
    Ok(())
}

fn parse_ndata(s: &str) -> Result<(Option<String>, &str)> {
    if let Some(rest) = s.strip_prefix("NDATA") {
        let (name, rest) = take_name(rest.trim_start());
        return Ok((Some(name.to_string()), rest));
    }
    Ok((None, s))
}

fn parse_notation_decl(rest: &str, tables: &mut DtdTables) -> Result<()> {
    let (name, rest) = take_name(rest);
    let decl = if let Some(after) = rest.strip_prefix("SYSTEM") {
        let (sys, _) = take_literal(after.trim_start())?;
        NotationDecl { public_id: None, system_id: Some(sys) }
    } else if let Some(after) = rest.strip_prefix("PUBLIC") {
        let (publ, after) = take_literal(after.trim_start())?;
        let after = after.trim_start();
        let sys = if after.starts_with('"') || after.starts_with('\'') {
            Some(take_literal(after)?.0)
        } else {
            None
        };
        NotationDecl { public_id: Some(publ), system_id: sys }
    } else {
        return Err(Error::MalformedDtd(format!(
            "malformed NOTATION declaration for `{}`",
            name
        )));
    };
    tables.notations.insert(name.to_string(), decl);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_with_internal_subset() {
        let header = parse_doctype_header("root [ <!ELEMENT root EMPTY> ]").unwrap();
        assert_eq!(header.name, "root");
        assert!(header.external_id.is_none());
        assert_eq!(header.internal_subset, Some(" <!ELEMENT root EMPTY> "));
    }

    #[test]
    fn parses_header_with_public_external_id() {
        let header =
            parse_doctype_header(r#"html PUBLIC "-//W3C//DTD HTML 4.01//EN" "http://w3.org/html.dtd""#)
                .unwrap();
        let ext = header.external_id.unwrap();
        assert_eq!(ext.public_id.as_deref(), Some("-//W3C//DTD HTML 4.01//EN"));
        assert_eq!(ext.system_id, "http://w3.org/html.dtd");
    }

    #[test]
    fn parses_element_and_attlist_and_entity_declarations() {
        let subset = r#"
            <!ELEMENT book (title, author*)>
            <!ATTLIST book id ID #REQUIRED lang CDATA "en">
            <!ENTITY publisher "Acme">
        "#;
        let mut tables = DtdTables::default();
        parse_internal_subset(subset, &mut tables).unwrap();
        assert!(matches!(tables.elements["book"], ContentModel::Children(_)));
        let attlist = &tables.attlists["book"];
        assert_eq!(attlist["id"].attr_type, AttributeType::Id);
        assert_eq!(attlist["id"].default, AttDefault::Required);
        assert_eq!(attlist["lang"].default, AttDefault::Default("en".to_string()));
        assert_eq!(
            tables.entities.general("publisher"),
            Some(&EntitySource::Internal("Acme".to_string()))
        );
    }

    #[test]
    fn parses_mixed_content_model() {
        let mut tables = DtdTables::default();
        parse_internal_subset("<!ELEMENT p (#PCDATA|b|i)*>", &mut tables).unwrap();
        match &tables.elements["p"] {
            ContentModel::Mixed(names) => assert_eq!(names, &vec!["b".to_string(), "i".to_string()]),
            other => panic!("expected Mixed, got {:?}", other),
        }
    }

    #[test]
    fn expands_parameter_entity_between_declarations() {
        let mut tables = DtdTables::default();
        parse_internal_subset(
            r#"<!ENTITY % common "<!ATTLIST book id ID #REQUIRED>">%common;"#,
            &mut tables,
        )
        .unwrap();
        assert_eq!(tables.attlists["book"]["id"].default, AttDefault::Required);
    }

    #[test]
    fn rejects_parameter_entity_reference_nested_inside_a_declaration() {
        let mut tables = DtdTables::default();
        tables
            .entities
            .declare_parameter("common", EntitySource::Internal("id ID #REQUIRED".to_string()));
        let err = parse_internal_subset(
            r#"<!ENTITY % common "id ID #REQUIRED"><!ATTLIST book %common;>"#,
            &mut tables,
        )
        .unwrap_err();
        assert_eq!(err.code(), "MalformedDtd");
    }
}
