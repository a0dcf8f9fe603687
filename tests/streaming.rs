use xmlbreak::attributes::Attributes;
use xmlbreak::errors::Result;
use xmlbreak::handler::{EventHandler, NullEntityResolver, SilentErrorHandler};
use xmlbreak::name::ResolvedName;
use xmlbreak::reader::XmlPushParser;

use pretty_assertions::assert_eq;

#[derive(Default)]
struct StartCounter {
    count: u32,
}

impl EventHandler for StartCounter {
    fn start_element(&mut self, _name: &ResolvedName, _attrs: &Attributes) -> Result<()> {
        self.count += 1;
        Ok(())
    }
}

fn sample_rss() -> &'static [u8] {
    br#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Example feed</title>
    <item><title>One</title></item>
    <item><title>Two</title></item>
    <item><title>Three</title></item>
  </channel>
</rss>"#
}

#[test]
fn counts_start_elements_across_the_whole_document() {
    let mut parser = XmlPushParser::new();
    let mut handler = StartCounter::default();
    parser
        .parse_all(
            sample_rss(),
            &mut handler,
            &mut SilentErrorHandler,
            &mut NullEntityResolver,
        )
        .unwrap();
    assert_eq!(handler.count, 9);
}

#[test]
fn fed_one_byte_at_a_time_produces_the_same_count() {
    let mut parser = XmlPushParser::new();
    let mut handler = StartCounter::default();
    for byte in sample_rss() {
        parser
            .receive_simple(std::slice::from_ref(byte), &mut handler)
            .unwrap();
    }
    parser.close_simple(&mut handler).unwrap();
    assert_eq!(handler.count, 9);
}

#[test]
fn xml_1_1_declaration_is_accepted() {
    let mut parser = XmlPushParser::new();
    let mut handler = StartCounter::default();
    parser
        .parse_all(
            b"<?xml version=\"1.1\" encoding='utf-8'?><r/>",
            &mut handler,
            &mut SilentErrorHandler,
            &mut NullEntityResolver,
        )
        .unwrap();
    assert_eq!(handler.count, 1);
}

#[test]
fn xml_declaration_must_come_first() {
    let mut parser = XmlPushParser::new();
    let mut handler = StartCounter::default();
    let err = parser
        .parse_all(
            b"<r/><?xml version=\"1.0\"?>",
            &mut handler,
            &mut SilentErrorHandler,
            &mut NullEntityResolver,
        )
        .unwrap_err();
    assert_eq!(err.code(), "XmlDeclNotAtStart");
}
