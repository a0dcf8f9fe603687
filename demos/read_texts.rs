//! Collects the text content of every `<tag2>` element, demonstrating the
//! push API driven from a plain `main` instead of an async runtime.

use xmlbreak::attributes::Attributes;
use xmlbreak::errors::Result;
use xmlbreak::handler::{EventHandler, NullEntityResolver, SilentErrorHandler};
use xmlbreak::name::ResolvedName;
use xmlbreak::reader::XmlPushParser;

#[derive(Default)]
struct Tag2TextCollector {
    in_tag2: bool,
    collected: Vec<String>,
}

impl EventHandler for Tag2TextCollector {
    fn start_element(&mut self, name: &ResolvedName, _attrs: &Attributes) -> Result<()> {
        if name.qname.local_part() == "tag2" {
            self.in_tag2 = true;
        }
        Ok(())
    }

    fn end_element(&mut self, name: &ResolvedName) -> Result<()> {
        if name.qname.local_part() == "tag2" {
            self.in_tag2 = false;
        }
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        if self.in_tag2 {
            self.collected.push(text.to_string());
        }
        Ok(())
    }
}

fn main() {
    let xml = b"<tag1>text1</tag1><tag1>text2</tag1>\
               <tag1>text3</tag1><tag1><tag2>text4</tag2></tag1>";

    let mut parser = XmlPushParser::builder()
        .trim_text(true)
        .finish()
        .expect("default configuration is valid");
    let mut handler = Tag2TextCollector::default();

    parser
        .parse_all(
            xml,
            &mut handler,
            &mut SilentErrorHandler,
            &mut NullEntityResolver,
        )
        .expect("well-formed document");

    println!("{:?}", handler.collected);
}
