use criterion::{black_box, criterion_group, criterion_main, Criterion};

use xmlbreak::attributes::Attributes;
use xmlbreak::errors::Result;
use xmlbreak::handler::{EventHandler, NullEntityResolver, SilentErrorHandler};
use xmlbreak::name::ResolvedName;
use xmlbreak::reader::XmlPushParser;

#[derive(Default)]
struct CountingHandler {
    starts: u64,
    chars_len: usize,
}

impl EventHandler for CountingHandler {
    fn start_element(&mut self, _name: &ResolvedName, _attrs: &Attributes) -> Result<()> {
        self.starts += 1;
        Ok(())
    }
    fn characters(&mut self, text: &str) -> Result<()> {
        self.chars_len += text.len();
        Ok(())
    }
}

/// A synthetic RSS-shaped document, built in memory rather than read from a
/// fixture file.
fn sample_document(items: usize) -> Vec<u8> {
    let mut doc = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><rss version=\"2.0\"><channel><title>Benchmark feed</title>",
    );
    for i in 0..items {
        doc.push_str(&format!(
            "<item id=\"{i}\"><title>Entry {i}</title><description>Lorem ipsum dolor sit amet, consectetur adipiscing elit, number {i}.</description></item>"
        ));
    }
    doc.push_str("</channel></rss>");
    doc.into_bytes()
}

fn parse_whole(c: &mut Criterion) {
    let doc = sample_document(500);
    c.bench_function("parse_whole/one_shot_receive", |b| {
        b.iter(|| {
            let mut parser = XmlPushParser::new();
            let mut handler = CountingHandler::default();
            parser
                .parse_all(
                    black_box(&doc),
                    &mut handler,
                    &mut SilentErrorHandler,
                    &mut NullEntityResolver,
                )
                .unwrap();
            assert_eq!(handler.starts, 500 * 3 + 2);
        });
    });
}

fn parse_chunked(c: &mut Criterion) {
    let doc = sample_document(200);
    let mut group = c.benchmark_group("parse_chunked");
    for chunk_size in [1usize, 16, 256] {
        group.bench_function(format!("chunk_size_{chunk_size}"), |b| {
            b.iter(|| {
                let mut parser = XmlPushParser::new();
                let mut handler = CountingHandler::default();
                for chunk in doc.chunks(chunk_size) {
                    parser
                        .receive_simple(black_box(chunk), &mut handler)
                        .unwrap();
                }
                parser.close_simple(&mut handler).unwrap();
                assert_eq!(handler.starts, 200 * 3 + 2);
            });
        });
    }
    group.finish();
}

fn attribute_heavy_element(c: &mut Criterion) {
    let mut doc = String::from("<root>");
    for i in 0..200 {
        doc.push_str(&format!(
            "<row id=\"{i}\" status=\"ok\" score=\"{}\" name=\"row-{i}\"/>",
            i as f64 / 3.0
        ));
    }
    doc.push_str("</root>");
    let doc = doc.into_bytes();

    c.bench_function("attribute_heavy_element/receive", |b| {
        b.iter(|| {
            let mut parser = XmlPushParser::new();
            let mut handler = CountingHandler::default();
            parser
                .parse_all(
                    black_box(&doc),
                    &mut handler,
                    &mut SilentErrorHandler,
                    &mut NullEntityResolver,
                )
                .unwrap();
            assert_eq!(handler.starts, 201);
        });
    });
}

criterion_group!(benches, parse_whole, parse_chunked, attribute_heavy_element);
criterion_main!(benches);
