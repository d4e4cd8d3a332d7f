use std::collections::HashMap;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use defused_xml::{XmlEvent, XmlParser};

const MINIMAL: &str = "<e/>";
const XML_BOMB: &[u8] = include_bytes!("../tests/xmltestdata/xmlbomb.xml");
const QUADRATIC: &[u8] = include_bytes!("../tests/xmltestdata/quadratic.xml");

fn catalog(items: usize) -> String {
    let mut doc = String::from(
        "<!DOCTYPE catalog [\n\
         <!ENTITY vendor \"ACME &amp; Sons\">\n\
         <!ENTITY currency \"EUR\">\n\
         <!ENTITY price \"<price currency='&currency;'>9.99</price>\">\n\
         ]>\n<catalog>",
    );
    for i in 0..items {
        doc.push_str(&format!(
            "<item id='{}' vendor='&vendor;'><name>Item {}</name>&price;</item>",
            i, i
        ));
    }
    doc.push_str("</catalog>");
    doc
}

fn count_elements(parser: &mut XmlParser, input: &str) -> HashMap<String, usize> {
    let mut elems = HashMap::new();
    let mut reader = parser.reader(input);
    while let Some(evt) = reader.next().unwrap() {
        if let XmlEvent::STag(stag) = evt {
            *elems.entry(stag.name().to_string()).or_insert(0) += 1;
        }
    }
    elems
}

pub fn minimal_benchmark(c: &mut Criterion) {
    let mut parser = XmlParser::default();
    c.bench_function("minimal", |b| {
        b.iter(|| count_elements(&mut parser, black_box(MINIMAL)))
    });
}

pub fn expansion_benchmark(c: &mut Criterion) {
    let input = catalog(1000);
    let mut group = c.benchmark_group("catalog");
    group.bench_with_input("limited", &input, |b, i| {
        let mut parser = XmlParser::default();
        b.iter(|| count_elements(&mut parser, black_box(i)))
    });
    group.bench_with_input("unlimited", &input, |b, i| {
        let mut parser = XmlParser::default();
        parser.set_max_entity_indirections(0);
        parser.set_max_entity_expansions(0);
        b.iter(|| count_elements(&mut parser, black_box(i)))
    });
    group.finish();
}

pub fn bomb_benchmark(c: &mut Criterion) {
    let mut parser = XmlParser::default();
    c.bench_function("billion laughs", |b| {
        b.iter(|| parser.parse_bytes(black_box(XML_BOMB)).unwrap_err())
    });
    c.bench_function("quadratic blowup", |b| {
        b.iter(|| parser.parse_bytes(black_box(QUADRATIC)).unwrap_err())
    });
}

criterion_group!(benches, minimal_benchmark, expansion_benchmark, bomb_benchmark);
criterion_main!(benches);
