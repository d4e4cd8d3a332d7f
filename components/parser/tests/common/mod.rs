#![allow(dead_code)]

use std::path::PathBuf;

pub fn testdata_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/xmltestdata")
}

pub fn testdata(name: &str) -> Vec<u8> {
    std::fs::read(testdata_dir().join(name)).unwrap()
}

/// Document nesting `depth` entity references below its root.
pub fn entity_chain(depth: usize) -> String {
    let mut doc = String::from("<!DOCTYPE r [\n<!ENTITY e1 \"x\">\n");
    for i in 2..=depth {
        doc.push_str(&format!("<!ENTITY e{} \"&e{};\">\n", i, i - 1));
    }
    doc.push_str(&format!("]>\n<r>&e{};</r>", depth));
    doc
}

pub fn quadratic_bomb(mark: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE bomb [\n\
         <!ENTITY a \"{}\" >\n\
         <!ENTITY b \"&a;&a;\" >\n\
         <!ENTITY c \"&b;&b;\" >\n\
         ]>\n\
         <bomb>{}</bomb>",
        mark, body
    )
}
