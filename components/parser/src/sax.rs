//! Push interface over the pull reader.

use crate::dtd::DocTypeDecl;
use crate::{Attribute, XmlDecl};

/// Receives the events of [`XmlParser::parse_with`](crate::XmlParser::parse_with).
///
/// Every method defaults to doing nothing. Text may be split over several
/// [`characters`](ContentHandler::characters) calls, entity references
/// arrive already expanded.
pub trait ContentHandler {
    fn xml_declaration(&mut self, _decl: &XmlDecl) {}

    fn doctype(&mut self, _decl: &DocTypeDecl) {}

    fn start_element(&mut self, _name: &str, _attributes: &[Attribute]) {}

    fn end_element(&mut self, _name: &str) {}

    fn characters(&mut self, _text: &str) {}

    fn processing_instruction(&mut self, _target: &str, _data: Option<&str>) {}

    fn comment(&mut self, _text: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::XmlParser;

    #[derive(Default)]
    struct Collector {
        log: Vec<String>,
    }

    impl ContentHandler for Collector {
        fn start_element(&mut self, name: &str, attributes: &[Attribute]) {
            let attributes: Vec<String> = attributes
                .iter()
                .map(|attr| format!(" {}={}", attr.name(), attr.value()))
                .collect();
            self.log.push(format!("<{}{}>", name, attributes.concat()));
        }

        fn end_element(&mut self, name: &str) {
            self.log.push(format!("</{}>", name));
        }

        fn characters(&mut self, text: &str) {
            self.log.push(text.to_string());
        }
    }

    #[test]
    fn events_in_order() {
        let mut parser = XmlParser::default();
        let mut collector = Collector::default();
        parser
            .parse_with(
                "<!DOCTYPE r [<!ENTITY e 'entity'>]><r a='&e;'><!-- skipped -->&e;<c/></r>",
                &mut collector,
            )
            .unwrap();
        assert_eq!(
            vec!["<r a=entity>", "entity", "<c>", "</c>", "</r>"],
            collector.log
        );
    }

    #[test]
    fn events_before_error() {
        let mut parser = XmlParser::default();
        let mut collector = Collector::default();
        let err = parser
            .parse_with("<r>text&undefined;</r>", &mut collector)
            .unwrap_err();
        assert_eq!(crate::ErrorKind::UndefinedEntity, err.kind());
        assert_eq!(vec!["<r>", "text"], collector.log);
    }
}
