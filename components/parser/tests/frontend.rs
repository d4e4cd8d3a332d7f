use std::fs::File;

use defused_xml::{
    Attribute, ContentHandler, DocTypeDecl, ErrorKind, ParserConfig, Position, UndefinedEntities,
    XmlDecl, XmlEvent, XmlParser,
};

mod common;

use common::testdata_dir;

mod undefined_entities {
    use super::*;

    #[test]
    fn fatal_by_default() {
        let mut parser = XmlParser::default();
        let err = parser.parse_str("<r>\n  &nope;</r>").unwrap_err();
        assert_eq!("undefined entity &nope;: line 2, column 3", err.to_string());
    }

    #[test]
    fn verbatim() {
        let mut parser = ParserConfig::new()
            .undefined_entities(UndefinedEntities::Verbatim)
            .build();
        let mut reader = parser.reader("<r a='x&nope;'>&nope;&amp;</r>");
        assert_eq!(Ok(Some(XmlEvent::stag("r", false))), reader.next());
        assert_eq!("x&nope;", reader.attributes()[0].value());
        assert_eq!(Ok(Some(XmlEvent::characters("&nope;"))), reader.next());
        assert_eq!(Ok(Some(XmlEvent::characters("&"))), reader.next());
        assert_eq!(Ok(Some(XmlEvent::etag("r"))), reader.next());
        assert_eq!(Ok(None), reader.next());
    }

    #[test]
    fn verbatim_does_not_count() {
        let mut parser = ParserConfig::new()
            .undefined_entities(UndefinedEntities::Verbatim)
            .max_entity_expansions(1)
            .build();
        assert!(parser.parse_str("<r>&nope;&nope;&nope;</r>").is_ok());
        assert_eq!(0, parser.cumulative_expanded_chars());
    }
}

mod declarations {
    use super::*;

    #[test]
    fn first_declaration_wins() {
        let mut parser = XmlParser::default();
        let events = parser
            .parse_str("<!DOCTYPE r [<!ENTITY a 'first'><!ENTITY a 'second'>]><r>&a;</r>")
            .unwrap();
        assert!(events.contains(&XmlEvent::characters("first")));
        assert_eq!(1, parser.entities().len());
    }

    #[test]
    fn markup_in_entities() {
        let mut parser = XmlParser::default();
        let events = parser
            .parse_str("<!DOCTYPE r [<!ENTITY e '<b>bold</b> &amp; more'>]><r>&e;</r>")
            .unwrap();
        assert_eq!(
            vec![
                XmlEvent::stag("r", false),
                XmlEvent::stag("b", false),
                XmlEvent::characters("bold"),
                XmlEvent::etag("b"),
                XmlEvent::characters(" "),
                XmlEvent::characters("&"),
                XmlEvent::characters(" more"),
                XmlEvent::etag("r"),
            ],
            events[1..]
        );
    }

    #[test]
    fn entities_do_not_leak_between_documents() {
        let mut parser = XmlParser::default();
        assert!(parser
            .parse_str("<!DOCTYPE r [<!ENTITY a 'x'>]><r>&a;</r>")
            .is_ok());
        let err = parser.parse_str("<r>&a;</r>").unwrap_err();
        assert_eq!(ErrorKind::UndefinedEntity, err.kind());
    }
}

mod reader {
    use super::*;

    #[test]
    fn element_state() {
        let mut parser = XmlParser::default();
        let mut reader = parser.reader("<a><b x='1' y='&lt;'/></a>");
        assert_eq!(Ok(Some(XmlEvent::stag("a", false))), reader.next());
        assert_eq!(Some("a"), reader.top_name());
        assert_eq!(Ok(Some(XmlEvent::stag("b", true))), reader.next());
        assert_eq!(Some("b"), reader.top_name());
        assert_eq!(
            vec![Attribute::new("x", "1"), Attribute::new("y", "<")],
            reader.drain_attributes()
        );
        assert!(reader.attributes().is_empty());
        assert_eq!(Ok(Some(XmlEvent::etag("b"))), reader.next());
        assert_eq!(Some("a"), reader.top_name());
        assert_eq!(Ok(Some(XmlEvent::etag("a"))), reader.next());
        assert_eq!(None, reader.top_name());
        assert_eq!(Position::new(1, 27), reader.position());
    }

    #[test]
    fn declared_entities() {
        let mut parser = XmlParser::default();
        parser
            .parse_str("<!DOCTYPE r [<!ENTITY a 'x'><!ENTITY % p 'y'>]><r/>")
            .unwrap();
        let mut names: Vec<&str> = parser.entities().iter().map(|entity| entity.name()).collect();
        names.sort_unstable();
        assert_eq!(vec!["a", "p"], names);
    }
}

#[cfg(feature = "serde")]
mod config {
    use super::*;

    #[test]
    fn from_json() {
        let config: ParserConfig = serde_json::from_str(
            r#"{"max_entity_expansions": 100, "undefined_entities": "verbatim"}"#,
        )
        .unwrap();
        assert_eq!(
            ParserConfig::new()
                .max_entity_expansions(100)
                .undefined_entities(UndefinedEntities::Verbatim),
            config
        );
    }

    #[test]
    fn to_json() {
        let json = serde_json::to_value(ParserConfig::default()).unwrap();
        assert_eq!(serde_json::json!(40), json["max_entity_indirections"]);
        assert_eq!(serde_json::json!(8388608), json["max_entity_expansions"]);
        assert_eq!(serde_json::json!("fatal"), json["undefined_entities"]);
        assert_eq!(serde_json::json!(false), json["allow_external_dtd_subset"]);
    }
}

mod bytes {
    use super::*;

    #[test]
    fn utf8_with_bom() {
        let mut parser = XmlParser::default();
        let events = parser.parse_bytes(b"\xEF\xBB\xBF<r>\xC3\xA4</r>").unwrap();
        assert_eq!(XmlEvent::characters("\u{e4}"), events[1]);
    }

    #[test]
    fn malformed_utf8() {
        let mut parser = XmlParser::default();
        let err = parser.parse_bytes(b"<r>\xFF</r>").unwrap_err();
        assert_eq!(ErrorKind::Syntax, err.kind());
        assert_eq!(Position::new(1, 1), err.position());
    }

    #[test]
    #[cfg(feature = "encoding")]
    fn declared_encoding() {
        let mut parser = XmlParser::default();
        let events = parser
            .parse_bytes(b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><r>caf\xE9</r>")
            .unwrap();
        assert_eq!(XmlEvent::characters("caf\u{e9}"), events[2]);
    }

    #[test]
    #[cfg(feature = "encoding")]
    fn utf16_with_bom() {
        let input: Vec<u8> = "\u{feff}<r>\u{e4}</r>"
            .encode_utf16()
            .flat_map(|unit| unit.to_le_bytes())
            .collect();
        let mut parser = XmlParser::default();
        let events = parser.parse_bytes(&input).unwrap();
        assert_eq!(
            vec![
                XmlEvent::stag("r", false),
                XmlEvent::characters("\u{e4}"),
                XmlEvent::etag("r"),
            ],
            events
        );
    }

    #[test]
    fn from_file() {
        let mut parser = ParserConfig::new().max_entity_indirections(3).build();
        let file = File::open(testdata_dir().join("xmlbomb.xml")).unwrap();
        let err = parser.parse_read(file).unwrap_err();
        assert_eq!(std::io::ErrorKind::InvalidData, err.kind());
        assert_eq!(
            "entity indirection limit exceeded: line 14, column 7",
            err.to_string()
        );
    }
}

mod content_handler {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        log: Vec<String>,
    }

    impl ContentHandler for Recorder {
        fn xml_declaration(&mut self, decl: &XmlDecl) {
            self.log.push(format!("decl {}", decl.version()));
        }

        fn doctype(&mut self, decl: &DocTypeDecl) {
            self.log.push(format!("doctype {}", decl.name()));
        }

        fn start_element(&mut self, name: &str, attributes: &[Attribute]) {
            let attributes: Vec<String> = attributes
                .iter()
                .map(|attr| format!(" {}={:?}", attr.name(), attr.value()))
                .collect();
            self.log.push(format!("<{}{}>", name, attributes.concat()));
        }

        fn end_element(&mut self, name: &str) {
            self.log.push(format!("</{}>", name));
        }

        fn characters(&mut self, text: &str) {
            self.log.push(text.to_string());
        }

        fn processing_instruction(&mut self, target: &str, data: Option<&str>) {
            self.log.push(format!("pi {} {:?}", target, data));
        }

        fn comment(&mut self, text: &str) {
            self.log.push(format!("comment {}", text));
        }
    }

    #[test]
    fn all_events() {
        let mut parser = XmlParser::default();
        let mut recorder = Recorder::default();
        parser
            .parse_with(
                "<?xml version='1.0'?><!-- c --><!DOCTYPE doc [<!ENTITY who 'world'>]>\
                 <doc greeting='hello &who;'><?app run?>&who;<empty/></doc>",
                &mut recorder,
            )
            .unwrap();
        assert_eq!(
            vec![
                "decl 1.0",
                "comment  c ",
                "doctype doc",
                "<doc greeting=\"hello world\">",
                "pi app Some(\"run\")",
                "world",
                "<empty>",
                "</empty>",
                "</doc>",
            ],
            recorder.log
        );
    }

    #[test]
    fn stops_at_bomb() {
        let mut parser = ParserConfig::new().max_entity_expansions(12).build();
        let mut recorder = Recorder::default();
        let err = parser
            .parse_with(
                "<!DOCTYPE r [<!ENTITY a '01234'><!ENTITY b '&a;&a;'>]><r>&b;</r>",
                &mut recorder,
            )
            .unwrap_err();
        assert_eq!(ErrorKind::ExpansionLimitExceeded, err.kind());
        assert_eq!(vec!["doctype r", "<r>", "01234"], recorder.log);
    }
}
