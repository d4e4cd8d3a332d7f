//! Parser front end: the only way to create a [`Reader`].

use std::io::{self, Read};

use log::debug;

use crate::config::{ParserConfig, UndefinedEntities};
use crate::dtd::EntityTable;
use crate::encoding::decode;
use crate::error::{ParseError, Position};
use crate::reader::{EntityExpander, Reader};
use crate::resolver::EntityResolver;
use crate::sax::ContentHandler;
use crate::XmlEvent;

/// Hardened XML parser.
///
/// Configuration can only be changed between documents: a [`Reader`]
/// borrows the parser mutably for its whole lifetime. Entity state is reset
/// at the start of every document, the configuration is kept.
pub struct XmlParser {
    expander: EntityExpander,
}

impl XmlParser {
    pub fn new(config: ParserConfig) -> Self {
        Self {
            expander: EntityExpander::new(config),
        }
    }

    pub fn config(&self) -> &ParserConfig {
        self.expander.config()
    }

    pub fn max_entity_indirections(&self) -> usize {
        self.config().max_entity_indirections
    }

    pub fn set_max_entity_indirections(&mut self, value: usize) {
        self.expander.config_mut().max_entity_indirections = value;
    }

    pub fn max_entity_expansions(&self) -> u64 {
        self.config().max_entity_expansions
    }

    pub fn set_max_entity_expansions(&mut self, value: u64) {
        self.expander.config_mut().max_entity_expansions = value;
    }

    pub fn reset_dtd(&self) -> bool {
        self.config().reset_dtd
    }

    pub fn set_reset_dtd(&mut self, value: bool) {
        self.expander.config_mut().reset_dtd = value;
    }

    pub fn allow_external_dtd_subset(&self) -> bool {
        self.config().allow_external_dtd_subset
    }

    pub fn set_allow_external_dtd_subset(&mut self, value: bool) {
        self.expander.config_mut().allow_external_dtd_subset = value;
    }

    pub fn allow_external_general_entities(&self) -> bool {
        self.config().allow_external_general_entities
    }

    pub fn set_allow_external_general_entities(&mut self, value: bool) {
        self.expander.config_mut().allow_external_general_entities = value;
    }

    pub fn allow_external_parameter_entities(&self) -> bool {
        self.config().allow_external_parameter_entities
    }

    pub fn set_allow_external_parameter_entities(&mut self, value: bool) {
        self.expander.config_mut().allow_external_parameter_entities = value;
    }

    pub fn undefined_entities(&self) -> UndefinedEntities {
        self.config().undefined_entities
    }

    pub fn set_undefined_entities(&mut self, value: UndefinedEntities) {
        self.expander.config_mut().undefined_entities = value;
    }

    pub fn skip_denied_external_entities(&self) -> bool {
        self.config().skip_denied_external_entities
    }

    pub fn set_skip_denied_external_entities(&mut self, value: bool) {
        self.expander.config_mut().skip_denied_external_entities = value;
    }

    /// Resolver used for permitted external entities and DTD subsets.
    pub fn set_resolver(&mut self, resolver: impl EntityResolver + 'static) {
        self.expander.set_resolver(Box::new(resolver));
    }

    /// Entity nesting depth of the current state, 0 outside of a parse.
    pub fn current_indirection_depth(&self) -> usize {
        self.expander.budget().current_indirection_depth()
    }

    /// Characters produced by entity expansion in the last document.
    pub fn cumulative_expanded_chars(&self) -> u64 {
        self.expander.budget().cumulative_expanded_chars()
    }

    /// Entities declared by the last document.
    pub fn entities(&self) -> &EntityTable {
        self.expander.entities()
    }

    /// Drops declared entities and zeroes the counters.
    pub fn reset(&mut self) {
        self.expander.reset();
    }

    /// Pull reader over `input`, starting from fresh entity state.
    pub fn reader<'a>(&'a mut self, input: &'a str) -> Reader<'a> {
        self.reset();
        Reader::new(input, &mut self.expander)
    }

    /// Reads the whole document.
    pub fn parse_str(&mut self, input: &str) -> Result<Vec<XmlEvent<'static>>, ParseError> {
        let mut reader = self.reader(input);
        let mut events = vec![];
        while let Some(event) = reader.next()? {
            events.push(event.into_owned());
        }
        Ok(events)
    }

    /// Reads the whole document after decoding it.
    ///
    /// Decoding errors are reported at the start of the document.
    pub fn parse_bytes(&mut self, input: &[u8]) -> Result<Vec<XmlEvent<'static>>, ParseError> {
        let (text, encoding) =
            decode(input).map_err(|err| ParseError::new(err, Position::new(1, 1)))?;
        debug!("decoded {} bytes as {}", input.len(), encoding);
        self.parse_str(&text)
    }

    /// Reads the whole document from `read`.
    pub fn parse_read<R: Read>(&mut self, mut read: R) -> io::Result<Vec<XmlEvent<'static>>> {
        let mut input = vec![];
        read.read_to_end(&mut input)?;
        Ok(self.parse_bytes(&input)?)
    }

    /// Reads the document, reporting it to `handler`.
    ///
    /// The handler may already have seen events when an error is returned.
    pub fn parse_with<H: ContentHandler>(
        &mut self,
        input: &str,
        handler: &mut H,
    ) -> Result<(), ParseError> {
        let mut reader = self.reader(input);
        while let Some(event) = reader.next()? {
            match event {
                XmlEvent::XmlDecl(decl) => handler.xml_declaration(&decl),
                XmlEvent::Dtd(decl) => handler.doctype(&decl),
                XmlEvent::STag(stag) => handler.start_element(stag.name(), reader.attributes()),
                XmlEvent::ETag(etag) => handler.end_element(etag.name()),
                XmlEvent::Characters(text) => handler.characters(&text),
                XmlEvent::PI(pi) => handler.processing_instruction(pi.target(), pi.data()),
                XmlEvent::Comment(comment) => handler.comment(&comment),
            }
        }
        Ok(())
    }
}

impl Default for XmlParser {
    #[inline]
    fn default() -> Self {
        XmlParser::new(ParserConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setters() {
        let mut parser = XmlParser::default();
        parser.set_max_entity_indirections(3);
        parser.set_max_entity_expansions(10);
        parser.set_reset_dtd(true);
        parser.set_allow_external_dtd_subset(true);
        parser.set_allow_external_general_entities(true);
        parser.set_allow_external_parameter_entities(true);
        parser.set_undefined_entities(UndefinedEntities::Verbatim);
        parser.set_skip_denied_external_entities(true);

        assert_eq!(3, parser.max_entity_indirections());
        assert_eq!(10, parser.max_entity_expansions());
        assert!(parser.reset_dtd());
        assert!(parser.allow_external_dtd_subset());
        assert!(parser.allow_external_general_entities());
        assert!(parser.allow_external_parameter_entities());
        assert_eq!(UndefinedEntities::Verbatim, parser.undefined_entities());
        assert!(parser.skip_denied_external_entities());
    }

    #[test]
    fn setters_apply_to_next_document() {
        let mut parser = XmlParser::default();
        let doc = "<!DOCTYPE r [<!ENTITY a 'aaaa'>]><r>&a;</r>";
        assert!(parser.parse_str(doc).is_ok());
        parser.set_max_entity_expansions(3);
        assert!(parser.parse_str(doc).is_err());
    }

    #[test]
    fn state_after_parse() {
        let mut parser = XmlParser::default();
        parser
            .parse_str("<!DOCTYPE r [<!ENTITY a 'aaaa'>]><r>&a;&a;</r>")
            .unwrap();
        assert_eq!(8, parser.cumulative_expanded_chars());
        assert_eq!(0, parser.current_indirection_depth());
        assert_eq!(1, parser.entities().len());

        parser.reset();
        assert_eq!(0, parser.cumulative_expanded_chars());
        assert!(parser.entities().is_empty());
        assert_eq!(8 * 1024 * 1024, parser.max_entity_expansions());
    }

    #[test]
    fn parse_read() {
        let mut parser = XmlParser::default();
        let events = parser.parse_read(&b"<r>t</r>"[..]).unwrap();
        assert_eq!(
            vec![
                XmlEvent::stag("r", false),
                XmlEvent::characters("t"),
                XmlEvent::etag("r")
            ],
            events
        );

        let err = parser.parse_read(&b"<r>"[..]).unwrap_err();
        assert_eq!(io::ErrorKind::InvalidData, err.kind());
    }
}
