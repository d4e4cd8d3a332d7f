//! Document type declaration and markup declarations.
//!
//! Only entity declarations have an effect. Element, attribute-list and
//! notation declarations are checked for termination and skipped.

use std::rc::Rc;

use defused_chars::{XmlAsciiChar, XmlChar};

use crate::dtd::{DocTypeDecl, Entity, EntityKind, ExternalId};
use crate::error::{AtOffset, Failure};
use crate::parser::core::optional;
use crate::parser::{Cursor, Parser};
use crate::reader::expander::{EntityExpander, RefContext, Resolution};
use crate::reader::tokens::{
    check_xml_chars, expect_byte, xml_lit, CommentToken, NameToken, PIToken, PeReferenceToken,
    QuotedToken, SToken,
};
use crate::XmlError;

// 2.8 Prolog and Document Type Declaration

/// Parses `doctypedecl`, declaring its entities into `expander`.
///
/// `doctypedecl ::= '<!DOCTYPE' S Name (S ExternalID)? S? ('[' intSubset ']' S?)? '>'`
///
/// The external subset is processed after the internal one, so internal
/// declarations take precedence.
pub(crate) fn parse_doctype<'a>(
    expander: &mut EntityExpander,
    cursor: Cursor<'a>,
) -> Result<(DocTypeDecl, Cursor<'a>), Failure> {
    let start = cursor.offset();
    let (_, cursor) = xml_lit("<!DOCTYPE").parse(cursor).at(start)?;
    let (_, cursor) = SToken.parse(cursor).at(cursor.offset())?;
    let (name, cursor) = NameToken.parse(cursor).at(cursor.offset())?;
    let (external_id, cursor) = optional(SpacedExternalId).parse(cursor).at(cursor.offset())?;
    let (_, cursor) = optional(SToken).parse(cursor).at(cursor.offset())?;

    let mut subset = SubsetReader::new(expander);
    let (has_int_subset, cursor) = if cursor.has_next_byte(b'[') {
        let cursor = subset.run(cursor.advance(1), false)?;
        let cursor = expect_byte(cursor, b']', || XmlError::ExpectToken("]")).at(cursor.offset())?;
        let (_, cursor) = optional(SToken).parse(cursor).at(cursor.offset())?;
        (true, cursor)
    } else {
        (false, cursor)
    };
    let cursor = expect_byte(cursor, b'>', || XmlError::ExpectToken(">")).at(cursor.offset())?;

    if let Some(external_id) = &external_id {
        if let Some(text) = subset.expander.load_dtd_subset(external_id, start)? {
            subset.frames.push(DeclFrame {
                text,
                pos: 0,
                origin: start,
                entity: false,
                external: true,
            });
            subset.run(Cursor::new(""), true)?;
        }
    }

    let decl = DocTypeDecl::new(name)
        .with_external_id(external_id)
        .with_int_subset(has_int_subset);
    Ok((decl, cursor))
}

/// `S ExternalID`
struct SpacedExternalId;

impl<'a> Parser<'a> for SpacedExternalId {
    type Attribute = ExternalId;
    type Error = XmlError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), Self::Error> {
        let (_, cursor) = SToken.parse(cursor)?;
        ExternalIdToken.parse(cursor)
    }
}

// 4.2.2 External Entities

/// External Identifier
///
/// ```text
/// ExternalID ::= 'SYSTEM' S SystemLiteral | 'PUBLIC' S PubidLiteral S SystemLiteral
/// ```
pub(crate) struct ExternalIdToken;

impl<'a> Parser<'a> for ExternalIdToken {
    type Attribute = ExternalId;
    type Error = XmlError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), Self::Error> {
        if cursor.has_next_str("SYSTEM") {
            let (_, cursor) = SToken.parse(cursor.advance(6))?;
            let (system, cursor) = SystemLiteralToken.parse(cursor)?;
            Ok((ExternalId::system(system), cursor))
        } else if cursor.has_next_str("PUBLIC") {
            let (_, cursor) = SToken.parse(cursor.advance(6))?;
            let (pub_id, cursor) = PubidLiteralToken.parse(cursor)?;
            let (_, cursor) = SToken.parse(cursor)?;
            let (system, cursor) = SystemLiteralToken.parse(cursor)?;
            Ok((ExternalId::public(pub_id, system), cursor))
        } else {
            Err(XmlError::ExpectToken("SYSTEM or PUBLIC"))
        }
    }
}

/// `SystemLiteral ::= ('"' [^"]* '"') | ("'" [^']* "'")`
struct SystemLiteralToken;

impl<'a> Parser<'a> for SystemLiteralToken {
    type Attribute = &'a str;
    type Error = XmlError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), Self::Error> {
        let (literal, cursor) = QuotedToken.parse(cursor)?;
        check_xml_chars(literal)?;
        Ok((literal, cursor))
    }
}

/// `PubidLiteral ::= '"' PubidChar* '"' | "'" (PubidChar - "'")* "'"`
struct PubidLiteralToken;

impl<'a> Parser<'a> for PubidLiteralToken {
    type Attribute = &'a str;
    type Error = XmlError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), Self::Error> {
        let (literal, cursor) = QuotedToken.parse(cursor)?;
        match literal.chars().find(|c| !c.is_xml_pubid_char()) {
            Some(c) => Err(XmlError::InvalidCharacter(c)),
            None => Ok((literal, cursor)),
        }
    }
}

/// Declarations of a parameter entity or of the external subset.
struct DeclFrame {
    text: Rc<str>,
    pos: usize,
    /// Document offset errors inside the frame are reported at.
    origin: usize,
    /// Opened by a parameter-entity reference.
    entity: bool,
    /// Markup of the external subset or an external parameter entity.
    external: bool,
}

/// Processes `intSubset` and `extSubset` with parameter-entity frames.
struct SubsetReader<'e> {
    expander: &'e mut EntityExpander,
    frames: Vec<DeclFrame>,
    open_sections: usize,
}

impl<'e> SubsetReader<'e> {
    fn new(expander: &'e mut EntityExpander) -> Self {
        Self {
            expander,
            frames: vec![],
            open_sections: 0,
        }
    }

    /// Reads declarations until all frames are done and `cursor` reaches
    /// `]` (internal subset) or its end (external subset).
    fn run<'a>(&mut self, mut cursor: Cursor<'a>, external: bool) -> Result<Cursor<'a>, Failure> {
        loop {
            if let Some(top) = self.frames.len().checked_sub(1) {
                let text = Rc::clone(&self.frames[top].text);
                let frame_cursor = Cursor::at(&text, self.frames[top].pos);
                if frame_cursor.is_at_end() {
                    if let Some(frame) = self.frames.pop() {
                        if frame.entity {
                            self.expander.leave();
                        }
                    }
                    continue;
                }

                let origin = self.frames[top].origin;
                let external = self.frames[top].external;
                let next = self
                    .declaration(frame_cursor, external, Some(origin))
                    .map_err(|failure| Failure::new(failure.error, origin))?;
                self.frames[top].pos = next.offset();
                continue;
            }

            let (_, next) = optional(SToken).parse(cursor).at(cursor.offset())?;
            cursor = next;
            if cursor.is_at_end() {
                return if !external {
                    Err(Failure::new(XmlError::UnexpectedEof, cursor.offset()))
                } else if self.open_sections > 0 {
                    Err(Failure::new(XmlError::ExpectToken("]]>"), cursor.offset()))
                } else {
                    Ok(cursor)
                };
            }
            if !external && cursor.has_next_byte(b']') {
                return Ok(cursor);
            }
            cursor = self.declaration(cursor, external, None)?;
        }
    }

    /// `markupdecl | DeclSep | conditionalSect`
    fn declaration<'t>(
        &mut self,
        cursor: Cursor<'t>,
        external: bool,
        frame_origin: Option<usize>,
    ) -> Result<Cursor<'t>, Failure> {
        let origin = frame_origin.unwrap_or_else(|| cursor.offset());

        match cursor.next_byte(0) {
            Some(c) if c.is_xml_whitespace() => SToken.parse(cursor).map(|(_, c)| c).at(origin),
            Some(b'%') => {
                let (name, next) = PeReferenceToken.parse(cursor).at(origin)?;
                let resolution =
                    self.expander
                        .resolve(name, EntityKind::Parameter, RefContext::DeclSep, origin)?;
                if let Resolution::Expand { entity, text } = resolution {
                    self.frames.push(DeclFrame {
                        text,
                        pos: 0,
                        origin,
                        entity: true,
                        external: external || entity.is_external(),
                    });
                }
                Ok(next)
            }
            _ if cursor.has_next_str("<!ENTITY") => self.entity_decl(cursor, external, origin),
            _ if cursor.has_next_str("<!ELEMENT")
                || cursor.has_next_str("<!ATTLIST")
                || cursor.has_next_str("<!NOTATION") =>
            {
                skip_markup_decl(cursor).at(origin)
            }
            _ if cursor.has_next_str("<!--") => CommentToken.parse(cursor).map(|(_, c)| c).at(origin),
            _ if cursor.has_next_str("<![") => self.conditional_sect(cursor, external, origin),
            _ if cursor.has_next_str("<?") => PIToken.parse(cursor).map(|(_, c)| c).at(origin),
            _ if self.open_sections > 0 && cursor.has_next_str("]]>") => {
                self.open_sections -= 1;
                Ok(cursor.advance(3))
            }
            _ => Err(Failure::new(XmlError::ExpectToken("markup declaration"), origin)),
        }
    }

    // 4.2 Entity Declarations

    /// ```text
    /// GEDecl ::= '<!ENTITY' S Name S EntityDef S? '>'
    /// PEDecl ::= '<!ENTITY' S '%' S Name S PEDef S? '>'
    /// EntityDef ::= EntityValue | (ExternalID NDataDecl?)
    /// PEDef ::= EntityValue | ExternalID
    /// ```
    fn entity_decl<'t>(
        &mut self,
        cursor: Cursor<'t>,
        external: bool,
        origin: usize,
    ) -> Result<Cursor<'t>, Failure> {
        let (_, cursor) = SToken.parse(cursor.advance(8)).at(origin)?;
        let (kind, cursor) = if cursor.has_next_byte(b'%') {
            let (_, cursor) = SToken.parse(cursor.advance(1)).at(origin)?;
            (EntityKind::Parameter, cursor)
        } else {
            (EntityKind::General, cursor)
        };
        let (name, cursor) = NameToken.parse(cursor).at(origin)?;
        let (_, cursor) = SToken.parse(cursor).at(origin)?;

        let (entity, cursor) = if matches!(cursor.next_byte(0), Some(b'"') | Some(b'\'')) {
            let (raw, cursor) = QuotedToken.parse(cursor).at(origin)?;
            check_xml_chars(raw).at(origin)?;
            let text = self.expander.expand_entity_value(raw, external, origin)?;
            (Entity::internal(name, kind, text), cursor)
        } else {
            let (external_id, cursor) = ExternalIdToken.parse(cursor).at(origin)?;
            let (ndata, cursor) = optional(NDataDeclToken).parse(cursor).at(origin)?;
            match (ndata, kind) {
                (Some(notation), EntityKind::General) => {
                    (Entity::unparsed(name, external_id, notation), cursor)
                }
                (Some(_), EntityKind::Parameter) => {
                    return Err(Failure::new(XmlError::ExpectToken(">"), origin))
                }
                (None, kind) => (Entity::external(name, kind, external_id), cursor),
            }
        };

        let (_, cursor) = optional(SToken).parse(cursor).at(origin)?;
        let cursor = expect_byte(cursor, b'>', || XmlError::ExpectToken(">")).at(origin)?;
        self.expander.declare(entity);
        Ok(cursor)
    }

    // 3.4 Conditional Sections

    /// ```text
    /// includeSect ::= '<![' S? 'INCLUDE' S? '[' extSubsetDecl ']]>'
    /// ignoreSect ::= '<![' S? 'IGNORE' S? '[' ignoreSectContents* ']]>'
    /// ```
    ///
    /// The keyword may be given by a parameter-entity reference.
    fn conditional_sect<'t>(
        &mut self,
        cursor: Cursor<'t>,
        external: bool,
        origin: usize,
    ) -> Result<Cursor<'t>, Failure> {
        if !external {
            return Err(Failure::new(XmlError::ExpectToken("markup declaration"), origin));
        }

        let (_, cursor) = optional(SToken).parse(cursor.advance(3)).at(origin)?;
        let (keyword, cursor) = if cursor.has_next_byte(b'%') {
            let (name, cursor) = PeReferenceToken.parse(cursor).at(origin)?;
            let keyword =
                match self
                    .expander
                    .resolve(name, EntityKind::Parameter, RefContext::DeclSep, origin)?
                {
                    Resolution::Expand { text, .. } => {
                        self.expander.leave();
                        text.trim_matches(|c: char| c.is_xml_whitespace()).to_string()
                    }
                    Resolution::Verbatim | Resolution::Skip => "IGNORE".to_string(),
                };
            (keyword, cursor)
        } else {
            let (name, cursor) = NameToken.parse(cursor).at(origin)?;
            (name.to_string(), cursor)
        };
        let (_, cursor) = optional(SToken).parse(cursor).at(origin)?;
        let cursor = expect_byte(cursor, b'[', || XmlError::ExpectToken("[")).at(origin)?;

        match keyword.as_str() {
            "INCLUDE" => {
                self.open_sections += 1;
                Ok(cursor)
            }
            "IGNORE" => skip_ignore_sect(cursor).at(origin),
            _ => Err(Failure::new(XmlError::ExpectToken("INCLUDE or IGNORE"), origin)),
        }
    }
}

/// `NDataDecl ::= S 'NDATA' S Name`
struct NDataDeclToken;

impl<'a> Parser<'a> for NDataDeclToken {
    type Attribute = &'a str;
    type Error = XmlError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), Self::Error> {
        let ((_, _, _), cursor) = (SToken, xml_lit("NDATA"), SToken).parse(cursor)?;
        NameToken.parse(cursor)
    }
}

/// Skips a declaration up to its closing `>`, ignoring `>` in literals.
fn skip_markup_decl(cursor: Cursor) -> Result<Cursor, XmlError> {
    let mut quote = None;
    for (i, c) in cursor.rest_bytes().iter().copied().enumerate() {
        match (quote, c) {
            (None, b'"') | (None, b'\'') => quote = Some(c),
            (None, b'>') => return Ok(cursor.advance(i + 1)),
            (Some(q), c) if q == c => quote = None,
            _ => {}
        }
    }
    Err(XmlError::UnexpectedEof)
}

/// Skips the contents of an ignored section including nested sections.
fn skip_ignore_sect(cursor: Cursor) -> Result<Cursor, XmlError> {
    let bytes = cursor.rest_bytes();
    let mut depth = 1;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i..].starts_with(b"<![") {
            depth += 1;
            i += 3;
        } else if bytes[i..].starts_with(b"]]>") {
            depth -= 1;
            i += 3;
            if depth == 0 {
                return Ok(cursor.advance(i));
            }
        } else {
            i += 1;
        }
    }
    Err(XmlError::UnexpectedEof)
}
