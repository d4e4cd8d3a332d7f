//! Lexical productions shared by content, prolog and DTD parsing.

use std::convert::TryFrom;

use defused_chars::{XmlAsciiChar, XmlChar};
use memchr::{memchr, memmem};

use crate::parser::core::{kleene, optional, plus, raw};
use crate::parser::helper::map_error;
use crate::parser::string::{chars, lit};
use crate::parser::{Cursor, Parser};
use crate::{XmlDecl, XmlError};

// Common

#[inline]
pub(crate) fn xml_lit<'a>(literal: &'static str) -> impl Parser<'a, Attribute = (), Error = XmlError> {
    map_error(lit(literal), move |_| XmlError::ExpectToken(literal))
}

pub(crate) fn expect_token<'a>(
    cursor: Cursor<'a>,
    token: &'static str,
) -> Result<((), Cursor<'a>), XmlError> {
    if !cursor.has_next_str(token) {
        Err(XmlError::ExpectToken(token))
    } else {
        Ok(((), cursor.advance(token.len())))
    }
}

pub(crate) fn expect_byte(cursor: Cursor, c: u8, err: fn() -> XmlError) -> Result<Cursor, XmlError> {
    if cursor.next_byte(0) == Some(c) {
        Ok(cursor.advance(1))
    } else {
        Err(err())
    }
}

/// Fails on the first character of `text` that is not allowed in XML.
pub(crate) fn check_xml_chars(text: &str) -> Result<(), XmlError> {
    match text.chars().find(|c| !c.is_xml_char()) {
        Some(c) => Err(XmlError::InvalidCharacter(c)),
        None => Ok(()),
    }
}

/// Characters up to (not including) the terminator.
pub(crate) struct TerminatedChars(pub &'static str);

impl<'a> Parser<'a> for TerminatedChars {
    type Attribute = &'a str;
    type Error = XmlError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), Self::Error> {
        let pos = memmem::find(cursor.rest_bytes(), self.0.as_bytes()).ok_or(XmlError::UnexpectedEof)?;
        let res = cursor.advance2(pos);
        check_xml_chars(res.0)?;
        Ok(res)
    }
}

/// Text between matching `'` or `"` quotes. Both quotes are consumed.
pub(crate) struct QuotedToken;

impl<'a> Parser<'a> for QuotedToken {
    type Attribute = &'a str;
    type Error = XmlError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), Self::Error> {
        let quote = match cursor.next_byte(0) {
            Some(quote @ b'"') | Some(quote @ b'\'') => quote,
            _ => return Err(XmlError::ExpectToken("' or \"")),
        };
        let start = cursor.advance(1);
        let end = memchr(quote, start.rest_bytes()).ok_or(XmlError::UnexpectedEof)?;
        let (text, cursor) = start.advance2(end);
        Ok((text, cursor.advance(1)))
    }
}

// 2.3 Common Syntactic Constructs

/// White Space
///
/// `S ::= (#x20 | #x9 | #xD | #xA)+`
///
pub(crate) struct SToken;

impl<'a> Parser<'a> for SToken {
    type Attribute = ();
    type Error = XmlError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), Self::Error> {
        let size = cursor
            .rest_bytes()
            .iter()
            .take_while(|c| c.is_xml_whitespace())
            .count();
        if size > 0 {
            Ok(((), cursor.advance(size)))
        } else {
            Err(XmlError::ExpectedWhitespace)
        }
    }
}

/// `Name ::= NameStartChar (NameChar)*`
pub(crate) struct NameToken;

impl<'a> Parser<'a> for NameToken {
    type Attribute = &'a str;
    type Error = XmlError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), Self::Error> {
        let mut chars = cursor.rest().char_indices();

        match chars.next() {
            Some((_, c)) if c.is_xml_name_start_char() => {}
            Some((_, c)) => return Err(XmlError::IllegalNameStartChar(c)),
            None => return Err(XmlError::UnexpectedEof),
        }

        let end = chars
            .find(|(_, c)| !c.is_xml_name_char())
            .map_or(cursor.rest().len(), |(i, _)| i);
        Ok(cursor.advance2(end))
    }
}

/// Raw attribute value, references are not yet replaced.
///
/// `AttValue ::= '"' ([^<&"] | Reference)* '"' |  "'" ([^<&'] | Reference)* "'"`
pub(crate) struct AttValueToken;

impl<'a> Parser<'a> for AttValueToken {
    type Attribute = &'a str;
    type Error = XmlError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), Self::Error> {
        let (value, cursor) = QuotedToken.parse(cursor).map_err(|err| match err {
            XmlError::UnexpectedEof => err,
            _ => XmlError::ExpectedAttrValue,
        })?;
        if memchr(b'<', value.as_bytes()).is_some() {
            return Err(XmlError::LtInAttributeValue);
        }
        check_xml_chars(value)?;
        Ok((value, cursor))
    }
}

/// `Eq ::= S? '=' S?`
pub(crate) struct EqToken;

impl<'a> Parser<'a> for EqToken {
    type Attribute = ();
    type Error = XmlError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), Self::Error> {
        let (_, cursor) = optional(SToken).parse(cursor)?;
        let (_, cursor) = xml_lit("=").parse(cursor)?;
        let (_, cursor) = optional(SToken).parse(cursor)?;
        Ok(((), cursor))
    }
}

// 2.5 Comments

/// `Comment ::= '<!--' ((Char - '-') | ('-' (Char - '-')))* '-->'`
pub(crate) struct CommentToken;

impl<'a> Parser<'a> for CommentToken {
    type Attribute = &'a str;
    type Error = XmlError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), XmlError> {
        let (_, cursor) = xml_lit("<!--").parse(cursor)?;
        let (comment, cursor) = TerminatedChars("--").parse(cursor)?;
        let (_, cursor) =
            map_error(xml_lit("-->"), |_| XmlError::CommentColonColon).parse(cursor)?;

        Ok((comment, cursor))
    }
}

// 2.6 Processing Instructions

/// Processing Instruction
///
/// PI ::= '<?' PITarget (S (Char* - (Char* '?>' Char*)))? '?>'
/// PITarget ::= Name - (('X' | 'x') ('M' | 'm') ('L' | 'l'))
pub(crate) struct PIToken;

impl<'a> Parser<'a> for PIToken {
    type Attribute = (&'a str, Option<&'a str>);
    type Error = XmlError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), XmlError> {
        let (_, cursor) = xml_lit("<?").parse(cursor)?;
        let (target, cursor) = NameToken.parse(cursor)?;
        if target.eq_ignore_ascii_case("xml") {
            return Err(if target == "xml" {
                XmlError::MisplacedXmlDecl
            } else {
                XmlError::InvalidPITarget
            });
        }
        let (maybe_data, cursor) = optional((SToken, TerminatedChars("?>"))).parse(cursor)?;
        let (_, cursor) = xml_lit("?>").parse(cursor)?;

        Ok((
            (target, maybe_data.map(|data| data.1).filter(|data| !data.is_empty())),
            cursor,
        ))
    }
}

// 2.7 CDATA Sections

/// CDATA Section
///
/// CDSect  ::= CDStart CData CDEnd
/// CDStart ::= '<![CDATA['
/// CData   ::= (Char* - (Char* ']]>' Char*))
/// CDEnd   ::= ']]>'
pub(crate) struct CDataToken;

impl<'a> Parser<'a> for CDataToken {
    type Attribute = &'a str;
    type Error = XmlError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), XmlError> {
        let (_, cursor) = xml_lit("<![CDATA[").parse(cursor)?;
        let (chars, cursor) = TerminatedChars("]]>").parse(cursor)?;
        let (_, cursor) = xml_lit("]]>").parse(cursor)?;
        Ok((chars, cursor))
    }
}

// 2.8 Prolog and Document Type Declaration

/// `XMLDecl ::= '<?xml' VersionInfo EncodingDecl? SDDecl? S? '?>'`
pub(crate) struct XmlDeclToken;

impl<'a> Parser<'a> for XmlDeclToken {
    type Attribute = XmlDecl;
    type Error = XmlError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), XmlError> {
        let (_, cursor) = xml_lit("<?xml").parse(cursor)?;
        let (version, cursor) = VersionInfoToken.parse(cursor)?;
        let (encoding, cursor) = optional(EncodingDeclToken).parse(cursor)?;
        let (standalone, cursor) = optional(SDDeclToken).parse(cursor)?;
        let (_, cursor) = optional(SToken).parse(cursor)?;
        let (_, cursor) = xml_lit("?>").parse(cursor)?;

        Ok((XmlDecl::new(version, encoding, standalone), cursor))
    }
}

/// `VersionInfo ::= S 'version' Eq ("'" VersionNum "'" | '"' VersionNum '"')`
pub(crate) struct VersionInfoToken;

impl<'a> Parser<'a> for VersionInfoToken {
    type Attribute = &'a str;
    type Error = XmlError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), XmlError> {
        let (_, cursor) = SToken.parse(cursor)?;
        let (_, cursor) = expect_token(cursor, "version")?;
        let (_, cursor) = EqToken.parse(cursor)?;
        let (version, cursor) = QuotedToken.parse(cursor)?;

        match VersionNumToken.parse(Cursor::new(version)) {
            Ok((_, rest)) if rest.is_at_end() => Ok((version, cursor)),
            _ => Err(XmlError::UnsupportedVersion(version.to_string())),
        }
    }
}

/// `VersionNum ::= '1.' [0-9]+`
pub(crate) struct VersionNumToken;

impl<'a> Parser<'a> for VersionNumToken {
    type Attribute = &'a str;
    type Error = XmlError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), XmlError> {
        map_error(
            raw((lit("1."), plus(chars(|c: char| c.is_ascii_digit())))),
            |_| XmlError::ExpectToken("1.[0-9]+"),
        )
        .parse(cursor)
    }
}

// 2.9 Standalone Document Declaration

/// `SDDecl ::= S 'standalone' Eq (("'" ('yes' | 'no') "'") | ('"' ('yes' | 'no') '"'))`
pub(crate) struct SDDeclToken;

impl<'a> Parser<'a> for SDDeclToken {
    type Attribute = bool;
    type Error = XmlError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), XmlError> {
        let (_, cursor) = SToken.parse(cursor)?;
        let (_, cursor) = expect_token(cursor, "standalone")?;
        let (_, cursor) = EqToken.parse(cursor)?;
        let (yes_no, cursor) = QuotedToken.parse(cursor)?;

        match yes_no {
            "yes" => Ok((true, cursor)),
            "no" => Ok((false, cursor)),
            _ => Err(XmlError::IllegalAttributeValue("Expected yes or no")),
        }
    }
}

// 4.1 Character and Entity References

/// Character Reference
///
/// `CharRef ::= '&#' [0-9]+ ';' | '&#x' [0-9a-fA-F]+ ';'`
pub(crate) struct CharRefToken;

impl<'a> Parser<'a> for CharRefToken {
    type Attribute = char;
    type Error = XmlError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), XmlError> {
        if !cursor.has_next_str("&#") {
            return Err(XmlError::InvalidCharacterReference(String::new()));
        }

        let cursor = cursor.advance(2);
        let (radix, cursor) = if cursor.has_next_str("x") {
            (16, cursor.advance(1))
        } else {
            (10, cursor)
        };

        let end = memchr(b';', cursor.rest_bytes()).ok_or(XmlError::UnexpectedEof)?;
        let (code, cursor) = cursor.advance2(end);
        Some(code)
            .filter(|code| !code.is_empty() && code.bytes().all(|c| (c as char).is_digit(radix)))
            .and_then(|code| u32::from_str_radix(code, radix).ok())
            .and_then(|code| char::try_from(code).ok())
            .filter(|c| c.is_xml_char())
            .map(move |c| (c, cursor.advance(1)))
            .ok_or_else(|| XmlError::InvalidCharacterReference(code.to_string()))
    }
}

/// Entity Reference
///
/// `EntityRef ::= '&' Name ';'`
pub(crate) struct EntityRefToken;

impl<'a> Parser<'a> for EntityRefToken {
    type Attribute = &'a str;
    type Error = XmlError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), XmlError> {
        let ((_, name, _), cursor) = (xml_lit("&"), NameToken, xml_lit(";")).parse(cursor)?;
        Ok((name, cursor))
    }
}

/// Parameter-entity Reference
///
/// `PEReference ::= '%' Name ';'`
pub(crate) struct PeReferenceToken;

impl<'a> Parser<'a> for PeReferenceToken {
    type Attribute = &'a str;
    type Error = XmlError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), XmlError> {
        let ((_, name, _), cursor) = (xml_lit("%"), NameToken, xml_lit(";")).parse(cursor)?;
        Ok((name, cursor))
    }
}

// 4.3.1 The Text Declaration

/// `TextDecl ::= '<?xml' VersionInfo? EncodingDecl S? '?>'`
pub(crate) struct TextDeclToken;

impl<'a> Parser<'a> for TextDeclToken {
    type Attribute = &'a str;
    type Error = XmlError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), XmlError> {
        let (_, cursor) = xml_lit("<?xml").parse(cursor)?;
        let (_, cursor) = optional(VersionInfoToken).parse(cursor)?;
        let (encoding, cursor) = EncodingDeclToken.parse(cursor)?;
        let (_, cursor) = optional(SToken).parse(cursor)?;
        let (_, cursor) = xml_lit("?>").parse(cursor)?;
        Ok((encoding, cursor))
    }
}

// 4.3.3 Character Encoding in Entities

/// `EncodingDecl ::= S 'encoding' Eq ('"' EncName '"' | "'" EncName "'" )`
pub(crate) struct EncodingDeclToken;

impl<'a> Parser<'a> for EncodingDeclToken {
    type Attribute = &'a str;
    type Error = XmlError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), XmlError> {
        let (_, cursor) = SToken.parse(cursor)?;
        let (_, cursor) = expect_token(cursor, "encoding")?;
        let (_, cursor) = EqToken.parse(cursor)?;
        let (encoding, cursor) = QuotedToken.parse(cursor)?;

        match EncNameToken.parse(Cursor::new(encoding)) {
            Ok((_, rest)) if rest.is_at_end() => Ok((encoding, cursor)),
            Ok(_) => Err(XmlError::ExpectToken("Encoding name: [a-zA-Z][a-zA-Z0-9._-]+")),
            Err(err) => Err(err),
        }
    }
}

/// `EncName ::= [A-Za-z] ([A-Za-z0-9._] | '-')*`
pub(crate) struct EncNameToken;

impl<'a> Parser<'a> for EncNameToken {
    type Attribute = &'a str;
    type Error = XmlError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), XmlError> {
        map_error(
            raw((
                chars(|c: char| c.is_ascii_alphabetic()),
                kleene(chars(|c: char| {
                    c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-'
                })),
            )),
            |_| XmlError::ExpectToken("Encoding name: [a-zA-Z][a-zA-Z0-9._-]+"),
        )
        .parse(cursor)
    }
}
