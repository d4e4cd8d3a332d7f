//! Byte input decoding.
//!
//! The encoding is taken from the byte order mark, then from the `encoding`
//! of the XML or text declaration, and defaults to UTF-8. Without the
//! `encoding` feature only UTF-8 is accepted.

use std::borrow::Cow;

#[cfg(feature = "encoding")]
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use memchr::memmem;

use defused_chars::XmlAsciiChar;

use crate::parser::{Cursor, Parser};
use crate::reader::tokens::{TextDeclToken, XmlDeclToken};
use crate::XmlError;

/// `encoding` of the leading declaration, if there is a well-formed one.
///
/// Malformed declarations are left to the reader to report.
fn declared_encoding(input: &[u8], text_decl: bool) -> Option<String> {
    if !input.starts_with(b"<?xml") {
        return None;
    }
    let end = memmem::find(input, b"?>")? + 2;
    let decl = std::str::from_utf8(&input[..end]).ok()?;

    let cursor = Cursor::new(decl);
    if text_decl {
        TextDeclToken
            .parse(cursor)
            .ok()
            .map(|(encoding, _)| encoding.to_string())
    } else {
        XmlDeclToken
            .parse(cursor)
            .ok()
            .and_then(|(decl, _)| decl.encoding().map(|encoding| encoding.to_string()))
    }
}

#[cfg(feature = "encoding")]
fn guess_encoding(input: &[u8], text_decl: bool) -> Result<&'static Encoding, XmlError> {
    if let Some((encoding, _)) = Encoding::for_bom(input) {
        return Ok(encoding);
    }
    if input.starts_with(&[0x3C, 0x00, 0x3F, 0x00]) {
        return Ok(UTF_16LE);
    }
    if input.starts_with(&[0x00, 0x3C, 0x00, 0x3F]) {
        return Ok(UTF_16BE);
    }

    match declared_encoding(input, text_decl) {
        Some(label) => {
            Encoding::for_label(label.as_bytes()).ok_or(XmlError::UnsupportedEncoding(label))
        }
        None => Ok(UTF_8),
    }
}

#[cfg(feature = "encoding")]
fn decode_with(input: &[u8], text_decl: bool) -> Result<(Cow<str>, &'static str), XmlError> {
    let encoding = guess_encoding(input, text_decl)?;
    let (text, used, had_errors) = encoding.decode(input);
    if had_errors {
        return Err(XmlError::MalformedEncoding(used.name()));
    }
    Ok((text, used.name()))
}

#[cfg(not(feature = "encoding"))]
fn decode_with(input: &[u8], text_decl: bool) -> Result<(Cow<str>, &'static str), XmlError> {
    let input = input.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(input);
    if let Some(label) = declared_encoding(input, text_decl) {
        if !label.eq_ignore_ascii_case("UTF-8") {
            return Err(XmlError::UnsupportedEncoding(label));
        }
    }
    std::str::from_utf8(input)
        .map(|text| (Cow::Borrowed(text), "UTF-8"))
        .map_err(|_| XmlError::MalformedEncoding("UTF-8"))
}

/// Decodes a document. Returns the text and the name of the encoding used.
pub fn decode(input: &[u8]) -> Result<(Cow<str>, &'static str), XmlError> {
    decode_with(input, false)
}

/// Decodes fetched external content and strips its text declaration.
pub(crate) fn decode_external(input: &[u8]) -> Result<String, XmlError> {
    let (text, _) = decode_with(input, true)?;
    Ok(strip_text_decl(&text)?.to_string())
}

/// Removes a leading text declaration.
pub(crate) fn strip_text_decl(text: &str) -> Result<&str, XmlError> {
    let is_decl = text.starts_with("<?xml")
        && text
            .as_bytes()
            .get(5)
            .map_or(false, |c| c.is_xml_whitespace());
    if !is_decl {
        return Ok(text);
    }
    let (_, cursor) = TextDeclToken.parse(Cursor::new(text))?;
    Ok(cursor.rest())
}
