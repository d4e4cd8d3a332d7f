use defused_chars::XmlChar;

use crate::XmlError;

#[repr(u8)]
#[derive(Copy, Clone)]
enum Category {
    /// `Char - ('<' | '&')`
    TextChar = 0,
    /// Characters that end a text run or need rewriting: `<`, `&`, `\r`, `]`
    TextSpecial = 1,
}

#[inline]
const fn mask(cat: Category) -> u8 {
    1 << (cat as u8)
}

const fn ascii_char_mask(c: u8) -> u8 {
    let mut mask_value = 0;
    if c == b'\t' || c == b'\n' || c == b'\r' || (c >= 0x20 && c != b'<' && c != b'&') {
        mask_value |= mask(Category::TextChar);
    }
    if c == b'<' || c == b'&' || c == b'\r' || c == b']' {
        mask_value |= mask(Category::TextSpecial);
    }
    mask_value
}

const fn build_char_map() -> [u8; 128] {
    let mut map = [0; 128];
    let mut i = 0;
    while i < 128 {
        map[i] = ascii_char_mask(i as u8);
        i += 1;
    }
    map
}

const PARSER_CHAR_MAP: [u8; 128] = build_char_map();

#[inline]
fn check_ascii(c: u8, cat: Category) -> bool {
    matches!(PARSER_CHAR_MAP.get(c as usize), Some(cats) if cats & mask(cat) != 0)
}

/// Character allowed in character data.
#[inline]
pub fn is_text_char(c: char) -> bool {
    if c.is_ascii() {
        check_ascii(c as u8, Category::TextChar)
    } else {
        c.is_xml_char()
    }
}

/// Splits `text` at the next markup start (`<` or `&`).
///
/// Validates the characters of the run and reports whether it contains
/// `\r` and so needs line-end normalisation.
pub(crate) fn text_run(text: &str) -> Result<(usize, bool), XmlError> {
    let end = memchr::memchr2(b'<', b'&', text.as_bytes()).unwrap_or(text.len());
    let run = &text[..end];
    let mut needs_normalisation = false;

    for (i, c) in run.char_indices() {
        if !is_text_char(c) {
            return Err(XmlError::InvalidCharacter(c));
        }
        if c.is_ascii() && check_ascii(c as u8, Category::TextSpecial) {
            if c == '\r' {
                needs_normalisation = true;
            } else if run[i..].starts_with("]]>") {
                return Err(XmlError::CDataEndInContent);
            }
        }
    }

    Ok((end, needs_normalisation))
}

/// Replaces `\r\n` and lone `\r` by `\n`.
pub(crate) fn normalize_line_ends(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\r' {
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
            result.push('\n');
        } else {
            result.push(c);
        }
    }
    result
}
