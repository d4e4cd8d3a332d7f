//! XML 1.0 (Fifth Edition) character classes.

/// Inclusive ranges of non-ASCII name start characters.
const NAME_START_RANGES: &[(char, char)] = &[
    ('\u{c0}', '\u{d6}'),
    ('\u{d8}', '\u{f6}'),
    ('\u{f8}', '\u{2ff}'),
    ('\u{370}', '\u{37d}'),
    ('\u{37f}', '\u{1fff}'),
    ('\u{200c}', '\u{200d}'),
    ('\u{2070}', '\u{218f}'),
    ('\u{2c00}', '\u{2fef}'),
    ('\u{3001}', '\u{d7ff}'),
    ('\u{f900}', '\u{fdcf}'),
    ('\u{fdf0}', '\u{fffd}'),
    ('\u{10000}', '\u{effff}'),
];

/// Non-ASCII ranges that may continue a name but not start it.
const NAME_EXTRA_RANGES: &[(char, char)] = &[
    ('\u{b7}', '\u{b7}'),
    ('\u{300}', '\u{36f}'),
    ('\u{203f}', '\u{2040}'),
];

fn in_ranges(c: char, ranges: &[(char, char)]) -> bool {
    ranges
        .binary_search_by(|&(lo, hi)| {
            if c < lo {
                std::cmp::Ordering::Greater
            } else if c > hi {
                std::cmp::Ordering::Less
            } else {
                std::cmp::Ordering::Equal
            }
        })
        .is_ok()
}

/// Character classes that can be decided on a single byte.
pub trait XmlAsciiChar {
    /// `S ::= (#x20 | #x9 | #xD | #xA)+`
    fn is_xml_whitespace(&self) -> bool;
}

/// Character classes of the XML grammar.
pub trait XmlChar: XmlAsciiChar {
    /// https://www.w3.org/TR/REC-xml/#NT-NameStartChar
    fn is_xml_name_start_char(&self) -> bool;

    /// https://www.w3.org/TR/REC-xml/#NT-NameChar
    fn is_xml_name_char(&self) -> bool;

    /// https://www.w3.org/TR/REC-xml/#NT-Char
    fn is_xml_char(&self) -> bool;

    /// `PubidChar ::= #x20 | #xD | #xA | [a-zA-Z0-9] | [-'()+,./:=?;!*#@$_%]`
    fn is_xml_pubid_char(&self) -> bool;
}

impl XmlAsciiChar for u8 {
    #[inline]
    fn is_xml_whitespace(&self) -> bool {
        matches!(*self, b' ' | b'\t' | b'\r' | b'\n')
    }
}

impl XmlAsciiChar for char {
    #[inline]
    fn is_xml_whitespace(&self) -> bool {
        matches!(*self, ' ' | '\t' | '\r' | '\n')
    }
}

impl XmlChar for char {
    #[inline]
    fn is_xml_name_start_char(&self) -> bool {
        match *self {
            ':' | '_' | 'A'..='Z' | 'a'..='z' => true,
            c if c.is_ascii() => false,
            c => in_ranges(c, NAME_START_RANGES),
        }
    }

    #[inline]
    fn is_xml_name_char(&self) -> bool {
        match *self {
            '-' | '.' | '0'..='9' => true,
            c if c.is_ascii() => c.is_xml_name_start_char(),
            c => in_ranges(c, NAME_START_RANGES) || in_ranges(c, NAME_EXTRA_RANGES),
        }
    }

    #[inline]
    fn is_xml_char(&self) -> bool {
        matches!(
            *self,
            '\u{9}' | '\u{a}' | '\u{d}' | '\u{20}'..='\u{d7ff}' | '\u{e000}'..='\u{fffd}' | '\u{10000}'..='\u{10ffff}'
        )
    }

    fn is_xml_pubid_char(&self) -> bool {
        matches!(
            *self,
            ' ' | '\r' | '\n' | 'a'..='z' | 'A'..='Z' | '0'..='9'
                | '-' | '\'' | '(' | ')' | '+' | ',' | '.' | '/' | ':'
                | '=' | '?' | ';' | '!' | '*' | '#' | '@' | '$' | '_' | '%'
        )
    }
}

/// Checks `Name ::= NameStartChar (NameChar)*`.
pub fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_xml_name_start_char() => chars.all(|c| c.is_xml_name_char()),
        _ => false,
    }
}
