//! Error surface of the reader.
//!
//! Every failure aborts the parse. [`XmlError`] says what went wrong,
//! [`ParseError`] adds the document position it is reported at.

use std::fmt;
use std::io;

use memchr::memchr2_iter;

/// Coarse classification of an [`XmlError`].
///
/// The guard kinds let callers tell an attack (`*LimitExceeded`) apart from a
/// disabled feature (`ExternalEntityDenied`).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    IndirectionLimitExceeded,
    ExpansionLimitExceeded,
    UndefinedEntity,
    ExternalEntityDenied,
    ExternalResolverFailure,
    /// The document is not well-formed.
    Syntax,
}

/// Fatal parsing error
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum XmlError {
    #[error("entity indirection limit exceeded")]
    IndirectionLimitExceeded { entity: String },
    #[error("document's entity expansion limit exceeded")]
    ExpansionLimitExceeded { entity: String },
    #[error("undefined entity {entity}")]
    UndefinedEntity { entity: String },
    #[error("access to external entity {entity} denied")]
    ExternalEntityDenied { entity: String },
    #[error("failed to fetch {target}: {message}")]
    ExternalResolverFailure {
        target: String,
        kind: io::ErrorKind,
        message: String,
    },

    #[error("illegal name start character {0:?}")]
    IllegalNameStartChar(char),
    #[error("invalid character {0:?}")]
    InvalidCharacter(char),
    #[error("unexpected character {0:?}")]
    UnexpectedCharacter(char),
    #[error("expected element start")]
    ExpectedElementStart,
    #[error("expected element end")]
    ExpectedElementEnd,
    #[error("expected attribute value")]
    ExpectedAttrValue,
    #[error("expected whitespace")]
    ExpectedWhitespace,
    #[error("junk after document element")]
    ExpectedDocumentEnd,
    #[error("no element found")]
    NoRootElement,
    #[error("mismatched tag, expected </{expected_name}>")]
    WrongETagName { expected_name: String },
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("unclosed element at end of input")]
    OpenElementAtEof,
    #[error("duplicate attribute {attribute}")]
    NonUniqueAttribute { attribute: String },
    #[error("invalid character reference &#{0};")]
    InvalidCharacterReference(String),
    #[error("illegal reference")]
    IllegalReference,
    #[error("expected {0}")]
    ExpectToken(&'static str),
    #[error("{0}")]
    IllegalAttributeValue(&'static str),
    #[error("'<' not allowed in attribute value")]
    LtInAttributeValue,
    #[error("unsupported encoding {0}")]
    UnsupportedEncoding(String),
    #[error("input is not valid {0}")]
    MalformedEncoding(&'static str),
    #[error("unsupported XML version {0}")]
    UnsupportedVersion(String),
    #[error("reserved processing instruction target")]
    InvalidPITarget,
    #[error("'--' not allowed in comment")]
    CommentColonColon,
    #[error("']]>' not allowed in content")]
    CDataEndInContent,
    #[error("XML or text declaration not at start of entity")]
    MisplacedXmlDecl,
    #[error("misplaced document type declaration")]
    MisplacedDoctype,
    #[error("content of entity {entity} is not balanced")]
    UnbalancedEntityContent { entity: String },
    #[error("recursive entity reference {entity}")]
    RecursiveEntity { entity: String },
    #[error("reference to unparsed entity {entity}")]
    UnparsedEntityReference { entity: String },
    #[error("reference to external entity {entity} in attribute value")]
    ExternalEntityInAttribute { entity: String },
    #[error("parameter entity reference {entity} not allowed within markup declaration in internal subset")]
    PeReferenceInMarkup { entity: String },
}

impl XmlError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            XmlError::IndirectionLimitExceeded { .. } => ErrorKind::IndirectionLimitExceeded,
            XmlError::ExpansionLimitExceeded { .. } => ErrorKind::ExpansionLimitExceeded,
            XmlError::UndefinedEntity { .. } => ErrorKind::UndefinedEntity,
            XmlError::ExternalEntityDenied { .. } => ErrorKind::ExternalEntityDenied,
            XmlError::ExternalResolverFailure { .. } => ErrorKind::ExternalResolverFailure,
            _ => ErrorKind::Syntax,
        }
    }

    /// Entity reference (`&name;` or `%name;`) the error is about, if any.
    pub fn entity(&self) -> Option<&str> {
        match self {
            XmlError::IndirectionLimitExceeded { entity }
            | XmlError::ExpansionLimitExceeded { entity }
            | XmlError::UndefinedEntity { entity }
            | XmlError::ExternalEntityDenied { entity }
            | XmlError::UnbalancedEntityContent { entity }
            | XmlError::RecursiveEntity { entity }
            | XmlError::UnparsedEntityReference { entity }
            | XmlError::ExternalEntityInAttribute { entity }
            | XmlError::PeReferenceInMarkup { entity } => Some(entity),
            XmlError::ExternalResolverFailure { target, .. } => Some(target),
            _ => None,
        }
    }

    pub(crate) fn resolver_failure(target: impl Into<String>, err: &io::Error) -> Self {
        XmlError::ExternalResolverFailure {
            target: target.into(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// 1-based line and column of a document position.
///
/// Columns count characters, `\r\n` and a lone `\r` count as one line break.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Position {
    line: usize,
    column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn column(&self) -> usize {
        self.column
    }

    /// Position of byte `offset` in `text`.
    pub(crate) fn locate(text: &str, offset: usize) -> Self {
        let offset = offset.min(text.len());
        let prefix = &text.as_bytes()[..offset];
        let mut line = 1;
        let mut line_start = 0;
        for i in memchr2_iter(b'\n', b'\r', prefix) {
            if prefix[i] == b'\r' && text.as_bytes().get(i + 1) == Some(&b'\n') {
                continue;
            }
            line += 1;
            line_start = i + 1;
        }
        let column = text[line_start..offset].chars().count() + 1;
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Error returned by the reader: what failed and where.
///
/// Formats as `"<message>: line <L>, column <C>"`. For failures inside an
/// entity expansion the position is that of the outermost reference in the
/// document, [`XmlError::entity`] names the reference that tripped the check.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{error}: {position}")]
pub struct ParseError {
    error: XmlError,
    position: Position,
}

impl ParseError {
    pub fn new(error: XmlError, position: Position) -> Self {
        Self { error, position }
    }

    pub fn error(&self) -> &XmlError {
        &self.error
    }

    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn into_error(self) -> XmlError {
        self.error
    }
}

impl From<ParseError> for io::Error {
    fn from(err: ParseError) -> Self {
        let kind = match err.error() {
            XmlError::ExternalEntityDenied { .. } => io::ErrorKind::PermissionDenied,
            XmlError::ExternalResolverFailure { kind, .. } => *kind,
            _ => io::ErrorKind::InvalidData,
        };
        io::Error::new(kind, err)
    }
}

/// Internal: error tagged with the document byte offset it is reported at.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Failure {
    pub error: XmlError,
    pub offset: usize,
}

impl Failure {
    pub fn new(error: XmlError, offset: usize) -> Self {
        Self { error, offset }
    }
}

/// Attaches a document offset to token-level errors.
pub(crate) trait AtOffset<T> {
    fn at(self, offset: usize) -> Result<T, Failure>;
}

impl<T> AtOffset<T> for Result<T, XmlError> {
    #[inline]
    fn at(self, offset: usize) -> Result<T, Failure> {
        self.map_err(|error| Failure::new(error, offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locate_first_line() {
        assert_eq!(Position::new(1, 1), Position::locate("<a/>", 0));
        assert_eq!(Position::new(1, 4), Position::locate("<a>&x;</a>", 3));
    }

    #[test]
    fn locate_counts_line_breaks() {
        let text = "<!DOCTYPE a>\n<a>\r\n&x;\r&y;</a>";
        assert_eq!(Position::new(3, 1), Position::locate(text, text.find("&x;").unwrap()));
        assert_eq!(Position::new(4, 1), Position::locate(text, text.find("&y;").unwrap()));
    }

    #[test]
    fn locate_counts_characters() {
        let text = "<a>\u{e4}\u{f6}&x;</a>";
        assert_eq!(Position::new(1, 6), Position::locate(text, text.find('&').unwrap()));
    }

    #[test]
    fn message_format() {
        let err = ParseError::new(
            XmlError::IndirectionLimitExceeded {
                entity: "&a;".to_string(),
            },
            Position::new(7, 6),
        );
        assert_eq!(
            "entity indirection limit exceeded: line 7, column 6",
            err.to_string()
        );
        assert_eq!(ErrorKind::IndirectionLimitExceeded, err.kind());
        assert_eq!(Some("&a;"), err.error().entity());
    }

    #[test]
    fn denied_maps_to_permission_denied() {
        let err = ParseError::new(
            XmlError::ExternalEntityDenied {
                entity: "&ee;".to_string(),
            },
            Position::new(4, 6),
        );
        let io_err: io::Error = err.into();
        assert_eq!(io::ErrorKind::PermissionDenied, io_err.kind());
    }
}
