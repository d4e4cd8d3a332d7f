//! XML pull parser hardened against entity expansion attacks.
//!
//! Every reader is created by an [`XmlParser`], which carries the
//! [`ParserConfig`] and owns the per-document entity state. Entity
//! references are expanded under an [`ExpansionBudget`] limiting both the
//! nesting depth and the total number of produced characters, so documents
//! like the "billion laughs" bomb fail early with a
//! [`IndirectionLimitExceeded`](ErrorKind::IndirectionLimitExceeded) or
//! [`ExpansionLimitExceeded`](ErrorKind::ExpansionLimitExceeded) error.
//! External entities and external DTD subsets are denied unless enabled.
//!
//! ```
//! use defused_xml::{ErrorKind, XmlParser};
//!
//! let bomb = "<!DOCTYPE bomb [\
//!     <!ENTITY a '1234567890'>\
//!     <!ENTITY b '&a;&a;&a;&a;&a;&a;&a;&a;'>\
//!     <!ENTITY c '&b;&b;&b;&b;&b;&b;&b;&b;'>\
//!     ]><bomb>&c;</bomb>";
//!
//! let mut parser = XmlParser::default();
//! parser.set_max_entity_expansions(100);
//! let err = parser.parse_str(bomb).unwrap_err();
//! assert_eq!(ErrorKind::ExpansionLimitExceeded, err.kind());
//! ```

use std::borrow::Cow;
use std::fmt;

pub use config::{ParserConfig, UndefinedEntities};
pub use dtd::{DocTypeDecl, Entity, EntityKind, EntityTable, ExternalId};
pub use error::{ErrorKind, ParseError, Position, XmlError};
pub use frontend::XmlParser;
pub use guard::{ExpansionBudget, ExternalResolutionPolicy, Limit, LimitExceeded};
pub use reader::{EntityExpander, Reader};
pub use resolver::{EntityResolver, FileResolver, NoResolver};
pub use sax::ContentHandler;

mod config;
pub mod dtd;
pub mod encoding;
mod error;
mod frontend;
pub mod guard;
pub mod parser;
mod reader;
pub mod resolver;
pub mod sax;

/// Marker for callers checking that the entity bomb protection is compiled in.
pub const XML_BOMB_PROTECTION: bool = true;

/// Default maximum nesting of entity references.
pub const DEFAULT_MAX_ENTITY_INDIRECTIONS: usize = 40;

/// Default maximum of characters produced by entity expansion per document.
pub const DEFAULT_MAX_ENTITY_EXPANSIONS: u64 = 8 * 1024 * 1024;

/// XML Declaration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XmlDecl {
    version: String,
    encoding: Option<String>,
    standalone: Option<bool>,
}

impl XmlDecl {
    pub fn new(version: &str, encoding: Option<&str>, standalone: Option<bool>) -> Self {
        Self {
            version: version.to_string(),
            encoding: encoding.map(|encoding| encoding.to_string()),
            standalone,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    pub fn standalone(&self) -> Option<bool> {
        self.standalone
    }
}

/// Start tag
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct STag<'a> {
    name: Cow<'a, str>,
    empty: bool,
}

impl<'a> STag<'a> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `<name/>` instead of `<name>`. An [`ETag`] follows all the same.
    pub fn is_empty(&self) -> bool {
        self.empty
    }

    pub fn into_owned(self) -> STag<'static> {
        STag {
            name: Cow::Owned(self.name.into_owned()),
            empty: self.empty,
        }
    }
}

/// Attribute with its normalised value
#[derive(Clone, PartialEq, Eq)]
pub struct Attribute<'a> {
    name: Cow<'a, str>,
    value: Cow<'a, str>,
}

impl<'a> Attribute<'a> {
    pub fn new(name: impl Into<Cow<'a, str>>, value: impl Into<Cow<'a, str>>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn into_owned(self) -> Attribute<'static> {
        Attribute {
            name: Cow::Owned(self.name.into_owned()),
            value: Cow::Owned(self.value.into_owned()),
        }
    }
}

impl<'a> fmt::Debug for Attribute<'a> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("value", &self.value)
            .finish()
    }
}

/// End tag
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ETag<'a> {
    name: Cow<'a, str>,
}

impl<'a> ETag<'a> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn into_owned(self) -> ETag<'static> {
        ETag {
            name: Cow::Owned(self.name.into_owned()),
        }
    }
}

/// Processing Instruction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PI<'a> {
    target: Cow<'a, str>,
    data: Option<Cow<'a, str>>,
}

impl<'a> PI<'a> {
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn data(&self) -> Option<&str> {
        self.data.as_deref()
    }

    pub fn into_owned(self) -> PI<'static> {
        PI {
            target: Cow::Owned(self.target.into_owned()),
            data: self.data.map(|data| Cow::Owned(data.into_owned())),
        }
    }
}

/// Event of Pull Parser
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum XmlEvent<'a> {
    XmlDecl(XmlDecl),
    Dtd(Box<DocTypeDecl>),
    STag(STag<'a>),
    ETag(ETag<'a>),
    Characters(Cow<'a, str>),
    PI(PI<'a>),
    Comment(Cow<'a, str>),
}

impl<'a> XmlEvent<'a> {
    pub fn decl(version: &str, encoding: Option<&str>, standalone: Option<bool>) -> Self {
        XmlEvent::XmlDecl(XmlDecl::new(version, encoding, standalone))
    }

    pub fn dtd(decl: DocTypeDecl) -> Self {
        XmlEvent::Dtd(Box::new(decl))
    }

    pub fn stag(name: impl Into<Cow<'a, str>>, empty: bool) -> Self {
        XmlEvent::STag(STag {
            name: name.into(),
            empty,
        })
    }

    pub fn characters(chars: impl Into<Cow<'a, str>>) -> Self {
        XmlEvent::Characters(chars.into())
    }

    pub fn etag(name: impl Into<Cow<'a, str>>) -> Self {
        XmlEvent::ETag(ETag { name: name.into() })
    }

    pub fn comment(comment: impl Into<Cow<'a, str>>) -> Self {
        XmlEvent::Comment(comment.into())
    }

    pub fn pi(target: impl Into<Cow<'a, str>>, data: Option<Cow<'a, str>>) -> Self {
        XmlEvent::PI(PI {
            target: target.into(),
            data,
        })
    }

    pub fn into_owned(self) -> XmlEvent<'static> {
        match self {
            XmlEvent::XmlDecl(decl) => XmlEvent::XmlDecl(decl),
            XmlEvent::Dtd(decl) => XmlEvent::Dtd(decl),
            XmlEvent::STag(stag) => XmlEvent::STag(stag.into_owned()),
            XmlEvent::ETag(etag) => XmlEvent::ETag(etag.into_owned()),
            XmlEvent::Characters(chars) => XmlEvent::Characters(Cow::Owned(chars.into_owned())),
            XmlEvent::PI(pi) => XmlEvent::PI(pi.into_owned()),
            XmlEvent::Comment(comment) => XmlEvent::Comment(Cow::Owned(comment.into_owned())),
        }
    }
}
