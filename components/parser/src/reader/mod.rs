//! Pull reader with entity expansion.
//!
//! Replacement text of an entity referenced in content is read in a frame
//! on top of the document. Frames form an explicit stack, the reader never
//! recurses into an entity. Events read inside a frame own their text.

use std::borrow::Cow;
use std::rc::Rc;

use defused_chars::XmlAsciiChar;

pub use expander::EntityExpander;

use crate::dtd::{predefined_entity, Entity, EntityKind};
use crate::error::{AtOffset, Failure, ParseError, Position};
use crate::parser::core::optional;
use crate::parser::{Cursor, Parser};
use crate::reader::chars::{normalize_line_ends, text_run};
use crate::reader::dtd::parse_doctype;
use crate::reader::expander::{RefContext, Resolution};
use crate::reader::tokens::{
    expect_byte, AttValueToken, CDataToken, CharRefToken, CommentToken, EntityRefToken, EqToken,
    NameToken, PIToken, SToken, XmlDeclToken,
};
use crate::{Attribute, XmlError, XmlEvent, PI};

mod chars;
mod dtd;
pub(crate) mod expander;
pub(crate) mod tokens;

/// Markup or text read from element content.
enum Content<'t> {
    STag {
        name: Cow<'t, str>,
        attributes: Vec<Attribute<'t>>,
        empty: bool,
    },
    ETag(Cow<'t, str>),
    Text(Cow<'t, str>),
    CharRef(char),
    EntityRef(Cow<'t, str>),
    PI(PI<'t>),
    Comment(Cow<'t, str>),
}

impl<'t> Content<'t> {
    fn into_owned(self) -> Content<'static> {
        let owned = |text: Cow<'t, str>| Cow::Owned(text.into_owned());
        match self {
            Content::STag {
                name,
                attributes,
                empty,
            } => Content::STag {
                name: owned(name),
                attributes: attributes.into_iter().map(Attribute::into_owned).collect(),
                empty,
            },
            Content::ETag(name) => Content::ETag(owned(name)),
            Content::Text(text) => Content::Text(owned(text)),
            Content::CharRef(c) => Content::CharRef(c),
            Content::EntityRef(name) => Content::EntityRef(owned(name)),
            Content::PI(pi) => Content::PI(pi.into_owned()),
            Content::Comment(comment) => Content::Comment(owned(comment)),
        }
    }
}

/// Offset errors are reported at: the frame origin inside entities, else
/// the current document offset.
#[inline]
fn at(origin: Option<usize>, cursor: Cursor) -> usize {
    origin.unwrap_or_else(|| cursor.offset())
}

/// Reads the next item of element content.
fn read_content<'t>(
    expander: &mut EntityExpander,
    cursor: Cursor<'t>,
    origin: Option<usize>,
) -> Result<(Content<'t>, Cursor<'t>), Failure> {
    let offset = at(origin, cursor);
    match cursor.next_byte(0) {
        Some(b'<') => match cursor.next_byte(1) {
            Some(b'/') => {
                let (name, cursor) = NameToken.parse(cursor.advance(2)).at(offset)?;
                let (_, cursor) = optional(SToken).parse(cursor).at(offset)?;
                let cursor = expect_byte(cursor, b'>', || XmlError::ExpectedElementEnd).at(offset)?;
                Ok((Content::ETag(name.into()), cursor))
            }
            Some(b'?') => {
                let ((target, data), cursor) = PIToken.parse(cursor).at(offset)?;
                let pi = PI {
                    target: Cow::Borrowed(target),
                    data: data.map(Cow::Borrowed),
                };
                Ok((Content::PI(pi), cursor))
            }
            Some(b'!') if cursor.has_next_str("<!--") => {
                let (comment, cursor) = CommentToken.parse(cursor).at(offset)?;
                Ok((Content::Comment(comment.into()), cursor))
            }
            Some(b'!') if cursor.has_next_str("<![CDATA[") => {
                let (cdata, cursor) = CDataToken.parse(cursor).at(offset)?;
                Ok((Content::Text(line_ends(cdata)), cursor))
            }
            Some(b'!') => Err(Failure::new(XmlError::ExpectedElementStart, offset)),
            Some(_) => read_stag(expander, cursor.advance(1), origin),
            None => Err(Failure::new(XmlError::UnexpectedEof, offset)),
        },
        Some(b'&') if cursor.next_byte(1) == Some(b'#') => {
            let (c, cursor) = CharRefToken.parse(cursor).at(offset)?;
            Ok((Content::CharRef(c), cursor))
        }
        Some(b'&') => {
            let (name, cursor) = EntityRefToken.parse(cursor).at(offset)?;
            Ok((Content::EntityRef(name.into()), cursor))
        }
        Some(_) => {
            let (end, needs_normalisation) = text_run(cursor.rest()).at(offset)?;
            let (text, cursor) = cursor.advance2(end);
            let text = if needs_normalisation {
                Cow::Owned(normalize_line_ends(text))
            } else {
                Cow::Borrowed(text)
            };
            Ok((Content::Text(text), cursor))
        }
        None => Err(Failure::new(XmlError::UnexpectedEof, offset)),
    }
}

fn line_ends(text: &str) -> Cow<str> {
    if memchr::memchr(b'\r', text.as_bytes()).is_some() {
        Cow::Owned(normalize_line_ends(text))
    } else {
        Cow::Borrowed(text)
    }
}

/// Reads a start tag after its `<`, expanding the attribute values.
fn read_stag<'t>(
    expander: &mut EntityExpander,
    cursor: Cursor<'t>,
    origin: Option<usize>,
) -> Result<(Content<'t>, Cursor<'t>), Failure> {
    let offset = at(origin, cursor);
    let (name, mut cursor) = NameToken.parse(cursor).at(offset)?;
    let mut attributes: Vec<Attribute<'t>> = Vec::with_capacity(4);
    let mut got_whitespace = if let Ok((_, cur)) = SToken.parse(cursor) {
        cursor = cur;
        true
    } else {
        false
    };

    while let Some(c) = cursor.next_byte(0) {
        // /> empty end
        if c == b'/' {
            return if Some(b'>') == cursor.next_byte(1) {
                let stag = Content::STag {
                    name: name.into(),
                    attributes,
                    empty: true,
                };
                Ok((stag, cursor.advance(2)))
            } else {
                Err(Failure::new(XmlError::ExpectedElementEnd, at(origin, cursor)))
            };
        }

        // normal end
        if c == b'>' {
            let stag = Content::STag {
                name: name.into(),
                attributes,
                empty: false,
            };
            return Ok((stag, cursor.advance(1)));
        }

        // attribute
        let offset = at(origin, cursor);
        if !got_whitespace {
            return Err(Failure::new(XmlError::ExpectedWhitespace, offset));
        }

        let (attr_name, cur) = NameToken.parse(cursor).at(offset)?;
        let (_, cur) = EqToken.parse(cur).at(offset)?;
        let value_offset = at(origin, cur);
        let (raw_value, cur) = AttValueToken.parse(cur).at(value_offset)?;
        if let Ok((_, cur)) = SToken.parse(cur) {
            cursor = cur;
            got_whitespace = true;
        } else {
            cursor = cur;
            got_whitespace = false;
        }

        if attributes.iter().any(|attr| attr.name() == attr_name) {
            return Err(Failure::new(
                XmlError::NonUniqueAttribute {
                    attribute: attr_name.to_string(),
                },
                offset,
            ));
        }

        let value = expander.expand_attribute(raw_value, value_offset)?;
        attributes.push(Attribute::new(attr_name, value));
    }

    Err(Failure::new(XmlError::ExpectedElementEnd, at(origin, cursor)))
}

/// Replacement text of a general entity being read as content.
struct ContentFrame {
    entity: Rc<Entity>,
    text: Rc<str>,
    pos: usize,
    /// Open elements when the frame was entered.
    base: usize,
    /// Document offset of the outermost reference.
    origin: usize,
}

enum Step<'a> {
    Event(XmlEvent<'a>),
    Continue,
    End,
}

/// XML Pull Parser
///
/// Created by [`XmlParser::reader`](crate::XmlParser::reader). After the
/// first error every call to [`next`](Reader::next) returns that error again.
pub struct Reader<'a> {
    input: &'a str,
    start: usize,
    cursor: Cursor<'a>,
    expander: &'a mut EntityExpander,
    frames: Vec<ContentFrame>,
    stack: Vec<Cow<'a, str>>,
    attributes: Vec<Attribute<'a>>,
    empty: bool,
    seen_root: bool,
    seen_doctype: bool,
    failed: Option<ParseError>,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(input: &'a str, expander: &'a mut EntityExpander) -> Self {
        let start = if input.starts_with('\u{feff}') { 3 } else { 0 };
        Self {
            input,
            start,
            cursor: Cursor::at(input, start),
            expander,
            frames: vec![],
            stack: vec![],
            attributes: Vec::with_capacity(4),
            empty: false,
            seen_root: false,
            seen_doctype: false,
            failed: None,
        }
    }

    /// Name of the innermost open element.
    pub fn top_name(&self) -> Option<&str> {
        self.stack.last().map(|name| name as &str)
    }

    /// Attributes of the last start tag.
    pub fn attributes(&self) -> &[Attribute<'a>] {
        &self.attributes
    }

    pub fn drain_attributes(&mut self) -> Vec<Attribute<'a>> {
        std::mem::take(&mut self.attributes)
    }

    /// Document position of the read cursor, the outermost entity reference
    /// while inside an expansion.
    pub fn position(&self) -> Position {
        let offset = self
            .frames
            .first()
            .map_or(self.cursor.offset(), |frame| frame.origin);
        Position::locate(self.input, offset)
    }

    pub fn current_indirection_depth(&self) -> usize {
        self.expander.budget().current_indirection_depth()
    }

    pub fn cumulative_expanded_chars(&self) -> u64 {
        self.expander.budget().cumulative_expanded_chars()
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Option<XmlEvent<'a>>, ParseError> {
        if let Some(err) = &self.failed {
            return Err(err.clone());
        }
        self.attributes.clear();
        self.next_event().map_err(|failure| self.fail(failure))
    }

    fn fail(&mut self, failure: Failure) -> ParseError {
        self.expander.unwind();
        self.frames.clear();
        let err = ParseError::new(failure.error, Position::locate(self.input, failure.offset));
        self.failed = Some(err.clone());
        err
    }

    fn next_event(&mut self) -> Result<Option<XmlEvent<'a>>, Failure> {
        if self.empty {
            self.empty = false;
            if let Some(name) = self.stack.pop() {
                return Ok(Some(XmlEvent::etag(name)));
            }
        }

        loop {
            let event = if let Some(top) = self.frames.len().checked_sub(1) {
                let text = Rc::clone(&self.frames[top].text);
                let cursor = Cursor::at(&text, self.frames[top].pos);
                let origin = self.frames[top].origin;
                if cursor.is_at_end() {
                    self.close_frame()?;
                    continue;
                }
                let (content, next) = read_content(self.expander, cursor, Some(origin))?;
                self.frames[top].pos = next.offset();
                self.content(content.into_owned(), origin)?
            } else if self.stack.is_empty() {
                match self.misc()? {
                    Step::Event(event) => Some(event),
                    Step::Continue => None,
                    Step::End => return Ok(None),
                }
            } else {
                let offset = self.cursor.offset();
                if self.cursor.is_at_end() {
                    return Err(Failure::new(XmlError::OpenElementAtEof, offset));
                }
                let (content, next) = read_content(self.expander, self.cursor, None)?;
                self.cursor = next;
                self.content(content, offset)?
            };

            if let Some(event) = event {
                return Ok(Some(event));
            }
        }
    }

    fn close_frame(&mut self) -> Result<(), Failure> {
        if let Some(frame) = self.frames.pop() {
            if self.stack.len() != frame.base {
                return Err(Failure::new(
                    XmlError::UnbalancedEntityContent {
                        entity: frame.entity.reference(),
                    },
                    frame.origin,
                ));
            }
            self.expander.leave();
        }
        Ok(())
    }

    fn content(&mut self, content: Content<'a>, origin: usize) -> Result<Option<XmlEvent<'a>>, Failure> {
        Ok(match content {
            Content::STag {
                name,
                attributes,
                empty,
            } => {
                self.stack.push(name.clone());
                self.attributes = attributes;
                self.empty = empty;
                self.seen_root = true;
                Some(XmlEvent::stag(name, empty))
            }
            Content::ETag(name) => {
                if let Some(frame) = self.frames.last() {
                    if self.stack.len() <= frame.base {
                        return Err(Failure::new(
                            XmlError::UnbalancedEntityContent {
                                entity: frame.entity.reference(),
                            },
                            origin,
                        ));
                    }
                }
                match self.stack.pop() {
                    Some(expected_name) if expected_name == name => Some(XmlEvent::etag(name)),
                    Some(expected_name) => {
                        return Err(Failure::new(
                            XmlError::WrongETagName {
                                expected_name: expected_name.into_owned(),
                            },
                            origin,
                        ))
                    }
                    None => return Err(Failure::new(XmlError::ExpectedDocumentEnd, origin)),
                }
            }
            Content::Text(text) => Some(XmlEvent::Characters(text)),
            Content::CharRef(c) => Some(XmlEvent::characters(c.to_string())),
            Content::EntityRef(name) => self.reference(&name, origin)?,
            Content::PI(pi) => Some(XmlEvent::PI(pi)),
            Content::Comment(comment) => Some(XmlEvent::Comment(comment)),
        })
    }

    fn reference(&mut self, name: &str, origin: usize) -> Result<Option<XmlEvent<'a>>, Failure> {
        if let Some(text) = predefined_entity(name) {
            return Ok(Some(XmlEvent::characters(text)));
        }

        match self
            .expander
            .resolve(name, EntityKind::General, RefContext::Content, origin)?
        {
            Resolution::Expand { entity, text } => {
                self.frames.push(ContentFrame {
                    entity,
                    text,
                    pos: 0,
                    base: self.stack.len(),
                    origin,
                });
                Ok(None)
            }
            Resolution::Verbatim => Ok(Some(XmlEvent::characters(format!("&{};", name)))),
            Resolution::Skip => Ok(None),
        }
    }

    /// Prolog and epilog: everything outside the root element.
    fn misc(&mut self) -> Result<Step<'a>, Failure> {
        let cursor = self.cursor;
        let offset = cursor.offset();
        let fail = |error| Err(Failure::new(error, offset));

        match cursor.next_char() {
            None if self.seen_root => Ok(Step::End),
            None => fail(XmlError::NoRootElement),
            Some(c) if c.is_xml_whitespace() => {
                let (_, cursor) = SToken.parse(cursor).at(offset)?;
                self.cursor = cursor;
                Ok(Step::Continue)
            }
            Some('<') if offset == self.start && is_xml_decl(cursor) => {
                let (decl, cursor) = XmlDeclToken.parse(cursor).at(offset)?;
                self.cursor = cursor;
                Ok(Step::Event(XmlEvent::XmlDecl(decl)))
            }
            Some('<') if cursor.has_next_str("<!DOCTYPE") => {
                if self.seen_root || self.seen_doctype {
                    return fail(XmlError::MisplacedDoctype);
                }
                let (decl, cursor) = parse_doctype(self.expander, cursor)?;
                self.seen_doctype = true;
                self.cursor = cursor;
                Ok(Step::Event(XmlEvent::dtd(decl)))
            }
            Some('<') if cursor.has_next_str("<!--") => {
                let (comment, cursor) = CommentToken.parse(cursor).at(offset)?;
                self.cursor = cursor;
                Ok(Step::Event(XmlEvent::comment(comment)))
            }
            Some('<') if cursor.has_next_str("<?") => {
                let ((target, data), cursor) = PIToken.parse(cursor).at(offset)?;
                self.cursor = cursor;
                Ok(Step::Event(XmlEvent::pi(target, data.map(Cow::Borrowed))))
            }
            Some(_) if self.seen_root => fail(XmlError::ExpectedDocumentEnd),
            Some('<') if matches!(cursor.next_byte(1), Some(b'/') | Some(b'!')) => {
                fail(XmlError::ExpectedElementStart)
            }
            Some('<') => {
                let (content, cursor) = read_stag(self.expander, cursor.advance(1), None)?;
                self.cursor = cursor;
                Ok(match self.content(content, offset)? {
                    Some(event) => Step::Event(event),
                    None => Step::Continue,
                })
            }
            Some(c) => fail(XmlError::UnexpectedCharacter(c)),
        }
    }
}

fn is_xml_decl(cursor: Cursor) -> bool {
    cursor.has_next_str("<?xml") && cursor.next_byte(5).map_or(false, |c| c.is_xml_whitespace())
}
