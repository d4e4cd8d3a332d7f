//! Entity reference resolution under the expansion budget.
//!
//! Every open expansion, whether a content frame of the reader, an entity
//! inside an attribute value or a parameter entity in the DTD, has one entry
//! on the active stack and one level of budget depth. Both are released by
//! [`EntityExpander::leave`], or all at once by [`EntityExpander::unwind`].

use std::borrow::Cow;
use std::rc::Rc;

use log::{debug, trace, warn};

use crate::config::{ParserConfig, UndefinedEntities};
use crate::dtd::{predefined_entity, Entity, EntityDef, EntityKind, EntityTable, ExternalId};
use crate::encoding::decode_external;
use crate::error::{Failure, XmlError};
use crate::guard::{ExpansionBudget, ExternalResolutionPolicy, Limit};
use crate::parser::{Cursor, Parser};
use crate::reader::tokens::{CharRefToken, EntityRefToken, PeReferenceToken};
use crate::resolver::{EntityResolver, NoResolver};

/// Where a reference was found.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum RefContext {
    Content,
    AttributeValue,
    EntityValue,
    /// Between markup declarations of the DTD
    DeclSep,
}

/// Outcome of resolving a reference.
#[derive(Debug)]
pub(crate) enum Resolution {
    /// Continue with `text`. Must be balanced with [`EntityExpander::leave`].
    Expand { entity: Rc<Entity>, text: Rc<str> },
    /// Undefined entity in lenient mode, report `&name;` as text.
    Verbatim,
    /// Drop the reference.
    Skip,
}

/// Literal being expanded by [`EntityExpander::expand_literal`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum LiteralMode {
    Attribute,
    EntityValue { external: bool },
}

struct LiteralFrame {
    text: Rc<str>,
    pos: usize,
    entity: bool,
}

/// Entity state of one parse: declarations, counters and open expansions.
///
/// Owned by [`XmlParser`](crate::XmlParser), reset before every parse.
pub struct EntityExpander {
    config: ParserConfig,
    policy: ExternalResolutionPolicy,
    entities: EntityTable,
    budget: ExpansionBudget,
    active: Vec<Rc<Entity>>,
    resolver: Box<dyn EntityResolver>,
}

impl EntityExpander {
    pub(crate) fn new(config: ParserConfig) -> Self {
        Self {
            policy: config.policy(),
            entities: EntityTable::new(config.reset_dtd),
            budget: config.budget(),
            active: vec![],
            resolver: Box::new(NoResolver),
            config,
        }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub(crate) fn config_mut(&mut self) -> &mut ParserConfig {
        &mut self.config
    }

    pub(crate) fn set_resolver(&mut self, resolver: Box<dyn EntityResolver>) {
        self.resolver = resolver;
    }

    pub fn entities(&self) -> &EntityTable {
        &self.entities
    }

    pub fn budget(&self) -> &ExpansionBudget {
        &self.budget
    }

    pub fn policy(&self) -> ExternalResolutionPolicy {
        self.policy
    }

    /// Fresh table and counters from the current configuration.
    pub(crate) fn reset(&mut self) {
        self.policy = self.config.policy();
        self.entities = EntityTable::new(self.config.reset_dtd);
        self.budget = self.config.budget();
        self.active.clear();
    }

    pub(crate) fn declare(&mut self, entity: Entity) {
        let reference = entity.reference();
        if self.entities.declare(entity) {
            trace!("declared {}", reference);
        } else if !self.entities.ignores_declarations() {
            debug!("ignoring redeclaration of {}", reference);
        }
    }

    /// Resolves the reference `name` of `kind` found at document offset
    /// `origin`.
    ///
    /// Predefined entities are the caller's business.
    pub(crate) fn resolve(
        &mut self,
        name: &str,
        kind: EntityKind,
        context: RefContext,
        origin: usize,
    ) -> Result<Resolution, Failure> {
        let entity = match self.entities.lookup(name, kind) {
            Some(entity) => Rc::clone(entity),
            None => return self.undefined(name, kind).map_err(|err| Failure::new(err, origin)),
        };
        let fail = |error| Err(Failure::new(error, origin));

        if entity.is_unparsed() {
            return fail(XmlError::UnparsedEntityReference {
                entity: entity.reference(),
            });
        }
        if entity.is_external() && context == RefContext::AttributeValue {
            return fail(XmlError::ExternalEntityInAttribute {
                entity: entity.reference(),
            });
        }
        if self.active.iter().any(|open| Rc::ptr_eq(open, &entity)) {
            return fail(XmlError::RecursiveEntity {
                entity: entity.reference(),
            });
        }

        let text = match entity.def() {
            EntityDef::Internal(text) => Rc::clone(text),
            EntityDef::External { external_id, .. } => {
                if !self.policy.permit(&entity) {
                    if self.config.skip_denied_external_entities {
                        debug!("skipping external entity {}", entity.reference());
                        return Ok(Resolution::Skip);
                    }
                    warn!("access to external entity {} denied", entity.reference());
                    return fail(XmlError::ExternalEntityDenied {
                        entity: entity.reference(),
                    });
                }
                Rc::from(self.fetch(&entity.reference(), external_id, origin)?)
            }
        };

        let added_chars = text.chars().count() as u64;
        if let Err(exceeded) = self.budget.enter_expansion(added_chars, origin) {
            warn!(
                "{} by {} (depth {}, {} characters expanded)",
                exceeded,
                entity.reference(),
                self.budget.current_indirection_depth(),
                self.budget.cumulative_expanded_chars()
            );
            let reference = entity.reference();
            let error = match exceeded.limit {
                Limit::Indirection => XmlError::IndirectionLimitExceeded { entity: reference },
                Limit::Expansion => XmlError::ExpansionLimitExceeded { entity: reference },
            };
            return Err(Failure::new(error, exceeded.position));
        }

        trace!(
            "enter {} at depth {}",
            entity.reference(),
            self.budget.current_indirection_depth()
        );
        self.active.push(Rc::clone(&entity));
        Ok(Resolution::Expand { entity, text })
    }

    fn undefined(&self, name: &str, kind: EntityKind) -> Result<Resolution, XmlError> {
        match (kind, self.config.undefined_entities) {
            (EntityKind::Parameter, _) if self.entities.ignores_declarations() => {
                Ok(Resolution::Skip)
            }
            (_, UndefinedEntities::Fatal) => Err(XmlError::UndefinedEntity {
                entity: kind.reference(name),
            }),
            (EntityKind::General, UndefinedEntities::Verbatim) => Ok(Resolution::Verbatim),
            (EntityKind::Parameter, UndefinedEntities::Verbatim) => Ok(Resolution::Skip),
        }
    }

    /// Closes the innermost expansion.
    pub(crate) fn leave(&mut self) {
        if let Some(entity) = self.active.pop() {
            self.budget.leave_expansion();
            trace!(
                "leave {} at depth {}",
                entity.reference(),
                self.budget.current_indirection_depth()
            );
        }
    }

    /// Closes every open expansion after a failure.
    pub(crate) fn unwind(&mut self) {
        while !self.active.is_empty() {
            self.leave();
        }
    }

    /// Fetches `external_id` through the resolver and decodes it.
    fn fetch(&mut self, target: &str, external_id: &ExternalId, origin: usize) -> Result<String, Failure> {
        debug!("fetching {} from {}", target, external_id);
        let bytes = self
            .resolver
            .fetch(external_id)
            .map_err(|err| Failure::new(XmlError::resolver_failure(target, &err), origin))?;
        decode_external(&bytes).map_err(|err| Failure::new(err, origin))
    }

    /// Text of the external DTD subset, `None` when the policy denies it.
    pub(crate) fn load_dtd_subset(
        &mut self,
        external_id: &ExternalId,
        origin: usize,
    ) -> Result<Option<Rc<str>>, Failure> {
        if !self.policy.permit_dtd_subset() {
            debug!("skipping external DTD subset {}", external_id);
            return Ok(None);
        }
        self.fetch("external DTD subset", external_id, origin)
            .map(|text| Some(Rc::from(text)))
    }

    /// Normalised value of an attribute with references replaced.
    pub(crate) fn expand_attribute<'t>(
        &mut self,
        raw: &'t str,
        origin: usize,
    ) -> Result<Cow<'t, str>, Failure> {
        if !raw
            .bytes()
            .any(|c| matches!(c, b'&' | b'\t' | b'\n' | b'\r'))
        {
            return Ok(Cow::Borrowed(raw));
        }
        self.expand_literal(raw, LiteralMode::Attribute, origin)
            .map(Cow::Owned)
    }

    /// Replacement text of an entity declared with value `raw`.
    ///
    /// Character references and parameter-entity references are replaced,
    /// general-entity references are kept. Parameter entities are only
    /// allowed in external markup.
    pub(crate) fn expand_entity_value(
        &mut self,
        raw: &str,
        external: bool,
        origin: usize,
    ) -> Result<String, Failure> {
        if !raw.bytes().any(|c| matches!(c, b'&' | b'%')) {
            return Ok(raw.to_string());
        }
        self.expand_literal(raw, LiteralMode::EntityValue { external }, origin)
    }

    fn expand_literal(&mut self, raw: &str, mode: LiteralMode, origin: usize) -> Result<String, Failure> {
        let fail = |error| Failure::new(error, origin);
        let mut out = String::with_capacity(raw.len());
        let mut frames = vec![LiteralFrame {
            text: Rc::from(raw),
            pos: 0,
            entity: false,
        }];

        while let Some(top) = frames.len().checked_sub(1) {
            let text = Rc::clone(&frames[top].text);
            let pos = frames[top].pos;
            let rest = &text[pos..];
            if rest.is_empty() {
                if frames[top].entity {
                    self.leave();
                }
                frames.pop();
                continue;
            }

            let special = rest.bytes().position(|c| match mode {
                LiteralMode::Attribute => matches!(c, b'&' | b'<' | b'\t' | b'\n' | b'\r'),
                LiteralMode::EntityValue { .. } => matches!(c, b'&' | b'%'),
            });
            let end = special.unwrap_or(rest.len());
            out.push_str(&rest[..end]);
            frames[top].pos = pos + end;
            if special.is_none() {
                continue;
            }

            let cursor = Cursor::at(&text, pos + end);
            let next = match cursor.next_byte(0) {
                Some(b'<') => return Err(fail(XmlError::LtInAttributeValue)),
                Some(b'\r') if cursor.next_byte(1) == Some(b'\n') => {
                    out.push(' ');
                    cursor.advance(2)
                }
                Some(b'\t') | Some(b'\n') | Some(b'\r') => {
                    out.push(' ');
                    cursor.advance(1)
                }
                Some(b'&') if cursor.next_byte(1) == Some(b'#') => {
                    let (c, cursor) = CharRefToken.parse(cursor).map_err(fail)?;
                    out.push(c);
                    cursor
                }
                Some(b'&') => {
                    let (name, after) = EntityRefToken.parse(cursor).map_err(fail)?;
                    if let LiteralMode::EntityValue { .. } = mode {
                        out.push_str(&text[cursor.offset()..after.offset()]);
                    } else if let Some(replacement) = predefined_entity(name) {
                        out.push_str(replacement);
                    } else {
                        match self.resolve(name, EntityKind::General, RefContext::AttributeValue, origin)? {
                            Resolution::Expand { text, .. } => {
                                frames[top].pos = after.offset();
                                frames.push(LiteralFrame {
                                    text,
                                    pos: 0,
                                    entity: true,
                                });
                                continue;
                            }
                            Resolution::Verbatim => {
                                out.push_str(&text[cursor.offset()..after.offset()])
                            }
                            Resolution::Skip => {}
                        }
                    }
                    after
                }
                Some(b'%') => {
                    let (name, after) = PeReferenceToken.parse(cursor).map_err(fail)?;
                    if mode != (LiteralMode::EntityValue { external: true }) {
                        return Err(fail(XmlError::PeReferenceInMarkup {
                            entity: EntityKind::Parameter.reference(name),
                        }));
                    }
                    frames[top].pos = after.offset();
                    match self.resolve(name, EntityKind::Parameter, RefContext::EntityValue, origin)? {
                        Resolution::Expand { text, .. } => frames.push(LiteralFrame {
                            text,
                            pos: 0,
                            entity: true,
                        }),
                        Resolution::Verbatim | Resolution::Skip => {}
                    }
                    continue;
                }
                _ => cursor.advance(1),
            };
            frames[top].pos = next.offset();
        }

        Ok(out)
    }
}
