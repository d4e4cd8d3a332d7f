//! Document type declaration and the entities it declares.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Document Type Declaration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocTypeDecl {
    name: String,
    external_id: Option<ExternalId>,
    has_int_subset: bool,
}

impl DocTypeDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            external_id: None,
            has_int_subset: false,
        }
    }

    pub fn with_external_id(mut self, external_id: Option<ExternalId>) -> Self {
        self.external_id = external_id;
        self
    }

    pub fn with_int_subset(mut self, has_int_subset: bool) -> Self {
        self.has_int_subset = has_int_subset;
        self
    }

    /// Name of the document element
    pub fn name(&self) -> &str {
        &self.name
    }

    /// External DTD subset
    pub fn external_id(&self) -> Option<&ExternalId> {
        self.external_id.as_ref()
    }

    pub fn has_int_subset(&self) -> bool {
        self.has_int_subset
    }
}

/// External ID
///
/// `ExternalID ::= 'SYSTEM' S SystemLiteral | 'PUBLIC' S PubidLiteral S SystemLiteral`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ExternalId {
    System { system: String },
    Public { pub_id: String, system: String },
}

impl ExternalId {
    pub fn system(system: impl Into<String>) -> Self {
        ExternalId::System {
            system: system.into(),
        }
    }

    pub fn public(pub_id: impl Into<String>, system: impl Into<String>) -> Self {
        ExternalId::Public {
            pub_id: pub_id.into(),
            system: system.into(),
        }
    }

    pub fn system_id(&self) -> &str {
        match self {
            ExternalId::System { system } | ExternalId::Public { system, .. } => system,
        }
    }

    pub fn public_id(&self) -> Option<&str> {
        match self {
            ExternalId::System { .. } => None,
            ExternalId::Public { pub_id, .. } => Some(pub_id),
        }
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternalId::System { system } => write!(f, "SYSTEM \"{}\"", system),
            ExternalId::Public { pub_id, system } => {
                write!(f, "PUBLIC \"{}\" \"{}\"", pub_id, system)
            }
        }
    }
}

/// General entities are referenced in content, parameter entities in the DTD.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    General,
    Parameter,
}

impl EntityKind {
    /// Reference syntax for `name`: `&name;` or `%name;`.
    pub fn reference(self, name: &str) -> String {
        match self {
            EntityKind::General => format!("&{};", name),
            EntityKind::Parameter => format!("%{};", name),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum EntityDef {
    Internal(Rc<str>),
    External {
        external_id: ExternalId,
        notation: Option<String>,
    },
}

/// Declared entity
///
/// Immutable once declared. Replacement text of internal entities has
/// character references and parameter-entity references already replaced,
/// general-entity references are kept and expanded on use.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entity {
    name: String,
    kind: EntityKind,
    def: EntityDef,
}

impl Entity {
    pub fn internal(name: impl Into<String>, kind: EntityKind, text: impl Into<Rc<str>>) -> Self {
        Self {
            name: name.into(),
            kind,
            def: EntityDef::Internal(text.into()),
        }
    }

    pub fn external(name: impl Into<String>, kind: EntityKind, external_id: ExternalId) -> Self {
        Self {
            name: name.into(),
            kind,
            def: EntityDef::External {
                external_id,
                notation: None,
            },
        }
    }

    /// Unparsed entity (`NDATA`), general entities only.
    pub fn unparsed(
        name: impl Into<String>,
        external_id: ExternalId,
        notation: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: EntityKind::General,
            def: EntityDef::External {
                external_id,
                notation: Some(notation.into()),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn is_external(&self) -> bool {
        matches!(self.def, EntityDef::External { .. })
    }

    pub fn is_unparsed(&self) -> bool {
        self.notation().is_some()
    }

    pub fn replacement_text(&self) -> Option<&str> {
        match &self.def {
            EntityDef::Internal(text) => Some(text),
            EntityDef::External { .. } => None,
        }
    }

    pub(crate) fn def(&self) -> &EntityDef {
        &self.def
    }

    pub fn external_id(&self) -> Option<&ExternalId> {
        match &self.def {
            EntityDef::Internal(_) => None,
            EntityDef::External { external_id, .. } => Some(external_id),
        }
    }

    pub fn notation(&self) -> Option<&str> {
        match &self.def {
            EntityDef::External {
                notation: Some(notation),
                ..
            } => Some(notation),
            _ => None,
        }
    }

    /// Reference syntax, used in error messages.
    pub fn reference(&self) -> String {
        self.kind.reference(&self.name)
    }
}

/// Replacement of a predefined entity (`lt`, `gt`, `amp`, `apos` or `quot`).
pub fn predefined_entity(name: &str) -> Option<&'static str> {
    match name {
        "lt" => Some("<"),
        "gt" => Some(">"),
        "amp" => Some("&"),
        "apos" => Some("'"),
        "quot" => Some("\""),
        _ => None,
    }
}

/// Entities declared by the document, keyed by name and kind.
///
/// The first declaration of a name wins, later ones are ignored. Predefined
/// entities are never stored.
#[derive(Clone, Debug, Default)]
pub struct EntityTable {
    general: HashMap<String, Rc<Entity>>,
    parameter: HashMap<String, Rc<Entity>>,
    ignore_declarations: bool,
}

impl EntityTable {
    pub fn new(ignore_declarations: bool) -> Self {
        Self {
            general: HashMap::new(),
            parameter: HashMap::new(),
            ignore_declarations,
        }
    }

    fn map(&self, kind: EntityKind) -> &HashMap<String, Rc<Entity>> {
        match kind {
            EntityKind::General => &self.general,
            EntityKind::Parameter => &self.parameter,
        }
    }

    /// Adds `entity` unless its name is taken or declarations are ignored.
    ///
    /// Returns whether the entity was stored.
    pub fn declare(&mut self, entity: Entity) -> bool {
        if self.ignore_declarations {
            return false;
        }
        let map = match entity.kind {
            EntityKind::General => &mut self.general,
            EntityKind::Parameter => &mut self.parameter,
        };
        if map.contains_key(&entity.name) {
            return false;
        }
        map.insert(entity.name.clone(), Rc::new(entity));
        true
    }

    pub fn lookup(&self, name: &str, kind: EntityKind) -> Option<&Rc<Entity>> {
        self.map(kind).get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.general
            .values()
            .chain(self.parameter.values())
            .map(|entity| entity.as_ref())
    }

    pub fn len(&self) -> usize {
        self.general.len() + self.parameter.len()
    }

    pub fn is_empty(&self) -> bool {
        self.general.is_empty() && self.parameter.is_empty()
    }

    pub fn ignores_declarations(&self) -> bool {
        self.ignore_declarations
    }

    pub fn clear(&mut self) {
        self.general.clear();
        self.parameter.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_declaration_wins() {
        let mut table = EntityTable::default();
        assert!(table.declare(Entity::internal("a", EntityKind::General, "first")));
        assert!(!table.declare(Entity::internal("a", EntityKind::General, "second")));
        assert_eq!(
            Some("first"),
            table
                .lookup("a", EntityKind::General)
                .and_then(|e| e.replacement_text())
        );
    }

    #[test]
    fn kinds_are_separate_namespaces() {
        let mut table = EntityTable::default();
        assert!(table.declare(Entity::internal("a", EntityKind::General, "g")));
        assert!(table.declare(Entity::internal("a", EntityKind::Parameter, "p")));
        assert_eq!(2, table.len());
        assert_eq!(
            Some("p"),
            table
                .lookup("a", EntityKind::Parameter)
                .and_then(|e| e.replacement_text())
        );
    }

    #[test]
    fn ignored_declarations() {
        let mut table = EntityTable::new(true);
        assert!(!table.declare(Entity::internal("a", EntityKind::General, "x")));
        assert!(table.is_empty());
        assert!(table.lookup("a", EntityKind::General).is_none());
    }

    #[test]
    fn external_entity() {
        let entity = Entity::external("ee", EntityKind::General, ExternalId::system("a.xml"));
        assert!(entity.is_external());
        assert!(!entity.is_unparsed());
        assert_eq!(None, entity.replacement_text());
        assert_eq!("&ee;", entity.reference());

        let entity = Entity::unparsed("img", ExternalId::public("-//X//", "i.png"), "png");
        assert!(entity.is_unparsed());
        assert_eq!(Some("-//X//"), entity.external_id().and_then(|id| id.public_id()));
    }
}
