//! Parser configuration

use crate::frontend::XmlParser;
use crate::guard::{ExpansionBudget, ExternalResolutionPolicy};
use crate::{DEFAULT_MAX_ENTITY_EXPANSIONS, DEFAULT_MAX_ENTITY_INDIRECTIONS};

/// Handling of references to entities that were never declared.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum UndefinedEntities {
    #[default]
    /// Abort the parse with [`UndefinedEntity`](crate::ErrorKind::UndefinedEntity).
    Fatal,
    /// Report the reference text `&name;` as character data.
    Verbatim,
}

/// Parser configuration structure.
///
/// The defaults are the hardened posture: both ceilings enabled and every
/// external fetch denied. A ceiling of 0 means unlimited.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ParserConfig {
    /// Maximum nesting of entity references inside entity replacement text.
    pub max_entity_indirections: usize,
    /// Maximum number of characters produced by all entity expansions of a
    /// document together.
    pub max_entity_expansions: u64,
    /// Discard every entity declaration. All non-predefined references are
    /// then undefined.
    pub reset_dtd: bool,
    pub allow_external_dtd_subset: bool,
    pub allow_external_general_entities: bool,
    pub allow_external_parameter_entities: bool,
    pub undefined_entities: UndefinedEntities,
    /// Drop references to denied external entities instead of failing.
    pub skip_denied_external_entities: bool,
}

impl ParserConfig {
    /// Returns a new config with default values.
    pub fn new() -> Self {
        Self {
            max_entity_indirections: DEFAULT_MAX_ENTITY_INDIRECTIONS,
            max_entity_expansions: DEFAULT_MAX_ENTITY_EXPANSIONS,
            reset_dtd: false,
            allow_external_dtd_subset: false,
            allow_external_general_entities: false,
            allow_external_parameter_entities: false,
            undefined_entities: UndefinedEntities::Fatal,
            skip_denied_external_entities: false,
        }
    }

    #[must_use]
    pub fn max_entity_indirections(mut self, value: usize) -> Self {
        self.max_entity_indirections = value;
        self
    }

    #[must_use]
    pub fn max_entity_expansions(mut self, value: u64) -> Self {
        self.max_entity_expansions = value;
        self
    }

    #[must_use]
    pub fn reset_dtd(mut self, value: bool) -> Self {
        self.reset_dtd = value;
        self
    }

    #[must_use]
    pub fn allow_external_dtd_subset(mut self, value: bool) -> Self {
        self.allow_external_dtd_subset = value;
        self
    }

    #[must_use]
    pub fn allow_external_general_entities(mut self, value: bool) -> Self {
        self.allow_external_general_entities = value;
        self
    }

    #[must_use]
    pub fn allow_external_parameter_entities(mut self, value: bool) -> Self {
        self.allow_external_parameter_entities = value;
        self
    }

    #[must_use]
    pub fn undefined_entities(mut self, value: UndefinedEntities) -> Self {
        self.undefined_entities = value;
        self
    }

    #[must_use]
    pub fn skip_denied_external_entities(mut self, value: bool) -> Self {
        self.skip_denied_external_entities = value;
        self
    }

    /// Creates a parser with this configuration.
    #[inline]
    pub fn build(self) -> XmlParser {
        XmlParser::new(self)
    }

    pub fn policy(&self) -> ExternalResolutionPolicy {
        ExternalResolutionPolicy {
            allow_external_dtd_subset: self.allow_external_dtd_subset,
            allow_external_general_entities: self.allow_external_general_entities,
            allow_external_parameter_entities: self.allow_external_parameter_entities,
        }
    }

    pub(crate) fn budget(&self) -> ExpansionBudget {
        ExpansionBudget::new(self.max_entity_indirections, self.max_entity_expansions)
    }
}

impl Default for ParserConfig {
    #[inline]
    fn default() -> Self {
        ParserConfig::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ParserConfig::default();
        assert_eq!(40, config.max_entity_indirections);
        assert_eq!(8 * 1024 * 1024, config.max_entity_expansions);
        assert!(!config.reset_dtd);
        assert_eq!(ExternalResolutionPolicy::default(), config.policy());
        assert_eq!(UndefinedEntities::Fatal, config.undefined_entities);
    }

    #[test]
    fn builder() {
        let config = ParserConfig::new()
            .max_entity_indirections(2)
            .max_entity_expansions(0)
            .allow_external_parameter_entities(true);
        assert_eq!(2, config.max_entity_indirections);
        assert_eq!(0, config.max_entity_expansions);
        assert!(config.policy().allow_external_parameter_entities);
        assert!(!config.policy().allow_external_general_entities);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn partial_json() {
        let config: ParserConfig = serde_json::from_str(
            r#"{"max_entity_indirections": 5, "undefined_entities": "verbatim"}"#,
        )
        .unwrap();
        assert_eq!(
            ParserConfig::new()
                .max_entity_indirections(5)
                .undefined_entities(UndefinedEntities::Verbatim),
            config
        );
    }
}
