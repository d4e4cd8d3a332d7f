use crate::dtd::{Entity, EntityKind};

/// Decides which external content may be fetched. Denies everything by default.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ExternalResolutionPolicy {
    pub allow_external_dtd_subset: bool,
    pub allow_external_general_entities: bool,
    pub allow_external_parameter_entities: bool,
}

impl ExternalResolutionPolicy {
    /// Internal entities are always permitted.
    pub fn permit(&self, entity: &Entity) -> bool {
        if !entity.is_external() {
            return true;
        }
        match entity.kind() {
            EntityKind::General => self.allow_external_general_entities,
            EntityKind::Parameter => self.allow_external_parameter_entities,
        }
    }

    pub fn permit_dtd_subset(&self) -> bool {
        self.allow_external_dtd_subset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtd::ExternalId;

    #[test]
    fn default_denies_external() {
        let policy = ExternalResolutionPolicy::default();
        let general = Entity::external("g", EntityKind::General, ExternalId::system("g.xml"));
        let parameter = Entity::external("p", EntityKind::Parameter, ExternalId::system("p.dtd"));
        assert!(!policy.permit(&general));
        assert!(!policy.permit(&parameter));
        assert!(!policy.permit_dtd_subset());
        assert!(policy.permit(&Entity::internal("i", EntityKind::General, "text")));
    }

    #[test]
    fn flags_are_independent() {
        let policy = ExternalResolutionPolicy {
            allow_external_general_entities: true,
            ..Default::default()
        };
        let general = Entity::external("g", EntityKind::General, ExternalId::system("g.xml"));
        let parameter = Entity::external("p", EntityKind::Parameter, ExternalId::system("p.dtd"));
        assert!(policy.permit(&general));
        assert!(!policy.permit(&parameter));
        assert!(!policy.permit_dtd_subset());
    }
}
