//! Natural identifiers.

use super::attribute::{Attribute, TemporalPrecision};
use super::navigable::NavigableRole;
use super::table::Column;
use crate::error::{Error, Result};
use crate::types::SqlExpressableType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceType {
    Basic,
    Embeddable,
}

/// A natural-id attribute tagged with its slot in the entity state array.
#[derive(Debug, Clone, PartialEq)]
pub struct NaturalIdAttribute {
    pub position: usize,
    pub attribute: Attribute,
}

/// The ordered natural-id attributes of a hierarchy. Built in the
/// hierarchy's finishing pass and immutable from then on.
#[derive(Debug, Clone, PartialEq)]
pub struct NaturalIdDescriptor {
    role: NavigableRole,
    attributes: Vec<NaturalIdAttribute>,
    mutable: bool,
    cache_region: Option<String>,
}

impl NaturalIdDescriptor {
    pub(crate) fn new(
        role: NavigableRole,
        attributes: Vec<NaturalIdAttribute>,
        mutable: bool,
        cache_region: Option<String>,
    ) -> Self {
        Self {
            role,
            attributes,
            mutable,
            cache_region,
        }
    }

    pub fn role(&self) -> &NavigableRole {
        &self.role
    }

    pub fn attributes(&self) -> &[NaturalIdAttribute] {
        &self.attributes
    }

    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    pub fn cache_region(&self) -> Option<&str> {
        self.cache_region.as_deref()
    }

    pub fn columns(&self) -> Vec<&Column> {
        self.attributes
            .iter()
            .flat_map(|a| a.attribute.columns())
            .collect()
    }

    pub fn jdbc_parameter_count(&self) -> usize {
        self.attributes
            .iter()
            .map(|a| a.attribute.jdbc_type_count())
            .sum()
    }

    pub fn persistence_type(&self) -> PersistenceType {
        if self.attributes.len() == 1 {
            PersistenceType::Basic
        } else {
            PersistenceType::Embeddable
        }
    }

    /// Only a natural id of exactly one temporal attribute accepts a
    /// temporal precision.
    pub fn resolve_temporal_precision(
        &self,
        precision: TemporalPrecision,
    ) -> Result<SqlExpressableType> {
        match self.attributes.as_slice() {
            [single] => single.attribute.resolve_temporal_precision(precision),
            _ => Err(Error::modeling(format!(
                "composite natural id {} cannot be treated as a temporal parameter",
                self.role
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attribute::tests::{address, basic};
    use crate::model::navigable::NATURAL_ID_NAME;
    use crate::types::DomainType;

    fn descriptor(attributes: Vec<Attribute>) -> NaturalIdDescriptor {
        NaturalIdDescriptor::new(
            NavigableRole::new("Person").append(NATURAL_ID_NAME),
            attributes
                .into_iter()
                .map(|attribute| NaturalIdAttribute {
                    position: attribute.position,
                    attribute,
                })
                .collect(),
            false,
            None,
        )
    }

    #[test]
    fn test_parameter_count_sums_contributors() {
        let natural_id = descriptor(vec![basic("Person", "ssn", 1, DomainType::String), address(2)]);
        assert_eq!(natural_id.jdbc_parameter_count(), 3);
        assert_eq!(natural_id.persistence_type(), PersistenceType::Embeddable);
        assert_eq!(natural_id.attributes()[1].position, 2);
    }

    #[test]
    fn test_temporal_precision_rules() {
        let single = descriptor(vec![basic("Person", "born", 1, DomainType::Date)]);
        assert_eq!(single.persistence_type(), PersistenceType::Basic);
        assert!(single.resolve_temporal_precision(TemporalPrecision::Date).is_ok());

        let composite = descriptor(vec![
            basic("Person", "born", 1, DomainType::Date),
            basic("Person", "ssn", 2, DomainType::String),
        ]);
        assert!(matches!(
            composite.resolve_temporal_precision(TemporalPrecision::Date),
            Err(Error::Modeling(_))
        ));
    }
}
