//! Discriminator column and the value <-> entity mapping table.

use super::navigable::{NavigableRole, QueryResult};
use super::table::Column;
use crate::error::{Error, Result};
use crate::sql::{ColumnReference, InValue};
use crate::types::{DomainType, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum DiscriminatorValue {
    Literal(Value),
    /// Matches rows whose discriminator is null.
    Null,
    /// Matches any non-null value no other entity claims.
    NotNull,
}

impl DiscriminatorValue {
    /// Parses a mapped value: `null`, `not null`, or a literal of `domain`.
    pub fn parse(raw: &str, domain: &DomainType) -> Result<Self> {
        let trimmed = raw.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "null" => return Ok(Self::Null),
            "not null" => return Ok(Self::NotNull),
            _ => {}
        }
        let invalid = || {
            Error::modeling(format!(
                "could not interpret discriminator value [{raw}] as {}",
                domain.name()
            ))
        };
        let literal = match domain {
            DomainType::String => Value::text(trimmed.trim_matches('\'')),
            DomainType::Integer => Value::Integer(trimmed.parse().map_err(|_| invalid())?),
            DomainType::Long => Value::Long(trimmed.parse().map_err(|_| invalid())?),
            DomainType::Boolean => match trimmed {
                "1" | "true" | "Y" | "T" => Value::Boolean(true),
                "0" | "false" | "N" | "F" => Value::Boolean(false),
                _ => return Err(invalid()),
            },
            _ => return Err(invalid()),
        };
        Ok(Self::Literal(literal))
    }

    pub fn to_in_value(&self) -> InValue {
        match self {
            Self::Literal(v) => InValue::Literal(v.to_sql_literal()),
            Self::Null => InValue::Null,
            Self::NotNull => InValue::NotNull,
        }
    }
}

/// Bidirectional, total map between discriminator values and entity names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscriminatorMappings {
    entries: Vec<(DiscriminatorValue, String)>,
}

impl DiscriminatorMappings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, value: DiscriminatorValue, entity: impl Into<String>) -> Result<()> {
        let entity = entity.into();
        if let Some((_, existing)) = self.entries.iter().find(|(v, _)| *v == value) {
            return Err(Error::modeling(format!(
                "entities {existing} and {entity} share a discriminator value"
            )));
        }
        if self.entries.iter().any(|(_, e)| *e == entity) {
            return Err(Error::modeling(format!(
                "entity {entity} mapped to two discriminator values"
            )));
        }
        self.entries.push((value, entity));
        Ok(())
    }

    /// The entity a row with discriminator `value` materializes as.
    pub fn entity_for_value(&self, value: &Value) -> Option<&str> {
        let find = |wanted: &DiscriminatorValue| {
            self.entries
                .iter()
                .find(|(v, _)| v == wanted)
                .map(|(_, e)| e.as_str())
        };
        if value.is_null() {
            return find(&DiscriminatorValue::Null);
        }
        self.entries
            .iter()
            .find(|(v, _)| matches!(v, DiscriminatorValue::Literal(l) if literal_eq(l, value)))
            .map(|(_, e)| e.as_str())
            .or_else(|| find(&DiscriminatorValue::NotNull))
    }

    pub fn value_for_entity(&self, entity: &str) -> Option<&DiscriminatorValue> {
        self.entries
            .iter()
            .find(|(_, e)| e == entity)
            .map(|(v, _)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DiscriminatorValue, &str)> {
        self.entries.iter().map(|(v, e)| (v, e.as_str()))
    }
}

// drivers may widen integer columns
fn literal_eq(mapped: &Value, found: &Value) -> bool {
    match (mapped.as_i64(), found.as_i64()) {
        (Some(a), Some(b)) => a == b,
        _ => mapped == found,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiscriminatorDescriptor {
    pub role: NavigableRole,
    pub column: Column,
    pub mappings: DiscriminatorMappings,
    /// Restrict every query by the discriminator, even for the root.
    pub forced: bool,
    pub insertable: bool,
}

impl DiscriminatorDescriptor {
    /// The value written for new rows of `entity`.
    pub fn insert_value(&self, entity: &str) -> Result<Option<Value>> {
        match self.mappings.value_for_entity(entity) {
            Some(DiscriminatorValue::Literal(v)) => Ok(Some(v.clone())),
            Some(DiscriminatorValue::Null) => Ok(Some(Value::Null)),
            Some(DiscriminatorValue::NotNull) => Err(Error::modeling(format!(
                "cannot insert {entity}: its discriminator value is `not null`"
            ))),
            None => Ok(None),
        }
    }

    pub fn resolve_entity(&self, value: &Value) -> Result<&str> {
        self.mappings.entity_for_value(value).ok_or_else(|| {
            Error::modeling(format!(
                "unknown discriminator value [{}] for {}",
                value.loggable(),
                self.role
            ))
        })
    }

    pub fn create_query_result(&self, alias: &str) -> QueryResult {
        QueryResult {
            role: self.role.clone(),
            columns: vec![ColumnReference::new(alias, self.column.name.clone())],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mappings() -> DiscriminatorMappings {
        let mut m = DiscriminatorMappings::new();
        m.insert(DiscriminatorValue::Literal(Value::text("P")), "Person").unwrap();
        m.insert(DiscriminatorValue::Literal(Value::text("E")), "Employee").unwrap();
        m
    }

    #[test]
    fn test_bidirectional_lookup() {
        let m = mappings();
        assert_eq!(m.entity_for_value(&Value::text("E")), Some("Employee"));
        assert_eq!(
            m.value_for_entity("Person"),
            Some(&DiscriminatorValue::Literal(Value::text("P")))
        );
        assert_eq!(m.entity_for_value(&Value::text("X")), None);
        assert_eq!(m.entity_for_value(&Value::Null), None);
    }

    #[test]
    fn test_null_and_not_null_fallbacks() {
        let mut m = mappings();
        m.insert(DiscriminatorValue::Null, "Base").unwrap();
        m.insert(DiscriminatorValue::NotNull, "Other").unwrap();
        assert_eq!(m.entity_for_value(&Value::Null), Some("Base"));
        assert_eq!(m.entity_for_value(&Value::text("X")), Some("Other"));
        assert_eq!(m.entity_for_value(&Value::text("P")), Some("Person"));
    }

    #[test]
    fn test_duplicates_are_rejected() {
        let mut m = mappings();
        assert!(m.insert(DiscriminatorValue::Literal(Value::text("P")), "Manager").is_err());
        assert!(m.insert(DiscriminatorValue::Literal(Value::text("M")), "Person").is_err());
    }

    #[test]
    fn test_parse_values() {
        assert_eq!(
            DiscriminatorValue::parse("not null", &DomainType::String).unwrap(),
            DiscriminatorValue::NotNull
        );
        assert_eq!(
            DiscriminatorValue::parse("7", &DomainType::Integer).unwrap(),
            DiscriminatorValue::Literal(Value::Integer(7))
        );
        assert!(DiscriminatorValue::parse("x", &DomainType::Integer).is_err());
    }

    #[test]
    fn test_integer_widening() {
        let mut m = DiscriminatorMappings::new();
        m.insert(DiscriminatorValue::Literal(Value::Integer(1)), "A").unwrap();
        assert_eq!(m.entity_for_value(&Value::Long(1)), Some("A"));
    }
}
