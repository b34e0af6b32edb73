//! Version attribute: seed, increment and unsaved-value rules.

use super::attribute::{Attribute, AttributeKind};
use super::table::Column;
use crate::error::{Error, Result};
use crate::types::{DomainType, Value, VersionSupport};
use std::cmp::Ordering;

/// How a version value marks an instance as never persisted.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum UnsavedValue {
    /// Only a null version is conclusive.
    #[default]
    Undefined,
    Null,
    Negative,
    Value(Value),
}

impl UnsavedValue {
    pub fn parse(raw: &str, domain: &DomainType) -> Result<Self> {
        Ok(match raw.trim() {
            "undefined" => Self::Undefined,
            "null" => Self::Null,
            "negative" => Self::Negative,
            other => {
                let invalid = || Error::modeling(format!("invalid unsaved-value [{other}]"));
                match domain {
                    DomainType::Integer => Self::Value(Value::Integer(other.parse().map_err(|_| invalid())?)),
                    DomainType::Long | DomainType::Timestamp => {
                        Self::Value(Value::Long(other.parse().map_err(|_| invalid())?))
                    }
                    _ => return Err(invalid()),
                }
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VersionDescriptor {
    attribute: Attribute,
    column: Column,
    support: VersionSupport,
    unsaved_value: UnsavedValue,
}

impl VersionDescriptor {
    /// Fails unless the attribute is basic and its type supports versioning.
    pub fn new(attribute: Attribute, unsaved_value: UnsavedValue) -> Result<Self> {
        let no_support = || {
            Error::modeling(format!(
                "version attribute {} has no version support for type {}",
                attribute.role,
                attribute.domain_type().name()
            ))
        };
        let AttributeKind::Basic { column } = &attribute.kind else {
            return Err(no_support());
        };
        let support = column
            .expressable
            .domain_type()
            .version_support()
            .ok_or_else(no_support)?;
        let column = column.clone();
        Ok(Self {
            attribute,
            column,
            support,
            unsaved_value,
        })
    }

    pub fn attribute(&self) -> &Attribute {
        &self.attribute
    }

    pub fn position(&self) -> usize {
        self.attribute.position
    }

    pub fn column(&self) -> &Column {
        &self.column
    }

    pub fn unsaved_value(&self) -> &UnsavedValue {
        &self.unsaved_value
    }

    pub fn seed(&self) -> Value {
        self.support.seed()
    }

    pub fn increment(&self, current: &Value) -> Result<Value> {
        self.support.next(current).ok_or_else(|| {
            Error::modeling(format!(
                "[{}] is not a valid value for version {}",
                current.loggable(),
                self.attribute.role
            ))
        })
    }

    pub fn compare(&self, a: &Value, b: &Value) -> Option<Ordering> {
        self.support.compare(a, b)
    }

    /// `Some(true)` if `version` marks a transient instance, `Some(false)` if
    /// it marks a persistent one, `None` when it cannot tell.
    pub fn is_unsaved(&self, version: &Value) -> Option<bool> {
        match &self.unsaved_value {
            UnsavedValue::Undefined => version.is_null().then_some(true),
            UnsavedValue::Null => Some(version.is_null()),
            UnsavedValue::Negative => {
                Some(version.is_null() || version.as_i64().is_some_and(|v| v < 0))
            }
            UnsavedValue::Value(v) => Some(version.is_null() || literal_eq(v, version)),
        }
    }
}

fn literal_eq(a: &Value, b: &Value) -> bool {
    match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Whether an update must bump the version: a dirty collection, or any dirty
/// attribute that participates in optimistic locking.
pub fn is_version_increment_required(
    dirty_fields: &[usize],
    has_dirty_collection: bool,
    versionability: &[bool],
) -> bool {
    has_dirty_collection
        || dirty_fields
            .iter()
            .any(|&i| versionability.get(i).copied().unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attribute::tests::basic;

    fn version(domain: DomainType, unsaved: UnsavedValue) -> Result<VersionDescriptor> {
        VersionDescriptor::new(basic("Person", "ver", 3, domain), unsaved)
    }

    #[test]
    fn test_requires_version_support() {
        assert!(matches!(
            version(DomainType::String, UnsavedValue::Undefined),
            Err(Error::Modeling(_))
        ));
        assert!(version(DomainType::Integer, UnsavedValue::Undefined).is_ok());
    }

    #[test]
    fn test_seed_and_increment() {
        let v = version(DomainType::Integer, UnsavedValue::Undefined).unwrap();
        assert_eq!(v.seed(), Value::Integer(0));
        assert_eq!(v.increment(&Value::Integer(1)).unwrap(), Value::Integer(2));
        assert!(v.increment(&Value::text("a")).is_err());
        assert_eq!(v.column().name, "ver");
        assert_eq!(v.position(), 3);
    }

    #[test]
    fn test_unsaved_rules() {
        let undefined = version(DomainType::Integer, UnsavedValue::Undefined).unwrap();
        assert_eq!(undefined.is_unsaved(&Value::Null), Some(true));
        assert_eq!(undefined.is_unsaved(&Value::Integer(0)), None);

        let negative = version(DomainType::Integer, UnsavedValue::Negative).unwrap();
        assert_eq!(negative.is_unsaved(&Value::Integer(-1)), Some(true));
        assert_eq!(negative.is_unsaved(&Value::Integer(0)), Some(false));

        let explicit = version(DomainType::Long, UnsavedValue::Value(Value::Long(0))).unwrap();
        assert_eq!(explicit.is_unsaved(&Value::Long(0)), Some(true));
        assert_eq!(explicit.is_unsaved(&Value::Long(1)), Some(false));
    }

    #[test]
    fn test_increment_required() {
        let versionability = [true, false, true];
        assert!(!is_version_increment_required(&[1], false, &versionability));
        assert!(is_version_increment_required(&[1], true, &versionability));
        assert!(is_version_increment_required(&[0, 1], false, &versionability));
        assert!(!is_version_increment_required(&[], false, &versionability));
    }

    #[test]
    fn test_parse_unsaved_value() {
        assert_eq!(
            UnsavedValue::parse("negative", &DomainType::Integer).unwrap(),
            UnsavedValue::Negative
        );
        assert_eq!(
            UnsavedValue::parse("-1", &DomainType::Integer).unwrap(),
            UnsavedValue::Value(Value::Integer(-1))
        );
        assert!(UnsavedValue::parse("x", &DomainType::Integer).is_err());
    }
}
