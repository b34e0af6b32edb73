//! Domain-side type descriptors.

use super::{SqlTypeCode, Value};
use std::cmp::Ordering;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DomainType {
    Boolean,
    Integer,
    Long,
    Double,
    Decimal,
    String,
    Bytes,
    Date,
    Timestamp,
    /// Embeddable (component) type, by name.
    Embeddable(String),
    /// Reference to another entity, by entity name.
    Entity(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutability {
    Immutable,
    Mutable,
}

/// Seed/increment/compare rules for version attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSupport {
    Counter32,
    Counter64,
    Timestamp,
}

impl DomainType {
    pub fn name(&self) -> &str {
        match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Long => "long",
            Self::Double => "double",
            Self::Decimal => "decimal",
            Self::String => "string",
            Self::Bytes => "binary",
            Self::Date => "date",
            Self::Timestamp => "timestamp",
            Self::Embeddable(name) | Self::Entity(name) => name,
        }
    }

    /// Whether `value` is already an instance of this domain type.
    pub fn is_instance(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Boolean, Value::Boolean(_))
            | (Self::Integer, Value::Integer(_))
            | (Self::Long, Value::Long(_))
            | (Self::Double, Value::Double(_))
            | (Self::Decimal, Value::Decimal(_))
            | (Self::String, Value::Text(_))
            | (Self::Bytes, Value::Bytes(_))
            | (Self::Date, Value::Date(_))
            | (Self::Timestamp, Value::Timestamp(_)) => true,
            (Self::Embeddable(name), Value::Embeddable(e)) => *name == e.type_name,
            (Self::Entity(name), Value::EntityRef(r)) => *name == r.entity,
            _ => false,
        }
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, Self::Date | Self::Timestamp)
    }

    pub fn mutability(&self) -> Mutability {
        match self {
            Self::Bytes | Self::Embeddable(_) => Mutability::Mutable,
            _ => Mutability::Immutable,
        }
    }

    pub fn version_support(&self) -> Option<VersionSupport> {
        match self {
            Self::Integer => Some(VersionSupport::Counter32),
            Self::Long => Some(VersionSupport::Counter64),
            Self::Timestamp => Some(VersionSupport::Timestamp),
            _ => None,
        }
    }

    /// The SQL type a column of this domain type maps to by default.
    pub fn default_sql_type(&self) -> Option<SqlTypeCode> {
        Some(match self {
            Self::Boolean => SqlTypeCode::Boolean,
            Self::Integer => SqlTypeCode::Integer,
            Self::Long => SqlTypeCode::BigInt,
            Self::Double => SqlTypeCode::Double,
            Self::Decimal => SqlTypeCode::Numeric,
            Self::String => SqlTypeCode::Varchar,
            Self::Bytes => SqlTypeCode::VarBinary,
            Self::Date => SqlTypeCode::Date,
            Self::Timestamp => SqlTypeCode::Timestamp,
            Self::Embeddable(_) | Self::Entity(_) => return None,
        })
    }

    pub fn are_equal(&self, a: &Value, b: &Value) -> bool {
        match (self, a, b) {
            (Self::Double, Value::Double(x), Value::Double(y)) => x.to_bits() == y.to_bits(),
            _ => a == b,
        }
    }
}

impl VersionSupport {
    pub fn seed(self) -> Value {
        match self {
            Self::Counter32 => Value::Integer(0),
            Self::Counter64 => Value::Long(0),
            Self::Timestamp => Value::Timestamp(now_micros()),
        }
    }

    /// The version following `current`; `None` when `current` is not a
    /// version value of this kind.
    pub fn next(self, current: &Value) -> Option<Value> {
        match (self, current) {
            (Self::Counter32, Value::Integer(v)) => Some(Value::Integer(v.wrapping_add(1))),
            (Self::Counter64, Value::Long(v)) => Some(Value::Long(v.wrapping_add(1))),
            (Self::Timestamp, Value::Timestamp(v)) => {
                Some(Value::Timestamp(now_micros().max(v.saturating_add(1))))
            }
            (_, Value::Null) => Some(self.seed()),
            _ => None,
        }
    }

    pub fn compare(self, a: &Value, b: &Value) -> Option<Ordering> {
        Some(a.as_i64()?.cmp(&b.as_i64()?))
    }
}

fn now_micros() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_micros()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
