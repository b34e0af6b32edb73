//! Runtime values flowing between domain state arrays and JDBC parameters.

use std::fmt;

/// A single domain or JDBC-level value.
///
/// Domain state arrays may hold [`Value::Embeddable`] instances and
/// [`Value::EntityRef`] references; their unresolved (persistable) forms are
/// [`Value::Composite`] and the referenced identifier respectively.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i32),
    Long(i64),
    Double(f64),
    Decimal(String),
    Text(String),
    Bytes(Vec<u8>),
    /// Days since 1970-01-01.
    Date(i32),
    /// Microseconds since 1970-01-01T00:00:00Z.
    Timestamp(i64),
    Embeddable(EmbeddableValue),
    Composite(Vec<Value>),
    EntityRef(EntityRef),
    /// Lazy attribute whose value was never fetched.
    Unfetched,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddableValue {
    pub type_name: String,
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityRef {
    pub entity: String,
    pub id: Box<Value>,
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn embeddable(type_name: impl Into<String>, values: Vec<Value>) -> Self {
        Self::Embeddable(EmbeddableValue {
            type_name: type_name.into(),
            values,
        })
    }

    pub fn entity_ref(entity: impl Into<String>, id: Value) -> Self {
        Self::EntityRef(EntityRef {
            entity: entity.into(),
            id: Box::new(id),
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_unfetched(&self) -> bool {
        matches!(self, Self::Unfetched)
    }

    /// Null, or a composite whose every part is null.
    pub fn is_null_like(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Composite(parts) => parts.iter().all(Value::is_null_like),
            Self::Embeddable(e) => e.values.iter().all(Value::is_null_like),
            _ => false,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(i64::from(*v)),
            Self::Long(v) | Self::Timestamp(v) => Some(*v),
            Self::Date(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    /// Representation used by trace logging.
    pub fn loggable(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Boolean(v) => v.to_string(),
            Self::Integer(v) => v.to_string(),
            Self::Long(v) => v.to_string(),
            Self::Double(v) => v.to_string(),
            Self::Decimal(v) | Self::Text(v) => v.clone(),
            Self::Bytes(v) => format!("<{} bytes>", v.len()),
            Self::Date(v) => format!("date({v})"),
            Self::Timestamp(v) => format!("timestamp({v})"),
            Self::Embeddable(e) => format!(
                "{}({})",
                e.type_name,
                e.values.iter().map(Value::loggable).collect::<Vec<_>>().join(", ")
            ),
            Self::Composite(parts) => format!(
                "({})",
                parts.iter().map(Value::loggable).collect::<Vec<_>>().join(", ")
            ),
            Self::EntityRef(r) => format!("{}#{}", r.entity, r.id.loggable()),
            Self::Unfetched => "<unfetched>".to_string(),
        }
    }

    /// Inline SQL literal form, used for discriminator values and IN-lists.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Boolean(v) => if *v { "1" } else { "0" }.to_string(),
            Self::Integer(v) => v.to_string(),
            Self::Long(v) | Self::Timestamp(v) => v.to_string(),
            Self::Date(v) => v.to_string(),
            Self::Double(v) => v.to_string(),
            Self::Decimal(v) => v.clone(),
            Self::Text(v) => format!("'{}'", v.replace('\'', "''")),
            Self::Bytes(v) => {
                let hex: String = v.iter().map(|b| format!("{b:02X}")).collect();
                format!("X'{hex}'")
            }
            Self::Composite(parts) => format!(
                "({})",
                parts.iter().map(Value::to_sql_literal).collect::<Vec<_>>().join(", ")
            ),
            Self::Embeddable(e) => format!(
                "({})",
                e.values.iter().map(Value::to_sql_literal).collect::<Vec<_>>().join(", ")
            ),
            Self::EntityRef(r) => r.id.to_sql_literal(),
            Self::Unfetched => "null".to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.loggable())
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_literal_escapes_quotes() {
        assert_eq!(Value::text("O'Neil").to_sql_literal(), "'O''Neil'");
    }

    #[test]
    fn test_null_like_composite() {
        assert!(Value::Composite(vec![Value::Null, Value::Null]).is_null_like());
        assert!(!Value::Composite(vec![Value::Null, Value::Long(1)]).is_null_like());
        assert!(!Value::Unfetched.is_null_like());
    }

    #[test]
    fn test_loggable_entity_ref() {
        let r = Value::entity_ref("Person", Value::Long(3));
        assert_eq!(r.loggable(), "Person#3");
    }

    #[test]
    fn test_option_into_value() {
        let none: Option<i64> = None;
        assert_eq!(Value::from(none), Value::Null);
        assert_eq!(Value::from(Some(5_i64)), Value::Long(5));
    }
}
