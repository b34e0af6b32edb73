//! Crate-wide error type.

use crate::jdbc::JdbcError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Mapping error: {0}")]
    Modeling(String),
    #[error("Operation `{operation}` is not supported by {target}")]
    Unsupported {
        operation: &'static str,
        target: String,
    },
    #[error("Row was updated or deleted by another transaction (or unsaved-value mapping was incorrect): [{entity}#{id}]")]
    StaleObjectState { entity: String, id: String },
    #[error("Duplicate identifier in table for: {info}")]
    DuplicateIdentifier { info: String },
    #[error("The INSERT statement for table [{table}] contains no column, and this is not supported by [{dialect}]")]
    NoColumnsInsert { table: String, dialect: String },
    #[error("Invalid setting: {0}")]
    Config(String),
    #[error("Malformed SQL fragment: {0}")]
    Template(String),
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),
    #[error("JDBC error: {0}")]
    Jdbc(#[from] JdbcError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn modeling(message: impl Into<String>) -> Self {
        Self::Modeling(message.into())
    }

    pub(crate) fn unsupported(operation: &'static str, target: impl Into<String>) -> Self {
        Self::Unsupported {
            operation,
            target: target.into(),
        }
    }
}

/// Human-readable `entity#id` description used in diagnostics.
pub fn info_string(entity: &str, id: &crate::types::Value) -> String {
    format!("[{}#{}]", entity, id.loggable())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    #[test]
    fn test_stale_state_message_carries_entity_and_id() {
        let err = Error::StaleObjectState {
            entity: "Person".to_string(),
            id: "42".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Person#42"));
    }

    #[test]
    fn test_info_string() {
        assert_eq!(info_string("Person", &Value::Long(7)), "[Person#7]");
    }

    #[test]
    fn test_jdbc_error_converts() {
        let err: Error = JdbcError::Closed.into();
        assert!(matches!(err, Error::Jdbc(JdbcError::Closed)));
    }
}
