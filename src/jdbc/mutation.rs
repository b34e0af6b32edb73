//! Generic mutation execution: prepare, bind, execute, check.

use super::{Connection, JdbcError, PreparedStatement};
use crate::error::Error;
use crate::types::{SqlExpressableType, Value, ValueBinder};

#[derive(Debug, Clone, PartialEq)]
pub struct JdbcParameterBinding {
    pub value: Value,
    pub ty: SqlExpressableType,
}

/// A rendered INSERT/UPDATE/DELETE plus its ordered parameter bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct JdbcMutation {
    sql: String,
    bindings: Vec<JdbcParameterBinding>,
    affected_table: String,
}

impl JdbcMutation {
    pub fn new(
        sql: impl Into<String>,
        bindings: Vec<JdbcParameterBinding>,
        affected_table: impl Into<String>,
    ) -> Self {
        Self {
            sql: sql.into(),
            bindings,
            affected_table: affected_table.into(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn bindings(&self) -> &[JdbcParameterBinding] {
        &self.bindings
    }

    pub fn affected_table(&self) -> &str {
        &self.affected_table
    }
}

/// How the affected row count of a mutation is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultCheckStyle {
    None,
    #[default]
    Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    None,
    RowCount(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum OutcomeError {
    #[error("Batch update returned unexpected row count; actual row count: {actual}; expected: {expected}")]
    StaleState { expected: u64, actual: u64 },
    #[error("Unexpected row count: {actual}; expected: {expected}")]
    TooManyRows { expected: u64, actual: u64 },
}

impl Expectation {
    pub fn appropriate(style: ResultCheckStyle) -> Self {
        match style {
            ResultCheckStyle::None => Self::None,
            ResultCheckStyle::Count => Self::RowCount(1),
        }
    }

    pub fn verify_outcome(self, rows: u64) -> Result<(), OutcomeError> {
        match self {
            Self::None => Ok(()),
            Self::RowCount(expected) if rows < expected => {
                Err(OutcomeError::StaleState { expected, actual: rows })
            }
            Self::RowCount(expected) if rows > expected => {
                Err(OutcomeError::TooManyRows { expected, actual: rows })
            }
            Self::RowCount(_) => Ok(()),
        }
    }
}

/// Prepares a statement through [`Connection::prepare_statement`].
pub fn standard_preparer(
    connection: &mut dyn Connection,
    sql: &str,
) -> Result<Box<dyn PreparedStatement>, JdbcError> {
    connection.prepare_statement(sql)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MutationExecutor;

impl MutationExecutor {
    /// Prepares the statement with `preparer`, binds every parameter in
    /// order, executes it and hands the affected row count to `checker`.
    ///
    /// Driver errors propagate as-is; nothing is retried.
    pub fn execute<P, C>(
        &self,
        mutation: &JdbcMutation,
        connection: &mut dyn Connection,
        preparer: P,
        checker: C,
    ) -> Result<u64, Error>
    where
        P: FnOnce(&mut dyn Connection, &str) -> Result<Box<dyn PreparedStatement>, JdbcError>,
        C: FnOnce(u64) -> Result<(), Error>,
    {
        tracing::debug!(sql = mutation.sql(), table = mutation.affected_table(), "executing mutation");
        let mut statement = preparer(connection, mutation.sql())?;
        for (i, binding) in mutation.bindings().iter().enumerate() {
            binding.ty.binder().bind(statement.as_mut(), i + 1, &binding.value)?;
        }
        let rows = statement.execute_update()?;
        checker(rows)?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jdbc::recording::RecordingConnection;
    use crate::types::{DomainType, SqlTypeCode};

    fn mutation() -> JdbcMutation {
        JdbcMutation::new(
            "update person set name=? where id=?",
            vec![
                JdbcParameterBinding {
                    value: Value::text("Ann"),
                    ty: SqlExpressableType::new(DomainType::String, SqlTypeCode::Varchar),
                },
                JdbcParameterBinding {
                    value: Value::Long(1),
                    ty: SqlExpressableType::new(DomainType::Long, SqlTypeCode::BigInt),
                },
            ],
            "person",
        )
    }

    #[test]
    fn test_expectation_outcomes() {
        let e = Expectation::RowCount(1);
        assert!(e.verify_outcome(1).is_ok());
        assert!(matches!(e.verify_outcome(0), Err(OutcomeError::StaleState { .. })));
        assert!(matches!(e.verify_outcome(2), Err(OutcomeError::TooManyRows { .. })));
        assert!(Expectation::None.verify_outcome(7).is_ok());
    }

    #[test]
    fn test_executor_binds_in_order_and_checks() {
        let mut conn = RecordingConnection::new();
        let mut seen = None;
        let rows = MutationExecutor
            .execute(&mutation(), &mut conn, standard_preparer, |rows| {
                seen = Some(rows);
                Ok(())
            })
            .unwrap();
        assert_eq!(rows, 1);
        assert_eq!(seen, Some(1));
        let recorded = conn.statements();
        assert_eq!(recorded[0].values(), vec![Value::text("Ann"), Value::Long(1)]);
    }

    #[test]
    fn test_checker_error_propagates() {
        let mut conn = RecordingConnection::new();
        conn.push_row_count(0);
        let result = MutationExecutor.execute(&mutation(), &mut conn, standard_preparer, |rows| {
            Expectation::RowCount(1)
                .verify_outcome(rows)
                .map_err(|e| Error::modeling(e.to_string()))
        });
        assert!(result.is_err());
    }
}
