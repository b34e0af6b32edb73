//! Minimal JDBC-shaped driver abstraction.
//!
//! Positions are 1-based, as in JDBC. Getters may return a placeholder for
//! SQL NULL (e.g. `0` for a numeric column); callers must consult
//! [`ResultSet::was_null`].

mod mutation;
pub mod recording;

pub use mutation::{
    Expectation, JdbcMutation, JdbcParameterBinding, MutationExecutor, OutcomeError,
    ResultCheckStyle, standard_preparer,
};

use crate::types::{SqlTypeCode, Value};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum JdbcError {
    #[error("SQL error [{state}]: {message}")]
    Sql { state: String, message: String },
    #[error("Column index {0} out of range")]
    ColumnIndex(usize),
    #[error("No column labelled {0}")]
    ColumnLabel(String),
    #[error("Cannot convert [{value}] to {sql_type}")]
    Conversion { value: String, sql_type: &'static str },
    #[error("Result set has no current row")]
    NoCurrentRow,
    #[error("Statement is closed")]
    Closed,
}

pub trait PreparedStatement {
    fn set_null(&mut self, index: usize, sql_type: SqlTypeCode) -> Result<(), JdbcError>;

    fn set_value(
        &mut self,
        index: usize,
        value: &Value,
        sql_type: SqlTypeCode,
    ) -> Result<(), JdbcError>;

    fn execute_update(&mut self) -> Result<u64, JdbcError>;

    fn execute_query(&mut self) -> Result<Box<dyn ResultSet>, JdbcError>;
}

pub trait CallableStatement: PreparedStatement {
    fn set_null_named(&mut self, name: &str, sql_type: SqlTypeCode) -> Result<(), JdbcError>;

    fn set_value_named(
        &mut self,
        name: &str,
        value: &Value,
        sql_type: SqlTypeCode,
    ) -> Result<(), JdbcError>;

    fn get_value(&mut self, index: usize, sql_type: SqlTypeCode) -> Result<Value, JdbcError>;

    fn get_value_named(&mut self, name: &str, sql_type: SqlTypeCode) -> Result<Value, JdbcError>;

    fn was_null(&self) -> Result<bool, JdbcError>;
}

pub trait ResultSet {
    fn next(&mut self) -> Result<bool, JdbcError>;

    fn get_value(&mut self, index: usize, sql_type: SqlTypeCode) -> Result<Value, JdbcError>;

    fn get_value_by_label(&mut self, label: &str, sql_type: SqlTypeCode)
    -> Result<Value, JdbcError>;

    fn was_null(&self) -> Result<bool, JdbcError>;
}

pub trait Connection {
    fn prepare_statement(&mut self, sql: &str) -> Result<Box<dyn PreparedStatement>, JdbcError>;

    fn prepare_call(&mut self, sql: &str) -> Result<Box<dyn CallableStatement>, JdbcError>;
}
