//! A driver that records statements instead of talking to a database.
//!
//! Executed updates report queued row counts (default `1`) and queries
//! replay queued rows. Useful as a dry-run executor and in tests.

use super::{CallableStatement, Connection, JdbcError, PreparedStatement, ResultSet};
use crate::types::{SqlTypeCode, Value};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Update,
    Query,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedBinding {
    pub index: usize,
    pub value: Value,
    pub sql_type: SqlTypeCode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedStatement {
    pub sql: String,
    pub kind: StatementKind,
    pub bindings: Vec<RecordedBinding>,
    pub named_bindings: Vec<(String, Value)>,
}

impl RecordedStatement {
    pub fn values(&self) -> Vec<Value> {
        self.bindings.iter().map(|b| b.value.clone()).collect()
    }
}

#[derive(Debug, Default)]
struct State {
    statements: Vec<RecordedStatement>,
    row_counts: VecDeque<u64>,
    results: VecDeque<Vec<Vec<Value>>>,
    labels: VecDeque<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingConnection {
    state: Arc<Mutex<State>>,
}

impl RecordingConnection {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        lock_state(&self.state)
    }

    /// Row count reported by the next executed update.
    pub fn push_row_count(&self, rows: u64) {
        self.lock().row_counts.push_back(rows);
    }

    /// Rows returned by the next executed query.
    pub fn push_result(&self, rows: Vec<Vec<Value>>) {
        let mut state = self.lock();
        state.results.push_back(rows);
        state.labels.push_back(Vec::new());
    }

    pub fn push_labelled_result(&self, labels: Vec<String>, rows: Vec<Vec<Value>>) {
        let mut state = self.lock();
        state.results.push_back(rows);
        state.labels.push_back(labels);
    }

    pub fn statements(&self) -> Vec<RecordedStatement> {
        self.lock().statements.clone()
    }

    pub fn sql(&self) -> Vec<String> {
        self.lock().statements.iter().map(|s| s.sql.clone()).collect()
    }

    pub fn clear(&self) {
        self.lock().statements.clear();
    }
}

fn lock_state(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Connection for RecordingConnection {
    fn prepare_statement(&mut self, sql: &str) -> Result<Box<dyn PreparedStatement>, JdbcError> {
        Ok(Box::new(RecordingStatement::new(sql, Arc::clone(&self.state))))
    }

    fn prepare_call(&mut self, sql: &str) -> Result<Box<dyn CallableStatement>, JdbcError> {
        Ok(Box::new(RecordingStatement::new(sql, Arc::clone(&self.state))))
    }
}

struct RecordingStatement {
    sql: String,
    bindings: BTreeMap<usize, (Value, SqlTypeCode)>,
    named: Vec<(String, Value)>,
    last_null: bool,
    state: Arc<Mutex<State>>,
}

impl RecordingStatement {
    fn new(sql: &str, state: Arc<Mutex<State>>) -> Self {
        Self {
            sql: sql.to_string(),
            bindings: BTreeMap::new(),
            named: Vec::new(),
            last_null: false,
            state,
        }
    }

    fn record(&self, kind: StatementKind) {
        let statement = RecordedStatement {
            sql: self.sql.clone(),
            kind,
            bindings: self
                .bindings
                .iter()
                .map(|(index, (value, sql_type))| RecordedBinding {
                    index: *index,
                    value: value.clone(),
                    sql_type: *sql_type,
                })
                .collect(),
            named_bindings: self.named.clone(),
        };
        lock_state(&self.state).statements.push(statement);
    }
}

impl PreparedStatement for RecordingStatement {
    fn set_null(&mut self, index: usize, sql_type: SqlTypeCode) -> Result<(), JdbcError> {
        if index == 0 {
            return Err(JdbcError::ColumnIndex(index));
        }
        self.bindings.insert(index, (Value::Null, sql_type));
        Ok(())
    }

    fn set_value(
        &mut self,
        index: usize,
        value: &Value,
        sql_type: SqlTypeCode,
    ) -> Result<(), JdbcError> {
        if index == 0 {
            return Err(JdbcError::ColumnIndex(index));
        }
        self.bindings.insert(index, (value.clone(), sql_type));
        Ok(())
    }

    fn execute_update(&mut self) -> Result<u64, JdbcError> {
        self.record(StatementKind::Update);
        Ok(lock_state(&self.state).row_counts.pop_front().unwrap_or(1))
    }

    fn execute_query(&mut self) -> Result<Box<dyn ResultSet>, JdbcError> {
        self.record(StatementKind::Query);
        let mut state = lock_state(&self.state);
        let rows = state.results.pop_front().unwrap_or_default();
        let labels = state.labels.pop_front().unwrap_or_default();
        Ok(Box::new(RecordingResultSet {
            rows: rows.into(),
            labels,
            current: None,
            last_null: false,
        }))
    }
}

impl CallableStatement for RecordingStatement {
    fn set_null_named(&mut self, name: &str, _sql_type: SqlTypeCode) -> Result<(), JdbcError> {
        self.named.push((name.to_string(), Value::Null));
        Ok(())
    }

    fn set_value_named(
        &mut self,
        name: &str,
        value: &Value,
        _sql_type: SqlTypeCode,
    ) -> Result<(), JdbcError> {
        self.named.push((name.to_string(), value.clone()));
        Ok(())
    }

    // INOUT parameters echo whatever was bound.
    fn get_value(&mut self, index: usize, sql_type: SqlTypeCode) -> Result<Value, JdbcError> {
        let value = self
            .bindings
            .get(&index)
            .map(|(v, _)| v.clone())
            .ok_or(JdbcError::ColumnIndex(index))?;
        self.last_null = value.is_null();
        Ok(driver_value(value, sql_type))
    }

    fn get_value_named(&mut self, name: &str, sql_type: SqlTypeCode) -> Result<Value, JdbcError> {
        let value = self
            .named
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| JdbcError::ColumnLabel(name.to_string()))?;
        self.last_null = value.is_null();
        Ok(driver_value(value, sql_type))
    }

    fn was_null(&self) -> Result<bool, JdbcError> {
        Ok(self.last_null)
    }
}

struct RecordingResultSet {
    rows: VecDeque<Vec<Value>>,
    labels: Vec<String>,
    current: Option<Vec<Value>>,
    last_null: bool,
}

impl RecordingResultSet {
    fn column(&mut self, index: usize, sql_type: SqlTypeCode) -> Result<Value, JdbcError> {
        let row = self.current.as_ref().ok_or(JdbcError::NoCurrentRow)?;
        let value = index
            .checked_sub(1)
            .and_then(|i| row.get(i))
            .cloned()
            .ok_or(JdbcError::ColumnIndex(index))?;
        self.last_null = value.is_null();
        Ok(driver_value(value, sql_type))
    }
}

impl ResultSet for RecordingResultSet {
    fn next(&mut self) -> Result<bool, JdbcError> {
        self.current = self.rows.pop_front();
        Ok(self.current.is_some())
    }

    fn get_value(&mut self, index: usize, sql_type: SqlTypeCode) -> Result<Value, JdbcError> {
        self.column(index, sql_type)
    }

    fn get_value_by_label(
        &mut self,
        label: &str,
        sql_type: SqlTypeCode,
    ) -> Result<Value, JdbcError> {
        let position = self
            .labels
            .iter()
            .position(|l| l.eq_ignore_ascii_case(label))
            .ok_or_else(|| JdbcError::ColumnLabel(label.to_string()))?;
        self.column(position + 1, sql_type)
    }

    fn was_null(&self) -> Result<bool, JdbcError> {
        Ok(self.last_null)
    }
}

/// Mimics JDBC getters, which hand back a primitive default for SQL NULL.
fn driver_value(value: Value, sql_type: SqlTypeCode) -> Value {
    if !value.is_null() {
        return value;
    }
    match sql_type {
        SqlTypeCode::BigInt => Value::Long(0),
        t if t.is_integral() => Value::Integer(0),
        SqlTypeCode::Real | SqlTypeCode::Double => Value::Double(0.0),
        SqlTypeCode::Boolean => Value::Boolean(false),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_update_with_bindings() {
        let mut conn = RecordingConnection::new();
        conn.push_row_count(0);
        let mut st = conn.prepare_statement("delete from t where id=?").unwrap();
        st.set_value(1, &Value::Long(5), SqlTypeCode::BigInt).unwrap();
        assert_eq!(st.execute_update().unwrap(), 0);
        // default once the queue is drained
        assert_eq!(st.execute_update().unwrap(), 1);

        let statements = conn.statements();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].values(), vec![Value::Long(5)]);
        assert_eq!(statements[0].kind, StatementKind::Update);
    }

    #[test]
    fn test_result_set_null_placeholder() {
        let mut conn = RecordingConnection::new();
        conn.push_result(vec![vec![Value::Null]]);
        let mut st = conn.prepare_statement("select x from t").unwrap();
        let mut rs = st.execute_query().unwrap();
        assert!(rs.next().unwrap());
        assert_eq!(rs.get_value(1, SqlTypeCode::Integer).unwrap(), Value::Integer(0));
        assert!(rs.was_null().unwrap());
        assert!(!rs.next().unwrap());
    }

    #[test]
    fn test_labelled_lookup() {
        let mut conn = RecordingConnection::new();
        conn.push_labelled_result(
            vec!["ID".to_string(), "NAME".to_string()],
            vec![vec![Value::Long(1), Value::text("a")]],
        );
        let mut st = conn.prepare_statement("select id, name from t").unwrap();
        let mut rs = st.execute_query().unwrap();
        rs.next().unwrap();
        assert_eq!(
            rs.get_value_by_label("name", SqlTypeCode::Varchar).unwrap(),
            Value::text("a")
        );
        assert!(matches!(
            rs.get_value_by_label("missing", SqlTypeCode::Varchar),
            Err(JdbcError::ColumnLabel(_))
        ));
    }

    #[test]
    fn test_zero_index_rejected() {
        let mut conn = RecordingConnection::new();
        let mut st = conn.prepare_statement("select 1").unwrap();
        assert_eq!(
            st.set_null(0, SqlTypeCode::Integer),
            Err(JdbcError::ColumnIndex(0))
        );
    }
}
