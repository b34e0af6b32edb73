//! Value binders and extractors: the JDBC-facing end of every column.

use super::{DomainType, SqlTypeCode, Value};
use crate::jdbc::{CallableStatement, JdbcError, PreparedStatement, ResultSet};

/// Binds domain values as statement parameters.
///
/// Implementors provide the type-specific `do_bind*`; null handling and
/// trace logging live in the provided `bind*` methods.
pub trait ValueBinder {
    fn sql_type(&self) -> SqlTypeCode;

    fn do_bind(
        &self,
        st: &mut dyn PreparedStatement,
        index: usize,
        value: &Value,
    ) -> Result<(), JdbcError>;

    fn do_bind_named(
        &self,
        st: &mut dyn CallableStatement,
        name: &str,
        value: &Value,
    ) -> Result<(), JdbcError>;

    fn bind(
        &self,
        st: &mut dyn PreparedStatement,
        index: usize,
        value: &Value,
    ) -> Result<(), JdbcError> {
        if value.is_null() {
            if tracing::enabled!(tracing::Level::TRACE) {
                tracing::trace!(
                    index,
                    sql_type = self.sql_type().name(),
                    "binding parameter as [{}] - [null]",
                    self.sql_type()
                );
            }
            return st.set_null(index, self.sql_type());
        }
        if tracing::enabled!(tracing::Level::TRACE) {
            tracing::trace!(
                index,
                "binding parameter as [{}] - [{}]",
                self.sql_type(),
                value.loggable()
            );
        }
        self.do_bind(st, index, value)
    }

    fn bind_named(
        &self,
        st: &mut dyn CallableStatement,
        name: &str,
        value: &Value,
    ) -> Result<(), JdbcError> {
        if value.is_null() {
            tracing::trace!(name, "binding parameter as [{}] - [null]", self.sql_type());
            return st.set_null_named(name, self.sql_type());
        }
        if tracing::enabled!(tracing::Level::TRACE) {
            tracing::trace!(
                name,
                "binding parameter as [{}] - [{}]",
                self.sql_type(),
                value.loggable()
            );
        }
        self.do_bind_named(st, name, value)
    }
}

/// Reads column values back out of results.
///
/// The provided `extract*` methods consult `was_null` after every read and
/// never trust a non-null return value on its own.
pub trait ValueExtractor {
    fn sql_type(&self) -> SqlTypeCode;

    fn do_extract(&self, rs: &mut dyn ResultSet, index: usize) -> Result<Value, JdbcError>;

    fn do_extract_by_label(&self, rs: &mut dyn ResultSet, label: &str) -> Result<Value, JdbcError>;

    fn do_extract_callable(
        &self,
        cs: &mut dyn CallableStatement,
        index: usize,
    ) -> Result<Value, JdbcError>;

    fn do_extract_callable_named(
        &self,
        cs: &mut dyn CallableStatement,
        name: &str,
    ) -> Result<Value, JdbcError>;

    fn extract(&self, rs: &mut dyn ResultSet, index: usize) -> Result<Value, JdbcError> {
        let value = self.do_extract(rs, index)?;
        let value = null_checked(value, rs.was_null()?);
        trace_extracted(&index.to_string(), self.sql_type(), &value);
        Ok(value)
    }

    fn extract_by_label(&self, rs: &mut dyn ResultSet, label: &str) -> Result<Value, JdbcError> {
        let value = self.do_extract_by_label(rs, label)?;
        let value = null_checked(value, rs.was_null()?);
        trace_extracted(label, self.sql_type(), &value);
        Ok(value)
    }

    fn extract_callable(
        &self,
        cs: &mut dyn CallableStatement,
        index: usize,
    ) -> Result<Value, JdbcError> {
        let value = self.do_extract_callable(cs, index)?;
        let value = null_checked(value, cs.was_null()?);
        trace_extracted(&index.to_string(), self.sql_type(), &value);
        Ok(value)
    }

    fn extract_callable_named(
        &self,
        cs: &mut dyn CallableStatement,
        name: &str,
    ) -> Result<Value, JdbcError> {
        let value = self.do_extract_callable_named(cs, name)?;
        let value = null_checked(value, cs.was_null()?);
        trace_extracted(name, self.sql_type(), &value);
        Ok(value)
    }
}

fn null_checked(value: Value, was_null: bool) -> Value {
    if was_null || value.is_null() {
        Value::Null
    } else {
        value
    }
}

fn trace_extracted(position: &str, sql_type: SqlTypeCode, value: &Value) {
    if tracing::enabled!(tracing::Level::TRACE) {
        tracing::trace!(
            position,
            "extracted value ([{}] : [{}]) - [{}]",
            position,
            sql_type,
            value.loggable()
        );
    }
}

/// A column's bridge between a domain type and a SQL type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SqlExpressableType {
    domain: DomainType,
    sql_type: SqlTypeCode,
}

impl SqlExpressableType {
    pub fn new(domain: DomainType, sql_type: SqlTypeCode) -> Self {
        Self { domain, sql_type }
    }

    /// Uses the domain type's default SQL type, falling back to `OTHER`.
    pub fn of(domain: DomainType) -> Self {
        let sql_type = domain.default_sql_type().unwrap_or(SqlTypeCode::Other);
        Self { domain, sql_type }
    }

    pub fn domain_type(&self) -> &DomainType {
        &self.domain
    }

    pub fn sql_type(&self) -> SqlTypeCode {
        self.sql_type
    }

    pub fn binder(&self) -> BasicBinder<'_> {
        BasicBinder { ty: self }
    }

    pub fn extractor(&self) -> BasicBinder<'_> {
        BasicBinder { ty: self }
    }

    /// Converts a domain value into what the driver receives.
    pub fn to_jdbc(&self, value: &Value) -> Result<Value, JdbcError> {
        let sql = self.sql_type;
        let converted = match value {
            Value::Boolean(b) if sql.is_integral() => Value::Integer(i32::from(*b)),
            Value::Boolean(b) if sql == SqlTypeCode::Char => {
                Value::Text(if *b { "Y" } else { "N" }.to_string())
            }
            Value::Integer(v) if sql == SqlTypeCode::BigInt => Value::Long(i64::from(*v)),
            Value::Long(v) if matches!(sql, SqlTypeCode::Integer | SqlTypeCode::SmallInt) => {
                Value::Integer(i32::try_from(*v).map_err(|_| self.conversion_error(value))?)
            }
            Value::Embeddable(_) | Value::Composite(_) | Value::EntityRef(_) | Value::Unfetched => {
                return Err(self.conversion_error(value));
            }
            other => other.clone(),
        };
        Ok(converted)
    }

    /// Converts a driver value back into the domain representation.
    pub fn from_jdbc(&self, value: Value) -> Value {
        match (&self.domain, value) {
            (DomainType::Boolean, Value::Integer(v)) => Value::Boolean(v != 0),
            (DomainType::Boolean, Value::Long(v)) => Value::Boolean(v != 0),
            (DomainType::Boolean, Value::Text(s)) => {
                Value::Boolean(matches!(s.as_str(), "Y" | "y" | "T" | "t" | "1" | "true"))
            }
            (DomainType::Long, Value::Integer(v)) => Value::Long(i64::from(v)),
            (DomainType::Integer, Value::Long(v)) => {
                i32::try_from(v).map_or(Value::Long(v), Value::Integer)
            }
            (_, other) => other,
        }
    }

    fn conversion_error(&self, value: &Value) -> JdbcError {
        JdbcError::Conversion {
            value: value.loggable(),
            sql_type: self.sql_type.name(),
        }
    }
}

/// Standard binder/extractor pair for basic values.
#[derive(Debug, Clone, Copy)]
pub struct BasicBinder<'a> {
    ty: &'a SqlExpressableType,
}

impl ValueBinder for BasicBinder<'_> {
    fn sql_type(&self) -> SqlTypeCode {
        self.ty.sql_type
    }

    fn do_bind(
        &self,
        st: &mut dyn PreparedStatement,
        index: usize,
        value: &Value,
    ) -> Result<(), JdbcError> {
        let jdbc = self.ty.to_jdbc(value)?;
        st.set_value(index, &jdbc, self.ty.sql_type)
    }

    fn do_bind_named(
        &self,
        st: &mut dyn CallableStatement,
        name: &str,
        value: &Value,
    ) -> Result<(), JdbcError> {
        let jdbc = self.ty.to_jdbc(value)?;
        st.set_value_named(name, &jdbc, self.ty.sql_type)
    }
}

impl ValueExtractor for BasicBinder<'_> {
    fn sql_type(&self) -> SqlTypeCode {
        self.ty.sql_type
    }

    fn do_extract(&self, rs: &mut dyn ResultSet, index: usize) -> Result<Value, JdbcError> {
        Ok(self.ty.from_jdbc(rs.get_value(index, self.ty.sql_type)?))
    }

    fn do_extract_by_label(&self, rs: &mut dyn ResultSet, label: &str) -> Result<Value, JdbcError> {
        Ok(self.ty.from_jdbc(rs.get_value_by_label(label, self.ty.sql_type)?))
    }

    fn do_extract_callable(
        &self,
        cs: &mut dyn CallableStatement,
        index: usize,
    ) -> Result<Value, JdbcError> {
        Ok(self.ty.from_jdbc(cs.get_value(index, self.ty.sql_type)?))
    }

    fn do_extract_callable_named(
        &self,
        cs: &mut dyn CallableStatement,
        name: &str,
    ) -> Result<Value, JdbcError> {
        Ok(self.ty.from_jdbc(cs.get_value_named(name, self.ty.sql_type)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jdbc::recording::{RecordedBinding, RecordingConnection};
    use crate::jdbc::Connection;

    fn long_type() -> SqlExpressableType {
        SqlExpressableType::new(DomainType::Long, SqlTypeCode::BigInt)
    }

    #[test]
    fn test_bind_null_uses_sql_type() {
        let mut conn = RecordingConnection::new();
        let mut st = conn.prepare_statement("update t set x=?").unwrap();
        let ty = long_type();
        ty.binder().bind(st.as_mut(), 1, &Value::Null).unwrap();
        st.execute_update().unwrap();

        let recorded = conn.statements();
        assert_eq!(
            recorded[0].bindings,
            vec![RecordedBinding {
                index: 1,
                value: Value::Null,
                sql_type: SqlTypeCode::BigInt,
            }]
        );
    }

    #[test]
    fn test_boolean_binds_as_integer_on_numeric_column() {
        let ty = SqlExpressableType::new(DomainType::Boolean, SqlTypeCode::Integer);
        assert_eq!(ty.to_jdbc(&Value::Boolean(true)).unwrap(), Value::Integer(1));
        assert_eq!(ty.from_jdbc(Value::Integer(0)), Value::Boolean(false));
    }

    #[test]
    fn test_yes_no_boolean() {
        let ty = SqlExpressableType::new(DomainType::Boolean, SqlTypeCode::Char);
        assert_eq!(ty.to_jdbc(&Value::Boolean(false)).unwrap(), Value::text("N"));
        assert_eq!(ty.from_jdbc(Value::text("Y")), Value::Boolean(true));
    }

    #[test]
    fn test_composite_cannot_be_bound_directly() {
        let ty = long_type();
        let err = ty.to_jdbc(&Value::Composite(vec![])).unwrap_err();
        assert!(matches!(err, JdbcError::Conversion { .. }));
    }

    #[test]
    fn test_extract_consults_was_null() {
        let mut conn = RecordingConnection::new();
        conn.push_result(vec![vec![Value::Null, Value::Long(9)]]);
        let mut st = conn.prepare_statement("select a, b from t").unwrap();
        let mut rs = st.execute_query().unwrap();
        assert!(rs.next().unwrap());

        let ty = long_type();
        // the driver hands back 0 for a null BIGINT; was_null must win
        assert_eq!(ty.extractor().extract(rs.as_mut(), 1).unwrap(), Value::Null);
        assert_eq!(ty.extractor().extract(rs.as_mut(), 2).unwrap(), Value::Long(9));
    }
}
