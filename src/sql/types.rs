//! Declared column type names to JDBC type codes.

use super::Dialect;
use crate::types::SqlTypeCode;

/// Map a declared SQL type (e.g. `VARCHAR(255)`) to its JDBC type code.
pub fn map_type(sql_type: &str, dialect: Dialect) -> SqlTypeCode {
    let lower = sql_type.to_lowercase();
    let base = lower.split('(').next().unwrap_or(&lower).trim();

    match dialect {
        Dialect::PostgreSQL => map_postgres_type(base),
        Dialect::MySQL => map_mysql_type(base, &lower),
        Dialect::Oracle | Dialect::Oracle8i => map_oracle_type(base, &lower),
        _ => map_generic_type(base),
    }
}

fn map_postgres_type(base: &str) -> SqlTypeCode {
    match base {
        "int" | "int4" | "integer" | "serial" | "serial4" => SqlTypeCode::Integer,
        "bigint" | "int8" | "bigserial" | "serial8" => SqlTypeCode::BigInt,
        "smallint" | "int2" | "smallserial" | "serial2" => SqlTypeCode::SmallInt,

        "real" | "float4" => SqlTypeCode::Real,
        "double precision" | "float8" => SqlTypeCode::Double,

        "character varying" => SqlTypeCode::Varchar,
        "character" => SqlTypeCode::Char,

        "timestamptz" | "timestamp with time zone" | "timestamp without time zone" => {
            SqlTypeCode::Timestamp
        }
        "timetz" => SqlTypeCode::Time,
        "bool" => SqlTypeCode::Boolean,
        "bytea" => SqlTypeCode::VarBinary,
        "oid" => SqlTypeCode::Blob,

        _ => map_generic_type(base),
    }
}

fn map_mysql_type(base: &str, full: &str) -> SqlTypeCode {
    match base {
        "mediumint" => SqlTypeCode::Integer,
        "tinyint" => {
            // TINYINT(1) is the conventional boolean
            if full.contains("tinyint(1)") {
                SqlTypeCode::Bit
            } else {
                SqlTypeCode::TinyInt
            }
        }
        "datetime" => SqlTypeCode::Timestamp,
        "year" => SqlTypeCode::SmallInt,
        "longtext" | "mediumtext" | "tinytext" => SqlTypeCode::LongVarchar,
        "longblob" | "mediumblob" | "tinyblob" => SqlTypeCode::Blob,
        _ => map_generic_type(base),
    }
}

fn map_oracle_type(base: &str, full: &str) -> SqlTypeCode {
    match base {
        "number" => {
            // NUMBER(p) without scale is integral
            match full.split_once('(').map(|(_, args)| args.contains(',')) {
                Some(false) => SqlTypeCode::BigInt,
                _ => SqlTypeCode::Numeric,
            }
        }
        "varchar2" | "nvarchar2" => SqlTypeCode::Varchar,
        "nchar" => SqlTypeCode::Char,
        "raw" => SqlTypeCode::VarBinary,
        "long raw" => SqlTypeCode::Blob,
        "long" => SqlTypeCode::LongVarchar,
        "rowid" | "urowid" => SqlTypeCode::RowId,
        "date" => SqlTypeCode::Timestamp,
        _ => map_generic_type(base),
    }
}

fn map_generic_type(base: &str) -> SqlTypeCode {
    match base {
        "bit" => SqlTypeCode::Bit,
        "boolean" | "bool" => SqlTypeCode::Boolean,
        "tinyint" => SqlTypeCode::TinyInt,
        "smallint" => SqlTypeCode::SmallInt,
        "int" | "integer" => SqlTypeCode::Integer,
        "bigint" => SqlTypeCode::BigInt,
        "real" | "float" => SqlTypeCode::Real,
        "double" | "double precision" => SqlTypeCode::Double,
        "decimal" | "numeric" => SqlTypeCode::Numeric,
        "char" | "character" => SqlTypeCode::Char,
        "varchar" | "character varying" | "nvarchar" => SqlTypeCode::Varchar,
        "text" | "long varchar" => SqlTypeCode::LongVarchar,
        "date" => SqlTypeCode::Date,
        "time" => SqlTypeCode::Time,
        "timestamp" | "datetime" => SqlTypeCode::Timestamp,
        "binary" => SqlTypeCode::Binary,
        "varbinary" => SqlTypeCode::VarBinary,
        "blob" => SqlTypeCode::Blob,
        "clob" | "nclob" => SqlTypeCode::Clob,
        _ => SqlTypeCode::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postgres_types() {
        assert_eq!(map_type("SERIAL", Dialect::PostgreSQL), SqlTypeCode::Integer);
        assert_eq!(map_type("VARCHAR(255)", Dialect::PostgreSQL), SqlTypeCode::Varchar);
        assert_eq!(map_type("TIMESTAMPTZ", Dialect::PostgreSQL), SqlTypeCode::Timestamp);
        assert_eq!(map_type("JSONB", Dialect::PostgreSQL), SqlTypeCode::Other);
    }

    #[test]
    fn test_mysql_types() {
        assert_eq!(map_type("INT", Dialect::MySQL), SqlTypeCode::Integer);
        assert_eq!(map_type("TINYINT(1)", Dialect::MySQL), SqlTypeCode::Bit);
        assert_eq!(map_type("TINYINT(4)", Dialect::MySQL), SqlTypeCode::TinyInt);
        assert_eq!(map_type("DATETIME", Dialect::MySQL), SqlTypeCode::Timestamp);
    }

    #[test]
    fn test_oracle_number() {
        assert_eq!(map_type("NUMBER(19)", Dialect::Oracle), SqlTypeCode::BigInt);
        assert_eq!(map_type("NUMBER(10,2)", Dialect::Oracle), SqlTypeCode::Numeric);
        assert_eq!(map_type("VARCHAR2(30)", Dialect::Oracle8i), SqlTypeCode::Varchar);
    }
}
