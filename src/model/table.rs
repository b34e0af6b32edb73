//! Physical tables, columns and the foreign keys between them.

use crate::error::{Error, Result};
use crate::jdbc::ResultCheckStyle;
use crate::types::SqlExpressableType;

/// Column name used for database-assigned row identifiers.
pub const ROW_ID_COLUMN: &str = "ROW_ID";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Column {
    pub table: String,
    pub name: String,
    pub expressable: SqlExpressableType,
    pub nullable: bool,
    /// SQL expression for derived (computed) columns.
    pub formula: Option<String>,
}

impl Column {
    pub fn new(table: impl Into<String>, name: impl Into<String>, expressable: SqlExpressableType) -> Self {
        Self {
            table: table.into(),
            name: name.into(),
            expressable,
            nullable: true,
            formula: None,
        }
    }

    /// A column computed by `expression` rather than stored.
    pub fn derived(
        table: impl Into<String>,
        expression: impl Into<String>,
        expressable: SqlExpressableType,
    ) -> Self {
        let expression = expression.into();
        Self {
            table: table.into(),
            name: expression.clone(),
            expressable,
            nullable: true,
            formula: Some(expression),
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn is_derived(&self) -> bool {
        self.formula.is_some()
    }

    /// The same column bound to another table.
    pub fn rebind(&self, table: &str) -> Self {
        Self {
            table: table.to_string(),
            ..self.clone()
        }
    }

    pub fn belongs_to(&self, table: &str) -> bool {
        self.table == table
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub referring: Column,
    pub target: Column,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub referring_table: String,
    pub target_table: String,
    pub mappings: Vec<ColumnMapping>,
}

impl ForeignKey {
    /// Pairs `referring[i]` with `target[i]`; both sides need the same arity.
    pub fn new(referring: &[Column], target: &[Column]) -> Result<Self> {
        if referring.len() != target.len() || referring.is_empty() {
            return Err(Error::modeling(format!(
                "foreign key column count mismatch: {} referring vs {} target",
                referring.len(),
                target.len()
            )));
        }
        Ok(Self {
            referring_table: referring[0].table.clone(),
            target_table: target[0].table.clone(),
            mappings: referring
                .iter()
                .zip(target)
                .map(|(r, t)| ColumnMapping {
                    referring: r.clone(),
                    target: t.clone(),
                })
                .collect(),
        })
    }

    pub fn find_referring_column(&self, target: &Column) -> Option<&Column> {
        self.mappings
            .iter()
            .find(|m| m.target.name == target.name)
            .map(|m| &m.referring)
    }

    pub fn referring_columns(&self) -> Vec<&Column> {
        self.mappings.iter().map(|m| &m.referring).collect()
    }

    pub fn target_columns(&self) -> Vec<&Column> {
        self.mappings.iter().map(|m| &m.target).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// Root table, or the concrete table of a union subclass.
    Primary,
    /// Table holding the state a joined subclass adds.
    JoinedSubclass,
    /// Secondary table keyed by the entity identifier.
    Secondary { optional: bool, inverse: bool },
}

/// One table backing an entity, with the columns that key it to the
/// identifier (in identifier column order).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityTable {
    pub name: String,
    pub kind: TableKind,
    pub key_columns: Vec<Column>,
    pub row_id: Option<String>,
    pub insert_check: ResultCheckStyle,
    pub update_check: ResultCheckStyle,
    pub delete_check: ResultCheckStyle,
}

impl EntityTable {
    pub fn new(name: impl Into<String>, kind: TableKind, key_columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            kind,
            key_columns,
            row_id: None,
            insert_check: ResultCheckStyle::Count,
            update_check: ResultCheckStyle::Count,
            delete_check: ResultCheckStyle::Count,
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(self.kind, TableKind::Secondary { optional: true, .. })
    }

    pub fn is_inverse(&self) -> bool {
        matches!(self.kind, TableKind::Secondary { inverse: true, .. })
    }

    pub fn is_secondary(&self) -> bool {
        matches!(self.kind, TableKind::Secondary { .. })
    }

    pub fn key_column_names(&self) -> Vec<String> {
        self.key_columns.iter().map(|c| c.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DomainType, SqlTypeCode};

    fn long_column(table: &str, name: &str) -> Column {
        Column::new(table, name, SqlExpressableType::new(DomainType::Long, SqlTypeCode::BigInt))
    }

    #[test]
    fn test_foreign_key_finds_referring_column() {
        let fk = ForeignKey::new(
            &[long_column("person_detail", "person_id")],
            &[long_column("person", "id")],
        )
        .unwrap();
        assert_eq!(fk.referring_table, "person_detail");
        assert_eq!(
            fk.find_referring_column(&long_column("person", "id")).map(|c| c.name.as_str()),
            Some("person_id")
        );
        assert!(fk.find_referring_column(&long_column("person", "other")).is_none());
    }

    #[test]
    fn test_foreign_key_arity_mismatch() {
        let err = ForeignKey::new(&[long_column("a", "x")], &[]).unwrap_err();
        assert!(matches!(err, Error::Modeling(_)));
    }

    #[test]
    fn test_derived_column() {
        let ty = SqlExpressableType::new(DomainType::Long, SqlTypeCode::RowId);
        let column = Column::derived("person", ROW_ID_COLUMN, ty);
        assert!(column.is_derived());
        assert_eq!(column.rebind("employee").table, "employee");
    }
}
