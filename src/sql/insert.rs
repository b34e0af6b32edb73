//! INSERT statement builders.

use super::Dialect;
use super::params::ParameterMarkerStyle;
use super::push_comment;
use super::select::Select;
use crate::error::{Error, Result};
use indexmap::IndexMap;

/// `insert into T (c1, c2) values (?, expr)`.
///
/// Column order is insertion order. Value expressions other than `?` are
/// rendered verbatim (identity keywords, generated-column expressions).
#[derive(Debug, Clone)]
pub struct Insert {
    dialect: Dialect,
    markers: ParameterMarkerStyle,
    table_name: String,
    comment: Option<String>,
    columns: IndexMap<String, String>,
}

impl Insert {
    pub fn new(dialect: Dialect, table_name: impl Into<String>) -> Self {
        Self {
            dialect,
            markers: ParameterMarkerStyle::default(),
            table_name: table_name.into(),
            comment: None,
            columns: IndexMap::new(),
        }
    }

    pub fn set_parameter_markers(&mut self, markers: ParameterMarkerStyle) -> &mut Self {
        self.markers = markers;
        self
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) -> &mut Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Bound column (`?`).
    pub fn add_column(&mut self, column: impl Into<String>) -> &mut Self {
        self.add_column_expression(column, "?")
    }

    pub fn add_columns(&mut self, columns: &[String]) -> &mut Self {
        for column in columns {
            self.add_column(column.clone());
        }
        self
    }

    /// Adds the columns whose `insertable` flag is set.
    pub fn add_insertable_columns(&mut self, columns: &[String], insertable: &[bool]) -> &mut Self {
        for (column, _) in columns.iter().zip(insertable).filter(|(_, i)| **i) {
            self.add_column(column.clone());
        }
        self
    }

    /// Column whose value is computed on execution by `expression`.
    pub fn add_column_expression(
        &mut self,
        column: impl Into<String>,
        expression: impl Into<String>,
    ) -> &mut Self {
        self.columns.insert(column.into(), expression.into());
        self
    }

    /// Identity column: the dialect's identity keyword, or omitted when the
    /// dialect expects the column to be left out.
    pub fn add_identity_column(&mut self, column: impl Into<String>) -> &mut Self {
        if let Some(value) = self.dialect.identity_insert_string() {
            self.add_column_expression(column, value);
        }
        self
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn to_statement_string(&self) -> Result<String> {
        let mut buf = String::with_capacity(self.columns.len() * 15 + self.table_name.len() + 10);
        push_comment(&mut buf, self.comment.as_deref());
        buf.push_str("insert into ");
        buf.push_str(&self.table_name);

        if self.columns.is_empty() {
            let Some(no_columns) = self.dialect.no_columns_insert_string() else {
                return Err(Error::NoColumnsInsert {
                    table: self.table_name.clone(),
                    dialect: self.dialect.name().to_string(),
                });
            };
            buf.push(' ');
            buf.push_str(no_columns);
        } else {
            let names: Vec<&str> = self.columns.keys().map(String::as_str).collect();
            let values: Vec<&str> = self.columns.values().map(String::as_str).collect();
            buf.push_str(&format!(" ({}) values ({})", names.join(", "), values.join(", ")));
        }
        Ok(self.markers.apply(&buf))
    }
}

/// `insert into T (cols) select ...`
#[derive(Debug, Clone, Default)]
pub struct InsertSelect {
    table_name: Option<String>,
    comment: Option<String>,
    columns: Vec<String>,
    select: Option<Select>,
}

impl InsertSelect {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_table_name(&mut self, table: impl Into<String>) -> &mut Self {
        self.table_name = Some(table.into());
        self
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) -> &mut Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn add_column(&mut self, column: impl Into<String>) -> &mut Self {
        self.columns.push(column.into());
        self
    }

    pub fn add_columns(&mut self, columns: &[String]) -> &mut Self {
        self.columns.extend(columns.iter().cloned());
        self
    }

    pub fn set_select(&mut self, select: Select) -> &mut Self {
        self.select = Some(select);
        self
    }

    pub fn to_statement_string(&self) -> Result<String> {
        let table = self
            .table_name
            .as_deref()
            .ok_or_else(|| Error::modeling("no table name defined for insert-select"))?;
        let select = self
            .select
            .as_ref()
            .ok_or_else(|| Error::modeling("no select defined for insert-select"))?;

        let mut buf = String::with_capacity(self.columns.len() * 15 + table.len() + 10);
        push_comment(&mut buf, self.comment.as_deref());
        buf.push_str("insert into ");
        buf.push_str(table);
        if !self.columns.is_empty() {
            buf.push_str(&format!(" ({})", self.columns.join(", ")));
        }
        buf.push(' ');
        buf.push_str(&select.to_statement_string());
        Ok(buf)
    }
}
