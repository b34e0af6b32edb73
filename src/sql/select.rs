//! SELECT statement builders.
//!
//! Builders accumulate clause text and render it once; clauses that were
//! never set are omitted entirely.

use super::lock::LockOptions;
use super::params::ParameterMarkerStyle;
use super::push_comment;
use super::Dialect;
use std::collections::HashSet;

/// Full SELECT: `/* comment */ select .. from .. <joins> where .. group by
/// .. having .. order by .. <lock>`.
#[derive(Debug, Clone)]
pub struct Select {
    dialect: Dialect,
    markers: ParameterMarkerStyle,
    comment: Option<String>,
    select_clause: String,
    from_clause: String,
    outer_joins_after_from: String,
    outer_joins_after_where: String,
    where_clause: String,
    group_by_clause: String,
    having_clause: String,
    order_by_clause: String,
    lock: LockOptions,
}

impl Select {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            markers: ParameterMarkerStyle::default(),
            comment: None,
            select_clause: String::new(),
            from_clause: String::new(),
            outer_joins_after_from: String::new(),
            outer_joins_after_where: String::new(),
            where_clause: String::new(),
            group_by_clause: String::new(),
            having_clause: String::new(),
            order_by_clause: String::new(),
            lock: LockOptions::NONE,
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

    pub fn set_select_clause(&mut self, clause: impl Into<String>) -> &mut Self {
        self.select_clause = clause.into();
        self
    }

    pub fn set_from_clause(&mut self, clause: impl Into<String>) -> &mut Self {
        self.from_clause = clause.into();
        self
    }

    /// `table alias` shorthand.
    pub fn set_from_table(&mut self, table: &str, alias: &str) -> &mut Self {
        self.from_clause = format!("{table} {alias}");
        self
    }

    /// Pieces from a [`JoinFragment`](super::JoinFragment). A leading `and`
    /// of the where piece is dropped.
    pub fn set_outer_joins(&mut self, after_from: &str, after_where: &str) -> &mut Self {
        self.outer_joins_after_from = after_from.to_string();
        let trimmed = after_where.trim();
        let trimmed = match trimmed.strip_prefix("and") {
            Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => rest.trim_start(),
            _ => trimmed,
        };
        self.outer_joins_after_where = trimmed.to_string();
        self
    }

    pub fn set_where_clause(&mut self, clause: impl Into<String>) -> &mut Self {
        self.where_clause = clause.into();
        self
    }

    pub fn set_group_by_clause(&mut self, clause: impl Into<String>) -> &mut Self {
        self.group_by_clause = clause.into();
        self
    }

    pub fn set_having_clause(&mut self, clause: impl Into<String>) -> &mut Self {
        self.having_clause = clause.into();
        self
    }

    pub fn set_order_by_clause(&mut self, clause: impl Into<String>) -> &mut Self {
        self.order_by_clause = clause.into();
        self
    }

    pub fn set_lock_options(&mut self, lock: LockOptions) -> &mut Self {
        self.lock = lock;
        self
    }

    pub fn to_statement_string(&self) -> String {
        let mut buf = String::with_capacity(
            self.select_clause.len() + self.from_clause.len() + self.where_clause.len() + 64,
        );
        push_comment(&mut buf, self.comment.as_deref());

        if !self.select_clause.is_empty() {
            buf.push_str("select ");
            buf.push_str(&self.select_clause);
        }
        if !self.from_clause.is_empty() {
            buf.push_str(" from ");
            buf.push_str(&self.from_clause);
        }
        buf.push_str(&self.outer_joins_after_from);

        if !self.where_clause.is_empty() || !self.outer_joins_after_where.is_empty() {
            buf.push_str(" where ");
            // outer join restrictions go first so dynamic filters see them
            if !self.outer_joins_after_where.is_empty() {
                buf.push_str(&self.outer_joins_after_where);
                if !self.where_clause.is_empty() {
                    buf.push_str(" and ");
                }
            }
            buf.push_str(&self.where_clause);
        }
        if !self.group_by_clause.is_empty() {
            buf.push_str(" group by ");
            buf.push_str(&self.group_by_clause);
        }
        if !self.having_clause.is_empty() {
            buf.push_str(" having ");
            buf.push_str(&self.having_clause);
        }
        if !self.order_by_clause.is_empty() {
            buf.push_str(" order by ");
            buf.push_str(&self.order_by_clause);
        }
        buf.push_str(&self.dialect.for_update_string(self.lock));

        self.markers.apply(&buf)
    }
}

/// Single-table SELECT with column aliases and table lock hints.
#[derive(Debug, Clone)]
pub struct SimpleSelect {
    dialect: Dialect,
    markers: ParameterMarkerStyle,
    comment: Option<String>,
    table_name: String,
    columns: Vec<(String, Option<String>)>,
    where_tokens: Vec<String>,
    order_by: Option<String>,
    lock: LockOptions,
}

impl SimpleSelect {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            markers: ParameterMarkerStyle::default(),
            comment: None,
            table_name: String::new(),
            columns: Vec::new(),
            where_tokens: Vec::new(),
            order_by: None,
            lock: LockOptions::NONE,
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

    pub fn set_table_name(&mut self, table: impl Into<String>) -> &mut Self {
        self.table_name = table.into();
        self
    }

    pub fn set_lock_options(&mut self, lock: LockOptions) -> &mut Self {
        self.lock = lock;
        self
    }

    /// Full `order by ...` text, appended verbatim.
    pub fn set_order_by(&mut self, order_by: impl Into<String>) -> &mut Self {
        self.order_by = Some(order_by.into());
        self
    }

    pub fn add_column(&mut self, column: impl Into<String>) -> &mut Self {
        self.columns.push((column.into(), None));
        self
    }

    pub fn add_column_as(&mut self, column: impl Into<String>, alias: impl Into<String>) -> &mut Self {
        self.columns.push((column.into(), Some(alias.into())));
        self
    }

    pub fn add_columns(&mut self, columns: &[String]) -> &mut Self {
        for column in columns {
            self.add_column(column.clone());
        }
        self
    }

    pub fn add_where_token(&mut self, token: impl Into<String>) -> &mut Self {
        self.where_tokens.push(token.into());
        self
    }

    fn and(&mut self) {
        if !self.where_tokens.is_empty() {
            self.where_tokens.push("and".to_string());
        }
    }

    /// `lhs op rhs`
    pub fn add_condition(&mut self, lhs: &str, op: &str, rhs: &str) -> &mut Self {
        self.and();
        self.where_tokens.push(format!("{lhs} {op} {rhs}"));
        self
    }

    /// `lhs condition`, e.g. `("ver", "is null")`.
    pub fn add_predicate(&mut self, lhs: &str, condition: &str) -> &mut Self {
        self.and();
        self.where_tokens.push(format!("{lhs} {condition}"));
        self
    }

    pub fn add_conditions(&mut self, lhs: &[String], op: &str, rhs: &[String]) -> &mut Self {
        for (l, r) in lhs.iter().zip(rhs) {
            self.add_condition(l, op, r);
        }
        self
    }

    pub fn to_statement_string(&self) -> String {
        let mut buf = String::with_capacity(
            self.columns.len() * 10 + self.table_name.len() + self.where_tokens.len() * 10 + 10,
        );
        push_comment(&mut buf, self.comment.as_deref());
        buf.push_str("select ");

        let mut seen = HashSet::new();
        let mut first = true;
        for (column, alias) in &self.columns {
            if !seen.insert(alias.as_deref().unwrap_or(column)) {
                continue;
            }
            if !first {
                buf.push_str(", ");
            }
            buf.push_str(column);
            if let Some(alias) = alias.as_deref().filter(|a| a != column) {
                buf.push_str(" as ");
                buf.push_str(alias);
            }
            first = false;
        }

        buf.push_str(" from ");
        buf.push_str(&self.dialect.append_lock_hint(self.lock, &self.table_name));

        if !self.where_tokens.is_empty() {
            buf.push_str(" where ");
            buf.push_str(&self.where_tokens.join(" "));
        }
        if let Some(order_by) = &self.order_by {
            buf.push_str(order_by);
        }
        buf.push_str(&self.dialect.for_update_string(self.lock));

        self.markers.apply(&buf)
    }
}
