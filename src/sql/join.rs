//! Outer join fragments.
//!
//! ANSI dialects render joins into the FROM clause. Legacy Oracle renders a
//! cross join plus `(+)` markers in the WHERE clause. Callers only see the
//! [`JoinFragment`] trait and paste the two rendered pieces into a
//! [`Select`](super::Select).

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinType {
    Inner,
    LeftOuter,
    RightOuter,
    FullOuter,
    Cross,
}

impl JoinType {
    pub fn sql_keyword(self) -> &'static str {
        match self {
            Self::Inner => "inner",
            Self::LeftOuter => "left outer",
            Self::RightOuter => "right outer",
            Self::FullOuter => "full outer",
            Self::Cross => "cross",
        }
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_keyword())
    }
}

pub trait JoinFragment: fmt::Debug {
    /// Joins `table alias` on `fk_columns[i] = alias.pk_columns[i]`.
    /// `fk_columns` are expected to be qualified already.
    fn add_join(
        &mut self,
        table: &str,
        alias: &str,
        fk_columns: &[String],
        pk_columns: &[String],
        join_type: JoinType,
    );

    fn add_join_with_condition(
        &mut self,
        table: &str,
        alias: &str,
        fk_columns: &[String],
        pk_columns: &[String],
        join_type: JoinType,
        on: &str,
    );

    fn add_cross_join(&mut self, table: &str, alias: &str);

    /// Appends pre-rendered pieces of another fragment.
    fn add_joins(&mut self, from_fragment: &str, where_fragment: &str);

    /// Adds a free-form restriction. Returns whether anything was added.
    fn add_condition(&mut self, condition: &str) -> bool;

    fn to_from_fragment_string(&self) -> String;

    fn to_where_fragment_string(&self) -> String;

    fn copy(&self) -> Box<dyn JoinFragment>;

    fn has_theta_joins(&self) -> bool;

    /// Adds `alias.column<condition>` for every column.
    fn add_column_condition(&mut self, alias: &str, columns: &[String], condition: &str) {
        for column in columns {
            self.add_condition(&format!("{alias}.{column}{condition}"));
        }
    }

    /// Adds `fk=alias.pk` for every pair.
    fn add_key_condition(&mut self, alias: &str, fk_columns: &[String], pk_columns: &[String]) {
        for (fk, pk) in fk_columns.iter().zip(pk_columns) {
            self.add_condition(&format!("{fk}={alias}.{pk}"));
        }
    }

    fn add_fragment(&mut self, other: &dyn JoinFragment) {
        self.add_joins(&other.to_from_fragment_string(), &other.to_where_fragment_string());
    }
}

fn append_condition(buffer: &mut String, on: &str) -> bool {
    if on.is_empty() {
        return false;
    }
    if !on.starts_with(" and") {
        buffer.push_str(" and ");
    }
    buffer.push_str(on);
    true
}

/// `left outer join T a on x=a.y and ...`
#[derive(Debug, Clone, Default)]
pub struct AnsiJoinFragment {
    buffer: String,
    conditions: String,
}

impl AnsiJoinFragment {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JoinFragment for AnsiJoinFragment {
    fn add_join(
        &mut self,
        table: &str,
        alias: &str,
        fk_columns: &[String],
        pk_columns: &[String],
        join_type: JoinType,
    ) {
        self.add_join_with_condition(table, alias, fk_columns, pk_columns, join_type, "");
    }

    fn add_join_with_condition(
        &mut self,
        table: &str,
        alias: &str,
        fk_columns: &[String],
        pk_columns: &[String],
        join_type: JoinType,
        on: &str,
    ) {
        if join_type == JoinType::Cross {
            self.add_cross_join(table, alias);
            append_condition(&mut self.conditions, on);
            return;
        }
        self.buffer
            .push_str(&format!(" {join_type} join {table} {alias} on "));
        let pairs: Vec<String> = fk_columns
            .iter()
            .zip(pk_columns)
            .map(|(fk, pk)| format!("{fk}={alias}.{pk}"))
            .collect();
        self.buffer.push_str(&pairs.join(" and "));
        append_condition(&mut self.buffer, on);
    }

    fn add_cross_join(&mut self, table: &str, alias: &str) {
        self.buffer.push_str(&format!(", {table} {alias}"));
    }

    // ANSI joins carry their predicates in the FROM piece
    fn add_joins(&mut self, from_fragment: &str, _where_fragment: &str) {
        self.buffer.push_str(from_fragment);
    }

    fn add_condition(&mut self, condition: &str) -> bool {
        append_condition(&mut self.conditions, condition)
    }

    fn to_from_fragment_string(&self) -> String {
        self.buffer.clone()
    }

    fn to_where_fragment_string(&self) -> String {
        self.conditions.clone()
    }

    fn copy(&self) -> Box<dyn JoinFragment> {
        Box::new(self.clone())
    }

    fn has_theta_joins(&self) -> bool {
        false
    }
}

/// Oracle 8i style: `, T a` in the FROM clause and `and x=a.y(+)` in the
/// WHERE clause.
#[derive(Debug, Clone, Default)]
pub struct OracleJoinFragment {
    after_from: String,
    after_where: String,
    has_theta_joins: bool,
}

impl OracleJoinFragment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the joined side of a filter condition as outer by inserting
    /// `(+)` in front of every comparison operator (and before ` is `).
    fn add_left_outer_join_condition(&mut self, on: &str) {
        let mut marked = String::with_capacity(on.len() + 8);
        let mut in_operator = false;
        let mut rest = on;
        while let Some(c) = rest.chars().next() {
            let operator = matches!(c, '=' | '<' | '>' | '!');
            if operator && !in_operator {
                marked.push_str("(+)");
            } else if c == ' ' && rest[1..].starts_with("is ") {
                marked.push_str("(+)");
            }
            in_operator = operator;
            marked.push(c);
            rest = &rest[c.len_utf8()..];
        }
        self.add_condition(&marked);
    }
}

impl JoinFragment for OracleJoinFragment {
    fn add_join(
        &mut self,
        table: &str,
        alias: &str,
        fk_columns: &[String],
        pk_columns: &[String],
        join_type: JoinType,
    ) {
        self.add_cross_join(table, alias);
        if join_type == JoinType::Cross {
            return;
        }
        for (fk, pk) in fk_columns.iter().zip(pk_columns) {
            self.has_theta_joins = true;
            self.after_where.push_str(" and ");
            self.after_where.push_str(fk);
            if matches!(join_type, JoinType::RightOuter | JoinType::FullOuter) {
                self.after_where.push_str("(+)");
            }
            self.after_where.push_str(&format!("={alias}.{pk}"));
            if matches!(join_type, JoinType::LeftOuter | JoinType::FullOuter) {
                self.after_where.push_str("(+)");
            }
        }
    }

    fn add_join_with_condition(
        &mut self,
        table: &str,
        alias: &str,
        fk_columns: &[String],
        pk_columns: &[String],
        join_type: JoinType,
        on: &str,
    ) {
        self.add_join(table, alias, fk_columns, pk_columns, join_type);
        if join_type == JoinType::LeftOuter {
            if !on.is_empty() {
                self.add_left_outer_join_condition(on);
            }
        } else {
            self.add_condition(on);
        }
    }

    fn add_cross_join(&mut self, table: &str, alias: &str) {
        self.after_from.push_str(&format!(", {table} {alias}"));
    }

    fn add_joins(&mut self, from_fragment: &str, where_fragment: &str) {
        self.after_from.push_str(from_fragment);
        self.after_where.push_str(where_fragment);
    }

    fn add_condition(&mut self, condition: &str) -> bool {
        append_condition(&mut self.after_where, condition)
    }

    fn to_from_fragment_string(&self) -> String {
        self.after_from.clone()
    }

    fn to_where_fragment_string(&self) -> String {
        self.after_where.clone()
    }

    fn copy(&self) -> Box<dyn JoinFragment> {
        Box::new(self.clone())
    }

    fn has_theta_joins(&self) -> bool {
        self.has_theta_joins
    }
}
