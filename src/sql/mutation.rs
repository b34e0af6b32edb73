//! UPDATE and DELETE statement builders.

use super::params::ParameterMarkerStyle;
use super::push_comment;
use indexmap::IndexMap;

/// `lhs <op> rhs`. A `?` rhs becomes a parameter marker; anything else is
/// a literal expression rendered as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Restriction {
    pub lhs: String,
    pub op: String,
    pub rhs: String,
}

impl Restriction {
    pub fn new(lhs: impl Into<String>, op: impl Into<String>, rhs: impl Into<String>) -> Self {
        Self {
            lhs: lhs.into(),
            op: op.into(),
            rhs: rhs.into(),
        }
    }

    /// `lhs=?`
    pub fn bound(lhs: impl Into<String>) -> Self {
        Self::new(lhs, "=", "?")
    }

    pub fn is_parameter(&self) -> bool {
        self.rhs == "?"
    }

    pub fn render(&self) -> String {
        let word_op = self.op.chars().all(|c| c.is_alphabetic() || c == ' ');
        if word_op {
            format!("{} {} {}", self.lhs, self.op.trim(), self.rhs)
                .trim_end()
                .to_string()
        } else {
            format!("{}{}{}", self.lhs, self.op, self.rhs)
        }
    }
}

/// Renders `where` from the primary key, free-form, restriction and
/// version parts in that order.
fn push_where(
    buf: &mut String,
    primary_key: &IndexMap<String, String>,
    where_fragment: Option<&str>,
    restrictions: &[Restriction],
    version_column: Option<&str>,
) {
    let mut conditions: Vec<String> = primary_key
        .iter()
        .map(|(column, value)| format!("{column}={value}"))
        .collect();
    if let Some(fragment) = where_fragment {
        conditions.push(fragment.to_string());
    }
    conditions.extend(restrictions.iter().map(Restriction::render));
    if let Some(version) = version_column {
        conditions.push(format!("{version}=?"));
    }
    if !conditions.is_empty() {
        buf.push_str(" where ");
        buf.push_str(&conditions.join(" and "));
    }
}

/// `update T set a=?, b=expr where pk=? and ... and ver=?`
#[derive(Debug, Clone, Default)]
pub struct Update {
    markers: ParameterMarkerStyle,
    table_name: String,
    comment: Option<String>,
    columns: IndexMap<String, String>,
    assignments: Option<String>,
    primary_key: IndexMap<String, String>,
    where_fragment: Option<String>,
    restrictions: Vec<Restriction>,
    version_column: Option<String>,
}

impl Update {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            ..Self::default()
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

    pub fn add_column(&mut self, column: impl Into<String>) -> &mut Self {
        self.add_column_expression(column, "?")
    }

    pub fn add_columns(&mut self, columns: &[String]) -> &mut Self {
        for column in columns {
            self.add_column(column.clone());
        }
        self
    }

    pub fn add_column_expression(
        &mut self,
        column: impl Into<String>,
        expression: impl Into<String>,
    ) -> &mut Self {
        self.columns.insert(column.into(), expression.into());
        self
    }

    /// Raw `a=b` assignment text, appended after the column assignments.
    pub fn append_assignment_fragment(&mut self, fragment: &str) -> &mut Self {
        self.assignments = Some(match self.assignments.take() {
            Some(existing) => format!("{existing}, {fragment}"),
            None => fragment.to_string(),
        });
        self
    }

    pub fn has_assignments(&self) -> bool {
        !self.columns.is_empty() || self.assignments.is_some()
    }

    pub fn add_primary_key_columns(&mut self, columns: &[String]) -> &mut Self {
        for column in columns {
            self.primary_key.insert(column.clone(), "?".to_string());
        }
        self
    }

    pub fn set_where(&mut self, fragment: impl Into<String>) -> &mut Self {
        self.where_fragment = Some(fragment.into());
        self
    }

    pub fn add_restriction(&mut self, restriction: Restriction) -> &mut Self {
        self.restrictions.push(restriction);
        self
    }

    pub fn set_version_column_name(&mut self, column: impl Into<String>) -> &mut Self {
        self.version_column = Some(column.into());
        self
    }

    pub fn to_statement_string(&self) -> String {
        let mut buf = String::with_capacity(self.columns.len() * 15 + self.table_name.len() + 10);
        push_comment(&mut buf, self.comment.as_deref());
        buf.push_str("update ");
        buf.push_str(&self.table_name);
        buf.push_str(" set ");

        let mut assignments: Vec<String> = self
            .columns
            .iter()
            .map(|(column, value)| format!("{column}={value}"))
            .collect();
        if let Some(extra) = &self.assignments {
            assignments.push(extra.clone());
        }
        buf.push_str(&assignments.join(", "));

        push_where(
            &mut buf,
            &self.primary_key,
            self.where_fragment.as_deref(),
            &self.restrictions,
            self.version_column.as_deref(),
        );
        self.markers.apply(&buf)
    }
}

/// `delete from T where pk=? and ... and ver=?`
#[derive(Debug, Clone, Default)]
pub struct Delete {
    markers: ParameterMarkerStyle,
    table_name: String,
    comment: Option<String>,
    primary_key: IndexMap<String, String>,
    where_fragment: Option<String>,
    restrictions: Vec<Restriction>,
    version_column: Option<String>,
}

impl Delete {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            ..Self::default()
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

    pub fn add_primary_key_columns(&mut self, columns: &[String]) -> &mut Self {
        for column in columns {
            self.primary_key.insert(column.clone(), "?".to_string());
        }
        self
    }

    pub fn add_primary_key_column(
        &mut self,
        column: impl Into<String>,
        expression: impl Into<String>,
    ) -> &mut Self {
        self.primary_key.insert(column.into(), expression.into());
        self
    }

    pub fn set_where(&mut self, fragment: impl Into<String>) -> &mut Self {
        self.where_fragment = Some(fragment.into());
        self
    }

    pub fn add_where_fragment(&mut self, fragment: &str) -> &mut Self {
        self.where_fragment = Some(match self.where_fragment.take() {
            Some(existing) => format!("{existing} and {fragment}"),
            None => fragment.to_string(),
        });
        self
    }

    pub fn add_restriction(&mut self, restriction: Restriction) -> &mut Self {
        self.restrictions.push(restriction);
        self
    }

    pub fn set_version_column_name(&mut self, column: impl Into<String>) -> &mut Self {
        self.version_column = Some(column.into());
        self
    }

    pub fn to_statement_string(&self) -> String {
        let mut buf = String::with_capacity(self.table_name.len() + 32);
        push_comment(&mut buf, self.comment.as_deref());
        buf.push_str("delete from ");
        buf.push_str(&self.table_name);
        push_where(
            &mut buf,
            &self.primary_key,
            self.where_fragment.as_deref(),
            &self.restrictions,
            self.version_column.as_deref(),
        );
        self.markers.apply(&buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_full() {
        let mut update = Update::new("person");
        update
            .set_comment("update Person")
            .add_column("name")
            .add_column_expression("modified", "current_timestamp")
            .append_assignment_fragment("counter=counter+1")
            .add_primary_key_columns(&["id".to_string()])
            .add_restriction(Restriction::new("status", "<>", "'X'"))
            .set_version_column_name("ver");
        assert_eq!(
            update.to_statement_string(),
            "/* update Person */ update person set name=?, modified=current_timestamp, counter=counter+1 where id=? and status<>'X' and ver=?"
        );
    }

    #[test]
    fn test_restriction_rendering() {
        assert_eq!(Restriction::bound("id").render(), "id=?");
        assert_eq!(Restriction::new("ver", "is", "null").render(), "ver is null");
        assert_eq!(Restriction::new("name", "like", "?").render(), "name like ?");
        assert!(Restriction::bound("id").is_parameter());
    }

    #[test]
    fn test_delete() {
        let mut delete = Delete::new("person");
        delete
            .add_primary_key_columns(&["id".to_string(), "region".to_string()])
            .add_where_fragment("deleted=0")
            .set_version_column_name("ver");
        assert_eq!(
            delete.to_statement_string(),
            "delete from person where id=? and region=? and deleted=0 and ver=?"
        );
        assert_eq!(Delete::new("t").to_statement_string(), "delete from t");
    }

    #[test]
    fn test_comment_terminator_is_escaped() {
        let mut delete = Delete::new("t");
        delete.set_comment("drop */ t").add_restriction(Restriction::bound("a"));
        assert_eq!(delete.to_statement_string(), "/* drop *\\/ t */ delete from t where a=?");
    }

    #[test]
    fn test_delete_ordinal_markers() {
        let mut delete = Delete::new("t");
        delete
            .set_parameter_markers(ParameterMarkerStyle::Ordinal)
            .add_restriction(Restriction::bound("a"))
            .add_restriction(Restriction::bound("b"));
        assert_eq!(delete.to_statement_string(), "delete from t where a=$1 and b=$2");
    }
}
