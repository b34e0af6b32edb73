//! Small WHERE-clause and locking fragments.

use super::Dialect;
use super::case::qualify;
use super::lock::LockOptions;
use super::template::{TEMPLATE, replace_placeholder};
use crate::error::{Error, Result};

/// One element of an [`InFragment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InValue {
    Null,
    NotNull,
    /// Already rendered SQL literal.
    Literal(String),
}

/// `col in (...)` with support for the `null` / `not null` markers used by
/// discriminator restrictions.
#[derive(Debug, Clone, Default)]
pub struct InFragment {
    column: String,
    values: Vec<InValue>,
}

impl InFragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_column(&mut self, alias: &str, column: &str) -> &mut Self {
        self.column = qualify(alias, column);
        self
    }

    /// Uses a formula template instead of a column.
    pub fn set_formula(&mut self, alias: &str, formula_template: &str) -> &mut Self {
        self.column = replace_placeholder(formula_template, alias);
        self
    }

    pub fn add_value(&mut self, value: InValue) -> &mut Self {
        self.values.push(value);
        self
    }

    pub fn add_values(&mut self, values: impl IntoIterator<Item = InValue>) -> &mut Self {
        self.values.extend(values);
        self
    }

    pub fn to_fragment_string(&self) -> Result<String> {
        let column = &self.column;
        match self.values.as_slice() {
            [] => return Ok("1=2".to_string()),
            [InValue::Null] => return Ok(format!("{column} is null")),
            [InValue::NotNull] => return Ok(format!("{column} is not null")),
            [InValue::Literal(v)] => return Ok(format!("{column}={v}")),
            _ => {}
        }

        if self.values.contains(&InValue::NotNull) {
            return Err(Error::modeling("not null makes no sense for in expression"));
        }
        let allow_null = self.values.contains(&InValue::Null);
        let literals: Vec<&str> = self
            .values
            .iter()
            .filter_map(|v| match v {
                InValue::Literal(l) => Some(l.as_str()),
                _ => None,
            })
            .collect();

        Ok(match (allow_null, literals.is_empty()) {
            (_, true) => format!("{column} is null"),
            (true, false) => format!("({column} is null or {column} in ({}))", literals.join(", ")),
            (false, false) => format!("{column} in ({})", literals.join(", ")),
        })
    }
}

/// `alias.lhs<op>rhs and ...`
#[derive(Debug, Clone)]
pub struct ConditionFragment {
    table_alias: String,
    lhs: Vec<String>,
    rhs: Vec<String>,
    op: String,
}

impl Default for ConditionFragment {
    fn default() -> Self {
        Self {
            table_alias: String::new(),
            lhs: Vec::new(),
            rhs: Vec::new(),
            op: "=".to_string(),
        }
    }
}

impl ConditionFragment {
    pub fn new(table_alias: impl Into<String>) -> Self {
        Self {
            table_alias: table_alias.into(),
            ..Self::default()
        }
    }

    pub fn set_op(&mut self, op: impl Into<String>) -> &mut Self {
        self.op = op.into();
        self
    }

    pub fn set_condition(&mut self, lhs: &[String], rhs: &[String]) -> &mut Self {
        self.lhs = lhs.to_vec();
        self.rhs = rhs.to_vec();
        self
    }

    /// Compares every lhs column with the same expression.
    pub fn set_condition_value(&mut self, lhs: &[String], rhs: &str) -> &mut Self {
        self.lhs = lhs.to_vec();
        self.rhs = vec![rhs.to_string(); lhs.len()];
        self
    }

    pub fn to_fragment_string(&self) -> String {
        self.lhs
            .iter()
            .zip(&self.rhs)
            .map(|(l, r)| format!("{}{}{}", qualify(&self.table_alias, l), self.op, r))
            .collect::<Vec<_>>()
            .join(" and ")
    }
}

#[derive(Debug, Clone, Default)]
pub struct DisjunctionFragment {
    buffer: String,
}

impl DisjunctionFragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_condition(&mut self, fragment: &ConditionFragment) -> &mut Self {
        self.add_condition_string(&fragment.to_fragment_string())
    }

    pub fn add_condition_string(&mut self, fragment: &str) -> &mut Self {
        if !self.buffer.is_empty() {
            self.buffer.push_str(" or ");
        }
        self.buffer.push('(');
        self.buffer.push_str(fragment);
        self.buffer.push(')');
        self
    }

    pub fn to_fragment_string(&self) -> String {
        self.buffer.clone()
    }
}

/// Row-level lock clause for a SELECT over several aliased tables.
#[derive(Debug, Clone)]
pub struct ForUpdateFragment {
    dialect: Dialect,
    lock: LockOptions,
    targets: Vec<String>,
}

impl ForUpdateFragment {
    pub fn new(dialect: Dialect, lock: LockOptions) -> Self {
        Self {
            dialect,
            lock,
            targets: Vec::new(),
        }
    }

    /// Locks the table behind `alias`. Dialects that lock by column get
    /// `alias.key` entries, the others the bare alias.
    pub fn add_table_alias(&mut self, alias: &str, key_columns: &[String]) -> &mut Self {
        if !self.lock.mode.is_pessimistic() {
            return self;
        }
        if self.dialect.for_update_of_uses_columns() {
            self.targets
                .extend(key_columns.iter().map(|c| qualify(alias, c)));
        } else {
            self.targets.push(alias.to_string());
        }
        self
    }

    pub fn to_fragment_string(&self) -> String {
        if self.targets.is_empty() {
            return self.dialect.for_update_string(self.lock);
        }
        self.dialect
            .for_update_of_string(self.lock, &self.targets.join(", "))
    }
}

const OPEN_QUOTES: &str = "`\"[";
const CLOSE_QUOTES: &str = "`\"]";

/// Derives column aliases: truncates to a maximum length and appends a
/// suffix, preserving any identifier quoting.
#[derive(Debug, Clone)]
pub struct Alias {
    length: usize,
    suffix: Option<String>,
}

impl Alias {
    pub fn new(length: usize, suffix: impl Into<String>) -> Self {
        Self {
            length,
            suffix: Some(suffix.into()),
        }
    }

    pub fn with_suffix(suffix: impl Into<String>) -> Self {
        Self::new(usize::MAX, suffix)
    }

    pub fn to_alias_string(&self, identifier: &str) -> String {
        match quote_index(identifier) {
            Some(i) => {
                let open = OPEN_QUOTES.as_bytes()[i] as char;
                let close = CLOSE_QUOTES.as_bytes()[i] as char;
                format!("{open}{}{close}", self.unquoted_alias(identifier, true))
            }
            None => self.unquoted_alias(identifier, false),
        }
    }

    pub fn to_unquoted_alias_string(&self, identifier: &str) -> String {
        self.unquoted_alias(identifier, quote_index(identifier).is_some())
    }

    pub fn to_alias_strings(&self, identifiers: &[String]) -> Vec<String> {
        identifiers.iter().map(|i| self.to_alias_string(i)).collect()
    }

    fn unquoted_alias(&self, identifier: &str, quoted: bool) -> String {
        let inner = if quoted && identifier.len() >= 2 {
            &identifier[1..identifier.len() - 1]
        } else {
            identifier
        };
        let mut alias: String = inner.chars().take(self.length).collect();
        if let Some(suffix) = &self.suffix {
            alias.push_str(suffix);
        }
        alias
    }
}

fn quote_index(identifier: &str) -> Option<usize> {
    identifier.chars().next().and_then(|c| OPEN_QUOTES.find(c))
}

/// True when a fragment still needs its alias substituted.
pub fn is_template(fragment: &str) -> bool {
    fragment.contains(TEMPLATE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::LockMode;

    fn lit(s: &str) -> InValue {
        InValue::Literal(s.to_string())
    }

    #[test]
    fn test_in_fragment_shapes() {
        let mut f = InFragment::new();
        f.set_column("p", "type");
        assert_eq!(f.to_fragment_string().unwrap(), "1=2");

        f.add_value(lit("'A'"));
        assert_eq!(f.to_fragment_string().unwrap(), "p.type='A'");

        f.add_value(lit("'B'"));
        assert_eq!(f.to_fragment_string().unwrap(), "p.type in ('A', 'B')");

        f.add_value(InValue::Null);
        assert_eq!(
            f.to_fragment_string().unwrap(),
            "(p.type is null or p.type in ('A', 'B'))"
        );
    }

    #[test]
    fn test_in_fragment_null_markers() {
        let mut f = InFragment::new();
        f.set_column("", "type").add_value(InValue::NotNull);
        assert_eq!(f.to_fragment_string().unwrap(), "type is not null");

        f.add_value(lit("1"));
        assert!(f.to_fragment_string().is_err());
    }

    #[test]
    fn test_condition_and_disjunction() {
        let mut c1 = ConditionFragment::new("p");
        c1.set_condition(&["a".to_string(), "b".to_string()], &["?".to_string(), "1".to_string()]);
        assert_eq!(c1.to_fragment_string(), "p.a=? and p.b=1");

        let mut c2 = ConditionFragment::new("p");
        c2.set_op("<>").set_condition_value(&["c".to_string()], "?");

        let mut d = DisjunctionFragment::new();
        d.add_condition(&c1).add_condition(&c2);
        assert_eq!(d.to_fragment_string(), "(p.a=? and p.b=1) or (p.c<>?)");
    }

    #[test]
    fn test_for_update_fragment() {
        let lock = LockOptions::new(LockMode::UpgradeNowait);
        let mut f = ForUpdateFragment::new(Dialect::Oracle, lock);
        f.add_table_alias("p", &["id".to_string()]);
        assert_eq!(f.to_fragment_string(), " for update of p.id nowait");

        let mut f = ForUpdateFragment::new(Dialect::PostgreSQL, lock);
        f.add_table_alias("p", &["id".to_string()]).add_table_alias("a", &[]);
        assert_eq!(f.to_fragment_string(), " for update of p, a nowait");

        let f = ForUpdateFragment::new(Dialect::H2, LockOptions::new(LockMode::PessimisticWrite));
        assert_eq!(f.to_fragment_string(), " for update");
    }

    #[test]
    fn test_alias() {
        let alias = Alias::new(4, "_0");
        assert_eq!(alias.to_alias_string("person_id"), "pers_0");
        assert_eq!(alias.to_alias_string("`order`"), "`orde_0`");
        assert_eq!(alias.to_unquoted_alias_string("[name]"), "name_0");
        assert_eq!(Alias::with_suffix("_").to_alias_string("id"), "id_");
    }
}
