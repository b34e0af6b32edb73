//! Structured predicates for join conditions and restrictions.

use std::fmt;

/// `qualifier.column`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnReference {
    pub qualifier: String,
    pub column: String,
}

impl ColumnReference {
    pub fn new(qualifier: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            qualifier: qualifier.into(),
            column: column.into(),
        }
    }
}

impl fmt::Display for ColumnReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.qualifier.is_empty() {
            f.write_str(&self.column)
        } else {
            write!(f, "{}.{}", self.qualifier, self.column)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl ComparisonOperator {
    pub fn sql(self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "<>",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    Column(ColumnReference),
    /// Bound parameter.
    Parameter,
    Literal(String),
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column(c) => c.fmt(f),
            Self::Parameter => f.write_str("?"),
            Self::Literal(l) => f.write_str(l),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JunctionKind {
    Conjunction,
    Disjunction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Comparison {
        lhs: Expression,
        op: ComparisonOperator,
        rhs: Expression,
    },
    Junction {
        kind: JunctionKind,
        predicates: Vec<Predicate>,
    },
    IsNull {
        expression: Expression,
        negated: bool,
    },
    /// Pre-rendered SQL, e.g. a mapped `where` restriction.
    Raw(String),
}

impl Predicate {
    pub fn equal(lhs: Expression, rhs: Expression) -> Self {
        Self::Comparison {
            lhs,
            op: ComparisonOperator::Equal,
            rhs,
        }
    }

    pub fn conjunction(predicates: Vec<Predicate>) -> Self {
        Self::Junction {
            kind: JunctionKind::Conjunction,
            predicates,
        }
    }

    pub fn disjunction(predicates: Vec<Predicate>) -> Self {
        Self::Junction {
            kind: JunctionKind::Disjunction,
            predicates,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Junction { predicates, .. } => predicates.iter().all(Predicate::is_empty),
            Self::Raw(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Number of leaf comparisons / tests.
    pub fn leaf_count(&self) -> usize {
        match self {
            Self::Junction { predicates, .. } => predicates.iter().map(Predicate::leaf_count).sum(),
            _ => 1,
        }
    }

    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Comparison { lhs, op, rhs } => write!(f, "{lhs}{}{rhs}", op.sql()),
            Self::IsNull { expression, negated } => {
                write!(f, "{expression} is {}null", if *negated { "not " } else { "" })
            }
            Self::Raw(sql) => f.write_str(sql),
            Self::Junction { kind, predicates } => {
                let separator = match kind {
                    JunctionKind::Conjunction => " and ",
                    JunctionKind::Disjunction => " or ",
                };
                let parts: Vec<String> = predicates
                    .iter()
                    .filter(|p| !p.is_empty())
                    .map(|p| match p {
                        Self::Junction { .. } => format!("({p})"),
                        _ => p.to_string(),
                    })
                    .collect();
                f.write_str(&parts.join(separator))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(q: &str, c: &str) -> Expression {
        Expression::Column(ColumnReference::new(q, c))
    }

    #[test]
    fn test_conjunction_rendering() {
        let p = Predicate::conjunction(vec![
            Predicate::equal(col("p1_0", "addr_id"), col("a1_0", "id")),
            Predicate::IsNull {
                expression: col("a1_0", "deleted"),
                negated: false,
            },
        ]);
        assert_eq!(p.render(), "p1_0.addr_id=a1_0.id and a1_0.deleted is null");
        assert_eq!(p.leaf_count(), 2);
    }

    #[test]
    fn test_nested_junction_parenthesized() {
        let p = Predicate::conjunction(vec![
            Predicate::Raw("x=1".into()),
            Predicate::disjunction(vec![
                Predicate::equal(col("", "a"), Expression::Parameter),
                Predicate::equal(col("", "b"), Expression::Literal("2".into())),
            ]),
            Predicate::Raw(" ".into()),
        ]);
        assert_eq!(p.render(), "x=1 and (a=? or b=2)");
    }
}
