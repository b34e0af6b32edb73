//! SQL text generation: dialects, statement builders and fragments.

mod case;
mod dialect;
mod fragments;
mod insert;
mod join;
mod lexer;
mod lock;
mod mutation;
mod params;
mod predicate;
mod select;
mod template;
mod types;

pub use case::{CaseFragment, CaseStyle};
pub use dialect::{Dialect, JoinStyle};
pub use fragments::{
    Alias, ConditionFragment, DisjunctionFragment, ForUpdateFragment, InFragment, InValue,
    is_template,
};
pub use insert::{Insert, InsertSelect};
pub use join::{AnsiJoinFragment, JoinFragment, JoinType, OracleJoinFragment};
pub use lexer::Lexer;
pub use lock::{LockMode, LockOptions};
pub use mutation::{Delete, Restriction, Update};
pub use params::ParameterMarkerStyle;
pub use predicate::{
    ColumnReference, ComparisonOperator, Expression, JunctionKind, Predicate,
};
pub use select::{Select, SimpleSelect};
pub use template::{
    FunctionRegistry, SqlFunction, TEMPLATE, render_order_by_string_template,
    render_where_string_template, replace_placeholder,
};
pub use types::map_type;

/// Prefixes `buf` with `/* comment */`, escaping a nested `*/`.
pub(crate) fn push_comment(buf: &mut String, comment: Option<&str>) {
    if let Some(comment) = comment.filter(|c| !c.is_empty()) {
        buf.push_str("/* ");
        buf.push_str(&comment.replace("*/", "*\\/"));
        buf.push_str(" */ ");
    }
}
