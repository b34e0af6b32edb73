//! Alias qualification for SQL fragments declared in mappings.
//!
//! Formulas, `where` restrictions and filter conditions are written against
//! bare column names. Rendering a fragment prefixes every unqualified column
//! reference with a placeholder (or a concrete alias) while leaving string
//! literals, quoted identifiers, keywords, function names, named parameters
//! and table names in sub-select FROM clauses untouched.

use super::Dialect;
use super::lexer::{Lexer, is_whitespace_token};
use crate::error::{Error, Result};
use std::collections::HashMap;

/// Placeholder substituted with the table alias once it is known.
pub const TEMPLATE: &str = "$PlaceHolder$";

const KEYWORDS: &[&str] = &[
    "and", "or", "not", "like", "escape", "is", "in", "between", "null", "select", "distinct",
    "from", "join", "inner", "outer", "left", "right", "on", "where", "having", "group",
    "order", "by", "desc", "asc", "limit", "any", "some", "exists", "all", "union", "minus",
];

const BEFORE_TABLE_KEYWORDS: &[&str] = &["from", "join"];

const FUNCTION_KEYWORDS: &[&str] = &[
    "as", "leading", "trailing", "from", "case", "when", "then", "else", "end",
];

const ORDER_BY_KEYWORDS: &[&str] = &["nulls", "first", "last", "collate"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlFunction {
    /// Whether the function is written `f()` when called without arguments.
    pub has_parentheses_if_no_arguments: bool,
}

/// Functions known to the rewriter, keyed by lower-case name.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, SqlFunction>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with the dialect's parenthesis-free functions.
    pub fn for_dialect(dialect: Dialect) -> Self {
        let mut registry = Self::new();
        for name in dialect.no_paren_functions() {
            registry.register(
                name,
                SqlFunction {
                    has_parentheses_if_no_arguments: false,
                },
            );
        }
        registry
    }

    pub fn register(&mut self, name: &str, function: SqlFunction) {
        self.functions.insert(name.to_lowercase(), function);
    }

    pub fn find(&self, lc_name: &str) -> Option<SqlFunction> {
        self.functions.get(lc_name).copied()
    }
}

/// Qualifies every column reference in a `where`-style fragment with
/// `placeholder`.
pub fn render_where_string_template(
    fragment: &str,
    placeholder: &str,
    dialect: Dialect,
    functions: &FunctionRegistry,
) -> Result<String> {
    Renderer {
        placeholder,
        dialect,
        functions,
        extra_keywords: &[],
    }
    .render(fragment)
}

/// Like [`render_where_string_template`], also treating `nulls first` /
/// `nulls last` / `collate` as keywords.
pub fn render_order_by_string_template(
    fragment: &str,
    placeholder: &str,
    dialect: Dialect,
    functions: &FunctionRegistry,
) -> Result<String> {
    Renderer {
        placeholder,
        dialect,
        functions,
        extra_keywords: ORDER_BY_KEYWORDS,
    }
    .render(fragment)
}

/// Substitutes the alias for every [`TEMPLATE`] occurrence.
pub fn replace_placeholder(template: &str, alias: &str) -> String {
    template.replace(TEMPLATE, alias)
}

struct Renderer<'r> {
    placeholder: &'r str,
    dialect: Dialect,
    functions: &'r FunctionRegistry,
    extra_keywords: &'static [&'static str],
}

impl Renderer<'_> {
    fn render(&self, fragment: &str) -> Result<String> {
        let open_quote = self.dialect.open_quote();
        let close_quote = self.dialect.close_quote();
        let tokens = Lexer::new(fragment, open_quote, close_quote).tokenize();
        let mut result = String::with_capacity(fragment.len() * 2);

        let mut quoted = false;
        let mut quoted_identifier = false;
        let mut before_table = false;
        let mut in_from_clause = false;
        let mut after_from_table = false;

        let mut pos = 0;
        while pos < tokens.len() {
            let mut token: String = tokens[pos].to_string();
            let mut lc_token = token.to_lowercase();
            pos += 1;
            let next_token = tokens.get(pos).copied();

            let mut is_quote_character = false;

            if !quoted_identifier && token == "'" {
                quoted = !quoted;
                is_quote_character = true;
            }

            if !quoted {
                let first = token.chars().next();
                let is_open_quote = if token == "`" {
                    let opening = !quoted_identifier;
                    token = if opening { open_quote } else { close_quote }.to_string();
                    lc_token = token.clone();
                    quoted_identifier = opening;
                    is_quote_character = true;
                    opening
                } else if !quoted_identifier && first == Some(open_quote) {
                    quoted_identifier = true;
                    is_quote_character = true;
                    true
                } else if quoted_identifier && first == Some(close_quote) {
                    quoted_identifier = false;
                    is_quote_character = true;
                    false
                } else {
                    false
                };

                if is_open_quote {
                    result.push_str(self.placeholder);
                    result.push('.');
                }
            }

            if lc_token == "extract" && next_token == Some("(") {
                pos += 1;
                let field = extract_until(&tokens, &mut pos, "from")?;
                let source = self.render(&extract_until(&tokens, &mut pos, ")")?)?;
                result.push_str(&format!("extract({field} from {source})"));
                continue;
            }

            if lc_token == "trim" && next_token == Some("(") {
                pos += 1;
                let operands = trim_operands(&tokens, &mut pos)?;
                let trim = TrimOperands::from_operands(operands)?;
                self.render_trim(&trim, &mut result)?;
                continue;
            }

            let quoted_or_whitespace =
                quoted || quoted_identifier || is_quote_character || is_whitespace_token(&token);

            if quoted_or_whitespace {
                result.push_str(&token);
            } else if before_table {
                result.push_str(&token);
                before_table = false;
                after_from_table = true;
            } else if after_from_table {
                if lc_token != "as" {
                    after_from_table = false;
                }
                result.push_str(&token);
            } else if is_named_parameter(&token) {
                result.push_str(&token);
            } else if is_identifier(&token) && !self.is_function_or_keyword(&lc_token, next_token) {
                result.push_str(self.placeholder);
                result.push('.');
                result.push_str(&self.dialect.quote(&token));
            } else {
                if BEFORE_TABLE_KEYWORDS.contains(&lc_token.as_str()) {
                    before_table = true;
                    in_from_clause = true;
                } else if in_from_clause && lc_token == "," {
                    before_table = true;
                }
                result.push_str(&token);
            }

            // "as" is not a keyword here, so an alias does not end the FROM clause
            if in_from_clause
                && KEYWORDS.contains(&lc_token.as_str())
                && !BEFORE_TABLE_KEYWORDS.contains(&lc_token.as_str())
            {
                in_from_clause = false;
            }
        }

        Ok(result)
    }

    fn render_trim(&self, trim: &TrimOperands, result: &mut String) -> Result<()> {
        result.push_str("trim(");
        if let Some(side) = &trim.side {
            result.push_str(side);
            result.push(' ');
        }
        if let Some(ch) = &trim.trim_char {
            if ch.starts_with('\'') && ch.ends_with('\'') {
                result.push_str(ch);
            } else {
                result.push_str(&self.render(ch)?);
            }
            result.push(' ');
        }
        if let Some(from) = &trim.from {
            result.push_str(from);
            result.push(' ');
        } else if trim.side.is_some() || trim.trim_char.is_some() {
            result.push_str("from ");
        }
        result.push_str(&self.render(&trim.source)?);
        result.push(')');
        Ok(())
    }

    fn is_function_or_keyword(&self, lc_token: &str, next_token: Option<&str>) -> bool {
        next_token == Some("(")
            || KEYWORDS.contains(&lc_token)
            || self.is_function(lc_token)
            || self.dialect.is_keyword(lc_token)
            || FUNCTION_KEYWORDS.contains(&lc_token)
            || self.extra_keywords.contains(&lc_token)
    }

    // Functions that take parentheses even without arguments are columns
    // when the parenthesis is missing.
    fn is_function(&self, lc_token: &str) -> bool {
        self.functions
            .find(lc_token)
            .is_some_and(|f| !f.has_parentheses_if_no_arguments)
    }
}

fn is_named_parameter(token: &str) -> bool {
    token.starts_with(':')
}

fn is_identifier(token: &str) -> bool {
    match token.chars().next() {
        Some('`') => true,
        Some(c) => c.is_alphabetic() && !token.contains('.'),
        None => false,
    }
}

/// Concatenates tokens up to (and consuming) `delimiter`, trimmed.
fn extract_until(tokens: &[&str], pos: &mut usize, delimiter: &str) -> Result<String> {
    let mut value = String::new();
    loop {
        let Some(token) = tokens.get(*pos) else {
            return Err(Error::Template(format!(
                "Unterminated fragment, expecting {delimiter}"
            )));
        };
        *pos += 1;
        if token.eq_ignore_ascii_case(delimiter) {
            return Ok(value.trim().to_string());
        }
        value.push_str(token);
    }
}

/// Splits the argument list of `trim(...)` into operands, keeping quoted
/// literals whole. Consumes the closing parenthesis.
fn trim_operands(tokens: &[&str], pos: &mut usize) -> Result<Vec<String>> {
    let mut operands = Vec::new();
    let mut literal = String::new();
    let mut in_literal = false;
    loop {
        let Some(&token) = tokens.get(*pos) else {
            return Err(Error::Template("Unterminated trim function".to_string()));
        };
        *pos += 1;
        if token == "'" {
            literal.push('\'');
            in_literal = !in_literal;
            if !in_literal {
                operands.push(std::mem::take(&mut literal));
            }
        } else if in_literal {
            literal.push_str(token);
        } else if token == ")" {
            return Ok(operands);
        } else if !is_whitespace_token(token) {
            operands.push(token.to_string());
        }
    }
}

#[derive(Debug)]
struct TrimOperands {
    side: Option<String>,
    trim_char: Option<String>,
    from: Option<String>,
    source: String,
}

impl TrimOperands {
    fn from_operands(mut operands: Vec<String>) -> Result<Self> {
        let size = operands.len();
        if size == 0 || size > 4 {
            return Err(Error::Template(format!(
                "Unexpected number of trim function operands : {size}"
            )));
        }
        let source = operands.pop().unwrap_or_default();
        if size == 1 {
            return Ok(Self {
                side: None,
                trim_char: None,
                from: None,
                source,
            });
        }
        if size == 4 {
            let mut it = operands.into_iter();
            return Ok(Self {
                side: it.next(),
                trim_char: it.next(),
                from: it.next(),
                source,
            });
        }

        let from = operands.pop().unwrap_or_default();
        if !from.eq_ignore_ascii_case("from") {
            return Err(Error::Template(format!("Expecting FROM, found : {from}")));
        }
        let first = operands.pop();
        let (side, trim_char) = match first {
            Some(op)
                if ["leading", "trailing", "both"]
                    .iter()
                    .any(|s| op.eq_ignore_ascii_case(s)) =>
            {
                (Some(op), None)
            }
            other => (None, other),
        };
        Ok(Self {
            side,
            trim_char,
            from: Some(from),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(fragment: &str) -> String {
        render_where_string_template(
            fragment,
            TEMPLATE,
            Dialect::Generic,
            &FunctionRegistry::for_dialect(Dialect::Generic),
        )
        .unwrap()
    }

    #[test]
    fn test_qualifies_bare_columns() {
        assert_eq!(render("name = 'x'"), "$PlaceHolder$.name = 'x'");
        assert_eq!(
            render("a > 1 and b is not null"),
            "$PlaceHolder$.a > 1 and $PlaceHolder$.b is not null"
        );
    }

    #[test]
    fn test_leaves_literals_and_qualified_names() {
        assert_eq!(render("'a b' = x.y"), "'a b' = x.y");
        assert_eq!(render("status = :status"), "$PlaceHolder$.status = :status");
    }

    #[test]
    fn test_functions_not_qualified() {
        assert_eq!(render("upper(name)"), "upper($PlaceHolder$.name)");
        assert_eq!(render("current_date > due"), "current_date > $PlaceHolder$.due");
    }

    #[test]
    fn test_backtick_quoting() {
        let sql = render_where_string_template(
            "`order` = 1",
            "o",
            Dialect::SqlServer,
            &FunctionRegistry::new(),
        )
        .unwrap();
        assert_eq!(sql, "o.[order] = 1");
    }

    #[test]
    fn test_sub_select_tables_untouched() {
        assert_eq!(
            render("id in (select p.id from person p where p.age > age)"),
            "$PlaceHolder$.id in (select p.id from person p where p.age > $PlaceHolder$.age)"
        );
    }

    #[test]
    fn test_extract() {
        assert_eq!(
            render("extract(year from birth) = 1970"),
            "extract(year from $PlaceHolder$.birth) = 1970"
        );
    }

    #[test]
    fn test_trim_variants() {
        assert_eq!(render("trim(name)"), "trim($PlaceHolder$.name)");
        assert_eq!(
            render("trim(leading 'x' from name)"),
            "trim(leading 'x' from $PlaceHolder$.name)"
        );
        assert_eq!(render("trim(from name)"), "trim(from $PlaceHolder$.name)");
        assert_eq!(render("trim(both from name)"), "trim(both from $PlaceHolder$.name)");
    }

    #[test]
    fn test_trim_bad_operands() {
        let err = render_where_string_template(
            "trim(a b c)",
            TEMPLATE,
            Dialect::Generic,
            &FunctionRegistry::new(),
        );
        assert!(matches!(err, Err(Error::Template(_))));
    }

    #[test]
    fn test_unterminated_extract() {
        let err = render_where_string_template(
            "extract(year birth",
            TEMPLATE,
            Dialect::Generic,
            &FunctionRegistry::new(),
        );
        assert!(matches!(err, Err(Error::Template(_))));
    }

    #[test]
    fn test_order_by_keywords() {
        let sql = render_order_by_string_template(
            "name desc nulls last",
            TEMPLATE,
            Dialect::Generic,
            &FunctionRegistry::new(),
        )
        .unwrap();
        assert_eq!(sql, "$PlaceHolder$.name desc nulls last");
    }

    #[test]
    fn test_replace_placeholder() {
        assert_eq!(replace_placeholder("$PlaceHolder$.a = 1", "p1_0"), "p1_0.a = 1");
    }
}
