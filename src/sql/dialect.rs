//! SQL dialect detection and handling.

use super::case::{CaseFragment, CaseStyle};
use super::join::{AnsiJoinFragment, JoinFragment, OracleJoinFragment};
use super::lock::{LockMode, LockOptions};
use std::fmt;

/// SQL dialect variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dialect {
    /// Standard SQL
    #[default]
    Generic,
    /// PostgreSQL
    PostgreSQL,
    /// MySQL
    MySQL,
    /// H2
    H2,
    /// Oracle 9i and later (ANSI joins)
    Oracle,
    /// Oracle 8i (theta-style outer joins, `decode`)
    Oracle8i,
    /// Apache Derby
    Derby,
    /// Mckoi SQL
    Mckoi,
    /// Microsoft SQL Server
    SqlServer,
}

/// How outer joins are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStyle {
    Ansi,
    /// Cross joins plus `(+)` markers in the where clause.
    OracleTheta,
}

const ANSI_KEYWORDS: &[&str] = &[
    "all", "and", "any", "as", "asc", "between", "by", "case", "cast", "coalesce", "collate",
    "cross", "current", "current_date", "current_time", "current_timestamp", "default",
    "delete", "desc", "distinct", "else", "end", "escape", "except", "exists", "false", "fetch",
    "for", "from", "full", "group", "having", "in", "inner", "insert", "intersect", "into",
    "is", "join", "left", "like", "limit", "natural", "not", "null", "nullif", "of", "offset",
    "on", "or", "order", "outer", "right", "select", "set", "some", "then", "true", "union",
    "unique", "unknown", "update", "using", "values", "when", "where", "with",
];

impl Dialect {
    /// Parse dialect from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "generic" | "ansi" => Some(Self::Generic),
            "postgres" | "postgresql" => Some(Self::PostgreSQL),
            "mysql" | "mariadb" => Some(Self::MySQL),
            "h2" => Some(Self::H2),
            "oracle" => Some(Self::Oracle),
            "oracle8i" => Some(Self::Oracle8i),
            "derby" => Some(Self::Derby),
            "mckoi" => Some(Self::Mckoi),
            "sqlserver" | "mssql" => Some(Self::SqlServer),
            _ => None,
        }
    }

    /// Detect dialect from a JDBC connection URL.
    pub fn detect(url: &str) -> Self {
        let lower = url.to_lowercase();
        let Some(rest) = lower.strip_prefix("jdbc:") else {
            return Self::Generic;
        };

        if rest.starts_with("postgresql:") || rest.starts_with("pgsql:") {
            return Self::PostgreSQL;
        }
        if rest.starts_with("mysql:") || rest.starts_with("mariadb:") {
            return Self::MySQL;
        }
        if rest.starts_with("h2:") {
            return Self::H2;
        }
        if rest.starts_with("oracle:") {
            return Self::Oracle;
        }
        if rest.starts_with("derby:") {
            return Self::Derby;
        }
        if rest.starts_with("mckoi:") {
            return Self::Mckoi;
        }
        if rest.starts_with("sqlserver:") || rest.starts_with("jtds:sqlserver:") {
            return Self::SqlServer;
        }

        Self::Generic
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Generic => "GenericDialect",
            Self::PostgreSQL => "PostgreSQLDialect",
            Self::MySQL => "MySQLDialect",
            Self::H2 => "H2Dialect",
            Self::Oracle => "OracleDialect",
            Self::Oracle8i => "Oracle8iDialect",
            Self::Derby => "DerbyDialect",
            Self::Mckoi => "MckoiDialect",
            Self::SqlServer => "SQLServerDialect",
        }
    }

    pub fn open_quote(self) -> char {
        match self {
            Self::MySQL => '`',
            Self::SqlServer => '[',
            _ => '"',
        }
    }

    pub fn close_quote(self) -> char {
        match self {
            Self::MySQL => '`',
            Self::SqlServer => ']',
            _ => '"',
        }
    }

    /// Replaces back-tick quoting with the dialect's own quote characters.
    /// Unquoted names are returned unchanged.
    pub fn quote(self, name: &str) -> String {
        match name.strip_prefix('`') {
            Some(inner) => {
                let inner = inner.strip_suffix('`').unwrap_or(inner);
                format!("{}{}{}", self.open_quote(), inner, self.close_quote())
            }
            None => name.to_string(),
        }
    }

    /// Whether `lc_word` (lower case) is reserved in this dialect.
    pub fn is_keyword(self, lc_word: &str) -> bool {
        ANSI_KEYWORDS.contains(&lc_word) || self.extra_keywords().contains(&lc_word)
    }

    fn extra_keywords(self) -> &'static [&'static str] {
        match self {
            Self::PostgreSQL => &["ilike", "similar", "returning", "analyse", "analyze"],
            Self::MySQL => &["regexp", "rlike", "div", "xor", "straight_join"],
            Self::Oracle | Self::Oracle8i => &["rownum", "sysdate", "connect", "prior", "start", "minus"],
            Self::SqlServer => &["top", "nolock", "holdlock"],
            Self::H2 => &["rownum", "minus"],
            Self::Generic | Self::Derby | Self::Mckoi => &[],
        }
    }

    /// Functions callable without parentheses.
    pub fn no_paren_functions(self) -> &'static [&'static str] {
        match self {
            Self::Oracle | Self::Oracle8i => &[
                "current_date", "current_timestamp", "sysdate", "systimestamp", "user", "uid",
                "localtimestamp",
            ],
            Self::PostgreSQL => &[
                "current_date", "current_time", "current_timestamp", "localtime",
                "localtimestamp", "current_user", "session_user",
            ],
            Self::MySQL => &["current_date", "current_time", "current_timestamp", "localtime"],
            Self::SqlServer => &["current_timestamp", "current_user"],
            _ => &["current_date", "current_time", "current_timestamp"],
        }
    }

    /// Syntax for an INSERT without any column, if the dialect has one.
    pub fn no_columns_insert_string(self) -> Option<&'static str> {
        match self {
            Self::Generic | Self::Mckoi => Some("values ( )"),
            Self::PostgreSQL | Self::H2 | Self::SqlServer => Some("default values"),
            Self::MySQL => Some("() values ( )"),
            Self::Derby => Some("values (default)"),
            Self::Oracle | Self::Oracle8i => None,
        }
    }

    /// Value expression for an identity column in an INSERT; `None` means
    /// the column is omitted.
    pub fn identity_insert_string(self) -> Option<&'static str> {
        match self {
            Self::PostgreSQL | Self::H2 | Self::Derby => Some("default"),
            _ => None,
        }
    }

    pub fn supports_nowait(self) -> bool {
        matches!(
            self,
            Self::PostgreSQL | Self::MySQL | Self::Oracle | Self::Oracle8i
        )
    }

    pub fn supports_skip_locked(self) -> bool {
        matches!(self, Self::PostgreSQL | Self::MySQL | Self::Oracle)
    }

    pub fn supports_for_update_of(self) -> bool {
        matches!(self, Self::PostgreSQL | Self::Oracle | Self::Oracle8i)
    }

    /// Whether `for update of` lists columns (Oracle) rather than table
    /// aliases (PostgreSQL).
    pub fn for_update_of_uses_columns(self) -> bool {
        matches!(self, Self::Oracle | Self::Oracle8i)
    }

    fn write_lock_string(self) -> &'static str {
        match self {
            Self::SqlServer | Self::Mckoi => "",
            Self::Derby => " for update with rs",
            _ => " for update",
        }
    }

    fn read_lock_string(self) -> &'static str {
        match self {
            Self::PostgreSQL => " for share",
            Self::MySQL => " lock in share mode",
            Self::Derby => " for read only with rs",
            _ => self.write_lock_string(),
        }
    }

    /// Suffix appended to a SELECT to acquire the requested lock.
    pub fn for_update_string(self, lock: LockOptions) -> String {
        match lock.effective_mode() {
            LockMode::None | LockMode::Read | LockMode::Optimistic | LockMode::OptimisticForceIncrement => {
                String::new()
            }
            LockMode::PessimisticRead => self.read_lock_string().to_string(),
            LockMode::PessimisticWrite | LockMode::PessimisticForceIncrement => {
                self.write_lock_string().to_string()
            }
            LockMode::UpgradeNowait if self.supports_nowait() => {
                format!("{} nowait", self.write_lock_string())
            }
            LockMode::UpgradeSkipLocked if self.supports_skip_locked() => {
                format!("{} skip locked", self.write_lock_string())
            }
            LockMode::UpgradeNowait | LockMode::UpgradeSkipLocked => {
                self.write_lock_string().to_string()
            }
        }
    }

    /// `for update of <targets>`, falling back to a plain FOR UPDATE when
    /// the dialect has no OF clause.
    pub fn for_update_of_string(self, lock: LockOptions, targets: &str) -> String {
        let base = self.for_update_string(lock);
        if base.is_empty() || targets.is_empty() || !self.supports_for_update_of() {
            return base;
        }
        let write = self.write_lock_string();
        match base.strip_prefix(write) {
            Some(rest) => format!("{write} of {targets}{rest}"),
            None => base,
        }
    }

    /// Table-level lock hint (SQL Server); other dialects return the table
    /// expression unchanged.
    pub fn append_lock_hint(self, lock: LockOptions, table_with_alias: &str) -> String {
        if self != Self::SqlServer {
            return table_with_alias.to_string();
        }
        match lock.effective_mode() {
            LockMode::PessimisticRead => format!("{table_with_alias} with (holdlock, rowlock)"),
            LockMode::PessimisticWrite | LockMode::PessimisticForceIncrement => {
                format!("{table_with_alias} with (updlock, rowlock)")
            }
            LockMode::UpgradeNowait => format!("{table_with_alias} with (updlock, rowlock, nowait)"),
            LockMode::UpgradeSkipLocked => {
                format!("{table_with_alias} with (updlock, rowlock, readpast)")
            }
            _ => table_with_alias.to_string(),
        }
    }

    pub fn join_style(self) -> JoinStyle {
        match self {
            Self::Oracle8i => JoinStyle::OracleTheta,
            _ => JoinStyle::Ansi,
        }
    }

    pub fn create_outer_join_fragment(self) -> Box<dyn JoinFragment> {
        match self.join_style() {
            JoinStyle::Ansi => Box::new(AnsiJoinFragment::new()),
            JoinStyle::OracleTheta => Box::new(OracleJoinFragment::new()),
        }
    }

    pub fn case_style(self) -> CaseStyle {
        match self {
            Self::Derby => CaseStyle::Derby,
            Self::Oracle8i => CaseStyle::Decode,
            Self::Mckoi => CaseStyle::Mckoi,
            _ => CaseStyle::Ansi,
        }
    }

    pub fn create_case_fragment(self) -> CaseFragment {
        CaseFragment::new(self.case_style())
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
