//! Parameter marker strategies.

/// How bind positions are written in rendered SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterMarkerStyle {
    /// JDBC style `?`.
    #[default]
    Jdbc,
    /// Native ordinal markers `$1`, `$2`, ...
    Ordinal,
}

impl ParameterMarkerStyle {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "jdbc" | "?" => Some(Self::Jdbc),
            "ordinal" | "native" | "$" => Some(Self::Ordinal),
            _ => None,
        }
    }

    /// Marker for the 1-based `position`.
    pub fn marker(self, position: usize) -> String {
        match self {
            Self::Jdbc => "?".to_string(),
            Self::Ordinal => format!("${position}"),
        }
    }

    /// Rewrites every `?` outside string literals and quoted identifiers,
    /// numbering them in order of appearance.
    pub fn apply(self, sql: &str) -> String {
        if self == Self::Jdbc {
            return sql.to_string();
        }
        let mut out = String::with_capacity(sql.len() + 8);
        let mut position = 0;
        let mut quote: Option<char> = None;
        for c in sql.chars() {
            match (quote, c) {
                (None, '\'' | '"') => {
                    quote = Some(c);
                    out.push(c);
                }
                (Some(q), _) if c == q => {
                    quote = None;
                    out.push(c);
                }
                (None, '?') => {
                    position += 1;
                    out.push_str(&self.marker(position));
                }
                _ => out.push(c),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jdbc_is_identity() {
        let sql = "update t set a=? where id=?";
        assert_eq!(ParameterMarkerStyle::Jdbc.apply(sql), sql);
    }

    #[test]
    fn test_ordinal_numbering_skips_literals() {
        assert_eq!(
            ParameterMarkerStyle::Ordinal.apply("select * from t where a=? and b='?' and c=?"),
            "select * from t where a=$1 and b='?' and c=$2"
        );
    }

    #[test]
    fn test_parse_style() {
        assert_eq!(ParameterMarkerStyle::from_str("Ordinal"), Some(ParameterMarkerStyle::Ordinal));
        assert_eq!(ParameterMarkerStyle::from_str("named"), None);
    }
}
