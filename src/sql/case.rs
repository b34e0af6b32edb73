//! "First non-null branch wins" conditionals, per dialect.
//!
//! Used to synthesize a discriminator-like column across the tables of a
//! joined-subclass hierarchy: whichever subclass table has a row decides
//! the concrete type.

use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaseStyle {
    /// `case when c is not null then v ... end`
    #[default]
    Ansi,
    /// ANSI with `else -1`; Derby requires type-homogeneous branches.
    Derby,
    /// Oracle 8i `decode(...)`
    Decode,
    /// Mckoi nested `if(...)`
    Mckoi,
}

#[derive(Debug, Clone, Default)]
pub struct CaseFragment {
    style: CaseStyle,
    return_column_name: Option<String>,
    cases: IndexMap<String, String>,
}

impl CaseFragment {
    pub fn new(style: CaseStyle) -> Self {
        Self {
            style,
            ..Self::default()
        }
    }

    pub fn set_return_column_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.return_column_name = Some(name.into());
        self
    }

    pub fn set_return_column_name_with_suffix(&mut self, name: &str, suffix: &str) -> &mut Self {
        self.set_return_column_name(format!("{name}{suffix}"))
    }

    pub fn add_when_column_not_null(
        &mut self,
        alias: &str,
        column: &str,
        value: impl Into<String>,
    ) -> &mut Self {
        self.cases.insert(qualify(alias, column), value.into());
        self
    }

    pub fn to_fragment_string(&self) -> String {
        let mut buf = match self.style {
            CaseStyle::Ansi | CaseStyle::Derby => self.render_case(),
            CaseStyle::Decode => self.render_decode(),
            CaseStyle::Mckoi => self.render_mckoi(),
        };
        if let Some(name) = &self.return_column_name {
            buf.push_str(" as ");
            buf.push_str(name);
        }
        buf
    }

    fn render_case(&self) -> String {
        let mut buf = String::with_capacity(self.cases.len() * 15 + 10);
        buf.push_str("case");
        for (column, value) in &self.cases {
            buf.push_str(&format!(" when {column} is not null then {value}"));
        }
        if self.style == CaseStyle::Derby {
            buf.push_str(" else -1");
        }
        buf.push_str(" end");
        buf
    }

    // decode(<last column>, c1, v1, ..., <last value>)
    fn render_decode(&self) -> String {
        let mut args = Vec::with_capacity(self.cases.len() * 2 + 1);
        if let Some((last_column, _)) = self.cases.last() {
            args.push(last_column.clone());
        }
        let count = self.cases.len();
        for (i, (column, value)) in self.cases.iter().enumerate() {
            if i + 1 < count {
                args.push(column.clone());
            }
            args.push(value.clone());
        }
        format!("decode({})", args.join(", "))
    }

    fn render_mckoi(&self) -> String {
        let mut buf = String::with_capacity(self.cases.len() * 15 + 10);
        for (column, value) in &self.cases {
            buf.push_str(&format!(" if({column} is not null, {value}, "));
        }
        buf.push_str("null");
        buf.push_str(&")".repeat(self.cases.len()));
        buf
    }
}

pub(crate) fn qualify(alias: &str, column: &str) -> String {
    if alias.is_empty() {
        column.to_string()
    } else {
        format!("{alias}.{column}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(style: CaseStyle) -> CaseFragment {
        let mut case = CaseFragment::new(style);
        case.add_when_column_not_null("c1_1", "id", "1")
            .add_when_column_not_null("c1_2", "id", "2")
            .set_return_column_name("clazz_");
        case
    }

    #[test]
    fn test_ansi_case() {
        assert_eq!(
            fragment(CaseStyle::Ansi).to_fragment_string(),
            "case when c1_1.id is not null then 1 when c1_2.id is not null then 2 end as clazz_"
        );
    }

    #[test]
    fn test_derby_case_has_else() {
        assert_eq!(
            fragment(CaseStyle::Derby).to_fragment_string(),
            "case when c1_1.id is not null then 1 when c1_2.id is not null then 2 else -1 end as clazz_"
        );
    }

    #[test]
    fn test_decode() {
        assert_eq!(
            fragment(CaseStyle::Decode).to_fragment_string(),
            "decode(c1_2.id, c1_1.id, 1, 2) as clazz_"
        );
    }

    #[test]
    fn test_mckoi() {
        assert_eq!(
            fragment(CaseStyle::Mckoi).to_fragment_string(),
            " if(c1_1.id is not null, 1,  if(c1_2.id is not null, 2, null)) as clazz_"
        );
    }
}
