//! Runtime settings, read from `relmap.*` properties.

use crate::error::{Error, Result};
use crate::session::CacheMode;
use crate::sql::{Dialect, ParameterMarkerStyle};

const PREFIX: &str = "relmap.";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub dialect: Dialect,
    pub parameter_markers: ParameterMarkerStyle,
    /// Prefix statements with a `/* ... */` comment naming the operation.
    pub use_sql_comments: bool,
    pub generate_statistics: bool,
    /// Treat every secondary table as nullable.
    pub jpa_cache_compliance: bool,
    pub cache_mode: CacheMode,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dialect: Dialect::Generic,
            parameter_markers: ParameterMarkerStyle::Jdbc,
            use_sql_comments: false,
            generate_statistics: false,
            jpa_cache_compliance: false,
            cache_mode: CacheMode::Normal,
        }
    }
}

impl Settings {
    /// Applies `relmap.*` properties over the defaults. Keys outside the
    /// `relmap.` namespace are ignored; unknown keys inside it are an error.
    ///
    /// An explicit `relmap.dialect` wins over one detected from
    /// `relmap.jdbc_url`.
    pub fn from_properties<K, V>(properties: impl IntoIterator<Item = (K, V)>) -> Result<Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut settings = Self::default();
        let mut explicit_dialect = false;
        for (key, value) in properties {
            let key = key.as_ref().trim();
            let value = value.as_ref().trim();
            let Some(name) = key.strip_prefix(PREFIX) else {
                continue;
            };
            match name {
                "dialect" => {
                    settings.dialect = Dialect::from_str(value)
                        .ok_or_else(|| invalid(key, value))?;
                    explicit_dialect = true;
                }
                "jdbc_url" => {
                    if !explicit_dialect {
                        settings.dialect = Dialect::detect(value);
                    }
                }
                "parameter_markers" => {
                    settings.parameter_markers =
                        ParameterMarkerStyle::from_str(value).ok_or_else(|| invalid(key, value))?;
                }
                "use_sql_comments" => settings.use_sql_comments = parse_bool(key, value)?,
                "generate_statistics" => settings.generate_statistics = parse_bool(key, value)?,
                "jpa.cache_compliance" => settings.jpa_cache_compliance = parse_bool(key, value)?,
                "cache_mode" => {
                    settings.cache_mode = CacheMode::from_str(value).ok_or_else(|| invalid(key, value))?;
                }
                _ => return Err(Error::Config(format!("unknown setting `{key}`"))),
            }
        }
        tracing::debug!(?settings, "settings resolved");
        Ok(settings)
    }
}

fn invalid(key: &str, value: &str) -> Error {
    Error::Config(format!("invalid value `{value}` for `{key}`"))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}
