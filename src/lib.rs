pub mod boot;
pub mod cache;
pub mod error;
pub mod jdbc;
pub mod model;
pub mod persister;
pub mod runtime;
pub mod session;
pub mod settings;
pub mod sql;
pub mod stats;
pub mod table_group;
pub mod types;

use wasm_bindgen::prelude::*;

pub use error::{Error, Result};
pub use persister::{DeleteRequest, EntityPersister, LoadedEntity, UpdateRequest};
pub use runtime::RuntimeModel;
pub use session::{CacheMode, ExecutionContext};
pub use settings::Settings;
pub use types::Value;

use sql::{
    Dialect, FunctionRegistry, TEMPLATE, render_order_by_string_template,
    render_where_string_template,
};

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

/// Qualifies every bare column of a hand-written SQL fragment with
/// `alias`. Without an alias the `$PlaceHolder$` marker is kept.
pub fn qualify_fragment(
    fragment: &str,
    alias: Option<&str>,
    dialect: Dialect,
    order_by: bool,
) -> Result<String> {
    let placeholder = alias.unwrap_or(TEMPLATE);
    let functions = FunctionRegistry::for_dialect(dialect);
    if order_by {
        render_order_by_string_template(fragment, placeholder, dialect, &functions)
    } else {
        render_where_string_template(fragment, placeholder, dialect, &functions)
    }
}

/// Qualify a `where` fragment with a table alias
#[wasm_bindgen(js_name = "qualifyFragment")]
pub fn qualify_fragment_js(
    fragment: &str,
    alias: Option<String>,
    dialect: Option<String>,
) -> Result<String, String> {
    let dialect = match dialect.as_deref() {
        Some(name) => Dialect::from_str(name).ok_or_else(|| format!("Unknown dialect: {name}"))?,
        None => Dialect::Generic,
    };
    qualify_fragment(fragment, alias.as_deref(), dialect, false).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualify_fragment() {
        let sql = qualify_fragment("active = 1 and upper(name) = 'X'", Some("p"), Dialect::Generic, false)
            .unwrap();
        assert_eq!(sql, "p.active = 1 and upper(p.name) = 'X'");
        assert_eq!(
            qualify_fragment("name = 'x'", None, Dialect::Generic, false).unwrap(),
            "$PlaceHolder$.name = 'x'"
        );
    }

    #[test]
    fn test_qualify_fragment_js_rejects_unknown_dialect() {
        let err = qualify_fragment_js("a = 1", None, Some("db9".to_string())).unwrap_err();
        assert_eq!(err, "Unknown dialect: db9");
        assert_eq!(
            qualify_fragment_js("a = 1", Some("t".to_string()), Some("h2".to_string())).unwrap(),
            "t.a = 1"
        );
    }
}
