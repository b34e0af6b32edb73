//! Column/type binding: domain values, SQL type codes and the binders that
//! move values across the JDBC boundary.

mod binder;
mod domain;
mod sql_type;
mod value;

pub use binder::{BasicBinder, SqlExpressableType, ValueBinder, ValueExtractor};
pub use domain::{DomainType, Mutability, VersionSupport};
pub use sql_type::SqlTypeCode;
pub use value::{EmbeddableValue, EntityRef, Value};
