//! Discriminator-based multi-tenancy.

use super::navigable::NavigableRole;
use super::table::Column;
use crate::error::{Error, Result};
use crate::types::Value;

/// Tenant column written on insert and used to restrict every read.
#[derive(Debug, Clone, PartialEq)]
pub struct TenantDiscrimination {
    pub role: NavigableRole,
    pub column: Column,
}

impl TenantDiscrimination {
    pub fn unresolve(&self, tenant: Option<&str>) -> Result<Value> {
        tenant.map(Value::text).ok_or_else(|| {
            Error::modeling(format!(
                "{} is tenant-discriminated but no tenant identifier was supplied",
                self.role.parent().unwrap_or_else(|| self.role.clone())
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::navigable::TENANT_NAME;
    use crate::types::{DomainType, SqlExpressableType};

    #[test]
    fn test_tenant_required() {
        let tenant = TenantDiscrimination {
            role: NavigableRole::new("Person").append(TENANT_NAME),
            column: Column::new("person", "tenant_id", SqlExpressableType::of(DomainType::String)),
        };
        assert_eq!(tenant.unresolve(Some("acme")).unwrap(), Value::text("acme"));
        let err = tenant.unresolve(None).unwrap_err();
        assert!(err.to_string().contains("Person"));
    }
}
