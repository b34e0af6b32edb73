//! Navigable roles and the closed set of navigable kinds.

use super::attribute::Attribute;
use super::discriminator::DiscriminatorDescriptor;
use super::identifier::EntityIdentifier;
use super::natural_id::NaturalIdDescriptor;
use super::row_id::RowIdDescriptor;
use super::tenant::TenantDiscrimination;
use super::version::VersionDescriptor;
use crate::sql::ColumnReference;
use std::fmt;

pub const IDENTIFIER_NAME: &str = "{id}";
pub const DISCRIMINATOR_NAME: &str = "{discriminator}";
pub const ROW_ID_NAME: &str = "{rowId}";
pub const TENANT_NAME: &str = "{tenantId}";
pub const NATURAL_ID_NAME: &str = "{naturalId}";

/// Dotted path from an entity down to one of its parts, e.g.
/// `Person.address.city`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NavigableRole {
    full_path: String,
}

impl NavigableRole {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            full_path: root.into(),
        }
    }

    pub fn append(&self, name: &str) -> Self {
        Self {
            full_path: format!("{}.{}", self.full_path, name),
        }
    }

    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    pub fn navigable_name(&self) -> &str {
        self.full_path
            .rsplit_once('.')
            .map_or(self.full_path.as_str(), |(_, name)| name)
    }

    pub fn parent(&self) -> Option<Self> {
        self.full_path
            .rsplit_once('.')
            .map(|(parent, _)| Self::new(parent))
    }
}

impl fmt::Display for NavigableRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_path)
    }
}

/// Columns a navigable contributes to a domain query's select list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    pub role: NavigableRole,
    pub columns: Vec<ColumnReference>,
}

#[derive(Debug, Clone, Copy)]
pub enum Navigable<'a> {
    Identifier(&'a EntityIdentifier),
    Discriminator(&'a DiscriminatorDescriptor),
    Version(&'a VersionDescriptor),
    RowId(&'a RowIdDescriptor),
    NaturalId(&'a NaturalIdDescriptor),
    Tenant(&'a TenantDiscrimination),
    Attribute(&'a Attribute),
}

impl Navigable<'_> {
    pub fn role(&self) -> &NavigableRole {
        match self {
            Self::Identifier(n) => n.role(),
            Self::Discriminator(n) => &n.role,
            Self::Version(n) => &n.attribute().role,
            Self::RowId(n) => &n.role,
            Self::NaturalId(n) => n.role(),
            Self::Tenant(n) => &n.role,
            Self::Attribute(n) => &n.role,
        }
    }
}

pub trait NavigableVisitor {
    fn visit(&mut self, navigable: Navigable<'_>);
}

impl<F> NavigableVisitor for F
where
    F: FnMut(Navigable<'_>),
{
    fn visit(&mut self, navigable: Navigable<'_>) {
        self(navigable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_paths() {
        let role = NavigableRole::new("Person").append("address").append("city");
        assert_eq!(role.full_path(), "Person.address.city");
        assert_eq!(role.navigable_name(), "city");
        assert_eq!(role.parent().unwrap().full_path(), "Person.address");
        assert_eq!(NavigableRole::new("Person").navigable_name(), "Person");
    }

    #[test]
    fn test_reserved_names_are_not_column_like() {
        for name in [IDENTIFIER_NAME, DISCRIMINATOR_NAME, ROW_ID_NAME, TENANT_NAME, NATURAL_ID_NAME] {
            assert!(name.starts_with('{') && name.ends_with('}'));
        }
    }
}
