//! Turns boot mappings into runtime columns and attributes.

use super::attribute::{Attribute, AttributeKind, EmbeddableType};
use super::navigable::NavigableRole;
use super::table::Column;
use crate::boot::{ColumnSource, EmbeddableMapping, PropertyMapping, ValueMapping};
use crate::error::{Error, Result};
use crate::sql::{Dialect, map_type};
use crate::types::{SqlExpressableType, SqlTypeCode};

/// Shared state for one runtime-model build.
#[derive(Debug, Clone, Copy)]
pub struct CreationContext {
    pub dialect: Dialect,
}

impl CreationContext {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn column(&self, source: &ColumnSource, default_table: &str) -> Column {
        let table = source.table.as_deref().unwrap_or(default_table);
        let sql_type = source
            .sql_type
            .as_deref()
            .map(|declared| map_type(declared, self.dialect))
            .or_else(|| source.domain.default_sql_type())
            .unwrap_or(SqlTypeCode::Other);
        let ty = SqlExpressableType::new(source.domain.clone(), sql_type);
        let mut column = match &source.formula {
            Some(expression) => Column::derived(table, expression.clone(), ty),
            None => Column::new(table, source.name.clone(), ty),
        };
        column.nullable = source.nullable;
        column
    }

    pub fn attribute(
        &self,
        property: &PropertyMapping,
        owner: &NavigableRole,
        position: usize,
        default_table: &str,
    ) -> Result<Attribute> {
        let role = owner.append(&property.name);
        let kind = match &property.value {
            ValueMapping::Basic(source) => AttributeKind::Basic {
                column: self.column(source, default_table),
            },
            ValueMapping::Embedded(mapping) => {
                AttributeKind::Embedded(self.embeddable(mapping, &role, default_table)?)
            }
            ValueMapping::ManyToOne {
                target_entity,
                columns,
            } => {
                if columns.is_empty() {
                    return Err(Error::modeling(format!("to-one attribute {role} maps no columns")));
                }
                AttributeKind::ToOne {
                    target_entity: target_entity.clone(),
                    columns: columns.iter().map(|c| self.column(c, default_table)).collect(),
                }
            }
            ValueMapping::Collection { role } => AttributeKind::Collection { role: role.clone() },
        };
        let mut attribute = Attribute::new(role, position, kind);
        attribute.insertable = property.insertable;
        attribute.updatable = property.updatable;
        attribute.include_in_dirty_check = property.updatable;
        attribute.versionable = property.optimistic_locked;
        attribute.natural_id = property.natural_id;
        attribute.lazy = property.lazy;
        attribute.nullable = property.optional;
        Ok(attribute)
    }

    pub fn embeddable(
        &self,
        mapping: &EmbeddableMapping,
        role: &NavigableRole,
        default_table: &str,
    ) -> Result<EmbeddableType> {
        let attributes = mapping
            .properties
            .iter()
            .enumerate()
            .map(|(i, p)| self.attribute(p, role, i, default_table))
            .collect::<Result<Vec<_>>>()?;
        Ok(EmbeddableType {
            name: mapping.name.clone(),
            attributes,
        })
    }
}
