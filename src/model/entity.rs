//! Per-entity descriptors: the state array layout and the tables an entity
//! is spread over.
//!
//! State array order is fixed per entity: the root's properties, the
//! version, the root's secondary-table properties, then every subclass
//! level's own properties followed by its own secondary-table properties.
//! A subclass therefore shares its ancestors' prefix of the array.
//!
//! Table order is the inheritance chain first (root or union table, then
//! each joined-subclass table, root to leaf), then the secondary tables.

use super::attribute::{Attribute, Clause};
use super::context::CreationContext;
use super::hierarchy::EntityHierarchyBuilder;
use super::navigable::{Navigable, NavigableRole, NavigableVisitor};
use super::table::{Column, EntityTable, ForeignKey, TableKind};
use crate::boot::{JoinMapping, PropertyMapping, RootClassMapping, SubclassKind, SubclassMapping};
use crate::error::{Error, Result};
use crate::types::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct EntityDescriptor {
    name: String,
    role: NavigableRole,
    root_name: String,
    super_name: Option<String>,
    subclass_names: Vec<String>,
    tables: Vec<EntityTable>,
    attributes: Vec<Attribute>,
    version_position: Option<usize>,
    tenant_column: Option<Column>,
    dynamic_insert: bool,
    dynamic_update: bool,
}

impl EntityDescriptor {
    /// Descriptors for the whole hierarchy of `mapping`, root first, then
    /// every subclass depth-first.
    pub fn build_tree(
        mapping: &RootClassMapping,
        ctx: &CreationContext,
        hierarchy: &EntityHierarchyBuilder,
    ) -> Result<Vec<Self>> {
        let mut out = vec![Self::root(mapping, ctx, hierarchy)?];
        for subclass in &mapping.subclasses {
            let subtree = Self::subclass_tree(&out[0], subclass, ctx)?;
            out.extend(subtree);
        }
        out[0].subclass_names = out[1..].iter().map(|d| d.name.clone()).collect();
        Ok(out)
    }

    fn subclass_tree(
        parent: &Self,
        mapping: &SubclassMapping,
        ctx: &CreationContext,
    ) -> Result<Vec<Self>> {
        let mut out = vec![Self::subclass(parent, mapping, ctx)?];
        for subclass in &mapping.subclasses {
            let subtree = Self::subclass_tree(&out[0], subclass, ctx)?;
            out.extend(subtree);
        }
        out[0].subclass_names = out[1..].iter().map(|d| d.name.clone()).collect();
        Ok(out)
    }

    fn root(
        mapping: &RootClassMapping,
        ctx: &CreationContext,
        hierarchy: &EntityHierarchyBuilder,
    ) -> Result<Self> {
        let role = NavigableRole::new(&mapping.entity_name);
        let id_columns: Vec<Column> = hierarchy.identifier().columns().into_iter().cloned().collect();

        let mut primary = EntityTable::new(&mapping.table, TableKind::Primary, id_columns.clone());
        primary.row_id = mapping.row_id.clone();

        let mut descriptor = Self {
            name: mapping.entity_name.clone(),
            role,
            root_name: mapping.entity_name.clone(),
            super_name: None,
            subclass_names: Vec::new(),
            tables: vec![primary],
            attributes: Vec::new(),
            version_position: None,
            tenant_column: mapping
                .tenant_column
                .as_ref()
                .map(|source| ctx.column(source, &mapping.table)),
            dynamic_insert: mapping.dynamic_insert,
            dynamic_update: mapping.dynamic_update,
        };
        descriptor.add_properties(&mapping.properties, ctx, &mapping.table)?;
        if let Some(version) = hierarchy.version() {
            if version.position() != descriptor.attributes.len() {
                return Err(Error::modeling(format!(
                    "version of {} expected at state position {}",
                    mapping.entity_name,
                    descriptor.attributes.len()
                )));
            }
            descriptor.version_position = Some(version.position());
            descriptor.attributes.push(version.attribute().clone());
        }
        descriptor.add_joins(&mapping.joins, ctx, &id_columns)?;
        Ok(descriptor)
    }

    fn subclass(parent: &Self, mapping: &SubclassMapping, ctx: &CreationContext) -> Result<Self> {
        let mut descriptor = Self {
            name: mapping.entity_name.clone(),
            role: NavigableRole::new(&mapping.entity_name),
            root_name: parent.root_name.clone(),
            super_name: Some(parent.name.clone()),
            subclass_names: Vec::new(),
            tables: parent.tables.clone(),
            attributes: parent.attributes.clone(),
            version_position: parent.version_position,
            tenant_column: parent.tenant_column.clone(),
            dynamic_insert: mapping.dynamic_insert,
            dynamic_update: mapping.dynamic_update,
        };
        let key_columns = parent.primary_table().key_columns.clone();

        let own_table = match &mapping.kind {
            SubclassKind::SingleTable => parent.own_table_name().to_string(),
            SubclassKind::Joined { table, key_columns: names } => {
                let keys = key_columns_for(table, names, &key_columns)?;
                let position = descriptor.tables.iter().take_while(|t| !t.is_secondary()).count();
                descriptor
                    .tables
                    .insert(position, EntityTable::new(table, TableKind::JoinedSubclass, keys));
                table.clone()
            }
            SubclassKind::Union { table } => {
                if parent.tables.iter().any(|t| t.kind == TableKind::JoinedSubclass) {
                    return Err(Error::modeling(format!(
                        "union subclass {} cannot extend a joined subclass",
                        mapping.entity_name
                    )));
                }
                descriptor.rebind_primary(table);
                table.clone()
            }
        };
        descriptor.add_properties(&mapping.properties, ctx, &own_table)?;
        descriptor.add_joins(&mapping.joins, ctx, &key_columns)?;
        Ok(descriptor)
    }

    /// Moves everything mapped to the primary table onto `table`.
    fn rebind_primary(&mut self, table: &str) {
        let from = self.primary_table().name.clone();
        let primary = &mut self.tables[0];
        primary.name = table.to_string();
        primary.key_columns = primary.key_columns.iter().map(|c| c.rebind(table)).collect();
        primary.row_id = None;
        self.attributes = self
            .attributes
            .iter()
            .map(|a| a.rebind(&from, table))
            .collect();
        if let Some(tenant) = &mut self.tenant_column {
            if tenant.belongs_to(&from) {
                *tenant = tenant.rebind(table);
            }
        }
    }

    fn add_properties(
        &mut self,
        properties: &[PropertyMapping],
        ctx: &CreationContext,
        table: &str,
    ) -> Result<()> {
        for property in properties {
            let attribute = ctx.attribute(property, &self.role, self.attributes.len(), table)?;
            self.attributes.push(attribute);
        }
        Ok(())
    }

    fn add_joins(
        &mut self,
        joins: &[JoinMapping],
        ctx: &CreationContext,
        id_columns: &[Column],
    ) -> Result<()> {
        for join in joins {
            let keys = key_columns_for(&join.table, &join.key_columns, id_columns)?;
            let mut table = EntityTable::new(
                &join.table,
                TableKind::Secondary {
                    optional: join.optional,
                    inverse: join.inverse,
                },
                keys,
            );
            table.update_check = join.update_check;
            self.tables.push(table);
            self.add_properties(&join.properties, ctx, &join.table)?;
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> &NavigableRole {
        &self.role
    }

    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    pub fn is_root(&self) -> bool {
        self.super_name.is_none()
    }

    pub fn super_name(&self) -> Option<&str> {
        self.super_name.as_deref()
    }

    /// Every descendant, depth-first.
    pub fn subclass_names(&self) -> &[String] {
        &self.subclass_names
    }

    pub fn tables(&self) -> &[EntityTable] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&EntityTable> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// The root table, or the union subclass's own table.
    pub fn primary_table(&self) -> &EntityTable {
        &self.tables[0]
    }

    /// Inheritance chain tables, root to leaf.
    pub fn chain_tables(&self) -> impl Iterator<Item = &EntityTable> {
        self.tables.iter().filter(|t| !t.is_secondary())
    }

    pub fn secondary_tables(&self) -> impl Iterator<Item = &EntityTable> {
        self.tables.iter().filter(|t| t.is_secondary())
    }

    /// The table this entity's own properties go to.
    pub fn own_table_name(&self) -> &str {
        self.chain_tables()
            .last()
            .map_or(self.primary_table().name.as_str(), |t| t.name.as_str())
    }

    /// Foreign key from `table`'s key columns to the primary table's.
    pub fn key_of(&self, table: &EntityTable) -> Result<ForeignKey> {
        ForeignKey::new(&table.key_columns, &self.primary_table().key_columns)
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn state_len(&self) -> usize {
        self.attributes.len()
    }

    pub fn version_position(&self) -> Option<usize> {
        self.version_position
    }

    /// The version column as bound for this entity's tables.
    pub fn version_column(&self) -> Option<&Column> {
        let attribute = self.attributes.get(self.version_position?)?;
        attribute.columns().into_iter().next()
    }

    pub fn tenant_column(&self) -> Option<&Column> {
        self.tenant_column.as_ref()
    }

    pub fn is_dynamic_insert(&self) -> bool {
        self.dynamic_insert
    }

    pub fn is_dynamic_update(&self) -> bool {
        self.dynamic_update
    }

    pub fn versionability(&self) -> Vec<bool> {
        self.attributes.iter().map(|a| a.versionable).collect()
    }

    pub fn check_state(&self, state: &[Value]) -> Result<()> {
        if state.len() != self.attributes.len() {
            return Err(Error::modeling(format!(
                "{} has {} state slots, got {}",
                self.name,
                self.attributes.len(),
                state.len()
            )));
        }
        Ok(())
    }

    /// Whether every stored column of `table` is null in `state`.
    pub fn is_all_null(&self, state: &[Value], table: &str) -> Result<bool> {
        let mut values = Vec::new();
        for attribute in self.attributes.iter().filter(|a| a.has_column_in(table)) {
            let value = state.get(attribute.position).unwrap_or(&Value::Null);
            attribute.dehydrate(value, Clause::Where, &mut values)?;
        }
        Ok(values
            .iter()
            .filter(|v| v.column.belongs_to(table) && !v.column.is_derived())
            .all(|v| v.value.is_null()))
    }

    pub fn visit_navigables(&self, visitor: &mut dyn NavigableVisitor) {
        for attribute in &self.attributes {
            visitor.visit(Navigable::Attribute(attribute));
        }
    }
}

fn key_columns_for(table: &str, names: &[String], id_columns: &[Column]) -> Result<Vec<Column>> {
    if names.is_empty() {
        return Ok(id_columns.iter().map(|c| c.rebind(table)).collect());
    }
    if names.len() != id_columns.len() {
        return Err(Error::modeling(format!(
            "table {table} declares {} key columns, the identifier has {}",
            names.len(),
            id_columns.len()
        )));
    }
    Ok(names
        .iter()
        .zip(id_columns)
        .map(|(name, id)| Column::new(table, name.clone(), id.expressable.clone()).not_null())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boot::{ColumnSource, GeneratorMapping, IdentifierMapping};
    use crate::sql::Dialect;
    use crate::types::DomainType;

    fn build(mapping: &RootClassMapping) -> Vec<EntityDescriptor> {
        let ctx = CreationContext::new(Dialect::Generic);
        let builder = EntityHierarchyBuilder::from_boot(mapping, &ctx, None).unwrap();
        EntityDescriptor::build_tree(mapping, &ctx, &builder).unwrap()
    }

    fn person() -> RootClassMapping {
        RootClassMapping::new(
            "Person",
            "person",
            IdentifierMapping::simple(
                PropertyMapping::basic("id", ColumnSource::new("ID", DomainType::Long)),
                GeneratorMapping::Assigned,
            ),
        )
        .with_property(PropertyMapping::basic("name", ColumnSource::new("name", DomainType::String)))
        .with_version(PropertyMapping::basic("ver", ColumnSource::new("ver", DomainType::Integer)))
        .with_join(
            JoinMapping::new("person_detail", vec!["person_id".to_string()])
                .optional()
                .with_property(PropertyMapping::basic(
                    "bio",
                    ColumnSource::new("bio", DomainType::String),
                )),
        )
    }

    #[test]
    fn test_root_state_layout() {
        let descriptors = build(&person());
        let root = &descriptors[0];
        let names: Vec<&str> = root.attributes().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["name", "ver", "bio"]);
        assert_eq!(root.version_position(), Some(1));
        assert_eq!(root.version_column().unwrap().name, "ver");
        assert!(root.attribute("bio").unwrap().has_column_in("person_detail"));
        let tables: Vec<&str> = root.tables().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tables, vec!["person", "person_detail"]);
        assert_eq!(root.tables()[1].key_column_names(), vec!["person_id"]);
    }

    #[test]
    fn test_joined_subclass_table_goes_before_secondaries() {
        let mapping = person().with_subclass(
            SubclassMapping::new(
                "Employee",
                SubclassKind::Joined {
                    table: "employee".to_string(),
                    key_columns: vec!["person_id".to_string()],
                },
            )
            .with_property(PropertyMapping::basic(
                "salary",
                ColumnSource::new("salary", DomainType::Long),
            )),
        );
        let descriptors = build(&mapping);
        assert_eq!(descriptors[0].subclass_names(), &["Employee".to_string()]);
        let employee = &descriptors[1];
        let tables: Vec<&str> = employee.tables().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tables, vec!["person", "employee", "person_detail"]);
        assert_eq!(employee.own_table_name(), "employee");
        assert_eq!(employee.attribute("salary").unwrap().position, 3);
        assert_eq!(employee.super_name(), Some("Person"));
        let key = employee.key_of(&employee.tables()[1]).unwrap();
        assert_eq!(key.target_columns()[0].name, "ID");
    }

    #[test]
    fn test_union_subclass_rebinds_inherited_columns() {
        let mapping = person().with_subclass(SubclassMapping::new(
            "Customer",
            SubclassKind::Union {
                table: "customer".to_string(),
            },
        ));
        let descriptors = build(&mapping);
        let customer = &descriptors[1];
        assert_eq!(customer.primary_table().name, "customer");
        assert!(customer.attribute("name").unwrap().has_column_in("customer"));
        assert_eq!(customer.version_column().unwrap().table, "customer");
        assert!(customer.attribute("bio").unwrap().has_column_in("person_detail"));
    }

    #[test]
    fn test_key_arity_is_checked() {
        let mapping = person().with_join(JoinMapping::new(
            "person_extra",
            vec!["a".to_string(), "b".to_string()],
        ));
        let ctx = CreationContext::new(Dialect::Generic);
        let builder = EntityHierarchyBuilder::from_boot(&mapping, &ctx, None).unwrap();
        assert!(EntityDescriptor::build_tree(&mapping, &ctx, &builder).is_err());
    }

    #[test]
    fn test_is_all_null_per_table() {
        let descriptors = build(&person());
        let root = &descriptors[0];
        let state = vec![Value::text("Ann"), Value::Integer(0), Value::Null];
        assert!(root.is_all_null(&state, "person_detail").unwrap());
        assert!(!root.is_all_null(&state, "person").unwrap());
    }
}
