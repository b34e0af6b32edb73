//! Table groups: the aliased tables that back one entity reference in a
//! query, and the predicates joining them.

use crate::error::{Error, Result};
use crate::model::{
    Attribute, AttributeKind, Column, EntityDescriptor, EntityTable, ForeignKey, NavigableRole,
    TableKind,
};
use crate::sql::{
    ColumnReference, ComparisonOperator, Dialect, Expression, FunctionRegistry, JoinType,
    JunctionKind, LockOptions, Predicate, Select, TEMPLATE, render_where_string_template,
    replace_placeholder,
};
use std::collections::HashMap;

/// Hands out `p1_0`-style aliases: first letter of the table, then a
/// per-letter sequence.
#[derive(Debug, Default)]
pub struct AliasGenerator {
    counters: HashMap<char, usize>,
}

impl AliasGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self, table: &str) -> String {
        let stem = table.rsplit('.').next().unwrap_or(table);
        let letter = stem
            .chars()
            .find(|c| c.is_ascii_alphabetic())
            .map_or('t', |c| c.to_ascii_lowercase());
        let counter = self.counters.entry(letter).or_insert(0);
        *counter += 1;
        format!("{letter}{counter}_0")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableReference {
    pub table: String,
    pub alias: String,
    /// A row may be absent (outer joined).
    pub optional: bool,
}

impl TableReference {
    pub fn new(table: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            alias: alias.into(),
            optional: false,
        }
    }

    pub fn column(&self, name: &str) -> ColumnReference {
        ColumnReference::new(&self.alias, name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableReferenceJoin {
    pub join_type: JoinType,
    pub reference: TableReference,
    pub predicate: Predicate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableGroup {
    role: NavigableRole,
    primary: TableReference,
    joins: Vec<TableReferenceJoin>,
}

impl TableGroup {
    /// The group for `descriptor`: its inheritance chain and secondary
    /// tables, plus the subclass tables of `descendants` outer joined so a
    /// polymorphic row can be read in one statement.
    pub fn for_entity(
        descriptor: &EntityDescriptor,
        descendants: &[&EntityDescriptor],
        aliases: &mut AliasGenerator,
    ) -> Result<Self> {
        let primary_table = descriptor.primary_table();
        let primary = TableReference::new(&primary_table.name, aliases.next(&primary_table.name));
        let mut builder = TableGroupBuilder::new(descriptor.role().clone());
        builder.add_primary(primary.clone(), Predicate::conjunction(Vec::new()));

        let mut seen: Vec<&str> = vec![primary_table.name.as_str()];
        let mut plan: Vec<(&EntityTable, JoinType)> = Vec::new();
        for table in descriptor.chain_tables().skip(1) {
            plan.push((table, JoinType::Inner));
        }
        for table in descriptor.secondary_tables() {
            let join_type = if table.is_optional() || table.is_inverse() {
                JoinType::LeftOuter
            } else {
                JoinType::Inner
            };
            plan.push((table, join_type));
        }
        seen.extend(plan.iter().map(|(t, _)| t.name.as_str()));
        for sub in descendants {
            for table in sub.tables() {
                if table.kind == TableKind::Primary || seen.contains(&table.name.as_str()) {
                    continue;
                }
                seen.push(&table.name);
                plan.push((table, JoinType::LeftOuter));
            }
        }

        for (table, join_type) in plan {
            let mut reference = TableReference::new(&table.name, aliases.next(&table.name));
            reference.optional = join_type != JoinType::Inner;
            let predicate = key_predicate(&primary, &primary_table.key_columns, table, &reference.alias)?;
            builder.add_join(join_type, reference, predicate);
        }
        builder.build()
    }

    pub fn role(&self) -> &NavigableRole {
        &self.role
    }

    pub fn primary_table_reference(&self) -> &TableReference {
        &self.primary
    }

    pub fn table_reference_joins(&self) -> &[TableReferenceJoin] {
        &self.joins
    }

    pub fn resolve_table_reference(&self, table: &str) -> Option<&TableReference> {
        std::iter::once(&self.primary)
            .chain(self.joins.iter().map(|j| &j.reference))
            .find(|r| r.table == table)
    }

    pub fn resolve_column_reference(&self, column: &Column) -> Result<ColumnReference> {
        self.resolve_table_reference(&column.table)
            .map(|r| r.column(&column.name))
            .ok_or_else(|| {
                Error::modeling(format!(
                    "column {}.{} is not part of table group {}",
                    column.table, column.name, self.role
                ))
            })
    }

    /// The select-list expression for `column`: `alias.name`, or the
    /// alias-qualified formula of a derived column.
    pub fn resolve_column_expression(
        &self,
        column: &Column,
        dialect: Dialect,
        functions: &FunctionRegistry,
    ) -> Result<String> {
        let reference = self.resolve_column_reference(column)?;
        match &column.formula {
            Some(formula) => {
                let template = render_where_string_template(formula, TEMPLATE, dialect, functions)?;
                Ok(replace_placeholder(&template, &reference.qualifier))
            }
            None => Ok(reference.to_string()),
        }
    }

    /// Joins the target of a to-one attribute: a left outer join whose
    /// predicate equates each foreign-key column with the matching target
    /// key column, in mapping order.
    pub fn join_to_one(
        &mut self,
        attribute: &Attribute,
        target: &EntityDescriptor,
        aliases: &mut AliasGenerator,
    ) -> Result<TableReference> {
        let AttributeKind::ToOne { columns, .. } = &attribute.kind else {
            return Err(Error::modeling(format!("{} is not a to-one association", attribute.role)));
        };
        let foreign_key = ForeignKey::new(columns, &target.primary_table().key_columns)?;
        let target_table = target.primary_table();
        let mut reference = TableReference::new(&target_table.name, aliases.next(&target_table.name));
        reference.optional = true;

        let comparisons = foreign_key
            .mappings
            .iter()
            .map(|m| {
                Ok(Predicate::equal(
                    Expression::Column(self.resolve_column_reference(&m.referring)?),
                    Expression::Column(reference.column(&m.target.name)),
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut builder = TableGroupBuilder::from_group(self.clone());
        builder.add_primary(reference.clone(), Predicate::conjunction(comparisons));
        *self = builder.build()?;
        tracing::trace!(role = %attribute.role, alias = %reference.alias, "joined to-one target");
        Ok(reference)
    }

    /// Renders the FROM clause and outer joins into `select`.
    pub fn apply_to(&self, select: &mut Select, dialect: Dialect, lock: LockOptions) {
        let mut fragment = dialect.create_outer_join_fragment();
        for join in &self.joins {
            let (fk, pk, rest) = split_key_pairs(&join.predicate, &join.reference.alias);
            fragment.add_join_with_condition(
                &join.reference.table,
                &join.reference.alias,
                &fk,
                &pk,
                join.join_type,
                &rest,
            );
        }
        select.set_from_clause(
            dialect.append_lock_hint(lock, &format!("{} {}", self.primary.table, self.primary.alias)),
        );
        select.set_outer_joins(
            &fragment.to_from_fragment_string(),
            &fragment.to_where_fragment_string(),
        );
    }
}

/// `primary.pk=alias.key and ...` for one table of the group.
fn key_predicate(
    primary: &TableReference,
    primary_keys: &[Column],
    table: &EntityTable,
    alias: &str,
) -> Result<Predicate> {
    let foreign_key = ForeignKey::new(&table.key_columns, primary_keys)?;
    Ok(Predicate::conjunction(
        foreign_key
            .mappings
            .iter()
            .map(|m| {
                Predicate::equal(
                    Expression::Column(primary.column(&m.target.name)),
                    Expression::Column(ColumnReference::new(alias, &m.referring.name)),
                )
            })
            .collect(),
    ))
}

/// Pulls `x=alias.y` key pairs out of a join predicate; everything else is
/// rendered as an extra `on` condition.
fn split_key_pairs(predicate: &Predicate, alias: &str) -> (Vec<String>, Vec<String>, String) {
    let mut leaves = Vec::new();
    flatten(predicate, &mut leaves);
    let mut fk = Vec::new();
    let mut pk = Vec::new();
    let mut rest = Vec::new();
    for leaf in leaves {
        match leaf {
            Predicate::Comparison {
                lhs: Expression::Column(l),
                op: ComparisonOperator::Equal,
                rhs: Expression::Column(r),
            } if r.qualifier == alias && l.qualifier != alias => {
                fk.push(l.to_string());
                pk.push(r.column.clone());
            }
            Predicate::Comparison {
                lhs: Expression::Column(l),
                op: ComparisonOperator::Equal,
                rhs: Expression::Column(r),
            } if l.qualifier == alias && r.qualifier != alias => {
                fk.push(r.to_string());
                pk.push(l.column.clone());
            }
            other => rest.push(other.render()),
        }
    }
    (fk, pk, rest.join(" and "))
}

fn flatten<'p>(predicate: &'p Predicate, out: &mut Vec<&'p Predicate>) {
    match predicate {
        Predicate::Junction {
            kind: JunctionKind::Conjunction,
            predicates,
        } => predicates.iter().for_each(|p| flatten(p, out)),
        other if other.is_empty() => {}
        other => out.push(other),
    }
}

#[derive(Debug)]
pub struct TableGroupBuilder {
    role: NavigableRole,
    primary: Option<TableReference>,
    joins: Vec<TableReferenceJoin>,
}

impl TableGroupBuilder {
    pub fn new(role: NavigableRole) -> Self {
        Self {
            role,
            primary: None,
            joins: Vec::new(),
        }
    }

    pub fn from_group(group: TableGroup) -> Self {
        Self {
            role: group.role,
            primary: Some(group.primary),
            joins: group.joins,
        }
    }

    /// The first primary reference anchors the group. A table reference can
    /// only be primary once per group, so any later one is demoted to a
    /// left outer join on `predicate`.
    pub fn add_primary(&mut self, reference: TableReference, predicate: Predicate) -> &mut Self {
        if self.primary.is_none() {
            self.primary = Some(reference);
        } else {
            tracing::trace!(table = %reference.table, "demoting primary table reference to a join");
            self.joins.push(TableReferenceJoin {
                join_type: JoinType::LeftOuter,
                reference: TableReference {
                    optional: true,
                    ..reference
                },
                predicate,
            });
        }
        self
    }

    pub fn add_join(
        &mut self,
        join_type: JoinType,
        reference: TableReference,
        predicate: Predicate,
    ) -> &mut Self {
        self.joins.push(TableReferenceJoin {
            join_type,
            reference,
            predicate,
        });
        self
    }

    pub fn build(self) -> Result<TableGroup> {
        let primary = self
            .primary
            .ok_or_else(|| Error::modeling(format!("table group {} has no primary table", self.role)))?;
        Ok(TableGroup {
            role: self.role,
            primary,
            joins: self.joins,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boot::{
        ColumnSource, GeneratorMapping, IdentifierMapping, JoinMapping, PropertyMapping,
        RootClassMapping,
    };
    use crate::model::{CreationContext, EntityHierarchyBuilder};
    use crate::types::DomainType;
    use proptest::prelude::*;

    fn descriptors(mapping: &RootClassMapping) -> Vec<EntityDescriptor> {
        let ctx = CreationContext::new(Dialect::Generic);
        let builder = EntityHierarchyBuilder::from_boot(mapping, &ctx, None).unwrap();
        EntityDescriptor::build_tree(mapping, &ctx, &builder).unwrap()
    }

    fn id(columns: &[&str]) -> IdentifierMapping {
        if let [single] = columns {
            return IdentifierMapping::simple(
                PropertyMapping::basic("id", ColumnSource::new(*single, DomainType::Long)),
                GeneratorMapping::Assigned,
            );
        }
        IdentifierMapping::simple(
            PropertyMapping::embedded(
                "id",
                "Key",
                columns
                    .iter()
                    .map(|c| PropertyMapping::basic(*c, ColumnSource::new(*c, DomainType::Long)))
                    .collect(),
            ),
            GeneratorMapping::Assigned,
        )
    }

    fn render(group: &TableGroup, dialect: Dialect) -> String {
        let mut select = Select::new(dialect);
        select.set_select_clause("*");
        group.apply_to(&mut select, dialect, LockOptions::NONE);
        select.to_statement_string()
    }

    #[test]
    fn test_aliases() {
        let mut aliases = AliasGenerator::new();
        assert_eq!(aliases.next("person"), "p1_0");
        assert_eq!(aliases.next("app.pet"), "p2_0");
        assert_eq!(aliases.next("address"), "a1_0");
    }

    #[test]
    fn test_entity_group_with_optional_secondary() {
        let mapping = RootClassMapping::new("Person", "person", id(&["ID"])).with_join(
            JoinMapping::new("person_detail", vec!["person_id".to_string()]).optional(),
        );
        let all = descriptors(&mapping);
        let group = TableGroup::for_entity(&all[0], &[], &mut AliasGenerator::new()).unwrap();
        assert_eq!(
            render(&group, Dialect::Generic),
            "select * from person p1_0 left outer join person_detail p2_0 on p1_0.ID=p2_0.person_id"
        );
        assert_eq!(group.resolve_table_reference("person_detail").unwrap().alias, "p2_0");
    }

    #[test]
    fn test_theta_style_rendering() {
        let mapping = RootClassMapping::new("Person", "person", id(&["ID"])).with_join(
            JoinMapping::new("person_detail", vec!["person_id".to_string()]).optional(),
        );
        let all = descriptors(&mapping);
        let group = TableGroup::for_entity(&all[0], &[], &mut AliasGenerator::new()).unwrap();
        assert_eq!(
            render(&group, Dialect::Oracle8i),
            "select * from person p1_0, person_detail p2_0 where p1_0.ID=p2_0.person_id(+)"
        );
    }

    #[test]
    fn test_to_one_target_primary_is_demoted() {
        let person = RootClassMapping::new("Person", "person", id(&["ID"]));
        let pet = RootClassMapping::new("Pet", "pet", id(&["ID"])).with_property(
            PropertyMapping::many_to_one("owner", "Person", vec![ColumnSource::new("owner_id", DomainType::Long)]),
        );
        let person = descriptors(&person).remove(0);
        let pet = descriptors(&pet).remove(0);
        let mut aliases = AliasGenerator::new();
        let mut group = TableGroup::for_entity(&pet, &[], &mut aliases).unwrap();
        let owner = pet.attribute("owner").unwrap();
        let reference = group.join_to_one(owner, &person, &mut aliases).unwrap();
        assert_eq!(reference.alias, "p2_0");
        assert_eq!(group.primary_table_reference().table, "pet");
        let join = &group.table_reference_joins()[0];
        assert_eq!(join.join_type, JoinType::LeftOuter);
        assert_eq!(join.predicate.render(), "p1_0.owner_id=p2_0.ID");
    }

    #[test]
    fn test_unknown_column_is_an_error() {
        let mapping = RootClassMapping::new("Person", "person", id(&["ID"]));
        let all = descriptors(&mapping);
        let group = TableGroup::for_entity(&all[0], &[], &mut AliasGenerator::new()).unwrap();
        let stray = Column::new("other", "x", crate::types::SqlExpressableType::of(DomainType::Long));
        assert!(group.resolve_column_reference(&stray).is_err());
    }

    #[test]
    fn test_builder_needs_primary() {
        assert!(TableGroupBuilder::new(NavigableRole::new("X")).build().is_err());
    }

    proptest! {
        #[test]
        fn prop_join_predicate_follows_mapping_order(n in 1usize..5) {
            let names: Vec<String> = (0..n).map(|i| format!("k{i}")).collect();
            let refs: Vec<&str> = names.iter().map(String::as_str).collect();
            let target = RootClassMapping::new("Target", "target", id(&refs));
            let fk: Vec<ColumnSource> = names
                .iter()
                .map(|c| ColumnSource::new(format!("fk_{c}"), DomainType::Long))
                .collect();
            let owner = RootClassMapping::new("Owner", "owner", id(&["ID"]))
                .with_property(PropertyMapping::many_to_one("target", "Target", fk));
            let target = descriptors(&target).remove(0);
            let owner = descriptors(&owner).remove(0);
            let mut aliases = AliasGenerator::new();
            let mut group = TableGroup::for_entity(&owner, &[], &mut aliases).unwrap();
            let reference = group
                .join_to_one(owner.attribute("target").unwrap(), &target, &mut aliases)
                .unwrap();
            let predicate = &group.table_reference_joins()[0].predicate;
            prop_assert_eq!(predicate.leaf_count(), n);
            let expected: Vec<String> = names
                .iter()
                .map(|c| format!("o1_0.fk_{c}={}.{c}", reference.alias))
                .collect();
            prop_assert_eq!(predicate.render(), expected.join(" and "));
        }
    }
}
