use super::{EntityPersister, assemble, binding, disassemble};
use crate::error::{Error, Result, info_string};
use crate::jdbc::JdbcParameterBinding;
use crate::model::{Clause, Column, EntityDescriptor, InheritanceStrategy};
use crate::session::ExecutionContext;
use crate::sql::{
    InFragment, LockMode, LockOptions, Select, SimpleSelect, TEMPLATE, render_where_string_template,
    replace_placeholder,
};
use crate::table_group::{AliasGenerator, TableGroup, TableReference};
use crate::types::{DomainType, SqlExpressableType, Value, ValueBinder, ValueExtractor};
use indexmap::{IndexMap, IndexSet};
use std::sync::Arc;

/// Column holding the subclass index of a joined polymorphic row.
const CLAZZ_COLUMN: &str = "clazz_";

/// One row read by [`EntityPersister::load`].
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedEntity {
    /// Concrete entity the row belongs to.
    pub entity: String,
    pub id: Value,
    pub state: Vec<Value>,
    pub version: Option<Value>,
    pub row_id: Option<Value>,
}

/// How the concrete entity of a row is told apart.
enum SubtypeResolution {
    Fixed,
    Discriminator(usize),
    Case(usize),
}

/// The load statement and where each part of the entity sits in its row.
struct LoadPlan {
    sql: String,
    types: Vec<SqlExpressableType>,
    id_slots: Vec<usize>,
    row_id_slot: Option<usize>,
    resolution: SubtypeResolution,
    candidates: Vec<Arc<EntityDescriptor>>,
    /// Per candidate, per attribute: the slots of its columns, or `None`
    /// for attributes left unfetched.
    attribute_slots: Vec<Vec<Option<Vec<usize>>>>,
}

#[derive(Default)]
struct SelectList {
    expressions: IndexMap<String, SqlExpressableType>,
}

impl SelectList {
    fn slot(&mut self, expression: String, ty: &SqlExpressableType) -> usize {
        match self.expressions.get_index_of(&expression) {
            Some(slot) => slot,
            None => self.expressions.insert_full(expression, ty.clone()).0,
        }
    }
}

impl EntityPersister {
    /// Reads the entity with identifier `id`, resolving the concrete
    /// subtype of the row. Consults the second-level cache first when the
    /// cache mode and lock allow it.
    pub fn load(
        &self,
        id: &Value,
        lock: LockOptions,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<Option<LoadedEntity>> {
        let entity = self.descriptor.name();
        let access = self.hierarchy.cache_access();
        let cacheable = matches!(lock.mode, LockMode::None | LockMode::Read);
        if let (Some(access), true) = (access, cacheable && ctx.cache_mode.is_get_enabled()) {
            let key = self.cache_key(id, ctx.tenant_id.as_deref())?;
            if let Some(entry) = access.get(&key) {
                if let Some(candidate) = self.polymorphic.iter().find(|d| d.name() == entry.subclass) {
                    tracing::trace!(%key, "loaded from second-level cache");
                    return Ok(Some(LoadedEntity {
                        entity: candidate.name().to_string(),
                        id: id.clone(),
                        state: assemble(candidate, &entry)?,
                        version: entry.version.clone(),
                        row_id: None,
                    }));
                }
            }
        }

        let plan = self.load_plan(lock)?;
        let mut bindings: Vec<JdbcParameterBinding> = self
            .key_bindings(id, self.descriptor.primary_table())?
            .into_iter()
            .map(|(_, b)| b)
            .collect();
        if let Some((_, tenant)) = self.tenant_binding(ctx)? {
            bindings.push(tenant);
        }
        tracing::debug!(entity, id = %id.loggable(), sql = %plan.sql, "loading entity");

        let Some(row) = self.query_single(ctx, &plan.sql, &plan.types, &bindings, id)? else {
            return Ok(None);
        };
        let index = match plan.resolution {
            SubtypeResolution::Fixed => 0,
            SubtypeResolution::Discriminator(slot) => {
                let name = self
                    .hierarchy
                    .discriminator()
                    .ok_or_else(|| Error::modeling(format!("{entity} has no discriminator")))?
                    .resolve_entity(&row[slot])?;
                plan.candidates
                    .iter()
                    .position(|d| d.name() == name)
                    .ok_or_else(|| Error::modeling(format!("row of {name} is not a {entity}")))?
            }
            SubtypeResolution::Case(slot) => row[slot]
                .as_i64()
                .and_then(|i| usize::try_from(i).ok())
                .filter(|&i| i < plan.candidates.len())
                .ok_or_else(|| {
                    Error::modeling(format!(
                        "no subclass of {entity} matches [{}]",
                        row[slot].loggable()
                    ))
                })?,
        };

        let candidate = &plan.candidates[index];
        let mut state = Vec::with_capacity(candidate.state_len());
        for (attribute, slots) in candidate.attributes().iter().zip(&plan.attribute_slots[index]) {
            state.push(match slots {
                Some(slots) => {
                    let values: Vec<Value> = slots.iter().map(|&s| row[s].clone()).collect();
                    attribute.hydrate(&values)?
                }
                None => Value::Unfetched,
            });
        }
        let id_values: Vec<Value> = plan.id_slots.iter().map(|&s| row[s].clone()).collect();
        let loaded = LoadedEntity {
            entity: candidate.name().to_string(),
            id: self.hierarchy.identifier().resolve_hydrated_state(&id_values)?,
            version: candidate.version_position().map(|p| state[p].clone()),
            row_id: plan.row_id_slot.map(|s| row[s].clone()),
            state,
        };
        self.statistics.load_entity(entity);

        if let (Some(access), true) = (access, ctx.cache_mode.is_put_enabled()) {
            let key = self.cache_key(&loaded.id, ctx.tenant_id.as_deref())?;
            access.put(&key, disassemble(candidate, &loaded.state, loaded.version.as_ref())?);
        }
        Ok(Some(loaded))
    }

    fn load_plan(&self, lock: LockOptions) -> Result<LoadPlan> {
        let dialect = self.settings.dialect;
        let strategy = self.hierarchy.strategy();
        if strategy == InheritanceStrategy::Union && self.polymorphic.len() > 1 {
            return self.union_load_plan(lock);
        }
        let discriminator = self.hierarchy.discriminator();
        let mut candidates = self.polymorphic.clone();
        if discriminator.is_none() && strategy != InheritanceStrategy::Joined {
            candidates.truncate(1);
        }

        let descendants: Vec<&EntityDescriptor> = candidates[1..].iter().map(|d| d.as_ref()).collect();
        let mut aliases = AliasGenerator::new();
        let group = TableGroup::for_entity(&self.descriptor, &descendants, &mut aliases)?;
        let primary = group.primary_table_reference().clone();
        let mut list = SelectList::default();

        let id_slots = self
            .descriptor
            .primary_table()
            .key_columns
            .iter()
            .map(|c| Ok(list.slot(group.resolve_column_expression(c, dialect, &self.functions)?, &c.expressable)))
            .collect::<Result<Vec<_>>>()?;

        let mut resolution = SubtypeResolution::Fixed;
        if let Some(discriminator) = discriminator.filter(|_| candidates.len() > 1) {
            let column = &discriminator.column;
            let expression = group.resolve_column_expression(column, dialect, &self.functions)?;
            resolution = SubtypeResolution::Discriminator(list.slot(expression, &column.expressable));
        }

        let row_id_slot = match (self.hierarchy.row_id(), &self.descriptor.primary_table().row_id) {
            (Some(row_id), Some(_)) => {
                let expression = group.resolve_column_expression(&row_id.column, dialect, &self.functions)?;
                Some(list.slot(expression, &row_id.column.expressable))
            }
            _ => None,
        };

        let mut attribute_slots = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            let mut slots = Vec::with_capacity(candidate.state_len());
            for attribute in candidate.attributes() {
                if attribute.lazy || attribute.is_collection() {
                    slots.push(None);
                    continue;
                }
                let columns = attribute
                    .columns()
                    .into_iter()
                    .map(|c| Ok(list.slot(group.resolve_column_expression(c, dialect, &self.functions)?, &c.expressable)))
                    .collect::<Result<Vec<_>>>()?;
                slots.push(Some(columns));
            }
            attribute_slots.push(slots);
        }

        if strategy == InheritanceStrategy::Joined && discriminator.is_none() && candidates.len() > 1 {
            let mut case = dialect.create_case_fragment();
            for (index, candidate) in candidates.iter().enumerate().rev() {
                let table = candidate.own_table_name();
                let (Some(reference), Some(key)) = (
                    group.resolve_table_reference(table),
                    candidate.table(table).and_then(|t| t.key_columns.first()),
                ) else {
                    continue;
                };
                case.add_when_column_not_null(&reference.alias, &key.name, &index.to_string());
            }
            case.set_return_column_name(CLAZZ_COLUMN);
            let ty = SqlExpressableType::of(DomainType::Integer);
            resolution = SubtypeResolution::Case(list.slot(case.to_fragment_string(), &ty));
        }

        let mut conditions: Vec<String> = self
            .descriptor
            .primary_table()
            .key_columns
            .iter()
            .map(|c| format!("{}=?", primary.column(&c.name)))
            .collect();
        if let Some(tenant) = self.descriptor.tenant_column() {
            conditions.push(format!("{}=?", group.resolve_column_reference(tenant)?));
        }
        if let Some(discriminator) = discriminator {
            if strategy == InheritanceStrategy::Discriminator
                && (!self.descriptor.is_root() || discriminator.forced)
            {
                let mut fragment = InFragment::new();
                let expression = group.resolve_column_expression(&discriminator.column, dialect, &self.functions)?;
                fragment.set_column("", &expression);
                for candidate in &candidates {
                    if let Some(value) = discriminator.mappings.value_for_entity(candidate.name()) {
                        fragment.add_value(value.to_in_value());
                    }
                }
                conditions.push(fragment.to_fragment_string()?);
            }
        }
        if let Some(restriction) = self.hierarchy.where_fragment() {
            let template = render_where_string_template(restriction, TEMPLATE, dialect, &self.functions)?;
            conditions.push(format!("({})", replace_placeholder(&template, &primary.alias)));
        }

        let mut select = Select::new(dialect);
        select.set_parameter_markers(self.settings.parameter_markers);
        if let Some(comment) = self.comment("load") {
            select.set_comment(comment);
        }
        let expressions: Vec<&str> = list.expressions.keys().map(String::as_str).collect();
        select.set_select_clause(expressions.join(", "));
        group.apply_to(&mut select, dialect, lock);
        select.set_where_clause(conditions.join(" and "));
        select.set_lock_options(lock);

        Ok(LoadPlan {
            sql: select.to_statement_string(),
            types: list.expressions.into_values().collect(),
            id_slots,
            row_id_slot,
            resolution,
            candidates,
            attribute_slots,
        })
    }

    /// Table per concrete class: the concrete tables of the subtree are
    /// read through one `union all` derived table whose `clazz_` column
    /// holds the candidate index. Columns a table lacks are selected as
    /// `null`.
    fn union_load_plan(&self, lock: LockOptions) -> Result<LoadPlan> {
        let entity = self.descriptor.name();
        let dialect = self.settings.dialect;
        let candidates = self.polymorphic.clone();

        let mut columns: IndexSet<String> = IndexSet::new();
        for candidate in &candidates {
            let table = &candidate.primary_table().name;
            let mut own: Vec<&Column> = candidate.primary_table().key_columns.iter().collect();
            for attribute in candidate.attributes() {
                if attribute.lazy || attribute.is_collection() {
                    continue;
                }
                for column in attribute.columns() {
                    if column.formula.is_some() || !column.belongs_to(table) {
                        return Err(Error::unsupported(
                            "load",
                            format!(
                                "union subclass {} maps {}.{} outside its concrete table",
                                candidate.name(),
                                column.table,
                                column.name
                            ),
                        ));
                    }
                    own.push(column);
                }
            }
            own.extend(candidate.tenant_column());
            for column in own {
                columns.insert(column.name.clone());
            }
        }

        let restriction = self
            .hierarchy
            .where_fragment()
            .map(|fragment| render_where_string_template(fragment, TEMPLATE, dialect, &self.functions))
            .transpose()?;
        let mut branches = Vec::with_capacity(candidates.len());
        for (index, candidate) in candidates.iter().enumerate() {
            let table = &candidate.primary_table().name;
            let present: Vec<&str> = candidate
                .primary_table()
                .key_columns
                .iter()
                .chain(candidate.attributes().iter().flat_map(|a| a.columns()))
                .chain(candidate.tenant_column())
                .filter(|c| c.belongs_to(table))
                .map(|c| c.name.as_str())
                .collect();
            let mut items: Vec<String> = columns
                .iter()
                .map(|name| {
                    if present.contains(&name.as_str()) {
                        name.clone()
                    } else {
                        format!("null as {name}")
                    }
                })
                .collect();
            items.push(format!("{index} as {CLAZZ_COLUMN}"));
            let mut branch = format!("select {} from {table}", items.join(", "));
            if let Some(template) = &restriction {
                branch.push_str(&format!(" where ({})", replace_placeholder(template, table)));
            }
            branches.push(branch);
        }

        let mut aliases = AliasGenerator::new();
        let table = &self.descriptor.primary_table().name;
        let primary = TableReference::new(table, aliases.next(table));
        let mut list = SelectList::default();
        let id_slots = self
            .descriptor
            .primary_table()
            .key_columns
            .iter()
            .map(|c| list.slot(primary.column(&c.name).to_string(), &c.expressable))
            .collect::<Vec<_>>();
        let mut attribute_slots = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            let slots = candidate
                .attributes()
                .iter()
                .map(|attribute| {
                    (!attribute.lazy && !attribute.is_collection()).then(|| {
                        attribute
                            .columns()
                            .into_iter()
                            .map(|c| list.slot(primary.column(&c.name).to_string(), &c.expressable))
                            .collect()
                    })
                })
                .collect();
            attribute_slots.push(slots);
        }
        let ty = SqlExpressableType::of(DomainType::Integer);
        let resolution = SubtypeResolution::Case(list.slot(primary.column(CLAZZ_COLUMN).to_string(), &ty));

        let mut conditions: Vec<String> = self
            .descriptor
            .primary_table()
            .key_columns
            .iter()
            .map(|c| format!("{}=?", primary.column(&c.name)))
            .collect();
        if let Some(tenant) = self.descriptor.tenant_column() {
            conditions.push(format!("{}=?", primary.column(&tenant.name)));
        }

        let mut select = Select::new(dialect);
        select.set_parameter_markers(self.settings.parameter_markers);
        if let Some(comment) = self.comment("load") {
            select.set_comment(comment);
        }
        let expressions: Vec<&str> = list.expressions.keys().map(String::as_str).collect();
        select.set_select_clause(expressions.join(", "));
        select.set_from_clause(dialect.append_lock_hint(
            lock,
            &format!("({}) {}", branches.join(" union all "), primary.alias),
        ));
        select.set_where_clause(conditions.join(" and "));
        select.set_lock_options(lock);
        tracing::trace!(entity, branches = branches.len(), "union load plan");

        Ok(LoadPlan {
            sql: select.to_statement_string(),
            types: list.expressions.into_values().collect(),
            id_slots,
            row_id_slot: None,
            resolution,
            candidates,
            attribute_slots,
        })
    }

    /// Runs a query expected to match at most one row and extracts it.
    fn query_single(
        &self,
        ctx: &mut ExecutionContext<'_>,
        sql: &str,
        types: &[SqlExpressableType],
        bindings: &[JdbcParameterBinding],
        id: &Value,
    ) -> Result<Option<Vec<Value>>> {
        let mut statement = ctx.connection.prepare_statement(sql)?;
        for (i, binding) in bindings.iter().enumerate() {
            binding.ty.binder().bind(statement.as_mut(), i + 1, &binding.value)?;
        }
        let mut rows = statement.execute_query()?;
        if !rows.next()? {
            return Ok(None);
        }
        let row = types
            .iter()
            .enumerate()
            .map(|(i, ty)| ty.extractor().extract(rows.as_mut(), i + 1))
            .collect::<Result<Vec<_>, _>>()?;
        if rows.next()? {
            return Err(Error::DuplicateIdentifier {
                info: info_string(self.descriptor.name(), id),
            });
        }
        Ok(Some(row))
    }

    /// Resolves a natural id to the identifier of the matching row.
    pub fn resolve_natural_id(
        &self,
        values: &[Value],
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<Option<Value>> {
        let entity = self.descriptor.name();
        let natural_id = self.hierarchy.natural_id().ok_or_else(|| {
            Error::unsupported("resolve_natural_id", format!("entity {entity} without natural id"))
        })?;
        if values.len() != natural_id.attributes().len() {
            return Err(Error::modeling(format!(
                "natural id of {entity} has {} attributes, got {} values",
                natural_id.attributes().len(),
                values.len()
            )));
        }
        let table = self.descriptor.primary_table();
        let mut select = SimpleSelect::new(self.settings.dialect);
        select.set_parameter_markers(self.settings.parameter_markers);
        if let Some(comment) = self.comment("resolve natural id of") {
            select.set_comment(comment);
        }
        select.set_table_name(&table.name);
        select.add_columns(&table.key_column_names());

        let mut jdbc_values = Vec::new();
        for (natural, value) in natural_id.attributes().iter().zip(values) {
            let attribute = self.descriptor.attributes().get(natural.position).ok_or_else(|| {
                Error::modeling(format!("natural id attribute {} is out of range", natural.attribute.role))
            })?;
            attribute.dehydrate(value, Clause::Where, &mut jdbc_values)?;
        }
        let mut bindings = Vec::new();
        for value in jdbc_values {
            if !value.column.belongs_to(&table.name) {
                return Err(Error::unsupported(
                    "resolve_natural_id",
                    format!("natural id column {} outside table {}", value.column.name, table.name),
                ));
            }
            if value.value.is_null() {
                select.add_predicate(&value.column.name, "is null");
            } else {
                select.add_condition(&value.column.name, "=", "?");
                bindings.push(binding(value.value, value.column));
            }
        }
        if let Some((column, tenant)) = self.tenant_binding(ctx)? {
            select.add_condition(&column, "=", "?");
            bindings.push(tenant);
        }

        let sql = select.to_statement_string();
        let types: Vec<SqlExpressableType> = table.key_columns.iter().map(|c| c.expressable.clone()).collect();
        tracing::debug!(entity, %sql, "resolving natural id");
        match self.query_single(ctx, &sql, &types, &bindings, &Value::Composite(values.to_vec()))? {
            Some(row) => self.hierarchy.identifier().resolve_hydrated_state(&row).map(Some),
            None => Ok(None),
        }
    }

    /// Acquires `lock` on the row, checking `version` when the entity is
    /// versioned. Returns the new version when the mode forces an increment.
    pub fn lock(
        &self,
        id: &Value,
        version: Option<&Value>,
        lock: LockOptions,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<Option<Value>> {
        if lock.mode == LockMode::None {
            return Ok(None);
        }
        let entity = self.descriptor.name();
        let table = self.descriptor.primary_table();
        let mut select = SimpleSelect::new(self.settings.dialect);
        select.set_parameter_markers(self.settings.parameter_markers);
        if let Some(comment) = self.comment("lock") {
            select.set_comment(comment);
        }
        select.set_table_name(&table.name).set_lock_options(lock);

        let keys = self.key_bindings(id, table)?;
        let mut bindings = Vec::with_capacity(keys.len() + 1);
        for (column, value) in keys {
            if bindings.is_empty() {
                select.add_column(&column);
            }
            select.add_condition(&column, "=", "?");
            bindings.push(value);
        }
        let version_column = self
            .descriptor
            .version_column()
            .filter(|c| c.belongs_to(&table.name));
        if let (Some(column), Some(version)) = (version_column, version) {
            select.add_condition(&column.name, "=", "?");
            bindings.push(binding(version.clone(), column));
        }

        let sql = select.to_statement_string();
        tracing::debug!(entity, id = %id.loggable(), ?lock, "locking entity");
        let types: Vec<SqlExpressableType> = table.key_columns.iter().take(1).map(|c| c.expressable.clone()).collect();
        if self.query_single(ctx, &sql, &types, &bindings, id)?.is_none() {
            self.statistics.optimistic_failure(entity);
            return Err(Error::StaleObjectState {
                entity: entity.to_string(),
                id: id.loggable(),
            });
        }

        match version {
            Some(version) if lock.mode.requires_version_increment() => {
                self.force_version_increment(id, version, ctx).map(Some)
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{build, build_with, person};
    use super::*;
    use crate::boot::{
        ColumnSource, JoinMapping, PropertyMapping, RootClassMapping, SubclassKind, SubclassMapping,
    };
    use crate::cache::{CacheRegionFactory, InMemoryRegionFactory};
    use crate::jdbc::recording::RecordingConnection;
    use crate::session::CacheMode;
    use crate::settings::Settings;

    fn versioned() -> RootClassMapping {
        person().with_version(PropertyMapping::basic("ver", ColumnSource::new("ver", DomainType::Integer)))
    }

    fn salary() -> PropertyMapping {
        PropertyMapping::basic("salary", ColumnSource::new("salary", DomainType::Long))
    }

    #[test]
    fn test_load_simple_entity() {
        let persister = &build(&versioned())[0];
        let conn = RecordingConnection::new();
        conn.push_result(vec![vec![Value::Long(1), Value::text("Ann"), Value::Integer(2)]]);
        let mut handle = conn.clone();
        let mut ctx = ExecutionContext::new(&mut handle);
        let loaded = persister
            .load(&Value::Long(1), LockOptions::NONE, &mut ctx)
            .unwrap()
            .unwrap();
        assert_eq!(
            conn.sql(),
            vec!["select p1_0.ID, p1_0.name, p1_0.ver from person p1_0 where p1_0.ID=?"]
        );
        assert_eq!(loaded.entity, "Person");
        assert_eq!(loaded.id, Value::Long(1));
        assert_eq!(loaded.state, vec![Value::text("Ann"), Value::Integer(2)]);
        assert_eq!(loaded.version, Some(Value::Integer(2)));
    }

    #[test]
    fn test_missing_row_loads_nothing() {
        let persister = &build(&person())[0];
        let mut conn = RecordingConnection::new();
        let mut ctx = ExecutionContext::new(&mut conn);
        assert_eq!(persister.load(&Value::Long(1), LockOptions::NONE, &mut ctx).unwrap(), None);
    }

    #[test]
    fn test_single_table_polymorphic_load() {
        let mapping = person()
            .with_discriminator(ColumnSource::new("type", DomainType::String))
            .with_subclass(
                SubclassMapping::new("Employee", SubclassKind::SingleTable)
                    .with_discriminator_value("E")
                    .with_property(salary()),
            );
        let persisters = build(&mapping);

        let conn = RecordingConnection::new();
        conn.push_result(vec![vec![
            Value::Long(1),
            Value::text("E"),
            Value::text("Ann"),
            Value::Long(100),
        ]]);
        let mut handle = conn.clone();
        let mut ctx = ExecutionContext::new(&mut handle);
        let loaded = persisters[0]
            .load(&Value::Long(1), LockOptions::NONE, &mut ctx)
            .unwrap()
            .unwrap();
        assert_eq!(
            conn.sql()[0],
            "select p1_0.ID, p1_0.type, p1_0.name, p1_0.salary from person p1_0 where p1_0.ID=?"
        );
        assert_eq!(loaded.entity, "Employee");
        assert_eq!(loaded.state, vec![Value::text("Ann"), Value::Long(100)]);

        conn.clear();
        let mut ctx = ExecutionContext::new(&mut handle);
        persisters[1].load(&Value::Long(1), LockOptions::NONE, &mut ctx).unwrap();
        assert_eq!(
            conn.sql()[0],
            "select p1_0.ID, p1_0.name, p1_0.salary from person p1_0 where p1_0.ID=? and p1_0.type='E'"
        );
    }

    #[test]
    fn test_joined_polymorphic_load_uses_case() {
        let mapping = person().with_subclass(
            SubclassMapping::new(
                "Employee",
                SubclassKind::Joined {
                    table: "employee".to_string(),
                    key_columns: vec!["person_id".to_string()],
                },
            )
            .with_property(salary()),
        );
        let persisters = build(&mapping);
        let conn = RecordingConnection::new();
        conn.push_result(vec![vec![
            Value::Long(1),
            Value::text("Ann"),
            Value::Long(500),
            Value::Integer(1),
        ]]);
        let mut handle = conn.clone();
        let mut ctx = ExecutionContext::new(&mut handle);
        let loaded = persisters[0]
            .load(&Value::Long(1), LockOptions::NONE, &mut ctx)
            .unwrap()
            .unwrap();
        assert_eq!(
            conn.sql()[0],
            "select p1_0.ID, p1_0.name, e1_0.salary, \
             case when e1_0.person_id is not null then 1 when p1_0.ID is not null then 0 end as clazz_ \
             from person p1_0 left outer join employee e1_0 on p1_0.ID=e1_0.person_id where p1_0.ID=?"
        );
        assert_eq!(loaded.entity, "Employee");
        assert_eq!(loaded.state, vec![Value::text("Ann"), Value::Long(500)]);
    }

    #[test]
    fn test_union_superclass_load_reads_every_concrete_table() {
        let mapping = person().with_subclass(
            SubclassMapping::new(
                "Employee",
                SubclassKind::Union {
                    table: "employee".to_string(),
                },
            )
            .with_property(salary()),
        );
        let persisters = build(&mapping);
        let conn = RecordingConnection::new();
        conn.push_result(vec![vec![
            Value::Long(1),
            Value::text("Ann"),
            Value::Long(500),
            Value::Integer(1),
        ]]);
        let mut handle = conn.clone();
        let mut ctx = ExecutionContext::new(&mut handle);
        let loaded = persisters[0]
            .load(&Value::Long(1), LockOptions::NONE, &mut ctx)
            .unwrap()
            .unwrap();
        assert_eq!(
            conn.sql()[0],
            "select p1_0.ID, p1_0.name, p1_0.salary, p1_0.clazz_ from \
             (select ID, name, null as salary, 0 as clazz_ from person \
             union all select ID, name, salary, 1 as clazz_ from employee) p1_0 where p1_0.ID=?"
        );
        assert_eq!(loaded.entity, "Employee");
        assert_eq!(loaded.state, vec![Value::text("Ann"), Value::Long(500)]);

        conn.clear();
        let mut ctx = ExecutionContext::new(&mut handle);
        persisters[1].load(&Value::Long(1), LockOptions::NONE, &mut ctx).unwrap();
        assert_eq!(
            conn.sql()[0],
            "select e1_0.ID, e1_0.name, e1_0.salary from employee e1_0 where e1_0.ID=?"
        );
    }

    #[test]
    fn test_union_load_rejects_secondary_table_columns() {
        let mapping = person()
            .with_join(
                JoinMapping::new("person_detail", vec!["person_id".to_string()])
                    .with_property(PropertyMapping::basic("bio", ColumnSource::new("bio", DomainType::String))),
            )
            .with_subclass(SubclassMapping::new(
                "Employee",
                SubclassKind::Union {
                    table: "employee".to_string(),
                },
            ));
        let persisters = build(&mapping);
        let mut conn = RecordingConnection::new();
        let mut ctx = ExecutionContext::new(&mut conn);
        assert!(matches!(
            persisters[0].load(&Value::Long(1), LockOptions::NONE, &mut ctx),
            Err(Error::Unsupported { .. })
        ));
    }

    #[test]
    fn test_where_fragment_and_tenant_restrict_load() {
        let mut mapping = person();
        mapping.where_fragment = Some("active = 1".to_string());
        mapping.tenant_column = Some(ColumnSource::new("tenant_id", DomainType::String));
        let persister = &build(&mapping)[0];
        let conn = RecordingConnection::new();
        let mut handle = conn.clone();
        let mut ctx = ExecutionContext::new(&mut handle).with_tenant("acme");
        persister.load(&Value::Long(1), LockOptions::NONE, &mut ctx).unwrap();
        let statements = conn.statements();
        assert_eq!(
            statements[0].sql,
            "select p1_0.ID, p1_0.name from person p1_0 \
             where p1_0.ID=? and p1_0.tenant_id=? and (p1_0.active = 1)"
        );
        assert_eq!(statements[0].values(), vec![Value::Long(1), Value::text("acme")]);
    }

    #[test]
    fn test_second_level_cache_round_trip() {
        let mut mapping = person();
        mapping.cache_region = Some("people".to_string());
        let factory: Arc<dyn CacheRegionFactory> = Arc::new(InMemoryRegionFactory::new());
        let persister = &build_with(&mapping, Settings::default(), Some(factory))[0];

        let conn = RecordingConnection::new();
        conn.push_result(vec![vec![Value::Long(1), Value::text("Ann")]]);
        let mut handle = conn.clone();
        let mut ctx = ExecutionContext::new(&mut handle);
        let first = persister.load(&Value::Long(1), LockOptions::NONE, &mut ctx).unwrap();
        let second = persister.load(&Value::Long(1), LockOptions::NONE, &mut ctx).unwrap();
        assert_eq!(conn.sql().len(), 1);
        assert_eq!(first.map(|l| l.state), second.map(|l| l.state));

        let mut ctx = ExecutionContext::new(&mut handle).with_cache_mode(CacheMode::Ignore);
        persister.load(&Value::Long(1), LockOptions::NONE, &mut ctx).unwrap();
        assert_eq!(conn.sql().len(), 2);
    }

    #[test]
    fn test_duplicate_rows_fail_the_load() {
        let persister = &build(&person())[0];
        let conn = RecordingConnection::new();
        conn.push_result(vec![
            vec![Value::Long(1), Value::text("Ann")],
            vec![Value::Long(1), Value::text("Bob")],
        ]);
        let mut handle = conn.clone();
        let mut ctx = ExecutionContext::new(&mut handle);
        assert!(matches!(
            persister.load(&Value::Long(1), LockOptions::NONE, &mut ctx),
            Err(Error::DuplicateIdentifier { .. })
        ));
    }

    #[test]
    fn test_resolve_natural_id() {
        let mapping = person().with_property(
            PropertyMapping::basic("ssn", ColumnSource::new("ssn", DomainType::String)).natural_id(),
        );
        let persister = &build(&mapping)[0];
        let conn = RecordingConnection::new();
        conn.push_result(vec![vec![Value::Long(12)]]);
        let mut handle = conn.clone();
        let mut ctx = ExecutionContext::new(&mut handle);
        let id = persister
            .resolve_natural_id(&[Value::text("123-45")], &mut ctx)
            .unwrap();
        assert_eq!(id, Some(Value::Long(12)));
        assert_eq!(conn.sql(), vec!["select ID from person where ssn = ?"]);

        let plain = &build(&person())[0];
        assert!(matches!(
            plain.resolve_natural_id(&[Value::text("x")], &mut ctx),
            Err(Error::Unsupported { .. })
        ));
    }

    #[test]
    fn test_lock_checks_version() {
        let persister = &build(&versioned())[0];
        let conn = RecordingConnection::new();
        let mut handle = conn.clone();
        let mut ctx = ExecutionContext::new(&mut handle);
        let err = persister
            .lock(&Value::Long(1), Some(&Value::Integer(3)), LockOptions::new(LockMode::Read), &mut ctx)
            .unwrap_err();
        assert!(matches!(err, Error::StaleObjectState { .. }));
        assert_eq!(conn.sql(), vec!["select ID from person where ID = ? and ver = ?"]);

        conn.push_result(vec![vec![Value::Long(1)]]);
        let next = persister
            .lock(
                &Value::Long(1),
                Some(&Value::Integer(3)),
                LockOptions::new(LockMode::OptimisticForceIncrement),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(next, Some(Value::Integer(4)));
        assert_eq!(conn.sql().last().unwrap(), "update person set ver=? where ID=? and ver=?");
    }
}
