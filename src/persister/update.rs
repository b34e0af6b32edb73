use super::delete::DeleteRequest;
use super::dirty::find_dirty;
use super::{EntityPersister, RowLocator, binding};
use crate::error::{Error, Result};
use crate::jdbc::{Expectation, JdbcMutation};
use crate::model::{Attribute, Clause, EntityTable, is_version_increment_required};
use crate::session::ExecutionContext;
use crate::sql::{Restriction, Update};
use crate::types::Value;

/// Everything known about one entity instance being updated.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    pub id: Value,
    pub state: Vec<Value>,
    /// State as last read or written; enables dirty checking and
    /// value-based optimistic locking.
    pub previous_state: Option<Vec<Value>>,
    pub previous_version: Option<Value>,
    pub row_id: Option<Value>,
    /// Precomputed dirty positions; computed from `previous_state` if absent.
    pub dirty_fields: Option<Vec<usize>>,
    pub has_dirty_collection: bool,
}

impl UpdateRequest {
    pub fn new(id: Value, state: Vec<Value>) -> Self {
        Self {
            id,
            state,
            previous_state: None,
            previous_version: None,
            row_id: None,
            dirty_fields: None,
            has_dirty_collection: false,
        }
    }

    pub fn with_previous_state(mut self, previous_state: Vec<Value>) -> Self {
        self.previous_state = Some(previous_state);
        self
    }

    pub fn with_previous_version(mut self, version: Value) -> Self {
        self.previous_version = Some(version);
        self
    }

    pub fn with_row_id(mut self, row_id: Value) -> Self {
        self.row_id = Some(row_id);
        self
    }

    pub fn with_dirty_fields(mut self, dirty_fields: Vec<usize>) -> Self {
        self.dirty_fields = Some(dirty_fields);
        self
    }

    pub fn with_dirty_collection(mut self) -> Self {
        self.has_dirty_collection = true;
        self
    }
}

struct PreparedUpdate<'a> {
    id: &'a Value,
    state: &'a [Value],
    previous_state: Option<&'a [Value]>,
    previous_version: Option<&'a Value>,
    row_id: Option<&'a Value>,
    /// `None` when dirtiness is unknown and every column is written.
    dirty: Option<&'a [usize]>,
    version_incremented: bool,
}

impl EntityPersister {
    /// Updates the rows of every table holding changed state and returns
    /// the version the instance now carries.
    ///
    /// The version is incremented when a versioned attribute or a
    /// collection is dirty, or when dirtiness is unknown. A nullable
    /// secondary row is inserted when its state stops being all null and
    /// deleted when it becomes all null.
    pub fn update(&self, request: UpdateRequest, ctx: &mut ExecutionContext<'_>) -> Result<Option<Value>> {
        let entity = self.descriptor.name();
        if !self.hierarchy.is_mutable() {
            return Err(Error::unsupported("update", format!("immutable entity {entity}")));
        }
        self.descriptor.check_state(&request.state)?;
        if let Some(previous) = &request.previous_state {
            self.descriptor.check_state(previous)?;
        }
        let UpdateRequest {
            id,
            mut state,
            previous_state,
            previous_version,
            row_id,
            dirty_fields,
            has_dirty_collection,
        } = request;

        let dirty = match (dirty_fields, &previous_state) {
            (Some(fields), _) => Some(fields),
            (None, Some(previous)) => {
                Some(find_dirty(self.descriptor.attributes(), previous, &state).unwrap_or_default())
            }
            (None, None) => None,
        };

        let version_position = self.descriptor.version_position();
        let previous_version = previous_version.or_else(|| version_position.map(|p| state[p].clone()));
        let mut version_incremented = false;
        if let (Some(position), Some(version)) = (version_position, self.hierarchy.version()) {
            let required = match &dirty {
                Some(fields) => is_version_increment_required(
                    fields,
                    has_dirty_collection,
                    &self.descriptor.versionability(),
                ),
                None => true,
            };
            if required {
                state[position] = version.increment(previous_version.as_ref().unwrap_or(&Value::Null))?;
                version_incremented = true;
            }
        }

        tracing::debug!(entity, id = %id.loggable(), ?dirty, "updating entity");
        let prepared = PreparedUpdate {
            id: &id,
            state: &state,
            previous_state: previous_state.as_deref(),
            previous_version: previous_version.as_ref(),
            row_id: row_id.as_ref(),
            dirty: dirty.as_deref(),
            version_incremented,
        };
        for table in self.descriptor.tables() {
            if table.is_inverse() || !self.needs_update(table, &prepared) {
                continue;
            }
            self.update_table(table, &prepared, ctx)?;
        }
        self.statistics.update_entity(entity);
        self.evict(&id, ctx)?;
        Ok(version_position.map(|p| state[p].clone()))
    }

    /// Attributes whose columns in `table` get written.
    fn written_attributes<'a>(
        &'a self,
        table: &'a EntityTable,
        update: &'a PreparedUpdate<'a>,
    ) -> impl Iterator<Item = &'a Attribute> + 'a {
        let dynamic = self.descriptor.is_dynamic_update();
        let version_position = self.descriptor.version_position();
        self.descriptor
            .attributes()
            .iter()
            .filter(move |a| a.updatable && a.has_column_in(&table.name))
            .filter(move |a| !update.state[a.position].is_unfetched())
            .filter(move |a| match (dynamic, update.dirty) {
                (true, Some(dirty)) => {
                    dirty.contains(&a.position)
                        || (update.version_incremented && Some(a.position) == version_position)
                }
                _ => true,
            })
    }

    fn needs_update(&self, table: &EntityTable, update: &PreparedUpdate<'_>) -> bool {
        let bumps_version = update.version_incremented
            && self
                .descriptor
                .version_column()
                .is_some_and(|c| c.belongs_to(&table.name));
        let attributes = self.descriptor.attributes();
        match update.dirty {
            None => bumps_version || self.written_attributes(table, update).next().is_some(),
            Some(dirty) => {
                bumps_version
                    || dirty.iter().any(|&i| {
                        attributes
                            .get(i)
                            .is_some_and(|a| a.updatable && a.has_column_in(&table.name))
                    })
            }
        }
    }

    fn update_table(
        &self,
        table: &EntityTable,
        update: &PreparedUpdate<'_>,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<()> {
        if self.is_nullable(table) {
            let was_null = update
                .previous_state
                .map(|previous| self.descriptor.is_all_null(previous, &table.name))
                .transpose()?;
            // Unfetched columns are unknown, not null.
            let is_null = !self.has_unfetched(update.state, table)
                && self.descriptor.is_all_null(update.state, &table.name)?;
            match (was_null, is_null) {
                (Some(true), true) => return Ok(()),
                (Some(true), false) => return self.insert_table(update.id, update.state, table, ctx),
                (Some(false) | None, true) => {
                    return self.delete_table(table, &DeleteRequest::new(update.id.clone()), ctx);
                }
                (_, false) => {}
            }
        }
        let present = self.update_row(table, update, ctx)?;
        if !present && !self.descriptor.is_all_null(update.state, &table.name)? {
            tracing::debug!(table = %table.name, "no row to update, inserting instead");
            self.insert_table(update.id, update.state, table, ctx)?;
        }
        Ok(())
    }

    fn has_unfetched(&self, state: &[Value], table: &EntityTable) -> bool {
        self.descriptor
            .attributes()
            .iter()
            .filter(|a| a.has_column_in(&table.name))
            .any(|a| state[a.position].is_unfetched())
    }

    fn update_row(
        &self,
        table: &EntityTable,
        update: &PreparedUpdate<'_>,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<bool> {
        let mut sql = Update::new(&table.name);
        let mut assigned: Vec<&str> = Vec::new();
        let mut bindings = Vec::new();

        let mut values = Vec::new();
        for attribute in self.written_attributes(table, update) {
            attribute.dehydrate(&update.state[attribute.position], Clause::Update, &mut values)?;
        }
        for value in values.into_iter().filter(|v| v.column.belongs_to(&table.name)) {
            if assigned.contains(&value.column.name.as_str()) {
                continue;
            }
            assigned.push(&value.column.name);
            sql.add_column(&value.column.name);
            bindings.push(binding(value.value, value.column));
        }
        if !sql.has_assignments() {
            return Ok(true);
        }

        match self.locate(table, update.id, update.row_id)? {
            RowLocator::RowId(column, value) => {
                sql.add_restriction(Restriction::bound(column));
                bindings.push(value);
            }
            RowLocator::Key(keys) => {
                let columns: Vec<String> = keys.iter().map(|(c, _)| c.clone()).collect();
                sql.add_primary_key_columns(&columns);
                bindings.extend(keys.into_iter().map(|(_, b)| b));
            }
        }
        let conditions =
            self.lock_conditions(table, update.previous_state, update.previous_version, update.dirty)?;
        for restriction in conditions.restrictions {
            sql.add_restriction(restriction);
        }
        bindings.extend(conditions.bindings);
        if let Some((column, value)) = conditions.version {
            sql.set_version_column_name(column);
            bindings.push(value);
        }

        sql.set_parameter_markers(self.settings.parameter_markers);
        if let Some(comment) = self.comment("update") {
            sql.set_comment(comment);
        }
        let mutation = JdbcMutation::new(sql.to_statement_string(), bindings, &table.name);
        self.execute(
            ctx,
            &mutation,
            Expectation::appropriate(table.update_check),
            update.id,
            self.is_nullable(table),
        )
    }

    /// Bumps the version of an otherwise unchanged row, checking the
    /// current version on the way. Returns the new version.
    pub fn force_version_increment(
        &self,
        id: &Value,
        current: &Value,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<Value> {
        let entity = self.descriptor.name();
        let (Some(version), Some(column)) = (self.hierarchy.version(), self.descriptor.version_column()) else {
            return Err(Error::unsupported(
                "force_version_increment",
                format!("unversioned entity {entity}"),
            ));
        };
        let table = self.descriptor.table(&column.table).ok_or_else(|| {
            Error::modeling(format!("version column of {entity} is not in any of its tables"))
        })?;
        let next = version.increment(current)?;
        tracing::debug!(entity, id = %id.loggable(), next = %next.loggable(), "forcing version increment");

        let mut sql = Update::new(&table.name);
        sql.add_column(&column.name);
        let mut bindings = vec![binding(next.clone(), column)];
        let keys = self.key_bindings(id, table)?;
        let columns: Vec<String> = keys.iter().map(|(c, _)| c.clone()).collect();
        sql.add_primary_key_columns(&columns);
        bindings.extend(keys.into_iter().map(|(_, b)| b));
        sql.set_version_column_name(&column.name);
        bindings.push(binding(current.clone(), column));

        sql.set_parameter_markers(self.settings.parameter_markers);
        if let Some(comment) = self.comment("forced version increment") {
            sql.set_comment(comment);
        }
        let mutation = JdbcMutation::new(sql.to_statement_string(), bindings, &table.name);
        self.execute(ctx, &mutation, Expectation::appropriate(table.update_check), id, false)?;
        self.evict(id, ctx)?;
        Ok(next)
    }
}
