use super::{EntityPersister, binding};
use crate::error::{Error, Result};
use crate::jdbc::{Expectation, JdbcMutation};
use crate::model::{Clause, EntityTable, TableKind};
use crate::session::ExecutionContext;
use crate::sql::Insert;
use crate::types::Value;

impl EntityPersister {
    /// Inserts one row per table of the entity, in table order, and returns
    /// the identifier used. A missing `id` is drawn from the generator.
    ///
    /// Inverse secondary tables are never written; a secondary row whose
    /// columns would all be null is skipped.
    pub fn insert(
        &self,
        id: Option<Value>,
        state: &[Value],
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<Value> {
        let entity = self.descriptor.name();
        self.descriptor.check_state(state)?;
        let id = match id.filter(|v| !v.is_null()) {
            Some(id) => id,
            None => self.hierarchy.identifier().generate()?.ok_or_else(|| {
                Error::modeling(format!("no identifier supplied for {entity} and none is generated"))
            })?,
        };
        tracing::debug!(entity, id = %id.loggable(), "inserting entity");
        for table in self.descriptor.tables() {
            self.insert_table(&id, state, table, ctx)?;
        }
        self.statistics.insert_entity(entity);
        Ok(id)
    }

    pub(super) fn insert_table(
        &self,
        id: &Value,
        state: &[Value],
        table: &EntityTable,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<()> {
        if table.is_secondary() {
            if table.is_inverse() {
                return Ok(());
            }
            if self.descriptor.is_all_null(state, &table.name)? {
                tracing::trace!(table = %table.name, "all columns null, no secondary row inserted");
                return Ok(());
            }
        }

        let mut insert = Insert::new(self.settings.dialect, &table.name);
        let mut columns: Vec<String> = Vec::new();
        let mut bindings = Vec::new();
        let mut add = |name: &str, value| {
            if !columns.iter().any(|c| c == name) {
                insert.add_column(name);
                columns.push(name.to_string());
                bindings.push(value);
            }
        };

        for (column, value) in self.key_bindings(id, table)? {
            add(&column, value);
        }
        if table.kind == TableKind::Primary {
            if let Some(discriminator) = self.hierarchy.discriminator() {
                if discriminator.insertable && !discriminator.column.is_derived() {
                    if let Some(value) = discriminator.insert_value(self.descriptor.name())? {
                        add(&discriminator.column.name, binding(value, &discriminator.column));
                    }
                }
            }
        }
        if let Some((column, value)) = self.tenant_binding(ctx)? {
            add(&column, value);
        }

        let mut values = Vec::new();
        for attribute in self.descriptor.attributes().iter().filter(|a| a.has_column_in(&table.name)) {
            attribute.dehydrate(&state[attribute.position], Clause::Insert, &mut values)?;
        }
        for value in values.into_iter().filter(|v| v.column.belongs_to(&table.name)) {
            if self.descriptor.is_dynamic_insert() && value.value.is_null() {
                continue;
            }
            add(&value.column.name, binding(value.value, value.column));
        }

        insert.set_parameter_markers(self.settings.parameter_markers);
        if let Some(comment) = self.comment("insert") {
            insert.set_comment(comment);
        }
        let mutation = JdbcMutation::new(insert.to_statement_string()?, bindings, &table.name);
        self.execute(ctx, &mutation, Expectation::appropriate(table.insert_check), id, false)?;
        Ok(())
    }
}
