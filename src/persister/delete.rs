use super::{EntityPersister, RowLocator};
use crate::error::Result;
use crate::jdbc::{Expectation, JdbcMutation};
use crate::model::EntityTable;
use crate::session::ExecutionContext;
use crate::sql::{Delete, Restriction};
use crate::types::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteRequest {
    pub id: Value,
    /// Version the instance was read with, checked under version locking.
    pub version: Option<Value>,
    /// Last known state, compared under dirty and all locking.
    pub previous_state: Option<Vec<Value>>,
    pub row_id: Option<Value>,
}

impl DeleteRequest {
    pub fn new(id: Value) -> Self {
        Self {
            id,
            version: None,
            previous_state: None,
            row_id: None,
        }
    }

    pub fn with_version(mut self, version: Value) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_previous_state(mut self, previous_state: Vec<Value>) -> Self {
        self.previous_state = Some(previous_state);
        self
    }

    pub fn with_row_id(mut self, row_id: Value) -> Self {
        self.row_id = Some(row_id);
        self
    }
}

impl EntityPersister {
    /// Deletes the entity's rows: secondary tables first, then the
    /// inheritance chain from the leaf table up to the root.
    pub fn delete(&self, request: &DeleteRequest, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        let entity = self.descriptor.name();
        if let Some(previous) = &request.previous_state {
            self.descriptor.check_state(previous)?;
        }
        tracing::debug!(entity, id = %request.id.loggable(), "deleting entity");

        let secondaries: Vec<&EntityTable> =
            self.descriptor.secondary_tables().filter(|t| !t.is_inverse()).collect();
        for table in secondaries.into_iter().rev() {
            self.delete_table(table, request, ctx)?;
        }
        let chain: Vec<&EntityTable> = self.descriptor.chain_tables().collect();
        for table in chain.into_iter().rev() {
            self.delete_table(table, request, ctx)?;
        }
        self.statistics.delete_entity(entity);
        self.evict(&request.id, ctx)
    }

    pub(super) fn delete_table(
        &self,
        table: &EntityTable,
        request: &DeleteRequest,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<()> {
        let mut sql = Delete::new(&table.name);
        let mut bindings = Vec::new();
        match self.locate(table, &request.id, request.row_id.as_ref())? {
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
        let conditions = self.lock_conditions(
            table,
            request.previous_state.as_deref(),
            request.version.as_ref(),
            None,
        )?;
        for restriction in conditions.restrictions {
            sql.add_restriction(restriction);
        }
        bindings.extend(conditions.bindings);
        if let Some((column, value)) = conditions.version {
            sql.set_version_column_name(column);
            bindings.push(value);
        }

        sql.set_parameter_markers(self.settings.parameter_markers);
        if let Some(comment) = self.comment("delete") {
            sql.set_comment(comment);
        }
        let mutation = JdbcMutation::new(sql.to_statement_string(), bindings, &table.name);
        self.execute(
            ctx,
            &mutation,
            Expectation::appropriate(table.delete_check),
            &request.id,
            self.is_nullable(table),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{build, build_with, person};
    use super::*;
    use crate::boot::{ColumnSource, JoinMapping, PropertyMapping, SubclassKind, SubclassMapping};
    use crate::cache::{CacheRegionFactory, EntityCacheAccess, InMemoryRegionFactory};
    use crate::error::Error;
    use crate::jdbc::recording::RecordingConnection;
    use crate::settings::Settings;
    use crate::types::DomainType;
    use std::sync::Arc;

    #[test]
    fn test_delete_order_and_version_check() {
        let mapping = person()
            .with_version(PropertyMapping::basic("ver", ColumnSource::new("ver", DomainType::Integer)))
            .with_join(
                JoinMapping::new("person_detail", vec!["person_id".to_string()])
                    .with_property(PropertyMapping::basic("bio", ColumnSource::new("bio", DomainType::String))),
            )
            .with_subclass(SubclassMapping::new(
                "Employee",
                SubclassKind::Joined {
                    table: "employee".to_string(),
                    key_columns: vec!["person_id".to_string()],
                },
            ));
        let persisters = build(&mapping);
        let mut conn = RecordingConnection::new();
        let mut ctx = ExecutionContext::new(&mut conn);
        let request = DeleteRequest::new(Value::Long(9)).with_version(Value::Integer(2));
        persisters[1].delete(&request, &mut ctx).unwrap();
        assert_eq!(
            conn.sql(),
            vec![
                "delete from person_detail where person_id=?",
                "delete from employee where person_id=?",
                "delete from person where ID=? and ver=?"
            ]
        );
        assert_eq!(conn.statements()[2].values(), vec![Value::Long(9), Value::Integer(2)]);
    }

    #[test]
    fn test_missing_row_is_stale() {
        let persister = &build(&person())[0];
        let conn = RecordingConnection::new();
        conn.push_row_count(0);
        let mut handle = conn.clone();
        let mut ctx = ExecutionContext::new(&mut handle);
        let err = persister.delete(&DeleteRequest::new(Value::Long(1)), &mut ctx).unwrap_err();
        assert!(matches!(err, Error::StaleObjectState { .. }));
    }

    #[test]
    fn test_missing_optional_row_is_tolerated() {
        let mapping = person().with_join(
            JoinMapping::new("person_detail", vec!["person_id".to_string()])
                .optional()
                .with_property(PropertyMapping::basic("bio", ColumnSource::new("bio", DomainType::String))),
        );
        let persister = &build(&mapping)[0];
        let conn = RecordingConnection::new();
        conn.push_row_count(0);
        let mut handle = conn.clone();
        let mut ctx = ExecutionContext::new(&mut handle);
        persister.delete(&DeleteRequest::new(Value::Long(1)), &mut ctx).unwrap();
        assert_eq!(conn.sql().len(), 2);
    }

    #[test]
    fn test_row_id_locates_the_row() {
        let mut mapping = person();
        mapping.row_id = Some("rowid".to_string());
        let persister = &build(&mapping)[0];
        let mut conn = RecordingConnection::new();
        let mut ctx = ExecutionContext::new(&mut conn);
        let request = DeleteRequest::new(Value::Long(1)).with_row_id(Value::text("AAAx"));
        persister.delete(&request, &mut ctx).unwrap();
        assert_eq!(conn.sql(), vec!["delete from person where rowid=?"]);
        assert_eq!(conn.statements()[0].values(), vec![Value::text("AAAx")]);
    }

    #[test]
    fn test_delete_evicts_cached_state() {
        let mut mapping = person();
        mapping.cache_region = Some("people".to_string());
        let factory = Arc::new(InMemoryRegionFactory::new());
        let persister = &build_with(
            &mapping,
            Settings::default(),
            Some(Arc::clone(&factory) as Arc<dyn CacheRegionFactory>),
        )[0];
        let key = persister.cache_key(&Value::Long(1), None).unwrap();
        let entry = persister.build_cache_entry(&[Value::text("Ann")], None).unwrap();
        let region = factory.entity_access("people").unwrap();
        region.put(&key, entry);

        let mut conn = RecordingConnection::new();
        let mut ctx = ExecutionContext::new(&mut conn);
        persister.delete(&DeleteRequest::new(Value::Long(1)), &mut ctx).unwrap();
        assert!(region.get(&key).is_none());
    }
}
