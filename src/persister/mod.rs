//! Entity persisters: the statements that insert, update, delete, lock and
//! load one entity type, and the bindings that go with them.
//!
//! A persister works against the tables of its [`EntityDescriptor`], in the
//! descriptor's table order. Row counts are verified per table; a missing
//! row is tolerated only for nullable secondary tables.

mod delete;
mod dirty;
mod insert;
mod load;
mod update;

pub use delete::DeleteRequest;
pub use dirty::find_dirty;
pub use load::LoadedEntity;
pub use update::UpdateRequest;

use crate::cache::{CacheEntry, EntityCacheKey};
use crate::error::{Error, Result, info_string};
use crate::jdbc::{
    Expectation, JdbcMutation, JdbcParameterBinding, MutationExecutor, OutcomeError,
    standard_preparer,
};
use crate::model::{Clause, Column, EntityDescriptor, EntityHierarchy, EntityTable, OptimisticLockStyle};
use crate::session::ExecutionContext;
use crate::settings::Settings;
use crate::sql::{FunctionRegistry, Restriction};
use crate::stats::Statistics;
use crate::types::Value;
use std::sync::Arc;

/// A column name and the value bound for it.
type BoundColumn = (String, JdbcParameterBinding);

#[derive(Debug)]
pub struct EntityPersister {
    descriptor: Arc<EntityDescriptor>,
    hierarchy: Arc<EntityHierarchy>,
    /// What a row read through this persister may turn out to be: this
    /// entity first, then its descendants depth-first.
    polymorphic: Vec<Arc<EntityDescriptor>>,
    settings: Arc<Settings>,
    statistics: Arc<Statistics>,
    functions: FunctionRegistry,
}

impl EntityPersister {
    pub fn new(
        descriptor: Arc<EntityDescriptor>,
        descendants: Vec<Arc<EntityDescriptor>>,
        hierarchy: Arc<EntityHierarchy>,
        settings: Arc<Settings>,
        statistics: Arc<Statistics>,
    ) -> Self {
        let mut polymorphic = vec![Arc::clone(&descriptor)];
        polymorphic.extend(descendants);
        Self {
            functions: FunctionRegistry::for_dialect(settings.dialect),
            descriptor,
            hierarchy,
            polymorphic,
            settings,
            statistics,
        }
    }

    /// One persister per descriptor of a hierarchy, in descriptor order.
    pub fn for_hierarchy(
        descriptors: Vec<EntityDescriptor>,
        hierarchy: Arc<EntityHierarchy>,
        settings: Arc<Settings>,
        statistics: Arc<Statistics>,
    ) -> Vec<Self> {
        let descriptors: Vec<Arc<EntityDescriptor>> = descriptors.into_iter().map(Arc::new).collect();
        descriptors
            .iter()
            .map(|descriptor| {
                let descendants = descriptor
                    .subclass_names()
                    .iter()
                    .filter_map(|name| descriptors.iter().find(|d| d.name() == name))
                    .cloned()
                    .collect();
                Self::new(
                    Arc::clone(descriptor),
                    descendants,
                    Arc::clone(&hierarchy),
                    Arc::clone(&settings),
                    Arc::clone(&statistics),
                )
            })
            .collect()
    }

    pub fn entity_name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn descriptor(&self) -> &EntityDescriptor {
        &self.descriptor
    }

    pub fn hierarchy(&self) -> &EntityHierarchy {
        &self.hierarchy
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    /// `Some(true)` for an instance that was never saved, `Some(false)` for
    /// a persistent one, `None` when only the database can tell.
    pub fn is_transient(&self, id: Option<&Value>, version: Option<&Value>) -> Option<bool> {
        if let (Some(descriptor), Some(version)) = (self.hierarchy.version(), version) {
            if let Some(unsaved) = descriptor.is_unsaved(version) {
                return Some(unsaved);
            }
        }
        match id {
            None => Some(true),
            Some(id) if id.is_null_like() => Some(true),
            Some(_) if self.hierarchy.identifier().generator().is_some() => Some(false),
            Some(_) => None,
        }
    }

    pub fn cache_key(&self, id: &Value, tenant: Option<&str>) -> Result<EntityCacheKey> {
        Ok(EntityCacheKey {
            entity: self.descriptor.root_name().to_string(),
            id: self.hierarchy.identifier().unresolve(id)?,
            tenant: tenant.map(str::to_string),
        })
    }

    pub fn build_cache_entry(&self, state: &[Value], version: Option<&Value>) -> Result<CacheEntry> {
        disassemble(&self.descriptor, state, version)
    }

    fn evict(&self, id: &Value, ctx: &ExecutionContext<'_>) -> Result<()> {
        if let Some(access) = self.hierarchy.cache_access() {
            let key = self.cache_key(id, ctx.tenant_id.as_deref())?;
            tracing::trace!(%key, "evicting cache entry");
            access.evict(&key);
        }
        Ok(())
    }

    fn comment(&self, operation: &str) -> Option<String> {
        self.settings
            .use_sql_comments
            .then(|| format!("{operation} {}", self.descriptor.name()))
    }

    /// Secondary tables whose row may legitimately be missing.
    fn is_nullable(&self, table: &EntityTable) -> bool {
        table.is_secondary() && (table.is_optional() || self.settings.jpa_cache_compliance)
    }

    /// The identifier bound to `table`'s key columns, in key order.
    fn key_bindings(&self, id: &Value, table: &EntityTable) -> Result<Vec<BoundColumn>> {
        let mut values = Vec::new();
        self.hierarchy.identifier().dehydrate(id, Clause::Where, &mut values)?;
        let key = self.descriptor.key_of(table)?;
        values
            .into_iter()
            .map(|value| {
                let column = key.find_referring_column(value.column).ok_or_else(|| {
                    Error::modeling(format!(
                        "identifier column {} has no counterpart in table {}",
                        value.column.name, table.name
                    ))
                })?;
                Ok((column.name.clone(), binding(value.value, column)))
            })
            .collect()
    }

    fn tenant_binding(&self, ctx: &ExecutionContext<'_>) -> Result<Option<BoundColumn>> {
        let (Some(column), Some(tenant)) = (self.descriptor.tenant_column(), self.hierarchy.tenant()) else {
            return Ok(None);
        };
        let value = tenant.unresolve(ctx.tenant_id.as_deref())?;
        Ok(Some((column.name.clone(), binding(value, column))))
    }

    /// How an UPDATE or DELETE finds its row: by row id when one was read
    /// and the table declares it, by key otherwise.
    fn locate(&self, table: &EntityTable, id: &Value, row_id: Option<&Value>) -> Result<RowLocator> {
        if let (Some(value), Some(column), Some(descriptor)) =
            (row_id, table.row_id.as_ref(), self.hierarchy.row_id())
        {
            return Ok(RowLocator::RowId(
                column.clone(),
                JdbcParameterBinding {
                    value: value.clone(),
                    ty: descriptor.column.expressable.clone(),
                },
            ));
        }
        Ok(RowLocator::Key(self.key_bindings(id, table)?))
    }

    /// Optimistic-lock conditions for a mutation of `table`.
    ///
    /// Version locking compares the version column where it lives. Dirty
    /// and all locking compare previous values: the dirty style only those
    /// of `fields` when given.
    fn lock_conditions(
        &self,
        table: &EntityTable,
        previous_state: Option<&[Value]>,
        previous_version: Option<&Value>,
        fields: Option<&[usize]>,
    ) -> Result<LockConditions> {
        let mut conditions = LockConditions::default();
        let style = self.hierarchy.optimistic_lock_style();
        match style {
            OptimisticLockStyle::None => {}
            OptimisticLockStyle::Version => {
                if let (Some(column), Some(version)) = (self.descriptor.version_column(), previous_version) {
                    if column.belongs_to(&table.name) {
                        conditions.version = Some((column.name.clone(), binding(version.clone(), column)));
                    }
                }
            }
            OptimisticLockStyle::Dirty | OptimisticLockStyle::All => {
                let Some(previous) = previous_state else {
                    return Ok(conditions);
                };
                let selected = |position: usize| match (style, fields) {
                    (OptimisticLockStyle::Dirty, Some(fields)) => fields.contains(&position),
                    _ => true,
                };
                let mut values = Vec::new();
                for attribute in self.descriptor.attributes().iter().filter(|a| {
                    a.versionable && a.has_column_in(&table.name) && selected(a.position)
                }) {
                    let old = &previous[attribute.position];
                    if !old.is_unfetched() {
                        attribute.dehydrate(old, Clause::Where, &mut values)?;
                    }
                }
                for value in values
                    .into_iter()
                    .filter(|v| v.column.belongs_to(&table.name) && !v.column.is_derived())
                {
                    if value.value.is_null() {
                        conditions
                            .restrictions
                            .push(Restriction::new(&value.column.name, "is null", ""));
                    } else {
                        conditions.restrictions.push(Restriction::bound(&value.column.name));
                        conditions.bindings.push(binding(value.value, value.column));
                    }
                }
            }
        }
        Ok(conditions)
    }

    /// Executes `mutation` and verifies its row count. Returns whether the
    /// row was there; `false` only ever comes back for `nullable` tables.
    fn execute(
        &self,
        ctx: &mut ExecutionContext<'_>,
        mutation: &JdbcMutation,
        expectation: Expectation,
        id: &Value,
        nullable: bool,
    ) -> Result<bool> {
        let mut present = true;
        MutationExecutor.execute(mutation, &mut *ctx.connection, standard_preparer, |rows| {
            present = self.check(expectation, rows, id, mutation.affected_table(), nullable)?;
            Ok(())
        })?;
        Ok(present)
    }

    fn check(
        &self,
        expectation: Expectation,
        rows: u64,
        id: &Value,
        table: &str,
        nullable: bool,
    ) -> Result<bool> {
        let entity = self.descriptor.name();
        match expectation.verify_outcome(rows) {
            Ok(()) => Ok(true),
            Err(OutcomeError::StaleState { .. }) if nullable => {
                tracing::warn!(entity, table, id = %id.loggable(), "no row in nullable table");
                Ok(false)
            }
            Err(err @ OutcomeError::StaleState { .. }) => {
                self.statistics.optimistic_failure(entity);
                tracing::debug!(entity, table, id = %id.loggable(), %err, "stale state");
                Err(Error::StaleObjectState {
                    entity: entity.to_string(),
                    id: id.loggable(),
                })
            }
            Err(OutcomeError::TooManyRows { .. }) => Err(Error::DuplicateIdentifier {
                info: info_string(entity, id),
            }),
        }
    }
}

enum RowLocator {
    RowId(String, JdbcParameterBinding),
    Key(Vec<BoundColumn>),
}

/// Optimistic-lock restrictions in render order, with the version check
/// kept apart since statements render it last.
#[derive(Debug, Default)]
struct LockConditions {
    restrictions: Vec<Restriction>,
    bindings: Vec<JdbcParameterBinding>,
    version: Option<BoundColumn>,
}

fn binding(value: Value, column: &Column) -> JdbcParameterBinding {
    JdbcParameterBinding {
        value,
        ty: column.expressable.clone(),
    }
}

fn disassemble(
    descriptor: &EntityDescriptor,
    state: &[Value],
    version: Option<&Value>,
) -> Result<CacheEntry> {
    descriptor.check_state(state)?;
    let disassembled_state = descriptor
        .attributes()
        .iter()
        .zip(state)
        .map(|(attribute, value)| attribute.unresolve(value))
        .collect::<Result<Vec<_>>>()?;
    Ok(CacheEntry {
        subclass: descriptor.name().to_string(),
        disassembled_state,
        version: version.cloned(),
    })
}

fn assemble(descriptor: &EntityDescriptor, entry: &CacheEntry) -> Result<Vec<Value>> {
    descriptor.check_state(&entry.disassembled_state)?;
    Ok(descriptor
        .attributes()
        .iter()
        .zip(&entry.disassembled_state)
        .map(|(attribute, value)| {
            if attribute.is_collection() {
                Value::Unfetched
            } else {
                attribute.resolve(value)
            }
        })
        .collect())
}
