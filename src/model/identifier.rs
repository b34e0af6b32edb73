//! Entity identifier variants.

use super::attribute::{Attribute, AttributeKind, Clause, EmbeddableType, JdbcValue, TemporalPrecision};
use super::navigable::{NavigableRole, QueryResult};
use super::table::Column;
use crate::error::{Error, Result};
use crate::sql::ColumnReference;
use crate::types::{SqlExpressableType, Value};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Produces identifier values for new entities.
pub trait IdentifierGenerator: Send + Sync + fmt::Debug {
    fn generate(&self) -> Result<Value>;
}

/// In-memory counter, like `increment` generators: suitable for a single
/// writer process.
#[derive(Debug)]
pub struct IncrementGenerator {
    next: AtomicI64,
    integer: bool,
}

impl IncrementGenerator {
    pub fn new(start: i64) -> Self {
        Self {
            next: AtomicI64::new(start),
            integer: false,
        }
    }

    /// Generates [`Value::Integer`] ids.
    pub fn integer(start: i32) -> Self {
        Self {
            next: AtomicI64::new(i64::from(start)),
            integer: true,
        }
    }
}

impl IdentifierGenerator for IncrementGenerator {
    fn generate(&self) -> Result<Value> {
        let id = self.next.fetch_add(1, Ordering::SeqCst);
        if self.integer {
            let id = i32::try_from(id)
                .map_err(|_| Error::modeling(format!("increment generator overflowed at {id}")))?;
            Ok(Value::Integer(id))
        } else {
            Ok(Value::Long(id))
        }
    }
}

#[derive(Debug, Clone)]
pub enum EntityIdentifier {
    /// One basic attribute over one column.
    Simple {
        attribute: Attribute,
        generator: Option<Arc<dyn IdentifierGenerator>>,
    },
    /// One embedded attribute representing the whole id.
    CompositeAggregated {
        attribute: Attribute,
        generator: Option<Arc<dyn IdentifierGenerator>>,
    },
    /// Id attributes declared directly on the entity, grouped by a virtual
    /// embeddable. Cannot be generated.
    CompositeNonAggregated {
        role: NavigableRole,
        embeddable: EmbeddableType,
    },
}

impl EntityIdentifier {
    pub fn role(&self) -> &NavigableRole {
        match self {
            Self::Simple { attribute, .. } | Self::CompositeAggregated { attribute, .. } => {
                &attribute.role
            }
            Self::CompositeNonAggregated { role, .. } => role,
        }
    }

    pub fn columns(&self) -> Vec<&Column> {
        match self {
            Self::Simple { attribute, .. } | Self::CompositeAggregated { attribute, .. } => {
                attribute.columns()
            }
            Self::CompositeNonAggregated { embeddable, .. } => embeddable.columns(),
        }
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name.clone()).collect()
    }

    pub fn jdbc_type_count(&self) -> usize {
        self.columns().len()
    }

    pub fn has_single_id_attribute(&self) -> bool {
        !matches!(self, Self::CompositeNonAggregated { .. })
    }

    pub fn single_id_attribute(&self) -> Result<&Attribute> {
        match self {
            Self::Simple { attribute, .. } | Self::CompositeAggregated { attribute, .. } => {
                Ok(attribute)
            }
            Self::CompositeNonAggregated { role, .. } => Err(Error::modeling(format!(
                "non-aggregated composite identifier of {} has no single id attribute",
                role.parent().unwrap_or_else(|| role.clone())
            ))),
        }
    }

    pub fn generator(&self) -> Option<&Arc<dyn IdentifierGenerator>> {
        match self {
            Self::Simple { generator, .. } | Self::CompositeAggregated { generator, .. } => {
                generator.as_ref()
            }
            Self::CompositeNonAggregated { .. } => None,
        }
    }

    /// A fresh id, or `None` when ids are assigned by the application.
    pub fn generate(&self) -> Result<Option<Value>> {
        match self {
            Self::CompositeNonAggregated { role, .. } => Err(Error::unsupported(
                "generate",
                format!("non-aggregated composite identifier {role}"),
            )),
            _ => self.generator().map(|g| g.generate()).transpose(),
        }
    }

    pub fn unresolve(&self, id: &Value) -> Result<Value> {
        match self {
            Self::Simple { attribute, .. } | Self::CompositeAggregated { attribute, .. } => {
                attribute.unresolve(id)
            }
            Self::CompositeNonAggregated { embeddable, .. } => embeddable.unresolve(id),
        }
    }

    /// Builds the identifier from its extracted column values.
    pub fn resolve_hydrated_state(&self, row: &[Value]) -> Result<Value> {
        match self {
            Self::Simple { attribute, .. } => attribute.hydrate(row),
            Self::CompositeAggregated { attribute, .. } => match &attribute.kind {
                AttributeKind::Embedded(embeddable) => embeddable.hydrate(row),
                _ => attribute.hydrate(row),
            },
            Self::CompositeNonAggregated { embeddable, .. } => embeddable.hydrate(row),
        }
    }

    pub fn dehydrate<'a>(
        &'a self,
        id: &Value,
        clause: Clause,
        out: &mut Vec<JdbcValue<'a>>,
    ) -> Result<()> {
        let unresolved = self.unresolve(id)?;
        if unresolved.is_null() {
            return Err(Error::modeling(format!("null identifier for {}", self.role())));
        }
        tracing::trace!(role = %self.role(), ?clause, "dehydrating identifier");
        // id columns apply to every clause, whatever the attribute flags say
        match self {
            Self::Simple { attribute, .. } | Self::CompositeAggregated { attribute, .. } => {
                attribute.dehydrate(&unresolved, Clause::Where, out)
            }
            Self::CompositeNonAggregated { embeddable, .. } => {
                embeddable.dehydrate(&unresolved, Clause::Where, out)
            }
        }
    }

    pub fn resolve_temporal_precision(
        &self,
        precision: TemporalPrecision,
    ) -> Result<SqlExpressableType> {
        match self {
            Self::Simple { attribute, .. } => attribute.resolve_temporal_precision(precision),
            _ => Err(Error::modeling(format!(
                "composite identifier {} cannot be treated as a temporal parameter",
                self.role()
            ))),
        }
    }

    pub fn create_query_result(&self, alias: &str) -> QueryResult {
        QueryResult {
            role: self.role().clone(),
            columns: self
                .columns()
                .into_iter()
                .map(|c| ColumnReference::new(alias, c.name.clone()))
                .collect(),
        }
    }
}
