//! Runtime metamodel: hierarchies, entities, attributes and the tables
//! they bind to. Built once from boot mappings and shared read-only.

mod attribute;
mod context;
mod discriminator;
mod entity;
mod hierarchy;
mod identifier;
mod natural_id;
mod navigable;
mod row_id;
mod table;
mod tenant;
mod version;

pub use attribute::{
    Attribute, AttributeKind, Clause, EmbeddableType, JdbcValue, TemporalPrecision,
};
pub use context::CreationContext;
pub use discriminator::{DiscriminatorDescriptor, DiscriminatorMappings, DiscriminatorValue};
pub use entity::EntityDescriptor;
pub use hierarchy::{
    EntityHierarchy, EntityHierarchyBuilder, InheritanceStrategy, OptimisticLockStyle,
    RepresentationMode,
};
pub use identifier::{EntityIdentifier, IdentifierGenerator, IncrementGenerator};
pub use natural_id::{NaturalIdAttribute, NaturalIdDescriptor, PersistenceType};
pub use navigable::{
    DISCRIMINATOR_NAME, IDENTIFIER_NAME, NATURAL_ID_NAME, Navigable, NavigableRole,
    NavigableVisitor, QueryResult, ROW_ID_NAME, TENANT_NAME,
};
pub use row_id::RowIdDescriptor;
pub use table::{Column, ColumnMapping, EntityTable, ForeignKey, ROW_ID_COLUMN, TableKind};
pub use tenant::TenantDiscrimination;
pub use version::{UnsavedValue, VersionDescriptor, is_version_increment_required};
