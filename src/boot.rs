//! Boot-time mapping metadata, as handed over by whatever reads the
//! application's mappings. Everything here is plain data; the runtime
//! model is derived from it by [`RuntimeModel::build`](crate::RuntimeModel::build).

use crate::jdbc::ResultCheckStyle;
use crate::model::{IdentifierGenerator, OptimisticLockStyle, RepresentationMode};
use crate::types::DomainType;
use std::sync::Arc;

/// A mapped column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSource {
    pub name: String,
    /// Owning table; defaults to the table of the surrounding mapping.
    pub table: Option<String>,
    pub domain: DomainType,
    /// Declared SQL type, e.g. `varchar(40)`; mapped through the dialect.
    pub sql_type: Option<String>,
    pub nullable: bool,
    pub formula: Option<String>,
}

impl ColumnSource {
    pub fn new(name: impl Into<String>, domain: DomainType) -> Self {
        Self {
            name: name.into(),
            table: None,
            domain,
            sql_type: None,
            nullable: true,
            formula: None,
        }
    }

    pub fn formula(expression: impl Into<String>, domain: DomainType) -> Self {
        let expression = expression.into();
        Self {
            formula: Some(expression.clone()),
            ..Self::new(expression, domain)
        }
    }

    pub fn with_sql_type(mut self, sql_type: impl Into<String>) -> Self {
        self.sql_type = Some(sql_type.into());
        self
    }

    pub fn in_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddableMapping {
    pub name: String,
    pub properties: Vec<PropertyMapping>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValueMapping {
    Basic(ColumnSource),
    Embedded(EmbeddableMapping),
    ManyToOne {
        target_entity: String,
        columns: Vec<ColumnSource>,
    },
    Collection {
        role: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyMapping {
    pub name: String,
    pub value: ValueMapping,
    pub insertable: bool,
    pub updatable: bool,
    pub optimistic_locked: bool,
    pub natural_id: bool,
    pub lazy: bool,
    pub optional: bool,
}

impl PropertyMapping {
    pub fn new(name: impl Into<String>, value: ValueMapping) -> Self {
        Self {
            name: name.into(),
            value,
            insertable: true,
            updatable: true,
            optimistic_locked: true,
            natural_id: false,
            lazy: false,
            optional: true,
        }
    }

    pub fn basic(name: impl Into<String>, column: ColumnSource) -> Self {
        Self::new(name, ValueMapping::Basic(column))
    }

    pub fn embedded(
        name: impl Into<String>,
        type_name: impl Into<String>,
        properties: Vec<PropertyMapping>,
    ) -> Self {
        Self::new(
            name,
            ValueMapping::Embedded(EmbeddableMapping {
                name: type_name.into(),
                properties,
            }),
        )
    }

    pub fn many_to_one(
        name: impl Into<String>,
        target_entity: impl Into<String>,
        columns: Vec<ColumnSource>,
    ) -> Self {
        Self::new(
            name,
            ValueMapping::ManyToOne {
                target_entity: target_entity.into(),
                columns,
            },
        )
    }

    pub fn collection(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self::new(name, ValueMapping::Collection { role: role.into() })
    }

    pub fn natural_id(mut self) -> Self {
        self.natural_id = true;
        self
    }

    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.insertable = false;
        self.updatable = false;
        self
    }

    pub fn not_updatable(mut self) -> Self {
        self.updatable = false;
        self
    }

    pub fn excluded_from_optimistic_lock(mut self) -> Self {
        self.optimistic_locked = false;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub enum GeneratorMapping {
    /// Ids are supplied by the application.
    #[default]
    Assigned,
    Increment {
        start: i64,
    },
    Custom(Arc<dyn IdentifierGenerator>),
}

#[derive(Debug, Clone)]
pub struct IdentifierMapping {
    /// The id property; basic for simple ids, embedded for aggregated ones.
    pub property: Option<PropertyMapping>,
    /// Virtual embeddable grouping id properties declared on the entity
    /// itself (non-aggregated composite id).
    pub embedded_identifier: Option<EmbeddableMapping>,
    pub generator: GeneratorMapping,
}

impl IdentifierMapping {
    pub fn simple(property: PropertyMapping, generator: GeneratorMapping) -> Self {
        Self {
            property: Some(property),
            embedded_identifier: None,
            generator,
        }
    }

    pub fn non_aggregated(embeddable: EmbeddableMapping) -> Self {
        Self {
            property: None,
            embedded_identifier: Some(embeddable),
            generator: GeneratorMapping::Assigned,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiscriminatorMapping {
    pub column: ColumnSource,
    pub forced: bool,
    pub insertable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VersionMapping {
    pub property: PropertyMapping,
    /// `undefined`, `null`, `negative` or a literal.
    pub unsaved_value: Option<String>,
}

/// A secondary table.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinMapping {
    pub table: String,
    /// Key columns, in identifier column order.
    pub key_columns: Vec<String>,
    pub optional: bool,
    pub inverse: bool,
    pub properties: Vec<PropertyMapping>,
    pub update_check: ResultCheckStyle,
}

impl JoinMapping {
    pub fn new(table: impl Into<String>, key_columns: Vec<String>) -> Self {
        Self {
            table: table.into(),
            key_columns,
            optional: false,
            inverse: false,
            properties: Vec::new(),
            update_check: ResultCheckStyle::Count,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn inverse(mut self) -> Self {
        self.inverse = true;
        self
    }

    pub fn with_property(mut self, property: PropertyMapping) -> Self {
        self.properties.push(property);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubclassKind {
    /// Shares the root table; told apart by the discriminator.
    SingleTable,
    /// Adds its own table keyed by the identifier.
    Joined {
        table: String,
        key_columns: Vec<String>,
    },
    /// Owns a complete table of its own.
    Union {
        table: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubclassMapping {
    pub entity_name: String,
    pub class_name: Option<String>,
    pub kind: SubclassKind,
    pub discriminator_value: Option<String>,
    pub properties: Vec<PropertyMapping>,
    pub joins: Vec<JoinMapping>,
    pub subclasses: Vec<SubclassMapping>,
    pub dynamic_insert: bool,
    pub dynamic_update: bool,
}

impl SubclassMapping {
    pub fn new(entity_name: impl Into<String>, kind: SubclassKind) -> Self {
        Self {
            entity_name: entity_name.into(),
            class_name: None,
            kind,
            discriminator_value: None,
            properties: Vec::new(),
            joins: Vec::new(),
            subclasses: Vec::new(),
            dynamic_insert: false,
            dynamic_update: false,
        }
    }

    pub fn with_discriminator_value(mut self, value: impl Into<String>) -> Self {
        self.discriminator_value = Some(value.into());
        self
    }

    pub fn with_property(mut self, property: PropertyMapping) -> Self {
        self.properties.push(property);
        self
    }
}

#[derive(Debug, Clone)]
pub struct RootClassMapping {
    pub entity_name: String,
    /// Backing class; `None` means a dynamic (map) entity.
    pub class_name: Option<String>,
    pub representation: Option<RepresentationMode>,
    pub table: String,
    /// Row id column declared by the root table.
    pub row_id: Option<String>,
    pub identifier: IdentifierMapping,
    pub discriminator: Option<DiscriminatorMapping>,
    pub discriminator_value: Option<String>,
    pub version: Option<VersionMapping>,
    pub tenant_column: Option<ColumnSource>,
    pub properties: Vec<PropertyMapping>,
    pub joins: Vec<JoinMapping>,
    pub subclasses: Vec<SubclassMapping>,
    pub explicit_polymorphism: bool,
    pub optimistic_lock: OptimisticLockStyle,
    pub mutable: bool,
    /// SQL restriction applied to every load.
    pub where_fragment: Option<String>,
    pub dynamic_insert: bool,
    pub dynamic_update: bool,
    pub cache_region: Option<String>,
    pub natural_id_mutable: bool,
}

impl RootClassMapping {
    pub fn new(
        entity_name: impl Into<String>,
        table: impl Into<String>,
        identifier: IdentifierMapping,
    ) -> Self {
        let entity_name = entity_name.into();
        Self {
            class_name: Some(entity_name.clone()),
            entity_name,
            representation: None,
            table: table.into(),
            row_id: None,
            identifier,
            discriminator: None,
            discriminator_value: None,
            version: None,
            tenant_column: None,
            properties: Vec::new(),
            joins: Vec::new(),
            subclasses: Vec::new(),
            explicit_polymorphism: false,
            optimistic_lock: OptimisticLockStyle::Version,
            mutable: true,
            where_fragment: None,
            dynamic_insert: false,
            dynamic_update: false,
            cache_region: None,
            natural_id_mutable: false,
        }
    }

    pub fn with_property(mut self, property: PropertyMapping) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_join(mut self, join: JoinMapping) -> Self {
        self.joins.push(join);
        self
    }

    pub fn with_subclass(mut self, subclass: SubclassMapping) -> Self {
        self.subclasses.push(subclass);
        self
    }

    pub fn with_discriminator(mut self, column: ColumnSource) -> Self {
        self.discriminator = Some(DiscriminatorMapping {
            column,
            forced: false,
            insertable: true,
        });
        self
    }

    pub fn with_version(mut self, property: PropertyMapping) -> Self {
        self.version = Some(VersionMapping {
            property,
            unsaved_value: None,
        });
        self
    }

    pub fn has_natural_id(&self) -> bool {
        self.properties.iter().any(|p| p.natural_id)
    }
}
