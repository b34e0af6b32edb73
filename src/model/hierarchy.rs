//! One descriptor per inheritance root.
//!
//! Built in two phases: [`EntityHierarchyBuilder::from_boot`] resolves
//! everything the boot mapping determines on its own, then
//! [`EntityHierarchyBuilder::finish_initialization`] injects the natural-id
//! attributes once the root entity's attributes exist. The result is
//! immutable apart from the memoized cache access.

use super::attribute::{Attribute, AttributeKind};
use super::context::CreationContext;
use super::discriminator::{DiscriminatorDescriptor, DiscriminatorMappings, DiscriminatorValue};
use super::identifier::{EntityIdentifier, IdentifierGenerator, IncrementGenerator};
use super::natural_id::{NaturalIdAttribute, NaturalIdDescriptor};
use super::navigable::{
    DISCRIMINATOR_NAME, IDENTIFIER_NAME, NATURAL_ID_NAME, Navigable, NavigableRole, NavigableVisitor,
    ROW_ID_NAME, TENANT_NAME,
};
use super::row_id::RowIdDescriptor;
use super::table::Column;
use super::tenant::TenantDiscrimination;
use super::version::{UnsavedValue, VersionDescriptor};
use crate::boot::{
    GeneratorMapping, IdentifierMapping, RootClassMapping, SubclassKind, SubclassMapping, ValueMapping,
};
use crate::cache::{CacheRegionFactory, EntityCacheAccess};
use crate::error::{Error, Result};
use crate::types::{DomainType, SqlExpressableType, SqlTypeCode};
use std::sync::{Arc, OnceLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InheritanceStrategy {
    None,
    Discriminator,
    Joined,
    Union,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepresentationMode {
    Pojo,
    Map,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptimisticLockStyle {
    None,
    #[default]
    Version,
    /// Compare the previous values of dirty attributes.
    Dirty,
    /// Compare the previous values of every attribute.
    All,
}

impl OptimisticLockStyle {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "none" => Some(Self::None),
            "version" => Some(Self::Version),
            "dirty" => Some(Self::Dirty),
            "all" => Some(Self::All),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct EntityHierarchyBuilder {
    root_entity: String,
    strategy: InheritanceStrategy,
    representation: RepresentationMode,
    optimistic_lock_style: OptimisticLockStyle,
    identifier: EntityIdentifier,
    discriminator: Option<DiscriminatorDescriptor>,
    version: Option<VersionDescriptor>,
    row_id: Option<RowIdDescriptor>,
    tenant: Option<TenantDiscrimination>,
    mutable: bool,
    implicit_polymorphism: bool,
    where_fragment: Option<String>,
    has_natural_id: bool,
    natural_id_mutable: bool,
    cache_region: Option<String>,
    cache_factory: Option<Arc<dyn CacheRegionFactory>>,
}

impl EntityHierarchyBuilder {
    pub fn from_boot(
        mapping: &RootClassMapping,
        ctx: &CreationContext,
        cache_factory: Option<Arc<dyn CacheRegionFactory>>,
    ) -> Result<Self> {
        let root = NavigableRole::new(&mapping.entity_name);
        let strategy = match mapping.subclasses.first().map(|s| &s.kind) {
            None => InheritanceStrategy::None,
            Some(SubclassKind::Union { .. }) => InheritanceStrategy::Union,
            Some(SubclassKind::Joined { .. }) => InheritanceStrategy::Joined,
            Some(SubclassKind::SingleTable) => InheritanceStrategy::Discriminator,
        };

        let identifier = build_identifier(mapping, &root, ctx)?;

        let discriminator = match &mapping.discriminator {
            Some(_) if strategy == InheritanceStrategy::Union => {
                return Err(Error::modeling(format!(
                    "{} uses union subclasses and cannot declare a discriminator",
                    mapping.entity_name
                )));
            }
            Some(boot) => {
                let column = ctx.column(&boot.column, &mapping.table);
                let mappings = discriminator_mappings(mapping, column.expressable.domain_type())?;
                Some(DiscriminatorDescriptor {
                    role: root.append(DISCRIMINATOR_NAME),
                    column,
                    mappings,
                    forced: boot.forced,
                    insertable: boot.insertable,
                })
            }
            None => None,
        };

        let version = match &mapping.version {
            Some(boot) => {
                let attribute =
                    ctx.attribute(&boot.property, &root, mapping.properties.len(), &mapping.table)?;
                let unsaved = match &boot.unsaved_value {
                    Some(raw) => UnsavedValue::parse(raw, &attribute.domain_type())?,
                    None => UnsavedValue::Undefined,
                };
                Some(VersionDescriptor::new(attribute, unsaved)?)
            }
            None => None,
        };

        let row_id = mapping.row_id.as_ref().map(|name| RowIdDescriptor {
            role: root.append(ROW_ID_NAME),
            column: Column::derived(
                &mapping.table,
                name.clone(),
                SqlExpressableType::new(DomainType::String, SqlTypeCode::RowId),
            ),
        });

        let tenant = mapping.tenant_column.as_ref().map(|source| TenantDiscrimination {
            role: root.append(TENANT_NAME),
            column: ctx.column(source, &mapping.table),
        });

        let representation = mapping.representation.unwrap_or(match mapping.class_name {
            Some(_) => RepresentationMode::Pojo,
            None => RepresentationMode::Map,
        });

        Ok(Self {
            root_entity: mapping.entity_name.clone(),
            strategy,
            representation,
            optimistic_lock_style: mapping.optimistic_lock,
            identifier,
            discriminator,
            version,
            row_id,
            tenant,
            mutable: mapping.mutable,
            implicit_polymorphism: !mapping.explicit_polymorphism,
            where_fragment: mapping.where_fragment.clone(),
            has_natural_id: mapping.has_natural_id(),
            natural_id_mutable: mapping.natural_id_mutable,
            cache_region: mapping.cache_region.clone(),
            cache_factory,
        })
    }

    pub fn identifier(&self) -> &EntityIdentifier {
        &self.identifier
    }

    pub fn version(&self) -> Option<&VersionDescriptor> {
        self.version.as_ref()
    }

    pub fn strategy(&self) -> InheritanceStrategy {
        self.strategy
    }

    /// Collects the natural-id attributes of the root entity, in declaration
    /// order, and freezes the hierarchy.
    pub fn finish_initialization(self, root_attributes: &[Attribute]) -> Result<EntityHierarchy> {
        let natural_id = if self.has_natural_id {
            let mut attributes = Vec::new();
            for attribute in root_attributes.iter().filter(|a| a.natural_id) {
                if !attribute.is_singular() {
                    return Err(Error::modeling(format!(
                        "natural id attribute {} must be singular",
                        attribute.role
                    )));
                }
                attributes.push(NaturalIdAttribute {
                    position: attribute.position,
                    attribute: attribute.clone(),
                });
            }
            Some(NaturalIdDescriptor::new(
                NavigableRole::new(&self.root_entity).append(NATURAL_ID_NAME),
                attributes,
                self.natural_id_mutable,
                self.cache_region.clone(),
            ))
        } else {
            None
        };

        Ok(EntityHierarchy {
            root_entity: self.root_entity,
            strategy: self.strategy,
            representation: self.representation,
            optimistic_lock_style: self.optimistic_lock_style,
            identifier: self.identifier,
            discriminator: self.discriminator,
            version: self.version,
            row_id: self.row_id,
            natural_id,
            tenant: self.tenant,
            mutable: self.mutable,
            implicit_polymorphism: self.implicit_polymorphism,
            where_fragment: self.where_fragment,
            cache_region: self.cache_region,
            cache_factory: self.cache_factory,
            cache_access: OnceLock::new(),
        })
    }
}

fn build_identifier(
    mapping: &RootClassMapping,
    root: &NavigableRole,
    ctx: &CreationContext,
) -> Result<EntityIdentifier> {
    let IdentifierMapping {
        property,
        embedded_identifier,
        generator,
    } = &mapping.identifier;

    if let Some(embeddable) = embedded_identifier {
        let role = root.append(IDENTIFIER_NAME);
        return Ok(EntityIdentifier::CompositeNonAggregated {
            embeddable: ctx.embeddable(embeddable, &role, &mapping.table)?,
            role,
        });
    }

    let property = property.as_ref().ok_or_else(|| {
        Error::modeling(format!("{} declares no identifier", mapping.entity_name))
    })?;
    let attribute = ctx.attribute(property, root, 0, &mapping.table)?;
    let generator = build_generator(generator, &attribute)?;
    match (&property.value, &attribute.kind) {
        (ValueMapping::Embedded(_), AttributeKind::Embedded(_)) => {
            Ok(EntityIdentifier::CompositeAggregated { attribute, generator })
        }
        (ValueMapping::Basic(_), AttributeKind::Basic { .. }) => {
            Ok(EntityIdentifier::Simple { attribute, generator })
        }
        _ => Err(Error::modeling(format!(
            "identifier {} must be a basic or embedded attribute",
            attribute.role
        ))),
    }
}

fn build_generator(
    mapping: &GeneratorMapping,
    attribute: &Attribute,
) -> Result<Option<Arc<dyn IdentifierGenerator>>> {
    Ok(match mapping {
        GeneratorMapping::Assigned => None,
        GeneratorMapping::Custom(generator) => Some(Arc::clone(generator)),
        GeneratorMapping::Increment { start } => match attribute.domain_type() {
            DomainType::Long => Some(Arc::new(IncrementGenerator::new(*start))),
            DomainType::Integer => {
                let start = i32::try_from(*start).map_err(|_| {
                    Error::modeling(format!("increment start {start} overflows {}", attribute.role))
                })?;
                Some(Arc::new(IncrementGenerator::integer(start)))
            }
            other => {
                return Err(Error::modeling(format!(
                    "increment generator cannot produce {} values for {}",
                    other.name(),
                    attribute.role
                )));
            }
        },
    })
}

/// Every entity of the hierarchy, root first, with its discriminator value
/// (the entity name when none is mapped).
fn discriminator_mappings(
    mapping: &RootClassMapping,
    domain: &DomainType,
) -> Result<DiscriminatorMappings> {
    fn collect(
        subclasses: &[SubclassMapping],
        domain: &DomainType,
        out: &mut DiscriminatorMappings,
    ) -> Result<()> {
        for subclass in subclasses {
            let raw = subclass
                .discriminator_value
                .as_deref()
                .unwrap_or(&subclass.entity_name);
            out.insert(DiscriminatorValue::parse(raw, domain)?, &subclass.entity_name)?;
            collect(&subclass.subclasses, domain, out)?;
        }
        Ok(())
    }

    let mut mappings = DiscriminatorMappings::new();
    let raw = mapping
        .discriminator_value
        .as_deref()
        .unwrap_or(&mapping.entity_name);
    mappings.insert(DiscriminatorValue::parse(raw, domain)?, &mapping.entity_name)?;
    collect(&mapping.subclasses, domain, &mut mappings)?;
    Ok(mappings)
}

#[derive(Debug)]
pub struct EntityHierarchy {
    root_entity: String,
    strategy: InheritanceStrategy,
    representation: RepresentationMode,
    optimistic_lock_style: OptimisticLockStyle,
    identifier: EntityIdentifier,
    discriminator: Option<DiscriminatorDescriptor>,
    version: Option<VersionDescriptor>,
    row_id: Option<RowIdDescriptor>,
    natural_id: Option<NaturalIdDescriptor>,
    tenant: Option<TenantDiscrimination>,
    mutable: bool,
    implicit_polymorphism: bool,
    where_fragment: Option<String>,
    cache_region: Option<String>,
    cache_factory: Option<Arc<dyn CacheRegionFactory>>,
    cache_access: OnceLock<Option<Arc<dyn EntityCacheAccess>>>,
}

impl EntityHierarchy {
    pub fn root_entity(&self) -> &str {
        &self.root_entity
    }

    pub fn strategy(&self) -> InheritanceStrategy {
        self.strategy
    }

    pub fn representation(&self) -> RepresentationMode {
        self.representation
    }

    pub fn optimistic_lock_style(&self) -> OptimisticLockStyle {
        self.optimistic_lock_style
    }

    pub fn identifier(&self) -> &EntityIdentifier {
        &self.identifier
    }

    pub fn discriminator(&self) -> Option<&DiscriminatorDescriptor> {
        self.discriminator.as_ref()
    }

    pub fn version(&self) -> Option<&VersionDescriptor> {
        self.version.as_ref()
    }

    pub fn is_versioned(&self) -> bool {
        self.version.is_some()
    }

    pub fn row_id(&self) -> Option<&RowIdDescriptor> {
        self.row_id.as_ref()
    }

    pub fn natural_id(&self) -> Option<&NaturalIdDescriptor> {
        self.natural_id.as_ref()
    }

    pub fn tenant(&self) -> Option<&TenantDiscrimination> {
        self.tenant.as_ref()
    }

    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    pub fn is_implicit_polymorphism(&self) -> bool {
        self.implicit_polymorphism
    }

    pub fn where_fragment(&self) -> Option<&str> {
        self.where_fragment.as_deref()
    }

    pub fn cache_region(&self) -> Option<&str> {
        self.cache_region.as_deref()
    }

    /// Region access, fetched from the factory on first use.
    pub fn cache_access(&self) -> Option<&Arc<dyn EntityCacheAccess>> {
        self.cache_access
            .get_or_init(|| match (&self.cache_factory, &self.cache_region) {
                (Some(factory), Some(region)) => {
                    tracing::debug!(entity = %self.root_entity, region, "resolving entity cache access");
                    factory.entity_access(region)
                }
                _ => None,
            })
            .as_ref()
    }

    pub fn visit_navigables(&self, visitor: &mut dyn NavigableVisitor) {
        visitor.visit(Navigable::Identifier(&self.identifier));
        if let Some(discriminator) = &self.discriminator {
            visitor.visit(Navigable::Discriminator(discriminator));
        }
        if let Some(version) = &self.version {
            visitor.visit(Navigable::Version(version));
        }
        if let Some(row_id) = &self.row_id {
            visitor.visit(Navigable::RowId(row_id));
        }
        if let Some(tenant) = &self.tenant {
            visitor.visit(Navigable::Tenant(tenant));
        }
        if let Some(natural_id) = &self.natural_id {
            visitor.visit(Navigable::NaturalId(natural_id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boot::{ColumnSource, EmbeddableMapping, PropertyMapping};
    use crate::cache::InMemoryRegionFactory;
    use crate::sql::Dialect;

    fn ctx() -> CreationContext {
        CreationContext::new(Dialect::Generic)
    }

    fn id_property() -> PropertyMapping {
        PropertyMapping::basic("id", ColumnSource::new("ID", DomainType::Long))
    }

    fn person() -> RootClassMapping {
        RootClassMapping::new(
            "Person",
            "person",
            IdentifierMapping::simple(id_property(), GeneratorMapping::Increment { start: 1 }),
        )
        .with_property(PropertyMapping::basic("name", ColumnSource::new("name", DomainType::String)))
    }

    #[test]
    fn test_simple_hierarchy() {
        let builder = EntityHierarchyBuilder::from_boot(&person(), &ctx(), None).unwrap();
        assert_eq!(builder.strategy(), InheritanceStrategy::None);
        let hierarchy = builder.finish_initialization(&[]).unwrap();
        assert!(matches!(hierarchy.identifier(), EntityIdentifier::Simple { .. }));
        assert_eq!(hierarchy.representation(), RepresentationMode::Pojo);
        assert!(hierarchy.discriminator().is_none());
        assert!(hierarchy.natural_id().is_none());
        assert!(hierarchy.cache_access().is_none());
    }

    #[test]
    fn test_identifier_dispatch() {
        let key = EmbeddableMapping {
            name: "Key".to_string(),
            properties: vec![
                PropertyMapping::basic("a", ColumnSource::new("a", DomainType::Long)),
                PropertyMapping::basic("b", ColumnSource::new("b", DomainType::Long)),
            ],
        };
        let mut mapping = person();
        mapping.identifier = IdentifierMapping::non_aggregated(key.clone());
        let hierarchy = EntityHierarchyBuilder::from_boot(&mapping, &ctx(), None).unwrap();
        assert!(matches!(
            hierarchy.identifier(),
            EntityIdentifier::CompositeNonAggregated { .. }
        ));

        mapping.identifier = IdentifierMapping::simple(
            PropertyMapping::embedded("key", "Key", key.properties),
            GeneratorMapping::Assigned,
        );
        let hierarchy = EntityHierarchyBuilder::from_boot(&mapping, &ctx(), None).unwrap();
        assert!(matches!(
            hierarchy.identifier(),
            EntityIdentifier::CompositeAggregated { .. }
        ));
    }

    #[test]
    fn test_strategy_from_first_subclass() {
        let mapping = person()
            .with_discriminator(ColumnSource::new("kind", DomainType::String))
            .with_subclass(SubclassMapping::new("Employee", SubclassKind::SingleTable).with_discriminator_value("E"));
        let builder = EntityHierarchyBuilder::from_boot(&mapping, &ctx(), None).unwrap();
        assert_eq!(builder.strategy(), InheritanceStrategy::Discriminator);
        let hierarchy = builder.finish_initialization(&[]).unwrap();
        let discriminator = hierarchy.discriminator().unwrap();
        assert_eq!(discriminator.resolve_entity(&crate::types::Value::text("E")).unwrap(), "Employee");
        assert_eq!(
            discriminator.resolve_entity(&crate::types::Value::text("Person")).unwrap(),
            "Person"
        );
    }

    #[test]
    fn test_union_rejects_discriminator() {
        let mapping = person()
            .with_discriminator(ColumnSource::new("kind", DomainType::String))
            .with_subclass(SubclassMapping::new(
                "Employee",
                SubclassKind::Union {
                    table: "employee".to_string(),
                },
            ));
        assert!(EntityHierarchyBuilder::from_boot(&mapping, &ctx(), None).is_err());
    }

    #[test]
    fn test_natural_id_must_be_singular() {
        let mapping = person().with_property(PropertyMapping::collection("tags", "Person.tags").natural_id());
        let builder = EntityHierarchyBuilder::from_boot(&mapping, &ctx(), None).unwrap();
        let attributes = vec![
            ctx()
                .attribute(&mapping.properties[1], &NavigableRole::new("Person"), 1, "person")
                .unwrap(),
        ];
        assert!(matches!(
            builder.finish_initialization(&attributes),
            Err(Error::Modeling(_))
        ));
    }

    #[test]
    fn test_natural_id_injected_in_order() {
        let mapping = person().with_property(
            PropertyMapping::basic("ssn", ColumnSource::new("ssn", DomainType::String)).natural_id(),
        );
        let root = NavigableRole::new("Person");
        let attributes: Vec<Attribute> = mapping
            .properties
            .iter()
            .enumerate()
            .map(|(i, p)| ctx().attribute(p, &root, i, "person").unwrap())
            .collect();
        let hierarchy = EntityHierarchyBuilder::from_boot(&mapping, &ctx(), None)
            .unwrap()
            .finish_initialization(&attributes)
            .unwrap();
        let natural_id = hierarchy.natural_id().unwrap();
        assert_eq!(natural_id.attributes().len(), 1);
        assert_eq!(natural_id.attributes()[0].position, 1);
    }

    #[test]
    fn test_version_requires_support() {
        let mapping = person().with_version(PropertyMapping::basic(
            "ver",
            ColumnSource::new("ver", DomainType::String),
        ));
        assert!(EntityHierarchyBuilder::from_boot(&mapping, &ctx(), None).is_err());
    }

    #[test]
    fn test_cache_access_is_memoized() {
        let mut mapping = person();
        mapping.cache_region = Some("people".to_string());
        let factory: Arc<dyn CacheRegionFactory> = Arc::new(InMemoryRegionFactory::new());
        let hierarchy = EntityHierarchyBuilder::from_boot(&mapping, &ctx(), Some(factory))
            .unwrap()
            .finish_initialization(&[])
            .unwrap();
        let first = Arc::clone(hierarchy.cache_access().unwrap());
        let second = Arc::clone(hierarchy.cache_access().unwrap());
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_visits_present_navigables() {
        let mut mapping = person();
        mapping.row_id = Some("rowid".to_string());
        let hierarchy = EntityHierarchyBuilder::from_boot(&mapping, &ctx(), None)
            .unwrap()
            .finish_initialization(&[])
            .unwrap();
        let mut seen = Vec::new();
        hierarchy.visit_navigables(&mut |n: Navigable<'_>| seen.push(n.role().navigable_name().to_string()));
        assert_eq!(seen, vec!["id", ROW_ID_NAME]);
    }
}
