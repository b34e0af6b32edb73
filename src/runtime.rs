//! Runtime model: every mapped hierarchy built once, with one persister
//! per entity.

use crate::boot::RootClassMapping;
use crate::cache::CacheRegionFactory;
use crate::error::{Error, Result};
use crate::model::{
    Attribute, AttributeKind, CreationContext, EntityDescriptor, EntityHierarchy,
    EntityHierarchyBuilder,
};
use crate::persister::EntityPersister;
use crate::settings::Settings;
use crate::stats::Statistics;
use indexmap::IndexMap;
use std::sync::Arc;

#[derive(Debug)]
pub struct RuntimeModel {
    settings: Arc<Settings>,
    statistics: Arc<Statistics>,
    hierarchies: IndexMap<String, Arc<EntityHierarchy>>,
    persisters: IndexMap<String, EntityPersister>,
}

impl RuntimeModel {
    /// Builds every hierarchy in `mappings`. Entity names must be unique
    /// across all hierarchies, and every to-one association must target a
    /// mapped entity.
    pub fn build(
        mappings: &[RootClassMapping],
        settings: &Settings,
        cache: Option<Arc<dyn CacheRegionFactory>>,
    ) -> Result<Self> {
        let settings = Arc::new(settings.clone());
        let statistics = Arc::new(Statistics::new(settings.generate_statistics));
        let ctx = CreationContext::new(settings.dialect);
        let mut hierarchies = IndexMap::new();
        let mut persisters: IndexMap<String, EntityPersister> = IndexMap::new();

        for mapping in mappings {
            tracing::debug!(entity = %mapping.entity_name, table = %mapping.table, "building entity hierarchy");
            let builder = EntityHierarchyBuilder::from_boot(mapping, &ctx, cache.clone())?;
            let descriptors = EntityDescriptor::build_tree(mapping, &ctx, &builder)?;
            let root = descriptors
                .first()
                .ok_or_else(|| Error::modeling(format!("no descriptor built for {}", mapping.entity_name)))?;
            let hierarchy = Arc::new(builder.finish_initialization(root.attributes())?);

            for persister in EntityPersister::for_hierarchy(
                descriptors,
                Arc::clone(&hierarchy),
                Arc::clone(&settings),
                Arc::clone(&statistics),
            ) {
                let name = persister.entity_name().to_string();
                if persisters.contains_key(&name) {
                    return Err(Error::modeling(format!("entity {name} is mapped more than once")));
                }
                persisters.insert(name, persister);
            }
            hierarchies.insert(mapping.entity_name.clone(), hierarchy);
        }

        for persister in persisters.values() {
            for attribute in persister.descriptor().attributes() {
                check_targets(attribute, &persisters)?;
            }
        }
        tracing::debug!(entities = persisters.len(), "runtime model built");

        Ok(Self {
            settings,
            statistics,
            hierarchies,
            persisters,
        })
    }

    pub fn persister(&self, entity: &str) -> Result<&EntityPersister> {
        self.persisters
            .get(entity)
            .ok_or_else(|| Error::UnknownEntity(entity.to_string()))
    }

    pub fn descriptor(&self, entity: &str) -> Result<&EntityDescriptor> {
        self.persister(entity).map(EntityPersister::descriptor)
    }

    /// The hierarchy `entity` belongs to, looked up by any of its members.
    pub fn hierarchy(&self, entity: &str) -> Result<&Arc<EntityHierarchy>> {
        let root = self.descriptor(entity)?.root_name();
        self.hierarchies
            .get(root)
            .ok_or_else(|| Error::UnknownEntity(root.to_string()))
    }

    pub fn persisters(&self) -> impl Iterator<Item = &EntityPersister> {
        self.persisters.values()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }
}

fn check_targets(attribute: &Attribute, persisters: &IndexMap<String, EntityPersister>) -> Result<()> {
    match &attribute.kind {
        AttributeKind::ToOne { target_entity, .. } if !persisters.contains_key(target_entity) => {
            Err(Error::modeling(format!(
                "{} references unmapped entity {target_entity}",
                attribute.role
            )))
        }
        AttributeKind::Embedded(embeddable) => embeddable
            .attributes
            .iter()
            .try_for_each(|a| check_targets(a, persisters)),
        _ => Ok(()),
    }
}
