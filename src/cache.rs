//! Second-level cache boundary: keys, entries and region access.
//!
//! Only the shapes handed across the boundary live here. Expiry,
//! transactional isolation and invalidation policies belong to the cache
//! provider.

use crate::types::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq)]
pub struct EntityCacheKey {
    /// Root entity name; subclasses share their root's key space.
    pub entity: String,
    pub id: Value,
    pub tenant: Option<String>,
}

impl fmt::Display for EntityCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity, self.id.loggable())?;
        if let Some(tenant) = &self.tenant {
            write!(f, "@{tenant}")?;
        }
        Ok(())
    }
}

/// Disassembled entity state as stored in a region.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Concrete entity name of the cached instance.
    pub subclass: String,
    pub disassembled_state: Vec<Value>,
    pub version: Option<Value>,
}

pub trait EntityCacheAccess: Send + Sync + fmt::Debug {
    fn get(&self, key: &EntityCacheKey) -> Option<CacheEntry>;

    fn put(&self, key: &EntityCacheKey, entry: CacheEntry);

    fn evict(&self, key: &EntityCacheKey);
}

pub trait CacheRegionFactory: Send + Sync + fmt::Debug {
    /// Access to the entity region `region`, or `None` if not configured.
    fn entity_access(&self, region: &str) -> Option<Arc<dyn EntityCacheAccess>>;
}

/// Process-local map regions, created on first request.
#[derive(Debug, Default)]
pub struct InMemoryRegionFactory {
    regions: Mutex<HashMap<String, Arc<InMemoryRegion>>>,
}

impl InMemoryRegionFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheRegionFactory for InMemoryRegionFactory {
    fn entity_access(&self, region: &str) -> Option<Arc<dyn EntityCacheAccess>> {
        let mut regions = guard(&self.regions);
        let region = regions
            .entry(region.to_string())
            .or_insert_with(|| Arc::new(InMemoryRegion::default()));
        Some(Arc::clone(region) as Arc<dyn EntityCacheAccess>)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRegion {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl InMemoryRegion {
    pub fn len(&self) -> usize {
        guard(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EntityCacheAccess for InMemoryRegion {
    fn get(&self, key: &EntityCacheKey) -> Option<CacheEntry> {
        guard(&self.entries).get(&key.to_string()).cloned()
    }

    fn put(&self, key: &EntityCacheKey, entry: CacheEntry) {
        guard(&self.entries).insert(key.to_string(), entry);
    }

    fn evict(&self, key: &EntityCacheKey) {
        guard(&self.entries).remove(&key.to_string());
    }
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
