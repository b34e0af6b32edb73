//! Persister statistics. Counters only move while collection is enabled.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Statistics {
    enabled: AtomicBool,
    inserts: AtomicU64,
    updates: AtomicU64,
    deletes: AtomicU64,
    loads: AtomicU64,
    optimistic_failures: AtomicU64,
}

/// Point-in-time copy of [`Statistics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatisticsSnapshot {
    pub inserts: u64,
    pub updates: u64,
    pub deletes: u64,
    pub loads: u64,
    pub optimistic_failures: u64,
}

impl Statistics {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            ..Self::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    fn bump(&self, counter: &AtomicU64) {
        if self.is_enabled() {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn insert_entity(&self, entity: &str) {
        tracing::trace!(entity, "insert recorded");
        self.bump(&self.inserts);
    }

    pub fn update_entity(&self, entity: &str) {
        tracing::trace!(entity, "update recorded");
        self.bump(&self.updates);
    }

    pub fn delete_entity(&self, entity: &str) {
        tracing::trace!(entity, "delete recorded");
        self.bump(&self.deletes);
    }

    pub fn load_entity(&self, entity: &str) {
        tracing::trace!(entity, "load recorded");
        self.bump(&self.loads);
    }

    pub fn optimistic_failure(&self, entity: &str) {
        tracing::trace!(entity, "optimistic failure recorded");
        self.bump(&self.optimistic_failures);
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            inserts: self.inserts.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            optimistic_failures: self.optimistic_failures.load(Ordering::Relaxed),
        }
    }
}
