//! What a unit of work hands to the persisters for one operation.

use crate::jdbc::Connection;

/// How an operation interacts with the second-level cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Read from and write to the cache.
    #[default]
    Normal,
    Ignore,
    /// Read only; never write.
    Get,
    /// Write only; never read.
    Put,
    /// Write, overriding existing entries, without reading.
    Refresh,
}

impl CacheMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "normal" => Some(Self::Normal),
            "ignore" => Some(Self::Ignore),
            "get" => Some(Self::Get),
            "put" => Some(Self::Put),
            "refresh" => Some(Self::Refresh),
            _ => None,
        }
    }

    pub fn is_get_enabled(self) -> bool {
        matches!(self, Self::Normal | Self::Get)
    }

    pub fn is_put_enabled(self) -> bool {
        matches!(self, Self::Normal | Self::Put | Self::Refresh)
    }
}

pub struct ExecutionContext<'c> {
    pub connection: &'c mut dyn Connection,
    pub tenant_id: Option<String>,
    pub cache_mode: CacheMode,
}

impl<'c> ExecutionContext<'c> {
    pub fn new(connection: &'c mut dyn Connection) -> Self {
        Self {
            connection,
            tenant_id: None,
            cache_mode: CacheMode::Normal,
        }
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_cache_mode(mut self, cache_mode: CacheMode) -> Self {
        self.cache_mode = cache_mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_mode_flags() {
        assert!(CacheMode::Normal.is_get_enabled() && CacheMode::Normal.is_put_enabled());
        assert!(!CacheMode::Put.is_get_enabled());
        assert!(!CacheMode::Get.is_put_enabled());
        assert!(!CacheMode::Ignore.is_get_enabled() && !CacheMode::Ignore.is_put_enabled());
        assert_eq!(CacheMode::from_str("REFRESH"), Some(CacheMode::Refresh));
        assert_eq!(CacheMode::from_str("sometimes"), None);
    }
}
