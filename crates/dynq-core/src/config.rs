//! Engine configuration.

use crate::storage::DEFAULT_MAX_BATCH_GET_KEYS;

/// Page size used when a request gives none.
pub const DEFAULT_LIMIT: u32 = 10;

/// Tunables of a [`QueryEngine`](crate::QueryEngine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Page size when the request has no limit (or a limit of 0).
    pub default_limit: u32,
    /// Issue a count request to fill `totalDocs`/`totalPages` for paginated finds.
    pub count_totals: bool,
    /// Keys per batched get when resolving joins, capped by the store's own limit.
    pub batch_get_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            count_totals: true,
            batch_get_size: DEFAULT_MAX_BATCH_GET_KEYS,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_limit(mut self, limit: u32) -> Self {
        self.default_limit = limit.max(1);
        self
    }

    pub fn with_count_totals(mut self, enabled: bool) -> Self {
        self.count_totals = enabled;
        self
    }

    pub fn with_batch_get_size(mut self, size: usize) -> Self {
        self.batch_get_size = size.max(1);
        self
    }

    /// Resolve a requested page size.
    pub fn page_size(&self, requested: Option<u32>) -> u32 {
        match requested {
            Some(limit) if limit > 0 => limit,
            _ => self.default_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size() {
        let config = EngineConfig::new().with_default_limit(25);
        assert_eq!(config.page_size(None), 25);
        assert_eq!(config.page_size(Some(0)), 25);
        assert_eq!(config.page_size(Some(3)), 3);
    }

    #[test]
    fn test_builders_clamp() {
        let config = EngineConfig::new().with_default_limit(0).with_batch_get_size(0);
        assert_eq!(config.default_limit, 1);
        assert_eq!(config.batch_get_size, 1);
    }
}
