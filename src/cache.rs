use crate::error::Result;
use dashmap::DashMap;

/// Process-external key/value cache, e.g. the framework's cache backend.
///
/// Entries are advisory: a stale or missing value must only ever cost an
/// extra remote call.
pub trait SharedCache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: String);

    fn delete(&self, key: &str);

    /// Drop read-through query caches held for a model before it is
    /// reindexed.
    fn invalidate_model(&self, _model: &str) -> Result<()> {
        Ok(())
    }
}

/// Cache key for an index handle.
pub fn index_cache_key(label: &str) -> String {
    format!("meili_index_{}", label)
}

/// Cache key for the descendant list of a model.
pub fn descendants_cache_key(label: &str) -> String {
    format!("meili_descendants_{}", label)
}

#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: DashMap<String, String>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl SharedCache for InMemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.clone())
    }

    fn set(&self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value);
    }

    fn delete(&self, key: &str) {
        self.entries.remove(key);
    }

    fn invalidate_model(&self, model: &str) -> Result<()> {
        let prefix = format!("query:{}:", model);
        self.entries.retain(|k, _| !k.starts_with(&prefix));
        Ok(())
    }
}

/// A cache that stores nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl SharedCache for NoCache {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn set(&self, _key: &str, _value: String) {}

    fn delete(&self, _key: &str) {}
}
