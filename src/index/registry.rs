use super::settings::{apply_settings, SettingsPlan, SettingsReport};
use super::{IndexHandleState, ModelIndex, SearchParams, PRIMARY_KEY};
use crate::cache::{descendants_cache_key, index_cache_key, SharedCache};
use crate::config::BridgeConfig;
use crate::engine::{IndexInfo, IndexSettings, SearchEngine};
use crate::error::{BridgeError, Result};
use crate::model::{ContentTypes, ModelDescriptor};
use dashmap::DashMap;
use std::sync::Arc;

/// Owns the handle of every model index in this process.
///
/// Lookups go to the in-process map first, then the shared cache, then the
/// engine, creating the index when the engine reports it missing. Handle
/// creation is idempotent, so two tasks racing on the same label only cost a
/// redundant round-trip; the first registered handle wins.
pub struct IndexRegistry {
    engine: Arc<dyn SearchEngine>,
    cache: Arc<dyn SharedCache>,
    config: Arc<BridgeConfig>,
    handles: DashMap<String, Arc<ModelIndex>>,
}

impl IndexRegistry {
    pub fn new(
        engine: Arc<dyn SearchEngine>,
        cache: Arc<dyn SharedCache>,
        config: Arc<BridgeConfig>,
    ) -> Self {
        Self {
            engine,
            cache,
            config,
            handles: DashMap::new(),
        }
    }

    pub fn engine(&self) -> &Arc<dyn SearchEngine> {
        &self.engine
    }

    pub fn cache(&self) -> &Arc<dyn SharedCache> {
        &self.cache
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn get(&self, label: &str) -> Option<Arc<ModelIndex>> {
        self.handles.get(label).map(|h| Arc::clone(h.value()))
    }

    fn state_for(&self, label: &str, primary_key: Option<String>) -> IndexHandleState {
        IndexHandleState {
            label: label.to_string(),
            primary_key: primary_key.unwrap_or_else(|| PRIMARY_KEY.to_string()),
            update_strategy: self.config.update_strategy,
            update_delta: self.config.effective_delta(),
            search_params: SearchParams::with_limit(self.config.query_limit),
        }
    }

    /// Register `handle` unless one already exists for its label, returning
    /// whichever is registered.
    pub fn register(&self, handle: Arc<ModelIndex>) -> Arc<ModelIndex> {
        let entry = self
            .handles
            .entry(handle.label().to_string())
            .or_insert(handle);
        Arc::clone(entry.value())
    }

    /// Make sure the remote index exists.
    async fn ensure_remote(&self, label: &str) -> Result<IndexInfo> {
        match self.engine.get_index(label).await {
            Ok(info) => Ok(info),
            Err(e) if e.is_not_found() => {
                tracing::info!("[REGISTRY {}] Creating index", label);
                match self.engine.create_index(label, PRIMARY_KEY).await {
                    Ok(info) => Ok(info),
                    Err(BridgeError::Engine { ref code, .. }) if code == "index_already_exists" => {
                        Ok(IndexInfo::new(label, PRIMARY_KEY))
                    }
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    pub async fn get_or_create(&self, model: &Arc<ModelDescriptor>) -> Result<Arc<ModelIndex>> {
        let label = model.label();
        if let Some(handle) = self.get(&label) {
            return Ok(handle);
        }

        let key = index_cache_key(&label);
        let cached = self
            .cache
            .get(&key)
            .and_then(|raw| serde_json::from_str::<IndexHandleState>(&raw).ok());

        let state = match cached {
            Some(cached) => {
                tracing::debug!("[REGISTRY {}] Handle restored from shared cache", label);
                self.state_for(&label, Some(cached.primary_key))
            }
            None => {
                let info = self.ensure_remote(&label).await?;
                self.state_for(&label, info.primary_key)
            }
        };

        match serde_json::to_string(&state) {
            Ok(raw) => self.cache.set(&key, raw),
            Err(e) => tracing::warn!("[REGISTRY {}] Failed to cache handle: {}", label, e),
        }

        let handle = Arc::new(ModelIndex::new(
            Arc::clone(&self.engine),
            Arc::clone(&self.cache),
            Arc::clone(model),
            state,
        ));
        Ok(self.register(handle))
    }

    /// Drop a handle from this process and from the shared cache.
    pub fn forget(&self, label: &str) {
        self.handles.remove(label);
        self.cache.delete(&index_cache_key(label));
    }

    /// Clear the in-process map. The shared cache is left alone.
    pub fn refresh(&self) {
        self.handles.clear();
    }

    /// Delete the remote index and recreate it empty.
    pub async fn rebuild(&self, model: &Arc<ModelDescriptor>) -> Result<Arc<ModelIndex>> {
        let label = model.label();
        match self.engine.delete_index(&label).await {
            Ok(()) => tracing::info!("[REGISTRY {}] Index deleted", label),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        self.forget(&label);
        self.get_or_create(model).await
    }

    pub async fn apply_settings(&self, handle: &ModelIndex) -> SettingsReport {
        let plan = SettingsPlan::for_model(handle.model(), &self.config);
        apply_settings(
            self.engine.as_ref(),
            handle.label(),
            &handle.model().name,
            &plan,
        )
        .await
    }

    /// Full settings of an existing index. A missing index stays
    /// `IndexNotFound`; any other failure is `SettingsUnavailable`.
    pub async fn index_settings(&self, label: &str) -> Result<IndexSettings> {
        self.engine.get_settings(label).await.map_err(|e| {
            if e.is_not_found() {
                BridgeError::IndexNotFound(label.to_string())
            } else {
                BridgeError::SettingsUnavailable {
                    index: label.to_string(),
                    reason: e.to_string(),
                }
            }
        })
    }

    /// Concrete models that are `model` or inherit from it, read from the
    /// in-process model registry on every call. The name list is published
    /// to the shared cache and rewritten whenever the cached copy differs.
    pub fn descendants(
        &self,
        types: &dyn ContentTypes,
        model: &ModelDescriptor,
    ) -> Vec<Arc<ModelDescriptor>> {
        let key = descendants_cache_key(&model.label());
        let models: Vec<_> = types
            .descendants(&model.name)
            .into_iter()
            .filter(|m| !m.is_abstract)
            .collect();
        let names: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();

        let cached = self
            .cache
            .get(&key)
            .and_then(|raw| serde_json::from_str::<Vec<String>>(&raw).ok());
        let current = cached.as_ref().is_some_and(|cached| {
            cached.len() == names.len() && names.iter().all(|n| cached.iter().any(|c| c == n))
        });
        if !current {
            if cached.is_some() {
                tracing::debug!(
                    "[REGISTRY {}] Cached descendant list is stale, rewriting",
                    model.label()
                );
            }
            if let Ok(raw) = serde_json::to_string(&names) {
                self.cache.set(&key, raw);
            }
        }
        models
    }
}
