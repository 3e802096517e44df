use crate::cache::SharedCache;
use crate::config::BridgeConfig;
use crate::engine::{EngineStats, SearchEngine};
use crate::error::{BridgeError, Result};
use crate::index::{BulkReport, IndexRegistry, ModelIndex, Rebuilder};
use crate::model::{ContentTypes, ModelDescriptor, SearchRecord};
use crate::query::SearchQuery;
use crate::results::{RecordStore, SearchResults};
use crate::types::{Operator, SearchTerms};
use std::sync::Arc;

/// Per-call search options.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub fields: Option<Vec<String>>,
    pub operator: Option<Operator>,
    pub order_by_relevance: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            fields: None,
            operator: None,
            order_by_relevance: true,
        }
    }
}

/// Entry point used by the content framework: indexing, rebuilds and
/// search over every registered model.
pub struct SearchBackend {
    registry: Arc<IndexRegistry>,
    types: Arc<dyn ContentTypes>,
    store: Arc<dyn RecordStore>,
}

impl SearchBackend {
    pub fn new(
        engine: Arc<dyn SearchEngine>,
        cache: Arc<dyn SharedCache>,
        types: Arc<dyn ContentTypes>,
        store: Arc<dyn RecordStore>,
        config: BridgeConfig,
    ) -> Self {
        let registry = Arc::new(IndexRegistry::new(engine, cache, Arc::new(config)));
        Self {
            registry,
            types,
            store,
        }
    }

    pub fn registry(&self) -> &Arc<IndexRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &BridgeConfig {
        self.registry.config()
    }

    fn model(&self, name: &str) -> Result<Arc<ModelDescriptor>> {
        self.types
            .model(name)
            .ok_or_else(|| BridgeError::Config(format!("Model '{}' is not registered", name)))
    }

    pub async fn index_for_model(&self, model_name: &str) -> Result<Arc<ModelIndex>> {
        let model = self.model(model_name)?;
        self.registry.get_or_create(&model).await
    }

    pub fn rebuilder(&self, model_name: &str) -> Result<Rebuilder> {
        let model = self.model(model_name)?;
        Ok(Rebuilder::new(Arc::clone(&self.registry), model))
    }

    /// Delete and recreate the index of every indexed model.
    pub async fn reset_index(&self) -> Result<()> {
        for model in self.types.indexed_models() {
            self.registry.rebuild(&model).await?;
        }
        Ok(())
    }

    /// Forget every handle held by this process.
    pub fn refresh_index(&self) {
        self.registry.refresh();
    }

    pub async fn add_type(&self, model_name: &str) -> Result<()> {
        self.index_for_model(model_name).await.map(|_| ())
    }

    pub async fn add(&self, model_name: &str, record: &dyn SearchRecord) -> Result<bool> {
        self.index_for_model(model_name)
            .await?
            .add_item(record)
            .await
    }

    pub async fn add_bulk(
        &self,
        model_name: &str,
        records: &[Arc<dyn SearchRecord>],
    ) -> Result<BulkReport> {
        let index = self.index_for_model(model_name).await?;
        Ok(index.add_items(records).await)
    }

    pub async fn delete(&self, model_name: &str, record: &dyn SearchRecord) -> Result<()> {
        self.index_for_model(model_name)
            .await?
            .delete_item(record)
            .await
    }

    pub async fn stats(&self) -> Result<EngineStats> {
        self.registry.engine().stats().await
    }

    fn compile(
        &self,
        terms: SearchTerms,
        model_name: &str,
        options: SearchOptions,
    ) -> Option<SearchQuery> {
        if terms.is_empty() || !self.types.is_indexed(model_name) {
            return None;
        }
        let model = self.types.model(model_name)?;
        let mut query = SearchQuery::new(model, terms)
            .with_operator(options.operator.unwrap_or_default())
            .order_by_relevance(options.order_by_relevance);
        if let Some(fields) = options.fields {
            query = query.with_fields(fields);
        }
        Some(query)
    }

    fn results(&self, query: Option<SearchQuery>) -> SearchResults {
        match query {
            Some(query) => SearchResults::new(
                Arc::clone(&self.registry),
                Arc::clone(&self.types),
                Arc::clone(&self.store),
                query,
            ),
            None => SearchResults::empty(),
        }
    }

    /// Search `model_name` and its descendants. An empty query or a model
    /// that is not indexed gives empty results without a remote call.
    pub fn search(
        &self,
        terms: impl Into<SearchTerms>,
        model_name: &str,
        options: SearchOptions,
    ) -> SearchResults {
        self.results(self.compile(terms.into(), model_name, options))
    }

    /// Prefix search over the autocomplete fields.
    pub fn autocomplete(
        &self,
        terms: impl Into<SearchTerms>,
        model_name: &str,
        options: SearchOptions,
    ) -> SearchResults {
        let query = self
            .compile(terms.into(), model_name, options)
            .map(SearchQuery::autocomplete);
        self.results(query)
    }
}
