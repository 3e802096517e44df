pub mod delta;
pub mod document;
pub mod rebuilder;
pub mod registry;
pub mod settings;

use crate::cache::SharedCache;
use crate::config::{DeltaWindow, UpdateStrategy};
use crate::engine::{SearchEngine, SearchRequest, SearchResponse};
use crate::error::{BridgeError, Result};
use crate::model::{ModelDescriptor, SearchRecord};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use document::build_document;
pub use rebuilder::{IndexSink, RebuildPhase, Rebuilder};
pub use registry::IndexRegistry;

/// Records per write request in a bulk add.
pub const BATCH_SIZE: usize = 100;

/// Primary key of every remote index.
pub const PRIMARY_KEY: &str = "id";

/// Parameters sent with every search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    pub limit: usize,
    pub attributes_to_retrieve: Vec<String>,
    pub show_matches_position: bool,
    pub show_ranking_score: bool,
}

impl SearchParams {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit,
            attributes_to_retrieve: vec![PRIMARY_KEY.to_string()],
            show_matches_position: true,
            show_ranking_score: true,
        }
    }

    pub fn request(&self, index_uid: Option<&str>, q: &str) -> SearchRequest {
        SearchRequest {
            index_uid: index_uid.map(str::to_string),
            q: q.to_string(),
            limit: Some(self.limit),
            attributes_to_retrieve: Some(self.attributes_to_retrieve.clone()),
            show_matches_position: Some(self.show_matches_position),
            show_ranking_score: Some(self.show_ranking_score),
            ..Default::default()
        }
    }
}

/// The serializable part of a handle, stored in the shared cache so another
/// process can rebuild the handle without a remote round-trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexHandleState {
    pub label: String,
    pub primary_key: String,
    pub update_strategy: UpdateStrategy,
    pub update_delta: Option<DeltaWindow>,
    pub search_params: SearchParams,
}

/// A write batch the engine rejected.
#[derive(Debug, Clone)]
pub struct BatchFailure {
    pub batch: usize,
    pub size: usize,
    pub error: BridgeError,
}

/// Aggregate outcome of a bulk add.
#[derive(Debug, Clone, Default)]
pub struct BulkReport {
    /// Write requests sent.
    pub batches: usize,
    /// Documents in the requests that succeeded.
    pub written: usize,
    /// Records dropped by the delta window.
    pub filtered: usize,
    pub failures: Vec<BatchFailure>,
}

impl BulkReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Handle on the remote index of one content model.
pub struct ModelIndex {
    engine: Arc<dyn SearchEngine>,
    cache: Arc<dyn SharedCache>,
    model: Arc<ModelDescriptor>,
    state: IndexHandleState,
}

impl std::fmt::Debug for ModelIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelIndex")
            .field("model", &self.model.name)
            .field("state", &self.state)
            .finish()
    }
}

impl ModelIndex {
    pub fn new(
        engine: Arc<dyn SearchEngine>,
        cache: Arc<dyn SharedCache>,
        model: Arc<ModelDescriptor>,
        state: IndexHandleState,
    ) -> Self {
        Self {
            engine,
            cache,
            model,
            state,
        }
    }

    pub fn label(&self) -> &str {
        &self.state.label
    }

    pub fn model(&self) -> &Arc<ModelDescriptor> {
        &self.model
    }

    pub fn state(&self) -> &IndexHandleState {
        &self.state
    }

    pub fn strategy(&self) -> UpdateStrategy {
        self.state.update_strategy
    }

    pub fn search_params(&self) -> &SearchParams {
        &self.state.search_params
    }

    fn delta_window(&self) -> Option<DeltaWindow> {
        match self.state.update_strategy {
            UpdateStrategy::Delta => Some(self.state.update_delta.clone().unwrap_or_default()),
            _ => None,
        }
    }

    /// Index one record. Under the delta strategy a record outside the window
    /// is not written; returns whether a write was sent.
    pub async fn add_item(&self, record: &dyn SearchRecord) -> Result<bool> {
        if let Some(window) = self.delta_window() {
            let since = Utc::now() + window.duration();
            if !delta::is_recent(&self.model, record, since) {
                tracing::debug!(
                    "[WRITE {}] Record {} outside delta window, not written",
                    self.label(),
                    record.pk()
                );
                return Ok(false);
            }
        }

        let doc = build_document(&self.model, record);
        let docs = std::slice::from_ref(&doc);
        match self.state.update_strategy {
            UpdateStrategy::Soft => self.engine.update_documents(self.label(), docs).await?,
            UpdateStrategy::Hard | UpdateStrategy::Delta => {
                self.engine.add_documents(self.label(), docs).await?
            }
        }
        Ok(true)
    }

    /// Index `records` in batches of [`BATCH_SIZE`], in input order. A failed
    /// batch is logged and reported; later batches still run.
    pub async fn add_items(&self, records: &[Arc<dyn SearchRecord>]) -> BulkReport {
        if let Err(e) = self.cache.invalidate_model(&self.model.name) {
            tracing::debug!(
                "[WRITE {}] Cache invalidation failed: {}",
                self.label(),
                e
            );
        }

        let window = self.delta_window();
        let now = Utc::now();
        let mut report = BulkReport::default();

        for (n, chunk) in records.chunks(BATCH_SIZE).enumerate() {
            let docs: Vec<_> = match &window {
                Some(window) => {
                    let kept = delta::filter_by_recency(&self.model, chunk, window, now);
                    report.filtered += chunk.len() - kept.len();
                    kept.iter()
                        .map(|r| build_document(&self.model, r.as_ref()))
                        .collect()
                }
                None => chunk
                    .iter()
                    .map(|r| build_document(&self.model, r.as_ref()))
                    .collect(),
            };
            if docs.is_empty() {
                continue;
            }

            report.batches += 1;
            let result = match self.state.update_strategy {
                UpdateStrategy::Soft | UpdateStrategy::Delta => {
                    self.engine.update_documents(self.label(), &docs).await
                }
                UpdateStrategy::Hard => self.engine.add_documents(self.label(), &docs).await,
            };
            match result {
                Ok(()) => report.written += docs.len(),
                Err(e) => {
                    tracing::warn!(
                        "[WRITE {}] Batch {} ({} documents) failed: {}",
                        self.label(),
                        n,
                        docs.len(),
                        e
                    );
                    report.failures.push(BatchFailure {
                        batch: n,
                        size: docs.len(),
                        error: e,
                    });
                }
            }
        }

        tracing::debug!(
            "[WRITE {}] {} written in {} batches ({} filtered, {} failed)",
            self.label(),
            report.written,
            report.batches,
            report.filtered,
            report.failures.len()
        );
        report
    }

    pub async fn delete_item(&self, record: &dyn SearchRecord) -> Result<()> {
        self.engine.delete_document(self.label(), record.pk()).await
    }

    pub async fn delete_all_documents(&self) -> Result<()> {
        self.engine.delete_all_documents(self.label()).await
    }

    /// A request for `q` against this index with the default parameters.
    pub fn request(&self, q: &str) -> SearchRequest {
        self.state.search_params.request(None, q)
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        self.engine.search(self.label(), request).await
    }

    pub async fn filterable_attributes(&self) -> Result<Vec<String>> {
        self.engine.get_filterable_attributes(self.label()).await
    }
}

impl std::fmt::Display for ModelIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.model.name)
    }
}
