//! Lazily evaluated search results, materialized from the relational store.

use crate::error::Result;
use crate::index::IndexRegistry;
use crate::model::{ContentTypes, FieldBoostMap, ModelDescriptor, SearchRecord};
use crate::query::fanout::FanOut;
use crate::query::{Filters, Ranking, SearchQuery};
use crate::types::{Operator, RecordId};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// The relational store that owns the records behind the indexes.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Rows of `model` (or its descendants) whose primary key is in `ids`,
    /// in the store's natural order.
    async fn fetch(
        &self,
        model: &ModelDescriptor,
        ids: &[RecordId],
    ) -> Result<Vec<Arc<dyn SearchRecord>>>;
}

#[derive(Clone)]
struct Backing {
    registry: Arc<IndexRegistry>,
    types: Arc<dyn ContentTypes>,
    store: Arc<dyn RecordStore>,
}

/// Results of one search. Nothing is sent to the engine until rows, a count
/// or facets are requested; the last count and rows are kept.
#[derive(Clone)]
pub struct SearchResults {
    backing: Option<Backing>,
    query: Option<SearchQuery>,
    filters: Option<Filters>,
    start: usize,
    stop: Option<usize>,
    count_cache: Option<usize>,
    results_cache: Option<Vec<Arc<dyn SearchRecord>>>,
    boosts: HashMap<String, FieldBoostMap>,
}

impl std::fmt::Debug for SearchResults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchResults")
            .field("query", &self.query)
            .field("filters", &self.filters)
            .field("start", &self.start)
            .field("stop", &self.stop)
            .finish()
    }
}

impl SearchResults {
    pub fn new(
        registry: Arc<IndexRegistry>,
        types: Arc<dyn ContentTypes>,
        store: Arc<dyn RecordStore>,
        query: SearchQuery,
    ) -> Self {
        Self {
            backing: Some(Backing {
                registry,
                types,
                store,
            }),
            query: Some(query),
            filters: None,
            start: 0,
            stop: None,
            count_cache: None,
            results_cache: None,
            boosts: HashMap::new(),
        }
    }

    /// Results that are known to be empty without asking the engine.
    pub fn empty() -> Self {
        Self {
            backing: None,
            query: None,
            filters: None,
            start: 0,
            stop: None,
            count_cache: Some(0),
            results_cache: Some(Vec::new()),
            boosts: HashMap::new(),
        }
    }

    pub fn is_empty_query(&self) -> bool {
        self.backing.is_none()
    }

    pub fn query(&self) -> Option<&SearchQuery> {
        self.query.as_ref()
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn stop(&self) -> Option<usize> {
        self.stop
    }

    /// A copy restricted to positions `start..stop` of the current window.
    pub fn window(&self, start: usize, stop: Option<usize>) -> Self {
        let mut clone = self.clone();
        let new_start = self.start + start;
        let new_stop = stop.map(|s| self.start + s);
        clone.start = new_start;
        clone.stop = match (self.stop, new_stop) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        if let Some(stop) = clone.stop {
            clone.start = clone.start.min(stop);
        }
        clone.count_cache = None;
        clone.results_cache = None;
        if self.backing.is_none() {
            clone.count_cache = Some(0);
            clone.results_cache = Some(Vec::new());
        }
        clone
    }

    fn clamp_to_window(&self, total: usize) -> usize {
        let stop = self.stop.map_or(total, |s| s.min(total));
        stop.saturating_sub(self.start)
    }

    /// Hits from every active index in global rank order.
    pub async fn ranking(&mut self) -> Result<Ranking> {
        let (Some(backing), Some(query)) = (&self.backing, &self.query) else {
            return Ok(Ranking::default());
        };
        FanOut::new(&backing.registry, backing.types.as_ref())
            .rank(query, self.filters.as_ref(), &mut self.boosts)
            .await
    }

    async fn do_search(&mut self) -> Result<Vec<Arc<dyn SearchRecord>>> {
        let ranking = self.ranking().await?;
        let (Some(backing), Some(query)) = (&self.backing, &self.query) else {
            return Ok(Vec::new());
        };

        let window = ranking.window(self.start, self.stop);
        if window.is_empty() {
            return Ok(Vec::new());
        }
        let mut rows = backing.store.fetch(&query.model, &window).await?;

        if query.order_by_relevance {
            rows.sort_by_key(|row| ranking.position(row.pk()).unwrap_or(usize::MAX));
        }
        let mut seen = HashSet::with_capacity(rows.len());
        rows.retain(|row| seen.insert(row.pk()));
        Ok(rows)
    }

    /// Rows of the current window, ordered by relevance when the query asks
    /// for it.
    pub async fn results(&mut self) -> Result<Vec<Arc<dyn SearchRecord>>> {
        if let Some(rows) = &self.results_cache {
            return Ok(rows.clone());
        }
        let rows = self.do_search().await?;
        self.results_cache = Some(rows.clone());
        Ok(rows)
    }

    /// Number of results in the current window. Uses zero-row queries when
    /// every index reports a total, otherwise materializes the rows. Summed
    /// totals do not deduplicate records present in several indexes, so a
    /// count taken before [`results`](Self::results) can exceed the row count.
    pub async fn count(&mut self) -> Result<usize> {
        if let Some(count) = self.count_cache {
            return Ok(count);
        }
        if let Some(rows) = &self.results_cache {
            return Ok(rows.len());
        }
        let total = match (&self.backing, &self.query) {
            (Some(backing), Some(query)) => {
                FanOut::new(&backing.registry, backing.types.as_ref())
                    .count(query, self.filters.as_ref())
                    .await?
            }
            _ => Some(0),
        };
        let count = match total {
            Some(total) => self.clamp_to_window(total),
            None => self.results().await?.len(),
        };
        self.count_cache = Some(count);
        Ok(count)
    }

    /// Facet counts for `field`, highest first. `None` when the query has no
    /// term string to facet on. Computed over the unfiltered query.
    pub async fn facet(&self, field: &str) -> Result<Option<IndexMap<String, u64>>> {
        let (Some(backing), Some(query)) = (&self.backing, &self.query) else {
            return Ok(None);
        };
        FanOut::new(&backing.registry, backing.types.as_ref())
            .facet(query, field)
            .await
    }

    /// Rows matching every (or any, with `Operator::Or`) `(field, value)`
    /// pair. Malformed filters are rejected before any remote call.
    pub async fn filter<F, V>(
        &self,
        pairs: Vec<(F, V)>,
        operator: Operator,
    ) -> Result<Vec<Arc<dyn SearchRecord>>>
    where
        F: Into<String>,
        V: Into<String>,
    {
        let filters = Filters::new(pairs, operator)?;
        let mut filtered = self.with_filters(filters);
        filtered.results().await
    }

    pub fn with_filters(&self, filters: Filters) -> Self {
        let mut clone = self.clone();
        clone.filters = Some(filters);
        if self.backing.is_some() {
            clone.count_cache = None;
            clone.results_cache = None;
        }
        clone
    }
}
