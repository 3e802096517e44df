//! Fan-out of one logical search to the index of every model under the
//! queried base model, and fan-in of the responses.

use super::facets::merge_facets;
use super::{Filters, Ranking, SearchMode, SearchQuery};
use crate::config::FanOutMode;
use crate::engine::{SearchRequest, SearchResponse};
use crate::error::{BridgeError, Result};
use crate::index::{IndexRegistry, SearchParams};
use crate::model::{
    ContentTypes, FieldBoostMap, ModelDescriptor, AUTOCOMPLETE_SUFFIX, FILTER_SUFFIX,
};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// One per-index request of a fan-out.
#[derive(Debug, Clone)]
pub struct SubQuery {
    pub model: Arc<ModelDescriptor>,
    pub label: String,
    pub request: SearchRequest,
}

/// Which attributes an index is searched on.
enum AttributeScope {
    All,
    Only(Vec<String>),
    /// The index supports none of the requested attributes.
    Unsupported,
}

pub struct FanOut<'a> {
    registry: &'a IndexRegistry,
    types: &'a dyn ContentTypes,
}

impl<'a> FanOut<'a> {
    pub fn new(registry: &'a IndexRegistry, types: &'a dyn ContentTypes) -> Self {
        Self { registry, types }
    }

    fn params(&self) -> SearchParams {
        SearchParams::with_limit(self.registry.config().query_limit)
    }

    /// Descendants of `model` whose index exists on the engine. A model
    /// that never had a document has no index and is left out.
    pub async fn active_models(
        &self,
        model: &ModelDescriptor,
    ) -> Result<Vec<Arc<ModelDescriptor>>> {
        let descendants = self.registry.descendants(self.types, model);
        let existing: HashSet<String> = self
            .registry
            .engine()
            .list_indexes(self.registry.config().query_limit)
            .await
            .map_err(|e| BridgeError::SearchUnavailable(format!("Listing indexes failed: {}", e)))?
            .into_iter()
            .map(|info| info.uid)
            .collect();

        Ok(descendants
            .into_iter()
            .filter(|m| existing.contains(&m.label()))
            .collect())
    }

    async fn scope(
        &self,
        query: &SearchQuery,
        model: &ModelDescriptor,
        label: &str,
    ) -> AttributeScope {
        match query.mode {
            SearchMode::Autocomplete => {
                let declared: Vec<String> =
                    model.autocomplete_fields().map(|f| f.mapped_name()).collect();
                let attributes: Vec<String> = match &query.fields {
                    Some(fields) => fields
                        .iter()
                        .map(|f| format!("{}{}", f, AUTOCOMPLETE_SUFFIX))
                        .filter(|f| declared.contains(f))
                        .collect(),
                    None => declared,
                };
                if attributes.is_empty() {
                    AttributeScope::Unsupported
                } else {
                    AttributeScope::Only(attributes)
                }
            }
            SearchMode::Standard => {
                let Some(fields) = &query.fields else {
                    return AttributeScope::All;
                };
                let settings = match self.registry.engine().get_settings(label).await {
                    Ok(settings) => settings,
                    Err(e) => {
                        tracing::warn!(
                            "[SEARCH {}] Settings of {} unavailable, index left out: {}",
                            query.model.name,
                            label,
                            e
                        );
                        return AttributeScope::Unsupported;
                    }
                };
                let attributes: Vec<String> = fields
                    .iter()
                    .filter(|f| settings.is_searchable(f))
                    .cloned()
                    .collect();
                if attributes.is_empty() {
                    AttributeScope::Unsupported
                } else {
                    AttributeScope::Only(attributes)
                }
            }
        }
    }

    /// One request per active index, carrying the filter clauses that index
    /// supports.
    pub async fn sub_queries(
        &self,
        query: &SearchQuery,
        filters: Option<&Filters>,
    ) -> Result<Vec<SubQuery>> {
        let params = self.params();
        let mut queries = Vec::new();

        for model in self.active_models(&query.model).await? {
            let label = model.label();
            let mut request = params.request(Some(&label), query.q());

            match self.scope(query, &model, &label).await {
                AttributeScope::All => {}
                AttributeScope::Only(attributes) => {
                    request.attributes_to_search_on = Some(attributes)
                }
                AttributeScope::Unsupported => {
                    tracing::debug!(
                        "[SEARCH {}] {} has none of the requested fields",
                        query.model.name,
                        label
                    );
                    continue;
                }
            }

            if let Some(filters) = filters {
                let filterable = self
                    .registry
                    .engine()
                    .get_filterable_attributes(&label)
                    .await;
                match filterable {
                    Ok(filterable) => request.filter = filters.expression_for(&filterable),
                    Err(e) => {
                        tracing::warn!(
                            "[SEARCH {}] Filterable attributes of {} unavailable, left out: {}",
                            query.model.name,
                            label,
                            e
                        );
                        continue;
                    }
                }
            }

            queries.push(SubQuery { model, label, request });
        }
        Ok(queries)
    }

    /// Run every sub-query and pair each response with its index label, in
    /// sub-query order.
    pub async fn execute(
        &self,
        model_name: &str,
        queries: &[SubQuery],
    ) -> Result<Vec<(String, SearchResponse)>> {
        if queries.is_empty() {
            return Ok(Vec::new());
        }
        match self.registry.config().fan_out {
            FanOutMode::Multi => self.execute_multi(queries).await,
            FanOutMode::PerIndex => self.execute_per_index(model_name, queries).await,
        }
    }

    async fn execute_multi(
        &self,
        queries: &[SubQuery],
    ) -> Result<Vec<(String, SearchResponse)>> {
        let requests: Vec<SearchRequest> = queries.iter().map(|q| q.request.clone()).collect();
        let responses = self
            .registry
            .engine()
            .multi_search(&requests)
            .await
            .map_err(|e| {
                BridgeError::SearchUnavailable(format!(
                    "Multi-search over {} indexes failed: {}",
                    queries.len(),
                    e
                ))
            })?;
        if responses.len() != queries.len() {
            return Err(BridgeError::SearchUnavailable(format!(
                "Multi-search returned {} results for {} queries",
                responses.len(),
                queries.len()
            )));
        }
        Ok(queries
            .iter()
            .map(|q| q.label.clone())
            .zip(responses)
            .collect())
    }

    /// Single-index searches run concurrently; an index that fails is left
    /// out of the merge.
    async fn execute_per_index(
        &self,
        model_name: &str,
        queries: &[SubQuery],
    ) -> Result<Vec<(String, SearchResponse)>> {
        let mut join_set = tokio::task::JoinSet::new();
        for (i, query) in queries.iter().enumerate() {
            let engine = Arc::clone(self.registry.engine());
            let label = query.label.clone();
            let mut request = query.request.clone();
            request.index_uid = None;
            join_set.spawn(async move {
                let result = engine.search(&label, &request).await;
                (i, label, result)
            });
        }

        let mut indexed: Vec<(usize, String, SearchResponse)> =
            Vec::with_capacity(queries.len());
        let mut failures = 0usize;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((i, label, Ok(response))) => indexed.push((i, label, response)),
                Ok((_, label, Err(e))) => {
                    failures += 1;
                    tracing::warn!(
                        "[SEARCH {}] {} failed, left out of results: {}",
                        model_name,
                        label,
                        e
                    );
                }
                Err(e) => {
                    failures += 1;
                    tracing::warn!("[SEARCH {}] Search task join error: {}", model_name, e);
                }
            }
        }

        if indexed.is_empty() && failures > 0 {
            return Err(BridgeError::SearchUnavailable(format!(
                "All {} index searches failed",
                failures
            )));
        }
        indexed.sort_by_key(|(i, _, _)| *i);
        Ok(indexed.into_iter().map(|(_, label, r)| (label, r)).collect())
    }

    /// Globally ranked hits for `query`. `boosts` caches each index's field
    /// weights across calls.
    pub async fn rank(
        &self,
        query: &SearchQuery,
        filters: Option<&Filters>,
        boosts: &mut HashMap<String, FieldBoostMap>,
    ) -> Result<Ranking> {
        let queries = self.sub_queries(query, filters).await?;
        for q in &queries {
            boosts
                .entry(q.label.clone())
                .or_insert_with(|| q.model.field_boosts());
        }
        let responses = self.execute(&query.model.name, &queries).await?;
        let ranking = Ranking::merge(responses.iter().map(|(l, r)| (l.as_str(), r)), boosts);
        tracing::debug!(
            "[SEARCH {}] {} hits from {} indexes",
            query.model.name,
            ranking.len(),
            responses.len()
        );
        Ok(ranking)
    }

    /// Total hits across indexes from zero-row queries. `None` when an index
    /// does not report a total.
    ///
    /// Per-index totals are summed as reported, so a record indexed under
    /// two models counts twice here while [`rank`](Self::rank) keeps it once.
    pub async fn count(
        &self,
        query: &SearchQuery,
        filters: Option<&Filters>,
    ) -> Result<Option<usize>> {
        let mut queries = self.sub_queries(query, filters).await?;
        for q in &mut queries {
            q.request.limit = Some(0);
            q.request.attributes_to_retrieve = None;
            q.request.show_matches_position = None;
            q.request.show_ranking_score = None;
        }
        let responses = self.execute(&query.model.name, &queries).await?;
        Ok(responses.iter().map(|(_, r)| r.total()).sum())
    }

    /// Facet counts of `field` merged across every active index that can
    /// filter on it. `None` when the query has no term string. Filters
    /// attached to the results do not narrow the counts.
    pub async fn facet(
        &self,
        query: &SearchQuery,
        field: &str,
    ) -> Result<Option<IndexMap<String, u64>>> {
        let Some(terms) = query.terms.query_string() else {
            return Ok(None);
        };
        let attribute = format!("{}{}", field, FILTER_SUFFIX);
        let engine = self.registry.engine();

        let mut distributions = Vec::new();
        for model in self.active_models(&query.model).await? {
            let label = model.label();
            let filterable = match engine.get_filterable_attributes(&label).await {
                Ok(filterable) => filterable,
                Err(e) => {
                    tracing::warn!(
                        "[FACET {}] Filterable attributes of {} unavailable: {}",
                        query.model.name,
                        label,
                        e
                    );
                    continue;
                }
            };
            if !filterable.contains(&attribute) {
                continue;
            }

            let request = SearchRequest {
                q: terms.to_string(),
                limit: Some(0),
                facets: Some(vec![attribute.clone()]),
                ..Default::default()
            };
            match engine.search(&label, &request).await {
                Ok(response) => {
                    if let Some(distribution) = response
                        .facet_distribution
                        .and_then(|mut d| d.shift_remove(&attribute))
                    {
                        distributions.push(distribution);
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "[FACET {}] Facet search on {} failed: {}",
                        query.model.name,
                        label,
                        e
                    );
                }
            }
        }

        Ok(Some(merge_facets(distributions)))
    }
}
