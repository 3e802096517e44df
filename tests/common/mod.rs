#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http::StatusCode;
use indexmap::IndexMap;
use meilibridge::engine::{
    EngineStats, Hit, IndexInfo, IndexSettings, IndexStats, SearchEngine, SearchRequest,
    SearchResponse, SettingsUpdate,
};
use meilibridge::model::StaticRecord;
use meilibridge::{
    BridgeConfig, BridgeError, ContentTypes, InMemoryCache, IndexedDocument, ModelCatalog,
    ModelDescriptor, RecordId, RecordStore, Result, SearchBackend, SearchField, SearchRecord,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// ============================================================
// FAKE ENGINE
// ============================================================

/// Every call the engine received, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    GetIndex(String),
    CreateIndex(String),
    DeleteIndex(String),
    ListIndexes(usize),
    GetSettings(String),
    UpdateSettings(String, SettingsUpdate),
    GetFilterable(String),
    UpdateFilterable(String, Vec<String>),
    AddDocuments(String, usize),
    UpdateDocuments(String, usize),
    DeleteDocument(String, RecordId),
    DeleteAll(String),
    Search(String, SearchRequest),
    MultiSearch(Vec<SearchRequest>),
    Stats,
}

impl Call {
    pub fn is_document_write(&self) -> bool {
        matches!(
            self,
            Call::AddDocuments(..) | Call::UpdateDocuments(..) | Call::DeleteAll(_)
        )
    }
}

#[derive(Debug, Default, Clone)]
struct FakeIndex {
    settings: IndexSettings,
    documents: IndexMap<RecordId, IndexedDocument>,
}

#[derive(Debug, Clone)]
struct FailRule {
    op: &'static str,
    uid: Option<String>,
    /// Calls of `op` that still succeed before the rule fires.
    skip: usize,
    /// Fail as if the index did not exist.
    missing: bool,
}

/// In-memory stand-in for the remote engine. Searches do case-insensitive
/// substring matching and report `_matchesPosition` for every matched term.
#[derive(Default)]
pub struct FakeEngine {
    indexes: Mutex<IndexMap<String, FakeIndex>>,
    calls: Mutex<Vec<Call>>,
    failures: Mutex<Vec<FailRule>>,
    scores: Mutex<HashMap<(String, RecordId), f64>>,
}

fn engine_error(status: StatusCode, code: &str, message: String) -> BridgeError {
    BridgeError::Engine {
        status,
        code: code.to_string(),
        message,
    }
}

fn not_found(uid: &str) -> BridgeError {
    BridgeError::IndexNotFound(format!("Index `{}` not found.", uid))
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every `op` call (optionally only for `uid`) fail.
    pub fn fail(&self, op: &'static str, uid: Option<&str>) {
        self.fail_after(op, uid, 0);
    }

    /// Let `skip` calls of `op` through, then fail the rest.
    pub fn fail_after(&self, op: &'static str, uid: Option<&str>, skip: usize) {
        self.failures.lock().unwrap().push(FailRule {
            op,
            uid: uid.map(str::to_string),
            skip,
            missing: false,
        });
    }

    /// Report `uid` as missing from `get_index` even when it exists, as a
    /// concurrent creator would see it.
    pub fn hide(&self, uid: &str) {
        self.failures.lock().unwrap().push(FailRule {
            op: "get_index",
            uid: Some(uid.to_string()),
            skip: 0,
            missing: true,
        });
    }

    pub fn heal(&self) {
        self.failures.lock().unwrap().clear();
    }

    /// Report `score` as `_rankingScore` for a document.
    pub fn pin_score(&self, uid: &str, id: RecordId, score: f64) {
        self.scores
            .lock()
            .unwrap()
            .insert((uid.to_string(), id), score);
    }

    pub fn create(&self, uid: &str) {
        self.indexes
            .lock()
            .unwrap()
            .entry(uid.to_string())
            .or_default();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn writes(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(Call::is_document_write)
            .collect()
    }

    pub fn has_index(&self, uid: &str) -> bool {
        self.indexes.lock().unwrap().contains_key(uid)
    }

    pub fn document(&self, uid: &str, id: RecordId) -> Option<IndexedDocument> {
        self.indexes
            .lock()
            .unwrap()
            .get(uid)
            .and_then(|i| i.documents.get(&id).cloned())
    }

    pub fn document_count(&self, uid: &str) -> usize {
        self.indexes
            .lock()
            .unwrap()
            .get(uid)
            .map_or(0, |i| i.documents.len())
    }

    pub fn settings(&self, uid: &str) -> Option<IndexSettings> {
        self.indexes
            .lock()
            .unwrap()
            .get(uid)
            .map(|i| i.settings.clone())
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, op: &'static str, uid: &str) -> Result<()> {
        let mut failures = self.failures.lock().unwrap();
        for rule in failures.iter_mut() {
            if rule.op != op || rule.uid.as_deref().is_some_and(|u| u != uid) {
                continue;
            }
            if rule.skip > 0 {
                rule.skip -= 1;
                continue;
            }
            if rule.missing {
                return Err(not_found(uid));
            }
            return Err(engine_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "injected_failure",
                format!("{} on {} failed", op, uid),
            ));
        }
        Ok(())
    }

    fn write(&self, uid: &str, documents: &[IndexedDocument], merge: bool) {
        let mut indexes = self.indexes.lock().unwrap();
        let index = indexes.entry(uid.to_string()).or_default();
        for doc in documents {
            if merge {
                if let Some(existing) = index.documents.get_mut(&doc.id) {
                    for (k, v) in &doc.fields {
                        existing.fields.insert(k.clone(), v.clone());
                    }
                    continue;
                }
            }
            index.documents.insert(doc.id, doc.clone());
        }
    }

    fn run_search(&self, uid: &str, request: &SearchRequest) -> Result<SearchResponse> {
        let indexes = self.indexes.lock().unwrap();
        let index = indexes.get(uid).ok_or_else(|| not_found(uid))?;

        let clauses = match &request.filter {
            Some(filter) => Some(parse_filter(filter, &index.settings)?),
            None => None,
        };
        if let Some(facets) = &request.facets {
            if let Some(bad) = facets.iter().find(|f| !index.settings.is_filterable(f)) {
                return Err(engine_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_search_facets",
                    format!("Attribute `{}` is not filterable", bad),
                ));
            }
        }

        let terms: Vec<String> = request
            .q
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();
        let scores = self.scores.lock().unwrap();

        let mut hits = Vec::new();
        let mut facet_distribution: IndexMap<String, IndexMap<String, u64>> = IndexMap::new();
        for doc in index.documents.values() {
            if let Some(clauses) = &clauses {
                if !clauses.matches(doc) {
                    continue;
                }
            }
            let Some(positions) = match_document(doc, &terms, request, &index.settings) else {
                continue;
            };
            for facet in request.facets.iter().flatten() {
                if let Some(value) = doc.get(facet) {
                    *facet_distribution
                        .entry(facet.clone())
                        .or_default()
                        .entry(value.to_string())
                        .or_insert(0) += 1;
                }
            }
            let mut hit = Hit::new(doc.id);
            if request.show_matches_position == Some(true) && !positions.is_empty() {
                hit.matches_position = Some(positions);
            }
            if request.show_ranking_score == Some(true) {
                hit.ranking_score = scores.get(&(uid.to_string(), doc.id)).copied();
            }
            hits.push(hit);
        }

        let total = hits.len();
        let offset = request.offset.unwrap_or(0);
        let limit = request.limit.unwrap_or(20);
        let hits = hits.into_iter().skip(offset).take(limit).collect();

        Ok(SearchResponse {
            index_uid: request.index_uid.clone(),
            hits,
            estimated_total_hits: Some(total),
            total_hits: None,
            facet_distribution: request.facets.as_ref().map(|_| facet_distribution),
            processing_time_ms: 0,
        })
    }
}

/// Match positions per attribute, or `None` when some term matches nowhere.
fn match_document(
    doc: &IndexedDocument,
    terms: &[String],
    request: &SearchRequest,
    settings: &IndexSettings,
) -> Option<IndexMap<String, serde_json::Value>> {
    let mut positions: IndexMap<String, Vec<serde_json::Value>> = IndexMap::new();
    for term in terms {
        let mut found = false;
        for (attribute, value) in &doc.fields {
            let allowed = match &request.attributes_to_search_on {
                Some(attrs) => attrs.contains(attribute),
                None => settings.is_searchable(attribute),
            };
            if !allowed {
                continue;
            }
            let haystack = value.to_lowercase();
            for (start, _) in haystack.match_indices(term.as_str()) {
                found = true;
                positions
                    .entry(attribute.clone())
                    .or_default()
                    .push(serde_json::json!({"start": start, "length": term.len()}));
            }
        }
        if !found {
            return None;
        }
    }
    Some(
        positions
            .into_iter()
            .map(|(k, v)| (k, serde_json::Value::Array(v)))
            .collect(),
    )
}

struct FilterClauses {
    clauses: Vec<(String, String)>,
    any: bool,
}

impl FilterClauses {
    fn matches(&self, doc: &IndexedDocument) -> bool {
        let mut results = self
            .clauses
            .iter()
            .map(|(attr, value)| doc.get(attr) == Some(value.as_str()));
        if self.any {
            results.any(|m| m)
        } else {
            results.all(|m| m)
        }
    }
}

/// Parse the `(attr = 'value') AND (attr = 'value')` expressions the query
/// engine generates.
fn parse_filter(filter: &str, settings: &IndexSettings) -> Result<FilterClauses> {
    let invalid = |msg: String| engine_error(StatusCode::BAD_REQUEST, "invalid_search_filter", msg);
    let any = filter.contains(") OR (");
    let separator = if any { ") OR (" } else { ") AND (" };
    let inner = filter
        .strip_prefix('(')
        .and_then(|f| f.strip_suffix(')'))
        .ok_or_else(|| invalid(format!("Malformed filter `{}`", filter)))?;

    let mut clauses = Vec::new();
    for part in inner.split(separator) {
        let (attr, value) = part
            .split_once(" = ")
            .ok_or_else(|| invalid(format!("Malformed clause `{}`", part)))?;
        if !settings.is_filterable(attr) {
            return Err(invalid(format!("Attribute `{}` is not filterable", attr)));
        }
        let value = value
            .strip_prefix('\'')
            .and_then(|v| v.strip_suffix('\''))
            .ok_or_else(|| invalid(format!("Unquoted value in `{}`", part)))?
            .replace("\\'", "'")
            .replace("\\\\", "\\");
        clauses.push((attr.to_string(), value));
    }
    Ok(FilterClauses { clauses, any })
}

fn apply_update(settings: &mut IndexSettings, update: &SettingsUpdate) {
    if let Some(p) = &update.pagination {
        settings.pagination = serde_json::json!({"maxTotalHits": p.max_total_hits});
    }
    if let Some(v) = &update.searchable_attributes {
        settings.searchable_attributes = v.clone();
    }
    if let Some(v) = &update.filterable_attributes {
        settings.filterable_attributes = v.clone();
    }
    if let Some(v) = &update.ranking_rules {
        settings.ranking_rules = v.clone();
    }
    if let Some(v) = &update.stop_words {
        settings.stop_words = v.clone();
    }
}

#[async_trait]
impl SearchEngine for FakeEngine {
    async fn get_index(&self, uid: &str) -> Result<IndexInfo> {
        self.record(Call::GetIndex(uid.to_string()));
        self.check("get_index", uid)?;
        if self.has_index(uid) {
            Ok(IndexInfo::new(uid, "id"))
        } else {
            Err(not_found(uid))
        }
    }

    async fn create_index(&self, uid: &str, primary_key: &str) -> Result<IndexInfo> {
        self.record(Call::CreateIndex(uid.to_string()));
        self.check("create_index", uid)?;
        if self.has_index(uid) {
            return Err(engine_error(
                StatusCode::CONFLICT,
                "index_already_exists",
                format!("Index `{}` already exists.", uid),
            ));
        }
        self.create(uid);
        Ok(IndexInfo::new(uid, primary_key))
    }

    async fn delete_index(&self, uid: &str) -> Result<()> {
        self.record(Call::DeleteIndex(uid.to_string()));
        self.check("delete_index", uid)?;
        match self.indexes.lock().unwrap().shift_remove(uid) {
            Some(_) => Ok(()),
            None => Err(not_found(uid)),
        }
    }

    async fn list_indexes(&self, limit: usize) -> Result<Vec<IndexInfo>> {
        self.record(Call::ListIndexes(limit));
        self.check("list_indexes", "*")?;
        Ok(self
            .indexes
            .lock()
            .unwrap()
            .keys()
            .take(limit)
            .map(|uid| IndexInfo::new(uid, "id"))
            .collect())
    }

    async fn get_settings(&self, uid: &str) -> Result<IndexSettings> {
        self.record(Call::GetSettings(uid.to_string()));
        self.check("get_settings", uid)?;
        self.settings(uid).ok_or_else(|| not_found(uid))
    }

    async fn update_settings(&self, uid: &str, settings: &SettingsUpdate) -> Result<()> {
        self.record(Call::UpdateSettings(uid.to_string(), settings.clone()));
        self.check("update_settings", uid)?;
        let mut indexes = self.indexes.lock().unwrap();
        let index = indexes.get_mut(uid).ok_or_else(|| not_found(uid))?;
        apply_update(&mut index.settings, settings);
        Ok(())
    }

    async fn get_filterable_attributes(&self, uid: &str) -> Result<Vec<String>> {
        self.record(Call::GetFilterable(uid.to_string()));
        self.check("get_filterable_attributes", uid)?;
        self.settings(uid)
            .map(|s| s.filterable_attributes)
            .ok_or_else(|| not_found(uid))
    }

    async fn update_filterable_attributes(&self, uid: &str, attributes: &[String]) -> Result<()> {
        self.record(Call::UpdateFilterable(uid.to_string(), attributes.to_vec()));
        self.check("update_filterable_attributes", uid)?;
        let mut indexes = self.indexes.lock().unwrap();
        let index = indexes.get_mut(uid).ok_or_else(|| not_found(uid))?;
        index.settings.filterable_attributes = attributes.to_vec();
        Ok(())
    }

    async fn add_documents(&self, uid: &str, documents: &[IndexedDocument]) -> Result<()> {
        self.record(Call::AddDocuments(uid.to_string(), documents.len()));
        self.check("add_documents", uid)?;
        self.write(uid, documents, false);
        Ok(())
    }

    async fn update_documents(&self, uid: &str, documents: &[IndexedDocument]) -> Result<()> {
        self.record(Call::UpdateDocuments(uid.to_string(), documents.len()));
        self.check("update_documents", uid)?;
        self.write(uid, documents, true);
        Ok(())
    }

    async fn delete_document(&self, uid: &str, id: RecordId) -> Result<()> {
        self.record(Call::DeleteDocument(uid.to_string(), id));
        self.check("delete_document", uid)?;
        let mut indexes = self.indexes.lock().unwrap();
        let index = indexes.get_mut(uid).ok_or_else(|| not_found(uid))?;
        index.documents.shift_remove(&id);
        Ok(())
    }

    async fn delete_all_documents(&self, uid: &str) -> Result<()> {
        self.record(Call::DeleteAll(uid.to_string()));
        self.check("delete_all_documents", uid)?;
        let mut indexes = self.indexes.lock().unwrap();
        let index = indexes.get_mut(uid).ok_or_else(|| not_found(uid))?;
        index.documents.clear();
        Ok(())
    }

    async fn search(&self, uid: &str, request: &SearchRequest) -> Result<SearchResponse> {
        self.record(Call::Search(uid.to_string(), request.clone()));
        self.check("search", uid)?;
        if request.index_uid.is_some() {
            return Err(engine_error(
                StatusCode::BAD_REQUEST,
                "bad_request",
                "Unknown field `indexUid`".to_string(),
            ));
        }
        self.run_search(uid, request)
    }

    async fn multi_search(&self, queries: &[SearchRequest]) -> Result<Vec<SearchResponse>> {
        self.record(Call::MultiSearch(queries.to_vec()));
        let mut responses = Vec::with_capacity(queries.len());
        for query in queries {
            let uid = query.index_uid.clone().ok_or_else(|| {
                engine_error(
                    StatusCode::BAD_REQUEST,
                    "missing_index_uid",
                    "Missing field `indexUid`".to_string(),
                )
            })?;
            self.check("multi_search", &uid)?;
            responses.push(self.run_search(&uid, query)?);
        }
        Ok(responses)
    }

    async fn stats(&self) -> Result<EngineStats> {
        self.record(Call::Stats);
        self.check("stats", "*")?;
        let indexes = self.indexes.lock().unwrap();
        let mut stats = EngineStats {
            database_size: 0,
            last_update: Some("2024-03-01T12:00:00Z".to_string()),
            indexes: IndexMap::new(),
        };
        for (uid, index) in indexes.iter() {
            stats.database_size += 4096 * index.documents.len() as u64;
            stats.indexes.insert(
                uid.clone(),
                IndexStats {
                    number_of_documents: index.documents.len() as u64,
                    is_indexing: false,
                },
            );
        }
        Ok(stats)
    }
}

// ============================================================
// FIXTURE MODELS
// ============================================================

pub const PAGE: &str = "wagtailcore.Page";
pub const HOME: &str = "home.HomePage";
pub const BLOG: &str = "blog.BlogPage";
pub const EVENT: &str = "events.EventPage";
pub const BASE: &str = "core.BasePage";
pub const PERSON: &str = "people.Person";

const PAGE_COLUMNS: [&str; 5] = [
    "title",
    "content_type_id",
    "first_published_at",
    "last_published_at",
    "updated_at",
];

/// `wagtailcore.Page` with three concrete page types (one of which never
/// gets a document), an abstract base, and a model without timestamps.
pub fn catalog() -> ModelCatalog {
    ModelCatalog::new()
        .with(
            ModelDescriptor::new(PAGE)
                .with_columns(&PAGE_COLUMNS)
                .with_fields(vec![
                    SearchField::boosted("title", 2.0),
                    SearchField::filterable("content_type_id"),
                ]),
        )
        .with(
            ModelDescriptor::new(BASE)
                .with_parent(PAGE)
                .with_columns(&PAGE_COLUMNS)
                .with_fields(vec![SearchField::searchable("title")])
                .abstract_base(),
        )
        .with(
            ModelDescriptor::new(HOME)
                .with_parent(BASE)
                .with_parent(PAGE)
                .with_columns(&PAGE_COLUMNS)
                .with_fields(vec![
                    SearchField::boosted("title", 2.0),
                    SearchField::searchable("body"),
                    SearchField::filterable("content_type_id"),
                    SearchField::autocomplete("title"),
                ]),
        )
        .with(
            ModelDescriptor::new(BLOG)
                .with_parent(PAGE)
                .with_columns(&PAGE_COLUMNS)
                .with_fields(vec![
                    SearchField::boosted("title", 10.0),
                    SearchField::searchable("intro"),
                    SearchField::searchable("body"),
                    SearchField::filterable("content_type_id"),
                    SearchField::filterable("category"),
                    SearchField::autocomplete("title"),
                ]),
        )
        .with(
            ModelDescriptor::new(EVENT)
                .with_parent(PAGE)
                .with_columns(&PAGE_COLUMNS)
                .with_fields(vec![
                    SearchField::boosted("title", 2.0),
                    SearchField::filterable("content_type_id"),
                ]),
        )
        .with(
            ModelDescriptor::new(PERSON)
                .with_columns(&["name"])
                .with_fields(vec![SearchField::searchable("name")]),
        )
}

pub fn page(id: RecordId, title: &str, content_type_id: i64) -> StaticRecord {
    StaticRecord::new(id)
        .set("title", title)
        .set("content_type_id", content_type_id)
        .set("updated_at", Utc::now())
}

pub fn blog_post(id: RecordId, title: &str, body: &str, category: &str) -> StaticRecord {
    page(id, title, 58)
        .set("intro", "")
        .set("body", body)
        .set("category", category)
}

pub fn updated(record: StaticRecord, at: DateTime<Utc>) -> StaticRecord {
    record.set("updated_at", at)
}

pub fn person(id: RecordId, name: &str) -> StaticRecord {
    StaticRecord::new(id).set("name", name)
}

pub fn arcs(records: Vec<StaticRecord>) -> Vec<Arc<dyn SearchRecord>> {
    records
        .into_iter()
        .map(|r| Arc::new(r) as Arc<dyn SearchRecord>)
        .collect()
}

// ============================================================
// RECORD STORE
// ============================================================

/// Rows keyed by primary key, each tagged with its concrete model. Rows
/// come back in insertion order, like an unordered `pk IN (...)` query.
pub struct MemoryStore {
    types: Arc<ModelCatalog>,
    rows: Mutex<IndexMap<RecordId, (String, Arc<dyn SearchRecord>)>>,
}

impl MemoryStore {
    pub fn new(types: Arc<ModelCatalog>) -> Self {
        Self {
            types,
            rows: Mutex::new(IndexMap::new()),
        }
    }

    pub fn insert(&self, model: &str, record: StaticRecord) -> Arc<dyn SearchRecord> {
        let record: Arc<dyn SearchRecord> = Arc::new(record);
        self.rows
            .lock()
            .unwrap()
            .insert(record.pk(), (model.to_string(), Arc::clone(&record)));
        record
    }

    pub fn remove(&self, id: RecordId) {
        self.rows.lock().unwrap().shift_remove(&id);
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn fetch(
        &self,
        model: &ModelDescriptor,
        ids: &[RecordId],
    ) -> Result<Vec<Arc<dyn SearchRecord>>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .values()
            .filter(|(row_model, record)| {
                ids.contains(&record.pk())
                    && self
                        .types
                        .model(row_model)
                        .is_some_and(|m| m.is_descendant_of(&model.name))
            })
            .map(|(_, record)| Arc::clone(record))
            .collect())
    }
}

// ============================================================
// HARNESS
// ============================================================

pub struct Harness {
    pub engine: Arc<FakeEngine>,
    pub cache: Arc<InMemoryCache>,
    pub types: Arc<ModelCatalog>,
    pub store: Arc<MemoryStore>,
    pub backend: SearchBackend,
}

impl Harness {
    pub fn new(config: BridgeConfig) -> Self {
        Self::with_cache(config, Arc::new(InMemoryCache::new()))
    }

    pub fn with_cache(config: BridgeConfig, cache: Arc<InMemoryCache>) -> Self {
        let engine = FakeEngine::new();
        Self::with_engine(config, cache, engine)
    }

    pub fn with_engine(
        config: BridgeConfig,
        cache: Arc<InMemoryCache>,
        engine: Arc<FakeEngine>,
    ) -> Self {
        let types = Arc::new(catalog());
        let store = Arc::new(MemoryStore::new(Arc::clone(&types)));
        let backend = SearchBackend::new(
            engine.clone(),
            cache.clone(),
            types.clone(),
            store.clone(),
            config,
        );
        Self {
            engine,
            cache,
            types,
            store,
            backend,
        }
    }

    /// Store `record` and index it under `model`, with settings applied.
    pub async fn index(&self, model: &str, record: StaticRecord) -> Arc<dyn SearchRecord> {
        let record = self.store.insert(model, record);
        let handle = self.backend.index_for_model(model).await.unwrap();
        self.backend.registry().apply_settings(&handle).await;
        self.backend.add(model, record.as_ref()).await.unwrap();
        record
    }
}

pub fn config() -> BridgeConfig {
    BridgeConfig {
        query_limit: 1000,
        ..BridgeConfig::default()
    }
}
