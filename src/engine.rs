//! Contract of the remote search engine, and the wire types exchanged with it.
//!
//! Field names follow the Meilisearch REST API (`camelCase`, `_matchesPosition`,
//! `_rankingScore`), so the same structs serialize straight onto the wire in
//! `meilibridge-client`.

use crate::error::Result;
use crate::types::{IndexedDocument, RecordId};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexInfo {
    pub uid: String,
    #[serde(default)]
    pub primary_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl IndexInfo {
    pub fn new(uid: &str, primary_key: &str) -> Self {
        Self {
            uid: uid.to_string(),
            primary_key: Some(primary_key.to_string()),
            created_at: None,
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationSettings {
    pub max_total_hits: usize,
}

/// Partial settings update; unset fields are left alone by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub searchable_attributes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filterable_attributes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ranking_rules: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_words: Option<Vec<String>>,
}

impl SettingsUpdate {
    pub fn pagination(max_total_hits: usize) -> Self {
        Self {
            pagination: Some(PaginationSettings { max_total_hits }),
            ..Self::default()
        }
    }

    pub fn searchable(attributes: Vec<String>) -> Self {
        Self {
            searchable_attributes: Some(attributes),
            ..Self::default()
        }
    }

    pub fn ranking_rules(rules: Vec<String>) -> Self {
        Self {
            ranking_rules: Some(rules),
            ..Self::default()
        }
    }

    pub fn stop_words(words: Vec<String>) -> Self {
        Self {
            stop_words: Some(words),
            ..Self::default()
        }
    }
}

/// Full settings of one index as reported by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexSettings {
    pub displayed_attributes: Vec<String>,
    pub searchable_attributes: Vec<String>,
    pub filterable_attributes: Vec<String>,
    pub sortable_attributes: Vec<String>,
    pub ranking_rules: Vec<String>,
    pub stop_words: Vec<String>,
    pub synonyms: serde_json::Value,
    pub distinct_attribute: Option<String>,
    pub typo_tolerance: serde_json::Value,
    pub faceting: serde_json::Value,
    pub pagination: serde_json::Value,
}

impl IndexSettings {
    /// Whether `attribute` can be searched. `*` means every attribute.
    pub fn is_searchable(&self, attribute: &str) -> bool {
        self.searchable_attributes.is_empty()
            || self
                .searchable_attributes
                .iter()
                .any(|a| a == "*" || a == attribute)
    }

    pub fn is_filterable(&self, attribute: &str) -> bool {
        self.filterable_attributes.iter().any(|a| a == attribute)
    }
}

/// One search, against a single index or as one entry of a multi-search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_uid: Option<String>,
    pub q: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes_to_retrieve: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes_to_search_on: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_matches_position: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_ranking_score: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facets: Option<Vec<String>>,
}

fn deserialize_record_id<'de, D>(deserializer: D) -> std::result::Result<RecordId, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| D::Error::custom(format!("id {} is not a positive integer", n))),
        serde_json::Value::String(s) => s
            .parse()
            .map_err(|_| D::Error::custom(format!("id '{}' is not numeric", s))),
        other => Err(D::Error::custom(format!("unexpected id {}", other))),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    #[serde(deserialize_with = "deserialize_record_id")]
    pub id: RecordId,
    #[serde(
        rename = "_matchesPosition",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub matches_position: Option<IndexMap<String, serde_json::Value>>,
    #[serde(
        rename = "_rankingScore",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub ranking_score: Option<f64>,
}

impl Hit {
    pub fn new(id: RecordId) -> Self {
        Self {
            id,
            matches_position: None,
            ranking_score: None,
        }
    }
}

/// Facet value → document count for one attribute.
pub type FacetDistribution = IndexMap<String, u64>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_uid: Option<String>,
    #[serde(default)]
    pub hits: Vec<Hit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_total_hits: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_hits: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facet_distribution: Option<IndexMap<String, FacetDistribution>>,
    #[serde(default, rename = "processingTimeMs")]
    pub processing_time_ms: u64,
}

impl SearchResponse {
    /// Total hit count reported by the engine, if any.
    pub fn total(&self) -> Option<usize> {
        self.total_hits.or(self.estimated_total_hits)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub number_of_documents: u64,
    pub is_indexing: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    pub database_size: u64,
    #[serde(default)]
    pub last_update: Option<String>,
    #[serde(default)]
    pub indexes: IndexMap<String, IndexStats>,
}

/// The remote search engine. Every call is a blocking network round-trip
/// bounded by the implementation's timeout.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Fails with an error whose [`is_not_found`](crate::BridgeError::is_not_found)
    /// is true when the index does not exist.
    async fn get_index(&self, uid: &str) -> Result<IndexInfo>;

    async fn create_index(&self, uid: &str, primary_key: &str) -> Result<IndexInfo>;

    async fn delete_index(&self, uid: &str) -> Result<()>;

    async fn list_indexes(&self, limit: usize) -> Result<Vec<IndexInfo>>;

    async fn get_settings(&self, uid: &str) -> Result<IndexSettings>;

    async fn update_settings(&self, uid: &str, settings: &SettingsUpdate) -> Result<()>;

    async fn get_filterable_attributes(&self, uid: &str) -> Result<Vec<String>>;

    async fn update_filterable_attributes(&self, uid: &str, attributes: &[String]) -> Result<()>;

    /// Add or replace whole documents.
    async fn add_documents(&self, uid: &str, documents: &[IndexedDocument]) -> Result<()>;

    /// Add or update documents, merging into existing ones by id.
    async fn update_documents(&self, uid: &str, documents: &[IndexedDocument]) -> Result<()>;

    async fn delete_document(&self, uid: &str, id: RecordId) -> Result<()>;

    async fn delete_all_documents(&self, uid: &str) -> Result<()>;

    async fn search(&self, uid: &str, request: &SearchRequest) -> Result<SearchResponse>;

    /// Run every request (each carrying its `index_uid`) in one call. The
    /// responses come back in request order.
    async fn multi_search(&self, queries: &[SearchRequest]) -> Result<Vec<SearchResponse>>;

    async fn stats(&self) -> Result<EngineStats>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_parses_numeric_and_string_ids() {
        let hit: Hit = serde_json::from_str(r#"{"id": 45014, "_rankingScore": 0.9}"#).unwrap();
        assert_eq!(hit.id, 45014);
        assert_eq!(hit.ranking_score, Some(0.9));

        let hit: Hit = serde_json::from_str(r#"{"id": "12"}"#).unwrap();
        assert_eq!(hit.id, 12);
        assert!(serde_json::from_str::<Hit>(r#"{"id": "abc"}"#).is_err());
    }

    #[test]
    fn test_hit_keeps_match_positions() {
        let hit: Hit = serde_json::from_str(
            r#"{"id": 1, "_matchesPosition": {"title": [{"start": 0, "length": 6}]}}"#,
        )
        .unwrap();
        let positions = hit.matches_position.unwrap();
        assert_eq!(
            serde_json::to_string(&positions["title"]).unwrap(),
            r#"[{"start":0,"length":6}]"#
        );
    }

    #[test]
    fn test_search_request_skips_unset_fields() {
        let req = SearchRequest {
            index_uid: Some("blog-BlogPage".to_string()),
            q: "bread".to_string(),
            limit: Some(0),
            ..Default::default()
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"indexUid": "blog-BlogPage", "q": "bread", "limit": 0})
        );
    }

    #[test]
    fn test_settings_update_serializes_one_setting() {
        let json = serde_json::to_value(SettingsUpdate::pagination(500)).unwrap();
        assert_eq!(json, serde_json::json!({"pagination": {"maxTotalHits": 500}}));
    }

    #[test]
    fn test_response_total_prefers_exact_count() {
        let resp: SearchResponse =
            serde_json::from_str(r#"{"hits": [], "estimatedTotalHits": 10, "totalHits": 12}"#)
                .unwrap();
        assert_eq!(resp.total(), Some(12));
    }

    #[test]
    fn test_settings_searchable_wildcard() {
        let settings = IndexSettings {
            searchable_attributes: vec!["*".to_string()],
            filterable_attributes: vec!["category_filter".to_string()],
            ..Default::default()
        };
        assert!(settings.is_searchable("anything"));
        assert!(settings.is_filterable("category_filter"));
        assert!(!settings.is_filterable("category"));
    }
}
