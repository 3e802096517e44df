//! Response envelopes specific to the HTTP API. The payloads themselves are
//! the wire types in `meilibridge::engine`.

use meilibridge::engine::{IndexInfo, SearchRequest, SearchResponse};
use serde::{Deserialize, Serialize};

/// Error body returned by the engine on any non-2xx response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ErrorBody {
    pub message: String,
    pub code: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub link: String,
}

/// Acknowledgement of an asynchronous write.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    pub task_uid: u64,
    #[serde(default)]
    pub index_uid: Option<String>,
    pub status: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Deserialize)]
pub struct IndexList {
    pub results: Vec<IndexInfo>,
}

#[derive(Debug, Serialize)]
pub struct CreateIndex<'a> {
    pub uid: &'a str,
    #[serde(rename = "primaryKey")]
    pub primary_key: &'a str,
}

#[derive(Debug, Serialize)]
pub struct MultiSearchBody<'a> {
    pub queries: &'a [SearchRequest],
}

#[derive(Debug, Deserialize)]
pub struct MultiSearchResults {
    pub results: Vec<SearchResponse>,
}
