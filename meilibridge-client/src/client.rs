use crate::types::{
    CreateIndex, ErrorBody, IndexList, MultiSearchBody, MultiSearchResults, TaskInfo,
};
use async_trait::async_trait;
use http::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use meilibridge::engine::{
    EngineStats, IndexInfo, IndexSettings, SearchEngine, SearchRequest, SearchResponse,
    SettingsUpdate,
};
use meilibridge::{BridgeConfig, BridgeError, IndexedDocument, RecordId, Result};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// HTTP client for one Meilisearch server.
///
/// Writes are asynchronous on the server side: a successful call means the
/// task was enqueued, not that it has been applied.
#[derive(Clone)]
pub struct MeiliClient {
    base_url: String,
    http_client: reqwest::Client,
    last_success: Arc<AtomicU64>, // Unix timestamp in seconds
}

impl std::fmt::Debug for MeiliClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeiliClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl MeiliClient {
    pub fn new(url: &str, master_key: Option<&str>, timeout: Duration) -> Result<Self> {
        reqwest::Url::parse(url)
            .map_err(|e| BridgeError::Config(format!("Invalid engine URL '{}': {}", url, e)))?;

        let mut headers = HeaderMap::new();
        if let Some(key) = master_key.filter(|k| !k.is_empty()) {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|_| BridgeError::Config("Master key is not a valid header".to_string()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| BridgeError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: url.trim_end_matches('/').to_string(),
            http_client,
            last_success: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn from_config(config: &BridgeConfig) -> Result<Self> {
        Self::new(
            &config.engine_url(),
            config.master_key.as_deref(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Time of the last successful call, 0 if none.
    pub fn last_success_timestamp(&self) -> u64 {
        self.last_success.load(Ordering::Relaxed)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| BridgeError::Transport(format!("{} failed: {}", what, e)))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.last_success.store(now, Ordering::Relaxed);
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<T> {
        let response = self.send(request, what).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| BridgeError::Transport(format!("{} failed: {}", what, e)))?;
        serde_json::from_slice(&body)
            .map_err(|e| BridgeError::Json(format!("Failed to parse {} response: {}", what, e)))
    }

    async fn send_task(&self, request: RequestBuilder, what: &str) -> Result<()> {
        let task: TaskInfo = self.send_json(request, what).await?;
        tracing::debug!(
            "[ENGINE] {} enqueued as task {} ({})",
            what,
            task.task_uid,
            task.status
        );
        Ok(())
    }
}

async fn error_from_response(response: Response) -> BridgeError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let body: ErrorBody = serde_json::from_str(&text).unwrap_or_else(|_| ErrorBody {
        message: text.clone(),
        ..ErrorBody::default()
    });

    if body.code == "index_not_found" {
        return BridgeError::IndexNotFound(body.message);
    }
    BridgeError::Engine {
        status,
        code: if body.code.is_empty() {
            status.as_str().to_string()
        } else {
            body.code
        },
        message: body.message,
    }
}

#[async_trait]
impl SearchEngine for MeiliClient {
    async fn get_index(&self, uid: &str) -> Result<IndexInfo> {
        let request = self.http_client.get(self.url(&format!("/indexes/{}", uid)));
        self.send_json(request, "get index").await
    }

    async fn create_index(&self, uid: &str, primary_key: &str) -> Result<IndexInfo> {
        let request = self
            .http_client
            .post(self.url("/indexes"))
            .json(&CreateIndex { uid, primary_key });
        self.send_task(request, "create index").await?;
        Ok(IndexInfo::new(uid, primary_key))
    }

    async fn delete_index(&self, uid: &str) -> Result<()> {
        let request = self.http_client.delete(self.url(&format!("/indexes/{}", uid)));
        self.send_task(request, "delete index").await
    }

    async fn list_indexes(&self, limit: usize) -> Result<Vec<IndexInfo>> {
        let request = self
            .http_client
            .get(self.url("/indexes"))
            .query(&[("limit", limit)]);
        let list: IndexList = self.send_json(request, "list indexes").await?;
        Ok(list.results)
    }

    async fn get_settings(&self, uid: &str) -> Result<IndexSettings> {
        let request = self
            .http_client
            .get(self.url(&format!("/indexes/{}/settings", uid)));
        self.send_json(request, "get settings").await
    }

    async fn update_settings(&self, uid: &str, settings: &SettingsUpdate) -> Result<()> {
        let request = self
            .http_client
            .patch(self.url(&format!("/indexes/{}/settings", uid)))
            .json(settings);
        self.send_task(request, "update settings").await
    }

    async fn get_filterable_attributes(&self, uid: &str) -> Result<Vec<String>> {
        let request = self.http_client.get(self.url(&format!(
            "/indexes/{}/settings/filterable-attributes",
            uid
        )));
        self.send_json(request, "get filterable attributes").await
    }

    async fn update_filterable_attributes(&self, uid: &str, attributes: &[String]) -> Result<()> {
        let request = self
            .http_client
            .put(self.url(&format!(
                "/indexes/{}/settings/filterable-attributes",
                uid
            )))
            .json(attributes);
        self.send_task(request, "update filterable attributes").await
    }

    async fn add_documents(&self, uid: &str, documents: &[IndexedDocument]) -> Result<()> {
        let request = self
            .http_client
            .post(self.url(&format!("/indexes/{}/documents", uid)))
            .json(documents);
        self.send_task(request, "add documents").await
    }

    async fn update_documents(&self, uid: &str, documents: &[IndexedDocument]) -> Result<()> {
        let request = self
            .http_client
            .put(self.url(&format!("/indexes/{}/documents", uid)))
            .json(documents);
        self.send_task(request, "update documents").await
    }

    async fn delete_document(&self, uid: &str, id: RecordId) -> Result<()> {
        let request = self
            .http_client
            .delete(self.url(&format!("/indexes/{}/documents/{}", uid, id)));
        self.send_task(request, "delete document").await
    }

    async fn delete_all_documents(&self, uid: &str) -> Result<()> {
        let request = self
            .http_client
            .delete(self.url(&format!("/indexes/{}/documents", uid)));
        self.send_task(request, "delete all documents").await
    }

    async fn search(&self, uid: &str, request: &SearchRequest) -> Result<SearchResponse> {
        let http_request = self
            .http_client
            .post(self.url(&format!("/indexes/{}/search", uid)))
            .json(request);
        self.send_json(http_request, "search").await
    }

    async fn multi_search(&self, queries: &[SearchRequest]) -> Result<Vec<SearchResponse>> {
        if queries.is_empty() {
            return Ok(Vec::new());
        }
        let request = self
            .http_client
            .post(self.url("/multi-search"))
            .json(&MultiSearchBody { queries });
        let results: MultiSearchResults = self.send_json(request, "multi-search").await?;
        Ok(results.results)
    }

    async fn stats(&self) -> Result<EngineStats> {
        let request = self.http_client.get(self.url("/stats"));
        self.send_json(request, "stats").await
    }
}
