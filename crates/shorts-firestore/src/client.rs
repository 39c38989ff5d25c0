//! Firestore REST API client.
//!
//! Production-grade client with:
//! - Token caching with refresh margin
//! - HTTP client tuning (pooling, timeouts)
//! - Exponential backoff with jitter on reads
//! - Emulator support (no auth) for local runs and tests
//! - Observability (tracing spans, metrics)

use std::sync::Arc;
use std::time::{Duration, Instant};

use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use tracing::{debug, info_span, Instrument};

use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::{record_documents_returned, record_request};
use crate::retry::RetryConfig;
use crate::token_cache::TokenCache;
use crate::types::{
    CommitRequest, CommitResponse, Document, Fields, ListDocumentsResponse,
    RunAggregationQueryRequest, RunAggregationQueryResponse, RunQueryRequest, RunQueryResponse,
    StructuredQuery, Write, COUNT_ALIAS,
};
use crate::types::FromFirestoreValue;

/// Bearer token accepted by the Firestore emulator.
const EMULATOR_TOKEN: &str = "owner";

/// Page size used when draining a collection.
const LIST_PAGE_SIZE: u32 = 300;

/// Firestore accepts at most 500 writes per commit.
pub const MAX_COMMIT_WRITES: usize = 500;

// =============================================================================
// Configuration
// =============================================================================

/// Firestore client configuration.
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    /// GCP project ID
    pub project_id: String,
    /// Database ID (usually "(default)")
    pub database_id: String,
    /// `host:port` of a Firestore emulator; disables authentication
    pub emulator_host: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Retry configuration
    pub retry: RetryConfig,
}

impl FirestoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> FirestoreResult<Self> {
        let project_id = std::env::var("GCP_PROJECT_ID")
            .or_else(|_| std::env::var("FIREBASE_PROJECT_ID"))
            .map_err(|_| {
                FirestoreError::auth_error(
                    "GCP_PROJECT_ID or FIREBASE_PROJECT_ID must be set to access Firestore",
                )
            })?;

        if project_id.is_empty() {
            return Err(FirestoreError::auth_error(
                "GCP_PROJECT_ID or FIREBASE_PROJECT_ID cannot be empty",
            ));
        }

        let secs = |key: &str, default: u64| -> Duration {
            Duration::from_secs(
                std::env::var(key)
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(default),
            )
        };

        Ok(Self {
            project_id,
            database_id: std::env::var("FIRESTORE_DATABASE_ID")
                .unwrap_or_else(|_| "(default)".to_string()),
            emulator_host: std::env::var("FIRESTORE_EMULATOR_HOST")
                .ok()
                .filter(|h| !h.is_empty()),
            timeout: secs("FIRESTORE_TIMEOUT_SECS", 30),
            connect_timeout: secs("FIRESTORE_CONNECT_TIMEOUT_SECS", 5),
            retry: RetryConfig::from_env(),
        })
    }

    fn database_path(&self) -> String {
        format!(
            "projects/{}/databases/{}/documents",
            self.project_id, self.database_id
        )
    }
}

// =============================================================================
// Client
// =============================================================================

/// Firestore REST API client.
#[derive(Clone)]
pub struct FirestoreClient {
    http: Client,
    config: FirestoreConfig,
    base_url: String,
    /// `None` when talking to the emulator
    token_cache: Option<Arc<TokenCache>>,
}

impl FirestoreClient {
    /// Create a new Firestore client.
    pub async fn new(config: FirestoreConfig) -> FirestoreResult<Self> {
        let (origin, token_cache) = match &config.emulator_host {
            Some(host) => {
                let origin = if host.starts_with("http://") || host.starts_with("https://") {
                    host.trim_end_matches('/').to_string()
                } else {
                    format!("http://{}", host.trim_end_matches('/'))
                };
                debug!(origin = %origin, "Using Firestore emulator");
                (origin, None)
            }
            None => (
                "https://firestore.googleapis.com".to_string(),
                Some(Arc::new(TokenCache::new(Self::create_auth_provider()?))),
            ),
        };

        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("shorts-firestore/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FirestoreError::Network)?;

        let base_url = format!("{}/v1/{}", origin, config.database_path());

        Ok(Self {
            http,
            config,
            base_url,
            token_cache,
        })
    }

    fn create_auth_provider() -> FirestoreResult<Arc<dyn TokenProvider>> {
        let service_account = CustomServiceAccount::from_env().map_err(|e| {
            FirestoreError::auth_error(format!("Failed to load service account: {}", e))
        })?;

        match service_account {
            Some(sa) => Ok(Arc::new(sa)),
            None => Err(FirestoreError::auth_error(
                "GOOGLE_APPLICATION_CREDENTIALS not set. \
                 Set it to the path of your service account JSON file.",
            )),
        }
    }

    /// Create from environment variables.
    pub async fn from_env() -> FirestoreResult<Self> {
        Self::new(FirestoreConfig::from_env()?).await
    }

    pub fn config(&self) -> &FirestoreConfig {
        &self.config
    }

    /// Build full document name for commit writes.
    pub fn full_document_name(&self, collection: &str, doc_id: &str) -> String {
        format!("{}/{}/{}", self.config.database_path(), collection, doc_id)
    }

    fn document_url(&self, collection: &str, doc_id: &str) -> String {
        format!("{}/{}/{}", self.base_url, collection, doc_id)
    }

    // =========================================================================
    // CRUD Operations
    // =========================================================================

    /// Get a document.
    pub async fn get_document(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> FirestoreResult<Option<Document>> {
        let url = self.document_url(collection, doc_id);
        let url = url.as_str();

        self.execute_request("get_document", collection, Some(doc_id), async {
            self.with_retry("get_document", || async move {
                let response = self.send::<()>(Method::GET, url, None).await?;
                match response.status() {
                    StatusCode::OK => Ok(Some(response.json::<Document>().await?)),
                    StatusCode::NOT_FOUND => Ok(None),
                    status => Err(Self::handle_error_response(status, url, response).await),
                }
            })
            .await
        })
        .await
    }

    /// Create a document; fails with `AlreadyExists` if the id is taken.
    pub async fn create_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: Fields,
    ) -> FirestoreResult<Document> {
        let url = format!(
            "{}/{}?documentId={}",
            self.base_url,
            collection,
            urlencoding::encode(doc_id)
        );
        let body = Document::new(fields);

        self.execute_request("create_document", collection, Some(doc_id), async {
            let response = self.send(Method::POST, &url, Some(&body)).await?;
            match response.status() {
                StatusCode::OK | StatusCode::CREATED => Ok(response.json::<Document>().await?),
                StatusCode::CONFLICT => Err(FirestoreError::AlreadyExists(format!(
                    "{}/{}",
                    collection, doc_id
                ))),
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Update a document (merge when a mask is given).
    pub async fn update_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: Fields,
        update_mask: Option<Vec<String>>,
    ) -> FirestoreResult<Document> {
        self.update_document_with_precondition(collection, doc_id, fields, update_mask, None)
            .await
    }

    /// Update only if the document still has `update_time`.
    pub async fn update_document_with_precondition(
        &self,
        collection: &str,
        doc_id: &str,
        fields: Fields,
        update_mask: Option<Vec<String>>,
        update_time: Option<&str>,
    ) -> FirestoreResult<Document> {
        let mut params: Vec<String> = Vec::new();
        if let Some(mask) = &update_mask {
            params.extend(mask.iter().map(|f| format!("updateMask.fieldPaths={}", f)));
        }
        match update_time {
            Some(ts) => params.push(format!(
                "currentDocument.updateTime={}",
                urlencoding::encode(ts)
            )),
            None => params.push("currentDocument.exists=true".to_string()),
        }
        let url = format!(
            "{}?{}",
            self.document_url(collection, doc_id),
            params.join("&")
        );
        let body = Document::new(fields);

        self.execute_request("update_document", collection, Some(doc_id), async {
            let response = self.send(Method::PATCH, &url, Some(&body)).await?;
            match response.status() {
                StatusCode::OK => Ok(response.json::<Document>().await?),
                StatusCode::NOT_FOUND => Err(FirestoreError::not_found(format!(
                    "{}/{}",
                    collection, doc_id
                ))),
                StatusCode::PRECONDITION_FAILED | StatusCode::CONFLICT => {
                    let body_text = response.text().await.unwrap_or_default();
                    Err(FirestoreError::PreconditionFailed(body_text))
                }
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Delete a document. Returns `false` if it did not exist.
    pub async fn delete_document(&self, collection: &str, doc_id: &str) -> FirestoreResult<bool> {
        let url = format!(
            "{}?currentDocument.exists=true",
            self.document_url(collection, doc_id)
        );

        self.execute_request("delete_document", collection, Some(doc_id), async {
            let response = self.send::<()>(Method::DELETE, &url, None).await?;
            match response.status() {
                StatusCode::OK | StatusCode::NO_CONTENT => Ok(true),
                StatusCode::NOT_FOUND => {
                    debug!("Document {}/{} already absent", collection, doc_id);
                    Ok(false)
                }
                status => {
                    let err = Self::handle_error_response(status, &url, response).await;
                    if err.is_precondition_failed() {
                        Ok(false)
                    } else {
                        Err(err)
                    }
                }
            }
        })
        .await
    }

    /// List one page of documents in a collection.
    pub async fn list_documents(
        &self,
        collection: &str,
        page_size: Option<u32>,
        page_token: Option<&str>,
    ) -> FirestoreResult<ListDocumentsResponse> {
        let mut params = Vec::new();
        if let Some(size) = page_size {
            params.push(format!("pageSize={}", size));
        }
        if let Some(token) = page_token {
            params.push(format!("pageToken={}", urlencoding::encode(token)));
        }
        let mut url = format!("{}/{}", self.base_url, collection);
        if !params.is_empty() {
            url = format!("{}?{}", url, params.join("&"));
        }

        let url = url.as_str();

        self.execute_request("list_documents", collection, None, async {
            self.with_retry("list_documents", || async move {
                let response = self.send::<()>(Method::GET, url, None).await?;
                match response.status() {
                    StatusCode::OK => {
                        let list: ListDocumentsResponse = response.json().await?;
                        record_documents_returned(
                            collection,
                            list.documents.as_ref().map(|d| d.len()).unwrap_or(0),
                        );
                        Ok(list)
                    }
                    status => Err(Self::handle_error_response(status, url, response).await),
                }
            })
            .await
        })
        .await
    }

    /// List every document in a collection, following page tokens.
    pub async fn list_all_documents(&self, collection: &str) -> FirestoreResult<Vec<Document>> {
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .list_documents(collection, Some(LIST_PAGE_SIZE), page_token.as_deref())
                .await?;
            documents.extend(page.documents.unwrap_or_default());
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(documents)
    }

    // =========================================================================
    // Atomic commit
    // =========================================================================

    /// Apply all writes atomically. Any failed precondition aborts the commit.
    pub async fn commit(&self, writes: Vec<Write>) -> FirestoreResult<CommitResponse> {
        if writes.is_empty() {
            return Ok(CommitResponse {
                write_results: Some(vec![]),
                commit_time: None,
            });
        }
        if writes.len() > MAX_COMMIT_WRITES {
            return Err(FirestoreError::request_failed(format!(
                "Commit exceeds {} write limit",
                MAX_COMMIT_WRITES
            )));
        }

        let url = format!("{}:commit", self.base_url);
        let request = CommitRequest { writes };

        self.execute_request("commit", "commit", None, async {
            let response = self.send(Method::POST, &url, Some(&request)).await?;
            match response.status() {
                StatusCode::OK => Ok(response.json::<CommitResponse>().await?),
                StatusCode::CONFLICT => {
                    let body = response.text().await.unwrap_or_default();
                    if body.contains("ALREADY_EXISTS") {
                        Err(FirestoreError::AlreadyExists(body))
                    } else {
                        Err(FirestoreError::PreconditionFailed(body))
                    }
                }
                StatusCode::NOT_FOUND => {
                    let body = response.text().await.unwrap_or_default();
                    Err(FirestoreError::not_found(body))
                }
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    // =========================================================================
    // Query Operations
    // =========================================================================

    /// Run a structured query against top-level collections.
    pub async fn run_query(&self, query: StructuredQuery) -> FirestoreResult<Vec<Document>> {
        let collection = query
            .from
            .first()
            .map(|c| c.collection_id.clone())
            .unwrap_or_default();
        let url = format!("{}:runQuery", self.base_url);
        let request = RunQueryRequest {
            structured_query: query,
        };

        let (url, request, collection) = (url.as_str(), &request, collection.as_str());
        self.execute_request("run_query", collection, None, async {
            self.with_retry("run_query", || async move {
                let response = self.send(Method::POST, url, Some(request)).await?;
                match response.status() {
                    StatusCode::OK => {
                        let body = response.text().await.unwrap_or_default();
                        // runQuery streams a JSON array of partial results
                        let responses: Vec<RunQueryResponse> =
                            serde_json::from_str(&body).map_err(|e| {
                                FirestoreError::invalid_response(format!(
                                    "Failed to parse runQuery response: {} (body prefix: {})",
                                    e,
                                    body.chars().take(200).collect::<String>()
                                ))
                            })?;

                        let docs: Vec<Document> =
                            responses.into_iter().filter_map(|r| r.document).collect();
                        record_documents_returned(collection, docs.len());
                        Ok(docs)
                    }
                    status => Err(Self::handle_error_response(status, url, response).await),
                }
            })
            .await
        })
        .await
    }

    /// Count documents matching a query without fetching them.
    pub async fn run_count_query(&self, query: StructuredQuery) -> FirestoreResult<u64> {
        let collection = query
            .from
            .first()
            .map(|c| c.collection_id.clone())
            .unwrap_or_default();
        let url = format!("{}:runAggregationQuery", self.base_url);
        let request = RunAggregationQueryRequest::count(query);

        let (url, request) = (url.as_str(), &request);
        self.execute_request("run_count_query", &collection, None, async {
            self.with_retry("run_count_query", || async move {
                let response = self.send(Method::POST, url, Some(request)).await?;
                match response.status() {
                    StatusCode::OK => {
                        let responses: Vec<RunAggregationQueryResponse> = response.json().await?;
                        let count = responses
                            .iter()
                            .filter_map(|r| r.result.as_ref())
                            .filter_map(|r| r.aggregate_fields.as_ref())
                            .filter_map(|f| f.get(COUNT_ALIAS))
                            .find_map(u64::from_firestore_value)
                            .ok_or_else(|| {
                                FirestoreError::invalid_response("Aggregation result missing count")
                            })?;
                        Ok(count)
                    }
                    status => Err(Self::handle_error_response(status, url, response).await),
                }
            })
            .await
        })
        .await
    }

    /// Execute with retry.
    pub async fn with_retry<T, F, Fut>(&self, operation: &str, op: F) -> FirestoreResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = FirestoreResult<T>>,
    {
        crate::retry::with_retry(&self.config.retry, operation, op).await
    }

    // =========================================================================
    // Internal Helpers
    // =========================================================================

    async fn access_token(&self) -> FirestoreResult<String> {
        match &self.token_cache {
            Some(cache) => cache.get_token().await,
            None => Ok(EMULATOR_TOKEN.to_string()),
        }
    }

    fn is_access_token_expired(body: &str) -> bool {
        body.contains("ACCESS_TOKEN_EXPIRED") || body.contains("\"UNAUTHENTICATED\"")
    }

    fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
        token: &str,
    ) -> RequestBuilder {
        let builder = self.http.request(method, url).bearer_auth(token);
        match body {
            Some(b) => builder.json(b),
            None => builder,
        }
    }

    /// Send a request, refreshing the token once if it expired mid-flight.
    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
    ) -> FirestoreResult<Response> {
        let token = self.access_token().await?;
        let response = self
            .request(method.clone(), url, body, &token)
            .send()
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        let Some(cache) = &self.token_cache else {
            return Ok(response);
        };

        let body_text = response.text().await.unwrap_or_default();
        if !Self::is_access_token_expired(&body_text) {
            return Err(FirestoreError::from_http_status(
                401,
                format!("{} failed: {}", url, body_text),
            ));
        }

        cache.invalidate().await;
        let token = self.access_token().await?;
        Ok(self.request(method, url, body, &token).send().await?)
    }

    /// Execute a request with tracing and metrics.
    async fn execute_request<T, F>(
        &self,
        operation: &str,
        collection: &str,
        doc_id: Option<&str>,
        fut: F,
    ) -> FirestoreResult<T>
    where
        F: std::future::Future<Output = FirestoreResult<T>>,
    {
        let span = match doc_id {
            Some(id) => info_span!(
                "firestore_request",
                operation = %operation,
                collection = %collection,
                doc_id = %id
            ),
            None => info_span!(
                "firestore_request",
                operation = %operation,
                collection = %collection
            ),
        };

        let start = Instant::now();
        let result = fut.instrument(span).await;
        let latency_ms = start.elapsed().as_millis() as f64;

        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(500),
        };
        record_request(operation, status, latency_ms);

        result
    }

    async fn handle_error_response(status: StatusCode, url: &str, response: Response) -> FirestoreError {
        let body = response.text().await.unwrap_or_default();
        FirestoreError::from_http_status(status.as_u16(), format!("{} failed: {}", url, body))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_config_from_env_validates_project_id() {
        std::env::remove_var("GCP_PROJECT_ID");
        std::env::remove_var("FIREBASE_PROJECT_ID");
        let result = FirestoreConfig::from_env();
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_config_default_values() {
        std::env::set_var("GCP_PROJECT_ID", "test-project");
        std::env::remove_var("FIRESTORE_CONNECT_TIMEOUT_SECS");
        std::env::remove_var("FIRESTORE_DATABASE_ID");
        std::env::remove_var("FIRESTORE_EMULATOR_HOST");
        let config = FirestoreConfig::from_env().unwrap();
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.database_id, "(default)");
        assert!(config.emulator_host.is_none());
    }

    #[test]
    #[serial]
    fn test_config_reads_emulator_host() {
        std::env::set_var("GCP_PROJECT_ID", "test-project");
        std::env::set_var("FIRESTORE_EMULATOR_HOST", "localhost:8080");
        let config = FirestoreConfig::from_env().unwrap();
        std::env::remove_var("FIRESTORE_EMULATOR_HOST");
        assert_eq!(config.emulator_host.as_deref(), Some("localhost:8080"));
    }

    #[tokio::test]
    async fn test_full_document_name() {
        let config = FirestoreConfig {
            project_id: "p".to_string(),
            database_id: "(default)".to_string(),
            emulator_host: Some("localhost:8080".to_string()),
            timeout: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(1),
            retry: RetryConfig::default(),
        };
        let client = FirestoreClient::new(config).await.unwrap();
        assert_eq!(
            client.full_document_name("videos", "abc"),
            "projects/p/databases/(default)/documents/videos/abc"
        );
        assert_eq!(
            client.document_url("videos", "abc"),
            "http://localhost:8080/v1/projects/p/databases/(default)/documents/videos/abc"
        );
    }

    #[test]
    fn test_detects_expired_token_body() {
        assert!(FirestoreClient::is_access_token_expired(
            r#"{"error":{"status":"UNAUTHENTICATED","details":[{"reason":"ACCESS_TOKEN_EXPIRED"}]}}"#
        ));
        assert!(!FirestoreClient::is_access_token_expired("permission denied"));
    }
}
