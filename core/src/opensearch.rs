//! OpenSearch-backed search engine and judgment store

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::judgment::Judgment;
use crate::traits::{
    JudgmentStore, SearchEngine, SearchError, SearchHit, SearchRequest, StoreError,
};

/// Index holding judgment documents
pub const JUDGMENT_INDEX: &str = "search-relevance-judgment";

/// Longest backend error body kept in error messages
const MAX_ERROR_BODY: usize = 512;

/// Connection settings for an OpenSearch cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OpenSearchConfig {
    /// Cluster base URL, e.g. `http://localhost:9200`
    pub endpoint: String,

    /// Index holding judgment documents
    pub judgment_index: String,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    /// Maximum idle connections per host
    pub pool_max_idle_per_host: usize,
}

impl Default for OpenSearchConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9200".into(),
            judgment_index: JUDGMENT_INDEX.into(),
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            pool_max_idle_per_host: 32,
        }
    }
}

impl OpenSearchConfig {
    /// Default settings against `endpoint`
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Request timeout as a duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// HTTP client for searches and judgment lookups
#[derive(Debug, Clone)]
pub struct OpenSearchClient {
    client: Client,
    base: Url,
    config: OpenSearchConfig,
}

impl OpenSearchClient {
    /// Create a client
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not a valid base URL or the HTTP
    /// client cannot be built.
    pub fn new(config: OpenSearchConfig) -> Result<Self, SearchError> {
        let base = Url::parse(config.endpoint.trim_end_matches('/'))
            .map_err(|e| SearchError::InvalidQuery(format!("invalid endpoint {}: {e}", config.endpoint)))?;
        if base.cannot_be_a_base() {
            return Err(SearchError::InvalidQuery(format!(
                "endpoint {} cannot be used as a base URL",
                config.endpoint
            )));
        }

        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(format!("relevance-bench/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base,
            config,
        })
    }

    /// Connection settings
    pub fn config(&self) -> &OpenSearchConfig {
        &self.config
    }

    /// Base URL with `segments` appended, each percent-encoded
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn search_url(&self, request: &SearchRequest) -> Url {
        let mut url = self.url(&[&request.index, "_search"]);
        if let Some(pipeline) = &request.pipeline {
            url.query_pairs_mut().append_pair("search_pipeline", pipeline);
        }
        url
    }

    fn judgment_url(&self, judgment_id: &str) -> Url {
        self.url(&[&self.config.judgment_index, "_doc", judgment_id])
    }

    fn map_send_error(&self, error: reqwest::Error) -> SearchError {
        if error.is_timeout() {
            SearchError::Timeout(self.config.request_timeout())
        } else {
            SearchError::Http(error)
        }
    }
}

#[async_trait]
impl SearchEngine for OpenSearchClient {
    fn engine_name(&self) -> &str {
        "opensearch"
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>, SearchError> {
        let body = request.render_body()?;
        let url = self.search_url(request);
        tracing::trace!(url = %url, "Sending search");

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.map_send_error(e))?;
        if !status.is_success() {
            return Err(search_failure(&request.index, status, &text));
        }
        parse_search_response(&text)
    }
}

#[async_trait]
impl JudgmentStore for OpenSearchClient {
    fn store_name(&self) -> &str {
        "opensearch"
    }

    async fn get_judgment(&self, judgment_id: &str) -> Result<Judgment, StoreError> {
        let response = self.client.get(self.judgment_url(judgment_id)).send().await?;

        let status = response.status();
        let text = response.text().await?;
        match status {
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(judgment_id.to_string())),
            s if s.is_success() => parse_judgment_response(judgment_id, &text),
            s => Err(StoreError::Unavailable(format!(
                "{s}: {}",
                truncate(&text, MAX_ERROR_BODY)
            ))),
        }
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: HitsEnvelope,
}

#[derive(Deserialize)]
struct HitsEnvelope {
    #[serde(default)]
    hits: Vec<RawHit>,
}

#[derive(Deserialize)]
struct RawHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score", default)]
    score: Option<f64>,
}

#[derive(Deserialize)]
struct GetResponse {
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source")]
    source: Option<Judgment>,
}

/// Hits of a `_search` response body in rank order
pub fn parse_search_response(body: &str) -> Result<Vec<SearchHit>, SearchError> {
    let response: SearchResponse = serde_json::from_str(body).map_err(|e| SearchError::Backend {
        status: 200,
        message: format!("unreadable search response: {e}"),
    })?;
    Ok(response
        .hits
        .hits
        .into_iter()
        .map(|hit| SearchHit {
            doc_id: hit.id,
            score: hit.score,
        })
        .collect())
}

/// Judgment carried by a `_doc` response body
pub fn parse_judgment_response(judgment_id: &str, body: &str) -> Result<Judgment, StoreError> {
    let response: GetResponse = serde_json::from_str(body)
        .map_err(|e| StoreError::Malformed(format!("judgment {judgment_id}: {e}")))?;
    if !response.found {
        return Err(StoreError::NotFound(judgment_id.to_string()));
    }
    response
        .source
        .ok_or_else(|| StoreError::Malformed(format!("judgment {judgment_id} has no source")))
}

fn search_failure(index: &str, status: StatusCode, body: &str) -> SearchError {
    if status == StatusCode::NOT_FOUND && body.contains("index_not_found_exception") {
        return SearchError::IndexNotFound(index.to_string());
    }
    SearchError::Backend {
        status: status.as_u16(),
        message: truncate(body, MAX_ERROR_BODY).to_string(),
    }
}

fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(endpoint: &str) -> OpenSearchClient {
        OpenSearchClient::new(OpenSearchConfig::new(endpoint)).unwrap()
    }

    fn request(index: &str, pipeline: Option<&str>) -> SearchRequest {
        SearchRequest {
            index: index.into(),
            query_template: r#"{"query":{"match_all":{}}}"#.into(),
            query_text: "q".into(),
            pipeline: pipeline.map(String::from),
            variant: None,
            size: 10,
        }
    }

    #[test]
    fn test_search_url() {
        let client = client("http://localhost:9200/");

        let url = client.search_url(&request("products", None));
        assert_eq!(url.as_str(), "http://localhost:9200/products/_search");

        let url = client.search_url(&request("products", Some("norm pipe")));
        assert_eq!(
            url.as_str(),
            "http://localhost:9200/products/_search?search_pipeline=norm+pipe"
        );
    }

    #[test]
    fn test_judgment_url_encodes_id() {
        let client = client("https://search.example.com/prefix");
        let url = client.judgment_url("a/b");
        assert_eq!(
            url.as_str(),
            "https://search.example.com/prefix/search-relevance-judgment/_doc/a%2Fb"
        );
    }

    #[test]
    fn test_invalid_endpoint() {
        assert!(OpenSearchClient::new(OpenSearchConfig::new("not a url")).is_err());
        assert!(OpenSearchClient::new(OpenSearchConfig::new("mailto:x@example.com")).is_err());
    }

    #[test]
    fn test_parse_search_response() {
        let body = r#"{"took":3,"hits":{"total":{"value":2},"hits":[
            {"_index":"products","_id":"d1","_score":1.5},
            {"_index":"products","_id":"d2","_score":null}
        ]}}"#;
        let hits = parse_search_response(body).unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].doc_id, "d1");
        assert_eq!(hits[0].score, Some(1.5));
        assert_eq!(hits[1].score, None);

        assert!(parse_search_response("{}").is_err());
    }

    #[test]
    fn test_parse_judgment_response() {
        let body = r#"{"_index":"search-relevance-judgment","_id":"j1","found":true,"_source":{
            "name":"j","status":"COMPLETED",
            "judgmentRatings":[{"query":"q","ratings":[{"docId":"d1","rating":"1.0"}]}]
        }}"#;
        let judgment = parse_judgment_response("j1", body).unwrap();
        assert_eq!(judgment.rating_count(), 1);

        let missing = parse_judgment_response("j2", r#"{"_id":"j2","found":false}"#).unwrap_err();
        assert!(missing.is_not_found());

        let garbage = parse_judgment_response("j3", "<html>").unwrap_err();
        assert!(matches!(garbage, StoreError::Malformed(_)));
    }

    #[test]
    fn test_search_failure_classification() {
        let err = search_failure(
            "products",
            StatusCode::NOT_FOUND,
            r#"{"error":{"type":"index_not_found_exception"}}"#,
        );
        assert!(matches!(err, SearchError::IndexNotFound(ref i) if i == "products"));

        let err = search_failure("products", StatusCode::BAD_REQUEST, &"x".repeat(2000));
        match err {
            SearchError::Backend { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message.len(), MAX_ERROR_BODY);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_config_defaults_from_partial_json() {
        let config: OpenSearchConfig =
            serde_json::from_str(r#"{"endpoint":"http://os:9200","requestTimeoutSecs":5}"#).unwrap();
        assert_eq!(config.endpoint, "http://os:9200");
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.judgment_index, JUDGMENT_INDEX);
    }
}
