//! Search index abstraction and HTTP client.

use crate::types::EvidenceDocument;
use async_trait::async_trait;
use chatread_core::config::SearchConfig;
use chatread_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// REST API version sent with every search request.
pub const SEARCH_API_VERSION: &str = "2023-11-01";

const SCORE_FIELD: &str = "@search.score";

/// One search call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest {
    #[serde(rename = "search")]
    pub query: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,

    pub top: usize,
}

/// Ranked document lookup.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Documents matching the request, best first.
    async fn search(&self, request: &SearchRequest) -> AppResult<Vec<EvidenceDocument>>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    value: Vec<serde_json::Map<String, Value>>,
}

/// Client for a document search REST service.
///
/// Posts to `<endpoint>/indexes/<index>/docs/search` and maps the configured
/// identifier and content fields of each hit.
#[derive(Debug, Clone)]
pub struct HttpSearchIndex {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    identifier_field: String,
    content_field: String,
}

impl HttpSearchIndex {
    /// Build a client from search configuration.
    ///
    /// # Errors
    /// Returns `AppError::Config` when no endpoint is configured.
    pub fn from_config(config: &SearchConfig) -> AppResult<Self> {
        let endpoint = config.endpoint.as_deref().ok_or_else(|| {
            AppError::Config(
                "Search endpoint not configured (set CHATREAD_SEARCH_ENDPOINT)".to_string(),
            )
        })?;

        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| AppError::Search(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: format!(
                "{}/indexes/{}/docs/search?api-version={}",
                endpoint.trim_end_matches('/'),
                config.index,
                SEARCH_API_VERSION
            ),
            api_key: config.api_key.clone(),
            identifier_field: config.identifier_field.clone(),
            content_field: config.content_field.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn parse_response(&self, response: SearchResponse) -> Vec<EvidenceDocument> {
        response
            .value
            .into_iter()
            .filter_map(|hit| {
                let Some(identifier) = hit.get(&self.identifier_field).and_then(Value::as_str)
                else {
                    tracing::warn!(field = %self.identifier_field, "Skipping search hit without identifier");
                    return None;
                };

                let excerpt = hit
                    .get(&self.content_field)
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let score = hit.get(SCORE_FIELD).and_then(Value::as_f64).unwrap_or(0.0) as f32;

                Some(EvidenceDocument::new(identifier, excerpt, score))
            })
            .collect()
    }
}

#[async_trait]
impl SearchIndex for HttpSearchIndex {
    async fn search(&self, request: &SearchRequest) -> AppResult<Vec<EvidenceDocument>> {
        tracing::debug!(query = %request.query, filter = ?request.filter, top = request.top, "Sending search request");

        let mut builder = self.client.post(&self.url).json(request);
        if let Some(ref key) = self.api_key {
            builder = builder.header("api-key", key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| AppError::Search(format!("Failed to send search request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %error_text, "Search service returned error");
            return Err(AppError::Search(format!(
                "Search API error ({}): {}",
                status, error_text
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| AppError::Search(format!("Failed to parse search response: {}", e)))?;

        let documents = self.parse_response(body);
        tracing::debug!(documents = documents.len(), "Search completed");

        Ok(documents)
    }
}
