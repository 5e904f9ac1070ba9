//! Search API client
//!
//! Thin wrapper over the host [`HttpClient`] that issues
//! `GET <base>/search/songs` and converts the response into [`Track`]s.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest, RetryPolicy};
use core_runtime::config::CoreConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{CatalogError, Result};
use crate::models::Track;
use crate::types::{ApiSong, SearchResponse};

/// One fetched page after per-entry validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPage {
    /// 1-based page number that was requested.
    pub page: u32,
    /// Number of entries the API returned before any filtering.
    pub raw_count: usize,
    /// Playable tracks in API order (not yet deduplicated).
    pub tracks: Vec<Track>,
    /// Entries dropped because they could not be played.
    pub rejected: usize,
}

/// Paged song search.
#[async_trait]
pub trait SearchApi: Send + Sync {
    /// Fetch one page of results.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::Network`] when the API is unreachable or answers
    ///   with a non-2xx status
    /// - [`CatalogError::Schema`] when the body is not the expected envelope
    async fn search_songs(&self, query: &str, page: u32, limit: u32) -> Result<SearchPage>;
}

/// [`SearchApi`] backed by the public JioSaavn-compatible API.
pub struct SaavnClient {
    http_client: Arc<dyn HttpClient>,
    endpoint: String,
    timeout: Duration,
}

impl SaavnClient {
    pub fn new(http_client: Arc<dyn HttpClient>, endpoint: impl Into<String>) -> Self {
        Self {
            http_client,
            endpoint: endpoint.into(),
            timeout: core_runtime::config::DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(config.http_client.clone(), config.search_endpoint())
            .with_timeout(config.request_timeout)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn parse_page(&self, page: u32, body: &[u8]) -> Result<SearchPage> {
        let response: SearchResponse = serde_json::from_slice(body)
            .map_err(|e| CatalogError::Schema(format!("invalid search response: {}", e)))?;

        let raw_count = response.data.results.len();
        let mut tracks = Vec::with_capacity(raw_count);
        let mut rejected = 0;

        for entry in response.data.results {
            let converted = serde_json::from_value::<ApiSong>(entry)
                .map_err(|e| CatalogError::InvalidTrack {
                    id: "<unknown>".to_string(),
                    reason: e.to_string(),
                })
                .and_then(Track::from_api);

            match converted {
                Ok(track) => tracks.push(track),
                Err(error) => {
                    rejected += 1;
                    debug!(%error, "Dropping unplayable search result");
                }
            }
        }

        if rejected > 0 {
            warn!(page, rejected, raw_count, "Search page contained unplayable entries");
        }

        Ok(SearchPage {
            page,
            raw_count,
            tracks,
            rejected,
        })
    }
}

#[async_trait]
impl SearchApi for SaavnClient {
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn search_songs(&self, query: &str, page: u32, limit: u32) -> Result<SearchPage> {
        let request = HttpRequest::get(&self.endpoint)
            .header("Accept", "application/json")
            .query("query", query)
            .query("limit", limit)
            .query("page", page)
            .timeout(self.timeout);

        let response = self
            .http_client
            .execute_with_retry(request, RetryPolicy::no_retry())
            .await?;

        if !response.is_success() {
            warn!(status = response.status, "Search API returned an error status");
            return Err(CatalogError::Network(format!(
                "search API returned HTTP {}",
                response.status
            )));
        }

        let parsed = self.parse_page(page, &response.body)?;
        info!(
            raw = parsed.raw_count,
            playable = parsed.tracks.len(),
            "Fetched search page"
        );
        Ok(parsed)
    }
}
