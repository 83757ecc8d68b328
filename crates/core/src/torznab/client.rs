//! Torznab HTTP client.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::query::{query_params, QueryPlan};
use super::types::{Candidate, SearchError};
use super::xml;
use crate::indexer::ContactResult;
use crate::store::{Indexer, IndexerCaps};

const USER_AGENT: &str = concat!("resow/", env!("CARGO_PKG_VERSION"));

/// Search backend seam: the pipeline talks to this trait so tests can
/// script responses without a network.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Fetch and parse the indexer's caps document.
    async fn fetch_caps(
        &self,
        indexer: &Indexer,
    ) -> Result<(Option<String>, IndexerCaps), SearchError>;

    /// Run a planned query.
    async fn search(
        &self,
        indexer: &Indexer,
        plan: &QueryPlan,
    ) -> Result<Vec<Candidate>, SearchError>;

    /// Fetch the indexer's newest items (generic search, no terms).
    async fn rss(&self, indexer: &Indexer) -> Result<Vec<Candidate>, SearchError>;

    /// Fetch the torrent bytes behind a candidate's download link.
    async fn snatch(&self, link: &str) -> Result<Vec<u8>, SearchError>;
}

/// Production Torznab client.
pub struct TorznabClient {
    http: Client,
    snatch_http: Client,
}

impl TorznabClient {
    pub fn new(search_timeout: Duration, snatch_timeout: Duration) -> Result<Self, SearchError> {
        let http = Client::builder()
            .timeout(search_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SearchError::ConnectionFailed(e.to_string()))?;
        let snatch_http = Client::builder()
            .timeout(snatch_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SearchError::ConnectionFailed(e.to_string()))?;
        Ok(Self { http, snatch_http })
    }

    /// Issue a caps query and classify the HTTP response, for
    /// `test-connection` and startup probes.
    pub async fn test_connection(&self, indexer: &Indexer) -> ContactResult {
        match self.fetch_caps(indexer).await {
            Ok(_) => ContactResult::Success,
            Err(e) => e.contact_result(),
        }
    }

    fn build_url(&self, indexer: &Indexer, params: &[(String, String)]) -> String {
        let mut url = format!("{}?apikey={}", indexer.url, urlencoding::encode(&indexer.apikey));
        for (key, value) in params {
            url.push('&');
            url.push_str(key);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
        url
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, SearchError> {
        let response = self.http.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                SearchError::Timeout
            } else {
                SearchError::ConnectionFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::from_status(status.as_u16()));
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| SearchError::ConnectionFailed(e.to_string()))?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl SearchProvider for TorznabClient {
    async fn fetch_caps(
        &self,
        indexer: &Indexer,
    ) -> Result<(Option<String>, IndexerCaps), SearchError> {
        let url = self.build_url(indexer, &[("t".to_string(), "caps".to_string())]);
        debug!(indexer = %indexer.label(), "Fetching caps");
        let body = self.get_bytes(&url).await?;
        xml::parse_caps(&body)
    }

    async fn search(
        &self,
        indexer: &Indexer,
        plan: &QueryPlan,
    ) -> Result<Vec<Candidate>, SearchError> {
        let url = self.build_url(indexer, &query_params(plan));
        debug!(indexer = %indexer.label(), terms = %plan.terms, t = plan.kind.as_str(), "Searching");
        let body = self.get_bytes(&url).await?;
        let candidates = xml::parse_search_results(&body)?;
        debug!(
            indexer = %indexer.label(),
            results = candidates.len(),
            "Search complete"
        );
        Ok(candidates)
    }

    async fn rss(&self, indexer: &Indexer) -> Result<Vec<Candidate>, SearchError> {
        let url = self.build_url(indexer, &[("t".to_string(), "search".to_string())]);
        debug!(indexer = %indexer.label(), "Fetching RSS items");
        let body = self.get_bytes(&url).await?;
        xml::parse_search_results(&body)
    }

    async fn snatch(&self, link: &str) -> Result<Vec<u8>, SearchError> {
        debug!(link, "Snatching torrent");
        let response = self.snatch_http.get(link).send().await.map_err(|e| {
            if e.is_timeout() {
                SearchError::Timeout
            } else {
                SearchError::ConnectionFailed(e.to_string())
            }
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::from_status(status.as_u16()));
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| SearchError::ConnectionFailed(e.to_string()))?;
        Ok(body.to_vec())
    }
}
