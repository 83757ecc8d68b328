//! Mock search provider for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::store::{Indexer, IndexerCaps};
use crate::torznab::{Candidate, QueryPlan, SearchError, SearchProvider};

/// A recorded search for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedQuery {
    pub indexer_url: String,
    pub terms: String,
}

/// Mock implementation of the `SearchProvider` trait.
///
/// Scripts per-indexer results and snatch bodies, records every query,
/// and can fail the next request with a chosen error.
pub struct MockSearchProvider {
    caps: Arc<RwLock<IndexerCaps>>,
    results: Arc<RwLock<Vec<Candidate>>>,
    rss_items: Arc<RwLock<Vec<Candidate>>>,
    /// Snatch bodies by link URL.
    snatches: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    queries: Arc<RwLock<Vec<RecordedQuery>>>,
    next_error: Arc<RwLock<Option<SearchError>>>,
}

impl Default for MockSearchProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSearchProvider {
    pub fn new() -> Self {
        Self {
            caps: Arc::new(RwLock::new(IndexerCaps {
                search: true,
                tv_search: true,
                movie: true,
                ..Default::default()
            })),
            results: Arc::new(RwLock::new(Vec::new())),
            rss_items: Arc::new(RwLock::new(Vec::new())),
            snatches: Arc::new(RwLock::new(HashMap::new())),
            queries: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn set_caps(&self, caps: IndexerCaps) {
        *self.caps.write().await = caps;
    }

    pub async fn set_results(&self, results: Vec<Candidate>) {
        *self.results.write().await = results;
    }

    pub async fn set_rss_items(&self, items: Vec<Candidate>) {
        *self.rss_items.write().await = items;
    }

    /// Script the torrent bytes served for a candidate link.
    pub async fn set_snatch(&self, link: &str, bytes: Vec<u8>) {
        self.snatches.write().await.insert(link.to_string(), bytes);
    }

    pub async fn fail_next(&self, error: SearchError) {
        *self.next_error.write().await = Some(error);
    }

    pub async fn recorded_queries(&self) -> Vec<RecordedQuery> {
        self.queries.read().await.clone()
    }

    async fn take_error(&self) -> Option<SearchError> {
        self.next_error.write().await.take()
    }
}

#[async_trait]
impl SearchProvider for MockSearchProvider {
    async fn fetch_caps(
        &self,
        _indexer: &Indexer,
    ) -> Result<(Option<String>, IndexerCaps), SearchError> {
        if let Some(e) = self.take_error().await {
            return Err(e);
        }
        Ok((Some("mock".to_string()), self.caps.read().await.clone()))
    }

    async fn search(
        &self,
        indexer: &Indexer,
        plan: &QueryPlan,
    ) -> Result<Vec<Candidate>, SearchError> {
        if let Some(e) = self.take_error().await {
            return Err(e);
        }
        self.queries.write().await.push(RecordedQuery {
            indexer_url: indexer.url.clone(),
            terms: plan.terms.clone(),
        });
        Ok(self.results.read().await.clone())
    }

    async fn rss(&self, indexer: &Indexer) -> Result<Vec<Candidate>, SearchError> {
        if let Some(e) = self.take_error().await {
            return Err(e);
        }
        self.queries.write().await.push(RecordedQuery {
            indexer_url: indexer.url.clone(),
            terms: String::new(),
        });
        Ok(self.rss_items.read().await.clone())
    }

    async fn snatch(&self, link: &str) -> Result<Vec<u8>, SearchError> {
        if let Some(e) = self.take_error().await {
            return Err(e);
        }
        self.snatches
            .read()
            .await
            .get(link)
            .cloned()
            .ok_or(SearchError::Http(404))
    }
}
