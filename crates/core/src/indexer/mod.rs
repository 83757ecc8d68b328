//! Indexer registry.
//!
//! Policy layer over the persisted indexer rows: URL canonicalization,
//! result marking, and the rate-limit cooldown ladder. The HTTP side of
//! `test-connection` lives in the torznab client; this module owns the
//! classification bookkeeping.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::store::{Indexer, IndexerCaps, IndexerStatus, Store, StoreError};

/// Cooldown ladder for consecutive 429s: 1 min, 5 min, 15 min, then an
/// hour repeating.
const BACKOFF_MINUTES: [i64; 4] = [1, 5, 15, 60];

/// Outcome of one indexer contact, as classified from the HTTP response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactResult {
    Success,
    RateLimited,
    AuthFailure,
    Unknown,
}

impl ContactResult {
    /// Classify an HTTP status code the way `test-connection` does:
    /// 401 is an auth failure, 429 a rate limit, 2xx success, anything
    /// else unknown.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            200..=299 => ContactResult::Success,
            401 => ContactResult::AuthFailure,
            429 => ContactResult::RateLimited,
            _ => ContactResult::Unknown,
        }
    }
}

/// Registry of Torznab endpoints.
pub struct IndexerRegistry {
    store: Arc<Store>,
}

impl IndexerRegistry {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Sync the registry with the configured URLs: upsert each endpoint
    /// (splitting the apikey out of the query string) and deactivate rows
    /// that are no longer configured.
    pub fn sync_from_config(&self, urls: &[String]) -> Result<Vec<Indexer>, StoreError> {
        let mut canonical = Vec::with_capacity(urls.len());
        let mut indexers = Vec::with_capacity(urls.len());
        for raw in urls {
            let (url, apikey) = split_apikey(raw);
            let url = canonicalize_url(&url);
            let indexer = self.store.upsert_indexer(&url, &apikey)?;
            canonical.push(url);
            indexers.push(indexer);
        }
        self.store.retain_indexers(&canonical)?;
        Ok(indexers)
    }

    pub fn list(&self) -> Result<Vec<Indexer>, StoreError> {
        self.store.list_indexers()
    }

    pub fn list_active(&self) -> Result<Vec<Indexer>, StoreError> {
        self.store.list_active_indexers()
    }

    pub fn get(&self, id: i64) -> Result<Option<Indexer>, StoreError> {
        self.store.get_indexer(id)
    }

    /// Indexers eligible for query planning right now: active, not in an
    /// open cooldown window, and not marked invalid-auth.
    pub fn list_searchable(&self, now: DateTime<Utc>) -> Result<Vec<Indexer>, StoreError> {
        Ok(self
            .store
            .list_active_indexers()?
            .into_iter()
            .filter(|i| !i.in_cooldown(now) && i.status != IndexerStatus::InvalidAuth)
            .collect())
    }

    /// Record the result of a contact and update health columns.
    pub fn mark_result(&self, indexer: &Indexer, result: ContactResult) -> Result<(), StoreError> {
        match result {
            ContactResult::Success => {
                // Consecutive-offense counter resets on success.
                self.store
                    .update_indexer_health(indexer.id, IndexerStatus::Ok, 0, None)
            }
            ContactResult::RateLimited => {
                let offenses = indexer.status_count + 1;
                let retry_after = Utc::now() + backoff(offenses);
                warn!(
                    indexer = %indexer.label(),
                    offenses,
                    retry_after = %retry_after,
                    "Indexer rate limited, entering cooldown"
                );
                self.store.update_indexer_health(
                    indexer.id,
                    IndexerStatus::RateLimited,
                    offenses,
                    Some(retry_after),
                )
            }
            ContactResult::AuthFailure => {
                warn!(indexer = %indexer.label(), "Indexer rejected the API key");
                self.store.update_indexer_health(
                    indexer.id,
                    IndexerStatus::InvalidAuth,
                    indexer.status_count,
                    None,
                )
            }
            ContactResult::Unknown => self.store.update_indexer_health(
                indexer.id,
                IndexerStatus::UnknownError,
                indexer.status_count,
                None,
            ),
        }
    }

    /// Persist freshly fetched caps.
    pub fn record_caps(
        &self,
        indexer: &Indexer,
        name: Option<&str>,
        caps: &IndexerCaps,
    ) -> Result<(), StoreError> {
        self.store.update_indexer_caps(indexer.id, name, caps)
    }

    /// Reset status and cooldown for every indexer.
    pub fn clear_failures(&self) -> Result<usize, StoreError> {
        let n = self.store.clear_indexer_failures()?;
        info!(count = n, "Cleared indexer failures");
        Ok(n)
    }
}

/// Cooldown for the nth consecutive offense (1-based).
fn backoff(offenses: u32) -> Duration {
    let idx = (offenses.max(1) as usize - 1).min(BACKOFF_MINUTES.len() - 1);
    Duration::minutes(BACKOFF_MINUTES[idx])
}

/// Strip the apikey out of a configured URL's query string. Shared with
/// the metadata lookup clients, whose URLs follow the same convention.
pub(crate) fn split_apikey(raw: &str) -> (String, String) {
    match raw.split_once('?') {
        None => (raw.to_string(), String::new()),
        Some((base, query)) => {
            let mut apikey = String::new();
            let rest: Vec<&str> = query
                .split('&')
                .filter(|pair| {
                    if let Some(value) = pair.strip_prefix("apikey=") {
                        apikey = value.to_string();
                        false
                    } else {
                        true
                    }
                })
                .collect();
            if rest.is_empty() {
                (base.to_string(), apikey)
            } else {
                (format!("{}?{}", base, rest.join("&")), apikey)
            }
        }
    }
}

/// Canonical endpoint form: no query, no trailing slash.
fn canonicalize_url(url: &str) -> String {
    let base = url.split('?').next().unwrap_or(url);
    base.trim_end_matches('/').to_string()
}
