//! Types for the persistence layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use crate::matcher::Verdict;

/// Errors from the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// Health of an indexer as of its last contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexerStatus {
    Ok,
    UnknownError,
    RateLimited,
    InvalidAuth,
}

impl IndexerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexerStatus::Ok => "OK",
            IndexerStatus::UnknownError => "UNKNOWN_ERROR",
            IndexerStatus::RateLimited => "RATE_LIMITED",
            IndexerStatus::InvalidAuth => "INVALID_AUTH",
        }
    }
}

impl FromStr for IndexerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OK" => Ok(IndexerStatus::Ok),
            "UNKNOWN_ERROR" => Ok(IndexerStatus::UnknownError),
            "RATE_LIMITED" => Ok(IndexerStatus::RateLimited),
            "INVALID_AUTH" => Ok(IndexerStatus::InvalidAuth),
            other => Err(format!("unknown indexer status: {}", other)),
        }
    }
}

/// Advertised Torznab capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexerCaps {
    pub search: bool,
    pub tv_search: bool,
    pub movie: bool,
    pub music: bool,
    pub audio: bool,
    pub book: bool,
    /// Supported id parameters (e.g. `tvdbid`, `imdbid`).
    pub id_caps: Vec<String>,
    /// Supported category ids.
    pub cat_caps: Vec<String>,
    pub limits_max: Option<u32>,
    pub limits_default: Option<u32>,
}

impl Default for IndexerCaps {
    fn default() -> Self {
        Self {
            search: true,
            tv_search: false,
            movie: false,
            music: false,
            audio: false,
            book: false,
            id_caps: Vec::new(),
            cat_caps: Vec::new(),
            limits_max: None,
            limits_default: None,
        }
    }
}

/// A persisted Torznab endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct Indexer {
    pub id: i64,
    /// Canonicalized endpoint: scheme + host + path, no query.
    pub url: String,
    #[serde(skip_serializing)]
    pub apikey: String,
    pub name: Option<String>,
    pub active: bool,
    pub status: IndexerStatus,
    /// Consecutive rate-limit offenses, drives the cooldown ladder.
    pub status_count: u32,
    pub retry_after: Option<DateTime<Utc>>,
    pub caps: IndexerCaps,
}

impl Indexer {
    /// Display label: explicit name, else the endpoint host.
    pub fn label(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        self.url
            .split("://")
            .nth(1)
            .and_then(|rest| rest.split('/').next())
            .unwrap_or(&self.url)
            .to_string()
    }

    /// True while the cooldown window is open: the indexer stays
    /// enumerable but query planning skips it.
    pub fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        self.retry_after.map(|t| t > now).unwrap_or(false)
    }
}

/// A memoized match outcome for one (searchee, candidate) pair.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionRow {
    pub searchee_name: String,
    pub candidate_guid: String,
    pub info_hash: Option<String>,
    pub indexer_id: Option<i64>,
    pub verdict: Verdict,
    pub fuzzy_size_factor: Option<f64>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Per (searchee, indexer) search history.
#[derive(Debug, Clone, Copy)]
pub struct SearchTimestamps {
    pub first_searched: DateTime<Utc>,
    pub last_searched: DateTime<Utc>,
}

/// RSS high-water mark for one indexer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RssCursor {
    pub last_pub_date: Option<DateTime<Utc>>,
    /// Guids seen at the cursor instant, to disambiguate equal pubDates.
    pub last_guids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexer_status_roundtrip() {
        for s in [
            IndexerStatus::Ok,
            IndexerStatus::UnknownError,
            IndexerStatus::RateLimited,
            IndexerStatus::InvalidAuth,
        ] {
            assert_eq!(s.as_str().parse::<IndexerStatus>().unwrap(), s);
        }
    }

    #[test]
    fn test_indexer_label_falls_back_to_host() {
        let indexer = Indexer {
            id: 1,
            url: "https://indexer.example/api".to_string(),
            apikey: "k".to_string(),
            name: None,
            active: true,
            status: IndexerStatus::Ok,
            status_count: 0,
            retry_after: None,
            caps: IndexerCaps::default(),
        };
        assert_eq!(indexer.label(), "indexer.example");
    }

    #[test]
    fn test_in_cooldown() {
        let now = Utc::now();
        let mut indexer = Indexer {
            id: 1,
            url: "https://x/api".to_string(),
            apikey: "k".to_string(),
            name: None,
            active: true,
            status: IndexerStatus::RateLimited,
            status_count: 1,
            retry_after: Some(now + chrono::Duration::minutes(1)),
            caps: IndexerCaps::default(),
        };
        assert!(indexer.in_cooldown(now));
        indexer.retry_after = Some(now - chrono::Duration::minutes(1));
        assert!(!indexer.in_cooldown(now));
        indexer.retry_after = None;
        assert!(!indexer.in_cooldown(now));
    }
}
