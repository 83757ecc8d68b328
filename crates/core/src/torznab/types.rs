//! Types for the Torznab search system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::indexer::ContactResult;
use crate::metafile::InfoHash;

/// One item from a Torznab search response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub title: String,
    /// Stable identifier from the feed; falls back to the link.
    pub guid: String,
    /// .torrent download URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pub_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info_hash: Option<InfoHash>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seeders: Option<u32>,
}

/// Errors from Torznab queries and snatches.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Indexer rejected the API key")]
    AuthFailed,

    #[error("Indexer rate limited the request")]
    RateLimited,

    #[error("HTTP {0}")]
    Http(u16),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Indexer does not support the required search capability")]
    MissingCapability,
}

impl SearchError {
    /// Fold into the registry's contact classification.
    pub fn contact_result(&self) -> ContactResult {
        match self {
            SearchError::AuthFailed => ContactResult::AuthFailure,
            SearchError::RateLimited => ContactResult::RateLimited,
            _ => ContactResult::Unknown,
        }
    }

    pub fn from_status(status: u16) -> Self {
        match status {
            401 => SearchError::AuthFailed,
            429 => SearchError::RateLimited,
            other => SearchError::Http(other),
        }
    }
}
