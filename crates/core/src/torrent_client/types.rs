//! Types for torrent client operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

use crate::matcher::Verdict;
use crate::metafile::{InfoHash, Metafile};
use crate::searchee::{Searchee, SearcheeFile};

/// Errors that can occur during torrent client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Torrent not found: {0}")]
    TorrentNotFound(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Operation not supported by {0}")]
    Unsupported(&'static str),
}

/// A torrent as reported by the active client.
#[derive(Debug, Clone, Serialize)]
pub struct ClientTorrent {
    pub info_hash: InfoHash,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub tags: Vec<String>,
    /// Announce URLs grouped in tiers, mirroring the metafile shape.
    pub trackers: Vec<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_path: Option<PathBuf>,
    pub complete: bool,
    /// File list when the client reports one; used to build searchees.
    pub files: Vec<SearcheeFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
}

/// Outcome of an injection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectResult {
    Success,
    AlreadyExists,
    TorrentNotComplete,
    Failure(String),
}

/// Where a torrent's payload lives, if the client knows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadDirResult {
    Found(PathBuf),
    NotFound,
    TorrentNotComplete,
    Unknown,
}

/// Capability contract every torrent client adapter implements.
///
/// Exactly one adapter is active per process, selected at startup from
/// which RPC URL is configured. The save-only stub satisfies the same
/// interface when no client is configured.
#[async_trait]
pub trait TorrentClientAdapter: Send + Sync {
    /// Adapter name for logging.
    fn name(&self) -> &'static str;

    /// Probe the client once at startup; failures are CONFIG_INVALID.
    async fn validate_config(&self) -> Result<(), ClientError>;

    async fn is_torrent_complete(&self, info_hash: InfoHash) -> Result<bool, ClientError>;

    async fn get_all_torrents(&self) -> Result<Vec<ClientTorrent>, ClientError>;

    /// Resolve the payload directory for a searchee's existing torrent.
    async fn get_download_dir(
        &self,
        info_hash: InfoHash,
        only_completed: bool,
    ) -> Result<DownloadDirResult, ClientError>;

    /// Add a matched torrent, pointed at the existing payload.
    async fn inject(
        &self,
        meta: &Metafile,
        searchee: &Searchee,
        decision: Verdict,
        download_dir: Option<&std::path::Path>,
    ) -> InjectResult;

    async fn recheck_torrent(&self, info_hash: InfoHash) -> Result<(), ClientError>;
}
