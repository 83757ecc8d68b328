//! Types for the searchee model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::metafile::InfoHash;

/// Errors that can occur while constructing searchees.
#[derive(Debug, Error)]
pub enum SearcheeError {
    #[error("Searchee has no files: {0}")]
    EmptyFileList(String),

    #[error("File path escapes the searchee root: {0}")]
    PathEscapes(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Where a searchee came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearcheeSource {
    /// Parsed from a .torrent file.
    Torrent { info_hash: InfoHash },
    /// Reported by the active torrent client.
    Client {
        info_hash: InfoHash,
        complete: bool,
        save_path: PathBuf,
    },
    /// Built from a directory of payload files.
    Data { root: PathBuf },
}

/// A file belonging to a searchee: relative `/`-joined path plus size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearcheeFile {
    pub path: String,
    pub size: u64,
}

/// The local thing we want to find a cross-seed for.
#[derive(Debug, Clone)]
pub struct Searchee {
    pub name: String,
    pub source: SearcheeSource,
    pub files: Vec<SearcheeFile>,
    pub mtime: Option<DateTime<Utc>>,
}

impl Searchee {
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    /// The infohash, for torrent- and client-origin searchees.
    pub fn info_hash(&self) -> Option<InfoHash> {
        match &self.source {
            SearcheeSource::Torrent { info_hash } => Some(*info_hash),
            SearcheeSource::Client { info_hash, .. } => Some(*info_hash),
            SearcheeSource::Data { .. } => None,
        }
    }

    /// The payload root directory, for data-origin searchees.
    pub fn data_root(&self) -> Option<&PathBuf> {
        match &self.source {
            SearcheeSource::Data { root } => Some(root),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_size() {
        let s = Searchee {
            name: "x".to_string(),
            source: SearcheeSource::Data {
                root: PathBuf::from("/data/x"),
            },
            files: vec![
                SearcheeFile {
                    path: "a.mkv".to_string(),
                    size: 100,
                },
                SearcheeFile {
                    path: "b.mkv".to_string(),
                    size: 50,
                },
            ],
            mtime: None,
        };
        assert_eq!(s.total_size(), 150);
        assert!(s.info_hash().is_none());
        assert!(s.data_root().is_some());
    }
}
