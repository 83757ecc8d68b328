//! Types for the torrent metafile codec.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::bencode::BencodeError;

/// Errors that can occur when parsing or serializing metafiles.
#[derive(Debug, Error)]
pub enum MetafileError {
    #[error("Invalid bencode: {0}")]
    Bencode(#[from] BencodeError),

    #[error("Root element is not a dictionary")]
    RootNotDictionary,

    #[error("Missing info dictionary")]
    MissingInfo,

    #[error("Missing or invalid field: {0}")]
    InvalidField(&'static str),

    #[error("Torrent mixes single-file and multi-file modes")]
    MixedFileModes,

    #[error("Torrent declares no files")]
    EmptyFileList,

    #[error("File path escapes the torrent root: {0}")]
    PathTraversal(String),

    #[error("Info dictionary is not canonical (recomputed infohash differs)")]
    NonCanonicalInfo,

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 20-byte SHA-1 torrent identity, displayed as lowercase hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InfoHash(pub [u8; 20]);

impl InfoHash {
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for InfoHash {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim()).map_err(|e| e.to_string())?;
        let arr: [u8; 20] = bytes
            .try_into()
            .map_err(|_| "infohash must be 20 bytes".to_string())?;
        Ok(InfoHash(arr))
    }
}

impl Serialize for InfoHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for InfoHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A file entry inside a metafile: path segments relative to the torrent
/// root, plus its length in bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetafileFile {
    pub path: Vec<String>,
    pub length: u64,
}

impl MetafileFile {
    /// The `/`-joined relative path.
    pub fn joined_path(&self) -> String {
        self.path.join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infohash_display_lowercase() {
        let hash = InfoHash([0xAB; 20]);
        assert_eq!(hash.to_string(), "ab".repeat(20));
    }

    #[test]
    fn test_infohash_parse_roundtrip() {
        let s = "0123456789abcdef0123456789abcdef01234567";
        let hash: InfoHash = s.parse().unwrap();
        assert_eq!(hash.to_string(), s);
    }

    #[test]
    fn test_infohash_parse_rejects_wrong_length() {
        assert!("abcd".parse::<InfoHash>().is_err());
    }

    #[test]
    fn test_infohash_parse_rejects_non_hex() {
        assert!("zz".repeat(20).parse::<InfoHash>().is_err());
    }

    #[test]
    fn test_joined_path() {
        let f = MetafileFile {
            path: vec!["Season 1".to_string(), "ep01.mkv".to_string()],
            length: 1000,
        };
        assert_eq!(f.joined_path(), "Season 1/ep01.mkv");
    }
}
