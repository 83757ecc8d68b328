//! Torrent metafile codec.
//!
//! Decodes .torrent files into a structured view (name, trackers, file
//! tree, infohash) and re-encodes them for artifact emission. The raw
//! `info` dictionary bytes are retained verbatim so the infohash survives
//! a parse/serialize round trip unchanged.

mod bencode;
mod types;

pub use bencode::{decode, encode, BencodeError, Value};
pub use types::{InfoHash, MetafileError, MetafileFile};

use chrono::{DateTime, TimeZone, Utc};
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;
use std::path::Path;

/// A parsed torrent metafile.
#[derive(Debug, Clone)]
pub struct Metafile {
    /// SHA-1 of the info dictionary as observed during parse.
    pub info_hash: InfoHash,
    /// Torrent name (`info.name`).
    pub name: String,
    /// Announce URLs, grouped in tiers.
    pub announce: Vec<Vec<String>>,
    /// Flat file list. Single-file torrents carry one entry named after
    /// the torrent itself.
    pub files: Vec<MetafileFile>,
    /// Creation timestamp, when declared.
    pub created: Option<DateTime<Utc>>,
    /// Raw bytes of the info dictionary, kept for re-serialization.
    raw_info: Vec<u8>,
}

impl Metafile {
    /// Parse a metafile from raw bytes.
    ///
    /// Rejects non-dictionary roots, missing `info`, mixed file modes,
    /// path traversal, and info dictionaries whose canonical re-encoding
    /// would change the infohash.
    pub fn parse(data: &[u8]) -> Result<Self, MetafileError> {
        let entries = match bencode::decode_dict_with_spans(data) {
            Ok(entries) => entries,
            Err(BencodeError::InvalidByte { offset: 0, .. }) => {
                return Err(MetafileError::RootNotDictionary)
            }
            Err(e) => return Err(MetafileError::Bencode(e)),
        };

        let mut info: Option<(&Value, (usize, usize))> = None;
        let mut announce: Option<String> = None;
        let mut announce_list: Vec<Vec<String>> = Vec::new();
        let mut created: Option<DateTime<Utc>> = None;

        for (key, value, span) in &entries {
            match key.as_slice() {
                b"info" => info = Some((value, *span)),
                b"announce" => announce = value.as_str_lossy(),
                b"announce-list" => {
                    if let Some(tiers) = value.as_list() {
                        for tier in tiers {
                            let urls: Vec<String> = tier
                                .as_list()
                                .unwrap_or(&[])
                                .iter()
                                .filter_map(|u| u.as_str_lossy())
                                .collect();
                            if !urls.is_empty() {
                                announce_list.push(urls);
                            }
                        }
                    }
                }
                b"creation date" => {
                    created = value
                        .as_int()
                        .and_then(|secs| Utc.timestamp_opt(secs, 0).single());
                }
                _ => {}
            }
        }

        let (info_value, (start, end)) = info.ok_or(MetafileError::MissingInfo)?;
        if !matches!(info_value, Value::Dict(_)) {
            return Err(MetafileError::MissingInfo);
        }
        let raw_info = data[start..end].to_vec();

        let observed = sha1_of(&raw_info);
        let recomputed = sha1_of(&bencode::encode(info_value));
        if observed != recomputed {
            return Err(MetafileError::NonCanonicalInfo);
        }

        let name = info_value
            .get(b"name")
            .and_then(|v| v.as_str_lossy())
            .ok_or(MetafileError::InvalidField("info.name"))?;

        let files = parse_file_list(info_value, &name)?;

        let mut tiers = announce_list;
        if tiers.is_empty() {
            if let Some(url) = announce {
                tiers.push(vec![url]);
            }
        }

        Ok(Self {
            info_hash: InfoHash(observed),
            name,
            announce: tiers,
            files,
            created,
            raw_info,
        })
    }

    /// Read and parse a metafile from disk.
    pub fn load(path: &Path) -> Result<Self, MetafileError> {
        let data = std::fs::read(path).map_err(|source| MetafileError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&data)
    }

    /// Re-encode the metafile. The info dictionary is spliced back in
    /// verbatim, so the infohash is preserved byte-for-byte.
    pub fn serialize(&self) -> Vec<u8> {
        // Canonical outer dict: keys emitted in sorted order.
        let mut fields: Vec<(&[u8], Vec<u8>)> = Vec::new();

        if let Some(first) = self.announce.first().and_then(|t| t.first()) {
            fields.push((b"announce", bencode::encode(&Value::Bytes(first.clone().into_bytes()))));
        }
        if self.announce.iter().map(|t| t.len()).sum::<usize>() > 1 || self.announce.len() > 1 {
            let tiers = Value::List(
                self.announce
                    .iter()
                    .map(|tier| {
                        Value::List(
                            tier.iter()
                                .map(|u| Value::Bytes(u.clone().into_bytes()))
                                .collect(),
                        )
                    })
                    .collect(),
            );
            fields.push((b"announce-list", bencode::encode(&tiers)));
        }
        if let Some(created) = self.created {
            fields.push((b"creation date", bencode::encode(&Value::Int(created.timestamp()))));
        }
        fields.push((b"info", self.raw_info.clone()));

        fields.sort_by(|a, b| a.0.cmp(b.0));

        let mut out = Vec::with_capacity(self.raw_info.len() + 128);
        out.push(b'd');
        for (key, encoded) in fields {
            out.extend_from_slice(key.len().to_string().as_bytes());
            out.push(b':');
            out.extend_from_slice(key);
            out.extend_from_slice(&encoded);
        }
        out.push(b'e');
        out
    }

    /// Sum of all file lengths.
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.length).sum()
    }

    /// Host of the first announce URL, used for per-tracker directories.
    pub fn primary_tracker(&self) -> Option<String> {
        let url = self.announce.first()?.first()?;
        host_of(url)
    }

    /// Deterministic depth-first tree rendering for human inspection.
    pub fn render_tree(&self) -> String {
        let mut root = TreeNode::default();
        for file in &self.files {
            root.insert(&file.path, file.length);
        }
        let mut out = format!("{}  {}\n", self.name, format_size(self.total_size()));
        root.render("", &mut out);
        out
    }
}

/// Render the differences between two metafiles' file lists.
pub fn render_diff(a: &Metafile, b: &Metafile) -> String {
    let mut out = String::new();
    if a.info_hash == b.info_hash {
        out.push_str("infohash: identical\n");
    } else {
        out.push_str(&format!("infohash: {} != {}\n", a.info_hash, b.info_hash));
    }

    let a_files: BTreeMap<String, u64> =
        a.files.iter().map(|f| (f.joined_path(), f.length)).collect();
    let b_files: BTreeMap<String, u64> =
        b.files.iter().map(|f| (f.joined_path(), f.length)).collect();

    for (path, size) in &a_files {
        match b_files.get(path) {
            None => out.push_str(&format!("- {}  {}\n", path, format_size(*size))),
            Some(other) if other != size => out.push_str(&format!(
                "! {}  {} != {}\n",
                path,
                format_size(*size),
                format_size(*other)
            )),
            Some(_) => {}
        }
    }
    for (path, size) in &b_files {
        if !a_files.contains_key(path) {
            out.push_str(&format!("+ {}  {}\n", path, format_size(*size)));
        }
    }
    if a_files == b_files {
        out.push_str("file trees: identical\n");
    }
    out
}

fn parse_file_list(info: &Value, name: &str) -> Result<Vec<MetafileFile>, MetafileError> {
    let length = info.get(b"length").and_then(|v| v.as_int());
    let files = info.get(b"files").and_then(|v| v.as_list());

    match (length, files) {
        (Some(_), Some(_)) => Err(MetafileError::MixedFileModes),
        (None, None) => Err(MetafileError::EmptyFileList),
        (Some(length), None) => {
            if length < 0 {
                return Err(MetafileError::InvalidField("info.length"));
            }
            Ok(vec![MetafileFile {
                path: vec![name.to_string()],
                length: length as u64,
            }])
        }
        (None, Some(entries)) => {
            let mut result = Vec::with_capacity(entries.len());
            for entry in entries {
                let length = entry
                    .get(b"length")
                    .and_then(|v| v.as_int())
                    .filter(|l| *l >= 0)
                    .ok_or(MetafileError::InvalidField("files[].length"))?;
                let segments = entry
                    .get(b"path")
                    .and_then(|v| v.as_list())
                    .ok_or(MetafileError::InvalidField("files[].path"))?;
                let path: Vec<String> = segments
                    .iter()
                    .filter_map(|s| s.as_str_lossy())
                    .collect();
                if path.is_empty() {
                    return Err(MetafileError::InvalidField("files[].path"));
                }
                for segment in &path {
                    if segment == ".." || segment.is_empty() || segment.contains('/') {
                        return Err(MetafileError::PathTraversal(path.join("/")));
                    }
                }
                result.push(MetafileFile {
                    path,
                    length: length as u64,
                });
            }
            if result.is_empty() {
                return Err(MetafileError::EmptyFileList);
            }
            Ok(result)
        }
    }
}

fn sha1_of(data: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hasher.finalize().into()
}

fn host_of(url: &str) -> Option<String> {
    let rest = url.split("://").nth(1)?;
    let host = rest.split(['/', '?']).next()?;
    let host = host.split('@').next_back()?;
    let host = host.split(':').next()?;
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

/// Human-readable binary size.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}

#[derive(Default)]
struct TreeNode {
    children: BTreeMap<String, TreeNode>,
    size: Option<u64>,
}

impl TreeNode {
    fn insert(&mut self, path: &[String], size: u64) {
        match path {
            [] => {}
            [leaf] => {
                self.children.entry(leaf.clone()).or_default().size = Some(size);
            }
            [dir, rest @ ..] => {
                self.children.entry(dir.clone()).or_default().insert(rest, size);
            }
        }
    }

    fn render(&self, prefix: &str, out: &mut String) {
        let count = self.children.len();
        for (i, (name, node)) in self.children.iter().enumerate() {
            let last = i == count - 1;
            let connector = if last { "└── " } else { "├── " };
            match node.size {
                Some(size) => {
                    out.push_str(&format!("{}{}{}  {}\n", prefix, connector, name, format_size(size)))
                }
                None => out.push_str(&format!("{}{}{}\n", prefix, connector, name)),
            }
            let child_prefix = if last {
                format!("{}    ", prefix)
            } else {
                format!("{}│   ", prefix)
            };
            node.render(&child_prefix, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{multi_file_torrent, single_file_torrent};

    #[test]
    fn test_parse_single_file() {
        let data = single_file_torrent("foo.mkv", 1_000_000_000, "http://tracker.example/ann");
        let meta = Metafile::parse(&data).unwrap();
        assert_eq!(meta.name, "foo.mkv");
        assert_eq!(meta.files.len(), 1);
        assert_eq!(meta.files[0].path, vec!["foo.mkv"]);
        assert_eq!(meta.total_size(), 1_000_000_000);
        assert_eq!(meta.announce, vec![vec!["http://tracker.example/ann".to_string()]]);
    }

    #[test]
    fn test_parse_multi_file() {
        let data = multi_file_torrent(
            "Some.Show.S01",
            &[(&["ep01.mkv"], 100), (&["Extras", "bonus.mkv"], 50)],
            "http://t.example/a",
        );
        let meta = Metafile::parse(&data).unwrap();
        assert_eq!(meta.files.len(), 2);
        assert_eq!(meta.files[1].joined_path(), "Extras/bonus.mkv");
        assert_eq!(meta.total_size(), 150);
    }

    #[test]
    fn test_parse_rejects_non_dict_root() {
        assert!(matches!(
            Metafile::parse(b"l4:spame"),
            Err(MetafileError::RootNotDictionary)
        ));
    }

    #[test]
    fn test_parse_rejects_missing_info() {
        let root = Value::Dict(vec![(b"announce".to_vec(), Value::Bytes(b"x".to_vec()))]);
        assert!(matches!(
            Metafile::parse(&encode(&root)),
            Err(MetafileError::MissingInfo)
        ));
    }

    #[test]
    fn test_parse_rejects_mixed_modes() {
        let info = Value::Dict(vec![
            (b"files".to_vec(), Value::List(vec![])),
            (b"length".to_vec(), Value::Int(5)),
            (b"name".to_vec(), Value::Bytes(b"x".to_vec())),
        ]);
        let root = Value::Dict(vec![(b"info".to_vec(), info)]);
        assert!(matches!(
            Metafile::parse(&encode(&root)),
            Err(MetafileError::MixedFileModes)
        ));
    }

    #[test]
    fn test_parse_rejects_path_traversal() {
        let data = multi_file_torrent("evil", &[(&["..", "etc", "passwd"], 1)], "http://t/a");
        assert!(matches!(
            Metafile::parse(&data),
            Err(MetafileError::PathTraversal(_))
        ));
    }

    #[test]
    fn test_serialize_roundtrip_preserves_infohash() {
        let data = multi_file_torrent(
            "Pack",
            &[(&["a.mkv"], 10), (&["b.mkv"], 20)],
            "http://t.example/a",
        );
        let meta = Metafile::parse(&data).unwrap();
        let reparsed = Metafile::parse(&meta.serialize()).unwrap();
        assert_eq!(reparsed.info_hash, meta.info_hash);
        assert_eq!(reparsed.name, meta.name);
        assert_eq!(reparsed.files, meta.files);
        // Second round trip is byte-stable.
        assert_eq!(reparsed.serialize(), meta.serialize());
    }

    #[test]
    fn test_infohash_is_over_info_span() {
        let data = single_file_torrent("foo.mkv", 42, "http://t/a");
        let meta = Metafile::parse(&data).unwrap();

        // Same info, different announce: identical infohash.
        let data2 = single_file_torrent("foo.mkv", 42, "http://other.example/b");
        let meta2 = Metafile::parse(&data2).unwrap();
        assert_eq!(meta.info_hash, meta2.info_hash);

        // Different info: different infohash.
        let data3 = single_file_torrent("foo.mkv", 43, "http://t/a");
        let meta3 = Metafile::parse(&data3).unwrap();
        assert_ne!(meta.info_hash, meta3.info_hash);
    }

    #[test]
    fn test_primary_tracker() {
        let data = single_file_torrent("foo.mkv", 1, "https://tracker.example:8443/announce");
        let meta = Metafile::parse(&data).unwrap();
        assert_eq!(meta.primary_tracker(), Some("tracker.example".to_string()));
    }

    #[test]
    fn test_render_tree_deterministic() {
        let data = multi_file_torrent(
            "Pack",
            &[(&["b", "two.mkv"], 2), (&["a.mkv"], 1)],
            "http://t/a",
        );
        let meta = Metafile::parse(&data).unwrap();
        let tree = meta.render_tree();
        assert!(tree.starts_with("Pack"));
        // Lexicographic: a.mkv before directory b.
        let a_pos = tree.find("a.mkv").unwrap();
        let b_pos = tree.find("two.mkv").unwrap();
        assert!(a_pos < b_pos);
    }

    #[test]
    fn test_render_diff() {
        let a = Metafile::parse(&multi_file_torrent(
            "X",
            &[(&["ep.mkv"], 100)],
            "http://t/a",
        ))
        .unwrap();
        let b = Metafile::parse(&multi_file_torrent(
            "X",
            &[(&["ep.mkv"], 100), (&["ep.nfo"], 5)],
            "http://t/a",
        ))
        .unwrap();
        let diff = render_diff(&a, &b);
        assert!(diff.contains("+ ep.nfo"));
        assert!(!diff.contains("- ep.mkv"));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.00 KiB");
        assert_eq!(format_size(1_073_741_824), "1.00 GiB");
    }
}
