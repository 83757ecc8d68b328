//! Searchee model.
//!
//! A searchee is the uniform view of "something we want to cross-seed":
//! a parsed torrent, an entry reported by the torrent client, or a
//! directory of payload files.

mod data;
mod types;

pub use data::{searchee_from_path, searchees_from_data_dir};
pub use types::{Searchee, SearcheeError, SearcheeFile, SearcheeSource};

use chrono::{DateTime, Utc};
use std::path::PathBuf;

use crate::metafile::{InfoHash, Metafile};
use crate::naming::parse_release_name;

/// Build a searchee from a parsed metafile.
pub fn from_metafile(
    meta: &Metafile,
    mtime: Option<DateTime<Utc>>,
) -> Result<Searchee, SearcheeError> {
    let files: Vec<SearcheeFile> = meta
        .files
        .iter()
        .map(|f| SearcheeFile {
            path: f.joined_path(),
            size: f.length,
        })
        .collect();
    if files.is_empty() {
        return Err(SearcheeError::EmptyFileList(meta.name.clone()));
    }
    Ok(Searchee {
        name: meta.name.clone(),
        source: SearcheeSource::Torrent {
            info_hash: meta.info_hash,
        },
        files,
        mtime: mtime.or(meta.created),
    })
}

/// Build a searchee from a torrent-client entry.
pub fn from_client_entry(
    name: String,
    info_hash: InfoHash,
    save_path: PathBuf,
    complete: bool,
    files: Vec<SearcheeFile>,
    added_at: Option<DateTime<Utc>>,
) -> Result<Searchee, SearcheeError> {
    if files.is_empty() {
        return Err(SearcheeError::EmptyFileList(name));
    }
    for file in &files {
        if file.path.starts_with('/') || file.path.split('/').any(|seg| seg == "..") {
            return Err(SearcheeError::PathEscapes(file.path.clone()));
        }
    }
    Ok(Searchee {
        name,
        source: SearcheeSource::Client {
            info_hash,
            complete,
            save_path,
        },
        files,
        mtime: added_at,
    })
}

/// Options controlling which searchees survive enumeration.
#[derive(Debug, Clone)]
pub struct SearcheeFilterOptions {
    pub include_non_videos: bool,
    pub include_single_episodes: bool,
    pub video_extensions: Vec<String>,
}

/// Apply the non-video and single-episode filters.
pub fn passes_filters(searchee: &Searchee, opts: &SearcheeFilterOptions) -> bool {
    if !opts.include_non_videos {
        let has_video = searchee
            .files
            .iter()
            .any(|f| has_extension(&f.path, &opts.video_extensions));
        if !has_video {
            return false;
        }
    }
    if !opts.include_single_episodes && parse_release_name(&searchee.name).is_single_episode() {
        return false;
    }
    true
}

pub(crate) fn has_extension(path: &str, extensions: &[String]) -> bool {
    let lower = path.to_lowercase();
    extensions.iter().any(|ext| lower.ends_with(ext.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_video_extensions;

    fn video_opts(include_non_videos: bool, include_single_episodes: bool) -> SearcheeFilterOptions {
        SearcheeFilterOptions {
            include_non_videos,
            include_single_episodes,
            video_extensions: default_video_extensions(),
        }
    }

    fn data_searchee(name: &str, files: &[(&str, u64)]) -> Searchee {
        Searchee {
            name: name.to_string(),
            source: SearcheeSource::Data {
                root: PathBuf::from("/data").join(name),
            },
            files: files
                .iter()
                .map(|(p, s)| SearcheeFile {
                    path: p.to_string(),
                    size: *s,
                })
                .collect(),
            mtime: None,
        }
    }

    #[test]
    fn test_non_video_filter() {
        let album = data_searchee("Album", &[("01.flac", 100), ("02.flac", 100)]);
        assert!(!passes_filters(&album, &video_opts(false, true)));
        assert!(passes_filters(&album, &video_opts(true, true)));

        let movie = data_searchee("Movie", &[("movie.mkv", 100)]);
        assert!(passes_filters(&movie, &video_opts(false, true)));
    }

    #[test]
    fn test_single_episode_filter() {
        let episode = data_searchee("Show.S01E03.1080p", &[("ep.mkv", 100)]);
        assert!(!passes_filters(&episode, &video_opts(false, false)));
        assert!(passes_filters(&episode, &video_opts(false, true)));

        let pack = data_searchee("Show.S01.1080p", &[("e1.mkv", 1), ("e2.mkv", 1)]);
        assert!(passes_filters(&pack, &video_opts(false, false)));
    }

    #[test]
    fn test_from_client_entry_rejects_traversal() {
        let hash = InfoHash([1u8; 20]);
        let result = from_client_entry(
            "x".to_string(),
            hash,
            PathBuf::from("/dl"),
            true,
            vec![SearcheeFile {
                path: "../escape.mkv".to_string(),
                size: 1,
            }],
            None,
        );
        assert!(matches!(result, Err(SearcheeError::PathEscapes(_))));
    }

    #[test]
    fn test_from_client_entry_rejects_empty() {
        let hash = InfoHash([1u8; 20]);
        let result = from_client_entry(
            "x".to_string(),
            hash,
            PathBuf::from("/dl"),
            true,
            vec![],
            None,
        );
        assert!(matches!(result, Err(SearcheeError::EmptyFileList(_))));
    }
}
