//! Data-directory searchee enumeration.
//!
//! Walks configured data directories and turns leaf directories (and
//! top-level files) into searchees. Symlinks are never followed; hidden
//! files and block-listed names are excluded.

use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::types::{Searchee, SearcheeError, SearcheeFile, SearcheeSource};

/// Enumerate searchees from a data directory.
///
/// Directories are considered down to `max_depth` levels below `root`; a
/// directory becomes one searchee when it has no subdirectories or when it
/// sits at the depth bound. Regular files directly below intermediate
/// levels become single-file searchees.
pub fn searchees_from_data_dir(
    root: &Path,
    max_depth: usize,
    block_list: &[String],
) -> Result<Vec<Searchee>, SearcheeError> {
    let mut searchees = Vec::new();
    collect(root, 1, max_depth.max(1), block_list, &mut searchees)?;
    debug!(
        root = %root.display(),
        count = searchees.len(),
        "Enumerated data-dir searchees"
    );
    Ok(searchees)
}

fn collect(
    dir: &Path,
    depth: usize,
    max_depth: usize,
    block_list: &[String],
    out: &mut Vec<Searchee>,
) -> Result<(), SearcheeError> {
    let entries = std::fs::read_dir(dir).map_err(|source| SearcheeError::Io {
        path: dir.display().to_string(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| SearcheeError::Io {
            path: dir.display().to_string(),
            source,
        })?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_excluded(&name, block_list) {
            continue;
        }

        let file_type = entry.file_type().map_err(|source| SearcheeError::Io {
            path: path.display().to_string(),
            source,
        })?;
        if file_type.is_symlink() {
            continue;
        }

        if file_type.is_file() {
            let meta = entry.metadata().map_err(|source| SearcheeError::Io {
                path: path.display().to_string(),
                source,
            })?;
            out.push(Searchee {
                name: name.clone(),
                source: SearcheeSource::Data {
                    root: path.clone(),
                },
                files: vec![SearcheeFile {
                    path: name,
                    size: meta.len(),
                }],
                mtime: mtime_of(&meta),
            });
        } else if file_type.is_dir() {
            if depth >= max_depth || !has_subdirectories(&path) {
                match searchee_from_dir(&path, block_list) {
                    Ok(Some(searchee)) => out.push(searchee),
                    Ok(None) => {}
                    Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable directory"),
                }
            } else {
                collect(&path, depth + 1, max_depth, block_list, out)?;
            }
        }
    }
    Ok(())
}

/// Build one searchee from a directory: all descendant regular files,
/// paths relative to the directory.
fn searchee_from_dir(
    root: &Path,
    block_list: &[String],
) -> Result<Option<Searchee>, SearcheeError> {
    let mut files = Vec::new();
    let mut latest_mtime: Option<DateTime<Utc>> = None;

    for entry in WalkDir::new(root).follow_links(false).into_iter() {
        let entry = entry.map_err(|e| SearcheeError::Io {
            path: root.display().to_string(),
            source: e.into(),
        })?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.depth() > 0 && is_excluded(&name, block_list) {
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|_| SearcheeError::PathEscapes(entry.path().display().to_string()))?;
        let meta = entry.metadata().map_err(|e| SearcheeError::Io {
            path: entry.path().display().to_string(),
            source: e.into(),
        })?;
        let mtime = mtime_of(&meta);
        if latest_mtime.is_none() || mtime > latest_mtime {
            latest_mtime = mtime;
        }
        files.push(SearcheeFile {
            path: relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/"),
            size: meta.len(),
        });
    }

    if files.is_empty() {
        return Ok(None);
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));

    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.display().to_string());

    Ok(Some(Searchee {
        name,
        source: SearcheeSource::Data {
            root: root.to_path_buf(),
        },
        files,
        mtime: latest_mtime,
    }))
}

/// Build one searchee from an explicit path (file or directory), for
/// on-demand searches triggered through the admin API.
pub fn searchee_from_path(
    path: &Path,
    block_list: &[String],
) -> Result<Option<Searchee>, SearcheeError> {
    let meta = std::fs::metadata(path).map_err(|source| SearcheeError::Io {
        path: path.display().to_string(),
        source,
    })?;
    if meta.is_file() {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        return Ok(Some(Searchee {
            name: name.clone(),
            source: SearcheeSource::Data {
                root: path.to_path_buf(),
            },
            files: vec![SearcheeFile {
                path: name,
                size: meta.len(),
            }],
            mtime: mtime_of(&meta),
        }));
    }
    searchee_from_dir(path, block_list)
}

fn is_excluded(name: &str, block_list: &[String]) -> bool {
    name.starts_with('.') || block_list.iter().any(|b| b == name)
}

fn has_subdirectories(path: &Path) -> bool {
    std::fs::read_dir(path)
        .map(|mut entries| {
            entries.any(|e| {
                e.map(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
                    .unwrap_or(false)
            })
        })
        .unwrap_or(false)
}

fn mtime_of(meta: &std::fs::Metadata) -> Option<DateTime<Utc>> {
    meta.modified().ok().map(DateTime::<Utc>::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path, size: usize) {
        fs::write(path, vec![0u8; size]).unwrap();
    }

    #[test]
    fn test_leaf_directory_becomes_searchee() {
        let tmp = tempfile::tempdir().unwrap();
        let show = tmp.path().join("Some.Show.S01");
        fs::create_dir(&show).unwrap();
        touch(&show.join("ep01.mkv"), 100);
        touch(&show.join("ep02.mkv"), 200);

        let searchees = searchees_from_data_dir(tmp.path(), 2, &[]).unwrap();
        assert_eq!(searchees.len(), 1);
        assert_eq!(searchees[0].name, "Some.Show.S01");
        assert_eq!(searchees[0].files.len(), 2);
        assert_eq!(searchees[0].total_size(), 300);
        assert_eq!(searchees[0].files[0].path, "ep01.mkv");
    }

    #[test]
    fn test_top_level_file_becomes_searchee() {
        let tmp = tempfile::tempdir().unwrap();
        touch(&tmp.path().join("movie.mkv"), 42);

        let searchees = searchees_from_data_dir(tmp.path(), 2, &[]).unwrap();
        assert_eq!(searchees.len(), 1);
        assert_eq!(searchees[0].files[0].path, "movie.mkv");
        assert_eq!(searchees[0].files[0].size, 42);
    }

    #[test]
    fn test_depth_bound_groups_nested_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        // category/show/season -> with max_depth 2, "show" is at the bound
        // and becomes one searchee containing both seasons.
        let show = tmp.path().join("tv").join("Show");
        fs::create_dir_all(show.join("Season 1")).unwrap();
        fs::create_dir_all(show.join("Season 2")).unwrap();
        touch(&show.join("Season 1").join("e1.mkv"), 10);
        touch(&show.join("Season 2").join("e2.mkv"), 20);

        let searchees = searchees_from_data_dir(tmp.path(), 2, &[]).unwrap();
        assert_eq!(searchees.len(), 1);
        assert_eq!(searchees[0].name, "Show");
        assert_eq!(searchees[0].files.len(), 2);
        assert_eq!(searchees[0].files[0].path, "Season 1/e1.mkv");
    }

    #[test]
    fn test_hidden_and_blocked_excluded() {
        let tmp = tempfile::tempdir().unwrap();
        touch(&tmp.path().join(".hidden.mkv"), 10);
        touch(&tmp.path().join("blocked.mkv"), 10);
        touch(&tmp.path().join("kept.mkv"), 10);

        let searchees =
            searchees_from_data_dir(tmp.path(), 2, &["blocked.mkv".to_string()]).unwrap();
        assert_eq!(searchees.len(), 1);
        assert_eq!(searchees[0].name, "kept.mkv");
    }

    #[test]
    fn test_empty_directory_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("empty")).unwrap();

        let searchees = searchees_from_data_dir(tmp.path(), 2, &[]).unwrap();
        assert!(searchees.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_not_followed() {
        let tmp = tempfile::tempdir().unwrap();
        let real = tmp.path().join("real");
        fs::create_dir(&real).unwrap();
        touch(&real.join("a.mkv"), 10);
        std::os::unix::fs::symlink(&real, tmp.path().join("link")).unwrap();

        let searchees = searchees_from_data_dir(tmp.path(), 2, &[]).unwrap();
        assert_eq!(searchees.len(), 1);
        assert_eq!(searchees[0].name, "real");
    }
}
