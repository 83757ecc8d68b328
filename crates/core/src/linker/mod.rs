//! Link tree builder.
//!
//! For data-origin matches, mirrors the candidate's file layout under the
//! configured link directory using hardlinks, symlinks, or reflinks. The
//! payload itself is never modified; all writes stay inside `link_dir`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

use crate::config::LinkingConfig;
use crate::searchee::{Searchee, SearcheeFile};

/// How links are created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    #[default]
    Hardlink,
    Symlink,
    Reflink,
}

/// Errors that can occur while building a link tree.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Source and destination are on different filesystems: {source_path} -> {dest_path}")]
    CrossDevice {
        source_path: String,
        dest_path: String,
    },

    #[error("No local file pairs with candidate file {0}")]
    NoSourceForFile(String),

    #[error("Searchee has no data root (not data-origin)")]
    NotDataOrigin,

    #[error("Link kind {0:?} is not supported on this platform")]
    Unsupported(LinkKind),

    #[error("Failed to link {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Builds link trees for data-origin matches.
pub struct Linker {
    config: LinkingConfig,
}

impl Linker {
    pub fn new(config: LinkingConfig) -> Self {
        Self { config }
    }

    /// Create the link tree for a matched candidate. Returns the root the
    /// torrent client should use as its download directory.
    ///
    /// Sources are resolved by the name-and-size pairing the matcher
    /// established: exact basename+size first, then any remaining file of
    /// equal size.
    pub async fn link_tree(
        &self,
        searchee: &Searchee,
        candidate_name: &str,
        candidate_files: &[SearcheeFile],
        tracker: Option<&str>,
    ) -> Result<PathBuf, LinkError> {
        let data_root = searchee.data_root().ok_or(LinkError::NotDataOrigin)?;

        let mut base = self.config.link_dir.clone();
        if !self.config.flat_linking {
            if let Some(tracker) = tracker {
                base = base.join(tracker);
            }
        }

        let pairing = pair_sources(searchee, data_root, candidate_files)?;

        let single_file =
            candidate_files.len() == 1 && candidate_files[0].path == candidate_name;

        for (candidate_file, source) in &pairing {
            let dest = if single_file {
                base.join(candidate_name)
            } else {
                base.join(candidate_name).join(&candidate_file.path)
            };
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).await.map_err(|source| LinkError::Io {
                    path: parent.display().to_string(),
                    source,
                })?;
            }
            self.link_one(source, &dest).await?;
        }

        let root = base.join(candidate_name);
        debug!(root = %root.display(), files = pairing.len(), "Link tree created");
        Ok(root)
    }

    async fn link_one(&self, source: &Path, dest: &Path) -> Result<(), LinkError> {
        // An existing link from an earlier pass is fine.
        if fs::try_exists(dest).await.unwrap_or(false) {
            return Ok(());
        }
        match self.config.link_type {
            LinkKind::Hardlink => match fs::hard_link(source, dest).await {
                Ok(()) => Ok(()),
                Err(e)
                    if e.kind() == std::io::ErrorKind::CrossesDevices
                        || e.raw_os_error() == Some(18) =>
                {
                    Err(LinkError::CrossDevice {
                        source_path: source.display().to_string(),
                        dest_path: dest.display().to_string(),
                    })
                }
                Err(source) => Err(LinkError::Io {
                    path: dest.display().to_string(),
                    source,
                }),
            },
            LinkKind::Symlink => {
                #[cfg(unix)]
                {
                    fs::symlink(source, dest).await.map_err(|source| LinkError::Io {
                        path: dest.display().to_string(),
                        source,
                    })
                }
                #[cfg(not(unix))]
                {
                    Err(LinkError::Unsupported(LinkKind::Symlink))
                }
            }
            LinkKind::Reflink => reflink(source, dest),
        }
    }
}

/// Pair each candidate file with a source path inside the searchee root.
fn pair_sources(
    searchee: &Searchee,
    data_root: &Path,
    candidate_files: &[SearcheeFile],
) -> Result<Vec<(SearcheeFile, PathBuf)>, LinkError> {
    // A single-file data searchee's root is the payload file itself.
    let root_is_file = searchee.files.len() == 1
        && data_root
            .file_name()
            .map(|n| n.to_string_lossy() == searchee.files[0].path)
            .unwrap_or(false);

    let source_path = |file: &SearcheeFile| -> PathBuf {
        if root_is_file {
            data_root.to_path_buf()
        } else {
            data_root.join(&file.path)
        }
    };

    let mut by_size: HashMap<u64, Vec<&SearcheeFile>> = HashMap::new();
    for file in &searchee.files {
        by_size.entry(file.size).or_default().push(file);
    }

    let mut out = Vec::with_capacity(candidate_files.len());
    for candidate in candidate_files {
        let pool = by_size
            .get_mut(&candidate.size)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| LinkError::NoSourceForFile(candidate.path.clone()))?;

        let candidate_base = basename(&candidate.path);
        let idx = pool
            .iter()
            .position(|f| basename(&f.path) == candidate_base)
            .unwrap_or(0);
        let chosen = pool.remove(idx);
        out.push((candidate.clone(), source_path(chosen)));
    }
    Ok(out)
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(target_os = "linux")]
fn reflink(source: &Path, dest: &Path) -> Result<(), LinkError> {
    use std::os::fd::AsRawFd;

    const FICLONE: libc::c_ulong = 0x4004_9409;

    let src = std::fs::File::open(source).map_err(|source| LinkError::Io {
        path: dest.display().to_string(),
        source,
    })?;
    let dst = std::fs::File::create(dest).map_err(|source| LinkError::Io {
        path: dest.display().to_string(),
        source,
    })?;
    let rc = unsafe { libc::ioctl(dst.as_raw_fd(), FICLONE, src.as_raw_fd()) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        let _ = std::fs::remove_file(dest);
        if err.raw_os_error() == Some(18) {
            return Err(LinkError::CrossDevice {
                source_path: source.display().to_string(),
                dest_path: dest.display().to_string(),
            });
        }
        return Err(LinkError::Io {
            path: dest.display().to_string(),
            source: err,
        });
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn reflink(_source: &Path, _dest: &Path) -> Result<(), LinkError> {
    Err(LinkError::Unsupported(LinkKind::Reflink))
}
