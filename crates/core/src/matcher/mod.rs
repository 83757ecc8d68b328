//! Match engine.
//!
//! Decides whether a candidate's file tree is equivalent to a searchee's
//! under the configured strictness level. The decision is a pure function
//! of the two file lists and the policy, so re-running a pass with
//! identical inputs always produces identical verdicts.

mod types;

pub use types::{MatchMode, Verdict};

use std::collections::HashSet;

use crate::metafile::InfoHash;
use crate::searchee::{has_extension, Searchee, SearcheeFile};

/// Runtime matching policy, frozen per pass.
#[derive(Debug, Clone)]
pub struct MatchPolicy {
    pub match_mode: MatchMode,
    pub fuzzy_size_threshold: f64,
    pub video_extensions: Vec<String>,
    pub ignorable_extensions: Vec<String>,
    pub block_list: Vec<String>,
}

impl MatchPolicy {
    pub fn from_config(matching: &crate::config::MatchingConfig, block_list: &[String]) -> Self {
        Self {
            match_mode: matching.match_mode,
            fuzzy_size_threshold: matching.fuzzy_size_threshold,
            video_extensions: matching.video_extensions.clone(),
            ignorable_extensions: matching.ignorable_extensions.clone(),
            block_list: block_list.to_vec(),
        }
    }
}

/// Extensions that force a recheck after injection: disc images are
/// piece-aligned in ways a quick hash check can miss.
const DISC_EXTENSIONS: [&str; 4] = [".iso", ".vob", ".bdmv", ".m2ts"];

/// Cheap screening before the candidate's file list is known. Returns a
/// rejecting verdict, or `None` when the candidate is worth snatching.
pub fn prescreen(
    searchee: &Searchee,
    candidate_title: &str,
    candidate_size: Option<u64>,
    candidate_hash: Option<InfoHash>,
    client_hashes: &HashSet<InfoHash>,
    policy: &MatchPolicy,
) -> Option<Verdict> {
    if let Some(hash) = candidate_hash {
        if Some(hash) == searchee.info_hash() || client_hashes.contains(&hash) {
            return Some(Verdict::InfoHashAlreadyExists);
        }
    }
    if is_blocked(candidate_title, candidate_hash, policy) {
        return Some(Verdict::BlockedRelease);
    }
    if let Some(size) = candidate_size {
        if !within_fuzzy(searchee.total_size(), size, policy.fuzzy_size_threshold) {
            return Some(Verdict::SizeMismatch);
        }
    }
    None
}

/// Full decision procedure over the candidate's known file list.
pub fn decide(
    searchee: &Searchee,
    candidate_title: &str,
    candidate_files: &[SearcheeFile],
    candidate_hash: Option<InfoHash>,
    client_hashes: &HashSet<InfoHash>,
    policy: &MatchPolicy,
) -> Verdict {
    if let Some(hash) = candidate_hash {
        if Some(hash) == searchee.info_hash() || client_hashes.contains(&hash) {
            return Verdict::InfoHashAlreadyExists;
        }
    }
    if is_blocked(candidate_title, candidate_hash, policy) {
        return Verdict::BlockedRelease;
    }

    let candidate_total: u64 = candidate_files.iter().map(|f| f.size).sum();
    if !within_fuzzy(
        searchee.total_size(),
        candidate_total,
        policy.fuzzy_size_threshold,
    ) {
        return Verdict::SizeMismatch;
    }

    let local = normalize(&searchee.files);
    let remote = normalize(candidate_files);

    if exact_tree_match(&local, &remote) {
        return Verdict::Match;
    }

    if policy.match_mode == MatchMode::Safe {
        return Verdict::FileTreeMismatch;
    }

    if size_bijection(&local, &remote) {
        return Verdict::MatchSizeOnly;
    }

    if policy.match_mode == MatchMode::Risky {
        return Verdict::FileTreeMismatch;
    }

    // PARTIAL: ignorable auxiliaries may exist on either side only; the
    // remaining set must satisfy the RISKY-level equivalence.
    let local_kept = strip_ignorable(&local, &policy.ignorable_extensions);
    let remote_kept = strip_ignorable(&remote, &policy.ignorable_extensions);
    let stripped_any =
        local_kept.len() != local.len() || remote_kept.len() != remote.len();

    if stripped_any
        && !local_kept.is_empty()
        && (exact_tree_match(&local_kept, &remote_kept) || size_bijection(&local_kept, &remote_kept))
    {
        return Verdict::MatchPartial;
    }

    Verdict::FileTreeMismatch
}

/// Whether a match should be rechecked in the client after injection.
pub fn should_recheck(searchee: &Searchee, verdict: Verdict) -> bool {
    if verdict == Verdict::MatchPartial {
        return true;
    }
    let disc: Vec<String> = DISC_EXTENSIONS.iter().map(|s| s.to_string()).collect();
    searchee.files.iter().any(|f| has_extension(&f.path, &disc))
}

fn is_blocked(title: &str, hash: Option<InfoHash>, policy: &MatchPolicy) -> bool {
    let hash_hex = hash.map(|h| h.to_string());
    policy.block_list.iter().any(|entry| {
        title.contains(entry.as_str())
            || hash_hex
                .as_deref()
                .map(|h| h.eq_ignore_ascii_case(entry))
                .unwrap_or(false)
    })
}

fn within_fuzzy(expected: u64, actual: u64, threshold: f64) -> bool {
    if expected == actual {
        return true;
    }
    if expected == 0 {
        return false;
    }
    let delta = expected.abs_diff(actual) as f64;
    delta / expected as f64 <= threshold
}

/// Strip a uniform top-level directory so a renamed wrapping folder never
/// breaks comparison, then sort for deterministic equality checks.
fn normalize(files: &[SearcheeFile]) -> Vec<SearcheeFile> {
    let mut out: Vec<SearcheeFile> = if files.len() > 1 {
        let first_root = files[0].path.split('/').next().unwrap_or("");
        let uniform = !first_root.is_empty()
            && files
                .iter()
                .all(|f| f.path.split('/').next() == Some(first_root) && f.path.contains('/'));
        if uniform {
            files
                .iter()
                .map(|f| SearcheeFile {
                    path: f.path[first_root.len() + 1..].to_string(),
                    size: f.size,
                })
                .collect()
        } else {
            files.to_vec()
        }
    } else {
        files.to_vec()
    };
    out.sort_by(|a, b| a.path.cmp(&b.path));
    out
}

fn exact_tree_match(local: &[SearcheeFile], remote: &[SearcheeFile]) -> bool {
    local == remote
}

/// Equal counts and a bijection on file sizes, paths ignored.
fn size_bijection(local: &[SearcheeFile], remote: &[SearcheeFile]) -> bool {
    if local.len() != remote.len() {
        return false;
    }
    let mut local_sizes: Vec<u64> = local.iter().map(|f| f.size).collect();
    let mut remote_sizes: Vec<u64> = remote.iter().map(|f| f.size).collect();
    local_sizes.sort_unstable();
    remote_sizes.sort_unstable();
    local_sizes == remote_sizes
}

fn strip_ignorable(files: &[SearcheeFile], ignorable: &[String]) -> Vec<SearcheeFile> {
    files
        .iter()
        .filter(|f| !has_extension(&f.path, ignorable))
        .cloned()
        .collect()
}
