//! Types for the search pipeline.

use serde::Serialize;
use thiserror::Error;

use crate::metafile::MetafileError;
use crate::searchee::SearcheeError;
use crate::store::StoreError;

/// Errors that abort a whole pass. Per-candidate failures never surface
/// here; they are logged and recorded as decisions.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Database error: {0}")]
    Store(#[from] StoreError),

    #[error("Searchee enumeration failed: {0}")]
    Searchee(#[from] SearcheeError),

    #[error("Failed to read torrent dir: {0}")]
    TorrentDir(String),

    #[error("Invalid metafile {path}: {source}")]
    Metafile {
        path: String,
        #[source]
        source: MetafileError,
    },
}

/// Counters for one pass, reported to the log and the notifier.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PassSummary {
    /// Searchees considered after filters.
    pub searchees: usize,
    /// Searchees actually searched (not excluded by history windows).
    pub searched: usize,
    /// Candidates evaluated.
    pub candidates: usize,
    /// Match-family decisions recorded this pass.
    pub matches: usize,
    /// Candidates that failed with a transient error.
    pub errors: usize,
}

impl PassSummary {
    pub fn absorb(&mut self, other: PassSummary) {
        self.searchees += other.searchees;
        self.searched += other.searched;
        self.candidates += other.candidates;
        self.matches += other.matches;
        self.errors += other.errors;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absorb() {
        let mut total = PassSummary::default();
        total.absorb(PassSummary {
            searchees: 1,
            searched: 1,
            candidates: 3,
            matches: 1,
            errors: 0,
        });
        total.absorb(PassSummary {
            searchees: 1,
            searched: 0,
            candidates: 0,
            matches: 0,
            errors: 1,
        });
        assert_eq!(total.searchees, 2);
        assert_eq!(total.candidates, 3);
        assert_eq!(total.matches, 1);
        assert_eq!(total.errors, 1);
    }
}
