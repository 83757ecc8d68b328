//! Types for the match engine.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Match strictness, strict to lenient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    #[default]
    Safe,
    Risky,
    Partial,
}

/// Outcome of evaluating one candidate against one searchee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Match,
    MatchSizeOnly,
    MatchPartial,
    RateLimited,
    InfoHashAlreadyExists,
    FileTreeMismatch,
    SizeMismatch,
    NoDownloadLink,
    BlockedRelease,
    UnknownError,
}

impl Verdict {
    /// Match-family verdicts are terminal: once recorded they are never
    /// downgraded by a later pass.
    pub fn is_match(&self) -> bool {
        matches!(
            self,
            Verdict::Match | Verdict::MatchSizeOnly | Verdict::MatchPartial
        )
    }

    /// Stable storage string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Match => "MATCH",
            Verdict::MatchSizeOnly => "MATCH_SIZE_ONLY",
            Verdict::MatchPartial => "MATCH_PARTIAL",
            Verdict::RateLimited => "RATE_LIMITED",
            Verdict::InfoHashAlreadyExists => "INFO_HASH_ALREADY_EXISTS",
            Verdict::FileTreeMismatch => "FILE_TREE_MISMATCH",
            Verdict::SizeMismatch => "SIZE_MISMATCH",
            Verdict::NoDownloadLink => "NO_DOWNLOAD_LINK",
            Verdict::BlockedRelease => "BLOCKED_RELEASE",
            Verdict::UnknownError => "UNKNOWN_ERROR",
        }
    }
}

impl FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MATCH" => Ok(Verdict::Match),
            "MATCH_SIZE_ONLY" => Ok(Verdict::MatchSizeOnly),
            "MATCH_PARTIAL" => Ok(Verdict::MatchPartial),
            "RATE_LIMITED" => Ok(Verdict::RateLimited),
            "INFO_HASH_ALREADY_EXISTS" => Ok(Verdict::InfoHashAlreadyExists),
            "FILE_TREE_MISMATCH" => Ok(Verdict::FileTreeMismatch),
            "SIZE_MISMATCH" => Ok(Verdict::SizeMismatch),
            "NO_DOWNLOAD_LINK" => Ok(Verdict::NoDownloadLink),
            "BLOCKED_RELEASE" => Ok(Verdict::BlockedRelease),
            "UNKNOWN_ERROR" => Ok(Verdict::UnknownError),
            other => Err(format!("unknown verdict: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_is_match() {
        assert!(Verdict::Match.is_match());
        assert!(Verdict::MatchSizeOnly.is_match());
        assert!(Verdict::MatchPartial.is_match());
        assert!(!Verdict::SizeMismatch.is_match());
        assert!(!Verdict::RateLimited.is_match());
    }

    #[test]
    fn test_verdict_storage_roundtrip() {
        for v in [
            Verdict::Match,
            Verdict::MatchSizeOnly,
            Verdict::MatchPartial,
            Verdict::RateLimited,
            Verdict::InfoHashAlreadyExists,
            Verdict::FileTreeMismatch,
            Verdict::SizeMismatch,
            Verdict::NoDownloadLink,
            Verdict::BlockedRelease,
            Verdict::UnknownError,
        ] {
            assert_eq!(v.as_str().parse::<Verdict>().unwrap(), v);
        }
    }

    #[test]
    fn test_match_mode_serde() {
        assert_eq!(
            serde_json::to_string(&MatchMode::Risky).unwrap(),
            "\"risky\""
        );
        let m: MatchMode = serde_json::from_str("\"partial\"").unwrap();
        assert_eq!(m, MatchMode::Partial);
    }
}
