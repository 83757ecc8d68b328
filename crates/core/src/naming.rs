//! Release name parsing.
//!
//! Classifies a searchee name into a query kind (tv / movie / generic) and
//! extracts the normalized title used as the Torznab search term.

use regex::Regex;
use std::sync::OnceLock;

/// What a release name parses as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameKind {
    /// Season/episode style release. `episodes` is empty for a season pack.
    Tv {
        season: u32,
        episodes: Vec<u32>,
    },
    /// Year-tagged release.
    Movie { year: u32 },
    /// Anything else.
    Generic,
}

/// Parse result for a release name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    /// Title with separators normalized to spaces, release tokens stripped.
    pub title: String,
    pub kind: NameKind,
}

impl ParsedName {
    /// True for a bare single-episode release: one SxxEyy episode with no
    /// pack indication.
    pub fn is_single_episode(&self) -> bool {
        matches!(&self.kind, NameKind::Tv { episodes, .. } if episodes.len() == 1)
    }
}

fn episode_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bS(\d{1,2})(?:[ ._-]?E(\d{1,3})(?:[-._ ]?E?(\d{1,3}))?)?\b").unwrap()
    })
}

fn year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").unwrap())
}

fn season_word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(season[ ._-]?\d{1,2}|complete)\b").unwrap())
}

/// Parse a release name into a title and classification.
pub fn parse_release_name(name: &str) -> ParsedName {
    let spaced = name.replace(['.', '_'], " ");

    if let Some(caps) = episode_re().captures(&spaced) {
        let season: u32 = caps[1].parse().unwrap_or(0);
        let mut episodes = Vec::new();
        if let Some(first) = caps.get(2) {
            if let Ok(e) = first.as_str().parse() {
                episodes.push(e);
            }
        }
        if let Some(second) = caps.get(3) {
            if let Ok(e) = second.as_str().parse() {
                episodes.push(e);
            }
        }
        let title = normalize_title(&spaced[..caps.get(0).unwrap().start()]);
        return ParsedName {
            title,
            kind: NameKind::Tv { season, episodes },
        };
    }

    if season_word_re().is_match(&spaced) {
        let m = season_word_re().find(&spaced).unwrap();
        return ParsedName {
            title: normalize_title(&spaced[..m.start()]),
            kind: NameKind::Tv {
                season: 0,
                episodes: Vec::new(),
            },
        };
    }

    if let Some(m) = year_re().find(&spaced) {
        // A year at position 0 is part of the title, not a tag.
        if m.start() > 0 {
            let year: u32 = m.as_str().parse().unwrap_or(0);
            return ParsedName {
                title: normalize_title(&spaced[..m.start()]),
                kind: NameKind::Movie { year },
            };
        }
    }

    ParsedName {
        title: normalize_title(&spaced),
        kind: NameKind::Generic,
    }
}

fn normalize_title(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| if c == '-' || c == '(' || c == ')' || c == '[' || c == ']' { ' ' } else { c })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}
