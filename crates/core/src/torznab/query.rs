//! Query planning.
//!
//! Turns a searchee name into the Torznab query to run, and intersects
//! that plan with each indexer's advertised capabilities.

use crate::naming::{parse_release_name, NameKind};
use crate::store::IndexerCaps;

/// Torznab query function (`t=` parameter).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    TvSearch,
    Movie,
    Music,
    Book,
    Search,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::TvSearch => "tvsearch",
            QueryKind::Movie => "movie",
            QueryKind::Music => "music",
            QueryKind::Book => "book",
            QueryKind::Search => "search",
        }
    }
}

/// The query to run for one searchee, before caps intersection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    pub kind: QueryKind,
    /// Normalized title used as the `q=` term.
    pub terms: String,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    /// External id params (e.g. `("tvdbid", "123456")`) resolved via
    /// Sonarr/Radarr; each is sent only to indexers advertising the
    /// matching id-cap.
    pub ids: Vec<(String, String)>,
}

/// Build the query plan from a searchee name.
pub fn plan_query(searchee_name: &str) -> QueryPlan {
    let parsed = parse_release_name(searchee_name);
    match parsed.kind {
        NameKind::Tv { season, episodes } => QueryPlan {
            kind: QueryKind::TvSearch,
            terms: parsed.title,
            season: (season > 0).then_some(season),
            episode: episodes.first().copied().filter(|_| episodes.len() == 1),
            ids: Vec::new(),
        },
        NameKind::Movie { .. } => QueryPlan {
            kind: QueryKind::Movie,
            terms: parsed.title,
            season: None,
            episode: None,
            ids: Vec::new(),
        },
        NameKind::Generic => QueryPlan {
            kind: QueryKind::Search,
            terms: parsed.title,
            season: None,
            episode: None,
            ids: Vec::new(),
        },
    }
}

/// Intersect a plan with an indexer's caps. Returns the plan to actually
/// run, or `None` when the indexer must be skipped for this searchee.
/// Id params survive only where the indexer advertises the id-cap.
pub fn intersect_with_caps(plan: &QueryPlan, caps: &IndexerCaps) -> Option<QueryPlan> {
    let supported = match plan.kind {
        QueryKind::TvSearch => caps.tv_search,
        QueryKind::Movie => caps.movie,
        QueryKind::Music => caps.music || caps.audio,
        QueryKind::Book => caps.book,
        QueryKind::Search => caps.search,
    };
    if supported {
        let mut run = plan.clone();
        run.ids.retain(|(param, _)| caps.id_caps.iter().any(|c| c == param));
        return Some(run);
    }
    // Degrade to the generic function when the typed one is missing;
    // ids and season/ep are typed-search params, so they drop too.
    if plan.kind != QueryKind::Search && caps.search {
        return Some(QueryPlan {
            kind: QueryKind::Search,
            terms: plan.terms.clone(),
            season: None,
            episode: None,
            ids: Vec::new(),
        });
    }
    None
}

/// Query-string pairs for the plan (excluding apikey).
pub fn query_params(plan: &QueryPlan) -> Vec<(String, String)> {
    let mut params = vec![
        ("t".to_string(), plan.kind.as_str().to_string()),
        ("q".to_string(), plan.terms.clone()),
    ];
    if let Some(season) = plan.season {
        params.push(("season".to_string(), season.to_string()));
    }
    if let Some(episode) = plan.episode {
        params.push(("ep".to_string(), episode.to_string()));
    }
    for (param, value) in &plan.ids {
        params.push((param.clone(), value.clone()));
    }
    params
}
