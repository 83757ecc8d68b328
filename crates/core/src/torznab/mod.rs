//! Torznab search client.
//!
//! Builds query plans from searchee names, executes them against the
//! indexer federation with timeouts and failure classification, parses
//! the RSS-with-extensions responses, and snatches candidate torrents.

mod client;
mod query;
mod types;
mod xml;

pub use client::{SearchProvider, TorznabClient};
pub use query::{intersect_with_caps, plan_query, query_params, QueryKind, QueryPlan};
pub use types::{Candidate, SearchError};
pub use xml::{parse_caps, parse_search_results};
