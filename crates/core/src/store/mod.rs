//! Persistent state.
//!
//! One SQLite database holds the indexer registry, the decision cache,
//! per-(searchee, indexer) search timestamps, cached searchees, settings,
//! and RSS cursors. See `sqlite.rs` for the schema and migrations.

mod sqlite;
mod types;

pub use sqlite::Store;
pub use types::{
    DecisionRow, Indexer, IndexerCaps, IndexerStatus, RssCursor, SearchTimestamps, StoreError,
};
