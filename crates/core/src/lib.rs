//! resow core: cross-seed discovery engine.
//!
//! Turns local torrents, client entries, and data directories into
//! Torznab queries, resolves candidate equivalence, and saves or injects
//! the confirmed matches.

pub mod auth;
pub mod config;
pub mod indexer;
pub mod linker;
pub mod matcher;
pub mod metadata;
pub mod metafile;
pub mod naming;
pub mod notify;
pub mod pipeline;
pub mod scheduler;
pub mod searchee;
pub mod store;
pub mod testing;
pub mod torrent_client;
pub mod torznab;

pub use auth::{
    generate_api_key, reset_api_key, resolve_api_key, ApiKeyAuthenticator, AuthError, AuthRequest,
    Authenticator, Identity,
};
pub use config::{
    load_config, load_config_from_str, parse_duration, validate_config, validate_search_config,
    Action, Config, ConfigError, DurationString, SanitizedConfig,
};
pub use linker::{LinkError, LinkKind, Linker};
pub use matcher::{MatchMode, MatchPolicy, Verdict};
pub use metadata::{ArrLookup, MetadataError};
pub use metafile::{render_diff, InfoHash, Metafile, MetafileError};
pub use notify::Notifier;
pub use pipeline::{PassSummary, Pipeline, PipelineError};
pub use scheduler::{JobName, JobState, Scheduler};
pub use searchee::{Searchee, SearcheeFile, SearcheeSource};
pub use store::{Indexer, IndexerStatus, Store, StoreError};
pub use torrent_client::{create_client_adapter, ClientError, InjectResult, TorrentClientAdapter};
pub use torznab::{Candidate, SearchError, SearchProvider, TorznabClient};
