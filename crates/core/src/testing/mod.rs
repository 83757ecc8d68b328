//! Testing utilities and mock implementations.
//!
//! Mock implementations of the search-provider and client-adapter seams,
//! plus torrent fixture builders, so pipeline and integration tests run
//! without real infrastructure.

mod mock_client;
mod mock_search_provider;
mod torrents;

pub use mock_client::{MockClientAdapter, RecordedInject};
pub use mock_search_provider::{MockSearchProvider, RecordedQuery};
pub use torrents::{multi_file_torrent, single_file_torrent};
