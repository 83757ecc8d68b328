//! resow server: CLI, admin API, and daemon wiring.

pub mod api;
pub mod cli;
pub mod state;

pub use api::create_router;
pub use state::AppState;
