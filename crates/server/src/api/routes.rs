use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::middleware::auth_middleware;
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/api/v1/config", get(handlers::get_config))
        .route("/api/v1/search", post(handlers::trigger_search))
        .route("/api/v1/indexers", get(handlers::list_indexers))
        .route("/api/v1/indexers/{id}/test", post(handlers::test_indexer))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/api/v1/health", get(handlers::health))
        .merge(protected)
        .with_state(state)
}
