use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use resow_core::searchee;
use resow_core::{
    Indexer, InfoHash, JobState, Metafile, PassSummary, SanitizedConfig, Searchee,
};

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub jobs: Vec<JobState>,
    pub indexers_active: usize,
    pub indexers_total: usize,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let indexers = state.pipeline().registry().list().unwrap_or_default();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        jobs: state
            .scheduler()
            .map(|s| s.job_states())
            .unwrap_or_default(),
        indexers_active: indexers.iter().filter(|i| i.active).count(),
        indexers_total: indexers.len(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    /// Infohash of a torrent present in `torrent_dir`.
    #[serde(default)]
    pub info_hash: Option<String>,
    /// Absolute path to a data file or directory.
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub searchee: String,
    pub summary: PassSummary,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Trigger a search for a single searchee, by infohash or by path.
pub async fn trigger_search(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, (StatusCode, Json<ErrorResponse>)> {
    let searchee = resolve_searchee(&state, &request)
        .map_err(|(status, message)| error(status, message))?;

    let summary = state
        .pipeline()
        .search_one(&searchee)
        .await
        .map_err(|e| error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(SearchResponse {
        searchee: searchee.name,
        summary,
    }))
}

fn resolve_searchee(
    state: &AppState,
    request: &SearchRequest,
) -> Result<Searchee, (StatusCode, String)> {
    if let Some(path) = &request.path {
        let block_list = &state.config().search.block_list;
        return searchee::searchee_from_path(std::path::Path::new(path), block_list)
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
            .ok_or((StatusCode::NOT_FOUND, format!("no files under {}", path)));
    }

    let Some(hash_text) = &request.info_hash else {
        return Err((
            StatusCode::BAD_REQUEST,
            "either infoHash or path is required".to_string(),
        ));
    };
    let info_hash: InfoHash = hash_text
        .parse()
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("bad infohash: {}", e)))?;

    let Some(torrent_dir) = &state.config().search.torrent_dir else {
        return Err((
            StatusCode::NOT_FOUND,
            "no torrent_dir configured to resolve infohashes".to_string(),
        ));
    };
    let entries = std::fs::read_dir(torrent_dir)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().map(|e| e == "torrent").unwrap_or(false) {
            if let Ok(meta) = Metafile::load(&path) {
                if meta.info_hash == info_hash {
                    return searchee::from_metafile(&meta, None)
                        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
                }
            }
        }
    }
    Err((
        StatusCode::NOT_FOUND,
        format!("no torrent with infohash {}", info_hash),
    ))
}

pub async fn list_indexers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Indexer>>, (StatusCode, Json<ErrorResponse>)> {
    state
        .pipeline()
        .registry()
        .list()
        .map(Json)
        .map_err(|e| error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

#[derive(Serialize)]
pub struct TestIndexerResponse {
    pub indexer: String,
    pub result: String,
}

/// Probe one indexer with a caps query and record the outcome.
pub async fn test_indexer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<TestIndexerResponse>, (StatusCode, Json<ErrorResponse>)> {
    let registry = state.pipeline().registry();
    let indexer = registry
        .get(id)
        .map_err(|e| error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or_else(|| error(StatusCode::NOT_FOUND, format!("no indexer {}", id)))?;

    let result = state.torznab().test_connection(&indexer).await;
    registry
        .mark_result(&indexer, result)
        .map_err(|e| error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(TestIndexerResponse {
        indexer: indexer.label(),
        result: format!("{:?}", result),
    }))
}
