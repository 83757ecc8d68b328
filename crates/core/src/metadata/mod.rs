//! Sonarr/Radarr lookup clients.
//!
//! Resolve external ids (tvdbid, imdbid, tmdbid) for a release title so
//! typed Torznab queries can carry id parameters on indexers that
//! advertise the matching id-cap. Lookups are best-effort: a failed or
//! empty lookup just means the query runs on terms alone.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::config::MetadataConfig;
use crate::indexer::split_apikey;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Lookup request failed: {0}")]
    RequestFailed(String),

    #[error("Lookup service returned HTTP {0}")]
    Http(u16),

    #[error("Failed to parse lookup response: {0}")]
    Parse(String),
}

/// One configured Sonarr or Radarr instance.
struct ArrEndpoint {
    base_url: String,
    apikey: String,
}

impl ArrEndpoint {
    /// URLs follow the torznab convention: apikey in the query string.
    fn from_url(raw: &str) -> Self {
        let (url, apikey) = split_apikey(raw);
        Self {
            base_url: url.trim_end_matches('/').to_string(),
            apikey,
        }
    }
}

/// External-id lookup over the configured Sonarr/Radarr instances.
pub struct ArrLookup {
    client: Client,
    sonarr: Vec<ArrEndpoint>,
    radarr: Vec<ArrEndpoint>,
}

impl ArrLookup {
    /// Build the lookup client, or `None` when no instance is
    /// configured.
    pub fn from_config(config: &MetadataConfig, timeout: Duration) -> Option<Self> {
        if config.sonarr_urls.is_empty() && config.radarr_urls.is_empty() {
            return None;
        }
        let client = Client::builder().timeout(timeout).build().ok()?;
        Some(Self {
            client,
            sonarr: config
                .sonarr_urls
                .iter()
                .map(|u| ArrEndpoint::from_url(u))
                .collect(),
            radarr: config
                .radarr_urls
                .iter()
                .map(|u| ArrEndpoint::from_url(u))
                .collect(),
        })
    }

    /// Torznab id params for a TV title, from the first Sonarr instance
    /// that knows it.
    pub async fn series_ids(&self, title: &str) -> Result<Vec<(String, String)>, MetadataError> {
        for endpoint in &self.sonarr {
            let url = format!("{}/api/v3/series/lookup", endpoint.base_url);
            let results: Vec<SonarrSeries> = self.fetch(endpoint, &url, title).await?;
            if let Some(series) = results.first() {
                debug!(title, tvdb_id = series.tvdb_id, "Sonarr lookup hit");
                return Ok(series_params(series));
            }
        }
        Ok(Vec::new())
    }

    /// Torznab id params for a movie title, from the first Radarr
    /// instance that knows it.
    pub async fn movie_ids(&self, title: &str) -> Result<Vec<(String, String)>, MetadataError> {
        for endpoint in &self.radarr {
            let url = format!("{}/api/v3/movie/lookup", endpoint.base_url);
            let results: Vec<RadarrMovie> = self.fetch(endpoint, &url, title).await?;
            if let Some(movie) = results.first() {
                debug!(title, tmdb_id = movie.tmdb_id, "Radarr lookup hit");
                return Ok(movie_params(movie));
            }
        }
        Ok(Vec::new())
    }

    async fn fetch<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &ArrEndpoint,
        url: &str,
        term: &str,
    ) -> Result<T, MetadataError> {
        let response = self
            .client
            .get(url)
            .header("X-Api-Key", &endpoint.apikey)
            .query(&[("term", term)])
            .send()
            .await
            .map_err(|e| MetadataError::RequestFailed(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(MetadataError::Http(status.as_u16()));
        }
        response
            .json()
            .await
            .map_err(|e| MetadataError::Parse(e.to_string()))
    }
}

fn series_params(series: &SonarrSeries) -> Vec<(String, String)> {
    let mut params = Vec::new();
    if let Some(tvdb_id) = series.tvdb_id {
        params.push(("tvdbid".to_string(), tvdb_id.to_string()));
    }
    if let Some(imdb) = numeric_imdb(series.imdb_id.as_deref()) {
        params.push(("imdbid".to_string(), imdb));
    }
    params
}

fn movie_params(movie: &RadarrMovie) -> Vec<(String, String)> {
    let mut params = Vec::new();
    if let Some(tmdb_id) = movie.tmdb_id {
        params.push(("tmdbid".to_string(), tmdb_id.to_string()));
    }
    if let Some(imdb) = numeric_imdb(movie.imdb_id.as_deref()) {
        params.push(("imdbid".to_string(), imdb));
    }
    params
}

/// Torznab imdbid params are numeric; Sonarr/Radarr report `tt1234567`.
fn numeric_imdb(raw: Option<&str>) -> Option<String> {
    let digits = raw?.trim_start_matches("tt");
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(digits.to_string())
}

#[derive(Debug, Deserialize)]
struct SonarrSeries {
    #[serde(rename = "tvdbId")]
    tvdb_id: Option<u64>,
    #[serde(rename = "imdbId", default)]
    imdb_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RadarrMovie {
    #[serde(rename = "tmdbId")]
    tmdb_id: Option<u64>,
    #[serde(rename = "imdbId", default)]
    imdb_id: Option<String>,
}
