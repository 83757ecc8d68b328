use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use super::duration::DurationString;
use crate::linker::LinkKind;
use crate::matcher::MatchMode;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub torznab: TorznabConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub linking: Option<LinkingConfig>,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Sonarr/Radarr lookup configuration. URLs carry the apikey in the
/// query string, like torznab endpoints.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct MetadataConfig {
    /// Sonarr instances used to resolve TV ids (tvdbid, imdbid).
    #[serde(default)]
    pub sonarr_urls: Vec<String>,
    /// Radarr instances used to resolve movie ids (tmdbid, imdbid).
    #[serde(default)]
    pub radarr_urls: Vec<String>,
}

/// Admin API server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Set false to run without the admin API (`--no-port`).
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            enabled: true,
        }
    }
}

fn default_host() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_port() -> u16 {
    2468
}

fn default_true() -> bool {
    true
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("resow.db")
}

/// Torznab federation configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct TorznabConfig {
    /// Indexer endpoints. The `apikey` query parameter is split off and
    /// stored per indexer; the stored URL is canonicalized without query.
    #[serde(default)]
    pub urls: Vec<String>,
}

/// What to do with a confirmed match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    #[default]
    Save,
    Inject,
}

/// Search pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Directory of .torrent files to enumerate searchees from.
    #[serde(default)]
    pub torrent_dir: Option<PathBuf>,
    /// Data directories to enumerate searchees from.
    #[serde(default)]
    pub data_dirs: Vec<PathBuf>,
    /// Where matched artifact torrents are written.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_max_data_depth")]
    pub max_data_depth: usize,
    #[serde(default)]
    pub include_non_videos: bool,
    #[serde(default)]
    pub include_single_episodes: bool,
    /// Skip searchees first seen more than this many minutes ago.
    #[serde(default)]
    pub exclude_older_minutes: Option<u64>,
    /// Skip searchees searched within this many minutes.
    #[serde(default)]
    pub exclude_recent_search_minutes: Option<u64>,
    /// Max searchees per bulk pass (0 = unlimited).
    #[serde(default)]
    pub search_limit: usize,
    /// Pause between indexer batches for a searchee.
    #[serde(default = "default_delay")]
    pub delay: DurationString,
    #[serde(default = "default_timeout")]
    pub search_timeout: DurationString,
    #[serde(default = "default_timeout")]
    pub snatch_timeout: DurationString,
    /// Cadence of the periodic bulk search (daemon mode).
    #[serde(default)]
    pub search_cadence: Option<DurationString>,
    /// Cadence of the periodic RSS scan (daemon mode).
    #[serde(default)]
    pub rss_cadence: Option<DurationString>,
    /// Names and infohashes to never match.
    #[serde(default)]
    pub block_list: Vec<String>,
    #[serde(default)]
    pub action: Action,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            torrent_dir: None,
            data_dirs: Vec::new(),
            output_dir: default_output_dir(),
            max_data_depth: default_max_data_depth(),
            include_non_videos: false,
            include_single_episodes: false,
            exclude_older_minutes: None,
            exclude_recent_search_minutes: None,
            search_limit: 0,
            delay: default_delay(),
            search_timeout: default_timeout(),
            snatch_timeout: default_timeout(),
            search_cadence: None,
            rss_cadence: None,
            block_list: Vec::new(),
            action: Action::Save,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_max_data_depth() -> usize {
    2
}

fn default_delay() -> DurationString {
    DurationString::from_secs(10)
}

fn default_timeout() -> DurationString {
    DurationString::from_secs(30)
}

/// Matcher configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MatchingConfig {
    #[serde(default)]
    pub match_mode: MatchMode,
    #[serde(default = "default_fuzzy_size_threshold")]
    pub fuzzy_size_threshold: f64,
    #[serde(default = "default_video_extensions")]
    pub video_extensions: Vec<String>,
    #[serde(default = "default_ignorable_extensions")]
    pub ignorable_extensions: Vec<String>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            match_mode: MatchMode::default(),
            fuzzy_size_threshold: default_fuzzy_size_threshold(),
            video_extensions: default_video_extensions(),
            ignorable_extensions: default_ignorable_extensions(),
        }
    }
}

fn default_fuzzy_size_threshold() -> f64 {
    0.02
}

/// Primary content extensions.
pub fn default_video_extensions() -> Vec<String> {
    [
        ".mkv", ".mp4", ".avi", ".m2ts", ".ts", ".mov", ".wmv", ".iso", ".vob", ".bdmv", ".m4v",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Non-video auxiliaries whose presence should not break a PARTIAL match.
pub fn default_ignorable_extensions() -> Vec<String> {
    [
        ".nfo", ".srt", ".sub", ".idx", ".txt", ".jpg", ".jpeg", ".png", ".sfv", ".md5", ".cue",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Link tree configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LinkingConfig {
    pub link_dir: PathBuf,
    #[serde(default)]
    pub link_type: LinkKind,
    #[serde(default)]
    pub flat_linking: bool,
}

/// Torrent client configuration. The first configured URL wins, in order
/// rtorrent, qbittorrent, transmission, deluge.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ClientConfig {
    #[serde(default)]
    pub rtorrent_rpc_url: Option<String>,
    #[serde(default)]
    pub qbittorrent_rpc_url: Option<String>,
    #[serde(default)]
    pub transmission_rpc_url: Option<String>,
    #[serde(default)]
    pub deluge_rpc_url: Option<String>,
    #[serde(default)]
    pub duplicate_categories: bool,
}

impl ClientConfig {
    pub fn any_configured(&self) -> bool {
        self.rtorrent_rpc_url.is_some()
            || self.qbittorrent_rpc_url.is_some()
            || self.transmission_rpc_url.is_some()
            || self.deluge_rpc_url.is_some()
    }
}

/// Webhook configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct NotificationConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,
}

/// Admin API authentication
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct AuthConfig {
    /// Explicit API key. When unset, a key is generated once and stored
    /// in the settings table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub torznab_urls: Vec<String>,
    pub search: SearchConfig,
    pub matching: MatchingConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linking: Option<LinkingConfig>,
    pub client: SanitizedClientConfig,
    pub sonarr_urls: Vec<String>,
    pub radarr_urls: Vec<String>,
    pub webhook_configured: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedClientConfig {
    pub kind: Option<String>,
    pub duplicate_categories: bool,
}

impl Config {
    /// Redact API keys and credentials for API exposure.
    pub fn sanitized(&self) -> SanitizedConfig {
        let kind = if self.client.rtorrent_rpc_url.is_some() {
            Some("rtorrent".to_string())
        } else if self.client.qbittorrent_rpc_url.is_some() {
            Some("qbittorrent".to_string())
        } else if self.client.transmission_rpc_url.is_some() {
            Some("transmission".to_string())
        } else if self.client.deluge_rpc_url.is_some() {
            Some("deluge".to_string())
        } else {
            None
        };

        SanitizedConfig {
            server: self.server.clone(),
            database: self.database.clone(),
            torznab_urls: self.torznab.urls.iter().map(|u| redact_query(u)).collect(),
            search: self.search.clone(),
            matching: self.matching.clone(),
            linking: self.linking.clone(),
            client: SanitizedClientConfig {
                kind,
                duplicate_categories: self.client.duplicate_categories,
            },
            sonarr_urls: self
                .metadata
                .sonarr_urls
                .iter()
                .map(|u| redact_query(u))
                .collect(),
            radarr_urls: self
                .metadata
                .radarr_urls
                .iter()
                .map(|u| redact_query(u))
                .collect(),
            webhook_configured: self.notification.webhook_url.is_some(),
        }
    }
}

fn redact_query(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _)) => format!("{}?<redacted>", base),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 2468);
        assert!(config.server.enabled);
        assert_eq!(config.search.max_data_depth, 2);
        assert_eq!(config.search.delay.as_duration().as_secs(), 10);
        assert_eq!(config.search.search_timeout.as_duration().as_secs(), 30);
        assert_eq!(config.matching.fuzzy_size_threshold, 0.02);
        assert_eq!(config.search.action, Action::Save);
        assert!(config.matching.video_extensions.contains(&".mkv".to_string()));
        assert!(config
            .matching
            .ignorable_extensions
            .contains(&".nfo".to_string()));
    }

    #[test]
    fn test_sanitized_redacts_apikeys() {
        let config = Config {
            torznab: TorznabConfig {
                urls: vec!["https://indexer.example/api?apikey=secret".to_string()],
            },
            metadata: MetadataConfig {
                sonarr_urls: vec!["http://sonarr.local:8989?apikey=s".to_string()],
                radarr_urls: Vec::new(),
            },
            ..Default::default()
        };
        let sanitized = config.sanitized();
        assert_eq!(
            sanitized.torznab_urls[0],
            "https://indexer.example/api?<redacted>"
        );
        assert_eq!(sanitized.sonarr_urls[0], "http://sonarr.local:8989?<redacted>");
        assert!(sanitized.radarr_urls.is_empty());
    }

    #[test]
    fn test_client_selection_order_in_sanitized() {
        let config = Config {
            client: ClientConfig {
                qbittorrent_rpc_url: Some("http://q:8080".to_string()),
                transmission_rpc_url: Some("http://t:9091".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(
            config.sanitized().client.kind.as_deref(),
            Some("qbittorrent")
        );
    }
}
