//! Command-line interface.

use clap::{Args, Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;

use resow_core::config::LinkingConfig;
use resow_core::{parse_duration, Action, Config, DurationString, LinkKind, MatchMode};

/// Cross-seed discovery for torrent collections.
#[derive(Parser)]
#[command(name = "resow", version, about)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "config.toml")]
    pub config: PathBuf,

    /// Verbose logging (debug level).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write a starter configuration file.
    GenConfig {
        /// Emit container-layout paths under /config.
        #[arg(long)]
        docker: bool,
    },
    /// Delete cached decisions that never ended in a snatch.
    ClearCache,
    /// Reset status and cooldown for all indexers.
    ClearIndexerFailures,
    /// Send a probe notification to the configured webhook.
    TestNotification {
        #[arg(long)]
        notification_webhook_url: Option<String>,
    },
    /// Compare the file trees of two torrents.
    Diff { a: PathBuf, b: PathBuf },
    /// Print a torrent's file tree.
    Tree { torrent: PathBuf },
    /// Print the admin API key.
    ApiKey,
    /// Rotate the admin API key.
    ResetApiKey,
    /// Run the scheduler and admin API.
    Daemon(SharedOptions),
    /// Run one RSS scan.
    Rss(SharedOptions),
    /// Run one bulk search pass.
    Search(SharedOptions),
    /// Inject previously saved artifacts into the torrent client.
    Inject(SharedOptions),
}

/// Options shared by the search-running commands; each overrides its
/// config-file counterpart.
#[derive(Args, Default)]
pub struct SharedOptions {
    /// Torznab endpoints (apikey in the query string).
    #[arg(long, num_args = 1..)]
    pub torznab: Vec<String>,

    #[arg(long, num_args = 1.., value_name = "DIR")]
    pub data_dirs: Vec<PathBuf>,

    #[arg(long, value_name = "DIR")]
    pub torrent_dir: Option<PathBuf>,

    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// safe, risky, or partial.
    #[arg(long)]
    pub match_mode: Option<String>,

    #[arg(long, value_name = "DIR")]
    pub link_dir: Option<PathBuf>,

    /// hardlink, symlink, or reflink.
    #[arg(long)]
    pub link_type: Option<String>,

    #[arg(long)]
    pub flat_linking: bool,

    #[arg(long)]
    pub max_data_depth: Option<usize>,

    #[arg(long)]
    pub include_non_videos: bool,

    #[arg(long)]
    pub include_single_episodes: bool,

    /// Relative total-size tolerance in [0, 1).
    #[arg(long)]
    pub fuzzy_size_threshold: Option<f64>,

    /// Skip searchees first seen more than this many minutes ago.
    #[arg(long, value_name = "MINUTES")]
    pub exclude_older: Option<u64>,

    /// Skip searchees searched within this many minutes.
    #[arg(long, value_name = "MINUTES")]
    pub exclude_recent_search: Option<u64>,

    /// save or inject.
    #[arg(long)]
    pub action: Option<String>,

    #[arg(long, value_name = "URL")]
    pub rtorrent_rpc_url: Option<String>,

    #[arg(long, value_name = "URL")]
    pub qbittorrent_rpc_url: Option<String>,

    #[arg(long, value_name = "URL")]
    pub transmission_rpc_url: Option<String>,

    #[arg(long, value_name = "URL")]
    pub deluge_rpc_url: Option<String>,

    #[arg(long)]
    pub duplicate_categories: bool,

    /// Sonarr instances for TV id lookups (apikey in the query string).
    #[arg(long, num_args = 1.., value_name = "URL")]
    pub sonarr: Vec<String>,

    /// Radarr instances for movie id lookups (apikey in the query string).
    #[arg(long, num_args = 1.., value_name = "URL")]
    pub radarr: Vec<String>,

    #[arg(long, value_name = "URL")]
    pub notification_webhook_url: Option<String>,

    /// Seconds to pause between searchees.
    #[arg(long)]
    pub delay: Option<u64>,

    /// Duration string, e.g. "30s".
    #[arg(long)]
    pub snatch_timeout: Option<String>,

    /// Duration string, e.g. "30s".
    #[arg(long)]
    pub search_timeout: Option<String>,

    /// Max searchees per pass (0 = unlimited).
    #[arg(long)]
    pub search_limit: Option<usize>,

    #[arg(long, num_args = 1..)]
    pub block_list: Vec<String>,

    #[arg(long)]
    pub port: Option<u16>,

    /// Disable the admin API.
    #[arg(long)]
    pub no_port: bool,

    #[arg(long)]
    pub host: Option<IpAddr>,

    /// Duration string, e.g. "1d".
    #[arg(long)]
    pub search_cadence: Option<String>,

    /// Duration string, e.g. "30m".
    #[arg(long)]
    pub rss_cadence: Option<String>,

    #[arg(long)]
    pub api_key: Option<String>,
}

impl SharedOptions {
    /// Layer these flags over the loaded config.
    pub fn apply(&self, config: &mut Config) -> anyhow::Result<()> {
        if !self.torznab.is_empty() {
            config.torznab.urls = self.torznab.clone();
        }
        if !self.data_dirs.is_empty() {
            config.search.data_dirs = self.data_dirs.clone();
        }
        if let Some(dir) = &self.torrent_dir {
            config.search.torrent_dir = Some(dir.clone());
        }
        if let Some(dir) = &self.output_dir {
            config.search.output_dir = dir.clone();
        }
        if let Some(mode) = &self.match_mode {
            config.matching.match_mode = parse_match_mode(mode)?;
        }
        if let Some(threshold) = self.fuzzy_size_threshold {
            config.matching.fuzzy_size_threshold = threshold;
        }
        if let Some(depth) = self.max_data_depth {
            config.search.max_data_depth = depth;
        }
        if self.include_non_videos {
            config.search.include_non_videos = true;
        }
        if self.include_single_episodes {
            config.search.include_single_episodes = true;
        }
        if let Some(minutes) = self.exclude_older {
            config.search.exclude_older_minutes = Some(minutes);
        }
        if let Some(minutes) = self.exclude_recent_search {
            config.search.exclude_recent_search_minutes = Some(minutes);
        }
        if let Some(action) = &self.action {
            config.search.action = parse_action(action)?;
        }
        if let Some(limit) = self.search_limit {
            config.search.search_limit = limit;
        }
        if let Some(secs) = self.delay {
            config.search.delay = DurationString::from_secs(secs);
        }
        if let Some(text) = &self.search_timeout {
            config.search.search_timeout =
                DurationString(parse_duration(text).map_err(anyhow::Error::msg)?);
        }
        if let Some(text) = &self.snatch_timeout {
            config.search.snatch_timeout =
                DurationString(parse_duration(text).map_err(anyhow::Error::msg)?);
        }
        if let Some(text) = &self.search_cadence {
            config.search.search_cadence =
                Some(DurationString(parse_duration(text).map_err(anyhow::Error::msg)?));
        }
        if let Some(text) = &self.rss_cadence {
            config.search.rss_cadence =
                Some(DurationString(parse_duration(text).map_err(anyhow::Error::msg)?));
        }
        if !self.block_list.is_empty() {
            config.search.block_list = self.block_list.clone();
        }

        if self.link_dir.is_some() || self.link_type.is_some() || self.flat_linking {
            let link_dir = self
                .link_dir
                .clone()
                .or_else(|| config.linking.as_ref().map(|l| l.link_dir.clone()))
                .ok_or_else(|| anyhow::anyhow!("--link-type requires --link-dir"))?;
            let existing = config.linking.take();
            config.linking = Some(LinkingConfig {
                link_dir,
                link_type: match &self.link_type {
                    Some(kind) => parse_link_type(kind)?,
                    None => existing.as_ref().map(|l| l.link_type).unwrap_or_default(),
                },
                flat_linking: self.flat_linking
                    || existing.map(|l| l.flat_linking).unwrap_or(false),
            });
        }

        if let Some(url) = &self.rtorrent_rpc_url {
            config.client.rtorrent_rpc_url = Some(url.clone());
        }
        if let Some(url) = &self.qbittorrent_rpc_url {
            config.client.qbittorrent_rpc_url = Some(url.clone());
        }
        if let Some(url) = &self.transmission_rpc_url {
            config.client.transmission_rpc_url = Some(url.clone());
        }
        if let Some(url) = &self.deluge_rpc_url {
            config.client.deluge_rpc_url = Some(url.clone());
        }
        if self.duplicate_categories {
            config.client.duplicate_categories = true;
        }
        if !self.sonarr.is_empty() {
            config.metadata.sonarr_urls = self.sonarr.clone();
        }
        if !self.radarr.is_empty() {
            config.metadata.radarr_urls = self.radarr.clone();
        }
        if let Some(url) = &self.notification_webhook_url {
            config.notification.webhook_url = Some(url.clone());
        }

        if let Some(port) = self.port {
            config.server.port = port;
        }
        if self.no_port {
            config.server.enabled = false;
        }
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(key) = &self.api_key {
            config.auth.api_key = Some(key.clone());
        }
        Ok(())
    }
}

fn parse_match_mode(text: &str) -> anyhow::Result<MatchMode> {
    match text {
        "safe" => Ok(MatchMode::Safe),
        "risky" => Ok(MatchMode::Risky),
        "partial" => Ok(MatchMode::Partial),
        other => anyhow::bail!("invalid match mode '{}' (safe|risky|partial)", other),
    }
}

fn parse_link_type(text: &str) -> anyhow::Result<LinkKind> {
    match text {
        "hardlink" => Ok(LinkKind::Hardlink),
        "symlink" => Ok(LinkKind::Symlink),
        "reflink" => Ok(LinkKind::Reflink),
        other => anyhow::bail!("invalid link type '{}' (hardlink|symlink|reflink)", other),
    }
}

fn parse_action(text: &str) -> anyhow::Result<Action> {
    match text {
        "save" => Ok(Action::Save),
        "inject" => Ok(Action::Inject),
        other => anyhow::bail!("invalid action '{}' (save|inject)", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_layer_over_config() {
        let mut config = Config::default();
        let opts = SharedOptions {
            torznab: vec!["https://x.example/api?apikey=k".to_string()],
            match_mode: Some("risky".to_string()),
            action: Some("inject".to_string()),
            delay: Some(3),
            search_cadence: Some("1d".to_string()),
            port: Some(9999),
            sonarr: vec!["http://sonarr.local:8989?apikey=s".to_string()],
            ..Default::default()
        };
        opts.apply(&mut config).unwrap();
        assert_eq!(config.torznab.urls.len(), 1);
        assert_eq!(
            config.metadata.sonarr_urls,
            vec!["http://sonarr.local:8989?apikey=s".to_string()]
        );
        assert!(config.metadata.radarr_urls.is_empty());
        assert_eq!(config.matching.match_mode, MatchMode::Risky);
        assert_eq!(config.search.action, Action::Inject);
        assert_eq!(config.search.delay.as_duration().as_secs(), 3);
        assert_eq!(
            config
                .search
                .search_cadence
                .unwrap()
                .as_duration()
                .as_secs(),
            86_400
        );
        assert_eq!(config.server.port, 9999);
    }

    #[test]
    fn test_invalid_enums_rejected() {
        let mut config = Config::default();
        let opts = SharedOptions {
            match_mode: Some("yolo".to_string()),
            ..Default::default()
        };
        assert!(opts.apply(&mut config).is_err());

        let opts = SharedOptions {
            action: Some("upload".to_string()),
            ..Default::default()
        };
        assert!(opts.apply(&mut config).is_err());
    }

    #[test]
    fn test_link_type_requires_dir() {
        let mut config = Config::default();
        let opts = SharedOptions {
            link_type: Some("symlink".to_string()),
            ..Default::default()
        };
        assert!(opts.apply(&mut config).is_err());

        let opts = SharedOptions {
            link_dir: Some(PathBuf::from("/links")),
            link_type: Some("symlink".to_string()),
            ..Default::default()
        };
        assert!(opts.apply(&mut config).is_ok());
        assert_eq!(config.linking.unwrap().link_type, LinkKind::Symlink);
    }

    #[test]
    fn test_no_port_disables_server() {
        let mut config = Config::default();
        let opts = SharedOptions {
            no_port: true,
            ..Default::default()
        };
        opts.apply(&mut config).unwrap();
        assert!(!config.server.enabled);
    }
}
