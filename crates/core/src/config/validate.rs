use super::{types::Config, ConfigError};

/// Validate configuration
///
/// Checks the invariants that serde defaults cannot enforce: a usable
/// admin port, a sane fuzzy threshold, well-formed indexer URLs, and
/// that at least one searchee source is configured for search modes.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.enabled && config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    let fuzzy = config.matching.fuzzy_size_threshold;
    if !(0.0..1.0).contains(&fuzzy) {
        return Err(ConfigError::ValidationError(format!(
            "matching.fuzzy_size_threshold must be in [0, 1), got {}",
            fuzzy
        )));
    }

    for url in &config.torznab.urls {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::ValidationError(format!(
                "torznab url must be http(s): {}",
                url
            )));
        }
    }

    for url in config
        .metadata
        .sonarr_urls
        .iter()
        .chain(&config.metadata.radarr_urls)
    {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::ValidationError(format!(
                "sonarr/radarr url must be http(s): {}",
                url
            )));
        }
    }

    if config.search.max_data_depth == 0 {
        return Err(ConfigError::ValidationError(
            "search.max_data_depth must be at least 1".to_string(),
        ));
    }

    if let Some(linking) = &config.linking {
        if linking.link_dir.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "linking.link_dir cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validation specific to search-running modes (`search`, `rss`, `daemon`):
/// there must be something to search and somewhere to put results.
pub fn validate_search_config(config: &Config) -> Result<(), ConfigError> {
    validate_config(config)?;

    if config.torznab.urls.is_empty() {
        return Err(ConfigError::ValidationError(
            "at least one torznab url is required".to_string(),
        ));
    }
    if config.search.torrent_dir.is_none() && config.search.data_dirs.is_empty() {
        return Err(ConfigError::ValidationError(
            "either search.torrent_dir or search.data_dirs must be set".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, ServerConfig, TorznabConfig};

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let config = Config {
            server: ServerConfig {
                host: "0.0.0.0".parse().unwrap(),
                port: 0,
                enabled: true,
            },
            ..Default::default()
        };
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_port_zero_ok_when_disabled() {
        let config = Config {
            server: ServerConfig {
                host: "0.0.0.0".parse().unwrap(),
                port: 0,
                enabled: false,
            },
            ..Default::default()
        };
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_fuzzy_threshold_range() {
        let mut config = Config::default();
        config.matching.fuzzy_size_threshold = 1.5;
        assert!(validate_config(&config).is_err());
        config.matching.fuzzy_size_threshold = -0.1;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_torznab_url_scheme() {
        let config = Config {
            torznab: TorznabConfig {
                urls: vec!["ftp://bad.example".to_string()],
            },
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_metadata_url_scheme() {
        let mut config = Config::default();
        config.metadata.sonarr_urls = vec!["sonarr.local:8989".to_string()];
        assert!(validate_config(&config).is_err());

        config.metadata.sonarr_urls = vec!["http://sonarr.local:8989?apikey=k".to_string()];
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_search_needs_sources() {
        let config = Config {
            torznab: TorznabConfig {
                urls: vec!["https://indexer.example/api?apikey=k".to_string()],
            },
            ..Default::default()
        };
        // No torrent_dir or data_dirs configured.
        assert!(validate_search_config(&config).is_err());

        let mut with_dir = config.clone();
        with_dir.search.torrent_dir = Some("torrents".into());
        assert!(validate_search_config(&with_dir).is_ok());
    }

    #[test]
    fn test_validate_search_needs_indexers() {
        let mut config = Config::default();
        config.search.torrent_dir = Some("torrents".into());
        assert!(validate_search_config(&config).is_err());
    }
}
