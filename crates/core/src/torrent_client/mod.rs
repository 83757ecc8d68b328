//! Torrent client adapters.
//!
//! Four concrete clients behind one capability trait, plus a save-only
//! stub. Selection is static at startup: the first configured RPC URL
//! wins, in order rtorrent, qbittorrent, transmission, deluge.

mod deluge;
mod qbittorrent;
mod rtorrent;
mod save_only;
mod transmission;
mod types;
mod url;

pub use deluge::DelugeAdapter;
pub use qbittorrent::QBittorrentAdapter;
pub use rtorrent::RTorrentAdapter;
pub use save_only::SaveOnlyClient;
pub use transmission::TransmissionAdapter;
pub use types::*;

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::ClientConfig;

/// Build the process-lifetime client adapter from config.
pub fn create_client_adapter(
    config: &ClientConfig,
    timeout: Duration,
) -> Result<Arc<dyn TorrentClientAdapter>, ClientError> {
    let adapter: Arc<dyn TorrentClientAdapter> = if let Some(url) = &config.rtorrent_rpc_url {
        Arc::new(RTorrentAdapter::new(url, timeout)?)
    } else if let Some(url) = &config.qbittorrent_rpc_url {
        Arc::new(QBittorrentAdapter::new(
            url,
            timeout,
            config.duplicate_categories,
        )?)
    } else if let Some(url) = &config.transmission_rpc_url {
        Arc::new(TransmissionAdapter::new(url, timeout)?)
    } else if let Some(url) = &config.deluge_rpc_url {
        Arc::new(DelugeAdapter::new(url, timeout)?)
    } else {
        Arc::new(SaveOnlyClient)
    };
    info!(client = adapter.name(), "Torrent client selected");
    Ok(adapter)
}

#[cfg(test)]
mod selection_tests {
    use super::*;

    #[test]
    fn test_default_is_save_only() {
        let adapter =
            create_client_adapter(&ClientConfig::default(), Duration::from_secs(30)).unwrap();
        assert_eq!(adapter.name(), "save-only");
    }

    #[test]
    fn test_first_configured_wins() {
        let config = ClientConfig {
            qbittorrent_rpc_url: Some("http://localhost:8080".to_string()),
            transmission_rpc_url: Some("http://localhost:9091/transmission/rpc".to_string()),
            ..Default::default()
        };
        let adapter = create_client_adapter(&config, Duration::from_secs(30)).unwrap();
        assert_eq!(adapter.name(), "qbittorrent");

        let config = ClientConfig {
            rtorrent_rpc_url: Some("http://localhost:8000/RPC2".to_string()),
            qbittorrent_rpc_url: Some("http://localhost:8080".to_string()),
            ..Default::default()
        };
        let adapter = create_client_adapter(&config, Duration::from_secs(30)).unwrap();
        assert_eq!(adapter.name(), "rtorrent");
    }

    #[test]
    fn test_transmission_and_deluge_selectable() {
        let config = ClientConfig {
            transmission_rpc_url: Some("http://localhost:9091/transmission/rpc".to_string()),
            ..Default::default()
        };
        assert_eq!(
            create_client_adapter(&config, Duration::from_secs(30))
                .unwrap()
                .name(),
            "transmission"
        );

        let config = ClientConfig {
            deluge_rpc_url: Some("http://:pass@localhost:8112".to_string()),
            ..Default::default()
        };
        assert_eq!(
            create_client_adapter(&config, Duration::from_secs(30))
                .unwrap()
                .name(),
            "deluge"
        );
    }
}
