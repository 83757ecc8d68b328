//! Deluge adapter (Web UI JSON API).

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::debug;

use super::types::{
    ClientError, ClientTorrent, DownloadDirResult, InjectResult, TorrentClientAdapter,
};
use super::url::split_userinfo;
use crate::matcher::Verdict;
use crate::metafile::{InfoHash, Metafile};
use crate::searchee::Searchee;

/// Deluge web client adapter. The password rides in the RPC URL's
/// userinfo (`http://:password@host:8112`).
pub struct DelugeAdapter {
    client: Client,
    base_url: String,
    password: String,
    request_id: AtomicU64,
    authenticated: Arc<RwLock<bool>>,
}

impl DelugeAdapter {
    pub fn new(rpc_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let (base_url, credentials) = split_userinfo(rpc_url);
        let password = credentials.map(|(user, pass)| if pass.is_empty() { user } else { pass });
        let client = Client::builder()
            .timeout(timeout)
            .cookie_store(true)
            .build()
            .map_err(|e| ClientError::ConnectionFailed(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            password: password.unwrap_or_default(),
            request_id: AtomicU64::new(1),
            authenticated: Arc::new(RwLock::new(false)),
        })
    }

    async fn call_raw(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let url = format!("{}/json", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "method": method, "params": params, "id": id }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClientError::Timeout
                } else {
                    ClientError::ConnectionFailed(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(ClientError::ApiError(format!("HTTP {}", response.status())));
        }
        let body: DelugeResponse = response
            .json()
            .await
            .map_err(|e| ClientError::ApiError(e.to_string()))?;
        if let Some(error) = body.error {
            return Err(ClientError::ApiError(error.message));
        }
        Ok(body.result.unwrap_or(Value::Null))
    }

    async fn login(&self) -> Result<(), ClientError> {
        let ok = self
            .call_raw("auth.login", json!([self.password]))
            .await?
            .as_bool()
            .unwrap_or(false);
        if !ok {
            return Err(ClientError::AuthenticationFailed(
                "deluge web rejected the password".to_string(),
            ));
        }
        debug!("Deluge login successful");
        *self.authenticated.write().await = true;
        Ok(())
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        if !*self.authenticated.read().await {
            self.login().await?;
        }
        self.call_raw(method, params).await
    }

    async fn torrent_status(
        &self,
        info_hash: InfoHash,
    ) -> Result<Option<DelugeTorrent>, ClientError> {
        let result = self
            .call(
                "core.get_torrent_status",
                json!([info_hash.to_string(), ["name", "progress", "save_path", "label"]]),
            )
            .await?;
        if result.as_object().map(|o| o.is_empty()).unwrap_or(true) {
            return Ok(None);
        }
        serde_json::from_value(result)
            .map(Some)
            .map_err(|e| ClientError::ApiError(e.to_string()))
    }
}

#[async_trait]
impl TorrentClientAdapter for DelugeAdapter {
    fn name(&self) -> &'static str {
        "deluge"
    }

    async fn validate_config(&self) -> Result<(), ClientError> {
        self.login().await?;
        let connected = self
            .call("web.connected", json!([]))
            .await?
            .as_bool()
            .unwrap_or(false);
        if !connected {
            return Err(ClientError::ConnectionFailed(
                "deluge web is not connected to a daemon".to_string(),
            ));
        }
        Ok(())
    }

    async fn is_torrent_complete(&self, info_hash: InfoHash) -> Result<bool, ClientError> {
        Ok(self
            .torrent_status(info_hash)
            .await?
            .map(|t| t.progress >= 100.0)
            .unwrap_or(false))
    }

    async fn get_all_torrents(&self) -> Result<Vec<ClientTorrent>, ClientError> {
        let result = self
            .call(
                "core.get_torrents_status",
                json!([{}, ["name", "progress", "save_path", "label", "tracker_host"]]),
            )
            .await?;
        let map: std::collections::HashMap<String, DelugeTorrent> =
            serde_json::from_value(result).map_err(|e| ClientError::ApiError(e.to_string()))?;
        Ok(map
            .into_iter()
            .filter_map(|(hash, t)| {
                let info_hash: InfoHash = hash.parse().ok()?;
                Some(ClientTorrent {
                    info_hash,
                    name: t.name,
                    category: t.label.clone(),
                    tags: t.label.into_iter().collect(),
                    trackers: t
                        .tracker_host
                        .map(|h| vec![vec![h]])
                        .unwrap_or_default(),
                    save_path: Some(PathBuf::from(t.save_path)),
                    complete: t.progress >= 100.0,
                    files: Vec::new(),
                    added_at: None,
                })
            })
            .collect())
    }

    async fn get_download_dir(
        &self,
        info_hash: InfoHash,
        only_completed: bool,
    ) -> Result<DownloadDirResult, ClientError> {
        match self.torrent_status(info_hash).await? {
            None => Ok(DownloadDirResult::NotFound),
            Some(t) if only_completed && t.progress < 100.0 => {
                Ok(DownloadDirResult::TorrentNotComplete)
            }
            Some(t) => Ok(DownloadDirResult::Found(PathBuf::from(t.save_path))),
        }
    }

    async fn inject(
        &self,
        meta: &Metafile,
        _searchee: &Searchee,
        _decision: Verdict,
        download_dir: Option<&std::path::Path>,
    ) -> InjectResult {
        let mut options = json!({ "add_paused": false, "seed_mode": true });
        if let Some(dir) = download_dir {
            options["download_location"] = json!(dir.display().to_string());
        }
        let params = json!([
            format!("{}.torrent", meta.name),
            general_purpose::STANDARD.encode(meta.serialize()),
            options
        ]);
        match self.call("core.add_torrent_file", params).await {
            Ok(_) => InjectResult::Success,
            Err(ClientError::ApiError(msg)) if msg.contains("already") => {
                InjectResult::AlreadyExists
            }
            Err(e) => InjectResult::Failure(e.to_string()),
        }
    }

    async fn recheck_torrent(&self, info_hash: InfoHash) -> Result<(), ClientError> {
        self.call("core.force_recheck", json!([[info_hash.to_string()]]))
            .await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct DelugeResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<DelugeError>,
}

#[derive(Debug, Deserialize)]
struct DelugeError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct DelugeTorrent {
    name: String,
    progress: f64,
    save_path: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    tracker_host: Option<String>,
}
