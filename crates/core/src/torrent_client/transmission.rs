//! Transmission adapter (JSON-RPC).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::{TimeZone, Utc};
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

const SESSION_HEADER: &str = "X-Transmission-Session-Id";

/// Transmission client adapter.
pub struct TransmissionAdapter {
    client: Client,
    rpc_url: String,
    credentials: Option<(String, String)>,
    /// CSRF session id; refreshed on 409.
    session_id: Arc<RwLock<Option<String>>>,
}

impl TransmissionAdapter {
    pub fn new(rpc_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let (rpc_url, credentials) = split_userinfo(rpc_url);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::ConnectionFailed(e.to_string()))?;
        Ok(Self {
            client,
            rpc_url,
            credentials,
            session_id: Arc::new(RwLock::new(None)),
        })
    }

    /// Issue one RPC call, handling the 409 session-id handshake.
    async fn call(&self, method: &str, arguments: Value) -> Result<Value, ClientError> {
        let payload = json!({ "method": method, "arguments": arguments });

        for _ in 0..2 {
            let mut request = self.client.post(&self.rpc_url).json(&payload);
            if let Some((user, pass)) = &self.credentials {
                request = request.basic_auth(user, Some(pass));
            }
            if let Some(sid) = self.session_id.read().await.clone() {
                request = request.header(SESSION_HEADER, sid);
            }

            let response = request.send().await.map_err(|e| {
                if e.is_timeout() {
                    ClientError::Timeout
                } else {
                    ClientError::ConnectionFailed(e.to_string())
                }
            })?;

            match response.status().as_u16() {
                409 => {
                    // Pick up the fresh session id and retry once.
                    let sid = response
                        .headers()
                        .get(SESSION_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .map(|s| s.to_string())
                        .ok_or_else(|| {
                            ClientError::ApiError("409 without session id".to_string())
                        })?;
                    debug!("Transmission session id refreshed");
                    *self.session_id.write().await = Some(sid);
                    continue;
                }
                401 => {
                    return Err(ClientError::AuthenticationFailed(
                        "invalid credentials".to_string(),
                    ))
                }
                code if !(200..300).contains(&code) => {
                    return Err(ClientError::ApiError(format!("HTTP {}", code)))
                }
                _ => {}
            }

            let body: RpcResponse = response
                .json()
                .await
                .map_err(|e| ClientError::ApiError(e.to_string()))?;
            if body.result != "success" {
                return Err(ClientError::ApiError(body.result));
            }
            return Ok(body.arguments.unwrap_or(Value::Null));
        }
        Err(ClientError::ApiError("session handshake failed".to_string()))
    }

    async fn torrent_fields(&self, info_hash: Option<InfoHash>) -> Result<Vec<TrTorrent>, ClientError> {
        let mut arguments = json!({
            "fields": ["hashString", "name", "downloadDir", "percentDone", "labels", "addedDate", "trackers"]
        });
        if let Some(hash) = info_hash {
            arguments["ids"] = json!([hash.to_string()]);
        }
        let result = self.call("torrent-get", arguments).await?;
        let torrents: Vec<TrTorrent> = serde_json::from_value(
            result.get("torrents").cloned().unwrap_or(Value::Null),
        )
        .map_err(|e| ClientError::ApiError(e.to_string()))?;
        Ok(torrents)
    }
}

#[async_trait]
impl TorrentClientAdapter for TransmissionAdapter {
    fn name(&self) -> &'static str {
        "transmission"
    }

    async fn validate_config(&self) -> Result<(), ClientError> {
        self.call("session-get", json!({})).await?;
        Ok(())
    }

    async fn is_torrent_complete(&self, info_hash: InfoHash) -> Result<bool, ClientError> {
        Ok(self
            .torrent_fields(Some(info_hash))
            .await?
            .first()
            .map(|t| t.percent_done >= 1.0)
            .unwrap_or(false))
    }

    async fn get_all_torrents(&self) -> Result<Vec<ClientTorrent>, ClientError> {
        Ok(self
            .torrent_fields(None)
            .await?
            .into_iter()
            .filter_map(|t| {
                let info_hash: InfoHash = t.hash_string.parse().ok()?;
                Some(ClientTorrent {
                    info_hash,
                    name: t.name,
                    category: t.labels.first().cloned(),
                    tags: t.labels,
                    trackers: vec![t.trackers.into_iter().map(|tr| tr.announce).collect()],
                    save_path: Some(PathBuf::from(t.download_dir)),
                    complete: t.percent_done >= 1.0,
                    files: Vec::new(),
                    added_at: t
                        .added_date
                        .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
                })
            })
            .collect())
    }

    async fn get_download_dir(
        &self,
        info_hash: InfoHash,
        only_completed: bool,
    ) -> Result<DownloadDirResult, ClientError> {
        match self.torrent_fields(Some(info_hash)).await?.into_iter().next() {
            None => Ok(DownloadDirResult::NotFound),
            Some(t) if only_completed && t.percent_done < 1.0 => {
                Ok(DownloadDirResult::TorrentNotComplete)
            }
            Some(t) => Ok(DownloadDirResult::Found(PathBuf::from(t.download_dir))),
        }
    }

    async fn inject(
        &self,
        meta: &Metafile,
        _searchee: &Searchee,
        _decision: Verdict,
        download_dir: Option<&std::path::Path>,
    ) -> InjectResult {
        let mut arguments = json!({
            "metainfo": general_purpose::STANDARD.encode(meta.serialize()),
            "paused": false,
            "labels": ["cross-seed"],
        });
        if let Some(dir) = download_dir {
            arguments["download-dir"] = json!(dir.display().to_string());
        }

        match self.call("torrent-add", arguments).await {
            Ok(result) => {
                if result.get("torrent-duplicate").is_some() {
                    InjectResult::AlreadyExists
                } else {
                    InjectResult::Success
                }
            }
            Err(e) => InjectResult::Failure(e.to_string()),
        }
    }

    async fn recheck_torrent(&self, info_hash: InfoHash) -> Result<(), ClientError> {
        self.call(
            "torrent-verify",
            json!({ "ids": [info_hash.to_string()] }),
        )
        .await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: String,
    #[serde(default)]
    arguments: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct TrTorrent {
    #[serde(rename = "hashString")]
    hash_string: String,
    name: String,
    #[serde(rename = "downloadDir")]
    download_dir: String,
    #[serde(rename = "percentDone")]
    percent_done: f64,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(rename = "addedDate", default)]
    added_date: Option<i64>,
    #[serde(default)]
    trackers: Vec<TrTracker>,
}

#[derive(Debug, Deserialize)]
struct TrTracker {
    announce: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_torrent_get_deserializes() {
        let body = r#"{
            "result": "success",
            "arguments": {
                "torrents": [{
                    "hashString": "0123456789abcdef0123456789abcdef01234567",
                    "name": "X",
                    "downloadDir": "/downloads",
                    "percentDone": 1.0,
                    "labels": ["tv"],
                    "addedDate": 1700000000,
                    "trackers": [{"announce": "https://t.example/ann"}]
                }]
            }
        }"#;
        let parsed: RpcResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.result, "success");
        let torrents: Vec<TrTorrent> =
            serde_json::from_value(parsed.arguments.unwrap()["torrents"].clone()).unwrap();
        assert_eq!(torrents[0].name, "X");
        assert_eq!(torrents[0].trackers[0].announce, "https://t.example/ann");
    }
}
