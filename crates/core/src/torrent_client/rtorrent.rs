//! rTorrent adapter (XML-RPC over HTTP).

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use tracing::debug;

use super::types::{
    ClientError, ClientTorrent, DownloadDirResult, InjectResult, TorrentClientAdapter,
};
use crate::matcher::Verdict;
use crate::metafile::{InfoHash, Metafile};
use crate::searchee::Searchee;

/// rTorrent client adapter.
pub struct RTorrentAdapter {
    client: Client,
    rpc_url: String,
}

/// Minimal XML-RPC value model: what rTorrent's responses actually use.
#[derive(Debug, Clone, PartialEq)]
enum XmlRpcValue {
    String(String),
    Int(i64),
    Array(Vec<XmlRpcValue>),
}

impl XmlRpcValue {
    fn as_str(&self) -> Option<&str> {
        match self {
            XmlRpcValue::String(s) => Some(s),
            _ => None,
        }
    }

    fn as_int(&self) -> Option<i64> {
        match self {
            XmlRpcValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    fn as_array(&self) -> Option<&[XmlRpcValue]> {
        match self {
            XmlRpcValue::Array(items) => Some(items),
            _ => None,
        }
    }
}

/// Request parameter.
enum Param<'a> {
    Str(&'a str),
    Base64(&'a [u8]),
}

impl RTorrentAdapter {
    pub fn new(rpc_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::ConnectionFailed(e.to_string()))?;
        Ok(Self {
            client,
            rpc_url: rpc_url.to_string(),
        })
    }

    async fn call(&self, method: &str, params: &[Param<'_>]) -> Result<XmlRpcValue, ClientError> {
        let body = build_call(method, params);
        debug!(method, "rTorrent XML-RPC call");
        let response = self
            .client
            .post(&self.rpc_url)
            .header("Content-Type", "text/xml")
            .body(body)
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
        let text = response
            .text()
            .await
            .map_err(|e| ClientError::ApiError(e.to_string()))?;
        parse_response(&text)
    }

    async fn list_hashes(&self) -> Result<Vec<XmlRpcValue>, ClientError> {
        let result = self
            .call(
                "d.multicall2",
                &[
                    Param::Str(""),
                    Param::Str("main"),
                    Param::Str("d.hash="),
                    Param::Str("d.name="),
                    Param::Str("d.directory="),
                    Param::Str("d.complete="),
                    Param::Str("d.custom1="),
                ],
            )
            .await?;
        Ok(result.as_array().unwrap_or(&[]).to_vec())
    }
}

#[async_trait]
impl TorrentClientAdapter for RTorrentAdapter {
    fn name(&self) -> &'static str {
        "rtorrent"
    }

    async fn validate_config(&self) -> Result<(), ClientError> {
        self.call("system.api_version", &[]).await?;
        Ok(())
    }

    async fn is_torrent_complete(&self, info_hash: InfoHash) -> Result<bool, ClientError> {
        let hash = info_hash.to_string().to_uppercase();
        match self.call("d.complete", &[Param::Str(&hash)]).await {
            Ok(value) => Ok(value.as_int() == Some(1)),
            // Unknown hash faults; treat as not present.
            Err(ClientError::ApiError(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn get_all_torrents(&self) -> Result<Vec<ClientTorrent>, ClientError> {
        Ok(self
            .list_hashes()
            .await?
            .iter()
            .filter_map(|row| {
                let fields = row.as_array()?;
                let info_hash: InfoHash = fields.first()?.as_str()?.to_lowercase().parse().ok()?;
                let label = fields.get(4).and_then(|v| v.as_str()).unwrap_or("");
                Some(ClientTorrent {
                    info_hash,
                    name: fields.get(1)?.as_str()?.to_string(),
                    category: (!label.is_empty()).then(|| label.to_string()),
                    tags: Vec::new(),
                    trackers: Vec::new(),
                    save_path: fields
                        .get(2)
                        .and_then(|v| v.as_str())
                        .map(PathBuf::from),
                    complete: fields.get(3).and_then(|v| v.as_int()) == Some(1),
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
        let hash = info_hash.to_string().to_uppercase();
        let complete = match self.call("d.complete", &[Param::Str(&hash)]).await {
            Ok(v) => v.as_int() == Some(1),
            Err(ClientError::ApiError(_)) => return Ok(DownloadDirResult::NotFound),
            Err(e) => return Err(e),
        };
        if only_completed && !complete {
            return Ok(DownloadDirResult::TorrentNotComplete);
        }
        let dir = self.call("d.directory", &[Param::Str(&hash)]).await?;
        match dir.as_str() {
            Some(path) if !path.is_empty() => Ok(DownloadDirResult::Found(PathBuf::from(path))),
            _ => Ok(DownloadDirResult::Unknown),
        }
    }

    async fn inject(
        &self,
        meta: &Metafile,
        _searchee: &Searchee,
        _decision: Verdict,
        download_dir: Option<&std::path::Path>,
    ) -> InjectResult {
        match self.is_torrent_complete(meta.info_hash).await {
            Ok(_) => {
                // d.complete succeeding means the hash is already loaded.
                if let Ok(all) = self.get_all_torrents().await {
                    if all.iter().any(|t| t.info_hash == meta.info_hash) {
                        return InjectResult::AlreadyExists;
                    }
                }
            }
            Err(e) => return InjectResult::Failure(e.to_string()),
        }

        let torrent = meta.serialize();
        let mut params = vec![Param::Str(""), Param::Base64(&torrent)];
        let dir_command;
        let label_command = "d.custom1.set=cross-seed".to_string();
        if let Some(dir) = download_dir {
            dir_command = format!("d.directory.set=\"{}\"", dir.display());
            params.push(Param::Str(&dir_command));
        }
        params.push(Param::Str(&label_command));

        match self.call("load.raw_start", &params).await {
            Ok(_) => InjectResult::Success,
            Err(e) => InjectResult::Failure(e.to_string()),
        }
    }

    async fn recheck_torrent(&self, info_hash: InfoHash) -> Result<(), ClientError> {
        let hash = info_hash.to_string().to_uppercase();
        self.call("d.check_hash", &[Param::Str(&hash)]).await?;
        Ok(())
    }
}

fn build_call(method: &str, params: &[Param<'_>]) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?><methodCall><methodName>");
    out.push_str(method);
    out.push_str("</methodName><params>");
    for param in params {
        out.push_str("<param><value>");
        match param {
            Param::Str(s) => {
                out.push_str("<string>");
                out.push_str(&escape_xml(s));
                out.push_str("</string>");
            }
            Param::Base64(bytes) => {
                out.push_str("<base64>");
                out.push_str(&general_purpose::STANDARD.encode(bytes));
                out.push_str("</base64>");
            }
        }
        out.push_str("</value></param>");
    }
    out.push_str("</params></methodCall>");
    out
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Parse a methodResponse into a value, surfacing faults as API errors.
fn parse_response(xml: &str) -> Result<XmlRpcValue, ClientError> {
    let mut reader = Reader::from_reader(xml.as_bytes());
    let mut buf = Vec::new();

    let mut stack: Vec<Vec<XmlRpcValue>> = Vec::new();
    let mut result: Option<XmlRpcValue> = None;
    let mut text = String::new();
    let mut in_scalar = false;
    let mut is_fault = false;

    let mut push = |value: XmlRpcValue,
                    stack: &mut Vec<Vec<XmlRpcValue>>,
                    result: &mut Option<XmlRpcValue>| {
        if let Some(top) = stack.last_mut() {
            top.push(value);
        } else if result.is_none() {
            *result = Some(value);
        }
    };

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"fault" => is_fault = true,
                b"data" => stack.push(Vec::new()),
                b"string" | b"i4" | b"i8" | b"int" | b"base64" | b"name" => {
                    in_scalar = true;
                    text.clear();
                }
                _ => {}
            },
            Ok(Event::Text(t)) => {
                if in_scalar {
                    text.push_str(
                        &t.unescape()
                            .map_err(|e| ClientError::ApiError(e.to_string()))?,
                    );
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"data" => {
                    let items = stack.pop().unwrap_or_default();
                    push(XmlRpcValue::Array(items), &mut stack, &mut result);
                }
                b"string" | b"base64" | b"name" => {
                    push(
                        XmlRpcValue::String(text.clone()),
                        &mut stack,
                        &mut result,
                    );
                    in_scalar = false;
                }
                b"i4" | b"i8" | b"int" => {
                    let n = text.trim().parse().unwrap_or(0);
                    push(XmlRpcValue::Int(n), &mut stack, &mut result);
                    in_scalar = false;
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(ClientError::ApiError(e.to_string())),
        }
        buf.clear();
    }

    if is_fault {
        // Fault payload is a struct; the collected strings include the
        // fault message.
        let message = result
            .as_ref()
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_else(|| "XML-RPC fault".to_string());
        return Err(ClientError::ApiError(message));
    }

    result.ok_or_else(|| ClientError::ApiError("empty XML-RPC response".to_string()))
}
