//! Mock torrent client adapter for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::matcher::Verdict;
use crate::metafile::{InfoHash, Metafile};
use crate::searchee::Searchee;
use crate::torrent_client::{
    ClientError, ClientTorrent, DownloadDirResult, InjectResult, TorrentClientAdapter,
};

/// A recorded injection for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedInject {
    pub info_hash: InfoHash,
    pub name: String,
    pub decision: Verdict,
    pub download_dir: Option<PathBuf>,
}

/// Mock implementation of the `TorrentClientAdapter` trait.
pub struct MockClientAdapter {
    torrents: Arc<RwLock<Vec<ClientTorrent>>>,
    injects: Arc<RwLock<Vec<RecordedInject>>>,
    rechecks: Arc<RwLock<Vec<InfoHash>>>,
    inject_result: Arc<RwLock<InjectResult>>,
}

impl Default for MockClientAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClientAdapter {
    pub fn new() -> Self {
        Self {
            torrents: Arc::new(RwLock::new(Vec::new())),
            injects: Arc::new(RwLock::new(Vec::new())),
            rechecks: Arc::new(RwLock::new(Vec::new())),
            inject_result: Arc::new(RwLock::new(InjectResult::Success)),
        }
    }

    pub async fn set_torrents(&self, torrents: Vec<ClientTorrent>) {
        *self.torrents.write().await = torrents;
    }

    pub async fn set_inject_result(&self, result: InjectResult) {
        *self.inject_result.write().await = result;
    }

    pub async fn recorded_injects(&self) -> Vec<RecordedInject> {
        self.injects.read().await.clone()
    }

    pub async fn recorded_rechecks(&self) -> Vec<InfoHash> {
        self.rechecks.read().await.clone()
    }
}

#[async_trait]
impl TorrentClientAdapter for MockClientAdapter {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn validate_config(&self) -> Result<(), ClientError> {
        Ok(())
    }

    async fn is_torrent_complete(&self, info_hash: InfoHash) -> Result<bool, ClientError> {
        Ok(self
            .torrents
            .read()
            .await
            .iter()
            .any(|t| t.info_hash == info_hash && t.complete))
    }

    async fn get_all_torrents(&self) -> Result<Vec<ClientTorrent>, ClientError> {
        Ok(self.torrents.read().await.clone())
    }

    async fn get_download_dir(
        &self,
        info_hash: InfoHash,
        only_completed: bool,
    ) -> Result<DownloadDirResult, ClientError> {
        let torrents = self.torrents.read().await;
        match torrents.iter().find(|t| t.info_hash == info_hash) {
            None => Ok(DownloadDirResult::NotFound),
            Some(t) if only_completed && !t.complete => Ok(DownloadDirResult::TorrentNotComplete),
            Some(t) => Ok(t
                .save_path
                .clone()
                .map(DownloadDirResult::Found)
                .unwrap_or(DownloadDirResult::Unknown)),
        }
    }

    async fn inject(
        &self,
        meta: &Metafile,
        _searchee: &Searchee,
        decision: Verdict,
        download_dir: Option<&Path>,
    ) -> InjectResult {
        self.injects.write().await.push(RecordedInject {
            info_hash: meta.info_hash,
            name: meta.name.clone(),
            decision,
            download_dir: download_dir.map(|p| p.to_path_buf()),
        });
        self.inject_result.read().await.clone()
    }

    async fn recheck_torrent(&self, info_hash: InfoHash) -> Result<(), ClientError> {
        self.rechecks.write().await.push(info_hash);
        Ok(())
    }
}
