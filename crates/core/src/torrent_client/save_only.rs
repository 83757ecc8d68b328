//! Save-only stub client.
//!
//! Default adapter when no RPC URL is configured: injection is not
//! possible, but the rest of the pipeline (search, match, artifact
//! emission) behaves identically, so there is no nullable-client branch.

use async_trait::async_trait;

use super::types::{
    ClientError, ClientTorrent, DownloadDirResult, InjectResult, TorrentClientAdapter,
};
use crate::matcher::Verdict;
use crate::metafile::{InfoHash, Metafile};
use crate::searchee::Searchee;

pub struct SaveOnlyClient;

#[async_trait]
impl TorrentClientAdapter for SaveOnlyClient {
    fn name(&self) -> &'static str {
        "save-only"
    }

    async fn validate_config(&self) -> Result<(), ClientError> {
        Ok(())
    }

    async fn is_torrent_complete(&self, _info_hash: InfoHash) -> Result<bool, ClientError> {
        Ok(false)
    }

    async fn get_all_torrents(&self) -> Result<Vec<ClientTorrent>, ClientError> {
        Ok(Vec::new())
    }

    async fn get_download_dir(
        &self,
        _info_hash: InfoHash,
        _only_completed: bool,
    ) -> Result<DownloadDirResult, ClientError> {
        Ok(DownloadDirResult::Unknown)
    }

    async fn inject(
        &self,
        _meta: &Metafile,
        _searchee: &Searchee,
        _decision: Verdict,
        _download_dir: Option<&std::path::Path>,
    ) -> InjectResult {
        InjectResult::Failure("no torrent client configured".to_string())
    }

    async fn recheck_torrent(&self, _info_hash: InfoHash) -> Result<(), ClientError> {
        Err(ClientError::Unsupported("save-only"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stub_reports_nothing() {
        let client = SaveOnlyClient;
        assert_eq!(client.name(), "save-only");
        assert!(client.validate_config().await.is_ok());
        assert!(client.get_all_torrents().await.unwrap().is_empty());
        assert!(!client.is_torrent_complete(InfoHash([0u8; 20])).await.unwrap());
        assert_eq!(
            client
                .get_download_dir(InfoHash([0u8; 20]), true)
                .await
                .unwrap(),
            DownloadDirResult::Unknown
        );
    }
}
