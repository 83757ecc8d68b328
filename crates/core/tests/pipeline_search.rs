//! End-to-end pipeline tests over mocked search and client seams.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use resow_core::config::{Action, Config, TorznabConfig};
use resow_core::metafile::{encode, Value};
use resow_core::testing::{multi_file_torrent, MockClientAdapter, MockSearchProvider};
use resow_core::{
    Candidate, DurationString, InfoHash, IndexerStatus, MatchMode, Metafile, Notifier, Pipeline,
    SearchError, Store, Verdict,
};

const INDEXER_URL: &str = "https://indexer.example/api?apikey=test";

/// Single-file torrent with a controllable piece length, so two torrents
/// can share a file list but differ in infohash (a cross-seed).
fn torrent_with_piece_length(name: &str, length: u64, announce: &str, piece_length: i64) -> Vec<u8> {
    let info = Value::Dict(vec![
        (b"length".to_vec(), Value::Int(length as i64)),
        (b"name".to_vec(), Value::Bytes(name.as_bytes().to_vec())),
        (b"piece length".to_vec(), Value::Int(piece_length)),
        (b"pieces".to_vec(), Value::Bytes(vec![0u8; 20])),
    ]);
    let root = Value::Dict(vec![
        (
            b"announce".to_vec(),
            Value::Bytes(announce.as_bytes().to_vec()),
        ),
        (b"info".to_vec(), info),
    ]);
    encode(&root)
}

struct Harness {
    _tmp: tempfile::TempDir,
    store: Arc<Store>,
    provider: Arc<MockSearchProvider>,
    client: Arc<MockClientAdapter>,
    pipeline: Pipeline,
    output_dir: std::path::PathBuf,
    torrent_dir: std::path::PathBuf,
}

fn harness(action: Action, match_mode: MatchMode) -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let torrent_dir = tmp.path().join("torrents");
    let output_dir = tmp.path().join("output");
    fs::create_dir(&torrent_dir).unwrap();

    let mut config = Config {
        torznab: TorznabConfig {
            urls: vec![INDEXER_URL.to_string()],
        },
        ..Default::default()
    };
    config.search.torrent_dir = Some(torrent_dir.clone());
    config.search.output_dir = output_dir.clone();
    config.search.delay = DurationString::from_secs(0);
    config.search.action = action;
    config.matching.match_mode = match_mode;

    let store = Arc::new(Store::in_memory().unwrap());
    let provider = Arc::new(MockSearchProvider::new());
    let client = Arc::new(MockClientAdapter::new());
    let pipeline = Pipeline::new(
        config,
        store.clone(),
        provider.clone(),
        client.clone(),
        Arc::new(Notifier::new(None)),
    );

    Harness {
        _tmp: tmp,
        store,
        provider,
        client,
        pipeline,
        output_dir,
        torrent_dir,
    }
}

fn write_torrent(dir: &Path, file_name: &str, bytes: &[u8]) {
    fs::write(dir.join(file_name), bytes).unwrap();
}

fn candidate(title: &str, guid: &str, link: &str, size: u64) -> Candidate {
    Candidate {
        title: title.to_string(),
        guid: guid.to_string(),
        link: Some(link.to_string()),
        size: Some(size),
        pub_date: None,
        info_hash: None,
        categories: Vec::new(),
        seeders: Some(5),
    }
}

#[tokio::test]
async fn identical_torrent_on_other_tracker_matches() {
    let h = harness(Action::Save, MatchMode::Safe);

    // Local: foo.mkv with 256 KiB pieces. Candidate: same file, other
    // tracker, 512 KiB pieces -> distinct infohash, identical payload.
    let local = torrent_with_piece_length("foo.mkv", 1_000_000_000, "http://home.example/ann", 262_144);
    let remote =
        torrent_with_piece_length("foo.mkv", 1_000_000_000, "http://other.example/ann", 524_288);
    assert_ne!(
        Metafile::parse(&local).unwrap().info_hash,
        Metafile::parse(&remote).unwrap().info_hash
    );
    write_torrent(&h.torrent_dir, "foo.mkv.torrent", &local);

    h.provider
        .set_results(vec![candidate(
            "foo.mkv",
            "guid-1",
            "https://indexer.example/dl/1",
            1_000_000_000,
        )])
        .await;
    h.provider
        .set_snatch("https://indexer.example/dl/1", remote.clone())
        .await;

    let summary = h.pipeline.bulk_search().await.unwrap();
    assert_eq!(summary.searched, 1);
    assert_eq!(summary.matches, 1);

    let decision = h.store.get_decision("foo.mkv", "guid-1").unwrap().unwrap();
    assert_eq!(decision.verdict, Verdict::Match);
    assert!(decision.info_hash.is_some());

    // Artifact lands under the candidate's tracker host.
    let artifact = h
        .output_dir
        .join("other.example")
        .join("foo.mkv.resow.torrent");
    assert!(artifact.exists());
    let reparsed = Metafile::parse(&fs::read(artifact).unwrap()).unwrap();
    assert_eq!(reparsed.info_hash, Metafile::parse(&remote).unwrap().info_hash);

    // Save action: nothing injected, nothing rechecked.
    assert!(h.client.recorded_injects().await.is_empty());
    assert!(h.client.recorded_rechecks().await.is_empty());
}

#[tokio::test]
async fn second_pass_produces_no_new_decisions() {
    let h = harness(Action::Save, MatchMode::Safe);

    let local = torrent_with_piece_length("foo.mkv", 1_000, "http://home.example/ann", 262_144);
    let remote = torrent_with_piece_length("foo.mkv", 1_000, "http://other.example/ann", 524_288);
    write_torrent(&h.torrent_dir, "foo.mkv.torrent", &local);
    h.provider
        .set_results(vec![candidate("foo.mkv", "guid-1", "https://indexer.example/dl/1", 1_000)])
        .await;
    h.provider
        .set_snatch("https://indexer.example/dl/1", remote)
        .await;

    h.pipeline.bulk_search().await.unwrap();
    let first: Vec<_> = h.store.list_decisions("foo.mkv").unwrap();

    let summary = h.pipeline.bulk_search().await.unwrap();
    let second: Vec<_> = h.store.list_decisions("foo.mkv").unwrap();

    assert_eq!(first.len(), second.len());
    assert_eq!(second[0].verdict, Verdict::Match);
    assert_eq!(second[0].first_seen, first[0].first_seen);
    // The cached decision still counts as this pass's match.
    assert_eq!(summary.matches, 1);
}

#[tokio::test]
async fn clear_cache_preserves_terminal_matches() {
    let h = harness(Action::Save, MatchMode::Safe);

    let local = torrent_with_piece_length("foo.mkv", 1_000, "http://home.example/ann", 262_144);
    let remote = torrent_with_piece_length("foo.mkv", 1_000, "http://other.example/ann", 524_288);
    write_torrent(&h.torrent_dir, "foo.mkv.torrent", &local);
    h.provider
        .set_results(vec![
            candidate("foo.mkv", "guid-match", "https://indexer.example/dl/1", 1_000),
            // A reject that never snatches: size is hopeless.
            candidate("foo.mkv", "guid-reject", "https://indexer.example/dl/2", 5_000),
        ])
        .await;
    h.provider
        .set_snatch("https://indexer.example/dl/1", remote.clone())
        .await;

    h.pipeline.bulk_search().await.unwrap();
    assert_eq!(h.store.list_decisions("foo.mkv").unwrap().len(), 2);

    // clear-cache drops only the decision without an infohash.
    h.store.clear_decision_cache().unwrap();
    let remaining = h.store.list_decisions("foo.mkv").unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].candidate_guid, "guid-match");

    // Re-running restores the same terminal MATCH set.
    h.pipeline.bulk_search().await.unwrap();
    let decisions = h.store.list_decisions("foo.mkv").unwrap();
    assert_eq!(decisions.len(), 2);
    let m = decisions
        .iter()
        .find(|d| d.candidate_guid == "guid-match")
        .unwrap();
    assert_eq!(m.verdict, Verdict::Match);
}

#[tokio::test]
async fn size_over_fuzzy_threshold_rejected_without_snatch() {
    let h = harness(Action::Save, MatchMode::Risky);

    let local = torrent_with_piece_length("x.mkv", 1_000_000_000, "http://home.example/ann", 262_144);
    write_torrent(&h.torrent_dir, "x.mkv.torrent", &local);
    // 2.5% over, default threshold 2%. No snatch body scripted: the
    // prescreen must reject before any snatch happens.
    h.provider
        .set_results(vec![candidate(
            "x.mkv",
            "guid-big",
            "https://indexer.example/dl/9",
            1_025_000_000,
        )])
        .await;

    let summary = h.pipeline.bulk_search().await.unwrap();
    assert_eq!(summary.matches, 0);
    let decision = h.store.get_decision("x.mkv", "guid-big").unwrap().unwrap();
    assert_eq!(decision.verdict, Verdict::SizeMismatch);
    assert!(decision.info_hash.is_none());
}

#[tokio::test]
async fn rate_limited_indexer_enters_cooldown_and_is_skipped() {
    let h = harness(Action::Save, MatchMode::Safe);

    let local = torrent_with_piece_length("x.mkv", 1_000, "http://home.example/ann", 262_144);
    write_torrent(&h.torrent_dir, "x.mkv.torrent", &local);

    // First pass fetches caps; afterwards the scripted failure hits the
    // search call itself.
    h.pipeline.sync_indexers().await.unwrap();
    h.provider.fail_next(SearchError::RateLimited).await;
    h.pipeline.bulk_search().await.unwrap();

    let indexers = h.pipeline.registry().list().unwrap();
    assert_eq!(indexers.len(), 1);
    assert_eq!(indexers[0].status, IndexerStatus::RateLimited);
    let retry_after = indexers[0].retry_after.expect("cooldown must be set");
    let delta = retry_after - chrono::Utc::now();
    assert!(delta <= chrono::Duration::minutes(1));
    assert!(delta > chrono::Duration::seconds(30));

    // While cooling down the indexer is skipped entirely.
    h.provider
        .set_results(vec![candidate("x.mkv", "g", "https://indexer.example/dl/1", 1_000)])
        .await;
    let summary = h.pipeline.bulk_search().await.unwrap();
    assert_eq!(summary.candidates, 0);
}

#[tokio::test]
async fn partial_match_injects_and_rechecks() {
    let h = harness(Action::Inject, MatchMode::Partial);

    let local = torrent_with_piece_length("ep.mkv", 1_000_000_000, "http://home.example/ann", 262_144);
    write_torrent(&h.torrent_dir, "ep.mkv.torrent", &local);

    // Candidate carries an extra nfo alongside the same video payload.
    let remote = multi_file_torrent(
        "ep",
        &[(&["ep.mkv"], 1_000_000_000), (&["ep.nfo"], 2_048)],
        "http://other.example/ann",
    );
    h.provider
        .set_results(vec![candidate(
            "ep",
            "guid-p",
            "https://indexer.example/dl/p",
            1_000_002_048,
        )])
        .await;
    h.provider
        .set_snatch("https://indexer.example/dl/p", remote)
        .await;

    let summary = h.pipeline.bulk_search().await.unwrap();
    assert_eq!(summary.matches, 1);

    let decision = h.store.get_decision("ep.mkv", "guid-p").unwrap().unwrap();
    assert_eq!(decision.verdict, Verdict::MatchPartial);

    let injects = h.client.recorded_injects().await;
    assert_eq!(injects.len(), 1);
    assert_eq!(injects[0].decision, Verdict::MatchPartial);
    // MATCH_PARTIAL forces a recheck after injection.
    let rechecks = h.client.recorded_rechecks().await;
    assert_eq!(rechecks.len(), 1);
    assert_eq!(rechecks[0], injects[0].info_hash);
}

#[tokio::test]
async fn disc_image_match_triggers_recheck() {
    let h = harness(Action::Inject, MatchMode::Safe);

    let local = multi_file_torrent(
        "Movie.BD",
        &[(&["BDMV", "STREAM", "00000.m2ts"], 10_000_000)],
        "http://home.example/ann",
    );
    write_torrent(&h.torrent_dir, "movie.torrent", &local);
    let remote = multi_file_torrent(
        "Movie.BD",
        &[(&["BDMV", "STREAM", "00000.m2ts"], 10_000_000)],
        "http://other.example/ann",
    );
    h.provider
        .set_results(vec![candidate(
            "Movie.BD",
            "guid-bd",
            "https://indexer.example/dl/bd",
            10_000_000,
        )])
        .await;
    h.provider
        .set_snatch("https://indexer.example/dl/bd", remote)
        .await;

    let summary = h.pipeline.bulk_search().await.unwrap();
    assert_eq!(summary.matches, 1);
    let decision = h.store.get_decision("Movie.BD", "guid-bd").unwrap().unwrap();
    assert_eq!(decision.verdict, Verdict::Match);
    // MATCH verdict, but the disc layout still forces a recheck.
    assert_eq!(h.client.recorded_injects().await.len(), 1);
    assert_eq!(h.client.recorded_rechecks().await.len(), 1);
}

#[tokio::test]
async fn snatch_of_garbage_records_no_download_link() {
    let h = harness(Action::Save, MatchMode::Safe);

    let local = torrent_with_piece_length("x.mkv", 1_000, "http://home.example/ann", 262_144);
    write_torrent(&h.torrent_dir, "x.mkv.torrent", &local);
    h.provider
        .set_results(vec![candidate("x.mkv", "guid-bad", "https://indexer.example/dl/bad", 1_000)])
        .await;
    h.provider
        .set_snatch("https://indexer.example/dl/bad", b"<html>not a torrent</html>".to_vec())
        .await;

    h.pipeline.bulk_search().await.unwrap();
    let decision = h.store.get_decision("x.mkv", "guid-bad").unwrap().unwrap();
    assert_eq!(decision.verdict, Verdict::NoDownloadLink);
}

#[tokio::test]
async fn candidate_already_in_client_is_rejected() {
    let h = harness(Action::Save, MatchMode::Safe);

    let local = torrent_with_piece_length("x.mkv", 1_000, "http://home.example/ann", 262_144);
    let remote = torrent_with_piece_length("x.mkv", 1_000, "http://other.example/ann", 524_288);
    let remote_hash = Metafile::parse(&remote).unwrap().info_hash;
    write_torrent(&h.torrent_dir, "x.mkv.torrent", &local);

    h.client
        .set_torrents(vec![resow_core::torrent_client::ClientTorrent {
            info_hash: remote_hash,
            name: "x.mkv".to_string(),
            category: None,
            tags: Vec::new(),
            trackers: Vec::new(),
            save_path: None,
            complete: true,
            files: Vec::new(),
            added_at: None,
        }])
        .await;

    let mut c = candidate("x.mkv", "guid-dup", "https://indexer.example/dl/1", 1_000);
    c.info_hash = Some(remote_hash);
    h.provider.set_results(vec![c]).await;

    h.pipeline.bulk_search().await.unwrap();
    let decision = h.store.get_decision("x.mkv", "guid-dup").unwrap().unwrap();
    assert_eq!(decision.verdict, Verdict::InfoHashAlreadyExists);
}

#[tokio::test]
async fn rss_scan_advances_cursor() {
    let h = harness(Action::Save, MatchMode::Safe);

    let local = torrent_with_piece_length("x.mkv", 1_000, "http://home.example/ann", 262_144);
    write_torrent(&h.torrent_dir, "x.mkv.torrent", &local);

    let mut item = candidate("unrelated", "guid-rss", "https://indexer.example/dl/r", 999_999);
    item.pub_date = Some(chrono::Utc::now());
    h.provider.set_rss_items(vec![item]).await;

    let first = h.pipeline.rss_scan().await.unwrap();
    assert_eq!(first.candidates, 1);

    // Same feed again: the cursor filters everything out.
    let second = h.pipeline.rss_scan().await.unwrap();
    assert_eq!(second.candidates, 0);
}

#[tokio::test]
async fn transient_indexer_error_is_isolated() {
    let h = harness(Action::Save, MatchMode::Safe);

    let local = torrent_with_piece_length("x.mkv", 1_000, "http://home.example/ann", 262_144);
    write_torrent(&h.torrent_dir, "x.mkv.torrent", &local);

    h.pipeline.sync_indexers().await.unwrap();
    h.provider.fail_next(SearchError::Timeout).await;
    let summary = h.pipeline.bulk_search().await.unwrap();
    assert_eq!(summary.errors, 1);

    // Transient failure: no cooldown, searchable next pass.
    let indexers = h.pipeline.registry().list().unwrap();
    assert_eq!(indexers[0].status, IndexerStatus::UnknownError);
    assert!(indexers[0].retry_after.is_none());

    h.provider
        .set_results(vec![candidate("x.mkv", "g2", "https://indexer.example/dl/2", 1_000)])
        .await;
    let summary = h.pipeline.bulk_search().await.unwrap();
    assert_eq!(summary.candidates, 1);
}
