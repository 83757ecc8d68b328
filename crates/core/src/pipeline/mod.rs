//! Search pipeline.
//!
//! Orchestrates a pass: enumerate searchees, fan queries out to the
//! indexer federation, screen and match candidates, persist decisions,
//! emit artifact torrents, and optionally hand confirmed matches to the
//! torrent client. One candidate's failure never aborts the pass.

mod types;

pub use types::{PassSummary, PipelineError};

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::config::{Action, Config};
use crate::indexer::{ContactResult, IndexerRegistry};
use crate::linker::{LinkError, Linker};
use crate::matcher::{self, MatchPolicy, Verdict};
use crate::metadata::ArrLookup;
use crate::metafile::{InfoHash, Metafile};
use crate::notify::Notifier;
use crate::searchee::{
    self, searchees_from_data_dir, Searchee, SearcheeFile, SearcheeFilterOptions, SearcheeSource,
};
use crate::store::{Indexer, RssCursor, Store};
use crate::torrent_client::{DownloadDirResult, InjectResult, TorrentClientAdapter};
use crate::torznab::{
    intersect_with_caps, plan_query, Candidate, QueryKind, QueryPlan, SearchError, SearchProvider,
};

/// Artifact file suffix under the output directory.
const ARTIFACT_SUFFIX: &str = ".resow.torrent";

/// The search pipeline. Collaborators are injected at construction;
/// the config is frozen for the process lifetime.
pub struct Pipeline {
    config: Config,
    store: Arc<Store>,
    registry: IndexerRegistry,
    provider: Arc<dyn SearchProvider>,
    client: Arc<dyn TorrentClientAdapter>,
    linker: Option<Linker>,
    arr: Option<ArrLookup>,
    notifier: Arc<Notifier>,
    policy: MatchPolicy,
    cancelled: Arc<AtomicBool>,
}

impl Pipeline {
    pub fn new(
        config: Config,
        store: Arc<Store>,
        provider: Arc<dyn SearchProvider>,
        client: Arc<dyn TorrentClientAdapter>,
        notifier: Arc<Notifier>,
    ) -> Self {
        let registry = IndexerRegistry::new(store.clone());
        let linker = config.linking.clone().map(Linker::new);
        let arr = ArrLookup::from_config(
            &config.metadata,
            config.search.search_timeout.as_duration(),
        );
        let policy = MatchPolicy::from_config(&config.matching, &config.search.block_list);
        Self {
            config,
            store,
            registry,
            provider,
            client,
            linker,
            arr,
            notifier,
            policy,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle for cooperative cancellation; checked at searchee and
    /// indexer boundaries.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn registry(&self) -> &IndexerRegistry {
        &self.registry
    }

    /// Sync indexers from config and fetch caps for rows that lack them.
    /// Run once at startup and again at the top of each scheduled pass.
    pub async fn sync_indexers(&self) -> Result<Vec<Indexer>, PipelineError> {
        let indexers = self.registry.sync_from_config(&self.config.torznab.urls)?;
        for indexer in &indexers {
            if indexer.caps == Default::default() || indexer.name.is_none() {
                match self.provider.fetch_caps(indexer).await {
                    Ok((name, caps)) => {
                        self.registry.record_caps(indexer, name.as_deref(), &caps)?;
                        self.registry.mark_result(indexer, ContactResult::Success)?;
                    }
                    Err(e) => {
                        warn!(indexer = %indexer.label(), error = %e, "Caps fetch failed");
                        self.registry.mark_result(indexer, e.contact_result())?;
                    }
                }
            }
        }
        Ok(self.registry.list_active()?)
    }

    /// Enumerate searchees from `torrent_dir` and `data_dirs`, applying
    /// the non-video and single-episode filters.
    pub fn enumerate_searchees(&self) -> Result<Vec<Searchee>, PipelineError> {
        let mut searchees = Vec::new();

        if let Some(torrent_dir) = &self.config.search.torrent_dir {
            let entries = std::fs::read_dir(torrent_dir)
                .map_err(|e| PipelineError::TorrentDir(format!("{}: {}", torrent_dir.display(), e)))?;
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().map(|e| e == "torrent").unwrap_or(false) {
                    let meta = match Metafile::load(&path) {
                        Ok(meta) => meta,
                        Err(e) => {
                            warn!(path = %path.display(), error = %e, "Skipping unparseable torrent");
                            continue;
                        }
                    };
                    let mtime = entry
                        .metadata()
                        .ok()
                        .and_then(|m| m.modified().ok())
                        .map(chrono::DateTime::<Utc>::from);
                    match searchee::from_metafile(&meta, mtime) {
                        Ok(searchee) => searchees.push(searchee),
                        Err(e) => warn!(path = %path.display(), error = %e, "Skipping searchee"),
                    }
                }
            }
        }

        for dir in &self.config.search.data_dirs {
            searchees.extend(searchees_from_data_dir(
                dir,
                self.config.search.max_data_depth,
                &self.config.search.block_list,
            )?);
        }

        let opts = SearcheeFilterOptions {
            include_non_videos: self.config.search.include_non_videos,
            include_single_episodes: self.config.search.include_single_episodes,
            video_extensions: self.config.matching.video_extensions.clone(),
        };
        searchees.retain(|s| searchee::passes_filters(s, &opts));
        searchees.sort_by(|a, b| a.name.cmp(&b.name));
        searchees.dedup_by(|a, b| a.name == b.name);
        Ok(searchees)
    }

    /// Bulk search entry point.
    pub async fn bulk_search(&self) -> Result<PassSummary, PipelineError> {
        let indexers = self.sync_indexers().await?;
        let searchees = self.enumerate_searchees()?;
        info!(
            searchees = searchees.len(),
            indexers = indexers.len(),
            "Starting bulk search pass"
        );

        let client_hashes = self.client_hashes().await;
        let now = Utc::now();

        // History windows: drop searchees seen too long ago or searched
        // too recently.
        let mut eligible = Vec::new();
        let mut summary = PassSummary::default();
        for searchee in searchees {
            summary.searchees += 1;
            let first_seen = self.store.ensure_searchee(
                &searchee.name,
                searchee.info_hash().map(|h| h.to_string()).as_deref(),
                searchee.total_size(),
                &searchee.files,
            )?;
            if let Some(minutes) = self.config.search.exclude_older_minutes {
                if first_seen < now - ChronoDuration::minutes(minutes as i64) {
                    debug!(searchee = %searchee.name, "Excluded: older than cutoff");
                    continue;
                }
            }
            if let Some(minutes) = self.config.search.exclude_recent_search_minutes {
                if let Some(ts) = self.store.get_search_timestamps(&searchee.name)? {
                    if ts.last_searched > now - ChronoDuration::minutes(minutes as i64) {
                        debug!(searchee = %searchee.name, "Excluded: searched recently");
                        continue;
                    }
                }
            }
            eligible.push(searchee);
        }

        if self.config.search.search_limit > 0 {
            eligible.truncate(self.config.search.search_limit);
        }

        let pool = workers(indexers.len());
        let results: Vec<PassSummary> = stream::iter(eligible)
            .map(|searchee| {
                let client_hashes = client_hashes.clone();
                async move {
                    if self.is_cancelled() {
                        return PassSummary::default();
                    }
                    let result = self.search_searchee(&searchee, &client_hashes).await;
                    // Inter-searchee pause keeps the federation happy.
                    tokio::time::sleep(self.config.search.delay.as_duration()).await;
                    result
                }
            })
            .buffer_unordered(pool)
            .collect()
            .await;

        for r in results {
            summary.absorb(r);
        }
        info!(
            searched = summary.searched,
            candidates = summary.candidates,
            matches = summary.matches,
            errors = summary.errors,
            "Bulk search pass complete"
        );
        Ok(summary)
    }

    /// Single-searchee entry point used by the admin API.
    pub async fn search_one(&self, searchee: &Searchee) -> Result<PassSummary, PipelineError> {
        self.sync_indexers().await?;
        self.store.ensure_searchee(
            &searchee.name,
            searchee.info_hash().map(|h| h.to_string()).as_deref(),
            searchee.total_size(),
            &searchee.files,
        )?;
        let client_hashes = self.client_hashes().await;
        let mut summary = self.search_searchee(searchee, &client_hashes).await;
        summary.searchees = 1;
        Ok(summary)
    }

    /// RSS scan entry point: walk each indexer's newest items down to its
    /// stored cursor and try them against all local searchees.
    pub async fn rss_scan(&self) -> Result<PassSummary, PipelineError> {
        let indexers = self.sync_indexers().await?;
        let searchees = self.enumerate_searchees()?;
        let client_hashes = self.client_hashes().await;
        let now = Utc::now();
        info!(
            indexers = indexers.len(),
            searchees = searchees.len(),
            "Starting RSS scan"
        );

        let mut summary = PassSummary {
            searchees: searchees.len(),
            ..Default::default()
        };

        for indexer in self.registry.list_searchable(now)? {
            if self.is_cancelled() {
                break;
            }
            let items = match self.provider.rss(&indexer).await {
                Ok(items) => {
                    self.registry.mark_result(&indexer, ContactResult::Success)?;
                    items
                }
                Err(e) => {
                    warn!(indexer = %indexer.label(), error = %e, "RSS fetch failed");
                    self.registry.mark_result(&indexer, e.contact_result())?;
                    summary.errors += 1;
                    continue;
                }
            };

            let cursor = self.store.get_rss_cursor(indexer.id)?;
            let fresh = fresh_items(&items, &cursor);
            debug!(
                indexer = %indexer.label(),
                items = items.len(),
                fresh = fresh.len(),
                "RSS items fetched"
            );

            for candidate in &fresh {
                summary.candidates += 1;
                for searchee in &searchees {
                    if matcher::prescreen(
                        searchee,
                        &candidate.title,
                        candidate.size,
                        candidate.info_hash,
                        &client_hashes,
                        &self.policy,
                    )
                    .is_some()
                    {
                        continue;
                    }
                    let outcome = self
                        .process_candidate(searchee, &indexer, candidate, &client_hashes)
                        .await;
                    match outcome {
                        Some(v) if v.is_match() => summary.matches += 1,
                        None => summary.errors += 1,
                        _ => {}
                    }
                }
            }

            self.store
                .set_rss_cursor(indexer.id, &advance_cursor(&items, &cursor))?;
        }

        info!(
            candidates = summary.candidates,
            matches = summary.matches,
            "RSS scan complete"
        );
        Ok(summary)
    }

    /// Inject previously saved artifacts that match local searchees.
    /// Used by the `inject` command to catch up after running with
    /// `action = save`.
    pub async fn inject_saved(&self) -> Result<PassSummary, PipelineError> {
        let searchees = self.enumerate_searchees()?;
        let client_hashes = self.client_hashes().await;
        let mut summary = PassSummary {
            searchees: searchees.len(),
            ..Default::default()
        };

        let output_dir = &self.config.search.output_dir;
        if !output_dir.exists() {
            return Ok(summary);
        }
        for entry in walkdir::WalkDir::new(output_dir)
            .follow_links(false)
            .into_iter()
            .flatten()
        {
            if !entry.file_type().is_file()
                || !entry
                    .path()
                    .to_string_lossy()
                    .ends_with(ARTIFACT_SUFFIX)
            {
                continue;
            }
            let meta = match Metafile::load(entry.path()) {
                Ok(meta) => meta,
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "Skipping artifact");
                    continue;
                }
            };
            summary.candidates += 1;

            let files: Vec<SearcheeFile> = meta
                .files
                .iter()
                .map(|f| SearcheeFile {
                    path: f.joined_path(),
                    size: f.length,
                })
                .collect();

            for searchee in &searchees {
                let verdict = matcher::decide(
                    searchee,
                    &meta.name,
                    &files,
                    Some(meta.info_hash),
                    &client_hashes,
                    &self.policy,
                );
                if !verdict.is_match() {
                    continue;
                }
                let mut link_root = None;
                if matches!(searchee.source, SearcheeSource::Data { .. }) {
                    if let Some(linker) = &self.linker {
                        let tracker = meta
                            .primary_tracker()
                            .unwrap_or_else(|| "unknown".to_string());
                        match linker
                            .link_tree(searchee, &meta.name, &files, Some(&tracker))
                            .await
                        {
                            Ok(root) => link_root = Some(root),
                            Err(e) => {
                                warn!(searchee = %searchee.name, error = %e, "Linking failed");
                                summary.errors += 1;
                                continue;
                            }
                        }
                    }
                }
                self.inject_match(searchee, &meta, verdict, link_root).await;
                summary.matches += 1;
                break;
            }
        }
        info!(
            artifacts = summary.candidates,
            injected = summary.matches,
            "Inject pass complete"
        );
        Ok(summary)
    }

    /// Run one searchee across all searchable indexers.
    async fn search_searchee(
        &self,
        searchee: &Searchee,
        client_hashes: &HashSet<InfoHash>,
    ) -> PassSummary {
        let mut summary = PassSummary {
            searched: 1,
            ..Default::default()
        };

        let plan = self.enriched_plan(searchee).await;
        let indexers = match self.registry.list_searchable(Utc::now()) {
            Ok(indexers) => indexers,
            Err(e) => {
                warn!(error = %e, "Could not list indexers");
                summary.errors += 1;
                return summary;
            }
        };

        // Fan out across indexers; candidates of this searchee are then
        // processed serially so the decision cache stays consistent.
        let queries = indexers.iter().filter_map(|indexer| {
            let run = intersect_with_caps(&plan, &indexer.caps)?;
            Some(async move {
                let result = self.provider.search(indexer, &run).await;
                (indexer, result)
            })
        });
        let batches = futures::future::join_all(queries).await;

        for (indexer, result) in batches {
            if self.is_cancelled() {
                break;
            }
            match result {
                Ok(candidates) => {
                    if let Err(e) = self.registry.mark_result(indexer, ContactResult::Success) {
                        warn!(error = %e, "Failed to record indexer success");
                    }
                    let _ = self.store.touch_search_timestamp(&searchee.name, indexer.id);

                    for candidate in candidates {
                        summary.candidates += 1;
                        match self
                            .process_candidate(searchee, indexer, &candidate, client_hashes)
                            .await
                        {
                            Some(v) if v.is_match() => summary.matches += 1,
                            None => summary.errors += 1,
                            _ => {}
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        indexer = %indexer.label(),
                        searchee = %searchee.name,
                        error = %e,
                        "Indexer query failed"
                    );
                    summary.errors += 1;
                    if let Err(e) = self.registry.mark_result(indexer, e.contact_result()) {
                        warn!(error = %e, "Failed to record indexer failure");
                    }
                }
            }
        }
        summary
    }

    /// The query plan for a searchee, with external ids attached when a
    /// Sonarr/Radarr instance recognizes the title. A failed lookup is
    /// logged and the query runs on terms alone.
    async fn enriched_plan(&self, searchee: &Searchee) -> QueryPlan {
        let mut plan = plan_query(&searchee.name);
        if let Some(arr) = &self.arr {
            let lookup = match plan.kind {
                QueryKind::TvSearch => arr.series_ids(&plan.terms).await,
                QueryKind::Movie => arr.movie_ids(&plan.terms).await,
                _ => Ok(Vec::new()),
            };
            match lookup {
                Ok(ids) => plan.ids = ids,
                Err(e) => {
                    warn!(searchee = %searchee.name, error = %e, "Id lookup failed")
                }
            }
        }
        plan
    }

    /// Evaluate one candidate. Returns the recorded verdict, or `None`
    /// for transient errors that produced no decision.
    async fn process_candidate(
        &self,
        searchee: &Searchee,
        indexer: &Indexer,
        candidate: &Candidate,
        client_hashes: &HashSet<InfoHash>,
    ) -> Option<Verdict> {
        // Cached terminal decision short-circuits the whole evaluation.
        match self.store.get_decision(&searchee.name, &candidate.guid) {
            Ok(Some(cached)) if is_settled(cached.verdict) => {
                debug!(
                    searchee = %searchee.name,
                    guid = %candidate.guid,
                    verdict = cached.verdict.as_str(),
                    "Cached decision"
                );
                return Some(cached.verdict);
            }
            Err(e) => {
                warn!(error = %e, "Decision lookup failed");
                return None;
            }
            _ => {}
        }

        if let Some(verdict) = matcher::prescreen(
            searchee,
            &candidate.title,
            candidate.size,
            candidate.info_hash,
            client_hashes,
            &self.policy,
        ) {
            self.record(searchee, indexer, candidate, verdict, None, None);
            return Some(verdict);
        }

        // Snatch, then re-run the matcher against the real file list;
        // non-id Torznab items may lie about what they carry.
        let Some(link) = candidate.link.as_deref() else {
            self.record(searchee, indexer, candidate, Verdict::NoDownloadLink, None, None);
            return Some(Verdict::NoDownloadLink);
        };
        let bytes = match self.provider.snatch(link).await {
            Ok(bytes) => bytes,
            Err(SearchError::RateLimited) => {
                let _ = self.registry.mark_result(indexer, ContactResult::RateLimited);
                self.record(searchee, indexer, candidate, Verdict::RateLimited, None, None);
                return Some(Verdict::RateLimited);
            }
            Err(e) => {
                warn!(
                    searchee = %searchee.name,
                    candidate = %candidate.title,
                    error = %e,
                    "Snatch failed"
                );
                self.record(searchee, indexer, candidate, Verdict::NoDownloadLink, None, None);
                return Some(Verdict::NoDownloadLink);
            }
        };
        let meta = match Metafile::parse(&bytes) {
            Ok(meta) => meta,
            Err(e) => {
                debug!(candidate = %candidate.title, error = %e, "Snatched body is not a torrent");
                self.record(searchee, indexer, candidate, Verdict::NoDownloadLink, None, None);
                return Some(Verdict::NoDownloadLink);
            }
        };

        let files: Vec<SearcheeFile> = meta
            .files
            .iter()
            .map(|f| SearcheeFile {
                path: f.joined_path(),
                size: f.length,
            })
            .collect();
        let verdict = matcher::decide(
            searchee,
            &candidate.title,
            &files,
            Some(meta.info_hash),
            client_hashes,
            &self.policy,
        );
        let fuzzy = fuzzy_factor(searchee.total_size(), meta.total_size());

        if !verdict.is_match() {
            self.record(
                searchee,
                indexer,
                candidate,
                verdict,
                Some(meta.info_hash),
                fuzzy,
            );
            return Some(verdict);
        }

        let verdict = self
            .complete_match(searchee, indexer, candidate, &meta, &files, verdict, fuzzy)
            .await;
        Some(verdict)
    }

    /// Emit the artifact and optionally link + inject a confirmed match.
    #[allow(clippy::too_many_arguments)]
    async fn complete_match(
        &self,
        searchee: &Searchee,
        indexer: &Indexer,
        candidate: &Candidate,
        meta: &Metafile,
        files: &[SearcheeFile],
        verdict: Verdict,
        fuzzy: Option<f64>,
    ) -> Verdict {
        let tracker = meta.primary_tracker().unwrap_or_else(|| indexer.label());

        // Data-origin matches get a link tree before anything else; a
        // failed link demotes the outcome for user remediation.
        let mut link_root: Option<PathBuf> = None;
        if matches!(searchee.source, SearcheeSource::Data { .. }) {
            if let Some(linker) = &self.linker {
                match linker
                    .link_tree(searchee, &meta.name, files, Some(&tracker))
                    .await
                {
                    Ok(root) => link_root = Some(root),
                    Err(e @ LinkError::CrossDevice { .. }) => {
                        warn!(searchee = %searchee.name, error = %e, "Linking failed");
                        self.record(searchee, indexer, candidate, Verdict::UnknownError, Some(meta.info_hash), fuzzy);
                        self.notifier
                            .notify(
                                "Link failed",
                                &format!(
                                    "{}: hardlink across filesystems for {}; fix link_dir placement",
                                    searchee.name, meta.name
                                ),
                            )
                            .await;
                        return Verdict::UnknownError;
                    }
                    Err(e) => {
                        warn!(searchee = %searchee.name, error = %e, "Linking failed");
                        self.record(searchee, indexer, candidate, Verdict::UnknownError, Some(meta.info_hash), fuzzy);
                        return Verdict::UnknownError;
                    }
                }
            }
        }

        self.record(searchee, indexer, candidate, verdict, Some(meta.info_hash), fuzzy);

        if let Err(e) = self.write_artifact(meta, &tracker).await {
            warn!(error = %e, "Artifact write failed");
        }

        if self.config.search.action == Action::Inject {
            self.inject_match(searchee, meta, verdict, link_root).await;
        }

        info!(
            searchee = %searchee.name,
            candidate = %candidate.title,
            indexer = %indexer.label(),
            verdict = verdict.as_str(),
            "Cross-seed found"
        );
        self.notifier
            .notify(
                "Cross-seed found",
                &format!(
                    "{} matched {} on {} ({})",
                    searchee.name,
                    candidate.title,
                    indexer.label(),
                    verdict.as_str()
                ),
            )
            .await;
        verdict
    }

    async fn inject_match(
        &self,
        searchee: &Searchee,
        meta: &Metafile,
        verdict: Verdict,
        link_root: Option<PathBuf>,
    ) {
        // The client wants the directory that contains the content root.
        let download_dir = match (&link_root, searchee.info_hash()) {
            (Some(root), _) => root.parent().map(|p| p.to_path_buf()),
            (None, Some(hash)) => {
                match self.client.get_download_dir(hash, true).await {
                    Ok(DownloadDirResult::Found(dir)) => Some(dir),
                    Ok(DownloadDirResult::TorrentNotComplete) => {
                        info!(searchee = %searchee.name, "Skipping inject: torrent not complete");
                        return;
                    }
                    Ok(_) => None,
                    Err(e) => {
                        warn!(error = %e, "Client unreachable, keeping save semantics");
                        return;
                    }
                }
            }
            // Unlinked data match: the payload's parent is the best
            // available download dir.
            (None, None) => searchee
                .data_root()
                .and_then(|root| root.parent().map(|p| p.to_path_buf())),
        };

        match self
            .client
            .inject(meta, searchee, verdict, download_dir.as_deref())
            .await
        {
            InjectResult::Success => {
                info!(torrent = %meta.name, client = self.client.name(), "Injected");
                if matcher::should_recheck(searchee, verdict) {
                    if let Err(e) = self.client.recheck_torrent(meta.info_hash).await {
                        warn!(error = %e, "Recheck request failed");
                    }
                }
            }
            InjectResult::AlreadyExists => {
                debug!(torrent = %meta.name, "Already in client");
            }
            InjectResult::TorrentNotComplete => {
                info!(torrent = %meta.name, "Client reports source not complete");
            }
            InjectResult::Failure(reason) => {
                warn!(torrent = %meta.name, reason, "Injection failed; artifact saved");
                self.notifier
                    .notify(
                        "Injection failed",
                        &format!("{}: {}", meta.name, reason),
                    )
                    .await;
            }
        }
    }

    async fn write_artifact(&self, meta: &Metafile, tracker: &str) -> Result<PathBuf, std::io::Error> {
        let mut dir = self.config.search.output_dir.clone();
        if !tracker.is_empty() {
            dir = dir.join(tracker);
        }
        tokio::fs::create_dir_all(&dir).await?;
        let file_name = format!("{}{}", meta.name.replace('/', "_"), ARTIFACT_SUFFIX);
        let path = dir.join(file_name);
        tokio::fs::write(&path, meta.serialize()).await?;
        debug!(path = %path.display(), "Artifact written");
        Ok(path)
    }

    fn record(
        &self,
        searchee: &Searchee,
        indexer: &Indexer,
        candidate: &Candidate,
        verdict: Verdict,
        info_hash: Option<InfoHash>,
        fuzzy: Option<f64>,
    ) {
        if let Err(e) = self.store.record_decision(
            &searchee.name,
            &candidate.guid,
            info_hash.map(|h| h.to_string()).as_deref(),
            Some(indexer.id),
            verdict,
            fuzzy,
        ) {
            warn!(error = %e, "Failed to persist decision");
        }
    }

    async fn client_hashes(&self) -> HashSet<InfoHash> {
        match self.client.get_all_torrents().await {
            Ok(torrents) => torrents.into_iter().map(|t| t.info_hash).collect(),
            Err(e) => {
                warn!(error = %e, "Could not list client torrents");
                HashSet::new()
            }
        }
    }
}

/// Searchee worker pool size.
fn workers(active_indexers: usize) -> usize {
    active_indexers.min(4).max(1)
}

/// A decision that will not change on re-evaluation with the same
/// inputs. Transient outcomes (rate limits, unknown errors) are retried.
fn is_settled(verdict: Verdict) -> bool {
    !matches!(verdict, Verdict::RateLimited | Verdict::UnknownError)
}

fn fuzzy_factor(expected: u64, actual: u64) -> Option<f64> {
    if expected == 0 {
        return None;
    }
    Some(expected.abs_diff(actual) as f64 / expected as f64)
}

/// Items newer than the cursor, oldest first so decisions are written in
/// feed order. Items older than the stored pubDate are beyond the
/// high-water mark; equal-pubDate items are filtered by guid.
fn fresh_items(items: &[Candidate], cursor: &RssCursor) -> Vec<Candidate> {
    let mut fresh: Vec<Candidate> = items
        .iter()
        .filter(|item| match (item.pub_date, cursor.last_pub_date) {
            (Some(date), Some(mark)) => {
                date > mark || (date == mark && !cursor.last_guids.contains(&item.guid))
            }
            // Undated items can't be ordered; the decision cache keeps
            // reprocessing idempotent.
            _ => !cursor.last_guids.contains(&item.guid),
        })
        .cloned()
        .collect();
    fresh.sort_by_key(|item| item.pub_date);
    fresh
}

/// Next cursor after a scan: newest pubDate seen plus the guids at it.
fn advance_cursor(items: &[Candidate], previous: &RssCursor) -> RssCursor {
    let newest = items.iter().filter_map(|i| i.pub_date).max();
    match newest {
        None => RssCursor {
            last_pub_date: previous.last_pub_date,
            last_guids: items
                .iter()
                .map(|i| i.guid.clone())
                .chain(previous.last_guids.iter().cloned())
                .collect(),
        },
        Some(newest) if Some(newest) < previous.last_pub_date => previous.clone(),
        Some(newest) => RssCursor {
            last_pub_date: Some(newest),
            last_guids: items
                .iter()
                .filter(|i| i.pub_date == Some(newest))
                .map(|i| i.guid.clone())
                .collect(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(guid: &str, pub_date: Option<chrono::DateTime<Utc>>) -> Candidate {
        Candidate {
            title: guid.to_string(),
            guid: guid.to_string(),
            link: None,
            size: None,
            pub_date,
            info_hash: None,
            categories: Vec::new(),
            seeders: None,
        }
    }

    fn at(hour: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_workers_bounds() {
        assert_eq!(workers(0), 1);
        assert_eq!(workers(2), 2);
        assert_eq!(workers(10), 4);
    }

    #[test]
    fn test_is_settled() {
        assert!(is_settled(Verdict::Match));
        assert!(is_settled(Verdict::SizeMismatch));
        assert!(is_settled(Verdict::NoDownloadLink));
        assert!(!is_settled(Verdict::RateLimited));
        assert!(!is_settled(Verdict::UnknownError));
    }

    #[test]
    fn test_fresh_items_stops_at_cursor() {
        let cursor = RssCursor {
            last_pub_date: Some(at(10)),
            last_guids: vec!["seen-at-10".to_string()],
        };
        let items = vec![
            item("new-at-12", Some(at(12))),
            item("new-at-11", Some(at(11))),
            item("seen-at-10", Some(at(10))),
            item("old-at-9", Some(at(9))),
        ];
        let fresh = fresh_items(&items, &cursor);
        let guids: Vec<&str> = fresh.iter().map(|i| i.guid.as_str()).collect();
        // Oldest first, cursor and older excluded.
        assert_eq!(guids, vec!["new-at-11", "new-at-12"]);
    }

    #[test]
    fn test_fresh_items_same_pubdate_new_guid() {
        let cursor = RssCursor {
            last_pub_date: Some(at(10)),
            last_guids: vec!["a".to_string()],
        };
        let items = vec![item("a", Some(at(10))), item("b", Some(at(10)))];
        let fresh = fresh_items(&items, &cursor);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].guid, "b");
    }

    #[test]
    fn test_advance_cursor() {
        let previous = RssCursor {
            last_pub_date: Some(at(10)),
            last_guids: vec!["old".to_string()],
        };
        let items = vec![
            item("x", Some(at(12))),
            item("y", Some(at(12))),
            item("z", Some(at(11))),
        ];
        let next = advance_cursor(&items, &previous);
        assert_eq!(next.last_pub_date, Some(at(12)));
        let mut guids = next.last_guids.clone();
        guids.sort();
        assert_eq!(guids, vec!["x", "y"]);
    }

    #[test]
    fn test_advance_cursor_never_regresses() {
        let previous = RssCursor {
            last_pub_date: Some(at(12)),
            last_guids: vec!["x".to_string()],
        };
        let items = vec![item("stale", Some(at(9)))];
        let next = advance_cursor(&items, &previous);
        assert_eq!(next.last_pub_date, Some(at(12)));
        assert_eq!(next.last_guids, vec!["x"]);
    }

    #[test]
    fn test_fuzzy_factor() {
        assert_eq!(fuzzy_factor(1000, 1000), Some(0.0));
        assert_eq!(fuzzy_factor(1000, 1020), Some(0.02));
        assert_eq!(fuzzy_factor(0, 10), None);
    }
}
