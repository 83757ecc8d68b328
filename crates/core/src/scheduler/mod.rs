//! Periodic job scheduler.
//!
//! Two independent loops (bulk SEARCH and RSS) driven by their configured
//! cadences. Each loop is single-flight: the next run is scheduled from
//! the end of the previous one, so a slow pass shifts the schedule
//! instead of stacking. Fatal pass errors log and wait one cadence; the
//! loops never exit the process.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::pipeline::Pipeline;
use crate::store::Store;

/// Scheduled job names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobName {
    Search,
    Rss,
}

impl JobName {
    fn key(&self) -> &'static str {
        match self {
            JobName::Search => "search",
            JobName::Rss => "rss",
        }
    }
}

/// Job state for the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct JobState {
    pub name: JobName,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub running: bool,
}

/// Periodic search and RSS loops.
pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    store: Arc<Store>,
    search_cadence: Option<Duration>,
    rss_cadence: Option<Duration>,
    search_running: Arc<AtomicBool>,
    rss_running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Scheduler {
    pub fn new(
        pipeline: Arc<Pipeline>,
        store: Arc<Store>,
        search_cadence: Option<Duration>,
        rss_cadence: Option<Duration>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            pipeline,
            store,
            search_cadence,
            rss_cadence,
            search_running: Arc::new(AtomicBool::new(false)),
            rss_running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Spawn the configured loops. Returns their join handles.
    pub fn start(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();
        if let Some(cadence) = self.search_cadence {
            info!(cadence_secs = cadence.as_secs(), "Starting SEARCH loop");
            handles.push(self.clone().spawn_loop(JobName::Search, cadence));
        }
        if let Some(cadence) = self.rss_cadence {
            info!(cadence_secs = cadence.as_secs(), "Starting RSS loop");
            handles.push(self.clone().spawn_loop(JobName::Rss, cadence));
        }
        handles
    }

    /// Signal both loops to stop after their current boundary.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(());
        self.pipeline.cancel_handle().store(true, Ordering::Relaxed);
    }

    /// Current job state, for the health endpoint.
    pub fn job_states(&self) -> Vec<JobState> {
        [
            (JobName::Search, &self.search_running, self.search_cadence),
            (JobName::Rss, &self.rss_running, self.rss_cadence),
        ]
        .into_iter()
        .filter(|(_, _, cadence)| cadence.is_some())
        .map(|(name, running, _)| JobState {
            name,
            last_run: self.load_instant(name, "last_run"),
            next_run: self.load_instant(name, "next_run"),
            running: running.load(Ordering::Relaxed),
        })
        .collect()
    }

    fn spawn_loop(self: Arc<Self>, job: JobName, cadence: Duration) -> JoinHandle<()> {
        let running = match job {
            JobName::Search => self.search_running.clone(),
            JobName::Rss => self.rss_running.clone(),
        };
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            loop {
                // A tick that would overlap the previous run is dropped
                // by construction: the next wait starts at run end.
                if running.swap(true, Ordering::SeqCst) {
                    warn!(job = job.key(), "Job already in flight, dropping tick");
                } else {
                    self.store_instant(job, "last_run", Utc::now());
                    let result = match job {
                        JobName::Search => self.pipeline.bulk_search().await,
                        JobName::Rss => self.pipeline.rss_scan().await,
                    };
                    if let Err(e) = result {
                        error!(job = job.key(), error = %e, "Scheduled pass failed");
                    }
                    running.store(false, Ordering::SeqCst);
                }

                let next = Utc::now()
                    + chrono::Duration::from_std(cadence).unwrap_or(chrono::Duration::hours(1));
                self.store_instant(job, "next_run", next);

                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!(job = job.key(), "Loop shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(cadence) => {}
                }
            }
        })
    }

    fn store_instant(&self, job: JobName, field: &str, value: DateTime<Utc>) {
        let key = format!("job.{}.{}", job.key(), field);
        if let Err(e) = self.store.set_setting(&key, &value.to_rfc3339()) {
            warn!(error = %e, "Failed to persist job state");
        }
    }

    fn load_instant(&self, job: JobName, field: &str) -> Option<DateTime<Utc>> {
        let key = format!("job.{}.{}", job.key(), field);
        self.store
            .get_setting(&key)
            .ok()
            .flatten()
            .and_then(|v| DateTime::parse_from_rfc3339(&v).ok())
            .map(|t| t.with_timezone(&Utc))
    }
}
