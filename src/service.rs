//! Service wiring: one owning context for the whole pipeline.
//!
//! [`Service::new`] builds every component from a loaded [`Config`] —
//! history, match cache, matcher, catalog source, fetcher, queue, monitor,
//! health — and wires them together. Nothing here is a global; tests and
//! subcommands construct as many independent services as they need.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::info;

use crate::catalog::HttpCatalogSource;
use crate::config::Config;
use crate::fetcher::YtDlpFetcher;
use crate::health::{HealthMonitor, HealthReport};
use crate::history::DownloadHistory;
use crate::metadata::{EpisodeMatcher, HttpMetadataProvider, MatchCache};
use crate::monitor::{CycleReport, EpisodeMonitor};
use crate::queue::{DownloadQueue, QueueSettings, QueueSnapshot};
use crate::scheduler::CheckScheduler;

const HISTORY_FILE: &str = "downloaded.json";
const MATCH_CACHE_FILE: &str = "match-cache.json";

pub struct Service {
    config: Config,
    queue: DownloadQueue,
    history: Arc<DownloadHistory>,
    monitor: Arc<EpisodeMonitor>,
    health: HealthMonitor,
    shutdown_tx: broadcast::Sender<()>,
}

impl Service {
    /// Build the full pipeline. Fails when yt-dlp cannot be located and no
    /// explicit path is configured.
    pub fn new(config: Config, config_path: Option<PathBuf>) -> Result<Self> {
        let data_dir = config.downloads.output_dir.clone();

        let history = Arc::new(DownloadHistory::open(data_dir.join(HISTORY_FILE)));
        info!(path = %history.path().display(), "Download history loaded");

        let cache = Arc::new(MatchCache::open(data_dir.join(MATCH_CACHE_FILE)));
        let matcher = Arc::new(EpisodeMatcher::new(
            Arc::new(HttpMetadataProvider::new()),
            cache,
        ));

        let fetcher = YtDlpFetcher::discover(
            config.tools.ytdlp_path.as_deref(),
            config.downloads.fetch_timeout(),
        )
        .context("yt-dlp not found; install it or set tools.ytdlp_path")?;

        let queue = DownloadQueue::new(
            QueueSettings {
                max_concurrent: config.downloads.max_concurrent,
                max_retries: config.downloads.max_retries,
                retry_delay: config.downloads.retry_delay(),
                naming: config.downloads.naming,
                quality: config.downloads.quality.clone(),
            },
            Arc::new(fetcher),
            Arc::clone(&history),
        );

        let monitor = Arc::new(EpisodeMonitor::new(
            config.shows.clone(),
            data_dir,
            Arc::new(HttpCatalogSource::new()),
            matcher,
            Arc::clone(&history),
            queue.clone(),
        ));

        let health = HealthMonitor::new(config.clone(), config_path);
        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            config,
            queue,
            history,
            monitor,
            health,
            shutdown_tx,
        })
    }

    pub fn queue(&self) -> &DownloadQueue {
        &self.queue
    }

    pub fn history(&self) -> &Arc<DownloadHistory> {
        &self.history
    }

    /// Run the scheduled service until `shutdown` is triggered (or the
    /// returned future is dropped).
    pub async fn run(&self) -> Result<()> {
        info!(
            shows = self.config.shows.len(),
            schedule = %self.config.service.check_schedule,
            "Service starting"
        );

        let scheduler = CheckScheduler::new(
            &self.config.service.check_schedule,
            Arc::clone(&self.monitor),
        )?;

        scheduler.run(self.shutdown_tx.subscribe()).await;

        let snapshot = self.queue.status();
        info!(
            active = snapshot.active,
            queued = snapshot.queued,
            "Service stopped"
        );
        Ok(())
    }

    /// Signal the scheduler loop to stop. Safe to call from any task.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// One discovery cycle, without the scheduler.
    pub async fn check_once(&self) -> CycleReport {
        self.monitor.check_for_new_episodes().await
    }

    /// One discovery cycle that only reports what it would enqueue.
    pub async fn preview_once(&self) -> CycleReport {
        self.monitor.preview_new_episodes().await
    }

    /// Block until the queue holds no queued or active entries. Pending
    /// retry timers count as idle; pass the retry delay budget in
    /// `max_wait` when those matter.
    pub async fn wait_for_idle(&self, max_wait: Duration) -> QueueSnapshot {
        let deadline = tokio::time::Instant::now() + max_wait;
        loop {
            let snapshot = self.queue.status();
            if snapshot.queued == 0 && snapshot.active == 0 {
                return snapshot;
            }
            if tokio::time::Instant::now() >= deadline {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    pub async fn health(&self) -> HealthReport {
        self.health.check().await
    }
}
