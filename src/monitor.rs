//! Episode monitor: one reconciliation cycle per invocation.
//!
//! For every configured show: discover the catalog listing, best-effort
//! enrich each item with a season/episode label, drop anything already in
//! the download history, and enqueue the rest at normal priority. Failures
//! are isolated — a dead catalog skips that show for this cycle only, and a
//! failed metadata lookup merely leaves one item unenriched.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::catalog::{CatalogItem, CatalogSource};
use crate::config::ShowConfig;
use crate::history::DownloadHistory;
use crate::item::EnrichedItem;
use crate::metadata::EpisodeMatcher;
use crate::queue::{DownloadQueue, Priority};

/// Summary of one discovery cycle.
#[derive(Debug, Default, Clone)]
pub struct CycleReport {
    pub shows_checked: usize,
    pub shows_failed: usize,
    pub items_seen: usize,
    pub items_enqueued: usize,
}

pub struct EpisodeMonitor {
    shows: Vec<ShowConfig>,
    output_base: PathBuf,
    catalog: Arc<dyn CatalogSource>,
    matcher: Arc<EpisodeMatcher>,
    history: Arc<DownloadHistory>,
    queue: DownloadQueue,
}

impl EpisodeMonitor {
    pub fn new(
        shows: Vec<ShowConfig>,
        output_base: PathBuf,
        catalog: Arc<dyn CatalogSource>,
        matcher: Arc<EpisodeMatcher>,
        history: Arc<DownloadHistory>,
        queue: DownloadQueue,
    ) -> Self {
        Self {
            shows,
            output_base,
            catalog,
            matcher,
            history,
            queue,
        }
    }

    /// Run one discovery cycle over all configured shows.
    ///
    /// Idempotent: re-running without intervening downloads adds nothing,
    /// guaranteed by the history filter plus the queue's duplicate check.
    pub async fn check_for_new_episodes(&self) -> CycleReport {
        self.run_cycle(false).await
    }

    /// Discovery only: report what a cycle would enqueue without touching
    /// the queue.
    pub async fn preview_new_episodes(&self) -> CycleReport {
        self.run_cycle(true).await
    }

    async fn run_cycle(&self, dry_run: bool) -> CycleReport {
        info!("Checking for new episodes across {} shows", self.shows.len());
        let mut report = CycleReport::default();

        for show in &self.shows {
            report.shows_checked += 1;
            match self.check_show(show, dry_run, &mut report).await {
                Ok(()) => {}
                Err(e) => {
                    report.shows_failed += 1;
                    error!(show = %show.name, "Skipping show this cycle: {}", e);
                }
            }
        }

        info!(
            enqueued = report.items_enqueued,
            seen = report.items_seen,
            failed_shows = report.shows_failed,
            "Episode check completed"
        );
        report
    }

    async fn check_show(
        &self,
        show: &ShowConfig,
        dry_run: bool,
        report: &mut CycleReport,
    ) -> Result<(), crate::error::DiscoveryError> {
        debug!(show = %show.name, "Checking catalog");
        let items = self.catalog.fetch_items(&show.catalog_url).await?;
        report.items_seen += items.len();

        let mut new_items = 0usize;
        for item in items {
            if self.history.contains(&item.source_id).await {
                continue;
            }

            if dry_run {
                info!(show = %show.name, title = %item.title, "Would download");
            } else {
                let enriched = self.enrich(show, item).await;
                self.queue.enqueue(enriched, Priority::Normal);
            }
            new_items += 1;
            report.items_enqueued += 1;
        }

        if new_items > 0 {
            info!(show = %show.name, count = new_items, "Found new episodes");
        } else {
            debug!(show = %show.name, "No new episodes");
        }
        Ok(())
    }

    /// Attach a season/episode label when the matcher can produce one.
    /// Lookup failures are warnings; the item always proceeds.
    async fn enrich(&self, show: &ShowConfig, item: CatalogItem) -> EnrichedItem {
        let matched_label = match &show.metadata_url {
            Some(url) => match self.matcher.lookup(url, &item.title).await {
                Ok(label) => label,
                Err(e) => {
                    warn!(
                        show = %show.name,
                        title = %item.title,
                        "Metadata lookup failed, continuing unenriched: {}",
                        e
                    );
                    None
                }
            },
            None => None,
        };

        let output_dir = match &show.output_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => self.output_base.join(path),
            None => self.output_base.join(show.show_id()),
        };

        EnrichedItem {
            source_id: item.source_id,
            title: item.title,
            source_url: item.source_url,
            show_id: show.show_id(),
            show_name: show.name.clone(),
            air_date: item.air_date,
            matched_label,
            output_dir,
        }
    }
}
