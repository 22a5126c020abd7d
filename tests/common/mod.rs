//! Shared fixtures: a scriptable fetcher and in-memory pipeline stubs.
//!
//! Timing-sensitive tests run under a paused tokio clock, so the fetcher's
//! latency and the queue's retry delay elapse in virtual time.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;

use fetcharr::catalog::{CatalogItem, CatalogSource};
use fetcharr::error::{DiscoveryError, DownloadError, MatchError};
use fetcharr::fetcher::{FetchOutcome, FetchRequest, MediaFetcher};
use fetcharr::history::DownloadHistory;
use fetcharr::item::EnrichedItem;
use fetcharr::metadata::{EpisodeListing, MetadataProvider};
use fetcharr::queue::{DownloadQueue, QueueSettings, QueueSnapshot};

/// Fetcher that sleeps for a fixed virtual latency, fails a scripted number
/// of times per URL, and records every request it sees.
pub struct ScriptedFetcher {
    latency: Duration,
    failures: Mutex<HashMap<String, u32>>,
    requests: Mutex<Vec<FetchRequest>>,
    active: AtomicUsize,
    peak_active: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            failures: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            peak_active: AtomicUsize::new(0),
        }
    }

    /// The next `times` fetches of `url` fail with a nonzero exit status.
    pub fn fail_times(&self, url: &str, times: u32) {
        self.failures.lock().insert(url.to_string(), times);
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requests.lock().iter().map(|r| r.url.clone()).collect()
    }

    pub fn requested_stems(&self) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .map(|r| r.file_stem.clone())
            .collect()
    }

    /// Highest number of concurrently running fetches observed.
    pub fn peak_active(&self) -> usize {
        self.peak_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaFetcher for ScriptedFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome, DownloadError> {
        self.requests.lock().push(request.clone());

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_active.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        let fail = {
            let mut failures = self.failures.lock();
            match failures.get_mut(&request.url) {
                Some(n) if *n > 0 => {
                    *n -= 1;
                    true
                }
                _ => false,
            }
        };

        if fail {
            return Err(DownloadError::ExitStatus {
                code: Some(1),
                stderr: "network reset by peer".to_string(),
            });
        }

        Ok(FetchOutcome {
            output_path: request
                .output_dir
                .join(format!("{}.mp4", request.file_stem)),
        })
    }
}

/// Catalog stub serving a fixed listing per URL; unknown URLs fail.
pub struct MapCatalog {
    listings: HashMap<String, Vec<CatalogItem>>,
}

impl MapCatalog {
    pub fn new() -> Self {
        Self {
            listings: HashMap::new(),
        }
    }

    pub fn with_listing(mut self, url: &str, items: Vec<CatalogItem>) -> Self {
        self.listings.insert(url.to_string(), items);
        self
    }
}

#[async_trait]
impl CatalogSource for MapCatalog {
    async fn fetch_items(&self, catalog_url: &str) -> Result<Vec<CatalogItem>, DiscoveryError> {
        self.listings
            .get(catalog_url)
            .cloned()
            .ok_or_else(|| DiscoveryError::InvalidListing(format!("no listing: {catalog_url}")))
    }
}

/// Provider stub serving one fixed listing for every show.
pub struct StaticProvider {
    pub listing: Vec<EpisodeListing>,
}

#[async_trait]
impl MetadataProvider for StaticProvider {
    async fn fetch_listing(
        &self,
        _metadata_url: &str,
    ) -> Result<Vec<EpisodeListing>, MatchError> {
        Ok(self.listing.clone())
    }
}

pub fn catalog_item(source_id: &str, title: &str) -> CatalogItem {
    CatalogItem {
        source_id: source_id.to_string(),
        title: title.to_string(),
        source_url: format!("https://catalog.example/video/{source_id}/"),
        air_date: None,
    }
}

pub fn enriched_item(show_id: &str, source_id: &str, title: &str) -> EnrichedItem {
    EnrichedItem {
        source_id: source_id.to_string(),
        title: title.to_string(),
        source_url: format!("https://catalog.example/video/{source_id}/"),
        show_id: show_id.to_string(),
        show_name: show_id.replace('-', " "),
        air_date: None,
        matched_label: None,
        output_dir: PathBuf::from("downloads").join(show_id),
    }
}

pub struct QueueHarness {
    pub dir: TempDir,
    pub fetcher: Arc<ScriptedFetcher>,
    pub history: Arc<DownloadHistory>,
    pub queue: DownloadQueue,
}

impl QueueHarness {
    pub fn new(settings: QueueSettings, latency: Duration) -> Self {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(ScriptedFetcher::new(latency));
        let history = Arc::new(DownloadHistory::open(dir.path().join("downloaded.json")));
        let queue = DownloadQueue::new(
            settings,
            fetcher.clone() as Arc<dyn MediaFetcher>,
            Arc::clone(&history),
        );

        Self {
            dir,
            fetcher,
            history,
            queue,
        }
    }

    /// Wait (in virtual time) until `expected` entries have finished, in
    /// either ring. Entries sitting in a retry delay count as unfinished.
    pub async fn wait_settled(&self, expected: usize) -> QueueSnapshot {
        loop {
            let snapshot = self.queue.status();
            if snapshot.completed + snapshot.failed >= expected {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}
