//! End-to-end pipeline: discovery through enrichment, dedup, queueing, and
//! download, with stub catalog and metadata sources.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{catalog_item, MapCatalog, QueueHarness, StaticProvider};
use fetcharr::config::ShowConfig;
use fetcharr::history::DownloadHistory;
use fetcharr::item::EnrichedItem;
use fetcharr::metadata::{EpisodeListing, EpisodeMatcher, MatchCache};
use fetcharr::monitor::EpisodeMonitor;
use fetcharr::queue::QueueSettings;

fn show(name: &str, catalog_url: &str, metadata_url: Option<&str>) -> ShowConfig {
    ShowConfig {
        id: None,
        name: name.to_string(),
        catalog_url: catalog_url.to_string(),
        metadata_url: metadata_url.map(str::to_string),
        output_path: None,
    }
}

fn monitor_with(
    shows: Vec<ShowConfig>,
    catalog: MapCatalog,
    listing: Vec<EpisodeListing>,
    harness: &QueueHarness,
) -> EpisodeMonitor {
    let cache = Arc::new(MatchCache::open(
        harness.dir.path().join("match-cache.json"),
    ));
    let matcher = Arc::new(EpisodeMatcher::new(
        Arc::new(StaticProvider { listing }),
        cache,
    ));

    EpisodeMonitor::new(
        shows,
        harness.dir.path().to_path_buf(),
        Arc::new(catalog),
        matcher,
        Arc::clone(&harness.history),
        harness.queue.clone(),
    )
}

#[tokio::test(start_paused = true)]
async fn discovery_enriches_and_downloads() {
    let h = QueueHarness::new(QueueSettings::default(), Duration::from_secs(1));
    let catalog = MapCatalog::new().with_listing(
        "https://catalog.example/shows/doc72",
        vec![
            catalog_item("1001", "The Station Bento Shop"),
            catalog_item("1002", "Midnight Laundromat"),
        ],
    );
    let listing = vec![
        EpisodeListing {
            title: "The Station Bento Shop".into(),
            label: "S08E12".into(),
        },
        EpisodeListing {
            title: "Midnight Laundromat".into(),
            label: "S08E13".into(),
        },
    ];
    let monitor = monitor_with(
        vec![show(
            "Document 72 Hours",
            "https://catalog.example/shows/doc72",
            Some("https://metadata.example/series/document-72-hours"),
        )],
        catalog,
        listing,
        &h,
    );

    let report = monitor.check_for_new_episodes().await;
    assert_eq!(report.shows_checked, 1);
    assert_eq!(report.shows_failed, 0);
    assert_eq!(report.items_seen, 2);
    assert_eq!(report.items_enqueued, 2);

    let snapshot = h.wait_settled(2).await;
    assert_eq!(snapshot.completed, 2);

    let stems = h.fetcher.requested_stems();
    assert!(stems.iter().any(|s| s.contains("S08E12")));
    assert!(stems.iter().any(|s| s.contains("S08E13")));
    assert_eq!(h.history.len().await, 2);
}

#[tokio::test(start_paused = true)]
async fn unmatched_title_downloads_with_fallback_name() {
    let h = QueueHarness::new(QueueSettings::default(), Duration::from_secs(1));
    let catalog = MapCatalog::new().with_listing(
        "https://catalog.example/shows/doc72",
        vec![catalog_item("1001", "A Title The Provider Never Heard Of")],
    );
    // Listing exists but has no entry for the item's title.
    let listing = vec![EpisodeListing {
        title: "Something Else Entirely".into(),
        label: "S01E01".into(),
    }];
    let monitor = monitor_with(
        vec![show(
            "Document 72 Hours",
            "https://catalog.example/shows/doc72",
            Some("https://metadata.example/series/document-72-hours"),
        )],
        catalog,
        listing,
        &h,
    );

    monitor.check_for_new_episodes().await;
    let snapshot = h.wait_settled(1).await;
    assert_eq!(snapshot.completed, 1);

    // No label, no air date: the stem falls back to the source id.
    let stems = h.fetcher.requested_stems();
    assert!(stems[0].contains("1001"), "stem was {:?}", stems[0]);
    assert!(h.history.contains("1001").await);
}

#[tokio::test(start_paused = true)]
async fn rerun_after_downloads_enqueues_nothing() {
    let h = QueueHarness::new(QueueSettings::default(), Duration::from_secs(1));
    let catalog = MapCatalog::new().with_listing(
        "https://catalog.example/shows/doc72",
        vec![catalog_item("1001", "Ep 1"), catalog_item("1002", "Ep 2")],
    );
    let monitor = monitor_with(
        vec![show(
            "Document 72 Hours",
            "https://catalog.example/shows/doc72",
            None,
        )],
        catalog,
        vec![],
        &h,
    );

    let first = monitor.check_for_new_episodes().await;
    assert_eq!(first.items_enqueued, 2);
    h.wait_settled(2).await;

    let second = monitor.check_for_new_episodes().await;
    assert_eq!(second.items_seen, 2);
    assert_eq!(second.items_enqueued, 0);
    assert_eq!(h.fetcher.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn dead_catalog_skips_only_that_show() {
    let h = QueueHarness::new(QueueSettings::default(), Duration::from_secs(1));
    // Only the second show has a listing; the first errors.
    let catalog = MapCatalog::new().with_listing(
        "https://catalog.example/shows/journeys",
        vec![catalog_item("2001", "Hokkaido by Rail")],
    );
    let monitor = monitor_with(
        vec![
            show(
                "Document 72 Hours",
                "https://catalog.example/shows/doc72",
                None,
            ),
            show(
                "Journeys in Japan",
                "https://catalog.example/shows/journeys",
                None,
            ),
        ],
        catalog,
        vec![],
        &h,
    );

    let report = monitor.check_for_new_episodes().await;
    assert_eq!(report.shows_checked, 2);
    assert_eq!(report.shows_failed, 1);
    assert_eq!(report.items_enqueued, 1);

    let snapshot = h.wait_settled(1).await;
    assert_eq!(snapshot.completed, 1);
    assert!(h.history.contains("2001").await);
}

#[tokio::test(start_paused = true)]
async fn items_already_in_history_are_not_requeued() {
    let h = QueueHarness::new(QueueSettings::default(), Duration::from_secs(1));

    // Seed the history as a previous run would have left it.
    let seeded = DownloadHistory::open(h.dir.path().join("downloaded.json"));
    seeded
        .record(&EnrichedItem {
            source_id: "1001".into(),
            title: "Ep 1".into(),
            source_url: "https://catalog.example/video/1001/".into(),
            show_id: "document-72-hours".into(),
            show_name: "Document 72 Hours".into(),
            air_date: None,
            matched_label: None,
            output_dir: h.dir.path().to_path_buf(),
        })
        .await
        .unwrap();

    let history = Arc::new(DownloadHistory::open(h.dir.path().join("downloaded.json")));
    let catalog = MapCatalog::new().with_listing(
        "https://catalog.example/shows/doc72",
        vec![catalog_item("1001", "Ep 1"), catalog_item("1002", "Ep 2")],
    );
    let cache = Arc::new(MatchCache::open(h.dir.path().join("match-cache.json")));
    let matcher = Arc::new(EpisodeMatcher::new(
        Arc::new(StaticProvider { listing: vec![] }),
        cache,
    ));
    let monitor = EpisodeMonitor::new(
        vec![show(
            "Document 72 Hours",
            "https://catalog.example/shows/doc72",
            None,
        )],
        h.dir.path().to_path_buf(),
        Arc::new(catalog),
        matcher,
        history,
        h.queue.clone(),
    );

    let report = monitor.check_for_new_episodes().await;
    assert_eq!(report.items_seen, 2);
    assert_eq!(report.items_enqueued, 1);

    h.wait_settled(1).await;
    assert_eq!(h.fetcher.requested_urls(), vec!["https://catalog.example/video/1002/"]);
}
