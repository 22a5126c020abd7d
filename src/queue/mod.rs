//! Priority download queue with bounded concurrency and retry.
//!
//! The queue owns all entry state behind a single mutex: queued entries
//! (kept sorted), the counted active set that enforces the concurrency
//! limit, and bounded completed/failed summary rings. Draining is reactive —
//! every completion or failure frees its slot and immediately re-drains, so
//! no external polling is needed. A failed entry re-enters the *front* of
//! the queue after a fixed delay via a spawned timer task, which the drain
//! path never awaits.
//!
//! Lifecycle signals are broadcast as [`QueueEvent`]s; consumers may also
//! poll [`DownloadQueue::status`] for a snapshot.

mod entry;

pub use entry::{EntryStatus, Priority, QueueEntry};

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::fetcher::{FetchRequest, MediaFetcher};
use crate::history::DownloadHistory;
use crate::item::EnrichedItem;
use crate::naming::{self, NamingInput, NamingStrategy};

/// Bound on the completed/failed summary rings.
const MAX_SUMMARY_SIZE: usize = 1000;

/// Bound on the per-list detail in a [`QueueSnapshot`].
const SNAPSHOT_LIST_LIMIT: usize = 50;

#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub max_concurrent: usize,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub naming: NamingStrategy,
    pub quality: String,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            max_retries: 3,
            retry_delay: Duration::from_secs(300),
            naming: NamingStrategy::default(),
            quality: "best".to_string(),
        }
    }
}

/// Discrete lifecycle signals, broadcast to any subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum QueueEvent {
    Enqueued {
        id: String,
        title: String,
    },
    Started {
        id: String,
    },
    Completed {
        id: String,
    },
    Failed {
        id: String,
        error: String,
    },
    StatusChanged {
        queued: usize,
        active: usize,
        completed: usize,
        failed: usize,
    },
}

/// Point-in-time view of the queue for dashboards and notifiers.
#[derive(Debug, Clone, Serialize)]
pub struct QueueSnapshot {
    pub queued: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
    pub queued_entries: Vec<EntrySummary>,
    pub active_entries: Vec<EntrySummary>,
    pub completed_entries: Vec<EntrySummary>,
    pub failed_entries: Vec<EntrySummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntrySummary {
    pub id: String,
    pub title: String,
    pub status: EntryStatus,
    pub priority: Priority,
    pub retry_count: u32,
    pub last_error: Option<String>,
}

impl From<&QueueEntry> for EntrySummary {
    fn from(entry: &QueueEntry) -> Self {
        Self {
            id: entry.id.clone(),
            title: entry.item.title.clone(),
            status: entry.status,
            priority: entry.priority,
            retry_count: entry.retry_count,
            last_error: entry.last_error.clone(),
        }
    }
}

#[derive(Default)]
struct QueueState {
    queued: Vec<QueueEntry>,
    active: HashMap<String, QueueEntry>,
    completed: VecDeque<QueueEntry>,
    failed: VecDeque<QueueEntry>,
}

impl QueueState {
    fn sort(&mut self) {
        self.queued.sort_by(|a, b| {
            b.priority
                .rank()
                .cmp(&a.priority.rank())
                .then(a.added_at.cmp(&b.added_at))
        });
    }

    fn contains(&self, id: &str) -> bool {
        self.active.contains_key(id) || self.queued.iter().any(|e| e.id == id)
    }
}

struct Inner {
    state: Mutex<QueueState>,
    settings: QueueSettings,
    fetcher: Arc<dyn MediaFetcher>,
    history: Arc<DownloadHistory>,
    event_tx: broadcast::Sender<QueueEvent>,
}

#[derive(Clone)]
pub struct DownloadQueue {
    inner: Arc<Inner>,
}

impl DownloadQueue {
    pub fn new(
        settings: QueueSettings,
        fetcher: Arc<dyn MediaFetcher>,
        history: Arc<DownloadHistory>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState::default()),
                settings,
                fetcher,
                history,
                event_tx,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Insert an item unless an entry with the same id is already queued or
    /// active; duplicates are a silent no-op. Triggers a sort and a drain.
    pub fn enqueue(&self, item: EnrichedItem, priority: Priority) {
        let entry = QueueEntry::new(item, priority);

        {
            let mut state = self.inner.state.lock();
            if state.contains(&entry.id) {
                info!(id = %entry.id, "Item already queued or active, skipping");
                return;
            }

            info!(id = %entry.id, title = %entry.item.title, "Added to queue");
            self.inner.emit(QueueEvent::Enqueued {
                id: entry.id.clone(),
                title: entry.item.title.clone(),
            });

            state.queued.push(entry);
            state.sort();
        }

        self.inner.emit_status();
        Inner::drain(&self.inner);
    }

    /// Remove a not-yet-active entry. Entries already downloading are
    /// unaffected.
    pub fn cancel(&self, id: &str) -> Option<QueueEntry> {
        let removed = {
            let mut state = self.inner.state.lock();
            let index = state.queued.iter().position(|e| e.id == id)?;
            Some(state.queued.remove(index))
        };
        if removed.is_some() {
            self.inner.emit_status();
        }
        removed
    }

    pub fn clear_completed(&self) {
        self.inner.state.lock().completed.clear();
        self.inner.emit_status();
    }

    pub fn clear_failed(&self) {
        self.inner.state.lock().failed.clear();
        self.inner.emit_status();
    }

    pub fn status(&self) -> QueueSnapshot {
        let state = self.inner.state.lock();
        QueueSnapshot {
            queued: state.queued.len(),
            active: state.active.len(),
            completed: state.completed.len(),
            failed: state.failed.len(),
            queued_entries: state
                .queued
                .iter()
                .take(SNAPSHOT_LIST_LIMIT)
                .map(EntrySummary::from)
                .collect(),
            active_entries: state
                .active
                .values()
                .take(SNAPSHOT_LIST_LIMIT)
                .map(EntrySummary::from)
                .collect(),
            completed_entries: state
                .completed
                .iter()
                .take(SNAPSHOT_LIST_LIMIT)
                .map(EntrySummary::from)
                .collect(),
            failed_entries: state
                .failed
                .iter()
                .take(SNAPSHOT_LIST_LIMIT)
                .map(EntrySummary::from)
                .collect(),
        }
    }
}

impl Inner {
    fn emit(&self, event: QueueEvent) {
        if self.event_tx.send(event).is_err() {
            tracing::trace!("No subscribers for queue event");
        }
    }

    fn emit_status(&self) {
        let state = self.state.lock();
        let event = QueueEvent::StatusChanged {
            queued: state.queued.len(),
            active: state.active.len(),
            completed: state.completed.len(),
            failed: state.failed.len(),
        };
        drop(state);
        self.emit(event);
    }

    /// Move head entries into the active set while capacity remains, then
    /// dispatch each as its own task. The active set only ever grows under
    /// the state lock with the capacity check, which is what keeps the
    /// concurrency invariant.
    fn drain(inner: &Arc<Inner>) {
        loop {
            let entry = {
                let mut state = inner.state.lock();
                if state.active.len() >= inner.settings.max_concurrent
                    || state.queued.is_empty()
                {
                    break;
                }
                let mut entry = state.queued.remove(0);
                entry.start();
                state.active.insert(entry.id.clone(), entry.clone());
                entry
            };

            info!(id = %entry.id, title = %entry.item.title, "Downloading");
            inner.emit(QueueEvent::Started {
                id: entry.id.clone(),
            });
            inner.emit_status();

            let task_inner = Arc::clone(inner);
            tokio::spawn(async move {
                Inner::run_entry(task_inner, entry).await;
            });
        }
    }

    async fn run_entry(inner: Arc<Inner>, mut entry: QueueEntry) {
        let request = FetchRequest {
            url: entry.item.source_url.clone(),
            output_dir: entry.item.output_dir.clone(),
            file_stem: naming::file_stem(
                inner.settings.naming,
                &NamingInput {
                    show_name: &entry.item.show_name,
                    title: &entry.item.title,
                    source_id: &entry.item.source_id,
                    label: entry.item.matched_label.as_deref(),
                    air_date: entry.item.air_date,
                },
            ),
            quality: inner.settings.quality.clone(),
        };

        let result = inner.fetcher.fetch(&request).await;

        match result {
            Ok(outcome) => {
                // History first: a completed entry without a record would
                // re-download on the next cycle, but the reverse is worse.
                if let Err(e) = inner.history.record(&entry.item).await {
                    error!(id = %entry.id, "Failed to record download history: {}", e);
                }

                info!(
                    id = %entry.id,
                    output = %outcome.output_path.display(),
                    "Download completed"
                );
                entry.complete();

                {
                    let mut state = inner.state.lock();
                    state.active.remove(&entry.id);
                    push_bounded(&mut state.completed, entry.clone());
                }

                inner.emit(QueueEvent::Completed { id: entry.id });
            }
            Err(e) => {
                warn!(id = %entry.id, error = %e, "Download failed");

                {
                    let mut state = inner.state.lock();
                    state.active.remove(&entry.id);
                }

                if entry.retry_count < inner.settings.max_retries {
                    entry.begin_retry(&e.to_string());
                    info!(
                        id = %entry.id,
                        attempt = entry.retry_count + 1,
                        of = inner.settings.max_retries + 1,
                        delay_secs = inner.settings.retry_delay.as_secs(),
                        "Retrying after delay"
                    );
                    Inner::schedule_retry(&inner, entry);
                } else {
                    entry.fail(&e.to_string());
                    let error = e.to_string();
                    {
                        let mut state = inner.state.lock();
                        push_bounded(&mut state.failed, entry.clone());
                    }
                    inner.emit(QueueEvent::Failed {
                        id: entry.id,
                        error,
                    });
                }
            }
        }

        inner.emit_status();
        // Free slot: let the next queued entry proceed without polling.
        Inner::drain(&inner);
    }

    /// Spawn the delayed re-enqueue. The timer runs outside the drain path,
    /// so a waiting retry never blocks other entries; under a paused test
    /// clock the delay elapses instantly.
    fn schedule_retry(inner: &Arc<Inner>, entry: QueueEntry) {
        let delay = inner.settings.retry_delay;
        let inner = Arc::clone(inner);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            Inner::requeue_front(&inner, entry);
        });
    }

    /// Re-enter a retrying entry at the front of the queue, ahead of fresh
    /// work (deliberate, see design notes).
    fn requeue_front(inner: &Arc<Inner>, mut entry: QueueEntry) {
        entry.requeue();
        {
            let mut state = inner.state.lock();
            state.queued.insert(0, entry);
        }
        inner.emit_status();
        Inner::drain(inner);
    }
}

fn push_bounded(ring: &mut VecDeque<QueueEntry>, entry: QueueEntry) {
    ring.push_front(entry);
    while ring.len() > MAX_SUMMARY_SIZE {
        ring.pop_back();
    }
}
