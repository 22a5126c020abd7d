use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::item::EnrichedItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Normal,
    Low,
}

impl Priority {
    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Normal => 2,
            Priority::Low => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Queued,
    Downloading,
    Completed,
    Failed,
    Retrying,
}

/// One item's pending or active download.
///
/// Lifecycle: `Queued → Downloading → {Completed | Failed}`, with a bounded
/// `Retrying → Queued` loop in between. Mutated only by the queue itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: String,
    pub item: EnrichedItem,
    pub priority: Priority,
    pub status: EntryStatus,
    pub added_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub last_error: Option<String>,
}

impl QueueEntry {
    pub fn new(item: EnrichedItem, priority: Priority) -> Self {
        Self {
            id: item.entry_id(),
            item,
            priority,
            status: EntryStatus::Queued,
            added_at: Utc::now(),
            started_at: None,
            completed_at: None,
            failed_at: None,
            retry_count: 0,
            last_error: None,
        }
    }

    pub fn start(&mut self) {
        self.status = EntryStatus::Downloading;
        self.started_at = Some(Utc::now());
    }

    pub fn complete(&mut self) {
        self.status = EntryStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Record a failure and begin the retry delay. Caller must have verified
    /// the retry budget first.
    pub fn begin_retry(&mut self, error: &str) {
        self.retry_count += 1;
        self.status = EntryStatus::Retrying;
        self.last_error = Some(error.to_string());
        self.failed_at = Some(Utc::now());
    }

    /// The retry delay elapsed; the entry is back in the queue.
    pub fn requeue(&mut self) {
        self.status = EntryStatus::Queued;
    }

    pub fn fail(&mut self, error: &str) {
        self.status = EntryStatus::Failed;
        self.last_error = Some(error.to_string());
        self.failed_at = Some(Utc::now());
    }
}
