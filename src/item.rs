//! The canonical per-item model flowing through the pipeline.

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A discovered item after best-effort enrichment, ready for the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedItem {
    pub source_id: String,
    pub title: String,
    pub source_url: String,
    pub show_id: String,
    pub show_name: String,
    #[serde(default)]
    pub air_date: Option<NaiveDate>,
    /// `SxxEyy` label from the matcher; absent when no match was found.
    #[serde(default)]
    pub matched_label: Option<String>,
    /// Resolved output directory for this item's show.
    pub output_dir: PathBuf,
}

impl EnrichedItem {
    /// Queue-entry identity: unique per (show, source item).
    pub fn entry_id(&self) -> String {
        format!("{}-{}", self.show_id, self.source_id)
    }
}
