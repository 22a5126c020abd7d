//! Persisted download history.
//!
//! A flat JSON document mapping `source_id → {show, title, downloaded_at}`,
//! rewritten wholesale and atomically on every record. All mutation funnels
//! through one async mutex so interleaved records cannot lose updates. A
//! record exists if and only if the item's fetch actually succeeded.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::PersistenceError;
use crate::item::EnrichedItem;
use crate::persist::atomic_write;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub show: String,
    pub title: String,
    pub downloaded_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryDoc {
    #[serde(default)]
    episodes: HashMap<String, HistoryEntry>,
}

pub struct DownloadHistory {
    path: PathBuf,
    doc: Mutex<HistoryDoc>,
}

/// Extract a source id from the trailing numeric path segment of a URL.
///
/// `https://catalog.example/video/4032087/` → `Some("4032087")`. Returns
/// `None` for URLs without a trailing numeric segment; malformed input never
/// panics.
pub fn extract_source_id(url: &str) -> Option<String> {
    let re = Regex::new(r"/(\d+)/?$").expect("valid source-id regex");
    re.captures(url).map(|caps| caps[1].to_string())
}

impl DownloadHistory {
    /// Open the history at `path`. Missing or malformed stores are treated
    /// as empty, never an error.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let doc = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(doc) => doc,
                Err(e) => {
                    tracing::warn!("Malformed history at {:?}, starting empty: {}", path, e);
                    HistoryDoc::default()
                }
            },
            Err(_) => HistoryDoc::default(),
        };

        Self {
            path,
            doc: Mutex::new(doc),
        }
    }

    pub async fn contains(&self, source_id: &str) -> bool {
        if source_id.is_empty() {
            return false;
        }
        let doc = self.doc.lock().await;
        doc.episodes.contains_key(source_id)
    }

    /// Record a successful download. The id comes from the item's explicit
    /// `source_id`, falling back to the trailing numeric segment of its URL;
    /// if neither yields an id the record is skipped with a warning.
    pub async fn record(&self, item: &EnrichedItem) -> Result<(), PersistenceError> {
        let id = if !item.source_id.is_empty() {
            Some(item.source_id.clone())
        } else {
            extract_source_id(&item.source_url)
        };

        let Some(id) = id else {
            tracing::warn!("Could not derive a source id for item: {}", item.title);
            return Ok(());
        };

        let mut doc = self.doc.lock().await;
        doc.episodes.insert(
            id,
            HistoryEntry {
                show: item.show_name.clone(),
                title: item.title.clone(),
                downloaded_at: Utc::now(),
            },
        );
        self.save(&doc)
    }

    pub async fn len(&self) -> usize {
        self.doc.lock().await.episodes.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn save(&self, doc: &HistoryDoc) -> Result<(), PersistenceError> {
        let json = serde_json::to_vec_pretty(doc)
            .map_err(|e| PersistenceError::encode(&self.path, e))?;
        atomic_write(&self.path, &json)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
