//! Persisted match cache: `show_slug → normalized title → SxxEyy label`.
//!
//! The cache only ever grows within a run; a populated entry is treated as
//! durable truth. The whole document is rewritten atomically (temp file +
//! rename) on each update, and all mutation funnels through one async mutex
//! so concurrent lookups cannot interleave writes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::PersistenceError;
use crate::persist::atomic_write;

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheDoc {
    #[serde(default)]
    shows: HashMap<String, HashMap<String, String>>,
}

pub struct MatchCache {
    path: PathBuf,
    doc: Mutex<CacheDoc>,
}

impl MatchCache {
    /// Open the cache at `path`. A missing or malformed document is treated
    /// as empty; this is never an error.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let doc = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(doc) => doc,
                Err(e) => {
                    tracing::warn!("Malformed match cache at {:?}, starting empty: {}", path, e);
                    CacheDoc::default()
                }
            },
            Err(_) => CacheDoc::default(),
        };

        Self {
            path,
            doc: Mutex::new(doc),
        }
    }

    /// Cached label for `(show_slug, normalized_title)`, if any.
    pub async fn get(&self, show_slug: &str, normalized_title: &str) -> Option<String> {
        let doc = self.doc.lock().await;
        doc.shows.get(show_slug)?.get(normalized_title).cloned()
    }

    /// Insert a full listing for one show in a single write. Existing entries
    /// for the show are kept; the cache grows monotonically.
    pub async fn insert_listing(
        &self,
        show_slug: &str,
        entries: impl IntoIterator<Item = (String, String)>,
    ) -> Result<(), PersistenceError> {
        let mut doc = self.doc.lock().await;
        let show = doc.shows.entry(show_slug.to_string()).or_default();
        for (title, label) in entries {
            show.insert(title, label);
        }
        self.save(&doc)
    }

    fn save(&self, doc: &CacheDoc) -> Result<(), PersistenceError> {
        let json = serde_json::to_vec_pretty(doc)
            .map_err(|e| PersistenceError::encode(&self.path, e))?;
        atomic_write(&self.path, &json)
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
