//! Error taxonomy for the discovery/download pipeline.
//!
//! Each variant family maps to a different isolation boundary: a
//! [`DiscoveryError`] skips one show for one cycle, a [`MatchError`] leaves one
//! item unenriched, a [`DownloadError`] drives the queue's retry policy, and a
//! [`PersistenceError`] is logged and surfaced through status/health rather
//! than propagated.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Catalog source unreachable or returned an unusable listing.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("catalog request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("catalog returned an invalid listing: {0}")]
    InvalidListing(String),
}

/// Metadata provider unreachable. A missing match is *not* an error; lookups
/// return `Ok(None)` in that case.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("metadata provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("metadata catalog URL is not recognized: {0}")]
    InvalidShowUrl(String),
}

/// Fetch-tool invocation failed. Retryable until the queue's retry budget is
/// exhausted.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("failed to launch fetch tool: {0}")]
    Launch(#[from] std::io::Error),

    #[error("fetch tool exited with {code:?}: {stderr}")]
    ExitStatus { code: Option<i32>, stderr: String },

    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("fetch reported success but output is missing: {0}")]
    OutputMissing(PathBuf),
}

/// Store write/read failure for the history or match-cache documents.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl PersistenceError {
    pub fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn encode(path: &std::path::Path, source: serde_json::Error) -> Self {
        Self::Encode {
            path: path.to_path_buf(),
            source,
        }
    }
}
