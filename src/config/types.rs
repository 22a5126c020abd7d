use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::naming::NamingStrategy;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub downloads: DownloadsConfig,

    #[serde(default)]
    pub shows: Vec<ShowConfig>,

    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Cron expression for scheduled episode checks.
    #[serde(default = "default_check_schedule")]
    pub check_schedule: String,

    /// Port reserved for the status/dashboard surface. Only probed by the
    /// health monitor; nothing here binds it.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_check_schedule() -> String {
    // Every 6 hours (sec min hour dom month dow)
    "0 0 */6 * * *".to_string()
}

fn default_port() -> u16 {
    8081
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            check_schedule: default_check_schedule(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadsConfig {
    /// Base directory for fetched files. Per-show `output_path` is resolved
    /// relative to this when it is not absolute.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before a failed entry is re-enqueued, in seconds.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Watchdog timeout around a single fetch-tool invocation, in seconds.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    #[serde(default)]
    pub naming: NamingStrategy,

    /// yt-dlp format selector, e.g. "best".
    #[serde(default = "default_quality")]
    pub quality: String,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_max_concurrent() -> usize {
    2
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    300
}

fn default_fetch_timeout_secs() -> u64 {
    3600
}

fn default_quality() -> String {
    "best".to_string()
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            max_concurrent: default_max_concurrent(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            naming: NamingStrategy::default(),
            quality: default_quality(),
        }
    }
}

impl DownloadsConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// One tracked series. Read-only during a discovery cycle.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShowConfig {
    /// Stable identifier used in queue-entry ids. Defaults to a slug of the
    /// name when omitted.
    #[serde(default)]
    pub id: Option<String>,

    pub name: String,

    /// Catalog listing URL for discovery.
    pub catalog_url: String,

    /// Metadata provider listing URL for season/episode matching. Optional:
    /// shows without one are downloaded unenriched.
    #[serde(default)]
    pub metadata_url: Option<String>,

    /// Output subdirectory override for this show.
    #[serde(default)]
    pub output_path: Option<PathBuf>,
}

impl ShowConfig {
    /// Stable show identifier: explicit `id`, or a lowercased slug of the
    /// name with whitespace collapsed to hyphens.
    pub fn show_id(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => self
                .name
                .to_lowercase()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join("-"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    /// Explicit yt-dlp binary path; discovered on PATH when unset.
    #[serde(default)]
    pub ytdlp_path: Option<PathBuf>,
}
