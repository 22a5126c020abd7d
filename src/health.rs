//! Operational health checks.
//!
//! A fixed set of independent probes, each isolated so one failure never
//! aborts the rest: disk usage, catalog reachability, fetch-tool presence,
//! metadata-provider reachability, output-directory writability,
//! configuration shape, and service-port availability. Overall health is
//! the conjunction of every probe. Reports are recomputed fresh on each
//! call and never persisted.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Config;
use crate::fetcher::YtDlpFetcher;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const DISK_USED_THRESHOLD: u8 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    pub healthy: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            healthy: true,
            message: message.into(),
            details: None,
            error: None,
        }
    }

    fn fail(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            healthy: false,
            message: message.into(),
            details: None,
            error: Some(error.into()),
        }
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub timestamp: DateTime<Utc>,
    pub overall: HealthStatus,
    pub checks: BTreeMap<String, ProbeResult>,
}

pub struct HealthMonitor {
    config: Config,
    config_path: Option<PathBuf>,
    client: reqwest::Client,
}

impl HealthMonitor {
    pub fn new(config: Config, config_path: Option<PathBuf>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}", e);
                reqwest::Client::new()
            });

        Self {
            config,
            config_path,
            client,
        }
    }

    /// Run every probe and aggregate. Overall health is `Healthy` iff all
    /// probes pass.
    pub async fn check(&self) -> HealthReport {
        let mut checks = BTreeMap::new();

        checks.insert(
            "disk_space".to_string(),
            disk_usage_probe(&self.config.downloads.output_dir),
        );
        checks.insert("catalog".to_string(), self.reachability_probe(catalog_origin(&self.config), "catalog source").await);
        checks.insert("fetch_tool".to_string(), self.fetch_tool_probe().await);
        checks.insert(
            "metadata_provider".to_string(),
            self.reachability_probe(metadata_origin(&self.config), "metadata provider")
                .await,
        );
        checks.insert(
            "output_dir".to_string(),
            writability_probe(&self.config.downloads.output_dir),
        );
        checks.insert("config".to_string(), self.config_probe());
        checks.insert("port".to_string(), port_probe(self.config.service.port).await);

        let overall = if checks.values().all(|c| c.healthy) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };

        HealthReport {
            timestamp: Utc::now(),
            overall,
            checks,
        }
    }

    async fn reachability_probe(&self, origin: Option<String>, what: &str) -> ProbeResult {
        let Some(origin) = origin else {
            return ProbeResult::ok(format!("No {} configured", what));
        };

        match self.client.get(&origin).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() || status.is_redirection() {
                    ProbeResult::ok(format!("{} reachable", origin))
                        .with_details(serde_json::json!({ "status": status.as_u16() }))
                } else {
                    ProbeResult::fail(
                        format!("{} returned status {}", origin, status),
                        status.to_string(),
                    )
                }
            }
            Err(e) => ProbeResult::fail(format!("{} not reachable", origin), e.to_string()),
        }
    }

    async fn fetch_tool_probe(&self) -> ProbeResult {
        let fetcher = match YtDlpFetcher::discover(
            self.config.tools.ytdlp_path.as_deref(),
            PROBE_TIMEOUT,
        ) {
            Ok(f) => f,
            Err(e) => {
                return ProbeResult::fail("yt-dlp not found on PATH", e.to_string());
            }
        };

        match fetcher.version().await {
            Ok(version) => ProbeResult::ok(format!("yt-dlp available: {}", version))
                .with_details(serde_json::json!({ "version": version })),
            Err(e) => ProbeResult::fail("yt-dlp not available or not working", e.to_string()),
        }
    }

    fn config_probe(&self) -> ProbeResult {
        if let Some(path) = &self.config_path {
            if !path.exists() {
                return ProbeResult::fail(
                    format!("Config file not found: {}", path.display()),
                    "configuration missing",
                );
            }
        }

        let count = self.config.shows.len();
        ProbeResult::ok(format!("Configuration loaded: {} shows configured", count))
            .with_details(serde_json::json!({ "show_count": count }))
    }
}

fn catalog_origin(config: &Config) -> Option<String> {
    config.shows.first().and_then(|s| origin_of(&s.catalog_url))
}

fn metadata_origin(config: &Config) -> Option<String> {
    config
        .shows
        .iter()
        .find_map(|s| s.metadata_url.as_deref())
        .and_then(origin_of)
}

/// Reduce a URL to its `scheme://host[:port]` origin.
fn origin_of(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    match parsed.port() {
        Some(port) => Some(format!("{}://{}:{}", parsed.scheme(), host, port)),
        None => Some(format!("{}://{}", parsed.scheme(), host)),
    }
}

/// Healthy while used space stays under 90%.
fn evaluate_disk_usage(used_percent: u8) -> ProbeResult {
    ProbeResult {
        healthy: used_percent < DISK_USED_THRESHOLD,
        message: format!("Disk usage: {}%", used_percent),
        details: Some(serde_json::json!({ "used_percent": used_percent })),
        error: None,
    }
}

#[cfg(unix)]
fn disk_usage_probe(path: &Path) -> ProbeResult {
    // Walk up to the nearest existing ancestor so the probe works before the
    // downloads directory is created.
    let mut target = path;
    while !target.exists() {
        match target.parent() {
            Some(parent) => target = parent,
            None => break,
        }
    }
    let target = if target.as_os_str().is_empty() {
        Path::new(".")
    } else {
        target
    };

    match nix::sys::statvfs::statvfs(target) {
        Ok(stat) => {
            let total = stat.blocks();
            if total == 0 {
                return ProbeResult::fail("Disk space check failed", "zero-size filesystem");
            }
            let available = stat.blocks_available();
            let used_percent = (100 - (available * 100) / total) as u8;
            evaluate_disk_usage(used_percent)
        }
        Err(e) => ProbeResult::fail("Disk space check failed", e.to_string()),
    }
}

#[cfg(not(unix))]
fn disk_usage_probe(_path: &Path) -> ProbeResult {
    ProbeResult::ok("Disk usage check not supported on this platform")
}

/// Create-then-delete a probe file to verify the output directory is
/// writable.
fn writability_probe(path: &Path) -> ProbeResult {
    if let Err(e) = std::fs::create_dir_all(path) {
        return ProbeResult::fail(
            format!("Output directory cannot be created: {}", path.display()),
            e.to_string(),
        );
    }

    let probe = path.join(".health-check");
    match std::fs::write(&probe, b"probe") {
        Ok(()) => {
            let _ = std::fs::remove_file(&probe);
            ProbeResult::ok("Output directory accessible and writable")
                .with_details(serde_json::json!({ "path": path.display().to_string() }))
        }
        Err(e) => ProbeResult::fail(
            format!("Output directory not writable: {}", path.display()),
            e.to_string(),
        ),
    }
}

async fn port_probe(port: u16) -> ProbeResult {
    match tokio::net::TcpListener::bind(("127.0.0.1", port)).await {
        Ok(listener) => {
            drop(listener);
            ProbeResult::ok(format!("Port {} is available", port))
        }
        Err(e) => ProbeResult::fail(
            format!("Port {} is in use", port),
            e.to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn disk_usage_threshold() {
        let result = evaluate_disk_usage(95);
        assert!(!result.healthy);
        assert_eq!(result.message, "Disk usage: 95%");

        let result = evaluate_disk_usage(42);
        assert!(result.healthy);
    }

    #[test]
    fn origin_extraction() {
        assert_eq!(
            origin_of("https://catalog.example/shows/doc72?page=2"),
            Some("https://catalog.example".to_string())
        );
        assert_eq!(
            origin_of("http://localhost:8081/feed"),
            Some("http://localhost:8081".to_string())
        );
        assert_eq!(origin_of("not a url"), None);
    }

    #[test]
    fn writable_directory_passes_probe() {
        let dir = TempDir::new().unwrap();
        let result = writability_probe(dir.path());
        assert!(result.healthy);
        // Probe file must be cleaned up.
        assert!(!dir.path().join(".health-check").exists());
    }

    #[tokio::test]
    async fn busy_port_fails_probe() {
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let result = port_probe(port).await;
        assert!(!result.healthy);
        drop(listener);
    }

    #[tokio::test]
    async fn failing_probe_makes_overall_unhealthy() {
        // Keep the port busy so at least one probe fails regardless of the
        // host environment.
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.service.port = port;
        config.downloads.output_dir = dir.path().to_path_buf();

        let monitor = HealthMonitor::new(config, None);
        let report = monitor.check().await;

        assert_eq!(report.overall, HealthStatus::Unhealthy);
        assert!(!report.checks["port"].healthy);
        // Independent probes still ran.
        assert!(report.checks.contains_key("disk_space"));
        assert!(report.checks.contains_key("output_dir"));
        assert!(report.checks["output_dir"].healthy);
    }
}
