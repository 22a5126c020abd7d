//! Media fetcher: hands a download off to yt-dlp.
//!
//! The queue only sees the [`MediaFetcher`] trait; the bundled
//! [`YtDlpFetcher`] runs the binary with `--continue` so an interrupted
//! transfer for the same output path resumes idempotently. A watchdog timeout
//! bounds each invocation — the original tooling could hang forever on a
//! stalled transfer — and a timeout is classified as a retryable
//! [`DownloadError::Timeout`].

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::DownloadError;

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    /// Output directory for the file.
    pub output_dir: PathBuf,
    /// Filename stem; the tool appends the container extension.
    pub file_stem: String,
    /// Format selector passed through to the tool.
    pub quality: String,
}

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// The file the tool produced.
    pub output_path: PathBuf,
}

#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome, DownloadError>;
}

/// yt-dlp process wrapper.
pub struct YtDlpFetcher {
    binary: PathBuf,
    timeout: Duration,
}

impl YtDlpFetcher {
    pub fn new(binary: PathBuf, timeout: Duration) -> Self {
        Self { binary, timeout }
    }

    /// Locate the binary: explicit config path, or discovery on PATH.
    pub fn discover(
        configured: Option<&Path>,
        timeout: Duration,
    ) -> Result<Self, which::Error> {
        let binary = match configured {
            Some(path) => path.to_path_buf(),
            None => which::which("yt-dlp")?,
        };
        Ok(Self::new(binary, timeout))
    }

    /// Report the tool's version, verifying it can actually run.
    pub async fn version(&self) -> Result<String, DownloadError> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            return Err(DownloadError::ExitStatus {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome, DownloadError> {
        std::fs::create_dir_all(&request.output_dir)?;

        let template = request
            .output_dir
            .join(format!("{}.%(ext)s", request.file_stem));

        tracing::info!(
            url = %request.url,
            output = %template.display(),
            "Invoking yt-dlp"
        );

        let mut command = Command::new(&self.binary);
        command
            .arg(&request.url)
            .arg("-f")
            .arg(&request.quality)
            .arg("-o")
            .arg(&template)
            .arg("--continue")
            .arg("--no-progress")
            .arg("--embed-subs")
            .arg("--sub-lang")
            .arg("en")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // kill_on_drop reaps the child if the watchdog fires.
        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(result) => result?,
            Err(_) => return Err(DownloadError::Timeout(self.timeout)),
        };

        if !output.status.success() {
            return Err(DownloadError::ExitStatus {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        // The tool picks the extension, so locate what it actually wrote.
        let produced = std::fs::read_dir(&request.output_dir)?
            .filter_map(|entry| entry.ok())
            .find(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with(&request.file_stem)
            });

        match produced {
            Some(entry) => Ok(FetchOutcome {
                output_path: entry.path(),
            }),
            None => Err(DownloadError::OutputMissing(template)),
        }
    }
}
