use async_trait::async_trait;
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use url::Url;

use crate::collaborators::{Downloader, run_tool};
use crate::errors::StageError;

// @module: Source acquisition (local files, or yt-dlp for web URLs)

const FORMAT_SELECTOR: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best";

/// Where a source string points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    Local(PathBuf),
    Remote(Url),
}

/// Classify a source as a local path or a remote URL
pub fn classify_source(source: &str) -> Result<SourceLocation, StageError> {
    let trimmed = source.trim();
    if trimmed.is_empty() {
        return Err(StageError::Download("Empty source".to_string()));
    }
    match Url::parse(trimmed) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(SourceLocation::Remote(url)),
        Ok(url) if url.scheme() == "file" => url
            .to_file_path()
            .map(SourceLocation::Local)
            .map_err(|_| StageError::Download(format!("Invalid file URL: {}", trimmed))),
        // Anything else, including Windows drive letters parsed as schemes, is a path
        _ => Ok(SourceLocation::Local(PathBuf::from(trimmed))),
    }
}

/// Local passthrough plus `yt-dlp` for http(s) URLs
#[derive(Debug, Clone)]
pub struct YtDlpDownloader {
    pub command: String,
    pub timeout: Duration,
}

impl Default for YtDlpDownloader {
    fn default() -> Self {
        Self {
            command: "yt-dlp".to_string(),
            timeout: Duration::from_secs(3_600),
        }
    }
}

impl YtDlpDownloader {
    async fn download(&self, url: &Url, dest_dir: &Path) -> Result<PathBuf, StageError> {
        info!("Downloading {}", url);
        let template = dest_dir.join("source.%(ext)s");

        let mut command = Command::new(&self.command);
        command
            .args(["--no-playlist", "--no-progress", "-f", FORMAT_SELECTOR, "--merge-output-format", "mp4"])
            .args(["--print", "after_move:filepath", "-o"])
            .arg(&template)
            .arg(url.as_str());

        let output = run_tool(command, &self.command, self.timeout)
            .await
            .map_err(StageError::Download)?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if let Some(printed) = stdout.lines().rev().map(str::trim).find(|l| !l.is_empty()) {
            let path = PathBuf::from(printed);
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return Ok(path);
            }
        }

        // Older yt-dlp versions do not support --print after_move
        let mut entries = tokio::fs::read_dir(dest_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.file_stem().is_some_and(|stem| stem == "source") {
                return Ok(path);
            }
        }
        Err(StageError::Download(format!("yt-dlp reported success but no file was written for {}", url)))
    }
}

#[async_trait]
impl Downloader for YtDlpDownloader {
    async fn fetch(&self, source: &str, dest_dir: &Path) -> Result<PathBuf, StageError> {
        match classify_source(source)? {
            SourceLocation::Remote(url) => self.download(&url, dest_dir).await,
            SourceLocation::Local(path) => {
                let metadata = tokio::fs::metadata(&path)
                    .await
                    .map_err(|e| StageError::Download(format!("Cannot read {}: {}", path.display(), e)))?;
                if !metadata.is_file() {
                    return Err(StageError::Download(format!("Not a file: {}", path.display())));
                }
                debug!("Using local media {}", path.display());
                Ok(path)
            }
        }
    }
}
