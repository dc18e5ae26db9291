//! Resource downloads into a workspace.
//!
//! Downloads run under a hard time bound and land in a hidden temporary file
//! next to their destination. Only a complete transfer is renamed into place,
//! and an existing file is never replaced.

use crate::env;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid download URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("download of {url} timed out after {}s", timeout.as_secs_f64())]
    Timeout { url: String, timeout: Duration },

    #[error("download of {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("download of {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("{} already exists in the workspace", path.display())]
    Exists { path: PathBuf },

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// A completed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedResource {
    pub url: Url,
    pub file_name: String,
    pub bytes_written: u64,
}

/// HTTP downloader with a per-transfer timeout.
#[derive(Debug, Clone)]
pub struct ResourceFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl ResourceFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client, timeout })
    }

    /// Parse `url` and download it into `directory`, naming the file after
    /// the last URL path segment.
    pub async fn fetch_into(&self, url: &str, directory: &Path) -> Result<FetchedResource, FetchError> {
        let url = parse_url(url)?;
        let file_name = file_name_for(&url);

        let bytes_written = self.fetch(&url, &directory.join(&file_name)).await?;

        Ok(FetchedResource {
            url,
            file_name,
            bytes_written,
        })
    }

    /// Stream `url` to `destination`, returning the number of bytes written.
    ///
    /// The whole transfer, headers included, must finish within the
    /// configured timeout. `destination` must not exist yet; on failure
    /// nothing is left at either the destination or the temporary path.
    pub async fn fetch(&self, url: &Url, destination: &Path) -> Result<u64, FetchError> {
        let io = |source| FetchError::Io {
            path: destination.to_path_buf(),
            source,
        };

        if tokio::fs::symlink_metadata(destination).await.is_ok() {
            return Err(FetchError::Exists {
                path: destination.to_path_buf(),
            });
        }

        let directory = destination
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let staged = tempfile::Builder::new()
            .prefix(env::staging::PARTIAL_DOWNLOAD_PREFIX)
            .tempfile_in(directory)
            .map_err(io)?;
        let mut file = tokio::fs::File::from_std(staged.reopen().map_err(io)?);

        debug!(
            "Downloading {} to {} via {}",
            url,
            destination.display(),
            staged.path().display()
        );

        let result = match tokio::time::timeout(self.timeout, self.transfer(url, &mut file, staged.path()))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                url: url.to_string(),
                timeout: self.timeout,
            }),
        };
        drop(file);

        // The staged file is deleted when `staged` drops on any error path.
        let bytes = match result {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Download of {} failed: {}", url, e);
                return Err(e);
            }
        };

        staged.persist_noclobber(destination).map_err(|e| {
            warn!("Could not move download into {}: {}", destination.display(), e.error);
            if e.error.kind() == std::io::ErrorKind::AlreadyExists {
                FetchError::Exists {
                    path: destination.to_path_buf(),
                }
            } else {
                io(e.error)
            }
        })?;

        info!("Downloaded {} ({} bytes)", url, bytes);
        Ok(bytes)
    }

    async fn transfer(
        &self,
        url: &Url,
        file: &mut tokio::fs::File,
        staged: &Path,
    ) -> Result<u64, FetchError> {
        let transport = |source| FetchError::Transport {
            url: url.to_string(),
            source,
        };
        let io = |source| FetchError::Io {
            path: staged.to_path_buf(),
            source,
        };

        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(transport)? {
            file.write_all(&chunk).await.map_err(io)?;
            written += chunk.len() as u64;
        }

        file.flush().await.map_err(io)?;
        file.sync_all().await.map_err(io)?;
        Ok(written)
    }
}

fn parse_url(raw: &str) -> Result<Url, FetchError> {
    let invalid = |reason: String| FetchError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme '{other}'"))),
    }
}

/// Workspace file name for a download: the last non-empty path segment,
/// percent-decoded, or a fixed fallback when the URL has none usable.
pub fn file_name_for(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(|segment| {
            urlencoding::decode(segment)
                .unwrap_or(Cow::Borrowed(segment))
                .chars()
                .map(|c| match c {
                    '/' | '\\' | '\0' => '_',
                    c => c,
                })
                .collect::<String>()
        })
        .filter(|name| !name.is_empty() && name != "." && name != "..")
        .unwrap_or_else(|| env::staging::FALLBACK_DOWNLOAD_NAME.to_string())
}
