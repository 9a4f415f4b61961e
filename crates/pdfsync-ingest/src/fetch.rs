//! Fetch stage: keep a local copy of each remote document current
//!
//! A metadata-only request decides whether the cached copy is older than the remote
//! resource. Only stale or missing copies are downloaded again.

use chrono::DateTime;
use reqwest::header::LAST_MODIFIED;
use reqwest::{Client, Response};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::naming::cache_filename;
use crate::staleness::is_stale;
use pdfsync_common::files::{ensure_directory, modified_time, write_atomic};

/// Remote document as described by its metadata response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    pub url: String,
    /// `Last-Modified` of the remote resource, when the server sent a usable one
    pub remote_modified: Option<SystemTime>,
}

/// What the fetch stage did for one URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A fresh copy was downloaded and written
    Downloaded(PathBuf),
    /// The cached copy is at least as new as the remote one
    UpToDate(PathBuf),
    /// The download failed but an earlier copy exists and is used instead
    Reused(PathBuf),
}

impl FetchOutcome {
    pub fn local_path(&self) -> &Path {
        match self {
            FetchOutcome::Downloaded(p) | FetchOutcome::UpToDate(p) | FetchOutcome::Reused(p) => p,
        }
    }

    pub fn into_local_path(self) -> PathBuf {
        match self {
            FetchOutcome::Downloaded(p) | FetchOutcome::UpToDate(p) | FetchOutcome::Reused(p) => p,
        }
    }
}

/// Local cache of remote documents
pub struct FetchCache {
    client: Client,
    cache_dir: PathBuf,
}

impl FetchCache {
    /// Create the cache, creating `cache_dir` when missing.
    pub fn new(client: Client, cache_dir: impl Into<PathBuf>) -> pdfsync_common::Result<Self> {
        let cache_dir = cache_dir.into();
        ensure_directory(&cache_dir)?;

        Ok(Self { client, cache_dir })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Where `url` is cached, without touching the network
    pub fn local_path_for(&self, url: &str) -> Option<PathBuf> {
        cache_filename(url).map(|name| self.cache_dir.join(name))
    }

    /// Make sure a current copy of `url` exists locally and return where it is.
    pub async fn ensure_local(&self, url: &str) -> Result<FetchOutcome, FetchError> {
        let local_path = self
            .local_path_for(url)
            .ok_or_else(|| FetchError::BadUrl(url.to_string()))?;

        let record = self.head(url).await?;
        let disk_time = modified_time(&local_path)?;

        // A server that omits Last-Modified never invalidates an existing copy.
        let remote_time = record.remote_modified.unwrap_or(UNIX_EPOCH);

        if !is_stale(remote_time, disk_time) {
            info!(path = %local_path.display(), "skipping download");
            return Ok(FetchOutcome::UpToDate(local_path));
        }

        match self.download(url).await {
            Ok(bytes) => {
                write_atomic(&local_path, &bytes)?;
                info!(path = %local_path.display(), bytes = bytes.len(), "downloaded");
                Ok(FetchOutcome::Downloaded(local_path))
            },
            Err(reason) if disk_time.is_some() => {
                warn!(
                    url = %url,
                    path = %local_path.display(),
                    reason = %reason,
                    "download failed, keeping previous copy"
                );
                Ok(FetchOutcome::Reused(local_path))
            },
            Err(reason) => Err(FetchError::NotCached {
                url: url.to_string(),
                path: local_path,
                reason,
            }),
        }
    }

    /// Metadata-only request
    async fn head(&self, url: &str) -> Result<SourceRecord, FetchError> {
        let unavailable = |reason: String| FetchError::Unavailable {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(unavailable(format!("HTTP {}", response.status())));
        }

        let remote_modified = last_modified(&response);
        if remote_modified.is_none() {
            debug!(url = %url, "No usable Last-Modified header");
        }

        Ok(SourceRecord {
            url: url.to_string(),
            remote_modified,
        })
    }

    /// Full download; the error is a human-readable reason
    async fn download(&self, url: &str) -> Result<Vec<u8>, String> {
        let response = self.client.get(url).send().await.map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }

        let bytes = response.bytes().await.map_err(|e| e.to_string())?;
        Ok(bytes.to_vec())
    }
}

fn last_modified(response: &Response) -> Option<SystemTime> {
    let value = response.headers().get(LAST_MODIFIED)?.to_str().ok()?;
    parse_http_date(value)
}

/// Parse an HTTP date (`Wed, 21 Oct 2015 07:28:00 GMT`).
pub fn parse_http_date(value: &str) -> Option<SystemTime> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(SystemTime::from)
}
