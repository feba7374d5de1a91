//! Resumable, self-verifying transfer of one remote URL to one local path.
//!
//! A download streams into a `.tmp` sibling of the final path, validating
//! sizes and timestamps against what the caller expected and what the server
//! claims. Transport failures are retried with exponential backoff, resuming
//! from the bytes already written whenever the server advertises range
//! support. Only a fully written, fully validated temporary file is ever
//! renamed onto the final path, so no observer sees a partial file there.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use futures_util::StreamExt;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, LAST_MODIFIED, RANGE};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::backoff::backoff;
use super::error::DownloadError;
use super::progress::ProgressReporter;
use crate::listing::truncate_to_minute;
use crate::mtime::set_mtime;

/// HTTP `Last-Modified` header format, e.g. `Mon, 06 Jan 2020 15:04:05 GMT`.
const LAST_MODIFIED_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Caller expectations for one download.
#[derive(Debug, Clone, Default)]
pub struct DownloadOptions {
    /// Size in bytes the download must produce, or 0 when not known up
    /// front. When non-zero, any `Content-Length` the server sends must
    /// agree with it; when zero, the server's `Content-Length` becomes the
    /// expectation and the final size is verified against that instead.
    pub expected_size: i64,

    /// Expected modification time, validated against any `Last-Modified`
    /// header (minute granularity). `None` accepts whatever the server says.
    pub expected_last_modified: Option<DateTime<Utc>>,

    /// Maximum number of retries after an error; 0 retries forever.
    pub max_retry: u32,
}

/// What a download accomplished, populated on success and failure alike.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResults {
    /// The size we expected, from the options or the `Content-Length` header.
    pub expected_size: i64,
    /// The size we actually wrote.
    pub actual_size: i64,
    /// The resolved modification time, from the options or the
    /// `Last-Modified` header (minute-truncated).
    pub last_modified: Option<DateTime<Utc>>,
    /// How many times we retried after an error.
    pub retries: u32,
}

/// A failed download: the typed error plus the best-known state at the
/// point of failure.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct DownloadFailure {
    /// Best-known download state when the error occurred.
    pub results: DownloadResults,
    /// What went wrong.
    #[source]
    pub source: DownloadError,
}

/// Per-download mutable state. Owned by exactly one in-flight download;
/// concurrent downloads use disjoint contexts and disjoint paths.
#[derive(Debug)]
struct DownloadContext {
    remote_url: String,
    opts: DownloadOptions,
    bytes_read: i64,
    cur_retry: u32,
    can_resume: bool,
}

/// Downloads `remote_url` to `local_path`.
///
/// Writes to `local_path` + `.tmp` in the same directory, retrying and
/// resuming per the options, then atomically replaces the final path and
/// stamps the resolved modification time (when known).
///
/// # Errors
///
/// Returns a [`DownloadFailure`] pairing the typed error with the best-known
/// [`DownloadResults`]. Transport errors are retried until the budget runs
/// out; validation, HTTP-status, and IO errors fail immediately.
pub async fn download_to_file(
    client: &Client,
    remote_url: &str,
    local_path: &Path,
    opts: DownloadOptions,
    cancel: &CancellationToken,
) -> Result<DownloadResults, DownloadFailure> {
    info!(
        url = %remote_url,
        size = opts.expected_size,
        max_retry = opts.max_retry,
        "starting download"
    );

    let mut ctx = DownloadContext {
        remote_url: remote_url.to_string(),
        opts,
        bytes_read: 0,
        cur_retry: 0,
        can_resume: false,
    };

    let tmp_path = tmp_path_for(local_path);
    debug!(path = %tmp_path.display(), "creating file");

    let transfer = async {
        let mut file = File::create(&tmp_path)
            .await
            .map_err(|error| DownloadError::io(&tmp_path, error))?;
        ctx.run(client, &mut file, &tmp_path, cancel).await?;
        file.flush()
            .await
            .map_err(|error| DownloadError::io(&tmp_path, error))
    }
    .await;

    // The results are worth having even when the transfer failed.
    let results = DownloadResults {
        expected_size: ctx.opts.expected_size,
        actual_size: ctx.bytes_read,
        last_modified: ctx.opts.expected_last_modified,
        retries: ctx.cur_retry,
    };

    if let Err(source) = transfer {
        return Err(DownloadFailure { results, source });
    }

    debug!(src = %tmp_path.display(), dst = %local_path.display(), "moving into place");
    if let Err(error) = tokio::fs::rename(&tmp_path, local_path).await {
        return Err(DownloadFailure {
            results,
            source: DownloadError::io(local_path, error),
        });
    }

    if let Some(stamp) = results.last_modified {
        debug!(time = %stamp, path = %local_path.display(), "setting file time");
        if let Err(error) = set_mtime(local_path, stamp) {
            return Err(DownloadFailure {
                results,
                source: DownloadError::io(local_path, error),
            });
        }
    }

    Ok(results)
}

impl DownloadContext {
    /// The retry loop: run attempts until one succeeds, a fatal error
    /// surfaces, or the retry budget is spent. `can_resume` and `bytes_read`
    /// carry across attempts.
    async fn run(
        &mut self,
        client: &Client,
        file: &mut File,
        tmp_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), DownloadError> {
        loop {
            if cancel.is_cancelled() {
                return Err(DownloadError::cancelled(&self.remote_url));
            }

            let error = match self.attempt(client, file, tmp_path, cancel).await {
                Ok(()) => return Ok(()),
                Err(error) if error.is_retryable() => error,
                Err(error) => return Err(error),
            };

            self.cur_retry += 1;
            if self.opts.max_retry > 0 && self.cur_retry >= self.opts.max_retry {
                return Err(DownloadError::MaxRetriesExceeded {
                    retries: self.cur_retry,
                    source: Box::new(error),
                });
            }

            let delay = backoff(self.cur_retry);
            debug!(
                backoff_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                bytes_read = self.bytes_read,
                cur_retry = self.cur_retry,
                max_retry = self.opts.max_retry,
                url = %self.remote_url,
                "pausing before retry"
            );
            tokio::select! {
                () = cancel.cancelled() => {
                    return Err(DownloadError::cancelled(&self.remote_url));
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One request/stream cycle: issue the GET (ranged when resuming),
    /// validate the response headers against expectations, and stream the
    /// body into the file.
    async fn attempt(
        &mut self,
        client: &Client,
        file: &mut File,
        tmp_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), DownloadError> {
        let mut request = client.get(&self.remote_url);
        if self.can_resume && self.bytes_read > 0 {
            debug!(
                start = self.bytes_read,
                total = self.opts.expected_size,
                cur_retry = self.cur_retry,
                url = %self.remote_url,
                "resuming download"
            );
            request = request.header(RANGE, format!("bytes={}-", self.bytes_read));
        } else {
            debug!(
                total = self.opts.expected_size,
                cur_retry = self.cur_retry,
                url = %self.remote_url,
                "requesting download"
            );
        }

        let response = request
            .send()
            .await
            .map_err(|error| DownloadError::request(&self.remote_url, error))?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::PARTIAL_CONTENT {
            return Err(DownloadError::http_status(&self.remote_url, status.as_u16()));
        }

        // Learn range support once. A response to a ranged request may omit
        // Accept-Ranges, so a known true is never re-read.
        if !self.can_resume {
            self.can_resume = response
                .headers()
                .get(ACCEPT_RANGES)
                .and_then(|value| value.to_str().ok())
                .is_some_and(|value| value == "bytes");
        }

        if !self.can_resume && self.bytes_read > 0 {
            // We wanted to resume but the server can't; drop what we have.
            file.seek(SeekFrom::Start(0))
                .await
                .map_err(|error| DownloadError::io(tmp_path, error))?;
            file.set_len(0)
                .await
                .map_err(|error| DownloadError::io(tmp_path, error))?;
            self.bytes_read = 0;
            debug!(url = %self.remote_url, "truncating partial file");
        }

        let content_length = parse_content_length(response.headers());
        if content_length > 0 {
            if self.can_resume {
                if self.opts.expected_size > 0 {
                    let expected_remaining = self.opts.expected_size - self.bytes_read;
                    if content_length != expected_remaining {
                        return Err(DownloadError::remaining_size_mismatch(
                            expected_remaining,
                            content_length,
                        ));
                    }
                } else {
                    self.opts.expected_size = self.bytes_read + content_length;
                }
            } else {
                if self.opts.expected_size > 0 && content_length != self.opts.expected_size {
                    return Err(DownloadError::size_mismatch(
                        self.opts.expected_size,
                        content_length,
                    ));
                }
                self.opts.expected_size = content_length;
            }
        }

        if let Some(server_modified) = parse_last_modified_minute(response.headers()) {
            match self.opts.expected_last_modified {
                None => self.opts.expected_last_modified = Some(server_modified),
                Some(expected) if expected != server_modified => {
                    return Err(DownloadError::modified_mismatch(expected, server_modified));
                }
                Some(_) => {}
            }
        }

        let mut progress = ProgressReporter::new(
            &self.remote_url,
            self.opts.expected_size - self.bytes_read,
        );
        let mut stream = response.bytes_stream();
        loop {
            let chunk = tokio::select! {
                () = cancel.cancelled() => {
                    return Err(DownloadError::cancelled(&self.remote_url));
                }
                next = stream.next() => next,
            };
            let Some(chunk) = chunk else { break };
            let chunk = chunk
                .map_err(|error| DownloadError::body_read(&self.remote_url, self.bytes_read, error))?;
            file.write_all(&chunk)
                .await
                .map_err(|error| DownloadError::io(tmp_path, error))?;
            #[allow(clippy::cast_possible_wrap)]
            {
                self.bytes_read += chunk.len() as i64;
            }
            progress.add(chunk.len());
        }

        if self.opts.expected_size > 0 && self.bytes_read != self.opts.expected_size {
            return Err(DownloadError::final_size_mismatch(
                self.opts.expected_size,
                self.bytes_read,
            ));
        }

        Ok(())
    }
}

/// The temporary sibling a download streams into before publication.
fn tmp_path_for(local_path: &Path) -> PathBuf {
    let mut os = local_path.as_os_str().to_os_string();
    os.push(".tmp");
    PathBuf::from(os)
}

/// Returns -1 when the header is absent or unparseable.
fn parse_content_length(headers: &reqwest::header::HeaderMap) -> i64 {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<i64>().ok())
        .unwrap_or(-1)
}

/// Returns `None` when the header is absent or unparseable; otherwise the
/// parsed instant truncated to the minute.
fn parse_last_modified_minute(headers: &reqwest::header::HeaderMap) -> Option<DateTime<Utc>> {
    let raw = headers.get(LAST_MODIFIED)?.to_str().ok()?;
    let parsed = NaiveDateTime::parse_from_str(raw, LAST_MODIFIED_FORMAT).ok()?;
    Some(truncate_to_minute(parsed.and_utc()))
}
