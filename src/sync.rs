//! Bounded worker pool that executes the change set.
//!
//! Work items flow through one small channel in a fixed order (changed files
//! first, then missing ones); a configurable number of workers pull items
//! and run the download engine. Sends block while every worker is busy,
//! which is all the backpressure this pipeline needs. One item failing never
//! aborts its peers: the error is logged and the worker moves on.

use std::path::Path;
use std::sync::Arc;

use reqwest::Client;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::download::{DownloadOptions, download_to_file};
use crate::scraper::RemoteFile;

/// Tallies from one pool run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncStats {
    /// Files downloaded and published.
    pub completed: usize,
    /// Files that failed with a terminal error.
    pub failed: usize,
}

/// Downloads the change set into `download_dir` using `threads` workers.
///
/// Dispatch order is deterministic: every changed file, then every missing
/// file, each list in its incoming (sorted) order. Completion order is not
/// guaranteed. Returns once every worker has drained and exited.
pub async fn download_work_set(
    client: &Client,
    download_dir: &Path,
    changed: Vec<RemoteFile>,
    missing: Vec<RemoteFile>,
    threads: usize,
    cancel: &CancellationToken,
) -> SyncStats {
    let (tx, rx) = mpsc::channel::<RemoteFile>(1);
    let rx = Arc::new(Mutex::new(rx));

    let mut workers = Vec::new();
    for _ in 0..threads.max(1) {
        let rx = Arc::clone(&rx);
        let client = client.clone();
        let download_dir = download_dir.to_path_buf();
        let cancel = cancel.clone();
        workers.push(tokio::spawn(async move {
            let mut completed = 0usize;
            let mut failed = 0usize;
            loop {
                // Hold the lock only while receiving, not while downloading.
                let item = { rx.lock().await.recv().await };
                let Some(item) = item else { break };
                if download_one(&client, &download_dir, &item, &cancel).await {
                    completed += 1;
                } else {
                    failed += 1;
                }
            }
            (completed, failed)
        }));
    }

    for item in changed {
        debug!(name = %item.name, "queuing changed file");
        if tx.send(item).await.is_err() {
            break;
        }
    }
    for item in missing {
        debug!(name = %item.name, "queuing missing file");
        if tx.send(item).await.is_err() {
            break;
        }
    }

    // Closing the channel lets idle workers stop.
    drop(tx);

    let mut stats = SyncStats::default();
    for worker in workers {
        match worker.await {
            Ok((completed, failed)) => {
                stats.completed += completed;
                stats.failed += failed;
            }
            Err(join_error) => warn!(error = %join_error, "download worker panicked"),
        }
    }

    info!(
        completed = stats.completed,
        failed = stats.failed,
        "downloads finished"
    );
    stats
}

/// Runs one work item, logging the outcome. Returns true on success.
async fn download_one(
    client: &Client,
    download_dir: &Path,
    item: &RemoteFile,
    cancel: &CancellationToken,
) -> bool {
    info!(
        name = %item.name,
        size = item.size,
        time = ?item.mtime,
        url = %item.url,
        "start download"
    );

    let path = download_dir.join(&item.name);
    let opts = DownloadOptions {
        expected_size: item.size.max(0),
        expected_last_modified: item.mtime,
        max_retry: 0,
    };

    match download_to_file(client, &item.url, &path, opts, cancel).await {
        Ok(results) => {
            info!(
                name = %item.name,
                time = ?results.last_modified,
                size = results.actual_size,
                path = %path.display(),
                "file written"
            );
            true
        }
        Err(failure) => {
            error!(
                name = %item.name,
                url = %item.url,
                size = failure.results.actual_size,
                time = ?failure.results.last_modified,
                retries = failure.results.retries,
                error = %failure.source,
                "unrecoverable error"
            );
            false
        }
    }
}
