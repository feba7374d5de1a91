//! Mirror a remote directory index to a local folder.
//!
//! The pipeline lists the files a scraper sees remotely, lists the files
//! already on disk, diffs the two sorted listings, and downloads whatever is
//! missing or has changed through a bounded worker pool. Downloads are
//! resumable, validated against expected sizes and timestamps, and published
//! atomically.
//!
//! # Architecture
//!
//! - [`scraper`] - remote listings: the `Scraper` trait, the scraper-type
//!   registry, and the archive.org directory-index parser
//! - [`listing`] - local directory enumeration
//! - [`diff`] - sorted-merge diff between the two listings
//! - [`download`] - the resumable download engine
//! - [`sync`] - the worker pool that executes the change set
//! - [`config`] / [`cli`] - TOML configuration and command-line arguments
//! - [`mtime`] - OS-dispatched modification-time stamping

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod diff;
pub mod download;
pub mod listing;
pub mod mtime;
pub mod scraper;
pub mod sync;
pub mod user_agent;

// Re-export commonly used types
pub use diff::{FileDiff, diff_sorted_listings};
pub use download::{
    DownloadError, DownloadFailure, DownloadOptions, DownloadResults, download_to_file,
};
pub use listing::{LocalFile, LocalListingError, list_local_files};
pub use scraper::{
    ArchiveOrgScraper, ListingError, Params, RemoteFile, Scraper, ScraperError, ScraperKind,
    create_scraper, registered_tags,
};
pub use sync::{SyncStats, download_work_set};
