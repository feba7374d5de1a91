//! Stamping a file's modification time after publication.
//!
//! One signature, two platform implementations selected at compile time. The
//! unix path sets only the mtime and leaves the access time alone; the
//! windows path opens the file for write access first, since path-based
//! utilities there misbehave when the file is missing.

use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use filetime::FileTime;

/// Sets the modification time of `path` to `stamp`.
///
/// # Errors
///
/// Returns the underlying IO error if the file cannot be stamped (including
/// when it does not exist).
#[cfg(not(windows))]
pub fn set_mtime(path: &Path, stamp: DateTime<Utc>) -> io::Result<()> {
    filetime::set_file_mtime(path, to_file_time(stamp))
}

/// Sets the modification time of `path` to `stamp`.
///
/// # Errors
///
/// Returns the underlying IO error if the file cannot be opened for
/// attribute writes or the stamp cannot be applied.
#[cfg(windows)]
pub fn set_mtime(path: &Path, stamp: DateTime<Utc>) -> io::Result<()> {
    let file = std::fs::OpenOptions::new().write(true).open(path)?;
    filetime::set_file_handle_times(&file, None, Some(to_file_time(stamp)))
}

fn to_file_time(stamp: DateTime<Utc>) -> FileTime {
    FileTime::from_unix_time(stamp.timestamp(), stamp.timestamp_subsec_nanos())
}
