//! Local-side directory enumeration.
//!
//! The mirror is flat: one record per regular file directly under the
//! download root. Timestamps are truncated to the minute so a file stamped
//! from a minute-granular remote listing compares equal on the next run.

use std::path::Path;

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use thiserror::Error;

/// One file already present under the download root. Immutable once listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    /// File name as stored on disk.
    pub name: String,
    /// ASCII-lowercased name; the diff key.
    pub sort_name: String,
    /// Modification time in UTC, truncated to the minute.
    pub mtime: DateTime<Utc>,
    /// Size in bytes.
    pub size: i64,
}

/// Failure to enumerate the local side of the mirror.
#[derive(Debug, Error)]
#[error("listing local files in {path}: {source}")]
pub struct LocalListingError {
    /// The directory being listed.
    pub path: String,
    /// The underlying IO error.
    #[source]
    pub source: std::io::Error,
}

/// Truncates an instant to whole-minute precision.
///
/// The remote side only ever reports minutes, so all equality comparisons in
/// the diff happen at this granularity.
#[must_use]
pub fn truncate_to_minute(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant
        .duration_trunc(TimeDelta::minutes(1))
        .unwrap_or(instant)
}

/// Enumerates the regular files directly under `root`, sorted ascending by
/// `sort_name`. Directories are skipped; there is no recursion.
///
/// # Errors
///
/// Returns [`LocalListingError`] if the directory or any entry's metadata
/// cannot be read.
pub async fn list_local_files(root: &Path) -> Result<Vec<LocalFile>, LocalListingError> {
    let wrap = |source| LocalListingError {
        path: root.display().to_string(),
        source,
    };

    let mut entries = tokio::fs::read_dir(root).await.map_err(wrap)?;
    let mut locals = Vec::new();

    while let Some(entry) = entries.next_entry().await.map_err(wrap)? {
        let metadata = entry.metadata().await.map_err(wrap)?;
        if metadata.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let mtime: DateTime<Utc> = metadata.modified().map_err(wrap)?.into();
        #[allow(clippy::cast_possible_wrap)]
        let size = metadata.len() as i64;
        locals.push(LocalFile {
            sort_name: name.to_ascii_lowercase(),
            name,
            mtime: truncate_to_minute(mtime),
            size,
        });
    }

    locals.sort_by(|a, b| a.sort_name.cmp(&b.sort_name));
    Ok(locals)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_truncate_to_minute_drops_seconds_and_nanos() {
        let instant = Utc.with_ymd_and_hms(2020, 2, 4, 2, 10, 59).unwrap();
        let expected = Utc.with_ymd_and_hms(2020, 2, 4, 2, 10, 0).unwrap();
        assert_eq!(truncate_to_minute(instant), expected);
    }

    #[test]
    fn test_truncate_to_minute_is_idempotent() {
        let instant = Utc.with_ymd_and_hms(2020, 2, 4, 2, 10, 0).unwrap();
        assert_eq!(truncate_to_minute(instant), instant);
    }

    #[tokio::test]
    async fn test_list_local_files_sorted_case_insensitively() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("Beta.txt"), b"bb").unwrap();
        std::fs::write(dir.path().join("alpha.txt"), b"a").unwrap();
        std::fs::write(dir.path().join("Gamma.txt"), b"ggg").unwrap();

        let locals = list_local_files(dir.path()).await.unwrap();

        let names: Vec<&str> = locals.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["alpha.txt", "Beta.txt", "Gamma.txt"]);
        assert_eq!(locals[0].sort_name, "alpha.txt");
        assert_eq!(locals[1].sort_name, "beta.txt");
        assert_eq!(locals[0].size, 1);
        assert_eq!(locals[1].size, 2);
    }

    #[tokio::test]
    async fn test_list_local_files_skips_directories() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("file.txt"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("subdir")).unwrap();

        let locals = list_local_files(dir.path()).await.unwrap();

        assert_eq!(locals.len(), 1);
        assert_eq!(locals[0].name, "file.txt");
    }

    #[tokio::test]
    async fn test_list_local_files_mtimes_are_minute_truncated() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("f"), b"x").unwrap();

        let locals = list_local_files(dir.path()).await.unwrap();

        assert_eq!(locals[0].mtime, truncate_to_minute(locals[0].mtime));
    }

    #[tokio::test]
    async fn test_list_local_files_missing_root_is_error() {
        let dir = TempDir::new().unwrap();
        let result = list_local_files(&dir.path().join("nope")).await;
        assert!(result.is_err());
    }
}
