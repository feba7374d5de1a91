//! Sorted-merge diff between the local and remote listings.

use crate::listing::LocalFile;
use crate::scraper::RemoteFile;

/// The three disjoint outcomes of diffing the two listings.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FileDiff {
    /// Local files with no remote counterpart. Reported, never deleted.
    pub extra: Vec<LocalFile>,
    /// Remote files with no local counterpart.
    pub missing: Vec<RemoteFile>,
    /// Remote files whose local counterpart has drifted.
    pub changed: Vec<RemoteFile>,
}

/// Merges two listings already sorted ascending by `sort_name`.
///
/// A matched pair lands in `changed` when the remote mtime is known and
/// differs, or the remote size is known (not the -1 sentinel) and differs.
/// Unknown remote values never count as a mismatch on their own. Both lists
/// MUST be pre-sorted; this function never re-sorts.
///
/// Case-insensitive name collisions within one side pair up in the order
/// given; the surplus drains like any other unmatched entry.
#[must_use]
pub fn diff_sorted_listings(locals: &[LocalFile], remotes: &[RemoteFile]) -> FileDiff {
    let mut diff = FileDiff::default();
    let mut i = 0;
    let mut j = 0;

    while i < locals.len() && j < remotes.len() {
        let local = &locals[i];
        let remote = &remotes[j];

        if local.sort_name < remote.sort_name {
            diff.extra.push(local.clone());
            i += 1;
            continue;
        }

        if local.sort_name > remote.sort_name {
            diff.missing.push(remote.clone());
            j += 1;
            continue;
        }

        let time_changed = remote.mtime.is_some_and(|mtime| mtime != local.mtime);
        let size_changed = remote.size != -1 && remote.size != local.size;
        if time_changed || size_changed {
            diff.changed.push(remote.clone());
        }

        i += 1;
        j += 1;
    }

    diff.extra.extend_from_slice(&locals[i..]);
    diff.missing.extend_from_slice(&remotes[j..]);

    diff
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDateTime, Utc};

    fn stamp(text: &str) -> DateTime<Utc> {
        NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M")
            .unwrap()
            .and_utc()
    }

    fn local(name: &str, mtime: &str, size: i64) -> LocalFile {
        LocalFile {
            name: name.to_string(),
            sort_name: name.to_ascii_lowercase(),
            mtime: stamp(mtime),
            size,
        }
    }

    fn remote(name: &str, mtime: &str, size: i64) -> RemoteFile {
        RemoteFile {
            name: name.to_string(),
            sort_name: name.to_ascii_lowercase(),
            url: name.to_string(),
            mtime: Some(stamp(mtime)),
            size,
        }
    }

    fn names_of_remotes(items: &[RemoteFile]) -> Vec<&str> {
        items.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn test_identical_single_file_yields_empty_diff() {
        let diff = diff_sorted_listings(
            &[local("foo", "2020-01-01 00:00", 1234)],
            &[remote("foo", "2020-01-01 00:00", 1234)],
        );
        assert_eq!(diff, FileDiff::default());
    }

    #[test]
    fn test_unknown_remote_size_suppresses_change() {
        let diff = diff_sorted_listings(
            &[local("foo", "2020-01-01 00:00", 1234)],
            &[remote("foo", "2020-01-01 00:00", -1)],
        );
        assert_eq!(diff, FileDiff::default());
    }

    #[test]
    fn test_unknown_remote_mtime_suppresses_change() {
        let mut unknown_time = remote("foo", "2020-01-01 00:00", 1234);
        unknown_time.mtime = None;
        let diff = diff_sorted_listings(
            &[local("foo", "2019-06-06 06:06", 1234)],
            &[unknown_time],
        );
        assert_eq!(diff, FileDiff::default());
    }

    #[test]
    fn test_size_difference_marks_changed() {
        let diff = diff_sorted_listings(
            &[local("foo", "2020-01-01 00:00", 1234)],
            &[remote("foo", "2020-01-01 00:00", 52345)],
        );
        assert!(diff.extra.is_empty());
        assert!(diff.missing.is_empty());
        assert_eq!(names_of_remotes(&diff.changed), ["foo"]);
        assert_eq!(diff.changed[0].size, 52345);
    }

    #[test]
    fn test_mtime_difference_marks_changed() {
        let diff = diff_sorted_listings(
            &[local("foo", "2020-01-01 00:00", 1234)],
            &[remote("foo", "2020-02-04 02:10", 1234)],
        );
        assert_eq!(names_of_remotes(&diff.changed), ["foo"]);
        assert_eq!(diff.changed[0].mtime, Some(stamp("2020-02-04 02:10")));
    }

    #[test]
    fn test_mixed_extra_missing_changed() {
        let locals = [
            local("foo", "2020-01-01 00:00", 1234),
            local("pool", "2020-02-03 01:02", 444),
            local("stand", "2021-12-31 23:59", 3548),
        ];
        let remotes = [
            remote("foo", "2020-01-01 00:00", -1),
            remote("pool", "2020-10-01 19:28", -1),
            remote("zero", "2000-01-01 00:00", -1),
        ];

        let diff = diff_sorted_listings(&locals, &remotes);

        let extra_names: Vec<&str> = diff.extra.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(extra_names, ["stand"]);
        assert_eq!(names_of_remotes(&diff.missing), ["zero"]);
        assert_eq!(names_of_remotes(&diff.changed), ["pool"]);
    }

    #[test]
    fn test_empty_local_side_drains_all_remotes_to_missing() {
        let remotes = [
            remote("foo", "2020-01-01 00:00", -1),
            remote("pool", "2020-10-01 19:28", -1),
            remote("zero", "2000-01-01 00:00", -1),
        ];
        let diff = diff_sorted_listings(&[], &remotes);
        assert!(diff.extra.is_empty());
        assert_eq!(names_of_remotes(&diff.missing), ["foo", "pool", "zero"]);
        assert!(diff.changed.is_empty());
    }

    #[test]
    fn test_empty_remote_side_drains_all_locals_to_extra() {
        let locals = [
            local("foo", "2020-01-01 00:00", 1234),
            local("pool", "2020-02-03 01:02", 444),
        ];
        let diff = diff_sorted_listings(&locals, &[]);
        assert_eq!(diff.extra.len(), 2);
        assert!(diff.missing.is_empty());
        assert!(diff.changed.is_empty());
    }

    #[test]
    fn test_case_insensitive_names_compare_equal() {
        let diff = diff_sorted_listings(
            &[local("README", "2020-01-01 00:00", 10)],
            &[remote("readme", "2020-01-01 00:00", 10)],
        );
        assert_eq!(diff, FileDiff::default());
    }

    #[test]
    fn test_case_collision_surplus_drains_normally() {
        // Two locals share one sort_name; the first pairs with the only
        // remote, the surplus drains to extra.
        let locals = [
            local("Readme", "2020-01-01 00:00", 10),
            local("readme", "2020-01-01 00:00", 10),
        ];
        let remotes = [remote("README", "2020-01-01 00:00", 10)];

        let diff = diff_sorted_listings(&locals, &remotes);

        assert_eq!(diff.extra.len(), 1);
        assert_eq!(diff.extra[0].name, "readme");
        assert!(diff.missing.is_empty());
        assert!(diff.changed.is_empty());
    }

    /// The diff is total: every input lands in exactly one bucket.
    #[test]
    fn test_diff_totality() {
        let locals = [
            local("a", "2020-01-01 00:00", 1),
            local("b", "2020-01-01 00:00", 2),
            local("d", "2020-01-01 00:00", 4),
        ];
        let remotes = [
            remote("b", "2020-01-01 00:00", 3),
            remote("c", "2020-01-01 00:00", 3),
            remote("d", "2020-01-01 00:00", 4),
        ];

        let diff = diff_sorted_listings(&locals, &remotes);

        let matched = locals
            .iter()
            .filter(|l| remotes.iter().any(|r| r.sort_name == l.sort_name))
            .count();
        assert_eq!(diff.extra.len() + matched, locals.len());
        assert_eq!(diff.missing.len() + matched, remotes.len());
        // Changed entries are a subset of the matched pairs.
        assert!(diff.changed.len() <= matched);
    }
}
