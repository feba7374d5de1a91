//! Throttled progress reporting for in-flight downloads.

use std::time::{Duration, Instant};

use tracing::debug;

/// Minimum spacing between two progress events for the same download.
const TIME_BETWEEN_UPDATES: Duration = Duration::from_millis(500);

/// Tracks streamed bytes for one download and emits at most one progress
/// event per 500 ms.
#[derive(Debug)]
pub struct ProgressReporter {
    url: String,
    total: i64,
    progress: i64,
    last_update: Option<Instant>,
}

impl ProgressReporter {
    /// Creates a reporter for a download expecting `total` bytes
    /// (<= 0 when the size is unknown).
    #[must_use]
    pub fn new(url: impl Into<String>, total: i64) -> Self {
        Self {
            url: url.into(),
            total,
            progress: 0,
            last_update: None,
        }
    }

    /// Records `n` more streamed bytes, emitting an event if enough time has
    /// passed since the last one.
    pub fn add(&mut self, n: usize) {
        self.progress += n as i64;
        let due = self
            .last_update
            .map_or(true, |last| last.elapsed() > TIME_BETWEEN_UPDATES);
        if due {
            if self.total > 0 {
                #[allow(clippy::cast_precision_loss)]
                let percent = self.progress as f64 / self.total as f64 * 100.0;
                debug!(
                    url = %self.url,
                    total = %humanize_bytes(self.total),
                    percent = format!("{percent:.2}%"),
                    "download progress"
                );
            } else {
                debug!(
                    url = %self.url,
                    progress = %humanize_bytes(self.progress),
                    "download progress"
                );
            }
            self.last_update = Some(Instant::now());
        }
    }
}

/// Renders a byte count in a short human form (SI units).
#[must_use]
pub fn humanize_bytes(n: i64) -> String {
    const UNITS: [&str; 5] = ["B", "kB", "MB", "GB", "TB"];
    if n < 1000 {
        return format!("{n} B");
    }
    #[allow(clippy::cast_precision_loss)]
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}
