//! Downloading one remote file to one local path.
//!
//! The engine streams into a temporary sibling file, validates size and
//! modification time against caller expectations and server headers, retries
//! transport failures with exponential backoff (resuming via HTTP ranges
//! when the server allows), and atomically publishes the result.

mod backoff;
mod engine;
mod error;
mod progress;

pub use backoff::backoff;
pub use engine::{DownloadFailure, DownloadOptions, DownloadResults, download_to_file};
pub use error::DownloadError;
pub use progress::{ProgressReporter, humanize_bytes};
