//! Remote directory listings and the scrapers that produce them.
//!
//! A scraper turns one remote directory index into a sorted list of
//! [`RemoteFile`]s. Scraper types form a closed set: each carries a string
//! tag used by the scrapers config file, and [`create_scraper`] dispatches a
//! tag plus construction parameters to the matching constructor.

mod archive_org;

pub use archive_org::ArchiveOrgScraper;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// One file advertised by the remote directory index. Immutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Canonical file name (decoded final segment of the URL path).
    pub name: String,
    /// ASCII-lowercased name; the diff key.
    pub sort_name: String,
    /// Fully resolved download URL.
    pub url: String,
    /// Minute-granular modification time; `None` when the listing did not
    /// carry one.
    pub mtime: Option<DateTime<Utc>>,
    /// Size in bytes; `-1` when the listing only shows a humanized size.
    pub size: i64,
}

/// Failure to fetch or parse a remote directory index.
#[derive(Debug, Error)]
pub enum ListingError {
    /// The index request could not be completed.
    #[error("fetching listing from {url}: {source}")]
    Fetch {
        /// The listing URL.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The index request returned a non-200 status.
    #[error("unexpected status {status} fetching listing from {url}")]
    Status {
        /// The listing URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The index document did not match any known response shape, or matched
    /// one but was malformed inside it.
    #[error("parsing listing: {reason}")]
    Parse {
        /// What went wrong.
        reason: String,
    },
}

impl ListingError {
    pub(crate) fn parse(reason: impl Into<String>) -> Self {
        Self::Parse {
            reason: reason.into(),
        }
    }
}

/// A source of remote file listings.
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Fetches and parses the remote directory index, returning the files
    /// sorted ascending by `sort_name`.
    async fn scrape_remotes(&self) -> Result<Vec<RemoteFile>, ListingError>;
}

/// Construction parameters shared by all scraper types. Each type may
/// require or ignore any field.
#[derive(Debug, Clone, Default)]
pub struct Params {
    /// The directory index URL.
    pub base_url: String,
    /// Optional User-Agent override for listing requests.
    pub user_agent: Option<String>,
}

/// The closed set of known scraper types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScraperKind {
    /// archive.org directory indexes (both response shapes).
    ArchiveOrg,
}

impl ScraperKind {
    /// All known kinds, in tag order.
    pub const ALL: [ScraperKind; 1] = [ScraperKind::ArchiveOrg];

    /// Looks up a kind by its config-file tag.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "archive.org" => Some(Self::ArchiveOrg),
            _ => None,
        }
    }

    /// The tag this kind is registered under.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::ArchiveOrg => "archive.org",
        }
    }
}

/// Error from [`create_scraper`].
#[derive(Debug, Error)]
pub enum ScraperError {
    /// The requested tag names no registered scraper type.
    #[error("unknown scraper type '{tag}'")]
    UnknownType {
        /// The tag that failed to resolve.
        tag: String,
    },

    /// The parameters were incomplete for the requested type.
    #[error("scraper type '{tag}' missing required parameter: {param}")]
    MissingParam {
        /// The tag being constructed.
        tag: String,
        /// The absent parameter.
        param: &'static str,
    },
}

/// Builds a scraper for `tag` from `params`.
///
/// # Errors
///
/// Returns [`ScraperError::UnknownType`] for an unregistered tag, or
/// [`ScraperError::MissingParam`] when a required parameter is empty.
pub fn create_scraper(tag: &str, params: Params) -> Result<Box<dyn Scraper>, ScraperError> {
    let kind = ScraperKind::from_tag(tag).ok_or_else(|| ScraperError::UnknownType {
        tag: tag.to_string(),
    })?;
    match kind {
        ScraperKind::ArchiveOrg => {
            if params.base_url.is_empty() {
                return Err(ScraperError::MissingParam {
                    tag: tag.to_string(),
                    param: "base_url",
                });
            }
            let mut scraper = ArchiveOrgScraper::new(params.base_url);
            if let Some(agent) = params.user_agent {
                scraper = scraper.with_user_agent(agent);
            }
            Ok(Box::new(scraper))
        }
    }
}

/// Tags of every registered scraper type, for error listings.
#[must_use]
pub fn registered_tags() -> Vec<&'static str> {
    ScraperKind::ALL.iter().map(|kind| kind.tag()).collect()
}
