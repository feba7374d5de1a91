//! Scraper for archive.org directory indexes.
//!
//! archive.org serves two different documents for effectively the same
//! directory, apparently depending on whether the request URL carries a
//! trailing slash. One is a short preformatted page with exact byte sizes,
//! one line per file; the other is a full HTML table that spreads each file
//! across several rows and only shows a humanized size. This scraper sniffs
//! the first non-empty line of the body to decide which shape it received
//! and keeps a separate parser for each; the sizes in the full shape are
//! unrecoverable and reported as -1.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use reqwest::StatusCode;
use reqwest::header::USER_AGENT;
use tracing::debug;
use url::Url;

use super::{ListingError, RemoteFile, Scraper};

#[allow(clippy::expect_used)]
static SIMPLE_FILE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^<a href="([^"]+)">(.[^<]+)</a>\s*([0-9]+-[A-Za-z]+-[0-9]+ [0-9]+:[0-9]+)\s+([0-9]+)$"#)
        .expect("simple file line regex is valid")
});

#[allow(clippy::expect_used)]
static FULL_PARENT_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s+<td><a href="[^"]+"><span class="iconochive-Uplevel" title="Parent Directory" aria-hidden="true"></span> Go to parent directory</a></td>$"#)
        .expect("full parent row regex is valid")
});

#[allow(clippy::expect_used)]
static FULL_FILE_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s+<td><a href="([^"]+)">([^<]+)</a>.*</td>$"#)
        .expect("full file row regex is valid")
});

#[allow(clippy::expect_used)]
static FULL_MTIME_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s+<td>([0-9]+-[A-Za-z]+-[0-9]+ [0-9]+:[0-9]+)</td>$")
        .expect("full mtime row regex is valid")
});

/// Timestamp format used by both listing shapes, e.g. `07-Oct-2023 12:34`.
const LISTING_TIME_FORMAT: &str = "%d-%b-%Y %H:%M";

/// Scrapes one archive.org directory index.
#[derive(Debug, Clone)]
pub struct ArchiveOrgScraper {
    base_url: String,
    user_agent: Option<String>,
}

impl ArchiveOrgScraper {
    /// Creates a scraper for the given directory index URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            user_agent: None,
        }
    }

    /// Overrides the User-Agent sent with listing requests.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Parses one directory-index document into remote files, in document
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`ListingError::Parse`] when the document matches neither
    /// known shape or is malformed inside the shape it matched.
    pub fn parse_listing(&self, body: &str) -> Result<Vec<RemoteFile>, ListingError> {
        let mut lines = body.lines();
        let first = loop {
            match lines.next() {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => break line.trim_start(),
                None => return Err(ListingError::parse("empty listing document")),
            }
        };

        if first.starts_with("<!DOCTYPE html>") {
            debug!(url = %self.base_url, "parsing listing as full variant");
            self.parse_full(lines)
        } else if first.starts_with("<html>") {
            debug!(url = %self.base_url, "parsing listing as simple variant");
            self.parse_simple(lines)
        } else {
            Err(ListingError::parse(format!(
                "unrecognized first line '{first}'"
            )))
        }
    }

    /// Parses the preformatted shape: one `<a href>` line per file carrying
    /// both the timestamp and the exact size. The anchor text is not trusted
    /// as a name (the server truncates long ones); the name comes from the
    /// URL instead.
    fn parse_simple<'a>(
        &self,
        lines: impl Iterator<Item = &'a str>,
    ) -> Result<Vec<RemoteFile>, ListingError> {
        let mut remotes = Vec::new();

        for line in lines {
            let Some(captures) = SIMPLE_FILE_LINE.captures(line) else {
                continue;
            };
            let href = &captures[1];
            let time_text = &captures[3];
            let size_text = &captures[4];

            let file_url = self.resolve_href(href)?;
            let name = file_name_from_url(&file_url)?;
            let mtime = parse_listing_time(time_text)?;
            let size: i64 = size_text.parse().map_err(|_| {
                ListingError::parse(format!("failed to parse size '{size_text}'"))
            })?;

            remotes.push(RemoteFile {
                sort_name: name.to_ascii_lowercase(),
                name,
                url: file_url.to_string(),
                mtime: Some(mtime),
                size,
            });
        }

        Ok(remotes)
    }

    /// Parses the HTML-table shape: skip ahead to the parent-directory row,
    /// then read file anchors whose modification time sits on the following
    /// row. Only a humanized size is present, so size is unknown.
    fn parse_full<'a>(
        &self,
        mut lines: impl Iterator<Item = &'a str>,
    ) -> Result<Vec<RemoteFile>, ListingError> {
        if !lines.by_ref().any(|line| FULL_PARENT_ROW.is_match(line)) {
            return Err(ListingError::parse("failed to find file list"));
        }

        let mut remotes = Vec::new();
        while let Some(line) = lines.next() {
            let Some(captures) = FULL_FILE_ROW.captures(line) else {
                continue;
            };
            let href = captures[1].to_string();

            let file_url = self.resolve_href(&href)?;
            let name = file_name_from_url(&file_url)?;

            let mtime_line = lines
                .by_ref()
                .find(|candidate| !candidate.trim().is_empty());
            let mtime_text = mtime_line
                .and_then(|candidate| FULL_MTIME_ROW.captures(candidate))
                .ok_or_else(|| {
                    ListingError::parse(format!("failed to find last modified time for '{name}'"))
                })?;
            let mtime = parse_listing_time(&mtime_text[1])?;

            remotes.push(RemoteFile {
                sort_name: name.to_ascii_lowercase(),
                name,
                url: file_url.to_string(),
                mtime: Some(mtime),
                size: -1,
            });
        }

        Ok(remotes)
    }

    /// Resolves an extracted href: absolute URLs pass through; relative ones
    /// are appended to the base URL's path segments.
    fn resolve_href(&self, href: &str) -> Result<Url, ListingError> {
        if let Ok(absolute) = Url::parse(href) {
            return Ok(absolute);
        }
        let mut base = Url::parse(&self.base_url).map_err(|error| {
            ListingError::parse(format!(
                "failed to parse base url '{}': {error}",
                self.base_url
            ))
        })?;
        // Appending, not RFC-replacing the final segment: the index URL names
        // the directory itself, with or without a trailing slash.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(href)
            .map_err(|error| ListingError::parse(format!("failed to parse url '{href}': {error}")))
    }
}

#[async_trait::async_trait]
impl Scraper for ArchiveOrgScraper {
    async fn scrape_remotes(&self) -> Result<Vec<RemoteFile>, ListingError> {
        let client = reqwest::Client::builder()
            .user_agent(crate::user_agent::default_user_agent())
            .build()
            .map_err(|source| ListingError::Fetch {
                url: self.base_url.clone(),
                source,
            })?;
        let mut request = client.get(&self.base_url);
        if let Some(agent) = &self.user_agent {
            request = request.header(USER_AGENT, agent);
        }

        let response = request.send().await.map_err(|source| ListingError::Fetch {
            url: self.base_url.clone(),
            source,
        })?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(ListingError::Status {
                url: self.base_url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|source| ListingError::Fetch {
            url: self.base_url.clone(),
            source,
        })?;

        let mut remotes = self.parse_listing(&body)?;
        remotes.sort_by(|a, b| a.sort_name.cmp(&b.sort_name));
        debug!(url = %self.base_url, count = remotes.len(), "scraped remote listing");
        Ok(remotes)
    }
}

/// Extracts the canonical file name: the percent-decoded final path segment.
/// Decoding happens first, so an encoded separator inside a segment cannot
/// end up in the name.
fn file_name_from_url(url: &Url) -> Result<String, ListingError> {
    let segment = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .ok_or_else(|| ListingError::parse(format!("no file name in url '{url}'")))?;
    let decoded = urlencoding::decode(segment)
        .map_err(|error| ListingError::parse(format!("decoding name '{segment}': {error}")))?;
    let name = decoded.rsplit('/').next().unwrap_or(&decoded).to_string();
    if name.is_empty() {
        return Err(ListingError::parse(format!("no file name in url '{url}'")));
    }
    Ok(name)
}

fn parse_listing_time(text: &str) -> Result<DateTime<Utc>, ListingError> {
    NaiveDateTime::parse_from_str(text, LISTING_TIME_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|error| ListingError::parse(format!("failed to parse time '{text}': {error}")))
}
