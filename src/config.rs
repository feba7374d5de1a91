//! TOML configuration: the optional main config and the scrapers file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Errors loading either TOML file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("reading '{path}': {source}")]
    Read {
        /// The file that failed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file was read but is not valid TOML for the expected shape.
    #[error("decoding '{path}': {source}")]
    Decode {
        /// The file that failed.
        path: PathBuf,
        /// The underlying TOML error.
        #[source]
        source: toml::de::Error,
    },
}

/// The optional main config file. Every key has a command-line override.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct FileConfig {
    /// Download directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Name of the scraper to run (a key in the scrapers file).
    #[serde(default)]
    pub scraper: Option<String>,
    /// Number of simultaneous downloads.
    #[serde(default)]
    pub threads: Option<usize>,
    /// Extra output for debugging.
    #[serde(default)]
    pub verbose: Option<bool>,
}

/// One entry in the scrapers file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ScraperConfig {
    /// Registered scraper-type tag, e.g. `"archive.org"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Directory index URL.
    pub url: String,
    /// Optional User-Agent for listing requests.
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// The scrapers file: scraper name to its configuration. Ordered so error
/// listings are deterministic.
pub type ScrapersConfig = BTreeMap<String, ScraperConfig>;

/// Loads the optional main config. A missing file is not an error and
/// yields `None`.
///
/// # Errors
///
/// Returns [`ConfigError`] for unreadable or undecodable files.
pub fn load_config(path: &Path) -> Result<Option<FileConfig>, ConfigError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    toml::from_str(&raw)
        .map(Some)
        .map_err(|source| ConfigError::Decode {
            path: path.to_path_buf(),
            source,
        })
}

/// Loads the scrapers file. Unlike the main config, this file is required.
///
/// # Errors
///
/// Returns [`ConfigError`] for missing, unreadable, or undecodable files.
pub fn load_scrapers(path: &Path) -> Result<ScrapersConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Decode {
        path: path.to_path_buf(),
        source,
    })
}
