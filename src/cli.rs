//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Default number of simultaneous downloads.
pub const DEFAULT_THREADS: usize = 4;

/// Default path of the optional main config file.
pub const DEFAULT_CONFIG_PATH: &str = "needl.toml";

/// Default path of the scrapers file.
pub const DEFAULT_SCRAPERS_PATH: &str = "scrapers.toml";

/// Mirror a remote directory index to a local folder.
///
/// Lists the files a configured scraper sees remotely, lists the files
/// already in the download folder, and downloads whatever is missing or has
/// changed. Local-only files are reported but never deleted.
#[derive(Parser, Debug, Clone)]
#[command(name = "needl")]
#[command(about)]
#[command(
    after_help = "Exit codes:\n  0 = success\n  1 = argument error\n  5 = config load error\n  6 = scrapers file load error\n  7 = named scraper not found\n  20 = local listing failed\n  30 = remote listing failed"
)]
pub struct Cli {
    /// Scraper name to run (a key in the scrapers file); overrides the
    /// config file's `scraper`.
    #[arg(value_name = "SCRAPER_NAME")]
    pub scraper_name: Option<String>,

    /// Directory to mirror into; overrides the config file's `path`.
    #[arg(value_name = "DOWNLOAD_PATH")]
    pub download_path: Option<PathBuf>,

    /// Config TOML file (missing file is tolerated).
    #[arg(short = 'c', long, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Scrapers TOML file.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_SCRAPERS_PATH)]
    pub scrapers: PathBuf,

    /// Max number of concurrent downloads; overrides the config file's
    /// `threads`.
    #[arg(short = 't', long, value_name = "NUM")]
    pub threads: Option<usize>,

    /// Extra output (for debugging).
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Print just the version number (to stdout).
    #[arg(long)]
    pub version: bool,
}
