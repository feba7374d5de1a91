//! CLI entry point: argument handling, config merging, and the mirror run.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use clap::error::ErrorKind;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use needl::cli::{Cli, DEFAULT_THREADS};
use needl::config::{ScraperConfig, load_config, load_scrapers};
use needl::scraper::{Params, RemoteFile, create_scraper};
use needl::{diff_sorted_listings, download_work_set, list_local_files};

/// Exit statuses for the process. Anything outside `[0, 125]` is clamped to
/// 125 before reaching the OS.
mod status {
    pub const OK: i32 = 0;
    pub const USAGE: i32 = 1;
    pub const CONFIG: i32 = 5;
    pub const SCRAPERS: i32 = 6;
    pub const SCRAPER_NOT_FOUND: i32 = 7;
    pub const LOCAL_LISTING: i32 = 20;
    pub const REMOTE_LISTING: i32 = 30;
}

#[tokio::main]
async fn main() -> ExitCode {
    ExitCode::from(clamp_status(run().await))
}

/// Keeps exit statuses portable across platforms.
fn clamp_status(code: i32) -> u8 {
    u8::try_from(code).map_or(125, |code| if code > 125 { 125 } else { code })
}

async fn run() -> i32 {
    let start = Instant::now();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(parse_error) => {
            // Usage goes to stderr whether it was asked for or provoked;
            // only the exit status differs.
            if parse_error.kind() == ErrorKind::DisplayHelp {
                eprint!("{parse_error}");
                return status::OK;
            }
            let _ = parse_error.print();
            return status::USAGE;
        }
    };

    if cli.version {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return status::OK;
    }

    // The config file can raise verbosity, so it loads before tracing is up;
    // failures here go straight to stderr.
    let file_config = match load_config(&cli.config) {
        Ok(config) => config.unwrap_or_default(),
        Err(config_error) => {
            eprintln!("loading config: {config_error}");
            return status::CONFIG;
        }
    };

    let scraper_name = cli.scraper_name.clone().or(file_config.scraper);
    let download_path = cli
        .download_path
        .clone()
        .or(file_config.path)
        .unwrap_or_else(|| PathBuf::from("."));
    let threads = cli
        .threads
        .or(file_config.threads)
        .filter(|&threads| threads > 0)
        .unwrap_or(DEFAULT_THREADS);
    let verbose = cli.verbose || file_config.verbose.unwrap_or(false);

    init_tracing(verbose);
    debug!(config = %cli.config.display(), "config resolved");

    info!(path = %cli.scrapers.display(), "loading scrapers");
    let scrapers = match load_scrapers(&cli.scrapers) {
        Ok(scrapers) => scrapers,
        Err(scrapers_error) => {
            error!(error = %scrapers_error, "loading scrapers");
            return status::SCRAPERS;
        }
    };

    let requested = scraper_name.as_deref().unwrap_or_default();
    let Some(scraper_config) = scrapers.get(requested).cloned() else {
        error!(name = requested, path = %cli.scrapers.display(), "scraper not found");
        if scrapers.is_empty() {
            eprintln!("no scrapers found in {}", cli.scrapers.display());
        } else {
            eprintln!("available scrapers (from {}):", cli.scrapers.display());
            for name in scrapers.keys() {
                eprintln!("  {name}");
            }
        }
        return status::SCRAPER_NOT_FOUND;
    };

    if let Err(mkdir_error) = std::fs::create_dir_all(&download_path) {
        error!(path = %download_path.display(), error = %mkdir_error, "creating local path");
    }

    let (locals, remotes) = match list_both_sides(&download_path, &scraper_config).await {
        Ok(listings) => listings,
        Err(code) => return code,
    };

    let diff = diff_sorted_listings(&locals, &remotes);

    // Call out files that are local-only; they are never deleted.
    for extra in &diff.extra {
        info!(name = %extra.name, "local file not in remote");
    }

    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    #[allow(clippy::expect_used)]
    let client = reqwest::Client::builder()
        .user_agent(needl::user_agent::default_user_agent())
        .build()
        .expect("failed to build HTTP client with static configuration");
    let stats = download_work_set(
        &client,
        &download_path,
        diff.changed,
        diff.missing,
        threads,
        &cancel,
    )
    .await;

    info!(
        completed = stats.completed,
        failed = stats.failed,
        elapsed_secs = start.elapsed().as_secs_f64(),
        "done"
    );
    status::OK
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Lists the local and remote sides concurrently; either failure carries its
/// own exit status.
async fn list_both_sides(
    download_path: &Path,
    scraper_config: &ScraperConfig,
) -> Result<(Vec<needl::LocalFile>, Vec<RemoteFile>), i32> {
    let local_task = async {
        info!(path = %download_path.display(), "listing local files");
        list_local_files(download_path).await
    };
    let remote_task = async {
        info!(url = %scraper_config.url, "listing remote files");
        let scraper = create_scraper(
            &scraper_config.kind,
            Params {
                base_url: scraper_config.url.clone(),
                user_agent: scraper_config.user_agent.clone(),
            },
        )?;
        Ok::<_, anyhow::Error>(scraper.scrape_remotes().await?)
    };

    let (locals, remotes) = tokio::join!(local_task, remote_task);

    let locals = match locals {
        Ok(locals) => locals,
        Err(local_error) => {
            error!(error = %local_error, "list local files");
            return Err(status::LOCAL_LISTING);
        }
    };
    let remotes = match remotes {
        Ok(remotes) => remotes,
        Err(remote_error) => {
            error!(error = %remote_error, url = %scraper_config.url, "list remote files");
            return Err(status::REMOTE_LISTING);
        }
    };

    Ok((locals, remotes))
}

fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, abandoning in-flight downloads");
            cancel.cancel();
        }
    });
}
