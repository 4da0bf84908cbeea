//! # Release Radar
//!
//! Checks a list of corporate news-release pages and collects the releases
//! published within the last N days into a single CSV file.
//!
//! ## Features
//!
//! - Per-company CSS selectors, with a generic fallback that understands
//!   common listing layouts as well as RSS and Atom feeds
//! - Japanese and English date formats (`2024年5月15日`, `2024.05.15`,
//!   ISO 8601, RFC 2822, `May 15, 2024`, `15 May 2024`)
//! - Shift_JIS / EUC-JP pages decoded transparently
//! - Sites that cannot be processed are recorded in a skip log and never
//!   stop the run
//!
//! ## Usage
//!
//! ```sh
//! release_radar --companies companies.csv --days 7 --output-dir ./out
//! ```
//!
//! ## Architecture
//!
//! 1. **Configuration**: Load the companies table and the optional selector table
//! 2. **Fetching**: Download each listing page (bounded concurrency)
//! 3. **Extraction**: Resolve the site's strategy and pull title, date and link per entry
//! 4. **Filtering**: Parse dates and keep entries inside the window
//! 5. **Output**: Write `<start>-<end>.csv` and append failures to the skip log

use clap::Parser;
use std::error::Error;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod dates;
mod extract;
mod fetch;
mod models;
mod outputs;
mod pipeline;
mod selectors;
mod utils;
mod window;

use cli::Cli;
use fetch::{FetchOptions, HttpFetcher};
use outputs::records::{PersistOutcome, write_records};
use outputs::skip_log::SkipLog;
use pipeline::RunOptions;
use utils::ensure_writable_dir;
use window::DateWindow;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("release_radar starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    // Early check: ensure the output dir is writable before any fetching
    if let Err(e) = ensure_writable_dir(&args.output_dir).await {
        error!(
            path = %args.output_dir,
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    // ---- Load configuration ----
    let sites = match config::load_sites(Path::new(&args.companies)).await {
        Ok(sites) => sites,
        Err(e) => {
            error!(path = %args.companies, error = %e, "Cannot load companies table");
            return Err(e.into());
        }
    };
    let table = config::load_selector_table(args.selectors.as_deref().map(Path::new)).await;

    let window = DateWindow::ending_today(args.days);
    info!(
        lower_bound = %window.lower_bound(),
        today = %window.today(),
        days = args.days,
        "Date window"
    );

    // ---- Fetch and extract ----
    let fetcher = HttpFetcher::new(&FetchOptions {
        timeout: Duration::from_secs(args.timeout_secs),
        user_agent: args.user_agent.clone(),
        verify_tls: !args.insecure,
    })?;
    let skip_log = SkipLog::new(&args.skip_log);
    let options = RunOptions {
        window,
        concurrency: usize::from(args.concurrency),
        delay: Duration::from_millis(args.delay_ms),
        infer_dates: args.infer_dates,
    };

    let summary = pipeline::run(&sites, &table, &fetcher, &skip_log, &options).await;

    // ---- Output ----
    match write_records(&summary.records, &args.output_dir, &window).await? {
        PersistOutcome::NoRecords => info!("No recent news found"),
        PersistOutcome::Written { path, count } => {
            info!(path = %path.display(), count, "Saved recent news")
        }
    }

    let skipped = skip_log.entries().await.len();
    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        sites = summary.sites,
        records = summary.records.len(),
        skipped,
        skip_log = %args.skip_log,
        "Execution complete"
    );

    Ok(())
}
