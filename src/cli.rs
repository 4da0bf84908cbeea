//! Command-line interface definitions for Release Radar.
//!
//! All arguments can be provided via command-line flags or environment
//! variables.

use crate::fetch::DEFAULT_USER_AGENT;
use clap::Parser;

/// Command-line arguments for a Release Radar run.
///
/// # Examples
///
/// ```sh
/// # Last week's releases for the companies in ./companies.csv
/// release_radar
///
/// # Two weeks, custom tables, output into ./out
/// release_radar --days 14 --companies ir.csv --selectors ir_selectors.csv -o ./out
///
/// # Sites with broken certificate chains, politely paced
/// release_radar --insecure --concurrency 2 --delay-ms 1000
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Companies table (columns: company,url)
    #[arg(short, long, env = "RADAR_COMPANIES", default_value = "companies.csv")]
    pub companies: String,

    /// Selector table (columns: company,list_selector,title_selector,date_selector,link_selector); selectors.csv is used when present
    #[arg(short, long, env = "RADAR_SELECTORS")]
    pub selectors: Option<String>,

    /// Lookback window in days
    #[arg(short, long, env = "RADAR_DAYS", default_value_t = 7)]
    pub days: u32,

    /// Output directory for the release file
    #[arg(short, long, env = "RADAR_OUTPUT_DIR", default_value = ".")]
    pub output_dir: String,

    /// Skip log path (appended to)
    #[arg(long, env = "RADAR_SKIP_LOG", default_value = "skipped_sites.log")]
    pub skip_log: String,

    /// Per-request timeout in seconds
    #[arg(long, env = "RADAR_TIMEOUT_SECS", default_value_t = 15)]
    pub timeout_secs: u64,

    /// Accept invalid TLS certificates
    #[arg(long, env = "RADAR_INSECURE")]
    pub insecure: bool,

    /// User-Agent header sent with every request
    #[arg(long, env = "RADAR_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Number of sites fetched at the same time
    #[arg(long, env = "RADAR_CONCURRENCY", default_value_t = 4, value_parser = clap::value_parser!(u16).range(1..))]
    pub concurrency: u16,

    /// Pause before each fetch in milliseconds (0-250ms jitter is added when non-zero)
    #[arg(long, env = "RADAR_DELAY_MS", default_value_t = 0)]
    pub delay_ms: u64,

    /// Guess dates from titles and links when a generic entry's date cannot be parsed
    #[arg(long, env = "RADAR_INFER_DATES")]
    pub infer_dates: bool,
}
