//! Per-site extraction driver.
//!
//! Each configured site moves through
//! `Pending → Fetching → {Parsed, FetchFailed} → {Completed, ExtractionFailed}`:
//!
//! 1. **Fetching**: the page is requested through a [`PageFetcher`]. A failure
//!    is written to the skip log with its category and ends the site.
//! 2. **Parsed**: the selector table decides the strategy. A skip directive is
//!    logged and ends the site; otherwise entries are extracted.
//! 3. **Completed**: every entry is checked on its own (title, link, date,
//!    window) and accepted ones become [`NewsRecord`]s. A page without a
//!    single candidate entry ends as `ExtractionFailed` instead.
//!
//! Sites never affect each other. They run through a bounded pool and the
//! results are put back into configuration order before being returned.

use crate::dates;
use crate::extract::extract;
use crate::fetch::PageFetcher;
use crate::models::{DateText, ExtractedFields, NewsRecord, SiteConfig, SkipCategory, SkipEntry};
use crate::outputs::skip_log::SkipLog;
use crate::selectors::{ExtractionStrategy, SelectorTable, resolve};
use crate::utils::truncate_for_log;
use crate::window::{DateWindow, in_window};
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use rand::{Rng, rng};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Settings shared by every site in a run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub window: DateWindow,
    /// Sites processed at the same time.
    pub concurrency: usize,
    /// Pause before each fetch; zero disables it.
    pub delay: Duration,
    /// Guess inclusion from title / URL when a generic entry's date is unreadable.
    pub infer_dates: bool,
}

/// Terminal state of one site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteStatus {
    Completed,
    FetchFailed,
    Skipped,
    ExtractionFailed,
}

#[derive(Debug, Clone)]
pub struct SiteOutcome {
    /// Position of the site in the companies table.
    pub index: usize,
    pub status: SiteStatus,
    pub records: Vec<NewsRecord>,
}

impl SiteOutcome {
    fn without_records(index: usize, status: SiteStatus) -> Self {
        Self {
            index,
            status,
            records: Vec::new(),
        }
    }
}

/// Aggregate result of a run, records in site order then page order.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub records: Vec<NewsRecord>,
    pub sites: usize,
    pub completed: usize,
    pub fetch_failed: usize,
    pub skipped: usize,
    pub extraction_failed: usize,
}

impl RunSummary {
    fn from_outcomes(outcomes: impl IntoIterator<Item = SiteOutcome>) -> Self {
        let mut summary = RunSummary::default();
        for outcome in outcomes {
            summary.sites += 1;
            match outcome.status {
                SiteStatus::Completed => summary.completed += 1,
                SiteStatus::FetchFailed => summary.fetch_failed += 1,
                SiteStatus::Skipped => summary.skipped += 1,
                SiteStatus::ExtractionFailed => summary.extraction_failed += 1,
            }
            summary.records.extend(outcome.records);
        }
        summary
    }
}

/// Process every site and collect the accepted records.
///
/// # Arguments
///
/// * `sites` - Companies in configuration order
/// * `table` - Selector table, read-only for the whole run
/// * `fetcher` - Page source
/// * `skip_log` - Shared sink for sites that yield nothing
/// * `options` - Window, pool size and pacing
///
/// # Returns
///
/// A [`RunSummary`] whose records are ordered by site, then by position on
/// the page, regardless of the order in which sites finished.
#[instrument(level = "info", skip_all, fields(sites = sites.len(), concurrency = options.concurrency))]
pub async fn run<F: PageFetcher>(
    sites: &[SiteConfig],
    table: &SelectorTable,
    fetcher: &F,
    skip_log: &SkipLog,
    options: &RunOptions,
) -> RunSummary {
    let outcomes: Vec<SiteOutcome> = stream::iter(sites.iter().enumerate())
        .map(|(index, site)| process_site(index, site, table, fetcher, skip_log, options))
        .buffer_unordered(options.concurrency.max(1))
        .collect()
        .await;

    let summary = RunSummary::from_outcomes(outcomes.into_iter().sorted_by_key(|o| o.index));
    info!(
        sites = summary.sites,
        completed = summary.completed,
        fetch_failed = summary.fetch_failed,
        skipped = summary.skipped,
        extraction_failed = summary.extraction_failed,
        records = summary.records.len(),
        "Finished processing sites"
    );
    summary
}

/// Run one site from fetch to accepted records.
///
/// Never fails: every problem ends up in the skip log or as a dropped entry.
#[instrument(level = "info", skip_all, fields(company = %site.company, url = %site.url))]
pub async fn process_site<F: PageFetcher>(
    index: usize,
    site: &SiteConfig,
    table: &SelectorTable,
    fetcher: &F,
    skip_log: &SkipLog,
    options: &RunOptions,
) -> SiteOutcome {
    if !options.delay.is_zero() {
        let jitter_ms: u64 = rng().random_range(0..=250);
        sleep(options.delay + Duration::from_millis(jitter_ms)).await;
    }

    let markup = match fetcher.fetch(&site.url).await {
        Ok(markup) => markup,
        Err(e) => {
            warn!(error = %e, category = e.category().tag(), "Fetch failed; skipping site");
            skip_log
                .record(SkipEntry::new(e.category(), site, e.detail()))
                .await;
            return SiteOutcome::without_records(index, SiteStatus::FetchFailed);
        }
    };

    let page_url = match Url::parse(&site.url) {
        Ok(url) => url,
        Err(e) => {
            warn!(error = %e, "Site URL cannot be used as a link base; skipping site");
            skip_log
                .record(SkipEntry::new(SkipCategory::Unexpected, site, Some(e.to_string())))
                .await;
            return SiteOutcome::without_records(index, SiteStatus::FetchFailed);
        }
    };

    let strategy = resolve(&site.company, table);
    if let ExtractionStrategy::Skip { reason } = &strategy {
        info!(%reason, "Site is marked to skip");
        skip_log
            .record(SkipEntry::new(SkipCategory::SkipDirective, site, Some(reason.clone())))
            .await;
        return SiteOutcome::without_records(index, SiteStatus::Skipped);
    }

    let items = extract(&markup, &strategy, &page_url);
    if items.is_empty() {
        warn!(
            strategy = strategy.kind(),
            preview = %truncate_for_log(&markup, 200),
            "No entries found on page"
        );
        skip_log
            .record(SkipEntry::new(
                SkipCategory::NoItems,
                site,
                Some(format!("no entries found with {} strategy", strategy.kind())),
            ))
            .await;
        return SiteOutcome::without_records(index, SiteStatus::ExtractionFailed);
    }

    let use_heuristic = options.infer_dates && strategy.is_generic();
    let candidates = items.len();
    let records: Vec<NewsRecord> = items
        .into_iter()
        .filter_map(|fields| accept(fields, &site.company, &options.window, use_heuristic))
        .collect();

    info!(candidates, accepted = records.len(), strategy = strategy.kind(), "Processed site");
    SiteOutcome {
        index,
        status: SiteStatus::Completed,
        records,
    }
}

/// Turn one extracted entry into a record if it is complete and recent.
fn accept(
    fields: ExtractedFields,
    company: &str,
    window: &DateWindow,
    use_heuristic: bool,
) -> Option<NewsRecord> {
    let ExtractedFields { title, date, url } = fields;
    let (Some(title), Some(url)) = (title, url) else {
        debug!("Dropping entry without title or link");
        return None;
    };

    let included = match &date {
        DateText::Found(text) => match dates::parse(text) {
            Some(parsed) => {
                let inside = in_window(&parsed, window);
                if !inside {
                    debug!(%title, date = %parsed.date(), "Entry is older than the window");
                }
                inside
            }
            None if use_heuristic => {
                let inferred = window.inferred_from_text(&title, &url);
                debug!(%title, date_text = %text, inferred, "Unparseable date; inferred from title and link");
                inferred
            }
            None => {
                debug!(%title, date_text = %text, "Unparseable date; dropping entry");
                false
            }
        },
        DateText::Missing => {
            debug!(%title, "Date selector matched nothing; dropping entry");
            false
        }
        DateText::NoMatch => {
            debug!(%title, "Date pattern did not match entry text; dropping entry");
            false
        }
    };

    if !included {
        return None;
    }
    info!(%company, %title, %url, "Found");
    Some(NewsRecord {
        company: company.to_string(),
        title,
        url,
    })
}
