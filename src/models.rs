//! Data models shared by the extraction pipeline.
//!
//! This module defines the core data structures that flow between stages:
//! - [`SiteConfig`]: One configured company and its listing page
//! - [`ExtractedFields`]: Raw, nullable fields pulled from one listing entry
//! - [`DateText`]: Where an entry's date text came from (or why it is missing)
//! - [`ParsedDate`]: A calendar date with an optional time-of-day
//! - [`NewsRecord`]: An accepted release, the only shape that gets persisted
//! - [`SkipEntry`] / [`SkipCategory`]: Diagnostics for sites that could not be processed

use chrono::{DateTime, Local, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A company whose news-listing page should be checked.
///
/// Loaded once from the companies table and never mutated afterwards.
///
/// # Fields
///
/// * `company` - Display name, also the key into the selector table
/// * `url` - The listing page to fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    /// Company (site) identifier.
    pub company: String,
    /// Listing-page URL.
    pub url: String,
}

/// The date text of a listing entry, or the reason there is none.
///
/// `Missing` and `NoMatch` are kept apart so the orchestrator can tell a
/// date selector that found no element from a date pattern that found no
/// text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateText {
    /// Date text was located.
    Found(String),
    /// The date selector matched no element inside the item.
    Missing,
    /// The date pattern did not match the item's text.
    NoMatch,
}

/// Fields pulled out of one listing entry before any validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFields {
    /// Trimmed title text.
    pub title: Option<String>,
    /// Date text or the reason it is absent.
    pub date: DateText,
    /// Absolute link to the release.
    pub url: Option<String>,
}

/// A calendar date, optionally with the time-of-day it was published at.
///
/// Only [`ParsedDate::date`] takes part in window comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedDate {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
}

impl ParsedDate {
    pub fn from_date(date: NaiveDate) -> Self {
        Self { date, time: None }
    }

    pub fn with_time(date: NaiveDate, time: NaiveTime) -> Self {
        Self {
            date,
            time: Some(time),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }
}

/// A news release that passed the date window.
///
/// Field order is the column order of the output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsRecord {
    /// Company name as configured.
    pub company: String,
    /// Release title.
    pub title: String,
    /// Absolute release URL.
    pub url: String,
}

/// Why a site produced no records.
///
/// Every variant has a stable [`SkipCategory::tag`] written to the skip log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipCategory {
    /// HTTP 403.
    Forbidden,
    /// Any other non-success HTTP status.
    HttpError(u16),
    /// Certificate or handshake failure.
    TlsError,
    /// The request did not finish within the configured timeout.
    Timeout,
    /// Connection, DNS, redirect or body transfer failure.
    NetworkError,
    /// Anything the fetcher could not classify.
    Unexpected,
    /// The selector table told us to leave this site alone.
    SkipDirective,
    /// The page was fetched but no candidate entries were found.
    NoItems,
}

impl SkipCategory {
    pub fn tag(&self) -> &'static str {
        match self {
            SkipCategory::Forbidden => "forbidden",
            SkipCategory::HttpError(_) => "http-error",
            SkipCategory::TlsError => "tls-error",
            SkipCategory::Timeout => "timeout",
            SkipCategory::NetworkError => "network-error",
            SkipCategory::Unexpected => "unexpected",
            SkipCategory::SkipDirective => "skip-directive",
            SkipCategory::NoItems => "no-items",
        }
    }
}

impl fmt::Display for SkipCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipCategory::HttpError(status) => write!(f, "{} {}", self.tag(), status),
            other => f.write_str(other.tag()),
        }
    }
}

/// One line of the skip log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipEntry {
    pub timestamp: DateTime<Local>,
    pub category: SkipCategory,
    pub company: String,
    pub url: String,
    /// Free-form detail such as the error message or the skip reason.
    pub detail: Option<String>,
}

impl SkipEntry {
    pub fn new(category: SkipCategory, site: &SiteConfig, detail: Option<String>) -> Self {
        Self {
            timestamp: Local::now(),
            category,
            company: site.company.clone(),
            url: site.url.clone(),
            detail,
        }
    }

    /// Render the entry as a single log line (without trailing newline).
    pub fn to_line(&self) -> String {
        let mut line = format!(
            "{}: Skipped ({}) - {} - {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.6f"),
            self.category,
            self.company,
            self.url
        );
        if let Some(detail) = &self.detail {
            line.push_str(" - ");
            line.push_str(detail);
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> SiteConfig {
        SiteConfig {
            company: "Acme".to_string(),
            url: "https://acme.example/news".to_string(),
        }
    }

    #[test]
    fn test_skip_category_tags_are_distinct() {
        let all = [
            SkipCategory::Forbidden,
            SkipCategory::HttpError(500),
            SkipCategory::TlsError,
            SkipCategory::Timeout,
            SkipCategory::NetworkError,
            SkipCategory::Unexpected,
            SkipCategory::SkipDirective,
            SkipCategory::NoItems,
        ];
        let mut tags: Vec<&str> = all.iter().map(|c| c.tag()).collect();
        tags.sort();
        tags.dedup();
        assert_eq!(tags.len(), all.len());
    }

    #[test]
    fn test_http_error_display_includes_status() {
        assert_eq!(SkipCategory::HttpError(502).to_string(), "http-error 502");
        assert_eq!(SkipCategory::Forbidden.to_string(), "forbidden");
    }

    #[test]
    fn test_skip_entry_line_format() {
        let entry = SkipEntry::new(SkipCategory::Timeout, &site(), None);
        let line = entry.to_line();
        assert!(line.contains(": Skipped (timeout) - Acme - https://acme.example/news"));
        assert!(!line.ends_with(" - "));

        let entry = SkipEntry::new(
            SkipCategory::SkipDirective,
            &site(),
            Some("requires JavaScript".to_string()),
        );
        assert!(entry.to_line().ends_with(" - requires JavaScript"));
    }
}
