//! Per-site extraction strategy resolution.
//!
//! Each company may have a row in the selector table. [`resolve`] turns that
//! row (or its absence) into exactly one [`ExtractionStrategy`]:
//!
//! | Row | Strategy |
//! |-----|----------|
//! | list selector starts with `SKIP` | [`ExtractionStrategy::Skip`] |
//! | all four selectors present and valid | [`ExtractionStrategy::Specific`] |
//! | anything else, including no row | [`ExtractionStrategy::Generic`] |
//!
//! The skip marker is checked first, so `SKIP: needs JavaScript` with no other
//! columns still skips. A date selector written as `regex:<pattern>` extracts
//! the date from the item's whole text instead of a child element.
//!
//! The table is an immutable value passed in by the caller; resolution has no
//! side effects.

use regex::Regex;
use scraper::Selector;
use std::collections::HashMap;

/// Reserved list-selector prefix that turns a row into a skip directive.
pub const SKIP_MARKER: &str = "SKIP";

/// Date-selector prefix for item-text pattern matching.
pub const REGEX_PREFIX: &str = "regex:";

/// One row of the selector table as written in the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectorRow {
    pub list_selector: Option<String>,
    pub title_selector: Option<String>,
    pub date_selector: Option<String>,
    pub link_selector: Option<String>,
}

/// Selector rows keyed by company name.
#[derive(Debug, Clone, Default)]
pub struct SelectorTable {
    rows: HashMap<String, SelectorRow>,
}

impl SelectorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the row for `company`.
    pub fn insert(&mut self, company: impl Into<String>, row: SelectorRow) {
        self.rows.insert(company.into().trim().to_string(), row);
    }

    pub fn get(&self, company: &str) -> Option<&SelectorRow> {
        self.rows.get(company.trim())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// How to find an item's date text.
#[derive(Debug, Clone)]
pub enum DateSelector {
    /// Text of the first matching descendant.
    Element(Selector),
    /// First match of the pattern against the item's flattened text.
    RegexOnItemText(Regex),
}

/// Compiled selectors for a site with a complete table row.
#[derive(Debug, Clone)]
pub struct SpecificSelectors {
    pub list: Selector,
    pub title: Selector,
    pub date: DateSelector,
    pub link: Selector,
}

/// The resolved extraction approach for one site.
#[derive(Debug, Clone)]
pub enum ExtractionStrategy {
    /// Broad structural guesses that work on many listing layouts.
    Generic,
    /// Site-specific selectors from the table.
    Specific(SpecificSelectors),
    /// Do not extract; the reason goes to the skip log.
    Skip { reason: String },
}

impl ExtractionStrategy {
    /// Short name used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractionStrategy::Generic => "generic",
            ExtractionStrategy::Specific(_) => "specific",
            ExtractionStrategy::Skip { .. } => "skip",
        }
    }

    pub fn is_generic(&self) -> bool {
        matches!(self, ExtractionStrategy::Generic)
    }
}

/// Decide the extraction strategy for `site_id`.
///
/// # Arguments
///
/// * `site_id` - Company name as it appears in the companies table
/// * `table` - Selector table loaded at start-up
///
/// # Returns
///
/// `Skip` when the list selector carries the skip marker, `Specific` when
/// all four selectors are non-empty and compile, otherwise `Generic`.
pub fn resolve(site_id: &str, table: &SelectorTable) -> ExtractionStrategy {
    let Some(row) = table.get(site_id) else {
        return ExtractionStrategy::Generic;
    };

    if let Some(reason) = row.list_selector.as_deref().and_then(skip_reason) {
        return ExtractionStrategy::Skip { reason };
    }

    let fields = (
        non_empty(&row.list_selector),
        non_empty(&row.title_selector),
        non_empty(&row.date_selector),
        non_empty(&row.link_selector),
    );
    let (Some(list), Some(title), Some(date), Some(link)) = fields else {
        return ExtractionStrategy::Generic;
    };

    compile(list, title, date, link)
        .map(ExtractionStrategy::Specific)
        .unwrap_or(ExtractionStrategy::Generic)
}

/// Reason text if `value` is a skip directive.
fn skip_reason(value: &str) -> Option<String> {
    let value = value.trim();
    let head = value.get(..SKIP_MARKER.len())?;
    if !head.eq_ignore_ascii_case(SKIP_MARKER) {
        return None;
    }
    let rest = &value[SKIP_MARKER.len()..];
    if !(rest.is_empty() || rest.starts_with(':') || rest.starts_with(char::is_whitespace)) {
        return None;
    }
    let reason = rest.trim_start_matches(':').trim();
    Some(if reason.is_empty() {
        value.to_string()
    } else {
        reason.to_string()
    })
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn compile(list: &str, title: &str, date: &str, link: &str) -> Option<SpecificSelectors> {
    let date = match strip_prefix_ignore_case(date, REGEX_PREFIX) {
        Some(pattern) => DateSelector::RegexOnItemText(Regex::new(pattern.trim()).ok()?),
        None => DateSelector::Element(Selector::parse(date).ok()?),
    };
    Some(SpecificSelectors {
        list: Selector::parse(list).ok()?,
        title: Selector::parse(title).ok()?,
        date,
        link: Selector::parse(link).ok()?,
    })
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &value[prefix.len()..])
}
