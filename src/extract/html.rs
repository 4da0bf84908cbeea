//! CSS-selector extraction for HTML listing pages.

use super::normalize_link;
use crate::models::{DateText, ExtractedFields};
use crate::selectors::{DateSelector, SpecificSelectors};
use crate::utils::normalize_text;
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use url::Url;

static GENERIC_ITEM: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(
        "article, li, div.news-item, div.news-list-item, div.news_item, div.entry, div.post",
    )
    .unwrap()
});

static GENERIC_TITLE: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("h1, h2, h3, h4, .news-title, .entry-title, .title, a[title]").unwrap()
});

static GENERIC_DATE: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(
        r#"time, .news-date, .entry-date, .date, .published, [class*="date"], [class*="Date"]"#,
    )
    .unwrap()
});

static GENERIC_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

/// Extract entries with site-specific selectors.
///
/// Every element matching the list selector becomes one entry, even when
/// some of its fields are missing; the pipeline decides what to drop.
pub fn extract_specific(document: &Html, selectors: &SpecificSelectors, base: &Url) -> Vec<ExtractedFields> {
    document
        .select(&selectors.list)
        .map(|item| {
            let title = first_match(item, &selectors.title)
                .map(title_text)
                .filter(|t| !t.is_empty());

            let date = match &selectors.date {
                DateSelector::Element(selector) => match first_match(item, selector) {
                    Some(el) => DateText::Found(date_text(el)),
                    None => DateText::Missing,
                },
                DateSelector::RegexOnItemText(pattern) => {
                    let text = element_text(item);
                    match pattern.find(&text) {
                        Some(m) => DateText::Found(m.as_str().to_string()),
                        None => DateText::NoMatch,
                    }
                }
            };

            let url = first_match(item, &selectors.link)
                .and_then(link_value)
                .and_then(|raw| normalize_link(&raw, base));

            ExtractedFields { title, date, url }
        })
        .collect()
}

/// Extract entries using broad structural guesses.
///
/// An entry is kept only when a title, a date element and a link are all
/// found inside it. Nested containers can surface the same entry twice, so
/// results are de-duplicated on title and URL.
pub fn extract_generic(document: &Html, base: &Url) -> Vec<ExtractedFields> {
    document
        .select(&GENERIC_ITEM)
        .filter_map(|item| {
            let title_el = item.select(&GENERIC_TITLE).next()?;
            let date_el = item.select(&GENERIC_DATE).next()?;
            let link_el = item.select(&GENERIC_LINK).next()?;

            let title = title_text(title_el);
            if title.is_empty() {
                return None;
            }
            let url = link_value(link_el).and_then(|raw| normalize_link(&raw, base))?;

            Some(ExtractedFields {
                title: Some(title),
                date: DateText::Found(date_text(date_el)),
                url: Some(url),
            })
        })
        .unique_by(|fields| (fields.title.clone(), fields.url.clone()))
        .collect()
}

/// First descendant of `item` matching `selector`, or `item` itself.
fn first_match<'a>(item: ElementRef<'a>, selector: &Selector) -> Option<ElementRef<'a>> {
    item.select(selector)
        .next()
        .or_else(|| selector.matches(&item).then_some(item))
}

fn element_text(el: ElementRef<'_>) -> String {
    normalize_text(el.text())
}

fn title_text(el: ElementRef<'_>) -> String {
    let text = element_text(el);
    if !text.is_empty() {
        return text;
    }
    el.value().attr("title").map(str::trim).unwrap_or_default().to_string()
}

/// Visible text, or the machine-readable `datetime` attribute when the
/// element has no text.
fn date_text(el: ElementRef<'_>) -> String {
    let text = element_text(el);
    if !text.is_empty() {
        return text;
    }
    el.value()
        .attr("datetime")
        .or_else(|| el.value().attr("content"))
        .map(str::trim)
        .unwrap_or_default()
        .to_string()
}

/// The link target of an element.
///
/// Only `href` counts. The exception is a `<link>` element without one: it
/// is void in HTML, so a feed-style `<link>https://…</link>` leaves its URL
/// in the following text node, which is used instead.
fn link_value(el: ElementRef<'_>) -> Option<String> {
    if let Some(href) = el.value().attr("href").map(str::trim).filter(|h| !h.is_empty()) {
        return Some(href.to_string());
    }
    if el.value().name() != "link" {
        return None;
    }
    let text = element_text(el);
    if !text.is_empty() {
        return Some(text);
    }
    el.next_siblings()
        .find_map(|node| {
            node.value()
                .as_text()
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
        })
        .map(str::to_string)
}
