//! Listing-page item extraction.
//!
//! Turns fetched markup plus a resolved [`ExtractionStrategy`] into a list of
//! [`ExtractedFields`], one per news entry found on the page. Nothing here
//! decides whether an entry is recent enough or logs failures; that is the
//! pipeline's job.
//!
//! # Submodules
//!
//! - [`html`]: CSS-selector extraction for regular HTML listing pages
//!   (site-specific selectors and the generic fallback)
//! - [`feed`]: RSS / Atom documents, handled by the generic strategy
//!
//! # Link Normalization
//!
//! Every extracted link without a scheme is resolved against the page URL,
//! so `/news/1` on `https://example.com/ir/` becomes
//! `https://example.com/news/1`.

pub mod feed;
pub mod html;

use crate::models::ExtractedFields;
use crate::selectors::ExtractionStrategy;
use scraper::Html;
use tracing::debug;
use url::Url;

/// Extract candidate entries from a listing page.
///
/// # Arguments
///
/// * `markup` - Decoded page body
/// * `strategy` - Resolved strategy for the site
/// * `page_url` - URL the page was fetched from, used to absolutize links
///
/// # Returns
///
/// The entries in document order. `Skip` always yields an empty list.
pub fn extract(markup: &str, strategy: &ExtractionStrategy, page_url: &Url) -> Vec<ExtractedFields> {
    let items = match strategy {
        ExtractionStrategy::Skip { .. } => Vec::new(),
        ExtractionStrategy::Specific(selectors) => {
            let document = Html::parse_document(markup);
            html::extract_specific(&document, selectors, page_url)
        }
        ExtractionStrategy::Generic if feed::is_feed(markup) => feed::extract_entries(markup, page_url),
        ExtractionStrategy::Generic => {
            let document = Html::parse_document(markup);
            html::extract_generic(&document, page_url)
        }
    };
    debug!(strategy = strategy.kind(), count = items.len(), "Extracted listing entries");
    items
}

/// Make `raw` absolute, resolving it against `base` when it has no scheme.
///
/// Returns `None` for blank input or input that cannot be joined.
pub fn normalize_link(raw: &str, base: &Url) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if Url::parse(raw).is_ok() {
        return Some(raw.to_string());
    }
    base.join(raw).ok().map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DateText;
    use crate::selectors::{SelectorRow, SelectorTable, resolve};

    fn base() -> Url {
        Url::parse("https://example.com/ir/news/").unwrap()
    }

    #[test]
    fn test_normalize_link() {
        assert_eq!(
            normalize_link("/news/1", &base()).as_deref(),
            Some("https://example.com/news/1")
        );
        assert_eq!(
            normalize_link("2024/05.html", &base()).as_deref(),
            Some("https://example.com/ir/news/2024/05.html")
        );
        assert_eq!(
            normalize_link("//cdn.example.com/a.pdf", &base()).as_deref(),
            Some("https://cdn.example.com/a.pdf")
        );
        assert_eq!(
            normalize_link(" https://other.example/x ", &base()).as_deref(),
            Some("https://other.example/x")
        );
        assert_eq!(normalize_link("   ", &base()), None);
    }

    #[test]
    fn test_skip_yields_nothing() {
        let markup = r#"<article><h2>Title</h2><time>2024-05-10</time><a href="/a">x</a></article>"#;
        let strategy = ExtractionStrategy::Skip {
            reason: "requires JavaScript".into(),
        };
        assert!(extract(markup, &strategy, &base()).is_empty());
    }

    #[test]
    fn test_generic_routes_feeds_to_feed_reader() {
        let markup = r#"<?xml version="1.0"?>
            <rss version="2.0"><channel><title>IR</title>
              <item><title>Dividend notice</title><link>https://example.com/d</link>
                <pubDate>Fri, 10 May 2024 09:00:00 +0900</pubDate></item>
            </channel></rss>"#;
        let items = extract(markup, &ExtractionStrategy::Generic, &base());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title.as_deref(), Some("Dividend notice"));
    }

    #[test]
    fn test_specific_strategy_from_table() {
        let mut table = SelectorTable::new();
        table.insert(
            "Acme",
            SelectorRow {
                list_selector: Some("ul.releases > li".into()),
                title_selector: Some(".ttl".into()),
                date_selector: Some(".dt".into()),
                link_selector: Some("a".into()),
            },
        );
        let markup = r#"<ul class="releases">
            <li><span class="dt">2024.05.15</span><a href="/r/1"><span class="ttl">Q1 Results</span></a></li>
            <li><span class="dt">2024.05.01</span><a href="/r/2"><span class="ttl">AGM</span></a></li>
        </ul>"#;
        let items = extract(markup, &resolve("Acme", &table), &base());
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].date, DateText::Found("2024.05.01".into()));
        assert_eq!(items[1].url.as_deref(), Some("https://example.com/r/2"));
    }
}
