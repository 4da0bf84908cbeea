//! RSS and Atom listing documents.
//!
//! Some companies publish their release list as a feed rather than an HTML
//! page. The generic strategy reads `item` (RSS 1.0/2.0) and `entry` (Atom)
//! elements with a streaming XML reader:
//!
//! | Field | Elements |
//! |-------|----------|
//! | title | `title` |
//! | date | `pubDate`, `published`, `dc:date`, `issued`; `updated`/`modified` as fallback |
//! | link | `link` text (RSS) or `link@href` (Atom, `rel="alternate"` or no `rel`) |
//!
//! Entries missing any of the three are dropped.

use super::normalize_link;
use crate::models::{DateText, ExtractedFields};
use crate::utils::normalize_text;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::borrow::Cow;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Published,
    Updated,
    Link,
}

impl Field {
    fn from_local_name(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Field::Title),
            b"pubDate" | b"published" | b"date" | b"issued" => Some(Field::Published),
            b"updated" | b"modified" => Some(Field::Updated),
            b"link" => Some(Field::Link),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct FeedEntry {
    title: Option<String>,
    published: Option<String>,
    updated: Option<String>,
    link: Option<String>,
}

impl FeedEntry {
    fn slot(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::Title => &mut self.title,
            Field::Published => &mut self.published,
            Field::Updated => &mut self.updated,
            Field::Link => &mut self.link,
        }
    }

    fn finish(self, base: &Url) -> Option<ExtractedFields> {
        let title = self.title.map(|t| normalize_text([t.as_str()])).filter(|t| !t.is_empty())?;
        let date = self
            .published
            .or(self.updated)
            .map(|d| normalize_text([d.as_str()]))
            .filter(|d| !d.is_empty())?;
        let url = self.link.and_then(|l| normalize_link(&l, base))?;
        Some(ExtractedFields {
            title: Some(title),
            date: DateText::Found(date),
            url: Some(url),
        })
    }
}

/// Whether `markup` looks like an RSS, RDF or Atom document.
pub fn is_feed(markup: &str) -> bool {
    let head: String = markup
        .trim_start_matches('\u{feff}')
        .trim_start()
        .chars()
        .take(1024)
        .collect::<String>()
        .to_ascii_lowercase();

    if head.starts_with("<rss") || head.starts_with("<feed") || head.starts_with("<rdf:rdf") {
        return true;
    }
    head.starts_with("<?xml")
        && (head.contains("<rss") || head.contains("<feed") || head.contains("<rdf:rdf"))
}

/// Extract `item` / `entry` elements from a feed document.
///
/// Malformed XML stops the scan; entries completed before the error are
/// still returned.
pub fn extract_entries(markup: &str, base: &Url) -> Vec<ExtractedFields> {
    let mut reader = Reader::from_str(markup);
    let mut entries = Vec::new();
    let mut current: Option<FeedEntry> = None;
    let mut field: Option<Field> = None;
    let mut dropped = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.local_name();
                let name = name.as_ref();
                if name == b"item" || name == b"entry" {
                    current = Some(FeedEntry::default());
                    field = None;
                    continue;
                }
                let Some(entry) = current.as_mut() else {
                    continue;
                };
                field = Field::from_local_name(name).filter(|f| entry.slot(*f).is_none());
                if field == Some(Field::Link) {
                    if let Some(href) = alternate_href(&e) {
                        entry.link = Some(href);
                        field = None;
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                if let Some(entry) = current.as_mut() {
                    if e.local_name().as_ref() == b"link" && entry.link.is_none() {
                        entry.link = alternate_href(&e);
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if let (Some(entry), Some(f)) = (current.as_mut(), field) {
                    append(entry.slot(f), &unescape_lossy(&t));
                }
            }
            Ok(Event::CData(c)) => {
                if let (Some(entry), Some(f)) = (current.as_mut(), field) {
                    append(entry.slot(f), &String::from_utf8_lossy(&c));
                }
            }
            Ok(Event::GeneralRef(r)) => {
                if let (Some(entry), Some(f)) = (current.as_mut(), field) {
                    let name = String::from_utf8_lossy(&r);
                    let resolved = resolve_reference(&name).unwrap_or_else(|| format!("&{name};"));
                    append(entry.slot(f), &resolved);
                }
            }
            Ok(Event::End(e)) => {
                let name = e.local_name();
                let name = name.as_ref();
                if name == b"item" || name == b"entry" {
                    if let Some(entry) = current.take() {
                        match entry.finish(base) {
                            Some(fields) => entries.push(fields),
                            None => dropped += 1,
                        }
                    }
                }
                field = None;
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                debug!(error = %e, parsed = entries.len(), "Feed parsing stopped early");
                break;
            }
            _ => {}
        }
    }

    if dropped > 0 {
        debug!(dropped, "Feed entries without title, date or link were dropped");
    }
    entries
}

fn append(slot: &mut Option<String>, text: &str) {
    if slot.is_none() && text.trim().is_empty() {
        return;
    }
    slot.get_or_insert_with(String::new).push_str(text);
}

/// `href` of an Atom link that points at the entry itself.
fn alternate_href(e: &BytesStart<'_>) -> Option<String> {
    let mut href = None;
    let mut rel = None;
    for attr in e.attributes().flatten() {
        match attr.key.local_name().as_ref() {
            b"href" => href = Some(unescape_lossy(&attr.value)),
            b"rel" => rel = Some(unescape_lossy(&attr.value)),
            _ => {}
        }
    }
    match rel.as_deref() {
        None | Some("alternate") => href.filter(|h| !h.trim().is_empty()),
        Some(_) => None,
    }
}

fn unescape_lossy(bytes: &[u8]) -> String {
    let raw = String::from_utf8_lossy(bytes);
    quick_xml::escape::unescape(&raw)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| raw.to_string())
}

/// Resolve a character reference or one of the predefined XML entities.
fn resolve_reference(name: &str) -> Option<String> {
    if let Some(number) = name.strip_prefix('#') {
        let code = match number.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => number.parse().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }
    let entity = match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        _ => return None,
    };
    Some(entity.to_string())
}
