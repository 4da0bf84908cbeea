//! Free-text date parsing for listing entries.
//!
//! Corporate listing pages print dates in many shapes. [`parse`] runs an
//! ordered list of independent recognizers and returns the first one that
//! yields a valid calendar date:
//!
//! | Order | Recognizer | Examples |
//! |-------|------------|----------|
//! | 1 | Numeric `YYYY sep MM sep DD` | `2024年5月15日`, `2024/05/15`, `2024.5.15`, `2024-05-15`, `２０２４年５月１５日` |
//! | 2 | ISO 8601 date-time | `2024-05-15T09:30:00+09:00`, `2024-05-15T09:30:00Z` |
//! | 3 | RFC 2822 (RSS `pubDate`) | `Wed, 15 May 2024 09:30:00 +0000` |
//! | 4 | English day/month/year | `15 May, 2024`, `May 15, 2024`, `Sep 3 2024` |
//! | 5 | Embedded month/day/year scan | `Posted on the 3rd of... June 3rd, 2024 by IR` |
//!
//! A recognizer whose pattern matches but whose numbers are not a real date
//! (day 32, month 13) is a non-match; the next recognizer is tried.
//! Relative dates ("3 days ago") are not understood.

use crate::models::ParsedDate;
use crate::utils::capitalize;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::trace;

type Recognizer = fn(&str) -> Option<ParsedDate>;

/// Recognizers in priority order; the first success wins.
const RECOGNIZERS: &[(&str, Recognizer)] = &[
    ("numeric", parse_numeric),
    ("iso8601", parse_iso8601),
    ("rfc2822", parse_rfc2822),
    ("english", parse_english),
    ("embedded", scan_embedded),
];

static NUMERIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"([0-9０-９]{4})\s*([年/.\-／．])\s*([0-9０-９]{1,2})\s*([月/.\-／．])\s*([0-9０-９]{1,2})\s*日?",
    )
    .unwrap()
});

static ISO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([0-9]{4}-[0-9]{2}-[0-9]{2})T([0-9][0-9:.,]*(?:Z|z|[+-][0-9]{2}:?[0-9]{2})?)")
        .unwrap()
});

static DAY_MONTH_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]{1,2})\s+([A-Za-z]+)\.?,?\s+([0-9]{4})$").unwrap()
});

static MONTH_DAY_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z]+)\.?\s+([0-9]{1,2}),?\s+([0-9]{4})$").unwrap()
});

static EMBEDDED_MONTH_FIRST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Za-z]{3,9})\.?\s+([0-9]{1,2})(?:st|nd|rd|th)?,?\s+([0-9]{4})\b").unwrap()
});

static EMBEDDED_DAY_FIRST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([0-9]{1,2})(?:st|nd|rd|th)?\s+([A-Za-z]{3,9})\.?,?\s+([0-9]{4})\b").unwrap()
});

/// English month names and abbreviations, keyed in capitalized form.
static MONTHS: Lazy<HashMap<&'static str, u32>> = Lazy::new(|| {
    const NAMES: [&str; 12] = [
        "January",
        "February",
        "March",
        "April",
        "May",
        "June",
        "July",
        "August",
        "September",
        "October",
        "November",
        "December",
    ];
    let mut map = HashMap::with_capacity(25);
    for (i, name) in NAMES.iter().enumerate() {
        let number = i as u32 + 1;
        map.insert(*name, number);
        map.insert(&name[..3], number);
    }
    map.insert("Sept", 9);
    map
});

/// Parse a free-text date fragment.
///
/// # Arguments
///
/// * `text` - Date text as found on the page
///
/// # Returns
///
/// The first date any recognizer produced, or `None` when nothing matched.
pub fn parse(text: &str) -> Option<ParsedDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    RECOGNIZERS.iter().find_map(|(name, recognize)| {
        let parsed = recognize(text)?;
        trace!(recognizer = *name, input = text, date = %parsed.date, "Date recognized");
        Some(parsed)
    })
}

/// Look up an English month name or abbreviation, ignoring case.
pub fn month_number(name: &str) -> Option<u32> {
    MONTHS.get(capitalize(name).as_str()).copied()
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(
        ascii_digits(year).parse().ok()?,
        ascii_digits(month).parse().ok()?,
        ascii_digits(day).parse().ok()?,
    )
}

/// Map full-width digits (`０`-`９`) to ASCII.
fn ascii_digits(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '０'..='９' => char::from(b'0' + (c as u32 - '０' as u32) as u8),
            other => other,
        })
        .collect()
}

fn parse_numeric(text: &str) -> Option<ParsedDate> {
    let caps = NUMERIC_RE.captures(text)?;
    let whole = caps.get(0)?;

    // `2024-05-15T09:30` belongs to the ISO recognizer, which keeps the time.
    if &caps[2] == "-" && &caps[4] == "-" {
        let mut rest = text[whole.end()..].chars();
        if matches!(rest.next(), Some('T' | 't')) && rest.next().is_some_and(|c| c.is_ascii_digit()) {
            return None;
        }
    }

    ymd(&caps[1], &caps[3], &caps[5]).map(ParsedDate::from_date)
}

fn parse_iso8601(text: &str) -> Option<ParsedDate> {
    let caps = ISO_RE.captures(text)?;
    let whole = caps.get(0)?.as_str();
    let date_part = &caps[1];

    if let Ok(dt) = DateTime::parse_from_rfc3339(whole) {
        let local = dt.naive_local();
        return Some(ParsedDate::with_time(local.date(), local.time()));
    }
    // Offsets rfc3339 rejects (`+0900`) or a missing seconds field.
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok((dt, _)) = NaiveDateTime::parse_and_remainder(whole, fmt) {
            return Some(ParsedDate::with_time(dt.date(), dt.time()));
        }
    }

    // The time component is unusable; the date before the `T` still counts.
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .ok()
        .map(ParsedDate::from_date)
}

fn parse_rfc2822(text: &str) -> Option<ParsedDate> {
    let dt = DateTime::parse_from_rfc2822(text).ok()?;
    let local = dt.naive_local();
    Some(ParsedDate::with_time(local.date(), local.time()))
}

fn parse_english(text: &str) -> Option<ParsedDate> {
    if let Some(caps) = DAY_MONTH_YEAR_RE.captures(text) {
        if let Some(date) = english_date(&caps[3], &caps[2], &caps[1]) {
            return Some(ParsedDate::from_date(date));
        }
    }
    let caps = MONTH_DAY_YEAR_RE.captures(text)?;
    english_date(&caps[3], &caps[1], &caps[2]).map(ParsedDate::from_date)
}

fn scan_embedded(text: &str) -> Option<ParsedDate> {
    let month_first = EMBEDDED_MONTH_FIRST_RE
        .captures_iter(text)
        .find_map(|caps| english_date(&caps[3], &caps[1], &caps[2]));
    month_first
        .or_else(|| {
            EMBEDDED_DAY_FIRST_RE
                .captures_iter(text)
                .find_map(|caps| english_date(&caps[3], &caps[2], &caps[1]))
        })
        .map(ParsedDate::from_date)
}

fn english_date(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    let month = month_number(month)?;
    NaiveDate::from_ymd_opt(year.parse().ok()?, month, day.parse().ok()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, NaiveTime};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn parsed_date(text: &str) -> Option<NaiveDate> {
        parse(text).map(|p| p.date())
    }

    #[test]
    fn test_numeric_separators() {
        for text in [
            "2024年5月15日",
            "2024年05月15日",
            "2024年5月15",
            "2024/05/15",
            "2024/5/15",
            "2024.05.15",
            "2024-05-15",
            "2024 年 5 月 15 日",
            "２０２４年５月１５日",
            "２０２４／０５／１５",
            "2024年５月15日",
        ] {
            assert_eq!(parsed_date(text), Some(d(2024, 5, 15)), "input: {text}");
        }
    }

    #[test]
    fn test_numeric_embedded_in_text() {
        assert_eq!(parsed_date("Posted 2024-05-10 — update"), Some(d(2024, 5, 10)));
        assert_eq!(parsed_date("[お知らせ] 2023.12.01 更新"), Some(d(2023, 12, 1)));
    }

    #[test]
    fn test_numeric_calendar_invalid_is_non_match() {
        assert_eq!(parsed_date("2024/13/45"), None);
        assert_eq!(parsed_date("2023-02-29"), None);
        assert_eq!(parsed_date("2024-02-29"), Some(d(2024, 2, 29)));
    }

    #[test]
    fn test_invalid_numeric_falls_through_to_english() {
        // Numeric part is not a real date, the English part is.
        assert_eq!(
            parsed_date("ref 2024/99/99, published May 2, 2024"),
            Some(d(2024, 5, 2))
        );
    }

    #[test]
    fn test_iso8601_keeps_time() {
        let p = parse("2024-05-15T09:30:00+09:00").unwrap();
        assert_eq!(p.date(), d(2024, 5, 15));
        assert_eq!(p.time, NaiveTime::from_hms_opt(9, 30, 0));

        let p = parse("2024-05-15T23:10:05Z").unwrap();
        assert_eq!(p.date(), d(2024, 5, 15));
        assert_eq!(p.time, NaiveTime::from_hms_opt(23, 10, 5));

        let p = parse("2024-05-15T08:00:00").unwrap();
        assert_eq!(p.time, NaiveTime::from_hms_opt(8, 0, 0));
    }

    #[test]
    fn test_time_suffix_on_slash_and_dot_dates() {
        assert_eq!(parsed_date("2024/05/15T10:00"), Some(d(2024, 5, 15)));
        assert_eq!(parsed_date("2024.05.15T10:00"), Some(d(2024, 5, 15)));
    }

    #[test]
    fn test_iso8601_bad_time_uses_date_portion() {
        let p = parse("2024-05-15T99:99:99").unwrap();
        assert_eq!(p.date(), d(2024, 5, 15));
        assert_eq!(p.time, None);
    }

    #[test]
    fn test_rfc2822() {
        let p = parse("Wed, 15 May 2024 10:00:00 +0000").unwrap();
        assert_eq!(p.date(), d(2024, 5, 15));
        assert_eq!(p.time, NaiveTime::from_hms_opt(10, 0, 0));
    }

    #[test]
    fn test_english_formats() {
        for text in [
            "15 May, 2024",
            "15 May 2024",
            "May 15, 2024",
            "MAY 15, 2024",
            "may 15 2024",
            "Sep 3, 2024",
            "Sept. 3, 2024",
            "3 September, 2024",
        ] {
            let expected = if text.contains('3') && !text.contains("15") {
                d(2024, 9, 3)
            } else {
                d(2024, 5, 15)
            };
            assert_eq!(parsed_date(text), Some(expected), "input: {text}");
        }
    }

    #[test]
    fn test_embedded_scan() {
        assert_eq!(
            parsed_date("Press release | June 3rd, 2024 | Investor Relations"),
            Some(d(2024, 6, 3))
        );
        assert_eq!(
            parsed_date("Released on 21st March 2024 to all holders"),
            Some(d(2024, 3, 21))
        );
        // The first candidate is not a month; the second one is.
        assert_eq!(
            parsed_date("Section 12 2024 notes, updated Jan 9 2024"),
            Some(d(2024, 1, 9))
        );
    }

    #[test]
    fn test_unparseable() {
        assert_eq!(parse(""), None);
        assert_eq!(parse("   "), None);
        assert_eq!(parse("3 days ago"), None);
        assert_eq!(parse("Foo 32, 2024"), None);
        assert_eq!(parse("May 32, 2024"), None);
        assert_eq!(parse("24/05/15"), None);
    }

    #[test]
    fn test_month_number() {
        assert_eq!(month_number("january"), Some(1));
        assert_eq!(month_number("DEC"), Some(12));
        assert_eq!(month_number("Sept"), Some(9));
        assert_eq!(month_number("Mayo"), None);
    }

    #[test]
    fn test_every_day_of_a_year_round_trips_through_each_format() {
        let mut day = d(2024, 1, 1);
        while day.year() == 2024 {
            let formats = [
                day.format("%Y年%-m月%-d日").to_string(),
                day.format("%Y/%m/%d").to_string(),
                day.format("%Y.%m.%d").to_string(),
                day.format("%Y-%m-%d").to_string(),
                day.format("%Y-%m-%dT12:00:00Z").to_string(),
                day.format("%d %B, %Y").to_string(),
                day.format("%B %d, %Y").to_string(),
                day.format("%b %-d, %Y").to_string(),
            ];
            for text in formats {
                assert_eq!(parsed_date(&text), Some(day), "input: {text}");
            }
            day = day.succ_opt().unwrap();
        }
    }
}
