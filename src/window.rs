//! The trailing date window releases must fall into.
//!
//! A [`DateWindow`] is computed once at start-up from "today" and the
//! configured lookback, and is read-only for the rest of the run.

use crate::models::ParsedDate;
use chrono::{Datelike, Duration, Local, NaiveDate};

/// Inclusive window `[today - days_within, today]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    lower_bound: NaiveDate,
    today: NaiveDate,
}

impl DateWindow {
    /// Build a window ending at `today` and reaching `days_within` days back.
    pub fn new(today: NaiveDate, days_within: u32) -> Self {
        Self {
            lower_bound: today - Duration::days(i64::from(days_within)),
            today,
        }
    }

    /// Build a window ending at the local calendar date.
    pub fn ending_today(days_within: u32) -> Self {
        Self::new(Local::now().date_naive(), days_within)
    }

    pub fn lower_bound(&self) -> NaiveDate {
        self.lower_bound
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Whether a parsed date is on or after the lower bound.
    ///
    /// Only the calendar date is compared; a time-of-day never pushes a
    /// release out of the window.
    pub fn contains(&self, parsed: &ParsedDate) -> bool {
        parsed.date() >= self.lower_bound
    }

    /// Best-effort guess for entries whose date text could not be parsed.
    ///
    /// Accepts when the title or URL mentions a day number between the lower
    /// bound's day and today's day, the lower bound's or today's month
    /// number, and today's four-digit year. This is plain substring matching
    /// and can both miss and over-match; a window whose lower bound is in an
    /// earlier month than today has an empty day range and never matches.
    pub fn inferred_from_text(&self, title: &str, url: &str) -> bool {
        let mentions = |needle: &str| title.contains(needle) || url.contains(needle);

        let day_hit = (self.lower_bound.day()..=self.today.day()).any(|d| mentions(&d.to_string()));
        let month_hit = [self.lower_bound.month(), self.today.month()]
            .iter()
            .any(|m| mentions(&m.to_string()));
        let year_hit = mentions(&self.today.year().to_string());

        day_hit && month_hit && year_hit
    }
}

/// Inclusion test for a structured date.
pub fn in_window(parsed: &ParsedDate, window: &DateWindow) -> bool {
    window.contains(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_bounds() {
        let window = DateWindow::new(d(2024, 5, 16), 7);
        assert_eq!(window.lower_bound(), d(2024, 5, 9));
        assert_eq!(window.today(), d(2024, 5, 16));

        let window = DateWindow::new(d(2024, 3, 2), 7);
        assert_eq!(window.lower_bound(), d(2024, 2, 24));
    }

    #[test]
    fn test_lower_bound_is_inclusive() {
        let window = DateWindow::new(d(2024, 5, 16), 7);
        assert!(in_window(&ParsedDate::from_date(d(2024, 5, 9)), &window));
        assert!(!in_window(&ParsedDate::from_date(d(2024, 5, 8)), &window));
        assert!(in_window(&ParsedDate::from_date(d(2024, 5, 16)), &window));
    }

    #[test]
    fn test_time_of_day_is_ignored() {
        let window = DateWindow::new(d(2024, 5, 16), 7);
        let late_before = ParsedDate::with_time(d(2024, 5, 8), NaiveTime::from_hms_opt(23, 59, 59).unwrap());
        let early_on = ParsedDate::with_time(d(2024, 5, 9), NaiveTime::from_hms_opt(0, 0, 0).unwrap());
        assert!(!window.contains(&late_before));
        assert!(window.contains(&early_on));
    }

    #[test]
    fn test_every_day_before_lower_bound_is_excluded() {
        let window = DateWindow::new(d(2024, 5, 16), 30);
        let mut day = window.lower_bound().pred_opt().unwrap();
        for _ in 0..400 {
            assert!(!window.contains(&ParsedDate::from_date(day)), "{day}");
            day = day.pred_opt().unwrap();
        }
    }

    #[test]
    fn test_future_dates_are_included() {
        let window = DateWindow::new(d(2024, 5, 16), 7);
        assert!(window.contains(&ParsedDate::from_date(d(2024, 6, 1))));
    }

    #[test]
    fn test_inferred_from_text() {
        let window = DateWindow::new(d(2024, 5, 16), 7);
        assert!(window.inferred_from_text("Notice 2024 5 12", "https://x.example/n"));
        assert!(window.inferred_from_text("Notice", "https://x.example/2024/5/12/n"));
        assert!(!window.inferred_from_text("Notice", "https://x.example/n"));
        // Day and month present, year missing.
        assert!(!window.inferred_from_text("Notice 5 12", "https://x.example/n"));
    }

    #[test]
    fn test_inferred_from_text_month_wrap_never_matches() {
        let window = DateWindow::new(d(2024, 6, 3), 7);
        assert!(!window.inferred_from_text("2024 6 3 27 5", "https://x.example/"));
    }
}
