//! Deadline text resolution.
//!
//! Listing deadlines arrive as free text ("~06/30(월)", "7월 15일",
//! "상시채용", "Nov 20"). Resolution tries an ordered list of patterns and
//! the first one that yields a valid calendar date wins.

use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate};
use regex::Regex;

use crate::config::ROLLOVER_WINDOW_DAYS;
use crate::types::DeadlineStatus;

/// Phrases marking an open-ended posting (compared lowercase).
const OPEN_MARKERS: &[&str] = &[
    "상시",
    "수시",
    "채용시",
    "rolling",
    "continuous",
    "ongoing",
    "open until filled",
    "until filled",
];

/// Date components pulled out of deadline text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DateParts {
    /// Explicit year, when the text carries one.
    year: Option<i32>,
    month: u32,
    day: u32,
}

/// How a pattern's captures map onto date parts.
#[derive(Debug, Clone, Copy)]
enum Captures {
    YearMonthDay,
    MonthDay,
    MonthNameDay,
}

/// One strategy in the resolution cascade.
struct DatePattern {
    name: &'static str,
    regex: Regex,
    captures: Captures,
}

impl DatePattern {
    #[allow(clippy::expect_used)] // Static patterns that are guaranteed to be valid
    fn new(name: &'static str, pattern: &str, captures: Captures) -> Self {
        Self {
            name,
            regex: Regex::new(pattern).expect("valid regex"),
            captures,
        }
    }

    fn extract(&self, text: &str) -> Option<DateParts> {
        let caps = self.regex.captures(text)?;
        let number = |i: usize| caps.get(i)?.as_str().parse::<u32>().ok();

        match self.captures {
            Captures::YearMonthDay => Some(DateParts {
                year: caps.get(1)?.as_str().parse().ok(),
                month: number(2)?,
                day: number(3)?,
            }),
            Captures::MonthDay => Some(DateParts {
                year: None,
                month: number(1)?,
                day: number(2)?,
            }),
            Captures::MonthNameDay => Some(DateParts {
                year: None,
                month: month_from_name(caps.get(1)?.as_str())?,
                day: number(2)?,
            }),
        }
    }
}

/// Map an English month name or abbreviation to its number.
fn month_from_name(name: &str) -> Option<u32> {
    let prefix: String = name.to_lowercase().chars().take(3).collect();
    let month = match prefix.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// Resolves free-form deadline text into a date or the open-ended sentinel.
pub struct DeadlineResolver {
    patterns: Vec<DatePattern>,
    rollover_window_days: i64,
}

impl DeadlineResolver {
    /// Resolver with the default pattern cascade.
    #[must_use]
    pub fn new() -> Self {
        let patterns = vec![
            DatePattern::new(
                "numeric-with-year",
                r"(\d{4})\s*[./-]\s*(\d{1,2})\s*[./-]\s*(\d{1,2})",
                Captures::YearMonthDay,
            ),
            DatePattern::new(
                "numeric",
                r"(?:^|\D)(\d{1,2})\s*[./-]\s*(\d{1,2})(?:\D|$)",
                Captures::MonthDay,
            ),
            DatePattern::new(
                "korean",
                r"(\d{1,2})\s*월\s*(\d{1,2})\s*일",
                Captures::MonthDay,
            ),
            DatePattern::new(
                "english",
                r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]*\.?\s+(\d{1,2})\b",
                Captures::MonthNameDay,
            ),
        ];

        Self {
            patterns,
            rollover_window_days: ROLLOVER_WINDOW_DAYS,
        }
    }

    /// Override the year-rollover window.
    #[must_use]
    pub fn with_rollover_window(mut self, days: i64) -> Self {
        self.rollover_window_days = days;
        self
    }

    /// Resolve deadline text relative to `today`.
    ///
    /// Returns `Some(DeadlineStatus::Open)` for open-ended markers and
    /// `None` when no pattern yields a valid date.
    ///
    /// # Examples
    /// ```
    /// use chrono::NaiveDate;
    /// use recruit_radar::deadline::DeadlineResolver;
    /// use recruit_radar::types::DeadlineStatus;
    ///
    /// let resolver = DeadlineResolver::new();
    /// let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
    ///
    /// assert_eq!(resolver.resolve("상시채용", today), Some(DeadlineStatus::Open));
    /// assert_eq!(
    ///     resolver.resolve("~06/30(월)", today),
    ///     Some(DeadlineStatus::Date(NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()))
    /// );
    /// assert_eq!(resolver.resolve("곧 마감", today), None);
    /// ```
    #[must_use]
    pub fn resolve(&self, text: &str, today: NaiveDate) -> Option<DeadlineStatus> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let lowered = text.to_lowercase();
        if OPEN_MARKERS.iter().any(|m| lowered.contains(m)) {
            return Some(DeadlineStatus::Open);
        }

        for pattern in &self.patterns {
            if let Some(parts) = pattern.extract(text) {
                tracing::trace!(pattern = pattern.name, text, "Deadline pattern matched");
                return self.assign_year(parts, today).map(DeadlineStatus::Date);
            }
        }

        None
    }

    /// Turn date parts into a calendar date.
    ///
    /// Without an explicit year the reference year is used, unless that puts
    /// the date more than the rollover window in the past or the day does
    /// not exist in that year (Feb 29). The following year is tried then.
    fn assign_year(&self, parts: DateParts, today: NaiveDate) -> Option<NaiveDate> {
        if let Some(year) = parts.year {
            return NaiveDate::from_ymd_opt(year, parts.month, parts.day);
        }

        let oldest = today - Duration::days(self.rollover_window_days);
        match NaiveDate::from_ymd_opt(today.year(), parts.month, parts.day) {
            Some(date) if date >= oldest => Some(date),
            _ => NaiveDate::from_ymd_opt(today.year() + 1, parts.month, parts.day),
        }
    }
}

impl Default for DeadlineResolver {
    fn default() -> Self {
        Self::new()
    }
}

static DEFAULT_RESOLVER: LazyLock<DeadlineResolver> = LazyLock::new(DeadlineResolver::new);

/// Resolve deadline text with the default resolver.
#[must_use]
pub fn resolve_deadline(text: &str, today: NaiveDate) -> Option<DeadlineStatus> {
    DEFAULT_RESOLVER.resolve(text, today)
}
