//! Date range types produced by the resolver.

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// Granularity of a resolved range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    Day,
    Month,
    Year,
}

impl Precision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Month => "month",
            Self::Year => "year",
        }
    }
}

/// A half-open `[start, end)` calendar interval.
///
/// A missing bound is unbounded, so `start: None` reads as "before `end`" and
/// `end: None` as "on or after `start`". When both are present `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    /// Exclusive upper bound.
    pub end: Option<NaiveDate>,
    pub precision: Precision,
}

impl DateRange {
    /// Build a bounded range. Returns `None` if `end < start`.
    pub fn between(start: NaiveDate, end: NaiveDate, precision: Precision) -> Option<Self> {
        (start <= end).then_some(Self {
            start: Some(start),
            end: Some(end),
            precision,
        })
    }

    /// A single calendar day.
    pub fn day(date: NaiveDate) -> Option<Self> {
        Self::between(date, date.succ_opt()?, Precision::Day)
    }

    /// A full calendar month.
    pub fn month(year: i32, month: u32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let end = start.checked_add_months(Months::new(1))?;
        Self::between(start, end, Precision::Month)
    }

    /// A full calendar year.
    pub fn year(year: i32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let end = NaiveDate::from_ymd_opt(year + 1, 1, 1)?;
        Self::between(start, end, Precision::Year)
    }

    /// On or after `start`.
    pub fn since(start: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: None,
            precision: Precision::Day,
        }
    }

    /// Strictly before `end`.
    pub fn before(end: NaiveDate) -> Self {
        Self {
            start: None,
            end: Some(end),
            precision: Precision::Day,
        }
    }

    /// Whether `date` falls inside the range.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date < e)
    }

    /// Both bounds present.
    pub fn is_bounded(&self) -> bool {
        self.start.is_some() && self.end.is_some()
    }

    /// Number of days covered, if bounded.
    pub fn len_days(&self) -> Option<i64> {
        Some((self.end? - self.start?).num_days())
    }

    /// The year the range starts in, if it has a start.
    pub fn start_year(&self) -> Option<i32> {
        self.start.map(|d| d.year())
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fmt_bound = |d: Option<NaiveDate>| match d {
            Some(d) => d.format("%Y-%m-%d").to_string(),
            None => String::new(),
        };
        write!(
            f,
            "{}..{} ({})",
            fmt_bound(self.start),
            fmt_bound(self.end),
            self.precision.as_str()
        )
    }
}

/// A resolved range together with where it was found in the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateMatch {
    pub range: DateRange,
    /// The matched phrase, as written.
    pub original_text: String,
    /// Byte offset where the phrase starts.
    pub start_offset: usize,
    /// Byte offset where the phrase ends.
    pub end_offset: usize,
}

impl DateMatch {
    /// Whether the byte span `[start, end)` overlaps the matched phrase.
    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        start < self.end_offset && self.start_offset < end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_month_range_december_rolls_into_next_year() {
        let range = DateRange::month(2024, 12).unwrap();
        assert_eq!(range.start, Some(ymd(2024, 12, 1)));
        assert_eq!(range.end, Some(ymd(2025, 1, 1)));
        assert_eq!(range.len_days(), Some(31));
    }

    #[test]
    fn test_open_ranges() {
        let since = DateRange::since(ymd(2025, 4, 1));
        assert!(since.contains(ymd(2030, 1, 1)));
        assert!(!since.contains(ymd(2025, 3, 31)));
        assert!(!since.is_bounded());

        let before = DateRange::before(ymd(2025, 4, 1));
        assert!(before.contains(ymd(1999, 1, 1)));
        assert!(!before.contains(ymd(2025, 4, 1)));
    }

    #[test]
    fn test_between_rejects_inverted_bounds() {
        assert!(DateRange::between(ymd(2025, 5, 1), ymd(2025, 4, 1), Precision::Day).is_none());
    }

    #[test]
    fn test_display() {
        let range = DateRange::year(2025).unwrap();
        assert_eq!(range.to_string(), "2025-01-01..2026-01-01 (year)");
        assert_eq!(
            DateRange::since(ymd(2025, 4, 1)).to_string(),
            "2025-04-01.. (day)"
        );
    }

    #[test]
    fn test_match_overlap() {
        let m = DateMatch {
            range: DateRange::year(2025).unwrap(),
            original_text: "2025".into(),
            start_offset: 10,
            end_offset: 14,
        };
        assert!(m.overlaps(12, 16));
        assert!(!m.overlaps(14, 18));
        assert!(!m.overlaps(0, 10));
    }
}
