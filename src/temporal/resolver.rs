//! Resolution of date phrases inside free text.
//!
//! Recognized phrase families, Spanish and English:
//! - Month and year: "abril de 2025", "abril del 2025", "abril 2025"
//! - Day, month and optional year: "15 de abril de 2025"
//! - A month alone, in the reference year: "en marzo"
//! - A bare year: "en 2025"
//! - Relative: "hoy", "ayer", "esta semana", "la semana pasada", "este mes",
//!   "el mes pasado", "este año", "el año pasado", "últimos 3 días" and their
//!   English counterparts
//! - ISO dates and ranges: "2025-04-01", "2025-04-01 to 2025-04-30"
//! - Open ranges: "since 2025-04-01", "desde 2025-04-01", "antes de 2025-04-01"
//!
//! When several phrases are present the one starting earliest wins, longer
//! phrases first on ties.

use std::cmp::Reverse;
use std::sync::LazyLock;

use chrono::{Datelike, Days, Local, Months, NaiveDate};
use regex::{Captures, Regex};

use super::types::{DateMatch, DateRange, Precision};
use crate::error::ResolveError;

/// Years outside this interval are rejected as implausible.
pub const MIN_YEAR: i32 = 1900;
pub const MAX_YEAR: i32 = 2999;

const MONTHS: &str =
    "enero|febrero|marzo|abril|mayo|junio|julio|agosto|septiembre|setiembre|octubre|noviembre|diciembre";

const ISO: &str = r"\d{4}-\d{1,2}-\d{1,2}";

// ============================================================================
// Patterns
// ============================================================================

static ISO_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:(?:from|entre|del?)\s+)?({ISO})\s+(?:to|a|al|hasta|y)\s+({ISO})\b"
    ))
    .expect("valid regex")
});

static ISO_SINCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b(?:since|after|desde(?:\s+el)?)\s+({ISO})\b")).expect("valid regex")
});

static ISO_BEFORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b(?:before|antes\s+del?)\s+({ISO})\b")).expect("valid regex")
});

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").expect("valid regex"));

static DAY_MONTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(\d{{1,2}})\s+de\s+({MONTHS})(?:\s+(?:del?\s+)?(\d{{4,}}))?\b"
    ))
    .expect("valid regex")
});

static MONTH_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b({MONTHS})\s+(?:del?\s+)?(\d{{4,}})\b")).expect("valid regex")
});

static MONTH_ALONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)\b({MONTHS})\b")).expect("valid regex"));

/// Four digits, with the temporal preposition in front when there is one.
static BARE_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:\b(en|in|de|del|desde|since|hasta|until|antes\s+del?|before|after|durante|during)\s+)?\b(\d{4})\b",
    )
    .expect("valid regex")
});

static LAST_N: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:(?:los\s+|las\s+)?[uú]ltim[oa]s|last|past)\s+(\d+)\s+(d[ií]as?|days?|semanas?|weeks?|mes(?:es)?|months?)\b",
    )
    .expect("valid regex")
});

/// Fixed relative phrases.
#[derive(Debug, Clone, Copy)]
enum Relative {
    Today,
    Yesterday,
    ThisWeek,
    LastWeek,
    ThisMonth,
    LastMonth,
    ThisYear,
    LastYear,
}

static RELATIVE: LazyLock<Vec<(Regex, Relative)>> = LazyLock::new(|| {
    [
        (r"(?i)\b(?:hoy|today)\b", Relative::Today),
        (r"(?i)\b(?:ayer|yesterday)\b", Relative::Yesterday),
        (r"(?i)\b(?:esta\s+semana|this\s+week)\b", Relative::ThisWeek),
        (
            r"(?i)\b(?:(?:la\s+)?semana\s+pasada|last\s+week)\b",
            Relative::LastWeek,
        ),
        (r"(?i)\b(?:este\s+mes|this\s+month)\b", Relative::ThisMonth),
        (
            r"(?i)\b(?:(?:el\s+)?mes\s+pasado|last\s+month)\b",
            Relative::LastMonth,
        ),
        (r"(?i)\b(?:este\s+a[ñn]o|this\s+year)\b", Relative::ThisYear),
        (
            r"(?i)\b(?:(?:el\s+)?a[ñn]o\s+pasado|last\s+year)\b",
            Relative::LastYear,
        ),
    ]
    .into_iter()
    .map(|(pattern, kind)| (Regex::new(pattern).expect("valid regex"), kind))
    .collect()
});

// ============================================================================
// Resolver
// ============================================================================

/// A phrase located in the input, resolved or not.
struct Candidate {
    start: usize,
    end: usize,
    outcome: Result<DateRange, ResolveError>,
}

/// Resolves date phrases against a reference date.
#[derive(Debug, Clone)]
pub struct DateResolver {
    reference_date: NaiveDate,
}

impl Default for DateResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl DateResolver {
    /// Resolver anchored at today's local date.
    pub fn new() -> Self {
        Self {
            reference_date: Local::now().date_naive(),
        }
    }

    /// Resolver anchored at a fixed date.
    pub fn with_reference_date(reference_date: NaiveDate) -> Self {
        Self { reference_date }
    }

    pub fn reference_date(&self) -> NaiveDate {
        self.reference_date
    }

    /// Resolve the first date phrase in `text` to a range.
    ///
    /// `Ok(None)` means no date phrase was found. A phrase that is clearly a
    /// date but cannot be resolved is a `DateParse` error.
    pub fn resolve(&self, text: &str) -> Result<Option<DateRange>, ResolveError> {
        Ok(self.find(text)?.map(|m| m.range))
    }

    /// Like [`resolve`](Self::resolve), also reporting where the phrase sits.
    pub fn find(&self, text: &str) -> Result<Option<DateMatch>, ResolveError> {
        let Some(best) = self.best_candidate(text) else {
            return Ok(None);
        };
        let range = best.outcome?;
        tracing::debug!(phrase = &text[best.start..best.end], %range, "Resolved date phrase");
        Ok(Some(DateMatch {
            range,
            original_text: text[best.start..best.end].to_string(),
            start_offset: best.start,
            end_offset: best.end,
        }))
    }

    /// Byte span of the phrase [`find`](Self::find) would pick, whether or not
    /// it resolves.
    pub fn phrase_span(&self, text: &str) -> Option<(usize, usize)> {
        self.best_candidate(text).map(|c| (c.start, c.end))
    }

    fn best_candidate(&self, text: &str) -> Option<Candidate> {
        let mut candidates = Vec::new();
        self.collect_iso(text, &mut candidates);
        self.collect_spanish_calendar(text, &mut candidates);
        self.collect_bare_years(text, &mut candidates);
        self.collect_relative(text, &mut candidates);

        candidates.sort_by_key(|c| (c.start, Reverse(c.end - c.start)));
        candidates.into_iter().next()
    }

    fn collect_iso(&self, text: &str, out: &mut Vec<Candidate>) {
        for cap in ISO_RANGE.captures_iter(text) {
            let outcome = (|| -> Result<DateRange, ResolveError> {
                let start = iso_date(&cap[1])?;
                let last = iso_date(&cap[2])?;
                if last < start {
                    return Err(ResolveError::date(&cap[0], "range ends before it starts"));
                }
                let end = last
                    .succ_opt()
                    .ok_or_else(|| ResolveError::date(&cap[0], "date out of range"))?;
                DateRange::between(start, end, Precision::Day)
                    .ok_or_else(|| ResolveError::date(&cap[0], "range ends before it starts"))
            })();
            push(out, &cap, outcome);
        }

        for cap in ISO_SINCE.captures_iter(text) {
            let outcome = iso_date(&cap[1]).map(DateRange::since);
            push(out, &cap, outcome);
        }

        for cap in ISO_BEFORE.captures_iter(text) {
            let outcome = iso_date(&cap[1]).map(DateRange::before);
            push(out, &cap, outcome);
        }

        for cap in ISO_DATE.captures_iter(text) {
            let outcome = iso_date(&cap[0]).and_then(|d| {
                DateRange::day(d).ok_or_else(|| ResolveError::date(&cap[0], "date out of range"))
            });
            push(out, &cap, outcome);
        }
    }

    fn collect_spanish_calendar(&self, text: &str, out: &mut Vec<Candidate>) {
        for cap in DAY_MONTH.captures_iter(text) {
            let outcome = (|| -> Result<DateRange, ResolveError> {
                let month = month_number(&cap[2]);
                let year = match cap.get(3) {
                    Some(y) => checked_year(y.as_str(), &cap[0])?,
                    None => self.reference_date.year(),
                };
                let day: u32 = cap[1]
                    .parse()
                    .map_err(|_| ResolveError::date(&cap[0], "invalid day"))?;
                let date = NaiveDate::from_ymd_opt(year, month, day)
                    .ok_or_else(|| ResolveError::date(&cap[0], "no such calendar day"))?;
                DateRange::day(date).ok_or_else(|| ResolveError::date(&cap[0], "date out of range"))
            })();
            push(out, &cap, outcome);
        }

        for cap in MONTH_YEAR.captures_iter(text) {
            let outcome = checked_year(&cap[2], &cap[0]).and_then(|year| {
                DateRange::month(year, month_number(&cap[1]))
                    .ok_or_else(|| ResolveError::date(&cap[0], "date out of range"))
            });
            push(out, &cap, outcome);
        }

        for cap in MONTH_ALONE.captures_iter(text) {
            let outcome = DateRange::month(self.reference_date.year(), month_number(&cap[1]))
                .ok_or_else(|| ResolveError::date(&cap[0], "date out of range"));
            push(out, &cap, outcome);
        }
    }

    fn collect_bare_years(&self, text: &str, out: &mut Vec<Candidate>) {
        for cap in BARE_YEAR.captures_iter(text) {
            let Some(digits) = cap.get(2) else { continue };
            let outcome = match checked_year(digits.as_str(), digits.as_str()) {
                Ok(year) => DateRange::year(year)
                    .ok_or_else(|| ResolveError::date(digits.as_str(), "date out of range")),
                // Out-of-window numbers are dates only after a preposition.
                Err(_) if cap.get(1).is_none() => continue,
                Err(err) => Err(err),
            };
            out.push(Candidate {
                start: digits.start(),
                end: digits.end(),
                outcome,
            });
        }
    }

    fn collect_relative(&self, text: &str, out: &mut Vec<Candidate>) {
        for (pattern, kind) in RELATIVE.iter() {
            for cap in pattern.captures_iter(text) {
                let outcome = self
                    .relative_range(*kind)
                    .ok_or_else(|| ResolveError::date(&cap[0], "date out of range"));
                push(out, &cap, outcome);
            }
        }

        for cap in LAST_N.captures_iter(text) {
            let outcome = self.last_n(&cap[1], &cap[2]).ok_or_else(|| {
                ResolveError::date(&cap[0], "span reaches outside the supported calendar")
            });
            push(out, &cap, outcome);
        }
    }

    fn relative_range(&self, kind: Relative) -> Option<DateRange> {
        let today = self.reference_date;
        let month_start = today.with_day(1)?;
        let week_start = today - Days::new(u64::from(today.weekday().num_days_from_monday()));

        match kind {
            Relative::Today => DateRange::day(today),
            Relative::Yesterday => DateRange::day(today.pred_opt()?),
            Relative::ThisWeek => {
                DateRange::between(week_start, week_start + Days::new(7), Precision::Day)
            }
            Relative::LastWeek => {
                DateRange::between(week_start - Days::new(7), week_start, Precision::Day)
            }
            Relative::ThisMonth => DateRange::month(today.year(), today.month()),
            Relative::LastMonth => {
                let prev = month_start.checked_sub_months(Months::new(1))?;
                DateRange::month(prev.year(), prev.month())
            }
            Relative::ThisYear => DateRange::year(today.year()),
            Relative::LastYear => DateRange::year(today.year() - 1),
        }
    }

    /// "últimos N días/semanas/meses": the N units ending with the reference date.
    fn last_n(&self, count: &str, unit: &str) -> Option<DateRange> {
        let n: u32 = count.parse().ok()?;
        let end = self.reference_date.succ_opt()?;
        let unit = unit.to_lowercase();
        let start = if unit.starts_with('d') {
            end.checked_sub_days(Days::new(u64::from(n)))?
        } else if unit.starts_with('s') || unit.starts_with('w') {
            end.checked_sub_days(Days::new(u64::from(n).checked_mul(7)?))?
        } else {
            end.checked_sub_months(Months::new(n))?
        };
        if start.year() < MIN_YEAR {
            return None;
        }
        DateRange::between(start, end, Precision::Day)
    }
}

/// Resolve `text` against `reference`.
pub fn resolve(text: &str, reference: NaiveDate) -> Result<Option<DateRange>, ResolveError> {
    DateResolver::with_reference_date(reference).resolve(text)
}

// ============================================================================
// Helpers
// ============================================================================

fn push(out: &mut Vec<Candidate>, cap: &Captures<'_>, outcome: Result<DateRange, ResolveError>) {
    if let Some(m) = cap.get(0) {
        out.push(Candidate {
            start: m.start(),
            end: m.end(),
            outcome,
        });
    }
}

fn checked_year(digits: &str, phrase: &str) -> Result<i32, ResolveError> {
    match digits.parse::<i32>() {
        Ok(year) if (MIN_YEAR..=MAX_YEAR).contains(&year) => Ok(year),
        _ => Err(ResolveError::date(
            phrase,
            format!("year must be between {MIN_YEAR} and {MAX_YEAR}"),
        )),
    }
}

fn iso_date(s: &str) -> Result<NaiveDate, ResolveError> {
    let mut parts = s.splitn(3, '-');
    let (Some(y), Some(m), Some(d)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(ResolveError::date(s, "expected YYYY-MM-DD"));
    };
    let year = checked_year(y, s)?;
    let month: u32 = m.parse().map_err(|_| ResolveError::date(s, "invalid month"))?;
    let day: u32 = d.parse().map_err(|_| ResolveError::date(s, "invalid day"))?;
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| ResolveError::date(s, "no such calendar day"))
}

fn month_number(name: &str) -> u32 {
    match name.to_lowercase().as_str() {
        "enero" => 1,
        "febrero" => 2,
        "marzo" => 3,
        "abril" => 4,
        "mayo" => 5,
        "junio" => 6,
        "julio" => 7,
        "agosto" => 8,
        "septiembre" | "setiembre" => 9,
        "octubre" => 10,
        "noviembre" => 11,
        _ => 12,
    }
}
