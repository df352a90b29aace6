//! Free-text date parsing against the run's Central-time calendar date.
//!
//! Numeric dates carrying a year are read month-first. Yearless numeric dates whose day and
//! month could be swapped ("2/3") are resolved to the nearest upcoming interpretation inside the
//! ambiguity window. Other dates without a year take the year that puts them closest to the run
//! date.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use chrono_tz::America::Chicago;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::DropReason;
use crate::registry::WindowSettings;

static ORDINAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d)(?:st|nd|rd|th)\b").unwrap());
static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,\s]+").unwrap());
static LEADING_WEEKDAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:mon|tue|wed|thu|fri|sat|sun)[a-z]*\.?\s+").unwrap());
static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})(?:$|[t\s])").unwrap());
static NUMERIC_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2})[/.\-](\d{1,2})(?:[/.\-](\d{4}|\d{2}))?(?:$|\s)").unwrap()
});
static MONTH_DAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<mon>[a-z]{3,9})\.?\s+(?P<day>\d{1,2})(?:\s+(?P<year>\d{4}))?(?:$|\s)")
        .unwrap()
});
static DAY_MONTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<day>\d{1,2})\s+(?:of\s+)?(?P<mon>[a-z]{3,9})\.?(?:\s+(?P<year>\d{4}))?(?:$|\s)")
        .unwrap()
});

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// The run's calendar date in America/Chicago
pub fn central_today(run_at: DateTime<Utc>) -> NaiveDate {
    run_at.with_timezone(&Chicago).date_naive()
}

fn month_from_name(word: &str) -> Option<u32> {
    if word.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .position(|m| m.starts_with(word))
        .map(|idx| idx as u32 + 1)
}

fn weekday_from_name(word: &str) -> Option<Weekday> {
    let word = word.trim_end_matches('.');
    if word.len() < 3 {
        return None;
    }
    [
        ("monday", Weekday::Mon),
        ("tuesday", Weekday::Tue),
        ("wednesday", Weekday::Wed),
        ("thursday", Weekday::Thu),
        ("friday", Weekday::Fri),
        ("saturday", Weekday::Sat),
        ("sunday", Weekday::Sun),
    ]
    .iter()
    .find(|(name, _)| name.starts_with(word))
    .map(|(_, day)| *day)
}

fn expand_year(raw: &str) -> Option<i32> {
    let year: i32 = raw.parse().ok()?;
    Some(if raw.len() == 2 { 2000 + year } else { year })
}

/// Resolves date text relative to a fixed run date
#[derive(Debug, Clone)]
pub struct DateResolver {
    today: NaiveDate,
    stale_after: Duration,
    max_forward: Duration,
    ambiguity_window: Duration,
}

impl DateResolver {
    pub fn new(today: NaiveDate, window: &WindowSettings) -> Self {
        Self {
            today,
            stale_after: Duration::days(window.stale_after_days),
            max_forward: Duration::days(window.max_forward_days),
            ambiguity_window: Duration::days(window.ambiguity_window_days),
        }
    }

    /// Parse and window-check a date string
    pub fn resolve(&self, text: &str) -> Result<NaiveDate, DropReason> {
        let date = self.parse(text)?;
        let earliest = self
            .today
            .checked_sub_signed(self.stale_after)
            .unwrap_or(NaiveDate::MIN);
        let latest = self
            .today
            .checked_add_signed(self.max_forward)
            .unwrap_or(NaiveDate::MAX);
        if date < earliest || date > latest {
            return Err(DropReason::OutOfWindow { date });
        }
        Ok(date)
    }

    fn parse(&self, text: &str) -> Result<NaiveDate, DropReason> {
        let lowered = text.trim().to_lowercase();
        let without_ordinals = ORDINAL.replace_all(&lowered, "$1");
        let cleaned = SEPARATORS.replace_all(&without_ordinals, " ");
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            return Err(DropReason::UnparsableDate);
        }

        if let Some(date) = self.relative(cleaned) {
            return Ok(date);
        }

        if let Some(caps) = ISO_DATE.captures(cleaned) {
            let year: i32 = caps[1].parse().map_err(|_| DropReason::UnparsableDate)?;
            let month: u32 = caps[2].parse().map_err(|_| DropReason::UnparsableDate)?;
            let day: u32 = caps[3].parse().map_err(|_| DropReason::UnparsableDate)?;
            return NaiveDate::from_ymd_opt(year, month, day).ok_or(DropReason::UnparsableDate);
        }

        let body = LEADING_WEEKDAY.replace(cleaned, "");
        let body = body.as_ref();

        if let Some(caps) = NUMERIC_DATE.captures(body) {
            let first: u32 = caps[1].parse().map_err(|_| DropReason::UnparsableDate)?;
            let second: u32 = caps[2].parse().map_err(|_| DropReason::UnparsableDate)?;
            let year = match caps.get(3) {
                Some(y) => Some(expand_year(y.as_str()).ok_or(DropReason::UnparsableDate)?),
                None => None,
            };
            return self.numeric(first, second, year);
        }

        for pattern in [&*MONTH_DAY, &*DAY_MONTH] {
            if let Some(caps) = pattern.captures(body) {
                let Some(month) = month_from_name(&caps["mon"]) else {
                    continue;
                };
                let day: u32 = caps["day"].parse().map_err(|_| DropReason::UnparsableDate)?;
                return match caps.name("year") {
                    Some(y) => {
                        let year: i32 = y.as_str().parse().map_err(|_| DropReason::UnparsableDate)?;
                        NaiveDate::from_ymd_opt(year, month, day).ok_or(DropReason::UnparsableDate)
                    }
                    None => self.infer_year(month, day).ok_or(DropReason::UnparsableDate),
                };
            }
        }

        // "friday" or "this friday" on its own means the next such day
        let words: Vec<&str> = cleaned.split(' ').collect();
        let weekday_word = match words.as_slice() {
            [w] => Some(*w),
            ["this", w] => Some(*w),
            _ => None,
        };
        if let Some(weekday) = weekday_word.and_then(weekday_from_name) {
            return Ok(self.next_weekday(weekday));
        }

        Err(DropReason::UnparsableDate)
    }

    fn relative(&self, cleaned: &str) -> Option<NaiveDate> {
        let first = cleaned.split(' ').next()?;
        match first {
            "today" | "tonight" => Some(self.today),
            "tomorrow" | "tmrw" => self.today.succ_opt(),
            _ => None,
        }
    }

    fn next_weekday(&self, weekday: Weekday) -> NaiveDate {
        let ahead = (7 + weekday.num_days_from_monday() as i64
            - self.today.weekday().num_days_from_monday() as i64)
            % 7;
        self.today + Duration::days(ahead)
    }

    /// Year that places `month/day` nearest the run date; a tie goes to the future
    fn infer_year(&self, month: u32, day: u32) -> Option<NaiveDate> {
        let year = self.today.year();
        [year, year + 1, year - 1]
            .into_iter()
            .filter_map(|y| NaiveDate::from_ymd_opt(y, month, day))
            .min_by_key(|d| {
                let distance = (*d - self.today).num_days();
                (distance.abs(), distance < 0)
            })
    }

    /// First occurrence of `month/day` on or after the run date
    fn next_occurrence(&self, month: u32, day: u32) -> Option<NaiveDate> {
        let year = self.today.year();
        (year..=year + 4)
            .filter_map(|y| NaiveDate::from_ymd_opt(y, month, day))
            .find(|d| *d >= self.today)
    }

    fn numeric(&self, first: u32, second: u32, year: Option<i32>) -> Result<NaiveDate, DropReason> {
        // Month-first unless only the swapped order is a valid month
        let (month, day) = if first <= 12 { (first, second) } else { (second, first) };

        // An explicit year pins the date; it is never re-read day-first
        if let Some(y) = year {
            return NaiveDate::from_ymd_opt(y, month, day).ok_or(DropReason::UnparsableDate);
        }

        let ambiguous = first != second && first <= 12 && second <= 12;
        if !ambiguous {
            return self.infer_year(month, day).ok_or(DropReason::UnparsableDate);
        }

        let mut upcoming: Vec<NaiveDate> = [(first, second), (second, first)]
            .iter()
            .filter_map(|&(m, d)| self.next_occurrence(m, d))
            .collect();
        if upcoming.is_empty() {
            return Err(DropReason::UnparsableDate);
        }
        upcoming.sort();

        let horizon = self
            .today
            .checked_add_signed(self.ambiguity_window)
            .unwrap_or(NaiveDate::MAX);
        upcoming
            .into_iter()
            .find(|d| *d <= horizon)
            .ok_or(DropReason::AmbiguousDateInPast)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn resolver(y: i32, m: u32, d: u32) -> DateResolver {
        DateResolver::new(
            NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            &WindowSettings::default(),
        )
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_central_today_lags_utc_in_the_evening() {
        let run_at = Utc.with_ymd_and_hms(2026, 3, 1, 3, 30, 0).unwrap();
        assert_eq!(central_today(run_at), ymd(2026, 2, 28));
    }

    #[test]
    fn test_explicit_formats() {
        let r = resolver(2026, 1, 1);
        assert_eq!(r.resolve("2/14/2026"), Ok(ymd(2026, 2, 14)));
        assert_eq!(r.resolve("2026-02-14"), Ok(ymd(2026, 2, 14)));
        assert_eq!(r.resolve("2026-02-14T20:00:00"), Ok(ymd(2026, 2, 14)));
        assert_eq!(r.resolve("Feb 14 2026"), Ok(ymd(2026, 2, 14)));
        assert_eq!(r.resolve("February 14th, 2026"), Ok(ymd(2026, 2, 14)));
        assert_eq!(r.resolve("Saturday, Feb. 14"), Ok(ymd(2026, 2, 14)));
        assert_eq!(r.resolve("14 February 2026"), Ok(ymd(2026, 2, 14)));
        assert_eq!(r.resolve("2/14/26"), Ok(ymd(2026, 2, 14)));
    }

    #[test]
    fn test_ambiguous_numeric_prefers_nearest_future() {
        let r = resolver(2026, 1, 1);
        assert_eq!(r.resolve("2/3"), Ok(ymd(2026, 2, 3)));

        // March 2 has passed, February 3 of next year is the nearest upcoming reading
        let r = resolver(2026, 3, 5);
        assert_eq!(r.resolve("3/2"), Ok(ymd(2027, 2, 3)));
    }

    #[test]
    fn test_numeric_with_year_is_month_first() {
        let r = resolver(2026, 1, 5);
        assert_eq!(r.resolve("12/1/2026"), Ok(ymd(2026, 12, 1)));

        let r = resolver(2026, 2, 10);
        assert_eq!(r.resolve("2/3/2026"), Ok(ymd(2026, 2, 3)));
        assert_eq!(r.resolve("2/4/2025"), Ok(ymd(2025, 2, 4)));
        assert_eq!(r.resolve("2/14/2025"), Ok(ymd(2025, 2, 14)));
        assert_eq!(r.resolve("2/4/26"), Ok(ymd(2026, 2, 4)));
    }

    #[test]
    fn test_numeric_with_year_reads_day_first_only_when_forced() {
        let r = resolver(2026, 1, 1);
        assert_eq!(r.resolve("14/2/2026"), Ok(ymd(2026, 2, 14)));
        assert_eq!(r.resolve("13/13/2026"), Err(DropReason::UnparsableDate));
    }

    #[test]
    fn test_ambiguous_outside_window_is_dropped() {
        let window = WindowSettings {
            ambiguity_window_days: 180,
            ..WindowSettings::default()
        };
        // both readings of "3/2" have passed; the next ones are more than 180 days out
        let r = DateResolver::new(ymd(2026, 3, 5), &window);
        assert_eq!(r.resolve("3/2"), Err(DropReason::AmbiguousDateInPast));
        assert_eq!(r.resolve("4/3"), Ok(ymd(2026, 4, 3)));
    }

    #[test]
    fn test_unambiguous_numeric_without_year_infers_nearest_year() {
        let r = resolver(2026, 12, 20);
        assert_eq!(r.resolve("1/15"), Ok(ymd(2027, 1, 15)));
        assert_eq!(r.resolve("12/13"), Ok(ymd(2026, 12, 13)));
        assert_eq!(r.resolve("25/12"), Ok(ymd(2026, 12, 25)));
    }

    #[test]
    fn test_month_day_infers_year_across_new_year() {
        let r = resolver(2026, 12, 28);
        assert_eq!(r.resolve("Jan 3"), Ok(ymd(2027, 1, 3)));
        assert_eq!(r.resolve("Dec 27"), Ok(ymd(2026, 12, 27)));
        let r = resolver(2027, 1, 2);
        assert_eq!(r.resolve("Dec 30"), Ok(ymd(2026, 12, 30)));
    }

    #[test]
    fn test_relative_terms_and_weekdays() {
        // 2026-01-01 is a Thursday
        let r = resolver(2026, 1, 1);
        assert_eq!(r.resolve("Tonight"), Ok(ymd(2026, 1, 1)));
        assert_eq!(r.resolve("today"), Ok(ymd(2026, 1, 1)));
        assert_eq!(r.resolve("Tomorrow"), Ok(ymd(2026, 1, 2)));
        assert_eq!(r.resolve("Saturday"), Ok(ymd(2026, 1, 3)));
        assert_eq!(r.resolve("this thu"), Ok(ymd(2026, 1, 1)));
    }

    #[test]
    fn test_window_rejects_stale_and_far_future() {
        let r = resolver(2026, 1, 1);
        assert!(matches!(r.resolve("1/13/2020"), Err(DropReason::OutOfWindow { .. })));
        assert!(matches!(r.resolve("2031-01-01"), Err(DropReason::OutOfWindow { .. })));
        assert_eq!(r.resolve("2025-06-01"), Ok(ymd(2025, 6, 1)));
    }

    #[test]
    fn test_huge_window_does_not_overflow() {
        let window = WindowSettings {
            stale_after_days: 1_000_000_000,
            max_forward_days: 1_000_000_000,
            ambiguity_window_days: 1_000_000_000,
        };
        let r = DateResolver::new(ymd(2026, 1, 1), &window);
        assert_eq!(r.resolve("1/13/2020"), Ok(ymd(2020, 1, 13)));
        assert_eq!(r.resolve("2/3"), Ok(ymd(2026, 2, 3)));
    }

    #[test]
    fn test_garbage_is_unparsable() {
        let r = resolver(2026, 1, 1);
        assert_eq!(r.resolve(""), Err(DropReason::UnparsableDate));
        assert_eq!(r.resolve("TBA"), Err(DropReason::UnparsableDate));
        assert_eq!(r.resolve("2/30/2026"), Err(DropReason::UnparsableDate));
        assert_eq!(r.resolve("Smarch 3"), Err(DropReason::UnparsableDate));
    }
}
