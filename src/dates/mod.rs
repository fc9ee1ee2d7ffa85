/// Calendar helpers for analytics date ranges
///
/// Dates are naive calendar dates formatted as `YYYY-MM-DD`; there is no
/// timezone handling. "Today" is the process-local date. Malformed input is
/// rejected with [`AnalyticsError::InvalidDateFormat`], never guessed at.

use chrono::{Datelike, Days, Local, NaiveDate, NaiveDateTime, Weekday};
use serde::Serialize;
use std::str::FromStr;

use crate::domain::{AnalyticsError, DateRange};

/// Format used for every date string
pub const DATE_FORMAT: &str = "%Y-%m-%d";

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%SZ",
];

/// Parse a `YYYY-MM-DD` string
pub fn parse_date(value: &str) -> Result<NaiveDate, AnalyticsError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| AnalyticsError::InvalidDateFormat(value.to_string()))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// The process-local calendar date
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn reference_or_today(reference: Option<&str>) -> Result<NaiveDate, AnalyticsError> {
    reference.map_or_else(|| Ok(today()), parse_date)
}

fn out_of_range(name: &str) -> AnalyticsError {
    AnalyticsError::invalid(name, "date arithmetic out of range")
}

/// The date `days` days before `reference` (default: today)
pub fn days_ago(days: u64, reference: Option<&str>) -> Result<String, AnalyticsError> {
    let reference = reference_or_today(reference)?;
    reference
        .checked_sub_days(Days::new(days))
        .map(format_date)
        .ok_or_else(|| out_of_range("days"))
}

/// The date `days` days after `reference`
pub fn days_after(days: u64, reference: &str) -> Result<String, AnalyticsError> {
    parse_date(reference)?
        .checked_add_days(Days::new(days))
        .map(format_date)
        .ok_or_else(|| out_of_range("days"))
}

/// Parse both ends of a range, rejecting `start > end`
pub fn date_range(start: &str, end: &str) -> Result<(NaiveDate, NaiveDate), AnalyticsError> {
    let start_date = parse_date(start)?;
    let end_date = parse_date(end)?;

    if start_date > end_date {
        return Err(AnalyticsError::InvalidRange {
            start: start.to_string(),
            end: end.to_string(),
        });
    }

    Ok((start_date, end_date))
}

/// Number of days in the range, counting both ends
pub fn days_between(start: &str, end: &str) -> Result<i64, AnalyticsError> {
    let (start, end) = date_range(start, end)?;
    Ok((end - start).num_days() + 1)
}

fn range(start: NaiveDate, end: NaiveDate) -> DateRange {
    DateRange::new(format_date(start), format_date(end))
}

fn monday_of(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.weekday().num_days_from_monday()))
}

fn first_of_next_month(date: NaiveDate) -> Option<NaiveDate> {
    if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    }
}

fn month_bounds(date: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let start = date.with_day(1)?;
    let end = first_of_next_month(date)?.pred_opt()?;
    Some((start, end))
}

/// Monday-to-Sunday week containing `date`
pub fn week_boundaries(date: &str) -> Result<DateRange, AnalyticsError> {
    let start = monday_of(parse_date(date)?);
    Ok(range(start, start + Days::new(6)))
}

/// First and last day of the month containing `date`
pub fn month_boundaries(date: &str) -> Result<DateRange, AnalyticsError> {
    let (start, end) = month_bounds(parse_date(date)?).ok_or_else(|| out_of_range("date"))?;
    Ok(range(start, end))
}

/// First and last day of the calendar quarter containing `date`
pub fn quarter_boundaries(date: &str) -> Result<DateRange, AnalyticsError> {
    let date = parse_date(date)?;
    let start_month = (date.month() - 1) / 3 * 3 + 1;

    let start = NaiveDate::from_ymd_opt(date.year(), start_month, 1);
    let end = NaiveDate::from_ymd_opt(date.year(), start_month + 2, 1)
        .and_then(first_of_next_month)
        .and_then(|next| next.pred_opt());

    match (start, end) {
        (Some(start), Some(end)) => Ok(range(start, end)),
        _ => Err(out_of_range("date")),
    }
}

pub fn is_weekend(date: &str) -> Result<bool, AnalyticsError> {
    Ok(matches!(parse_date(date)?.weekday(), Weekday::Sat | Weekday::Sun))
}

/// Weekdays in the inclusive range
pub fn business_days(start: &str, end: &str) -> Result<Vec<String>, AnalyticsError> {
    let (start, end) = date_range(start, end)?;
    Ok(start
        .iter_days()
        .take_while(|day| *day <= end)
        .filter(|day| !matches!(day.weekday(), Weekday::Sat | Weekday::Sun))
        .map(format_date)
        .collect())
}

/// Hour of day from a timestamp; a bare date gives hour 0
pub fn hour_from_timestamp(timestamp: &str) -> Result<u32, AnalyticsError> {
    use chrono::Timelike;

    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(timestamp, format).ok())
        .map(|dt| dt.hour())
        .or_else(|| parse_date(timestamp).ok().map(|_| 0))
        .ok_or_else(|| AnalyticsError::InvalidDateFormat(timestamp.to_string()))
}

/// Named ranges relative to a reference date
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodBoundaries {
    pub today: DateRange,
    pub yesterday: DateRange,
    pub last_7_days: DateRange,
    pub last_14_days: DateRange,
    pub last_30_days: DateRange,
    pub last_60_days: DateRange,
    pub last_90_days: DateRange,
    pub this_week: DateRange,
    pub last_week: DateRange,
    pub this_month: DateRange,
    pub last_month: DateRange,
    pub this_year: DateRange,
    pub last_year: DateRange,
}

impl PeriodBoundaries {
    /// Look up a range by its name, e.g. `"last_30_days"`
    pub fn get(&self, name: &str) -> Option<&DateRange> {
        self.iter().find(|(n, _)| *n == name).map(|(_, r)| r)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &DateRange)> {
        [
            ("today", &self.today),
            ("yesterday", &self.yesterday),
            ("last_7_days", &self.last_7_days),
            ("last_14_days", &self.last_14_days),
            ("last_30_days", &self.last_30_days),
            ("last_60_days", &self.last_60_days),
            ("last_90_days", &self.last_90_days),
            ("this_week", &self.this_week),
            ("last_week", &self.last_week),
            ("this_month", &self.this_month),
            ("last_month", &self.last_month),
            ("this_year", &self.this_year),
            ("last_year", &self.last_year),
        ]
        .into_iter()
    }
}

/// Compute the named ranges around `reference` (default: today)
///
/// The "last N days" ranges include the reference day itself.
pub fn period_boundaries(reference: Option<&str>) -> Result<PeriodBoundaries, AnalyticsError> {
    let day = reference_or_today(reference)?;
    let back = |days: u64| day.checked_sub_days(Days::new(days)).ok_or_else(|| out_of_range("reference"));
    let last_n = |n: u64| -> Result<DateRange, AnalyticsError> { Ok(range(back(n - 1)?, day)) };

    let yesterday = back(1)?;

    let week_start = monday_of(day);
    let last_week_start = week_start
        .checked_sub_days(Days::new(7))
        .ok_or_else(|| out_of_range("reference"))?;

    let (month_start, month_end) = month_bounds(day).ok_or_else(|| out_of_range("reference"))?;
    let (last_month_start, last_month_end) = month_start
        .pred_opt()
        .and_then(month_bounds)
        .ok_or_else(|| out_of_range("reference"))?;

    let year_bounds = |year: i32| -> Result<DateRange, AnalyticsError> {
        match (NaiveDate::from_ymd_opt(year, 1, 1), NaiveDate::from_ymd_opt(year, 12, 31)) {
            (Some(start), Some(end)) => Ok(range(start, end)),
            _ => Err(out_of_range("reference")),
        }
    };

    Ok(PeriodBoundaries {
        today: range(day, day),
        yesterday: range(yesterday, yesterday),
        last_7_days: last_n(7)?,
        last_14_days: last_n(14)?,
        last_30_days: last_n(30)?,
        last_60_days: last_n(60)?,
        last_90_days: last_n(90)?,
        this_week: range(week_start, week_start + Days::new(6)),
        last_week: range(last_week_start, last_week_start + Days::new(6)),
        this_month: range(month_start, month_end),
        last_month: range(last_month_start, last_month_end),
        this_year: year_bounds(day.year())?,
        last_year: year_bounds(day.year() - 1)?,
    })
}

/// Step size for [`date_series`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, serde::Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    #[default]
    Day,
    Week,
    Month,
}

impl FromStr for Interval {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(Interval::Day),
            "week" => Ok(Interval::Week),
            "month" => Ok(Interval::Month),
            _ => Err(AnalyticsError::invalid(
                "interval",
                "Interval must be 'day', 'week', or 'month'",
            )),
        }
    }
}

/// Dates from `start` to `end` inclusive, stepping by `interval`
///
/// Weekly series start from the Monday of `start`'s week. Monthly series
/// start at `start` itself, then continue on the first of each month.
pub fn date_series(start: &str, end: &str, interval: Interval) -> Result<Vec<String>, AnalyticsError> {
    let (start, end) = date_range(start, end)?;

    let step: fn(NaiveDate) -> Option<NaiveDate> = match interval {
        Interval::Day => |d| d.succ_opt(),
        Interval::Week => |d| d.checked_add_days(Days::new(7)),
        Interval::Month => first_of_next_month,
    };

    let mut current = match interval {
        Interval::Week => monday_of(start),
        Interval::Day | Interval::Month => start,
    };

    let mut series = Vec::new();
    while current <= end {
        series.push(format_date(current));
        match step(current) {
            Some(next) => current = next,
            None => break,
        }
    }

    Ok(series)
}
