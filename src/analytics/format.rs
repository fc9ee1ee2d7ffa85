/// Duration formatting and period-over-period growth

use std::str::FromStr;

use crate::analytics::round_to;
use crate::domain::AnalyticsError;

/// Output style for [`format_duration`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurationFormat {
    /// `1 hour, 1 minute, 5 seconds`
    #[default]
    Human,
    /// `01:01:05`
    Hms,
    /// `1.02 hours`
    Hours,
    /// `61.08 minutes`
    Minutes,
}

impl FromStr for DurationFormat {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "human" => Ok(DurationFormat::Human),
            "hms" => Ok(DurationFormat::Hms),
            "hours" => Ok(DurationFormat::Hours),
            "minutes" => Ok(DurationFormat::Minutes),
            other => Err(AnalyticsError::invalid(
                "format",
                format!("Unknown format type: {}", other),
            )),
        }
    }
}

fn plural(count: u64, unit: &str) -> String {
    if count == 1 {
        format!("{} {}", count, unit)
    } else {
        format!("{} {}s", count, unit)
    }
}

/// Render a number of seconds; negative durations render as `0 seconds`
pub fn format_duration(seconds: f64, format: DurationFormat) -> String {
    if seconds < 0.0 || !seconds.is_finite() {
        return "0 seconds".to_string();
    }

    match format {
        DurationFormat::Hours => format!("{:.2} hours", seconds / 3600.0),
        DurationFormat::Minutes => format!("{:.2} minutes", seconds / 60.0),
        DurationFormat::Hms => {
            let total = seconds as u64;
            format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
        }
        DurationFormat::Human => {
            let total = seconds as u64;
            if total < 60 {
                return format!("{} seconds", total);
            }

            let (minutes, secs) = (total / 60, total % 60);
            if minutes < 60 {
                return if secs > 0 {
                    format!("{} minutes, {} seconds", minutes, secs)
                } else {
                    format!("{} minutes", minutes)
                };
            }

            let (hours, minutes) = (minutes / 60, minutes % 60);
            let mut parts = vec![plural(hours, "hour")];
            if minutes > 0 {
                parts.push(plural(minutes, "minute"));
            }
            if secs > 0 {
                parts.push(plural(secs, "second"));
            }
            parts.join(", ")
        }
    }
}

/// Percentage change from `previous` to `current`, rounded to 2 places
///
/// Growth from zero is reported as 100% (or 0% when still zero).
pub fn growth_rate(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        return if current > 0.0 { 100.0 } else { 0.0 };
    }
    round_to((current - previous) / previous * 100.0, 2)
}
