/// Usage trend over time for one application
///
/// Days without usage are filled with zeros so moving averages and growth
/// compare like with like.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::analytics::{correlation, growth_rate, moving_average, statistics};
use crate::dates::{self, Interval};
use crate::domain::{AnalyticsError, Row, TimeSeries};
use crate::query::{Aggregate, FilterValue, QueryBuilder, SortOrder};
use crate::storage::AnalyticsStore;
use crate::tools::{count, hours, number, ToolParams};
use crate::validation::{ParamKind, ParamSchema};

/// Longest range a trend may span, in days
pub const MAX_TREND_DAYS: i64 = 731;

/// Parameters for the usage trend
#[derive(Debug, Deserialize, JsonSchema)]
pub struct DailyTrendParams {
    pub application_name: String,
    /// Defaults to the first day with usage, or the last 731 days of a
    /// longer history
    pub start_date: Option<String>,
    /// Defaults to the last day with usage
    pub end_date: Option<String>,
    /// Moving average window in buckets (default: 7, max: 90)
    pub window: Option<u32>,
    #[serde(default)]
    pub interval: Interval,
}

impl ToolParams for DailyTrendParams {
    fn schema() -> ParamSchema {
        ParamSchema::new()
            .required("application_name", ParamKind::Identifier)
            .optional("start_date", ParamKind::Date)
            .optional("end_date", ParamKind::Date)
            .optional("window", ParamKind::Count { max: Some(90) })
            .optional("interval", ParamKind::Choice(&["day", "week", "month"]))
    }
}

/// Movement of one bucket relative to the previous one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Flat,
}

impl Direction {
    fn between(previous: f64, current: f64) -> Self {
        if current > previous {
            Direction::Up
        } else if current < previous {
            Direction::Down
        } else {
            Direction::Flat
        }
    }
}

/// One bucket of the trend
#[derive(Debug, Serialize)]
pub struct TrendPoint {
    pub date: String,
    pub total_hours: f64,
    pub sessions: i64,
    /// Sum of each day's distinct users in the bucket
    pub user_days: i64,
    /// Mean over the window ending here; absent until the window fills
    pub moving_average: Option<f64>,
    /// Absent for the first bucket
    pub direction: Option<Direction>,
}

#[derive(Debug, Serialize)]
pub struct TrendSummary {
    pub buckets: usize,
    pub active_buckets: usize,
    pub total_hours: f64,
    pub average_hours: f64,
    pub peak_date: Option<String>,
    pub peak_hours: f64,
    /// Second half of the range against the first half
    pub growth_rate: f64,
    /// Pearson correlation between users and hours per bucket
    pub users_hours_correlation: f64,
    pub trend: &'static str,
}

/// Response with the usage trend
#[derive(Debug, Serialize)]
pub struct DailyTrendResponse {
    pub tool: &'static str,
    pub query_time_ms: f64,
    pub application_name: String,
    pub interval: Interval,
    pub series: TimeSeries,
    pub points: Vec<TrendPoint>,
    pub summary: TrendSummary,
    pub insights: Vec<String>,
}

/// Totals per bucket start, in series order
struct Bucket {
    seconds: f64,
    sessions: i64,
    user_days: i64,
}

/// Spread daily rows over the buckets of `series`
///
/// A row belongs to the last bucket starting on or before its date.
fn fill_buckets(series: &[String], daily: &[Row]) -> Vec<Bucket> {
    let mut buckets: Vec<Bucket> = series
        .iter()
        .map(|_| Bucket {
            seconds: 0.0,
            sessions: 0,
            user_days: 0,
        })
        .collect();

    for row in daily {
        let date = row.str("log_date").unwrap_or_default();
        let index = series.partition_point(|start| start.as_str() <= date);
        if let Some(bucket) = index.checked_sub(1).and_then(|i| buckets.get_mut(i)) {
            bucket.seconds += number(row, "total_seconds");
            bucket.sessions += count(row, "sessions");
            bucket.user_days += count(row, "unique_users");
        }
    }

    buckets
}

/// Usage of one application per day, week or month
pub fn daily_usage_trend<S: AnalyticsStore>(
    store: &S,
    params: DailyTrendParams,
) -> Result<DailyTrendResponse, AnalyticsError> {
    let window = params.window.unwrap_or(7) as usize;

    if let (Some(start), Some(end)) = (params.start_date.as_deref(), params.end_date.as_deref()) {
        if dates::days_between(start, end)? > MAX_TREND_DAYS {
            return Err(AnalyticsError::invalid(
                "end_date",
                format!("Trend range cannot exceed {} days", MAX_TREND_DAYS),
            ));
        }
    }

    let query = QueryBuilder::aggregation(
        "app_usage",
        &["log_date"],
        &[
            ("total_seconds", Aggregate::sum("duration_seconds")),
            ("sessions", Aggregate::Count),
            ("unique_users", Aggregate::count_distinct("user")),
        ],
    )?
    .filter("application_name", params.application_name.as_str())
    .filter(
        "log_date",
        FilterValue::date_range(params.start_date.as_deref(), params.end_date.as_deref()),
    )
    .group_by(["log_date"])
    .order_by("log_date", SortOrder::Asc)
    .build()?;

    let result = store.execute(&query)?;

    let first_seen = result.first().and_then(|row| row.str("log_date"));
    let last_seen = result.rows().last().and_then(|row| row.str("log_date"));
    let mut clamped = false;
    let bounds = match (params.start_date.as_deref(), params.end_date.as_deref()) {
        (Some(start), Some(end)) => Some((start.to_string(), end.to_string())),
        (Some(start), None) => last_seen.map(|end| (start.to_string(), end.to_string())),
        (None, Some(end)) => first_seen.map(|start| (start.to_string(), end.to_string())),
        (None, None) => first_seen.zip(last_seen).map(|(s, e)| (s.to_string(), e.to_string())),
    };

    // Defaulted ends move inward so the range fits; the supplied end stays put
    let bounds = match bounds {
        Some((start, end)) if dates::days_between(&start, &end)? > MAX_TREND_DAYS => {
            clamped = true;
            let span = (MAX_TREND_DAYS - 1) as u64;
            if params.start_date.is_some() {
                let end = dates::days_after(span, &start)?;
                Some((start, end))
            } else {
                Some((dates::days_ago(span, Some(&end))?, end))
            }
        }
        other => other,
    };

    let (series, daily): (Vec<String>, Vec<Row>) = match &bounds {
        Some((start, end)) => (
            dates::date_series(start, end, params.interval)?,
            result
                .rows()
                .iter()
                .filter(|row| {
                    let date = row.str("log_date").unwrap_or_default();
                    date >= start.as_str() && date <= end.as_str()
                })
                .cloned()
                .collect(),
        ),
        None => (Vec::new(), Vec::new()),
    };

    let buckets = fill_buckets(&series, &daily);
    let hours_per_bucket: Vec<f64> = buckets.iter().map(|b| hours(b.seconds)).collect();
    let users_per_bucket: Vec<f64> = buckets.iter().map(|b| b.user_days as f64).collect();

    let averages = moving_average(&hours_per_bucket, window);
    let offset = window.saturating_sub(1);

    let points: Vec<TrendPoint> = series
        .iter()
        .zip(&buckets)
        .enumerate()
        .map(|(index, (date, bucket))| TrendPoint {
            date: date.clone(),
            total_hours: hours_per_bucket[index],
            sessions: bucket.sessions,
            user_days: bucket.user_days,
            moving_average: index.checked_sub(offset).and_then(|i| averages.get(i)).copied(),
            direction: index
                .checked_sub(1)
                .map(|previous| Direction::between(hours_per_bucket[previous], hours_per_bucket[index])),
        })
        .collect();

    let half = hours_per_bucket.len() / 2;
    let first_half: f64 = hours_per_bucket[..half].iter().sum();
    let second_half: f64 = hours_per_bucket[hours_per_bucket.len() - half..].iter().sum();
    let growth = if half > 0 {
        growth_rate(second_half, first_half)
    } else {
        0.0
    };

    let stats = statistics(hours_per_bucket.iter().copied());
    let peak = points
        .iter()
        .filter(|p| p.total_hours > 0.0)
        .max_by(|a, b| a.total_hours.total_cmp(&b.total_hours));

    let trend = if growth > 5.0 {
        "increasing"
    } else if growth < -5.0 {
        "decreasing"
    } else {
        "stable"
    };

    let mut insights = Vec::new();
    if daily.is_empty() {
        insights.push(format!(
            "No usage recorded for '{}' in the selected range",
            params.application_name
        ));
    } else {
        insights.push(format!(
            "Usage is {} ({:+.2}% second half against first half)",
            trend, growth
        ));
        if let Some(peak) = peak {
            insights.push(format!("Peak usage of {:.2} hours on {}", peak.total_hours, peak.date));
        }
        if let (true, Some((start, end))) = (clamped, &bounds) {
            insights.push(format!(
                "Usage history exceeds {} days; showing {} to {}",
                MAX_TREND_DAYS, start, end
            ));
        }
        let idle = points.iter().filter(|p| p.sessions == 0).count();
        if idle > 0 {
            insights.push(format!("{} of {} periods had no usage", idle, points.len()));
        }
    }

    let summary = TrendSummary {
        buckets: points.len(),
        active_buckets: points.iter().filter(|p| p.sessions > 0).count(),
        total_hours: stats.sum,
        average_hours: stats.mean,
        peak_date: peak.map(|p| p.date.clone()),
        peak_hours: peak.map_or(0.0, |p| p.total_hours),
        growth_rate: growth,
        users_hours_correlation: correlation(&users_per_bucket, &hours_per_bucket),
        trend,
    };

    let label = format!("{} usage", params.application_name);
    let series = TimeSeries::new(series, hours_per_bucket, label, "hours")?;

    Ok(DailyTrendResponse {
        tool: "daily_usage_trend",
        query_time_ms: result.elapsed_ms(),
        application_name: params.application_name,
        interval: params.interval,
        series,
        points,
        summary,
        insights,
    })
}
