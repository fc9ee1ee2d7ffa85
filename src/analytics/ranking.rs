/// Percentages, rankings and in-memory grouping over result rows

use indexmap::IndexMap;
use serde_json::{json, Value};
use std::str::FromStr;

use crate::analytics::round_to;
use crate::domain::{AnalyticsError, RankingEntry, Row};

fn numeric(row: &Row, field: &str) -> f64 {
    row.f64(field).unwrap_or(0.0)
}

fn share(value: f64, total: f64) -> f64 {
    if total == 0.0 || !total.is_finite() {
        return 0.0;
    }
    value / total * 100.0
}

/// `100 * value / total` rounded to 2 places; a zero total gives 0.0
pub fn percentage(value: f64, total: f64) -> f64 {
    round_to(share(value, total), 2)
}

/// Copy `rows`, adding a `percentage` column relative to their own total
pub fn percentages(rows: &[Row], value_field: &str) -> Vec<Row> {
    let total: f64 = rows.iter().map(|row| numeric(row, value_field)).sum();
    percentages_of(rows, value_field, total)
}

/// Copy `rows`, adding a `percentage` column relative to `denominator`
///
/// Use this when the total comes from a different query than the rows, e.g.
/// all users in the system against a filtered subset.
pub fn percentages_of(rows: &[Row], value_field: &str, denominator: f64) -> Vec<Row> {
    rows.iter()
        .map(|row| {
            let share = percentage(numeric(row, value_field), denominator);
            row.clone().with("percentage", json!(share))
        })
        .collect()
}

fn display_name(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "Unknown".to_string(),
        Some(other) => other.to_string(),
    }
}

/// Rank rows by `value_field`
///
/// Ties keep their input order. Percentages are computed against the total
/// of the whole input, so they don't change when `limit` truncates the list.
/// They are left unrounded for the caller to present.
pub fn rank(
    rows: &[Row],
    value_field: &str,
    name_field: &str,
    limit: Option<usize>,
    descending: bool,
) -> Vec<RankingEntry> {
    let total: f64 = rows.iter().map(|row| numeric(row, value_field)).sum();

    let mut sorted: Vec<&Row> = rows.iter().collect();
    sorted.sort_by(|a, b| {
        let ordering = numeric(a, value_field).total_cmp(&numeric(b, value_field));
        if descending {
            ordering.reverse()
        } else {
            ordering
        }
    });

    if let Some(limit) = limit.filter(|l| *l > 0) {
        sorted.truncate(limit);
    }

    sorted
        .into_iter()
        .enumerate()
        .map(|(index, row)| {
            let value = numeric(row, value_field);
            let extra = Row::from_pairs(
                row.iter()
                    .filter(|(column, _)| *column != name_field && *column != value_field)
                    .map(|(column, value)| (column, value.clone())),
            );

            RankingEntry {
                rank: index + 1,
                name: display_name(row.get(name_field)),
                value,
                percentage: share(value, total),
                extra,
            }
        })
        .collect()
}

/// Functions available to [`aggregate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFn {
    Sum,
    Avg,
    Count,
    Min,
    Max,
}

impl FromStr for AggregateFn {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sum" => Ok(AggregateFn::Sum),
            "avg" => Ok(AggregateFn::Avg),
            "count" => Ok(AggregateFn::Count),
            "min" => Ok(AggregateFn::Min),
            "max" => Ok(AggregateFn::Max),
            other => Err(AnalyticsError::invalid(
                "aggregation",
                format!("Unknown aggregation function: {}", other),
            )),
        }
    }
}

impl AggregateFn {
    fn apply(&self, values: &[&Value]) -> Value {
        if values.is_empty() {
            return json!(0);
        }
        if *self == AggregateFn::Count {
            return json!(values.len());
        }

        if let Some(result) = self.apply_integers(values) {
            return json!(result);
        }

        let numbers: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();
        if numbers.is_empty() {
            return json!(0);
        }

        let result = match self {
            AggregateFn::Sum => numbers.iter().sum(),
            AggregateFn::Avg => numbers.iter().sum::<f64>() / numbers.len() as f64,
            AggregateFn::Min => numbers.iter().copied().fold(f64::INFINITY, f64::min),
            AggregateFn::Max => numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            AggregateFn::Count => numbers.len() as f64,
        };
        json!(result)
    }

    /// Sum, min and max stay integral when every input is an integer
    fn apply_integers(&self, values: &[&Value]) -> Option<i64> {
        let integers: Vec<i64> = values.iter().map(|v| v.as_i64()).collect::<Option<_>>()?;
        match self {
            AggregateFn::Sum => integers.iter().try_fold(0i64, |acc, n| acc.checked_add(*n)),
            AggregateFn::Min => integers.iter().copied().min(),
            AggregateFn::Max => integers.iter().copied().max(),
            AggregateFn::Avg | AggregateFn::Count => None,
        }
    }
}

/// Group rows by `group_by` and aggregate fields per group
///
/// Groups come out in first-seen order. A field with no non-null values in a
/// group aggregates to 0.
pub fn aggregate(rows: &[Row], group_by: &str, aggregations: &[(&str, AggregateFn)]) -> Vec<Row> {
    // Keyed by the JSON text of the group value so 1 and "1" stay apart
    let mut groups: IndexMap<String, (Value, Vec<&Row>)> = IndexMap::new();
    for row in rows {
        let key = row.get(group_by).cloned().unwrap_or(Value::Null);
        groups
            .entry(key.to_string())
            .or_insert_with(|| (key, Vec::new()))
            .1
            .push(row);
    }

    groups
        .into_values()
        .map(|(key, members)| {
            let mut aggregated = Row::new().with(group_by, key);
            for (field, function) in aggregations {
                let values: Vec<&Value> = members
                    .iter()
                    .filter_map(|row| row.get(field))
                    .filter(|value| !value.is_null())
                    .collect();
                aggregated.insert(*field, function.apply(&values));
            }
            aggregated
        })
        .collect()
}
