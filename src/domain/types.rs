/// Core types shared by the validator, the statistics helpers and the tools
///
/// This module defines the enumerated platform set, ranking entries, time
/// series and named date ranges.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::{AnalyticsError, Row};

/// Platforms recorded in `app_usage.platform`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
pub enum Platform {
    Windows,
    Linux,
    #[serde(rename = "macOS")]
    MacOs,
    Android,
    #[serde(rename = "iOS")]
    Ios,
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Platform::Windows,
        Platform::Linux,
        Platform::MacOs,
        Platform::Android,
        Platform::Ios,
    ];

    /// Spelling used in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Windows => "Windows",
            Platform::Linux => "Linux",
            Platform::MacOs => "macOS",
            Platform::Android => "Android",
            Platform::Ios => "iOS",
        }
    }

    /// Whether this is a phone/tablet platform
    pub fn is_mobile(&self) -> bool {
        matches!(self, Platform::Android | Platform::Ios)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .iter()
            .copied()
            .find(|platform| platform.as_str() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = Platform::ALL.iter().map(|p| p.as_str()).collect();
                AnalyticsError::invalid(
                    "platform",
                    format!("Platform must be one of: {}", names.join(", ")),
                )
            })
    }
}

/// One position in a ranked list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingEntry {
    /// 1-based position
    pub rank: usize,
    pub name: String,
    pub value: f64,
    /// Share of the total over the full, untruncated input
    pub percentage: f64,
    /// Remaining columns of the source row
    pub extra: Row,
}

/// A labelled series of values over time
///
/// Timestamps and values always have the same length.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries {
    timestamps: Vec<String>,
    values: Vec<f64>,
    label: String,
    unit: String,
}

impl TimeSeries {
    pub fn new(
        timestamps: Vec<String>,
        values: Vec<f64>,
        label: impl Into<String>,
        unit: impl Into<String>,
    ) -> Result<Self, AnalyticsError> {
        if timestamps.len() != values.len() {
            return Err(AnalyticsError::invalid(
                "values",
                format!(
                    "Timestamps and values must have the same length ({} vs {})",
                    timestamps.len(),
                    values.len()
                ),
            ));
        }

        Ok(Self {
            timestamps,
            values,
            label: label.into(),
            unit: unit.into(),
        })
    }

    /// Build a series from result rows, ordered by `date_field`
    ///
    /// Missing dates sort first as empty strings; missing values become 0.
    pub fn from_rows(
        rows: &[Row],
        date_field: &str,
        value_field: &str,
        label: impl Into<String>,
        unit: impl Into<String>,
    ) -> Result<Self, AnalyticsError> {
        let mut sorted: Vec<&Row> = rows.iter().collect();
        sorted.sort_by(|a, b| {
            a.str(date_field)
                .unwrap_or_default()
                .cmp(b.str(date_field).unwrap_or_default())
        });

        let timestamps = sorted
            .iter()
            .map(|row| row.str(date_field).unwrap_or_default().to_string())
            .collect();
        let values = sorted
            .iter()
            .map(|row| row.f64(value_field).unwrap_or(0.0))
            .collect();

        Self::new(timestamps, values, label, unit)
    }

    pub fn timestamps(&self) -> &[String] {
        &self.timestamps
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Inclusive calendar range as `YYYY-MM-DD` strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

impl DateRange {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }
}
