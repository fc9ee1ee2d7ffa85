/// Descriptive statistics over numeric sequences

use serde::Serialize;
use std::str::FromStr;

use crate::analytics::round_to;
use crate::domain::AnalyticsError;

/// Summary of a numeric sequence
///
/// Sum, mean, median and both standard deviations are rounded to 2 places.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Statistics {
    pub count: usize,
    pub sum: f64,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    /// Sample standard deviation; 0 for fewer than two values
    pub std_dev: f64,
    pub population_std_dev: f64,
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn squared_deviations(values: &[f64], mean: f64) -> f64 {
    values.iter().map(|v| (v - mean).powi(2)).sum()
}

/// Sample standard deviation, `None` for fewer than two values
fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    Some((squared_deviations(values, mean(values)) / (values.len() - 1) as f64).sqrt())
}

fn median(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Summarise `values`, skipping `None` entries
///
/// Accepts plain `f64`s or `Option<f64>`s. Empty input, after skipping,
/// yields all zeros.
pub fn statistics<I>(values: I) -> Statistics
where
    I: IntoIterator,
    I::Item: Into<Option<f64>>,
{
    let mut numbers: Vec<f64> = values
        .into_iter()
        .filter_map(|v| -> Option<f64> { v.into() })
        .filter(|v| v.is_finite())
        .collect();

    if numbers.is_empty() {
        return Statistics::default();
    }

    let count = numbers.len();
    let sum: f64 = numbers.iter().sum();
    let average = sum / count as f64;
    let std_dev = sample_std_dev(&numbers).unwrap_or(0.0);
    let population_std_dev = (squared_deviations(&numbers, average) / count as f64).sqrt();

    numbers.sort_by(f64::total_cmp);

    Statistics {
        count,
        sum: round_to(sum, 2),
        mean: round_to(average, 2),
        median: round_to(median(&numbers), 2),
        min: numbers[0],
        max: numbers[count - 1],
        std_dev: round_to(std_dev, 2),
        population_std_dev: round_to(population_std_dev, 2),
    }
}

/// Mean of each full window, rounded to 2 places
///
/// Returns nothing when there are fewer values than `window` (or `window` is 0).
pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || values.len() < window {
        return Vec::new();
    }

    values
        .windows(window)
        .map(|w| round_to(w.iter().sum::<f64>() / window as f64, 2))
        .collect()
}

/// Outlier detection method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutlierMethod {
    /// Outside 1.5 × IQR of the index-approximated quartiles
    #[default]
    Iqr,
    /// More than 2 sample standard deviations from the mean
    ZScore,
}

impl FromStr for OutlierMethod {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "iqr" => Ok(OutlierMethod::Iqr),
            "zscore" | "z_score" => Ok(OutlierMethod::ZScore),
            other => Err(AnalyticsError::invalid(
                "method",
                format!("Unknown outlier detection method: {}", other),
            )),
        }
    }
}

/// Indices of outlying values, in input order
///
/// Fewer than 4 values never have outliers.
pub fn find_outliers(values: &[f64], method: OutlierMethod) -> Vec<usize> {
    if values.len() < 4 {
        return Vec::new();
    }

    let is_outlier: Box<dyn Fn(f64) -> bool> = match method {
        OutlierMethod::Iqr => {
            let mut sorted = values.to_vec();
            sorted.sort_by(f64::total_cmp);
            let n = sorted.len();
            let q1 = sorted[n / 4];
            let q3 = sorted[3 * n / 4];
            let iqr = q3 - q1;
            let (lower, upper) = (q1 - 1.5 * iqr, q3 + 1.5 * iqr);
            Box::new(move |v| v < lower || v > upper)
        }
        OutlierMethod::ZScore => {
            let average = mean(values);
            let std_dev = sample_std_dev(values).unwrap_or(0.0);
            if std_dev == 0.0 {
                return Vec::new();
            }
            Box::new(move |v| ((v - average) / std_dev).abs() > 2.0)
        }
    };

    values
        .iter()
        .enumerate()
        .filter(|(_, v)| is_outlier(**v))
        .map(|(index, _)| index)
        .collect()
}

/// Normalization method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NormalizeMethod {
    /// Scale to [0, 1]
    #[default]
    MinMax,
    /// Standard score using the sample standard deviation
    ZScore,
}

impl FromStr for NormalizeMethod {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "min_max" => Ok(NormalizeMethod::MinMax),
            "z_score" | "zscore" => Ok(NormalizeMethod::ZScore),
            other => Err(AnalyticsError::invalid(
                "method",
                format!("Unknown normalization method: {}", other),
            )),
        }
    }
}

/// Normalize values, rounded to 4 places
///
/// Min-max maps all-equal input to 0.5. Z-score divides by 1 when the
/// standard deviation is undefined or zero.
pub fn normalize(values: &[f64], method: NormalizeMethod) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }

    match method {
        NormalizeMethod::MinMax => {
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            if min == max {
                return vec![0.5; values.len()];
            }
            values.iter().map(|v| round_to((v - min) / (max - min), 4)).collect()
        }
        NormalizeMethod::ZScore => {
            let average = mean(values);
            let std_dev = sample_std_dev(values).filter(|s| *s > 0.0).unwrap_or(1.0);
            values.iter().map(|v| round_to((v - average) / std_dev, 4)).collect()
        }
    }
}

/// Pearson correlation rounded to 4 places
///
/// Mismatched lengths, fewer than 2 points or zero variance give 0.0.
pub fn correlation(xs: &[f64], ys: &[f64]) -> f64 {
    if xs.len() != ys.len() || xs.len() < 2 {
        return 0.0;
    }

    let (mean_x, mean_y) = (mean(xs), mean(ys));
    let covariance: f64 = xs.iter().zip(ys).map(|(x, y)| (x - mean_x) * (y - mean_y)).sum();
    let spread = (squared_deviations(xs, mean_x) * squared_deviations(ys, mean_y)).sqrt();

    if spread == 0.0 || !spread.is_finite() {
        return 0.0;
    }
    round_to(covariance / spread, 4)
}
