/// Statistics helpers for shaping query results
///
/// Everything here is a pure function over in-memory rows or numbers.
/// Degenerate input (empty sequences, zero totals, zero variance) produces
/// zeros or empty output rather than NaN or an error, since these values
/// feed best-effort summaries and insights.

pub mod format;
pub mod ranking;
pub mod statistics;

pub use format::*;
pub use ranking::*;
pub use statistics::*;

/// Round to a fixed number of decimal places
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
