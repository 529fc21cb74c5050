//! Distribution statistics over the sample history.
//!
//! All statistics are exact. Percentiles use the nearest-rank method on a sorted copy of the
//! values, so the result does not depend on the order in which samples arrived.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::sample::Sample;

/// Unit of the size distribution.
pub const SIZE_UNIT: &str = "B";
/// Unit of the rate distribution.
pub const RATE_UNIT: &str = "B/s";

/// Summary of one distribution.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatsSummary {
    /// Largest value.
    pub max: f64,
    /// Arithmetic mean.
    pub mean: f64,
    /// Median.
    pub p50: f64,
    /// 90th percentile.
    pub p90: f64,
    /// 95th percentile.
    pub p95: f64,
    /// 99th percentile.
    pub p99: f64,
    /// Unit of all values.
    pub unit: &'static str,
}

impl StatsSummary {
    /// The all-zero summary used when there are no samples.
    pub fn zero(unit: &'static str) -> Self {
        Self {
            max: 0.0,
            mean: 0.0,
            p50: 0.0,
            p90: 0.0,
            p95: 0.0,
            p99: 0.0,
            unit,
        }
    }

    /// Summarizes the given values.
    pub fn from_values(mut values: Vec<f64>, unit: &'static str) -> Self {
        if values.is_empty() {
            return Self::zero(unit);
        }

        values.sort_by(f64::total_cmp);
        let sum: f64 = values.iter().sum();

        Self {
            max: values[values.len() - 1],
            mean: sum / values.len() as f64,
            p50: percentile(&values, 50.0),
            p90: percentile(&values, 90.0),
            p95: percentile(&values, 95.0),
            p99: percentile(&values, 99.0),
            unit,
        }
    }
}

/// Nearest-rank percentile of an ascending, non-empty slice.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let rank = (pct * sorted.len() as f64 / 100.0).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

/// Statistics derived from a complete sample history.
#[derive(Clone, Debug, PartialEq)]
pub struct Summary {
    /// Distribution of object sizes.
    pub size: StatsSummary,
    /// Distribution of per-retrieval throughput.
    pub rate: StatsSummary,
    /// Number of samples per status code.
    pub status_codes: BTreeMap<u16, u64>,
}

/// Computes size and rate distributions and the status histogram.
///
/// Failed retrievals are included with the bytes they managed to read.
pub fn summarize(history: &[Sample]) -> Summary {
    let sizes = history.iter().map(|sample| sample.size as f64).collect();
    let rates = history.iter().map(Sample::rate).collect();

    let mut status_codes = BTreeMap::new();
    for sample in history {
        *status_codes.entry(sample.status).or_default() += 1;
    }

    Summary {
        size: StatsSummary::from_values(sizes, SIZE_UNIT),
        rate: StatsSummary::from_values(rates, RATE_UNIT),
        status_codes,
    }
}
