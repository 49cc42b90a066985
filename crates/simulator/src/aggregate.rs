//! Cross-run aggregation of measurements.

use hdrhistogram::Histogram;
use serde::Serialize;

/// Scalars are recorded in the histogram with this many decimal digits.
const SCALAR_SCALE: f64 = 1000.0;

/// Last defined entry of a series.
pub fn last_value(series: &[Option<f64>]) -> Option<f64> {
    series.iter().rev().find_map(|value| *value)
}

/// Indices of the best and worst series, ranked by their last defined entry.
///
/// Series with no defined entry are skipped. Ties go to the earlier series.
pub fn best_and_worst(series: &[&[Option<f64>]]) -> Option<(usize, usize)> {
    let mut best: Option<(usize, f64)> = None;
    let mut worst: Option<(usize, f64)> = None;
    for (index, values) in series.iter().enumerate() {
        let Some(last) = last_value(values) else {
            continue;
        };
        if best.map_or(true, |(_, b)| last > b) {
            best = Some((index, last));
        }
        if worst.map_or(true, |(_, w)| last < w) {
            worst = Some((index, last));
        }
    }
    Some((best?.0, worst?.0))
}

/// Point-wise mean of several series, ignoring undefined entries.
///
/// A position undefined in every series averages to zero.
pub fn average_series(series: &[&[Option<f64>]]) -> Vec<f64> {
    let len = series.iter().map(|s| s.len()).max().unwrap_or(0);
    (0..len)
        .map(|i| {
            let defined: Vec<f64> = series
                .iter()
                .filter_map(|s| s.get(i).copied().flatten())
                .collect();
            if defined.is_empty() {
                0.0
            } else {
                defined.iter().sum::<f64>() / defined.len() as f64
            }
        })
        .collect()
}

/// Fraction of samples falling into each bucket of width `unit` over [0, 1].
///
/// Bucket `k` collects samples that round to `k * unit`; samples outside
/// [0, 1] land in the first or last bucket.
pub fn density(samples: &[f64], unit: f64) -> Vec<f64> {
    let buckets = (1.0 / unit).round() as usize + 1;
    let mut counts = vec![0usize; buckets];
    for sample in samples {
        let bucket = (sample / unit).round().clamp(0.0, (buckets - 1) as f64) as usize;
        counts[bucket] += 1;
    }
    let total = samples.len().max(1) as f64;
    counts.into_iter().map(|c| c as f64 / total).collect()
}

/// Average, best and worst of one series measurement across runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub average: Vec<f64>,
    pub best_run: usize,
    pub best: Vec<Option<f64>>,
    pub worst_run: usize,
    pub worst: Vec<Option<f64>>,
}

impl SeriesSummary {
    /// `None` when no run defines any entry.
    pub fn from_runs(series: &[&[Option<f64>]]) -> Option<Self> {
        let (best_run, worst_run) = best_and_worst(series)?;
        Some(Self {
            average: average_series(series),
            best_run,
            best: series[best_run].to_vec(),
            worst_run,
            worst: series[worst_run].to_vec(),
        })
    }
}

/// Distribution of a per-run scalar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScalarSummary {
    pub count: u64,
    pub mean: f64,
    pub min: f64,
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
    pub max: f64,
}

impl ScalarSummary {
    /// Summarize non-negative values. Negative values are recorded as zero in
    /// the percentiles but still count toward the mean.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut histogram = Histogram::<u64>::new(3).ok()?;
        for value in values {
            let scaled = (value.max(0.0) * SCALAR_SCALE).round() as u64;
            histogram.record(scaled).ok()?;
        }
        let unscale = |v: u64| v as f64 / SCALAR_SCALE;

        Some(Self {
            count: histogram.len(),
            mean: values.iter().sum::<f64>() / values.len() as f64,
            min: unscale(histogram.min()),
            p50: unscale(histogram.value_at_quantile(0.50)),
            p90: unscale(histogram.value_at_quantile(0.90)),
            p99: unscale(histogram.value_at_quantile(0.99)),
            max: unscale(histogram.max()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_value_skips_trailing_gaps() {
        assert_eq!(last_value(&[Some(0.2), Some(0.5), None]), Some(0.5));
        assert_eq!(last_value(&[None, None]), None);
        assert_eq!(last_value(&[]), None);
    }

    #[test]
    fn test_best_and_worst() {
        let a = [Some(0.1), Some(0.4)];
        let b = [Some(0.9), None];
        let c: [Option<f64>; 2] = [None, None];
        let d = [Some(0.2), Some(0.3), Some(0.95)];
        let runs: Vec<&[Option<f64>]> = vec![&a, &b, &c, &d];

        assert_eq!(best_and_worst(&runs), Some((3, 0)));
        assert_eq!(best_and_worst(&[&c[..]]), None);
    }

    #[test]
    fn test_average_ignores_gaps() {
        let a = [Some(1.0), None, Some(0.0)];
        let b = [Some(0.0), None];
        let runs: Vec<&[Option<f64>]> = vec![&a, &b];
        let avg = average_series(&runs);
        assert_eq!(avg, vec![0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_density_buckets() {
        let d = density(&[0.0, 0.5, 0.5, 1.0, 1.3], 0.25);
        assert_eq!(d.len(), 5);
        assert_eq!(d, vec![0.2, 0.0, 0.4, 0.0, 0.4]);
        assert_eq!(density(&[], 0.01).len(), 101);
    }

    #[test]
    fn test_scalar_summary() {
        let values: Vec<f64> = (1..=100).map(f64::from).collect();
        let summary = ScalarSummary::from_values(&values).unwrap();
        assert_eq!(summary.count, 100);
        assert!((summary.mean - 50.5).abs() < 1e-9);
        assert!((summary.min - 1.0).abs() < 0.01);
        assert!((summary.p50 - 50.0).abs() < 0.1);
        assert!((summary.max - 100.0).abs() < 0.1);
        assert!(ScalarSummary::from_values(&[]).is_none());
    }

    #[test]
    fn test_series_summary() {
        let a = [Some(0.2)];
        let b = [Some(0.6)];
        let runs: Vec<&[Option<f64>]> = vec![&a, &b];
        let summary = SeriesSummary::from_runs(&runs).unwrap();
        assert_eq!(summary.best_run, 1);
        assert_eq!(summary.worst_run, 0);
        assert!((summary.average[0] - 0.4).abs() < 1e-12);
    }
}
