//! Execution report.

use std::collections::BTreeMap;

use meshsim_core::Measurement;
use serde::Serialize;

use crate::aggregate::{density, ScalarSummary, SeriesSummary};
use crate::execution::RunResult;

/// Aggregated outcome of an experiment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionReport {
    pub runs: usize,
    pub seeds: Vec<u64>,

    /// Series measurements: average, best and worst run.
    pub series: BTreeMap<String, SeriesSummary>,

    /// Sample measurements pooled over all runs.
    pub samples: BTreeMap<String, ScalarSummary>,

    /// Pooled samples bounded to [0, 1], as densities.
    pub densities: BTreeMap<String, Vec<f64>>,

    /// Per-run scalars: measurements plus run statistics.
    pub scalars: BTreeMap<String, ScalarSummary>,

    /// How many runs reported each measurement as missing.
    pub missing: BTreeMap<String, usize>,
}

impl ExecutionReport {
    pub fn from_runs(results: &[RunResult], density_unit: f64) -> Self {
        let mut series: BTreeMap<String, Vec<&[Option<f64>]>> = BTreeMap::new();
        let mut samples: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        let mut scalars: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        let mut missing: BTreeMap<String, usize> = BTreeMap::new();

        for result in results {
            for (name, value) in result.measurements.iter() {
                match value {
                    Measurement::Series(values) => {
                        series.entry(name.to_string()).or_default().push(values)
                    }
                    Measurement::Samples(values) => samples
                        .entry(name.to_string())
                        .or_default()
                        .extend_from_slice(values),
                    Measurement::Scalar(value) => {
                        scalars.entry(name.to_string()).or_default().push(*value)
                    }
                    Measurement::Missing => *missing.entry(name.to_string()).or_default() += 1,
                }
            }

            let stats = &result.stats;
            let run_scalars = [
                ("final_peers", result.final_peers as f64),
                ("final_orders", result.final_orders as f64),
                ("transmissions", stats.transmissions as f64),
                ("orders_stored", stats.orders_stored as f64),
                ("links_created", stats.links_created as f64),
                ("links_pruned", stats.links_pruned as f64),
            ];
            for (name, value) in run_scalars {
                scalars.entry(name.to_string()).or_default().push(value);
            }
        }

        Self {
            runs: results.len(),
            seeds: results.iter().map(|r| r.seed).collect(),
            series: series
                .into_iter()
                .filter_map(|(name, runs)| Some((name, SeriesSummary::from_runs(&runs)?)))
                .collect(),
            densities: samples
                .iter()
                .filter(|(_, values)| values.iter().all(|v| (0.0..=1.0).contains(v)))
                .map(|(name, values)| (name.clone(), density(values, density_unit)))
                .collect(),
            samples: samples
                .iter()
                .filter_map(|(name, values)| Some((name.clone(), ScalarSummary::from_values(values)?)))
                .collect(),
            scalars: scalars
                .into_iter()
                .filter_map(|(name, values)| Some((name, ScalarSummary::from_values(&values)?)))
                .collect(),
            missing,
        }
    }

    /// Print a human-readable summary.
    pub fn print_summary(&self) {
        println!("\n═══════════════════════════════════════════");
        println!("         ORDER MESH EXPERIMENT REPORT       ");
        println!("═══════════════════════════════════════════");
        println!();
        println!("Runs: {}", self.runs);
        println!("Seeds: {:?}", self.seeds);

        for (name, summary) in &self.series {
            println!();
            println!("{} (by age window):", name);
            println!(
                "  {:>6}  {:>8}  {:>8}  {:>8}",
                "window", "average", "best", "worst"
            );
            for (i, average) in summary.average.iter().enumerate() {
                println!(
                    "  {:>6}  {:>8.3}  {:>8}  {:>8}",
                    i,
                    average,
                    format_entry(summary.best.get(i).copied().flatten()),
                    format_entry(summary.worst.get(i).copied().flatten()),
                );
            }
            println!(
                "  best run: {}, worst run: {}",
                summary.best_run, summary.worst_run
            );
        }

        for (name, d) in &self.densities {
            println!();
            println!("{} (density, non-empty buckets):", name);
            let unit = if d.len() > 1 {
                1.0 / (d.len() - 1) as f64
            } else {
                1.0
            };
            for (bucket, fraction) in d.iter().enumerate().filter(|(_, f)| **f > 0.0) {
                println!("  {:>5.2}: {:.3}", bucket as f64 * unit, fraction);
            }
        }

        print_table("Pooled samples:", &self.samples);
        print_table("Per-run scalars:", &self.scalars);

        if !self.missing.is_empty() {
            println!();
            println!("Missing measurements:");
            for (name, count) in &self.missing {
                println!("  {}: {} of {} runs", name, count, self.runs);
            }
        }
        println!("═══════════════════════════════════════════\n");
    }
}

fn print_table(title: &str, rows: &BTreeMap<String, ScalarSummary>) {
    if rows.is_empty() {
        return;
    }
    println!();
    println!("{}", title);
    println!(
        "  {:<26} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "name", "mean", "min", "p50", "p99", "max"
    );
    for (name, s) in rows {
        println!(
            "  {:<26} {:>10.3} {:>10.3} {:>10.3} {:>10.3} {:>10.3}",
            name, s.mean, s.min, s.p50, s.p99, s.max
        );
    }
}

fn format_entry(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.3}", v),
        None => "-".to_string(),
    }
}
