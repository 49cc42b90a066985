//! Parallel execution of independent runs.

use meshsim_candidates::{MeshPerformance, PolicyEngine, RateScenario};
use meshsim_core::Measurements;
use meshsim_simulation::{SimError, SimulationStats, Simulator};
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

use crate::{ConfigError, ExecutionConfig, ExecutionReport};

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("run {index} (seed {seed}) failed: {source}")]
    Run {
        index: usize,
        seed: u64,
        #[source]
        source: SimError,
    },
}

/// Outcome of a single run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    pub index: usize,
    pub seed: u64,
    pub measurements: Measurements,
    pub stats: SimulationStats,
    pub final_peers: usize,
    pub final_orders: usize,
}

/// Runs an experiment: one simulator per seed, spread over a rayon pool.
///
/// Runs share nothing mutable, so results only depend on the configuration.
pub struct Execution {
    config: ExecutionConfig,
}

impl Execution {
    pub fn new(config: ExecutionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Execute every run and aggregate the results.
    pub fn run(&self) -> Result<ExecutionReport, ExecutionError> {
        let results = self.run_all()?;
        let report = ExecutionReport::from_runs(&results, self.config.density_unit);
        info!(
            runs = report.runs,
            series = report.series.len(),
            samples = report.samples.len(),
            scalars = report.scalars.len(),
            "Execution complete"
        );
        Ok(report)
    }

    /// Execute every run, returning per-run results in run order.
    pub fn run_all(&self) -> Result<Vec<RunResult>, ExecutionError> {
        let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("meshsim-{}", i));
        if let Some(threads) = self.config.threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder.build()?;

        info!(
            runs = self.config.runs,
            threads = pool.current_num_threads(),
            base_seed = self.config.sim.seed,
            horizon = self.config.sim.horizon,
            "Starting execution"
        );

        pool.install(|| {
            (0..self.config.runs)
                .into_par_iter()
                .map(|index| self.run_one(index))
                .collect()
        })
    }

    /// Execute run `index` on the calling thread.
    pub fn run_one(&self, index: usize) -> Result<RunResult, ExecutionError> {
        let seed = self.config.run_seed(index);
        let failed = |source: SimError| ExecutionError::Run {
            index,
            seed,
            source,
        };

        let sim_config = self.config.sim.clone().with_seed(seed);
        let mut sim = Simulator::new(
            sim_config,
            RateScenario::new(self.config.scenario.clone()),
            PolicyEngine::new(self.config.engine.clone()),
            MeshPerformance::new(self.config.performance.clone()),
        )
        .map_err(failed)?;
        let measurements = sim.run().map_err(failed)?;

        debug!(
            index,
            seed,
            peers = sim.network().len(),
            orders = sim.order_book().len(),
            "Run finished"
        );

        Ok(RunResult {
            index,
            seed,
            measurements,
            stats: sim.stats().clone(),
            final_peers: sim.network().len(),
            final_orders: sim.order_book().len(),
        })
    }
}
