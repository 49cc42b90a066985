//! Experiment configuration.

use std::path::{Path, PathBuf};

use meshsim_candidates::{CandidateError, EngineConfig, PerformanceConfig, ScenarioConfig};
use meshsim_simulation::{SimConfig, SimError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse experiment file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Sim(#[from] SimError),

    #[error(transparent)]
    Candidate(#[from] CandidateError),

    #[error("an experiment needs at least one run")]
    ZeroRuns,

    #[error("thread count must be at least 1")]
    ZeroThreads,

    #[error("density unit must be in (0, 1], got {0}")]
    DensityUnit(f64),
}

/// A full experiment: one simulation setup repeated over several seeds.
///
/// ```toml
/// runs = 8
///
/// [sim]
/// horizon = 80
/// seed = 7
///
/// [scenario]
/// initial_peers = 10
///
/// [engine.beneficiaries]
/// method = "all"
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Independent runs, each with its own seed.
    pub runs: usize,

    /// Worker threads. `None` uses one per core.
    pub threads: Option<usize>,

    /// Bucket width when turning samples into densities.
    pub density_unit: f64,

    /// Per-run simulation parameters. `sim.seed` is the base seed.
    pub sim: SimConfig,

    pub scenario: ScenarioConfig,
    pub engine: EngineConfig,
    pub performance: PerformanceConfig,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            runs: 4,
            threads: None,
            density_unit: 0.01,
            sim: SimConfig::default(),
            scenario: ScenarioConfig::default(),
            engine: EngineConfig::default(),
            performance: PerformanceConfig::default(),
        }
    }
}

impl ExecutionConfig {
    /// Parse an experiment from TOML. Missing fields take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse an experiment file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn with_runs(mut self, runs: usize) -> Self {
        self.runs = runs;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Set the base seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.sim.seed = seed;
        self
    }

    pub fn with_horizon(mut self, rounds: u64) -> Self {
        self.sim.horizon = rounds;
        self
    }

    pub fn with_sim(mut self, sim: SimConfig) -> Self {
        self.sim = sim;
        self
    }

    pub fn with_scenario(mut self, scenario: ScenarioConfig) -> Self {
        self.scenario = scenario;
        self
    }

    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.runs == 0 {
            return Err(ConfigError::ZeroRuns);
        }
        if self.threads == Some(0) {
            return Err(ConfigError::ZeroThreads);
        }
        if !(self.density_unit > 0.0 && self.density_unit <= 1.0) {
            return Err(ConfigError::DensityUnit(self.density_unit));
        }
        self.sim.validate()?;
        self.scenario.validate()?;
        self.engine.validate()?;
        self.performance.validate()?;
        Ok(())
    }

    /// Seed of run `index`. Run 0 uses the base seed.
    pub fn run_seed(&self, index: usize) -> u64 {
        self.sim.seed ^ (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
    }
}
