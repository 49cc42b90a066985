//! Configuration for a single simulation run.

use crate::SimError;
use meshsim_types::{IncentiveParams, NeighborBounds, PruneConfig};
use serde::{Deserialize, Serialize};

/// Protocol and schedule parameters for one run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Allowed neighbor count per peer.
    pub bounds: NeighborBounds,

    /// Rounds per batch period. Storing and sharing run when the round number
    /// is a multiple of this.
    pub batch_period: u64,

    /// Number of rounds to simulate after genesis.
    pub horizon: u64,

    /// Random seed for deterministic simulation.
    pub seed: u64,

    /// Rewards and penalties credited to neighbors.
    pub incentive: IncentiveParams,

    /// Scoring-driven pruning. `None` never prunes.
    pub prune: Option<PruneConfig>,

    /// Verify the structural invariants after every round.
    pub check_invariants: bool,
}

impl SimConfig {
    /// Create a configuration with the given bounds and defaults elsewhere.
    pub fn new(bounds: NeighborBounds) -> Self {
        Self {
            bounds,
            ..Default::default()
        }
    }

    /// Set the neighbor bounds.
    pub fn with_bounds(mut self, bounds: NeighborBounds) -> Self {
        self.bounds = bounds;
        self
    }

    /// Set the batch period.
    pub fn with_batch_period(mut self, rounds: u64) -> Self {
        self.batch_period = rounds;
        self
    }

    /// Set the horizon.
    pub fn with_horizon(mut self, rounds: u64) -> Self {
        self.horizon = rounds;
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the incentive parameters.
    pub fn with_incentive(mut self, incentive: IncentiveParams) -> Self {
        self.incentive = incentive;
        self
    }

    /// Enable pruning.
    pub fn with_prune(mut self, prune: PruneConfig) -> Self {
        self.prune = Some(prune);
        self
    }

    /// Enable or disable per-round invariant checks.
    pub fn with_invariant_checks(mut self, enabled: bool) -> Self {
        self.check_invariants = enabled;
        self
    }

    /// Reject configurations the scheduler cannot run.
    pub fn validate(&self) -> Result<(), SimError> {
        self.bounds.validate()?;
        self.incentive.validate()?;
        if let Some(prune) = &self.prune {
            prune.validate()?;
        }
        if self.batch_period == 0 {
            return Err(SimError::ZeroBatchPeriod);
        }
        Ok(())
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            bounds: NeighborBounds::default(),
            batch_period: 10,
            horizon: 80,
            seed: 12345,
            incentive: IncentiveParams::default(),
            prune: None,
            check_invariants: true,
        }
    }
}
