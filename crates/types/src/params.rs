//! Protocol parameter sets shared by every layer of the simulator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from validating parameter sets.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    #[error("neighbor bounds are inverted: min {min} > max {max}")]
    InvertedBounds { min: usize, max: usize },

    #[error("neighbor maximum must be at least 1")]
    ZeroMaximum,

    #[error("contribution history length must be at least 1")]
    EmptyHistory,

    #[error("prune duration must be at least 1 batch")]
    ZeroPruneDuration,
}

/// Allowed neighbor count per peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborBounds {
    /// Below this count a peer asks for new neighbors.
    pub min: usize,

    /// A peer never holds more neighbors than this.
    pub max: usize,
}

impl NeighborBounds {
    /// Create validated bounds.
    pub fn new(min: usize, max: usize) -> Result<Self, ParamError> {
        let bounds = Self { min, max };
        bounds.validate()?;
        Ok(bounds)
    }

    pub fn validate(&self) -> Result<(), ParamError> {
        if self.max == 0 {
            return Err(ParamError::ZeroMaximum);
        }
        if self.min > self.max {
            return Err(ParamError::InvertedBounds {
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }

    /// Whether a peer with `count` neighbors may accept one more.
    pub fn has_room(&self, count: usize) -> bool {
        count < self.max
    }
}

impl Default for NeighborBounds {
    fn default() -> Self {
        Self { min: 20, max: 30 }
    }
}

/// Rewards and penalties credited to a neighbor's contribution history.
///
/// Rewards are named by the situation they cover:
///
/// | field      | credited to                                                  |
/// |------------|--------------------------------------------------------------|
/// | `reward_a` | a neighbor re-sending an order we already stored from it      |
/// | `reward_b` | a neighbor sending an order we already stored from someone else |
/// | `reward_c` | every sender of a pending order that was not stored           |
/// | `reward_d` | the sender whose copy of an order was stored                  |
/// | `reward_e` | the other senders of an order stored from someone else        |
/// | `penalty_a`| a neighbor whose relay failed our acceptance check            |
/// | `penalty_b`| a neighbor relaying the same pending order twice              |
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncentiveParams {
    /// Number of batches kept in each neighbor's contribution history.
    pub history_len: usize,
    pub reward_a: f64,
    pub reward_b: f64,
    pub reward_c: f64,
    pub reward_d: f64,
    pub reward_e: f64,
    pub penalty_a: f64,
    pub penalty_b: f64,
}

impl IncentiveParams {
    pub fn validate(&self) -> Result<(), ParamError> {
        if self.history_len == 0 {
            return Err(ParamError::EmptyHistory);
        }
        Ok(())
    }
}

impl Default for IncentiveParams {
    fn default() -> Self {
        Self {
            history_len: 3,
            reward_a: 0.0,
            reward_b: 0.0,
            reward_c: 0.0,
            reward_d: 1.0,
            reward_e: 0.0,
            penalty_a: 0.0,
            penalty_b: -1.0,
        }
    }
}

/// Scoring-driven neighbor pruning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PruneConfig {
    /// A neighbor scoring strictly below this value is counted as lazy for the batch.
    pub threshold: f64,

    /// Consecutive lazy batches after which the link is torn down.
    pub duration: u32,

    /// Also discard every pending or stored order relayed by the pruned neighbor.
    #[serde(default)]
    pub purge_orders: bool,
}

impl PruneConfig {
    pub fn validate(&self) -> Result<(), ParamError> {
        if self.duration == 0 {
            return Err(ParamError::ZeroPruneDuration);
        }
        Ok(())
    }
}

impl Default for PruneConfig {
    fn default() -> Self {
        Self {
            threshold: 2.0,
            duration: 6,
            purge_orders: false,
        }
    }
}
