//! Error types for the simulation runner.

use meshsim_core::{InvariantViolation, PolicyError};
use meshsim_types::{ParamError, Round};
use thiserror::Error;

/// Errors that stop a simulation run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// A policy referenced something that does not exist.
    #[error("policy contract violated: {0}")]
    Policy(#[from] PolicyError),

    /// The simulated state broke a structural invariant.
    #[error("invariant violated at {round}: {violation}")]
    Invariant {
        round: Round,
        violation: InvariantViolation,
    },

    /// Invalid parameter set.
    #[error("invalid configuration: {0}")]
    Config(#[from] ParamError),

    #[error("batch period must be at least 1 round")]
    ZeroBatchPeriod,

    /// `step` was called after the horizon.
    #[error("simulation already finished at {0}")]
    Finished(Round),
}

impl SimError {
    pub(crate) fn invariant(round: Round) -> impl FnOnce(InvariantViolation) -> SimError {
        move |violation| SimError::Invariant { round, violation }
    }
}
