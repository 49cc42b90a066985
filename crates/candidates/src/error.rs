//! Configuration errors for the policy candidates.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CandidateError {
    #[error("{name} must be a probability in [0, 1], got {value}")]
    Probability { name: &'static str, value: f64 },

    #[error("at least one peer type needs a positive ratio")]
    NoPeerType,

    #[error("hawkes process needs decay > 0 and jump >= 0 (decay {decay}, jump {jump})")]
    Hawkes { decay: f64, jump: f64 },

    #[error("statistical window must be at least 1 round")]
    ZeroWindow,

    #[error("max age to track must be at least 1 round")]
    ZeroMaxAge,
}
