//! Deterministic round-based simulation of the order mesh.
//!
//! Given the same configuration, policies and seed, a run produces identical
//! results every time.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                 Simulator<S, E, P>                      │
//! │                                                         │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │   Scenario::round_events                           │ │
//! │  │   departures → invalidations → arrivals            │ │
//! │  └────────────────────────┬───────────────────────────┘ │
//! │                           │                             │
//! │                           ▼                             │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │   per peer, in id order: purge, neighbor repair    │ │
//! │  └────────────────────────┬───────────────────────────┘ │
//! │                           │  round % batch_period == 0  │
//! │                           ▼                             │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │   store → score → prune → rotate → share           │ │
//! │  └────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────┘
//! ```

mod batch;
mod config;
mod error;
mod repair;
mod runner;

pub use batch::{PruneOutcome, ShareOutcome};
pub use config::SimConfig;
pub use error::SimError;
pub use runner::{SimulationStats, Simulator};
