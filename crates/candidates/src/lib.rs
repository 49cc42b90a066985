//! Concrete policies for the order-mesh simulator.
//!
//! | Policy        | Candidate                           | Config               |
//! |---------------|-------------------------------------|----------------------|
//! | `Scenario`    | [`RateScenario`], [`ScriptedScenario`] | [`ScenarioConfig`] |
//! | `Engine`      | [`PolicyEngine`]                    | [`EngineConfig`]     |
//! | `Performance` | [`MeshPerformance`]                 | [`PerformanceConfig`]|
//!
//! Every config derives `serde` traits so a full experiment can be described
//! in a single TOML file.

mod engine;
mod error;
mod performance;
pub mod sampling;
mod scenario;

pub use engine::{
    AcceptPolicy, BeneficiaryPolicy, EngineConfig, PolicyEngine, RecommendPolicy, RepairTrigger,
    ScorePolicy, SharePolicy, StorePolicy,
};
pub use error::CandidateError;
pub use performance::{names, MeasureSet, MeshPerformance, PerformanceConfig};
pub use scenario::{
    EventProcess, EventRates, Phase, PeerProfile, RateScenario, ScenarioConfig, ScriptedScenario,
    SettlePolicy,
};
